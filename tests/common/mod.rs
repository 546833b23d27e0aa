//! Shared fixtures and mock server helpers for the integration tests

#![allow(dead_code)]

use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const BIRDS_XML: &str = include_str!("../fixtures/birds.xml");
pub const WIDGETS_XML: &str = include_str!("../fixtures/widgets.xml");
pub const GEO_TAGGER_XML: &str = include_str!("../fixtures/geo_tagger.xml");

/// Expected `hash` value for a fixture
pub fn md5_hash(content: &str) -> String {
    format!("md5:{:x}", md5::compute(content.as_bytes()))
}

/// Serve `body` at `route` with status 200 after `delay`
pub async fn mount_form(server: &MockServer, route: &str, body: &str, delay: Duration) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(body)
                .set_delay(delay),
        )
        .mount(server)
        .await;
}

/// Serve a failing response at `route`
pub async fn mount_status(server: &MockServer, route: &str, status: u16, body: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(status).set_body_string(body))
        .mount(server)
        .await;
}

/// Start a mock server hosting all three fixture forms
pub async fn fixture_server() -> MockServer {
    let server = MockServer::start().await;
    mount_form(&server, "/forms/birds.xml", BIRDS_XML, Duration::ZERO).await;
    mount_form(&server, "/forms/widgets.xml", WIDGETS_XML, Duration::ZERO).await;
    mount_form(&server, "/forms/geo_tagger.xml", GEO_TAGGER_XML, Duration::ZERO).await;
    server
}

pub fn url(server: &MockServer, route: &str) -> String {
    format!("{}{}", server.uri(), route)
}
