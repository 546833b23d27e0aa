use crate::config::FormListConfig;
use crate::error::FormListError;
use reqwest::header::{ACCEPT, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Response, StatusCode};
use std::collections::BTreeMap;
use std::time::Duration;

/// GitHub's contents API only returns the raw file when asked for it
pub const GITHUB_API_URL: &str = "https://api.github.com";
const GITHUB_RAW_MEDIA_TYPE: &str = "application/vnd.github.v3.raw";

/// Configuration for the HTTP client
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Request timeout in seconds
    pub timeout_seconds: u64,
    /// Headers sent with every request
    pub headers: BTreeMap<String, String>,
    /// Requests under this base URL ask for raw file content
    pub github_api_url: String,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self::from(&FormListConfig::default())
    }
}

impl From<&FormListConfig> for HttpClientConfig {
    fn from(config: &FormListConfig) -> Self {
        Self {
            timeout_seconds: config.timeout_seconds,
            headers: config.request_headers.clone(),
            github_api_url: GITHUB_API_URL.to_string(),
        }
    }
}

/// Async HTTP client for fetching remote xForms.
///
/// No retries: a failed request fails its form.
pub struct AsyncHttpClient {
    client: Client,
    config: HttpClientConfig,
}

impl AsyncHttpClient {
    /// Create a new async HTTP client with the given configuration
    pub fn new(config: HttpClientConfig) -> Result<Self, FormListError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .default_headers(Self::header_map(&config.headers)?)
            .pool_idle_timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| FormListError::Config(format!("HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    fn header_map(headers: &BTreeMap<String, String>) -> Result<HeaderMap, FormListError> {
        let mut map = HeaderMap::with_capacity(headers.len());
        for (name, value) in headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| FormListError::Config(format!("Invalid header name: {}", name)))?;
            let value = HeaderValue::from_str(value).map_err(|_| {
                FormListError::Config(format!("Invalid value for header {}", name))
            })?;
            map.insert(name, value);
        }
        Ok(map)
    }

    fn wants_raw_content(&self, url: &str) -> bool {
        url.starts_with(&self.config.github_api_url)
    }

    /// GET a form and return the response once its status is known to be 200.
    ///
    /// Any other status is turned into [`FormListError::HttpStatus`] carrying the
    /// response body, so server diagnostics reach the caller.
    pub async fn fetch_form(&self, url: &str) -> Result<Response, FormListError> {
        let mut request = self.client.get(url);
        if self.wants_raw_content(url) {
            request = request.header(ACCEPT, GITHUB_RAW_MEDIA_TYPE);
        }

        let response = request.send().await.map_err(|source| FormListError::Http {
            url: url.to_string(),
            source,
        })?;

        let status = response.status();
        if status == StatusCode::OK {
            return Ok(response);
        }

        let body = response
            .text()
            .await
            .map_err(|source| FormListError::Http {
                url: url.to_string(),
                source,
            })?;

        Err(FormListError::HttpStatus {
            url: url.to_string(),
            status: status.as_u16(),
            body,
        })
    }
}
