//! # xform-formlist Library
//!
//! Builds OpenRosa FormList documents from xForms fetched over HTTP, read from
//! open streams, or passed as XML text. Each form is parsed and hashed in a
//! single streaming pass, and many forms are processed concurrently.

pub mod cli;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod http_client;
pub mod manifest;
pub mod parser;
pub mod source;

pub use cli::Cli;
pub use config::{ConfigFile, ConfigManager, FormListConfig, fill_form_id};
pub use coordinator::{FormListEngine, FormPipeline, create_form_list};
pub use error::{ConfigError, FormListError};
pub use http_client::{AsyncHttpClient, GITHUB_API_URL, HttpClientConfig};
pub use manifest::{FORM_LIST_NAMESPACE, render_manifest};
pub use parser::{
    FieldOrder, FormMetadata, FormParser, HashingReader, PathCursor, UNNAMED_FORM, parse_form,
};
pub use source::{FormReader, FormSource, FormStream};
