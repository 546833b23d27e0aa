use thiserror::Error;

/// Main library error type that encompasses all possible failure modes
///
/// Every per-form variant carries a `form` (or `url`) label naming the input
/// item that failed, so the first error can be returned to the caller as-is.
#[derive(Error, Debug)]
pub enum FormListError {
    #[error("HTTP status error: {status} for {url} - {body}")]
    HttpStatus {
        url: String,
        status: u16,
        body: String,
    },

    #[error("HTTP error: {url} - {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Malformed xForm: {form} - {source}")]
    MalformedDocument {
        form: String,
        #[source]
        source: quick_xml::Error,
    },

    #[error("Stream error: {form} - {source}")]
    Stream {
        form: String,
        #[source]
        source: std::io::Error,
    },

    #[error("No form instance found: {form}")]
    MissingFormId { form: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Manifest rendering error: {0}")]
    Render(String),

    #[error("Concurrent operation error: {details}")]
    Concurrency { details: String },
}

/// Configuration loading and validation errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlParsing(#[from] toml::de::Error),

    #[error("JSON parsing error: {0}")]
    JsonParsing(#[from] serde_json::Error),

    #[error("Invalid media pattern: {0}")]
    MediaPattern(#[from] regex::Error),

    #[error("Configuration validation error: {0}")]
    Validation(String),

    #[error("Environment variable error: {0}")]
    Environment(String),

    #[error("Unsupported configuration file format: {0}")]
    UnsupportedFormat(String),
}

impl FormListError {
    /// Server-provided diagnostics for transport failures.
    pub fn payload(&self) -> Option<&str> {
        match self {
            FormListError::HttpStatus { body, .. } => Some(body),
            _ => None,
        }
    }

    /// Label of the input item that caused this error, if any.
    pub fn form(&self) -> Option<&str> {
        match self {
            FormListError::HttpStatus { url, .. } | FormListError::Http { url, .. } => Some(url),
            FormListError::MalformedDocument { form, .. }
            | FormListError::Stream { form, .. }
            | FormListError::MissingFormId { form } => Some(form),
            _ => None,
        }
    }
}

impl From<ConfigError> for FormListError {
    fn from(err: ConfigError) -> Self {
        FormListError::Config(err.to_string())
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, FormListError>;

/// Result type for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_status_display_and_payload() {
        let error = FormListError::HttpStatus {
            url: "https://example.com/forms/birds.xml".to_string(),
            status: 404,
            body: "Form not found".to_string(),
        };
        assert!(error.to_string().contains("404"));
        assert!(error.to_string().contains("birds.xml"));
        assert_eq!(error.payload(), Some("Form not found"));
        assert_eq!(error.form(), Some("https://example.com/forms/birds.xml"));
    }

    #[test]
    fn test_payload_only_for_status_errors() {
        let error = FormListError::MissingFormId {
            form: "form #3".to_string(),
        };
        assert_eq!(error.payload(), None);
        assert_eq!(error.form(), Some("form #3"));
        assert!(error.to_string().contains("form #3"));
    }

    #[test]
    fn test_config_error_conversion() {
        let config_error = ConfigError::UnsupportedFormat("yaml".to_string());
        let error: FormListError = config_error.into();

        match error {
            FormListError::Config(message) => assert!(message.contains("yaml")),
            _ => panic!("Expected FormListError::Config"),
        }
    }

    #[test]
    fn test_error_source_chain() {
        use std::error::Error;

        let error = FormListError::Stream {
            form: "form #0".to_string(),
            source: std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "truncated"),
        };

        let source = error.source().unwrap();
        assert_eq!(source.to_string(), "truncated");
    }
}
