use crate::cli::Cli;
use regex::{NoExpand, Regex};
use reqwest::header::{HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::OnceLock;

use crate::error::{ConfigError, ConfigResult as Result};

/// Media references in xForm text content (`jr://images/...` and friends)
pub const DEFAULT_MEDIA_PATTERN: &str = r"(?i)jr://(images|audio|video)";

/// Element whose text content is the form name
pub const DEFAULT_NAME_PATH: &str = "/h:html/h:head/h:title";

/// Element whose first child carries the form `id` and `version` attributes
pub const DEFAULT_INSTANCE_PATH: &str = "/h:html/h:head/model/instance";

pub const DEFAULT_USER_AGENT: &str = "xform-formlist";

pub const DEFAULT_TIMEOUT_SECONDS: u64 = 30;

/// Placeholder substituted in `download_url` and `manifest_url` templates
static FORM_ID_PLACEHOLDER: OnceLock<Regex> = OnceLock::new();

fn form_id_placeholder() -> &'static Regex {
    FORM_ID_PLACEHOLDER.get_or_init(|| {
        Regex::new(r"\$\{\s*formId\s*\}").expect("Failed to compile formId placeholder regex")
    })
}

/// Replace the first `${formId}` placeholder in a URL template.
pub fn fill_form_id(template: &str, form_id: &str) -> String {
    form_id_placeholder()
        .replace(template, NoExpand(form_id))
        .into_owned()
}

/// Trait for abstracting environment variable access
pub trait EnvProvider {
    fn get(&self, key: &str) -> Option<String>;
}

/// System environment variable provider for production use
pub struct SystemEnvProvider;

impl EnvProvider for SystemEnvProvider {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

/// Options for one form list invocation.
///
/// Built fresh for every call and shared read-only between the per-form
/// pipelines; nothing here is mutated once the engine is constructed.
#[derive(Debug, Clone)]
pub struct FormListConfig {
    /// Text content matching this marks the form as referencing external media
    pub media_pattern: Regex,
    /// Path to the element whose text is the form name
    pub name_path: String,
    /// Path to the element whose first child carries `id` and `version`
    pub instance_path: String,
    /// Download URL template, e.g. `https://example.com/forms/${formId}.xml`
    pub download_url: Option<String>,
    /// Manifest URL template, only used for forms with media references
    pub manifest_url: Option<String>,
    /// Headers sent with every form request
    pub request_headers: BTreeMap<String, String>,
    /// Transport timeout for each form request
    pub timeout_seconds: u64,
}

impl Default for FormListConfig {
    fn default() -> Self {
        let mut request_headers = BTreeMap::new();
        request_headers.insert("User-Agent".to_string(), DEFAULT_USER_AGENT.to_string());

        Self {
            media_pattern: Regex::new(DEFAULT_MEDIA_PATTERN)
                .expect("Failed to compile default media pattern"),
            name_path: DEFAULT_NAME_PATH.to_string(),
            instance_path: DEFAULT_INSTANCE_PATH.to_string(),
            download_url: None,
            manifest_url: None,
            request_headers,
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
        }
    }
}

impl FormListConfig {
    pub fn with_download_url(mut self, template: impl Into<String>) -> Self {
        self.download_url = Some(template.into());
        self
    }

    pub fn with_manifest_url(mut self, template: impl Into<String>) -> Self {
        self.manifest_url = Some(template.into());
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.request_headers.insert(name.into(), value.into());
        self
    }

    pub fn with_media_pattern(mut self, pattern: &str) -> Result<Self> {
        self.media_pattern = Regex::new(pattern)?;
        Ok(self)
    }

    /// Build a configuration from file/environment/CLI settings layered over the defaults
    pub fn from_file_config(file: ConfigFile) -> Result<Self> {
        let mut config = Self::default();

        if let Some(pattern) = file.media_pattern {
            config.media_pattern = Regex::new(&pattern)?;
        }
        if let Some(name_path) = file.name_path {
            config.name_path = name_path;
        }
        if let Some(instance_path) = file.instance_path {
            config.instance_path = instance_path;
        }
        config.download_url = file.download_url;
        config.manifest_url = file.manifest_url;
        if let Some(timeout_seconds) = file.timeout_seconds {
            config.timeout_seconds = timeout_seconds;
        }
        config.request_headers.extend(file.headers);

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.timeout_seconds == 0 {
            return Err(ConfigError::Validation(
                "Timeout must be greater than 0".to_string(),
            ));
        }

        for path in [&self.name_path, &self.instance_path] {
            if !path.starts_with('/') {
                return Err(ConfigError::Validation(format!(
                    "Element path must start with '/': {}",
                    path
                )));
            }
        }

        for (name, value) in &self.request_headers {
            HeaderName::from_bytes(name.as_bytes()).map_err(|_| {
                ConfigError::Validation(format!("Invalid header name: {}", name))
            })?;
            HeaderValue::from_str(value).map_err(|_| {
                ConfigError::Validation(format!("Invalid value for header {}", name))
            })?;
        }

        Ok(())
    }
}

/// On-disk configuration (TOML or JSON); every field is optional
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct ConfigFile {
    pub media_pattern: Option<String>,
    pub name_path: Option<String>,
    pub instance_path: Option<String>,
    pub download_url: Option<String>,
    pub manifest_url: Option<String>,
    pub timeout_seconds: Option<u64>,
    pub headers: BTreeMap<String, String>,
}

/// Configuration manager for loading and merging configurations
pub struct ConfigManager;

impl ConfigManager {
    /// Load configuration with precedence: defaults -> file -> environment -> CLI
    pub async fn load_config(cli: &Cli) -> Result<FormListConfig> {
        let file_config = match &cli.config {
            Some(path) => Self::load_from_file(path).await?,
            None => ConfigFile::default(),
        };

        let file_config = Self::apply_environment_overrides(file_config)?;
        let file_config = Self::merge_with_cli(file_config, cli)?;

        FormListConfig::from_file_config(file_config)
    }

    /// Load configuration from a file (TOML or JSON)
    pub async fn load_from_file(path: &Path) -> Result<ConfigFile> {
        let content = tokio::fs::read_to_string(path).await?;

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Ok(toml::from_str(&content)?),
            Some("json") => Ok(serde_json::from_str(&content)?),
            Some(ext) => Err(ConfigError::UnsupportedFormat(ext.to_string())),
            None => {
                // Try to parse as TOML first, then JSON
                if let Ok(config) = toml::from_str::<ConfigFile>(&content) {
                    Ok(config)
                } else {
                    Ok(serde_json::from_str(&content)?)
                }
            }
        }
    }

    /// Apply environment variable overrides using the system environment
    pub fn apply_environment_overrides(config: ConfigFile) -> Result<ConfigFile> {
        Self::apply_environment_overrides_with(&SystemEnvProvider, config)
    }

    /// Apply environment variable overrides with a custom environment provider
    pub fn apply_environment_overrides_with(
        env: &impl EnvProvider,
        mut config: ConfigFile,
    ) -> Result<ConfigFile> {
        if let Some(download_url) = env.get("FORMLIST_DOWNLOAD_URL") {
            config.download_url = Some(download_url);
        }

        if let Some(manifest_url) = env.get("FORMLIST_MANIFEST_URL") {
            config.manifest_url = Some(manifest_url);
        }

        if let Some(timeout) = env.get("FORMLIST_TIMEOUT") {
            config.timeout_seconds = Some(timeout.parse().map_err(|_| {
                ConfigError::Environment(format!("Invalid FORMLIST_TIMEOUT value: {}", timeout))
            })?);
        }

        Ok(config)
    }

    /// Merge CLI arguments with configuration (CLI takes precedence)
    pub fn merge_with_cli(mut config: ConfigFile, cli: &Cli) -> Result<ConfigFile> {
        if let Some(download_url) = &cli.download_url {
            config.download_url = Some(download_url.clone());
        }
        if let Some(manifest_url) = &cli.manifest_url {
            config.manifest_url = Some(manifest_url.clone());
        }
        if cli.timeout.is_some() {
            config.timeout_seconds = cli.timeout;
        }

        for header in &cli.headers {
            let (name, value) = header.split_once(':').ok_or_else(|| {
                ConfigError::Validation(format!(
                    "Header must be in NAME:VALUE form: {}",
                    header
                ))
            })?;
            config
                .headers
                .insert(name.trim().to_string(), value.trim().to_string());
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::collections::HashMap;
    use std::fs;
    use tempfile::TempDir;

    /// Mock environment variable provider for testing
    #[derive(Default)]
    struct MockEnvProvider {
        vars: HashMap<String, String>,
    }

    impl MockEnvProvider {
        fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
            self.vars.insert(key.into(), value.into());
        }
    }

    impl EnvProvider for MockEnvProvider {
        fn get(&self, key: &str) -> Option<String> {
            self.vars.get(key).cloned()
        }
    }

    #[test]
    fn test_default_config() {
        let config = FormListConfig::default();

        assert_eq!(config.name_path, "/h:html/h:head/h:title");
        assert_eq!(config.instance_path, "/h:html/h:head/model/instance");
        assert_eq!(config.download_url, None);
        assert_eq!(config.manifest_url, None);
        assert_eq!(
            config.request_headers.get("User-Agent").map(String::as_str),
            Some("xform-formlist")
        );
        assert_eq!(config.timeout_seconds, DEFAULT_TIMEOUT_SECONDS);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_media_pattern() {
        let config = FormListConfig::default();

        assert!(config.media_pattern.is_match("jr://images/bird.png"));
        assert!(config.media_pattern.is_match("JR://Audio/call.mp3"));
        assert!(config.media_pattern.is_match("see jr://video/intro.mp4"));
        assert!(!config.media_pattern.is_match("jr://file/data.csv"));
        assert!(!config.media_pattern.is_match("images/bird.png"));
    }

    #[test]
    fn test_fill_form_id() {
        assert_eq!(
            fill_form_id("https://example.com/formXml?formId=${formId}", "birds"),
            "https://example.com/formXml?formId=birds"
        );
        assert_eq!(
            fill_form_id("https://example.com/${ formId }.xml", "widgets"),
            "https://example.com/widgets.xml"
        );
        // Only the first placeholder is substituted
        assert_eq!(
            fill_form_id("/${formId}/${formId}", "a"),
            "/a/${formId}"
        );
        // Replacement text is taken literally
        assert_eq!(fill_form_id("/${formId}", "$1"), "/$1");
        assert_eq!(fill_form_id("/static.xml", "a"), "/static.xml");
    }

    #[tokio::test]
    async fn test_load_toml_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("formlist.toml");

        let toml_content = r#"
download_url = "https://example.com/forms/${formId}.xml"
manifest_url = "https://example.com/manifests/${formId}"
timeout_seconds = 10

[headers]
Authorization = "Bearer token"
"#;
        fs::write(&config_path, toml_content).unwrap();

        let file_config = ConfigManager::load_from_file(&config_path).await.unwrap();
        assert_eq!(file_config.timeout_seconds, Some(10));
        assert_eq!(file_config.media_pattern, None);

        let config = FormListConfig::from_file_config(file_config).unwrap();
        assert_eq!(
            config.download_url.as_deref(),
            Some("https://example.com/forms/${formId}.xml")
        );
        assert_eq!(
            config.manifest_url.as_deref(),
            Some("https://example.com/manifests/${formId}")
        );
        assert_eq!(config.timeout_seconds, 10);
        assert_eq!(
            config.request_headers.get("Authorization").map(String::as_str),
            Some("Bearer token")
        );
        // Defaults survive alongside file headers
        assert!(config.request_headers.contains_key("User-Agent"));
    }

    #[tokio::test]
    async fn test_load_json_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("formlist.json");

        let json_content = r#"{
    "media_pattern": "jr://images",
    "name_path": "/html/head/title",
    "instance_path": "/html/head/model/instance"
}"#;
        fs::write(&config_path, json_content).unwrap();

        let file_config = ConfigManager::load_from_file(&config_path).await.unwrap();
        let config = FormListConfig::from_file_config(file_config).unwrap();

        assert_eq!(config.name_path, "/html/head/title");
        assert_eq!(config.instance_path, "/html/head/model/instance");
        assert!(config.media_pattern.is_match("jr://images/a.png"));
        assert!(!config.media_pattern.is_match("jr://audio/a.mp3"));
    }

    #[tokio::test]
    async fn test_unsupported_file_format() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("formlist.yaml");
        fs::write(&config_path, "download_url: x").unwrap();

        let result = ConfigManager::load_from_file(&config_path).await;
        assert!(matches!(result, Err(ConfigError::UnsupportedFormat(_))));
    }

    #[tokio::test]
    async fn test_invalid_toml() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("formlist.toml");
        fs::write(&config_path, "timeout_seconds = \"soon\"").unwrap();

        let result = ConfigManager::load_from_file(&config_path).await;
        assert!(matches!(result, Err(ConfigError::TomlParsing(_))));
    }

    #[test]
    fn test_invalid_media_pattern() {
        let file_config = ConfigFile {
            media_pattern: Some("jr://(images".to_string()),
            ..Default::default()
        };

        let result = FormListConfig::from_file_config(file_config);
        assert!(matches!(result, Err(ConfigError::MediaPattern(_))));
    }

    #[test]
    fn test_environment_overrides() {
        let mut mock_env = MockEnvProvider::default();
        mock_env.set("FORMLIST_DOWNLOAD_URL", "https://env.example.com/${formId}");
        mock_env.set("FORMLIST_TIMEOUT", "5");

        let config =
            ConfigManager::apply_environment_overrides_with(&mock_env, ConfigFile::default())
                .unwrap();

        assert_eq!(
            config.download_url.as_deref(),
            Some("https://env.example.com/${formId}")
        );
        assert_eq!(config.manifest_url, None);
        assert_eq!(config.timeout_seconds, Some(5));
    }

    #[test]
    fn test_invalid_environment_values() {
        let mut mock_env = MockEnvProvider::default();
        mock_env.set("FORMLIST_TIMEOUT", "never");

        let result =
            ConfigManager::apply_environment_overrides_with(&mock_env, ConfigFile::default());
        assert!(matches!(result, Err(ConfigError::Environment(_))));
    }

    #[test]
    fn test_merge_with_cli() {
        let cli = Cli::try_parse_from([
            "xform-formlist",
            "--download-url",
            "https://cli.example.com/${formId}",
            "--timeout",
            "12",
            "-H",
            "Authorization: Basic abc",
            "form.xml",
        ])
        .unwrap();

        let file_config = ConfigFile {
            download_url: Some("https://file.example.com/${formId}".to_string()),
            manifest_url: Some("https://file.example.com/manifest/${formId}".to_string()),
            ..Default::default()
        };

        let merged = ConfigManager::merge_with_cli(file_config, &cli).unwrap();
        assert_eq!(
            merged.download_url.as_deref(),
            Some("https://cli.example.com/${formId}")
        );
        assert_eq!(
            merged.manifest_url.as_deref(),
            Some("https://file.example.com/manifest/${formId}")
        );
        assert_eq!(merged.timeout_seconds, Some(12));
        assert_eq!(
            merged.headers.get("Authorization").map(String::as_str),
            Some("Basic abc")
        );
    }

    #[test]
    fn test_merge_with_cli_rejects_bad_header() {
        let cli = Cli::try_parse_from(["xform-formlist", "-H", "NoColonHere", "form.xml"]).unwrap();

        let result = ConfigManager::merge_with_cli(ConfigFile::default(), &cli);
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_config_validation() {
        let mut config = FormListConfig::default();
        config.timeout_seconds = 0;
        assert!(config.validate().is_err());

        let config = FormListConfig::default().with_header("Bad Header", "x");
        assert!(config.validate().is_err());

        let mut config = FormListConfig::default();
        config.name_path = "h:html/h:head/h:title".to_string();
        assert!(config.validate().is_err());

        let config = FormListConfig::default()
            .with_header("Accept", "application/xml")
            .with_download_url("https://example.com/${formId}");
        assert!(config.validate().is_ok());
    }
}
