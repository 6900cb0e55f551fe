//! # Configuration File Loading
//!
//! Loads configuration from TOML or YAML files.
//!
//! Supports automatic format detection based on file extension.

use crate::config::Config;
use std::path::Path;

/// Configuration file loading error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigFileError {
    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    TomlParse(String),

    #[error("Failed to parse YAML: {0}")]
    YamlParse(String),

    #[error("Config file has no extension")]
    NoExtension,

    #[error("Unsupported config file format: {0}")]
    UnsupportedFormat(String),
}

/// Load configuration from TOML file.
///
/// # M-CANONICAL-DOCS
///
/// ## Purpose
/// Loads complete configuration from a TOML format file.
///
/// ## Usage
/// ```rust,no_run
/// use config::load_from_toml;
/// use std::path::Path;
///
/// fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = load_from_toml(Path::new("config.toml"))?;
///     println!("App: {}", config.tracking.app_name);
///     Ok(())
/// }
/// ```
///
/// ## Error Handling
/// Returns `ConfigFileError` for:
/// - File not found
/// - Invalid TOML syntax
/// - Missing required fields
pub fn load_from_toml(path: &Path) -> Result<Config, ConfigFileError> {
    let contents = std::fs::read_to_string(path)
        .map_err(|_e| ConfigFileError::FileNotFound(path.display().to_string()))?;

    let config: Config =
        toml::from_str(&contents).map_err(|e| ConfigFileError::TomlParse(e.to_string()))?;

    Ok(config)
}

/// Load configuration from YAML file.
///
/// # M-CANONICAL-DOCS
///
/// ## Purpose
/// Loads complete configuration from a YAML format file.
///
/// ## Usage
/// ```rust,no_run
/// use config::load_from_yaml;
/// use std::path::Path;
///
/// fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = load_from_yaml(Path::new("config.yaml"))?;
///     println!("App: {}", config.tracking.app_name);
///     Ok(())
/// }
/// ```
///
/// ## Error Handling
/// Returns `ConfigFileError` for:
/// - File not found
/// - Invalid YAML syntax
/// - Missing required fields
pub fn load_from_yaml(path: &Path) -> Result<Config, ConfigFileError> {
    let contents = std::fs::read_to_string(path)
        .map_err(|_e| ConfigFileError::FileNotFound(path.display().to_string()))?;

    let config: Config =
        serde_yaml::from_str(&contents).map_err(|e| ConfigFileError::YamlParse(e.to_string()))?;

    Ok(config)
}

/// Load configuration from file with auto-detection.
///
/// # M-CANONICAL-DOCS
///
/// ## Purpose
/// Loads configuration from file, automatically detecting format from extension.
///
/// ## Supported Formats
/// - `.toml`: TOML format
/// - `.yaml`: YAML format
/// - `.yml`: YAML format
///
/// ## Usage
/// ```rust,no_run
/// use config::load_from_file;
/// use std::path::Path;
///
/// fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = load_from_file(Path::new("config.yaml"))?;
///     Ok(())
/// }
/// ```
///
/// ## Error Handling
/// Returns `ConfigFileError` for:
/// - File not found
/// - Invalid file extension
/// - Parse errors for detected format
pub fn load_from_file(path: &Path) -> Result<Config, ConfigFileError> {
    let extension = path
        .extension()
        .and_then(|s| s.to_str())
        .ok_or(ConfigFileError::NoExtension)?;

    match extension.to_lowercase().as_str() {
        "toml" => load_from_toml(path),
        "yaml" | "yml" => load_from_yaml(path),
        other => Err(ConfigFileError::UnsupportedFormat(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NotifierConfig;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_load_from_toml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("faultline.toml");

        let toml_content = r##"
[tracking]
app_name = "shop"
environment = "production"
ignored_exceptions = ["NotFound"]
reopen_window_seconds = 900

[serializer]
max_string_length = 200

[[notifiers]]
type = "slack"
webhook_url = "https://hooks.slack.com/services/T/B/X"
channel = "#errors"

[[notifiers]]
type = "webhook"
url = "https://example.com/hook"
method = "PUT"
notify_policy = "new_and_reopened"

[github]
repo = "acme/shop"
token = "ghp_xxx"
labels = ["bug"]

[observability]
logging_level = "debug"
"##;
        fs::write(&path, toml_content).unwrap();

        let config = load_from_toml(&path).unwrap();
        assert_eq!(config.tracking.app_name, "shop");
        assert_eq!(config.tracking.environment, "production");
        assert_eq!(config.tracking.reopen_window_seconds, 900);
        assert_eq!(config.serializer.max_string_length, 200);
        assert_eq!(config.serializer.max_depth, 10);
        assert_eq!(config.notifiers.len(), 2);
        match &config.notifiers[1] {
            NotifierConfig::Webhook(webhook) => assert_eq!(webhook.method, "PUT"),
            other => panic!("unexpected notifier: {other:?}")
        }
        assert!(config.github.is_configured());
        assert_eq!(config.observability.logging_level, "debug");
    }

    #[test]
    fn test_load_from_yaml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("faultline.yaml");

        let yaml_content = r#"
tracking:
  app_name: shop
  ignore_paths: ["/health"]
notifiers:
  - type: telegram
    bot_token: "123:abc"
    chat_id: "-100"
  - type: resend
    api_key: re_xxx
    from: errors@example.com
    to: ops@example.com
storage:
  backend: postgres
  database_url: postgres://localhost/faultline
"#;
        fs::write(&path, yaml_content).unwrap();

        let config = load_from_yaml(&path).unwrap();
        assert_eq!(config.tracking.app_name, "shop");
        assert_eq!(config.tracking.ignore_paths, vec!["/health".to_string()]);
        assert_eq!(config.notifiers[0].kind(), "telegram");
        match &config.notifiers[1] {
            NotifierConfig::Resend(resend) => {
                assert_eq!(resend.to, vec!["ops@example.com".to_string()]);
            }
            other => panic!("unexpected notifier: {other:?}")
        }
        assert_eq!(config.storage.backend, "postgres");
    }

    #[test]
    fn test_load_from_file_unsupported() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("faultline.json");
        fs::write(&path, "{}").unwrap();

        let result = load_from_file(&path);
        assert!(matches!(result, Err(ConfigFileError::UnsupportedFormat(_))));
    }

    #[test]
    fn test_load_from_file_no_extension() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("faultline");
        fs::write(&path, "").unwrap();

        let result = load_from_file(&path);
        assert!(matches!(result, Err(ConfigFileError::NoExtension)));
    }

    #[test]
    fn test_load_from_file_auto_detect_yml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("faultline.yml");
        fs::write(&path, "tracking:\n  environment: staging\n").unwrap();

        let config = load_from_file(&path).unwrap();
        assert_eq!(config.tracking.environment, "staging");
        assert_eq!(config.tracking.app_name, "app");
    }

    #[test]
    fn test_unknown_notifier_type_is_parse_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("faultline.toml");
        fs::write(&path, "[[notifiers]]\ntype = \"pager\"\n").unwrap();

        let result = load_from_toml(&path);
        assert!(matches!(result, Err(ConfigFileError::TomlParse(_))));
    }

    #[test]
    fn test_load_from_yaml_invalid() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("faultline.yaml");
        fs::write(&path, "invalid: [unmatched\n").unwrap();

        let result = load_from_yaml(&path);
        assert!(matches!(result, Err(ConfigFileError::YamlParse(_))));
    }

    #[test]
    fn test_load_from_toml_not_found() {
        let path = Path::new("/nonexistent/path/faultline.toml");
        let result = load_from_toml(path);
        assert!(matches!(result, Err(ConfigFileError::FileNotFound(_))));
    }
}
