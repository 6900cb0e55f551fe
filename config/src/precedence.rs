//! # Configuration Precedence
//!
//! Merges configuration from multiple sources with precedence rules.
//!
//! # Precedence Order
//! 1. Explicit overrides (highest priority)
//! 2. Environment variables
//! 3. Configuration file
//! 4. Default values (lowest priority)
//!
//! A section only overrides the one below it when it differs from the
//! default for that section, so an empty environment never clobbers a file.

use crate::config::Config;

/// Merge multiple configuration sources with precedence.
///
/// # M-CANONICAL-DOCS
///
/// ## Usage
/// ```rust,no_run
/// use config::{Config, merge_configs, load_from_file, load_from_env};
/// use std::path::Path;
///
/// fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let defaults = Config::default();
///     let from_file = load_from_file(Path::new("faultline.toml"))?;
///     let from_env = load_from_env()?;
///
///     let _config = merge_configs(defaults, from_file, "file", from_env, "env", None, "overrides");
///     Ok(())
/// }
/// ```
///
/// ## Merge Granularity
/// Sections (`tracking`, `serializer`, `github`, ...) are replaced whole.
/// `notifiers` is replaced when the overriding source configures any.
pub fn merge_configs(
    defaults: Config,
    file_config: Config,
    file_source_name: &str,
    env_config: Config,
    env_source_name: &str,
    override_config: Option<Config>,
    override_source_name: &str
) -> Config {
    let mut config = defaults;

    config = merge_with_logging(config, file_config, file_source_name);
    config = merge_with_logging(config, env_config, env_source_name);

    if let Some(overrides) = override_config {
        config = merge_with_logging(config, overrides, override_source_name);
    }

    config
}

fn merge_with_logging(mut base: Config, override_config: Config, source_name: &str) -> Config {
    let defaults = Config::default();
    let mut changes = Vec::new();

    merge_section(
        &mut base.tracking,
        override_config.tracking,
        &defaults.tracking,
        "tracking",
        &mut changes
    );
    merge_section(
        &mut base.serializer,
        override_config.serializer,
        &defaults.serializer,
        "serializer",
        &mut changes
    );
    merge_section(
        &mut base.capture,
        override_config.capture,
        &defaults.capture,
        "capture",
        &mut changes
    );
    merge_section(&mut base.http, override_config.http, &defaults.http, "http", &mut changes);
    merge_section(
        &mut base.github,
        override_config.github,
        &defaults.github,
        "github",
        &mut changes
    );
    merge_section(
        &mut base.storage,
        override_config.storage,
        &defaults.storage,
        "storage",
        &mut changes
    );
    merge_section(
        &mut base.observability,
        override_config.observability,
        &defaults.observability,
        "observability",
        &mut changes
    );

    if !override_config.notifiers.is_empty() {
        changes.push(format!("notifiers ({})", override_config.notifiers.len()));
        base.notifiers = override_config.notifiers;
    }

    if !changes.is_empty() {
        tracing::info!("Configuration from {}: {:?}", source_name, changes);
    }

    base
}

fn merge_section<T: PartialEq>(
    base: &mut T,
    candidate: T,
    default: &T,
    name: &str,
    changes: &mut Vec<String>
) {
    if candidate != *default && candidate != *base {
        *base = candidate;
        changes.push(name.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{NotifierConfig, WebhookConfig};

    #[test]
    fn test_env_overrides_file() {
        let mut file = Config::default();
        file.tracking.app_name = "from-file".to_string();
        file.serializer.max_depth = 5;

        let mut env = Config::default();
        env.tracking.app_name = "from-env".to_string();

        let merged = merge_configs(Config::default(), file, "file", env, "env", None, "overrides");
        assert_eq!(merged.tracking.app_name, "from-env");
        assert_eq!(merged.serializer.max_depth, 5);
    }

    #[test]
    fn test_default_env_keeps_file_values() {
        let mut file = Config::default();
        file.storage.backend = "postgres".to_string();
        file.storage.database_url = Some("postgres://db/faultline".to_string());
        file.notifiers = vec![NotifierConfig::Webhook(WebhookConfig::new(
            "https://example.com/hook"
        ))];

        let merged = merge_configs(
            Config::default(),
            file,
            "file",
            Config::default(),
            "env",
            None,
            "overrides"
        );
        assert_eq!(merged.storage.backend, "postgres");
        assert_eq!(merged.notifiers.len(), 1);
    }

    #[test]
    fn test_overrides_win() {
        let mut env = Config::default();
        env.observability.logging_level = "warn".to_string();

        let mut overrides = Config::default();
        overrides.observability.logging_level = "debug".to_string();

        let merged = merge_configs(
            Config::default(),
            Config::default(),
            "file",
            env,
            "env",
            Some(overrides),
            "overrides"
        );
        assert_eq!(merged.observability.logging_level, "debug");
    }
}
