//! # Environment Variable Loader
//!
//! Loads configuration from environment variables following 12-factor app
//! principles. Every variable is prefixed with `FAULTLINE_`; list values are
//! comma separated.

use crate::config::{
    CaptureConfig, Config, GithubConfig, HttpConfig, NotifierConfig, ObservabilityConfig,
    ResendConfig, SerializerConfig, SlackConfig, StorageConfig, TelegramConfig, TrackingConfig,
    WebhookConfig
};
use std::env;

/// Load configuration from environment variables.
///
/// Unset variables fall back to the defaults; a variable that is set but
/// cannot be parsed is an error.
///
/// ## Usage
/// ```rust,no_run
/// use config::load_from_env;
///
/// fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = load_from_env()?;
///     println!("App: {}", config.tracking.app_name);
///     Ok(())
/// }
/// ```
///
/// ## Environment Variables
/// ### Tracking
/// - `FAULTLINE_ENABLED`, `FAULTLINE_APP_NAME`, `FAULTLINE_ENVIRONMENT`
/// - `FAULTLINE_IGNORED_EXCEPTIONS`, `FAULTLINE_IGNORE_PATHS`,
///   `FAULTLINE_IGNORED_USER_AGENTS`
/// - `FAULTLINE_REOPEN_WINDOW_SECONDS`, `FAULTLINE_DASHBOARD_URL`
///
/// ### Serializer / capture
/// - `FAULTLINE_SENSITIVE_KEYS`, `FAULTLINE_MAX_STRING_LENGTH`,
///   `FAULTLINE_MAX_DEPTH`
/// - `FAULTLINE_CAPTURE_ENABLED`, `FAULTLINE_APP_ROOTS`
///
/// ### HTTP
/// - `FAULTLINE_HTTP_CONNECT_TIMEOUT_SECONDS`, `FAULTLINE_HTTP_TIMEOUT_SECONDS`
///
/// ### Channels
/// - `FAULTLINE_SLACK_WEBHOOK_URL` (+ `FAULTLINE_SLACK_CHANNEL`)
/// - `FAULTLINE_TELEGRAM_BOT_TOKEN` + `FAULTLINE_TELEGRAM_CHAT_ID`
/// - `FAULTLINE_RESEND_API_KEY` + `FAULTLINE_RESEND_FROM` + `FAULTLINE_RESEND_TO`
/// - `FAULTLINE_WEBHOOK_URL` (+ `FAULTLINE_WEBHOOK_METHOD`)
///
/// ### GitHub
/// - `FAULTLINE_GITHUB_REPO`, `FAULTLINE_GITHUB_TOKEN`, `FAULTLINE_GITHUB_LABELS`
///
/// ### Storage / observability
/// - `FAULTLINE_STORAGE_BACKEND`, `FAULTLINE_DATABASE_URL`,
///   `FAULTLINE_DATABASE_POOL_SIZE`
/// - `FAULTLINE_LOG_LEVEL`, `FAULTLINE_LOG_JSON`, `FAULTLINE_METRICS_ENABLED`
pub fn load_from_env() -> Result<Config, Box<dyn std::error::Error>> {
    let config = Config {
        tracking: load_tracking_from_env()?,
        serializer: load_serializer_from_env()?,
        capture: load_capture_from_env()?,
        http: load_http_from_env()?,
        notifiers: load_notifiers_from_env(),
        github: load_github_from_env(),
        storage: load_storage_from_env()?,
        observability: load_observability_from_env()?
    };

    Ok(config)
}

fn load_tracking_from_env() -> Result<TrackingConfig, Box<dyn std::error::Error>> {
    let defaults = TrackingConfig::default();
    Ok(TrackingConfig {
        enabled: parse_env_or("FAULTLINE_ENABLED", defaults.enabled)?,
        app_name: env::var("FAULTLINE_APP_NAME").unwrap_or(defaults.app_name),
        environment: env::var("FAULTLINE_ENVIRONMENT").unwrap_or(defaults.environment),
        ignored_exceptions: list_env("FAULTLINE_IGNORED_EXCEPTIONS").unwrap_or_default(),
        ignore_paths: list_env("FAULTLINE_IGNORE_PATHS").unwrap_or_default(),
        ignored_user_agents: list_env("FAULTLINE_IGNORED_USER_AGENTS").unwrap_or_default(),
        reopen_window_seconds: parse_env_or(
            "FAULTLINE_REOPEN_WINDOW_SECONDS",
            defaults.reopen_window_seconds
        )?,
        dashboard_url: env::var("FAULTLINE_DASHBOARD_URL").ok()
    })
}

fn load_serializer_from_env() -> Result<SerializerConfig, Box<dyn std::error::Error>> {
    let defaults = SerializerConfig::default();
    Ok(SerializerConfig {
        sensitive_keys: list_env("FAULTLINE_SENSITIVE_KEYS").unwrap_or(defaults.sensitive_keys),
        max_string_length: parse_env_or("FAULTLINE_MAX_STRING_LENGTH", defaults.max_string_length)?,
        max_depth: parse_env_or("FAULTLINE_MAX_DEPTH", defaults.max_depth)?,
        max_collection_size: parse_env_or(
            "FAULTLINE_MAX_COLLECTION_SIZE",
            defaults.max_collection_size
        )?
    })
}

fn load_capture_from_env() -> Result<CaptureConfig, Box<dyn std::error::Error>> {
    let defaults = CaptureConfig::default();
    Ok(CaptureConfig {
        enabled: parse_env_or("FAULTLINE_CAPTURE_ENABLED", defaults.enabled)?,
        app_roots: list_env("FAULTLINE_APP_ROOTS").unwrap_or_default(),
        excluded_path_markers: defaults.excluded_path_markers
    })
}

fn load_http_from_env() -> Result<HttpConfig, Box<dyn std::error::Error>> {
    let defaults = HttpConfig::default();
    Ok(HttpConfig {
        connect_timeout_seconds: parse_env_or(
            "FAULTLINE_HTTP_CONNECT_TIMEOUT_SECONDS",
            defaults.connect_timeout_seconds
        )?,
        timeout_seconds: parse_env_or("FAULTLINE_HTTP_TIMEOUT_SECONDS", defaults.timeout_seconds)?,
        user_agent: defaults.user_agent
    })
}

fn load_notifiers_from_env() -> Vec<NotifierConfig> {
    let mut notifiers = Vec::new();

    if let Ok(url) = env::var("FAULTLINE_SLACK_WEBHOOK_URL") {
        let mut slack = SlackConfig::new(url);
        slack.channel = env::var("FAULTLINE_SLACK_CHANNEL").ok();
        notifiers.push(NotifierConfig::Slack(slack));
    }

    if let (Ok(token), Ok(chat_id)) = (
        env::var("FAULTLINE_TELEGRAM_BOT_TOKEN"),
        env::var("FAULTLINE_TELEGRAM_CHAT_ID")
    ) {
        notifiers.push(NotifierConfig::Telegram(TelegramConfig::new(token, chat_id)));
    }

    if let (Ok(api_key), Ok(from), Some(to)) = (
        env::var("FAULTLINE_RESEND_API_KEY"),
        env::var("FAULTLINE_RESEND_FROM"),
        list_env("FAULTLINE_RESEND_TO")
    ) {
        notifiers.push(NotifierConfig::Resend(ResendConfig::new(api_key, from, to)));
    }

    if let Ok(url) = env::var("FAULTLINE_WEBHOOK_URL") {
        let mut webhook = WebhookConfig::new(url);
        if let Ok(method) = env::var("FAULTLINE_WEBHOOK_METHOD") {
            webhook.method = method;
        }
        notifiers.push(NotifierConfig::Webhook(webhook));
    }

    notifiers
}

fn load_github_from_env() -> GithubConfig {
    let defaults = GithubConfig::default();
    GithubConfig {
        repo: env::var("FAULTLINE_GITHUB_REPO").ok(),
        token: env::var("FAULTLINE_GITHUB_TOKEN").ok(),
        labels: list_env("FAULTLINE_GITHUB_LABELS").unwrap_or_default(),
        api_base: env::var("FAULTLINE_GITHUB_API_BASE").unwrap_or(defaults.api_base),
        product_name: defaults.product_name
    }
}

fn load_storage_from_env() -> Result<StorageConfig, Box<dyn std::error::Error>> {
    let defaults = StorageConfig::default();
    let database_url = env::var("FAULTLINE_DATABASE_URL").ok();
    let backend = env::var("FAULTLINE_STORAGE_BACKEND").unwrap_or_else(|_| {
        if database_url.is_some() {
            "postgres".to_string()
        } else {
            defaults.backend.clone()
        }
    });
    Ok(StorageConfig {
        backend,
        database_url,
        pool_size: parse_env_or("FAULTLINE_DATABASE_POOL_SIZE", defaults.pool_size)?,
        timeout_seconds: parse_env_or("FAULTLINE_DATABASE_TIMEOUT_SECONDS", defaults.timeout_seconds)?
    })
}

fn load_observability_from_env() -> Result<ObservabilityConfig, Box<dyn std::error::Error>> {
    let defaults = ObservabilityConfig::default();
    Ok(ObservabilityConfig {
        logging_level: env::var("FAULTLINE_LOG_LEVEL").unwrap_or(defaults.logging_level),
        json_logs: parse_env_or("FAULTLINE_LOG_JSON", defaults.json_logs)?,
        metrics_enabled: parse_env_or("FAULTLINE_METRICS_ENABLED", defaults.metrics_enabled)?
    })
}

fn parse_env<T>(key: &str) -> Result<T, Box<dyn std::error::Error>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static
{
    match env::var(key) {
        Ok(s) => s
            .trim()
            .parse::<T>()
            .map_err(|e| format!("{key}: {e}").into()),
        Err(e) => Err(Box::new(e) as Box<dyn std::error::Error>)
    }
}

/// Parse `key` when set, fall back to `default` when unset.
fn parse_env_or<T>(key: &str, default: T) -> Result<T, Box<dyn std::error::Error>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static
{
    if env::var_os(key).is_none() {
        return Ok(default);
    }
    parse_env(key)
}

fn list_env(key: &str) -> Option<Vec<String>> {
    env::var(key).ok().map(|raw| {
        raw.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(ToString::to_string)
            .collect()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const VARS: &[&str] = &[
        "FAULTLINE_APP_NAME",
        "FAULTLINE_IGNORED_EXCEPTIONS",
        "FAULTLINE_REOPEN_WINDOW_SECONDS",
        "FAULTLINE_SLACK_WEBHOOK_URL",
        "FAULTLINE_SLACK_CHANNEL",
        "FAULTLINE_RESEND_API_KEY",
        "FAULTLINE_RESEND_FROM",
        "FAULTLINE_RESEND_TO",
        "FAULTLINE_DATABASE_URL",
        "FAULTLINE_STORAGE_BACKEND",
        "FAULTLINE_LOG_LEVEL"
    ];

    fn clear() {
        for var in VARS {
            unsafe {
                env::remove_var(var);
            }
        }
    }

    #[test]
    #[serial]
    fn test_load_from_env_defaults() {
        clear();
        let config = load_from_env().unwrap();
        assert_eq!(config.tracking.app_name, "app");
        assert_eq!(config.tracking.reopen_window_seconds, 3600);
        assert!(config.notifiers.is_empty());
        assert_eq!(config.storage.backend, "memory");
        assert_eq!(config.observability.logging_level, "info");
    }

    #[test]
    #[serial]
    fn test_load_from_env_overrides() {
        clear();
        unsafe {
            env::set_var("FAULTLINE_APP_NAME", "shop");
            env::set_var("FAULTLINE_IGNORED_EXCEPTIONS", "NotFound, RoutingError");
            env::set_var("FAULTLINE_REOPEN_WINDOW_SECONDS", "600");
            env::set_var("FAULTLINE_SLACK_WEBHOOK_URL", "https://hooks.slack.com/x");
            env::set_var("FAULTLINE_SLACK_CHANNEL", "#errors");
            env::set_var("FAULTLINE_RESEND_API_KEY", "re_xxx");
            env::set_var("FAULTLINE_RESEND_FROM", "errors@example.com");
            env::set_var("FAULTLINE_RESEND_TO", "a@example.com,b@example.com");
            env::set_var("FAULTLINE_DATABASE_URL", "postgres://localhost/faultline");
        }

        let config = load_from_env().unwrap();
        assert_eq!(config.tracking.app_name, "shop");
        assert_eq!(
            config.tracking.ignored_exceptions,
            vec!["NotFound".to_string(), "RoutingError".to_string()]
        );
        assert_eq!(config.tracking.reopen_window_seconds, 600);
        assert_eq!(config.notifiers.len(), 2);
        assert_eq!(config.notifiers[0].kind(), "slack");
        match &config.notifiers[1] {
            NotifierConfig::Resend(resend) => assert_eq!(resend.to.len(), 2),
            other => panic!("unexpected notifier: {other:?}")
        }
        assert_eq!(config.storage.backend, "postgres");

        clear();
    }

    #[test]
    #[serial]
    fn test_unparseable_value_is_error() {
        clear();
        unsafe {
            env::set_var("FAULTLINE_REOPEN_WINDOW_SECONDS", "soon");
        }
        assert!(load_from_env().is_err());
        clear();
    }

    #[test]
    fn test_parse_env_missing() {
        let result: Result<u32, _> = parse_env("FAULTLINE_NONEXISTENT_VAR");
        assert!(result.is_err());
    }
}
