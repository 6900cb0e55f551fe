//! # Configuration System
//!
//! Configuration for the Faultline error tracker.
//!
//! This crate provides:
//! - Configuration structures for tracking, capture, channels and storage
//! - Environment variable loading (12-factor app principles)
//! - Configuration file loading (TOML/YAML)
//! - Configuration precedence (overrides > env > file > defaults)
//! - Configuration validation
//!
//! # Best Practices
//!
//! - Uses `validator` crate for input validation
//! - Follows 12-factor app configuration principles
//! - Provides clear error messages for invalid configuration

pub mod config;
pub mod file_loader;
pub mod loader;
pub mod precedence;
pub mod validation;

pub use config::{
    CaptureConfig, Config, GithubConfig, HttpConfig, NotifierConfig, NotifyPolicy,
    ObservabilityConfig, ResendConfig, SerializerConfig, SlackConfig, StorageConfig,
    TelegramConfig, TrackingConfig, WebhookConfig
};
pub use file_loader::{ConfigFileError, load_from_file, load_from_toml, load_from_yaml};
pub use loader::load_from_env;
pub use precedence::merge_configs;
pub use validation::validate;
pub use validator::Validate;
