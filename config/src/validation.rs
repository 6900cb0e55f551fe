//! # Configuration Validation
//!
//! Field-level rules live on the structures via the `validator` derive; this
//! module adds the cross-field checks a single attribute cannot express.

use crate::config::Config;
use validator::{Validate, ValidationError, ValidationErrors};

/// Validate configuration structure.
///
/// # M-CANONICAL-DOCS
///
/// ## Purpose
/// Runs every `#[validate]` rule on the configuration tree, then the
/// cross-field rules below.
///
/// ## Usage
/// ```rust,no_run
/// use config::{Config, validate};
///
/// let config = Config::default();
/// match validate(&config) {
///     Ok(()) => println!("Configuration is valid"),
///     Err(errors) => println!("Validation errors: {:?}", errors),
/// }
/// ```
///
/// ## Validation Rules
/// ### Tracking
/// - `app_name`: 1-255 characters
/// - `ignored_user_agents`: every entry must compile as a regex
/// - `reopen_window_seconds`: 1 second to 30 days
///
/// ### Serializer
/// - `max_string_length`: 64-100000
/// - `max_depth`: 1-64
///
/// ### Notifiers
/// - required credentials present for each channel
/// - webhook `method` is POST or PUT
///
/// ### GitHub
/// - `repo` and `token` are set together or not at all
///
/// ### Storage
/// - `backend`: "memory" or "postgres"; "postgres" needs `database_url`
pub fn validate(config: &Config) -> Result<(), ValidationErrors> {
    let mut errors = match config.validate() {
        Ok(()) => ValidationErrors::new(),
        Err(errors) => errors
    };

    if config.storage.backend == "postgres"
        && config
            .storage
            .database_url
            .as_deref()
            .is_none_or(str::is_empty)
    {
        let mut err = ValidationError::new("missing_database_url");
        err.message = Some("storage.backend = postgres requires database_url".into());
        errors.add("storage", err);
    }

    if config.github.repo.is_some() != config.github.token.is_some() {
        let mut err = ValidationError::new("incomplete_github");
        err.message = Some("github.repo and github.token must be set together".into());
        errors.add("github", err);
    }

    if errors.errors().is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
