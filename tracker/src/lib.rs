//! # Faultline Tracker
//!
//! Turns failures into persisted, grouped occurrences and alerts.
//!
//! - [`Tracker`]: the tracking pipeline
//! - [`Interceptor`] and [`faultline_middleware`]: interception boundaries
//!   for arbitrary async work and axum routers
//! - [`ErrorReporter`]: explicit reporting of handled errors
//!
//! [`init`] wires storage, notification channels and the issue creator from
//! a [`Config`].

pub mod boundary;
pub mod context;
pub mod ignore;
pub mod middleware;
pub mod reporter;
pub mod tracker;

use config::Config;
use errors::TrackingError;
use notifiers::{GithubIssueCreator, NotifierDispatch};
use std::sync::Arc;

pub use boundary::Interceptor;
pub use context::{ContextProvider, ExtensionUser, UserExtractor};
pub use ignore::IgnorePolicy;
pub use middleware::{ReportedError, capture_scope, faultline_middleware, request_info};
pub use reporter::{ErrorReporter, ReportOptions, Severity};
pub use tracker::{AfterTrack, BeforeTrack, Tracker};

/// Build a tracker from configuration. The configuration is validated
/// before any component is built.
pub async fn init(config: &Config) -> Result<Arc<Tracker>, TrackingError> {
    config::validate(config).map_err(|e| TrackingError::Initialization {
        component: "config".to_string(),
        reason: e.to_string()
    })?;

    let store = storage::connect(&config.storage)
        .await
        .map_err(|e| TrackingError::Initialization {
            component: "storage".to_string(),
            reason: e.to_string()
        })?;

    let dispatch = NotifierDispatch::from_config(&config.notifiers, &config.http).map_err(|e| {
        TrackingError::Initialization {
            component: "notifiers".to_string(),
            reason: e.to_string()
        }
    })?;

    let mut tracker = Tracker::new(store, config, dispatch);
    if config.github.is_configured() {
        let creator = GithubIssueCreator::new(config.github.clone(), &config.http)
            .map_err(|e| TrackingError::Initialization {
                component: "github".to_string(),
                reason: e.to_string()
            })?
            .with_dashboard_url(config.tracking.dashboard_url.clone());
        tracker = tracker.with_issue_creator(creator);
    }

    tracing::info!(
        app = %config.tracking.app_name,
        environment = %config.tracking.environment,
        channels = ?tracker.dispatch().names(),
        enabled = config.tracking.enabled,
        "Faultline tracker initialized"
    );
    Ok(Arc::new(tracker))
}
