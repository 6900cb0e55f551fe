//! Reporting of errors the application handled itself.

use crate::tracker::Tracker;
use errors::TrackingError;
use fl_core::capture::CapturedFrame;
use fl_core::exception::Reportable;
use fl_core::types::{ErrorOccurrence, TrackContext};
use observability::{IgnoreReason, Telemetry};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Severity {
    #[default]
    Error,
    Warning,
    Info
}

#[derive(Debug, Clone)]
pub struct ReportOptions {
    pub handled: bool,
    pub severity: Severity,
    /// Where the report came from, e.g. `"billing.worker"`.
    pub source: Option<String>,
    pub context: Option<Value>,
    pub captured: Option<CapturedFrame>
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            handled: true,
            severity: Severity::Error,
            source: None,
            context: None,
            captured: None
        }
    }
}

impl ReportOptions {
    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn with_context(mut self, context: Value) -> Self {
        self.context = Some(context);
        self
    }

    pub fn unhandled(mut self) -> Self {
        self.handled = false;
        self
    }
}

#[derive(Debug, Clone)]
pub struct ErrorReporter {
    tracker: Arc<Tracker>
}

impl ErrorReporter {
    pub fn new(tracker: Arc<Tracker>) -> Self {
        Self { tracker }
    }

    /// Track an error outside any request. Ignored classes return `Ok(None)`.
    pub async fn report(
        &self,
        error: &(impl Reportable + ?Sized),
        options: ReportOptions
    ) -> Result<Option<ErrorOccurrence>, TrackingError> {
        let exception = error.to_exception();
        if self.tracker.ignore_policy().ignores_exception(&exception.class) {
            Telemetry::record_ignored(IgnoreReason::ExceptionClass);
            return Ok(None);
        }

        let mut context = TrackContext::default()
            .with_captured(options.captured)
            .with_tag("handled", options.handled)
            .with_tag("severity", options.severity.to_string());
        if let Some(source) = options.source {
            context = context.with_tag("source", source);
        }
        if let Some(data) = options.context {
            context = context.with_custom_data(data);
        }

        self.tracker.track(&exception, context).await
    }
}
