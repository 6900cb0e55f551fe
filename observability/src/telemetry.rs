use metrics::{counter, histogram};
use std::time::Instant;

/// Why an occurrence was not tracked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    Disabled,
    ExceptionClass,
    Path,
    UserAgent,
    BeforeTrack
}

impl IgnoreReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disabled => "disabled",
            Self::ExceptionClass => "exception_class",
            Self::Path => "path",
            Self::UserAgent => "user_agent",
            Self::BeforeTrack => "before_track"
        }
    }
}

/// Result of handing one event to one channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    Delivered,
    Skipped,
    Failed
}

impl DispatchOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Delivered => "delivered",
            Self::Skipped => "skipped",
            Self::Failed => "failed"
        }
    }
}

pub struct Telemetry;

impl Telemetry {
    pub fn record_occurrence(exception_class: &str) {
        counter!("faultline_occurrences_total", "exception_class" => exception_class.to_string())
            .increment(1);
    }

    pub fn record_ignored(reason: IgnoreReason) {
        counter!("faultline_ignored_total", "reason" => reason.as_str()).increment(1);
    }

    pub fn record_notification(channel: &str, outcome: DispatchOutcome) {
        counter!(
            "faultline_notifications_total",
            "channel" => channel.to_string(),
            "outcome" => outcome.as_str()
        )
        .increment(1);
    }

    pub fn record_tracking_failure() {
        counter!("faultline_tracking_failures_total").increment(1);
    }

    pub fn record_track_duration(duration_ms: f64) {
        histogram!("faultline_track_duration_ms").record(duration_ms);
    }
}

/// Records `faultline_track_duration_ms` when finished.
pub struct TrackTimer {
    start: Instant
}

impl TrackTimer {
    pub fn start() -> Self {
        Self {
            start: Instant::now()
        }
    }

    pub fn finish(self) {
        let duration = self.start.elapsed().as_secs_f64() * 1000.0;
        Telemetry::record_track_duration(duration);
    }
}
