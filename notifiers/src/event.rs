//! The unit of work handed to every channel.

use chrono::{DateTime, Utc};
use fl_core::types::{ErrorGroup, ErrorOccurrence, ErrorStatus};

pub const EMOJI_NEW: &str = "\u{1F6A8}";
pub const EMOJI_REOPENED: &str = "\u{1F504}";
pub const EMOJI_REPEAT: &str = "\u{26A0}\u{FE0F}";

const SUMMARY_MESSAGE_LENGTH: usize = 200;

/// A tracked occurrence together with the group state after recording it.
#[derive(Debug, Clone)]
pub struct ErrorEvent {
    pub group: ErrorGroup,
    pub occurrence: ErrorOccurrence,
    /// Group reopened within the configured window.
    pub recently_reopened: bool,
    /// This very occurrence moved the group from resolved to unresolved.
    pub reopened: bool,
    pub app_name: String,
    pub environment: String,
    pub dashboard_url: Option<String>
}

impl ErrorEvent {
    /// Link to the group in the dashboard, when a dashboard is configured.
    pub fn group_url(&self) -> Option<String> {
        self.dashboard_url.as_deref().map(|base| {
            format!("{}/error_groups/{}", base.trim_end_matches('/'), self.group.id)
        })
    }

    pub fn summary(&self) -> AlertSummary {
        AlertSummary::from_event(self)
    }
}

/// Channel-neutral rendering of an event.
#[derive(Debug, Clone, PartialEq)]
pub struct AlertSummary {
    pub emoji: &'static str,
    pub title: String,
    pub exception_class: String,
    pub message: String,
    pub occurrences: i64,
    pub status: ErrorStatus,
    pub location: String,
    pub url: Option<String>,
    pub method: Option<String>,
    pub user: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub reopened: bool
}

impl AlertSummary {
    pub fn from_event(event: &ErrorEvent) -> Self {
        let emoji = status_emoji(&event.group, event.recently_reopened);
        Self {
            emoji,
            title: format!("{} Error in {}", emoji, event.app_name),
            exception_class: event.group.exception_class.clone(),
            message: utils::truncate_with_ellipsis(
                &event.group.sanitized_message,
                SUMMARY_MESSAGE_LENGTH
            ),
            occurrences: event.group.occurrences_count,
            status: event.group.status,
            location: format_location(&event.group),
            url: event.occurrence.request_url.clone(),
            method: event.occurrence.request_method.clone(),
            user: event.occurrence.user_identifier.clone(),
            timestamp: event.occurrence.created_at,
            reopened: event.recently_reopened
        }
    }

    /// `METHOD url` when the occurrence came from a request.
    pub fn request_line(&self) -> Option<String> {
        self.url.as_deref().map(|url| match self.method.as_deref() {
            Some(method) => format!("{method} {url}"),
            None => url.to_string()
        })
    }
}

pub fn status_emoji(group: &ErrorGroup, recently_reopened: bool) -> &'static str {
    if recently_reopened {
        EMOJI_REOPENED
    } else if group.is_first_occurrence() {
        EMOJI_NEW
    } else {
        EMOJI_REPEAT
    }
}

/// `file:line`, or `unknown` when the group has no file.
pub fn format_location(group: &ErrorGroup) -> String {
    group.location().unwrap_or_else(|| "unknown".to_string())
}
