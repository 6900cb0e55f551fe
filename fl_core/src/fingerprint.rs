//! # Fingerprinting
//!
//! Deterministic grouping key for failures.
//!
//! Two failures share a fingerprint when their class, sanitized message,
//! file path and line number are all equal. Sanitizing replaces identifiers
//! and numbers so that `"User 12345 not found"` and `"User 678 not found"`
//! land in the same group.

use crate::capture::{CapturePolicy, CapturedFrame, function_path};
use crate::exception::{ExceptionInfo, parse_frame};
use crate::types::NewErrorGroup;
use chrono::{DateTime, Utc};

/// Messages are cut to this many characters before hashing.
pub const MAX_MESSAGE_LENGTH: usize = 1000;

/// Replace identifiers with `ID` and digit runs with `N`.
pub fn sanitize_message(message: &str) -> String {
    let mut out = utils::take_chars(message, MAX_MESSAGE_LENGTH);
    out = replace_uuid_like(&out);
    out = replace_hex_like(&out);
    replace_numbers(&out)
}

fn replace_uuid_like(input: &str) -> String {
    let re =
        regex::Regex::new(r"(?i)\b[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}\b");
    match re {
        Ok(re) => re.replace_all(input, "ID").to_string(),
        Err(_) => input.to_string()
    }
}

/// Long hex runs count as identifiers only when they contain a digit.
fn replace_hex_like(input: &str) -> String {
    let re = regex::Regex::new(r"(?i)\b[0-9a-f]{24,}\b");
    match re {
        Ok(re) => re
            .replace_all(input, |caps: &regex::Captures<'_>| {
                let token = &caps[0];
                if token.bytes().any(|b| b.is_ascii_digit()) {
                    "ID".to_string()
                } else {
                    token.to_string()
                }
            })
            .to_string(),
        Err(_) => input.to_string()
    }
}

fn replace_numbers(input: &str) -> String {
    let re = regex::Regex::new(r"\d+");
    match re {
        Ok(re) => re.replace_all(input, "N").to_string(),
        Err(_) => input.to_string()
    }
}

/// SHA-256 hex over class, sanitized message, path and line.
pub fn fingerprint(
    exception_class: &str,
    message: &str,
    file_path: Option<&str>,
    line_number: Option<u32>
) -> String {
    let sanitized = sanitize_message(message);
    let line = line_number.map(|l| l.to_string()).unwrap_or_default();
    utils::compute_parts_hash(&[
        exception_class,
        &sanitized,
        file_path.unwrap_or_default(),
        &line
    ])
}

/// Everything needed to find or create the group for a failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupKey {
    pub fingerprint: String,
    pub exception_class: String,
    pub sanitized_message: String,
    pub file_path: Option<String>,
    pub line_number: Option<u32>,
    pub method_name: Option<String>
}

impl GroupKey {
    /// Derive the key, locating the failure at the captured call site, else
    /// the exception's own location, else the first application frame of
    /// its backtrace.
    pub fn from_exception(
        exception: &ExceptionInfo,
        captured: Option<&CapturedFrame>,
        policy: &CapturePolicy
    ) -> Self {
        let (file_path, line_number, method_name) = if let Some(frame) = captured {
            (
                Some(frame.file_path.clone()),
                Some(frame.line_number),
                frame.method_name.clone()
            )
        } else if let Some(location) = exception
            .location
            .as_ref()
            .filter(|l| policy.is_app_path(&l.file))
        {
            (Some(location.file.clone()), Some(location.line), None)
        } else {
            exception
                .backtrace
                .iter()
                .filter_map(|frame| parse_frame(frame))
                .find(|(path, _, method)| policy.is_app_frame(path, method))
                .map_or((None, None, None), |(path, line, method)| {
                    (
                        Some(path.to_string()),
                        Some(line),
                        Some(function_path(method).to_string())
                    )
                })
        };

        let sanitized_message = sanitize_message(&exception.message);
        let fingerprint = fingerprint(
            &exception.class,
            &sanitized_message,
            file_path.as_deref(),
            line_number
        );

        Self {
            fingerprint,
            exception_class: exception.class.clone(),
            sanitized_message,
            file_path,
            line_number,
            method_name
        }
    }

    pub fn to_new_group(&self, seen_at: DateTime<Utc>) -> NewErrorGroup {
        NewErrorGroup {
            fingerprint: self.fingerprint.clone(),
            exception_class: self.exception_class.clone(),
            sanitized_message: self.sanitized_message.clone(),
            file_path: self.file_path.clone(),
            line_number: self.line_number.and_then(|l| i32::try_from(l).ok()),
            method_name: self.method_name.clone(),
            seen_at
        }
    }
}
