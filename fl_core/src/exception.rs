//! Description of a failure independent of how it was raised.

use crate::capture::PanicSite;
use std::any::Any;
use std::backtrace::Backtrace;
use std::error::Error;
use std::panic::Location;

/// Source position attached to an exception by its creator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation {
    pub file: String,
    pub line: u32
}

impl From<&Location<'_>> for SourceLocation {
    fn from(location: &Location<'_>) -> Self {
        Self {
            file: location.file().to_string(),
            line: location.line()
        }
    }
}

/// Class, message and backtrace of one failure.
#[derive(Debug, Clone, PartialEq)]
pub struct ExceptionInfo {
    pub class: String,
    pub message: String,
    /// Frames rendered as ``path:line:in `function` ``.
    pub backtrace: Vec<String>,
    pub location: Option<SourceLocation>
}

impl ExceptionInfo {
    /// Build from explicit parts, recording the caller as location.
    #[track_caller]
    pub fn new(class: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            message: message.into(),
            backtrace: capture_backtrace(),
            location: Some(Location::caller().into())
        }
    }

    /// Build from a typed error. The class is the error's type path.
    pub fn from_error<E: Error + 'static>(error: &E) -> Self {
        Self {
            class: std::any::type_name::<E>().to_string(),
            message: error.to_string(),
            backtrace: capture_backtrace(),
            location: None
        }
    }

    /// Build from a caught panic payload.
    pub fn from_panic(payload: &(dyn Any + Send)) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "Box<dyn Any>".to_string()
        };
        Self {
            class: "panic".to_string(),
            message,
            backtrace: capture_backtrace(),
            location: None
        }
    }

    /// Locate a panic at the site the panic hook recorded.
    pub fn with_panic_site(mut self, site: Option<PanicSite>) -> Self {
        if let Some(site) = site {
            self.location = Some(site.location);
            if !site.backtrace.is_empty() {
                self.backtrace = site.backtrace;
            }
        }
        self
    }

    pub fn with_backtrace(mut self, backtrace: Vec<String>) -> Self {
        self.backtrace = backtrace;
        self
    }

    pub fn with_location(mut self, file: impl Into<String>, line: u32) -> Self {
        self.location = Some(SourceLocation {
            file: file.into(),
            line
        });
        self
    }
}

/// Errors the interception boundary and reporter know how to describe.
pub trait Reportable {
    fn to_exception(&self) -> ExceptionInfo;
}

impl Reportable for ExceptionInfo {
    fn to_exception(&self) -> ExceptionInfo {
        self.clone()
    }
}

impl Reportable for anyhow::Error {
    fn to_exception(&self) -> ExceptionInfo {
        ExceptionInfo {
            class: "anyhow::Error".to_string(),
            message: format!("{self:#}"),
            backtrace: parse_backtrace(&self.backtrace().to_string()),
            location: None
        }
        .with_fallback_backtrace()
    }
}

impl Reportable for Box<dyn Error + Send + Sync> {
    fn to_exception(&self) -> ExceptionInfo {
        ExceptionInfo {
            class: "Box<dyn Error>".to_string(),
            message: self.to_string(),
            backtrace: capture_backtrace(),
            location: None
        }
    }
}

impl ExceptionInfo {
    fn with_fallback_backtrace(mut self) -> Self {
        if self.backtrace.is_empty() {
            self.backtrace = capture_backtrace();
        }
        self
    }
}

/// Implement [`Reportable`] for error types via
/// [`ExceptionInfo::from_error`].
#[macro_export]
macro_rules! impl_reportable {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl $crate::exception::Reportable for $ty {
                fn to_exception(&self) -> $crate::exception::ExceptionInfo {
                    $crate::exception::ExceptionInfo::from_error(self)
                }
            }
        )+
    };
}

/// Capture the current stack as frame strings, starting at the caller.
pub fn capture_backtrace() -> Vec<String> {
    let mut frames = parse_backtrace(&Backtrace::force_capture().to_string());
    if let Some(own) = frames.iter().position(|f| f.contains("capture_backtrace`")) {
        frames.drain(..=own);
    }
    frames
}

/// Parse the `Display` form of [`std::backtrace::Backtrace`].
///
/// Frames without a resolved source position are kept with a `<unknown>`
/// path so they never count as application code.
pub fn parse_backtrace(rendered: &str) -> Vec<String> {
    let mut frames = Vec::new();
    let mut pending: Option<String> = None;

    for line in rendered.lines() {
        let trimmed = line.trim();
        if let Some(position) = trimmed.strip_prefix("at ") {
            if let Some(function) = pending.take() {
                let (path, line_no) = split_position(position);
                frames.push(format!("{path}:{line_no}:in `{function}`"));
            }
            continue;
        }
        if let Some((index, function)) = trimmed.split_once(": ") {
            if index.is_empty() || !index.chars().all(|c| c.is_ascii_digit()) {
                continue;
            }
            if let Some(previous) = pending.replace(function.to_string()) {
                frames.push(format!("<unknown>:0:in `{previous}`"));
            }
        }
    }
    if let Some(previous) = pending {
        frames.push(format!("<unknown>:0:in `{previous}`"));
    }
    frames
}

fn split_position(position: &str) -> (&str, u32) {
    // path:line:column
    let mut parts = position.rsplitn(3, ':');
    let _column = parts.next();
    let line = parts.next().and_then(|l| l.parse().ok());
    match (parts.next(), line) {
        (Some(path), Some(line)) => (path, line),
        _ => (position, 0)
    }
}

/// Split a frame string into path, line and function.
pub fn parse_frame(frame: &str) -> Option<(&str, u32, &str)> {
    let (position, method) = frame.rsplit_once(":in `")?;
    let method = method.strip_suffix('`')?;
    let (path, line) = position.rsplit_once(':')?;
    let line = line.parse().ok()?;
    if path.is_empty() {
        return None;
    }
    Some((path, line, method))
}
