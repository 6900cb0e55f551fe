//! Core types, traits and the capture pipeline for Faultline.
//!
//! Everything that runs on the failing request's own path lives here: the
//! capture scope, exception description, fingerprinting and redaction. The
//! crate performs no I/O; persistence goes through [`traits::ErrorStore`].

pub mod capture;
pub mod exception;
pub mod fingerprint;
pub mod serializer;
pub mod traits;
pub mod types;

pub use capture::{
    CapturePolicy, CaptureScope, CapturedFrame, PanicSite, ScopeGuard, in_scope, install_panic_hook
};
pub use exception::{ExceptionInfo, Reportable, SourceLocation};
pub use fingerprint::{GroupKey, fingerprint, sanitize_message};
pub use serializer::{Variable, VariableSerializer};
pub use traits::ErrorStore;
pub use types::*;
