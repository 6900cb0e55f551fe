//! # Capture Scope
//!
//! Request-scoped holder for the call site and local bindings recorded at the
//! point of failure.
//!
//! Application code records locals with [`capture_locals!`](crate::capture_locals)
//! while the scope is armed. The interception boundary arms a fresh scope per
//! request, reads the capture after a failure and disarms the scope when the
//! request finishes.
//!
//! ```rust
//! use fl_core::{CapturePolicy, CaptureScope, capture_locals};
//!
//! let scope = CaptureScope::armed(CapturePolicy::default().into());
//! let order_id = 42;
//! let sku = "A-100";
//! capture_locals!(scope, order_id, sku);
//!
//! if let Some(frame) = scope.peek() {
//!     assert_eq!(frame.locals.len(), 2);
//! }
//!
//! scope.disarm();
//! assert!(scope.peek().is_none());
//! ```

use crate::exception::{SourceLocation, capture_backtrace};
use crate::serializer::Variable;
use config::CaptureConfig;
use parking_lot::Mutex;
use std::future::Future;
use std::sync::{Arc, Once};

/// Symbol prefixes of the tracker's own frames. They are never the location
/// of a failure.
const INTERNAL_SYMBOL_PREFIXES: &[&str] = &["fl_core::", "tracker::"];

/// Whether `function` belongs to the tracker itself.
pub fn is_internal_symbol(function: &str) -> bool {
    let function = function.trim_start_matches('<');
    INTERNAL_SYMBOL_PREFIXES.iter().any(|prefix| {
        function.starts_with(prefix) || function.contains(&format!(" as {prefix}"))
    })
}

/// Which source paths count as application code.
#[derive(Debug, Clone, PartialEq)]
pub struct CapturePolicy {
    pub enabled: bool,
    /// When non-empty, a path must contain one of these to be eligible.
    pub app_roots: Vec<String>,
    /// Dependency and toolchain locations.
    pub excluded_path_markers: Vec<String>
}

impl Default for CapturePolicy {
    fn default() -> Self {
        Self::from(&CaptureConfig::default())
    }
}

impl From<&CaptureConfig> for CapturePolicy {
    fn from(config: &CaptureConfig) -> Self {
        Self {
            enabled: config.enabled,
            app_roots: config.app_roots.clone(),
            excluded_path_markers: config.excluded_path_markers.clone()
        }
    }
}

impl CapturePolicy {
    pub fn is_app_path(&self, path: &str) -> bool {
        if path.is_empty() || path.starts_with('<') {
            return false;
        }
        let normalized = path.replace('\\', "/");
        if self
            .excluded_path_markers
            .iter()
            .any(|marker| normalized.contains(marker.as_str()))
        {
            return false;
        }
        self.app_roots.is_empty()
            || self
                .app_roots
                .iter()
                .any(|root| normalized.contains(root.as_str()))
    }

    /// A backtrace frame that can locate a failure: application code outside
    /// the tracker's own functions.
    pub fn is_app_frame(&self, path: &str, function: &str) -> bool {
        self.is_app_path(path) && !is_internal_symbol(function)
    }
}

/// Call site and locals recorded at the point of failure.
#[derive(Debug, Clone)]
pub struct CapturedFrame {
    pub file_path: String,
    pub line_number: u32,
    pub method_name: Option<String>,
    pub locals: Vec<(String, Variable)>
}

impl CapturedFrame {
    pub fn locals_variable(&self) -> Variable {
        Variable::Map(self.locals.clone())
    }
}

/// Where a panic was raised, recorded by the panic hook before unwinding.
#[derive(Debug, Clone, PartialEq)]
pub struct PanicSite {
    pub location: SourceLocation,
    pub backtrace: Vec<String>
}

#[derive(Debug, Default)]
struct ScopeState {
    armed: bool,
    frame: Option<CapturedFrame>,
    panic: Option<PanicSite>
}

/// Handle to one request's capture state. Cloning shares the state.
#[derive(Debug, Clone)]
pub struct CaptureScope {
    policy: Arc<CapturePolicy>,
    state: Arc<Mutex<ScopeState>>
}

impl CaptureScope {
    pub fn armed(policy: Arc<CapturePolicy>) -> Self {
        let armed = policy.enabled;
        Self {
            policy,
            state: Arc::new(Mutex::new(ScopeState { armed, frame: None, panic: None }))
        }
    }

    /// A scope that records nothing until armed.
    pub fn disarmed(policy: Arc<CapturePolicy>) -> Self {
        Self {
            policy,
            state: Arc::new(Mutex::new(ScopeState::default()))
        }
    }

    pub fn arm(&self) {
        self.state.lock().armed = self.policy.enabled;
    }

    /// Disarm and drop anything captured.
    pub fn disarm(&self) {
        let mut state = self.state.lock();
        state.armed = false;
        state.frame = None;
        state.panic = None;
    }

    pub fn is_armed(&self) -> bool {
        self.state.lock().armed
    }

    pub fn policy(&self) -> &CapturePolicy {
        &self.policy
    }

    /// Record a call site. Ignored while disarmed or when `file` is not
    /// application code. A later record replaces an earlier one.
    pub fn record(
        &self,
        file: &str,
        line: u32,
        function: Option<&str>,
        locals: Vec<(String, Variable)>
    ) -> bool {
        if !self.policy.is_app_path(file) {
            return false;
        }
        let mut state = self.state.lock();
        if !state.armed {
            return false;
        }
        state.frame = Some(CapturedFrame {
            file_path: file.to_string(),
            line_number: line,
            method_name: function.map(ToString::to_string),
            locals
        });
        true
    }

    /// Remove and return the captured frame.
    pub fn take(&self) -> Option<CapturedFrame> {
        self.state.lock().frame.take()
    }

    pub fn peek(&self) -> Option<CapturedFrame> {
        self.state.lock().frame.clone()
    }

    /// Record the site of a panic. Ignored while disarmed or when the state
    /// is locked by the panicking thread itself.
    pub fn record_panic(&self, site: PanicSite) -> bool {
        let Some(mut state) = self.state.try_lock() else {
            return false;
        };
        if !state.armed {
            return false;
        }
        state.panic = Some(site);
        true
    }

    pub fn take_panic(&self) -> Option<PanicSite> {
        self.state.lock().panic.take()
    }

    /// Guard that disarms the scope when dropped.
    pub fn guard(&self) -> ScopeGuard {
        ScopeGuard {
            scope: self.clone()
        }
    }
}

/// Disarms and clears its scope on drop.
#[derive(Debug)]
pub struct ScopeGuard {
    scope: CaptureScope
}

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        self.scope.disarm();
    }
}

tokio::task_local! {
    static ACTIVE_SCOPE: CaptureScope;
}

/// Run `future` with `scope` as the target of the panic hook.
pub fn in_scope<F: Future>(scope: CaptureScope, future: F) -> impl Future<Output = F::Output> {
    ACTIVE_SCOPE.scope(scope, future)
}

/// Install, once per process, a panic hook that records the panic location
/// and stack into the scope active on the panicking task. The previously
/// installed hook still runs afterwards.
pub fn install_panic_hook() {
    static INSTALL: Once = Once::new();
    INSTALL.call_once(|| {
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            let _ = ACTIVE_SCOPE.try_with(|scope| {
                if let Some(location) = info.location() {
                    scope.record_panic(PanicSite {
                        location: location.into(),
                        backtrace: capture_backtrace()
                    });
                }
            });
            previous(info);
        }));
    });
}

/// Strip the helper item and closure segments from a `type_name` path.
#[doc(hidden)]
pub fn function_path(raw: &str) -> &str {
    let mut path = raw.strip_suffix("::__faultline_here").unwrap_or(raw);
    while let Some(stripped) = path.strip_suffix("::{{closure}}") {
        path = stripped;
    }
    path
}

/// Record the current call site and the named bindings into a
/// [`CaptureScope`].
///
/// Bindings are snapshotted through `Debug`. Use `name => expr` pairs to pass
/// values convertible into [`Variable`] so that nested keys are redacted too.
#[macro_export]
macro_rules! capture_locals {
    ($scope:expr $(, $name:literal => $value:expr)+ $(,)?) => {{
        fn __faultline_here() {}
        let function = $crate::capture::function_path(
            ::std::any::type_name_of_val(&__faultline_here)
        );
        $scope.record(
            file!(),
            line!(),
            Some(function),
            vec![$(($name.to_string(), $crate::serializer::Variable::from($value))),+]
        )
    }};
    ($scope:expr $(, $var:ident)* $(,)?) => {{
        fn __faultline_here() {}
        let function = $crate::capture::function_path(
            ::std::any::type_name_of_val(&__faultline_here)
        );
        $scope.record(
            file!(),
            line!(),
            Some(function),
            vec![$((
                stringify!($var).to_string(),
                $crate::serializer::Variable::debug_snapshot(&$var)
            )),*]
        )
    }};
}
