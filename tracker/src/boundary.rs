//! Interception boundary for arbitrary units of work.
//!
//! ```rust,no_run
//! # async fn example(interceptor: tracker::Interceptor) -> anyhow::Result<()> {
//! use fl_core::capture_locals;
//!
//! let total = interceptor
//!     .intercept(None, |scope| async move {
//!         let order_id = 42;
//!         capture_locals!(scope, order_id);
//!         anyhow::ensure!(order_id < 10, "order {order_id} out of range");
//!         Ok(order_id)
//!     })
//!     .await?;
//! # let _ = total;
//! # Ok(())
//! # }
//! ```

use crate::context::{ContextProvider, UserExtractor, custom_context_safely, extract_user_safely};
use crate::tracker::Tracker;
use axum::http::Extensions;
use fl_core::capture::{CaptureScope, in_scope, install_panic_hook};
use fl_core::exception::{ExceptionInfo, Reportable};
use fl_core::types::{RequestInfo, TrackContext};
use futures_util::FutureExt;
use observability::Telemetry;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

/// Arms a capture scope around work, tracks its failure and hands the
/// failure back unchanged.
#[derive(Clone)]
pub struct Interceptor {
    tracker: Arc<Tracker>,
    user_extractor: Option<Arc<dyn UserExtractor>>,
    context_provider: Option<Arc<dyn ContextProvider>>
}

impl Interceptor {
    pub fn new(tracker: Arc<Tracker>) -> Self {
        install_panic_hook();
        Self {
            tracker,
            user_extractor: None,
            context_provider: None
        }
    }

    pub fn with_user_extractor(mut self, extractor: impl UserExtractor + 'static) -> Self {
        self.user_extractor = Some(Arc::new(extractor));
        self
    }

    pub fn with_context_provider(mut self, provider: impl ContextProvider + 'static) -> Self {
        self.context_provider = Some(Arc::new(provider));
        self
    }

    pub fn tracker(&self) -> &Arc<Tracker> {
        &self.tracker
    }

    /// Run `work` with an armed scope.
    ///
    /// An `Err` is tracked and returned as-is. A panic is tracked and then
    /// resumed with its original payload. The scope is disarmed when this
    /// returns or unwinds.
    pub async fn intercept<F, Fut, T, E>(&self, request: Option<RequestInfo>, work: F) -> Result<T, E>
    where
        F: FnOnce(CaptureScope) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Reportable
    {
        let scope = self.tracker.new_scope();
        let _guard = scope.guard();

        let run_scope = scope.clone();
        let outcome = AssertUnwindSafe(in_scope(scope.clone(), async move {
            work(run_scope).await
        }))
        .catch_unwind()
        .await;

        match outcome {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(error)) => {
                let exception = error.to_exception();
                self.report_failure(&exception, request.as_ref(), &Extensions::new(), &scope)
                    .await;
                Err(error)
            }
            Err(payload) => {
                let exception =
                    ExceptionInfo::from_panic(payload.as_ref()).with_panic_site(scope.take_panic());
                self.report_failure(&exception, request.as_ref(), &Extensions::new(), &scope)
                    .await;
                std::panic::resume_unwind(payload)
            }
        }
    }

    /// Apply the ignore rules, gather context and track. Never fails: a
    /// tracking error or a panic while tracking is logged.
    pub(crate) async fn report_failure(
        &self,
        exception: &ExceptionInfo,
        request: Option<&RequestInfo>,
        extensions: &Extensions,
        scope: &CaptureScope
    ) {
        let report = AssertUnwindSafe(self.track_failure(exception, request, extensions, scope));
        if report.catch_unwind().await.is_err() {
            tracing::error!(
                exception_class = %exception.class,
                "Error tracking panicked"
            );
        }
    }

    async fn track_failure(
        &self,
        exception: &ExceptionInfo,
        request: Option<&RequestInfo>,
        extensions: &Extensions,
        scope: &CaptureScope
    ) {
        if !self.tracker.is_enabled() {
            return;
        }
        let path = request.map(|r| r.path.as_str());
        let user_agent = request.and_then(|r| r.user_agent.as_deref());
        if let Some(reason) = self
            .tracker
            .ignore_policy()
            .check(&exception.class, path, user_agent)
        {
            tracing::debug!(
                exception_class = %exception.class,
                reason = reason.as_str(),
                "Failure ignored"
            );
            Telemetry::record_ignored(reason);
            return;
        }

        let context = self.build_context(request, extensions, scope);
        if let Err(e) = self.tracker.track(exception, context).await {
            tracing::error!(
                exception_class = %exception.class,
                error = %e,
                "Failed to track error"
            );
        }
    }

    fn build_context(
        &self,
        request: Option<&RequestInfo>,
        extensions: &Extensions,
        scope: &CaptureScope
    ) -> TrackContext {
        let mut context = TrackContext::default().with_captured(scope.take());
        let Some(request) = request else {
            return context;
        };

        if let Some(extractor) = &self.user_extractor {
            context.user = extract_user_safely(extractor.as_ref(), request, extensions);
        }
        if let Some(provider) = &self.context_provider {
            context.custom_data = custom_context_safely(provider.as_ref(), request, extensions);
        }
        context.with_request(request.clone())
    }
}

impl std::fmt::Debug for Interceptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Interceptor")
            .field("tracker", &self.tracker)
            .field("user_extractor", &self.user_extractor.is_some())
            .field("context_provider", &self.context_provider.is_some())
            .finish()
    }
}
