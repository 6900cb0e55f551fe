//! Best-effort extraction of user identity and custom context.
//!
//! Both hooks run only after a failure and never make things worse: an
//! error or a panic inside them degrades to "no data".

use axum::http::Extensions;
use fl_core::types::{RequestInfo, UserInfo};
use serde_json::Value;
use std::panic::{AssertUnwindSafe, catch_unwind};

/// Resolves the user the failing request acted for.
pub trait UserExtractor: Send + Sync {
    fn extract_user(
        &self,
        request: &RequestInfo,
        extensions: &Extensions
    ) -> anyhow::Result<Option<UserInfo>>;
}

impl<F> UserExtractor for F
where
    F: Fn(&RequestInfo, &Extensions) -> anyhow::Result<Option<UserInfo>> + Send + Sync
{
    fn extract_user(
        &self,
        request: &RequestInfo,
        extensions: &Extensions
    ) -> anyhow::Result<Option<UserInfo>> {
        self(request, extensions)
    }
}

/// Supplies application-specific data stored with the occurrence.
pub trait ContextProvider: Send + Sync {
    fn custom_context(
        &self,
        request: &RequestInfo,
        extensions: &Extensions
    ) -> anyhow::Result<Option<Value>>;
}

impl<F> ContextProvider for F
where
    F: Fn(&RequestInfo, &Extensions) -> anyhow::Result<Option<Value>> + Send + Sync
{
    fn custom_context(
        &self,
        request: &RequestInfo,
        extensions: &Extensions
    ) -> anyhow::Result<Option<Value>> {
        self(request, extensions)
    }
}

/// A [`UserInfo`] placed in request extensions by an earlier layer.
pub struct ExtensionUser;

impl UserExtractor for ExtensionUser {
    fn extract_user(
        &self,
        _request: &RequestInfo,
        extensions: &Extensions
    ) -> anyhow::Result<Option<UserInfo>> {
        Ok(extensions.get::<UserInfo>().cloned())
    }
}

pub fn extract_user_safely(
    extractor: &dyn UserExtractor,
    request: &RequestInfo,
    extensions: &Extensions
) -> Option<UserInfo> {
    match catch_unwind(AssertUnwindSafe(|| extractor.extract_user(request, extensions))) {
        Ok(Ok(user)) => user,
        Ok(Err(e)) => {
            tracing::debug!(error = %e, "User extraction failed");
            None
        }
        Err(_) => {
            tracing::debug!("User extraction panicked");
            None
        }
    }
}

pub fn custom_context_safely(
    provider: &dyn ContextProvider,
    request: &RequestInfo,
    extensions: &Extensions
) -> Option<Value> {
    match catch_unwind(AssertUnwindSafe(|| provider.custom_context(request, extensions))) {
        Ok(Ok(Some(Value::Null))) | Ok(Ok(None)) => None,
        Ok(Ok(value)) => value,
        Ok(Err(e)) => {
            tracing::debug!(error = %e, "Custom context provider failed");
            None
        }
        Err(_) => {
            tracing::debug!("Custom context provider panicked");
            None
        }
    }
}
