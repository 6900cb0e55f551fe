//! axum integration.
//!
//! ```rust,no_run
//! # fn app(interceptor: tracker::Interceptor) -> axum::Router {
//! use axum::{Router, routing::get};
//!
//! Router::new()
//!     .route("/orders", get(|| async { "ok" }))
//!     .layer(axum::middleware::from_fn_with_state(
//!         interceptor,
//!         tracker::faultline_middleware
//!     ))
//! # }
//! ```
//!
//! Handlers reach the request's [`CaptureScope`] through
//! `Extension<CaptureScope>` and report handled failures by returning a
//! [`ReportedError`]. Layers that run before this one can put a
//! `UserInfo` into the request extensions for [`crate::ExtensionUser`].

use crate::boundary::Interceptor;
use axum::extract::{ConnectInfo, Request, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use fl_core::capture::{CaptureScope, in_scope};
use fl_core::exception::{ExceptionInfo, Reportable};
use fl_core::types::RequestInfo;
use futures_util::FutureExt;
use std::net::SocketAddr;
use std::panic::AssertUnwindSafe;

/// A failure a handler turned into a response but still wants tracked.
#[derive(Debug, Clone)]
pub struct ReportedError {
    pub exception: ExceptionInfo,
    pub status: StatusCode
}

impl ReportedError {
    pub fn new(error: &(impl Reportable + ?Sized)) -> Self {
        Self {
            exception: error.to_exception(),
            status: StatusCode::INTERNAL_SERVER_ERROR
        }
    }

    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }
}

impl IntoResponse for ReportedError {
    fn into_response(self) -> Response {
        let body = self
            .status
            .canonical_reason()
            .unwrap_or("Error")
            .to_string();
        let mut response = (self.status, body).into_response();
        response.extensions_mut().insert(self);
        response
    }
}

impl From<anyhow::Error> for ReportedError {
    fn from(error: anyhow::Error) -> Self {
        Self::new(&error)
    }
}

pub async fn faultline_middleware(
    State(interceptor): State<Interceptor>,
    mut request: Request,
    next: Next
) -> Response {
    let info = request_info(&request);
    let extensions = request.extensions().clone();

    let scope = interceptor.tracker().new_scope();
    let _guard = scope.guard();
    request.extensions_mut().insert(scope.clone());

    match AssertUnwindSafe(in_scope(scope.clone(), next.run(request)))
        .catch_unwind()
        .await
    {
        Ok(mut response) => {
            if let Some(reported) = response.extensions_mut().remove::<ReportedError>() {
                interceptor
                    .report_failure(&reported.exception, Some(&info), &extensions, &scope)
                    .await;
            }
            response
        }
        Err(payload) => {
            let exception =
                ExceptionInfo::from_panic(payload.as_ref()).with_panic_site(scope.take_panic());
            interceptor
                .report_failure(&exception, Some(&info), &extensions, &scope)
                .await;
            std::panic::resume_unwind(payload)
        }
    }
}

/// Snapshot the parts of a request the tracker stores.
pub fn request_info(request: &Request) -> RequestInfo {
    let headers = request.headers();
    let uri = request.uri();

    let url = if uri.scheme().is_some() {
        uri.to_string()
    } else {
        let scheme = header_value(headers, "x-forwarded-proto").unwrap_or("http");
        match header_value(headers, header::HOST.as_str()) {
            Some(host) => format!("{scheme}://{host}{uri}"),
            None => uri.to_string()
        }
    };

    let ip_address = header_value(headers, "x-forwarded-for")
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .or_else(|| header_value(headers, "x-real-ip").map(ToString::to_string))
        .or_else(|| {
            request
                .extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip().to_string())
        });

    RequestInfo {
        method: request.method().to_string(),
        url,
        path: uri.path().to_string(),
        ip_address,
        user_agent: header_value(headers, header::USER_AGENT.as_str()).map(ToString::to_string),
        headers: headers
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect()
    }
}

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Request extension lookup for handlers that take the whole request.
pub fn capture_scope(request: &Request) -> Option<CaptureScope> {
    request.extensions().get::<CaptureScope>().cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http;

    #[test]
    fn test_request_info_snapshot() {
        let request = http::Request::builder()
            .method("POST")
            .uri("/orders/42?expand=items")
            .header("host", "shop.example.com")
            .header("x-forwarded-proto", "https")
            .header("x-forwarded-for", "203.0.113.7, 10.0.0.1")
            .header("user-agent", "Mozilla/5.0")
            .body(Body::empty())
            .unwrap();

        let info = request_info(&request);
        assert_eq!(info.method, "POST");
        assert_eq!(info.url, "https://shop.example.com/orders/42?expand=items");
        assert_eq!(info.path, "/orders/42");
        assert_eq!(info.ip_address.as_deref(), Some("203.0.113.7"));
        assert_eq!(info.user_agent.as_deref(), Some("Mozilla/5.0"));
        assert_eq!(info.header("Host"), Some("shop.example.com"));
    }

    #[test]
    fn test_request_info_connect_info_fallback() {
        let mut request = http::Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();
        let addr: SocketAddr = "198.51.100.4:51234".parse().unwrap();
        request.extensions_mut().insert(ConnectInfo(addr));

        let info = request_info(&request);
        assert_eq!(info.url, "/health");
        assert_eq!(info.ip_address.as_deref(), Some("198.51.100.4"));
    }

    #[test]
    fn test_reported_error_response_carries_exception() {
        let response = ReportedError::from(anyhow::anyhow!("payment gateway timeout"))
            .with_status(StatusCode::BAD_GATEWAY)
            .into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let reported = response.extensions().get::<ReportedError>().unwrap();
        assert_eq!(reported.exception.message, "payment gateway timeout");
    }
}
