// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Request-scoped diagnostics.
//!
//! Every request gets an `x-request-id` (kept from the client or generated,
//! 8 characters) and an `http_request` span carrying `request_id`,
//! `client_ip`, `method`, `uri` and `user_id` (`anonymous` until the
//! authentication stage records the principal). Log events emitted while
//! handling the request inherit those fields. The span is dropped with the
//! request future, so nothing leaks into the next request served by the same
//! worker.
//!
//! Handlers and the revocation and session services carry their own
//! `#[instrument]` spans; [`span_events`] makes the formatter log when each
//! one opens and closes, the close line carrying its duration.

use std::net::SocketAddr;
use std::time::Duration;

use axum::{
    body::Body,
    extract::{ConnectInfo, FromRequestParts, Request},
    http::{request::Parts, HeaderMap, HeaderName, HeaderValue, Response},
    middleware::Next,
    response::Response as AxumResponse,
};
use tower_http::{
    classify::ServerErrorsFailureClass,
    request_id::{MakeRequestId, RequestId},
};
use tracing::Span;
use tracing_subscriber::fmt::format::FmtSpan;
use uuid::Uuid;

/// Header carrying the request id in both directions.
pub fn request_id_header() -> HeaderName {
    HeaderName::from_static("x-request-id")
}

const UNKNOWN: &str = "unknown";

/// `user_id` of requests without an authenticated principal.
pub const ANONYMOUS: &str = "anonymous";

/// Span lifecycle events logged by the formatter: entry, and exit with
/// `time.busy` / `time.idle`.
pub fn span_events() -> FmtSpan {
    FmtSpan::NEW | FmtSpan::CLOSE
}

/// Generates 8-character request ids.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShortRequestId;

impl MakeRequestId for ShortRequestId {
    fn make_request_id<B>(&mut self, _request: &axum::http::Request<B>) -> Option<RequestId> {
        let id = Uuid::new_v4().simple().to_string();
        HeaderValue::from_str(&id[..8]).ok().map(RequestId::new)
    }
}

/// Correlation values for the current request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    pub request_id: String,
    pub client_ip: String,
}

impl RequestContext {
    fn from_parts(headers: &HeaderMap, peer: Option<SocketAddr>) -> Self {
        Self {
            request_id: request_id(headers),
            client_ip: client_ip(headers, peer),
        }
    }
}

impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        if let Some(ctx) = parts.extensions.get::<RequestContext>() {
            return Ok(ctx.clone());
        }
        Ok(RequestContext::from_parts(&parts.headers, peer_addr(&parts.extensions)))
    }
}

fn request_id(headers: &HeaderMap) -> String {
    headers
        .get(request_id_header())
        .and_then(|v| v.to_str().ok())
        .unwrap_or(UNKNOWN)
        .to_string()
}

fn peer_addr(extensions: &axum::http::Extensions) -> Option<SocketAddr> {
    extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr)
}

/// Best-effort client address.
///
/// Order: first `X-Forwarded-For` hop, `X-Real-IP`, `Proxy-Client-IP`, then
/// the socket peer.
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty() && !v.eq_ignore_ascii_case(UNKNOWN))
    };

    if let Some(forwarded) = header("x-forwarded-for") {
        if let Some(first) = forwarded.split(',').map(str::trim).find(|hop| !hop.is_empty()) {
            return first.to_string();
        }
    }

    header("x-real-ip")
        .or_else(|| header("proxy-client-ip"))
        .map(str::to_string)
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
        .unwrap_or_else(|| UNKNOWN.to_string())
}

// =============================================================================
// TraceLayer hooks
// =============================================================================

pub fn make_request_span(request: &Request<Body>) -> Span {
    let ctx = RequestContext::from_parts(request.headers(), peer_addr(request.extensions()));

    tracing::info_span!(
        "http_request",
        request_id = %ctx.request_id,
        client_ip = %ctx.client_ip,
        method = %request.method(),
        uri = %request.uri().path(),
        user_id = %ANONYMOUS,
    )
}

pub fn on_request(_request: &Request<Body>, _span: &Span) {
    tracing::info!("REQUEST START");
}

pub fn on_response(response: &Response<Body>, latency: Duration, _span: &Span) {
    let status = response.status().as_u16();
    let latency_ms = latency.as_millis() as u64;
    if response.status().is_server_error() {
        tracing::error!(status, latency_ms, "REQUEST END");
    } else {
        tracing::info!(status, latency_ms, "REQUEST END");
    }
}

pub fn on_failure(error: ServerErrorsFailureClass, latency: Duration, _span: &Span) {
    tracing::error!(
        classification = %error,
        latency_ms = latency.as_millis() as u64,
        "REQUEST FAILED"
    );
}

/// Middleware placing a [`RequestContext`] in the request extensions.
///
/// Must run inside `SetRequestIdLayer` so the id header is present.
pub async fn attach_request_context(mut request: Request, next: Next) -> AxumResponse {
    let ctx = RequestContext::from_parts(request.headers(), peer_addr(request.extensions()));
    request.extensions_mut().insert(ctx);
    next.run(request).await
}

#[cfg(test)]
pub(crate) mod testing {
    use std::io;
    use std::sync::{Arc, Mutex};

    /// Log sink for asserting on formatted tracing output.
    #[derive(Clone, Default)]
    pub struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl CapturedLogs {
        pub fn subscriber(&self) -> impl tracing::Subscriber + Send + Sync + 'static {
            let sink = self.clone();
            tracing_subscriber::fmt()
                .with_max_level(tracing::Level::TRACE)
                .with_ansi(false)
                .with_span_events(super::span_events())
                .with_writer(move || sink.clone())
                .finish()
        }

        pub fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    impl io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }
}
