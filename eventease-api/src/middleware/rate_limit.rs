use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use eventease_ratelimit::Decision;

use crate::error::AppError;
use crate::state::AppState;

pub const REMAINING_HEADER: &str = "x-ratelimit-remaining";

fn forwarded_value(raw: &str) -> Option<&str> {
    let value = raw.trim();
    if value.is_empty() || value.eq_ignore_ascii_case("unknown") {
        None
    } else {
        Some(value)
    }
}

/// Identity a request is rate limited under: the first `X-Forwarded-For` hop,
/// then `X-Real-IP`, then the socket peer.
pub fn client_key(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    let forwarded_for = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .and_then(forwarded_value);
    if let Some(ip) = forwarded_for {
        return ip.to_string();
    }

    let real_ip = headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .and_then(forwarded_value);
    if let Some(ip) = real_ip {
        return ip.to_string();
    }

    peer.map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

pub async fn rate_limit_middleware(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let peer = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let key = client_key(req.headers(), peer);

    match state.limiter.try_acquire(&key).await {
        Decision::Admitted { remaining } => {
            let mut response = next.run(req).await;
            response
                .headers_mut()
                .insert(REMAINING_HEADER, HeaderValue::from(remaining));
            response
        }
        Decision::Denied { retry_after } => {
            tracing::warn!(client = %key, path = %req.uri().path(), "Rate limit exceeded");
            state.metrics.record_rate_limited();
            AppError::RateLimited { retry_after }.into_response()
        }
    }
}
