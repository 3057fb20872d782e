pub(crate) mod gateway;
pub(crate) mod health;
pub(crate) mod oidc;

use crate::errors::ApiError;
use crate::headers::presets;
use crate::state::AppState;
use axum::extract::ConnectInfo;
use axum::response::{IntoResponse, Response};
use axum::Router;
use http::header::LOCATION;
use http::{Extensions, HeaderMap, HeaderValue, StatusCode};
use std::net::SocketAddr;
use url::Url;

/// Combines all API routes into a single router
pub(super) fn router() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .merge(gateway::router())
        .merge(oidc::router())
}

/// Uncacheable `302 Found` to `location`
pub(crate) fn found(location: &Url) -> Result<Response, ApiError> {
    let location = HeaderValue::from_str(location.as_str())
        .map_err(|_| ApiError::bad_request("Invalid redirect URL"))?;
    let mut response = (StatusCode::FOUND, [(LOCATION, location)]).into_response();
    presets::no_store().apply(&mut response);
    Ok(response)
}

/// Remote address for logging: first `X-Forwarded-For` hop, then
/// `X-Real-IP`, then the socket peer
pub(crate) fn client_ip(headers: &HeaderMap, extensions: &Extensions) -> String {
    let forwarded_for = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());
    let real_ip = headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    forwarded_for
        .or(real_ip)
        .map(str::to_string)
        .or_else(|| {
            extensions
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip().to_string())
        })
        .unwrap_or_else(|| "unknown".to_string())
}
