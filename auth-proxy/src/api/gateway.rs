//! Envoy `ext_authz` HTTP service.
//!
//! The sidecar forwards every inbound request under the `/authz-filter`
//! prefix with the original method, path, query and headers. A 200 lets the
//! request through, with any returned `Authorization` header added upstream;
//! every other response is sent to the browser as-is.

use crate::api::{client_ip, found};
use crate::errors::ApiError;
use crate::oidc::OidcProvider;
use crate::openapi::AUTHZ_TAG;
use crate::session::{clear_session_cookie, session_cookie, session_token, ID_TOKEN};
use crate::state::AppState;
use axum::extract::{Request, State};
use axum::http::request::Parts;
use axum::response::{IntoResponse, Response};
use axum::routing::any;
use axum::Router;
use axum_extra::extract::cookie::CookieJar;
use http::header::{AUTHORIZATION, HOST};
use http::{HeaderMap, HeaderValue, StatusCode};
use log::{debug, info, warn};
use url::Url;

const PREFIX: &str = "/authz-filter";

pub(super) fn router() -> Router<AppState> {
    Router::new()
        .route(PREFIX, any(authz_filter))
        .route("/authz-filter/{*path}", any(authz_filter))
}

/// Authorize one request on behalf of the sidecar
#[utoipa::path(
    get,
    path = "/authz-filter/{path}",
    tag = AUTHZ_TAG,
    params(
        ("path" = String, Path, description = "Path of the original request")
    ),
    responses(
        (status = 200, description = "Allowed; Authorization header carries the session token"),
        (status = 302, description = "Redirect to login, or to the original URL with the session set"),
        (status = 400, description = "Invalid ID token or original URL"),
        (status = 503, description = "OIDC is not configured")
    )
)]
pub(crate) async fn authz_filter(
    State(state): State<AppState>,
    request: Request,
) -> Result<Response, ApiError> {
    let (parts, _body) = request.into_parts();
    let Some(provider) = state.oidc.as_deref() else {
        return Err(ApiError::not_configured());
    };

    let ip = client_ip(&parts.headers, &parts.extensions);
    let path = parts.uri.path();

    if has_authorization(&parts.headers) {
        info!("allow ip={} path={} reason=authorization-header", ip, path);
        return Ok(StatusCode::OK.into_response());
    }

    let original_url = original_url(&parts)?;
    let secure = original_url.scheme() == "https";

    if let Some(token) = query_token(&original_url) {
        return store_session(provider, original_url, &token, &ip).await;
    }

    let jar = CookieJar::from_headers(&parts.headers);
    let Some(token) = session_token(&jar) else {
        info!("redirect ip={} path={} reason=no-session", ip, path);
        return found(&provider.login_redirect(original_url.as_str())?);
    };

    match provider.verifier().verify(token).await {
        Ok(id_token) => {
            debug!(
                "session for sub={} valid until {}",
                id_token.claims.sub, id_token.expiry
            );
            info!("allow ip={} path={} reason=session", ip, path);
            let bearer = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|_| ApiError::bad_request("Invalid session token"))?;
            Ok((StatusCode::OK, [(AUTHORIZATION, bearer)]).into_response())
        }
        Err(e) => {
            info!(
                "redirect ip={} path={} reason=invalid-session: {}",
                ip, path, e
            );
            let response = found(&provider.login_redirect(original_url.as_str())?)?;
            Ok((jar.add(clear_session_cookie(secure)), response).into_response())
        }
    }
}

/// Token leg of the handoff: the callback sent the browser back with the
/// token in the query string. Move it into the cookie and clean the URL.
async fn store_session(
    provider: &OidcProvider,
    mut original_url: Url,
    token: &str,
    ip: &str,
) -> Result<Response, ApiError> {
    let id_token = provider.verifier().verify(token).await.map_err(|e| {
        warn!(
            "reject ip={} path={} reason=invalid-id-token: {}",
            ip,
            original_url.path(),
            e
        );
        ApiError::from(e)
    })?;

    let remaining: Vec<(String, String)> = original_url
        .query_pairs()
        .filter(|(k, _)| k != ID_TOKEN)
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    if remaining.is_empty() {
        original_url.set_query(None);
    } else {
        original_url
            .query_pairs_mut()
            .clear()
            .extend_pairs(remaining);
    }

    info!(
        "session stored ip={} path={} sub={}",
        ip,
        original_url.path(),
        id_token.claims.sub
    );
    let secure = original_url.scheme() == "https";
    let cookie = session_cookie(token, id_token.expiry, secure);
    let response = found(&original_url)?;
    Ok((CookieJar::new().add(cookie), response).into_response())
}

fn has_authorization(headers: &HeaderMap) -> bool {
    headers
        .get(AUTHORIZATION)
        .is_some_and(|v| !v.as_bytes().iter().all(u8::is_ascii_whitespace))
}

fn query_token(url: &Url) -> Option<String> {
    url.query_pairs()
        .find(|(k, v)| k == ID_TOKEN && !v.is_empty())
        .map(|(_, v)| v.into_owned())
}

/// Rebuild the URL the user asked for from the forwarded request
fn original_url(parts: &Parts) -> Result<Url, ApiError> {
    let scheme = forwarded_header(&parts.headers, "x-forwarded-proto")
        .or_else(|| forwarded_header(&parts.headers, "x-url-scheme"))
        .unwrap_or("http");

    let host = parts
        .headers
        .get(HOST)
        .and_then(|v| v.to_str().ok())
        .filter(|h| !h.is_empty())
        .or_else(|| parts.uri.authority().map(|a| a.as_str()))
        .ok_or_else(|| ApiError::bad_request("Missing Host header"))?;

    let path_and_query = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("");
    let rest = path_and_query
        .strip_prefix(PREFIX)
        .unwrap_or(path_and_query);
    let rest = if rest.starts_with('/') {
        rest.to_string()
    } else {
        format!("/{rest}")
    };

    Url::parse(&format!("{scheme}://{host}{rest}"))
        .map_err(|_| ApiError::bad_request("Invalid original URL"))
}

fn forwarded_header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.split(',').next().unwrap_or_default().trim())
        .filter(|v| *v == "http" || *v == "https")
}
