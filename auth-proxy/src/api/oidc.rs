use crate::api::{client_ip, found};
use crate::errors::ApiError;
use crate::oidc::state::StatePayload;
use crate::oidc::{OidcError, OidcProvider};
use crate::openapi::OIDC_TAG;
use crate::session::ID_TOKEN;
use crate::state::AppState;
use axum::extract::{Query, Request, State};
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use log::{info, warn};
use serde::Deserialize;
use url::Url;
use utoipa::IntoParams;

pub(super) fn router() -> Router<AppState> {
    Router::new()
        .route("/oidc/login", get(login))
        .route("/oidc/callback", get(callback))
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub(crate) struct LoginQuery {
    /// URL to return to once the user is authenticated
    original_url: Option<String>,
    /// Signature of `original_url` issued by the gateway
    sign: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub(crate) struct CallbackQuery {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

fn provider(state: &AppState) -> Result<&OidcProvider, ApiError> {
    state.oidc.as_deref().ok_or_else(ApiError::not_configured)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// Who a rejection is logged against
struct Caller {
    ip: String,
    path: String,
}

impl Caller {
    fn of(request: &Request) -> Self {
        Self {
            ip: client_ip(request.headers(), request.extensions()),
            path: request.uri().path().to_string(),
        }
    }

    fn reject(&self, err: ApiError) -> ApiError {
        warn!(
            "reject ip={} path={} status={} reason={}",
            self.ip, self.path, err.status_code, err.detail
        );
        err
    }

    fn reject_oidc(&self, err: OidcError) -> ApiError {
        warn!("reject ip={} path={} reason={}", self.ip, self.path, err);
        ApiError::from(err)
    }
}

/// Start a login: send the browser to the provider's authorization endpoint
#[utoipa::path(
    get,
    path = "/oidc/login",
    tag = OIDC_TAG,
    params(LoginQuery),
    responses(
        (status = 302, description = "Redirect to the identity provider"),
        (status = 400, description = "Missing or forged original_url"),
        (status = 503, description = "OIDC is not configured")
    )
)]
pub(crate) async fn login(
    State(state): State<AppState>,
    Query(query): Query<LoginQuery>,
    request: Request,
) -> Result<Response, ApiError> {
    let provider = provider(&state)?;
    let caller = Caller::of(&request);

    let original_url = non_empty(query.original_url)
        .ok_or_else(|| caller.reject(ApiError::bad_request("Missing original_url")))?;
    let sign = non_empty(query.sign)
        .ok_or_else(|| caller.reject(ApiError::bad_request("Missing sign")))?;

    if !provider.signer().verify(&original_url, &sign) {
        warn!(
            "reject ip={} path={} reason=invalid-sign original_url={}",
            caller.ip, caller.path, original_url
        );
        return Err(ApiError::bad_request("Invalid sign"));
    }

    let payload = StatePayload::new(original_url);
    let authorization_url = provider
        .authorization_url(&payload)
        .map_err(|e| caller.reject_oidc(e))?;
    info!(
        "login ip={} original_url={}",
        caller.ip, payload.original_url
    );
    found(&authorization_url)
}

/// Finish a login: redeem the code and hand the ID token back to the gateway
#[utoipa::path(
    get,
    path = "/oidc/callback",
    tag = OIDC_TAG,
    params(CallbackQuery),
    responses(
        (status = 302, description = "Redirect to the original URL with the id_token parameter"),
        (status = 400, description = "Provider error, invalid state or failed token exchange"),
        (status = 503, description = "OIDC is not configured")
    )
)]
pub(crate) async fn callback(
    State(state): State<AppState>,
    Query(query): Query<CallbackQuery>,
    request: Request,
) -> Result<Response, ApiError> {
    let provider = provider(&state)?;
    let caller = Caller::of(&request);

    if let Some(error) = non_empty(query.error) {
        warn!(
            "reject ip={} path={} reason=provider-error error={} description={}",
            caller.ip,
            caller.path,
            error,
            query.error_description.as_deref().unwrap_or_default()
        );
        return Err(ApiError::bad_request(format!("Authorization failed: {error}")));
    }

    let encoded_state = non_empty(query.state)
        .ok_or_else(|| caller.reject(ApiError::bad_request("Missing state")))?;
    let payload = provider
        .state_codec()
        .decode_param(&encoded_state)
        .map_err(|e| caller.reject_oidc(e))?;
    if payload.is_expired(provider.state_ttl(), provider.clock_skew()) {
        return Err(caller.reject_oidc(OidcError::StateExpired));
    }

    let code = non_empty(query.code)
        .ok_or_else(|| caller.reject(ApiError::bad_request("Missing code")))?;

    let id_token = provider
        .exchange_code(&code)
        .await
        .and_then(|response| response.into_id_token())
        .map_err(|e| caller.reject_oidc(e))?;

    let verified = provider
        .verifier()
        .verify_with_nonce(&id_token, &payload.nonce)
        .await
        .map_err(|e| caller.reject_oidc(e))?;

    let mut original_url = Url::parse(&payload.original_url)
        .ok()
        .filter(|url| matches!(url.scheme(), "http" | "https"))
        .ok_or_else(|| caller.reject(ApiError::bad_request("Invalid original_url")))?;
    original_url
        .query_pairs_mut()
        .append_pair(ID_TOKEN, &id_token);

    info!(
        "login completed ip={} sub={} original_url={}",
        caller.ip, verified.claims.sub, payload.original_url
    );
    found(&original_url)
}
