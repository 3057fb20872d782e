use axum::response::IntoResponse;
use axum::Json;
use http::StatusCode;
use serde_json::json;

use crate::oidc::OidcError;

/// Message returned while the OIDC environment is missing or unusable
pub const NOT_CONFIGURED: &str =
    "Please configure OIDC_CLIENT_ID, OIDC_CLIENT_SECRET, OIDC_PROVIDER_URL and OIDC_AUTH_PROXY_URL OIDC environments.";

#[derive(Debug, Clone)]
pub struct ApiError {
    pub detail: String,
    pub status_code: StatusCode,
}

impl ApiError {
    /// Create a new ApiError with a detail message and status code
    pub fn new<S: ToString>(detail: S, status_code: StatusCode) -> Self {
        Self {
            detail: detail.to_string(),
            status_code,
        }
    }

    /// Create new Internal Server Error (500) with a detail message
    pub fn internal<S: ToString>(detail: S) -> Self {
        Self::new(detail, StatusCode::INTERNAL_SERVER_ERROR)
    }

    /// Create new Bad Request Error (400) with a detail message
    pub fn bad_request<S: ToString>(detail: S) -> Self {
        Self::new(detail, StatusCode::BAD_REQUEST)
    }

    /// 503 for requests that need a provider while none is configured
    pub fn not_configured() -> Self {
        Self::new(NOT_CONFIGURED, StatusCode::SERVICE_UNAVAILABLE)
    }
}

/// Client-facing rendering of relying party failures.
///
/// Provider and verifier internals stay in the logs; the response only names
/// the failed step.
impl From<OidcError> for ApiError {
    fn from(err: OidcError) -> Self {
        match err {
            OidcError::StateEncoding => Self::bad_request("State is not valid"),
            OidcError::StateMismatch => Self::bad_request("State mismatch"),
            OidcError::StateExpired => Self::bad_request("State expired"),
            OidcError::Exchange(_) | OidcError::Http(_) => {
                Self::bad_request("Failed to exchange authorization code")
            }
            OidcError::MissingIdToken => Self::bad_request("No id_token in token response"),
            OidcError::InvalidToken(_)
            | OidcError::TokenExpired
            | OidcError::NonceMismatch
            | OidcError::UnknownKey(_)
            | OidcError::KeySet(_) => Self::bad_request("Failed to verify ID Token"),
            OidcError::Url(_) => Self::bad_request("Invalid URL"),
            OidcError::Config(_) | OidcError::Discovery(_) => Self::not_configured(),
            OidcError::Crypto => Self::internal("Internal error"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status_code = self.status_code;
        let body = json!({
            "detail": self.detail,
        });
        (status_code, Json(body)).into_response()
    }
}
