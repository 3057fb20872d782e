use crate::api::{gateway, health, oidc};
use utoipa::OpenApi;

pub(crate) const HEALTH_TAG: &str = "Health API";
pub(crate) const AUTHZ_TAG: &str = "Authorization API";
pub(crate) const OIDC_TAG: &str = "OIDC API";

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        health::ready_check,
        gateway::authz_filter,
        oidc::login,
        oidc::callback,
    ),
    components(schemas(health::Health)),
    tags(
        (name = HEALTH_TAG, description = "Health check endpoints"),
        (name = AUTHZ_TAG, description = "Envoy ext_authz filter"),
        (name = OIDC_TAG, description = "OpenID Connect login flow"),
    ),
    info(
        title = "Auth Proxy API",
        description = "OIDC authentication gateway",
        version = "0.1.0"
    )
)]
pub(crate) struct ApiDoc;
