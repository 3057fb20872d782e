//! The `id_token` session cookie set on the protected domain

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::{DateTime, Utc};
use time::OffsetDateTime;

/// Name of both the session cookie and the handoff query parameter
pub const ID_TOKEN: &str = "id_token";

fn session(value: String, secure: bool) -> Cookie<'static> {
    Cookie::build((ID_TOKEN, value))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .build()
}

/// Cookie storing `token` until the token itself expires
pub fn session_cookie(token: &str, expires: DateTime<Utc>, secure: bool) -> Cookie<'static> {
    let mut cookie = session(token.to_string(), secure);
    // out of range timestamps leave a browser-session cookie
    if let Ok(expires) = OffsetDateTime::from_unix_timestamp(expires.timestamp()) {
        cookie.set_expires(expires);
    }
    cookie
}

/// Cookie that removes the session
pub fn clear_session_cookie(secure: bool) -> Cookie<'static> {
    let mut cookie = session(String::new(), secure);
    cookie.make_removal();
    cookie
}

/// Session token from the request cookies; empty values count as absent
pub fn session_token(jar: &CookieJar) -> Option<&str> {
    jar.get(ID_TOKEN)
        .map(|cookie| cookie.value())
        .filter(|value| !value.is_empty())
}
