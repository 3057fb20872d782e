use axum::http::HeaderValue;
use http::header::{CACHE_CONTROL, EXPIRES, PRAGMA};

/// Cache-Control directives
#[derive(Debug, Clone, Default)]
pub struct CacheControl {
    pub no_cache: bool,
    pub no_store: bool,
    pub must_revalidate: bool,
    pub private: bool,
}

impl CacheControl {
    /// Create a new CacheControl instance
    pub fn new() -> Self {
        Self::default()
    }

    /// Set no-cache directive
    pub fn no_cache(mut self) -> Self {
        self.no_cache = true;
        self
    }

    /// Set no-store directive
    pub fn no_store(mut self) -> Self {
        self.no_store = true;
        self
    }

    /// Set must-revalidate directive
    pub fn must_revalidate(mut self) -> Self {
        self.must_revalidate = true;
        self
    }

    /// Set private directive
    pub fn private(mut self) -> Self {
        self.private = true;
        self
    }

    /// Convert to HeaderValue
    pub fn to_header_value(&self) -> HeaderValue {
        let mut parts = Vec::new();

        if self.no_store {
            parts.push("no-store");
        }
        if self.no_cache {
            parts.push("no-cache");
        }
        if self.must_revalidate {
            parts.push("must-revalidate");
        }
        if self.private {
            parts.push("private");
        }

        HeaderValue::from_str(&parts.join(", ")).unwrap_or(HeaderValue::from_static(""))
    }

    /// Apply headers to a response
    pub fn apply<B>(&self, response: &mut axum::response::Response<B>) {
        let headers = response.headers_mut();
        headers.insert(CACHE_CONTROL, self.to_header_value());

        if self.no_cache {
            headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));
        }
        if self.no_store || self.no_cache {
            headers.insert(EXPIRES, HeaderValue::from_static("0"));
        }
    }
}

/// Common cache control presets
pub mod presets {
    use super::*;

    /// Redirects and authorization decisions are per user and must never be
    /// replayed from a shared cache.
    pub fn no_store() -> CacheControl {
        CacheControl::new()
            .no_store()
            .no_cache()
            .must_revalidate()
            .private()
    }
}
