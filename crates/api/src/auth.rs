//! Bearer-token principal extraction.
//!
//! Authentication/authorization itself is out of scope (spec.md §1 —
//! "treated as an opaque `Principal` stamped onto runs"). This extractor
//! only pulls the bearer token out of the `Authorization` header and hands
//! it to handlers as an opaque id; it does not verify the token against
//! anything.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::{header, StatusCode};

/// An opaque caller identity, stamped onto workflows and runs as
/// `created_by`/`started_by`. Requests with no bearer token resolve to
/// `"anonymous"` rather than being rejected.
#[derive(Debug, Clone)]
pub struct Principal(pub String);

impl<S> FromRequestParts<S> for Principal
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let principal = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::to_string)
            .unwrap_or_else(|| "anonymous".to_string());

        Ok(Principal(principal))
    }
}
