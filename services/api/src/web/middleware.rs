//! services/api/src/web/middleware.rs
//!
//! Actor middleware for mutating routes.

use axum::{extract::Request, middleware::Next, response::Response};
use tracing::debug;
use warehouse_core::Actor;

use crate::error::ApiError;

pub const ACTOR_HEADER: &str = "x-actor";

/// Middleware that reads the acting user from the `x-actor` header.
///
/// The header is set by the authenticating proxy in front of this service. If it
/// is present, an `Actor` is inserted into request extensions for handlers to use;
/// if it is missing or blank, the request is rejected before reaching a handler.
pub async fn require_actor(mut req: Request, next: Next) -> Result<Response, ApiError> {
    let name = req
        .headers()
        .get(ACTOR_HEADER)
        // Names may be UTF-8 (e.g. Vietnamese), which `HeaderValue::to_str` rejects.
        .and_then(|v| std::str::from_utf8(v.as_bytes()).ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or(ApiError::MissingActor)?
        .to_string();

    debug!(actor = %name, "Actor attached to request");
    req.extensions_mut().insert(Actor::new(name));
    Ok(next.run(req).await)
}
