//! API Middleware
//!
//! Actor extraction and request logging.

use axum::{
    body::Body,
    http::{HeaderMap, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use uuid::Uuid;

use crate::access::{Actor, Role};
use crate::domain::OperationContext;

pub const ACTOR_ID_HEADER: &str = "x-actor-id";
pub const ACTOR_ROLE_HEADER: &str = "x-actor-role";
pub const CORRELATION_ID_HEADER: &str = "x-correlation-id";

fn bad_header(message: &str, error_code: &str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({
            "error": message,
            "error_code": error_code
        })),
    )
        .into_response()
}

/// Read the actor asserted by the upstream authentication layer.
///
/// A missing role means the least privileged one. A request without an actor
/// id passes through; operations that need one reject it themselves.
fn actor_from_headers(headers: &HeaderMap) -> Result<Option<Actor>, Response> {
    let Some(raw_id) = headers.get(ACTOR_ID_HEADER) else {
        return Ok(None);
    };

    let id = raw_id
        .to_str()
        .ok()
        .and_then(|s| Uuid::parse_str(s.trim()).ok())
        .ok_or_else(|| bad_header("Invalid X-Actor-Id header format", "invalid_actor_id"))?;

    let role = match headers.get(ACTOR_ROLE_HEADER) {
        Some(raw_role) => raw_role
            .to_str()
            .ok()
            .and_then(|s| s.trim().parse::<Role>().ok())
            .ok_or_else(|| bad_header("Invalid X-Actor-Role header", "invalid_actor_role"))?,
        None => Role::Salesman,
    };

    Ok(Some(Actor::new(id, role)))
}

/// Build the [`OperationContext`] for a request from its headers
pub async fn actor_middleware(
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, Response> {
    let headers = request.headers();
    let actor = actor_from_headers(headers)?;

    // Extract correlation ID or generate new one
    let correlation_id = headers
        .get(CORRELATION_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| Uuid::parse_str(s).ok())
        .unwrap_or_else(Uuid::new_v4);

    let client_ip = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.split(',').next())
        .and_then(|s| s.trim().parse().ok());

    let mut context = OperationContext::new().with_correlation_id(correlation_id);
    if let Some(actor) = actor {
        context = context.with_actor(actor);
    }
    if let Some(ip) = client_ip {
        context = context.with_client_ip(ip);
    }

    request.extensions_mut().insert(context);

    Ok(next.run(request).await)
}

// =========================================================================
// mask_headers_for_logging
// =========================================================================

/// Headers that should be masked in logs
const SENSITIVE_HEADERS: &[&str] = &["x-api-key", "authorization", "cookie", "set-cookie"];

/// Mask sensitive headers for logging
pub fn mask_headers_for_logging(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .map(|(name, value)| {
            let name_lower = name.as_str().to_lowercase();
            let masked_value = if SENSITIVE_HEADERS.contains(&name_lower.as_str()) {
                "[REDACTED]".to_string()
            } else {
                value.to_str().unwrap_or("[invalid utf8]").to_string()
            };
            (name.to_string(), masked_value)
        })
        .collect()
}

/// Request logging middleware
pub async fn logging_middleware(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let headers = mask_headers_for_logging(request.headers());

    let context = request.extensions().get::<OperationContext>();
    let correlation_id = context.and_then(|ctx| ctx.correlation_id);
    let actor_id = context.and_then(|ctx| ctx.actor.as_ref()).map(|actor| actor.id);

    let start = std::time::Instant::now();

    tracing::info!(
        method = %method,
        uri = %uri,
        correlation_id = ?correlation_id,
        actor_id = ?actor_id,
        headers = ?headers,
        "Incoming request"
    );

    let response = next.run(request).await;

    tracing::info!(
        method = %method,
        uri = %uri,
        status = %response.status(),
        duration_ms = %start.elapsed().as_millis(),
        correlation_id = ?correlation_id,
        "Request completed"
    );

    response
}
