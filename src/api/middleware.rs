//! API Middleware
//!
//! Per-request operation context and request logging.

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Request},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use crate::domain::OperationContext;

use super::routes::AppState;

/// Client-supplied correlation id
pub const CORRELATION_ID_HEADER: &str = "x-correlation-id";

/// Request id set by `SetRequestIdLayer`, used when no correlation id is sent
pub const REQUEST_ID_HEADER: &str = "x-request-id";

// =========================================================================
// Operation Context Middleware
// =========================================================================

fn header_uuid(headers: &HeaderMap, name: &str) -> Option<Uuid> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| Uuid::parse_str(s.trim()).ok())
}

/// Build the `OperationContext` for this request: correlation id from
/// `X-Correlation-Id`, else `X-Request-Id`, else a fresh one; deadline from
/// the configured request timeout.
pub async fn context_middleware(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let headers = request.headers();
    let correlation_id = header_uuid(headers, CORRELATION_ID_HEADER)
        .or_else(|| header_uuid(headers, REQUEST_ID_HEADER))
        .unwrap_or_else(Uuid::new_v4);

    let context = OperationContext::new()
        .with_correlation_id(correlation_id)
        .with_timeout(state.request_timeout);

    request.extensions_mut().insert(context);

    next.run(request).await
}

// =========================================================================
// mask_headers_for_logging
// =========================================================================

/// Headers that should be masked in logs
const SENSITIVE_HEADERS: &[&str] = &["authorization", "cookie", "set-cookie", "proxy-authorization"];

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

// =========================================================================
// Request Logging Middleware
// =========================================================================

/// Request logging middleware
pub async fn logging_middleware(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let headers = mask_headers_for_logging(request.headers());

    let correlation_id = request
        .extensions()
        .get::<OperationContext>()
        .and_then(|ctx| ctx.correlation_id);

    let start = std::time::Instant::now();

    tracing::info!(
        method = %method,
        uri = %uri,
        correlation_id = ?correlation_id,
        headers = ?headers,
        "Incoming request"
    );

    let response = next.run(request).await;
    let status = response.status();

    tracing::info!(
        method = %method,
        uri = %uri,
        status = %status,
        duration_ms = %start.elapsed().as_millis(),
        correlation_id = ?correlation_id,
        "Request completed"
    );

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_headers_for_logging() {
        let mut headers = HeaderMap::new();
        headers.insert("content-type", "application/json".parse().unwrap());
        headers.insert("authorization", "Bearer secret".parse().unwrap());
        headers.insert(
            "idempotency-key",
            "f65616ca-8b51-4af2-8342-84157b55cbb7".parse().unwrap(),
        );

        let masked = mask_headers_for_logging(&headers);

        let auth = masked.iter().find(|(k, _)| k == "authorization");
        let content_type = masked.iter().find(|(k, _)| k == "content-type");
        let key = masked.iter().find(|(k, _)| k == "idempotency-key");

        assert_eq!(auth.unwrap().1, "[REDACTED]");
        assert_eq!(content_type.unwrap().1, "application/json");
        assert_eq!(key.unwrap().1, "f65616ca-8b51-4af2-8342-84157b55cbb7");
    }

    #[test]
    fn test_header_uuid() {
        let id = Uuid::new_v4();
        let mut headers = HeaderMap::new();
        headers.insert(CORRELATION_ID_HEADER, id.to_string().parse().unwrap());
        headers.insert(REQUEST_ID_HEADER, "garbage".parse().unwrap());

        assert_eq!(header_uuid(&headers, CORRELATION_ID_HEADER), Some(id));
        assert_eq!(header_uuid(&headers, REQUEST_ID_HEADER), None);
        assert_eq!(header_uuid(&headers, "x-missing"), None);
    }
}
