//! Middleware for logging requests and responses.

use axum::{
    body::{Body, Bytes},
    extract::Request,
    http::{HeaderValue, StatusCode, header::CONTENT_TYPE},
    middleware::Next,
    response::{IntoResponse, Response},
};

/// Request and response bodies longer than this many bytes are truncated in
/// `info` logs.
pub const LOG_BODY_LENGTH_LIMIT: usize = 64;

/// Log the request and response for each request.
///
/// Both the request and response are logged at the `info` level.
/// If a body is longer than [LOG_BODY_LENGTH_LIMIT] bytes, it is truncated
/// and the full body is logged at the `debug` level.
/// Binary bodies, such as PDF downloads, are logged by size only.
pub async fn logging_middleware(request: Request, next: Next) -> Response {
    let (parts, body) = request.into_parts();
    let bytes = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(error) => {
            tracing::error!("Could not read request body: {error}");
            return StatusCode::BAD_REQUEST.into_response();
        }
    };
    log_body(
        &format!("Received request: {} {}", parts.method, parts.uri),
        parts.headers.get(CONTENT_TYPE),
        &bytes,
    );

    let response = next.run(Request::from_parts(parts, Body::from(bytes))).await;

    let (parts, body) = response.into_parts();
    let bytes = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(error) => {
            tracing::error!("Could not read response body: {error}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };
    log_body(
        &format!("Sending response: {}", parts.status),
        parts.headers.get(CONTENT_TYPE),
        &bytes,
    );

    Response::from_parts(parts, Body::from(bytes))
}

fn is_text(content_type: Option<&HeaderValue>) -> bool {
    match content_type.and_then(|value| value.to_str().ok()) {
        Some(content_type) => {
            content_type.starts_with("application/json") || content_type.starts_with("text/")
        }
        None => true,
    }
}

fn log_body(summary: &str, content_type: Option<&HeaderValue>, bytes: &Bytes) {
    if !is_text(content_type) {
        tracing::info!("{summary}\nbody: <{} bytes>", bytes.len());
        return;
    }

    let body = String::from_utf8_lossy(bytes);
    if body.len() > LOG_BODY_LENGTH_LIMIT {
        tracing::info!("{summary}\nbody: {}...", truncate(&body, LOG_BODY_LENGTH_LIMIT));
        tracing::debug!("Full body: {body:?}");
    } else {
        tracing::info!("{summary}\nbody: {body:?}");
    }
}

/// Cut `text` to at most `limit` bytes without splitting a character.
fn truncate(text: &str, limit: usize) -> &str {
    if text.len() <= limit {
        return text;
    }

    let mut end = limit;
    while !text.is_char_boundary(end) {
        end -= 1;
    }

    &text[..end]
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::{is_text, truncate};

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("shamba", 3), "sha");
        assert_eq!(truncate("né", 2), "n");
        assert_eq!(truncate("short", 64), "short");
    }

    #[test]
    fn pdf_bodies_are_not_text() {
        assert!(!is_text(Some(&HeaderValue::from_static("application/pdf"))));
        assert!(is_text(Some(&HeaderValue::from_static(
            "text/csv; charset=utf-8"
        ))));
        assert!(is_text(None));
    }
}
