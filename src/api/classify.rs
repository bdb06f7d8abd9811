// Error classification for HTTP failures.
// Pure functions mapping transport errors and error responses onto tagged ApiError variants.

use reqwest::StatusCode;
use serde_json::Value;

use crate::error::ApiError;

/// What the caller expected back, used to pick fallback messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseKind {
    Json,
    /// File download; error bodies arrive as raw bytes rather than parsed JSON.
    Binary,
}

/// Longest plain-text error body surfaced verbatim.
const MAX_TEXT_MESSAGE: usize = 300;

/// Classify a failure that happened before any HTTP status was received.
pub fn classify_transport(err: &reqwest::Error, base_url: &str) -> ApiError {
    if err.is_timeout() {
        ApiError::Timeout
    } else if err.is_connect() || (err.is_request() && err.status().is_none()) {
        ApiError::Connection {
            base_url: base_url.to_string(),
            detail: err.to_string(),
        }
    } else if err.is_decode() || err.is_body() {
        ApiError::Decode(err.to_string())
    } else {
        ApiError::Other(err.to_string())
    }
}

/// Classify a non-success response from its status and raw body.
pub fn classify_status(status: StatusCode, body: &[u8], kind: ResponseKind) -> ApiError {
    let message = decode_error_body(body).unwrap_or_else(|| fallback_message(status, kind));
    let code = status.as_u16();

    match status {
        StatusCode::UNAUTHORIZED => ApiError::Unauthorized { message },
        StatusCode::FORBIDDEN => ApiError::Forbidden { message },
        StatusCode::NOT_FOUND => ApiError::NotFound { message },
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => ApiError::Timeout,
        s if s.is_client_error() => ApiError::Validation {
            status: code,
            message,
        },
        s if s.is_server_error() => ApiError::Server {
            status: code,
            message,
        },
        _ => ApiError::Other(message),
    }
}

/// Extract a human-readable message from an error body.
///
/// Understands `{"detail": "..."}`, FastAPI validation lists
/// (`{"detail": [{"msg": "..."}]}`), `{"message": "..."}`, `{"error": "..."}`
/// and short plain-text bodies. The body may be a JSON object or raw bytes
/// from a binary download; both decode the same way.
pub fn decode_error_body(body: &[u8]) -> Option<String> {
    let text = std::str::from_utf8(body).ok()?.trim();
    if text.is_empty() {
        return None;
    }

    match serde_json::from_str::<Value>(text) {
        Ok(value) => message_from_json(&value),
        Err(_) => {
            // HTML error pages and other large bodies are not worth showing
            if text.len() <= MAX_TEXT_MESSAGE && !text.starts_with('<') {
                Some(text.to_string())
            } else {
                None
            }
        }
    }
}

fn message_from_json(value: &Value) -> Option<String> {
    match value.get("detail") {
        Some(Value::String(detail)) => return Some(detail.clone()),
        Some(Value::Array(items)) => {
            let messages: Vec<&str> = items
                .iter()
                .filter_map(|item| item.get("msg").and_then(Value::as_str))
                .collect();
            if !messages.is_empty() {
                return Some(messages.join("; "));
            }
        }
        Some(Value::Object(inner)) => {
            if let Some(Value::String(message)) = inner.get("message") {
                return Some(message.clone());
            }
        }
        _ => {}
    }

    ["message", "error"]
        .iter()
        .find_map(|field| value.get(*field).and_then(Value::as_str))
        .map(str::to_string)
}

fn fallback_message(status: StatusCode, kind: ResponseKind) -> String {
    match kind {
        ResponseKind::Json => format!(
            "Request failed with status {}{}",
            status.as_u16(),
            status
                .canonical_reason()
                .map(|r| format!(" ({})", r))
                .unwrap_or_default()
        ),
        ResponseKind::Binary => format!("Download failed with status {}", status.as_u16()),
    }
}
