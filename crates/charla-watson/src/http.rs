//! Shared response handling for the service clients.

use charla_core::error::CharlaError;

/// Pass a successful response through, or turn it into an upstream error
/// carrying the service's own message.
pub(crate) async fn check_status(
    service: &str,
    resp: reqwest::Response,
) -> Result<reqwest::Response, CharlaError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let body = resp.text().await.unwrap_or_default();
    let message = error_message(&body).unwrap_or_else(|| {
        let trimmed = body.trim();
        if trimmed.is_empty() {
            status.canonical_reason().unwrap_or("no details").to_string()
        } else {
            trimmed.to_string()
        }
    });

    tracing::warn!(service, status = status.as_u16(), error = %message, "Upstream call failed");
    Err(CharlaError::Upstream(format!(
        "{} returned {}: {}",
        service,
        status.as_u16(),
        message
    )))
}

/// Map a transport failure (connect, timeout, decode) to an upstream error.
pub(crate) fn transport_error(service: &str, err: reqwest::Error) -> CharlaError {
    let kind = if err.is_timeout() {
        "timed out"
    } else if err.is_connect() {
        "connection failed"
    } else if err.is_decode() {
        "returned an unreadable body"
    } else {
        "request failed"
    };
    tracing::warn!(service, error = %err, "{} {}", service, kind);
    CharlaError::Upstream(format!("{} {}: {}", service, kind, err))
}

/// Pull a human-readable message out of a JSON error body.
fn error_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    ["error", "errorMessage", "message"]
        .iter()
        .find_map(|key| value.get(*key).and_then(|v| v.as_str()))
        .map(str::to_string)
}
