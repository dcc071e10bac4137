use axum::http::HeaderMap;

/// Identity used when a request carries no forwarding header.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Derives the rate-limit key for a request: the first entry of
/// `X-Forwarded-For`, trimmed, or `"unknown"`.
///
/// Every client without the header shares the `"unknown"` bucket.
pub fn client_identity(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .unwrap_or(UNKNOWN_CLIENT)
        .to_string()
}
