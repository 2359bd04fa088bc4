use http::header::CONTENT_TYPE;
use may_minihttp::Response;

use crate::dispatcher::{ApiResponse, STATUS_CLIENT_CLOSED};

/// `may_minihttp` only takes `'static` header lines, so every content type
/// the service produces has a fixed line here.
fn content_type_line(content_type: &str) -> Option<&'static str> {
    match content_type {
        "application/json" => Some("Content-Type: application/json"),
        "application/xml" => Some("Content-Type: application/xml"),
        "application/yaml" => Some("Content-Type: application/yaml"),
        "text/plain; version=0.0.4" => Some("Content-Type: text/plain; version=0.0.4"),
        "text/plain" => Some("Content-Type: text/plain"),
        _ => None,
    }
}

fn reason_phrase(status: u16) -> &'static str {
    if status == STATUS_CLIENT_CLOSED {
        return "Client Closed Request";
    }
    http::StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or("Unknown")
}

/// Write an [`ApiResponse`] onto the wire.
///
/// Headers other than `Content-Type` are not written: the transport has no
/// way to emit per-request header values.
pub fn write_api_response(res: &mut Response, api: ApiResponse) {
    let status = api.status.as_u16();
    res.status_code(usize::from(status), reason_phrase(status));
    if let Some(line) = api
        .headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(content_type_line)
    {
        res.header(line);
    }
    if !api.body.is_empty() {
        res.body_vec(api.body);
    }
}
