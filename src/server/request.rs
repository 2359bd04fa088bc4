use http::Method;
use may_minihttp::Request;
use std::fmt;
use std::io::{self, Read};
use tracing::debug;

use crate::dispatcher::ApiRequest;

/// The transport could not turn the wire request into an [`ApiRequest`].
#[derive(Debug)]
pub enum RequestError {
    InvalidMethod(String),
    Body(io::Error),
}

impl fmt::Display for RequestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestError::InvalidMethod(m) => write!(f, "invalid HTTP method '{m}'"),
            RequestError::Body(err) => write!(f, "failed to read request body: {err}"),
        }
    }
}

impl std::error::Error for RequestError {}

/// Convert a `may_minihttp` request.
///
/// At most `max_body_bytes + 1` body bytes are read, enough for the
/// dispatcher to see that a body is over the limit without buffering all
/// of it. Headers that are not valid UTF-8 are dropped.
pub fn read_request(req: Request, max_body_bytes: usize) -> Result<ApiRequest, RequestError> {
    let method = Method::from_bytes(req.method().as_bytes())
        .map_err(|_| RequestError::InvalidMethod(req.method().to_string()))?;
    let mut api = ApiRequest::new(method, req.path());

    let mut dropped = 0usize;
    for header in req.headers() {
        match std::str::from_utf8(header.value) {
            Ok(value) => api = api.with_header(header.name, value),
            Err(_) => dropped += 1,
        }
    }

    let limit = u64::try_from(max_body_bytes).unwrap_or(u64::MAX).saturating_add(1);
    let mut body = Vec::new();
    req.body()
        .take(limit)
        .read_to_end(&mut body)
        .map_err(RequestError::Body)?;

    debug!(
        request_id = %api.request_id,
        method = %api.method,
        path = %api.path,
        header_count = api.headers.len(),
        dropped_headers = dropped,
        query_count = api.query.len(),
        body_bytes = body.len(),
        "HTTP request parsed"
    );
    Ok(api.with_body(body))
}
