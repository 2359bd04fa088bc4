use http::header::CONTENT_TYPE;
use http::{HeaderMap, HeaderValue, StatusCode};
use serde_json::{json, Map, Value};
use std::fmt;

use crate::ids::{RequestId, REQUEST_ID_HEADER};
use crate::router::RouteNotFound;
use crate::validator::ParameterValidationError;

/// Non-standard status for a request abandoned by its client.
pub const STATUS_CLIENT_CLOSED: u16 = 499;

/// The dispatcher's output: always produced, whatever happened upstream.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl ApiResponse {
    #[must_use]
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_body(mut self, content_type: &'static str, body: Vec<u8>) -> Self {
        self.headers
            .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
        self.body = body;
        self
    }

    /// JSON response from an already built value.
    #[must_use]
    pub fn json(status: StatusCode, body: &Value) -> Self {
        Self::new(status).with_body("application/json", body.to_string().into_bytes())
    }

    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok())
    }

    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Body parsed as JSON, if it is JSON.
    #[must_use]
    pub fn json_body(&self) -> Option<Value> {
        serde_json::from_slice(&self.body).ok()
    }

    pub(crate) fn set_request_id(&mut self, id: RequestId) {
        if let Ok(value) = HeaderValue::from_str(&id.to_string()) {
            self.headers.insert(REQUEST_ID_HEADER, value);
        }
    }
}

/// Every way a request can fail before or after the handler runs.
///
/// Each variant has a fixed status and a stable machine-readable identifier
/// written into the `error` field of the JSON body.
#[derive(Debug)]
pub enum DispatchError {
    Cancelled,
    RouteNotFound(RouteNotFound),
    InvalidParameter {
        location: &'static str,
        error: ParameterValidationError,
    },
    BodyRequired,
    UnsupportedMediaType {
        content_type: Option<String>,
        supported: Vec<&'static str>,
    },
    MalformedBody(String),
    BodyValidation(Vec<String>),
    NotAcceptable {
        available: Vec<&'static str>,
    },
    NotFound(String),
    AccessDenied(String),
    ValidationFailed(String),
    /// Unhandled failure. Only the correlation id reaches the client.
    Internal {
        correlation_id: String,
    },
}

impl DispatchError {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            DispatchError::Cancelled => {
                StatusCode::from_u16(STATUS_CLIENT_CLOSED).unwrap_or(StatusCode::BAD_REQUEST)
            }
            DispatchError::RouteNotFound(_) | DispatchError::NotFound(_) => StatusCode::NOT_FOUND,
            DispatchError::InvalidParameter { .. }
            | DispatchError::BodyRequired
            | DispatchError::MalformedBody(_)
            | DispatchError::BodyValidation(_)
            | DispatchError::ValidationFailed(_) => StatusCode::BAD_REQUEST,
            DispatchError::UnsupportedMediaType { .. } => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            DispatchError::NotAcceptable { .. } => StatusCode::NOT_ACCEPTABLE,
            DispatchError::AccessDenied(_) => StatusCode::FORBIDDEN,
            DispatchError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    #[must_use]
    pub fn id(&self) -> &'static str {
        match self {
            DispatchError::Cancelled => "request_cancelled",
            DispatchError::RouteNotFound(_) => "route_not_found",
            DispatchError::InvalidParameter { .. } => "invalid_parameter",
            DispatchError::BodyRequired => "body_required",
            DispatchError::UnsupportedMediaType { .. } => "unsupported_media_type",
            DispatchError::MalformedBody(_) => "malformed_body",
            DispatchError::BodyValidation(_) | DispatchError::ValidationFailed(_) => {
                "validation_failed"
            }
            DispatchError::NotAcceptable { .. } => "not_acceptable",
            DispatchError::NotFound(_) => "not_found",
            DispatchError::AccessDenied(_) => "access_denied",
            DispatchError::Internal { .. } => "internal_error",
        }
    }

    /// Fields added to the body beyond `error` and `message`.
    fn extra(&self) -> Map<String, Value> {
        let mut extra = Map::new();
        match self {
            DispatchError::RouteNotFound(e) => {
                extra.insert("method".to_string(), json!(e.method.as_str()));
                extra.insert("path".to_string(), json!(e.path));
            }
            DispatchError::InvalidParameter { location, error } => {
                extra.insert("parameter".to_string(), json!(error.parameter));
                extra.insert("location".to_string(), json!(location));
                extra.insert("reason".to_string(), json!(error.reason));
            }
            DispatchError::UnsupportedMediaType { supported, .. } => {
                extra.insert("supported".to_string(), json!(supported));
            }
            DispatchError::NotAcceptable { available } => {
                extra.insert("available".to_string(), json!(available));
            }
            DispatchError::BodyValidation(details) => {
                extra.insert("details".to_string(), json!(details));
            }
            DispatchError::Internal { correlation_id } => {
                extra.insert("correlation_id".to_string(), json!(correlation_id));
            }
            _ => {}
        }
        extra
    }

    #[must_use]
    pub fn into_response(self) -> ApiResponse {
        let mut body = self.extra();
        body.insert("error".to_string(), json!(self.id()));
        body.insert("message".to_string(), json!(self.to_string()));
        ApiResponse::json(self.status(), &Value::Object(body))
    }
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchError::Cancelled => f.write_str("the request was cancelled by the client"),
            DispatchError::RouteNotFound(e) => write!(f, "{e}"),
            DispatchError::InvalidParameter { location, error } => {
                write!(f, "invalid {location} parameter '{}': {}", error.parameter, error.reason)
            }
            DispatchError::BodyRequired => f.write_str("a request body is required"),
            DispatchError::UnsupportedMediaType {
                content_type: Some(ct),
                ..
            } => write!(f, "content type '{ct}' is not accepted by this route"),
            DispatchError::UnsupportedMediaType {
                content_type: None,
                ..
            } => f.write_str("the request body has no Content-Type"),
            DispatchError::MalformedBody(msg) => write!(f, "malformed request body: {msg}"),
            DispatchError::BodyValidation(details) => write!(
                f,
                "request body failed validation with {} error(s)",
                details.len()
            ),
            DispatchError::NotAcceptable { .. } => {
                f.write_str("none of the available representations is acceptable")
            }
            DispatchError::NotFound(msg)
            | DispatchError::AccessDenied(msg)
            | DispatchError::ValidationFailed(msg) => f.write_str(msg),
            DispatchError::Internal { .. } => f.write_str("an internal error occurred"),
        }
    }
}

impl std::error::Error for DispatchError {}

impl From<RouteNotFound> for DispatchError {
    fn from(err: RouteNotFound) -> Self {
        DispatchError::RouteNotFound(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Method;

    #[test]
    fn not_found_body_is_machine_readable() {
        let res = DispatchError::RouteNotFound(RouteNotFound {
            method: Method::GET,
            path: "/nope".to_string(),
        })
        .into_response();
        assert_eq!(res.status, StatusCode::NOT_FOUND);
        let body = res.json_body().unwrap();
        assert_eq!(body["error"], "route_not_found");
        assert_eq!(body["path"], "/nope");
        assert!(!body["message"].as_str().unwrap().is_empty());
    }

    #[test]
    fn internal_error_carries_only_correlation_id() {
        let res = DispatchError::Internal {
            correlation_id: "01J0000000000000000000000".to_string(),
        }
        .into_response();
        let body = res.json_body().unwrap();
        assert_eq!(body["message"], "an internal error occurred");
        assert_eq!(body.as_object().unwrap().len(), 3);
    }

    #[test]
    fn cancelled_uses_client_closed_status() {
        assert_eq!(DispatchError::Cancelled.status().as_u16(), STATUS_CLIENT_CLOSED);
    }
}
