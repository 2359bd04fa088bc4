use http::{HeaderMap, HeaderName, HeaderValue, Method};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::handlers::HandlerError;
use crate::ids::{RequestId, REQUEST_ID_HEADER};
use crate::spec::{ParamVec, RouteDescriptor, TypedValue};

/// Signals that the client has gone away.
///
/// The transport sets it; the dispatcher checks it between pipeline steps
/// and handlers may poll it to stop early. Clones share the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// An inbound request as seen by the dispatcher, independent of transport.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub request_id: RequestId,
    pub method: Method,
    /// Path without the query string.
    pub path: String,
    /// Decoded query pairs in arrival order.
    pub query: Vec<(String, String)>,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
    pub cancellation: CancellationToken,
}

impl ApiRequest {
    /// Build a request from a method and a request target such as
    /// `/event/54?repeat=true`.
    #[must_use]
    pub fn new(method: Method, target: &str) -> Self {
        let (path, query) = match target.split_once('?') {
            Some((path, qs)) => (path, parse_query(qs)),
            None => (target, Vec::new()),
        };
        Self {
            request_id: RequestId::new(),
            method,
            path: path.to_string(),
            query,
            headers: HeaderMap::new(),
            body: Vec::new(),
            cancellation: CancellationToken::new(),
        }
    }

    /// Add a header. Names or values that are not valid HTTP are dropped.
    #[must_use]
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            if name.as_str() == REQUEST_ID_HEADER {
                self.request_id = RequestId::from_header_or_new(value.to_str().ok());
            }
            self.headers.append(name, value);
        }
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// Last value wins when a name repeats.
    #[must_use]
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .rfind(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Header value by case-insensitive name, if it is valid visible ASCII.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// Parse a raw query string into decoded pairs.
#[must_use]
pub fn parse_query(qs: &str) -> Vec<(String, String)> {
    url::form_urlencoded::parse(qs.as_bytes())
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect()
}

/// Context handed to a handler: typed parameters, the decoded body and the
/// raw headers.
#[derive(Debug, Clone)]
pub struct HandlerRequest {
    pub request_id: RequestId,
    pub method: Method,
    pub path: String,
    pub route: Arc<RouteDescriptor>,
    pub path_params: ParamVec,
    /// Optional parameters that were absent and have no default are missing.
    pub query_params: ParamVec,
    pub header_params: ParamVec,
    pub body: Option<Value>,
    pub headers: HeaderMap,
    pub cancellation: CancellationToken,
}

fn lookup<'a>(params: &'a ParamVec, name: &str) -> Option<&'a TypedValue> {
    params
        .iter()
        .find(|(k, _)| k.as_ref() == name)
        .map(|(_, v)| v)
}

impl HandlerRequest {
    #[must_use]
    pub fn handler_name(&self) -> &str {
        self.route.handler_name()
    }

    #[inline]
    #[must_use]
    pub fn path_param(&self, name: &str) -> Option<&TypedValue> {
        lookup(&self.path_params, name)
    }

    #[inline]
    #[must_use]
    pub fn query_param(&self, name: &str) -> Option<&TypedValue> {
        lookup(&self.query_params, name)
    }

    /// Bound header parameter; `name` is matched case-insensitively.
    #[inline]
    #[must_use]
    pub fn header_param(&self, name: &str) -> Option<&TypedValue> {
        self.header_params
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v)
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Deserialize the body into `T`. A missing or mismatched body is a
    /// validation failure.
    pub fn body_as<T: DeserializeOwned>(&self) -> Result<T, HandlerError> {
        let body = self
            .body
            .clone()
            .ok_or_else(|| HandlerError::ValidationFailed("request body is missing".to_string()))?;
        serde_json::from_value(body).map_err(|e| HandlerError::ValidationFailed(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_is_split_into_path_and_query() {
        let req = ApiRequest::new(Method::GET, "/a/b?x=1&y=two%20words&x=3");
        assert_eq!(req.path, "/a/b");
        assert_eq!(req.query_param("x"), Some("3"));
        assert_eq!(req.query_param("y"), Some("two words"));
        assert_eq!(req.query_param("z"), None);
    }

    #[test]
    fn request_id_header_is_adopted() {
        let id = RequestId::new();
        let req = ApiRequest::new(Method::GET, "/").with_header("X-Request-Id", &id.to_string());
        assert_eq!(req.request_id, id);
        assert_eq!(req.header("x-request-id"), Some(id.to_string().as_str()));
    }

    #[test]
    fn cancellation_is_shared_between_clones() {
        let token = CancellationToken::new();
        let req = ApiRequest::new(Method::GET, "/").with_cancellation(token.clone());
        token.cancel();
        assert!(req.cancellation.is_cancelled());
    }
}
