use http::header::{ACCEPT, CONTENT_TYPE};
use http::{Method, StatusCode};
use serde_json::Value;
use smallvec::SmallVec;
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

use super::negotiate::negotiate;
use super::request::{ApiRequest, CancellationToken, HandlerRequest};
use super::response::{ApiResponse, DispatchError};
use crate::config::DispatchConfig;
use crate::handlers::{HandlerError, HandlerOutput};
use crate::ids::{correlation_id, RequestId};
use crate::middleware::Middleware;
use crate::router::{MatchedRoute, RouteRegistry};
use crate::spec::{Encoding, ParamVec, ParameterDescriptor, RouteDescriptor};
use crate::validator::ParameterValidationError;

const MISSING_PARAMETER: &str = "required parameter is missing";

/// Turns an [`ApiRequest`] into an [`ApiResponse`].
///
/// The pipeline is resolve, bind query and header parameters, decode and
/// validate the body, negotiate the response encoding, run middleware and
/// the handler, then encode the output. Any step may end the request with a
/// [`DispatchError`]; the dispatcher itself never fails, and every response
/// carries the request id.
///
/// Shared freely across connections: everything it holds is immutable.
pub struct Dispatcher {
    registry: Arc<RouteRegistry>,
    config: DispatchConfig,
    middlewares: Vec<Arc<dyn Middleware>>,
}

impl Dispatcher {
    #[must_use]
    pub fn new(registry: Arc<RouteRegistry>, config: DispatchConfig) -> Self {
        Self {
            registry,
            config,
            middlewares: Vec::new(),
        }
    }

    pub fn add_middleware(&mut self, mw: Arc<dyn Middleware>) {
        self.middlewares.push(mw);
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<RouteRegistry> {
        &self.registry
    }

    #[must_use]
    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Run the full pipeline for one request.
    pub fn handle(&self, req: ApiRequest) -> ApiResponse {
        let request_id = req.request_id;
        let mut response = match self.run(req) {
            Ok(response) => response,
            Err(err) => {
                debug!(
                    request_id = %request_id,
                    error = err.id(),
                    status = err.status().as_u16(),
                    "Request rejected"
                );
                err.into_response()
            }
        };
        response.set_request_id(request_id);
        response
    }

    fn run(&self, req: ApiRequest) -> Result<ApiResponse, DispatchError> {
        checkpoint(&req.cancellation, req.request_id, &req.method, &req.path, "received")?;

        let matched = self.registry.resolve(&req.method, &req.path)?;
        let route = Arc::clone(&matched.route);

        let query_params = bind_parameters(route.query_parameters(), "query", |name| {
            Ok(req.query_param(name))
        })?;
        let header_params = bind_parameters(route.header_parameters(), "header", |name| {
            match req.headers.get(name) {
                None => Ok(None),
                Some(value) => value.to_str().map(Some).map_err(|_| {
                    ParameterValidationError::new(name, "header value is not visible ASCII")
                }),
            }
        })?;
        checkpoint(&req.cancellation, req.request_id, &req.method, &req.path, "parameters bound")?;

        let body = self.read_body(&req, &matched)?;
        let encoding = self.response_encoding(&req, &route)?;
        checkpoint(&req.cancellation, req.request_id, &req.method, &req.path, "body decoded")?;

        let request = HandlerRequest {
            request_id: req.request_id,
            method: req.method,
            path: req.path,
            route: Arc::clone(&route),
            path_params: matched.path_params,
            query_params,
            header_params,
            body,
            headers: req.headers,
            cancellation: req.cancellation,
        };
        Ok(self.invoke(&request, encoding))
    }

    /// Decode the body with the media type matching `Content-Type`, then
    /// validate it against that media type's schema.
    fn read_body(&self, req: &ApiRequest, matched: &MatchedRoute) -> Result<Option<Value>, DispatchError> {
        let Some(spec) = matched.route.request_body() else {
            return Ok(None);
        };
        if req.body.is_empty() {
            return if spec.is_required() {
                Err(DispatchError::BodyRequired)
            } else {
                Ok(None)
            };
        }
        if req.body.len() > self.config.max_body_bytes {
            warn!(
                request_id = %req.request_id,
                body_bytes = req.body.len(),
                max_body_bytes = self.config.max_body_bytes,
                "Request body too large"
            );
            return Err(DispatchError::MalformedBody(format!(
                "body of {} bytes exceeds the limit of {} bytes",
                req.body.len(),
                self.config.max_body_bytes
            )));
        }

        let supported: Vec<&'static str> = spec.content.iter().map(|m| m.encoding().mime()).collect();
        let content_type = req.headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok());
        let media = content_type
            .and_then(Encoding::from_media_type)
            .and_then(|enc| spec.media_for(enc))
            .ok_or_else(|| DispatchError::UnsupportedMediaType {
                content_type: content_type.map(str::to_string),
                supported,
            })?;

        let value = media
            .deserialize(&req.body)
            .map_err(|e| DispatchError::MalformedBody(e.to_string()))?;
        let violations = self
            .registry
            .validators()
            .validate(matched.index, media.encoding(), &value);
        if !violations.is_empty() {
            debug!(
                request_id = %req.request_id,
                handler_name = %matched.route.handler_name(),
                violations = ?violations,
                "Request body failed schema validation"
            );
            return Err(DispatchError::BodyValidation(violations));
        }
        Ok(Some(value))
    }

    fn response_encoding(&self, req: &ApiRequest, route: &RouteDescriptor) -> Result<Encoding, DispatchError> {
        let offered: SmallVec<[Encoding; 2]> = match route.default_response() {
            Some(res) if !res.content.is_empty() => res.content.iter().map(|m| m.encoding()).collect(),
            _ => SmallVec::from_slice(&[Encoding::Json]),
        };
        let accept = req.headers.get(ACCEPT).and_then(|v| v.to_str().ok());
        negotiate(accept, &offered, self.config.default_encoding()).ok_or_else(|| {
            DispatchError::NotAcceptable {
                available: offered.iter().map(|e| e.mime()).collect(),
            }
        })
    }

    /// Middleware and handler together. A panic in either ends up as a 500.
    fn invoke(&self, request: &HandlerRequest, encoding: Encoding) -> ApiResponse {
        let outcome = catch_unwind(AssertUnwindSafe(|| self.run_middleware(request, encoding)));
        outcome.unwrap_or_else(|panic| {
            let correlation_id = correlation_id();
            error!(
                request_id = %request.request_id,
                handler_name = %request.handler_name(),
                correlation_id = %correlation_id,
                panic_message = %panic_message(panic.as_ref()),
                "Middleware panicked"
            );
            DispatchError::Internal { correlation_id }.into_response()
        })
    }

    fn run_middleware(&self, request: &HandlerRequest, encoding: Encoding) -> ApiResponse {
        let mut early = None;
        for mw in &self.middlewares {
            let res = mw.before(request);
            if early.is_none() {
                early = res;
            }
        }

        let start = Instant::now();
        let mut response = match early {
            Some(res) => {
                debug!(
                    request_id = %request.request_id,
                    handler_name = %request.handler_name(),
                    status = res.status.as_u16(),
                    "Middleware returned early response"
                );
                res
            }
            None => self.call_handler(request, encoding),
        };
        let latency = start.elapsed();

        for mw in &self.middlewares {
            mw.after(request, &mut response, latency);
        }
        response
    }

    fn call_handler(&self, request: &HandlerRequest, encoding: Encoding) -> ApiResponse {
        let route = &request.route;
        let outcome = catch_unwind(AssertUnwindSafe(|| route.handler().handle(request)));
        let result = match outcome {
            Ok(Ok(output)) => checkpoint(
                &request.cancellation,
                request.request_id,
                &request.method,
                &request.path,
                "handler returned",
            )
            .and_then(|()| encode_output(route, output, encoding)),
            Ok(Err(err)) => Err(map_handler_error(request, err)),
            Err(panic) => {
                let correlation_id = correlation_id();
                error!(
                    request_id = %request.request_id,
                    handler_name = %route.handler_name(),
                    correlation_id = %correlation_id,
                    panic_message = %panic_message(panic.as_ref()),
                    "Handler panicked"
                );
                Err(DispatchError::Internal { correlation_id })
            }
        };
        result.unwrap_or_else(DispatchError::into_response)
    }
}

/// Stop between steps once the client has gone away.
fn checkpoint(
    token: &CancellationToken,
    request_id: RequestId,
    method: &Method,
    path: &str,
    step: &'static str,
) -> Result<(), DispatchError> {
    if token.is_cancelled() {
        info!(
            request_id = %request_id,
            method = %method,
            path = %path,
            step,
            "Request cancelled by client"
        );
        return Err(DispatchError::Cancelled);
    }
    Ok(())
}

/// Bind declared parameters from a raw lookup. Absent optional parameters
/// take their default, or are left out when there is none.
fn bind_parameters<'a, F>(
    params: &[ParameterDescriptor],
    location: &'static str,
    lookup: F,
) -> Result<ParamVec, DispatchError>
where
    F: Fn(&str) -> Result<Option<&'a str>, ParameterValidationError>,
{
    let mut bound = ParamVec::new();
    for param in params {
        let rejected = |error: ParameterValidationError| {
            debug!(
                parameter = %error.parameter,
                location,
                reason = %error.reason,
                "Parameter rejected"
            );
            DispatchError::InvalidParameter { location, error }
        };
        match lookup(&param.name).map_err(rejected)? {
            Some(raw) => {
                let value = param.validate_and_coerce(raw).map_err(rejected)?;
                bound.push((Arc::from(param.name.as_str()), value));
            }
            None if param.required => {
                return Err(rejected(ParameterValidationError::new(
                    &param.name,
                    MISSING_PARAMETER,
                )));
            }
            None => {
                if let Some(default) = &param.default {
                    bound.push((Arc::from(param.name.as_str()), default.clone()));
                }
            }
        }
    }
    Ok(bound)
}

fn encode_output(
    route: &RouteDescriptor,
    output: HandlerOutput,
    encoding: Encoding,
) -> Result<ApiResponse, DispatchError> {
    let success = route.default_response();
    let status = success.map_or(200, |r| r.status);
    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::OK);

    let value = match output {
        HandlerOutput::Empty => return Ok(ApiResponse::new(StatusCode::NO_CONTENT)),
        _ if status == StatusCode::NO_CONTENT => return Ok(ApiResponse::new(status)),
        HandlerOutput::Body(value) => value,
    };

    let media = success.and_then(|r| r.content.iter().find(|m| m.encoding() == encoding));
    let encoded = match media {
        Some(media) => media.serialize(&value).map_err(|e| e.to_string()),
        None => serde_json::to_vec(&value).map_err(|e| e.to_string()),
    };
    match encoded {
        Ok(body) => {
            let mime = media.map_or(Encoding::Json, |m| m.encoding()).mime();
            Ok(ApiResponse::new(status).with_body(mime, body))
        }
        Err(message) => {
            let correlation_id = correlation_id();
            error!(
                handler_name = %route.handler_name(),
                correlation_id = %correlation_id,
                encoding = %encoding,
                error = %message,
                "Failed to encode handler output"
            );
            Err(DispatchError::Internal { correlation_id })
        }
    }
}

fn map_handler_error(request: &HandlerRequest, err: HandlerError) -> DispatchError {
    match err {
        HandlerError::NotFound(msg) => DispatchError::NotFound(msg),
        HandlerError::AccessDenied(msg) => DispatchError::AccessDenied(msg),
        HandlerError::ValidationFailed(msg) => DispatchError::ValidationFailed(msg),
        HandlerError::Failure(err) => {
            let correlation_id = correlation_id();
            error!(
                request_id = %request.request_id,
                handler_name = %request.handler_name(),
                correlation_id = %correlation_id,
                error = ?err,
                "Handler failed"
            );
            DispatchError::Internal { correlation_id }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
