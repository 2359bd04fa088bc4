use http::{Method, StatusCode};
use may_minihttp::{HttpService, Request, Response};
use serde_json::json;
use std::io;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

use super::request::read_request;
use super::response::write_api_response;
use crate::dispatcher::{ApiRequest, ApiResponse, Dispatcher};
use crate::middleware::MetricsMiddleware;
use crate::openapi::Document;

/// Built-in endpoint content, rendered once at startup.
struct Endpoints {
    openapi_json: Vec<u8>,
    openapi_yaml: Vec<u8>,
}

/// The `may_minihttp` service: built-in endpoints first, then the dispatcher.
///
/// Cloned once per connection; all state is behind `Arc`.
#[derive(Clone)]
pub struct AppService {
    dispatcher: Arc<Dispatcher>,
    endpoints: Arc<Endpoints>,
    metrics: Option<Arc<MetricsMiddleware>>,
}

impl AppService {
    /// Render the document in both formats up front so the endpoints never
    /// fail at request time.
    pub fn new(dispatcher: Arc<Dispatcher>, document: &Document) -> anyhow::Result<Self> {
        let openapi_json = document.to_json_pretty()?.into_bytes();
        let openapi_yaml = document.to_yaml()?.into_bytes();
        Ok(Self {
            dispatcher,
            endpoints: Arc::new(Endpoints {
                openapi_json,
                openapi_yaml,
            }),
            metrics: None,
        })
    }

    /// Serve `/metrics` from these counters. The middleware itself must also
    /// be registered on the dispatcher to see handler traffic.
    pub fn set_metrics_middleware(&mut self, metrics: Arc<MetricsMiddleware>) {
        self.metrics = Some(metrics);
    }

    #[must_use]
    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    /// Transport-independent entry point, also used by tests.
    pub fn respond(&self, req: ApiRequest) -> ApiResponse {
        if req.method == Method::GET {
            if let Some(res) = self.builtin(&req.path) {
                if let Some(metrics) = &self.metrics {
                    metrics.inc_top_level_request();
                }
                return res;
            }
        }
        self.dispatcher.handle(req)
    }

    fn builtin(&self, path: &str) -> Option<ApiResponse> {
        match path {
            "/health" => Some(health_endpoint()),
            "/openapi.json" => Some(
                ApiResponse::new(StatusCode::OK)
                    .with_body("application/json", self.endpoints.openapi_json.clone()),
            ),
            "/openapi.yaml" => Some(
                ApiResponse::new(StatusCode::OK)
                    .with_body("application/yaml", self.endpoints.openapi_yaml.clone()),
            ),
            "/metrics" => self.metrics.as_ref().map(|m| metrics_endpoint(m)),
            _ => None,
        }
    }
}

#[must_use]
pub fn health_endpoint() -> ApiResponse {
    ApiResponse::json(StatusCode::OK, &json!({ "status": "ok" }))
}

#[must_use]
pub fn metrics_endpoint(metrics: &MetricsMiddleware) -> ApiResponse {
    ApiResponse::new(StatusCode::OK).with_body(
        "text/plain; version=0.0.4",
        metrics.render_prometheus().into_bytes(),
    )
}

impl HttpService for AppService {
    fn call(&mut self, req: Request, res: &mut Response) -> io::Result<()> {
        let start = Instant::now();
        let api_req = match read_request(req, self.dispatcher.config().max_body_bytes) {
            Ok(api_req) => api_req,
            Err(err) => {
                warn!(error = %err, "Rejected unreadable request");
                let bad = ApiResponse::json(
                    StatusCode::BAD_REQUEST,
                    &json!({ "error": "malformed_request", "message": err.to_string() }),
                );
                write_api_response(res, bad);
                return Ok(());
            }
        };

        let request_id = api_req.request_id;
        let method = api_req.method.clone();
        let path = api_req.path.clone();
        let api_res = self.respond(api_req);
        info!(
            request_id = %request_id,
            method = %method,
            path = %path,
            status = api_res.status.as_u16(),
            body_bytes = api_res.body.len(),
            duration_us = start.elapsed().as_micros() as u64,
            "Request completed"
        );
        write_api_response(res, api_res);
        Ok(())
    }
}
