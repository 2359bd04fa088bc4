//! `may_minihttp` transport adapter.
//!
//! Converts wire requests into [`ApiRequest`](crate::dispatcher::ApiRequest)s,
//! serves `/health`, `/openapi.json`, `/openapi.yaml` and `/metrics` itself,
//! and hands everything else to the dispatcher. Each connection runs on its
//! own `may` coroutine.

mod http_server;
mod request;
mod response;
mod service;

pub use http_server::{HttpServer, ServerHandle};
pub use request::{read_request, RequestError};
pub use response::write_api_response;
pub use service::{health_endpoint, metrics_endpoint, AppService};
