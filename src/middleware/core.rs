use std::time::Duration;

use crate::dispatcher::{ApiResponse, HandlerRequest};

/// Hooks run by the dispatcher around every handler call.
///
/// `before` runs in registration order once the request is fully bound.
/// Every hook runs; the first response returned replaces the handler call.
/// `after` sees every response produced past that point, short-circuited
/// ones included, along with the handler latency.
pub trait Middleware: Send + Sync {
    fn before(&self, _req: &HandlerRequest) -> Option<ApiResponse> {
        None
    }

    fn after(&self, _req: &HandlerRequest, _res: &mut ApiResponse, _latency: Duration) {}
}
