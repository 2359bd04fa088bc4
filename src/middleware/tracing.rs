use std::time::Duration;

use tracing::{debug, info, info_span};

use super::Middleware;
use crate::dispatcher::{ApiResponse, HandlerRequest};

/// Emits handler start and completion events inside a `request` span.
///
/// Coroutines can move between threads, so no span guard is held across the
/// two hooks; each hook opens a span with the same request fields instead.
pub struct TracingMiddleware;

fn request_span(req: &HandlerRequest) -> tracing::Span {
    info_span!(
        "request",
        request_id = %req.request_id,
        method = %req.method,
        path = %req.path,
        handler = %req.handler_name(),
    )
}

impl Middleware for TracingMiddleware {
    fn before(&self, req: &HandlerRequest) -> Option<ApiResponse> {
        request_span(req).in_scope(|| {
            debug!(
                path_params = ?req.path_params,
                query_params = ?req.query_params,
                has_body = req.body.is_some(),
                "Handler start"
            );
        });
        None
    }

    fn after(&self, req: &HandlerRequest, res: &mut ApiResponse, latency: Duration) {
        request_span(req).in_scope(|| {
            info!(
                status = res.status.as_u16(),
                latency_us = latency.as_micros() as u64,
                body_bytes = res.body.len(),
                "Handler complete"
            );
        });
    }
}
