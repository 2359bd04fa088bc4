use std::fmt::Write as _;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use super::Middleware;
use crate::dispatcher::{ApiResponse, HandlerRequest};

/// Lock-free request counters, exposed in Prometheus text format.
///
/// Only requests that reach a handler are counted by the hooks; the server
/// counts its built-in endpoints through [`inc_top_level_request`].
///
/// [`inc_top_level_request`]: MetricsMiddleware::inc_top_level_request
#[derive(Default)]
pub struct MetricsMiddleware {
    request_count: AtomicU64,
    total_latency_ns: AtomicU64,
    /// Responses by status class, index 0 for 1xx through 4 for 5xx.
    status_classes: [AtomicU64; 5],
    top_level_requests: AtomicU64,
    stack_size: AtomicUsize,
}

impl MetricsMiddleware {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_count(&self) -> u64 {
        self.request_count.load(Ordering::Relaxed)
    }

    /// Zero until the first request completes.
    pub fn average_latency(&self) -> Duration {
        let count = self.request_count();
        if count == 0 {
            return Duration::ZERO;
        }
        Duration::from_nanos(self.total_latency_ns.load(Ordering::Relaxed) / count)
    }

    /// Responses seen for a status class such as `2` for 2xx.
    pub fn status_class_count(&self, class: u16) -> u64 {
        class
            .checked_sub(1)
            .and_then(|i| self.status_classes.get(usize::from(i)))
            .map_or(0, |c| c.load(Ordering::Relaxed))
    }

    pub fn inc_top_level_request(&self) {
        self.top_level_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn top_level_request_count(&self) -> u64 {
        self.top_level_requests.load(Ordering::Relaxed)
    }

    /// Stack size of the coroutine that served the last request.
    pub fn stack_size(&self) -> usize {
        self.stack_size.load(Ordering::Relaxed)
    }

    /// Prometheus text exposition of all counters.
    #[must_use]
    pub fn render_prometheus(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "# HELP apiroute_requests_total Requests dispatched to handlers");
        let _ = writeln!(out, "# TYPE apiroute_requests_total counter");
        let _ = writeln!(out, "apiroute_requests_total {}", self.request_count());

        let _ = writeln!(out, "# HELP apiroute_responses_total Handler responses by status class");
        let _ = writeln!(out, "# TYPE apiroute_responses_total counter");
        for class in 1..=5u16 {
            let _ = writeln!(
                out,
                "apiroute_responses_total{{class=\"{class}xx\"}} {}",
                self.status_class_count(class)
            );
        }

        let _ = writeln!(out, "# HELP apiroute_request_latency_seconds Average handler latency");
        let _ = writeln!(out, "# TYPE apiroute_request_latency_seconds gauge");
        let _ = writeln!(
            out,
            "apiroute_request_latency_seconds {:.6}",
            self.average_latency().as_secs_f64()
        );

        let _ = writeln!(out, "# HELP apiroute_top_level_requests_total Requests to built-in endpoints");
        let _ = writeln!(out, "# TYPE apiroute_top_level_requests_total counter");
        let _ = writeln!(out, "apiroute_top_level_requests_total {}", self.top_level_request_count());

        let _ = writeln!(out, "# HELP apiroute_coroutine_stack_bytes Coroutine stack size");
        let _ = writeln!(out, "# TYPE apiroute_coroutine_stack_bytes gauge");
        let _ = writeln!(out, "apiroute_coroutine_stack_bytes {}", self.stack_size());
        out
    }
}

impl Middleware for MetricsMiddleware {
    fn before(&self, _req: &HandlerRequest) -> Option<ApiResponse> {
        self.request_count.fetch_add(1, Ordering::Relaxed);
        None
    }

    fn after(&self, _req: &HandlerRequest, res: &mut ApiResponse, latency: Duration) {
        self.total_latency_ns
            .fetch_add(u64::try_from(latency.as_nanos()).unwrap_or(u64::MAX), Ordering::Relaxed);
        let class = usize::from(res.status.as_u16() / 100);
        if let Some(counter) = class.checked_sub(1).and_then(|i| self.status_classes.get(i)) {
            counter.fetch_add(1, Ordering::Relaxed);
        }
        let size = if may::coroutine::is_coroutine() {
            may::coroutine::current().stack_size()
        } else {
            may::config().get_stack_size()
        };
        self.stack_size.store(size, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_metrics_render_zeroes() {
        let metrics = MetricsMiddleware::new();
        assert_eq!(metrics.average_latency(), Duration::ZERO);
        let text = metrics.render_prometheus();
        assert!(text.contains("apiroute_requests_total 0"));
        assert!(text.contains("apiroute_responses_total{class=\"5xx\"} 0"));
    }

    #[test]
    fn top_level_requests_are_counted_separately() {
        let metrics = MetricsMiddleware::new();
        metrics.inc_top_level_request();
        metrics.inc_top_level_request();
        assert_eq!(metrics.top_level_request_count(), 2);
        assert_eq!(metrics.request_count(), 0);
        assert_eq!(metrics.status_class_count(0), 0);
        assert_eq!(metrics.status_class_count(9), 0);
    }
}
