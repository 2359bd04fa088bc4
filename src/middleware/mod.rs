//! Hooks around handler invocation.
//!
//! Middlewares are registered on the [`Dispatcher`](crate::dispatcher::Dispatcher)
//! and see each request after routing and binding, so they can rely on typed
//! parameters and the resolved route.

mod core;
mod metrics;
mod tracing;

pub use core::Middleware;
pub use metrics::MetricsMiddleware;
pub use tracing::TracingMiddleware;
