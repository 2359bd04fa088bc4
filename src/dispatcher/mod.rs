//! # Dispatcher
//!
//! Drives one request from the transport's [`ApiRequest`] to an
//! [`ApiResponse`]:
//!
//! 1. resolve the route and its typed path parameters
//! 2. bind query and header parameters, applying defaults
//! 3. decode the body with the media type named by `Content-Type` and
//!    validate it against the route's schema
//! 4. negotiate the response encoding from `Accept`
//! 5. run middleware and the handler, catching panics
//! 6. encode the handler output with the route's success response
//!
//! Every failure maps to a [`DispatchError`] with a fixed status and a JSON
//! body of the form `{"error": "<id>", "message": "..."}`. Unhandled handler
//! failures are logged with a correlation id; the client only sees the id.
//!
//! Handlers run on the calling coroutine. The server spawns one coroutine per
//! connection, so a slow handler only holds up its own connection.
//!
//! ```rust,ignore
//! use apiroute::dispatcher::{ApiRequest, Dispatcher};
//!
//! let dispatcher = Dispatcher::new(registry, config.dispatch.clone());
//! let res = dispatcher.handle(ApiRequest::new(Method::GET, "/event/54"));
//! assert_eq!(res.status, 200);
//! ```

mod core;
mod negotiate;
mod request;
mod response;

pub use core::Dispatcher;
pub use negotiate::negotiate;
pub use request::{parse_query, ApiRequest, CancellationToken, HandlerRequest};
pub use response::{ApiResponse, DispatchError, STATUS_CLIENT_CLOSED};
