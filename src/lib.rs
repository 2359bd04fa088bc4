//! # apiroute
//!
//! Declarative HTTP routing with typed parameters, content negotiation and an
//! OpenAPI 3.1 document generated from the same route descriptors that serve
//! traffic.
//!
//! ## Architecture
//!
//! - **[`spec`]** - route, parameter, schema, media type and security descriptors
//! - **[`validator`]** - coercion of raw parameter strings into typed values
//! - **[`validator_cache`]** - request body JSON Schema validators, compiled once
//! - **[`router`]** - the route registry and its segment tree
//! - **[`dispatcher`]** - the per-request pipeline and error mapping
//! - **[`handlers`]** - the contract handlers implement
//! - **[`middleware`]** - hooks around handler calls (tracing, metrics)
//! - **[`openapi`]** - the document emitter
//! - **[`server`]** - the `may_minihttp` transport adapter
//! - **[`config`]**, **[`logging`]**, **[`runtime_config`]** - service plumbing
//! - **[`demo`]** - sample controllers used by the binary and the tests
//!
//! ## Request flow
//!
//! ```text
//! may_minihttp ─► server::AppService ─► Dispatcher::handle
//!                                         ├─ RouteRegistry::resolve   (404)
//!                                         ├─ bind query / header      (400)
//!                                         ├─ decode + validate body   (400 / 415)
//!                                         ├─ negotiate Accept         (406)
//!                                         ├─ middleware + handler     (403 / 404 / 500)
//!                                         └─ encode output            (200 / 201 / 204)
//! ```
//!
//! ## Defining a route
//!
//! ```rust,ignore
//! use apiroute::spec::{ParameterDescriptor, ResponseSpec, RouteDescriptor, SemanticType};
//!
//! let route = RouteDescriptor::builder("/event/{event}", "get_event", get_event)
//!     .method(http::Method::GET)
//!     .parameter(ParameterDescriptor::path("event", SemanticType::Int))
//!     .success(ResponseSpec::new(200, "The event"))
//!     .build()?;
//!
//! let mut builder = apiroute::router::RouteRegistry::builder();
//! builder.register(route)?;
//! let registry = builder.build()?;
//! ```

pub mod cli;
pub mod config;
pub mod demo;
pub mod dispatcher;
pub mod handlers;
pub mod ids;
pub mod logging;
pub mod middleware;
pub mod openapi;
pub mod router;
pub mod runtime_config;
pub mod server;
pub mod spec;
pub mod validator;
pub mod validator_cache;

pub use dispatcher::{ApiRequest, ApiResponse, Dispatcher};
pub use handlers::{Handler, HandlerError, HandlerOutput, HandlerResult};
pub use router::{RegistryError, RouteRegistry};
