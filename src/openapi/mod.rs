//! # OpenAPI Emitter
//!
//! Produces an OpenAPI 3.1 document from the same route descriptors the
//! dispatcher serves, so the published contract cannot drift from the
//! running code.
//!
//! - one path item per template, one operation per method
//! - parameters in path, query, header order
//! - request bodies and responses with one content entry per media type,
//!   singular examples normalised into the plural `examples` map
//! - schemas marked as referenced written once under `components.schemas`
//! - declared security schemes under `components.securitySchemes`
//!
//! The document is deterministic: emitting twice from the same registry
//! yields identical bytes, which keeps generated docs diffable in CI.

mod emitter;

pub use emitter::{emit, Document, OpenApiInfo, OPENAPI_VERSION};
