//! Declarative route metadata.
//!
//! Everything a route knows about itself lives here: parameters, body
//! shapes, media types, responses and security. The registry, dispatcher and
//! OpenAPI emitter all read the same descriptors.

mod media;
mod route;
mod schema;
mod security;
mod types;

pub use media::{
    ContractViolation, Encoding, MediaType, MediaTypeBuilder, MediaTypeError,
    DEFAULT_EXAMPLE_NAME,
};
pub use route::{
    split_path, ParamVec, PathSegments, RequestBody, ResponseSpec, RouteBuildError, RouteBuilder,
    RouteDescriptor, Segment, MAX_INLINE_PARAMS,
};
pub use schema::{ApiSchema, Primitive, Property, SchemaKind, SchemaObject};
pub use security::{SecurityRequirement, SecurityScheme};
pub use types::{Example, ParameterDescriptor, ParameterLocation, SemanticType, TypedValue};
