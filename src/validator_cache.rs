//! Precompiled request-body validators.
//!
//! JSON Schema validators are expensive to compile, so every request body
//! schema is compiled exactly once, when the registry is built. The cache is
//! immutable afterwards and shared between concurrent dispatches without
//! locking.
//!
//! Keys are `(route index, encoding)`: the same route may accept JSON and XML
//! bodies with different schemas.

use jsonschema::Validator;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

use crate::spec::{Encoding, RouteDescriptor};

/// A schema that could not be compiled into a validator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaCompileError {
    pub route: String,
    pub encoding: Encoding,
    pub message: String,
}

impl std::fmt::Display for SchemaCompileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "request body schema for {} ({}) does not compile: {}",
            self.route, self.encoding, self.message
        )
    }
}

impl std::error::Error for SchemaCompileError {}

#[derive(Clone, Default)]
pub struct ValidatorCache {
    validators: HashMap<(usize, Encoding), Arc<Validator>>,
}

impl std::fmt::Debug for ValidatorCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValidatorCache")
            .field("size", &self.validators.len())
            .finish()
    }
}

impl ValidatorCache {
    /// Compile a validator for every request body media type of every route.
    pub fn precompile(routes: &[Arc<RouteDescriptor>]) -> Result<Self, SchemaCompileError> {
        let mut validators = HashMap::new();
        for (idx, route) in routes.iter().enumerate() {
            let Some(body) = route.request_body() else {
                continue;
            };
            for media in &body.content {
                let schema = media.schema().describe_inline();
                let validator =
                    jsonschema::validator_for(&schema).map_err(|e| SchemaCompileError {
                        route: route.path_template().to_string(),
                        encoding: media.encoding(),
                        message: e.to_string(),
                    })?;
                debug!(
                    route = %route.path_template(),
                    handler_name = %route.handler_name(),
                    encoding = %media.encoding(),
                    "Request body validator compiled"
                );
                validators.insert((idx, media.encoding()), Arc::new(validator));
            }
        }
        info!(
            validators = validators.len(),
            "Request body validators precompiled"
        );
        Ok(Self { validators })
    }

    #[must_use]
    pub fn get(&self, route_idx: usize, encoding: Encoding) -> Option<&Arc<Validator>> {
        self.validators.get(&(route_idx, encoding))
    }

    /// Validate `body` for the given route and encoding. Returns one message
    /// per violation; an empty list means the body is valid.
    #[must_use]
    pub fn validate(
        &self,
        route_idx: usize,
        encoding: Encoding,
        body: &serde_json::Value,
    ) -> Vec<String> {
        match self.get(route_idx, encoding) {
            Some(validator) => validator.iter_errors(body).map(|e| e.to_string()).collect(),
            None => Vec::new(),
        }
    }

    #[must_use]
    pub fn size(&self) -> usize {
        self.validators.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatcher::HandlerRequest;
    use crate::handlers::{HandlerOutput, HandlerResult};
    use crate::spec::{MediaType, RequestBody, ResponseSpec, SchemaObject};
    use http::Method;
    use serde_json::json;

    fn noop(_req: &HandlerRequest) -> HandlerResult {
        Ok(HandlerOutput::Empty)
    }

    fn routes() -> Vec<Arc<RouteDescriptor>> {
        let schema = SchemaObject::object().property("name", SchemaObject::string(), true);
        let body = RequestBody::new()
            .content(MediaType::json(schema.clone()).required(true).build().unwrap())
            .content(MediaType::xml(schema).build().unwrap());
        vec![
            Arc::new(
                RouteDescriptor::builder("/plain", "plain", noop)
                    .method(Method::GET)
                    .success(ResponseSpec::new(204, "ok"))
                    .build()
                    .unwrap(),
            ),
            Arc::new(
                RouteDescriptor::builder("/items", "create", noop)
                    .method(Method::POST)
                    .request_body(body)
                    .success(ResponseSpec::new(201, "created"))
                    .build()
                    .unwrap(),
            ),
        ]
    }

    #[test]
    fn one_validator_per_body_encoding() {
        let cache = ValidatorCache::precompile(&routes()).unwrap();
        assert_eq!(cache.size(), 2);
        assert!(cache.get(0, Encoding::Json).is_none());
        assert!(cache.get(1, Encoding::Xml).is_some());
    }

    #[test]
    fn violations_are_reported() {
        let cache = ValidatorCache::precompile(&routes()).unwrap();
        assert!(cache.validate(1, Encoding::Json, &json!({ "name": "x" })).is_empty());
        let errors = cache.validate(1, Encoding::Json, &json!({ "name": 3 }));
        assert_eq!(errors.len(), 1);
        assert!(!cache.validate(1, Encoding::Json, &json!({})).is_empty());
    }
}
