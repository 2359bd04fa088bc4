//! Route registry - built once, then read-only on the request path.

use http::Method;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::radix::RadixTree;
use crate::spec::{
    split_path, ContractViolation, ParamVec, ParameterLocation, RouteBuildError,
    RouteDescriptor, SchemaObject, SecurityScheme, TypedValue,
};
use crate::validator_cache::{SchemaCompileError, ValidatorCache};

/// Errors raised while building the registry. All of them are fatal startup
/// configuration errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// Same method and path template (placeholder names ignored) registered twice.
    DuplicateRoute { method: Method, path_template: String },
    InvalidRoute(RouteBuildError),
    Contract(ContractViolation),
    UnknownSecurityScheme { route: String, scheme: String },
    /// A declared scheme that OpenAPI cannot express.
    InvalidSecurityScheme { name: String, reason: String },
    /// Two different schemas claim the same component name.
    ConflictingSchema { name: String },
    SchemaCompile(SchemaCompileError),
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryError::DuplicateRoute {
                method,
                path_template,
            } => write!(f, "duplicate route: {method} {path_template} is already registered"),
            RegistryError::InvalidRoute(err) => write!(f, "{err}"),
            RegistryError::Contract(err) => write!(f, "{err}"),
            RegistryError::UnknownSecurityScheme { route, scheme } => write!(
                f,
                "route {route} requires security scheme '{scheme}' which is not declared"
            ),
            RegistryError::InvalidSecurityScheme { name, reason } => {
                write!(f, "security scheme '{name}' is invalid: {reason}")
            }
            RegistryError::ConflictingSchema { name } => write!(
                f,
                "schema name '{name}' is used by two different schema definitions"
            ),
            RegistryError::SchemaCompile(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for RegistryError {}

impl From<RouteBuildError> for RegistryError {
    fn from(err: RouteBuildError) -> Self {
        RegistryError::InvalidRoute(err)
    }
}

impl From<ContractViolation> for RegistryError {
    fn from(err: ContractViolation) -> Self {
        RegistryError::Contract(err)
    }
}

impl From<SchemaCompileError> for RegistryError {
    fn from(err: SchemaCompileError) -> Self {
        RegistryError::SchemaCompile(err)
    }
}

/// No route accepts this method and path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteNotFound {
    pub method: Method,
    pub path: String,
}

impl fmt::Display for RouteNotFound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "no route matches {} {}", self.method, self.path)
    }
}

impl std::error::Error for RouteNotFound {}

/// A resolved request: the route plus its coerced path parameters.
#[derive(Debug, Clone)]
pub struct MatchedRoute {
    pub route: Arc<RouteDescriptor>,
    /// Position of the route in the registry, stable for the registry's lifetime.
    pub index: usize,
    pub path_params: ParamVec,
}

impl MatchedRoute {
    #[inline]
    #[must_use]
    pub fn get_path_param(&self, name: &str) -> Option<&TypedValue> {
        self.path_params
            .iter()
            .find(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v)
    }
}

/// Collects routes and security schemes, then freezes them into a
/// [`RouteRegistry`].
#[derive(Default)]
pub struct RegistryBuilder {
    routes: Vec<Arc<RouteDescriptor>>,
    keys: HashSet<(Method, String)>,
    security_schemes: BTreeMap<String, SecurityScheme>,
}

impl RegistryBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a route. Fails if any of its methods is already registered for
    /// the same template; nothing is added in that case.
    pub fn register(&mut self, route: RouteDescriptor) -> Result<(), RegistryError> {
        let normalized = route.normalized_template();
        for method in route.methods() {
            if self.keys.contains(&(method.clone(), normalized.clone())) {
                warn!(
                    method = %method,
                    path_template = %route.path_template(),
                    handler_name = %route.handler_name(),
                    "Duplicate route rejected"
                );
                return Err(RegistryError::DuplicateRoute {
                    method: method.clone(),
                    path_template: route.path_template().to_string(),
                });
            }
        }
        for method in route.methods() {
            self.keys.insert((method.clone(), normalized.clone()));
        }
        debug!(
            methods = ?route.methods(),
            path_template = %route.path_template(),
            handler_name = %route.handler_name(),
            "Route registered"
        );
        self.routes.push(Arc::new(route));
        Ok(())
    }

    /// Declare a named authentication scheme routes may refer to.
    pub fn security_scheme(&mut self, name: impl Into<String>, scheme: SecurityScheme) -> &mut Self {
        self.security_schemes.insert(name.into(), scheme);
        self
    }

    pub fn build(self) -> Result<RouteRegistry, RegistryError> {
        for (name, scheme) in &self.security_schemes {
            if let SecurityScheme::ApiKey {
                location: ParameterLocation::Path,
                ..
            } = scheme
            {
                return Err(RegistryError::InvalidSecurityScheme {
                    name: name.clone(),
                    reason: "an API key is sent in a query parameter or a header".to_string(),
                });
            }
        }
        for route in &self.routes {
            for req in route.security().unwrap_or_default() {
                if !self.security_schemes.contains_key(&req.scheme) {
                    return Err(RegistryError::UnknownSecurityScheme {
                        route: route.path_template().to_string(),
                        scheme: req.scheme.clone(),
                    });
                }
            }
        }

        check_schema_names(&self.routes)?;
        let validators = ValidatorCache::precompile(&self.routes)?;

        let mut tree = RadixTree::default();
        for (idx, route) in self.routes.iter().enumerate() {
            tree.insert(route, idx);
        }

        let routes_summary: Vec<String> = self
            .routes
            .iter()
            .take(10)
            .map(|r| format!("{:?} {}", r.methods(), r.path_template()))
            .collect();
        info!(
            routes_count = self.routes.len(),
            tree_nodes = tree.node_count(),
            security_schemes = self.security_schemes.len(),
            routes_summary = ?routes_summary,
            "Routing table loaded"
        );

        Ok(RouteRegistry {
            routes: self.routes,
            tree,
            validators,
            security_schemes: self.security_schemes,
        })
    }
}

/// Every referenced schema name must map to a single definition.
fn check_schema_names(routes: &[Arc<RouteDescriptor>]) -> Result<(), RegistryError> {
    fn walk<'a>(
        schema: &'a SchemaObject,
        seen: &mut HashMap<&'a str, &'a SchemaObject>,
    ) -> Result<(), RegistryError> {
        if let Some(name) = schema.reference_name() {
            match seen.get(name) {
                Some(existing) if *existing != schema => {
                    return Err(RegistryError::ConflictingSchema {
                        name: name.to_string(),
                    });
                }
                Some(_) => return Ok(()),
                None => {
                    seen.insert(name, schema);
                }
            }
        }
        for child in schema.children() {
            walk(child, seen)?;
        }
        Ok(())
    }

    let mut seen = HashMap::new();
    for route in routes {
        let bodies = route.request_body().map(|b| b.content.as_slice()).unwrap_or_default();
        let responses = route.responses().iter().flat_map(|r| r.content.iter());
        for media in bodies.iter().chain(responses) {
            walk(media.schema(), &mut seen)?;
        }
    }
    Ok(())
}

/// Immutable set of routes with a segment tree for lookup.
///
/// Safe to share across threads; nothing is mutated after `build()`.
#[derive(Clone, Debug)]
pub struct RouteRegistry {
    routes: Vec<Arc<RouteDescriptor>>,
    tree: RadixTree,
    validators: ValidatorCache,
    security_schemes: BTreeMap<String, SecurityScheme>,
}

impl RouteRegistry {
    #[must_use]
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    /// Routes in registration order.
    #[must_use]
    pub fn routes(&self) -> &[Arc<RouteDescriptor>] {
        &self.routes
    }

    #[must_use]
    pub fn security_schemes(&self) -> &BTreeMap<String, SecurityScheme> {
        &self.security_schemes
    }

    #[must_use]
    pub fn validators(&self) -> &ValidatorCache {
        &self.validators
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Resolve a request path (without query string).
    ///
    /// Literal segments win over placeholders at the first point of
    /// difference. A placeholder whose value does not coerce is treated as
    /// no match, so a mistyped id is indistinguishable from a missing route.
    pub fn resolve(&self, method: &Method, path: &str) -> Result<MatchedRoute, RouteNotFound> {
        let start = Instant::now();
        let found = split_path(path).and_then(|segments| self.tree.find(method, &segments, &self.routes));
        let elapsed = start.elapsed();

        match found {
            Some((index, path_params)) => {
                let route = Arc::clone(&self.routes[index]);
                if elapsed > Duration::from_millis(1) {
                    warn!(
                        method = %method,
                        path = %path,
                        route_pattern = %route.path_template(),
                        duration_us = elapsed.as_micros(),
                        "Slow route matching detected"
                    );
                } else {
                    debug!(
                        method = %method,
                        path = %path,
                        handler_name = %route.handler_name(),
                        route_pattern = %route.path_template(),
                        path_params = ?path_params,
                        duration_us = elapsed.as_micros(),
                        "Route matched"
                    );
                }
                Ok(MatchedRoute {
                    route,
                    index,
                    path_params,
                })
            }
            None => {
                debug!(
                    method = %method,
                    path = %path,
                    duration_us = elapsed.as_micros(),
                    "No route matched"
                );
                Err(RouteNotFound {
                    method: method.clone(),
                    path: path.to_string(),
                })
            }
        }
    }

    /// Print the routing table to stdout.
    pub fn dump_routes(&self) {
        println!("[routes] count={}", self.routes.len());
        for route in &self.routes {
            for method in route.methods() {
                println!(
                    "[route] {method} {} -> {}",
                    route.path_template(),
                    route.handler_name()
                );
            }
        }
    }
}
