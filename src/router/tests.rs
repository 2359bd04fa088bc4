use super::{RegistryError, RouteRegistry};
use crate::dispatcher::HandlerRequest;
use crate::handlers::{HandlerOutput, HandlerResult};
use crate::spec::{
    ParameterDescriptor, ParameterLocation, ResponseSpec, RouteDescriptor, SecurityRequirement, SecurityScheme,
    SemanticType, TypedValue,
};
use http::Method;
use std::time::Instant;

fn noop(_req: &HandlerRequest) -> HandlerResult {
    Ok(HandlerOutput::Empty)
}

fn route(method: Method, template: &str, handler: &str, params: &[(&str, SemanticType)]) -> RouteDescriptor {
    let mut builder = RouteDescriptor::builder(template, handler, noop).method(method);
    for (name, ty) in params {
        builder = builder.parameter(ParameterDescriptor::path(*name, *ty));
    }
    builder
        .success(ResponseSpec::new(200, "ok"))
        .build()
        .unwrap()
}

fn registry(routes: Vec<RouteDescriptor>) -> RouteRegistry {
    let mut builder = RouteRegistry::builder();
    for r in routes {
        builder.register(r).unwrap();
    }
    builder.build().unwrap()
}

#[test]
fn test_root_path() {
    let reg = registry(vec![route(Method::GET, "/", "root", &[])]);
    assert_eq!(reg.resolve(&Method::GET, "/").unwrap().route.handler_name(), "root");
    assert!(reg.resolve(&Method::GET, "//").is_err());
}

#[test]
fn test_literal_beats_placeholder() {
    let reg = registry(vec![
        route(Method::GET, "/event/{event}", "get_event", &[("event", SemanticType::Int)]),
        route(Method::GET, "/event/active", "active_events", &[]),
    ]);
    let active = reg.resolve(&Method::GET, "/event/active").unwrap();
    assert_eq!(active.route.handler_name(), "active_events");
    assert!(active.path_params.is_empty());

    let by_id = reg.resolve(&Method::GET, "/event/54").unwrap();
    assert_eq!(by_id.route.handler_name(), "get_event");
    assert_eq!(by_id.get_path_param("event"), Some(&TypedValue::Int(54)));
}

#[test]
fn test_coercion_failure_is_not_found() {
    let reg = registry(vec![route(
        Method::GET,
        "/event/{event}",
        "get_event",
        &[("event", SemanticType::Int)],
    )]);
    let err = reg.resolve(&Method::GET, "/event/abc").unwrap_err();
    assert_eq!(err.path, "/event/abc");
}

#[test]
fn test_backtracks_out_of_literal_branch() {
    // "/a/b/{x}" is tried first for "/a/b/c/d" but only "/a/{y}/c/d" fits.
    let reg = registry(vec![
        route(Method::GET, "/a/b/{x}", "short", &[("x", SemanticType::RawString)]),
        route(Method::GET, "/a/{y}/c/d", "long", &[("y", SemanticType::RawString)]),
    ]);
    let m = reg.resolve(&Method::GET, "/a/b/c/d").unwrap();
    assert_eq!(m.route.handler_name(), "long");
    assert_eq!(m.get_path_param("y"), Some(&TypedValue::Str("b".into())));
}

#[test]
fn test_method_filters_before_matching() {
    let reg = registry(vec![
        route(Method::GET, "/event/{event}", "get_event", &[("event", SemanticType::Int)]),
        route(Method::DELETE, "/event/{id}", "delete_event", &[("id", SemanticType::Int)]),
    ]);
    assert_eq!(
        reg.resolve(&Method::DELETE, "/event/3").unwrap().route.handler_name(),
        "delete_event"
    );
    assert!(reg.resolve(&Method::PUT, "/event/3").is_err());
}

#[test]
fn test_duplicate_route_ignores_placeholder_names() {
    let mut builder = RouteRegistry::builder();
    builder
        .register(route(Method::GET, "/event/{event}", "a", &[("event", SemanticType::Int)]))
        .unwrap();
    let err = builder
        .register(route(Method::GET, "/event/{id}", "b", &[("id", SemanticType::Int)]))
        .unwrap_err();
    assert!(matches!(err, RegistryError::DuplicateRoute { ref method, .. } if *method == Method::GET));
}

#[test]
fn test_undeclared_security_scheme_fails_build() {
    let secured = RouteDescriptor::builder("/x", "x", noop)
        .method(Method::GET)
        .security(SecurityRequirement::new("bearerAuth"))
        .success(ResponseSpec::new(200, "ok"))
        .build()
        .unwrap();

    let mut builder = RouteRegistry::builder();
    builder.register(secured.clone()).unwrap();
    assert!(matches!(
        builder.build(),
        Err(RegistryError::UnknownSecurityScheme { .. })
    ));

    let mut builder = RouteRegistry::builder();
    builder.security_scheme("bearerAuth", SecurityScheme::bearer(None));
    builder.register(secured).unwrap();
    assert!(builder.build().is_ok());
}

#[test]
fn test_api_key_in_path_fails_build() {
    let mut builder = RouteRegistry::builder();
    builder.security_scheme("pathKey", SecurityScheme::api_key("key", ParameterLocation::Path));
    let err = builder.build().unwrap_err();
    assert!(matches!(err, RegistryError::InvalidSecurityScheme { ref name, .. } if name == "pathKey"));

    let mut builder = RouteRegistry::builder();
    builder.security_scheme("headerKey", SecurityScheme::api_key("X-Api-Key", ParameterLocation::Header));
    assert!(builder.build().is_ok());
}

#[test]
fn test_percent_encoded_segment() {
    let reg = registry(vec![route(
        Method::GET,
        "/files/{name}",
        "file",
        &[("name", SemanticType::RawString)],
    )]);
    let m = reg.resolve(&Method::GET, "/files/a%20b").unwrap();
    assert_eq!(m.get_path_param("name"), Some(&TypedValue::Str("a b".into())));
}

#[test]
fn test_many_routes_resolve_quickly() {
    let routes = (0..500)
        .map(|i| {
            route(
                Method::GET,
                &format!("/api/v1/resource{i}/{{id}}"),
                &format!("handler_{i}"),
                &[("id", SemanticType::Int)],
            )
        })
        .collect();
    let reg = registry(routes);

    let start = Instant::now();
    for _ in 0..1000 {
        let m = reg.resolve(&Method::GET, "/api/v1/resource250/123").unwrap();
        assert_eq!(m.route.handler_name(), "handler_250");
    }
    assert!(start.elapsed().as_millis() < 500);
}
