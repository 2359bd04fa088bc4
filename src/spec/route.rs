//! Route descriptors: the declarative unit the registry, dispatcher and
//! OpenAPI emitter all read from.
//!
//! Routes are declared with [`RouteDescriptor::builder`] at startup. `build()`
//! checks the descriptor as a whole and returns every problem it finds, so a
//! misdeclared route fails once with a complete report.

use http::{HeaderName, Method};
use smallvec::SmallVec;
use std::borrow::Cow;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use super::media::{Encoding, MediaType};
use super::security::SecurityRequirement;
use super::types::{ParameterDescriptor, ParameterLocation, TypedValue};
use crate::handlers::Handler;
use crate::validator::{format_issues, ValidationIssue};

/// Maximum number of bound parameters before heap allocation.
pub const MAX_INLINE_PARAMS: usize = 8;

/// Bound parameter values, in declaration order. Names are shared with the
/// descriptor so binding never copies them.
pub type ParamVec = SmallVec<[(Arc<str>, TypedValue); MAX_INLINE_PARAMS]>;

/// Request path split into decoded segments.
pub type PathSegments<'a> = SmallVec<[Cow<'a, str>; MAX_INLINE_PARAMS]>;

/// Split a request path into percent-decoded segments.
///
/// A single trailing `/` is ignored. Returns `None` for paths that can never
/// match a template: no leading `/`, empty segments, or invalid UTF-8 once
/// decoded.
#[must_use]
pub fn split_path(path: &str) -> Option<PathSegments<'_>> {
    let rest = path.strip_prefix('/')?;
    let rest = if rest.len() > 1 {
        rest.strip_suffix('/').unwrap_or(rest)
    } else {
        rest
    };
    if rest.is_empty() {
        return Some(SmallVec::new());
    }
    rest.split('/')
        .map(|segment| {
            if segment.is_empty() {
                None
            } else {
                urlencoding::decode(segment).ok()
            }
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    /// Index into the route's path parameters.
    Capture(usize),
}

/// One entry of the route's responses map.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseSpec {
    pub status: u16,
    pub description: String,
    pub content: Vec<MediaType>,
    pub is_default: bool,
}

impl ResponseSpec {
    pub fn new(status: u16, description: impl Into<String>) -> Self {
        Self {
            status,
            description: description.into(),
            content: Vec::new(),
            is_default: false,
        }
    }

    #[must_use]
    pub fn content(mut self, media: MediaType) -> Self {
        self.content.push(media);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RequestBody {
    pub description: Option<String>,
    pub content: Vec<MediaType>,
}

impl RequestBody {
    #[must_use]
    pub fn new() -> Self {
        Self {
            description: None,
            content: Vec::new(),
        }
    }

    #[must_use]
    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn content(mut self, media: MediaType) -> Self {
        self.content.push(media);
        self
    }

    /// The body is mandatory when any of its media types says so.
    #[must_use]
    pub fn is_required(&self) -> bool {
        self.content.iter().any(MediaType::is_required)
    }

    #[must_use]
    pub fn media_for(&self, encoding: Encoding) -> Option<&MediaType> {
        self.content.iter().find(|m| m.encoding() == encoding)
    }
}

impl Default for RequestBody {
    fn default() -> Self {
        Self::new()
    }
}

/// A route failed its build-time checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteBuildError {
    pub route: String,
    pub issues: Vec<ValidationIssue>,
}

impl fmt::Display for RouteBuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "route {} is invalid:\n{}",
            self.route,
            format_issues(&self.issues)
        )
    }
}

impl std::error::Error for RouteBuildError {}

#[derive(Clone)]
pub struct RouteDescriptor {
    path_template: String,
    segments: Vec<Segment>,
    methods: Vec<Method>,
    path_parameters: Vec<ParameterDescriptor>,
    query_parameters: Vec<ParameterDescriptor>,
    header_parameters: Vec<ParameterDescriptor>,
    path_names: Vec<Arc<str>>,
    request_body: Option<RequestBody>,
    responses: Vec<ResponseSpec>,
    security: Option<Vec<SecurityRequirement>>,
    handler_name: String,
    handler: Arc<dyn Handler>,
    operation_id: Option<String>,
    summary: Option<String>,
    description: Option<String>,
    tags: Vec<String>,
    deprecated: bool,
}

impl fmt::Debug for RouteDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteDescriptor")
            .field("path_template", &self.path_template)
            .field("methods", &self.methods)
            .field("handler_name", &self.handler_name)
            .finish_non_exhaustive()
    }
}

impl RouteDescriptor {
    pub fn builder(
        path_template: impl Into<String>,
        handler_name: impl Into<String>,
        handler: impl Handler + 'static,
    ) -> RouteBuilder {
        RouteBuilder {
            path_template: path_template.into(),
            methods: Vec::new(),
            parameters: Vec::new(),
            request_body: None,
            responses: Vec::new(),
            security: None,
            handler_name: handler_name.into(),
            handler: Arc::new(handler),
            operation_id: None,
            summary: None,
            description: None,
            tags: Vec::new(),
            deprecated: false,
        }
    }

    #[must_use]
    pub fn path_template(&self) -> &str {
        &self.path_template
    }

    #[must_use]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Template with every placeholder name erased, e.g. `/event/{}`.
    /// Two routes with the same normalized template and a shared method
    /// would be indistinguishable at dispatch.
    #[must_use]
    pub fn normalized_template(&self) -> String {
        let mut out = String::with_capacity(self.path_template.len());
        for segment in &self.segments {
            out.push('/');
            match segment {
                Segment::Literal(lit) => out.push_str(lit),
                Segment::Capture(_) => out.push_str("{}"),
            }
        }
        if out.is_empty() {
            out.push('/');
        }
        out
    }

    #[must_use]
    pub fn methods(&self) -> &[Method] {
        &self.methods
    }

    #[must_use]
    pub fn path_parameters(&self) -> &[ParameterDescriptor] {
        &self.path_parameters
    }

    #[must_use]
    pub fn query_parameters(&self) -> &[ParameterDescriptor] {
        &self.query_parameters
    }

    #[must_use]
    pub fn header_parameters(&self) -> &[ParameterDescriptor] {
        &self.header_parameters
    }

    #[must_use]
    pub fn request_body(&self) -> Option<&RequestBody> {
        self.request_body.as_ref()
    }

    /// Responses ordered by status code.
    #[must_use]
    pub fn responses(&self) -> &[ResponseSpec] {
        &self.responses
    }

    /// The response used for successful handler output. `build()` guarantees
    /// exactly one exists.
    #[must_use]
    pub fn default_response(&self) -> Option<&ResponseSpec> {
        self.responses.iter().find(|r| r.is_default)
    }

    /// `None`: unspecified. `Some(empty)`: explicitly no authentication.
    #[must_use]
    pub fn security(&self) -> Option<&[SecurityRequirement]> {
        self.security.as_deref()
    }

    #[must_use]
    pub fn handler_name(&self) -> &str {
        &self.handler_name
    }

    #[must_use]
    pub fn handler(&self) -> &Arc<dyn Handler> {
        &self.handler
    }

    /// Operation id for `method`. A route serving several methods gets one
    /// id per method, suffixed with the lowercase method name.
    #[must_use]
    pub fn operation_id(&self, method: &Method) -> String {
        let base = self.operation_id.as_deref().unwrap_or(&self.handler_name);
        if self.methods.len() > 1 {
            format!("{base}_{}", method.as_str().to_ascii_lowercase())
        } else {
            base.to_string()
        }
    }

    #[must_use]
    pub fn summary(&self) -> Option<&str> {
        self.summary.as_deref()
    }

    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    #[must_use]
    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    #[must_use]
    pub fn is_deprecated(&self) -> bool {
        self.deprecated
    }

    /// Match a request against this route alone.
    ///
    /// Literal segments compare case-sensitively; each capture takes exactly
    /// one non-empty segment. A capture that fails coercion rejects the
    /// match.
    #[must_use]
    pub fn matches(&self, method: &Method, path: &str) -> Option<ParamVec> {
        if !self.methods.contains(method) {
            return None;
        }
        let segments = split_path(path)?;
        if segments.len() != self.segments.len() {
            return None;
        }
        let mut captured: SmallVec<[&str; MAX_INLINE_PARAMS]> = SmallVec::new();
        for (raw, pattern) in segments.iter().zip(&self.segments) {
            match pattern {
                Segment::Literal(lit) if *lit == **raw => {}
                Segment::Literal(_) => return None,
                Segment::Capture(_) => captured.push(&**raw),
            }
        }
        self.bind_path(&captured)
    }

    /// Coerce captured segments (in template order) through their path
    /// parameter descriptors.
    #[must_use]
    pub fn bind_path(&self, captured: &[&str]) -> Option<ParamVec> {
        let mut bound = ParamVec::new();
        let captures = self.segments.iter().filter_map(|s| match s {
            Segment::Capture(idx) => Some(*idx),
            Segment::Literal(_) => None,
        });
        for (idx, raw) in captures.zip(captured) {
            let param = self.path_parameters.get(idx)?;
            let value = param.validate_and_coerce(raw).ok()?;
            bound.push((Arc::clone(&self.path_names[idx]), value));
        }
        Some(bound)
    }
}

pub struct RouteBuilder {
    path_template: String,
    methods: Vec<Method>,
    parameters: Vec<ParameterDescriptor>,
    request_body: Option<RequestBody>,
    responses: Vec<ResponseSpec>,
    security: Option<Vec<SecurityRequirement>>,
    handler_name: String,
    handler: Arc<dyn Handler>,
    operation_id: Option<String>,
    summary: Option<String>,
    description: Option<String>,
    tags: Vec<String>,
    deprecated: bool,
}

impl RouteBuilder {
    #[must_use]
    pub fn method(mut self, method: Method) -> Self {
        if !self.methods.contains(&method) {
            self.methods.push(method);
        }
        self
    }

    /// Add a path, query or header parameter according to its location.
    #[must_use]
    pub fn parameter(mut self, parameter: ParameterDescriptor) -> Self {
        self.parameters.push(parameter);
        self
    }

    #[must_use]
    pub fn request_body(mut self, body: RequestBody) -> Self {
        self.request_body = Some(body);
        self
    }

    /// The response used for successful handler output.
    #[must_use]
    pub fn success(mut self, mut response: ResponseSpec) -> Self {
        response.is_default = true;
        self.responses.push(response);
        self
    }

    #[must_use]
    pub fn response(mut self, response: ResponseSpec) -> Self {
        self.responses.push(response);
        self
    }

    #[must_use]
    pub fn security(mut self, requirement: SecurityRequirement) -> Self {
        self.security.get_or_insert_with(Vec::new).push(requirement);
        self
    }

    /// Mark the route as explicitly requiring no authentication.
    #[must_use]
    pub fn no_security(mut self) -> Self {
        self.security = Some(Vec::new());
        self
    }

    #[must_use]
    pub fn operation_id(mut self, id: impl Into<String>) -> Self {
        self.operation_id = Some(id.into());
        self
    }

    #[must_use]
    pub fn summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    #[must_use]
    pub fn deprecated(mut self) -> Self {
        self.deprecated = true;
        self
    }

    pub fn build(self) -> Result<RouteDescriptor, RouteBuildError> {
        let label = format!(
            "{} {}",
            self.methods
                .iter()
                .map(Method::as_str)
                .collect::<Vec<_>>()
                .join("|"),
            self.path_template
        );
        let mut issues = Vec::new();
        let issue = |kind: &str, message: String| ValidationIssue::new(label.clone(), kind, message);

        if self.methods.is_empty() {
            issues.push(issue("Method", "at least one HTTP method is required".to_string()));
        }

        let (mut path_parameters, mut query_parameters, mut header_parameters) =
            (Vec::new(), Vec::new(), Vec::new());
        for p in self.parameters {
            match p.location {
                ParameterLocation::Path => path_parameters.push(p),
                ParameterLocation::Query => query_parameters.push(p),
                ParameterLocation::Header => header_parameters.push(p),
            }
        }

        for (location, params) in [
            (ParameterLocation::Path, &path_parameters),
            (ParameterLocation::Query, &query_parameters),
            (ParameterLocation::Header, &header_parameters),
        ] {
            let mut seen = HashSet::new();
            for p in params {
                let key = if location == ParameterLocation::Header {
                    p.name.to_ascii_lowercase()
                } else {
                    p.name.clone()
                };
                if !seen.insert(key) {
                    issues.push(issue(
                        "Parameter",
                        format!("duplicate {location} parameter '{}'", p.name),
                    ));
                }
                if p.name.is_empty() {
                    issues.push(issue("Parameter", format!("{location} parameter with empty name")));
                }
                if let Some(default) = &p.default {
                    if location == ParameterLocation::Path {
                        issues.push(issue(
                            "Parameter",
                            format!("path parameter '{}' cannot have a default", p.name),
                        ));
                    } else if !default.matches(p.semantic_type) {
                        issues.push(issue(
                            "Parameter",
                            format!(
                                "default '{default}' for '{}' is not a valid {}",
                                p.name, p.semantic_type
                            ),
                        ));
                    }
                }
                if location == ParameterLocation::Header
                    && HeaderName::from_bytes(p.name.as_bytes()).is_err()
                {
                    issues.push(issue(
                        "Parameter",
                        format!("'{}' is not a valid header name", p.name),
                    ));
                }
            }
        }

        let segments = compile_template(&self.path_template, &path_parameters, &mut |kind, msg| {
            issues.push(issue(kind, msg));
        });

        if let Some(body) = &self.request_body {
            if body.content.is_empty() {
                issues.push(issue("RequestBody", "request body declares no media types".to_string()));
            }
            check_unique_encodings(&body.content, "request body", &mut |msg| {
                issues.push(issue("RequestBody", msg));
            });
        }

        let mut responses = self.responses;
        responses.sort_by_key(|r| r.status);
        match responses.iter().filter(|r| r.is_default).count() {
            1 => {}
            0 => issues.push(issue(
                "Response",
                "exactly one success response is required, found none".to_string(),
            )),
            n => issues.push(issue(
                "Response",
                format!("exactly one success response is required, found {n}"),
            )),
        }
        for pair in responses.windows(2) {
            if pair[0].status == pair[1].status {
                issues.push(issue(
                    "Response",
                    format!("status {} declared more than once", pair[0].status),
                ));
            }
        }
        for r in &responses {
            if !(100..=599).contains(&r.status) {
                issues.push(issue("Response", format!("{} is not an HTTP status", r.status)));
            }
            check_unique_encodings(&r.content, &format!("response {}", r.status), &mut |msg| {
                issues.push(issue("Response", msg));
            });
        }

        if let Some(reqs) = &self.security {
            if reqs.iter().any(|r| r.scheme.is_empty()) {
                issues.push(issue("Security", "security requirement with empty scheme".to_string()));
            }
        }

        if !issues.is_empty() {
            return Err(RouteBuildError {
                route: label,
                issues,
            });
        }

        let path_names = path_parameters
            .iter()
            .map(|p| Arc::from(p.name.as_str()))
            .collect();

        Ok(RouteDescriptor {
            path_template: self.path_template,
            segments,
            methods: self.methods,
            path_parameters,
            query_parameters,
            header_parameters,
            path_names,
            request_body: self.request_body,
            responses,
            security: self.security,
            handler_name: self.handler_name,
            handler: self.handler,
            operation_id: self.operation_id,
            summary: self.summary,
            description: self.description,
            tags: self.tags,
            deprecated: self.deprecated,
        })
    }
}

fn check_unique_encodings(content: &[MediaType], what: &str, report: &mut dyn FnMut(String)) {
    let mut seen = HashSet::new();
    for media in content {
        if !seen.insert(media.encoding()) {
            report(format!("{what} declares {} more than once", media.encoding()));
        }
    }
}

/// Compile a path template into segments, checking that placeholders and
/// path parameters correspond one to one.
fn compile_template(
    template: &str,
    path_parameters: &[ParameterDescriptor],
    report: &mut dyn FnMut(&str, String),
) -> Vec<Segment> {
    let Some(rest) = template.strip_prefix('/') else {
        report("Template", format!("'{template}' must start with '/'"));
        return Vec::new();
    };

    let mut segments = Vec::new();
    let mut placeholder_counts = vec![0usize; path_parameters.len()];
    if !rest.is_empty() {
        for raw in rest.split('/') {
            if raw.is_empty() {
                report("Template", format!("'{template}' contains an empty segment"));
                continue;
            }
            match raw.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
                Some(name) => {
                    match path_parameters.iter().position(|p| p.name == name) {
                        Some(idx) => {
                            placeholder_counts[idx] += 1;
                            segments.push(Segment::Capture(idx));
                        }
                        None => report(
                            "Placeholder",
                            format!("placeholder '{{{name}}}' has no path parameter"),
                        ),
                    }
                }
                None if raw.contains(['{', '}']) => report(
                    "Template",
                    format!("segment '{raw}' mixes literal text and a placeholder"),
                ),
                None => segments.push(Segment::Literal(raw.to_string())),
            }
        }
    }

    for (param, count) in path_parameters.iter().zip(placeholder_counts) {
        match count {
            1 => {}
            0 => report(
                "Placeholder",
                format!("path parameter '{}' does not appear in the template", param.name),
            ),
            _ => report(
                "Placeholder",
                format!("placeholder '{{{}}}' appears {count} times", param.name),
            ),
        }
    }
    segments
}
