//! Theme templates, looked up by theme, component and identifier.

use http::Method;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

use crate::dispatcher::HandlerRequest;
use crate::handlers::{HandlerError, HandlerOutput, HandlerResult};
use crate::router::RegistryError;
use crate::spec::{
    ApiSchema, MediaType, ParameterDescriptor, ResponseSpec, RouteDescriptor, SchemaObject,
    SemanticType, TypedValue,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Template {
    pub themename: String,
    pub component: String,
    pub identifier: String,
    pub source: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub comments: Vec<String>,
}

impl ApiSchema for Template {
    fn schema() -> SchemaObject {
        SchemaObject::object()
            .property("themename", SchemaObject::string(), true)
            .property("component", SchemaObject::string(), true)
            .property("identifier", SchemaObject::string(), true)
            .property("source", SchemaObject::string(), true)
            .property("comments", SchemaObject::list(SchemaObject::string()), false)
    }
}

type TemplateKey = (String, String, String);

/// Read-only template lookup, filled at construction.
#[derive(Default)]
pub struct TemplateService {
    templates: HashMap<TemplateKey, Template>,
}

impl TemplateService {
    #[must_use]
    pub fn new(templates: impl IntoIterator<Item = Template>) -> Self {
        Self {
            templates: templates
                .into_iter()
                .map(|t| ((t.themename.clone(), t.component.clone(), t.identifier.clone()), t))
                .collect(),
        }
    }

    #[must_use]
    pub fn find(&self, themename: &str, component: &str, identifier: &str) -> Option<&Template> {
        self.templates.get(&(
            themename.to_string(),
            component.to_string(),
            identifier.to_string(),
        ))
    }
}

fn str_param<'a>(value: Option<&'a TypedValue>, name: &str) -> Result<&'a str, HandlerError> {
    value
        .and_then(TypedValue::as_str)
        .ok_or_else(|| HandlerError::ValidationFailed(format!("{name} is missing")))
}

pub fn load_template(svc: &TemplateService, req: &HandlerRequest) -> HandlerResult {
    let themename = str_param(req.path_param("themename"), "themename")?;
    let component = str_param(req.path_param("component"), "component")?;
    let identifier = str_param(req.path_param("identifier"), "identifier")?;
    let include_comments = req
        .query_param("includecomments")
        .and_then(TypedValue::as_bool)
        .unwrap_or(false);

    let Some(template) = svc.find(themename, component, identifier) else {
        return Err(HandlerError::NotFound(format!(
            "template '{identifier}' not found in component '{component}' of theme '{themename}'"
        )));
    };
    let mut template = template.clone();
    if !include_comments {
        template.comments.clear();
    }
    serde_json::to_value(&template)
        .map(HandlerOutput::Body)
        .map_err(|e| HandlerError::Failure(e.into()))
}

pub fn routes(svc: &Arc<TemplateService>) -> Result<Vec<RouteDescriptor>, RegistryError> {
    let svc = Arc::clone(svc);
    let route = RouteDescriptor::builder(
        "/templates/{themename}/{component}/{identifier}",
        "load_template",
        move |req: &HandlerRequest| load_template(&svc, req),
    )
    .method(Method::GET)
    .summary("Load a mustache template")
    .tag("templates")
    .no_security()
    .parameter(ParameterDescriptor::path("themename", SemanticType::Alphanumeric))
    .parameter(ParameterDescriptor::path("component", SemanticType::SafePath))
    .parameter(ParameterDescriptor::path("identifier", SemanticType::SafePath))
    .parameter(
        ParameterDescriptor::query("includecomments", SemanticType::Bool)
            .with_default(TypedValue::Bool(false))
            .describe("Keep the template's documentation comments"),
    )
    .success(
        ResponseSpec::new(200, "The template").content(MediaType::json(Template::shared()).build()?),
    )
    .response(ResponseSpec::new(404, "Unknown template"))
    .build()?;
    Ok(vec![route])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_is_exact_on_all_three_keys() {
        let svc = TemplateService::new([Template {
            themename: "boost".to_string(),
            component: "core".to_string(),
            identifier: "loading".to_string(),
            source: "<div/>".to_string(),
            comments: Vec::new(),
        }]);
        assert!(svc.find("boost", "core", "loading").is_some());
        assert!(svc.find("boost", "core", "other").is_none());
        assert!(svc.find("classic", "core", "loading").is_none());
    }
}
