use oas3::OpenApiV3Spec;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use tracing::info;

use crate::config::OpenApiConfig;
use crate::router::RouteRegistry;
use crate::spec::{MediaType, RequestBody, ResponseSpec, RouteDescriptor, SchemaObject};

pub const OPENAPI_VERSION: &str = "3.1.0";

/// Document-level metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenApiInfo {
    pub title: String,
    pub version: String,
    pub description: Option<String>,
    pub servers: Vec<String>,
}

impl OpenApiInfo {
    #[must_use]
    pub fn new(title: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            version: version.into(),
            description: None,
            servers: Vec::new(),
        }
    }
}

impl From<&OpenApiConfig> for OpenApiInfo {
    fn from(config: &OpenApiConfig) -> Self {
        Self {
            title: config.title.clone(),
            version: config.version.clone(),
            description: config.description.clone(),
            servers: config.servers.clone(),
        }
    }
}

/// An emitted OpenAPI description.
///
/// Object keys are kept sorted, so equal registries give byte-identical
/// output in every format.
#[derive(Debug, Clone, PartialEq)]
pub struct Document(Value);

impl Document {
    #[must_use]
    pub fn as_value(&self) -> &Value {
        &self.0
    }

    #[must_use]
    pub fn into_value(self) -> Value {
        self.0
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.0)
    }

    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(&self.0)
    }

    /// Parse into the typed OpenAPI model, which rejects structurally
    /// invalid documents.
    pub fn to_oas3(&self) -> Result<OpenApiV3Spec, serde_json::Error> {
        serde_json::from_value(self.0.clone())
    }
}

/// Collects referenced schemas while operations are written. Each name is
/// rendered once per document.
#[derive(Default)]
struct Components {
    schemas: BTreeMap<String, Value>,
}

impl Components {
    /// Schema for a use site: a `$ref` for referenced schemas, the inline
    /// tree otherwise. Referenced schemas anywhere below are hoisted.
    fn use_site(&mut self, schema: &SchemaObject) -> Value {
        self.hoist(schema);
        schema
            .reference_pointer()
            .unwrap_or_else(|| schema.describe_tree())
    }

    fn hoist(&mut self, schema: &SchemaObject) {
        if let Some(name) = schema.reference_name() {
            if self.schemas.contains_key(name) {
                return;
            }
            self.schemas.insert(name.to_string(), schema.describe_tree());
        }
        for child in schema.children() {
            self.hoist(child);
        }
    }

    fn content(&mut self, media: &[MediaType]) -> Value {
        let mut content = Map::new();
        for m in media {
            let mut entry = Map::new();
            entry.insert("schema".to_string(), self.use_site(m.schema()));
            if let Some(examples) = m.normalized_examples() {
                entry.insert("examples".to_string(), examples);
            }
            content.insert(m.encoding().mime().to_string(), Value::Object(entry));
        }
        Value::Object(content)
    }

    fn request_body(&mut self, body: &RequestBody) -> Value {
        let mut obj = Map::new();
        if let Some(description) = &body.description {
            obj.insert("description".to_string(), json!(description));
        }
        obj.insert("required".to_string(), json!(body.is_required()));
        obj.insert("content".to_string(), self.content(&body.content));
        Value::Object(obj)
    }

    fn responses(&mut self, responses: &[ResponseSpec]) -> Value {
        let mut obj = Map::new();
        for res in responses {
            let mut entry = Map::new();
            entry.insert("description".to_string(), json!(res.description));
            if !res.content.is_empty() {
                entry.insert("content".to_string(), self.content(&res.content));
            }
            obj.insert(res.status.to_string(), Value::Object(entry));
        }
        Value::Object(obj)
    }
}

fn operation(route: &RouteDescriptor, method: &http::Method, components: &mut Components) -> Value {
    let mut op = Map::new();
    op.insert("operationId".to_string(), json!(route.operation_id(method)));
    if let Some(summary) = route.summary() {
        op.insert("summary".to_string(), json!(summary));
    }
    if let Some(description) = route.description() {
        op.insert("description".to_string(), json!(description));
    }
    if !route.tags().is_empty() {
        op.insert("tags".to_string(), json!(route.tags()));
    }
    if route.is_deprecated() {
        op.insert("deprecated".to_string(), json!(true));
    }

    let parameters: Vec<Value> = route
        .path_parameters()
        .iter()
        .chain(route.query_parameters())
        .chain(route.header_parameters())
        .map(|p| p.to_openapi())
        .collect();
    if !parameters.is_empty() {
        op.insert("parameters".to_string(), Value::Array(parameters));
    }

    if let Some(body) = route.request_body() {
        op.insert("requestBody".to_string(), components.request_body(body));
    }
    op.insert("responses".to_string(), components.responses(route.responses()));

    // An explicit empty list opts out of document-level security.
    if let Some(requirements) = route.security() {
        let list: Vec<Value> = requirements.iter().map(|r| r.to_openapi()).collect();
        op.insert("security".to_string(), Value::Array(list));
    }
    Value::Object(op)
}

/// Build the OpenAPI document for every route in `registry`.
///
/// Routes sharing a template are merged into one path item. Schemas marked
/// as referenced appear once under `components.schemas`.
#[must_use]
pub fn emit(registry: &RouteRegistry, info: &OpenApiInfo) -> Document {
    let mut components = Components::default();
    let mut paths: BTreeMap<String, BTreeMap<String, Value>> = BTreeMap::new();
    let mut operation_count = 0usize;

    for route in registry.routes() {
        let item = paths.entry(route.path_template().to_string()).or_default();
        for method in route.methods() {
            item.insert(
                method.as_str().to_ascii_lowercase(),
                operation(route, method, &mut components),
            );
            operation_count += 1;
        }
    }

    let mut info_obj = Map::new();
    info_obj.insert("title".to_string(), json!(info.title));
    info_obj.insert("version".to_string(), json!(info.version));
    if let Some(description) = &info.description {
        info_obj.insert("description".to_string(), json!(description));
    }

    let mut doc = Map::new();
    doc.insert("openapi".to_string(), json!(OPENAPI_VERSION));
    doc.insert("info".to_string(), Value::Object(info_obj));
    if !info.servers.is_empty() {
        let servers: Vec<Value> = info.servers.iter().map(|url| json!({ "url": url })).collect();
        doc.insert("servers".to_string(), Value::Array(servers));
    }
    let path_count = paths.len();
    doc.insert(
        "paths".to_string(),
        Value::Object(
            paths
                .into_iter()
                .map(|(k, v)| (k, Value::Object(v.into_iter().collect())))
                .collect(),
        ),
    );

    let mut components_obj = Map::new();
    let schema_count = components.schemas.len();
    if !components.schemas.is_empty() {
        components_obj.insert(
            "schemas".to_string(),
            Value::Object(components.schemas.into_iter().collect()),
        );
    }
    if !registry.security_schemes().is_empty() {
        let schemes: Map<String, Value> = registry
            .security_schemes()
            .iter()
            .map(|(name, scheme)| (name.clone(), scheme.to_openapi()))
            .collect();
        components_obj.insert("securitySchemes".to_string(), Value::Object(schemes));
    }
    if !components_obj.is_empty() {
        doc.insert("components".to_string(), Value::Object(components_obj));
    }

    info!(
        paths = path_count,
        operations = operation_count,
        schemas = schema_count,
        "OpenAPI document emitted"
    );
    Document(Value::Object(doc))
}
