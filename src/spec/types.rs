use serde::Serialize;
use serde_json::{json, Value};
use std::fmt;

use crate::validator::{coerce_parameter, ParameterValidationError};

/// Where a parameter is read from in the incoming request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterLocation {
    Path,
    Query,
    Header,
}

impl ParameterLocation {
    /// The OpenAPI `in` value for this location.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ParameterLocation::Path => "path",
            ParameterLocation::Query => "query",
            ParameterLocation::Header => "header",
        }
    }
}

impl fmt::Display for ParameterLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Closed set of semantic parameter types.
///
/// Each type has its own coercion rule, see [`crate::validator::coerce_parameter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SemanticType {
    /// Base-10 signed 64-bit integer
    Int,
    /// One of the accepted truthy/falsy tokens
    Bool,
    /// Any printable text without control characters
    RawString,
    /// ASCII letters and digits only
    Alphanumeric,
    /// Relative path made of `[A-Za-z0-9_.-]` segments separated by `/`
    SafePath,
    /// Standard alphabet base64 with padding
    Base64,
    /// Plain text: like `RawString` but without markup characters
    Text,
}

impl SemanticType {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            SemanticType::Int => "int",
            SemanticType::Bool => "bool",
            SemanticType::RawString => "raw-string",
            SemanticType::Alphanumeric => "alphanumeric",
            SemanticType::SafePath => "safe-path",
            SemanticType::Base64 => "base64",
            SemanticType::Text => "text",
        }
    }

    /// JSON Schema fragment describing values of this type in an OpenAPI document.
    #[must_use]
    pub fn openapi_schema(&self) -> Value {
        match self {
            SemanticType::Int => json!({ "type": "integer", "format": "int64" }),
            SemanticType::Bool => json!({ "type": "boolean" }),
            SemanticType::RawString => json!({ "type": "string" }),
            SemanticType::Alphanumeric => json!({ "type": "string", "pattern": "^[A-Za-z0-9]+$" }),
            SemanticType::SafePath => {
                json!({ "type": "string", "pattern": "^[A-Za-z0-9_.\\-]+(/[A-Za-z0-9_.\\-]+)*$" })
            }
            SemanticType::Base64 => json!({ "type": "string", "format": "byte" }),
            SemanticType::Text => json!({ "type": "string", "pattern": "^[^<>]*$" }),
        }
    }
}

impl fmt::Display for SemanticType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parameter value after coercion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypedValue {
    Int(i64),
    Bool(bool),
    Str(String),
}

impl TypedValue {
    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            TypedValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            TypedValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            TypedValue::Str(v) => Some(v.as_str()),
            _ => None,
        }
    }

    #[must_use]
    pub fn to_json(&self) -> Value {
        match self {
            TypedValue::Int(v) => Value::from(*v),
            TypedValue::Bool(v) => Value::Bool(*v),
            TypedValue::Str(v) => Value::String(v.clone()),
        }
    }

    /// Whether this value could have been produced by coercing into `ty`.
    #[must_use]
    pub fn matches(&self, ty: SemanticType) -> bool {
        match (self, ty) {
            (TypedValue::Int(_), SemanticType::Int) => true,
            (TypedValue::Bool(_), SemanticType::Bool) => true,
            (TypedValue::Str(s), ty) if ty != SemanticType::Int && ty != SemanticType::Bool => {
                coerce_parameter("default", ty, s).is_ok()
            }
            _ => false,
        }
    }
}

impl fmt::Display for TypedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypedValue::Int(v) => write!(f, "{v}"),
            TypedValue::Bool(v) => write!(f, "{v}"),
            TypedValue::Str(v) => f.write_str(v),
        }
    }
}

/// A named example value shown in the generated document.
#[derive(Debug, Clone, PartialEq)]
pub struct Example {
    pub name: String,
    pub summary: Option<String>,
    pub value: Value,
}

impl Example {
    pub fn new(name: impl Into<String>, value: Value) -> Self {
        Self {
            name: name.into(),
            summary: None,
            value,
        }
    }

    #[must_use]
    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    pub(crate) fn to_openapi(&self) -> Value {
        let mut obj = serde_json::Map::new();
        if let Some(summary) = &self.summary {
            obj.insert("summary".to_string(), Value::String(summary.clone()));
        }
        obj.insert("value".to_string(), self.value.clone());
        Value::Object(obj)
    }
}

/// Declarative description of one path, query or header parameter.
///
/// Constructed once while a route is declared and never mutated afterwards.
/// Path parameters are always required.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterDescriptor {
    pub name: String,
    pub location: ParameterLocation,
    pub semantic_type: SemanticType,
    pub required: bool,
    pub default: Option<TypedValue>,
    pub description: Option<String>,
    pub examples: Vec<Example>,
}

impl ParameterDescriptor {
    fn new(name: impl Into<String>, location: ParameterLocation, ty: SemanticType) -> Self {
        Self {
            name: name.into(),
            location,
            semantic_type: ty,
            required: location == ParameterLocation::Path,
            default: None,
            description: None,
            examples: Vec::new(),
        }
    }

    /// A `{name}` placeholder in the path template.
    pub fn path(name: impl Into<String>, ty: SemanticType) -> Self {
        Self::new(name, ParameterLocation::Path, ty)
    }

    /// An optional query string parameter; use [`Self::required`] to make it mandatory.
    pub fn query(name: impl Into<String>, ty: SemanticType) -> Self {
        Self::new(name, ParameterLocation::Query, ty)
    }

    /// An optional request header.
    pub fn header(name: impl Into<String>, ty: SemanticType) -> Self {
        Self::new(name, ParameterLocation::Header, ty)
    }

    /// Path parameters stay required whatever is passed here.
    #[must_use]
    pub fn required(mut self, required: bool) -> Self {
        self.required = required || self.location == ParameterLocation::Path;
        self
    }

    #[must_use]
    pub fn with_default(mut self, default: TypedValue) -> Self {
        self.default = Some(default);
        self
    }

    #[must_use]
    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn example(mut self, name: impl Into<String>, value: Value) -> Self {
        self.examples.push(Example::new(name, value));
        self
    }

    /// Coerce a raw request string into this parameter's semantic type.
    ///
    /// Pure: no logging, no side effects.
    pub fn validate_and_coerce(&self, raw: &str) -> Result<TypedValue, ParameterValidationError> {
        coerce_parameter(&self.name, self.semantic_type, raw)
    }

    /// OpenAPI Parameter Object for this descriptor.
    #[must_use]
    pub fn to_openapi(&self) -> Value {
        let mut schema = self.semantic_type.openapi_schema();
        if let (Some(default), Value::Object(obj)) = (&self.default, &mut schema) {
            obj.insert("default".to_string(), default.to_json());
        }

        let mut obj = serde_json::Map::new();
        obj.insert("name".to_string(), Value::String(self.name.clone()));
        obj.insert(
            "in".to_string(),
            Value::String(self.location.as_str().to_string()),
        );
        obj.insert("required".to_string(), Value::Bool(self.required));
        if let Some(description) = &self.description {
            obj.insert("description".to_string(), Value::String(description.clone()));
        }
        obj.insert("schema".to_string(), schema);
        if !self.examples.is_empty() {
            let examples: serde_json::Map<String, Value> = self
                .examples
                .iter()
                .map(|e| (e.name.clone(), e.to_openapi()))
                .collect();
            obj.insert("examples".to_string(), Value::Object(examples));
        }
        Value::Object(obj)
    }
}
