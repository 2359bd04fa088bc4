//! Body shape descriptions.
//!
//! A [`SchemaObject`] is a tree describing a request or response body
//! independently of its wire encoding. Every node is in exactly one mode,
//! enforced by [`SchemaKind`]:
//!
//! - named properties (`type: object` + `properties`)
//! - homogeneous map (`type: object` + `additionalProperties`)
//! - list (`type: array` + `items`)
//! - primitive
//!
//! Nodes marked as referenced are hoisted into `components.schemas` by the
//! OpenAPI emitter and pointed to with `$ref` everywhere they are used.

use serde_json::{json, Map, Value};
use std::sync::Arc;

/// Leaf value types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Primitive {
    Integer,
    Number,
    Boolean,
    String,
}

impl Primitive {
    fn type_name(&self) -> &'static str {
        match self {
            Primitive::Integer => "integer",
            Primitive::Number => "number",
            Primitive::Boolean => "boolean",
            Primitive::String => "string",
        }
    }
}

/// A named member of a properties-mode schema.
#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    pub name: String,
    pub schema: Arc<SchemaObject>,
    pub required: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SchemaKind {
    Properties(Vec<Property>),
    Map(Arc<SchemaObject>),
    List(Arc<SchemaObject>),
    Primitive(Primitive),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SchemaObject {
    kind: SchemaKind,
    description: Option<String>,
    format: Option<String>,
    minimum: Option<i64>,
    maximum: Option<i64>,
    reference: Option<String>,
}

/// Types that own a shared, referenced schema.
///
/// The component identifier is derived from the implementing type's name so
/// the same type always lands under the same `#/components/schemas/` key.
pub trait ApiSchema {
    fn schema() -> SchemaObject;

    #[must_use]
    fn schema_name() -> String {
        let full = std::any::type_name::<Self>();
        let without_generics = full.split('<').next().unwrap_or(full);
        without_generics
            .rsplit("::")
            .next()
            .unwrap_or(without_generics)
            .to_string()
    }

    #[must_use]
    fn shared() -> Arc<SchemaObject> {
        Arc::new(Self::schema().referenced(Self::schema_name()))
    }
}

impl SchemaObject {
    fn of(kind: SchemaKind) -> Self {
        Self {
            kind,
            description: None,
            format: None,
            minimum: None,
            maximum: None,
            reference: None,
        }
    }

    /// An object with named properties; see [`SchemaObject::property`].
    #[must_use]
    pub fn object() -> Self {
        Self::of(SchemaKind::Properties(Vec::new()))
    }

    /// A map whose values all share `values`.
    #[must_use]
    pub fn map(values: impl Into<Arc<SchemaObject>>) -> Self {
        Self::of(SchemaKind::Map(values.into()))
    }

    #[must_use]
    pub fn list(items: impl Into<Arc<SchemaObject>>) -> Self {
        Self::of(SchemaKind::List(items.into()))
    }

    #[must_use]
    pub fn primitive(primitive: Primitive) -> Self {
        Self::of(SchemaKind::Primitive(primitive))
    }

    #[must_use]
    pub fn integer() -> Self {
        Self::primitive(Primitive::Integer)
    }

    #[must_use]
    pub fn number() -> Self {
        Self::primitive(Primitive::Number)
    }

    #[must_use]
    pub fn boolean() -> Self {
        Self::primitive(Primitive::Boolean)
    }

    #[must_use]
    pub fn string() -> Self {
        Self::primitive(Primitive::String)
    }

    /// Add a property. Switches a non-object schema into properties mode,
    /// dropping whatever shape it had before.
    #[must_use]
    pub fn property(
        mut self,
        name: impl Into<String>,
        schema: impl Into<Arc<SchemaObject>>,
        required: bool,
    ) -> Self {
        let prop = Property {
            name: name.into(),
            schema: schema.into(),
            required,
        };
        match &mut self.kind {
            SchemaKind::Properties(props) => props.push(prop),
            other => *other = SchemaKind::Properties(vec![prop]),
        }
        self
    }

    #[must_use]
    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    /// Inclusive lower bound for numeric schemas.
    #[must_use]
    pub fn minimum(mut self, minimum: i64) -> Self {
        self.minimum = Some(minimum);
        self
    }

    /// Inclusive upper bound for numeric schemas.
    #[must_use]
    pub fn maximum(mut self, maximum: i64) -> Self {
        self.maximum = Some(maximum);
        self
    }

    /// Mark this schema as shared under `name` in the components section.
    #[must_use]
    pub fn referenced(mut self, name: impl Into<String>) -> Self {
        self.reference = Some(name.into());
        self
    }

    #[must_use]
    pub fn kind(&self) -> &SchemaKind {
        &self.kind
    }

    #[must_use]
    pub fn is_referenced(&self) -> bool {
        self.reference.is_some()
    }

    #[must_use]
    pub fn reference_name(&self) -> Option<&str> {
        self.reference.as_deref()
    }

    /// `$ref` pointer used at every site where this schema is referenced.
    #[must_use]
    pub fn reference_pointer(&self) -> Option<Value> {
        self.reference
            .as_ref()
            .map(|name| json!({ "$ref": format!("#/components/schemas/{name}") }))
    }

    /// Direct child schemas, in declaration order.
    #[must_use]
    pub fn children(&self) -> Vec<&SchemaObject> {
        match &self.kind {
            SchemaKind::Properties(props) => props.iter().map(|p| p.schema.as_ref()).collect(),
            SchemaKind::Map(values) => vec![values.as_ref()],
            SchemaKind::List(items) => vec![items.as_ref()],
            SchemaKind::Primitive(_) => Vec::new(),
        }
    }

    /// JSON-Schema-like tree for this node. Referenced children are written
    /// as `$ref` pointers; the node itself is always written out in full.
    #[must_use]
    pub fn describe_tree(&self) -> Value {
        self.render(&|child: &SchemaObject| {
            child
                .reference_pointer()
                .unwrap_or_else(|| child.describe_tree())
        })
    }

    /// Fully expanded tree with no `$ref` pointers, suitable for compiling a
    /// standalone JSON Schema validator.
    #[must_use]
    pub fn describe_inline(&self) -> Value {
        self.render(&|child: &SchemaObject| child.describe_inline())
    }

    fn render(&self, child: &dyn Fn(&SchemaObject) -> Value) -> Value {
        let mut obj = Map::new();
        match &self.kind {
            SchemaKind::Properties(props) => {
                obj.insert("type".to_string(), json!("object"));
                let properties: Map<String, Value> = props
                    .iter()
                    .map(|p| (p.name.clone(), child(&p.schema)))
                    .collect();
                obj.insert("properties".to_string(), Value::Object(properties));
                let required: Vec<Value> = props
                    .iter()
                    .filter(|p| p.required)
                    .map(|p| Value::String(p.name.clone()))
                    .collect();
                if !required.is_empty() {
                    obj.insert("required".to_string(), Value::Array(required));
                }
            }
            SchemaKind::Map(values) => {
                obj.insert("type".to_string(), json!("object"));
                obj.insert("additionalProperties".to_string(), child(values));
            }
            SchemaKind::List(items) => {
                obj.insert("type".to_string(), json!("array"));
                obj.insert("items".to_string(), child(items));
            }
            SchemaKind::Primitive(p) => {
                obj.insert("type".to_string(), json!(p.type_name()));
            }
        }
        if let Some(format) = &self.format {
            obj.insert("format".to_string(), Value::String(format.clone()));
        }
        if let Some(minimum) = self.minimum {
            obj.insert("minimum".to_string(), json!(minimum));
        }
        if let Some(maximum) = self.maximum {
            obj.insert("maximum".to_string(), json!(maximum));
        }
        if let Some(description) = &self.description {
            obj.insert("description".to_string(), Value::String(description.clone()));
        }
        Value::Object(obj)
    }

    /// Convert text leaves produced by a text-only wire format (XML) into the
    /// JSON types this schema expects. Values that do not convert are left as
    /// they are so that schema validation reports them.
    #[must_use]
    pub fn coerce_text_leaves(&self, value: Value) -> Value {
        match (&self.kind, value) {
            (SchemaKind::Primitive(p), Value::String(s)) => coerce_leaf(*p, s),
            (SchemaKind::Properties(props), Value::Object(mut map)) => {
                for prop in props {
                    if let Some(v) = map.remove(&prop.name) {
                        map.insert(prop.name.clone(), prop.schema.coerce_text_leaves(v));
                    }
                }
                Value::Object(map)
            }
            (SchemaKind::Map(values), Value::Object(map)) => Value::Object(
                map.into_iter()
                    .map(|(k, v)| (k, values.coerce_text_leaves(v)))
                    .collect(),
            ),
            (SchemaKind::List(items), Value::Array(arr)) => Value::Array(
                arr.into_iter()
                    .map(|v| items.coerce_text_leaves(v))
                    .collect(),
            ),
            // Lists are written as repeated <item> children.
            (SchemaKind::List(_), Value::Object(mut map))
                if map.len() == 1 && map.contains_key("item") =>
            {
                let inner = map.remove("item").unwrap_or(Value::Null);
                self.coerce_text_leaves(inner)
            }
            (SchemaKind::List(_), Value::String(s)) if s.is_empty() => Value::Array(Vec::new()),
            // A single repeated element decodes as a bare value; wrap it.
            (SchemaKind::List(items), single @ (Value::Object(_) | Value::String(_))) => {
                Value::Array(vec![items.coerce_text_leaves(single)])
            }
            // An empty element decodes as an empty string.
            (SchemaKind::Properties(_) | SchemaKind::Map(_), Value::String(s)) if s.is_empty() => {
                Value::Object(Map::new())
            }
            (_, other) => other,
        }
    }
}

fn coerce_leaf(primitive: Primitive, text: String) -> Value {
    match primitive {
        Primitive::String => Value::String(text),
        Primitive::Integer => text
            .trim()
            .parse::<i64>()
            .map(Value::from)
            .unwrap_or(Value::String(text)),
        Primitive::Number => text
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            .unwrap_or(Value::String(text)),
        Primitive::Boolean => match text.trim() {
            "true" | "1" => Value::Bool(true),
            "false" | "0" => Value::Bool(false),
            _ => Value::String(text),
        },
    }
}
