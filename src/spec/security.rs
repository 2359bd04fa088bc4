use serde_json::{json, Value};

use super::types::ParameterLocation;

/// A named authentication scheme declared once on the registry.
///
/// Only the description is carried here; enforcement belongs to handlers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecurityScheme {
    Bearer { bearer_format: Option<String> },
    Basic,
    ApiKey { name: String, location: ParameterLocation },
}

impl SecurityScheme {
    #[must_use]
    pub fn bearer(bearer_format: Option<&str>) -> Self {
        SecurityScheme::Bearer {
            bearer_format: bearer_format.map(str::to_string),
        }
    }

    #[must_use]
    pub fn api_key(name: impl Into<String>, location: ParameterLocation) -> Self {
        SecurityScheme::ApiKey {
            name: name.into(),
            location,
        }
    }

    #[must_use]
    pub fn to_openapi(&self) -> Value {
        match self {
            SecurityScheme::Bearer { bearer_format } => {
                let mut obj = json!({ "type": "http", "scheme": "bearer" });
                if let (Some(fmt), Some(map)) = (bearer_format, obj.as_object_mut()) {
                    map.insert("bearerFormat".to_string(), Value::String(fmt.clone()));
                }
                obj
            }
            SecurityScheme::Basic => json!({ "type": "http", "scheme": "basic" }),
            SecurityScheme::ApiKey { name, location } => {
                json!({ "type": "apiKey", "name": name, "in": location.as_str() })
            }
        }
    }
}

/// One alternative in a route's `security` list: a scheme name plus scopes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityRequirement {
    pub scheme: String,
    pub scopes: Vec<String>,
}

impl SecurityRequirement {
    pub fn new(scheme: impl Into<String>) -> Self {
        Self {
            scheme: scheme.into(),
            scopes: Vec::new(),
        }
    }

    #[must_use]
    pub fn scope(mut self, scope: impl Into<String>) -> Self {
        self.scopes.push(scope.into());
        self
    }

    #[must_use]
    pub fn to_openapi(&self) -> Value {
        let mut obj = serde_json::Map::new();
        obj.insert(self.scheme.clone(), json!(self.scopes));
        Value::Object(obj)
    }
}
