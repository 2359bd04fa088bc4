//! Media type handlers: a wire encoding bound to a [`SchemaObject`].
//!
//! JSON goes straight through `serde_json`. XML is mapped onto the same
//! `serde_json::Value` model so handlers never see the wire format:
//!
//! - objects become child elements named after their keys
//! - arrays become repeated `<item>` elements
//! - leaves become text, typed back on decode by the schema

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

use super::schema::SchemaObject;
use super::types::Example;

/// Name of the generated entry when a singular example is normalised into
/// an `examples` map.
pub const DEFAULT_EXAMPLE_NAME: &str = "example";

const XML_ITEM: &str = "item";
const XML_ROOT: &str = "root";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Encoding {
    Json,
    Xml,
}

impl Encoding {
    #[must_use]
    pub fn mime(&self) -> &'static str {
        match self {
            Encoding::Json => "application/json",
            Encoding::Xml => "application/xml",
        }
    }

    /// Classify a `Content-Type` or `Accept` media range, ignoring parameters.
    #[must_use]
    pub fn from_media_type(value: &str) -> Option<Self> {
        let essence = value
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        match essence.as_str() {
            "application/json" => Some(Encoding::Json),
            "application/xml" | "text/xml" => Some(Encoding::Xml),
            e if e.starts_with("application/") && e.ends_with("+json") => Some(Encoding::Json),
            e if e.starts_with("application/") && e.ends_with("+xml") => Some(Encoding::Xml),
            _ => None,
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mime())
    }
}

/// A media type was declared in a way that can never be valid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractViolation {
    pub message: String,
}

impl ContractViolation {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for ContractViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "media type contract violation: {}", self.message)
    }
}

impl std::error::Error for ContractViolation {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaTypeError {
    Parse { encoding: Encoding, message: String },
    Serialize { encoding: Encoding, message: String },
}

impl fmt::Display for MediaTypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaTypeError::Parse { encoding, message } => {
                write!(f, "could not parse {encoding} body: {message}")
            }
            MediaTypeError::Serialize { encoding, message } => {
                write!(f, "could not serialize {encoding} body: {message}")
            }
        }
    }
}

impl std::error::Error for MediaTypeError {}

#[derive(Debug, Clone, PartialEq)]
pub struct MediaType {
    encoding: Encoding,
    schema: Arc<SchemaObject>,
    required: bool,
    example: Option<Value>,
    examples: Vec<Example>,
}

pub struct MediaTypeBuilder {
    encoding: Encoding,
    schema: Arc<SchemaObject>,
    required: bool,
    example: Option<Value>,
    examples: Vec<Example>,
}

impl MediaTypeBuilder {
    /// Whether a request body in this encoding must be present.
    #[must_use]
    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    #[must_use]
    pub fn example(mut self, value: Value) -> Self {
        self.example = Some(value);
        self
    }

    #[must_use]
    pub fn named_example(mut self, example: Example) -> Self {
        self.examples.push(example);
        self
    }

    /// Fails when both the singular and the plural example forms are set.
    pub fn build(self) -> Result<MediaType, ContractViolation> {
        if self.example.is_some() && !self.examples.is_empty() {
            return Err(ContractViolation::new(format!(
                "{} sets both `example` and `examples`; choose one",
                self.encoding
            )));
        }
        Ok(MediaType {
            encoding: self.encoding,
            schema: self.schema,
            required: self.required,
            example: self.example,
            examples: self.examples,
        })
    }
}

impl MediaType {
    fn builder(encoding: Encoding, schema: Arc<SchemaObject>) -> MediaTypeBuilder {
        MediaTypeBuilder {
            encoding,
            schema,
            required: false,
            example: None,
            examples: Vec::new(),
        }
    }

    pub fn json(schema: impl Into<Arc<SchemaObject>>) -> MediaTypeBuilder {
        Self::builder(Encoding::Json, schema.into())
    }

    pub fn xml(schema: impl Into<Arc<SchemaObject>>) -> MediaTypeBuilder {
        Self::builder(Encoding::Xml, schema.into())
    }

    #[must_use]
    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    #[must_use]
    pub fn schema(&self) -> &Arc<SchemaObject> {
        &self.schema
    }

    #[must_use]
    pub fn is_required(&self) -> bool {
        self.required
    }

    /// Examples in their plural form. A singular example comes back as a
    /// one-entry map under [`DEFAULT_EXAMPLE_NAME`].
    #[must_use]
    pub fn normalized_examples(&self) -> Option<Value> {
        if let Some(value) = &self.example {
            let single = Example::new(DEFAULT_EXAMPLE_NAME, value.clone());
            let mut map = Map::new();
            map.insert(single.name.clone(), single.to_openapi());
            return Some(Value::Object(map));
        }
        if self.examples.is_empty() {
            return None;
        }
        Some(Value::Object(
            self.examples
                .iter()
                .map(|e| (e.name.clone(), e.to_openapi()))
                .collect(),
        ))
    }

    pub fn serialize(&self, value: &Value) -> Result<Vec<u8>, MediaTypeError> {
        match self.encoding {
            Encoding::Json => serde_json::to_vec(value).map_err(|e| MediaTypeError::Serialize {
                encoding: self.encoding,
                message: e.to_string(),
            }),
            Encoding::Xml => {
                let root = self.schema.reference_name().unwrap_or(XML_ROOT);
                write_xml(root, value).map_err(|message| MediaTypeError::Serialize {
                    encoding: self.encoding,
                    message,
                })
            }
        }
    }

    pub fn deserialize(&self, bytes: &[u8]) -> Result<Value, MediaTypeError> {
        let parse_error = |message: String| MediaTypeError::Parse {
            encoding: self.encoding,
            message,
        };
        match self.encoding {
            Encoding::Json => serde_json::from_slice(bytes).map_err(|e| parse_error(e.to_string())),
            Encoding::Xml => {
                let raw = read_xml(bytes).map_err(parse_error)?;
                Ok(self.schema.coerce_text_leaves(raw))
            }
        }
    }
}

fn is_xml_name(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

fn write_xml(root: &str, value: &Value) -> Result<Vec<u8>, String> {
    let mut writer = Writer::new(Vec::new());
    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .map_err(|e| e.to_string())?;
    write_element(&mut writer, root, value)?;
    Ok(writer.into_inner())
}

fn write_element(writer: &mut Writer<Vec<u8>>, name: &str, value: &Value) -> Result<(), String> {
    if !is_xml_name(name) {
        return Err(format!("'{name}' is not a valid element name"));
    }
    let io = |e: std::io::Error| e.to_string();
    if value.is_null() {
        return writer
            .write_event(Event::Empty(BytesStart::new(name)))
            .map_err(io);
    }
    writer
        .write_event(Event::Start(BytesStart::new(name)))
        .map_err(io)?;
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                write_element(writer, key, child)?;
            }
        }
        Value::Array(items) => {
            for child in items {
                write_element(writer, XML_ITEM, child)?;
            }
        }
        Value::String(s) => writer
            .write_event(Event::Text(BytesText::new(s)))
            .map_err(io)?,
        other => writer
            .write_event(Event::Text(BytesText::new(&other.to_string())))
            .map_err(io)?,
    }
    writer
        .write_event(Event::End(BytesEnd::new(name)))
        .map_err(io)
}

struct Frame {
    name: String,
    children: Map<String, Value>,
    text: String,
}

impl Frame {
    fn new(name: String) -> Self {
        Self {
            name,
            children: Map::new(),
            text: String::new(),
        }
    }

    fn into_value(self) -> Value {
        if self.children.is_empty() {
            Value::String(self.text)
        } else {
            Value::Object(self.children)
        }
    }
}

/// Repeated sibling names collapse into an array.
fn push_child(children: &mut Map<String, Value>, name: String, value: Value) {
    match children.get_mut(&name) {
        Some(Value::Array(items)) => items.push(value),
        Some(existing) => {
            let first = existing.take();
            *existing = Value::Array(vec![first, value]);
        }
        None => {
            children.insert(name, value);
        }
    }
}

fn read_xml(bytes: &[u8]) -> Result<Value, String> {
    let text = std::str::from_utf8(bytes).map_err(|e| e.to_string())?;
    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<Frame> = Vec::new();
    let mut root: Option<Value> = None;

    let mut finish = |stack: &mut Vec<Frame>, name: String, value: Value| -> Result<(), String> {
        match stack.last_mut() {
            Some(parent) => {
                push_child(&mut parent.children, name, value);
                Ok(())
            }
            None if root.is_none() => {
                root = Some(value);
                Ok(())
            }
            None => Err("more than one root element".to_string()),
        }
    };

    loop {
        match reader.read_event().map_err(|e| e.to_string())? {
            Event::Start(start) => {
                let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
                stack.push(Frame::new(name));
            }
            Event::Empty(start) => {
                let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
                finish(&mut stack, name, Value::String(String::new()))?;
            }
            Event::Text(t) => {
                let unescaped = t.unescape().map_err(|e| e.to_string())?;
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&unescaped);
                } else if !unescaped.trim().is_empty() {
                    return Err("text outside the root element".to_string());
                }
            }
            Event::CData(data) => {
                if let Some(top) = stack.last_mut() {
                    top.text
                        .push_str(&String::from_utf8_lossy(&data.into_inner()));
                }
            }
            Event::End(_) => {
                let frame = stack
                    .pop()
                    .ok_or_else(|| "unexpected closing tag".to_string())?;
                let name = frame.name.clone();
                finish(&mut stack, name, frame.into_value())?;
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err("document ended inside an element".to_string());
    }
    root.ok_or_else(|| "document has no root element".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::schema::ApiSchema;
    use serde_json::json;

    struct NewEvent;

    impl ApiSchema for NewEvent {
        fn schema() -> SchemaObject {
            SchemaObject::object()
                .property("name", SchemaObject::string(), true)
                .property("timestart", SchemaObject::integer(), true)
                .property("visible", SchemaObject::boolean(), false)
                .property("tags", SchemaObject::list(SchemaObject::string()), false)
        }
    }

    #[test]
    fn setting_example_and_examples_fails_at_build() {
        let err = MediaType::json(SchemaObject::string())
            .example(json!("a"))
            .named_example(Example::new("b", json!("b")))
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("both"));
    }

    #[test]
    fn singular_example_is_normalized() {
        let media = MediaType::json(SchemaObject::integer())
            .example(json!(5))
            .build()
            .unwrap();
        assert_eq!(
            media.normalized_examples().unwrap(),
            json!({ "example": { "value": 5 } })
        );
    }

    #[test]
    fn xml_body_is_typed_by_schema() {
        let media = MediaType::xml(NewEvent::shared()).build().unwrap();
        let body = br#"<?xml version="1.0"?>
            <NewEvent>
              <name>Exam &amp; review</name>
              <timestart>1700000000</timestart>
              <visible>true</visible>
              <tags><item>a</item><item>b</item></tags>
            </NewEvent>"#;
        let value = media.deserialize(body).unwrap();
        assert_eq!(
            value,
            json!({
                "name": "Exam & review",
                "timestart": 1700000000,
                "visible": true,
                "tags": ["a", "b"]
            })
        );
    }

    #[test]
    fn xml_writes_reference_name_as_root() {
        let media = MediaType::xml(NewEvent::shared()).build().unwrap();
        let bytes = media
            .serialize(&json!({ "name": "a<b", "timestart": 3, "tags": ["x"] }))
            .unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.contains("<NewEvent>"));
        assert!(text.contains("<name>a&lt;b</name>"));
        assert!(text.contains("<tags><item>x</item></tags>"));
        let back = media.deserialize(text.as_bytes()).unwrap();
        assert_eq!(back["timestart"], 3);
    }

    #[test]
    fn malformed_xml_is_a_parse_error() {
        let media = MediaType::xml(NewEvent::shared()).build().unwrap();
        let err = media.deserialize(b"<NewEvent><name>x</NewEvent>").unwrap_err();
        assert!(matches!(err, MediaTypeError::Parse { encoding: Encoding::Xml, .. }));
        assert!(media.deserialize(b"").is_err());
    }

    #[test]
    fn content_type_parameters_are_ignored() {
        assert_eq!(
            Encoding::from_media_type("application/json; charset=utf-8"),
            Some(Encoding::Json)
        );
        assert_eq!(Encoding::from_media_type("text/xml"), Some(Encoding::Xml));
        assert_eq!(Encoding::from_media_type("text/plain"), None);
    }
}
