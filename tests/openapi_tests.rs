mod common;

use apiroute::config::OpenApiConfig;
use apiroute::dispatcher::HandlerRequest;
use apiroute::handlers::{HandlerOutput, HandlerResult};
use apiroute::openapi::{emit, Document, OpenApiInfo, OPENAPI_VERSION};
use apiroute::spec::{MediaType, ResponseSpec, RouteDescriptor, SchemaObject};
use common::fixtures::{demo_registry, registry_of};
use http::Method;
use serde_json::{json, Value};

fn demo_doc() -> Document {
    emit(&demo_registry(), &OpenApiInfo::new("Calendar", "2.1.0"))
}

fn noop(_req: &HandlerRequest) -> HandlerResult {
    Ok(HandlerOutput::Empty)
}

#[test]
fn test_document_header() {
    let doc = demo_doc();
    let v = doc.as_value();
    assert_eq!(v["openapi"], OPENAPI_VERSION);
    assert_eq!(v["info"], json!({ "title": "Calendar", "version": "2.1.0" }));
    assert!(v.get("servers").is_none());
}

#[test]
fn test_info_from_config() {
    let config = OpenApiConfig {
        title: "Campus".to_string(),
        version: "9".to_string(),
        description: Some("Timetables".to_string()),
        servers: vec!["https://api.example.edu".to_string()],
    };
    let doc = emit(&demo_registry(), &OpenApiInfo::from(&config));
    let v = doc.as_value();
    assert_eq!(v["info"]["description"], "Timetables");
    assert_eq!(v["servers"], json!([{ "url": "https://api.example.edu" }]));
}

#[test]
fn test_emission_is_deterministic() {
    let first = demo_doc().to_json_pretty().unwrap();
    let second = demo_doc().to_json_pretty().unwrap();
    assert_eq!(first, second);
    assert_eq!(demo_doc().to_yaml().unwrap(), demo_doc().to_yaml().unwrap());
}

#[test]
fn test_document_parses_as_openapi() {
    let spec = demo_doc().to_oas3().unwrap();
    assert_eq!(spec.info.title, "Calendar");
    assert!(spec.paths.is_some());
}

#[test]
fn test_methods_share_a_path_item() {
    let doc = demo_doc();
    let item = &doc.as_value()["paths"]["/event/{event}"];
    let methods: Vec<&str> = item.as_object().unwrap().keys().map(String::as_str).collect();
    assert_eq!(methods, ["delete", "get"]);
    assert_eq!(item["get"]["operationId"], "get_event");
    assert_eq!(item["delete"]["operationId"], "delete_event");
}

#[test]
fn test_parameters_are_described() {
    let doc = demo_doc();
    let params = &doc.as_value()["paths"]["/event/{event}"]["delete"]["parameters"];
    assert_eq!(params[0]["name"], "event");
    assert_eq!(params[0]["in"], "path");
    assert_eq!(params[0]["required"], true);
    assert_eq!(params[0]["schema"]["type"], "integer");
    assert_eq!(params[1]["name"], "repeat");
    assert_eq!(params[1]["in"], "query");
    assert_eq!(params[1]["schema"]["type"], "boolean");
    assert_eq!(params[1]["examples"]["single"]["value"], false);

    let tpl = &doc.as_value()["paths"]["/templates/{themename}/{component}/{identifier}"]["get"];
    let include = &tpl["parameters"][3];
    assert_eq!(include["name"], "includecomments");
    assert_eq!(include["required"], false);
    assert_eq!(include["schema"]["default"], false);
}

#[test]
fn test_shared_schemas_are_components() {
    let doc = demo_doc();
    let v = doc.as_value();
    let schemas = v["components"]["schemas"].as_object().unwrap();
    let names: Vec<&str> = schemas.keys().map(String::as_str).collect();
    assert_eq!(names, ["CalendarEvent", "NewEvent", "Template"]);
    assert_eq!(
        schemas["CalendarEvent"]["required"],
        json!(["id", "name", "timestart", "duration"])
    );

    let get = &v["paths"]["/event/{event}"]["get"]["responses"]["200"]["content"];
    assert_eq!(
        get["application/json"]["schema"],
        json!({ "$ref": "#/components/schemas/CalendarEvent" })
    );
    assert_eq!(
        get["application/xml"]["schema"],
        json!({ "$ref": "#/components/schemas/CalendarEvent" })
    );

    let active = &v["paths"]["/event/active"]["get"]["responses"]["200"]["content"];
    assert_eq!(
        active["application/json"]["schema"],
        json!({ "type": "array", "items": { "$ref": "#/components/schemas/CalendarEvent" } })
    );
}

#[test]
fn test_examples_are_always_plural() {
    let doc = demo_doc();
    let v = doc.as_value();
    let single = &v["paths"]["/event/{event}"]["get"]["responses"]["200"]["content"]["application/json"];
    assert!(single.get("example").is_none());
    assert_eq!(single["examples"]["example"]["value"]["id"], 54);

    let body = &v["paths"]["/event"]["post"]["requestBody"];
    assert_eq!(body["required"], true);
    assert_eq!(body["content"]["application/json"]["examples"]["weekly"]["value"]["repeats"], 10);
    assert!(body["content"]["application/xml"].get("examples").is_none());
}

#[test]
fn test_security_requirements() {
    let doc = demo_doc();
    let v = doc.as_value();
    assert_eq!(
        v["components"]["securitySchemes"]["bearerAuth"],
        json!({ "type": "http", "scheme": "bearer", "bearerFormat": "JWT" })
    );
    assert_eq!(v["paths"]["/event"]["post"]["security"], json!([{ "bearerAuth": [] }]));
    // Explicit opt-out is written as an empty list.
    assert_eq!(v["paths"]["/event/active"]["get"]["security"], json!([]));
    // Unspecified stays unspecified.
    assert!(v["paths"]["/event/{event}"]["get"].get("security").is_none());
}

#[test]
fn test_responses_without_content() {
    let doc = demo_doc();
    let responses = &doc.as_value()["paths"]["/event/{event}"]["delete"]["responses"];
    assert_eq!(responses["204"], json!({ "description": "Deleted" }));
    assert_eq!(responses["404"], json!({ "description": "No such event" }));
}

#[test]
fn test_nested_references_are_hoisted() {
    let address = SchemaObject::object()
        .property("city", SchemaObject::string(), true)
        .referenced("Address");
    let person = SchemaObject::object()
        .property("home", address, true)
        .property("tags", SchemaObject::map(SchemaObject::string()), false)
        .referenced("Person");
    let route = RouteDescriptor::builder("/people/me", "me", noop)
        .method(Method::GET)
        .success(ResponseSpec::new(200, "Me").content(MediaType::json(person).build().unwrap()))
        .build()
        .unwrap();
    let doc = emit(&registry_of(vec![route]), &OpenApiInfo::new("t", "1"));
    let schemas = &doc.as_value()["components"]["schemas"];
    assert_eq!(
        schemas["Person"]["properties"]["home"],
        json!({ "$ref": "#/components/schemas/Address" })
    );
    assert_eq!(
        schemas["Person"]["properties"]["tags"]["additionalProperties"],
        json!({ "type": "string" })
    );
    assert_eq!(schemas["Address"]["properties"]["city"], json!({ "type": "string" }));
}

#[test]
fn test_empty_registry_has_no_components() {
    let doc = emit(&registry_of(Vec::new()), &OpenApiInfo::new("t", "1"));
    let v: Value = doc.into_value();
    assert_eq!(v["paths"], json!({}));
    assert!(v.get("components").is_none());
}
