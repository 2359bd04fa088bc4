mod common;

use apiroute::ApiRequest;
use common::test_server::{demo_service, get, send, start_demo_server};
use http::{Method, StatusCode};
use serde_json::Value;

#[test]
fn test_builtin_endpoints_without_transport() {
    let (service, metrics) = demo_service();

    let health = service.respond(ApiRequest::new(Method::GET, "/health"));
    assert_eq!(health.status, StatusCode::OK);
    assert_eq!(health.json_body().unwrap()["status"], "ok");

    let json = service.respond(ApiRequest::new(Method::GET, "/openapi.json"));
    assert_eq!(json.content_type(), Some("application/json"));
    assert_eq!(json.json_body().unwrap()["info"]["title"], "Calendar");

    let yaml = service.respond(ApiRequest::new(Method::GET, "/openapi.yaml"));
    assert_eq!(yaml.content_type(), Some("application/yaml"));
    let parsed: Value = serde_yaml::from_slice(&yaml.body).unwrap();
    assert_eq!(parsed, json.json_body().unwrap());

    assert_eq!(metrics.top_level_request_count(), 3);
    assert_eq!(metrics.request_count(), 0);
}

#[test]
fn test_builtins_only_answer_get() {
    let (service, _) = demo_service();
    let res = service.respond(ApiRequest::new(Method::POST, "/health"));
    assert_eq!(res.status, StatusCode::NOT_FOUND);
    assert_eq!(res.json_body().unwrap()["error"], "route_not_found");
}

#[test]
fn test_metrics_endpoint_reports_dispatched_traffic() {
    let (service, _) = demo_service();
    service.respond(ApiRequest::new(Method::GET, "/event/54"));
    service.respond(ApiRequest::new(Method::GET, "/event/404"));

    let res = service.respond(ApiRequest::new(Method::GET, "/metrics"));
    assert_eq!(res.status, StatusCode::OK);
    let text = String::from_utf8(res.body).unwrap();
    assert!(text.contains("apiroute_requests_total 2"), "{text}");
    assert!(text.contains("apiroute_responses_total{class=\"2xx\"} 1"), "{text}");
    assert!(text.contains("apiroute_responses_total{class=\"4xx\"} 1"), "{text}");
}

#[test]
fn test_http_round_trip() {
    let (handle, _) = start_demo_server();
    let addr = handle.addr();

    let res = get(addr, "/health");
    assert_eq!(res.status, 200);
    assert!(res.header("content-type").unwrap().starts_with("application/json"));

    let res = get(addr, "/event/54");
    assert_eq!(res.status, 200);
    let body: Value = serde_json::from_str(&res.body).unwrap();
    assert_eq!(body["name"], "Final exam");

    let res = send(
        addr,
        "GET /event/54 HTTP/1.1\r\nHost: localhost\r\nAccept: application/xml\r\n\r\n",
    );
    assert_eq!(res.status, 200);
    assert!(res.body.contains("<CalendarEvent>"), "{}", res.body);

    let res = get(addr, "/templates/boost/core/missing");
    assert_eq!(res.status, 404);

    handle.stop();
}

#[test]
fn test_http_body_and_errors() {
    let (handle, _) = start_demo_server();
    let addr = handle.addr();

    let body = r#"{"name":"Lecture","timestart":1700000000,"duration":60}"#;
    let res = send(
        addr,
        &format!(
            "POST /event HTTP/1.1\r\nHost: localhost\r\nAuthorization: Bearer t\r\n\
             Content-Type: application/json\r\nContent-Length: {}\r\n\r\n{body}",
            body.len()
        ),
    );
    assert_eq!(res.status, 201, "{}", res.body);

    let res = send(
        addr,
        "DELETE /event/54 HTTP/1.1\r\nHost: localhost\r\nContent-Length: 0\r\n\r\n",
    );
    assert_eq!(res.status, 400);
    let err: Value = serde_json::from_str(&res.body).unwrap();
    assert_eq!(err["parameter"], "repeat");

    let res = send(
        addr,
        "DELETE /event/54?repeat=true HTTP/1.1\r\nHost: localhost\r\nContent-Length: 0\r\n\r\n",
    );
    assert_eq!(res.status, 204);
    assert!(res.body.is_empty());

    handle.stop();
}
