#![allow(dead_code)]

pub mod fixtures {
    use std::sync::Arc;

    use apiroute::config::DispatchConfig;
    use apiroute::demo::{self, CalendarEvent, EventService, Template, TemplateService};
    use apiroute::dispatcher::HandlerRequest;
    use apiroute::handlers::{HandlerOutput, HandlerResult};
    use apiroute::spec::{ParameterDescriptor, ResponseSpec, RouteDescriptor, SemanticType};
    use apiroute::{Dispatcher, RouteRegistry};
    use http::Method;

    pub fn event(id: i64, name: &str, repeat_id: Option<i64>) -> CalendarEvent {
        CalendarEvent {
            id,
            name: name.to_string(),
            timestart: 1_700_000_000 + id,
            duration: 3600,
            repeat_id,
        }
    }

    /// Event 54 alone, plus a three-event series 60..=62.
    pub fn seeded_events() -> Arc<EventService> {
        let svc = EventService::new();
        svc.insert(event(54, "Final exam", None)).unwrap();
        for id in 60..=62 {
            svc.insert(event(id, "Seminar", Some(60))).unwrap();
        }
        Arc::new(svc)
    }

    pub fn seeded_templates() -> Arc<TemplateService> {
        Arc::new(TemplateService::new([Template {
            themename: "boost".to_string(),
            component: "core".to_string(),
            identifier: "loading".to_string(),
            source: "<div class=\"loading\"></div>".to_string(),
            comments: vec!["Shown while loading.".to_string()],
        }]))
    }

    pub struct DemoApp {
        pub events: Arc<EventService>,
        pub templates: Arc<TemplateService>,
        pub dispatcher: Dispatcher,
    }

    pub fn demo_registry() -> RouteRegistry {
        demo::registry(&seeded_events(), &seeded_templates()).unwrap()
    }

    pub fn demo_app() -> DemoApp {
        let events = seeded_events();
        let templates = seeded_templates();
        let registry = demo::registry(&events, &templates).unwrap();
        DemoApp {
            events,
            templates,
            dispatcher: Dispatcher::new(Arc::new(registry), DispatchConfig::default()),
        }
    }

    pub fn ok(_req: &HandlerRequest) -> HandlerResult {
        Ok(HandlerOutput::Body(serde_json::json!({ "ok": true })))
    }

    /// GET route with the given path parameters and an `ok` handler.
    pub fn get_route(template: &str, handler: &str, params: &[(&str, SemanticType)]) -> RouteDescriptor {
        params
            .iter()
            .fold(
                RouteDescriptor::builder(template, handler, ok).method(Method::GET),
                |b, (name, ty)| b.parameter(ParameterDescriptor::path(*name, *ty)),
            )
            .success(ResponseSpec::new(200, "ok"))
            .build()
            .unwrap()
    }

    pub fn registry_of(routes: Vec<RouteDescriptor>) -> RouteRegistry {
        let mut builder = RouteRegistry::builder();
        for route in routes {
            builder.register(route).unwrap();
        }
        builder.build().unwrap()
    }

    pub fn dispatcher_for(routes: Vec<RouteDescriptor>) -> Dispatcher {
        Dispatcher::new(Arc::new(registry_of(routes)), DispatchConfig::default())
    }
}

pub mod temp_files {
    use std::io::Write;

    /// A YAML file that lives as long as the returned handle.
    pub fn yaml(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new()
            .prefix("apiroute_test_")
            .suffix(".yaml")
            .tempfile()
            .unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }
}

pub mod test_server {
    use std::io::{Read, Write};
    use std::net::{SocketAddr, TcpListener, TcpStream};
    use std::sync::{Arc, Once};
    use std::time::Duration;

    use apiroute::config::DispatchConfig;
    use apiroute::middleware::{MetricsMiddleware, Middleware, TracingMiddleware};
    use apiroute::openapi::{emit, OpenApiInfo};
    use apiroute::server::{AppService, HttpServer, ServerHandle};
    use apiroute::Dispatcher;

    use super::fixtures::demo_registry;

    static MAY_INIT: Once = Once::new();

    /// Coroutine stacks are configured once per test binary.
    pub fn setup_may_runtime() {
        MAY_INIT.call_once(|| {
            may::config().set_stack_size(0x8000);
        });
    }

    pub fn demo_service() -> (AppService, Arc<MetricsMiddleware>) {
        let registry = Arc::new(demo_registry());
        let document = emit(&registry, &OpenApiInfo::new("Calendar", "1.0.0"));
        let metrics = Arc::new(MetricsMiddleware::new());
        let mut dispatcher = Dispatcher::new(registry, DispatchConfig::default());
        dispatcher.add_middleware(Arc::new(TracingMiddleware));
        dispatcher.add_middleware(Arc::clone(&metrics) as Arc<dyn Middleware>);
        let mut service = AppService::new(Arc::new(dispatcher), &document).unwrap();
        service.set_metrics_middleware(Arc::clone(&metrics));
        (service, metrics)
    }

    fn free_addr() -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    }

    pub fn start_demo_server() -> (ServerHandle, Arc<MetricsMiddleware>) {
        setup_may_runtime();
        let (service, metrics) = demo_service();
        let handle = HttpServer(service).start(free_addr()).unwrap();
        handle.wait_ready().unwrap();
        (handle, metrics)
    }

    /// Status line, lowercased headers and body of one raw HTTP exchange.
    pub struct RawResponse {
        pub status: u16,
        pub headers: Vec<(String, String)>,
        pub body: String,
    }

    impl RawResponse {
        pub fn header(&self, name: &str) -> Option<&str> {
            self.headers
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.as_str())
        }
    }

    fn header_end(buf: &[u8]) -> Option<usize> {
        buf.windows(4).position(|w| w == b"\r\n\r\n").map(|i| i + 4)
    }

    /// Send `raw` and read exactly one response, using Content-Length.
    pub fn send(addr: SocketAddr, raw: &str) -> RawResponse {
        let mut stream = TcpStream::connect(addr).unwrap();
        stream.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
        stream.write_all(raw.as_bytes()).unwrap();

        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            if let Some(end) = header_end(&buf) {
                let head = String::from_utf8_lossy(&buf[..end]).into_owned();
                let mut lines = head.split("\r\n");
                let status = lines
                    .next()
                    .and_then(|l| l.split_whitespace().nth(1))
                    .and_then(|s| s.parse().ok())
                    .unwrap();
                let headers: Vec<(String, String)> = lines
                    .filter_map(|l| l.split_once(':'))
                    .map(|(k, v)| (k.trim().to_ascii_lowercase(), v.trim().to_string()))
                    .collect();
                let length: usize = headers
                    .iter()
                    .find(|(k, _)| k == "content-length")
                    .and_then(|(_, v)| v.parse().ok())
                    .unwrap_or(0);
                if buf.len() >= end + length {
                    let body = String::from_utf8_lossy(&buf[end..end + length]).into_owned();
                    return RawResponse { status, headers, body };
                }
            }
            let n = stream.read(&mut chunk).unwrap();
            assert!(n > 0, "connection closed before a full response");
            buf.extend_from_slice(&chunk[..n]);
        }
    }

    pub fn get(addr: SocketAddr, path: &str) -> RawResponse {
        send(addr, &format!("GET {path} HTTP/1.1\r\nHost: localhost\r\n\r\n"))
    }
}
