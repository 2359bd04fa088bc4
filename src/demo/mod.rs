//! Sample controllers served by the `apiroute` binary.
//!
//! Each controller exposes a `routes` function building its descriptors
//! around a service passed in by the caller, so tests can seed the stores.

pub mod events;
pub mod templates;

use std::sync::Arc;

use crate::handlers::HandlerError;
use crate::router::{RegistryError, RouteRegistry};
use crate::spec::SecurityScheme;

pub use events::{CalendarEvent, EventService, NewEvent, BEARER_SCHEME};
pub use templates::{Template, TemplateService};

/// Registry with every demo route and the security schemes they use.
pub fn registry(
    events: &Arc<EventService>,
    templates: &Arc<TemplateService>,
) -> Result<RouteRegistry, RegistryError> {
    let mut builder = RouteRegistry::builder();
    builder.security_scheme(BEARER_SCHEME, SecurityScheme::bearer(Some("JWT")));
    for route in events::routes(events)?
        .into_iter()
        .chain(templates::routes(templates)?)
    {
        builder.register(route)?;
    }
    builder.build()
}

/// Stores with a little data, for running the binary by hand.
pub fn sample_services() -> Result<(Arc<EventService>, Arc<TemplateService>), HandlerError> {
    let events = EventService::new();
    events.insert(CalendarEvent {
        id: 54,
        name: "Final exam".to_string(),
        timestart: 1_700_000_000,
        duration: 7200,
        repeat_id: None,
    })?;
    let templates = TemplateService::new([Template {
        themename: "boost".to_string(),
        component: "core".to_string(),
        identifier: "loading".to_string(),
        source: "<div class=\"loading\">{{#str}}loading{{/str}}</div>".to_string(),
        comments: vec!["Spinner shown while content loads.".to_string()],
    }]);
    Ok((Arc::new(events), Arc::new(templates)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_data_is_routable() {
        let (events, templates) = sample_services().unwrap();
        assert_eq!(events.get(54).unwrap().map(|e| e.name), Some("Final exam".to_string()));
        assert!(registry(&events, &templates).is_ok());
    }
}
