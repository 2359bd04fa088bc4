//! Calendar events backed by an in-memory store.

use http::Method;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::dispatcher::HandlerRequest;
use crate::handlers::{HandlerError, HandlerOutput, HandlerResult};
use crate::router::RegistryError;
use crate::spec::{
    ApiSchema, Example, MediaType, ParameterDescriptor, RequestBody, ResponseSpec, RouteDescriptor,
    SchemaObject, SecurityRequirement, SemanticType,
};

/// Scheme name the write routes require.
pub const BEARER_SCHEME: &str = "bearerAuth";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub id: i64,
    pub name: String,
    /// Unix timestamp of the start.
    pub timestart: i64,
    /// Length in seconds.
    pub duration: i64,
    /// Events created together as a repeating series share this id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repeat_id: Option<i64>,
}

impl ApiSchema for CalendarEvent {
    fn schema() -> SchemaObject {
        SchemaObject::object()
            .property("id", SchemaObject::integer().format("int64"), true)
            .property("name", SchemaObject::string(), true)
            .property("timestart", SchemaObject::integer().describe("Unix timestamp"), true)
            .property("duration", SchemaObject::integer().describe("Seconds"), true)
            .property("repeat_id", SchemaObject::integer(), false)
            .describe("A calendar event")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewEvent {
    pub name: String,
    pub timestart: i64,
    #[serde(default)]
    pub duration: i64,
    /// Number of weekly occurrences to create; 1 or absent for a single event.
    #[serde(default)]
    pub repeats: Option<u32>,
}

impl ApiSchema for NewEvent {
    fn schema() -> SchemaObject {
        SchemaObject::object()
            .property("name", SchemaObject::string(), true)
            .property("timestart", SchemaObject::integer(), true)
            .property("duration", SchemaObject::integer(), false)
            .property(
                "repeats",
                SchemaObject::integer().minimum(1).maximum(i64::from(MAX_REPEATS)),
                false,
            )
    }
}

fn poisoned() -> HandlerError {
    HandlerError::Failure(anyhow::anyhow!("event store lock poisoned"))
}

const WEEK_SECS: i64 = 7 * 24 * 3600;

/// Longest series a single create may produce: one year of weekly events.
pub const MAX_REPEATS: u32 = 52;

#[derive(Default)]
struct Store {
    events: BTreeMap<i64, CalendarEvent>,
    next_id: i64,
}

/// Event storage shared by the event handlers.
#[derive(Default)]
pub struct EventService {
    store: RwLock<Store>,
}

impl EventService {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Store>, HandlerError> {
        self.store.read().map_err(|_| poisoned())
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Store>, HandlerError> {
        self.store.write().map_err(|_| poisoned())
    }

    /// Add events, returning the first one. A repeating event creates one
    /// occurrence per week, all sharing the first occurrence's id as
    /// `repeat_id`.
    pub fn create(&self, new: NewEvent) -> Result<CalendarEvent, HandlerError> {
        let repeats = new.repeats.unwrap_or(1).max(1);
        if repeats > MAX_REPEATS {
            return Err(HandlerError::ValidationFailed(format!(
                "repeats must be at most {MAX_REPEATS}"
            )));
        }
        let starts = (0..i64::from(repeats))
            .map(|n| {
                n.checked_mul(WEEK_SECS)
                    .and_then(|offset| new.timestart.checked_add(offset))
            })
            .collect::<Option<Vec<i64>>>()
            .ok_or_else(|| {
                HandlerError::ValidationFailed("timestart is out of range for this series".to_string())
            })?;

        let mut store = self.write()?;
        let first_id = store.next_id + 1;
        let repeat_id = (repeats > 1).then_some(first_id);
        let mut first = None;
        for timestart in starts {
            store.next_id += 1;
            let event = CalendarEvent {
                id: store.next_id,
                name: new.name.clone(),
                timestart,
                duration: new.duration,
                repeat_id,
            };
            first.get_or_insert_with(|| event.clone());
            store.events.insert(event.id, event);
        }
        first.ok_or_else(|| HandlerError::Failure(anyhow::anyhow!("no event created")))
    }

    /// Store an event under its own id, replacing any previous one.
    pub fn insert(&self, event: CalendarEvent) -> Result<(), HandlerError> {
        let mut store = self.write()?;
        store.next_id = store.next_id.max(event.id);
        store.events.insert(event.id, event);
        Ok(())
    }

    pub fn get(&self, id: i64) -> Result<Option<CalendarEvent>, HandlerError> {
        let store = self.read()?;
        Ok(store.events.get(&id).cloned())
    }

    /// Events that have started and not yet ended at `now`.
    pub fn active(&self, now: i64) -> Result<Vec<CalendarEvent>, HandlerError> {
        let store = self.read()?;
        Ok(store
            .events
            .values()
            .filter(|e| e.timestart <= now && now < e.timestart + e.duration)
            .cloned()
            .collect())
    }

    /// Delete one event, or its whole series when `repeat` is set. Returns
    /// how many events were removed; zero means the id was unknown.
    pub fn delete(&self, id: i64, repeat: bool) -> Result<usize, HandlerError> {
        let mut store = self.write()?;
        let Some(series) = store.events.get(&id).map(|e| e.repeat_id) else {
            return Ok(0);
        };
        match (repeat, series) {
            (true, Some(series)) => {
                let before = store.events.len();
                store.events.retain(|_, e| e.repeat_id != Some(series));
                Ok(before - store.events.len())
            }
            _ => Ok(usize::from(store.events.remove(&id).is_some())),
        }
    }
}

fn to_body<T: Serialize>(value: &T) -> HandlerResult {
    serde_json::to_value(value)
        .map(HandlerOutput::Body)
        .map_err(|e| HandlerError::Failure(e.into()))
}

fn event_id(req: &HandlerRequest) -> Result<i64, HandlerError> {
    req.path_param("event")
        .and_then(|v| v.as_int())
        .ok_or_else(|| HandlerError::ValidationFailed("event id is missing".to_string()))
}

fn now() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map_or(0, |d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX))
}

pub fn get_event(svc: &EventService, req: &HandlerRequest) -> HandlerResult {
    let id = event_id(req)?;
    match svc.get(id)? {
        Some(event) => to_body(&event),
        None => Err(HandlerError::NotFound(format!("event {id} does not exist"))),
    }
}

pub fn active_events(svc: &EventService, _req: &HandlerRequest) -> HandlerResult {
    to_body(&svc.active(now())?)
}

pub fn delete_event(svc: &EventService, req: &HandlerRequest) -> HandlerResult {
    let id = event_id(req)?;
    let repeat = req.query_param("repeat").and_then(|v| v.as_bool()).unwrap_or(false);
    if req.is_cancelled() {
        return Err(HandlerError::Failure(anyhow::anyhow!("cancelled before delete")));
    }
    match svc.delete(id, repeat)? {
        0 => Err(HandlerError::NotFound(format!("event {id} does not exist"))),
        _ => Ok(HandlerOutput::Empty),
    }
}

/// Writes need a bearer token. Checking it is left to a real auth layer;
/// the demo only insists that one is present.
pub fn create_event(svc: &EventService, req: &HandlerRequest) -> HandlerResult {
    let authorized = req
        .headers
        .get(http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("Bearer "));
    if !authorized {
        return Err(HandlerError::AccessDenied(
            "creating events requires a bearer token".to_string(),
        ));
    }
    let new: NewEvent = req.body_as()?;
    if new.name.trim().is_empty() {
        return Err(HandlerError::ValidationFailed("event name must not be empty".to_string()));
    }
    to_body(&svc.create(new)?)
}

/// Route descriptors for the event controller.
pub fn routes(svc: &Arc<EventService>) -> Result<Vec<RouteDescriptor>, RegistryError> {
    let event = CalendarEvent::shared();
    let example = json!({ "id": 54, "name": "Exam", "timestart": 1_700_000_000, "duration": 3600 });

    let svc_get = Arc::clone(svc);
    let get = RouteDescriptor::builder(
        "/event/{event}",
        "get_event",
        move |req: &HandlerRequest| get_event(&svc_get, req),
    )
    .method(Method::GET)
    .summary("Fetch one event")
    .tag("events")
    .parameter(ParameterDescriptor::path("event", SemanticType::Int).describe("Event id"))
    .success(
        ResponseSpec::new(200, "The event")
            .content(MediaType::json(Arc::clone(&event)).example(example).build()?)
            .content(MediaType::xml(Arc::clone(&event)).build()?),
    )
    .response(ResponseSpec::new(404, "No such event"))
    .build()?;

    let svc_active = Arc::clone(svc);
    let active = RouteDescriptor::builder(
        "/event/active",
        "active_events",
        move |req: &HandlerRequest| active_events(&svc_active, req),
    )
    .method(Method::GET)
    .summary("Events in progress")
    .tag("events")
    .no_security()
    .success(
        ResponseSpec::new(200, "Events running now")
            .content(MediaType::json(SchemaObject::list(Arc::clone(&event))).build()?)
            .content(MediaType::xml(SchemaObject::list(Arc::clone(&event))).build()?),
    )
    .build()?;

    let svc_delete = Arc::clone(svc);
    let delete = RouteDescriptor::builder(
        "/event/{event}",
        "delete_event",
        move |req: &HandlerRequest| delete_event(&svc_delete, req),
    )
    .method(Method::DELETE)
    .summary("Delete an event or its series")
    .tag("events")
    .parameter(ParameterDescriptor::path("event", SemanticType::Int))
    .parameter(
        ParameterDescriptor::query("repeat", SemanticType::Bool)
            .required(true)
            .describe("Delete every occurrence of a repeating event")
            .example("single", json!(false)),
    )
    .success(ResponseSpec::new(204, "Deleted"))
    .response(ResponseSpec::new(404, "No such event"))
    .build()?;

    let svc_create = Arc::clone(svc);
    let new_event = NewEvent::shared();
    let create = RouteDescriptor::builder(
        "/event",
        "create_event",
        move |req: &HandlerRequest| create_event(&svc_create, req),
    )
    .method(Method::POST)
    .summary("Create an event")
    .tag("events")
    .security(SecurityRequirement::new(BEARER_SCHEME))
    .request_body(
        RequestBody::new()
            .describe("The event to create")
            .content(
                MediaType::json(Arc::clone(&new_event))
                    .required(true)
                    .named_example(Example::new(
                        "weekly",
                        json!({ "name": "Lecture", "timestart": 1_700_000_000, "duration": 5400, "repeats": 10 }),
                    ))
                    .build()?,
            )
            .content(MediaType::xml(new_event).required(true).build()?),
    )
    .success(
        ResponseSpec::new(201, "The created event (first occurrence)")
            .content(MediaType::json(Arc::clone(&event)).build()?)
            .content(MediaType::xml(event).build()?),
    )
    .response(ResponseSpec::new(403, "Missing bearer token"))
    .build()?;

    Ok(vec![get, active, delete, create])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_event(name: &str, repeats: Option<u32>) -> NewEvent {
        NewEvent {
            name: name.to_string(),
            timestart: 1000,
            duration: 100,
            repeats,
        }
    }

    #[test]
    fn repeating_events_share_a_series() {
        let svc = EventService::new();
        let first = svc.create(new_event("Lecture", Some(3))).unwrap();
        assert_eq!(first.repeat_id, Some(first.id));
        let third = svc.get(first.id + 2).unwrap().unwrap();
        assert_eq!(third.timestart, 1000 + 2 * WEEK_SECS);
        assert_eq!(svc.delete(first.id + 1, true).unwrap(), 3);
        assert!(svc.get(first.id).unwrap().is_none());
    }

    #[test]
    fn single_delete_leaves_series_siblings() {
        let svc = EventService::new();
        let first = svc.create(new_event("Lecture", Some(2))).unwrap();
        assert_eq!(svc.delete(first.id, false).unwrap(), 1);
        assert!(svc.get(first.id + 1).unwrap().is_some());
        assert_eq!(svc.delete(999, false).unwrap(), 0);
    }

    #[test]
    fn oversized_series_is_rejected_before_storing() {
        let svc = EventService::new();
        let err = svc.create(new_event("Lecture", Some(MAX_REPEATS + 1))).unwrap_err();
        assert!(matches!(err, HandlerError::ValidationFailed(_)));
        assert!(svc.create(new_event("Lecture", Some(MAX_REPEATS))).is_ok());
        assert_eq!(svc.get(i64::from(MAX_REPEATS)).unwrap().unwrap().repeat_id, Some(1));
    }

    #[test]
    fn series_past_the_end_of_time_is_rejected() {
        let svc = EventService::new();
        let mut late = new_event("Forever", Some(2));
        late.timestart = i64::MAX;
        let err = svc.create(late).unwrap_err();
        assert!(matches!(err, HandlerError::ValidationFailed(_)));
        assert!(svc.get(1).unwrap().is_none());

        let mut single = new_event("Last", None);
        single.timestart = i64::MAX;
        assert_eq!(svc.create(single).unwrap().timestart, i64::MAX);
    }

    #[test]
    fn active_means_running_now() {
        let svc = EventService::new();
        svc.create(new_event("Exam", None)).unwrap();
        assert_eq!(svc.active(1050).unwrap().len(), 1);
        assert!(svc.active(1100).unwrap().is_empty());
    }
}
