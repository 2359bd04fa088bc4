//! Handler contract.
//!
//! A handler receives the bound request context and either returns a payload
//! or one of a small, closed set of domain errors. The dispatcher owns the
//! mapping from these outcomes to HTTP statuses; handlers never build
//! responses themselves.

use serde_json::Value;
use std::fmt;

use crate::dispatcher::HandlerRequest;

/// Successful handler outcome.
#[derive(Debug, Clone, PartialEq)]
pub enum HandlerOutput {
    /// Serialized through the route's default response media types.
    Body(Value),
    /// No content (204).
    Empty,
}

#[derive(Debug)]
pub enum HandlerError {
    NotFound(String),
    AccessDenied(String),
    ValidationFailed(String),
    /// Anything else. The message is logged, never sent to the client.
    Failure(anyhow::Error),
}

pub type HandlerResult = Result<HandlerOutput, HandlerError>;

impl fmt::Display for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandlerError::NotFound(msg) => write!(f, "not found: {msg}"),
            HandlerError::AccessDenied(msg) => write!(f, "access denied: {msg}"),
            HandlerError::ValidationFailed(msg) => write!(f, "validation failed: {msg}"),
            HandlerError::Failure(err) => write!(f, "handler failure: {err:#}"),
        }
    }
}

impl std::error::Error for HandlerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            HandlerError::Failure(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl From<anyhow::Error> for HandlerError {
    fn from(err: anyhow::Error) -> Self {
        HandlerError::Failure(err)
    }
}

/// A route's target. Implemented for any matching closure.
pub trait Handler: Send + Sync {
    fn handle(&self, req: &HandlerRequest) -> HandlerResult;
}

impl<F> Handler for F
where
    F: Fn(&HandlerRequest) -> HandlerResult + Send + Sync,
{
    fn handle(&self, req: &HandlerRequest) -> HandlerResult {
        self(req)
    }
}
