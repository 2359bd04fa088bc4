//! ULID-backed identifiers attached to requests and failures.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use ulid::Ulid;

/// Header carrying the request id in both directions.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Identifier of one inbound request.
///
/// Adopted from the `x-request-id` header when the client sends a valid ULID,
/// generated otherwise, and echoed on every response.
#[derive(Clone, Copy, Eq, PartialEq, Hash, Debug)]
pub struct RequestId(Ulid);

impl RequestId {
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }

    /// Use the header value if it parses, otherwise start a fresh id.
    #[must_use]
    pub fn from_header_or_new(value: Option<&str>) -> Self {
        value
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn as_ulid(&self) -> Ulid {
        self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for RequestId {
    type Err = ulid::DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ulid::from_string(s).map(Self)
    }
}

impl Serialize for RequestId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for RequestId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Fresh id tying a 500 response to the log line that holds the details.
#[must_use]
pub fn correlation_id() -> String {
    Ulid::new().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_header_value_gets_fresh_id() {
        let a = RequestId::from_header_or_new(Some("not-a-ulid"));
        let b = RequestId::from_header_or_new(None);
        assert_ne!(a, b);
    }

    #[test]
    fn valid_header_value_is_kept() {
        let id = RequestId::new();
        let text = format!(" {id} ");
        assert_eq!(RequestId::from_header_or_new(Some(&text)), id);
    }

    #[test]
    fn serde_uses_the_string_form() {
        let id = RequestId::new();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{id}\""));
        let back: RequestId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn correlation_ids_are_ulids() {
        let id = correlation_id();
        assert_eq!(id.len(), 26);
        assert!(id.parse::<RequestId>().is_ok());
    }
}
