//! Parameter coercion and build-time route checks.
//!
//! [`coerce_parameter`] turns a raw path/query/header string into a
//! [`TypedValue`] according to its [`SemanticType`]. String-like types use an
//! allow-list and reject (never strip) disallowed characters.
//!
//! [`ValidationIssue`] collects problems found while a route is declared so
//! that all of them can be reported at once when the registry is built.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use std::num::IntErrorKind;

use crate::spec::{SemanticType, TypedValue};

static ALPHANUMERIC: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9]+$").expect("static alphanumeric pattern"));

static SAFE_PATH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9_.\-]+(/[A-Za-z0-9_.\-]+)*$").expect("static safe-path pattern")
});

const TRUTHY: [&str; 4] = ["1", "true", "yes", "on"];
const FALSY: [&str; 4] = ["0", "false", "no", "off"];

/// A parameter value was rejected by its descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterValidationError {
    pub parameter: String,
    pub reason: String,
}

impl ParameterValidationError {
    pub fn new(parameter: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            parameter: parameter.into(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for ParameterValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid value for parameter '{}': {}",
            self.parameter, self.reason
        )
    }
}

impl std::error::Error for ParameterValidationError {}

/// Coerce `raw` into `ty`, naming `name` in any error.
pub fn coerce_parameter(
    name: &str,
    ty: SemanticType,
    raw: &str,
) -> Result<TypedValue, ParameterValidationError> {
    let fail = |reason: &str| ParameterValidationError::new(name, reason);

    match ty {
        SemanticType::Int => {
            if raw.is_empty() {
                return Err(fail("expected an integer, got an empty value"));
            }
            if !raw
                .trim_start_matches(['+', '-'])
                .bytes()
                .all(|b| b.is_ascii_digit())
            {
                return Err(fail("expected a base-10 integer"));
            }
            raw.parse::<i64>().map(TypedValue::Int).map_err(|e| match e.kind() {
                IntErrorKind::PosOverflow | IntErrorKind::NegOverflow => {
                    fail("integer out of range")
                }
                _ => fail("expected a base-10 integer"),
            })
        }
        SemanticType::Bool => {
            let token = raw.to_ascii_lowercase();
            if TRUTHY.contains(&token.as_str()) {
                Ok(TypedValue::Bool(true))
            } else if FALSY.contains(&token.as_str()) {
                Ok(TypedValue::Bool(false))
            } else {
                Err(fail("expected one of 1/0, true/false, yes/no, on/off"))
            }
        }
        SemanticType::RawString => {
            if let Some(c) = raw.chars().find(|c| is_forbidden_control(*c)) {
                return Err(fail(&format!("control character U+{:04X} not allowed", c as u32)));
            }
            Ok(TypedValue::Str(raw.to_string()))
        }
        SemanticType::Text => {
            if let Some(c) = raw.chars().find(|c| is_forbidden_control(*c)) {
                return Err(fail(&format!("control character U+{:04X} not allowed", c as u32)));
            }
            if raw.contains(['<', '>']) {
                return Err(fail("markup characters '<' and '>' are not allowed"));
            }
            Ok(TypedValue::Str(raw.to_string()))
        }
        SemanticType::Alphanumeric => {
            if ALPHANUMERIC.is_match(raw) {
                Ok(TypedValue::Str(raw.to_string()))
            } else {
                Err(fail("only ASCII letters and digits are allowed"))
            }
        }
        SemanticType::SafePath => {
            if !SAFE_PATH.is_match(raw) {
                return Err(fail("only [A-Za-z0-9_.-] segments separated by '/' are allowed"));
            }
            if raw.split('/').any(|segment| segment == "." || segment == "..") {
                return Err(fail("relative segments '.' and '..' are not allowed"));
            }
            Ok(TypedValue::Str(raw.to_string()))
        }
        SemanticType::Base64 => {
            if raw.is_empty() {
                return Err(fail("expected base64 data, got an empty value"));
            }
            STANDARD
                .decode(raw)
                .map(|_| TypedValue::Str(raw.to_string()))
                .map_err(|e| fail(&format!("invalid base64: {e}")))
        }
    }
}

fn is_forbidden_control(c: char) -> bool {
    c.is_control() && !matches!(c, '\t' | '\n' | '\r')
}

/// A problem found while building route metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    pub location: String,
    pub kind: String,
    pub message: String,
}

impl ValidationIssue {
    pub fn new(
        location: impl Into<String>,
        kind: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        ValidationIssue {
            location: location.into(),
            kind: kind.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.kind, self.location, self.message)
    }
}

/// Render a list of issues one per line.
#[must_use]
pub fn format_issues(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_overflow_is_reported() {
        let err = coerce_parameter("id", SemanticType::Int, "99999999999999999999").unwrap_err();
        assert_eq!(err.parameter, "id");
        assert_eq!(err.reason, "integer out of range");
    }

    #[test]
    fn int_rejects_whitespace_and_decimals() {
        assert!(coerce_parameter("id", SemanticType::Int, " 4").is_err());
        assert!(coerce_parameter("id", SemanticType::Int, "4.0").is_err());
        assert_eq!(
            coerce_parameter("id", SemanticType::Int, "-7").unwrap(),
            TypedValue::Int(-7)
        );
    }

    #[test]
    fn bool_tokens_are_case_insensitive() {
        assert_eq!(
            coerce_parameter("b", SemanticType::Bool, "TRUE").unwrap(),
            TypedValue::Bool(true)
        );
        assert_eq!(
            coerce_parameter("b", SemanticType::Bool, "off").unwrap(),
            TypedValue::Bool(false)
        );
        assert!(coerce_parameter("b", SemanticType::Bool, "maybe").is_err());
    }

    #[test]
    fn safe_path_rejects_traversal() {
        assert!(coerce_parameter("p", SemanticType::SafePath, "a/../b").is_err());
        assert!(coerce_parameter("p", SemanticType::SafePath, "/etc").is_err());
        assert!(coerce_parameter("p", SemanticType::SafePath, "core/event_item").is_ok());
    }

    #[test]
    fn text_rejects_markup_but_raw_keeps_it() {
        assert!(coerce_parameter("t", SemanticType::Text, "<b>hi</b>").is_err());
        assert!(coerce_parameter("t", SemanticType::RawString, "<b>hi</b>").is_ok());
        assert!(coerce_parameter("t", SemanticType::RawString, "a\u{0}b").is_err());
    }

    #[test]
    fn base64_checks_padding() {
        assert!(coerce_parameter("d", SemanticType::Base64, "aGVsbG8=").is_ok());
        assert!(coerce_parameter("d", SemanticType::Base64, "aGVsbG8").is_err());
        assert!(coerce_parameter("d", SemanticType::Base64, "a$==").is_err());
    }

    #[test]
    fn issues_format_one_per_line() {
        let issues = vec![
            ValidationIssue::new("GET /a", "Placeholder", "missing"),
            ValidationIssue::new("GET /b", "Response", "none"),
        ];
        assert_eq!(
            format_issues(&issues),
            "[Placeholder] GET /a: missing\n[Response] GET /b: none"
        );
    }
}
