//! Type-safe identifiers for bridge entities.
//!
//! Newtype wrappers prevent mixing incompatible IDs at compile time.
//!
//! | Type | Wire form | Source |
//! |------|-----------|--------|
//! | [`RequestId`] | string or number | Native peer, or generated for internal captures |
//! | [`TabId`] | integer | Browser tab query |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use uuid::Uuid;

// ============================================================================
// RequestId
// ============================================================================

/// Correlates a `get_page_source` request with its `page_source_response`.
///
/// The native peer chooses its own ids, strings or numbers, and gets them
/// back in the same JSON form. Ids for captures the bridge starts on its own
/// are random UUIDs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(Repr);

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
enum Repr {
    Text(String),
    Number(Number),
}

impl RequestId {
    /// Generates a new random request ID.
    #[inline]
    #[must_use]
    pub fn generate() -> Self {
        Self(Repr::Text(Uuid::new_v4().to_string()))
    }

    /// Reads a request ID from a JSON value.
    ///
    /// Accepts strings and numbers; returns `None` for anything else or for
    /// an empty string.
    #[must_use]
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) if !s.is_empty() => Some(Self(Repr::Text(s.clone()))),
            Value::Number(n) => Some(Self(Repr::Number(n.clone()))),
            _ => None,
        }
    }

    /// Returns the ID as it appears on the wire.
    #[must_use]
    pub fn to_value(&self) -> Value {
        match &self.0 {
            Repr::Text(s) => Value::String(s.clone()),
            Repr::Number(n) => Value::Number(n.clone()),
        }
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Repr::Text(s) => f.write_str(s),
            Repr::Number(n) => write!(f, "{n}"),
        }
    }
}

impl From<&str> for RequestId {
    #[inline]
    fn from(value: &str) -> Self {
        Self(Repr::Text(value.to_string()))
    }
}

impl From<String> for RequestId {
    #[inline]
    fn from(value: String) -> Self {
        Self(Repr::Text(value))
    }
}

impl From<u64> for RequestId {
    #[inline]
    fn from(value: u64) -> Self {
        Self(Repr::Number(Number::from(value)))
    }
}

// ============================================================================
// TabId
// ============================================================================

/// Browser tab identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TabId(u32);

impl TabId {
    /// Creates a tab ID.
    #[inline]
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Returns the raw value.
    #[inline]
    #[must_use]
    pub const fn as_u32(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    #[test]
    fn test_generated_ids_are_unique() {
        let a = RequestId::generate();
        let b = RequestId::generate();
        assert_ne!(a, b);
    }

    #[test]
    fn test_request_id_from_value() {
        assert_eq!(
            RequestId::from_value(&json!("r1")),
            Some(RequestId::from("r1"))
        );
        assert_eq!(RequestId::from_value(&json!(42)), Some(RequestId::from(42)));
        assert_ne!(RequestId::from_value(&json!(42)), Some(RequestId::from("42")));
        assert_eq!(RequestId::from_value(&json!("")), None);
        assert_eq!(RequestId::from_value(&json!(null)), None);
    }

    #[test]
    fn test_request_id_serializes_as_string() {
        let json = serde_json::to_string(&RequestId::from("abc")).expect("serialize");
        assert_eq!(json, "\"abc\"");
    }

    #[test]
    fn test_numeric_request_id_keeps_json_form() {
        let id = RequestId::from_value(&json!(7)).expect("id");
        assert_eq!(serde_json::to_value(&id).expect("serialize"), json!(7));
        assert_eq!(id.to_value(), json!(7));
        assert_eq!(id.to_string(), "7");

        let back: RequestId = serde_json::from_value(json!(7)).expect("parse");
        assert_eq!(back, id);
        let text: RequestId = serde_json::from_value(json!("7")).expect("parse");
        assert_ne!(text, id);
    }

    #[test]
    fn test_tab_id_display() {
        assert_eq!(TabId::new(7).to_string(), "7");
        assert_eq!(TabId::new(7).as_u32(), 7);
    }
}
