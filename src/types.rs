//! NewType wrappers for strong typing throughout the dispatcher.
//!
//! These types prevent accidental mixing of semantically different strings
//! (e.g., passing a tool name where a handler name is expected).

use serde::{Deserialize, Serialize};
use std::fmt;

/// Declares a string-backed name type.
///
/// Each type serializes as a bare JSON string and borrows as `str`, so maps
/// keyed by it can be queried with plain string slices.
macro_rules! newtype_string {
    ($(#[$attr:meta])* $name:ident) => {
        $(#[$attr])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                self.0.as_str()
            }

            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl<'a> From<&'a str> for $name {
            fn from(value: &'a str) -> Self {
                Self::new(value)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                self.as_str()
            }
        }

        impl std::borrow::Borrow<str> for $name {
            fn borrow(&self) -> &str {
                self.as_str()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

newtype_string!(
    /// Registry key of a handler (e.g., "chart").
    ///
    /// Unique across a `HandlerRegistry`. This is the name resolvers put in
    /// a decision to select the handler.
    HandlerName
);

newtype_string!(
    /// Name of a tool attached to a handler (e.g., "fetchSeries").
    ///
    /// Only unique within its owning handler; two handlers may each declare
    /// a tool with the same name.
    ToolName
);

newtype_string!(
    /// Identifier of a conversation session.
    ///
    /// Each id owns an independent history. Dispatches on the same id are
    /// serialized, dispatches on different ids run concurrently.
    ConversationId
);

impl ConversationId {
    /// Create a fresh random conversation id.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handler_name_creation() {
        let name = HandlerName::new("chart");
        assert_eq!(name.as_str(), "chart");
        assert_eq!(name.to_string(), "chart");
    }

    #[test]
    fn test_tool_name_from_string() {
        let name: ToolName = "fetchSeries".into();
        assert_eq!(name.as_str(), "fetchSeries");

        let name: ToolName = String::from("fetchQuote").into();
        assert_eq!(name.into_inner(), "fetchQuote");
    }

    #[test]
    fn test_handler_name_serde() {
        let name = HandlerName::new("chart");
        let json = serde_json::to_string(&name).unwrap();
        assert_eq!(json, "\"chart\"");

        let parsed: HandlerName = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, name);
    }

    #[test]
    fn test_conversation_id_generate_is_unique() {
        let a = ConversationId::generate();
        let b = ConversationId::generate();
        assert_ne!(a, b);
        assert!(uuid::Uuid::parse_str(a.as_str()).is_ok());
    }

    #[test]
    fn test_borrow_lookup() {
        use std::collections::HashMap;

        let mut map = HashMap::new();
        map.insert(HandlerName::new("chart"), 1);
        assert_eq!(map.get("chart"), Some(&1));
        assert!(map.get("table").is_none());
    }
}
