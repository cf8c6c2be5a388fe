//! Core types with newtype pattern for type safety.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

/// Identifier of a live media source ("input") in the compositing room.
///
/// Serialized transparently as a plain string so it can be used as a JSON
/// map key.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InputId(pub String);

impl InputId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InputId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for InputId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for InputId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl Borrow<str> for InputId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn input_id_display() {
        assert_eq!(InputId::new("cam-1").to_string(), "cam-1");
    }

    #[test]
    fn input_id_serializes_as_plain_string() {
        let id = InputId::from("screen");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"screen\"");
    }

    #[test]
    fn input_id_works_as_map_key() {
        let mut map = BTreeMap::new();
        map.insert(InputId::from("b"), 2);
        map.insert(InputId::from("a"), 1);

        let json = serde_json::to_string(&map).unwrap();
        assert_eq!(json, r#"{"a":1,"b":2}"#);
        assert_eq!(map.get("a"), Some(&1));
    }
}
