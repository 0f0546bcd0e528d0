//! Typed attribute values as they appear in change-stream records.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// One key-value store attribute in its wire form, e.g. `{"S": "abc"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttributeValue {
    /// String.
    #[serde(rename = "S")]
    String(String),
    /// Number, carried as its decimal text.
    #[serde(rename = "N")]
    Number(String),
    /// Boolean.
    #[serde(rename = "BOOL")]
    Bool(bool),
    /// Explicit null.
    #[serde(rename = "NULL")]
    Null(bool),
    /// Nested map.
    #[serde(rename = "M")]
    Map(BTreeMap<String, AttributeValue>),
    /// Heterogeneous list.
    #[serde(rename = "L")]
    List(Vec<AttributeValue>),
    /// String set.
    #[serde(rename = "SS")]
    StringSet(Vec<String>),
    /// Number set.
    #[serde(rename = "NS")]
    NumberSet(Vec<String>),
    /// Binary, base64 encoded.
    #[serde(rename = "B")]
    Binary(String),
    /// Binary set, base64 encoded.
    #[serde(rename = "BS")]
    BinarySet(Vec<String>),
}

/// A decoded item: attribute name to plain JSON value.
pub type Item = Map<String, Value>;

impl AttributeValue {
    /// Converts to a plain JSON value.
    ///
    /// Numbers stay strings so no precision is lost. Binary stays base64 text.
    #[must_use]
    pub fn to_json(&self) -> Value {
        match self {
            Self::String(s) | Self::Number(s) | Self::Binary(s) => Value::String(s.clone()),
            Self::Bool(b) => Value::Bool(*b),
            Self::Null(_) => Value::Null,
            Self::Map(map) => Value::Object(unmarshal_item(map)),
            Self::List(list) => Value::Array(list.iter().map(Self::to_json).collect()),
            Self::StringSet(set) | Self::NumberSet(set) | Self::BinarySet(set) => {
                Value::Array(set.iter().cloned().map(Value::String).collect())
            }
        }
    }
}

/// Converts a wire-form item to plain JSON.
#[must_use]
pub fn unmarshal_item(item: &BTreeMap<String, AttributeValue>) -> Item {
    item.iter()
        .map(|(key, value)| (key.clone(), value.to_json()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn parse(raw: Value) -> BTreeMap<String, AttributeValue> {
        serde_json::from_value(raw).unwrap()
    }

    #[test]
    fn test_scalars() {
        let item = unmarshal_item(&parse(json!({
            "message": {"S": "New item!"},
            "count": {"N": "12.50"},
            "seen": {"BOOL": true},
            "gone": {"NULL": true},
            "blob": {"B": "aGVsbG8="}
        })));

        assert_eq!(item["message"], "New item!");
        assert_eq!(item["count"], "12.50");
        assert_eq!(item["seen"], true);
        assert_eq!(item["gone"], Value::Null);
        assert_eq!(item["blob"], "aGVsbG8=");
    }

    #[test]
    fn test_nested_and_sets() {
        let item = unmarshal_item(&parse(json!({
            "detail": {"M": {"ids": {"L": [{"N": "1"}, {"S": "two"}]}}},
            "tags": {"SS": ["a", "b"]},
            "scores": {"NS": ["1", "2.5"]},
            "blobs": {"BS": ["AA==", "AQ=="]}
        })));

        assert_eq!(item["detail"], json!({"ids": ["1", "two"]}));
        assert_eq!(item["tags"], json!(["a", "b"]));
        assert_eq!(item["scores"], json!(["1", "2.5"]));
        assert_eq!(item["blobs"], json!(["AA==", "AQ=="]));
    }

    #[test]
    fn test_unknown_type_is_rejected() {
        let raw = json!({"x": {"Q": "1"}});
        assert!(serde_json::from_value::<BTreeMap<String, AttributeValue>>(raw).is_err());
    }
}
