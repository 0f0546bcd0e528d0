//! Change-stream batches and their split into inserts, updates and deletes.

use super::attribute::{unmarshal_item, AttributeValue, Item};
use crate::errors::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Attribute naming the kind of an event item.
pub const EVENT_TYPE_ATTRIBUTE: &str = "event_type";

/// A batch delivered to the event processor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamBatch {
    /// Records in stream order.
    #[serde(rename = "Records", default)]
    pub records: Vec<StreamRecord>,
}

/// One change to one item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamRecord {
    /// `INSERT`, `MODIFY` or `REMOVE`.
    pub event_name: String,
    /// The item images.
    pub dynamodb: StreamImages,
}

/// Key and item images carried by a record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StreamImages {
    /// Primary key attributes.
    #[serde(default)]
    pub keys: BTreeMap<String, AttributeValue>,
    /// Item after the change.
    pub new_image: Option<BTreeMap<String, AttributeValue>>,
    /// Item before the change.
    pub old_image: Option<BTreeMap<String, AttributeValue>>,
}

/// What a record did to its item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// Item created.
    Insert,
    /// Item updated.
    Modify,
    /// Item deleted.
    Remove,
}

impl ChangeKind {
    /// Maps a stream event name; unknown names yield `None`.
    #[must_use]
    pub fn from_event_name(name: &str) -> Option<Self> {
        match name {
            "INSERT" => Some(Self::Insert),
            "MODIFY" => Some(Self::Modify),
            "REMOVE" => Some(Self::Remove),
            _ => None,
        }
    }
}

/// Decoded items grouped by change kind, each in stream order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecodedBatch {
    /// New items.
    pub inserts: Vec<Item>,
    /// Items after update.
    pub updates: Vec<Item>,
    /// Deleted items, as last seen.
    pub deletes: Vec<Item>,
}

impl StreamBatch {
    /// Parses a batch from its JSON delivery.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Splits the batch and converts every image to plain JSON.
    ///
    /// Deletes use the old image, falling back to the keys. Inserts and
    /// updates without a new image are skipped.
    #[must_use]
    pub fn decode(&self) -> DecodedBatch {
        let mut decoded = DecodedBatch::default();

        for record in &self.records {
            let Some(kind) = ChangeKind::from_event_name(&record.event_name) else {
                debug!(event_name = %record.event_name, "Ignoring stream record");
                continue;
            };
            let images = &record.dynamodb;

            match kind {
                ChangeKind::Insert | ChangeKind::Modify => {
                    let Some(image) = &images.new_image else {
                        warn!(event_name = %record.event_name, "Stream record has no new image");
                        continue;
                    };
                    let item = unmarshal_item(image);
                    if kind == ChangeKind::Insert {
                        decoded.inserts.push(item);
                    } else {
                        decoded.updates.push(item);
                    }
                }
                ChangeKind::Remove => {
                    let image = images.old_image.as_ref().unwrap_or(&images.keys);
                    decoded.deletes.push(unmarshal_item(image));
                }
            }
        }

        decoded
    }
}

/// Groups items by their `event_type` string, keeping order within a group.
///
/// Items without a string `event_type` are left out.
#[must_use]
pub fn categorize_by_event_type(items: &[Item]) -> BTreeMap<String, Vec<Item>> {
    let mut grouped: BTreeMap<String, Vec<Item>> = BTreeMap::new();
    for item in items {
        match item.get(EVENT_TYPE_ATTRIBUTE).and_then(|v| v.as_str()) {
            Some(event_type) => grouped
                .entry(event_type.to_string())
                .or_default()
                .push(item.clone()),
            None => debug!("Item has no event type"),
        }
    }
    grouped
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    const BATCH: &str = r#"{
        "Records": [
            {
                "eventID": "1",
                "eventName": "INSERT",
                "eventSource": "aws:dynamodb",
                "dynamodb": {
                    "Keys": {"partition": {"S": "abc"}, "sort": {"S": "123"}},
                    "NewImage": {"message": {"S": "New item!"}, "event_type": {"S": "TASK_EXAMPLE"}},
                    "StreamViewType": "NEW_IMAGE",
                    "SequenceNumber": "111",
                    "SizeBytes": 26
                }
            },
            {
                "eventName": "MODIFY",
                "dynamodb": {
                    "NewImage": {"message": {"S": "changed"}, "event_type": {"S": "EVENT_EXAMPLE"}}
                }
            },
            {
                "eventName": "REMOVE",
                "dynamodb": {
                    "Keys": {"partition": {"S": "abc"}, "sort": {"S": "123"}}
                }
            },
            {
                "eventName": "TTL_EXPIRED",
                "dynamodb": {}
            }
        ]
    }"#;

    #[test]
    fn test_decode_splits_by_change_kind() {
        let decoded = StreamBatch::from_json(BATCH).unwrap().decode();

        assert_eq!(decoded.inserts.len(), 1);
        assert_eq!(decoded.inserts[0]["message"], "New item!");
        assert_eq!(decoded.updates.len(), 1);
        assert_eq!(decoded.updates[0]["message"], "changed");
        assert_eq!(decoded.deletes.len(), 1);
        assert_eq!(decoded.deletes[0]["partition"], "abc");
    }

    #[test]
    fn test_delete_prefers_old_image() {
        let batch: StreamBatch = serde_json::from_value(json!({
            "Records": [{
                "eventName": "REMOVE",
                "dynamodb": {
                    "Keys": {"partition": {"S": "p"}},
                    "OldImage": {"partition": {"S": "p"}, "message": {"S": "bye"}}
                }
            }]
        }))
        .unwrap();

        let decoded = batch.decode();
        assert_eq!(decoded.deletes[0]["message"], "bye");
    }

    #[test]
    fn test_insert_without_image_is_skipped() {
        let batch: StreamBatch = serde_json::from_value(json!({
            "Records": [{"eventName": "INSERT", "dynamodb": {"Keys": {"p": {"S": "x"}}}}]
        }))
        .unwrap();
        assert!(batch.decode().inserts.is_empty());
    }

    #[test]
    fn test_empty_batch() {
        let decoded = StreamBatch::from_json("{}").unwrap().decode();
        assert_eq!(decoded, DecodedBatch::default());
    }

    #[test]
    fn test_categorize_by_event_type() {
        let items: Vec<Item> = [
            json!({"event_type": "TASK_EXAMPLE", "n": "1"}),
            json!({"event_type": "EVENT_EXAMPLE", "n": "2"}),
            json!({"event_type": "TASK_EXAMPLE", "n": "3"}),
            json!({"n": "4"}),
        ]
        .into_iter()
        .filter_map(|v| v.as_object().cloned())
        .collect();

        let grouped = categorize_by_event_type(&items);

        assert_eq!(grouped.len(), 2);
        let tasks: Vec<&str> = grouped["TASK_EXAMPLE"]
            .iter()
            .filter_map(|item| item["n"].as_str())
            .collect();
        assert_eq!(tasks, vec!["1", "3"]);
        assert_eq!(grouped["EVENT_EXAMPLE"].len(), 1);
    }
}
