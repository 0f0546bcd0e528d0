//! Decoding of the event table's change-stream batches.
//!
//! The event processor receives batches of item changes in the key-value
//! store's typed wire form. This module turns them into plain JSON items,
//! split by change kind and grouped by the item's `event_type`.

mod attribute;
mod batch;

pub use attribute::{unmarshal_item, AttributeValue, Item};
pub use batch::{
    categorize_by_event_type, ChangeKind, DecodedBatch, StreamBatch, StreamImages, StreamRecord,
    EVENT_TYPE_ATTRIBUTE,
};
