//! The self-describing slot format: every field is keyed by name.
//!
//! ```json
//! { "format": "notekeep", "version": 2,
//!   "groups": { "default": { "next_seq": 3, "items": [ { "id": "N-001", ... } ] } } }
//! ```

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::model::collection::{Collection, Scope};
use crate::model::item::Item;
use crate::model::workspace::Workspace;
use crate::ops::store;

pub const FORMAT_TAG: &str = "notekeep";
pub const FORMAT_VERSION: u32 = 2;

#[derive(Debug, Serialize, Deserialize)]
struct SlotDoc {
    format: String,
    version: u32,
    #[serde(default)]
    groups: IndexMap<String, GroupDoc>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GroupDoc {
    #[serde(default = "first_seq")]
    next_seq: u32,
    #[serde(default)]
    items: Vec<Item>,
}

fn first_seq() -> u32 {
    1
}

/// Error type for keyed slot decoding
#[derive(Debug, thiserror::Error)]
pub enum KeyedError {
    #[error("unsupported format version {0}")]
    Version(u32),
    #[error("malformed slot: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("group {group}: {reason}")]
    Invalid { group: String, reason: String },
}

/// Whether a parsed value claims to be in this format
pub fn is_keyed(value: &serde_json::Value) -> bool {
    value.get("format").and_then(|f| f.as_str()) == Some(FORMAT_TAG)
}

pub fn encode(workspace: &Workspace) -> Result<String, serde_json::Error> {
    let doc = SlotDoc {
        format: FORMAT_TAG.to_string(),
        version: FORMAT_VERSION,
        groups: workspace
            .groups
            .iter()
            .map(|(name, collection)| {
                (
                    name.clone(),
                    GroupDoc {
                        next_seq: collection.next_seq,
                        items: collection.items.values().cloned().collect(),
                    },
                )
            })
            .collect(),
    };
    let mut text = serde_json::to_string_pretty(&doc)?;
    text.push('\n');
    Ok(text)
}

/// Decode a value already identified by [`is_keyed`]. Items go through the
/// store so duplicate ids and empty bodies are caught.
pub fn decode(value: serde_json::Value) -> Result<Workspace, KeyedError> {
    let doc: SlotDoc = serde_json::from_value(value)?;
    if doc.version != FORMAT_VERSION {
        return Err(KeyedError::Version(doc.version));
    }

    let mut workspace = Workspace::default();
    for (name, group) in doc.groups {
        let mut collection = Collection::new(Scope::Group(name.clone()));
        for item in group.items {
            store::add(&mut collection, item).map_err(|e| KeyedError::Invalid {
                group: name.clone(),
                reason: e.to_string(),
            })?;
        }
        collection.next_seq = collection.next_seq.max(group.next_seq);
        collection.mark_clean();
        workspace.put(collection);
    }
    Ok(workspace)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::item::{ItemDraft, ItemId};
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn workspace() -> Workspace {
        let mut ws = Workspace::default();
        let home = ws.group_or_create("home");
        let created = Utc.with_ymd_and_hms(2025, 3, 3, 3, 3, 3).unwrap();
        store::add(
            home,
            Item::from_draft(ItemId::from("N-001"), ItemDraft::note("Buy milk"), created),
        )
        .unwrap();
        home.next_seq = 5;
        home.mark_clean();
        ws.group_or_create("work");
        ws
    }

    #[test]
    fn encode_decode_keeps_groups_and_sequence() {
        let ws = workspace();
        let text = encode(&ws).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert!(is_keyed(&value));
        let back = decode(value).unwrap();
        assert_eq!(back, ws);
        assert_eq!(back.group("home").unwrap().next_seq, 5);
    }

    #[test]
    fn encoded_layout_snapshot() {
        insta::assert_snapshot!(encode(&workspace()).unwrap(), @r#"
        {
          "format": "notekeep",
          "version": 2,
          "groups": {
            "home": {
              "next_seq": 5,
              "items": [
                {
                  "id": "N-001",
                  "body": "Buy milk",
                  "tag": "general",
                  "pinned": false,
                  "archived": false,
                  "kind": "note",
                  "created_at": "2025-03-03T03:03:03Z"
                }
              ]
            },
            "work": {
              "next_seq": 1,
              "items": []
            }
          }
        }
        "#);
    }

    #[test]
    fn duplicate_ids_are_invalid() {
        let item = json!({"id": "N-001", "body": "x", "tag": "general", "kind": "note",
                          "created_at": "2025-01-01T00:00:00Z"});
        let value = json!({"format": "notekeep", "version": 2,
                           "groups": {"home": {"items": [item.clone(), item]}}});
        assert!(matches!(decode(value), Err(KeyedError::Invalid { .. })));
    }

    #[test]
    fn future_version_is_rejected() {
        let value = json!({"format": "notekeep", "version": 9, "groups": {}});
        assert!(matches!(decode(value), Err(KeyedError::Version(9))));
    }
}
