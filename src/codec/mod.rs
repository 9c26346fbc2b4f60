//! Serialization of the storage slot.
//!
//! New data is always written keyed. The positional layout is still read so
//! existing slots can be migrated, and can be written on request for export.

pub mod keyed;
pub mod legacy;

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::model::collection::Collection;
use crate::model::config::IdConfig;
use crate::model::item::Item;
use crate::model::workspace::Workspace;
use crate::ops::store;

use legacy::LegacySlot;

/// Which layout a slot was read from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotFormat {
    Empty,
    Keyed,
    Legacy,
}

/// A decoded slot
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedSlot {
    pub workspace: Workspace,
    pub format: SlotFormat,
    /// Legacy records dropped because they had no usable text
    pub skipped: usize,
}

/// Error type for slot decoding
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("not valid JSON: {0}")]
    Syntax(#[from] serde_json::Error),
    #[error(transparent)]
    Keyed(#[from] keyed::KeyedError),
    #[error("unrecognized slot layout")]
    UnknownLayout,
}

/// Decode raw slot text. Keyed data is preferred; anything that looks like
/// the positional layout is migrated, with unnamed collections landing in
/// `legacy_group`. Migrated items are stamped with `now`.
pub fn decode_slot(
    text: &str,
    legacy_group: &str,
    ids: &IdConfig,
    now: DateTime<Utc>,
) -> Result<DecodedSlot, DecodeError> {
    if text.trim().is_empty() {
        return Ok(DecodedSlot {
            workspace: Workspace::default(),
            format: SlotFormat::Empty,
            skipped: 0,
        });
    }

    let value: Value = serde_json::from_str(text)?;
    if keyed::is_keyed(&value) {
        return Ok(DecodedSlot {
            workspace: keyed::decode(value)?,
            format: SlotFormat::Keyed,
            skipped: 0,
        });
    }

    let slot = legacy::decode(&value).ok_or(DecodeError::UnknownLayout)?;
    let groups = match slot {
        LegacySlot::Single(records) => vec![(legacy_group.to_string(), records)],
        LegacySlot::Grouped(groups) => groups.into_iter().collect(),
    };

    let mut workspace = Workspace::default();
    let mut skipped = 0;
    for (name, records) in groups {
        let collection = workspace.group_or_create(&name);
        for record in records {
            let Some(draft) = record.to_draft() else {
                skipped += 1;
                continue;
            };
            let Some(id) = collection.allocate_id(ids.prefix_for(&draft.kind)) else {
                skipped += 1;
                continue;
            };
            // Freshly allocated ids cannot collide
            let _ = store::add(collection, Item::from_draft(id, draft, now));
        }
        collection.mark_clean();
    }

    Ok(DecodedSlot {
        workspace,
        format: SlotFormat::Legacy,
        skipped,
    })
}

pub fn encode_workspace(workspace: &Workspace) -> Result<String, serde_json::Error> {
    keyed::encode(workspace)
}

/// Positional export of a single collection
pub fn encode_legacy(collection: &Collection) -> Result<String, serde_json::Error> {
    let mut text = serde_json::to_string_pretty(&legacy::encode_collection(collection))?;
    text.push('\n');
    Ok(text)
}
