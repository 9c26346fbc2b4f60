use chrono::{DateTime, Utc};

use crate::model::collection::Collection;
use crate::model::config::IdConfig;
use crate::model::item::{Item, ItemDraft, ItemId, ItemPatch};

/// Error type for collection store operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("invalid item: {0}")]
    Validation(String),
    #[error("item not found: {0}")]
    NotFound(ItemId),
}

/// A user-triggered change, sent to the persistence layer one at a time
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    Create(ItemDraft),
    Update(ItemId, ItemPatch),
    Delete(ItemId),
    TogglePin(ItemId),
    Archive(ItemId),
    Restore(ItemId),
}

impl Mutation {
    /// The item this mutation targets (creates have none yet)
    pub fn target(&self) -> Option<&ItemId> {
        match self {
            Mutation::Create(_) => None,
            Mutation::Update(id, _)
            | Mutation::Delete(id)
            | Mutation::TogglePin(id)
            | Mutation::Archive(id)
            | Mutation::Restore(id) => Some(id),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Mutation::Create(_) => "create",
            Mutation::Update(..) => "update",
            Mutation::Delete(_) => "delete",
            Mutation::TogglePin(_) => "pin",
            Mutation::Archive(_) => "archive",
            Mutation::Restore(_) => "restore",
        }
    }
}

/// What the persistence layer confirmed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Applied {
    Item(Item),
    Removed(ItemId),
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

pub fn validate_draft(draft: &ItemDraft) -> Result<(), StoreError> {
    if draft.body.trim().is_empty() {
        return Err(StoreError::Validation("body must not be empty".into()));
    }
    Ok(())
}

pub fn validate_patch(item: &Item, patch: &ItemPatch) -> Result<(), StoreError> {
    if let Some(body) = &patch.body
        && body.trim().is_empty()
    {
        return Err(StoreError::Validation("body must not be empty".into()));
    }
    if patch.touches_todo_fields() && !item.is_todo() {
        return Err(StoreError::Validation(format!(
            "{} is a note; priority and due date apply to tasks only",
            item.id
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Store contract
// ---------------------------------------------------------------------------

/// Insert an item whose id the persistence layer has already assigned.
pub fn add(collection: &mut Collection, item: Item) -> Result<ItemId, StoreError> {
    if item.body.trim().is_empty() {
        return Err(StoreError::Validation("body must not be empty".into()));
    }
    if collection.contains(&item.id) {
        return Err(StoreError::Validation(format!("duplicate id {}", item.id)));
    }
    let id = item.id.clone();
    if !collection.note_sequence(&id) {
        return Err(StoreError::Validation(format!("id {} is out of range", id)));
    }
    collection.items.insert(id.clone(), item);
    collection.mark_dirty();
    Ok(id)
}

pub fn get<'a>(collection: &'a Collection, id: &ItemId) -> Result<&'a Item, StoreError> {
    collection
        .items
        .get(id)
        .ok_or_else(|| StoreError::NotFound(id.clone()))
}

fn get_mut<'a>(collection: &'a mut Collection, id: &ItemId) -> Result<&'a mut Item, StoreError> {
    collection
        .items
        .get_mut(id)
        .ok_or_else(|| StoreError::NotFound(id.clone()))
}

/// All items in insertion order
pub fn list(collection: &Collection) -> Vec<&Item> {
    collection.items.values().collect()
}

/// Apply a partial update; only the fields present in `patch` change.
pub fn update<'a>(
    collection: &'a mut Collection,
    id: &ItemId,
    patch: &ItemPatch,
) -> Result<&'a Item, StoreError> {
    validate_patch(get(collection, id)?, patch)?;
    collection.mark_dirty();
    let item = get_mut(collection, id)?;
    item.apply_patch(patch);
    Ok(item)
}

/// Remove an item. Removing an absent id is a no-op.
pub fn remove(collection: &mut Collection, id: &ItemId) -> Option<Item> {
    let removed = collection.items.shift_remove(id);
    if removed.is_some() {
        collection.mark_dirty();
    }
    removed
}

pub fn set_pinned<'a>(
    collection: &'a mut Collection,
    id: &ItemId,
    pinned: bool,
) -> Result<&'a Item, StoreError> {
    let item = get(collection, id)?;
    if pinned && item.archived {
        return Err(StoreError::Validation(format!(
            "{} is archived; restore it before pinning",
            id
        )));
    }
    if item.pinned == pinned {
        return get(collection, id);
    }
    collection.mark_dirty();
    let item = get_mut(collection, id)?;
    item.pinned = pinned;
    Ok(item)
}

pub fn toggle_pin<'a>(collection: &'a mut Collection, id: &ItemId) -> Result<&'a Item, StoreError> {
    let pinned = get(collection, id)?.pinned;
    set_pinned(collection, id, !pinned)
}

/// Move an item to the archive. Archived items are never pinned.
pub fn archive<'a>(collection: &'a mut Collection, id: &ItemId) -> Result<&'a Item, StoreError> {
    get(collection, id)?;
    collection.mark_dirty();
    let item = get_mut(collection, id)?;
    item.archived = true;
    item.pinned = false;
    Ok(item)
}

pub fn restore<'a>(collection: &'a mut Collection, id: &ItemId) -> Result<&'a Item, StoreError> {
    get(collection, id)?;
    collection.mark_dirty();
    let item = get_mut(collection, id)?;
    item.archived = false;
    Ok(item)
}

/// Archive every active item. Returns how many moved.
pub fn archive_all(collection: &mut Collection) -> usize {
    let ids = active_ids(collection);
    for id in &ids {
        let _ = archive(collection, id);
    }
    ids.len()
}

pub fn active_ids(collection: &Collection) -> Vec<ItemId> {
    collection
        .items
        .values()
        .filter(|i| !i.archived)
        .map(|i| i.id.clone())
        .collect()
}

/// Items eligible for permanent deletion
pub fn archived_ids(collection: &Collection) -> Vec<ItemId> {
    collection
        .items
        .values()
        .filter(|i| i.archived)
        .map(|i| i.id.clone())
        .collect()
}

/// Store a persistence-confirmed result: replace in place, insert if new,
/// or drop a removed item.
pub fn commit(collection: &mut Collection, applied: &Applied) -> Result<(), StoreError> {
    match applied {
        Applied::Item(item) => {
            if let Some(existing) = collection.items.get_mut(&item.id) {
                *existing = item.clone();
                collection.mark_dirty();
            } else {
                add(collection, item.clone())?;
            }
        }
        Applied::Removed(id) => {
            remove(collection, id);
        }
    }
    Ok(())
}

/// Carry out a mutation directly against a collection, allocating local ids
/// for creates. Used by backends that own their storage.
pub fn apply_mutation(
    collection: &mut Collection,
    mutation: &Mutation,
    ids: &IdConfig,
    now: DateTime<Utc>,
) -> Result<Applied, StoreError> {
    let item = match mutation {
        Mutation::Create(draft) => {
            validate_draft(draft)?;
            let id = collection
                .allocate_id(ids.prefix_for(&draft.kind))
                .ok_or_else(|| StoreError::Validation("no ids left in this collection".into()))?;
            let item = Item::from_draft(id, draft.clone(), now);
            add(collection, item.clone())?;
            return Ok(Applied::Item(item));
        }
        Mutation::Delete(id) => {
            get(collection, id)?;
            remove(collection, id);
            return Ok(Applied::Removed(id.clone()));
        }
        Mutation::Update(id, patch) => update(collection, id, patch)?,
        Mutation::TogglePin(id) => toggle_pin(collection, id)?,
        Mutation::Archive(id) => archive(collection, id)?,
        Mutation::Restore(id) => restore(collection, id)?,
    };
    Ok(Applied::Item(item.clone()))
}
