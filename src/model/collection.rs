use std::fmt;

use indexmap::IndexMap;

use super::item::{Item, ItemId};

/// Who a collection belongs to: the signed-in owner (remote backend) or a
/// named group in the local slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Scope {
    Owner(String),
    Group(String),
}

impl Scope {
    pub fn name(&self) -> &str {
        match self {
            Scope::Owner(name) | Scope::Group(name) => name,
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Owner(name) => write!(f, "owner:{}", name),
            Scope::Group(name) => write!(f, "group:{}", name),
        }
    }
}

/// Items belonging to one owner or group, in insertion order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collection {
    pub scope: Scope,
    pub items: IndexMap<ItemId, Item>,
    /// Lowest local sequence number not yet handed out
    pub next_seq: u32,
    /// Set by every mutation, cleared once the collection is persisted
    pub dirty: bool,
}

impl Collection {
    pub fn new(scope: Scope) -> Self {
        Collection {
            scope,
            items: IndexMap::new(),
            next_seq: 1,
            dirty: false,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn contains(&self, id: &ItemId) -> bool {
        self.items.contains_key(id)
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }

    /// Hand out the next local id, e.g. `N-004`. `None` once the sequence
    /// is exhausted.
    pub fn allocate_id(&mut self, prefix: &str) -> Option<ItemId> {
        let next = self.next_seq.checked_add(1)?;
        let id = ItemId::new(format!("{}-{:03}", prefix, self.next_seq));
        self.next_seq = next;
        Some(id)
    }

    /// Keep the sequence ahead of an id that arrived from elsewhere.
    /// Returns false when the id's number leaves no room for a successor.
    pub fn note_sequence(&mut self, id: &ItemId) -> bool {
        match id.sequence() {
            Some(n) if n >= self.next_seq => match n.checked_add(1) {
                Some(next) => {
                    self.next_seq = next;
                    true
                }
                None => false,
            },
            _ => true,
        }
    }
}
