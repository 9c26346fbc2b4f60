use indexmap::IndexMap;

use super::collection::{Collection, Scope};

/// Everything held in the local slot: one collection per named group
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Workspace {
    pub groups: IndexMap<String, Collection>,
}

impl Workspace {
    pub fn group(&self, name: &str) -> Option<&Collection> {
        self.groups.get(name)
    }

    pub fn group_mut(&mut self, name: &str) -> Option<&mut Collection> {
        self.groups.get_mut(name)
    }

    /// Get a group, creating an empty one on first use
    pub fn group_or_create(&mut self, name: &str) -> &mut Collection {
        self.groups
            .entry(name.to_string())
            .or_insert_with(|| Collection::new(Scope::Group(name.to_string())))
    }

    /// Replace (or insert) the collection for its group scope
    pub fn put(&mut self, collection: Collection) {
        self.groups
            .insert(collection.scope.name().to_string(), collection);
    }

    /// Remove a group together with all of its items
    pub fn remove_group(&mut self, name: &str) -> Option<Collection> {
        self.groups.shift_remove(name)
    }

    pub fn group_names(&self) -> impl Iterator<Item = &str> {
        self.groups.keys().map(|k| k.as_str())
    }

    pub fn item_count(&self) -> usize {
        self.groups.values().map(|c| c.len()).sum()
    }
}
