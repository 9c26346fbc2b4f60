use serde::Serialize;

use crate::io::adapter::PersistenceError;
use crate::io::local_store::LocalStore;
use crate::io::recovery;
use crate::ops::coordinator::ConfirmGate;
use crate::ops::view::{self, ViewSummary};

/// Error type for group operations
#[derive(Debug, thiserror::Error)]
pub enum GroupError {
    #[error("invalid group name \"{0}\": use lowercase letters, digits and hyphens")]
    InvalidName(String),
    #[error("group already exists: {0}")]
    AlreadyExists(String),
    #[error("group not found: {0}")]
    NotFound(String),
    #[error("cancelled")]
    ConfirmationAborted,
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupSummary {
    pub name: String,
    #[serde(flatten)]
    pub counts: ViewSummary,
}

pub fn validate_group_name(name: &str) -> Result<(), GroupError> {
    let valid = !name.is_empty()
        && !name.starts_with('-')
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
    if valid {
        Ok(())
    } else {
        Err(GroupError::InvalidName(name.to_string()))
    }
}

pub fn create_group(store: &mut LocalStore, name: &str) -> Result<(), GroupError> {
    validate_group_name(name)?;
    if !store.create_group(name)? {
        return Err(GroupError::AlreadyExists(name.to_string()));
    }
    tracing::info!(group = name, "group created");
    Ok(())
}

/// Delete a group and every item in it. Returns how many items went with it.
pub fn delete_group(
    store: &mut LocalStore,
    name: &str,
    confirm: &mut dyn ConfirmGate,
) -> Result<usize, GroupError> {
    let count = match store.workspace().group(name) {
        Some(group) => group.len(),
        None => return Err(GroupError::NotFound(name.to_string())),
    };
    if count > 0
        && !confirm.confirm(&format!(
            "Delete group \"{}\" and its {} item(s) forever?",
            name, count
        ))
    {
        return Err(GroupError::ConfirmationAborted);
    }

    let Some(removed) = store.delete_group(name)? else {
        return Err(GroupError::NotFound(name.to_string()));
    };
    for item in removed.items.values() {
        recovery::log_item_deletion(store.data_dir(), name, item);
    }
    tracing::info!(group = name, items = removed.len(), "group deleted");
    Ok(removed.len())
}

pub fn list_groups(store: &LocalStore) -> Vec<GroupSummary> {
    store
        .workspace()
        .groups
        .iter()
        .map(|(name, collection)| GroupSummary {
            name: name.clone(),
            counts: view::summarize(collection),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::adapter::PersistenceAdapter;
    use crate::io::recovery::read_recovery_entries;
    use crate::model::collection::Scope;
    use crate::model::config::IdConfig;
    use crate::model::item::ItemDraft;
    use crate::ops::coordinator::FixedAnswer;
    use crate::ops::store::Mutation;
    use tempfile::TempDir;

    fn open(tmp: &TempDir) -> LocalStore {
        LocalStore::open_in(tmp.path(), IdConfig::default(), "default").unwrap()
    }

    fn add_note(store: &mut LocalStore, group: &str, body: &str) {
        let current = store.load(&Scope::Group(group.into())).unwrap();
        store
            .apply(&Mutation::Create(ItemDraft::note(body)), &current)
            .unwrap();
    }

    #[test]
    fn names_are_validated() {
        assert!(validate_group_name("side-project2").is_ok());
        for bad in ["", "Work", "a b", "-x", "home/sub"] {
            assert!(matches!(
                validate_group_name(bad),
                Err(GroupError::InvalidName(_))
            ));
        }
    }

    #[test]
    fn create_twice_fails() {
        let tmp = TempDir::new().unwrap();
        let mut store = open(&tmp);
        create_group(&mut store, "work").unwrap();
        assert!(matches!(
            create_group(&mut store, "work"),
            Err(GroupError::AlreadyExists(_))
        ));
    }

    #[test]
    fn delete_cascades_and_logs_items() {
        let tmp = TempDir::new().unwrap();
        let mut store = open(&tmp);
        add_note(&mut store, "work", "standup");
        add_note(&mut store, "work", "retro");

        let mut yes = FixedAnswer::yes();
        assert_eq!(delete_group(&mut store, "work", &mut yes).unwrap(), 2);
        assert_eq!(yes.asked, 1);
        assert!(list_groups(&store).is_empty());
        assert_eq!(read_recovery_entries(tmp.path(), None).len(), 2);
    }

    #[test]
    fn declined_delete_keeps_group() {
        let tmp = TempDir::new().unwrap();
        let mut store = open(&tmp);
        add_note(&mut store, "work", "standup");
        let mut no = FixedAnswer::no();
        assert!(matches!(
            delete_group(&mut store, "work", &mut no),
            Err(GroupError::ConfirmationAborted)
        ));
        assert_eq!(list_groups(&store)[0].counts.active, 1);
    }

    #[test]
    fn empty_group_deletes_without_asking() {
        let tmp = TempDir::new().unwrap();
        let mut store = open(&tmp);
        create_group(&mut store, "scratch").unwrap();
        let mut no = FixedAnswer::no();
        assert_eq!(delete_group(&mut store, "scratch", &mut no).unwrap(), 0);
        assert_eq!(no.asked, 0);
        assert!(matches!(
            delete_group(&mut store, "scratch", &mut no),
            Err(GroupError::NotFound(_))
        ));
    }
}
