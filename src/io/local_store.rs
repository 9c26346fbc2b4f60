use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;

use crate::codec::{self, SlotFormat};
use crate::io::adapter::{PersistenceAdapter, PersistenceError};
use crate::io::data_dir::{DataDir, SLOT_FILE};
use crate::io::lock::SlotLock;
use crate::io::recovery::{self, atomic_write};
use crate::model::collection::{Collection, Scope};
use crate::model::config::IdConfig;
use crate::model::workspace::Workspace;
use crate::ops::store::{self, Applied, Mutation};

/// Backend that keeps every group in one JSON slot on disk.
///
/// Each write re-reads the slot under the lock, changes it and rewrites the
/// whole file, so concurrent `nk` processes never lose each other's work.
pub struct LocalStore {
    dir: PathBuf,
    ids: IdConfig,
    legacy_group: String,
    workspace: Workspace,
    format: SlotFormat,
    corrupt_logged: bool,
}

impl LocalStore {
    pub fn open(data: &DataDir) -> Result<Self, PersistenceError> {
        LocalStore::open_in(
            &data.dir,
            data.config.ids.clone(),
            &data.config.local.default_group,
        )
    }

    /// Open the slot in `dir`. Unnamed legacy data is migrated into
    /// `legacy_group`.
    pub fn open_in(dir: &Path, ids: IdConfig, legacy_group: &str) -> Result<Self, PersistenceError> {
        let mut store = LocalStore {
            dir: dir.to_path_buf(),
            ids,
            legacy_group: legacy_group.to_string(),
            workspace: Workspace::default(),
            format: SlotFormat::Empty,
            corrupt_logged: false,
        };
        let (workspace, format) = store.read_slot()?;
        if format == SlotFormat::Legacy {
            tracing::info!(
                items = workspace.item_count(),
                "migrated legacy slot; it will be rewritten on the next save"
            );
        }
        store.workspace = workspace;
        store.format = format;
        Ok(store)
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    /// Layout the slot had when last read
    pub fn format(&self) -> SlotFormat {
        self.format
    }

    pub fn data_dir(&self) -> &Path {
        &self.dir
    }

    pub fn slot_path(&self) -> PathBuf {
        self.dir.join(SLOT_FILE)
    }

    /// Create an empty group. Returns false if it already existed.
    pub fn create_group(&mut self, name: &str) -> Result<bool, PersistenceError> {
        self.transact(|ws| {
            if ws.group(name).is_some() {
                return Ok(false);
            }
            ws.group_or_create(name);
            Ok(true)
        })
    }

    /// Delete a group and all of its items
    pub fn delete_group(&mut self, name: &str) -> Result<Option<Collection>, PersistenceError> {
        self.transact(|ws| Ok(ws.remove_group(name)))
    }

    fn read_slot(&mut self) -> Result<(Workspace, SlotFormat), PersistenceError> {
        let path = self.slot_path();
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(e) => return Err(e.into()),
        };

        match codec::decode_slot(&text, &self.legacy_group, &self.ids, Utc::now()) {
            Ok(decoded) => {
                if decoded.skipped > 0 {
                    tracing::warn!(skipped = decoded.skipped, "dropped blank legacy records");
                }
                Ok((decoded.workspace, decoded.format))
            }
            Err(e) => {
                if !self.corrupt_logged {
                    tracing::warn!(error = %e, slot = %path.display(), "slot unreadable, starting empty");
                    recovery::log_corrupt_slot(&self.dir, &path, &e.to_string(), &text);
                    self.corrupt_logged = true;
                }
                Ok((Workspace::default(), SlotFormat::Empty))
            }
        }
    }

    fn write_slot(&self, workspace: &Workspace) -> Result<(), PersistenceError> {
        let text = codec::encode_workspace(workspace)
            .map_err(|e| PersistenceError::Corrupt(e.to_string()))?;
        let path = self.slot_path();
        if let Err(e) = atomic_write(&path, text.as_bytes()) {
            recovery::log_failed_write(&self.dir, &path, &e.to_string(), &text);
            return Err(e.into());
        }
        tracing::debug!(slot = %path.display(), bytes = text.len(), "slot written");
        Ok(())
    }

    /// Lock, re-read, change, rewrite. Nothing is written if `change` fails.
    fn transact<T>(
        &mut self,
        change: impl FnOnce(&mut Workspace) -> Result<T, PersistenceError>,
    ) -> Result<T, PersistenceError> {
        let _lock = SlotLock::acquire(&self.dir)?;
        let (mut workspace, _) = self.read_slot()?;
        let out = change(&mut workspace)?;
        self.write_slot(&workspace)?;
        for collection in workspace.groups.values_mut() {
            collection.mark_clean();
        }
        self.workspace = workspace;
        self.format = SlotFormat::Keyed;
        Ok(out)
    }
}

impl PersistenceAdapter for LocalStore {
    fn load(&mut self, scope: &Scope) -> Result<Collection, PersistenceError> {
        Ok(self
            .workspace
            .group(scope.name())
            .cloned()
            .unwrap_or_else(|| Collection::new(Scope::Group(scope.name().to_string()))))
    }

    fn save(&mut self, collection: &Collection) -> Result<(), PersistenceError> {
        self.transact(|ws| {
            let mut copy = collection.clone();
            if let Some(existing) = ws.group(copy.scope.name()) {
                copy.next_seq = copy.next_seq.max(existing.next_seq);
            }
            copy.mark_clean();
            ws.put(copy);
            Ok(())
        })
    }

    fn apply(
        &mut self,
        mutation: &Mutation,
        current: &Collection,
    ) -> Result<Applied, PersistenceError> {
        let group = current.scope.name().to_string();
        let ids = self.ids.clone();
        tracing::debug!(op = mutation.label(), group = %group, "local apply");
        self.transact(|ws| {
            let collection = ws.group_or_create(&group);
            Ok(store::apply_mutation(collection, mutation, &ids, Utc::now())?)
        })
    }
}
