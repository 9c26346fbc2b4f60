use std::collections::HashMap;
use std::time::Duration;

use crate::io::adapter::{PersistenceAdapter, PersistenceError};
use crate::model::collection::Collection;
use crate::model::item::ItemId;
use crate::ops::store::{self, Applied, Mutation, StoreError};

/// Progress of the latest operation on one item
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum OpState {
    #[default]
    Idle,
    Submitting,
    Committed,
    Failed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Loading,
    Success,
    Error,
}

/// A user-visible notification (the CLI prints these to stderr)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

pub trait Notifier {
    fn notify(&mut self, notice: Notice);
}

/// Blocking yes/no prompt run before anything destructive
pub trait ConfirmGate {
    fn confirm(&mut self, prompt: &str) -> bool;
}

/// Keeps every notice in memory
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    pub notices: Vec<Notice>,
}

impl RecordingNotifier {
    pub fn errors(&self) -> impl Iterator<Item = &Notice> {
        self.notices
            .iter()
            .filter(|n| n.level == NoticeLevel::Error)
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&mut self, notice: Notice) {
        self.notices.push(notice);
    }
}

/// Answers every prompt the same way (`--yes`, scripted input)
#[derive(Debug)]
pub struct FixedAnswer {
    answer: bool,
    pub asked: usize,
}

impl FixedAnswer {
    pub fn yes() -> Self {
        FixedAnswer {
            answer: true,
            asked: 0,
        }
    }

    pub fn no() -> Self {
        FixedAnswer {
            answer: false,
            asked: 0,
        }
    }
}

impl ConfirmGate for FixedAnswer {
    fn confirm(&mut self, _prompt: &str) -> bool {
        self.asked += 1;
        self.answer
    }
}

#[derive(Debug, Clone, Default)]
pub struct CoordinatorSettings {
    /// Minimum pause before a delete is sent. Zero disables it.
    pub delete_delay: Duration,
}

/// Error type for coordinated mutations
#[derive(Debug, thiserror::Error)]
pub enum MutationError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
    #[error("cancelled")]
    ConfirmationAborted,
    #[error("{0} already has a change in flight")]
    Busy(String),
}

/// A validated mutation waiting for its persistence call
#[derive(Debug)]
pub struct Ticket {
    key: String,
    mutation: Mutation,
    noun: &'static str,
    generation: u64,
}

impl Ticket {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn mutation(&self) -> &Mutation {
        &self.mutation
    }
}

/// Sequences user actions: validate, confirm, persist, then update the store.
///
/// The store only changes after the backend confirms, so a failed call
/// leaves nothing to roll back.
pub struct MutationCoordinator<N, C> {
    notifier: N,
    confirm: C,
    settings: CoordinatorSettings,
    states: HashMap<String, OpState>,
    generation: u64,
    creates: u64,
}

impl<N: Notifier, C: ConfirmGate> MutationCoordinator<N, C> {
    pub fn new(notifier: N, confirm: C, settings: CoordinatorSettings) -> Self {
        MutationCoordinator {
            notifier,
            confirm,
            settings,
            states: HashMap::new(),
            generation: 0,
            creates: 0,
        }
    }

    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    pub fn confirm_gate(&self) -> &C {
        &self.confirm
    }

    /// State of the latest operation under `key` (an item id, or `new-N`
    /// for creates)
    pub fn state(&self, key: &str) -> OpState {
        self.states.get(key).cloned().unwrap_or_default()
    }

    pub fn state_of(&self, id: &ItemId) -> OpState {
        self.state(id.as_str())
    }

    /// The view that started pending work is gone. Outcomes of tickets
    /// begun before this call are still recorded, but no longer touch the
    /// store handed to `finish`.
    pub fn leave_view(&mut self) {
        self.generation += 1;
    }

    /// Validate a mutation and move it to `Submitting`.
    ///
    /// Validation and missing-item errors are reported here, before any
    /// persistence call. Deletes must pass the confirmation gate.
    pub fn begin(&mut self, mutation: Mutation, store: &Collection) -> Result<Ticket, MutationError> {
        self.begin_inner(mutation, store, true)
    }

    fn begin_inner(
        &mut self,
        mutation: Mutation,
        store: &Collection,
        gate: bool,
    ) -> Result<Ticket, MutationError> {
        let key = match mutation.target() {
            Some(id) => id.to_string(),
            None => {
                self.creates += 1;
                format!("new-{}", self.creates)
            }
        };
        if self.state(&key) == OpState::Submitting {
            return Err(MutationError::Busy(key));
        }

        let noun = match validate(&mutation, store) {
            Ok(noun) => noun,
            Err(e) => {
                self.notify(NoticeLevel::Error, capitalize(&e.to_string()));
                return Err(e.into());
            }
        };

        if gate
            && matches!(mutation, Mutation::Delete(_))
            && !self.confirm.confirm(&format!(
                "Delete this {} forever? This cannot be undone.",
                noun
            ))
        {
            tracing::debug!(key = %key, "delete cancelled at confirmation");
            return Err(MutationError::ConfirmationAborted);
        }

        self.states.insert(key.clone(), OpState::Submitting);
        self.notify(NoticeLevel::Loading, progress_message(&mutation, noun));
        Ok(Ticket {
            key,
            mutation,
            noun,
            generation: self.generation,
        })
    }

    /// Send a ticket to the backend and settle it as committed or failed.
    pub fn finish(
        &mut self,
        ticket: Ticket,
        store: &mut Collection,
        adapter: &mut dyn PersistenceAdapter,
    ) -> Result<Applied, MutationError> {
        let Ticket {
            key,
            mutation,
            noun,
            generation,
        } = ticket;
        let _span = tracing::info_span!("mutation", op = mutation.label(), key = %key).entered();

        if matches!(mutation, Mutation::Delete(_)) && !self.settings.delete_delay.is_zero() {
            std::thread::sleep(self.settings.delete_delay);
        }

        let applied = match adapter.apply(&mutation, store) {
            Ok(applied) => applied,
            Err(err) => {
                tracing::warn!(error = %err, "backend rejected mutation");
                let message = failure_message(&mutation, noun, &err);
                self.states.insert(key, OpState::Failed(err.to_string()));
                self.notify(NoticeLevel::Error, message);
                return Err(err.into());
            }
        };

        if generation == self.generation {
            let was_dirty = store.dirty;
            if let Err(err) = store::commit(store, &applied) {
                tracing::warn!(error = %err, "confirmed item could not be stored");
                self.states.insert(key, OpState::Failed(err.to_string()));
                self.notify(NoticeLevel::Error, capitalize(&err.to_string()));
                return Err(err.into());
            }
            // The backend already holds this change
            if !was_dirty {
                store.mark_clean();
            }
        } else {
            tracing::debug!("view closed before completion; store left as is");
        }

        self.states.insert(key, OpState::Committed);
        self.notify(
            NoticeLevel::Success,
            success_message(&mutation, noun, &applied),
        );
        Ok(applied)
    }

    /// `begin` followed by `finish`
    pub fn run(
        &mut self,
        mutation: Mutation,
        store: &mut Collection,
        adapter: &mut dyn PersistenceAdapter,
    ) -> Result<Applied, MutationError> {
        let ticket = self.begin(mutation, store)?;
        self.finish(ticket, store, adapter)
    }

    /// Archive every active item, one call each. Stops at the first failure.
    pub fn archive_all(
        &mut self,
        store: &mut Collection,
        adapter: &mut dyn PersistenceAdapter,
    ) -> Result<usize, MutationError> {
        let mut moved = 0;
        for id in store::active_ids(store) {
            self.run(Mutation::Archive(id), store, adapter)?;
            moved += 1;
        }
        Ok(moved)
    }

    /// Permanently delete everything in the archive after a single
    /// confirmation. Stops at the first failure.
    pub fn purge_archived(
        &mut self,
        store: &mut Collection,
        adapter: &mut dyn PersistenceAdapter,
    ) -> Result<usize, MutationError> {
        let ids = store::archived_ids(store);
        if ids.is_empty() {
            return Ok(0);
        }
        if !self.confirm.confirm(&format!(
            "Delete {} archived item(s) forever? This cannot be undone.",
            ids.len()
        )) {
            return Err(MutationError::ConfirmationAborted);
        }
        let mut purged = 0;
        for id in ids {
            let ticket = self.begin_inner(Mutation::Delete(id), store, false)?;
            self.finish(ticket, store, adapter)?;
            purged += 1;
        }
        Ok(purged)
    }

    /// Write the whole collection if it has unsaved changes.
    pub fn flush(
        &mut self,
        store: &mut Collection,
        adapter: &mut dyn PersistenceAdapter,
    ) -> Result<bool, MutationError> {
        if !store.dirty {
            return Ok(false);
        }
        if let Err(err) = adapter.save(store) {
            tracing::warn!(error = %err, scope = %store.scope, "flush failed");
            self.notify(NoticeLevel::Error, format!("Could not save changes: {}", err));
            return Err(err.into());
        }
        store.mark_clean();
        Ok(true)
    }

    fn notify(&mut self, level: NoticeLevel, message: String) {
        self.notifier.notify(Notice { level, message });
    }
}

/// Check a mutation against the store; returns the noun for messages.
fn validate(mutation: &Mutation, store: &Collection) -> Result<&'static str, StoreError> {
    match mutation {
        Mutation::Create(draft) => {
            store::validate_draft(draft)?;
            Ok(draft.kind.noun())
        }
        Mutation::Update(id, patch) => {
            let item = store::get(store, id)?;
            store::validate_patch(item, patch)?;
            Ok(item.kind.noun())
        }
        Mutation::TogglePin(id) => {
            let item = store::get(store, id)?;
            if item.archived {
                return Err(StoreError::Validation(format!(
                    "{} is archived; restore it before pinning",
                    id
                )));
            }
            Ok(item.kind.noun())
        }
        Mutation::Delete(id) | Mutation::Archive(id) | Mutation::Restore(id) => {
            Ok(store::get(store, id)?.kind.noun())
        }
    }
}

fn progress_message(mutation: &Mutation, noun: &str) -> String {
    match mutation {
        Mutation::Create(_) => format!("Saving {}...", noun),
        Mutation::Update(..) => format!("Updating {}...", noun),
        Mutation::Delete(_) => format!("Deleting {}...", noun),
        Mutation::TogglePin(_) => "Updating pin...".to_string(),
        Mutation::Archive(_) => format!("Archiving {}...", noun),
        Mutation::Restore(_) => format!("Restoring {}...", noun),
    }
}

fn success_message(mutation: &Mutation, noun: &str, applied: &Applied) -> String {
    let noun = capitalize(noun);
    match (mutation, applied) {
        (Mutation::Create(_), Applied::Item(item)) => format!("{} saved as {}", noun, item.id),
        (Mutation::TogglePin(_), Applied::Item(item)) if item.pinned => format!("{} pinned", noun),
        (Mutation::TogglePin(_), _) => format!("{} unpinned", noun),
        (Mutation::Update(..), _) => format!("{} updated", noun),
        (Mutation::Delete(_), _) => format!("{} deleted permanently", noun),
        (Mutation::Archive(_), _) => format!("{} moved to archive", noun),
        (Mutation::Restore(_), _) => format!("{} restored to dashboard", noun),
        (Mutation::Create(_), _) => format!("{} saved", noun),
    }
}

fn failure_message(mutation: &Mutation, noun: &str, err: &PersistenceError) -> String {
    if err.is_transient() {
        return format!("Network error: could not {} {}", mutation.label(), noun);
    }
    match err {
        PersistenceError::Unauthorized => "Session expired, sign in again".to_string(),
        _ => format!("Could not {} {}: {}", mutation.label(), noun, err),
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
