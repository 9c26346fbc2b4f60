//! In-memory backend for exercising the coordinator without disk or network.

use chrono::{DateTime, TimeZone, Utc};

use crate::io::adapter::{PersistenceAdapter, PersistenceError};
use crate::model::collection::{Collection, Scope};
use crate::model::config::IdConfig;
use crate::ops::store::{self, Applied, Mutation};

pub struct MemoryAdapter {
    /// Labels of every `apply` call, in order
    pub calls: Vec<String>,
    /// When set, the next `apply` fails with this
    pub fail_next: Option<PersistenceError>,
    pub saved: Vec<Collection>,
    pub now: DateTime<Utc>,
    ids: IdConfig,
}

impl MemoryAdapter {
    pub fn new() -> Self {
        MemoryAdapter {
            calls: Vec::new(),
            fail_next: None,
            saved: Vec::new(),
            now: Utc.with_ymd_and_hms(2025, 6, 1, 10, 0, 0).unwrap(),
            ids: IdConfig::default(),
        }
    }

    pub fn failing(err: PersistenceError) -> Self {
        MemoryAdapter {
            fail_next: Some(err),
            ..MemoryAdapter::new()
        }
    }
}

impl PersistenceAdapter for MemoryAdapter {
    fn load(&mut self, scope: &Scope) -> Result<Collection, PersistenceError> {
        Ok(self
            .saved
            .iter()
            .rev()
            .find(|c| &c.scope == scope)
            .cloned()
            .unwrap_or_else(|| Collection::new(scope.clone())))
    }

    fn save(&mut self, collection: &Collection) -> Result<(), PersistenceError> {
        self.saved.push(collection.clone());
        Ok(())
    }

    fn apply(
        &mut self,
        mutation: &Mutation,
        current: &Collection,
    ) -> Result<Applied, PersistenceError> {
        self.calls.push(mutation.label().to_string());
        if let Some(err) = self.fail_next.take() {
            return Err(err);
        }
        let mut copy = current.clone();
        Ok(store::apply_mutation(&mut copy, mutation, &self.ids, self.now)?)
    }
}
