use async_trait::async_trait;
use dashmap::DashMap;

use crate::model::*;

use super::{ReservationStore, StoreError};

/// Process-local store. Nothing survives a restart.
pub struct InMemoryStore {
    lists: DashMap<Priority, StoredReservations>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            lists: DashMap::new(),
        }
    }

    /// Number of classes that have been written at least once.
    pub fn priority_count(&self) -> usize {
        self.lists.len()
    }

    pub fn version(&self, priority: Priority) -> u64 {
        self.lists.get(&priority).map_or(0, |e| e.version)
    }
}

#[async_trait]
impl ReservationStore for InMemoryStore {
    async fn load(&self, priority: Priority) -> Result<StoredReservations, StoreError> {
        Ok(self
            .lists
            .get(&priority)
            .map(|e| e.value().clone())
            .unwrap_or_default())
    }

    async fn save(
        &self,
        priority: Priority,
        expected_version: u64,
        reservations: Vec<Ms>,
    ) -> Result<u64, StoreError> {
        // The entry guard holds the shard lock, so check-and-replace is atomic.
        let mut entry = self.lists.entry(priority).or_default();
        if entry.version != expected_version {
            return Err(StoreError::VersionConflict {
                priority,
                expected: expected_version,
                actual: entry.version,
            });
        }
        entry.version += 1;
        entry.reservations = reservations;
        Ok(entry.version)
    }
}
