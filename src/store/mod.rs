//! Persistence contract for per-class reservation lists.
//!
//! A store keeps one list per [`Priority`] plus a version counter. Saves are
//! full replaces guarded by compare-and-swap on that version, so two writers
//! that loaded the same state cannot both win.

mod memory;
mod wal_store;

pub use memory::InMemoryStore;
pub use wal_store::WalStore;

use async_trait::async_trait;

use crate::model::{Ms, Priority, StoredReservations};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Backend missing, shut down, or failing I/O.
    Unavailable(String),
    /// The stored version moved since the caller loaded it.
    VersionConflict {
        priority: Priority,
        expected: u64,
        actual: u64,
    },
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Unavailable(e) => write!(f, "store unavailable: {e}"),
            StoreError::VersionConflict {
                priority,
                expected,
                actual,
            } => write!(
                f,
                "version conflict on {priority}: expected {expected}, found {actual}"
            ),
        }
    }
}

impl std::error::Error for StoreError {}

#[async_trait]
pub trait ReservationStore: Send + Sync {
    /// The class's list and version. Empty with version 0 if never written.
    async fn load(&self, priority: Priority) -> Result<StoredReservations, StoreError>;

    /// Replace the class's list if its version is still `expected_version`.
    /// Returns the new version.
    async fn save(
        &self,
        priority: Priority,
        expected_version: u64,
        reservations: Vec<Ms>,
    ) -> Result<u64, StoreError>;
}
