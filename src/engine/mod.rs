mod basic;
mod error;
mod mutations;
mod queries;
mod recurring;
mod validate;

pub use basic::next_basic_slot;
pub use error::{EngineError, SearchBound};
pub use recurring::find_batch;

use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{debug, error, warn};
use ulid::Ulid;

use crate::calendar::Calendar;
use crate::limits::{DEFAULT_MAX_CONFLICT_RETRIES, MAX_RESERVATIONS_PER_PRIORITY};
use crate::model::*;
use crate::store::{ReservationStore, StoreError};

pub struct Engine {
    store: Arc<dyn ReservationStore>,
    calendar: Arc<Calendar>,
    /// One allocation at a time per class within this process.
    locks: DashMap<Priority, Arc<Mutex<()>>>,
    max_conflict_retries: u32,
}

impl Engine {
    pub fn new(store: Arc<dyn ReservationStore>) -> Self {
        Self {
            store,
            calendar: Calendar::standard(),
            locks: DashMap::new(),
            max_conflict_retries: DEFAULT_MAX_CONFLICT_RETRIES,
        }
    }

    pub fn with_calendar(mut self, calendar: Arc<Calendar>) -> Self {
        self.calendar = calendar;
        self
    }

    /// Reload-and-recompute attempts allowed after a version conflict.
    pub fn with_max_conflict_retries(mut self, retries: u32) -> Self {
        self.max_conflict_retries = retries;
        self
    }

    fn class_lock(&self, priority: Priority) -> Arc<Mutex<()>> {
        self.locks.entry(priority).or_default().value().clone()
    }

    pub(super) async fn load_ledger(&self, priority: Priority) -> Result<PriorityLedger, EngineError> {
        match self.store.load(priority).await {
            Ok(stored) => Ok(PriorityLedger::new(stored)),
            Err(e) => {
                error!("load {priority} failed: {e}");
                Err(e.into())
            }
        }
    }

    /// Load, compute and save under the class lock, recomputing from a fresh
    /// load whenever the save loses a version race.
    pub(super) async fn commit<F>(
        &self,
        priority: Priority,
        reference: Ms,
        compute: F,
    ) -> Result<Vec<Ms>, EngineError>
    where
        F: Fn(&PriorityLedger) -> Result<Vec<Ms>, EngineError>,
    {
        let start = Instant::now();
        let result = self.commit_inner(priority, reference, compute).await;
        let status = match &result {
            Ok(_) => "ok",
            Err(e) => e.kind(),
        };
        crate::observability::record_allocation(priority, status, start.elapsed());
        result
    }

    async fn commit_inner<F>(
        &self,
        priority: Priority,
        reference: Ms,
        compute: F,
    ) -> Result<Vec<Ms>, EngineError>
    where
        F: Fn(&PriorityLedger) -> Result<Vec<Ms>, EngineError>,
    {
        validate::validate_reference(reference)?;
        let lock = self.class_lock(priority);
        let _guard = lock.lock().await;

        let commit_id = Ulid::new();
        let mut attempts = 0u32;
        loop {
            attempts += 1;
            let ledger = self.load_ledger(priority).await?;
            let slots = compute(&ledger)?;
            if slots.is_empty() {
                return Ok(slots);
            }
            for &slot in &slots {
                validate::check_slot(&self.calendar, priority, slot, reference)?;
            }
            if ledger.reservations.len() + slots.len() > MAX_RESERVATIONS_PER_PRIORITY {
                return Err(EngineError::LimitExceeded("too many reservations for class"));
            }

            match self
                .store
                .save(priority, ledger.version, ledger.appended(&slots))
                .await
            {
                Ok(version) => {
                    debug!("{commit_id} {priority} saved at version {version} after {attempts} attempt(s)");
                    return Ok(slots);
                }
                Err(StoreError::VersionConflict {
                    expected, actual, ..
                }) => {
                    metrics::counter!(crate::observability::STORE_CONFLICTS_TOTAL, "priority" => priority.label())
                        .increment(1);
                    if attempts > self.max_conflict_retries {
                        warn!("{commit_id} {priority} giving up after {attempts} conflicting saves");
                        return Err(EngineError::ConcurrentModification { priority, attempts });
                    }
                    warn!("{commit_id} {priority} version moved {expected} -> {actual}, recomputing");
                }
                Err(e) => {
                    error!("{commit_id} save {priority} failed: {e}");
                    return Err(e.into());
                }
            }
        }
    }
}
