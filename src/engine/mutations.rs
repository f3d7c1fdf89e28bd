use tracing::info;

use crate::model::*;

use super::{basic, recurring, Engine, EngineError};

fn require_family(priority: Priority, family: Family) -> Result<(), EngineError> {
    if priority.family() != family {
        return Err(EngineError::InvalidPriorityClass(format!(
            "{priority} is a {:?} class, expected {family:?}",
            priority.family()
        )));
    }
    Ok(())
}

impl Engine {
    /// Reserve the next slot for a basic class (P1–P3).
    pub async fn allocate_next(&self, priority: Priority, reference: Ms) -> Result<Ms, EngineError> {
        require_family(priority, Family::Basic)?;
        let calendar = self.calendar.clone();
        let slots = self
            .commit(priority, reference, |ledger| {
                basic::next_basic_slot(&calendar, priority, ledger.high_water, reference)
                    .map(|slot| vec![slot])
            })
            .await?;
        let slot = slots[0];
        info!("allocated {priority} slot {}", format_ms(slot));
        Ok(slot)
    }

    /// Reserve `count` weekly slots for a recurring class (R1–R3).
    pub async fn allocate_batch(
        &self,
        priority: Priority,
        reference: Ms,
        count: usize,
        week_spacing: u32,
    ) -> Result<Vec<Ms>, EngineError> {
        require_family(priority, Family::Recurring)?;
        recurring::check_batch_args(count, week_spacing)?;
        if count == 0 {
            return Ok(Vec::new());
        }
        let calendar = self.calendar.clone();
        let slots = self
            .commit(priority, reference, |ledger| {
                recurring::find_batch(
                    &calendar,
                    priority,
                    &ledger.taken_hours(),
                    reference,
                    count,
                    week_spacing,
                )
            })
            .await?;
        info!(
            "allocated {count} {priority} slot(s) every {week_spacing} week(s) from {}",
            format_ms(slots[0])
        );
        Ok(slots)
    }

    /// Label-based entry point. Unknown labels fail before the store is
    /// touched.
    pub async fn allocate_next_label(&self, label: &str, reference: Ms) -> Result<Ms, EngineError> {
        let priority: Priority = label.parse()?;
        self.allocate_next(priority, reference).await
    }

    pub async fn allocate_batch_label(
        &self,
        label: &str,
        reference: Ms,
        count: usize,
        week_spacing: u32,
    ) -> Result<Vec<Ms>, EngineError> {
        let priority: Priority = label.parse()?;
        self.allocate_batch(priority, reference, count, week_spacing)
            .await
    }

    /// Resolve a request to slots with their delay from `reference`.
    pub async fn schedule(
        &self,
        request: ScheduleRequest,
        reference: Ms,
    ) -> Result<Vec<ScheduledSlot>, EngineError> {
        let slots = match request {
            ScheduleRequest::At(at) => {
                super::validate::validate_reference(at)?;
                let slot = ScheduledSlot::new(at, reference);
                if slot.after_seconds < 0 {
                    return Err(EngineError::InPast(at));
                }
                return Ok(vec![slot]);
            }
            ScheduleRequest::Next(priority) => vec![self.allocate_next(priority, reference).await?],
            ScheduleRequest::Batch {
                priority,
                count,
                week_spacing,
            } => {
                self.allocate_batch(priority, reference, count, week_spacing)
                    .await?
            }
        };
        Ok(slots
            .into_iter()
            .map(|at| ScheduledSlot::new(at, reference))
            .collect())
    }

    /// [`Engine::schedule`] against the current wall clock.
    pub async fn schedule_now(
        &self,
        request: ScheduleRequest,
    ) -> Result<Vec<ScheduledSlot>, EngineError> {
        self.schedule(request, super::validate::now_ms()).await
    }

    /// Replace every class's list with the document's. Classes are written
    /// one at a time under their allocation lock.
    pub async fn import(&self, doc: &TakenScheduleDates) -> Result<(), EngineError> {
        if Priority::ALL
            .iter()
            .any(|&p| doc.get(p).len() > crate::limits::MAX_RESERVATIONS_PER_PRIORITY)
        {
            return Err(EngineError::LimitExceeded("too many reservations for class"));
        }
        for priority in Priority::ALL {
            let list = doc.millis(priority);
            let lock = self.class_lock(priority);
            let _guard = lock.lock().await;
            let ledger = self.load_ledger(priority).await?;
            self.store.save(priority, ledger.version, list).await?;
        }
        info!("imported reservation snapshot");
        Ok(())
    }
}
