use chrono::{DateTime, Utc};

use crate::model::*;

use super::{Engine, EngineError};

impl Engine {
    /// A class's reservations in stored (allocation) order.
    pub async fn reservations(&self, priority: Priority) -> Result<Vec<Ms>, EngineError> {
        Ok(self.load_ledger(priority).await?.reservations)
    }

    /// Every class's reservations as one document. Each class is read
    /// independently; there is no cross-class point in time.
    pub async fn snapshot(&self) -> Result<TakenScheduleDates, EngineError> {
        let mut doc = TakenScheduleDates::default();
        for priority in Priority::ALL {
            let list = self.reservations(priority).await?;
            *doc.get_mut(priority) = list
                .into_iter()
                .map(|t| {
                    DateTime::<Utc>::from_timestamp_millis(t)
                        .ok_or(EngineError::LimitExceeded("timestamp out of range"))
                })
                .collect::<Result<_, _>>()?;
        }
        Ok(doc)
    }

    /// Whether `t` falls in one of the class's windows.
    pub fn is_allowed(&self, priority: Priority, t: Ms) -> bool {
        super::validate::is_allowed(&self.calendar, priority, t)
    }
}
