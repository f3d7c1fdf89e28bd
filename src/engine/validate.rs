use crate::calendar::Calendar;
use crate::model::*;

use super::EngineError;

pub(crate) fn now_ms() -> Ms {
    chrono::Utc::now().timestamp_millis()
}

/// Strictly after the reference instant.
pub(crate) fn is_future(candidate: Ms, reference: Ms) -> bool {
    candidate > reference
}

pub(crate) fn is_allowed(calendar: &Calendar, priority: Priority, candidate: Ms) -> bool {
    calendar.is_allowed_at(priority, candidate)
}

pub(crate) fn validate_reference(reference: Ms) -> Result<(), EngineError> {
    use crate::limits::*;
    if !(MIN_VALID_TIMESTAMP_MS..=MAX_VALID_TIMESTAMP_MS).contains(&reference) {
        return Err(EngineError::LimitExceeded("timestamp out of range"));
    }
    Ok(())
}

/// Final gate on every computed slot before it is persisted.
pub(crate) fn check_slot(
    calendar: &Calendar,
    priority: Priority,
    candidate: Ms,
    reference: Ms,
) -> Result<(), EngineError> {
    if !is_future(candidate, reference) {
        return Err(EngineError::InPast(candidate));
    }
    if !is_allowed(calendar, priority, candidate) {
        return Err(EngineError::LimitExceeded("slot outside allowed windows"));
    }
    if candidate > crate::limits::MAX_VALID_TIMESTAMP_MS {
        return Err(EngineError::LimitExceeded("timestamp out of range"));
    }
    Ok(())
}
