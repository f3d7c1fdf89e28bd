use crate::model::{format_ms, Ms, Priority};
use crate::store::StoreError;

/// Which search bound ran out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchBound {
    Days(i64),
    Weeks(u32),
}

impl std::fmt::Display for SearchBound {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SearchBound::Days(n) => write!(f, "{n} days"),
            SearchBound::Weeks(n) => write!(f, "{n} weeks"),
        }
    }
}

#[derive(Debug)]
pub enum EngineError {
    StoreUnavailable(String),
    NoSlotFound {
        priority: Priority,
        reference: Ms,
        bound: SearchBound,
    },
    InvalidPriorityClass(String),
    ConcurrentModification {
        priority: Priority,
        attempts: u32,
    },
    InPast(Ms),
    LimitExceeded(&'static str),
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::StoreUnavailable(e) => write!(f, "reservation store unavailable: {e}"),
            EngineError::NoSlotFound {
                priority,
                reference,
                bound,
            } => write!(
                f,
                "no slot found for {priority} within {bound} of {}",
                format_ms(*reference)
            ),
            EngineError::InvalidPriorityClass(label) => {
                write!(f, "invalid priority class: {label}")
            }
            EngineError::ConcurrentModification { priority, attempts } => write!(
                f,
                "reservations for {priority} kept changing; gave up after {attempts} attempts"
            ),
            EngineError::InPast(t) => {
                write!(f, "schedule date must be in the future, got {}", format_ms(*t))
            }
            EngineError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
        }
    }
}

impl std::error::Error for EngineError {}

impl From<StoreError> for EngineError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Unavailable(msg) => EngineError::StoreUnavailable(msg),
            // Callers that can retry match on the conflict before converting.
            StoreError::VersionConflict { priority, .. } => {
                EngineError::ConcurrentModification { priority, attempts: 1 }
            }
        }
    }
}

impl From<crate::model::UnknownPriority> for EngineError {
    fn from(e: crate::model::UnknownPriority) -> Self {
        EngineError::InvalidPriorityClass(e.0)
    }
}

impl EngineError {
    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::StoreUnavailable(_) => "store_unavailable",
            EngineError::NoSlotFound { .. } => "no_slot_found",
            EngineError::InvalidPriorityClass(_) => "invalid_priority",
            EngineError::ConcurrentModification { .. } => "concurrent_modification",
            EngineError::InPast(_) => "in_past",
            EngineError::LimitExceeded(_) => "limit_exceeded",
        }
    }
}
