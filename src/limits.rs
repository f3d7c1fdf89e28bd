use crate::model::Ms;

/// Days a basic-class scan (seed, continuation, past-correction) may cover.
pub const MAX_SCAN_DAYS: i64 = 14;

/// Weeks a recurring batch may search ahead of the reference week.
pub const MAX_BATCH_WEEKS: u32 = 52;

/// Largest batch a single recurring allocation may request.
pub const MAX_BATCH_COUNT: usize = 52;

/// Largest gap, in weeks, between slots of one batch.
pub const MAX_WEEK_SPACING: u32 = 52;

/// Reservations kept per class before saves are refused.
pub const MAX_RESERVATIONS_PER_PRIORITY: usize = 100_000;

/// Recomputes allowed after a version conflict before an allocation fails.
pub const DEFAULT_MAX_CONFLICT_RETRIES: u32 = 8;

/// 1970-01-01T00:00:00Z
pub const MIN_VALID_TIMESTAMP_MS: Ms = 0;

/// 9999-12-31T23:59:59.999Z
pub const MAX_VALID_TIMESTAMP_MS: Ms = 253_402_300_799_999;
