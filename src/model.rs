use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Unix milliseconds, the only time type.
pub type Ms = i64;

pub const HOUR_MS: Ms = 3_600_000;
pub const DAY_MS: Ms = 24 * HOUR_MS;
pub const WEEK_MS: Ms = 7 * DAY_MS;

/// Weekday number, 0 = Sunday … 6 = Saturday.
pub type Weekday = u8;

pub const MONDAY: Weekday = 1;
pub const FRIDAY: Weekday = 5;

// ── Calendar arithmetic on Ms ─────────────────────────────────────

/// Midnight UTC of the day containing `t`.
pub fn day_start(t: Ms) -> Ms {
    t.div_euclid(DAY_MS) * DAY_MS
}

/// UTC hour of day (0–23).
pub fn hour_of(t: Ms) -> u8 {
    (t.rem_euclid(DAY_MS) / HOUR_MS) as u8
}

/// UTC weekday. 1970-01-01 was a Thursday.
pub fn weekday_of(t: Ms) -> Weekday {
    (t.div_euclid(DAY_MS) + 4).rem_euclid(7) as Weekday
}

/// Truncate to the start of the hour.
pub fn hour_floor(t: Ms) -> Ms {
    t.div_euclid(HOUR_MS) * HOUR_MS
}

/// Monday 00:00 UTC of the week containing `t`. Sunday belongs to the week
/// that started six days earlier.
pub fn week_start(t: Ms) -> Ms {
    let day = day_start(t);
    let back = (weekday_of(t) as Ms + 6) % 7;
    day - back * DAY_MS
}

/// RFC 3339 rendering for logs and error messages.
pub fn format_ms(t: Ms) -> String {
    match DateTime::<Utc>::from_timestamp_millis(t) {
        Some(dt) => dt.to_rfc3339_opts(SecondsFormat::Millis, true),
        None => format!("{t}ms"),
    }
}

// ── Priority classes ──────────────────────────────────────────────

/// Which allocation strategy a priority class uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Family {
    /// Single slot, continuing from the last reservation.
    Basic,
    /// Weekly batches, Monday to Friday.
    Recurring,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    P1,
    P2,
    P3,
    R1,
    R2,
    R3,
}

impl Priority {
    pub const ALL: [Priority; 6] = [
        Priority::P1,
        Priority::P2,
        Priority::P3,
        Priority::R1,
        Priority::R2,
        Priority::R3,
    ];

    pub fn family(self) -> Family {
        match self {
            Priority::P1 | Priority::P2 | Priority::P3 => Family::Basic,
            Priority::R1 | Priority::R2 | Priority::R3 => Family::Recurring,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Priority::P1 => "p1",
            Priority::P2 => "p2",
            Priority::P3 => "p3",
            Priority::R1 => "r1",
            Priority::R2 => "r2",
            Priority::R3 => "r3",
        }
    }

    pub(crate) fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Rejected priority label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownPriority(pub String);

impl fmt::Display for UnknownPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown priority class: {:?}", self.0)
    }
}

impl std::error::Error for UnknownPriority {}

impl FromStr for Priority {
    type Err = UnknownPriority;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "p1" => Ok(Priority::P1),
            "p2" => Ok(Priority::P2),
            "p3" => Ok(Priority::P3),
            "r1" => Ok(Priority::R1),
            "r2" => Ok(Priority::R2),
            "r3" => Ok(Priority::R3),
            _ => Err(UnknownPriority(s.to_string())),
        }
    }
}

// ── Reservations ──────────────────────────────────────────────────

/// A class's persisted reservation list plus its optimistic-concurrency
/// version. Version 0 means nothing has been written yet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredReservations {
    pub version: u64,
    /// Allocation order, not necessarily chronological.
    pub reservations: Vec<Ms>,
}

/// Reservations as loaded for one allocation, with the high-water mark
/// computed once up front.
#[derive(Debug, Clone)]
pub struct PriorityLedger {
    pub version: u64,
    pub reservations: Vec<Ms>,
    /// Chronologically latest reservation.
    pub high_water: Option<Ms>,
}

impl PriorityLedger {
    pub fn new(stored: StoredReservations) -> Self {
        let high_water = stored.reservations.iter().copied().max();
        Self {
            version: stored.version,
            reservations: stored.reservations,
            high_water,
        }
    }

    /// Hour-floored reservation set for collision checks.
    pub fn taken_hours(&self) -> std::collections::HashSet<Ms> {
        self.reservations.iter().map(|&t| hour_floor(t)).collect()
    }

    /// The list to persist after appending `slots`.
    pub fn appended(&self, slots: &[Ms]) -> Vec<Ms> {
        let mut next = Vec::with_capacity(self.reservations.len() + slots.len());
        next.extend_from_slice(&self.reservations);
        next.extend_from_slice(slots);
        next
    }
}

/// The WAL record format. Each save is a full replace of the class's list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    ReservationsReplaced {
        id: Ulid,
        priority: Priority,
        version: u64,
        reservations: Vec<Ms>,
    },
}

impl Event {
    pub fn priority(&self) -> Priority {
        match self {
            Event::ReservationsReplaced { priority, .. } => *priority,
        }
    }
}

// ── Snapshot document ─────────────────────────────────────────────

/// Every class's reservations as one document, ISO-8601 strings on the wire:
/// `{"p1": ["2025-01-04T16:00:00.000Z", ...], ..., "r3": [...]}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TakenScheduleDates {
    #[serde(default)]
    pub p1: Vec<DateTime<Utc>>,
    #[serde(default)]
    pub p2: Vec<DateTime<Utc>>,
    #[serde(default)]
    pub p3: Vec<DateTime<Utc>>,
    #[serde(default)]
    pub r1: Vec<DateTime<Utc>>,
    #[serde(default)]
    pub r2: Vec<DateTime<Utc>>,
    #[serde(default)]
    pub r3: Vec<DateTime<Utc>>,
}

impl TakenScheduleDates {
    pub fn get(&self, priority: Priority) -> &[DateTime<Utc>] {
        match priority {
            Priority::P1 => &self.p1,
            Priority::P2 => &self.p2,
            Priority::P3 => &self.p3,
            Priority::R1 => &self.r1,
            Priority::R2 => &self.r2,
            Priority::R3 => &self.r3,
        }
    }

    pub fn get_mut(&mut self, priority: Priority) -> &mut Vec<DateTime<Utc>> {
        match priority {
            Priority::P1 => &mut self.p1,
            Priority::P2 => &mut self.p2,
            Priority::P3 => &mut self.p3,
            Priority::R1 => &mut self.r1,
            Priority::R2 => &mut self.r2,
            Priority::R3 => &mut self.r3,
        }
    }

    /// Reservations for one class as Ms, in stored order.
    pub fn millis(&self, priority: Priority) -> Vec<Ms> {
        self.get(priority)
            .iter()
            .map(|dt| dt.timestamp_millis())
            .collect()
    }
}

/// A snapshot as read from disk: either the bare document or the key-value
/// record it was historically stored under, `{"taken_dates": {...}}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum SnapshotDocument {
    Stored { taken_dates: TakenScheduleDates },
    Bare(TakenScheduleDates),
}

impl From<SnapshotDocument> for TakenScheduleDates {
    fn from(doc: SnapshotDocument) -> Self {
        match doc {
            SnapshotDocument::Stored { taken_dates } | SnapshotDocument::Bare(taken_dates) => {
                taken_dates
            }
        }
    }
}

// ── Schedule requests ─────────────────────────────────────────────

/// What a caller asks the engine for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleRequest {
    /// An explicit instant. Checked, never persisted.
    At(Ms),
    /// One basic-class slot.
    Next(Priority),
    /// A recurring-class batch.
    Batch {
        priority: Priority,
        count: usize,
        week_spacing: u32,
    },
}

/// One scheduled instant and its delay from the reference instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScheduledSlot {
    pub at: Ms,
    pub after_seconds: i64,
}

impl ScheduledSlot {
    pub fn new(at: Ms, reference: Ms) -> Self {
        Self {
            at,
            after_seconds: (at - reference).div_euclid(1000),
        }
    }
}
