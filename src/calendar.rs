//! Weekly availability tables, one per priority class.
//!
//! All windows are whole UTC hours. A class may publish at `(weekday, hour)`
//! only if the pair appears in its table.

use std::sync::{Arc, LazyLock};

use serde::{Deserialize, Serialize};

use crate::model::*;

/// One permitted UTC hour-slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AllowedWindow {
    /// 0 = Sunday … 6 = Saturday.
    pub weekday: Weekday,
    /// 0–23.
    pub hour: u8,
}

const fn w(weekday: Weekday, hour: u8) -> AllowedWindow {
    AllowedWindow { weekday, hour }
}

// ── Basic classes ─────────────────────────────────────────────────

/// Weekend mornings (08:00–10:00 PST).
#[rustfmt::skip]
pub static P1_WINDOWS: &[AllowedWindow] = &[
    w(0, 16), w(0, 17), w(0, 18),
    w(6, 16), w(6, 17), w(6, 18),
];

/// Monday/Friday mornings plus weekend late mornings.
#[rustfmt::skip]
pub static P2_WINDOWS: &[AllowedWindow] = &[
    w(1, 16), w(1, 17), w(1, 18),
    w(5, 16), w(5, 17), w(5, 18),
    w(0, 19), w(0, 20), w(0, 21),
    w(6, 19), w(6, 20), w(6, 21),
];

/// Weekend evenings running past midnight into Sunday and Monday.
#[rustfmt::skip]
pub static P3_WINDOWS: &[AllowedWindow] = &[
    w(6, 21), w(6, 22), w(6, 23),
    w(0, 0), w(0, 1), w(0, 21), w(0, 22), w(0, 23),
    w(1, 0), w(1, 1),
];

// ── Recurring classes ─────────────────────────────────────────────

#[rustfmt::skip]
pub static R1_WINDOWS: &[AllowedWindow] = &[
    w(1, 16), w(1, 17), w(1, 18),
    w(2, 16), w(2, 17), w(2, 18),
    w(3, 16), w(3, 17), w(3, 18),
    w(4, 16), w(4, 17), w(4, 18),
    w(5, 16), w(5, 17), w(5, 18),
];

#[rustfmt::skip]
pub static R2_WINDOWS: &[AllowedWindow] = &[
    w(1, 19), w(1, 20), w(1, 21),
    w(2, 19), w(2, 20), w(2, 21),
    w(3, 19), w(3, 20), w(3, 21),
    w(4, 19), w(4, 20), w(4, 21),
    w(5, 19), w(5, 20), w(5, 21),
];

/// Weekday afternoons PST; the third hour of each block is 00:00 UTC of the
/// following calendar day.
#[rustfmt::skip]
pub static R3_WINDOWS: &[AllowedWindow] = &[
    w(1, 22), w(1, 23), w(2, 0),
    w(2, 22), w(2, 23), w(3, 0),
    w(3, 22), w(3, 23), w(4, 0),
    w(4, 22), w(4, 23), w(5, 0),
    w(5, 22), w(5, 23), w(6, 0),
];

fn standard_table(priority: Priority) -> &'static [AllowedWindow] {
    match priority {
        Priority::P1 => P1_WINDOWS,
        Priority::P2 => P2_WINDOWS,
        Priority::P3 => P3_WINDOWS,
        Priority::R1 => R1_WINDOWS,
        Priority::R2 => R2_WINDOWS,
        Priority::R3 => R3_WINDOWS,
    }
}

static STANDARD: LazyLock<Arc<Calendar>> = LazyLock::new(|| Arc::new(Calendar::build()));

/// The per-class window tables an engine allocates against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Calendar {
    tables: [Vec<AllowedWindow>; 6],
}

impl Default for Calendar {
    fn default() -> Self {
        Self::build()
    }
}

impl Calendar {
    fn build() -> Self {
        Self {
            tables: Priority::ALL.map(|p| standard_table(p).to_vec()),
        }
    }

    /// The shared, process-wide standard calendar.
    pub fn standard() -> Arc<Calendar> {
        STANDARD.clone()
    }

    /// Replace one class's table.
    pub fn with_windows(mut self, priority: Priority, windows: Vec<AllowedWindow>) -> Self {
        self.tables[priority.index()] = windows;
        self
    }

    pub fn windows(&self, priority: Priority) -> &[AllowedWindow] {
        &self.tables[priority.index()]
    }

    /// Allowed hours on `weekday`, ascending. Empty is valid.
    pub fn windows_for_weekday(&self, priority: Priority, weekday: Weekday) -> Vec<u8> {
        let mut hours: Vec<u8> = self
            .windows(priority)
            .iter()
            .filter(|w| w.weekday == weekday)
            .map(|w| w.hour)
            .collect();
        hours.sort_unstable();
        hours.dedup();
        hours
    }

    pub fn is_allowed(&self, priority: Priority, weekday: Weekday, hour: u8) -> bool {
        self.windows(priority)
            .iter()
            .any(|w| w.weekday == weekday && w.hour == hour)
    }

    /// Whether the hour containing `t` is an allowed window.
    pub fn is_allowed_at(&self, priority: Priority, t: Ms) -> bool {
        self.is_allowed(priority, weekday_of(t), hour_of(t))
    }

    /// Allowed hours on `weekday` with midnight folded back a day: an
    /// `(d + 1, 0)` entry shows up here as hour 24 on `d`, and `(d, 0)` is
    /// dropped. Ascending, values 1–24.
    pub fn normalized_hours(&self, priority: Priority, weekday: Weekday) -> Vec<u8> {
        let next = (weekday + 1) % 7;
        let mut hours: Vec<u8> = self
            .windows(priority)
            .iter()
            .filter_map(|w| {
                if w.hour == 0 {
                    (w.weekday == next).then_some(24)
                } else {
                    (w.weekday == weekday).then_some(w.hour)
                }
            })
            .collect();
        hours.sort_unstable();
        hours.dedup();
        hours
    }

    /// True if the class has no windows at all.
    pub fn is_empty(&self, priority: Priority) -> bool {
        self.windows(priority).is_empty()
    }
}
