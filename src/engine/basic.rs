//! Single-slot allocation for P1–P3.
//!
//! The next slot continues from the class's high-water mark through its
//! window table. A fresh class is seeded from the reference day instead, and
//! any candidate that is not after the reference is replaced by the first
//! window following it.

use crate::calendar::Calendar;
use crate::limits::MAX_SCAN_DAYS;
use crate::model::*;

use super::error::SearchBound;
use super::validate::is_future;
use super::EngineError;

/// Compute the next slot for a basic class. Pure; nothing is persisted.
pub fn next_basic_slot(
    calendar: &Calendar,
    priority: Priority,
    high_water: Option<Ms>,
    reference: Ms,
) -> Result<Ms, EngineError> {
    let candidate = match high_water {
        None => seed(calendar, priority, reference),
        Some(hw) => continue_from(calendar, priority, hw),
    };
    match candidate {
        Some(c) if is_future(c, reference) => Ok(c),
        _ => first_after(calendar, priority, reference).ok_or(EngineError::NoSlotFound {
            priority,
            reference,
            bound: SearchBound::Days(MAX_SCAN_DAYS),
        }),
    }
}

/// Earliest window of the first day, from the reference day on, that still
/// has one ahead of the reference hour.
fn seed(calendar: &Calendar, priority: Priority, reference: Ms) -> Option<Ms> {
    let ref_day = day_start(reference);
    let ref_hour = hour_of(reference);
    (0..MAX_SCAN_DAYS).find_map(|offset| {
        let day = ref_day + offset * DAY_MS;
        let hours = calendar.windows_for_weekday(priority, weekday_of(day));
        let (&first, &last) = (hours.first()?, hours.last()?);
        if offset == 0 && ref_hour >= last {
            return None;
        }
        Some(day + first as Ms * HOUR_MS)
    })
}

/// Next window after `hw`, walking logical days so that a midnight window
/// stays with the evening block it closes.
fn continue_from(calendar: &Calendar, priority: Priority, hw: Ms) -> Option<Ms> {
    let (logical_day, logical_hour) = match hour_of(hw) {
        0 => (day_start(hw) - DAY_MS, 24),
        h => (day_start(hw), h),
    };
    (0..MAX_SCAN_DAYS).find_map(|offset| {
        let day = logical_day + offset * DAY_MS;
        calendar
            .normalized_hours(priority, weekday_of(day))
            .into_iter()
            .find(|&h| offset > 0 || h > logical_hour)
            .map(|h| day + h as Ms * HOUR_MS)
    })
}

/// First window strictly after `reference`, scanning calendar days.
fn first_after(calendar: &Calendar, priority: Priority, reference: Ms) -> Option<Ms> {
    let ref_day = day_start(reference);
    let ref_hour = hour_of(reference);
    (0..MAX_SCAN_DAYS).find_map(|offset| {
        let day = ref_day + offset * DAY_MS;
        calendar
            .windows_for_weekday(priority, weekday_of(day))
            .into_iter()
            .find(|&h| offset > 0 || h > ref_hour)
            .map(|h| day + h as Ms * HOUR_MS)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc(s: &str) -> Ms {
        chrono::DateTime::parse_from_rfc3339(s).unwrap().timestamp_millis()
    }

    fn run(priority: Priority, reference: Ms, n: usize) -> Vec<Ms> {
        let cal = Calendar::standard();
        let mut hw = None;
        let mut out = Vec::with_capacity(n);
        for _ in 0..n {
            let slot = next_basic_slot(&cal, priority, hw, reference).unwrap();
            hw = Some(slot);
            out.push(slot);
        }
        out
    }

    #[test]
    fn p1_seeds_on_saturday() {
        let slots = run(Priority::P1, utc("2025-01-03T12:00:00Z"), 7);
        let expected: Vec<Ms> = [
            "2025-01-04T16:00:00Z",
            "2025-01-04T17:00:00Z",
            "2025-01-04T18:00:00Z",
            "2025-01-05T16:00:00Z",
            "2025-01-05T17:00:00Z",
            "2025-01-05T18:00:00Z",
            "2025-01-11T16:00:00Z",
        ]
        .iter()
        .map(|s| utc(s))
        .collect();
        assert_eq!(slots, expected);
    }

    #[test]
    fn p2_seeds_on_reference_day_when_block_is_ahead() {
        let slots = run(Priority::P2, utc("2025-01-03T12:00:00Z"), 4);
        assert_eq!(slots[0], utc("2025-01-03T16:00:00Z"));
        assert_eq!(slots[3], utc("2025-01-04T19:00:00Z"));
    }

    #[test]
    fn seed_skips_reference_day_after_last_window() {
        let slots = run(Priority::P2, utc("2025-01-03T18:30:00Z"), 1);
        assert_eq!(slots, vec![utc("2025-01-04T19:00:00Z")]);
    }

    #[test]
    fn seed_inside_block_is_corrected_forward() {
        // Saturday 17:30: the day's first window has passed, 18:00 has not.
        let slots = run(Priority::P1, utc("2025-01-04T17:30:00Z"), 1);
        assert_eq!(slots, vec![utc("2025-01-04T18:00:00Z")]);
    }

    #[test]
    fn p3_crosses_midnight_within_block() {
        let slots = run(Priority::P3, utc("2025-01-03T12:00:00Z"), 11);
        let expected: Vec<Ms> = [
            "2025-01-04T21:00:00Z",
            "2025-01-04T22:00:00Z",
            "2025-01-04T23:00:00Z",
            "2025-01-05T00:00:00Z",
            "2025-01-05T01:00:00Z",
            "2025-01-05T21:00:00Z",
            "2025-01-05T22:00:00Z",
            "2025-01-05T23:00:00Z",
            "2025-01-06T00:00:00Z",
            "2025-01-06T01:00:00Z",
            "2025-01-11T21:00:00Z",
        ]
        .iter()
        .map(|s| utc(s))
        .collect();
        assert_eq!(slots, expected);
    }

    #[test]
    fn stale_high_water_resumes_after_reference() {
        let cal = Calendar::standard();
        let reference = utc("2025-01-25T16:04:00Z");
        let slot =
            next_basic_slot(&cal, Priority::P1, Some(utc("2025-01-19T18:00:00Z")), reference)
                .unwrap();
        assert_eq!(slot, utc("2025-01-25T17:00:00Z"));
        assert_eq!(ScheduledSlot::new(slot, reference).after_seconds, 3360);
    }

    #[test]
    fn correction_can_land_on_midnight() {
        let cal = Calendar::standard();
        // Saturday 23:30, P3 high-water long past: Sunday 00:00 is next.
        let slot = next_basic_slot(
            &cal,
            Priority::P3,
            Some(utc("2024-12-01T01:00:00Z")),
            utc("2025-01-04T23:30:00Z"),
        )
        .unwrap();
        assert_eq!(slot, utc("2025-01-05T00:00:00Z"));
    }

    #[test]
    fn high_water_with_minutes_uses_its_hour() {
        let cal = Calendar::standard();
        let slot = next_basic_slot(
            &cal,
            Priority::P1,
            Some(utc("2025-01-04T16:59:00Z")),
            utc("2025-01-03T00:00:00Z"),
        )
        .unwrap();
        assert_eq!(slot, utc("2025-01-04T17:00:00Z"));
    }

    #[test]
    fn empty_table_exhausts_bound() {
        let cal = Calendar::default().with_windows(Priority::P2, Vec::new());
        let reference = utc("2025-01-03T12:00:00Z");
        for hw in [None, Some(reference - DAY_MS)] {
            match next_basic_slot(&cal, Priority::P2, hw, reference) {
                Err(EngineError::NoSlotFound { bound, .. }) => {
                    assert_eq!(bound, SearchBound::Days(MAX_SCAN_DAYS))
                }
                other => panic!("expected NoSlotFound, got {other:?}"),
            }
        }
    }
}
