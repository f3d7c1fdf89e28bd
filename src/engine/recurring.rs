//! Weekly batch allocation for R1–R3: at most one slot per week, Monday to
//! Friday, stepping `week_spacing` weeks at a time from the reference week.

use std::collections::HashSet;

use crate::calendar::Calendar;
use crate::limits::{MAX_BATCH_COUNT, MAX_BATCH_WEEKS, MAX_WEEK_SPACING};
use crate::model::*;

use super::error::SearchBound;
use super::validate::is_future;
use super::EngineError;

pub(crate) fn check_batch_args(count: usize, week_spacing: u32) -> Result<(), EngineError> {
    if !(1..=MAX_WEEK_SPACING).contains(&week_spacing) {
        return Err(EngineError::LimitExceeded("week spacing out of range"));
    }
    if count > MAX_BATCH_COUNT {
        return Err(EngineError::LimitExceeded("batch too large"));
    }
    Ok(())
}

/// Compute `count` slots, sorted. `taken` holds hour-floored reservations.
/// Pure; nothing is persisted.
pub fn find_batch(
    calendar: &Calendar,
    priority: Priority,
    taken: &HashSet<Ms>,
    reference: Ms,
    count: usize,
    week_spacing: u32,
) -> Result<Vec<Ms>, EngineError> {
    check_batch_args(count, week_spacing)?;
    let mut found = Vec::with_capacity(count);
    let first_week = week_start(reference);
    let mut offset = 0;
    while found.len() < count && offset < MAX_BATCH_WEEKS {
        let monday = first_week + offset as Ms * WEEK_MS;
        if let Some(slot) = first_open_in_week(calendar, priority, monday, reference, taken, &found)
        {
            found.push(slot);
        }
        offset += week_spacing;
    }
    if found.len() < count {
        return Err(EngineError::NoSlotFound {
            priority,
            reference,
            bound: SearchBound::Weeks(MAX_BATCH_WEEKS),
        });
    }
    found.sort_unstable();
    Ok(found)
}

fn first_open_in_week(
    calendar: &Calendar,
    priority: Priority,
    monday: Ms,
    reference: Ms,
    taken: &HashSet<Ms>,
    found: &[Ms],
) -> Option<Ms> {
    (MONDAY..=FRIDAY).find_map(|weekday| {
        let day = monday + (weekday - MONDAY) as Ms * DAY_MS;
        calendar
            .normalized_hours(priority, weekday)
            .into_iter()
            .map(|h| day + h as Ms * HOUR_MS)
            .find(|&c| is_future(c, reference) && !taken.contains(&c) && !found.contains(&c))
    })
}
