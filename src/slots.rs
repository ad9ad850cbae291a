//! Candidate start-time enumeration for one (date, procedure) pair.
//!
//! Stateless: every call recomputes from the current rules and bookings, so
//! the result is a point-in-time snapshot — the authoritative check happens
//! again at commit time inside `booking`.

use chrono::{Duration, NaiveDate, NaiveDateTime};
use rusqlite::Connection;
use uuid::Uuid;

use crate::booking::SchedulingError;
use crate::calendar;
use crate::config::SLOT_GRANULARITY_MINUTES;
use crate::conflict;
use crate::db::repository::get_procedure;

/// Chronological start times at which `procedure_id` can begin on `date`.
///
/// A candidate is kept iff it starts at or after `now`, the procedure ends
/// by closing time, and it overlaps no SCHEDULED appointment that day.
/// Closed dates and procedures longer than the whole window yield an empty
/// list.
pub fn available_slots(
    conn: &Connection,
    date: NaiveDate,
    procedure_id: Uuid,
    now: NaiveDateTime,
) -> Result<Vec<NaiveDateTime>, SchedulingError> {
    let procedure = get_procedure(conn, procedure_id)?;

    let (opening, closing) = match calendar::resolve(conn, date)?.window() {
        Some(window) => window,
        None => {
            tracing::debug!(%date, "no slots: clinic closed");
            return Ok(Vec::new());
        }
    };

    // One snapshot per call; each candidate checks against it in memory.
    let booked = conflict::scheduled_intervals_on(conn, date)?;

    let duration = Duration::minutes(procedure.duration_minutes);
    let step = Duration::minutes(SLOT_GRANULARITY_MINUTES);
    let closing_at = date.and_time(closing);

    let mut slots = Vec::new();
    let mut candidate = date.and_time(opening);
    while candidate + duration <= closing_at {
        if candidate >= now
            && conflict::find_conflict(candidate, candidate + duration, &booked, None).is_none()
        {
            slots.push(candidate);
        }
        candidate += step;
    }

    tracing::debug!(
        %date,
        procedure = %procedure.name,
        count = slots.len(),
        "slot listing computed"
    );
    Ok(slots)
}
