//! Overlap detection between a candidate interval and the appointments
//! already holding time on a date.
//!
//! Intervals are half-open `[start, end)`: back-to-back bookings touch but
//! never conflict. Only SCHEDULED appointments occupy time — canceled,
//! completed, and no-show rows never block a new booking. This predicate is
//! the single source of truth for both slot listing and the commit-time
//! check in `booking`.

use chrono::{Duration, NaiveDate, NaiveDateTime};
use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::db::DatabaseError;

/// Time held by an existing SCHEDULED appointment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookedInterval {
    pub appointment_id: Uuid,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

/// Half-open interval overlap: `[a_start, a_end)` vs `[b_start, b_end)`.
pub fn overlaps(
    a_start: NaiveDateTime,
    a_end: NaiveDateTime,
    b_start: NaiveDateTime,
    b_end: NaiveDateTime,
) -> bool {
    a_start < b_end && b_start < a_end
}

/// First booked interval overlapping the candidate, skipping `exclude`
/// (the candidate's own persisted row when re-validating an update).
pub fn find_conflict<'a>(
    start: NaiveDateTime,
    end: NaiveDateTime,
    booked: &'a [BookedInterval],
    exclude: Option<Uuid>,
) -> Option<&'a BookedInterval> {
    booked
        .iter()
        .filter(|interval| Some(interval.appointment_id) != exclude)
        .find(|interval| overlaps(start, end, interval.start, interval.end))
}

/// Snapshot of every SCHEDULED interval on `date`, with end times derived
/// from each appointment's procedure duration. Fetched once per operation.
pub fn scheduled_intervals_on(
    conn: &Connection,
    date: NaiveDate,
) -> Result<Vec<BookedInterval>, DatabaseError> {
    let day_start = date.and_hms_opt(0, 0, 0).unwrap_or_default();
    let day_end = day_start + Duration::days(1);

    let mut stmt = conn.prepare(
        "SELECT a.id, a.date_time, p.duration_minutes
         FROM appointments a
         JOIN procedures p ON a.procedure_id = p.id
         WHERE a.status = 'SCHEDULED' AND a.date_time >= ?1 AND a.date_time < ?2
         ORDER BY a.date_time ASC",
    )?;

    let rows = stmt.query_map(params![day_start, day_end], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, NaiveDateTime>(1)?,
            row.get::<_, i64>(2)?,
        ))
    })?;

    let mut intervals = Vec::new();
    for row in rows {
        let (id, start, duration_minutes) = row?;
        intervals.push(BookedInterval {
            appointment_id: Uuid::parse_str(&id)
                .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?,
            start,
            end: start + Duration::minutes(duration_minutes),
        });
    }
    Ok(intervals)
}
