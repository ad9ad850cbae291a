use chrono::{NaiveDate, NaiveTime, Weekday};
use rusqlite::{params, Connection, OptionalExtension};

use crate::db::DatabaseError;
use crate::models::{SpecialDay, WorkingDay};

/// Insert or replace the weekly rule for a weekday. The table holds at most
/// one row per weekday (0=Monday .. 6=Sunday).
pub fn upsert_working_day(conn: &Connection, day: &WorkingDay) -> Result<(), DatabaseError> {
    if day.is_open && day.opening_time >= day.closing_time {
        return Err(DatabaseError::ConstraintViolation(format!(
            "opening time {} must precede closing time {}",
            day.opening_time, day.closing_time
        )));
    }

    conn.execute(
        "INSERT INTO working_days (weekday, opening_time, closing_time, is_open)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(weekday) DO UPDATE SET
             opening_time = excluded.opening_time,
             closing_time = excluded.closing_time,
             is_open = excluded.is_open",
        params![
            day.weekday.num_days_from_monday(),
            day.opening_time,
            day.closing_time,
            day.is_open as i32,
        ],
    )?;
    Ok(())
}

pub fn get_working_day(
    conn: &Connection,
    weekday: Weekday,
) -> Result<Option<WorkingDay>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT weekday, opening_time, closing_time, is_open
         FROM working_days WHERE weekday = ?1",
    )?;

    let row = stmt
        .query_row(params![weekday.num_days_from_monday()], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, NaiveTime>(1)?,
                row.get::<_, NaiveTime>(2)?,
                row.get::<_, i64>(3)?,
            ))
        })
        .optional()?;

    match row {
        Some((index, opening_time, closing_time, is_open)) => Ok(Some(WorkingDay {
            weekday: weekday_from_index(index)?,
            opening_time,
            closing_time,
            is_open: is_open != 0,
        })),
        None => Ok(None),
    }
}

pub fn list_working_days(conn: &Connection) -> Result<Vec<WorkingDay>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT weekday, opening_time, closing_time, is_open
         FROM working_days ORDER BY weekday ASC",
    )?;

    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, i64>(0)?,
            row.get::<_, NaiveTime>(1)?,
            row.get::<_, NaiveTime>(2)?,
            row.get::<_, i64>(3)?,
        ))
    })?;

    let mut days = Vec::new();
    for row in rows {
        let (index, opening_time, closing_time, is_open) = row?;
        days.push(WorkingDay {
            weekday: weekday_from_index(index)?,
            opening_time,
            closing_time,
            is_open: is_open != 0,
        });
    }
    Ok(days)
}

/// Insert or replace the override for a date. An open override without both
/// hours is accepted here; the resolver reports it as a configuration error
/// when the date is queried.
pub fn upsert_special_day(conn: &Connection, day: &SpecialDay) -> Result<(), DatabaseError> {
    if let (Some(opening), Some(closing)) = (day.opening_time, day.closing_time) {
        if day.is_open && opening >= closing {
            return Err(DatabaseError::ConstraintViolation(format!(
                "opening time {opening} must precede closing time {closing}"
            )));
        }
    }

    conn.execute(
        "INSERT INTO special_days (date, opening_time, closing_time, is_open)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(date) DO UPDATE SET
             opening_time = excluded.opening_time,
             closing_time = excluded.closing_time,
             is_open = excluded.is_open",
        params![
            day.date,
            day.opening_time,
            day.closing_time,
            day.is_open as i32,
        ],
    )?;
    Ok(())
}

pub fn get_special_day(
    conn: &Connection,
    date: NaiveDate,
) -> Result<Option<SpecialDay>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT date, opening_time, closing_time, is_open
         FROM special_days WHERE date = ?1",
    )?;

    let row = stmt
        .query_row(params![date], |row| {
            Ok(SpecialDay {
                date: row.get(0)?,
                opening_time: row.get(1)?,
                closing_time: row.get(2)?,
                is_open: row.get::<_, i64>(3)? != 0,
            })
        })
        .optional()?;

    Ok(row)
}

fn weekday_from_index(index: i64) -> Result<Weekday, DatabaseError> {
    u8::try_from(index)
        .ok()
        .and_then(|i| Weekday::try_from(i).ok())
        .ok_or_else(|| DatabaseError::InvalidEnum {
            field: "weekday".into(),
            value: index.to_string(),
        })
}
