use std::str::FromStr;

use chrono::{Duration, NaiveDate, NaiveDateTime};
use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::models::{Appointment, AppointmentStatus};

pub fn insert_appointment(conn: &Connection, appt: &Appointment) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO appointments (id, patient_id, procedure_id, date_time, status, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            appt.id.to_string(),
            appt.patient_id.to_string(),
            appt.procedure_id.to_string(),
            appt.date_time,
            appt.status.as_str(),
            appt.created_at,
        ],
    )?;
    Ok(())
}

pub fn get_appointment(conn: &Connection, id: Uuid) -> Result<Appointment, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, patient_id, procedure_id, date_time, status, created_at
         FROM appointments WHERE id = ?1",
    )?;

    let result = stmt.query_row(params![id.to_string()], row_to_tuple);
    match result {
        Ok(tuple) => tuple_to_appointment(tuple),
        Err(rusqlite::Error::QueryReturnedNoRows) => Err(not_found(id)),
        Err(e) => Err(e.into()),
    }
}

/// Owned lookup: resolves only when the appointment belongs to the patient.
/// A foreign appointment is indistinguishable from a missing one.
pub fn get_patient_appointment(
    conn: &Connection,
    id: Uuid,
    patient_id: Uuid,
) -> Result<Appointment, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, patient_id, procedure_id, date_time, status, created_at
         FROM appointments WHERE id = ?1 AND patient_id = ?2",
    )?;

    let result = stmt.query_row(params![id.to_string(), patient_id.to_string()], row_to_tuple);
    match result {
        Ok(tuple) => tuple_to_appointment(tuple),
        Err(rusqlite::Error::QueryReturnedNoRows) => Err(not_found(id)),
        Err(e) => Err(e.into()),
    }
}

pub fn set_status(
    conn: &Connection,
    id: Uuid,
    status: AppointmentStatus,
) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE appointments SET status = ?1 WHERE id = ?2",
        params![status.as_str(), id.to_string()],
    )?;
    if changed == 0 {
        return Err(not_found(id));
    }
    Ok(())
}

pub fn set_date_time(
    conn: &Connection,
    id: Uuid,
    date_time: NaiveDateTime,
) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE appointments SET date_time = ?1 WHERE id = ?2",
        params![date_time, id.to_string()],
    )?;
    if changed == 0 {
        return Err(not_found(id));
    }
    Ok(())
}

/// A patient's agenda, soonest first.
pub fn appointments_for_patient(
    conn: &Connection,
    patient_id: Uuid,
) -> Result<Vec<Appointment>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, patient_id, procedure_id, date_time, status, created_at
         FROM appointments WHERE patient_id = ?1 ORDER BY date_time ASC",
    )?;

    let rows = stmt.query_map(params![patient_id.to_string()], row_to_tuple)?;
    collect_appointments(rows)
}

/// Past DONE / NO_SHOW appointments, newest first, optionally restricted to
/// an inclusive calendar-date range.
pub fn appointment_history(
    conn: &Connection,
    patient_id: Uuid,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
) -> Result<Vec<Appointment>, DatabaseError> {
    let mut sql = String::from(
        "SELECT id, patient_id, procedure_id, date_time, status, created_at
         FROM appointments
         WHERE patient_id = ?1 AND status IN ('DONE', 'NO_SHOW')",
    );
    let mut args: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(patient_id.to_string())];

    if let Some(from) = from {
        args.push(Box::new(from.and_hms_opt(0, 0, 0).unwrap_or_default()));
        sql.push_str(&format!(" AND date_time >= ?{}", args.len()));
    }
    if let Some(to) = to {
        let end = (to + Duration::days(1)).and_hms_opt(0, 0, 0).unwrap_or_default();
        args.push(Box::new(end));
        sql.push_str(&format!(" AND date_time < ?{}", args.len()));
    }
    sql.push_str(" ORDER BY date_time DESC");

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(rusqlite::params_from_iter(args.iter()), row_to_tuple)?;
    collect_appointments(rows)
}

type AppointmentRow = (String, String, String, NaiveDateTime, String, NaiveDateTime);

fn row_to_tuple(row: &rusqlite::Row<'_>) -> rusqlite::Result<AppointmentRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
    ))
}

fn tuple_to_appointment(
    (id, patient_id, procedure_id, date_time, status, created_at): AppointmentRow,
) -> Result<Appointment, DatabaseError> {
    Ok(Appointment {
        id: Uuid::parse_str(&id).map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?,
        patient_id: Uuid::parse_str(&patient_id)
            .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?,
        procedure_id: Uuid::parse_str(&procedure_id)
            .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?,
        date_time,
        status: AppointmentStatus::from_str(&status)?,
        created_at,
    })
}

fn collect_appointments<'a>(
    rows: impl Iterator<Item = rusqlite::Result<AppointmentRow>> + 'a,
) -> Result<Vec<Appointment>, DatabaseError> {
    let mut appointments = Vec::new();
    for row in rows {
        appointments.push(tuple_to_appointment(row?)?);
    }
    Ok(appointments)
}

fn not_found(id: Uuid) -> DatabaseError {
    DatabaseError::NotFound {
        entity_type: "Appointment".into(),
        id: id.to_string(),
    }
}
