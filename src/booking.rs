//! Appointment state machine and the inbound booking operations.
//!
//! Statuses: SCHEDULED is the only live state; CANCELED, DONE and NO_SHOW
//! are terminal. Every mutation runs the full validation gate and the write
//! inside one IMMEDIATE transaction — SQLite admits a single writer, so a
//! concurrent overlapping booking is serialized behind this one and its
//! conflict check sees our committed row. Validation failures roll back and
//! never leave partial state.

use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use thiserror::Error;
use uuid::Uuid;

use crate::calendar;
use crate::conflict;
use crate::db::repository::{
    get_patient, get_patient_appointment, get_procedure, insert_appointment, set_date_time,
    set_status,
};
use crate::db::DatabaseError;
use crate::models::{Appointment, AppointmentStatus, Procedure};

#[derive(Error, Debug)]
pub enum SchedulingError {
    #[error("requested time {requested} has already passed")]
    PastDate { requested: NaiveDateTime },

    #[error("the clinic is not open at the requested time on {date}")]
    OutsideOperatingHours { date: NaiveDate },

    #[error("special day {date} is marked open but has no hours configured")]
    Configuration { date: NaiveDate },

    #[error(
        "time conflict: an appointment already runs from {} to {}",
        .start.format("%H:%M"),
        .end.format("%H:%M")
    )]
    Conflict {
        start: NaiveDateTime,
        end: NaiveDateTime,
    },

    #[error("cannot move appointment from {from} to {to}")]
    IllegalTransition {
        from: AppointmentStatus,
        to: AppointmentStatus,
    },

    #[error("appointment scheduled for {scheduled_for} has not occurred yet")]
    NotYetOccurred { scheduled_for: NaiveDateTime },

    #[error("appointments that have already occurred cannot be changed")]
    LockedPastRecord,

    #[error("entity not found: {entity_type} with id {id}")]
    NotFound { entity_type: String, id: String },

    #[error(transparent)]
    Database(DatabaseError),
}

// Missing rows surface as the caller-facing NotFound kind; everything else
// stays a store failure.
impl From<DatabaseError> for SchedulingError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::NotFound { entity_type, id } => Self::NotFound { entity_type, id },
            other => Self::Database(other),
        }
    }
}

impl From<rusqlite::Error> for SchedulingError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Database(DatabaseError::Sqlite(err))
    }
}

/// The validation gate run before any write that places an appointment on
/// the calendar: future instant, inside the resolved operating window, and
/// conflict-free against every SCHEDULED appointment that day (excluding
/// the record's own row on re-validation).
fn validate_slot(
    tx: &Transaction<'_>,
    date_time: NaiveDateTime,
    procedure: &Procedure,
    exclude: Option<Uuid>,
    now: NaiveDateTime,
) -> Result<(), SchedulingError> {
    if date_time < now {
        return Err(SchedulingError::PastDate {
            requested: date_time,
        });
    }

    let date = date_time.date();
    let in_window = calendar::resolve(tx, date)?
        .window()
        .is_some_and(|(opening, closing)| {
            let time = date_time.time();
            opening <= time && time < closing
        });
    if !in_window {
        tracing::warn!(%date_time, "booking rejected: outside operating hours");
        return Err(SchedulingError::OutsideOperatingHours { date });
    }

    let booked = conflict::scheduled_intervals_on(tx, date)?;
    let end = date_time + chrono::Duration::minutes(procedure.duration_minutes);
    if let Some(existing) = conflict::find_conflict(date_time, end, &booked, exclude) {
        tracing::warn!(%date_time, conflicting = %existing.start, "booking rejected: conflict");
        return Err(SchedulingError::Conflict {
            start: existing.start,
            end: existing.end,
        });
    }

    Ok(())
}

/// Book a new appointment. Created SCHEDULED; `created_at` is set from
/// `now` and never changes.
pub fn book_appointment(
    conn: &mut Connection,
    patient_id: Uuid,
    procedure_id: Uuid,
    date_time: NaiveDateTime,
    now: NaiveDateTime,
) -> Result<Appointment, SchedulingError> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    get_patient(&tx, patient_id)?;
    let procedure = get_procedure(&tx, procedure_id)?;
    validate_slot(&tx, date_time, &procedure, None, now)?;

    let appointment = Appointment {
        id: Uuid::new_v4(),
        patient_id,
        procedure_id,
        date_time,
        status: AppointmentStatus::Scheduled,
        created_at: now,
    };
    insert_appointment(&tx, &appointment)?;
    tx.commit()?;

    tracing::info!(id = %appointment.id, %date_time, "appointment booked");
    Ok(appointment)
}

/// Move a SCHEDULED appointment to a new time. Allowed only while the
/// original time is still in the future; the new time passes the full gate
/// with the record's own row excluded from the conflict check.
pub fn reschedule_appointment(
    conn: &mut Connection,
    appointment_id: Uuid,
    patient_id: Uuid,
    new_date_time: NaiveDateTime,
    now: NaiveDateTime,
) -> Result<Appointment, SchedulingError> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let appointment = get_patient_appointment(&tx, appointment_id, patient_id)?;
    if appointment.status != AppointmentStatus::Scheduled {
        return Err(SchedulingError::IllegalTransition {
            from: appointment.status,
            to: AppointmentStatus::Scheduled,
        });
    }
    if appointment.date_time < now {
        return Err(SchedulingError::LockedPastRecord);
    }

    let procedure = get_procedure(&tx, appointment.procedure_id)?;
    validate_slot(&tx, new_date_time, &procedure, Some(appointment_id), now)?;

    set_date_time(&tx, appointment_id, new_date_time)?;
    tx.commit()?;

    tracing::info!(id = %appointment_id, %new_date_time, "appointment rescheduled");
    Ok(Appointment {
        date_time: new_date_time,
        ..appointment
    })
}

/// SCHEDULED → CANCELED. Only for appointments whose time has not passed.
pub fn cancel_appointment(
    conn: &mut Connection,
    appointment_id: Uuid,
    patient_id: Uuid,
    now: NaiveDateTime,
) -> Result<Appointment, SchedulingError> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let appointment = get_patient_appointment(&tx, appointment_id, patient_id)?;
    if appointment.status != AppointmentStatus::Scheduled {
        return Err(SchedulingError::IllegalTransition {
            from: appointment.status,
            to: AppointmentStatus::Canceled,
        });
    }
    if appointment.date_time < now {
        return Err(SchedulingError::PastDate {
            requested: appointment.date_time,
        });
    }

    set_status(&tx, appointment_id, AppointmentStatus::Canceled)?;
    tx.commit()?;

    tracing::info!(id = %appointment_id, "appointment canceled");
    Ok(Appointment {
        status: AppointmentStatus::Canceled,
        ..appointment
    })
}

/// SCHEDULED → DONE, once the appointment time has elapsed.
pub fn complete_appointment(
    conn: &mut Connection,
    appointment_id: Uuid,
    now: NaiveDateTime,
) -> Result<Appointment, SchedulingError> {
    close_out(conn, appointment_id, AppointmentStatus::Done, now)
}

/// SCHEDULED → NO_SHOW, once the appointment time has elapsed.
pub fn mark_no_show(
    conn: &mut Connection,
    appointment_id: Uuid,
    now: NaiveDateTime,
) -> Result<Appointment, SchedulingError> {
    close_out(conn, appointment_id, AppointmentStatus::NoShow, now)
}

// DONE and NO_SHOW share the same guard: live record, time elapsed.
fn close_out(
    conn: &mut Connection,
    appointment_id: Uuid,
    to: AppointmentStatus,
    now: NaiveDateTime,
) -> Result<Appointment, SchedulingError> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let appointment = crate::db::repository::get_appointment(&tx, appointment_id)?;
    if appointment.status != AppointmentStatus::Scheduled {
        return Err(SchedulingError::IllegalTransition {
            from: appointment.status,
            to,
        });
    }
    if appointment.date_time > now {
        return Err(SchedulingError::NotYetOccurred {
            scheduled_for: appointment.date_time,
        });
    }

    set_status(&tx, appointment_id, to)?;
    tx.commit()?;

    tracing::info!(id = %appointment_id, status = %to, "appointment closed out");
    Ok(Appointment {
        status: to,
        ..appointment
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conflict::scheduled_intervals_on;
    use crate::db::repository::{
        insert_patient, insert_procedure, upsert_special_day, upsert_working_day,
    };
    use crate::db::sqlite::open_memory_database;
    use crate::models::{Patient, Procedure, SpecialDay, WorkingDay};
    use crate::slots::available_slots;
    use chrono::{NaiveTime, Weekday};

    // 2026-03-02 is a Monday with hours 08:00–18:00 in every test below.
    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 2).unwrap()
    }

    fn at(h: u32, m: u32) -> NaiveDateTime {
        monday().and_hms_opt(h, m, 0).unwrap()
    }

    fn day_before() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    fn day_after() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, 3)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    fn setup_db() -> (Connection, Uuid, Uuid) {
        let conn = open_memory_database().unwrap();
        upsert_working_day(
            &conn,
            &WorkingDay {
                weekday: Weekday::Mon,
                opening_time: NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
                closing_time: NaiveTime::from_hms_opt(18, 0, 0).unwrap(),
                is_open: true,
            },
        )
        .unwrap();

        let patient = Patient {
            id: Uuid::new_v4(),
            full_name: "Ana Lima".into(),
            phone: "+55 11 98888-0000".into(),
            cpf: "98765432100".into(),
            birth_date: None,
        };
        let procedure = Procedure {
            id: Uuid::new_v4(),
            name: "Consultation".into(),
            description: String::new(),
            price_cents: 20_000,
            duration_minutes: 30,
        };
        insert_patient(&conn, &patient).unwrap();
        insert_procedure(&conn, &procedure).unwrap();
        (conn, patient.id, procedure.id)
    }

    #[test]
    fn booking_a_free_slot_succeeds() {
        let (mut conn, patient_id, procedure_id) = setup_db();
        let appt =
            book_appointment(&mut conn, patient_id, procedure_id, at(10, 0), day_before()).unwrap();

        assert_eq!(appt.status, AppointmentStatus::Scheduled);
        assert_eq!(appt.date_time, at(10, 0));
        assert_eq!(appt.created_at, day_before());

        let stored = crate::db::repository::get_appointment(&conn, appt.id).unwrap();
        assert_eq!(stored.date_time, at(10, 0));
    }

    #[test]
    fn overlapping_booking_reports_the_conflicting_interval() {
        let (mut conn, patient_id, procedure_id) = setup_db();
        book_appointment(&mut conn, patient_id, procedure_id, at(10, 0), day_before()).unwrap();

        // 10:15 for a 30-minute procedure lands inside 10:00–10:30.
        let err = book_appointment(&mut conn, patient_id, procedure_id, at(10, 15), day_before())
            .unwrap_err();
        match err {
            SchedulingError::Conflict { start, end } => {
                assert_eq!(start, at(10, 0));
                assert_eq!(end, at(10, 30));
            }
            other => panic!("expected Conflict, got {other:?}"),
        }
    }

    #[test]
    fn back_to_back_bookings_are_allowed() {
        let (mut conn, patient_id, procedure_id) = setup_db();
        book_appointment(&mut conn, patient_id, procedure_id, at(10, 0), day_before()).unwrap();
        // Starts exactly where the previous one ends.
        assert!(
            book_appointment(&mut conn, patient_id, procedure_id, at(10, 30), day_before()).is_ok()
        );
    }

    #[test]
    fn booking_in_the_past_is_rejected() {
        let (mut conn, patient_id, procedure_id) = setup_db();
        let err = book_appointment(&mut conn, patient_id, procedure_id, at(10, 0), day_after())
            .unwrap_err();
        assert!(matches!(err, SchedulingError::PastDate { .. }));
    }

    #[test]
    fn booking_outside_hours_is_rejected() {
        let (mut conn, patient_id, procedure_id) = setup_db();
        for start in [at(7, 30), at(18, 0), at(20, 0)] {
            let err = book_appointment(&mut conn, patient_id, procedure_id, start, day_before())
                .unwrap_err();
            assert!(
                matches!(err, SchedulingError::OutsideOperatingHours { .. }),
                "{start} should be outside hours"
            );
        }
    }

    #[test]
    fn booking_on_unconfigured_day_is_rejected() {
        let (mut conn, patient_id, procedure_id) = setup_db();
        // 2026-03-03 is a Tuesday with no working-day row.
        let tuesday = NaiveDate::from_ymd_opt(2026, 3, 3)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap();
        let err = book_appointment(&mut conn, patient_id, procedure_id, tuesday, day_before())
            .unwrap_err();
        assert!(matches!(err, SchedulingError::OutsideOperatingHours { .. }));
    }

    #[test]
    fn booking_on_misconfigured_special_day_is_rejected() {
        let (mut conn, patient_id, procedure_id) = setup_db();
        upsert_special_day(
            &conn,
            &SpecialDay {
                date: monday(),
                opening_time: None,
                closing_time: None,
                is_open: true,
            },
        )
        .unwrap();

        let err = book_appointment(&mut conn, patient_id, procedure_id, at(10, 0), day_before())
            .unwrap_err();
        assert!(matches!(err, SchedulingError::Configuration { .. }));
    }

    #[test]
    fn unknown_patient_or_procedure_is_not_found() {
        let (mut conn, patient_id, procedure_id) = setup_db();
        let err = book_appointment(&mut conn, Uuid::new_v4(), procedure_id, at(10, 0), day_before())
            .unwrap_err();
        assert!(matches!(err, SchedulingError::NotFound { .. }));

        let err = book_appointment(&mut conn, patient_id, Uuid::new_v4(), at(10, 0), day_before())
            .unwrap_err();
        assert!(matches!(err, SchedulingError::NotFound { .. }));
    }

    #[test]
    fn listed_slot_books_successfully_then_disappears() {
        let (mut conn, patient_id, procedure_id) = setup_db();
        let slots = available_slots(&conn, monday(), procedure_id, day_before()).unwrap();
        let first = slots[0];

        book_appointment(&mut conn, patient_id, procedure_id, first, day_before()).unwrap();

        // The same slot cannot be booked twice...
        let err = book_appointment(&mut conn, patient_id, procedure_id, first, day_before())
            .unwrap_err();
        assert!(matches!(err, SchedulingError::Conflict { .. }));

        // ...and is no longer listed.
        let slots = available_slots(&conn, monday(), procedure_id, day_before()).unwrap();
        assert!(!slots.contains(&first));
    }

    #[test]
    fn cancel_future_appointment() {
        let (mut conn, patient_id, procedure_id) = setup_db();
        let appt =
            book_appointment(&mut conn, patient_id, procedure_id, at(10, 0), day_before()).unwrap();

        let canceled = cancel_appointment(&mut conn, appt.id, patient_id, day_before()).unwrap();
        assert_eq!(canceled.status, AppointmentStatus::Canceled);

        // The freed time is bookable again.
        assert!(
            book_appointment(&mut conn, patient_id, procedure_id, at(10, 0), day_before()).is_ok()
        );
    }

    #[test]
    fn cancel_is_never_a_silent_no_op() {
        let (mut conn, patient_id, procedure_id) = setup_db();
        let appt =
            book_appointment(&mut conn, patient_id, procedure_id, at(10, 0), day_before()).unwrap();
        cancel_appointment(&mut conn, appt.id, patient_id, day_before()).unwrap();

        let err = cancel_appointment(&mut conn, appt.id, patient_id, day_before()).unwrap_err();
        assert!(matches!(
            err,
            SchedulingError::IllegalTransition {
                from: AppointmentStatus::Canceled,
                to: AppointmentStatus::Canceled,
            }
        ));
    }

    #[test]
    fn cancel_requires_ownership() {
        let (mut conn, patient_id, procedure_id) = setup_db();
        let appt =
            book_appointment(&mut conn, patient_id, procedure_id, at(10, 0), day_before()).unwrap();

        let err = cancel_appointment(&mut conn, appt.id, Uuid::new_v4(), day_before()).unwrap_err();
        assert!(matches!(err, SchedulingError::NotFound { .. }));
    }

    #[test]
    fn elapsed_appointment_completes_or_no_shows_but_never_cancels() {
        // Scenario: booked for Monday 10:00, evaluated on Tuesday.
        let (mut conn, patient_id, procedure_id) = setup_db();
        let first =
            book_appointment(&mut conn, patient_id, procedure_id, at(10, 0), day_before()).unwrap();
        let second =
            book_appointment(&mut conn, patient_id, procedure_id, at(11, 0), day_before()).unwrap();

        let err = cancel_appointment(&mut conn, first.id, patient_id, day_after()).unwrap_err();
        assert!(matches!(err, SchedulingError::PastDate { .. }));

        let done = complete_appointment(&mut conn, first.id, day_after()).unwrap();
        assert_eq!(done.status, AppointmentStatus::Done);

        let missed = mark_no_show(&mut conn, second.id, day_after()).unwrap();
        assert_eq!(missed.status, AppointmentStatus::NoShow);
    }

    #[test]
    fn completing_before_the_time_is_rejected() {
        let (mut conn, patient_id, procedure_id) = setup_db();
        let appt =
            book_appointment(&mut conn, patient_id, procedure_id, at(10, 0), day_before()).unwrap();

        let err = complete_appointment(&mut conn, appt.id, day_before()).unwrap_err();
        assert!(
            matches!(err, SchedulingError::NotYetOccurred { scheduled_for } if scheduled_for == at(10, 0))
        );

        let err = mark_no_show(&mut conn, appt.id, day_before()).unwrap_err();
        assert!(matches!(err, SchedulingError::NotYetOccurred { .. }));
    }

    #[test]
    fn terminal_states_accept_no_transitions() {
        let (mut conn, patient_id, procedure_id) = setup_db();
        let appt =
            book_appointment(&mut conn, patient_id, procedure_id, at(10, 0), day_before()).unwrap();
        complete_appointment(&mut conn, appt.id, day_after()).unwrap();

        assert!(matches!(
            mark_no_show(&mut conn, appt.id, day_after()).unwrap_err(),
            SchedulingError::IllegalTransition { .. }
        ));
        assert!(matches!(
            complete_appointment(&mut conn, appt.id, day_after()).unwrap_err(),
            SchedulingError::IllegalTransition { .. }
        ));
        assert!(matches!(
            cancel_appointment(&mut conn, appt.id, patient_id, day_after()).unwrap_err(),
            SchedulingError::IllegalTransition { .. }
        ));
    }

    #[test]
    fn reschedule_still_future_appointment() {
        let (mut conn, patient_id, procedure_id) = setup_db();
        let appt =
            book_appointment(&mut conn, patient_id, procedure_id, at(10, 0), day_before()).unwrap();

        let moved =
            reschedule_appointment(&mut conn, appt.id, patient_id, at(14, 0), day_before())
                .unwrap();
        assert_eq!(moved.date_time, at(14, 0));

        // Old time freed, new time held.
        let slots = available_slots(&conn, monday(), procedure_id, day_before()).unwrap();
        assert!(slots.contains(&at(10, 0)));
        assert!(!slots.contains(&at(14, 0)));
    }

    #[test]
    fn reschedule_excludes_own_row_from_conflict_check() {
        let (mut conn, patient_id, procedure_id) = setup_db();
        let appt =
            book_appointment(&mut conn, patient_id, procedure_id, at(10, 0), day_before()).unwrap();

        // Nudging within the old interval only collides with itself.
        let moved =
            reschedule_appointment(&mut conn, appt.id, patient_id, at(10, 0), day_before())
                .unwrap();
        assert_eq!(moved.date_time, at(10, 0));
    }

    #[test]
    fn reschedule_onto_another_booking_is_rejected() {
        let (mut conn, patient_id, procedure_id) = setup_db();
        book_appointment(&mut conn, patient_id, procedure_id, at(10, 0), day_before()).unwrap();
        let appt =
            book_appointment(&mut conn, patient_id, procedure_id, at(14, 0), day_before()).unwrap();

        let err = reschedule_appointment(&mut conn, appt.id, patient_id, at(10, 15), day_before())
            .unwrap_err();
        assert!(matches!(err, SchedulingError::Conflict { .. }));

        // Failed validation left the record untouched.
        let stored = crate::db::repository::get_appointment(&conn, appt.id).unwrap();
        assert_eq!(stored.date_time, at(14, 0));
    }

    #[test]
    fn elapsed_appointment_is_locked_against_rescheduling() {
        let (mut conn, patient_id, procedure_id) = setup_db();
        let appt =
            book_appointment(&mut conn, patient_id, procedure_id, at(10, 0), day_before()).unwrap();

        // A week later: the original time has passed.
        let next_monday = NaiveDate::from_ymd_opt(2026, 3, 9)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap();
        let err =
            reschedule_appointment(&mut conn, appt.id, patient_id, next_monday, day_after())
                .unwrap_err();
        assert!(matches!(err, SchedulingError::LockedPastRecord));
    }

    #[test]
    fn scheduled_intervals_never_overlap_after_mixed_operations() {
        let (mut conn, patient_id, procedure_id) = setup_db();
        let a =
            book_appointment(&mut conn, patient_id, procedure_id, at(9, 0), day_before()).unwrap();
        book_appointment(&mut conn, patient_id, procedure_id, at(10, 0), day_before()).unwrap();
        book_appointment(&mut conn, patient_id, procedure_id, at(9, 30), day_before()).unwrap();
        cancel_appointment(&mut conn, a.id, patient_id, day_before()).unwrap();
        book_appointment(&mut conn, patient_id, procedure_id, at(9, 0), day_before()).unwrap();
        let _ = book_appointment(&mut conn, patient_id, procedure_id, at(9, 15), day_before());

        let intervals = scheduled_intervals_on(&conn, monday()).unwrap();
        for (i, a) in intervals.iter().enumerate() {
            for b in &intervals[i + 1..] {
                assert!(
                    !crate::conflict::overlaps(a.start, a.end, b.start, b.end),
                    "{} and {} overlap",
                    a.start,
                    b.start
                );
            }
        }
    }

    #[test]
    fn error_messages_name_the_rule() {
        let conflict = SchedulingError::Conflict {
            start: at(10, 0),
            end: at(10, 30),
        };
        assert_eq!(
            conflict.to_string(),
            "time conflict: an appointment already runs from 10:00 to 10:30"
        );

        let illegal = SchedulingError::IllegalTransition {
            from: AppointmentStatus::Canceled,
            to: AppointmentStatus::Done,
        };
        assert_eq!(
            illegal.to_string(),
            "cannot move appointment from CANCELED to DONE"
        );
    }
}
