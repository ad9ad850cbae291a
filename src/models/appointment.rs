use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::AppointmentStatus;

/// A booked time slot. `created_at` is set once at booking and never
/// changes; status moves only through the transitions in `booking`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub procedure_id: Uuid,
    pub date_time: NaiveDateTime,
    pub status: AppointmentStatus,
    pub created_at: NaiveDateTime,
}

impl Appointment {
    /// Exclusive end of the occupied interval, given the procedure duration.
    pub fn end_time(&self, duration_minutes: i64) -> NaiveDateTime {
        self.date_time + Duration::minutes(duration_minutes)
    }
}
