use chrono::{NaiveDate, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};

/// Weekly recurring operating-hours rule, one per weekday.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkingDay {
    pub weekday: Weekday,
    pub opening_time: NaiveTime,
    pub closing_time: NaiveTime,
    pub is_open: bool,
}

/// Date-specific override of the weekly rule (holiday, extended hours).
/// When present for a date it replaces the WorkingDay entirely; hours may
/// be absent only when the day is closed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpecialDay {
    pub date: NaiveDate,
    pub opening_time: Option<NaiveTime>,
    pub closing_time: Option<NaiveTime>,
    pub is_open: bool,
}
