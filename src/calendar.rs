//! Operating-hours resolution: weekly recurring rules plus date-specific
//! overrides, collapsed into a single answer per calendar date.
//!
//! A SpecialDay row wins outright over the WorkingDay for that weekday.
//! A date with neither rule is closed — the clinic never operates on a day
//! nobody configured.

use chrono::{Datelike, NaiveDate, NaiveTime};
use rusqlite::Connection;

use crate::booking::SchedulingError;
use crate::db::repository::{get_special_day, get_working_day};

/// Which rule decided the outcome for a date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleSource {
    SpecialDay,
    WorkingDay,
    /// No rule configured for the date at all.
    Unconfigured,
}

/// Resolved operating hours for one calendar date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DaySchedule {
    Closed {
        source: RuleSource,
    },
    Open {
        source: RuleSource,
        opening: NaiveTime,
        closing: NaiveTime,
    },
}

impl DaySchedule {
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open { .. })
    }

    /// The `[opening, closing)` window, when the date is open.
    pub fn window(&self) -> Option<(NaiveTime, NaiveTime)> {
        match self {
            Self::Open {
                opening, closing, ..
            } => Some((*opening, *closing)),
            Self::Closed { .. } => None,
        }
    }
}

/// Resolve the effective operating hours for `date`.
///
/// An open override without both hours is ambiguous and fails with
/// `Configuration` rather than silently falling back to the weekly rule.
pub fn resolve(conn: &Connection, date: NaiveDate) -> Result<DaySchedule, SchedulingError> {
    if let Some(special) = get_special_day(conn, date)? {
        if !special.is_open {
            return Ok(DaySchedule::Closed {
                source: RuleSource::SpecialDay,
            });
        }
        return match (special.opening_time, special.closing_time) {
            (Some(opening), Some(closing)) => Ok(DaySchedule::Open {
                source: RuleSource::SpecialDay,
                opening,
                closing,
            }),
            _ => {
                tracing::warn!(%date, "special day marked open without hours");
                Err(SchedulingError::Configuration { date })
            }
        };
    }

    match get_working_day(conn, date.weekday())? {
        Some(day) if day.is_open => Ok(DaySchedule::Open {
            source: RuleSource::WorkingDay,
            opening: day.opening_time,
            closing: day.closing_time,
        }),
        Some(_) => Ok(DaySchedule::Closed {
            source: RuleSource::WorkingDay,
        }),
        None => Ok(DaySchedule::Closed {
            source: RuleSource::Unconfigured,
        }),
    }
}
