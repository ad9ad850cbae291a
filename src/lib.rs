//! Scheduling core for a single-location clinic.
//!
//! Operating hours come from weekly recurring rules with date-specific
//! overrides ([`calendar`]), bookable start times are enumerated on a fixed
//! 30-minute grid ([`slots`]), and every booking mutation revalidates
//! against the live calendar inside one SQLite transaction ([`booking`]).
//! All times are naive local wall-clock values; callers pass `now`
//! explicitly, the crate never reads the system clock.

pub mod booking;
pub mod calendar;
pub mod config;
pub mod conflict;
pub mod db;
pub mod models;
pub mod slots;

pub use booking::{
    book_appointment, cancel_appointment, complete_appointment, mark_no_show,
    reschedule_appointment, SchedulingError,
};
pub use calendar::{resolve, DaySchedule, RuleSource};
pub use slots::available_slots;
