pub mod appointment;
pub mod enums;
pub mod patient;
pub mod procedure;
pub mod schedule;

pub use appointment::Appointment;
pub use enums::AppointmentStatus;
pub use patient::Patient;
pub use procedure::Procedure;
pub use schedule::{SpecialDay, WorkingDay};
