pub mod appointment;
pub mod patient;
pub mod procedure;
pub mod schedule;

pub use appointment::*;
pub use patient::*;
pub use procedure::*;
pub use schedule::*;
