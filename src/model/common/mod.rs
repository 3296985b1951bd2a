pub mod day;
mod election;
mod student;

pub use election::{ElectionState, ElectionType, Priority};
pub use student::{AcademicLevel, Department};
