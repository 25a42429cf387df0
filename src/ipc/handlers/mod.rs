pub mod attendance;
pub mod calc;
pub mod classes;
pub mod core;
pub mod dashboard;
pub mod grades;
pub mod records;
pub mod reports;
pub mod setup;
pub mod students;
