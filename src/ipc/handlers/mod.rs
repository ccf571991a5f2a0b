pub mod attendance;
pub mod comments;
pub mod core;
pub mod dashboard;
pub mod session;
pub mod students;
pub mod tasks;
