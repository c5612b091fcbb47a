pub mod job;
pub mod session;
