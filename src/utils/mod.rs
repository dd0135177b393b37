pub mod error;
pub mod log;
