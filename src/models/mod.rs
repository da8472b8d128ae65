pub mod job;
pub mod translation;
