pub mod documents;
pub mod gemini;
pub mod job_store;
pub mod retention;
pub mod runner;
pub mod translator;
