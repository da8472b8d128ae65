//! Document translation service.
//!
//! Accepts a document or a text snippet, translates it with Gemini and hands
//! back the translated artifact. Document translation is asynchronous: the
//! submit endpoint returns a job id immediately, the client polls the job's
//! status and downloads the result once it is complete.

pub mod app_state;
pub mod config;
pub mod models;
pub mod routes;
pub mod services;
