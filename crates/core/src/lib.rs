//! Transport-free building blocks for the mock interview voice agent.

pub mod compatibility;
pub mod history;
pub mod llm_client;
pub mod metadata;
pub mod outcome;
pub mod prompt;
pub mod retry;
pub mod timer;
