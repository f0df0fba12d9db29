//! Shared Application State
//!
//! This module defines the `AppState` struct, which holds the stateless
//! service clients every call session is constructed with.

use crate::config::InterviewSettings;
use interview_core::{
    compatibility::{CompatibilityChecker, CompatibilityPolicy},
    llm_client::LLMClient,
    prompt::PromptAssembler,
};
use std::sync::Arc;

/// The shared application state, created once at startup and passed to all handlers.
/// All fields are public to be accessible from other modules.
#[derive(Clone)]
pub struct AppState {
    pub llm_client: Arc<dyn LLMClient>,
    pub compatibility: Arc<dyn CompatibilityChecker>,
    pub compatibility_policy: CompatibilityPolicy,
    pub prompts: Arc<dyn PromptAssembler>,
    pub settings: Arc<InterviewSettings>,
}
