//! Canonical interview metadata.
//!
//! The call-setup event can carry the candidate and job details in several
//! places depending on how the call was created. [`InterviewMetadata::from_event`]
//! resolves all of them once, so the rest of the session only ever sees one
//! normalized structure.

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const DEFAULT_LANGUAGE: &str = "en";
pub const DEFAULT_DOMAIN: &str = "general";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterviewMetadata {
    pub call_id: Option<String>,
    pub candidate_name: Option<String>,
    pub role: Option<String>,
    pub company: Option<String>,
    pub job_description: Option<String>,
    pub resume_text: Option<String>,
    pub language: String,
    pub domain: String,
}

/// Accepted spellings for each field, checked in order within every source.
const CALL_ID_KEYS: &[&str] = &["call_id", "callId"];
const CANDIDATE_KEYS: &[&str] = &["candidate_name", "candidateName", "user_name", "name"];
const ROLE_KEYS: &[&str] = &["role", "job_title", "jobTitle", "position"];
const COMPANY_KEYS: &[&str] = &["company", "company_name", "companyName"];
const JOB_KEYS: &[&str] = &["job_description", "jobDescription", "job_text"];
const RESUME_KEYS: &[&str] = &["resume_text", "resumeText", "resume"];
const LANGUAGE_KEYS: &[&str] = &["language", "lang"];
const DOMAIN_KEYS: &[&str] = &["domain", "interview_type", "interviewType"];

impl InterviewMetadata {
    /// Builds metadata from a raw inbound event.
    ///
    /// Sources, first match wins: `metadata`, `call.metadata`,
    /// `call.retell_llm_dynamic_variables`, `retell_llm_dynamic_variables`,
    /// the `call` object and finally the event root.
    pub fn from_event(raw: &Value) -> Self {
        let call = raw.get("call");
        let sources: Vec<&Value> = [
            raw.get("metadata"),
            call.and_then(|c| c.get("metadata")),
            call.and_then(|c| c.get("retell_llm_dynamic_variables")),
            raw.get("retell_llm_dynamic_variables"),
            call,
            Some(raw),
        ]
        .into_iter()
        .flatten()
        .filter(|v| v.is_object())
        .collect();

        let lookup = |keys: &[&str]| -> Option<String> {
            sources.iter().find_map(|source| {
                keys.iter().find_map(|key| match source.get(*key) {
                    Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
                    Some(Value::Number(n)) => Some(n.to_string()),
                    _ => None,
                })
            })
        };

        Self {
            call_id: lookup(CALL_ID_KEYS),
            candidate_name: lookup(CANDIDATE_KEYS),
            role: lookup(ROLE_KEYS),
            company: lookup(COMPANY_KEYS),
            job_description: lookup(JOB_KEYS),
            resume_text: lookup(RESUME_KEYS),
            language: lookup(LANGUAGE_KEYS)
                .map(|l| l.to_lowercase())
                .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string()),
            domain: lookup(DOMAIN_KEYS)
                .map(|d| d.to_lowercase())
                .unwrap_or_else(|| DEFAULT_DOMAIN.to_string()),
        }
    }

    /// True when there is both a resume and a job description to compare.
    pub fn has_fit_inputs(&self) -> bool {
        self.resume_text.is_some() && self.job_description.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_reads_nested_call_metadata() {
        let raw = json!({
            "interaction_type": "call_details",
            "call": {
                "call_id": "call_123",
                "metadata": {
                    "candidate_name": "Ada",
                    "role": "Backend Engineer",
                    "company": "Acme"
                }
            }
        });

        let meta = InterviewMetadata::from_event(&raw);

        assert_eq!(meta.call_id.as_deref(), Some("call_123"));
        assert_eq!(meta.candidate_name.as_deref(), Some("Ada"));
        assert_eq!(meta.role.as_deref(), Some("Backend Engineer"));
        assert_eq!(meta.company.as_deref(), Some("Acme"));
        assert_eq!(meta.language, DEFAULT_LANGUAGE);
        assert_eq!(meta.domain, DEFAULT_DOMAIN);
        assert!(!meta.has_fit_inputs());
    }

    #[test]
    fn test_root_metadata_wins_over_nested() {
        let raw = json!({
            "metadata": { "role": "Data Scientist" },
            "call": {
                "metadata": { "role": "Ignored" },
                "retell_llm_dynamic_variables": { "resumeText": "10 years of Python" }
            },
            "job_description": "Build models"
        });

        let meta = InterviewMetadata::from_event(&raw);

        assert_eq!(meta.role.as_deref(), Some("Data Scientist"));
        assert_eq!(meta.resume_text.as_deref(), Some("10 years of Python"));
        assert_eq!(meta.job_description.as_deref(), Some("Build models"));
        assert!(meta.has_fit_inputs());
    }

    #[test]
    fn test_blank_values_fall_through_and_language_is_lowercased() {
        let raw = json!({
            "metadata": { "candidate_name": "   ", "language": "ES", "interview_type": "Technical" },
            "call": { "candidate_name": "Grace" }
        });

        let meta = InterviewMetadata::from_event(&raw);

        assert_eq!(meta.candidate_name.as_deref(), Some("Grace"));
        assert_eq!(meta.language, "es");
        assert_eq!(meta.domain, "technical");
    }

    #[test]
    fn test_empty_event_gives_defaults() {
        let meta = InterviewMetadata::from_event(&json!({}));
        assert_eq!(meta.candidate_name, None);
        assert_eq!(meta.language, DEFAULT_LANGUAGE);
    }
}
