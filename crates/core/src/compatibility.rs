//! Candidate/Job Compatibility Checks
//!
//! This module defines how the interview decides whether a candidate's
//! background plausibly fits the role they are practicing for. Checks run in
//! the background; their reports are folded into a [`Verdict`] and a
//! [`CompatibilityPolicy`] decides whether a report is strong enough to end
//! the call. Ordinary mismatches never are.

use crate::history::{Role, Turn};
use crate::llm_client::LLMClient;
use crate::metadata::InterviewMetadata;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// How serious a mismatch is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Low,
    Medium,
    High,
}

/// Which of the two checks produced a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckKind {
    /// Fast check fired once metadata is known.
    Quick,
    /// Slower, more lenient check run once enough turns have accumulated.
    Full,
}

/// The raw outcome of one compatibility check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompatibilityReport {
    pub compatible: bool,
    /// Confidence in the verdict, from 0.0 to 1.0.
    pub confidence: f32,
    #[serde(default)]
    pub severity: Severity,
    #[serde(default)]
    pub reason: String,
}

impl CompatibilityReport {
    /// A report that carries no evidence either way.
    pub fn inconclusive(reason: impl Into<String>) -> Self {
        Self {
            compatible: true,
            confidence: 0.0,
            severity: Severity::Low,
            reason: reason.into(),
        }
    }
}

/// What the session currently knows about candidate/job fit.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Verdict {
    #[default]
    NotChecked,
    Compatible(CompatibilityReport),
    Incompatible(CompatibilityReport),
}

impl Verdict {
    pub fn from_report(report: CompatibilityReport) -> Self {
        if report.compatible {
            Verdict::Compatible(report)
        } else {
            Verdict::Incompatible(report)
        }
    }

    pub fn is_checked(&self) -> bool {
        !matches!(self, Verdict::NotChecked)
    }
}

/// Thresholds a report must clear before it may end the call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompatibilityPolicy {
    pub quick_min_confidence: f32,
    pub full_min_confidence: f32,
}

impl Default for CompatibilityPolicy {
    fn default() -> Self {
        Self {
            quick_min_confidence: 0.9,
            full_min_confidence: 0.75,
        }
    }
}

impl CompatibilityPolicy {
    /// Only a confident, high-severity mismatch terminates the interview.
    pub fn should_terminate(&self, kind: CheckKind, report: &CompatibilityReport) -> bool {
        if report.compatible || report.severity != Severity::High {
            return false;
        }
        let threshold = match kind {
            CheckKind::Quick => self.quick_min_confidence,
            CheckKind::Full => self.full_min_confidence,
        };
        report.confidence >= threshold
    }
}

/// Defines the contract for any service that can judge candidate/job fit.
#[async_trait]
pub trait CompatibilityChecker: Send + Sync {
    /// Fast heuristic based on the resume and job description alone.
    async fn quick_check(&self, metadata: &InterviewMetadata) -> Result<CompatibilityReport>;

    /// Lenient check that also considers what the candidate has said so far.
    async fn full_check(
        &self,
        metadata: &InterviewMetadata,
        transcript: &[Turn],
    ) -> Result<CompatibilityReport>;
}

const QUICK_INSTRUCTIONS: &str = "You screen candidates for mock interviews. Compare the resume \
with the job description and decide whether the candidate's background is completely unrelated \
to the role. Only call it incompatible when the mismatch is obvious (for example a pastry chef \
applying for a neurosurgeon role). Reply with JSON only: {\"compatible\": bool, \"confidence\": \
number between 0 and 1, \"severity\": \"low\"|\"medium\"|\"high\", \"reason\": string}.";

const FULL_INSTRUCTIONS: &str = "You review an ongoing mock interview. The goal is practice, so \
be lenient: partial experience, career changes and transferable skills all count as compatible. \
Only report an incompatible, high-severity result when the candidate clearly has no connection \
to the role at all. Reply with JSON only: {\"compatible\": bool, \"confidence\": number between \
0 and 1, \"severity\": \"low\"|\"medium\"|\"high\", \"reason\": string}.";

/// An implementation of `CompatibilityChecker` that asks an LLM for a verdict.
pub struct LlmCompatibilityChecker {
    llm: Arc<dyn LLMClient>,
}

impl LlmCompatibilityChecker {
    pub fn new(llm: Arc<dyn LLMClient>) -> Self {
        Self { llm }
    }

    fn describe(metadata: &InterviewMetadata) -> String {
        format!(
            "Role: {}\nCompany: {}\n\nJob description:\n{}\n\nResume:\n{}",
            metadata.role.as_deref().unwrap_or("unknown"),
            metadata.company.as_deref().unwrap_or("unknown"),
            metadata.job_description.as_deref().unwrap_or_default(),
            metadata.resume_text.as_deref().unwrap_or_default(),
        )
    }

    async fn ask(&self, instructions: &str, body: String) -> Result<CompatibilityReport> {
        let answer = self
            .llm
            .complete(&[
                Turn::new(Role::System, instructions),
                Turn::new(Role::User, body),
            ])
            .await?;
        parse_report(&answer)
    }
}

#[async_trait]
impl CompatibilityChecker for LlmCompatibilityChecker {
    async fn quick_check(&self, metadata: &InterviewMetadata) -> Result<CompatibilityReport> {
        if !metadata.has_fit_inputs() {
            return Ok(CompatibilityReport::inconclusive(
                "resume or job description missing",
            ));
        }
        self.ask(QUICK_INSTRUCTIONS, Self::describe(metadata)).await
    }

    async fn full_check(
        &self,
        metadata: &InterviewMetadata,
        transcript: &[Turn],
    ) -> Result<CompatibilityReport> {
        let answers: Vec<&str> = transcript
            .iter()
            .filter(|t| t.role == Role::User)
            .map(|t| t.text.as_str())
            .collect();
        if answers.is_empty() && !metadata.has_fit_inputs() {
            return Ok(CompatibilityReport::inconclusive("nothing to compare"));
        }
        let body = format!(
            "{}\n\nCandidate answers so far:\n- {}",
            Self::describe(metadata),
            answers.join("\n- ")
        );
        self.ask(FULL_INSTRUCTIONS, body).await
    }
}

/// Parses a JSON verdict, tolerating surrounding prose or code fences.
pub fn parse_report(answer: &str) -> Result<CompatibilityReport> {
    let start = answer.find('{').context("No JSON object in compatibility answer")?;
    let end = answer
        .rfind('}')
        .filter(|&end| end > start)
        .context("Unterminated JSON in compatibility answer")?;
    let mut report: CompatibilityReport = serde_json::from_str(&answer[start..=end])
        .context("Compatibility answer was not a valid report")?;
    report.confidence = report.confidence.clamp(0.0, 1.0);
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_client::LLMStream;
    use std::sync::Mutex;

    fn report(compatible: bool, confidence: f32, severity: Severity) -> CompatibilityReport {
        CompatibilityReport {
            compatible,
            confidence,
            severity,
            reason: String::new(),
        }
    }

    #[test]
    fn test_policy_only_terminates_on_confident_high_severity_mismatch() {
        let policy = CompatibilityPolicy::default();

        assert!(policy.should_terminate(CheckKind::Quick, &report(false, 0.95, Severity::High)));
        assert!(!policy.should_terminate(CheckKind::Quick, &report(false, 0.8, Severity::High)));
        assert!(!policy.should_terminate(CheckKind::Quick, &report(false, 0.99, Severity::Medium)));
        assert!(!policy.should_terminate(CheckKind::Quick, &report(true, 1.0, Severity::High)));

        assert!(policy.should_terminate(CheckKind::Full, &report(false, 0.8, Severity::High)));
        assert!(!policy.should_terminate(CheckKind::Full, &report(false, 0.5, Severity::High)));
        assert!(!policy.should_terminate(CheckKind::Full, &report(false, 0.9, Severity::Low)));
    }

    #[test]
    fn test_verdict_from_report() {
        assert!(!Verdict::default().is_checked());
        assert!(matches!(
            Verdict::from_report(report(false, 0.2, Severity::Low)),
            Verdict::Incompatible(_)
        ));
        assert!(matches!(
            Verdict::from_report(report(true, 0.2, Severity::Low)),
            Verdict::Compatible(_)
        ));
    }

    #[test]
    fn test_parse_report_from_fenced_answer() {
        let answer = "```json\n{\"compatible\": false, \"confidence\": 1.4, \"severity\": \"high\", \"reason\": \"chef vs surgeon\"}\n```";
        let parsed = parse_report(answer).unwrap();
        assert!(!parsed.compatible);
        assert_eq!(parsed.confidence, 1.0);
        assert_eq!(parsed.severity, Severity::High);
        assert_eq!(parsed.reason, "chef vs surgeon");
    }

    #[test]
    fn test_parse_report_defaults_and_errors() {
        let parsed = parse_report("{\"compatible\": true, \"confidence\": 0.3}").unwrap();
        assert_eq!(parsed.severity, Severity::Low);
        assert!(parse_report("no json here").is_err());
    }

    #[test]
    fn test_parse_report_rejects_braces_in_wrong_order() {
        assert!(parse_report("Sure} here you go {").is_err());
        assert!(parse_report("}{").is_err());
        assert!(parse_report("{").is_err());
    }

    /// Records the prompts it receives and answers with a fixed string.
    struct CannedLLM {
        answer: String,
        seen: Mutex<Vec<Vec<Turn>>>,
    }

    #[async_trait]
    impl LLMClient for CannedLLM {
        async fn stream_reply(&self, _history: &[Turn]) -> Result<LLMStream> {
            anyhow::bail!("not used")
        }

        async fn complete(&self, history: &[Turn]) -> Result<String> {
            self.seen.lock().unwrap().push(history.to_vec());
            Ok(self.answer.clone())
        }
    }

    #[tokio::test]
    async fn test_quick_check_skips_llm_without_inputs() {
        let llm = Arc::new(CannedLLM {
            answer: String::new(),
            seen: Mutex::new(vec![]),
        });
        let checker = LlmCompatibilityChecker::new(llm.clone());

        let result = checker
            .quick_check(&InterviewMetadata::default())
            .await
            .unwrap();

        assert!(result.compatible);
        assert_eq!(result.confidence, 0.0);
        assert!(llm.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_full_check_includes_candidate_answers() {
        let llm = Arc::new(CannedLLM {
            answer: "{\"compatible\": false, \"confidence\": 0.9, \"severity\": \"high\"}".into(),
            seen: Mutex::new(vec![]),
        });
        let checker = LlmCompatibilityChecker::new(llm.clone());
        let transcript = vec![
            Turn::new(Role::System, "sys"),
            Turn::new(Role::Assistant, "Tell me about yourself."),
            Turn::new(Role::User, "I bake croissants."),
        ];

        let result = checker
            .full_check(&InterviewMetadata::default(), &transcript)
            .await
            .unwrap();

        assert!(!result.compatible);
        let seen = llm.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert!(seen[0][1].text.contains("I bake croissants."));
    }
}
