//! Prompt Assembly
//!
//! Builds the interviewer's system instruction and opening greeting from the
//! normalized interview metadata. The session only depends on the
//! [`PromptAssembler`] trait; [`TemplatePrompts`] is the file-backed
//! implementation used by the service.

use crate::metadata::InterviewMetadata;
use anyhow::{Context, Result, bail};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

pub const SYSTEM_PROMPT_KEY: &str = "system_prompt";
pub const GREETING_KEY: &str = "greeting";

/// Defines the contract for anything that can produce interview prompts.
pub trait PromptAssembler: Send + Sync {
    /// The instruction placed at the head of the conversation history.
    fn system_prompt(&self, metadata: &InterviewMetadata) -> String;

    /// The first thing the interviewer says once the call is set up.
    fn greeting(&self, metadata: &InterviewMetadata) -> String;
}

/// Prompt templates keyed by file stem.
///
/// Language variants are stored as `<name>_<language>` (for example
/// `greeting_es`) and preferred over the plain key. An optional
/// `domain_<domain>` template is appended to the system prompt.
#[derive(Debug, Clone)]
pub struct TemplatePrompts {
    templates: HashMap<String, String>,
}

impl TemplatePrompts {
    /// Creates a template set, checking that the required keys are present.
    pub fn new(templates: HashMap<String, String>) -> Result<Self> {
        for key in [SYSTEM_PROMPT_KEY, GREETING_KEY] {
            if !templates.contains_key(key) {
                bail!("Missing prompt template: '{}'", key);
            }
        }
        Ok(Self { templates })
    }

    /// Loads every `*.md` file in `dir`, keyed by file stem.
    pub fn load_dir(dir: &Path) -> Result<Self> {
        let mut templates = HashMap::new();
        let entries = fs::read_dir(dir)
            .with_context(|| format!("Failed to read prompts directory {}", dir.display()))?;
        for entry in entries {
            let path = entry?.path();
            if path.is_file() && path.extension().and_then(|s| s.to_str()) == Some("md") {
                let key = path
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .context("Could not get file stem")?
                    .to_string();
                templates.insert(key, fs::read_to_string(&path)?);
            }
        }
        Self::new(templates)
    }

    fn template(&self, name: &str, language: &str) -> &str {
        self.templates
            .get(&format!("{name}_{language}"))
            .or_else(|| self.templates.get(name))
            .map(String::as_str)
            .unwrap_or_default()
    }
}

/// Replaces every `{field}` placeholder with the matching metadata value.
pub fn render(template: &str, metadata: &InterviewMetadata) -> String {
    let or = |value: &Option<String>, fallback: &str| {
        value.clone().unwrap_or_else(|| fallback.to_string())
    };
    template
        .replace("{candidate_name}", &or(&metadata.candidate_name, "there"))
        .replace("{role}", &or(&metadata.role, "the role"))
        .replace("{company}", &or(&metadata.company, "the company"))
        .replace(
            "{job_description}",
            &or(&metadata.job_description, "Not provided."),
        )
        .replace("{resume}", &or(&metadata.resume_text, "Not provided."))
        .replace("{language}", &metadata.language)
        .replace("{domain}", &metadata.domain)
}

impl PromptAssembler for TemplatePrompts {
    fn system_prompt(&self, metadata: &InterviewMetadata) -> String {
        let mut prompt = render(
            self.template(SYSTEM_PROMPT_KEY, &metadata.language),
            metadata,
        );
        if let Some(domain) = self.templates.get(&format!("domain_{}", metadata.domain)) {
            prompt.push_str("\n\n");
            prompt.push_str(&render(domain, metadata));
        }
        prompt
    }

    fn greeting(&self, metadata: &InterviewMetadata) -> String {
        render(self.template(GREETING_KEY, &metadata.language), metadata)
            .trim()
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn templates() -> HashMap<String, String> {
        HashMap::from([
            (
                SYSTEM_PROMPT_KEY.to_string(),
                "Interview {candidate_name} for {role} at {company}.".to_string(),
            ),
            (GREETING_KEY.to_string(), "Hi {candidate_name}!".to_string()),
            ("greeting_es".to_string(), "¡Hola {candidate_name}!".to_string()),
            (
                "domain_technical".to_string(),
                "Ask about system design.".to_string(),
            ),
        ])
    }

    fn metadata() -> InterviewMetadata {
        InterviewMetadata {
            candidate_name: Some("Ada".into()),
            role: Some("SRE".into()),
            language: "en".into(),
            domain: "general".into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_missing_required_template_is_an_error() {
        let err = TemplatePrompts::new(HashMap::new()).unwrap_err();
        assert!(err.to_string().contains(SYSTEM_PROMPT_KEY));
    }

    #[test]
    fn test_renders_with_fallbacks() {
        let prompts = TemplatePrompts::new(templates()).unwrap();
        assert_eq!(
            prompts.system_prompt(&metadata()),
            "Interview Ada for SRE at the company."
        );
        assert_eq!(prompts.greeting(&metadata()), "Hi Ada!");
    }

    #[test]
    fn test_language_variant_and_domain_snippet() {
        let prompts = TemplatePrompts::new(templates()).unwrap();
        let meta = InterviewMetadata {
            language: "es".into(),
            domain: "technical".into(),
            ..metadata()
        };
        assert_eq!(prompts.greeting(&meta), "¡Hola Ada!");
        assert!(prompts.system_prompt(&meta).ends_with("Ask about system design."));
    }

    #[test]
    fn test_load_dir_reads_markdown_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("system_prompt.md"), "You interview people.").unwrap();
        fs::write(dir.path().join("greeting.md"), "Hello {candidate_name}.\n").unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let prompts = TemplatePrompts::load_dir(dir.path()).unwrap();

        assert_eq!(prompts.greeting(&metadata()), "Hello Ada.");
        assert_eq!(prompts.system_prompt(&metadata()), "You interview people.");
    }
}
