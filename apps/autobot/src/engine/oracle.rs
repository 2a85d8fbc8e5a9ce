//! Answer Oracle: decides what value a form control should receive.
//!
//! Resolution order, first match wins:
//! 1. Preference keyword table (deterministic, no model call)
//! 2. Years-of-experience pattern over the resume (deterministic, no model call)
//! 3. Language model, with validation-error context on retries
//!
//! Sources 1 and 2 give the same answer on every attempt; a retry never turns a
//! grounded answer into a model guess. The model failing is never an error here:
//! every path ends in a default.

use tracing::{debug, info, warn};

use crate::config::UserPreferences;
use crate::engine::models::{Answer, Provenance, RetryContext};
use crate::engine::prompts::{answer_prompt, checkbox_prompt, selection_prompt, RESUME_EXCERPT_CHARS};
use crate::llm_client::prompts::APPLICATION_ASSISTANT_SYSTEM;
use crate::llm_client::LanguageModel;
use crate::resume::ResumeCorpus;

const NUMERIC_KEYWORDS: &[&str] = &["year", "years", "experience", "how many", "number of"];
const CONSENT_KEYWORDS: &[&str] = &["consent", "agree", "accept", "yes", "confirm"];

const DEFAULT_YEARS: &str = "4";
const DEFAULT_TEXT: &str = "Not specified";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PreferenceField {
    VeteranStatus,
    Disability,
    Ethnicity,
    Gender,
    Address,
    Phone,
    ZipCode,
}

impl PreferenceField {
    fn value(self, preferences: &UserPreferences) -> &str {
        match self {
            PreferenceField::VeteranStatus => &preferences.veteran_status,
            PreferenceField::Disability => &preferences.disability,
            PreferenceField::Ethnicity => &preferences.ethnicity,
            PreferenceField::Gender => &preferences.gender,
            PreferenceField::Address => &preferences.address,
            PreferenceField::Phone => &preferences.phone,
            PreferenceField::ZipCode => &preferences.zip_code,
        }
    }
}

/// Checked in order; the first row with a keyword in the question decides the field.
const PREFERENCE_TABLE: &[(&[&str], PreferenceField)] = &[
    (&["veteran", "military"], PreferenceField::VeteranStatus),
    (&["disability", "disabled"], PreferenceField::Disability),
    (&["ethnicity", "race"], PreferenceField::Ethnicity),
    (&["gender"], PreferenceField::Gender),
    (
        &["location", "commute", "relocate", "address"],
        PreferenceField::Address,
    ),
    (&["phone", "mobile", "contact"], PreferenceField::Phone),
    (&["zip", "postal"], PreferenceField::ZipCode),
];

fn contains_any(haystack: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|k| haystack.contains(k))
}

pub fn is_numeric_question(question: &str) -> bool {
    contains_any(&question.to_lowercase(), NUMERIC_KEYWORDS)
}

pub fn is_consent_label(label: &str) -> bool {
    contains_any(&label.to_lowercase(), CONSENT_KEYWORDS)
}

/// Trimmed, unquoted first line of a model reply. Empty means "no response".
fn clean_reply(raw: &str) -> String {
    let first_line = raw.trim().lines().next().unwrap_or_default().trim();
    first_line
        .trim_matches(|c| c == '"' || c == '\'' || c == '`')
        .trim()
        .to_string()
}

/// Exact option, else a case-insensitive substring of exactly one option, else the first option.
pub fn match_option<'o>(reply: &str, options: &'o [String]) -> Option<&'o String> {
    let first = options.first()?;
    let reply = reply.trim();
    if reply.is_empty() {
        return Some(first);
    }
    if let Some(exact) = options.iter().find(|o| o.trim() == reply) {
        return Some(exact);
    }
    let lowered = reply.to_lowercase();
    let mut containing = options
        .iter()
        .filter(|o| o.to_lowercase().contains(&lowered));
    match (containing.next(), containing.next()) {
        (Some(only), None) => Some(only),
        _ => Some(first),
    }
}

pub struct AnswerOracle<'a> {
    preferences: &'a UserPreferences,
    resume: &'a ResumeCorpus,
    model: &'a dyn LanguageModel,
}

impl<'a> AnswerOracle<'a> {
    pub fn new(
        preferences: &'a UserPreferences,
        resume: &'a ResumeCorpus,
        model: &'a dyn LanguageModel,
    ) -> Self {
        Self {
            preferences,
            resume,
            model,
        }
    }

    fn preference_for(&self, question: &str) -> Option<&'a str> {
        let lowered = question.to_lowercase();
        PREFERENCE_TABLE
            .iter()
            .find(|(keywords, _)| contains_any(&lowered, keywords))
            .map(|(_, field)| field.value(self.preferences))
            .filter(|value| !value.trim().is_empty())
    }

    async fn ask(&self, prompt: &str) -> Option<String> {
        match self.model.complete(prompt, APPLICATION_ASSISTANT_SYSTEM).await {
            Ok(raw) => Some(clean_reply(&raw)).filter(|r| !r.is_empty()),
            Err(e) => {
                warn!("Model unavailable, using default answer: {e}");
                None
            }
        }
    }

    /// Answer for a free-text control.
    pub async fn resolve_answer(&self, question: &str, retry: Option<RetryContext<'_>>) -> Answer {
        if let Some(value) = self.preference_for(question) {
            info!("Using preference for '{question}': {value}");
            return Answer::new(value, Provenance::Preference);
        }

        if is_numeric_question(question) {
            let grounded = match self.resume.max_years_of_experience() {
                Some(years) => Answer::new(years.to_string(), Provenance::Pattern),
                None => Answer::new(DEFAULT_YEARS, Provenance::Default),
            };
            info!(
                provenance = ?grounded.provenance,
                "Experience answer for '{question}': {}", grounded.value
            );
            return grounded;
        }

        let prompt = answer_prompt(
            question,
            self.resume.excerpt(RESUME_EXCERPT_CHARS),
            self.preferences,
            retry,
        );
        match self.ask(&prompt).await {
            Some(reply) => {
                info!("Model answer for '{question}': {reply}");
                Answer::new(reply, Provenance::Model)
            }
            None => Answer::new(DEFAULT_TEXT, Provenance::Default),
        }
    }

    /// One of `options` for a dropdown or radio group. `None` only when `options` is empty.
    pub async fn resolve_selection(
        &self,
        question: &str,
        options: &[String],
        retry: Option<RetryContext<'_>>,
    ) -> Option<Answer> {
        if options.is_empty() {
            return None;
        }

        if let Some(value) = self.preference_for(question) {
            if let Some(option) = options.iter().find(|o| o.trim() == value.trim()) {
                info!("Using preference selection for '{question}': {option}");
                return Some(Answer::new(option.clone(), Provenance::Preference));
            }
        }

        let prompt = selection_prompt(
            question,
            options,
            self.resume.excerpt(RESUME_EXCERPT_CHARS),
            retry,
        );
        let reply = self.ask(&prompt).await.unwrap_or_default();
        let chosen = match_option(&reply, options)?;
        let provenance = if reply.is_empty() {
            warn!("No model selection for '{question}'; using first option '{chosen}'");
            Provenance::Default
        } else {
            info!("Model selection for '{question}': '{reply}' -> '{chosen}'");
            Provenance::Model
        };
        Some(Answer::new(chosen.clone(), provenance))
    }

    /// Consent-style labels are always checked; anything else is a yes/no model query.
    pub async fn should_check(&self, label: &str) -> bool {
        if is_consent_label(label) {
            debug!("Auto-consenting to '{label}'");
            return true;
        }
        match self.ask(&checkbox_prompt(label)).await {
            Some(reply) => reply.to_lowercase().starts_with('y'),
            None => false,
        }
    }
}
