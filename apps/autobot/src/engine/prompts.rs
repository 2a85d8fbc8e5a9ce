// Prompt templates for form answers.
// Reuses cross-cutting fragments from llm_client::prompts.

use crate::config::UserPreferences;
use crate::engine::models::RetryContext;
use crate::llm_client::prompts::{
    EXACT_OPTION_INSTRUCTION, LITERAL_ANSWER_INSTRUCTION, YES_NO_INSTRUCTION,
};

/// Characters of resume text included as model context.
pub const RESUME_EXCERPT_CHARS: usize = 1000;

/// Free-text answer prompt. Replace `{resume}`, `{salary}`, `{location}`, `{question}`,
/// `{retry}` and `{instruction}` before sending.
const ANSWER_PROMPT_TEMPLATE: &str = "Based on this resume and preferences, answer the job application question.

Resume excerpt:
{resume}

Preferences:
- Expected salary: {salary}
- Location: {location}

Question: {question}
{retry}
{instruction}";

/// Selection prompt. Replace `{resume}`, `{question}`, `{options}`, `{retry}` and
/// `{instruction}` before sending.
const SELECTION_PROMPT_TEMPLATE: &str = "Based on this resume, choose the best option for the job application question.

Resume excerpt:
{resume}

Question: {question}
Options:
{options}
{retry}
{instruction}";

/// Checkbox prompt. Replace `{label}` and `{instruction}` before sending.
const CHECKBOX_PROMPT_TEMPLATE: &str = "Should this checkbox be checked on a job application?
Checkbox text: {label}
{instruction}";

fn retry_block(retry: Option<RetryContext<'_>>) -> String {
    match retry {
        Some(ctx) => format!(
            "\nThe previous answer \"{}\" was rejected with this error: \"{}\".\nProvide a corrected answer that satisfies the error.\n",
            ctx.previous_answer, ctx.error
        ),
        None => String::new(),
    }
}

pub fn answer_prompt(
    question: &str,
    resume_excerpt: &str,
    preferences: &UserPreferences,
    retry: Option<RetryContext<'_>>,
) -> String {
    ANSWER_PROMPT_TEMPLATE
        .replace("{resume}", resume_excerpt)
        .replace("{salary}", &preferences.salary_expectation.to_string())
        .replace("{location}", &preferences.location)
        .replace("{question}", question)
        .replace("{retry}", &retry_block(retry))
        .replace("{instruction}", LITERAL_ANSWER_INSTRUCTION)
}

pub fn selection_prompt(
    question: &str,
    options: &[String],
    resume_excerpt: &str,
    retry: Option<RetryContext<'_>>,
) -> String {
    let listed = options
        .iter()
        .map(|o| format!("- {o}"))
        .collect::<Vec<_>>()
        .join("\n");
    SELECTION_PROMPT_TEMPLATE
        .replace("{resume}", resume_excerpt)
        .replace("{question}", question)
        .replace("{options}", &listed)
        .replace("{retry}", &retry_block(retry))
        .replace("{instruction}", EXACT_OPTION_INSTRUCTION)
}

pub fn checkbox_prompt(label: &str) -> String {
    CHECKBOX_PROMPT_TEMPLATE
        .replace("{label}", label)
        .replace("{instruction}", YES_NO_INSTRUCTION)
}
