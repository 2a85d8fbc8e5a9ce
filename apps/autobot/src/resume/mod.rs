//! Resume corpus: plain text extracted once from the candidate's PDF.
//!
//! Used two ways: grounded pattern search (years of experience) and as a short
//! excerpt of model context.

use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;
use tracing::info;

/// "<n> year(s) of experience" or "<n> year(s) in <word>", matched on lowercased text.
static EXPERIENCE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d+)\s*(?:year|years)\s*(?:of\s*experience|in\s*\w+)")
        .expect("experience pattern is a valid regex")
});

#[derive(Debug, Error)]
pub enum ResumeError {
    #[error("Failed to extract text from {path}: {message}")]
    Extraction { path: PathBuf, message: String },

    #[error("Resume text is empty; check the PDF path and content")]
    Empty,

    #[error("Resume extraction task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

#[derive(Debug, Clone)]
pub struct ResumeCorpus {
    text: String,
}

impl ResumeCorpus {
    /// Wraps already-extracted text. Blank text is rejected.
    pub fn new(text: impl Into<String>) -> Result<Self, ResumeError> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(ResumeError::Empty);
        }
        Ok(Self { text })
    }

    /// Extracts text from a PDF. `pdf-extract` is CPU-bound, so it runs on the blocking pool.
    pub async fn from_pdf(path: &Path) -> Result<Self, ResumeError> {
        let owned = path.to_path_buf();
        let text = tokio::task::spawn_blocking(move || {
            pdf_extract::extract_text(&owned).map_err(|e| ResumeError::Extraction {
                path: owned.clone(),
                message: e.to_string(),
            })
        })
        .await??;

        let corpus = Self::new(text)?;
        info!(
            chars = corpus.text.chars().count(),
            "Resume text extracted from {}",
            path.display()
        );
        Ok(corpus)
    }

    #[cfg(test)]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// At most `max_chars` characters from the start of the resume.
    pub fn excerpt(&self, max_chars: usize) -> &str {
        match self.text.char_indices().nth(max_chars) {
            Some((idx, _)) => &self.text[..idx],
            None => &self.text,
        }
    }

    /// The largest "<n> years of experience / in <skill>" claim in the resume.
    pub fn max_years_of_experience(&self) -> Option<u32> {
        let lowered = self.text.to_lowercase();
        EXPERIENCE_PATTERN
            .captures_iter(&lowered)
            .filter_map(|c| c.get(1).and_then(|m| m.as_str().parse::<u32>().ok()))
            .max()
    }
}
