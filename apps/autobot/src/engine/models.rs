//! Run-level state shared by the engine's state machines.

use std::collections::HashSet;
use std::fmt;

use serde::Serialize;

/// Identifier of a job listing: its link with the query string removed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct JobId(String);

impl JobId {
    pub fn from_href(href: &str) -> Option<Self> {
        let canonical = href.split('?').next().unwrap_or_default().trim();
        if canonical.is_empty() {
            None
        } else {
            Some(Self(canonical.to_string()))
        }
    }

    #[cfg(test)]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Listings seen and applied to during one run. Never persisted.
///
/// Invariant: `applied ⊆ processed`.
#[derive(Debug, Default)]
pub struct JobLedger {
    processed: HashSet<JobId>,
    applied: HashSet<JobId>,
}

impl JobLedger {
    /// Returns `true` the first time a listing is seen.
    pub fn mark_processed(&mut self, id: JobId) -> bool {
        self.processed.insert(id)
    }

    pub fn is_processed(&self, id: &JobId) -> bool {
        self.processed.contains(id)
    }

    /// Records a submission. Refused for listings that were never processed.
    pub fn mark_applied(&mut self, id: &JobId) -> bool {
        if !self.is_processed(id) {
            return false;
        }
        self.applied.insert(id.clone())
    }

    #[cfg(test)]
    pub fn is_applied(&self, id: &JobId) -> bool {
        self.applied.contains(id)
    }

    pub fn processed_count(&self) -> usize {
        self.processed.len()
    }

    pub fn applied_count(&self) -> usize {
        self.applied.len()
    }
}

/// Where an answer came from. Deterministic sources are not retried verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    Preference,
    Pattern,
    Model,
    Default,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Answer {
    pub value: String,
    pub provenance: Provenance,
}

impl Answer {
    pub fn new(value: impl Into<String>, provenance: Provenance) -> Self {
        Self {
            value: value.into(),
            provenance,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    FreeText,
    Dropdown,
    RadioGroup,
    Checkbox,
}

/// Total resolution attempts per control per form step, including the first.
pub const MAX_ATTEMPTS: u32 = 3;

/// What the oracle needs to know about the attempt that just failed validation.
#[derive(Debug, Clone, Copy)]
pub struct RetryContext<'a> {
    pub previous_answer: &'a str,
    pub error: &'a str,
}

/// Bounded retry bookkeeping for one control. Remembers every answer the form
/// rejected so none of them is submitted twice.
#[derive(Debug, Clone)]
pub struct RetryState {
    attempts: u32,
    max_attempts: u32,
    rejected: Vec<String>,
    last_error: Option<String>,
}

impl RetryState {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            attempts: 0,
            max_attempts,
            rejected: Vec::new(),
            last_error: None,
        }
    }

    /// Consumes one attempt from the budget. `false` once the budget is spent.
    pub fn begin_attempt(&mut self) -> bool {
        if self.attempts >= self.max_attempts {
            return false;
        }
        self.attempts += 1;
        true
    }

    pub fn record_failure(&mut self, answer: impl Into<String>, error: impl Into<String>) {
        self.rejected.push(answer.into());
        self.last_error = Some(error.into());
    }

    /// Whether `answer` already failed validation on an earlier attempt.
    pub fn was_rejected(&self, answer: &str) -> bool {
        let answer = answer.trim();
        self.rejected.iter().any(|r| r.trim() == answer)
    }

    /// The most recent rejection, for the model prompt.
    pub fn context(&self) -> Option<RetryContext<'_>> {
        match (self.rejected.last(), &self.last_error) {
            (Some(previous_answer), Some(error)) => Some(RetryContext {
                previous_answer,
                error,
            }),
            _ => None,
        }
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn exhausted(&self) -> bool {
        self.attempts >= self.max_attempts
    }
}

impl Default for RetryState {
    fn default() -> Self {
        Self::new(MAX_ATTEMPTS)
    }
}

/// Listings per result page; also the step of the `start` offset parameter.
pub const PAGE_SIZE: u32 = 25;

/// Position in the result list. The page index only moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageCursor {
    page: u32,
    max_pages: u32,
}

impl PageCursor {
    pub fn new(max_pages: u32) -> Self {
        Self {
            page: 1,
            max_pages: max_pages.max(1),
        }
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn max_pages(&self) -> u32 {
        self.max_pages
    }

    pub fn offset(&self) -> u32 {
        (self.page - 1) * PAGE_SIZE
    }

    pub fn at_limit(&self) -> bool {
        self.page >= self.max_pages
    }

    pub fn next(self) -> Self {
        Self {
            page: self.page.saturating_add(1),
            ..self
        }
    }
}
