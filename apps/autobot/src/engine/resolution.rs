//! Field Resolution Loop: one pass over every control of the current form step.
//!
//! Per control: Classifying → Answering → Applying → Verifying, with up to
//! [`MAX_ATTEMPTS`] answers when inline validation feedback appears. An answer the
//! form already rejected is never entered again; a control that runs out of new
//! answers or attempts is left as is so the step can move on.

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::browser::pacing::{AFTER_CORRECTION, AFTER_FILL, READ_CHECKBOX, READ_ERROR};
use crate::browser::selectors::{CHECKBOXES, DROPDOWNS, FEEDBACK, RADIOS, TEXT_INPUTS};
use crate::browser::{is_interactable, BrowserDriver, DriverError, Locator, Pacer};
use crate::engine::classifier::{Classification, ClassifiedField, Control, FieldClassifier};
use crate::engine::filler::{FieldFiller, FillError};
use crate::engine::models::{FieldKind, RetryState, MAX_ATTEMPTS};
use crate::engine::oracle::AnswerOracle;
use crate::vision::ImageToText;

/// Counts for one pass over a form step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StepReport {
    pub resolved: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Controls still showing validation feedback after the last attempt.
    pub unsatisfied: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ControlOutcome {
    Resolved,
    Skipped,
    Unsatisfied,
}

pub struct FieldResolver<'a, D: BrowserDriver + ?Sized> {
    driver: &'a D,
    pacer: &'a Pacer,
    classifier: FieldClassifier<'a, D>,
    filler: FieldFiller<'a, D>,
    oracle: &'a AnswerOracle<'a>,
}

impl<'a, D: BrowserDriver + ?Sized> FieldResolver<'a, D> {
    pub fn new(
        driver: &'a D,
        pacer: &'a Pacer,
        vision: &'a dyn ImageToText,
        oracle: &'a AnswerOracle<'a>,
    ) -> Self {
        Self {
            driver,
            pacer,
            classifier: FieldClassifier::new(driver, vision),
            filler: FieldFiller::new(driver, pacer),
            oracle,
        }
    }

    /// Every fillable control in the modal, in document order per kind.
    /// Radio inputs are grouped by `name`; inputs without one are ignored.
    pub async fn scan(&self, modal: &D::Element) -> Result<Vec<Control<D::Element>>, DriverError> {
        let mut controls = Vec::new();

        for input in self.visible(modal, TEXT_INPUTS).await? {
            controls.push(Control::Text(input));
        }
        for select in self.visible(modal, DROPDOWNS).await? {
            controls.push(Control::Dropdown(select));
        }

        // Radio inputs are often visually hidden behind styled labels, so no visibility filter.
        let mut groups: Vec<(String, Vec<D::Element>)> = Vec::new();
        for radio in self
            .driver
            .find_all(Some(modal), &Locator::css(RADIOS))
            .await?
        {
            let Some(name) = self.driver.attribute(&radio, "name").await? else {
                continue;
            };
            match groups.iter_mut().find(|(n, _)| *n == name) {
                Some((_, inputs)) => inputs.push(radio),
                None => groups.push((name, vec![radio])),
            }
        }
        controls.extend(
            groups
                .into_iter()
                .map(|(name, inputs)| Control::RadioGroup { name, inputs }),
        );

        for checkbox in self.visible(modal, CHECKBOXES).await? {
            controls.push(Control::Checkbox(checkbox));
        }
        Ok(controls)
    }

    async fn visible(&self, modal: &D::Element, selector: &str) -> Result<Vec<D::Element>, DriverError> {
        let mut found = Vec::new();
        for element in self
            .driver
            .find_all(Some(modal), &Locator::css(selector))
            .await?
        {
            if is_interactable(self.driver, &element).await {
                found.push(element);
            }
        }
        Ok(found)
    }

    /// Resolves every unresolved control once. Never fails: per-control errors are
    /// counted and logged.
    pub async fn resolve_step(&self, modal: &D::Element) -> StepReport {
        let mut report = StepReport::default();

        let controls = match self.scan(modal).await {
            Ok(controls) => controls,
            Err(e) => {
                warn!("Could not scan form controls: {e}");
                report.failed += 1;
                return report;
            }
        };
        debug!(count = controls.len(), "Scanned form controls");

        for control in &controls {
            match self.resolve_control(modal, control).await {
                Ok(ControlOutcome::Resolved) => report.resolved += 1,
                Ok(ControlOutcome::Skipped) => report.skipped += 1,
                Ok(ControlOutcome::Unsatisfied) => {
                    report.resolved += 1;
                    report.unsatisfied += 1;
                }
                Err(e) => {
                    warn!(kind = ?control.kind(), "Failed to resolve control: {e}");
                    report.failed += 1;
                }
            }
        }

        info!(
            resolved = report.resolved,
            skipped = report.skipped,
            failed = report.failed,
            unsatisfied = report.unsatisfied,
            "Form step resolved"
        );
        report
    }

    async fn resolve_control(
        &self,
        modal: &D::Element,
        control: &Control<D::Element>,
    ) -> Result<ControlOutcome, FillError> {
        let field = match self.classifier.classify(control).await? {
            Classification::Skip(reason) => {
                debug!(?reason, kind = ?control.kind(), "Skipping control");
                return Ok(ControlOutcome::Skipped);
            }
            Classification::Pending(field) => field,
        };

        if field.kind == FieldKind::Checkbox {
            return self.resolve_checkbox(control, &field).await;
        }

        let mut retry = RetryState::new(MAX_ATTEMPTS);
        while retry.begin_attempt() {
            let answer = match field.kind {
                FieldKind::FreeText => {
                    self.oracle
                        .resolve_answer(&field.question, retry.context())
                        .await
                }
                _ => {
                    let options = field.option_texts();
                    match self
                        .oracle
                        .resolve_selection(&field.question, &options, retry.context())
                        .await
                    {
                        Some(answer) => answer,
                        None => return Ok(ControlOutcome::Skipped),
                    }
                }
            };

            if retry.was_rejected(&answer.value) {
                debug!(
                    provenance = ?answer.provenance,
                    "No new answer for '{}'; keeping '{}'", field.question, answer.value
                );
                break;
            }

            match self.filler.apply(control, &field, &answer.value).await {
                Ok(()) => {}
                Err(e @ FillError::NotAccepted { .. }) => warn!("'{}': {e}", field.question),
                Err(e) => return Err(e),
            }
            let settle = if retry.attempts() == 1 {
                AFTER_FILL
            } else {
                AFTER_CORRECTION
            };
            self.pacer.pause(settle).await;

            let Some(error) = self.first_feedback(modal).await? else {
                info!("Answered '{}' with '{}'", field.question, answer.value);
                return Ok(ControlOutcome::Resolved);
            };
            warn!(
                attempt = retry.attempts(),
                "Validation error for '{}': {error}", field.question
            );
            retry.record_failure(answer.value, error);
            if !retry.exhausted() {
                self.pacer.pause(READ_ERROR).await;
            }
        }

        warn!(
            "Giving up on '{}' after {} attempts",
            field.question,
            retry.attempts()
        );
        Ok(ControlOutcome::Unsatisfied)
    }

    /// Checkbox decisions are made once and not retried.
    async fn resolve_checkbox(
        &self,
        control: &Control<D::Element>,
        field: &ClassifiedField<D::Element>,
    ) -> Result<ControlOutcome, FillError> {
        self.pacer.pause(READ_CHECKBOX).await;
        if !self.oracle.should_check(&field.question).await {
            debug!("Leaving checkbox '{}' unchecked", field.question);
            return Ok(ControlOutcome::Skipped);
        }
        self.filler.apply(control, field, "").await?;
        self.pacer.pause(AFTER_FILL).await;
        info!("Checked '{}'", field.question);
        Ok(ControlOutcome::Resolved)
    }

    /// Text of the first visible validation message in the form region.
    async fn first_feedback(&self, modal: &D::Element) -> Result<Option<String>, DriverError> {
        for message in self
            .driver
            .find_all(Some(modal), &Locator::css(FEEDBACK))
            .await?
        {
            if !self.driver.is_visible(&message).await? {
                continue;
            }
            let text = self.driver.text(&message).await?.trim().to_string();
            if !text.is_empty() {
                return Ok(Some(text));
            }
        }
        Ok(None)
    }
}
