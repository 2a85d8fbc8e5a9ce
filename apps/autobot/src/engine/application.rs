//! Application Step Machine: one listing from "open" to "submitted or abandoned".
//!
//! `Opened → Stepping(n) → {Submitted, Abandoned}`; every step runs the resolution
//! loop once and then presses the highest-priority action button.

use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::browser::pacing::{
    AFTER_SUBMIT, BEFORE_ACTION, BETWEEN_STEPS, CONTACT_PREFILL, MODAL_SETTLE, SCAN_FORM,
};
use crate::browser::selectors::{APPLY_BUTTON, BUTTONS, MODAL, PHONE_INPUT, ZIP_INPUT};
use crate::browser::{
    is_interactable, wait_for_text, wait_for_visible, BrowserDriver, DriverError, Locator, Pacer,
};
use crate::config::UserPreferences;
use crate::engine::filler::FieldFiller;
use crate::engine::resolution::FieldResolver;

pub const MAX_STEPS: u32 = 10;

const LISTING_SETTLE: Duration = Duration::from_secs(2);
const APPLY_BUTTON_TIMEOUT: Duration = Duration::from_secs(15);
const MODAL_TIMEOUT: Duration = Duration::from_secs(10);
const CONFIRMATION_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AbandonReason {
    ApplyControlMissing,
    ModalTimeout,
    NoActionControl,
    StepBudgetExhausted,
    Driver(String),
}

impl From<DriverError> for AbandonReason {
    fn from(e: DriverError) -> Self {
        AbandonReason::Driver(e.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplicationOutcome {
    Submitted { steps: u32 },
    Abandoned(AbandonReason),
}

impl ApplicationOutcome {
    pub fn is_submitted(&self) -> bool {
        matches!(self, ApplicationOutcome::Submitted { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum StepState {
    Stepping(u32),
    Submitted(u32),
    Abandoned(AbandonReason),
}

/// Modal buttons in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StepAction {
    Submit,
    Apply,
    Review,
    Next,
}

impl StepAction {
    const PRIORITY: [StepAction; 4] = [
        StepAction::Submit,
        StepAction::Apply,
        StepAction::Review,
        StepAction::Next,
    ];

    fn keyword(self) -> &'static str {
        match self {
            StepAction::Submit => "submit",
            StepAction::Apply => "apply",
            StepAction::Review => "review",
            StepAction::Next => "next",
        }
    }

    fn is_final(self) -> bool {
        matches!(self, StepAction::Submit | StepAction::Apply)
    }
}

pub struct ApplicationMachine<'a, D: BrowserDriver + ?Sized> {
    driver: &'a D,
    pacer: &'a Pacer,
    resolver: &'a FieldResolver<'a, D>,
    preferences: &'a UserPreferences,
    max_steps: u32,
}

impl<'a, D: BrowserDriver + ?Sized> ApplicationMachine<'a, D> {
    pub fn new(
        driver: &'a D,
        pacer: &'a Pacer,
        resolver: &'a FieldResolver<'a, D>,
        preferences: &'a UserPreferences,
    ) -> Self {
        Self {
            driver,
            pacer,
            resolver,
            preferences,
            max_steps: MAX_STEPS,
        }
    }

    /// Opens the listing behind `link` and drives its application to a terminal state.
    /// Any open modal is dismissed before returning.
    pub async fn apply(&self, link: &D::Element) -> ApplicationOutcome {
        let outcome = match self.open(link).await {
            Ok(modal) => self.step_through(&modal).await,
            Err(reason) => ApplicationOutcome::Abandoned(reason),
        };

        if let Err(e) = self.driver.press_escape().await {
            debug!("Escape after application failed: {e}");
        }
        outcome
    }

    async fn open(&self, link: &D::Element) -> Result<D::Element, AbandonReason> {
        self.driver.scroll_into_view(link).await?;
        self.driver.click(link).await?;
        tokio::time::sleep(LISTING_SETTLE).await;

        let Some(apply) =
            wait_for_visible(self.driver, None, &Locator::css(APPLY_BUTTON), APPLY_BUTTON_TIMEOUT)
                .await?
        else {
            warn!("Easy Apply control not found");
            return Err(AbandonReason::ApplyControlMissing);
        };
        self.driver.click(&apply).await?;
        self.pacer.pause(MODAL_SETTLE).await;

        match wait_for_visible(self.driver, None, &Locator::css(MODAL), MODAL_TIMEOUT).await? {
            Some(modal) => Ok(modal),
            None => {
                warn!("Application modal did not appear");
                Err(AbandonReason::ModalTimeout)
            }
        }
    }

    async fn step_through(&self, modal: &D::Element) -> ApplicationOutcome {
        let mut state = StepState::Stepping(0);
        loop {
            state = match state {
                StepState::Stepping(n) if n >= self.max_steps => {
                    warn!(steps = n, "Step budget exhausted");
                    StepState::Abandoned(AbandonReason::StepBudgetExhausted)
                }
                StepState::Stepping(n) => match self.step(modal, n).await {
                    Ok(next) => next,
                    Err(e) => StepState::Abandoned(e.into()),
                },
                StepState::Submitted(steps) => return ApplicationOutcome::Submitted { steps },
                StepState::Abandoned(reason) => return ApplicationOutcome::Abandoned(reason),
            };
        }
    }

    async fn step(&self, modal: &D::Element, n: u32) -> Result<StepState, DriverError> {
        info!(step = n + 1, "Form step");
        self.pacer.pause(SCAN_FORM).await;

        self.prefill_contact(modal).await;
        self.resolver.resolve_step(modal).await;

        let Some((action, button)) = self.find_action(modal).await? else {
            warn!("No action button in the modal");
            return Ok(StepState::Abandoned(AbandonReason::NoActionControl));
        };

        self.driver.scroll_into_view(&button).await?;
        self.pacer.pause(BEFORE_ACTION).await;
        self.driver.click(&button).await?;
        info!(action = action.keyword(), "Clicked action button");

        if action.is_final() {
            self.pacer.pause(AFTER_SUBMIT).await;
            self.dismiss_confirmation().await;
            return Ok(StepState::Submitted(n + 1));
        }

        self.pacer.pause(BETWEEN_STEPS).await;
        Ok(StepState::Stepping(n + 1))
    }

    async fn find_action(
        &self,
        modal: &D::Element,
    ) -> Result<Option<(StepAction, D::Element)>, DriverError> {
        let mut candidates = Vec::new();
        for button in self
            .driver
            .find_all(Some(modal), &Locator::css(BUTTONS))
            .await?
        {
            if !is_interactable(self.driver, &button).await {
                continue;
            }
            let text = self.driver.text(&button).await?.to_lowercase();
            candidates.push((text, button));
        }

        Ok(StepAction::PRIORITY.iter().find_map(|action| {
            candidates
                .iter()
                .find(|(text, _)| text.contains(action.keyword()))
                .map(|(_, button)| (*action, button.clone()))
        }))
    }

    /// Fills empty phone and zip inputs straight from preferences.
    async fn prefill_contact(&self, modal: &D::Element) {
        let filler = FieldFiller::new(self.driver, self.pacer);
        let contact = [
            (PHONE_INPUT, self.preferences.phone.as_str()),
            (ZIP_INPUT, self.preferences.zip_code.as_str()),
        ];
        for (selector, value) in contact {
            if value.trim().is_empty() {
                continue;
            }
            let input = match self.driver.find_first(Some(modal), &Locator::css(selector)).await {
                Ok(Some(input)) => input,
                Ok(None) => continue,
                Err(e) => {
                    debug!("Contact lookup for {selector} failed: {e}");
                    continue;
                }
            };
            let empty = matches!(self.driver.value(&input).await, Ok(v) if v.trim().is_empty());
            if !empty || !matches!(self.driver.is_visible(&input).await, Ok(true)) {
                continue;
            }
            match filler.type_text(&input, value).await {
                Ok(()) => self.pacer.pause(CONTACT_PREFILL).await,
                Err(e) => warn!("Contact pre-fill for {selector} failed: {e}"),
            }
        }
    }

    async fn dismiss_confirmation(&self) {
        match wait_for_text(
            self.driver,
            None,
            &Locator::css(BUTTONS),
            "done",
            CONFIRMATION_TIMEOUT,
        )
        .await
        {
            Ok(Some(done)) => {
                if let Err(e) = self.driver.click(&done).await {
                    debug!("Could not dismiss confirmation: {e}");
                }
            }
            Ok(None) => debug!("No confirmation to dismiss"),
            Err(e) => debug!("Confirmation lookup failed: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::selectors::{PRECEDING_LABEL, TEXT_INPUTS};
    use crate::engine::oracle::AnswerOracle;
    use crate::testing::{preferences, resume, EchoVision, Effect, FakeDriver, FakeNode, ScriptedModel};

    struct Listing {
        link: usize,
        modal: usize,
    }

    /// A listing whose Easy Apply button reveals a hidden modal.
    fn listing(driver: &FakeDriver) -> Listing {
        let link = driver.add(FakeNode::with_text("Rust Engineer"));
        let modal = driver.add_under(None, Locator::css(MODAL), FakeNode::default().hidden());
        driver.add_under(
            None,
            Locator::css(APPLY_BUTTON),
            FakeNode::with_text("Easy Apply").on_click(Effect::Show(modal)),
        );
        Listing { link, modal }
    }

    macro_rules! machine {
        ($driver:expr, $resolver:ident, $machine:ident) => {
            let prefs = preferences();
            let cv = resume("5 years of experience in Rust");
            let model = ScriptedModel::replying("Yes");
            let oracle = AnswerOracle::new(&prefs, &cv, &model);
            let vision = EchoVision::default();
            let pacer = Pacer::instant();
            let $resolver = FieldResolver::new($driver, &pacer, &vision, &oracle);
            let $machine = ApplicationMachine::new($driver, &pacer, &$resolver, &prefs);
        };
    }

    #[tokio::test(start_paused = true)]
    async fn test_next_then_submit_is_submitted() {
        let driver = FakeDriver::new("https://example.com/jobs");
        let Listing { link, modal } = listing(&driver);
        let submit = driver.add_under(
            Some(modal),
            Locator::css(BUTTONS),
            FakeNode::with_text("Submit application").hidden(),
        );
        // The first step only offers Next, which reveals the final page.
        let next = driver.add_under(
            Some(modal),
            Locator::css(BUTTONS),
            FakeNode::with_text("Next").on_click(Effect::Show(submit)),
        );
        let done = driver.add_under(None, Locator::css(BUTTONS), FakeNode::with_text("Done"));

        machine!(&driver, resolver, machine);
        let outcome = machine.apply(&link).await;

        assert_eq!(outcome, ApplicationOutcome::Submitted { steps: 2 });
        let clicks = driver.clicks();
        assert_eq!(clicks.iter().filter(|c| **c == next).count(), 1);
        assert!(clicks.contains(&submit));
        assert!(clicks.contains(&done));
        assert_eq!(driver.escapes(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_apply_button_abandons() {
        let driver = FakeDriver::new("https://example.com/jobs");
        let link = driver.add(FakeNode::with_text("Rust Engineer"));

        machine!(&driver, resolver, machine);
        let outcome = machine.apply(&link).await;
        assert_eq!(
            outcome,
            ApplicationOutcome::Abandoned(AbandonReason::ApplyControlMissing)
        );
        assert_eq!(driver.escapes(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_modal_that_never_appears_abandons() {
        let driver = FakeDriver::new("https://example.com/jobs");
        let link = driver.add(FakeNode::with_text("Rust Engineer"));
        driver.add_under(None, Locator::css(MODAL), FakeNode::default().hidden());
        driver.add_under(None, Locator::css(APPLY_BUTTON), FakeNode::with_text("Easy Apply"));

        machine!(&driver, resolver, machine);
        let outcome = machine.apply(&link).await;
        assert_eq!(outcome, ApplicationOutcome::Abandoned(AbandonReason::ModalTimeout));
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_action_button_abandons() {
        let driver = FakeDriver::new("https://example.com/jobs");
        let Listing { link, modal } = listing(&driver);
        driver.add_under(Some(modal), Locator::css(BUTTONS), FakeNode::with_text("Dismiss"));

        machine!(&driver, resolver, machine);
        let outcome = machine.apply(&link).await;
        assert_eq!(outcome, ApplicationOutcome::Abandoned(AbandonReason::NoActionControl));
    }

    #[tokio::test(start_paused = true)]
    async fn test_endless_next_exhausts_step_budget() {
        let driver = FakeDriver::new("https://example.com/jobs");
        let Listing { link, modal } = listing(&driver);
        let next = driver.add_under(Some(modal), Locator::css(BUTTONS), FakeNode::with_text("Next"));

        machine!(&driver, resolver, machine);
        let outcome = machine.apply(&link).await;
        assert_eq!(
            outcome,
            ApplicationOutcome::Abandoned(AbandonReason::StepBudgetExhausted)
        );
        let next_clicks = driver.clicks().iter().filter(|c| **c == next).count();
        assert_eq!(next_clicks as u32, MAX_STEPS);
    }

    #[tokio::test(start_paused = true)]
    async fn test_submit_outranks_next_and_contact_is_prefilled() {
        let driver = FakeDriver::new("https://example.com/jobs");
        let Listing { link, modal } = listing(&driver);
        let phone = driver.add_under(
            Some(modal),
            Locator::css(PHONE_INPUT),
            FakeNode::default().attr("id", "phoneNumber"),
        );
        driver.attach(Some(modal), Locator::css(TEXT_INPUTS), phone);
        driver.add_under(
            Some(phone),
            Locator::xpath(PRECEDING_LABEL),
            FakeNode::with_text("Mobile phone number"),
        );
        let next = driver.add_under(Some(modal), Locator::css(BUTTONS), FakeNode::with_text("Next"));
        let submit = driver.add_under(Some(modal), Locator::css(BUTTONS), FakeNode::with_text("Submit"));

        machine!(&driver, resolver, machine);
        let outcome = machine.apply(&link).await;
        assert_eq!(outcome, ApplicationOutcome::Submitted { steps: 1 });
        assert!(driver.clicks().contains(&submit));
        assert!(!driver.clicks().contains(&next));
        // Pre-filled once; the resolution pass then saw a resolved field.
        assert_eq!(driver.node(phone).value, "555-0100");
        assert_eq!(driver.writes(phone).len(), "555-0100".len());
    }
}
