//! Field Classifier: turns a raw form control into a question and a kind.
//!
//! Questions come from an ordered list of strategies, first success wins:
//! the nearest structural label, then OCR over a screenshot of the control,
//! then a fixed placeholder.

use tracing::{debug, warn};

use crate::browser::selectors::{
    DROPDOWN_OPTIONS, FOLLOWING_LABEL, PLACEHOLDER_OPTION, PRECEDING_LABEL, PRECEDING_LEGEND,
};
use crate::browser::{BrowserDriver, DriverError, Locator};
use crate::engine::models::FieldKind;
use crate::vision::ImageToText;

const UNKNOWN_QUESTION: &str = "Unknown question";
const UNKNOWN_CHECKBOX: &str = "Unknown checkbox";

/// One control found in the modal. Radio inputs sharing a `name` form one control.
#[derive(Debug, Clone)]
pub enum Control<E> {
    Text(E),
    Dropdown(E),
    RadioGroup { name: String, inputs: Vec<E> },
    Checkbox(E),
}

impl<E> Control<E> {
    pub fn kind(&self) -> FieldKind {
        match self {
            Control::Text(_) => FieldKind::FreeText,
            Control::Dropdown(_) => FieldKind::Dropdown,
            Control::RadioGroup { .. } => FieldKind::RadioGroup,
            Control::Checkbox(_) => FieldKind::Checkbox,
        }
    }

    /// The element labels and screenshots are taken relative to.
    pub fn anchor(&self) -> Option<&E> {
        match self {
            Control::Text(e) | Control::Dropdown(e) | Control::Checkbox(e) => Some(e),
            Control::RadioGroup { inputs, .. } => inputs.first(),
        }
    }
}

/// A choice of a dropdown or radio group. `target` is what gets selected or clicked;
/// `label` is the fallback click target for radios.
#[derive(Debug, Clone)]
pub struct FieldOption<E> {
    pub text: String,
    pub target: E,
    pub label: Option<E>,
}

#[derive(Debug, Clone)]
pub struct ClassifiedField<E> {
    pub question: String,
    pub kind: FieldKind,
    pub options: Vec<FieldOption<E>>,
    /// Checkbox label, used when the box itself refuses a click.
    pub label_element: Option<E>,
}

impl<E> ClassifiedField<E> {
    pub fn option_texts(&self) -> Vec<String> {
        self.options.iter().map(|o| o.text.clone()).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    AlreadyResolved,
    NoOptions,
}

#[derive(Debug, Clone)]
pub enum Classification<E> {
    Skip(SkipReason),
    Pending(ClassifiedField<E>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuestionStrategy {
    StructuralLabel,
    ImageToText,
}

pub const DEFAULT_STRATEGIES: &[QuestionStrategy] =
    &[QuestionStrategy::StructuralLabel, QuestionStrategy::ImageToText];

fn label_locator(kind: FieldKind) -> Locator {
    match kind {
        FieldKind::FreeText | FieldKind::Dropdown => Locator::xpath(PRECEDING_LABEL),
        FieldKind::RadioGroup => Locator::xpath(PRECEDING_LEGEND),
        FieldKind::Checkbox => Locator::xpath(FOLLOWING_LABEL),
    }
}

pub struct FieldClassifier<'a, D: BrowserDriver + ?Sized> {
    driver: &'a D,
    vision: &'a dyn ImageToText,
    strategies: &'a [QuestionStrategy],
}

impl<'a, D: BrowserDriver + ?Sized> FieldClassifier<'a, D> {
    pub fn new(driver: &'a D, vision: &'a dyn ImageToText) -> Self {
        Self {
            driver,
            vision,
            strategies: DEFAULT_STRATEGIES,
        }
    }

    #[cfg(test)]
    pub fn with_strategies(mut self, strategies: &'a [QuestionStrategy]) -> Self {
        self.strategies = strategies;
        self
    }

    pub async fn classify(
        &self,
        control: &Control<D::Element>,
    ) -> Result<Classification<D::Element>, DriverError> {
        if self.is_resolved(control).await? {
            return Ok(Classification::Skip(SkipReason::AlreadyResolved));
        }

        let kind = control.kind();
        let options = match control {
            Control::Dropdown(select) => self.dropdown_options(select).await?,
            Control::RadioGroup { inputs, .. } => self.radio_options(inputs).await?,
            Control::Text(_) | Control::Checkbox(_) => Vec::new(),
        };
        if matches!(kind, FieldKind::Dropdown | FieldKind::RadioGroup) && options.is_empty() {
            return Ok(Classification::Skip(SkipReason::NoOptions));
        }

        let label_element = match control {
            Control::Checkbox(input) => {
                self.driver
                    .find_first(Some(input), &Locator::xpath(FOLLOWING_LABEL))
                    .await?
            }
            _ => None,
        };

        let question = self.derive_question(control).await;
        debug!(?kind, "Classified control as '{question}'");
        Ok(Classification::Pending(ClassifiedField {
            question,
            kind,
            options,
            label_element,
        }))
    }

    /// Non-empty value, a real dropdown selection, or a checked state.
    async fn is_resolved(&self, control: &Control<D::Element>) -> Result<bool, DriverError> {
        match control {
            Control::Text(input) => Ok(!self.driver.value(input).await?.trim().is_empty()),
            Control::Dropdown(select) => {
                let value = self.driver.value(select).await?;
                let value = value.trim();
                Ok(!value.is_empty()
                    && !value.eq_ignore_ascii_case(PLACEHOLDER_OPTION)
                    && !value.eq_ignore_ascii_case("none"))
            }
            Control::RadioGroup { inputs, .. } => {
                for input in inputs {
                    if self.driver.is_checked(input).await? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            Control::Checkbox(input) => self.driver.is_checked(input).await,
        }
    }

    async fn dropdown_options(
        &self,
        select: &D::Element,
    ) -> Result<Vec<FieldOption<D::Element>>, DriverError> {
        let mut options = Vec::new();
        for option in self
            .driver
            .find_all(Some(select), &Locator::css(DROPDOWN_OPTIONS))
            .await?
        {
            let text = self.driver.text(&option).await?.trim().to_string();
            if text.is_empty() || text.eq_ignore_ascii_case(PLACEHOLDER_OPTION) {
                continue;
            }
            options.push(FieldOption {
                text,
                target: option,
                label: None,
            });
        }
        Ok(options)
    }

    async fn radio_options(
        &self,
        inputs: &[D::Element],
    ) -> Result<Vec<FieldOption<D::Element>>, DriverError> {
        let mut options = Vec::new();
        for input in inputs {
            let label = self
                .driver
                .find_first(Some(input), &Locator::xpath(FOLLOWING_LABEL))
                .await?;
            let mut text = String::new();
            if let Some(label) = &label {
                if self.driver.is_visible(label).await? {
                    text = self.driver.text(label).await?.trim().to_string();
                }
            }
            if text.is_empty() {
                text = self
                    .driver
                    .attribute(input, "value")
                    .await?
                    .unwrap_or_default()
                    .trim()
                    .to_string();
            }
            if text.is_empty() {
                continue;
            }
            options.push(FieldOption {
                text,
                target: input.clone(),
                label,
            });
        }
        Ok(options)
    }

    async fn derive_question(&self, control: &Control<D::Element>) -> String {
        for strategy in self.strategies {
            if let Some(question) = self.apply_strategy(*strategy, control).await {
                return question;
            }
        }
        match control.kind() {
            FieldKind::Checkbox => UNKNOWN_CHECKBOX.to_string(),
            _ => UNKNOWN_QUESTION.to_string(),
        }
    }

    async fn apply_strategy(
        &self,
        strategy: QuestionStrategy,
        control: &Control<D::Element>,
    ) -> Option<String> {
        let anchor = control.anchor()?;
        let result = match strategy {
            QuestionStrategy::StructuralLabel => {
                self.structural_label(anchor, control.kind()).await
            }
            QuestionStrategy::ImageToText => self.ocr_label(anchor).await,
        };
        match result {
            Ok(text) => text.map(|t| t.trim().to_string()).filter(|t| !t.is_empty()),
            Err(e) => {
                warn!(?strategy, "Question strategy failed: {e}");
                None
            }
        }
    }

    async fn structural_label(
        &self,
        anchor: &D::Element,
        kind: FieldKind,
    ) -> Result<Option<String>, DriverError> {
        let Some(label) = self
            .driver
            .find_first(Some(anchor), &label_locator(kind))
            .await?
        else {
            return Ok(None);
        };
        if !self.driver.is_visible(&label).await? {
            return Ok(None);
        }
        Ok(Some(self.driver.text(&label).await?))
    }

    async fn ocr_label(&self, anchor: &D::Element) -> Result<Option<String>, DriverError> {
        let image = self.driver.screenshot(Some(anchor)).await?;
        if image.is_empty() {
            return Ok(None);
        }
        match self.vision.read_text(&image).await {
            Ok(text) => Ok(Some(text)),
            Err(e) => {
                warn!("OCR failed: {e}");
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{EchoVision, FakeDriver, FakeNode};

    fn pending(classification: Classification<usize>) -> ClassifiedField<usize> {
        match classification {
            Classification::Pending(field) => field,
            Classification::Skip(reason) => panic!("expected pending, got {reason:?}"),
        }
    }

    #[tokio::test]
    async fn test_text_input_uses_visible_preceding_label() {
        let driver = FakeDriver::new("https://example.com");
        let vision = EchoVision::default();
        let input = driver.add(FakeNode::default().ocr("from ocr"));
        driver.add_under(
            Some(input),
            Locator::xpath(PRECEDING_LABEL),
            FakeNode::with_text("  Mobile phone number  "),
        );

        let classifier = FieldClassifier::new(&driver, &vision);
        let field = pending(classifier.classify(&Control::Text(input)).await.unwrap());
        assert_eq!(field.question, "Mobile phone number");
        assert_eq!(field.kind, FieldKind::FreeText);
        assert_eq!(vision.calls(), 0);
    }

    #[tokio::test]
    async fn test_hidden_label_falls_back_to_ocr() {
        let driver = FakeDriver::new("https://example.com");
        let vision = EchoVision::default();
        let input = driver.add(FakeNode::default().ocr(" Notice period \n"));
        driver.add_under(
            Some(input),
            Locator::xpath(PRECEDING_LABEL),
            FakeNode::with_text("Hidden").hidden(),
        );

        let classifier = FieldClassifier::new(&driver, &vision);
        let field = pending(classifier.classify(&Control::Text(input)).await.unwrap());
        assert_eq!(field.question, "Notice period");
        assert_eq!(vision.calls(), 1);
    }

    #[tokio::test]
    async fn test_no_label_and_empty_ocr_gives_placeholder() {
        let driver = FakeDriver::new("https://example.com");
        let vision = EchoVision::default();
        let input = driver.add(FakeNode::default());
        let checkbox = driver.add(FakeNode::default().attr("type", "checkbox"));

        let classifier = FieldClassifier::new(&driver, &vision);
        let text = pending(classifier.classify(&Control::Text(input)).await.unwrap());
        assert_eq!(text.question, "Unknown question");
        let check = pending(classifier.classify(&Control::Checkbox(checkbox)).await.unwrap());
        assert_eq!(check.question, "Unknown checkbox");
    }

    #[tokio::test]
    async fn test_strategies_are_configurable() {
        let driver = FakeDriver::new("https://example.com");
        let vision = EchoVision::default();
        let input = driver.add(FakeNode::default().ocr("Only OCR knows"));

        let classifier = FieldClassifier::new(&driver, &vision)
            .with_strategies(&[QuestionStrategy::StructuralLabel]);
        let field = pending(classifier.classify(&Control::Text(input)).await.unwrap());
        assert_eq!(field.question, "Unknown question");
        assert_eq!(vision.calls(), 0);
    }

    #[tokio::test]
    async fn test_filled_controls_are_already_resolved() {
        let driver = FakeDriver::new("https://example.com");
        let vision = EchoVision::default();
        let input = driver.add(FakeNode::default().with_value("555-0100"));
        let select = driver.add(FakeNode::default().with_value("Yes"));
        let checkbox = driver.add(FakeNode::default().checked());

        let classifier = FieldClassifier::new(&driver, &vision);
        for control in [
            Control::Text(input),
            Control::Dropdown(select),
            Control::Checkbox(checkbox),
        ] {
            assert!(matches!(
                classifier.classify(&control).await.unwrap(),
                Classification::Skip(SkipReason::AlreadyResolved)
            ));
        }
    }

    #[tokio::test]
    async fn test_dropdown_options_skip_placeholder() {
        let driver = FakeDriver::new("https://example.com");
        let vision = EchoVision::default();
        let select = driver.add(FakeNode::default().with_value("Select an option"));
        let options = Locator::css(DROPDOWN_OPTIONS);
        driver.add_under(Some(select), options.clone(), FakeNode::with_text("Select an option"));
        driver.add_under(Some(select), options.clone(), FakeNode::with_text("Yes"));
        driver.add_under(Some(select), options, FakeNode::with_text("No"));
        driver.add_under(
            Some(select),
            Locator::xpath(PRECEDING_LABEL),
            FakeNode::with_text("Will you require sponsorship?"),
        );

        let classifier = FieldClassifier::new(&driver, &vision);
        let field = pending(classifier.classify(&Control::Dropdown(select)).await.unwrap());
        assert_eq!(field.kind, FieldKind::Dropdown);
        assert_eq!(field.option_texts(), vec!["Yes", "No"]);
        assert_eq!(field.question, "Will you require sponsorship?");
    }

    #[tokio::test]
    async fn test_dropdown_with_only_placeholder_is_skipped() {
        let driver = FakeDriver::new("https://example.com");
        let vision = EchoVision::default();
        let select = driver.add(FakeNode::default());
        driver.add_under(
            Some(select),
            Locator::css(DROPDOWN_OPTIONS),
            FakeNode::with_text("Select an option"),
        );

        let classifier = FieldClassifier::new(&driver, &vision);
        assert!(matches!(
            classifier.classify(&Control::Dropdown(select)).await.unwrap(),
            Classification::Skip(SkipReason::NoOptions)
        ));
    }

    #[tokio::test]
    async fn test_radio_group_question_from_legend_and_options_from_labels() {
        let driver = FakeDriver::new("https://example.com");
        let vision = EchoVision::default();
        let yes = driver.add(FakeNode::default().attr("type", "radio").attr("value", "y"));
        let no = driver.add(FakeNode::default().attr("type", "radio").attr("value", "No"));
        driver.add_under(
            Some(yes),
            Locator::xpath(PRECEDING_LEGEND),
            FakeNode::with_text("Are you authorized to work?"),
        );
        let yes_label = driver.add_under(
            Some(yes),
            Locator::xpath(FOLLOWING_LABEL),
            FakeNode::with_text("Yes"),
        );

        let classifier = FieldClassifier::new(&driver, &vision);
        let control = Control::RadioGroup {
            name: "authorized".to_string(),
            inputs: vec![yes, no],
        };
        let field = pending(classifier.classify(&control).await.unwrap());
        assert_eq!(field.question, "Are you authorized to work?");
        assert_eq!(field.option_texts(), vec!["Yes", "No"]);
        assert_eq!(field.options[0].label, Some(yes_label));
        assert_eq!(field.options[1].label, None);
    }

    #[tokio::test]
    async fn test_checked_radio_group_is_resolved() {
        let driver = FakeDriver::new("https://example.com");
        let vision = EchoVision::default();
        let a = driver.add(FakeNode::default().attr("type", "radio"));
        let b = driver.add(FakeNode::default().attr("type", "radio").checked());

        let classifier = FieldClassifier::new(&driver, &vision);
        let control = Control::RadioGroup {
            name: "g".to_string(),
            inputs: vec![a, b],
        };
        assert!(matches!(
            classifier.classify(&control).await.unwrap(),
            Classification::Skip(SkipReason::AlreadyResolved)
        ));
    }

    #[tokio::test]
    async fn test_checkbox_carries_label_element() {
        let driver = FakeDriver::new("https://example.com");
        let vision = EchoVision::default();
        let checkbox = driver.add(FakeNode::default().attr("type", "checkbox"));
        let label = driver.add_under(
            Some(checkbox),
            Locator::xpath(FOLLOWING_LABEL),
            FakeNode::with_text("I agree to the terms"),
        );

        let classifier = FieldClassifier::new(&driver, &vision);
        let field = pending(classifier.classify(&Control::Checkbox(checkbox)).await.unwrap());
        assert_eq!(field.question, "I agree to the terms");
        assert_eq!(field.label_element, Some(label));
    }
}
