//! Field Filler: applies an answer to a control and checks the page took it.
//!
//! Text is revealed one growing prefix at a time with randomized pauses; the paced
//! entry is part of what the target site expects from a person and must be kept.

use thiserror::Error;
use tracing::{debug, warn};

use crate::browser::pacing::{
    AFTER_SELECT, AFTER_TYPING, BEFORE_CLICK, CLEAR, FOCUS, KEYSTROKE, OPEN_DROPDOWN,
    READ_OPTIONS, THINKING, THINKING_CHANCE,
};
use crate::browser::{BrowserDriver, DriverError, Pacer};
use crate::engine::classifier::{ClassifiedField, Control, FieldOption};

#[derive(Debug, Error)]
pub enum FillError {
    #[error("Field did not accept '{expected}' (holds '{actual}')")]
    NotAccepted { expected: String, actual: String },

    #[error("No option labelled '{0}'")]
    UnknownOption(String),

    #[error("Option '{0}' did not become selected")]
    NotSelected(String),

    #[error("Control did not become checked")]
    NotChecked,

    #[error(transparent)]
    Driver(#[from] DriverError),
}

pub struct FieldFiller<'a, D: BrowserDriver + ?Sized> {
    driver: &'a D,
    pacer: &'a Pacer,
}

impl<'a, D: BrowserDriver + ?Sized> FieldFiller<'a, D> {
    pub fn new(driver: &'a D, pacer: &'a Pacer) -> Self {
        Self { driver, pacer }
    }

    pub async fn apply(
        &self,
        control: &Control<D::Element>,
        field: &ClassifiedField<D::Element>,
        answer: &str,
    ) -> Result<(), FillError> {
        match control {
            Control::Text(input) => self.type_text(input, answer).await,
            Control::Dropdown(select) => {
                let option = find_option(&field.options, answer)?;
                self.select(select, option).await
            }
            Control::RadioGroup { .. } => {
                let option = find_option(&field.options, answer)?;
                self.click_choice(&option.target, option.label.as_ref()).await
            }
            Control::Checkbox(input) => {
                self.click_choice(input, field.label_element.as_ref()).await
            }
        }
    }

    /// Progressive entry, then read back. A mismatch gets one full rewrite before
    /// it is reported.
    pub async fn type_text(&self, input: &D::Element, text: &str) -> Result<(), FillError> {
        self.driver.click(input).await?;
        self.pacer.pause(FOCUS).await;

        if !self.driver.value(input).await?.is_empty() {
            self.driver.set_value(input, "").await?;
            self.pacer.pause(CLEAR).await;
        }

        let mut typed = String::with_capacity(text.len());
        for ch in text.chars() {
            typed.push(ch);
            self.driver.set_value(input, &typed).await?;
            self.pacer.pause(KEYSTROKE).await;
            if self.pacer.chance(THINKING_CHANCE) {
                self.pacer.pause(THINKING).await;
            }
        }
        self.pacer.pause(AFTER_TYPING).await;

        if self.driver.value(input).await? == text {
            return Ok(());
        }

        debug!("Typed value did not stick; writing '{text}' in one go");
        self.driver.set_value(input, text).await?;
        let actual = self.driver.value(input).await?;
        if actual == text {
            Ok(())
        } else {
            Err(FillError::NotAccepted {
                expected: text.to_string(),
                actual,
            })
        }
    }

    pub async fn select(
        &self,
        select: &D::Element,
        option: &FieldOption<D::Element>,
    ) -> Result<(), FillError> {
        self.driver.scroll_into_view(select).await?;
        self.pacer.pause(READ_OPTIONS).await;
        self.driver.click(select).await?;
        self.pacer.pause(OPEN_DROPDOWN).await;
        self.driver.select_by_label(select, &option.text).await?;
        self.pacer.pause(AFTER_SELECT).await;

        if self.driver.is_checked(&option.target).await? {
            Ok(())
        } else {
            Err(FillError::NotSelected(option.text.clone()))
        }
    }

    /// Clicks a radio or checkbox, retrying once on its label when the input itself
    /// refuses the click.
    pub async fn click_choice(
        &self,
        target: &D::Element,
        label: Option<&D::Element>,
    ) -> Result<(), FillError> {
        self.driver.scroll_into_view(target).await?;
        self.pacer.pause(BEFORE_CLICK).await;

        match self.driver.click(target).await {
            Ok(()) => {}
            Err(DriverError::NotInteractable(reason)) => match label {
                Some(label) => {
                    warn!("Input not interactable ({reason}); clicking its label");
                    self.driver.click(label).await?;
                }
                None => return Err(DriverError::NotInteractable(reason).into()),
            },
            Err(e) => return Err(e.into()),
        }

        if self.driver.is_checked(target).await? {
            Ok(())
        } else {
            Err(FillError::NotChecked)
        }
    }
}

fn find_option<'o, E>(
    options: &'o [FieldOption<E>],
    answer: &str,
) -> Result<&'o FieldOption<E>, FillError> {
    options
        .iter()
        .find(|o| o.text == answer)
        .ok_or_else(|| FillError::UnknownOption(answer.to_string()))
}
