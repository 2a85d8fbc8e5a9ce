//! Browser driver capability consumed by the automation engine.
//!
//! The engine never talks to WebDriver directly. Every element lookup goes through
//! [`BrowserDriver`], and "not found" is an empty `Vec` or `None`, never an error.
//! Errors are reserved for the session itself misbehaving (stale handles, elements that
//! refuse a click, transport failures).

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;
use tokio::time::Instant;

pub mod pacing;
pub mod selectors;
pub mod webdriver;

pub use pacing::Pacer;
pub use webdriver::WebDriverBrowser;

/// Interval between polls in the bounded wait helpers.
const POLL_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("WebDriver session error: {0}")]
    Session(String),

    #[error("Element not interactable: {0}")]
    NotInteractable(String),

    #[error("Stale element reference")]
    Stale,

    #[error("Navigation failed: {0}")]
    Navigation(String),

    #[error("Script error: {0}")]
    Script(String),

    #[error("Driver command failed: {0}")]
    Command(String),
}

/// How to find elements, relative to the document or to another element.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Locator {
    Css(String),
    XPath(String),
}

impl Locator {
    pub fn css(selector: &str) -> Self {
        Locator::Css(selector.to_string())
    }

    pub fn xpath(expression: &str) -> Self {
        Locator::XPath(expression.to_string())
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Css(s) => write!(f, "css={s}"),
            Locator::XPath(s) => write!(f, "xpath={s}"),
        }
    }
}

/// The browser primitives the engine needs. One implementation drives a real browser over
/// WebDriver; tests use an in-memory page.
///
/// `scope = None` searches the whole document.
#[async_trait]
pub trait BrowserDriver: Send + Sync {
    type Element: Clone + fmt::Debug + Send + Sync;

    async fn open(&self, url: &str) -> Result<(), DriverError>;

    async fn current_url(&self) -> Result<String, DriverError>;

    async fn find_all(
        &self,
        scope: Option<&Self::Element>,
        locator: &Locator,
    ) -> Result<Vec<Self::Element>, DriverError>;

    async fn text(&self, element: &Self::Element) -> Result<String, DriverError>;

    /// The current `value` property of an input, textarea or select.
    async fn value(&self, element: &Self::Element) -> Result<String, DriverError>;

    async fn attribute(
        &self,
        element: &Self::Element,
        name: &str,
    ) -> Result<Option<String>, DriverError>;

    async fn is_visible(&self, element: &Self::Element) -> Result<bool, DriverError>;

    async fn is_enabled(&self, element: &Self::Element) -> Result<bool, DriverError>;

    async fn is_checked(&self, element: &Self::Element) -> Result<bool, DriverError>;

    async fn click(&self, element: &Self::Element) -> Result<(), DriverError>;

    /// Replaces the whole value of a text control.
    async fn set_value(&self, element: &Self::Element, value: &str) -> Result<(), DriverError>;

    async fn select_by_label(&self, element: &Self::Element, label: &str)
        -> Result<(), DriverError>;

    async fn scroll_into_view(&self, element: &Self::Element) -> Result<(), DriverError>;

    /// PNG bytes of one element, or of the viewport when `element` is `None`.
    async fn screenshot(&self, element: Option<&Self::Element>) -> Result<Bytes, DriverError>;

    async fn scroll_to_bottom(&self) -> Result<(), DriverError>;

    async fn press_escape(&self) -> Result<(), DriverError>;

    async fn find_first(
        &self,
        scope: Option<&Self::Element>,
        locator: &Locator,
    ) -> Result<Option<Self::Element>, DriverError> {
        Ok(self.find_all(scope, locator).await?.into_iter().next())
    }
}

/// Visible and enabled. Lookup errors count as "no".
pub async fn is_interactable<D: BrowserDriver + ?Sized>(driver: &D, element: &D::Element) -> bool {
    matches!(driver.is_visible(element).await, Ok(true))
        && matches!(driver.is_enabled(element).await, Ok(true))
}

/// Polls until an element matching `locator` is visible, or gives up after `timeout`.
pub async fn wait_for_visible<D: BrowserDriver + ?Sized>(
    driver: &D,
    scope: Option<&D::Element>,
    locator: &Locator,
    timeout: Duration,
) -> Result<Option<D::Element>, DriverError> {
    let deadline = Instant::now() + timeout;
    loop {
        for element in driver.find_all(scope, locator).await? {
            if matches!(driver.is_visible(&element).await, Ok(true)) {
                return Ok(Some(element));
            }
        }
        if Instant::now() >= deadline {
            return Ok(None);
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

/// Polls until a visible element matching `locator` whose text contains `needle`
/// (case-insensitive) appears, or gives up after `timeout`.
pub async fn wait_for_text<D: BrowserDriver + ?Sized>(
    driver: &D,
    scope: Option<&D::Element>,
    locator: &Locator,
    needle: &str,
    timeout: Duration,
) -> Result<Option<D::Element>, DriverError> {
    let needle = needle.to_lowercase();
    let deadline = Instant::now() + timeout;
    loop {
        for element in driver.find_all(scope, locator).await? {
            let matches_text = driver
                .text(&element)
                .await
                .map(|t| t.to_lowercase().contains(&needle))
                .unwrap_or(false);
            if matches_text && matches!(driver.is_visible(&element).await, Ok(true)) {
                return Ok(Some(element));
            }
        }
        if Instant::now() >= deadline {
            return Ok(None);
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}
