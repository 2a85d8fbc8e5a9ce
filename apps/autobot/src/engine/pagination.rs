//! Pagination Navigator.
//!
//! The result list's "next" control is not always rendered or clickable, so advancing
//! tries the control first and falls back to rewriting the `start` offset in the
//! address. Either way success means the observable address actually moved.

use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info, warn};

use crate::browser::pacing::BEFORE_CLICK;
use crate::browser::selectors::{BUTTONS, NEXT_PAGE_BUTTONS};
use crate::browser::{is_interactable, BrowserDriver, DriverError, Locator, Pacer};
use crate::engine::models::{PageCursor, PAGE_SIZE};

static START_PARAM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([?&])start=(\d+)").expect("start pattern is a valid regex"));

const BOTTOM_SETTLE: Duration = Duration::from_secs(2);
const NAVIGATION_SETTLE: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageAdvance {
    Advanced(PageCursor),
    NoMorePages,
}

/// `start / 25 + 1`, or 1 when the address has no offset.
pub fn page_number(url: &str) -> u32 {
    START_PARAM
        .captures(url)
        .and_then(|c| c.get(2))
        .and_then(|m| m.as_str().parse::<u32>().ok())
        .map(|start| start / PAGE_SIZE + 1)
        .unwrap_or(1)
}

/// The same address with its offset advanced by one page, or `start=25` appended.
/// `None` when the current offset is unreadable or cannot advance.
pub fn next_page_url(url: &str) -> Option<String> {
    if let Some(captures) = START_PARAM.captures(url) {
        let start = captures[2]
            .parse::<u32>()
            .ok()
            .and_then(|start| start.checked_add(PAGE_SIZE))?;
        let replacement = format!("{}start={start}", &captures[1]);
        return Some(START_PARAM.replace(url, replacement.as_str()).into_owned());
    }
    let separator = if url.contains('?') { '&' } else { '?' };
    Some(format!("{url}{separator}start={PAGE_SIZE}"))
}

pub struct Paginator<'a, D: BrowserDriver + ?Sized> {
    driver: &'a D,
    pacer: &'a Pacer,
}

impl<'a, D: BrowserDriver + ?Sized> Paginator<'a, D> {
    pub fn new(driver: &'a D, pacer: &'a Pacer) -> Self {
        Self { driver, pacer }
    }

    pub async fn advance(&self, cursor: PageCursor) -> PageAdvance {
        if cursor.at_limit() {
            info!(page = cursor.page(), "Reached the maximum page count");
            return PageAdvance::NoMorePages;
        }

        let before = match self.driver.current_url().await {
            Ok(url) => url,
            Err(e) => {
                warn!("Cannot read the current address: {e}");
                return PageAdvance::NoMorePages;
            }
        };
        let before_page = page_number(&before);
        debug!(page = before_page, url = %before, "Advancing to the next page");

        match self.click_next().await {
            Ok(true) => {
                tokio::time::sleep(NAVIGATION_SETTLE).await;
                if self.moved_from(&before, before_page).await {
                    info!(page = cursor.page() + 1, "Advanced via the next-page control");
                    return PageAdvance::Advanced(cursor.next());
                }
                warn!("Next-page control clicked but the page did not change");
            }
            Ok(false) => debug!("No next-page control found"),
            Err(e) => warn!("Next-page control failed: {e}"),
        }

        let Some(target) = next_page_url(&before) else {
            warn!(url = %before, "Offset in the address cannot be advanced");
            return PageAdvance::NoMorePages;
        };
        if let Err(e) = self.driver.open(&target).await {
            warn!("Address rewrite to {target} failed: {e}");
            return PageAdvance::NoMorePages;
        }
        tokio::time::sleep(NAVIGATION_SETTLE).await;

        if self.moved_from(&before, before_page).await {
            info!(page = cursor.page() + 1, "Advanced via address rewrite");
            PageAdvance::Advanced(cursor.next())
        } else {
            warn!("Neither pagination strategy changed the page");
            PageAdvance::NoMorePages
        }
    }

    async fn moved_from(&self, before: &str, before_page: u32) -> bool {
        match self.driver.current_url().await {
            Ok(after) => after != before || page_number(&after) > before_page,
            Err(e) => {
                warn!("Cannot verify navigation: {e}");
                false
            }
        }
    }

    /// Clicks the first usable next-page control. `Ok(false)` when there is none.
    async fn click_next(&self) -> Result<bool, DriverError> {
        self.driver.scroll_to_bottom().await?;
        tokio::time::sleep(BOTTOM_SETTLE).await;

        for selector in NEXT_PAGE_BUTTONS {
            for button in self.driver.find_all(None, &Locator::css(selector)).await? {
                if !is_interactable(self.driver, &button).await {
                    continue;
                }
                if self.driver.attribute(&button, "disabled").await?.is_some() {
                    debug!(selector, "Next-page control is disabled");
                    continue;
                }
                self.press(&button).await?;
                debug!(selector, "Clicked next-page control");
                return Ok(true);
            }
        }

        for button in self.driver.find_all(None, &Locator::css(BUTTONS)).await? {
            if !matches!(self.driver.is_visible(&button).await, Ok(true)) {
                continue;
            }
            let text = self.driver.text(&button).await?.to_lowercase();
            if text.contains("next") && !text.contains("previous") {
                self.press(&button).await?;
                debug!("Clicked button labelled '{text}'");
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn press(&self, button: &D::Element) -> Result<(), DriverError> {
        self.driver.scroll_into_view(button).await?;
        self.pacer.pause(BEFORE_CLICK).await;
        self.driver.click(button).await
    }
}
