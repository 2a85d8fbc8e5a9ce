//! Outer job loop: log in, open the search, then for every page apply to each new
//! listing and advance until the paginator reports no more pages.

use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::browser::pacing::BETWEEN_APPLICATIONS;
use crate::browser::selectors::{
    JOB_CARD, JOB_CARD_LINK, LOGIN_SUBMIT, LOGIN_URL, PASSWORD_INPUT, USERNAME_INPUT,
};
use crate::browser::{wait_for_visible, BrowserDriver, DriverError, Locator, Pacer};
use crate::engine::application::ApplicationMachine;
use crate::engine::models::{JobId, JobLedger, PageCursor};
use crate::engine::pagination::{PageAdvance, Paginator};

/// Consecutive scans without a new listing before a page counts as done.
const MAX_IDLE_SCANS: u32 = 3;

const LOGIN_SETTLE: Duration = Duration::from_secs(5);
const SEARCH_SETTLE: Duration = Duration::from_secs(5);
const SCROLL_SETTLE: Duration = Duration::from_secs(3);
const EMPTY_PAGE_RETRY: Duration = Duration::from_secs(5);
const PAGE_LOAD_SETTLE: Duration = Duration::from_secs(8);
const LISTINGS_TIMEOUT: Duration = Duration::from_secs(15);
const LAZY_LOAD_SETTLE: Duration = Duration::from_secs(4);

/// Final counts of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub processed: usize,
    pub applied: usize,
    pub pages_visited: u32,
}

impl RunSummary {
    fn from_ledger(ledger: &JobLedger, pages_visited: u32) -> Self {
        Self {
            processed: ledger.processed_count(),
            applied: ledger.applied_count(),
            pages_visited,
        }
    }
}

/// Cards already applied to show e.g. "Applied 3 days ago".
pub fn is_already_applied(card_text: &str) -> bool {
    let text = card_text.to_lowercase();
    text.contains("applied") && (text.contains("day") || text.contains("week"))
}

pub struct RunController<'a, D: BrowserDriver + ?Sized> {
    driver: &'a D,
    pacer: &'a Pacer,
    machine: ApplicationMachine<'a, D>,
    paginator: Paginator<'a, D>,
    max_pages: u32,
}

impl<'a, D: BrowserDriver + ?Sized> RunController<'a, D> {
    pub fn new(
        driver: &'a D,
        pacer: &'a Pacer,
        machine: ApplicationMachine<'a, D>,
        max_pages: u32,
    ) -> Self {
        Self {
            driver,
            pacer,
            machine,
            paginator: Paginator::new(driver, pacer),
            max_pages,
        }
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<(), DriverError> {
        info!("Logging in");
        self.driver.open(LOGIN_URL).await?;

        let form = [(USERNAME_INPUT, email), (PASSWORD_INPUT, password)];
        for (selector, value) in form {
            let input = self
                .driver
                .find_first(None, &Locator::css(selector))
                .await?
                .ok_or_else(|| DriverError::Navigation(format!("login field {selector} missing")))?;
            self.driver.set_value(&input, value).await?;
        }

        let submit = self
            .driver
            .find_first(None, &Locator::css(LOGIN_SUBMIT))
            .await?
            .ok_or_else(|| DriverError::Navigation("login submit button missing".to_string()))?;
        self.driver.click(&submit).await?;
        tokio::time::sleep(LOGIN_SETTLE).await;
        info!("Login submitted");
        Ok(())
    }

    /// Processes pages until pagination ends. Navigation failures end the run with
    /// the counts gathered so far.
    pub async fn run(&self, search_url: &str) -> RunSummary {
        let mut ledger = JobLedger::default();
        let mut pages_visited = 0;

        if let Err(e) = self.driver.open(search_url).await {
            warn!("Could not open the job search: {e}");
            return RunSummary::from_ledger(&ledger, pages_visited);
        }
        tokio::time::sleep(SEARCH_SETTLE).await;

        let mut cursor = PageCursor::new(self.max_pages);
        loop {
            pages_visited += 1;
            info!(
                page = cursor.page(),
                max_pages = cursor.max_pages(),
                offset = cursor.offset(),
                "Processing page"
            );
            self.process_page(&mut ledger).await;
            info!(
                page = cursor.page(),
                applied = ledger.applied_count(),
                processed = ledger.processed_count(),
                "Finished page"
            );

            match self.paginator.advance(cursor).await {
                PageAdvance::Advanced(next) => {
                    cursor = next;
                    self.await_listings().await;
                }
                PageAdvance::NoMorePages => break,
            }
        }

        let summary = RunSummary::from_ledger(&ledger, pages_visited);
        info!(
            applied = summary.applied,
            processed = summary.processed,
            pages = summary.pages_visited,
            "Run finished"
        );
        summary
    }

    async fn await_listings(&self) {
        tokio::time::sleep(PAGE_LOAD_SETTLE).await;
        match wait_for_visible(self.driver, None, &Locator::css(JOB_CARD), LISTINGS_TIMEOUT).await {
            Ok(Some(_)) => debug!("Listings loaded"),
            Ok(None) => warn!("Timed out waiting for listings; continuing"),
            Err(e) => warn!("Listing wait failed: {e}"),
        }
        self.scroll_and_settle(LAZY_LOAD_SETTLE).await;
    }

    async fn scroll_and_settle(&self, settle: Duration) {
        if let Err(e) = self.driver.scroll_to_bottom().await {
            debug!("Scroll failed: {e}");
        }
        tokio::time::sleep(settle).await;
    }

    async fn listing_cards(&self) -> Vec<D::Element> {
        match self.driver.find_all(None, &Locator::css(JOB_CARD)).await {
            Ok(cards) => cards,
            Err(e) => {
                warn!("Listing lookup failed: {e}");
                Vec::new()
            }
        }
    }

    /// Scans the page until several consecutive scans surface nothing new.
    pub async fn process_page(&self, ledger: &mut JobLedger) {
        let mut idle_scans = 0;
        while idle_scans < MAX_IDLE_SCANS {
            self.scroll_and_settle(SCROLL_SETTLE).await;

            let mut cards = self.listing_cards().await;
            if cards.is_empty() {
                debug!("No listings yet; scrolling once more");
                self.scroll_and_settle(EMPTY_PAGE_RETRY).await;
                cards = self.listing_cards().await;
                if cards.is_empty() {
                    warn!("No listings on this page");
                    return;
                }
            }
            debug!(count = cards.len(), "Found listing cards");

            let mut found_new = false;
            for card in &cards {
                match self.process_card(card, ledger).await {
                    Ok(new) => found_new |= new,
                    Err(e) => warn!("Listing failed: {e}"),
                }
            }

            if found_new {
                idle_scans = 0;
            } else {
                idle_scans += 1;
                debug!(idle_scans, "No new listings in this scan");
            }
        }
    }

    /// `Ok(true)` when the card was seen for the first time.
    async fn process_card(
        &self,
        card: &D::Element,
        ledger: &mut JobLedger,
    ) -> Result<bool, DriverError> {
        let Some(link) = self
            .driver
            .find_first(Some(card), &Locator::css(JOB_CARD_LINK))
            .await?
        else {
            return Ok(false);
        };
        let Some(id) = self
            .driver
            .attribute(&link, "href")
            .await?
            .as_deref()
            .and_then(JobId::from_href)
        else {
            return Ok(false);
        };
        if !ledger.mark_processed(id.clone()) {
            return Ok(false);
        }

        let card_text = self.driver.text(card).await.unwrap_or_default();
        if is_already_applied(&card_text) {
            info!(job = %id, "Skipping listing already applied to");
            return Ok(true);
        }

        info!(job = %id, processed = ledger.processed_count(), "Applying");
        let outcome = self.machine.apply(&link).await;
        if outcome.is_submitted() {
            ledger.mark_applied(&id);
            info!(job = %id, "Application submitted");
        } else {
            warn!(job = %id, ?outcome, "Application not submitted");
        }

        self.pacer.pause(BETWEEN_APPLICATIONS).await;
        Ok(true)
    }
}
