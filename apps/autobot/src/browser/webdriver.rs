//! [`BrowserDriver`] over a WebDriver endpoint (chromedriver) via `fantoccini`.

use async_trait::async_trait;
use bytes::Bytes;
use fantoccini::elements::Element;
use fantoccini::error::{CmdError, ErrorStatus};
use fantoccini::{Client, ClientBuilder, Locator as WdLocator};
use serde_json::json;
use tracing::{debug, info};

use crate::browser::selectors::ESCAPE_KEY;
use crate::browser::{BrowserDriver, DriverError, Locator};

const SCROLL_INTO_VIEW_SCRIPT: &str =
    "arguments[0].scrollIntoView({block: 'center', inline: 'nearest'});";
const SCROLL_TO_BOTTOM_SCRIPT: &str = "window.scrollTo(0, document.body.scrollHeight);";

impl From<CmdError> for DriverError {
    fn from(e: CmdError) -> Self {
        match &e {
            CmdError::Standard(w) => match w.error {
                ErrorStatus::ElementNotInteractable | ErrorStatus::ElementClickIntercepted => {
                    DriverError::NotInteractable(w.message.to_string())
                }
                ErrorStatus::StaleElementReference => DriverError::Stale,
                _ => DriverError::Command(e.to_string()),
            },
            _ => DriverError::Command(e.to_string()),
        }
    }
}

/// A single Chrome session owned by one automation run.
pub struct WebDriverBrowser {
    client: Client,
}

impl WebDriverBrowser {
    /// Opens a new session against a running chromedriver.
    pub async fn connect(webdriver_url: &str, headless: bool) -> Result<Self, DriverError> {
        let mut args = vec!["--window-size=1400,1000".to_string()];
        if headless {
            args.push("--headless=new".to_string());
        }

        let mut caps = serde_json::Map::new();
        caps.insert("browserName".to_string(), json!("chrome"));
        caps.insert("goog:chromeOptions".to_string(), json!({ "args": args }));

        debug!("Connecting to WebDriver at {}", webdriver_url);
        let client = ClientBuilder::native()
            .capabilities(caps)
            .connect(webdriver_url)
            .await
            .map_err(|e| DriverError::Session(format!("{webdriver_url}: {e}")))?;

        info!(headless, "WebDriver session established");
        Ok(Self { client })
    }

    pub async fn close(self) -> Result<(), DriverError> {
        self.client.close().await?;
        Ok(())
    }

    fn element_arg(element: &Element) -> Result<serde_json::Value, DriverError> {
        serde_json::to_value(element).map_err(|e| DriverError::Script(e.to_string()))
    }
}

fn wd_locator(locator: &Locator) -> WdLocator<'_> {
    match locator {
        Locator::Css(s) => WdLocator::Css(s),
        Locator::XPath(s) => WdLocator::XPath(s),
    }
}

#[async_trait]
impl BrowserDriver for WebDriverBrowser {
    type Element = Element;

    async fn open(&self, url: &str) -> Result<(), DriverError> {
        self.client
            .goto(url)
            .await
            .map_err(|e| DriverError::Navigation(format!("{url}: {e}")))
    }

    async fn current_url(&self) -> Result<String, DriverError> {
        Ok(self.client.current_url().await?.to_string())
    }

    async fn find_all(
        &self,
        scope: Option<&Element>,
        locator: &Locator,
    ) -> Result<Vec<Element>, DriverError> {
        let found = match scope {
            Some(element) => element.find_all(wd_locator(locator)).await,
            None => self.client.find_all(wd_locator(locator)).await,
        };
        match found {
            Ok(elements) => Ok(elements),
            Err(e) if e.is_no_such_element() => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn text(&self, element: &Element) -> Result<String, DriverError> {
        Ok(element.text().await?)
    }

    async fn value(&self, element: &Element) -> Result<String, DriverError> {
        Ok(element.prop("value").await?.unwrap_or_default())
    }

    async fn attribute(&self, element: &Element, name: &str) -> Result<Option<String>, DriverError> {
        Ok(element.attr(name).await?)
    }

    async fn is_visible(&self, element: &Element) -> Result<bool, DriverError> {
        Ok(element.is_displayed().await?)
    }

    async fn is_enabled(&self, element: &Element) -> Result<bool, DriverError> {
        Ok(element.is_enabled().await?)
    }

    async fn is_checked(&self, element: &Element) -> Result<bool, DriverError> {
        Ok(element.is_selected().await?)
    }

    async fn click(&self, element: &Element) -> Result<(), DriverError> {
        Ok(element.click().await?)
    }

    async fn set_value(&self, element: &Element, value: &str) -> Result<(), DriverError> {
        element.clear().await?;
        if !value.is_empty() {
            element.send_keys(value).await?;
        }
        Ok(())
    }

    async fn select_by_label(&self, element: &Element, label: &str) -> Result<(), DriverError> {
        Ok(element.select_by_label(label).await?)
    }

    async fn scroll_into_view(&self, element: &Element) -> Result<(), DriverError> {
        let arg = Self::element_arg(element)?;
        self.client
            .execute(SCROLL_INTO_VIEW_SCRIPT, vec![arg])
            .await?;
        Ok(())
    }

    async fn screenshot(&self, element: Option<&Element>) -> Result<Bytes, DriverError> {
        let png = match element {
            Some(element) => element.screenshot().await?,
            None => self.client.screenshot().await?,
        };
        Ok(Bytes::from(png))
    }

    async fn scroll_to_bottom(&self) -> Result<(), DriverError> {
        self.client.execute(SCROLL_TO_BOTTOM_SCRIPT, vec![]).await?;
        Ok(())
    }

    async fn press_escape(&self) -> Result<(), DriverError> {
        let active = self.client.active_element().await?;
        active.send_keys(ESCAPE_KEY).await?;
        Ok(())
    }
}
