//! Session, page, and element wrappers over `fantoccini`.

use crate::chrome::{chrome_arguments, CONCEALMENT_SCRIPT};
use crate::typing::TypingCadence;
use crate::BrowserConfig;
use anyhow::{anyhow, Result};
use fantoccini::elements::Element;
use fantoccini::{Client, ClientBuilder, Locator};
use serde_json::json;
use std::time::Duration;
use webdriver::capabilities::Capabilities;

/// One WebDriver session. Owned by exactly one transaction; closed
/// unconditionally when that transaction finishes.
pub struct Browser {
    client: Client,
    typing: TypingCadence,
    window: (u32, u32),
}

impl Browser {
    /// Connect to a running chromedriver and open a session with the
    /// portal-tolerant Chrome profile.
    pub async fn launch(config: &BrowserConfig) -> Result<Self> {
        let mut caps = Capabilities::new();
        let mut chrome_opts = serde_json::Map::new();
        chrome_opts.insert("args".to_string(), json!(chrome_arguments(config)));
        caps.insert(
            "goog:chromeOptions".to_string(),
            serde_json::Value::Object(chrome_opts),
        );

        let client = ClientBuilder::native()
            .capabilities(caps)
            .connect(&config.webdriver_url)
            .await
            .map_err(|e| anyhow!("webdriver connect to {} failed: {e}", config.webdriver_url))?;

        tracing::debug!(
            target: "browser.session",
            webdriver_url = %config.webdriver_url,
            headless = config.headless,
            "session opened"
        );

        Ok(Self {
            client,
            typing: TypingCadence::new(),
            window: (config.window_width, config.window_height),
        })
    }

    /// Navigate and hand back a page with the concealment script applied.
    pub async fn goto(&self, url: &str) -> Result<Page> {
        self.typing.random_delay(300, 1200).await;
        self.client.goto(url).await?;
        self.client.execute(CONCEALMENT_SCRIPT, vec![]).await?;
        tracing::debug!(target: "browser.session", %url, "portal.navigate");
        Ok(Page {
            client: self.client.clone(),
            typing: self.typing.clone(),
            window: self.window,
        })
    }

    /// Current page without navigating, e.g. after a submit.
    pub fn page(&self) -> Page {
        Page {
            client: self.client.clone(),
            typing: self.typing.clone(),
            window: self.window,
        }
    }

    /// Close the underlying browser session.
    pub async fn close(self) -> Result<()> {
        self.client.close().await?;
        Ok(())
    }
}

/// DOM helpers scoped to the current document.
#[derive(Clone)]
pub struct Page {
    client: Client,
    typing: TypingCadence,
    window: (u32, u32),
}

impl Page {
    /// Wait up to `timeout` for the selector to appear.
    pub async fn wait_for(&self, selector: &str, timeout: Duration) -> Result<PortalElement> {
        let element = self
            .client
            .wait()
            .at_most(timeout)
            .for_element(Locator::Css(selector))
            .await
            .map_err(|e| anyhow!("selector {selector} not present within {timeout:?}: {e}"))?;
        Ok(PortalElement::new(element, &self.typing))
    }

    /// Find one element, `None` when absent. Use this for optional
    /// controls whose absence is a normal outcome.
    pub async fn find(&self, selector: &str) -> Result<Option<PortalElement>> {
        match self.client.find(Locator::Css(selector)).await {
            Ok(element) => Ok(Some(PortalElement::new(element, &self.typing))),
            Err(e) if e.is_no_such_element() => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Find zero or more elements by CSS selector.
    pub async fn find_all(&self, selector: &str) -> Result<Vec<PortalElement>> {
        let elements = self.client.find_all(Locator::Css(selector)).await?;
        Ok(elements
            .into_iter()
            .map(|element| PortalElement::new(element, &self.typing))
            .collect())
    }

    /// The page's rendered text, as a user would read it.
    pub async fn visible_text(&self) -> Result<String> {
        let value = self
            .client
            .execute("return document.body ? document.body.innerText : '';", vec![])
            .await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    /// Full page HTML source.
    pub async fn source(&self) -> Result<String> {
        Ok(self.client.source().await?)
    }

    /// Current URL as a string.
    pub async fn current_url(&self) -> Result<String> {
        Ok(self.client.current_url().await?.to_string())
    }

    /// Run a script in the page, returning its JSON result.
    pub async fn execute(
        &self,
        script: &str,
        args: Vec<serde_json::Value>,
    ) -> Result<serde_json::Value> {
        Ok(self.client.execute(script, args).await?)
    }

    /// Capture the whole document as PNG.
    ///
    /// Classic WebDriver screenshots cover the viewport only, so the window
    /// is grown to the document height first. Sessions are per-transaction;
    /// nothing restores the original size.
    pub async fn screenshot_full_page(&self) -> Result<Vec<u8>> {
        let height = self
            .client
            .execute(
                "return document.body ? document.body.scrollHeight : 0;",
                vec![],
            )
            .await?
            .as_u64()
            .unwrap_or(0) as u32;

        let (width, min_height) = self.window;
        let full_height = height.clamp(min_height, 8000);
        if full_height > min_height {
            self.client.set_window_size(width, full_height).await?;
        }

        let png = self.client.screenshot().await?;
        tracing::debug!(
            target: "browser.session",
            bytes = png.len(),
            height = full_height,
            "page.screenshot"
        );
        Ok(png)
    }
}

/// Wrapper for DOM elements with typed helpers consistent with [`Page`].
#[derive(Clone)]
pub struct PortalElement {
    pub element: Element,
    typing: TypingCadence,
}

impl PortalElement {
    pub fn new(element: Element, typing: &TypingCadence) -> Self {
        Self {
            element,
            typing: typing.clone(),
        }
    }

    /// Clear the field and type the text at a human cadence.
    pub async fn type_text(&self, text: &str) -> Result<()> {
        self.element.clear().await?;
        self.typing.type_keys(&self.element, text).await
    }

    pub async fn click(&self) -> Result<()> {
        self.typing.random_delay(100, 400).await;
        self.element.click().await?;
        Ok(())
    }

    /// Read an attribute value.
    pub async fn attr(&self, attribute: &str) -> Result<Option<String>> {
        Ok(self.element.attr(attribute).await?)
    }

    /// The element's visible text.
    pub async fn text(&self) -> Result<String> {
        Ok(self.element.text().await?)
    }
}
