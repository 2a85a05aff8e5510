//! WebDriver session layer for the portal automation.
//!
//! Wraps `fantoccini` with the small surface the transaction engine needs:
//! a session provisioned per transaction, page helpers with explicit
//! timeouts, and element helpers that type at a human cadence. One session
//! belongs to exactly one transaction and is closed unconditionally when
//! that transaction ends, whatever the outcome.
//!
//! - [`session::Browser`]: connects to a running chromedriver
//! - [`session::Page`] / [`session::PortalElement`]: DOM helpers
//! - [`typing::TypingCadence`]: human-like delays and per-key typing
//! - [`chrome`]: Chrome argument set and concealment script

pub mod chrome;
pub mod session;
pub mod typing;

pub use session::{Browser, Page, PortalElement};
pub use typing::TypingCadence;

use serde::Deserialize;

/// Connection and profile settings for one browser session.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// WebDriver endpoint (chromedriver).
    pub webdriver_url: String,
    pub headless: bool,
    pub window_width: u32,
    pub window_height: u32,
    /// User agent presented to the portal.
    pub user_agent: String,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            webdriver_url: "http://localhost:9515".to_string(),
            headless: true,
            window_width: 1280,
            window_height: 900,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36"
                .to_string(),
        }
    }
}
