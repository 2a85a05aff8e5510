//! Live DETRAN-RJ adapter: selectors, fallback navigation, and the DOM
//! scripts that deal with the portal's challenge widget.

use std::time::Duration;

use async_trait::async_trait;
use consta_browser::{Browser, BrowserConfig, Page};
use consta_common::{EngineError, PageSnapshot, Result};
use serde_json::json;

use crate::adapter::{CaptchaChallenge, FormField, PortalAdapter};
use crate::config::PortalConfig;

/// Reads the widget's site key out of the live DOM. The explicit
/// `data-sitekey` attribute wins; failing that, the key is pulled from a
/// challenge iframe's `k=` query parameter.
const FRAME_SITE_KEY_SCRIPT: &str = r#"
    var widget = document.querySelector('.g-recaptcha[data-sitekey]');
    if (widget) { return widget.getAttribute('data-sitekey'); }
    var frames = document.querySelectorAll('iframe');
    for (var i = 0; i < frames.length; i++) {
        var src = frames[i].getAttribute('src') || '';
        var match = src.match(/[?&]k=([^&]+)/);
        if (match) { return match[1]; }
    }
    return null;
"#;

/// Writes a solved token into the response textarea and fires the callback
/// the widget registered, so the portal's own verification code runs.
const TOKEN_INJECTION_SCRIPT: &str = r#"
    var token = arguments[0];
    var area = document.querySelector('textarea[name="g-recaptcha-response"]')
        || document.getElementById('g-recaptcha-response');
    if (area) {
        area.style.display = 'block';
        area.value = token;
        area.innerHTML = token;
        area.dispatchEvent(new Event('input', { bubbles: true }));
        area.dispatchEvent(new Event('change', { bubbles: true }));
    }
    try {
        var cfg = window.___grecaptcha_cfg;
        if (cfg && cfg.clients) {
            Object.values(cfg.clients).forEach(function (client) {
                Object.values(client).forEach(function (part) {
                    if (!part || typeof part !== 'object') { return; }
                    Object.values(part).forEach(function (item) {
                        if (item && typeof item.callback === 'function') {
                            item.callback(token);
                        }
                    });
                });
            });
        }
    } catch (e) {}
    return area !== null;
"#;

/// Clicks the full-extract anchor by its text. The portal renders that link
/// in more than one layout, not all of them reachable by CSS selector.
const EXTRACT_CLICK_SCRIPT: &str = r#"
    var anchors = document.querySelectorAll('a');
    for (var i = 0; i < anchors.length; i++) {
        var text = (anchors[i].innerText || '').toUpperCase();
        if (text.indexOf('EXTRATO COMPLETO') !== -1
            || text.indexOf('EMITIR EXTRATO') !== -1
            || text.indexOf('CLIQUE AQUI') !== -1) {
            anchors[i].click();
            return true;
        }
    }
    return false;
"#;

/// WebDriver-backed [`PortalAdapter`] for the DETRAN-RJ certificate portal.
///
/// Owns one browser session for the lifetime of one transaction. Navigation
/// happens in [`PortalAdapter::locate_form`]; [`DetranPortal::open`] only
/// provisions the session.
pub struct DetranPortal {
    browser: Browser,
    page: Page,
    config: PortalConfig,
}

impl DetranPortal {
    /// Provision a browser session for one transaction.
    pub async fn open(browser: &BrowserConfig, config: PortalConfig) -> Result<Self> {
        let browser = Browser::launch(browser)
            .await
            .map_err(|e| EngineError::Internal(e.context("browser session failed to start")))?;
        let page = browser.page();
        Ok(Self {
            browser,
            page,
            config,
        })
    }

    /// Close the underlying browser session.
    pub async fn close(self) -> Result<()> {
        self.browser.close().await.map_err(EngineError::Internal)
    }

    async fn navigate(&mut self, url: &str) -> Result<()> {
        self.page = self.browser.goto(url).await.map_err(|e| {
            EngineError::PortalUnreachable(format!("navigation to {url} failed: {e}"))
        })?;
        Ok(())
    }

    async fn wait_for_form(&self) -> bool {
        self.page
            .wait_for(&self.config.selectors.cpf_field, self.field_timeout())
            .await
            .is_ok()
    }

    fn field_timeout(&self) -> Duration {
        Duration::from_secs(self.config.field_timeout_secs)
    }

    /// Wait for the document to report itself complete, then hold a quiet
    /// period for the portal's own scripts to finish rendering.
    async fn settle(&self, quiet_ms: u64) {
        let deadline =
            tokio::time::Instant::now() + Duration::from_secs(self.config.settle_timeout_secs);
        loop {
            let state = self
                .page
                .execute("return document.readyState;", vec![])
                .await
                .ok()
                .and_then(|value| value.as_str().map(str::to_string));
            if state.as_deref() == Some("complete") {
                break;
            }
            if tokio::time::Instant::now() >= deadline {
                tracing::debug!(
                    target: "portal.navigate",
                    "document never reported complete, continuing"
                );
                break;
            }
            tokio::time::sleep(Duration::from_millis(250)).await;
        }
        tokio::time::sleep(Duration::from_millis(quiet_ms)).await;
    }
}

#[async_trait]
impl PortalAdapter for DetranPortal {
    /// Deep link first; when the portal bounces it, walk the public menu
    /// path hop by hop the way a visitor would and try again.
    async fn locate_form(&mut self) -> Result<()> {
        let form_url = self.config.form_url.clone();
        self.navigate(&form_url).await?;
        if self.wait_for_form().await {
            return Ok(());
        }

        tracing::warn!(
            target: "portal.navigate",
            "deep link did not land on the form, walking the menu path"
        );
        let hops = self.config.fallback_path.clone();
        for url in &hops {
            self.navigate(url).await?;
            tokio::time::sleep(Duration::from_millis(self.config.menu_hop_delay_ms)).await;
        }
        if self.wait_for_form().await {
            return Ok(());
        }
        Err(EngineError::PortalUnreachable(
            "certificate form absent after deep link and menu path".to_string(),
        ))
    }

    async fn fill_field(&mut self, field: FormField, value: &str) -> Result<()> {
        let selector = match field {
            FormField::NationalId => self.config.selectors.cpf_field.clone(),
            FormField::LicenseNumber => self.config.selectors.cnh_field.clone(),
            FormField::DocumentType => {
                // Radio present on some form revisions only.
                let Some(selector) = self.config.selectors.document_type.clone() else {
                    return Ok(());
                };
                if let Some(control) = self.page.find(&selector).await? {
                    control.click().await?;
                }
                return Ok(());
            }
        };
        let element = self
            .page
            .wait_for(&selector, self.field_timeout())
            .await
            .map_err(|e| EngineError::PortalUnreachable(format!("form field missing: {e}")))?;
        element.type_text(value).await?;
        Ok(())
    }

    async fn find_challenge(&mut self) -> Result<Option<CaptchaChallenge>> {
        let page_url = self.page.current_url().await?;
        let mut saw_widget = false;

        if let Some(frame) = self
            .page
            .find(&self.config.selectors.recaptcha_iframe)
            .await?
        {
            saw_widget = true;
            if let Some(src) = frame.attr("src").await? {
                if let Some(site_key) = site_key_from_iframe_src(&src) {
                    return Ok(Some(CaptchaChallenge { site_key, page_url }));
                }
            }
        }

        if let Some(widget) = self
            .page
            .find(&self.config.selectors.recaptcha_widget)
            .await?
        {
            saw_widget = true;
            if let Some(site_key) = widget.attr("data-sitekey").await? {
                if !site_key.is_empty() {
                    return Ok(Some(CaptchaChallenge { site_key, page_url }));
                }
            }
        }

        // Last resort: let the page itself report the key.
        let value = self.page.execute(FRAME_SITE_KEY_SCRIPT, vec![]).await?;
        if let Some(site_key) = value.as_str().filter(|s| !s.is_empty()) {
            return Ok(Some(CaptchaChallenge {
                site_key: site_key.to_string(),
                page_url,
            }));
        }

        if saw_widget {
            return Err(EngineError::CaptchaUnresolved(
                "challenge widget present but its site key is unreadable".to_string(),
            ));
        }
        Ok(None)
    }

    async fn inject_token(&mut self, token: &str) -> Result<()> {
        let value = self
            .page
            .execute(TOKEN_INJECTION_SCRIPT, vec![json!(token)])
            .await?;
        if value.as_bool() != Some(true) {
            return Err(EngineError::CaptchaUnresolved(
                "no response field found to receive the token".to_string(),
            ));
        }
        Ok(())
    }

    async fn submit(&mut self) -> Result<()> {
        let button = self
            .page
            .wait_for(&self.config.selectors.submit_button, self.field_timeout())
            .await
            .map_err(|e| EngineError::PortalUnreachable(format!("submit control missing: {e}")))?;
        button.click().await?;
        self.settle(self.config.settle_delay_ms).await;
        Ok(())
    }

    async fn capture_snapshot(&mut self) -> Result<PageSnapshot> {
        let visible_text = self.page.visible_text().await?;
        let screenshot = self.page.screenshot_full_page().await?;
        Ok(PageSnapshot {
            visible_text,
            screenshot,
        })
    }

    async fn find_secondary_link(&mut self) -> Result<bool> {
        let clicked = match self.page.find(&self.config.selectors.extract_link).await? {
            Some(link) => {
                link.click().await?;
                true
            }
            None => self
                .page
                .execute(EXTRACT_CLICK_SCRIPT, vec![])
                .await?
                .as_bool()
                .unwrap_or(false),
        };
        if clicked {
            self.settle(self.config.extract_settle_delay_ms).await;
        }
        Ok(clicked)
    }
}

fn site_key_from_iframe_src(src: &str) -> Option<String> {
    let url = url::Url::parse(src).ok()?;
    url.query_pairs()
        .find(|(name, _)| name == "k")
        .map(|(_, value)| value.into_owned())
}

#[cfg(test)]
mod tests {
    use super::site_key_from_iframe_src;

    #[test]
    fn site_key_read_from_iframe_query() {
        let src =
            "https://www.google.com/recaptcha/api2/anchor?ar=1&k=6LdXhv4UAAAAAO3y&co=aHR0cHM";
        assert_eq!(
            site_key_from_iframe_src(src).as_deref(),
            Some("6LdXhv4UAAAAAO3y")
        );
    }

    #[test]
    fn keyless_or_invalid_src_yields_nothing() {
        assert_eq!(
            site_key_from_iframe_src("https://example.com/frame?x=1"),
            None
        );
        assert_eq!(site_key_from_iframe_src("not a url"), None);
    }
}
