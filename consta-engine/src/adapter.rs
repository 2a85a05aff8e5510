//! The seam between the transaction sequence and the portal's DOM.

use async_trait::async_trait;
use consta_common::{PageSnapshot, Result};

/// A challenge widget located on the form, consumed once per attempt.
#[derive(Debug, Clone)]
pub struct CaptchaChallenge {
    pub site_key: String,
    /// URL the widget was embedded in; the solving service needs both.
    pub page_url: String,
}

/// Form inputs the engine fills, named by meaning rather than selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormField {
    NationalId,
    LicenseNumber,
    /// Present on some form revisions only; filling it is a no-op when the
    /// control does not exist.
    DocumentType,
}

/// Everything the transaction sequence needs from the portal.
///
/// Selector and layout drift is absorbed by implementations of this trait;
/// [`crate::TransactionEngine`] never sees a CSS selector.
#[async_trait]
pub trait PortalAdapter: Send {
    /// Bring the certificate form on screen.
    async fn locate_form(&mut self) -> Result<()>;

    /// Write one value into a named field.
    async fn fill_field(&mut self, field: FormField, value: &str) -> Result<()>;

    /// The embedded challenge, when the page carries one.
    async fn find_challenge(&mut self) -> Result<Option<CaptchaChallenge>>;

    /// Push a solved token into the page and fire its verification callback.
    async fn inject_token(&mut self, token: &str) -> Result<()>;

    /// Trigger the submit control and wait for the result page to settle.
    async fn submit(&mut self) -> Result<()>;

    /// Visible text plus a full-page screenshot of the current page.
    async fn capture_snapshot(&mut self) -> Result<PageSnapshot>;

    /// Follow the full-extract link when one is on the page. Returns `false`
    /// when no link could be clicked, the normal clean-record outcome.
    async fn find_secondary_link(&mut self) -> Result<bool>;
}
