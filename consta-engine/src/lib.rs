//! Transaction engine: one certificate query from validated request to
//! classified PDF.
//!
//! The sequence is fixed. Locate the form (deep link first, human menu path
//! as fallback), fill the identifiers, resolve the challenge through the
//! solving service, submit, validate the result page against the phrase
//! dictionaries, optionally follow the full-extract link, classify, render.
//! Every step runs under a bounded timeout, so a transaction always
//! terminates with a result or a specific error.
//!
//! DOM coupling is confined to [`DetranPortal`] behind the [`PortalAdapter`]
//! trait; the sequence itself never sees a CSS selector. When the portal's
//! markup drifts, the adapter absorbs the change.

mod adapter;
mod classify;
mod config;
mod detran;
mod engine;
mod normalize;
mod retry;
mod validate;

pub use adapter::{CaptchaChallenge, FormField, PortalAdapter};
pub use classify::Classifier;
pub use config::{PortalConfig, PortalPhrases, PortalSelectors, RetryPolicy};
pub use detran::DetranPortal;
pub use engine::{TokenSolver, TransactionEngine};
pub use normalize::normalize_text;
pub use retry::with_policy;
pub use validate::validate_result_text;
