//! Common types shared across the nada-consta crates.
//!
//! This crate defines the domain model for one certificate transaction
//! (request, snapshots, classification, result), the shared error taxonomy,
//! and observability helpers. It is intentionally lightweight so that every
//! other crate can depend on it without heavy transitive costs.
//!
//! # Overview
//!
//! - [`TransactionRequest`]: validated CPF + CNH pair
//! - [`Classification`] and [`RecordStatus`]: the classified outcome
//! - [`PageSnapshot`] and [`TransactionResult`]: captured portal output
//! - [`observability`]: centralised tracing/logging initialisation
//! - [`EngineError`] and [`Result`]: shared error handling
//!
//! # Examples
//!
//! Building a request from formatted user input:
//!
//! ```rust
//! use consta_common::TransactionRequest;
//!
//! let req = TransactionRequest::new("123.456.789-01", "12345678900").unwrap();
//! assert_eq!(req.national_id(), "12345678901");
//! ```
use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod observability;

/// Strip everything that is not an ASCII digit.
///
/// Both identifiers accepted by the portal are digit strings that users
/// habitually type with separators (`123.456.789-01`).
pub fn normalize_digits(raw: &str) -> String {
    raw.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// A validated query for one driver's clean-record certificate.
///
/// Construction normalizes both identifiers to bare digits and rejects
/// malformed values, so a request that exists is safe to submit. No network
/// activity happens before this validation.
#[derive(Debug, Clone, Serialize)]
pub struct TransactionRequest {
    national_id: String,
    license_number: String,
}

impl TransactionRequest {
    /// Validate and normalize a CPF (11 digits) and CNH (9–12 digits) pair.
    ///
    /// ```rust
    /// use consta_common::TransactionRequest;
    ///
    /// assert!(TransactionRequest::new("12345678901", "123456789").is_ok());
    /// assert!(TransactionRequest::new("123", "123456789").is_err());
    /// ```
    pub fn new(national_id: &str, license_number: &str) -> Result<Self> {
        let national_id = normalize_digits(national_id);
        let license_number = normalize_digits(license_number);

        if national_id.len() != 11 {
            return Err(EngineError::InvalidInput(format!(
                "CPF must have exactly 11 digits, got {}",
                national_id.len()
            )));
        }
        if license_number.len() < 9 || license_number.len() > 12 {
            return Err(EngineError::InvalidInput(format!(
                "CNH must have 9 to 12 digits, got {}",
                license_number.len()
            )));
        }

        Ok(Self {
            national_id,
            license_number,
        })
    }

    /// The normalized 11-digit CPF.
    pub fn national_id(&self) -> &str {
        &self.national_id
    }

    /// The normalized 9–12 digit CNH.
    pub fn license_number(&self) -> &str {
        &self.license_number
    }
}

/// Outcome category for one certificate query, ordered from clean to
/// revocation, with [`RecordStatus::Unknown`] sorting after everything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecordStatus {
    /// Nothing on record.
    Clean,
    /// Infractions/fines present, no suspension or revocation process.
    HasFines,
    /// At least one suspension penalty reported.
    SuspensionRisk,
    /// At least one license-revocation penalty reported.
    RevocationRisk,
    /// The page could not be classified.
    Unknown,
}

/// Condition tags detected on the result page, independent of the final
/// status. Severity implication holds: a revocation implies suspension and
/// fines tags as well.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionFlag {
    Fines,
    Suspension,
    Revocation,
}

/// Classified outcome of one transaction. Immutable once produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Classification {
    pub status: RecordStatus,
    /// Human-readable explanation of why this status was chosen.
    pub reason: String,
    /// Driver name, when the certificate text yields one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub person_name: Option<String>,
    /// Certificate number, when present on the page.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_number: Option<String>,
    pub flags: BTreeSet<ConditionFlag>,
}

impl Classification {
    /// An `UNKNOWN` classification carrying the given reason.
    pub fn unknown(reason: impl Into<String>) -> Self {
        Self {
            status: RecordStatus::Unknown,
            reason: reason.into(),
            person_name: None,
            document_number: None,
            flags: BTreeSet::new(),
        }
    }
}

/// One captured portal page: its visible text plus a full-page PNG.
///
/// Snapshots only live for the duration of a single transaction; they are
/// consumed by the classifier and the renderer and then dropped.
#[derive(Clone)]
pub struct PageSnapshot {
    pub visible_text: String,
    pub screenshot: Vec<u8>,
}

impl std::fmt::Debug for PageSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageSnapshot")
            .field("visible_text_len", &self.visible_text.len())
            .field("screenshot_len", &self.screenshot.len())
            .finish()
    }
}

/// Final product of a successful transaction, owned by the caller.
#[derive(Debug, Clone)]
pub struct TransactionResult {
    /// Short-lived identifier for the rendered artifact.
    pub case_id: Uuid,
    /// Multi-page PDF, one page per captured snapshot.
    pub document: Vec<u8>,
    pub classification: Classification,
}

/// Error taxonomy shared across the nada-consta system.
///
/// The first six variants are the transaction-visible taxonomy; `Config` and
/// `Internal` cover the ambient plumbing around it.
#[derive(thiserror::Error, Debug)]
pub enum EngineError {
    /// The caller supplied malformed identifiers. Fix the data and retry.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The target form could not be reached, even via the fallback path.
    #[error("portal unreachable: {0}")]
    PortalUnreachable(String),

    /// The challenge could not be resolved in time for submission.
    #[error("captcha unresolved: {0}")]
    CaptchaUnresolved(String),

    /// The solving service reported the job itself as invalid.
    #[error("solver rejected the job: {0}")]
    SolverRejected(String),

    /// The solving service produced no result within the polling ceiling.
    #[error("solver timed out after {0}s")]
    SolverTimeout(u64),

    /// The portal reports the submitted data as invalid. This is a valid
    /// negative outcome, not a system failure; it must never be converted
    /// into a clean result or retried automatically.
    #[error("portal rejected the submitted data: {0}")]
    PortalRejected(String),

    /// Nothing was captured to render. Indicates a logic bug upstream.
    #[error("no content to render")]
    NoContent,

    /// Configuration was incomplete or invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// An infrastructure dependency (browser, network) failed unexpectedly.
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl EngineError {
    /// Whether a later identical attempt could plausibly succeed.
    ///
    /// `PortalRejected` is deliberately non-retryable: the portal judged the
    /// data itself, and hammering it with the same identifiers cannot change
    /// the answer.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            EngineError::PortalUnreachable(_)
                | EngineError::CaptchaUnresolved(_)
                | EngineError::SolverTimeout(_)
        )
    }
}

/// Convenient alias for results that use [`EngineError`].
pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_normalizes_formatted_input() {
        let req = TransactionRequest::new("123.456.789-01", "12 345 678 900").unwrap();
        assert_eq!(req.national_id(), "12345678901");
        assert_eq!(req.license_number(), "12345678900");
    }

    #[test]
    fn request_rejects_short_cpf() {
        let err = TransactionRequest::new("1234567890", "123456789").unwrap_err();
        assert!(matches!(err, EngineError::InvalidInput(_)));
    }

    #[test]
    fn request_rejects_out_of_range_cnh() {
        assert!(TransactionRequest::new("12345678901", "12345678").is_err());
        assert!(TransactionRequest::new("12345678901", "1234567890123").is_err());
    }

    #[test]
    fn rejection_is_not_retryable() {
        assert!(!EngineError::PortalRejected("dados nao conferem".into()).is_retryable());
        assert!(!EngineError::InvalidInput("bad cpf".into()).is_retryable());
        assert!(EngineError::PortalUnreachable("timeout".into()).is_retryable());
        assert!(EngineError::SolverTimeout(120).is_retryable());
    }

    #[test]
    fn status_serializes_screaming_snake() {
        let json = serde_json::to_string(&RecordStatus::SuspensionRisk).unwrap();
        assert_eq!(json, "\"SUSPENSION_RISK\"");
    }
}
