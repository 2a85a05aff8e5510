//! Result-page gate between submission and classification.
//!
//! The portal answers a bad submission with an error page that still renders
//! inside the certificate layout. Classifying such a page would call a
//! rejected query clean, the one failure mode this system must never have,
//! so every result page passes through here first.

use consta_common::{EngineError, Result};

use crate::config::PortalPhrases;

/// Accept or refuse a result page before classification.
///
/// `normalized` must already be uppercase, accent-folded text (see
/// [`crate::normalize_text`]); the phrase lists are stored in that form.
/// Rejection phrases always win, whatever else the page says. A page with no
/// rejection phrase is accepted only when it carries certificate wording, or
/// echoes the queried CPF with enough surrounding substance to be a real
/// result rather than a form re-render.
pub fn validate_result_text(
    normalized: &str,
    phrases: &PortalPhrases,
    min_text_len: usize,
) -> Result<()> {
    if let Some(phrase) = phrases
        .rejection
        .iter()
        .find(|phrase| normalized.contains(phrase.as_str()))
    {
        return Err(EngineError::PortalRejected(format!(
            "result page matched rejection phrase \"{phrase}\""
        )));
    }

    let has_certificate_wording = phrases
        .presence
        .iter()
        .any(|phrase| normalized.contains(phrase.as_str()));
    // A bare CPF echo is what the empty form shows; it only counts as a
    // result when the page carries real substance around it.
    let echoes_id_with_substance =
        normalized.contains("CPF") && normalized.len() > min_text_len;

    if has_certificate_wording || echoes_id_with_substance {
        return Ok(());
    }

    Err(EngineError::PortalRejected(
        "result page carried no recognizable certificate content".to_string(),
    ))
}
