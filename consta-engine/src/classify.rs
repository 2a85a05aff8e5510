//! Certificate text classification.
//!
//! Works on normalized text only (uppercase, accents folded, whitespace
//! collapsed), matching the phrase and pattern configuration in
//! [`PortalPhrases`]. Counted penalties are checked before any heuristic:
//! a clean extract page still carries the fines section headers, so header
//! presence alone is never treated as a restriction.

use std::collections::BTreeSet;

use consta_common::{Classification, ConditionFlag, EngineError, RecordStatus, Result};
use regex::Regex;

use crate::config::PortalPhrases;
use crate::normalize::normalize_text;

/// Name in the current certificate layout, between the certification
/// sentence and the CPF reference.
const NAME_AFTER_CERTIFICATION: &str = r"CERTIFICAMOS QUE[^:]*:\s*([A-Z][A-Z ]{5,}?),\s*VINCULADO";

/// Name in the older layout, printed after the CPF digits.
const NAME_AFTER_CPF: &str = r"(?m)VINCULADO AO CPF[^:]*:\s*\d+[^A-Z]*([A-Z][A-Z ]{5,}?)(?:\.|,|$)";

/// Certificate number as printed in the page header, e.g. `Nº: 2024.123456`
/// (the ordinal sign folds to `O` during normalization).
const CERTIFICATE_NUMBER: &str = r"NO?\s*:\s*(\d{4}\.\d+)";

/// Classifies certificate text into a [`RecordStatus`] with condition flags.
///
/// Compiled once per engine; [`Classifier::classify`] is total and never
/// fails, falling back to [`RecordStatus::Unknown`] when nothing matches.
pub struct Classifier {
    phrases: PortalPhrases,
    revocation_count: Regex,
    suspension_count: Regex,
    fines_count: Regex,
    name_patterns: Vec<Regex>,
    certificate_number: Regex,
}

impl Classifier {
    pub fn new(phrases: &PortalPhrases) -> Result<Self> {
        fn compile(pattern: &str, what: &str) -> Result<Regex> {
            Regex::new(pattern)
                .map_err(|e| EngineError::Config(format!("invalid {what} pattern `{pattern}`: {e}")))
        }

        Ok(Self {
            phrases: phrases.clone(),
            revocation_count: compile(&phrases.revocation_count, "revocation count")?,
            suspension_count: compile(&phrases.suspension_count, "suspension count")?,
            fines_count: compile(&phrases.fines_count, "fines count")?,
            name_patterns: vec![
                compile(NAME_AFTER_CERTIFICATION, "name")?,
                compile(NAME_AFTER_CPF, "name")?,
            ],
            certificate_number: compile(CERTIFICATE_NUMBER, "certificate number")?,
        })
    }

    /// Classify one result page's text.
    ///
    /// Check order: counted revocation penalties, counted suspension
    /// penalties, the portal's explicit no-record statement, the fines
    /// heuristic, then a low-confidence clean for anything that still reads
    /// like a certificate. A counted penalty is definitive; everything after
    /// it is wording-dependent.
    pub fn classify(&self, text: &str) -> Classification {
        let normalized = normalize_text(text);
        if normalized.is_empty() {
            return Classification::unknown("texto da certidao vazio");
        }

        let person_name = self.extract_name(&normalized);
        let document_number = self
            .certificate_number
            .captures(&normalized)
            .and_then(|captures| captures.get(1))
            .map(|m| m.as_str().to_string());

        let classified = |status: RecordStatus, reason: String, flags: &[ConditionFlag]| {
            Classification {
                status,
                reason,
                person_name: person_name.clone(),
                document_number: document_number.clone(),
                flags: flags.iter().copied().collect::<BTreeSet<_>>(),
            }
        };

        if let Some(count) = positive_count(&self.revocation_count, &normalized) {
            return classified(
                RecordStatus::RevocationRisk,
                format!("Condutor possui {count} penalidade(s) de cassacao."),
                &[
                    ConditionFlag::Fines,
                    ConditionFlag::Suspension,
                    ConditionFlag::Revocation,
                ],
            );
        }

        if let Some(count) = positive_count(&self.suspension_count, &normalized) {
            return classified(
                RecordStatus::SuspensionRisk,
                format!("Condutor possui {count} penalidade(s) de suspensao."),
                &[ConditionFlag::Fines, ConditionFlag::Suspension],
            );
        }

        if normalized.contains(&self.phrases.no_record) {
            return classified(
                RecordStatus::Clean,
                "Nada consta. Nenhuma ocorrencia registrada no prontuario.".to_string(),
                &[],
            );
        }

        // Fines need both signals: the no-suspension statement plus an
        // actual fines marker or a positive fine count. Section headers
        // alone appear on clean extracts too.
        let no_suspension = self
            .phrases
            .no_suspension
            .iter()
            .any(|phrase| normalized.contains(phrase.as_str()));
        let fines_signal = self
            .phrases
            .fines_markers
            .iter()
            .any(|marker| normalized.contains(marker.as_str()))
            || positive_count(&self.fines_count, &normalized).is_some();
        if no_suspension && fines_signal {
            return classified(
                RecordStatus::HasFines,
                "Multas registradas no prontuario, sem processo de suspensao.".to_string(),
                &[ConditionFlag::Fines],
            );
        }

        if self
            .phrases
            .generic_certificate
            .iter()
            .any(|phrase| normalized.contains(phrase.as_str()))
        {
            tracing::warn!(
                target: "engine.classify",
                "certificate text matched no known scenario, low-confidence clean"
            );
            return classified(
                RecordStatus::Clean,
                "Certidao emitida sem restricoes identificadas.".to_string(),
                &[],
            );
        }

        Classification::unknown("Nao foi possivel classificar o texto da certidao.")
    }

    fn extract_name(&self, normalized: &str) -> Option<String> {
        self.name_patterns.iter().find_map(|pattern| {
            pattern
                .captures(normalized)
                .and_then(|captures| captures.get(1))
                .map(|m| m.as_str().trim().to_string())
        })
    }
}

/// Parse the first capture group as a count; zero means no penalty.
fn positive_count(pattern: &Regex, text: &str) -> Option<u64> {
    let count: u64 = pattern.captures(text)?.get(1)?.as_str().parse().ok()?;
    (count > 0).then_some(count)
}
