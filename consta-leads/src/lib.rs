//! Lead registry and intake helpers.
//!
//! Every certificate attempt is worth keeping: a person who asks about their
//! record is a potential client for appeal services whatever the outcome, so
//! failed and partial transactions feed the registry exactly like successful
//! ones. The registry deduplicates by CPF and keeps the full observation
//! history per person.
//!
//! - [`LeadRegistry`]: deduplicated store with JSON file persistence
//! - [`parse_document_text`]: best-effort extraction from OCR'd license text
//! - [`assess`]: follow-up risk assessment for a classified certificate

mod intake;
mod registry;
mod risk;

pub use intake::{is_valid_cpf, parse_document_text, ParsedDocument};
pub use registry::{
    HistoryEntry, LeadObservation, LeadRecord, LeadRegistry, LeadSource, LeadStats, SourceCounts,
};
pub use risk::{assess, RiskAssessment, RiskLevel};

use serde::Deserialize;
use std::path::PathBuf;

/// Where the registry keeps its JSON file.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LeadStoreConfig {
    /// Registry file, loaded at open and rewritten after every observation.
    /// `None` keeps the registry in memory only.
    pub path: Option<PathBuf>,
}

impl Default for LeadStoreConfig {
    fn default() -> Self {
        Self {
            path: Some(PathBuf::from("/tmp/leads_database.json")),
        }
    }
}
