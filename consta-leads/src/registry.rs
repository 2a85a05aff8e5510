//! Deduplicated lead records with append-only observation history.

use crate::LeadStoreConfig;
use chrono::{DateTime, Utc};
use consta_common::{normalize_digits, EngineError, RecordStatus, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;

/// Which acquisition channel produced an observation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeadSource {
    #[default]
    Manual,
    Upload,
    Camera,
}

/// One partial sighting of a person. Only the id number is mandatory;
/// whatever else the channel happened to extract rides along.
#[derive(Debug, Clone)]
pub struct LeadObservation {
    pub national_id: String,
    pub license_number: Option<String>,
    pub name: Option<String>,
    pub source: LeadSource,
    pub status: Option<RecordStatus>,
    pub reason: Option<String>,
}

/// Appended to a lead's history on every observation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub at: DateTime<Utc>,
    pub source: LeadSource,
    pub status: RecordStatus,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub reason: Option<String>,
}

/// Accumulated knowledge about one person, merged across observations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeadRecord {
    pub national_id: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub license_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub name: Option<String>,
    /// Channel of the most recent observation.
    pub source: LeadSource,
    /// Status from the most recent observation that carried one.
    pub status: RecordStatus,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub reason: Option<String>,
    pub history: Vec<HistoryEntry>,
    pub first_seen_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
    pub total_observations: u64,
}

/// Registry totals, bucketed by outcome and acquisition channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeadStats {
    pub total: usize,
    pub with_restriction: usize,
    pub clean: usize,
    pub unknown: usize,
    pub by_source: SourceCounts,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SourceCounts {
    pub manual: usize,
    pub upload: usize,
    pub camera: usize,
}

/// Deduplicated lead store keyed by normalized CPF.
///
/// All mutation goes through [`LeadRegistry::observe`], which holds one lock
/// across the merge and the file rewrite. Concurrent observations of the same
/// person cannot interleave, and the file on disk always reflects a complete
/// registry state.
pub struct LeadRegistry {
    records: Mutex<HashMap<String, LeadRecord>>,
    path: Option<PathBuf>,
}

impl LeadRegistry {
    /// Registry without persistence.
    pub fn in_memory() -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
            path: None,
        }
    }

    /// Open a registry, loading any existing file at the configured path.
    ///
    /// A corrupt file is logged and skipped rather than propagated; losing
    /// the cache must never take the service down.
    pub async fn open(config: &LeadStoreConfig) -> Result<Self> {
        let mut records = HashMap::new();
        if let Some(path) = &config.path {
            match fs::read(path).await {
                Ok(bytes) => match serde_json::from_slice::<Vec<LeadRecord>>(&bytes) {
                    Ok(leads) => {
                        for lead in leads {
                            records.insert(lead.national_id.clone(), lead);
                        }
                        tracing::info!(
                            target: "leads.registry",
                            count = records.len(),
                            path = %path.display(),
                            "registry loaded"
                        );
                    }
                    Err(err) => {
                        tracing::warn!(
                            target: "leads.registry",
                            path = %path.display(),
                            error = %err,
                            "registry file unreadable, starting empty"
                        );
                    }
                },
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                Err(err) => {
                    return Err(EngineError::Internal(anyhow::anyhow!(
                        "failed to read lead registry {}: {err}",
                        path.display()
                    )));
                }
            }
        }
        Ok(Self {
            records: Mutex::new(records),
            path: config.path.clone(),
        })
    }

    /// Record one observation, merging it into the person's record.
    ///
    /// Supplied fields overwrite stored ones; absent fields never erase
    /// anything. The observation always lands in the history, and the merged
    /// record is persisted before this returns.
    pub async fn observe(&self, observation: LeadObservation) -> Result<LeadRecord> {
        let national_id = normalize_digits(&observation.national_id);
        if national_id.is_empty() {
            return Err(EngineError::InvalidInput(
                "lead observation carries no id digits".to_string(),
            ));
        }

        let now = Utc::now();
        let mut records = self.records.lock().await;
        let snapshot = {
            let record = records
                .entry(national_id.clone())
                .or_insert_with(|| LeadRecord {
                    national_id: national_id.clone(),
                    license_number: None,
                    name: None,
                    source: observation.source,
                    status: RecordStatus::Unknown,
                    reason: None,
                    history: Vec::new(),
                    first_seen_at: now,
                    last_seen_at: now,
                    total_observations: 0,
                });

            if let Some(license) = observation.license_number.as_deref() {
                let digits = normalize_digits(license);
                if !digits.is_empty() {
                    record.license_number = Some(digits);
                }
            }
            if let Some(name) = observation.name.as_deref() {
                let trimmed = name.trim();
                if !trimmed.is_empty() {
                    record.name = Some(trimmed.to_string());
                }
            }
            record.source = observation.source;
            if let Some(status) = observation.status {
                record.status = status;
            }
            if let Some(reason) = &observation.reason {
                record.reason = Some(reason.clone());
            }

            record.history.push(HistoryEntry {
                at: now,
                source: observation.source,
                status: observation.status.unwrap_or(RecordStatus::Unknown),
                reason: observation.reason.clone(),
            });
            record.last_seen_at = now;
            record.total_observations += 1;
            record.clone()
        };

        if let Some(path) = &self.path {
            persist(path, &records).await?;
        }

        tracing::info!(
            target: "leads.registry",
            national_id = %snapshot.national_id,
            source = ?snapshot.source,
            status = ?snapshot.status,
            total = snapshot.total_observations,
            "lead observed"
        );
        Ok(snapshot)
    }

    /// Look one person up by CPF (separators accepted).
    pub async fn get(&self, national_id: &str) -> Option<LeadRecord> {
        let key = normalize_digits(national_id);
        self.records.lock().await.get(&key).cloned()
    }

    /// Every record, most recently seen first.
    pub async fn list(&self) -> Vec<LeadRecord> {
        let records = self.records.lock().await;
        let mut leads: Vec<LeadRecord> = records.values().cloned().collect();
        leads.sort_by(|a, b| b.last_seen_at.cmp(&a.last_seen_at));
        leads
    }

    /// Aggregate counts over the whole registry.
    pub async fn stats(&self) -> LeadStats {
        let records = self.records.lock().await;
        let mut stats = LeadStats {
            total: records.len(),
            with_restriction: 0,
            clean: 0,
            unknown: 0,
            by_source: SourceCounts::default(),
        };
        for record in records.values() {
            match record.status {
                RecordStatus::Clean => stats.clean += 1,
                RecordStatus::Unknown => stats.unknown += 1,
                RecordStatus::HasFines
                | RecordStatus::SuspensionRisk
                | RecordStatus::RevocationRisk => stats.with_restriction += 1,
            }
            match record.source {
                LeadSource::Manual => stats.by_source.manual += 1,
                LeadSource::Upload => stats.by_source.upload += 1,
                LeadSource::Camera => stats.by_source.camera += 1,
            }
        }
        stats
    }
}

/// Rewrite the registry file. Writes a sibling tmp file and renames it over
/// the target, so a crash mid-write leaves the previous file intact.
async fn persist(path: &Path, records: &HashMap<String, LeadRecord>) -> Result<()> {
    let write_failed = |err: std::io::Error| {
        EngineError::Internal(anyhow::anyhow!(
            "lead registry write failed at {}: {err}",
            path.display()
        ))
    };

    let mut leads: Vec<&LeadRecord> = records.values().collect();
    leads.sort_by(|a, b| a.national_id.cmp(&b.national_id));
    let json = serde_json::to_vec_pretty(&leads).map_err(|e| {
        EngineError::Internal(anyhow::anyhow!("lead registry serialization failed: {e}"))
    })?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).await.map_err(write_failed)?;
        }
    }
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, &json).await.map_err(write_failed)?;
    fs::rename(&tmp, path).await.map_err(write_failed)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use std::time::Duration;

    fn observation(id: &str) -> LeadObservation {
        LeadObservation {
            national_id: id.to_string(),
            license_number: None,
            name: None,
            source: LeadSource::Manual,
            status: None,
            reason: None,
        }
    }

    #[tokio::test]
    async fn repeat_observation_merges_instead_of_duplicating() {
        let registry = LeadRegistry::in_memory();

        registry
            .observe(LeadObservation {
                name: Some("MARIA DA SILVA".into()),
                ..observation("529.982.247-25")
            })
            .await
            .unwrap();
        let merged = registry
            .observe(LeadObservation {
                name: Some("MARIA D SILVA".into()),
                status: Some(RecordStatus::Clean),
                ..observation("52998224725")
            })
            .await
            .unwrap();

        assert_eq!(merged.name.as_deref(), Some("MARIA D SILVA"));
        assert_eq!(merged.status, RecordStatus::Clean);
        assert_eq!(merged.history.len(), 2);
        assert_eq!(merged.total_observations, 2);
        assert_eq!(registry.list().await.len(), 1);
    }

    #[tokio::test]
    async fn absent_fields_never_erase_known_ones() {
        let registry = LeadRegistry::in_memory();
        registry
            .observe(LeadObservation {
                license_number: Some("987.654.321-00".into()),
                name: Some("JOAO PEDRO ALMEIDA".into()),
                ..observation("52998224725")
            })
            .await
            .unwrap();

        let merged = registry.observe(observation("52998224725")).await.unwrap();

        assert_eq!(merged.license_number.as_deref(), Some("98765432100"));
        assert_eq!(merged.name.as_deref(), Some("JOAO PEDRO ALMEIDA"));
    }

    #[tokio::test]
    async fn blank_id_is_rejected() {
        let registry = LeadRegistry::in_memory();
        let err = registry.observe(observation("  --- ")).await.unwrap_err();
        assert!(matches!(err, EngineError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn listing_orders_by_recency() {
        let registry = LeadRegistry::in_memory();
        registry.observe(observation("11111111111")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        registry.observe(observation("22222222222")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        registry.observe(observation("11111111111")).await.unwrap();

        let leads = registry.list().await;
        assert_eq!(leads.len(), 2);
        assert_eq!(leads[0].national_id, "11111111111");
        assert_eq!(leads[1].national_id, "22222222222");
    }

    #[tokio::test]
    async fn stats_bucket_statuses_and_sources() {
        let registry = LeadRegistry::in_memory();
        registry
            .observe(LeadObservation {
                status: Some(RecordStatus::Clean),
                ..observation("11111111111")
            })
            .await
            .unwrap();
        registry
            .observe(LeadObservation {
                status: Some(RecordStatus::SuspensionRisk),
                source: LeadSource::Upload,
                ..observation("22222222222")
            })
            .await
            .unwrap();
        registry
            .observe(LeadObservation {
                source: LeadSource::Camera,
                ..observation("33333333333")
            })
            .await
            .unwrap();

        let stats = registry.stats().await;
        assert_eq!(stats.total, 3);
        assert_eq!(stats.clean, 1);
        assert_eq!(stats.with_restriction, 1);
        assert_eq!(stats.unknown, 1);
        assert_eq!(
            stats.by_source,
            SourceCounts {
                manual: 1,
                upload: 1,
                camera: 1
            }
        );
    }

    #[tokio::test]
    async fn registry_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let config = LeadStoreConfig {
            path: Some(dir.path().join("leads.json")),
        };

        {
            let registry = LeadRegistry::open(&config).await.unwrap();
            registry
                .observe(LeadObservation {
                    name: Some("ANA BEATRIZ COSTA".into()),
                    status: Some(RecordStatus::HasFines),
                    ..observation("52998224725")
                })
                .await
                .unwrap();
        }

        let reopened = LeadRegistry::open(&config).await.unwrap();
        let record = reopened.get("529.982.247-25").await.unwrap();
        assert_eq!(record.name.as_deref(), Some("ANA BEATRIZ COSTA"));
        assert_eq!(record.status, RecordStatus::HasFines);
        assert_eq!(record.total_observations, 1);
    }

    #[tokio::test]
    async fn corrupt_registry_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("leads.json");
        std::fs::write(&path, b"{ not json").unwrap();

        let registry = LeadRegistry::open(&LeadStoreConfig { path: Some(path) })
            .await
            .unwrap();
        assert!(registry.list().await.is_empty());
    }

    #[tokio::test]
    async fn concurrent_observations_all_land() {
        let registry = Arc::new(LeadRegistry::in_memory());
        let mut handles = Vec::new();
        for _ in 0..16 {
            let registry = Arc::clone(&registry);
            handles.push(tokio::spawn(async move {
                registry.observe(observation("52998224725")).await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let record = registry.get("52998224725").await.unwrap();
        assert_eq!(record.total_observations, 16);
        assert_eq!(record.history.len(), 16);
    }
}
