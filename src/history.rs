//! Local prospect history with aggregate counters.
//!
//! Stored as a single JSON file wrapped in a SHA-256 envelope. A file whose
//! checksum does not match is rejected rather than silently reset.

use crate::errors::{AppError, ResultExt};
use crate::models::{AnalysisResult, DataSource, TextOrigin};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// On-disk wrapper: the serialized payload plus its checksum.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SealedPayload {
    data: String,
    checksum: String,
}

impl SealedPayload {
    fn seal(data: String) -> Self {
        let checksum = checksum(&data);
        Self { data, checksum }
    }

    fn open(self) -> Option<String> {
        if checksum(&self.data) == self.checksum {
            Some(self.data)
        } else {
            tracing::warn!(
                "History checksum mismatch. Expected: {}, data length: {}",
                self.checksum,
                self.data.len()
            );
            None
        }
    }
}

fn checksum(data: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data.as_bytes());
    hex::encode(hasher.finalize())
}

/// Summary of one analysis, kept after the full result is gone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: Uuid,
    pub tax_id: String,
    pub company_name: String,
    pub activity: String,
    pub business_type: String,
    pub top_products: Vec<String>,
    pub social_estimated: bool,
    pub ai_generated: bool,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoryStats {
    pub total_analyses: u64,
    pub by_business_type: BTreeMap<String, u64>,
    /// Social profiles seen per data source (LIVE / SCRAPED / ESTIMATED).
    pub by_data_source: BTreeMap<String, u64>,
    /// Analyses per `YYYY-MM`.
    pub by_month: BTreeMap<String, u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct HistoryData {
    entries: Vec<HistoryEntry>,
    stats: HistoryStats,
}

/// Entries kept when no explicit cap is configured.
pub const DEFAULT_MAX_ENTRIES: usize = 500;

pub struct HistoryStore {
    path: PathBuf,
    data: HistoryData,
    max_entries: usize,
}

impl HistoryStore {
    /// Loads the store at `path`. A missing file is an empty history.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, AppError> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            tracing::debug!("No history at {}, starting empty", path.display());
            return Ok(Self {
                path,
                data: HistoryData::default(),
                max_entries: DEFAULT_MAX_ENTRIES,
            });
        }

        let raw = std::fs::read_to_string(&path)
            .with_context(|| format!("reading {}", path.display()))?;
        let sealed: SealedPayload = serde_json::from_str(&raw)
            .map_err(|e| AppError::Storage(format!("histórico ilegível: {}", e)))?;
        let data = sealed.open().ok_or_else(|| {
            AppError::Storage(format!(
                "histórico corrompido ou alterado: {}",
                path.display()
            ))
        })?;
        let data: HistoryData = serde_json::from_str(&data)
            .map_err(|e| AppError::Storage(format!("histórico ilegível: {}", e)))?;

        Ok(Self {
            path,
            data,
            max_entries: DEFAULT_MAX_ENTRIES,
        })
    }

    /// Keeps only the newest `max` entries on the next write (at least one).
    pub fn with_max_entries(mut self, max: usize) -> Self {
        self.max_entries = max.max(1);
        self
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.data.entries
    }

    pub fn stats(&self) -> &HistoryStats {
        &self.data.stats
    }

    /// Appends one analysis, updates the counters and persists.
    pub fn record(&mut self, result: &AnalysisResult) -> Result<(), AppError> {
        let business_type = result.business_type.label().to_string();

        let mut top_products: Vec<String> = Vec::new();
        for s in &result.suggestions {
            if !top_products.contains(&s.product_code) {
                top_products.push(s.product_code.clone());
            }
        }
        top_products.truncate(5);

        let entry = HistoryEntry {
            id: result.id,
            tax_id: result.company.tax_id.clone(),
            company_name: result.company.display_name().to_string(),
            activity: result.company.main_activity.clone(),
            business_type: business_type.clone(),
            top_products,
            social_estimated: result.social.estimated,
            ai_generated: result.analysis.origin != TextOrigin::Template,
            timestamp: result.generated_at,
        };

        let stats = &mut self.data.stats;
        stats.total_analyses += 1;
        *stats.by_business_type.entry(business_type).or_default() += 1;
        *stats
            .by_month
            .entry(result.generated_at.format("%Y-%m").to_string())
            .or_default() += 1;
        for profile in [result.social.instagram.as_ref(), result.social.facebook.as_ref()]
            .into_iter()
            .flatten()
        {
            *stats
                .by_data_source
                .entry(source_key(profile.data_source).to_string())
                .or_default() += 1;
        }

        self.data.entries.push(entry);
        let overflow = self.data.entries.len().saturating_sub(self.max_entries);
        if overflow > 0 {
            self.data.entries.drain(..overflow);
            tracing::debug!("History trimmed: dropped {} oldest entr(ies)", overflow);
        }
        self.save()
    }

    fn save(&self) -> Result<(), AppError> {
        let data = serde_json::to_string(&self.data)?;
        let sealed = serde_json::to_string_pretty(&SealedPayload::seal(data))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, sealed).with_context(|| format!("writing {}", tmp.display()))?;
        std::fs::rename(&tmp, &self.path)
            .with_context(|| format!("replacing {}", self.path.display()))?;

        tracing::debug!(
            "History saved: {} entries at {}",
            self.data.entries.len(),
            self.path.display()
        );
        Ok(())
    }
}

fn source_key(source: DataSource) -> &'static str {
    match source {
        DataSource::Live => "LIVE",
        DataSource::Scraped => "SCRAPED",
        DataSource::Estimated => "ESTIMATED",
    }
}
