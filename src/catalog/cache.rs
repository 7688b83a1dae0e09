//! Reconciles the local model catalog against the server's on-disk model listing.
//!
//! Matching is by name only. An on-disk entry may be reported as a bare name
//! (`bge-small-en-v1.5`), a full repository path (`BAAI/bge-small-en-v1.5`) or a cache
//! directory (`models--BAAI--bge-small-en-v1.5`). There is no content verification, so a
//! model stored under a name that shares nothing with its catalog id is reported as
//! missing.

use serde::{Deserialize, Serialize};

use super::models::LocalModel;

/// One entry of `GET /v1/models/cache`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedModel {
    pub name: String,
    #[serde(default)]
    pub size: u64,
}

#[derive(Debug, Deserialize)]
pub struct CachedModelList {
    #[serde(default)]
    pub data: Vec<CachedModel>,
}

/// A catalog model annotated with its download state. Rebuilt from inputs, never stored.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelVariant {
    pub id: String,
    pub label: String,
    pub dim: String,
    pub quality: String,
    pub download_size: String,
    pub repo_id: Option<String>,
    pub is_downloaded: bool,
    pub disk_size_bytes: Option<u64>,
}

/// Whether an on-disk entry name refers to the given catalog model.
pub fn matches(entry: &str, model: &LocalModel) -> bool {
    let entry = entry.to_lowercase();
    if entry == model.id.to_lowercase() {
        return true;
    }
    let Some(repo) = model.repo_id else {
        return false;
    };
    let repo = repo.to_lowercase();
    if entry == repo {
        return true;
    }
    let tail = repo.rsplit('/').next().unwrap_or(&repo);
    !tail.is_empty() && entry.contains(tail)
}

pub fn reconcile(catalog: &[LocalModel], listing: &[CachedModel]) -> Vec<ModelVariant> {
    catalog
        .iter()
        .map(|model| {
            let hit = listing.iter().find(|entry| matches(&entry.name, model));
            ModelVariant {
                id: model.id.to_string(),
                label: model.label.to_string(),
                dim: model.dim.to_string(),
                quality: model.quality.to_string(),
                download_size: model.download_size.to_string(),
                repo_id: model.repo_id.map(str::to_string),
                is_downloaded: hit.is_some(),
                disk_size_bytes: hit.map(|e| e.size),
            }
        })
        .collect()
}

/// Keeps the last reconciliation and recomputes only when the listing changes.
#[derive(Default)]
pub struct CacheInspector {
    last_listing: Option<Vec<CachedModel>>,
    variants: Vec<ModelVariant>,
}

impl CacheInspector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn variants(&mut self, catalog: &[LocalModel], listing: &[CachedModel]) -> &[ModelVariant] {
        if self.last_listing.as_deref() != Some(listing) || self.variants.len() != catalog.len() {
            self.variants = reconcile(catalog, listing);
            self.last_listing = Some(listing.to_vec());
        }
        &self.variants
    }

    pub fn is_downloaded(&mut self, catalog: &[LocalModel], listing: &[CachedModel], id: &str) -> bool {
        self.variants(catalog, listing)
            .iter()
            .any(|v| v.id == id && v.is_downloaded)
    }
}

/// Human-readable byte count for listings.
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}
