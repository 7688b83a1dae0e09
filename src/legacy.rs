//! Legacy strategy settings saved on this machine before the server config held them.
//!
//! Only consulted when the server has no value for a field. Entries are dropped once
//! the strategy has been saved to the server.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegacyStrategy {
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default)]
    pub config: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saved_at: Option<chrono::DateTime<chrono::Utc>>,
}

pub trait LegacyStore: Send + Sync {
    fn strategy(&self, database: &str, strategy: &str) -> Option<LegacyStrategy>;

    fn forget(&self, database: &str, strategy: &str) -> Result<()>;
}

/// For deployments where the server config is the only source of truth.
pub struct NoLegacyStore;

impl LegacyStore for NoLegacyStore {
    fn strategy(&self, _database: &str, _strategy: &str) -> Option<LegacyStrategy> {
        None
    }

    fn forget(&self, _database: &str, _strategy: &str) -> Result<()> {
        Ok(())
    }
}

type Records = BTreeMap<String, BTreeMap<String, LegacyStrategy>>;

/// JSON file of `{ database: { strategy: record } }`.
pub struct FileLegacyStore {
    path: PathBuf,
    records: Mutex<Records>,
}

impl FileLegacyStore {
    pub fn open(path: &Path) -> Result<Self> {
        let records = if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read legacy settings at {}", path.display()))?;
            serde_json::from_str(&contents).context("Failed to parse legacy settings")?
        } else {
            Records::new()
        };
        Ok(Self {
            path: path.to_path_buf(),
            records: Mutex::new(records),
        })
    }

    fn write(&self, records: &Records) -> Result<()> {
        let contents = serde_json::to_string_pretty(records)?;
        std::fs::write(&self.path, contents)
            .with_context(|| format!("Failed to write legacy settings at {}", self.path.display()))
    }
}

impl LegacyStore for FileLegacyStore {
    fn strategy(&self, database: &str, strategy: &str) -> Option<LegacyStrategy> {
        let records = self.records.lock().unwrap_or_else(|p| p.into_inner());
        records.get(database)?.get(strategy).cloned()
    }

    fn forget(&self, database: &str, strategy: &str) -> Result<()> {
        let mut records = self.records.lock().unwrap_or_else(|p| p.into_inner());
        let Some(strategies) = records.get_mut(database) else {
            return Ok(());
        };
        if strategies.remove(strategy).is_none() {
            return Ok(());
        }
        if strategies.is_empty() {
            records.remove(database);
        }
        tracing::debug!("Dropped legacy settings for {database}/{strategy}");
        self.write(&records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_read_then_forget() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("legacy.json");
        let records = json!({ "main": { "fast": { "config": { "batch_size": 32 } } } });
        std::fs::write(&path, records.to_string()).unwrap();

        let reopened = FileLegacyStore::open(&path).unwrap();
        let record = reopened.strategy("main", "fast").unwrap();
        assert_eq!(record.config["batch_size"], 32);
        assert!(reopened.strategy("main", "slow").is_none());

        reopened.forget("main", "fast").unwrap();
        let again = FileLegacyStore::open(&path).unwrap();
        assert!(again.strategy("main", "fast").is_none());
    }

    #[test]
    fn test_no_store() {
        assert!(NoLegacyStore.strategy("a", "b").is_none());
        assert!(NoLegacyStore.forget("a", "b").is_ok());
    }
}
