//! Cached reads with explicit invalidation after mutations.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use super::{DatabaseUpdate, ProjectApi, ProjectRef};
use crate::catalog::cache::CachedModel;
use crate::error::ApiError;
use crate::project::{Database, PreviewRequest, PreviewResponse, ProjectConfig};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum QueryKey {
    Project(ProjectRef),
    CachedModels,
}

#[derive(Debug, Clone)]
enum Cached {
    Project(ProjectConfig),
    Models(Vec<CachedModel>),
}

#[derive(Debug, Default)]
pub struct QueryCache {
    entries: Mutex<HashMap<QueryKey, Cached>>,
}

impl QueryCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn get(&self, key: &QueryKey) -> Option<Cached> {
        self.entries.lock().ok()?.get(key).cloned()
    }

    fn put(&self, key: QueryKey, value: Cached) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(key, value);
        }
    }

    pub fn invalidate(&self, key: &QueryKey) {
        if let Ok(mut entries) = self.entries.lock() {
            if entries.remove(key).is_some() {
                tracing::debug!("Invalidated {key:?}");
            }
        }
    }
}

/// One project's view of the API: every read goes through the cache, every
/// successful mutation invalidates the reads it affects.
#[derive(Clone)]
pub struct Session {
    pub api: Arc<dyn ProjectApi>,
    pub cache: Arc<QueryCache>,
    pub project: ProjectRef,
}

impl Session {
    pub fn new(api: Arc<dyn ProjectApi>, project: ProjectRef) -> Self {
        Self {
            api,
            cache: Arc::new(QueryCache::new()),
            project,
        }
    }

    pub async fn project_config(&self) -> Result<ProjectConfig, ApiError> {
        let key = QueryKey::Project(self.project.clone());
        if let Some(Cached::Project(cfg)) = self.cache.get(&key) {
            return Ok(cfg);
        }
        let cfg = self.api.get_project(&self.project).await?;
        self.cache.put(key, Cached::Project(cfg.clone()));
        Ok(cfg)
    }

    /// Drops the cached project read so the next read hits the server.
    pub fn invalidate_project(&self) {
        self.cache.invalidate(&QueryKey::Project(self.project.clone()));
    }

    pub async fn cached_models(&self, refresh: bool) -> Result<Vec<CachedModel>, ApiError> {
        if refresh {
            self.cache.invalidate(&QueryKey::CachedModels);
        } else if let Some(Cached::Models(models)) = self.cache.get(&QueryKey::CachedModels) {
            return Ok(models);
        }
        let models = self.api.cached_models().await?;
        self.cache.put(QueryKey::CachedModels, Cached::Models(models.clone()));
        Ok(models)
    }

    /// Applies one update against the cached project config.
    pub async fn update_database(&self, old_name: &str, update: &DatabaseUpdate) -> Result<ProjectConfig, ApiError> {
        let base = self.project_config().await?;
        let next = self
            .api
            .update_database(&self.project, old_name, update, &base)
            .await?;
        self.invalidate_project();
        tracing::info!("Updated database '{old_name}' in {}", self.project);
        Ok(next)
    }

    pub async fn create_database(&self, database: &Database) -> Result<Database, ApiError> {
        let created = self.api.create_database(&self.project, database).await?;
        self.invalidate_project();
        tracing::info!("Created database '{}' in {}", created.name, self.project);
        Ok(created)
    }

    pub async fn delete_database(&self, name: &str, reassign_to: Option<&str>) -> Result<(), ApiError> {
        self.api.delete_database(&self.project, name, reassign_to).await?;
        self.invalidate_project();
        match reassign_to {
            Some(target) => tracing::info!("Deleted database '{name}', datasets moved to '{target}'"),
            None => tracing::info!("Deleted database '{name}'"),
        }
        Ok(())
    }

    pub async fn preview(&self, database: &str, request: &PreviewRequest) -> Result<PreviewResponse, ApiError> {
        self.api.preview(&self.project, database, request).await
    }
}
