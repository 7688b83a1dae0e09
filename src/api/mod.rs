//! Designer API surface consumed by the forms, the database modal and the downloader.

pub mod http;
pub mod query;

use async_trait::async_trait;
use futures_core::stream::BoxStream;
use std::fmt;

use crate::catalog::cache::CachedModel;
use crate::download::{DownloadEvent, DownloadRequest};
use crate::error::ApiError;
use crate::project::{
    Database, EmbeddingStrategy, PreviewRequest, PreviewResponse, ProjectConfig, RetrievalStrategy,
    StoreConfig, StoreType,
};

pub use http::HttpApi;
pub use query::{QueryCache, QueryKey, Session};

pub type DownloadStream = BoxStream<'static, Result<DownloadEvent, ApiError>>;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProjectRef {
    pub namespace: String,
    pub project: String,
}

impl ProjectRef {
    pub fn new(namespace: impl Into<String>, project: impl Into<String>) -> Self {
        Self { namespace: namespace.into(), project: project.into() }
    }
}

impl fmt::Display for ProjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.project)
    }
}

#[async_trait]
pub trait ProjectApi: Send + Sync {
    async fn get_project(&self, project: &ProjectRef) -> Result<ProjectConfig, ApiError>;

    /// Applies `update` to `base` and writes the whole resulting config.
    /// Last writer wins: no version is sent.
    async fn update_database(
        &self,
        project: &ProjectRef,
        old_name: &str,
        update: &DatabaseUpdate,
        base: &ProjectConfig,
    ) -> Result<ProjectConfig, ApiError>;

    async fn create_database(&self, project: &ProjectRef, database: &Database) -> Result<Database, ApiError>;

    async fn delete_database(
        &self,
        project: &ProjectRef,
        name: &str,
        reassign_to: Option<&str>,
    ) -> Result<(), ApiError>;

    async fn cached_models(&self) -> Result<Vec<CachedModel>, ApiError>;

    async fn download_model(&self, request: &DownloadRequest) -> Result<DownloadStream, ApiError>;

    async fn preview(
        &self,
        project: &ProjectRef,
        database: &str,
        request: &PreviewRequest,
    ) -> Result<PreviewResponse, ApiError>;
}

/// Fields to replace on one database. `None` leaves a field untouched; strategy lists
/// are replaced wholesale. `Some(None)` on a default clears it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DatabaseUpdate {
    pub name: Option<String>,
    pub store_type: Option<StoreType>,
    pub config: Option<StoreConfig>,
    pub default_embedding_strategy: Option<Option<String>>,
    pub default_retrieval_strategy: Option<Option<String>>,
    pub embedding_strategies: Option<Vec<EmbeddingStrategy>>,
    pub retrieval_strategies: Option<Vec<RetrievalStrategy>>,
}

/// Produces the next project config for an update. A rename also moves dataset
/// references to the new name.
pub fn apply_database_update(
    base: &ProjectConfig,
    old_name: &str,
    update: &DatabaseUpdate,
) -> Result<ProjectConfig, ApiError> {
    let mut next = base.clone();

    if let Some(new_name) = update.name.as_deref() {
        if new_name != old_name && next.database(new_name).is_some() {
            return Err(ApiError::Rejected(format!("Database '{new_name}' already exists")));
        }
    }

    let db = next
        .database_mut(old_name)
        .ok_or_else(|| ApiError::Rejected(format!("Database '{old_name}' not found")))?;

    if let Some(store_type) = &update.store_type {
        db.store_type = store_type.clone();
    }
    if let Some(config) = &update.config {
        db.config = config.clone();
    }
    if let Some(default) = &update.default_embedding_strategy {
        db.default_embedding_strategy = default.clone();
    }
    if let Some(default) = &update.default_retrieval_strategy {
        db.default_retrieval_strategy = default.clone();
    }
    if let Some(strategies) = &update.embedding_strategies {
        db.embedding_strategies = strategies.clone();
    }
    if let Some(strategies) = &update.retrieval_strategies {
        db.retrieval_strategies = strategies.clone();
    }

    if let Some(new_name) = update.name.as_deref().filter(|n| *n != old_name) {
        db.name = new_name.to_string();
        for dataset in &mut next.datasets {
            if dataset.database.as_deref() == Some(old_name) {
                dataset.database = Some(new_name.to_string());
            }
        }
    }

    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::EmbedderType;
    use serde_json::json;

    fn base() -> ProjectConfig {
        serde_json::from_value(json!({
            "rag": { "databases": [
                { "name": "main", "type": "ChromaStore",
                  "default_embedding_strategy": "a",
                  "embedding_strategies": [{ "name": "a", "type": "OllamaEmbedder", "config": {} }] },
                { "name": "archive", "type": "QdrantStore" }
            ]},
            "datasets": [{ "name": "docs", "database": "main" }],
            "runtime": { "provider": "ollama" }
        }))
        .unwrap()
    }

    #[test]
    fn test_replaces_only_given_fields() {
        let strategies = vec![EmbeddingStrategy {
            name: "b".into(),
            kind: EmbedderType::OpenAI,
            priority: 0,
            config: Default::default(),
            extra: Default::default(),
        }];
        let update = DatabaseUpdate {
            embedding_strategies: Some(strategies.clone()),
            ..Default::default()
        };
        let next = apply_database_update(&base(), "main", &update).unwrap();
        let db = next.database("main").unwrap();
        assert_eq!(db.embedding_strategies, strategies);
        assert_eq!(db.default_embedding_strategy.as_deref(), Some("a"));
        assert_eq!(next.extra["runtime"]["provider"], "ollama");
    }

    #[test]
    fn test_rename_moves_dataset_references() {
        let update = DatabaseUpdate { name: Some("primary".into()), ..Default::default() };
        let next = apply_database_update(&base(), "main", &update).unwrap();
        assert!(next.database("main").is_none());
        assert!(next.database("primary").is_some());
        assert_eq!(next.datasets[0].database.as_deref(), Some("primary"));
    }

    #[test]
    fn test_rename_onto_existing_rejected() {
        let update = DatabaseUpdate { name: Some("archive".into()), ..Default::default() };
        assert!(apply_database_update(&base(), "main", &update).is_err());
    }

    #[test]
    fn test_clear_default() {
        let update = DatabaseUpdate { default_embedding_strategy: Some(None), ..Default::default() };
        let next = apply_database_update(&base(), "main", &update).unwrap();
        assert_eq!(next.database("main").unwrap().default_embedding_strategy, None);
    }

    #[test]
    fn test_unknown_database() {
        assert!(apply_database_update(&base(), "nope", &DatabaseUpdate::default()).is_err());
    }
}
