#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::json;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use ragstudio::api::{
    DatabaseUpdate, DownloadStream, ProjectApi, ProjectRef, Session, apply_database_update,
};
use ragstudio::catalog::cache::CachedModel;
use ragstudio::download::{DownloadEvent, DownloadRequest};
use ragstudio::error::ApiError;
use ragstudio::project::{Database, PreviewRequest, PreviewResponse, ProjectConfig};

/// In-memory designer server. Records every write so tests can assert on what was sent.
#[derive(Default)]
pub struct FakeApi {
    pub config: Mutex<ProjectConfig>,
    pub updates: Mutex<Vec<(String, DatabaseUpdate)>>,
    pub deletes: Mutex<Vec<(String, Option<String>)>>,
    pub cache: Mutex<Vec<CachedModel>>,
    /// One script per download call; each is replayed as the event stream.
    pub downloads: Mutex<VecDeque<Vec<Result<DownloadEvent, String>>>>,
    pub download_calls: AtomicUsize,
    /// Keeps download streams open after their scripted events.
    pub hold_downloads: AtomicBool,
    pub project_reads: AtomicUsize,
    pub fail_updates: Mutex<Option<String>>,
}

impl FakeApi {
    pub fn with_config(config: ProjectConfig) -> Arc<Self> {
        Arc::new(Self { config: Mutex::new(config), ..Default::default() })
    }

    pub fn session(self: &Arc<Self>) -> Session {
        Session::new(self.clone(), ProjectRef::new("default", "docs"))
    }

    pub fn current(&self) -> ProjectConfig {
        self.config.lock().unwrap().clone()
    }

    pub fn update_count(&self) -> usize {
        self.updates.lock().unwrap().len()
    }

    pub fn last_update(&self) -> Option<DatabaseUpdate> {
        self.updates.lock().unwrap().last().map(|(_, u)| u.clone())
    }

    pub fn script_download(&self, events: Vec<Result<DownloadEvent, String>>) {
        self.downloads.lock().unwrap().push_back(events);
    }
}

#[async_trait]
impl ProjectApi for FakeApi {
    async fn get_project(&self, _project: &ProjectRef) -> Result<ProjectConfig, ApiError> {
        self.project_reads.fetch_add(1, Ordering::SeqCst);
        Ok(self.current())
    }

    async fn update_database(
        &self,
        _project: &ProjectRef,
        old_name: &str,
        update: &DatabaseUpdate,
        base: &ProjectConfig,
    ) -> Result<ProjectConfig, ApiError> {
        if let Some(body) = self.fail_updates.lock().unwrap().clone() {
            return Err(ApiError::Status { status: 500, body });
        }
        let next = apply_database_update(base, old_name, update)?;
        self.updates.lock().unwrap().push((old_name.to_string(), update.clone()));
        *self.config.lock().unwrap() = next.clone();
        Ok(next)
    }

    async fn create_database(&self, _project: &ProjectRef, database: &Database) -> Result<Database, ApiError> {
        let mut config = self.config.lock().unwrap();
        let rag = config.rag.get_or_insert_with(Default::default);
        rag.databases.push(database.clone());
        Ok(database.clone())
    }

    async fn delete_database(
        &self,
        _project: &ProjectRef,
        name: &str,
        reassign_to: Option<&str>,
    ) -> Result<(), ApiError> {
        let mut config = self.config.lock().unwrap();
        if let Some(rag) = config.rag.as_mut() {
            rag.databases.retain(|d| d.name != name);
        }
        for dataset in &mut config.datasets {
            if dataset.database.as_deref() == Some(name) {
                dataset.database = reassign_to.map(str::to_string);
            }
        }
        self.deletes
            .lock()
            .unwrap()
            .push((name.to_string(), reassign_to.map(str::to_string)));
        Ok(())
    }

    async fn cached_models(&self) -> Result<Vec<CachedModel>, ApiError> {
        Ok(self.cache.lock().unwrap().clone())
    }

    async fn download_model(&self, request: &DownloadRequest) -> Result<DownloadStream, ApiError> {
        self.download_calls.fetch_add(1, Ordering::SeqCst);
        let script = self.downloads.lock().unwrap().pop_front().unwrap_or_default();
        if script.iter().any(|e| matches!(e, Ok(DownloadEvent::Done))) {
            self.cache.lock().unwrap().push(CachedModel { name: request.model_name.clone(), size: 1024 });
        }
        let events: Vec<Result<DownloadEvent, ApiError>> =
            script.into_iter().map(|e| e.map_err(ApiError::Stream)).collect();
        let hold = self.hold_downloads.load(Ordering::SeqCst);
        let stream = async_stream::stream! {
            for event in events {
                tokio::task::yield_now().await;
                yield event;
            }
            if hold {
                std::future::pending::<()>().await;
            }
        };
        Ok(Box::pin(stream))
    }

    async fn preview(
        &self,
        _project: &ProjectRef,
        _database: &str,
        request: &PreviewRequest,
    ) -> Result<PreviewResponse, ApiError> {
        Ok(serde_json::from_value(json!({
            "original_text": "alpha beta",
            "chunks": [{ "chunk_index": 0, "content": "alpha beta", "start_position": 0,
                         "end_position": 10, "char_count": 10, "word_count": 2 }],
            "filename": request.file_hash,
            "size_bytes": 10,
            "content_type": "text/plain",
            "parser_used": "TextParser",
            "chunk_strategy": "sentences",
            "chunk_size": 500,
            "chunk_overlap": 50,
            "total_chunks": 1,
            "avg_chunk_size": 10.0,
            "total_size_with_overlaps": 10,
            "avg_overlap_size": 0.0
        }))?)
    }
}

/// Two databases; "main" has two embedding strategies with "fast" as default and one
/// dataset bound to it.
pub fn sample_config() -> ProjectConfig {
    serde_json::from_value(json!({
        "rag": {
            "databases": [
                {
                    "name": "main",
                    "type": "ChromaStore",
                    "config": { "persist_directory": "./data/main", "collection_name": "main", "distance_function": "cosine" },
                    "default_embedding_strategy": "fast",
                    "default_retrieval_strategy": "basic",
                    "embedding_strategies": [
                        { "name": "fast", "type": "OllamaEmbedder", "priority": 0,
                          "config": { "model": "nomic-embed-text", "dimension": 768, "batch_size": 16, "timeout": 60 } },
                        { "name": "openai", "type": "OpenAIEmbedder", "priority": 1,
                          "config": { "model": "text-embedding-3-small", "dimension": 1536 } }
                    ],
                    "retrieval_strategies": [
                        { "name": "basic", "type": "BasicSimilarityStrategy", "default": true, "config": { "top_k": 5 } }
                    ]
                },
                {
                    "name": "archive",
                    "type": "QdrantStore",
                    "config": { "distance_function": "dot" }
                }
            ]
        },
        "datasets": [
            { "name": "handbook", "database": "main" },
            { "name": "faq", "database": "archive" }
        ],
        "runtime": { "provider": "ollama" }
    }))
    .unwrap()
}
