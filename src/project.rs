//! Project configuration as served by the designer API.
//!
//! Only the parts of the config this client edits are typed. Everything else is kept
//! in `extra` maps so that writing a full config back never drops server fields.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// `GET /v1/projects/{namespace}/{project}` response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectEnvelope {
    pub project: Project,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    #[serde(default)]
    pub config: ProjectConfig,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rag: Option<RagConfig>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub datasets: Vec<Dataset>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RagConfig {
    #[serde(default)]
    pub databases: Vec<Database>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ProjectConfig {
    pub fn databases(&self) -> &[Database] {
        self.rag.as_ref().map(|r| r.databases.as_slice()).unwrap_or(&[])
    }

    pub fn database(&self, name: &str) -> Option<&Database> {
        self.databases().iter().find(|d| d.name == name)
    }

    pub fn database_mut(&mut self, name: &str) -> Option<&mut Database> {
        self.rag.as_mut()?.databases.iter_mut().find(|d| d.name == name)
    }

    /// Datasets whose `database` field points at `name`.
    pub fn datasets_using(&self, name: &str) -> Vec<&Dataset> {
        self.datasets
            .iter()
            .filter(|d| d.database.as_deref() == Some(name))
            .collect()
    }
}

// ── Databases ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Database {
    pub name: String,
    #[serde(rename = "type")]
    pub store_type: StoreType,
    #[serde(default)]
    pub config: StoreConfig,
    #[serde(
        default,
        deserialize_with = "empty_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub default_embedding_strategy: Option<String>,
    #[serde(
        default,
        deserialize_with = "empty_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub default_retrieval_strategy: Option<String>,
    #[serde(default)]
    pub embedding_strategies: Vec<EmbeddingStrategy>,
    #[serde(default)]
    pub retrieval_strategies: Vec<RetrievalStrategy>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Database {
    pub fn embedding_strategy(&self, name: &str) -> Option<&EmbeddingStrategy> {
        self.embedding_strategies.iter().find(|s| s.name == name)
    }

    pub fn retrieval_strategy(&self, name: &str) -> Option<&RetrievalStrategy> {
        self.retrieval_strategies.iter().find(|s| s.name == name)
    }

    pub fn is_default_embedding(&self, name: &str) -> bool {
        self.default_embedding_strategy.as_deref() == Some(name)
    }

    pub fn is_default_retrieval(&self, name: &str) -> bool {
        self.default_retrieval_strategy.as_deref() == Some(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum StoreType {
    Chroma,
    Qdrant,
    Other(String),
}

impl StoreType {
    pub fn as_str(&self) -> &str {
        match self {
            StoreType::Chroma => "ChromaStore",
            StoreType::Qdrant => "QdrantStore",
            StoreType::Other(s) => s,
        }
    }
}

impl From<String> for StoreType {
    fn from(s: String) -> Self {
        match s.as_str() {
            "ChromaStore" => StoreType::Chroma,
            "QdrantStore" => StoreType::Qdrant,
            _ => StoreType::Other(s),
        }
    }
}

impl From<StoreType> for String {
    fn from(t: StoreType) -> Self {
        t.as_str().to_string()
    }
}

impl FromStr for StoreType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "chroma" | "chromastore" => Ok(StoreType::Chroma),
            "qdrant" | "qdrantstore" => Ok(StoreType::Qdrant),
            _ => Err(format!("Unknown store type '{s}'. Use 'chroma' or 'qdrant'")),
        }
    }
}

impl fmt::Display for StoreType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persist_directory: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance_function: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection_name: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// ── Strategies ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingStrategy {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: EmbedderType,
    #[serde(default)]
    pub priority: i64,
    #[serde(default)]
    pub config: Map<String, Value>,
    /// Server fields this client does not model, such as `description`.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Server-side embedder adapter a strategy is interpreted by.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EmbedderType {
    Ollama,
    OpenAI,
    AzureOpenAI,
    VertexAI,
    Bedrock,
    Cohere,
    Universal,
    Other(String),
}

impl EmbedderType {
    pub fn as_str(&self) -> &str {
        match self {
            EmbedderType::Ollama => "OllamaEmbedder",
            EmbedderType::OpenAI => "OpenAIEmbedder",
            EmbedderType::AzureOpenAI => "AzureOpenAIEmbedder",
            EmbedderType::VertexAI => "VertexAIEmbedder",
            EmbedderType::Bedrock => "BedrockEmbedder",
            EmbedderType::Cohere => "CohereEmbedder",
            EmbedderType::Universal => "UniversalEmbedder",
            EmbedderType::Other(s) => s,
        }
    }
}

impl From<String> for EmbedderType {
    fn from(s: String) -> Self {
        match s.as_str() {
            "OllamaEmbedder" => EmbedderType::Ollama,
            "OpenAIEmbedder" => EmbedderType::OpenAI,
            "AzureOpenAIEmbedder" => EmbedderType::AzureOpenAI,
            "VertexAIEmbedder" => EmbedderType::VertexAI,
            "BedrockEmbedder" => EmbedderType::Bedrock,
            "CohereEmbedder" => EmbedderType::Cohere,
            "UniversalEmbedder" => EmbedderType::Universal,
            _ => EmbedderType::Other(s),
        }
    }
}

impl From<EmbedderType> for String {
    fn from(t: EmbedderType) -> Self {
        t.as_str().to_string()
    }
}

impl fmt::Display for EmbedderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalStrategy {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: RetrievalType,
    #[serde(default)]
    pub default: bool,
    #[serde(default)]
    pub config: Map<String, Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RetrievalType {
    BasicSimilarity,
    MetadataFiltered,
    MultiQuery,
    Reranked,
    HybridUniversal,
    Other(String),
}

impl RetrievalType {
    pub fn as_str(&self) -> &str {
        match self {
            RetrievalType::BasicSimilarity => "BasicSimilarityStrategy",
            RetrievalType::MetadataFiltered => "MetadataFilteredStrategy",
            RetrievalType::MultiQuery => "MultiQueryStrategy",
            RetrievalType::Reranked => "RerankedStrategy",
            RetrievalType::HybridUniversal => "HybridUniversalStrategy",
            RetrievalType::Other(s) => s,
        }
    }
}

impl From<String> for RetrievalType {
    fn from(s: String) -> Self {
        match s.as_str() {
            "BasicSimilarityStrategy" => RetrievalType::BasicSimilarity,
            "MetadataFilteredStrategy" => RetrievalType::MetadataFiltered,
            "MultiQueryStrategy" => RetrievalType::MultiQuery,
            "RerankedStrategy" => RetrievalType::Reranked,
            "HybridUniversalStrategy" => RetrievalType::HybridUniversal,
            _ => RetrievalType::Other(s),
        }
    }
}

impl From<RetrievalType> for String {
    fn from(t: RetrievalType) -> Self {
        t.as_str().to_string()
    }
}

impl fmt::Display for RetrievalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<String> = Option::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.trim().is_empty()))
}

// ── Chunk preview ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreviewRequest {
    pub file_hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreviewChunk {
    pub chunk_index: usize,
    pub content: String,
    pub start_position: usize,
    pub end_position: usize,
    pub char_count: usize,
    pub word_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreviewResponse {
    pub original_text: String,
    pub chunks: Vec<PreviewChunk>,
    pub filename: String,
    pub size_bytes: u64,
    pub content_type: String,
    pub parser_used: String,
    pub chunk_strategy: String,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub total_chunks: usize,
    pub avg_chunk_size: f64,
    pub total_size_with_overlaps: usize,
    pub avg_overlap_size: f64,
    #[serde(default)]
    pub warnings: Vec<String>,
}
