//! Static model tables: cloud provider models and locally hosted embedding models.

use super::Provider;

pub struct CloudModel {
    pub id: &'static str,
    pub dim: u32,
    pub max_tokens: u32,
}

/// A locally hosted embedding model.
///
/// `repo_id` is set for models served from universal-format weights rather than an
/// Ollama server; strategies for those models are written as `UniversalEmbedder`.
pub struct LocalModel {
    pub id: &'static str,             // "bge-small-en"
    pub label: &'static str,          // "BGE Small EN v1.5"
    pub dim: u32,                     // 384
    pub quality: &'static str,        // "Good"
    pub download_size: &'static str,  // "133 MB"
    pub repo_id: Option<&'static str>, // "BAAI/bge-small-en-v1.5"
    pub description: &'static str,
}

pub const OLLAMA_MODELS: &[CloudModel] = &[
    CloudModel { id: "nomic-embed-text", dim: 768, max_tokens: 8192 },
    CloudModel { id: "mxbai-embed-large", dim: 1024, max_tokens: 512 },
    CloudModel { id: "all-minilm", dim: 384, max_tokens: 256 },
    CloudModel { id: "bge-m3", dim: 1024, max_tokens: 8192 },
    CloudModel { id: "snowflake-arctic-embed", dim: 1024, max_tokens: 512 },
];

pub const OPENAI_MODELS: &[CloudModel] = &[
    CloudModel { id: "text-embedding-3-small", dim: 1536, max_tokens: 8191 },
    CloudModel { id: "text-embedding-3-large", dim: 3072, max_tokens: 8191 },
    CloudModel { id: "text-embedding-ada-002", dim: 1536, max_tokens: 8191 },
];

pub const GOOGLE_MODELS: &[CloudModel] = &[
    CloudModel { id: "text-embedding-004", dim: 768, max_tokens: 2048 },
    CloudModel { id: "text-multilingual-embedding-002", dim: 768, max_tokens: 2048 },
    CloudModel { id: "gemini-embedding-001", dim: 3072, max_tokens: 2048 },
];

pub const BEDROCK_MODELS: &[CloudModel] = &[
    CloudModel { id: "amazon.titan-embed-text-v2:0", dim: 1024, max_tokens: 8192 },
    CloudModel { id: "amazon.titan-embed-text-v1", dim: 1536, max_tokens: 8192 },
    CloudModel { id: "cohere.embed-english-v3", dim: 1024, max_tokens: 512 },
    CloudModel { id: "cohere.embed-multilingual-v3", dim: 1024, max_tokens: 512 },
];

pub const COHERE_MODELS: &[CloudModel] = &[
    CloudModel { id: "embed-english-v3.0", dim: 1024, max_tokens: 512 },
    CloudModel { id: "embed-multilingual-v3.0", dim: 1024, max_tokens: 512 },
    CloudModel { id: "embed-english-light-v3.0", dim: 384, max_tokens: 512 },
];

pub const LOCAL_MODELS: &[LocalModel] = &[
    // ── Ollama-served ────────────────────────────────────────────────
    LocalModel {
        id: "nomic-embed-text",
        label: "Nomic Embed Text",
        dim: 768,
        quality: "Good",
        download_size: "274 MB",
        repo_id: None,
        description: "Long context (8192 tokens). Solid general-purpose English model.",
    },
    LocalModel {
        id: "mxbai-embed-large",
        label: "mxbai Embed Large",
        dim: 1024,
        quality: "Best",
        download_size: "670 MB",
        repo_id: None,
        description: "High quality English embeddings. Larger and slower.",
    },

    // ── Universal runtime (HuggingFace weights) ──────────────────────
    LocalModel {
        id: "all-minilm-l6-v2",
        label: "MiniLM L6 v2",
        dim: 384,
        quality: "Fast",
        download_size: "90 MB",
        repo_id: Some("sentence-transformers/all-MiniLM-L6-v2"),
        description: "Fast and lightweight. Great default for English text.",
    },
    LocalModel {
        id: "bge-small-en",
        label: "BGE Small EN v1.5",
        dim: 384,
        quality: "Good",
        download_size: "133 MB",
        repo_id: Some("BAAI/bge-small-en-v1.5"),
        description: "Better quality than MiniLM at the same speed. English only.",
    },
    LocalModel {
        id: "bge-base-en",
        label: "BGE Base EN v1.5",
        dim: 768,
        quality: "Better",
        download_size: "438 MB",
        repo_id: Some("BAAI/bge-base-en-v1.5"),
        description: "High quality English embeddings.",
    },
    LocalModel {
        id: "nomic-embed-text-v1.5",
        label: "Nomic Embed Text v1.5",
        dim: 768,
        quality: "Better",
        download_size: "547 MB",
        repo_id: Some("nomic-ai/nomic-embed-text-v1.5"),
        description: "Nomic weights run by the universal runtime. 8192 token context.",
    },
    LocalModel {
        id: "bge-m3",
        label: "BGE M3 (Multi-lingual)",
        dim: 1024,
        quality: "Best",
        download_size: "2.3 GB",
        repo_id: Some("BAAI/bge-m3"),
        description: "Top-tier multilingual. 100+ languages. Large download.",
    },
];

pub fn cloud_models(provider: Provider) -> &'static [CloudModel] {
    match provider {
        Provider::OllamaRemote => OLLAMA_MODELS,
        Provider::OpenAI | Provider::AzureOpenAI => OPENAI_MODELS,
        Provider::Google => GOOGLE_MODELS,
        Provider::Bedrock => BEDROCK_MODELS,
        Provider::Cohere => COHERE_MODELS,
        Provider::OllamaLocal => &[],
    }
}

pub fn local_model(id: &str) -> Option<&'static LocalModel> {
    LOCAL_MODELS.iter().find(|m| m.id == id)
}

/// Looks a local model up by its canonical repository identifier (case-insensitive).
pub fn local_model_by_repo(repo_id: &str) -> Option<&'static LocalModel> {
    LOCAL_MODELS
        .iter()
        .find(|m| m.repo_id.is_some_and(|r| r.eq_ignore_ascii_case(repo_id)))
}

/// Catalog dimension for a provider's model, if the catalog knows it.
pub fn model_dimension(provider: Provider, model_id: &str) -> Option<u32> {
    match provider {
        Provider::OllamaLocal => local_model(model_id).map(|m| m.dim),
        _ => cloud_models(provider)
            .iter()
            .find(|m| m.id == model_id)
            .map(|m| m.dim),
    }
}
