//! Provider and model catalog, and the provider ↔ embedder type mapping.

pub mod cache;
pub mod models;

use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

use crate::project::EmbedderType;

pub use models::{CloudModel, LocalModel};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Runtime {
    Local,
    Cloud,
}

impl Runtime {
    pub fn providers(self) -> Vec<Provider> {
        Provider::ALL.iter().copied().filter(|p| p.runtime() == self).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Provider {
    OllamaLocal,
    OllamaRemote,
    OpenAI,
    AzureOpenAI,
    Google,
    Bedrock,
    Cohere,
}

impl Provider {
    pub const ALL: [Provider; 7] = [
        Provider::OllamaLocal,
        Provider::OllamaRemote,
        Provider::OpenAI,
        Provider::AzureOpenAI,
        Provider::Google,
        Provider::Bedrock,
        Provider::Cohere,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Provider::OllamaLocal => "Ollama (local)",
            Provider::OllamaRemote => "Ollama (remote)",
            Provider::OpenAI => "OpenAI",
            Provider::AzureOpenAI => "Azure OpenAI",
            Provider::Google => "Google Vertex AI",
            Provider::Bedrock => "AWS Bedrock",
            Provider::Cohere => "Cohere",
        }
    }

    /// Short key accepted on the command line.
    pub fn key(self) -> &'static str {
        match self {
            Provider::OllamaLocal => "local",
            Provider::OllamaRemote => "ollama",
            Provider::OpenAI => "openai",
            Provider::AzureOpenAI => "azure",
            Provider::Google => "google",
            Provider::Bedrock => "bedrock",
            Provider::Cohere => "cohere",
        }
    }

    pub fn runtime(self) -> Runtime {
        match self {
            Provider::OllamaLocal => Runtime::Local,
            _ => Runtime::Cloud,
        }
    }

    /// Model ids the provider offers in its picker.
    pub fn model_ids(self) -> Vec<&'static str> {
        match self {
            Provider::OllamaLocal => models::LOCAL_MODELS.iter().map(|m| m.id).collect(),
            _ => models::cloud_models(self).iter().map(|m| m.id).collect(),
        }
    }

    pub fn offers(self, model_id: &str) -> bool {
        self.model_ids().contains(&model_id)
    }

    /// Whether strategies for this provider carry an `api_key`.
    pub fn takes_api_key(self) -> bool {
        !matches!(self, Provider::OllamaLocal | Provider::OllamaRemote)
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Provider::ALL
            .iter()
            .copied()
            .find(|p| p.key().eq_ignore_ascii_case(s) || p.label().eq_ignore_ascii_case(s))
            .ok_or_else(|| {
                let keys: Vec<_> = Provider::ALL.iter().map(|p| p.key()).collect();
                format!("Unknown provider '{s}'. Use one of: {}", keys.join(", "))
            })
    }
}

/// The model picked in the form. `Custom` holds free text typed by the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelSelection {
    Listed(String),
    Custom(String),
}

impl ModelSelection {
    pub fn id(&self) -> &str {
        match self {
            ModelSelection::Listed(id) | ModelSelection::Custom(id) => id,
        }
    }

    /// Classifies a stored model id against the provider's picker.
    pub fn resolve(provider: Provider, model_id: &str) -> Self {
        if provider.offers(model_id) {
            ModelSelection::Listed(model_id.to_string())
        } else {
            ModelSelection::Custom(model_id.to_string())
        }
    }
}

/// One row per provider; the only place providers and embedder types meet.
/// Both Ollama providers share `OllamaEmbedder`; only the local one writes `auto_pull`.
const PROVIDER_TYPES: &[(Provider, &str)] = &[
    (Provider::OllamaLocal, "OllamaEmbedder"),
    (Provider::OllamaRemote, "OllamaEmbedder"),
    (Provider::OpenAI, "OpenAIEmbedder"),
    (Provider::AzureOpenAI, "AzureOpenAIEmbedder"),
    (Provider::Google, "VertexAIEmbedder"),
    (Provider::Bedrock, "BedrockEmbedder"),
    (Provider::Cohere, "CohereEmbedder"),
];

/// Embedder type a `(provider, model)` selection is saved as.
///
/// A local model that carries a canonical repository id is served by the universal
/// runtime, not Ollama.
pub fn strategy_type(provider: Provider, model: &ModelSelection) -> EmbedderType {
    if provider == Provider::OllamaLocal {
        if let ModelSelection::Listed(id) = model {
            if models::local_model(id).is_some_and(|m| m.repo_id.is_some()) {
                return EmbedderType::Universal;
            }
        }
    }
    PROVIDER_TYPES
        .iter()
        .find(|(p, _)| *p == provider)
        .map(|(_, t)| EmbedderType::from(t.to_string()))
        .unwrap_or(EmbedderType::Ollama)
}

/// Reverse of [`strategy_type`]. Returns `None` for embedder types the form cannot edit.
pub fn provider_for(kind: &EmbedderType, config: &Map<String, Value>) -> Option<Provider> {
    match kind {
        EmbedderType::Universal => Some(Provider::OllamaLocal),
        EmbedderType::Ollama if config.contains_key("auto_pull") => Some(Provider::OllamaLocal),
        EmbedderType::Ollama => Some(Provider::OllamaRemote),
        other => PROVIDER_TYPES
            .iter()
            .find(|(_, t)| *t == other.as_str())
            .map(|(p, _)| *p),
    }
}
