//! Initial field values for a strategy form, computed in one pass.
//!
//! Per field, the server config wins over navigation state, which wins over the
//! legacy store, which wins over the built-in defaults. The result is applied to the
//! form in one step and snapshotted immediately, so derived fields never show up as
//! user edits.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::fields::{StrategyFields, fields_for_provider, fields_from_config};
use crate::catalog::provider_for;
use crate::error::FormError;
use crate::legacy::LegacyStrategy;
use crate::project::{Database, EmbedderType};
use crate::validation::validate_strategy_name;

/// Payload handed over by the screen that opened the form.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigationState {
    pub database: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_config: Option<Map<String, Value>>,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<i64>,
}

impl NavigationState {
    /// Accepts the payload only if it belongs to `database` and names a well-formed
    /// strategy. Anything else is dropped as stale.
    pub fn validated(self, database: &str) -> Option<Self> {
        if self.database != database {
            tracing::debug!("Ignoring navigation state for database '{}'", self.database);
            return None;
        }
        if let Some(name) = &self.strategy_name {
            if validate_strategy_name(name).is_err() {
                tracing::debug!("Ignoring navigation state with malformed strategy name '{name}'");
                return None;
            }
        }
        Some(self)
    }
}

/// Later maps override earlier ones key by key.
fn merge_configs<'a>(layers: impl IntoIterator<Item = &'a Map<String, Value>>) -> Map<String, Value> {
    let mut merged = Map::new();
    for layer in layers {
        for (k, v) in layer {
            if !v.is_null() {
                merged.insert(k.clone(), v.clone());
            }
        }
    }
    merged
}

/// Computes the full initial field set for a strategy form.
///
/// `database` is the server's copy, if it was loaded. `strategy` names the strategy
/// being edited; `None` opens an empty create form unless navigation state names one.
pub fn resolve_initial_fields(
    database: Option<&Database>,
    strategy: Option<&str>,
    nav: Option<&NavigationState>,
    legacy: Option<&LegacyStrategy>,
) -> Result<StrategyFields, FormError> {
    let name = strategy
        .map(str::to_string)
        .or_else(|| nav.and_then(|n| n.strategy_name.clone()));
    let server = database.zip(name.as_deref()).and_then(|(db, n)| db.embedding_strategy(n));
    let nav = nav.filter(|n| n.strategy_name.is_none() || n.strategy_name == name);

    let empty = Map::new();
    let config = merge_configs([
        legacy.map_or(&empty, |l| &l.config),
        nav.and_then(|n| n.current_config.as_ref()).unwrap_or(&empty),
        server.map_or(&empty, |s| &s.config),
    ]);

    // the provider comes from the layer that supplied the type, not the merged map
    let kind = server
        .map(|s| (s.kind.clone(), &s.config))
        .or_else(|| {
            nav.and_then(|n| {
                let kind = EmbedderType::from(n.strategy_type.clone()?);
                Some((kind, n.current_config.as_ref().unwrap_or(&empty)))
            })
        })
        .or_else(|| legacy.and_then(|l| Some((EmbedderType::from(l.kind.clone()?), &l.config))));

    let mut fields = match kind {
        Some((kind, own_config)) => {
            let provider = provider_for(&kind, own_config)
                .ok_or_else(|| FormError::UnsupportedType(kind.to_string()))?;
            fields_for_provider(&kind, provider, &config)
        }
        // no type anywhere: the config still fills in a default-provider form
        None if !config.is_empty() => fields_from_config(&EmbedderType::Ollama, &config).unwrap_or_default(),
        None => StrategyFields::default(),
    };

    fields.name = name.unwrap_or_default();
    fields.priority = server
        .map(|s| s.priority)
        .or_else(|| nav.and_then(|n| n.priority))
        .unwrap_or(0);
    fields.make_default = match (database, server) {
        (Some(db), Some(s)) => db.is_default_embedding(&s.name),
        _ => nav.is_some_and(|n| n.is_default),
    };

    Ok(fields)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{ModelSelection, Provider};
    use crate::project::{EmbeddingStrategy, StoreConfig, StoreType};
    use serde_json::json;

    fn config(value: Value) -> Map<String, Value> {
        serde_json::from_value(value).unwrap()
    }

    fn database() -> Database {
        Database {
            name: "main".into(),
            store_type: StoreType::Chroma,
            config: StoreConfig::default(),
            default_embedding_strategy: Some("fast".into()),
            default_retrieval_strategy: None,
            embedding_strategies: vec![EmbeddingStrategy {
                name: "fast".into(),
                kind: EmbedderType::OpenAI,
                priority: 5,
                config: config(json!({ "model": "text-embedding-3-small", "batch_size": 64 })),
                extra: Map::new(),
            }],
            retrieval_strategies: vec![],
            extra: Map::new(),
        }
    }

    #[test]
    fn test_defaults_for_create() {
        let fields = resolve_initial_fields(None, None, None, None).unwrap();
        assert_eq!(fields, StrategyFields::default());
        assert_eq!(fields.provider, Provider::OllamaRemote);
        assert_eq!(fields.model, ModelSelection::Listed("nomic-embed-text".into()));
        assert_eq!(fields.dimension, Some(768));
        assert_eq!(fields.batch_size, Some(16));
        assert_eq!(fields.timeout_secs, Some(60));
    }

    #[test]
    fn test_server_wins_over_navigation() {
        let db = database();
        let nav = NavigationState {
            database: "main".into(),
            strategy_name: Some("fast".into()),
            strategy_type: Some("CohereEmbedder".into()),
            current_config: Some(config(json!({ "batch_size": 8, "timeout": 15 }))),
            is_default: false,
            priority: Some(1),
        };
        let fields = resolve_initial_fields(Some(&db), Some("fast"), Some(&nav), None).unwrap();
        assert_eq!(fields.provider, Provider::OpenAI);
        assert_eq!(fields.batch_size, Some(64));
        // absent on the server, so navigation state fills it
        assert_eq!(fields.timeout_secs, Some(15));
        assert_eq!(fields.priority, 5);
        assert!(fields.make_default);
        assert_eq!(fields.dimension, Some(1536));
    }

    #[test]
    fn test_navigation_then_legacy_fallback() {
        let nav = NavigationState {
            database: "main".into(),
            strategy_name: Some("copied".into()),
            strategy_type: Some("OllamaEmbedder".into()),
            current_config: Some(config(json!({ "model": "all-minilm" }))),
            is_default: true,
            priority: Some(2),
        };
        let legacy = LegacyStrategy {
            kind: None,
            config: config(json!({ "model": "bge-m3", "batch_size": 4 })),
            saved_at: None,
        };
        let fields = resolve_initial_fields(Some(&database()), None, Some(&nav), Some(&legacy)).unwrap();
        assert_eq!(fields.name, "copied");
        assert_eq!(fields.provider, Provider::OllamaRemote);
        assert_eq!(fields.model, ModelSelection::Listed("all-minilm".into()));
        assert_eq!(fields.dimension, Some(384));
        assert_eq!(fields.batch_size, Some(4));
        assert_eq!(fields.priority, 2);
        assert!(fields.make_default);
    }

    #[test]
    fn test_remote_ollama_stays_remote_over_legacy_auto_pull() {
        let mut db = database();
        db.embedding_strategies.push(EmbeddingStrategy {
            name: "remote".into(),
            kind: EmbedderType::Ollama,
            priority: 0,
            config: config(json!({ "model": "nomic-embed-text", "base_url": "http://gpu:11434" })),
            extra: Map::new(),
        });
        let legacy = LegacyStrategy {
            kind: Some("OllamaEmbedder".into()),
            config: config(json!({ "auto_pull": true, "batch_size": 4 })),
            saved_at: None,
        };
        let fields = resolve_initial_fields(Some(&db), Some("remote"), None, Some(&legacy)).unwrap();
        assert_eq!(fields.provider, Provider::OllamaRemote);
        assert_eq!(fields.base_url, "http://gpu:11434");
        assert_eq!(fields.batch_size, Some(4));

        let saved = crate::strategy::build_config(&fields, None).unwrap();
        assert_eq!(saved.config["base_url"], "http://gpu:11434");
        assert!(!saved.config.contains_key("auto_pull"));
    }

    #[test]
    fn test_unsupported_type() {
        let mut db = database();
        db.embedding_strategies[0].kind = EmbedderType::Other("SentenceTransformerEmbedder".into());
        let err = resolve_initial_fields(Some(&db), Some("fast"), None, None).unwrap_err();
        assert!(matches!(err, FormError::UnsupportedType(t) if t == "SentenceTransformerEmbedder"));
    }

    #[test]
    fn test_navigation_validation() {
        let nav = NavigationState { database: "other".into(), ..NavigationState::default() };
        assert!(nav.validated("main").is_none());

        let nav = NavigationState {
            database: "main".into(),
            strategy_name: Some("bad name!".into()),
            ..NavigationState::default()
        };
        assert!(nav.validated("main").is_none());

        let nav: NavigationState = serde_json::from_value(json!({
            "database": "main",
            "strategyName": "fast",
            "strategyType": "OpenAIEmbedder",
            "isDefault": true
        }))
        .unwrap();
        assert!(nav.validated("main").is_some());
    }
}
