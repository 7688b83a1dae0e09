//! Editable fields of an embedding strategy and their translation to and from the
//! provider-shaped config map.

use serde_json::{Map, Value, json};

use crate::catalog::models::{local_model, local_model_by_repo, model_dimension};
use crate::catalog::{ModelSelection, Provider, provider_for, strategy_type};
use crate::crypto;
use crate::error::FormError;
use crate::project::{EmbedderType, EmbeddingStrategy};

pub const DEFAULT_PROVIDER: Provider = Provider::OllamaRemote;
pub const DEFAULT_MODEL: &str = "nomic-embed-text";
pub const DEFAULT_BATCH_SIZE: i64 = 16;
pub const DEFAULT_TIMEOUT_SECS: i64 = 60;
pub const LOCAL_OLLAMA_URL: &str = "http://localhost:11434";
pub const UNIVERSAL_BASE_URL: &str = "http://127.0.0.1:11540/v1";
pub const UNIVERSAL_API_KEY: &str = "universal";

#[derive(Debug, Clone, PartialEq)]
pub struct StrategyFields {
    pub name: String,
    pub provider: Provider,
    pub model: ModelSelection,
    pub dimension: Option<i64>,
    pub batch_size: Option<i64>,
    pub timeout_secs: Option<i64>,
    pub base_url: String,
    pub organization: String,
    pub max_retries: Option<i64>,
    pub deployment: String,
    pub endpoint: String,
    pub api_version: String,
    pub project_id: String,
    pub region: String,
    pub auto_pull: bool,
    /// Served by the universal runtime even though the model is not a catalog entry.
    pub universal: bool,
    /// Plaintext typed this session. Encrypted on save, never written as is.
    pub api_key: String,
    /// Encrypted key already in the saved config, kept when no new key is typed.
    pub stored_api_key: Option<String>,
    pub priority: i64,
    pub make_default: bool,
}

impl Default for StrategyFields {
    fn default() -> Self {
        Self {
            name: String::new(),
            provider: DEFAULT_PROVIDER,
            model: ModelSelection::Listed(DEFAULT_MODEL.to_string()),
            dimension: model_dimension(DEFAULT_PROVIDER, DEFAULT_MODEL).map(i64::from),
            batch_size: Some(DEFAULT_BATCH_SIZE),
            timeout_secs: Some(DEFAULT_TIMEOUT_SECS),
            base_url: String::new(),
            organization: String::new(),
            max_retries: None,
            deployment: String::new(),
            endpoint: String::new(),
            api_version: String::new(),
            project_id: String::new(),
            region: String::new(),
            auto_pull: true,
            universal: false,
            api_key: String::new(),
            stored_api_key: None,
            priority: 0,
            make_default: false,
        }
    }
}

impl StrategyFields {
    /// Switches provider and resets the model to the provider's first listed model,
    /// deriving its dimension.
    pub fn select_provider(&mut self, provider: Provider) {
        if self.provider == provider {
            return;
        }
        self.provider = provider;
        let first = provider.model_ids().first().map(|id| id.to_string()).unwrap_or_default();
        self.select_model(ModelSelection::Listed(first));
    }

    /// Sets the model and, for catalog models, its dimension.
    pub fn select_model(&mut self, model: ModelSelection) {
        if let Some(dim) = model_dimension(self.provider, model.id()) {
            self.dimension = Some(i64::from(dim));
        }
        if self.model != model {
            self.universal = false;
        }
        self.model = model;
    }

    /// Embedder type these fields are saved as.
    pub fn strategy_type(&self) -> EmbedderType {
        if self.universal && self.provider == Provider::OllamaLocal {
            return EmbedderType::Universal;
        }
        strategy_type(self.provider, &self.model)
    }
}

/// Captured once after initialization; the form is dirty while live fields differ.
#[derive(Debug, Clone, PartialEq)]
pub struct FormSnapshot(StrategyFields);

impl FormSnapshot {
    pub fn capture(fields: &StrategyFields) -> Self {
        Self(fields.clone())
    }

    pub fn is_dirty(&self, live: &StrategyFields) -> bool {
        self.0 != *live
    }

    /// Names of fields that differ from the snapshot.
    pub fn changed_fields(&self, live: &StrategyFields) -> Vec<&'static str> {
        let a = &self.0;
        let b = live;
        let checks: [(&'static str, bool); 20] = [
            ("name", a.name != b.name),
            ("provider", a.provider != b.provider),
            ("model", a.model != b.model),
            ("dimension", a.dimension != b.dimension),
            ("batch_size", a.batch_size != b.batch_size),
            ("timeout", a.timeout_secs != b.timeout_secs),
            ("base_url", a.base_url != b.base_url),
            ("organization", a.organization != b.organization),
            ("max_retries", a.max_retries != b.max_retries),
            ("deployment", a.deployment != b.deployment),
            ("endpoint", a.endpoint != b.endpoint),
            ("api_version", a.api_version != b.api_version),
            ("project_id", a.project_id != b.project_id),
            ("region", a.region != b.region),
            ("auto_pull", a.auto_pull != b.auto_pull),
            ("universal", a.universal != b.universal),
            ("api_key", a.api_key != b.api_key),
            ("stored_api_key", a.stored_api_key != b.stored_api_key),
            ("priority", a.priority != b.priority),
            ("make_default", a.make_default != b.make_default),
        ];
        checks.iter().filter(|(_, changed)| *changed).map(|(f, _)| *f).collect()
    }
}

fn put_str(config: &mut Map<String, Value>, key: &str, value: &str) {
    config.insert(key.to_string(), Value::String(value.to_string()));
}

fn put_nonempty(config: &mut Map<String, Value>, key: &str, value: &str) {
    let value = value.trim();
    if !value.is_empty() {
        put_str(config, key, value);
    }
}

/// Zero and negative counts mean "not set" and are left out.
fn put_positive(config: &mut Map<String, Value>, key: &str, value: Option<i64>) {
    if let Some(n) = value.filter(|n| *n > 0) {
        config.insert(key.to_string(), json!(n));
    }
}

fn api_key_value(fields: &StrategyFields, client_secret: Option<&str>) -> Result<Option<String>, FormError> {
    let typed = fields.api_key.trim();
    if typed.is_empty() {
        return Ok(fields.stored_api_key.clone());
    }
    Ok(Some(crypto::encrypt_api_key(typed, client_secret)?))
}

/// Builds the strategy record for the fields. Only keys relevant to the provider are
/// written; a typed API key is encrypted first.
pub fn build_config(fields: &StrategyFields, client_secret: Option<&str>) -> Result<EmbeddingStrategy, FormError> {
    let kind = fields.strategy_type();
    let mut config = Map::new();

    if kind == EmbedderType::Universal {
        let repo = local_model(fields.model.id())
            .and_then(|m| m.repo_id)
            .unwrap_or(fields.model.id());
        put_str(&mut config, "model", repo);
        put_str(&mut config, "base_url", UNIVERSAL_BASE_URL);
        put_str(&mut config, "api_key", UNIVERSAL_API_KEY);
    } else {
        put_str(&mut config, "model", fields.model.id().trim());
        match fields.provider {
            Provider::OllamaLocal => {
                let url = if fields.base_url.trim().is_empty() { LOCAL_OLLAMA_URL } else { fields.base_url.trim() };
                put_str(&mut config, "base_url", url);
                config.insert("auto_pull".into(), Value::Bool(fields.auto_pull));
            }
            Provider::OllamaRemote => {
                put_nonempty(&mut config, "base_url", &fields.base_url);
            }
            Provider::OpenAI => {
                put_nonempty(&mut config, "base_url", &fields.base_url);
                put_nonempty(&mut config, "organization", &fields.organization);
                put_positive(&mut config, "max_retries", fields.max_retries);
            }
            Provider::AzureOpenAI => {
                put_str(&mut config, "deployment", fields.deployment.trim());
                put_str(&mut config, "endpoint", fields.endpoint.trim());
                put_nonempty(&mut config, "api_version", &fields.api_version);
            }
            Provider::Google => {
                put_str(&mut config, "project_id", fields.project_id.trim());
                put_str(&mut config, "region", fields.region.trim());
                put_nonempty(&mut config, "endpoint", &fields.endpoint);
            }
            Provider::Bedrock => {
                put_str(&mut config, "region", fields.region.trim());
            }
            Provider::Cohere => {}
        }
        if fields.provider.takes_api_key() {
            if let Some(key) = api_key_value(fields, client_secret)? {
                put_str(&mut config, "api_key", &key);
            }
        }
    }

    put_positive(&mut config, "dimension", fields.dimension);
    put_positive(&mut config, "batch_size", fields.batch_size);
    put_positive(&mut config, "timeout", fields.timeout_secs);

    Ok(EmbeddingStrategy {
        name: fields.name.trim().to_string(),
        kind,
        priority: fields.priority,
        config,
        extra: Map::new(),
    })
}

/// Integers may arrive as numbers, floats or numeric strings.
pub fn int_value(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>().ok().or_else(|| s.parse::<f64>().ok().map(|f| f.trunc() as i64))
        }
        _ => None,
    }
}

fn str_value(config: &Map<String, Value>, key: &str) -> String {
    match config.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

/// Reads form fields back from a saved strategy type and config.
///
/// Returns `None` when the type is not one the form can edit. Keys absent from the
/// config take their defaults; the dimension falls back to catalog metadata.
pub fn fields_from_config(kind: &EmbedderType, config: &Map<String, Value>) -> Option<StrategyFields> {
    let provider = provider_for(kind, config)?;
    Some(fields_for_provider(kind, provider, config))
}

/// Like [`fields_from_config`], with the provider already decided by the caller.
pub fn fields_for_provider(kind: &EmbedderType, provider: Provider, config: &Map<String, Value>) -> StrategyFields {
    let mut fields = StrategyFields {
        provider,
        universal: *kind == EmbedderType::Universal,
        ..StrategyFields::default()
    };

    let raw_model = str_value(config, "model");
    fields.model = if *kind == EmbedderType::Universal {
        match local_model_by_repo(&raw_model) {
            Some(m) => ModelSelection::Listed(m.id.to_string()),
            None => ModelSelection::Custom(raw_model),
        }
    } else if raw_model.is_empty() {
        let default = if provider.offers(DEFAULT_MODEL) {
            DEFAULT_MODEL
        } else {
            provider.model_ids().first().copied().unwrap_or_default()
        };
        ModelSelection::Listed(default.to_string())
    } else {
        ModelSelection::resolve(provider, &raw_model)
    };

    fields.dimension = config
        .get("dimension")
        .and_then(int_value)
        .or_else(|| model_dimension(provider, fields.model.id()).map(i64::from));
    fields.batch_size = Some(config.get("batch_size").and_then(int_value).unwrap_or(DEFAULT_BATCH_SIZE));
    fields.timeout_secs = Some(config.get("timeout").and_then(int_value).unwrap_or(DEFAULT_TIMEOUT_SECS));

    if *kind != EmbedderType::Universal {
        fields.base_url = str_value(config, "base_url");
        fields.organization = str_value(config, "organization");
        fields.max_retries = config.get("max_retries").and_then(int_value);
        fields.deployment = str_value(config, "deployment");
        fields.endpoint = str_value(config, "endpoint");
        fields.api_version = str_value(config, "api_version");
        fields.project_id = str_value(config, "project_id");
        fields.region = str_value(config, "region");
        fields.auto_pull = config.get("auto_pull").and_then(Value::as_bool).unwrap_or(true);
        fields.stored_api_key = Some(str_value(config, "api_key")).filter(|k| !k.is_empty());
    }

    fields
}

/// Form fields for an existing strategy, including its name and priority.
pub fn fields_from_strategy(strategy: &EmbeddingStrategy) -> Option<StrategyFields> {
    let mut fields = fields_from_config(&strategy.kind, &strategy.config)?;
    fields.name = strategy.name.clone();
    fields.priority = strategy.priority;
    Some(fields)
}
