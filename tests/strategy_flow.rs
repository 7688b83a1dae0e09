mod common;

use common::{FakeApi, sample_config};
use serde_json::json;

use ragstudio::catalog::{ModelSelection, Provider};
use ragstudio::crypto::decrypt_api_key;
use ragstudio::error::FormError;
use ragstudio::legacy::{FileLegacyStore, LegacyStore, NoLegacyStore};
use ragstudio::strategy::{
    FormMode, NavigationState, RetrievalDraft, StrategyForm, remove_embedding_strategy, save_retrieval,
};
use ragstudio::project::RetrievalType;

const SECRET: &str = "test-client-secret-0123456789abcdefghijklmnopqrs";

#[tokio::test]
async fn test_mark_existing_strategy_default() {
    let api = FakeApi::with_config(sample_config());
    let session = api.session();

    let mut form = StrategyForm::open(&session, "main", Some("openai"), None, &NoLegacyStore).await.unwrap();
    assert!(!form.is_dirty());
    form.fields.make_default = true;
    assert_eq!(form.changed_fields(), vec!["make_default"]);

    let outcome = form.save(&session, Some(SECRET), &NoLegacyStore).await.unwrap();
    assert!(outcome.default_changed);
    assert_eq!(outcome.previous_default.as_deref(), Some("fast"));
    assert_eq!(api.update_count(), 1);

    let db = api.current().database("main").cloned().unwrap();
    assert_eq!(db.default_embedding_strategy.as_deref(), Some("openai"));
    assert_eq!(db.embedding_strategies.len(), 2);
    assert!(!form.is_dirty());
}

#[tokio::test]
async fn test_renaming_default_moves_pointer() {
    let api = FakeApi::with_config(sample_config());
    let session = api.session();

    let mut form = StrategyForm::open(&session, "main", Some("fast"), None, &NoLegacyStore).await.unwrap();
    form.fields.name = "quick".into();
    let outcome = form.save(&session, None, &NoLegacyStore).await.unwrap();
    assert_eq!(outcome.strategy, "quick");
    assert!(!outcome.default_changed);
    assert_eq!(form.mode, FormMode::Edit { original_name: "quick".into() });

    let db = api.current().database("main").cloned().unwrap();
    assert_eq!(db.default_embedding_strategy.as_deref(), Some("quick"));
    let names: Vec<_> = db.embedding_strategies.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["quick", "openai"]);
}

#[tokio::test]
async fn test_create_with_api_key_encrypts() {
    let api = FakeApi::with_config(sample_config());
    let session = api.session();

    let mut form = StrategyForm::open(&session, "main", None, None, &NoLegacyStore).await.unwrap();
    assert_eq!(form.mode, FormMode::Create);
    form.fields.name = "large".into();
    form.fields.select_provider(Provider::OpenAI);
    form.fields.select_model(ModelSelection::resolve(Provider::OpenAI, "text-embedding-3-large"));
    form.fields.api_key = "sk-live-123".into();
    form.save(&session, Some(SECRET), &NoLegacyStore).await.unwrap();

    let db = api.current().database("main").cloned().unwrap();
    let saved = db.embedding_strategy("large").unwrap();
    assert_eq!(saved.config["model"], "text-embedding-3-large");
    assert_eq!(saved.config["dimension"], 3072);
    let blob = saved.config["api_key"].as_str().unwrap();
    assert_ne!(blob, "sk-live-123");
    assert_eq!(decrypt_api_key(blob, SECRET).unwrap(), "sk-live-123");

    assert!(form.fields.api_key.is_empty());
    assert_eq!(form.fields.stored_api_key.as_deref(), Some(blob));
    assert_eq!(db.default_embedding_strategy.as_deref(), Some("fast"));
}

#[tokio::test]
async fn test_invalid_form_sends_nothing() {
    let api = FakeApi::with_config(sample_config());
    let session = api.session();

    let mut form = StrategyForm::open(&session, "main", None, None, &NoLegacyStore).await.unwrap();
    form.fields.name = "OpenAI".into();
    form.fields.model = ModelSelection::Custom(String::new());
    let err = form.save(&session, None, &NoLegacyStore).await.unwrap_err();
    match err {
        FormError::Validation(errors) => {
            assert!(errors.for_field("name").unwrap().is_duplicate());
            assert!(errors.for_field("model").is_some());
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(api.update_count(), 0);
    assert!(form.last_error.is_some());
}

#[tokio::test]
async fn test_missing_secret_blocks_save() {
    let api = FakeApi::with_config(sample_config());
    let session = api.session();

    let mut form = StrategyForm::open(&session, "main", Some("openai"), None, &NoLegacyStore).await.unwrap();
    form.fields.api_key = "sk-new".into();
    let err = form.save(&session, None, &NoLegacyStore).await.unwrap_err();
    assert!(matches!(err, FormError::Encryption(_)));
    assert_eq!(api.update_count(), 0);
}

#[tokio::test]
async fn test_server_failure_keeps_form_dirty() {
    let api = FakeApi::with_config(sample_config());
    *api.fail_updates.lock().unwrap() = Some("database locked".into());
    let session = api.session();

    let mut form = StrategyForm::open(&session, "main", Some("fast"), None, &NoLegacyStore).await.unwrap();
    form.fields.batch_size = Some(32);
    let err = form.save(&session, None, &NoLegacyStore).await.unwrap_err();
    assert!(matches!(err, FormError::Api(_)));
    assert!(form.is_dirty());
    assert!(form.last_error.as_deref().unwrap().contains("database locked"));
}

#[tokio::test]
async fn test_navigation_state_seeds_new_strategy() {
    let api = FakeApi::with_config(sample_config());
    let session = api.session();

    let nav = NavigationState {
        database: "main".into(),
        strategy_name: Some("copied".into()),
        strategy_type: Some("CohereEmbedder".into()),
        current_config: Some(json!({ "model": "embed-english-v3.0", "dimension": 1024 }).as_object().cloned().unwrap()),
        is_default: false,
        priority: Some(3),
    };
    let mut form = StrategyForm::open(&session, "main", None, Some(nav), &NoLegacyStore).await.unwrap();
    assert_eq!(form.mode, FormMode::Create);
    assert_eq!(form.fields.name, "copied");
    assert_eq!(form.fields.provider, Provider::Cohere);
    assert_eq!(form.fields.priority, 3);

    form.save(&session, None, &NoLegacyStore).await.unwrap();
    let db = api.current().database("main").cloned().unwrap();
    let saved = db.embedding_strategy("copied").unwrap();
    assert_eq!(saved.priority, 3);
    assert_eq!(saved.config["model"], "embed-english-v3.0");
}

#[tokio::test]
async fn test_legacy_record_fills_gaps_and_is_forgotten() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("legacy.json");
    let records = json!({
        "main": {
            "fast": { "type": "OllamaEmbedder", "config": { "base_url": "http://gpu-box:11434" } }
        }
    });
    std::fs::write(&path, records.to_string()).unwrap();
    let legacy = FileLegacyStore::open(&path).unwrap();

    let api = FakeApi::with_config(sample_config());
    let session = api.session();
    let mut form = StrategyForm::open(&session, "main", Some("fast"), None, &legacy).await.unwrap();
    assert_eq!(form.fields.base_url, "http://gpu-box:11434");
    assert_eq!(form.fields.model.id(), "nomic-embed-text");

    form.save(&session, None, &legacy).await.unwrap();
    assert!(legacy.strategy("main", "fast").is_none());
    let reopened = FileLegacyStore::open(&path).unwrap();
    assert!(reopened.strategy("main", "fast").is_none());

    let db = api.current().database("main").cloned().unwrap();
    assert_eq!(db.embedding_strategy("fast").unwrap().config["base_url"], "http://gpu-box:11434");
}

#[tokio::test]
async fn test_remove_default_falls_back() {
    let api = FakeApi::with_config(sample_config());
    let session = api.session();

    let plan = remove_embedding_strategy(&session, "main", "fast").await.unwrap();
    assert_eq!(plan.update.default_embedding_strategy, Some(Some("openai".into())));
    let db = api.current().database("main").cloned().unwrap();
    assert_eq!(db.default_embedding_strategy.as_deref(), Some("openai"));

    let err = remove_embedding_strategy(&session, "main", "fast").await.unwrap_err();
    assert!(matches!(err, FormError::StrategyNotFound(_)));
}

#[tokio::test]
async fn test_retrieval_default_flags_follow() {
    let api = FakeApi::with_config(sample_config());
    let session = api.session();

    let mut draft = RetrievalDraft::new("rerank", RetrievalType::Reranked);
    draft.config.insert("top_k".into(), json!(20));
    draft.make_default = true;
    let plan = save_retrieval(&session, "main", None, &draft).await.unwrap();
    assert!(plan.default_changed);

    let db = api.current().database("main").cloned().unwrap();
    assert_eq!(db.default_retrieval_strategy.as_deref(), Some("rerank"));
    let flags: Vec<_> = db.retrieval_strategies.iter().map(|s| (s.name.as_str(), s.default)).collect();
    assert_eq!(flags, vec![("basic", false), ("rerank", true)]);
}
