mod common;

use common::{FakeApi, sample_config};
use ragstudio::database::{CreateDraft, DatabaseModal, Dismissal, ModalMode, ModalOutcome};
use ragstudio::error::FormError;
use ragstudio::project::StoreType;

#[tokio::test]
async fn test_create_copying_strategies() {
    let api = FakeApi::with_config(sample_config());
    let session = api.session();
    let project = session.project_config().await.unwrap();

    let mut draft = CreateDraft::new("Docs v2", StoreType::Qdrant);
    draft.copy_strategies_from(project.database("main").unwrap());
    let mut modal = DatabaseModal::create(draft);
    let outcome = modal.submit(&session).await.unwrap();

    let ModalOutcome::Created(db) = outcome else {
        panic!("expected a created database");
    };
    assert_eq!(db.name, "docs_v2");
    assert_eq!(db.config.persist_directory.as_deref(), Some("./data/docs_v2"));
    assert_eq!(db.config.collection_name.as_deref(), Some("docs_v2"));
    assert_eq!(db.default_embedding_strategy.as_deref(), Some("fast"));
    assert_eq!(db.embedding_strategies.len(), 2);
    assert_eq!(db.retrieval_strategies.len(), 1);

    // the copy is independent of the source
    let current = api.current();
    assert!(current.database("docs_v2").is_some());
    assert_eq!(current.database("main").unwrap().embedding_strategies.len(), 2);
    assert!(!modal.is_loading());
}

#[tokio::test]
async fn test_create_duplicate_rejected_without_request() {
    let api = FakeApi::with_config(sample_config());
    let session = api.session();

    let mut modal = DatabaseModal::create(CreateDraft::new("Main", StoreType::Chroma));
    let err = modal.submit(&session).await.unwrap_err();
    assert!(matches!(err, FormError::Validation(_)));
    assert!(modal.error.as_deref().unwrap().contains("already exists"));
    assert_eq!(api.current().databases().len(), 2);
}

#[tokio::test]
async fn test_rename_moves_datasets() {
    let api = FakeApi::with_config(sample_config());
    let session = api.session();
    let project = session.project_config().await.unwrap();

    let mut modal = DatabaseModal::edit(project.database("main").unwrap());
    if let ModalMode::Edit(draft) = &mut modal.mode {
        draft.name = "Primary".into();
    }
    let outcome = modal.submit(&session).await.unwrap();
    assert_eq!(outcome, ModalOutcome::Updated { name: "primary".into(), changed: true });

    let current = api.current();
    assert!(current.database("main").is_none());
    assert_eq!(current.datasets[0].database.as_deref(), Some("primary"));
}

#[tokio::test]
async fn test_unchanged_edit_sends_nothing() {
    let api = FakeApi::with_config(sample_config());
    let session = api.session();
    let project = session.project_config().await.unwrap();

    let mut modal = DatabaseModal::edit(project.database("archive").unwrap());
    let outcome = modal.submit(&session).await.unwrap();
    assert_eq!(outcome, ModalOutcome::Updated { name: "archive".into(), changed: false });
    assert_eq!(api.update_count(), 0);
}

#[tokio::test]
async fn test_delete_with_reassignment() {
    let api = FakeApi::with_config(sample_config());
    let session = api.session();
    let project = session.project_config().await.unwrap();

    let mut modal = DatabaseModal::edit(project.database("main").unwrap());
    modal.request_delete(&project).unwrap();
    let ModalMode::ConfirmingDelete { plan, .. } = &mut modal.mode else {
        panic!("expected delete confirmation");
    };
    assert_eq!(plan.datasets, vec!["handbook".to_string()]);
    assert_eq!(plan.candidates, vec!["archive".to_string()]);

    // no target chosen yet
    let err = modal.clone().submit(&session).await.unwrap_err();
    assert!(matches!(err, FormError::Validation(_)));
    assert!(api.deletes.lock().unwrap().is_empty());

    if let ModalMode::ConfirmingDelete { plan, .. } = &mut modal.mode {
        plan.choose("archive").unwrap();
    }
    let outcome = modal.submit(&session).await.unwrap();
    assert_eq!(
        outcome,
        ModalOutcome::Deleted { name: "main".into(), reassigned_to: Some("archive".into()) }
    );
    let current = api.current();
    assert!(current.database("main").is_none());
    assert_eq!(current.datasets[0].database.as_deref(), Some("archive"));
}

#[tokio::test]
async fn test_cancel_delete_returns_to_edit() {
    let api = FakeApi::with_config(sample_config());
    let session = api.session();
    let project = session.project_config().await.unwrap();

    let mut modal = DatabaseModal::edit(project.database("archive").unwrap());
    assert!(modal.can_dismiss(Dismissal::Escape));
    modal.request_delete(&project).unwrap();
    assert!(matches!(modal.mode, ModalMode::ConfirmingDelete { .. }));
    modal.cancel_delete();
    assert!(matches!(modal.mode, ModalMode::Edit(_)));
}
