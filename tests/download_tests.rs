mod common;

use std::sync::atomic::Ordering;
use std::time::Duration;

use common::{FakeApi, sample_config};
use ragstudio::catalog::cache::CacheInspector;
use ragstudio::catalog::models::{LOCAL_MODELS, local_model};
use ragstudio::catalog::{ModelSelection, Provider};
use ragstudio::download::{
    DownloadEvent, DownloadManager, DownloadPhase, DownloadRequest, DownloadState, StartOutcome,
};
use ragstudio::legacy::NoLegacyStore;
use ragstudio::project::EmbedderType;
use ragstudio::strategy::StrategyForm;

async fn wait_for(rx: &mut tokio::sync::watch::Receiver<DownloadState>, phase: DownloadPhase) {
    tokio::time::timeout(Duration::from_secs(5), rx.wait_for(|s| s.phase == phase))
        .await
        .expect("timed out waiting for download phase")
        .unwrap();
}

#[tokio::test]
async fn test_download_completes_and_reports_listing() {
    let api = FakeApi::with_config(sample_config());
    api.script_download(vec![
        Ok(DownloadEvent::Progress { downloaded: 50, total: 200 }),
        Ok(DownloadEvent::Progress { downloaded: 200, total: 200 }),
        Ok(DownloadEvent::Done),
    ]);
    let session = api.session();
    let model = local_model("bge-small-en").unwrap();

    let (manager, mut completions) = DownloadManager::new(session.clone(), Duration::from_millis(10));
    let mut state = manager.subscribe(model.id);
    assert_eq!(manager.start(model.id, DownloadRequest::for_local_model(model)), StartOutcome::Started);
    wait_for(&mut state, DownloadPhase::Success).await;
    assert_eq!(state.borrow().progress, 100.0);

    let done = tokio::time::timeout(Duration::from_secs(5), completions.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(done.model_id, "bge-small-en");
    assert!(CacheInspector::new().is_downloaded(LOCAL_MODELS, &done.listing, "bge-small-en"));
    assert!(!manager.cancel(model.id));
}

#[tokio::test]
async fn test_second_start_is_a_no_op() {
    let api = FakeApi::with_config(sample_config());
    api.script_download(vec![
        Ok(DownloadEvent::Progress { downloaded: 1, total: 10 }),
        Ok(DownloadEvent::Done),
    ]);
    let session = api.session();
    let model = local_model("nomic-embed-text").unwrap();

    let (manager, _completions) = DownloadManager::new(session, Duration::ZERO);
    let mut state = manager.subscribe(model.id);
    assert_eq!(manager.start(model.id, DownloadRequest::for_local_model(model)), StartOutcome::Started);
    assert_eq!(manager.start(model.id, DownloadRequest::for_local_model(model)), StartOutcome::AlreadyRunning);
    assert_eq!(manager.state(model.id).phase, DownloadPhase::Downloading);

    wait_for(&mut state, DownloadPhase::Success).await;
    assert_eq!(api.download_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_error_then_retry() {
    let api = FakeApi::with_config(sample_config());
    api.script_download(vec![
        Ok(DownloadEvent::Progress { downloaded: 5, total: 10 }),
        Ok(DownloadEvent::Error { message: "disk full".into() }),
    ]);
    api.script_download(vec![Ok(DownloadEvent::Done)]);
    let session = api.session();
    let model = local_model("bge-base-en").unwrap();

    let (manager, mut completions) = DownloadManager::new(session, Duration::ZERO);
    let mut state = manager.subscribe(model.id);
    manager.start(model.id, DownloadRequest::for_local_model(model));
    wait_for(&mut state, DownloadPhase::Error).await;
    assert_eq!(state.borrow().error.as_deref(), Some("disk full"));

    assert_eq!(manager.start(model.id, DownloadRequest::for_local_model(model)), StartOutcome::Started);
    wait_for(&mut state, DownloadPhase::Success).await;
    assert!(state.borrow().error.is_none());
    assert!(completions.recv().await.is_some());
    assert_eq!(api.download_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_stream_ending_early_is_an_error() {
    let api = FakeApi::with_config(sample_config());
    api.script_download(vec![Ok(DownloadEvent::Progress { downloaded: 5, total: 10 })]);
    let model = local_model("bge-m3").unwrap();

    let (manager, _completions) = DownloadManager::new(api.session(), Duration::ZERO);
    let mut state = manager.subscribe(model.id);
    manager.start(model.id, DownloadRequest::for_local_model(model));
    wait_for(&mut state, DownloadPhase::Error).await;
    assert!(state.borrow().error.as_deref().unwrap().contains("ended"));
}

#[tokio::test]
async fn test_background_flag_survives_progress() {
    let api = FakeApi::with_config(sample_config());
    api.script_download(vec![
        Ok(DownloadEvent::Progress { downloaded: 1, total: 4 }),
        Ok(DownloadEvent::Progress { downloaded: 2, total: 4 }),
        Ok(DownloadEvent::Done),
    ]);
    let model = local_model("all-minilm-l6-v2").unwrap();

    let (manager, _completions) = DownloadManager::new(api.session(), Duration::ZERO);
    let mut state = manager.subscribe(model.id);
    manager.start(model.id, DownloadRequest::for_local_model(model));
    manager.set_background(model.id, true);
    wait_for(&mut state, DownloadPhase::Success).await;
    assert!(manager.state(model.id).background);
}

#[tokio::test]
async fn test_cancel_mid_stream_returns_to_idle() {
    let api = FakeApi::with_config(sample_config());
    api.hold_downloads.store(true, Ordering::SeqCst);
    api.script_download(vec![Ok(DownloadEvent::Progress { downloaded: 5, total: 10 })]);
    let model = local_model("bge-base-en").unwrap();

    let (manager, mut completions) = DownloadManager::new(api.session(), Duration::ZERO);
    let mut state = manager.subscribe(model.id);
    manager.start(model.id, DownloadRequest::for_local_model(model));
    tokio::time::timeout(Duration::from_secs(5), state.wait_for(|s| s.progress > 0.0))
        .await
        .unwrap()
        .unwrap();

    assert!(manager.cancel(model.id));
    assert_eq!(manager.state(model.id), DownloadState::default());
    assert!(!manager.cancel(model.id));

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(manager.state(model.id).phase, DownloadPhase::Idle);
    assert!(completions.try_recv().is_err());

    // a cancelled download can be started again
    api.hold_downloads.store(false, Ordering::SeqCst);
    api.script_download(vec![Ok(DownloadEvent::Done)]);
    assert_eq!(manager.start(model.id, DownloadRequest::for_local_model(model)), StartOutcome::Started);
    wait_for(&mut state, DownloadPhase::Success).await;
    let done = tokio::time::timeout(Duration::from_secs(5), completions.recv()).await.unwrap().unwrap();
    assert_eq!(done.model_id, "bge-base-en");
}

#[tokio::test]
async fn test_finished_download_is_selected_in_its_form() {
    let api = FakeApi::with_config(sample_config());
    api.script_download(vec![
        Ok(DownloadEvent::Progress { downloaded: 10, total: 20 }),
        Ok(DownloadEvent::Done),
    ]);
    let session = api.session();
    let model = local_model("bge-small-en").unwrap();

    let mut form = StrategyForm::open(&session, "main", Some("fast"), None, &NoLegacyStore).await.unwrap();
    form.fields.select_provider(Provider::OllamaLocal);

    let (manager, mut completions) = DownloadManager::new(session.clone(), Duration::from_millis(10));
    assert_eq!(form.start_download(&manager, model), StartOutcome::Started);
    // the user moves on while the download runs
    form.fields.select_model(ModelSelection::Listed("nomic-embed-text".into()));

    let done = tokio::time::timeout(Duration::from_secs(5), completions.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(form.apply_download(&done));
    assert_eq!(form.fields.provider, Provider::OllamaLocal);
    assert_eq!(form.fields.model, ModelSelection::Listed("bge-small-en".into()));
    assert_eq!(form.fields.dimension, Some(384));
    assert_eq!(form.build(None).unwrap().kind, EmbedderType::Universal);

    // only once, and only for the download this form started
    assert!(!form.apply_download(&done));
}
