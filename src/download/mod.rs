//! Model download client.
//!
//! The server does the downloading and reports progress as a stream of events. This
//! module owns one consuming task per model id and publishes its state through a
//! `watch` channel, so any number of views can attach to or detach from a download
//! without affecting it. Backgrounding a download only flips a flag on that state.
//!
//! idle ──start──▶ downloading ──done──▶ success
//!                      │
//!                      └──error──▶ error ──start──▶ downloading

use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::api::Session;
use crate::catalog::cache::CachedModel;
use crate::catalog::models::LocalModel;

/// One frame of the server's download stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum DownloadEvent {
    Progress { downloaded: u64, total: u64 },
    Done,
    Error { message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DownloadRequest {
    pub model_name: String,
    pub provider: String,
}

impl DownloadRequest {
    /// Repo-backed models are fetched for the universal runtime, the rest are pulled
    /// through Ollama.
    pub fn for_local_model(model: &LocalModel) -> Self {
        match model.repo_id {
            Some(repo) => Self { model_name: repo.to_string(), provider: "universal".into() },
            None => Self { model_name: model.id.to_string(), provider: "ollama".into() },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadPhase {
    Idle,
    Downloading,
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DownloadState {
    pub phase: DownloadPhase,
    /// 0–100
    pub progress: f64,
    pub downloaded_bytes: u64,
    pub total_bytes: u64,
    pub eta: Option<Duration>,
    pub error: Option<String>,
    /// Shown as a corner indicator instead of in the confirmation dialog.
    pub background: bool,
}

impl Default for DownloadState {
    fn default() -> Self {
        Self {
            phase: DownloadPhase::Idle,
            progress: 0.0,
            downloaded_bytes: 0,
            total_bytes: 0,
            eta: None,
            error: None,
            background: false,
        }
    }
}

/// Sent once a download succeeded, after the listing refetch and the select delay.
#[derive(Debug, Clone)]
pub struct Completion {
    pub model_id: String,
    pub listing: Vec<CachedModel>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started,
    AlreadyRunning,
}

pub fn progress_percent(downloaded: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (downloaded as f64 * 100.0 / total as f64).min(100.0)
}

/// Remaining bytes over the average rate since the download started.
pub fn estimate_eta(downloaded: u64, total: u64, elapsed: Duration) -> Option<Duration> {
    if total == 0 || downloaded == 0 || elapsed.is_zero() {
        return None;
    }
    let rate = downloaded as f64 / elapsed.as_secs_f64();
    let remaining = total.saturating_sub(downloaded) as f64;
    Some(Duration::from_secs_f64(remaining / rate))
}

struct Entry {
    state: watch::Sender<DownloadState>,
    task: Option<JoinHandle<()>>,
    /// Bumped by every start and cancel; a task only publishes for its own run.
    generation: Arc<AtomicU64>,
}

impl Entry {
    fn idle() -> Self {
        let (state, _) = watch::channel(DownloadState::default());
        Self { state, task: None, generation: Arc::new(AtomicU64::new(0)) }
    }
}

/// The consuming task's handle on its entry.
struct Run {
    state: watch::Sender<DownloadState>,
    current: Arc<AtomicU64>,
    generation: u64,
}

impl Run {
    fn is_current(&self) -> bool {
        self.current.load(Ordering::SeqCst) == self.generation
    }

    /// Checked under the channel's write lock, so a cancelled run can't overwrite
    /// the reset state.
    fn publish(&self, f: impl FnOnce(&mut DownloadState)) {
        self.state.send_if_modified(|s| {
            if !self.is_current() {
                return false;
            }
            f(s);
            true
        });
    }
}

#[derive(Clone)]
pub struct DownloadManager {
    session: Session,
    entries: Arc<Mutex<HashMap<String, Entry>>>,
    completions: mpsc::UnboundedSender<Completion>,
    select_delay: Duration,
}

impl DownloadManager {
    pub fn new(session: Session, select_delay: Duration) -> (Self, mpsc::UnboundedReceiver<Completion>) {
        let (completions, rx) = mpsc::unbounded_channel();
        let manager = Self {
            session,
            entries: Arc::new(Mutex::new(HashMap::new())),
            completions,
            select_delay,
        };
        (manager, rx)
    }

    fn with_entry<T>(&self, model_id: &str, f: impl FnOnce(&mut Entry) -> T) -> T {
        let mut entries = self.entries.lock().unwrap_or_else(|p| p.into_inner());
        let entry = entries.entry(model_id.to_string()).or_insert_with(Entry::idle);
        f(entry)
    }

    /// Starts consuming a download for `model_id`. A second start while the first is
    /// still downloading does nothing.
    pub fn start(&self, model_id: &str, request: DownloadRequest) -> StartOutcome {
        self.with_entry(model_id, |entry| {
            if entry.state.borrow().phase == DownloadPhase::Downloading {
                tracing::debug!("Download of {model_id} already running");
                return StartOutcome::AlreadyRunning;
            }
            entry.state.send_replace(DownloadState {
                phase: DownloadPhase::Downloading,
                ..DownloadState::default()
            });

            let run = Run {
                state: entry.state.clone(),
                current: entry.generation.clone(),
                generation: entry.generation.fetch_add(1, Ordering::SeqCst) + 1,
            };
            let task = tokio::spawn(consume(
                self.session.clone(),
                model_id.to_string(),
                request,
                run,
                self.completions.clone(),
                self.select_delay,
            ));
            entry.task = Some(task);
            tracing::info!("Started download of {model_id}");
            StartOutcome::Started
        })
    }

    /// Attaches an observer. Dropping the receiver detaches it.
    pub fn subscribe(&self, model_id: &str) -> watch::Receiver<DownloadState> {
        self.with_entry(model_id, |entry| entry.state.subscribe())
    }

    pub fn state(&self, model_id: &str) -> DownloadState {
        self.with_entry(model_id, |entry| entry.state.borrow().clone())
    }

    pub fn set_background(&self, model_id: &str, background: bool) {
        self.with_entry(model_id, |entry| {
            entry.state.send_modify(|s| s.background = background);
        });
    }

    /// Aborts a running download and returns it to idle. No completion is sent for it.
    pub fn cancel(&self, model_id: &str) -> bool {
        self.with_entry(model_id, |entry| {
            if entry.state.borrow().phase != DownloadPhase::Downloading {
                return false;
            }
            entry.generation.fetch_add(1, Ordering::SeqCst);
            if let Some(task) = entry.task.take() {
                task.abort();
            }
            entry.state.send_replace(DownloadState::default());
            tracing::info!("Cancelled download of {model_id}");
            true
        })
    }
}

fn fail(run: &Run, model_id: &str, message: String) {
    if !run.is_current() {
        return;
    }
    tracing::warn!("Download of {model_id} failed: {message}");
    run.publish(|s| {
        s.phase = DownloadPhase::Error;
        s.eta = None;
        s.error = Some(message);
    });
}

async fn consume(
    session: Session,
    model_id: String,
    request: DownloadRequest,
    run: Run,
    completions: mpsc::UnboundedSender<Completion>,
    select_delay: Duration,
) {
    let started = Instant::now();
    let mut events = match session.api.download_model(&request).await {
        Ok(events) => events,
        Err(e) => return fail(&run, &model_id, e.to_string()),
    };

    while let Some(event) = events.next().await {
        match event {
            Ok(DownloadEvent::Progress { downloaded, total }) => {
                let eta = estimate_eta(downloaded, total, started.elapsed());
                run.publish(|s| {
                    s.downloaded_bytes = downloaded;
                    s.total_bytes = total;
                    s.progress = progress_percent(downloaded, total);
                    s.eta = eta;
                });
            }
            Ok(DownloadEvent::Done) => {
                if !run.is_current() {
                    return;
                }
                run.publish(|s| {
                    s.phase = DownloadPhase::Success;
                    s.progress = 100.0;
                    s.eta = None;
                    s.error = None;
                });
                tracing::info!("Download of {model_id} finished");

                let listing = match session.cached_models(true).await {
                    Ok(listing) => listing,
                    Err(e) => {
                        tracing::warn!("Failed to refresh model cache listing: {e}");
                        Vec::new()
                    }
                };
                // let the success state render before the picker moves on
                tokio::time::sleep(select_delay).await;
                if run.is_current() {
                    let _ = completions.send(Completion { model_id, listing });
                }
                return;
            }
            Ok(DownloadEvent::Error { message }) => return fail(&run, &model_id, message),
            Err(e) => return fail(&run, &model_id, e.to_string()),
        }
    }

    fail(&run, &model_id, "Download stream ended before completion".into());
}
