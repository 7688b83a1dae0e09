use anyhow::{Context as _, Result, bail};
use console::style;
use std::io::Write;
use std::time::Duration;

use ragstudio::catalog::cache::{CacheInspector, format_bytes, matches};
use ragstudio::catalog::models::{LOCAL_MODELS, cloud_models, local_model, local_model_by_repo};
use ragstudio::catalog::{Provider, Runtime};
use ragstudio::catalog::models::LocalModel;
use ragstudio::download::{
    Completion, DownloadManager, DownloadPhase, DownloadRequest, DownloadState, StartOutcome,
};

use super::Context;

/// List cloud and local embedding models
pub async fn list(ctx: &Context, provider: Option<&str>) -> Result<()> {
    let only: Option<Provider> = provider.map(str::parse::<Provider>).transpose().map_err(anyhow::Error::msg)?;

    for p in Runtime::Cloud.providers() {
        if only.is_some_and(|o| o != p) {
            continue;
        }
        println!("{} {}", style(p.label()).bold(), style(format!("({})", p.key())).dim());
        for m in cloud_models(p) {
            println!("  {:<36} {:>5} dims  {:>5} tokens", m.id, m.dim, m.max_tokens);
        }
        println!();
    }

    if only.is_some_and(|o| o != Provider::OllamaLocal) {
        return Ok(());
    }

    let listing = match ctx.session.cached_models(false).await {
        Ok(listing) => Some(listing),
        Err(e) => {
            tracing::warn!("Failed to read model cache: {e}");
            None
        }
    };
    let mut inspector = CacheInspector::new();
    let variants = inspector.variants(LOCAL_MODELS, listing.as_deref().unwrap_or(&[]));

    println!(
        "{} {}",
        style(Provider::OllamaLocal.label()).bold(),
        style(format!("({})", Provider::OllamaLocal.key())).dim()
    );
    for v in variants {
        let status = match (listing.is_some(), v.is_downloaded) {
            (false, _) => style("?".to_string()).dim(),
            (true, true) => style(format!(
                "✓ {}",
                v.disk_size_bytes.map(format_bytes).unwrap_or_default()
            ))
            .green(),
            (true, false) => style(format!("↓ {}", v.download_size)).dim(),
        };
        println!("  {:<24} {:<24} {:>5} dims  {:<7} {}", v.id, v.label, v.dim, v.quality, status);
    }
    if listing.is_none() {
        println!("  {}", style("Download state unknown: the server's model cache could not be read").yellow());
    }
    Ok(())
}

fn render(state: &DownloadState) -> String {
    let eta = state
        .eta
        .map(|eta| format!(", {} left", format_eta(eta)))
        .unwrap_or_default();
    if state.background {
        return format!("{:>3.0}%{eta}", state.progress);
    }
    const WIDTH: usize = 30;
    let filled = ((state.progress / 100.0) * WIDTH as f64).round() as usize;
    format!(
        "[{}{}] {:>5.1}%  {} / {}{eta}",
        "=".repeat(filled.min(WIDTH)),
        " ".repeat(WIDTH - filled.min(WIDTH)),
        state.progress,
        format_bytes(state.downloaded_bytes),
        format_bytes(state.total_bytes),
    )
}

fn format_eta(eta: Duration) -> String {
    let secs = eta.as_secs();
    if secs >= 60 {
        format!("{}m {:02}s", secs / 60, secs % 60)
    } else {
        format!("{secs}s")
    }
}

/// Download a local model through the server
pub async fn download(ctx: &Context, model_id: &str, background: bool, force: bool) -> Result<()> {
    let model = local_model(model_id)
        .or_else(|| local_model_by_repo(model_id))
        .with_context(|| format!("Unknown local model '{model_id}'. Run `ragstudio models list --provider local`."))?;

    if !force {
        let listing = ctx.session.cached_models(true).await?;
        if CacheInspector::new().is_downloaded(LOCAL_MODELS, &listing, model.id) {
            println!("  {} {} is already downloaded", style("✓").green(), model.label);
            return Ok(());
        }
    }

    let (manager, mut completions) = DownloadManager::new(ctx.session.clone(), ctx.cfg.auto_select_delay());
    let state = manager.subscribe(model.id);
    if manager.start(model.id, DownloadRequest::for_local_model(model)) == StartOutcome::AlreadyRunning {
        tracing::debug!("Attached to running download of {}", model.id);
    }
    manager.set_background(model.id, background);

    if let Some(done) = follow(&manager, state, &mut completions, model).await? {
        report_done(&done, model);
    }
    Ok(())
}

/// Renders a started download until it finishes. Ctrl-C cancels it and yields `None`.
pub async fn follow(
    manager: &DownloadManager,
    mut state: tokio::sync::watch::Receiver<DownloadState>,
    completions: &mut tokio::sync::mpsc::UnboundedReceiver<Completion>,
    model: &LocalModel,
) -> Result<Option<Completion>> {
    println!("Downloading {} ({})", style(model.label).bold(), model.download_size);
    loop {
        tokio::select! {
            changed = state.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = state.borrow_and_update().clone();
                match snapshot.phase {
                    DownloadPhase::Downloading => {
                        print!("\r  {}", render(&snapshot));
                        std::io::stdout().flush()?;
                    }
                    DownloadPhase::Success => {
                        println!();
                        break;
                    }
                    DownloadPhase::Error => {
                        println!();
                        bail!(
                            "Download of {} failed: {}",
                            model.label,
                            snapshot.error.unwrap_or_else(|| "unknown error".into())
                        );
                    }
                    DownloadPhase::Idle => {}
                }
            }
            _ = tokio::signal::ctrl_c() => {
                manager.cancel(model.id);
                println!();
                println!("Cancelled.");
                return Ok(None);
            }
        }
    }

    Ok(completions.recv().await)
}

pub fn report_done(done: &Completion, model: &LocalModel) {
    let on_disk = done
        .listing
        .iter()
        .find(|entry| matches(&entry.name, model))
        .map(|entry| format!(" ({})", format_bytes(entry.size)))
        .unwrap_or_default();
    println!("  {} {} downloaded{on_disk}", style("✓").green().bold(), model.label);
}
