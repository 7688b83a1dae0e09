use anyhow::{Context as _, Result, bail};
use clap::Args;
use console::style;
use dialoguer::{Confirm, Select};
use std::path::{Path, PathBuf};

use ragstudio::catalog::cache::CacheInspector;
use ragstudio::catalog::models::{LOCAL_MODELS, local_model};
use ragstudio::catalog::{ModelSelection, Provider};
use ragstudio::download::DownloadManager;
use ragstudio::legacy::LegacyStore;
use ragstudio::notice::save_failure_notices;
use ragstudio::project::ProjectConfig;
use ragstudio::strategy::remove::remove_embedding_strategy;
use ragstudio::strategy::{
    FormMode, NavigationCheck, NavigationState, Resolution, SaveOutcome, StrategyFields, StrategyForm,
    UnsavedChanges, fields_from_strategy,
};

use super::{Context, confirm_destructive, interactive, models, print_notices};

#[derive(Args)]
pub struct SaveArgs {
    pub database: String,

    /// Strategy to edit, or the name of a new one
    pub name: Option<String>,

    /// New name for an existing strategy
    #[arg(long)]
    pub rename: Option<String>,

    /// local, ollama, openai, azure, google, bedrock or cohere
    #[arg(long)]
    pub provider: Option<Provider>,

    /// Model from the provider's list
    #[arg(long, conflicts_with = "custom_model")]
    pub model: Option<String>,

    /// Model id not in the provider's list
    #[arg(long)]
    pub custom_model: Option<String>,

    #[arg(long)]
    pub dimension: Option<i64>,
    #[arg(long)]
    pub batch_size: Option<i64>,
    /// Request timeout in seconds
    #[arg(long)]
    pub timeout: Option<i64>,
    #[arg(long)]
    pub base_url: Option<String>,
    #[arg(long)]
    pub organization: Option<String>,
    #[arg(long)]
    pub max_retries: Option<i64>,
    #[arg(long)]
    pub deployment: Option<String>,
    #[arg(long)]
    pub endpoint: Option<String>,
    #[arg(long)]
    pub api_version: Option<String>,
    #[arg(long)]
    pub project_id: Option<String>,
    #[arg(long)]
    pub region: Option<String>,
    #[arg(long)]
    pub auto_pull: Option<bool>,

    /// Encrypted with the client secret before it is sent
    #[arg(long, env = "RAGSTUDIO_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    #[arg(long)]
    pub priority: Option<i64>,

    /// Make this the database's default embedding strategy
    #[arg(long = "default")]
    pub make_default: bool,

    /// Navigation-state JSON to start from, as printed by `strategy show --json`
    #[arg(long)]
    pub state: Option<PathBuf>,

    /// Download the selected local model first if it is not on disk
    #[arg(long)]
    pub download: bool,
}

impl SaveArgs {
    fn apply(&self, fields: &mut StrategyFields) {
        if let Some(provider) = self.provider {
            fields.select_provider(provider);
        }
        if let Some(model) = &self.model {
            fields.select_model(ModelSelection::resolve(fields.provider, model));
        }
        if let Some(model) = &self.custom_model {
            fields.select_model(ModelSelection::Custom(model.clone()));
        }
        if let Some(name) = &self.rename {
            fields.name = name.clone();
        }
        set(&mut fields.dimension, self.dimension.map(Some));
        set(&mut fields.batch_size, self.batch_size.map(Some));
        set(&mut fields.timeout_secs, self.timeout.map(Some));
        set(&mut fields.max_retries, self.max_retries.map(Some));
        set(&mut fields.base_url, self.base_url.clone());
        set(&mut fields.organization, self.organization.clone());
        set(&mut fields.deployment, self.deployment.clone());
        set(&mut fields.endpoint, self.endpoint.clone());
        set(&mut fields.api_version, self.api_version.clone());
        set(&mut fields.project_id, self.project_id.clone());
        set(&mut fields.region, self.region.clone());
        set(&mut fields.auto_pull, self.auto_pull);
        set(&mut fields.api_key, self.api_key.clone());
        set(&mut fields.priority, self.priority);
        if self.make_default {
            fields.make_default = true;
        }
    }
}

fn set<T>(field: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *field = value;
    }
}

pub async fn list(ctx: &Context, database: &str) -> Result<()> {
    let project = ctx.session.project_config().await?;
    let db = project
        .database(database)
        .with_context(|| format!("Database '{database}' not found"))?;

    println!("{}", style("Embedding strategies").bold());
    if db.embedding_strategies.is_empty() {
        println!("  (none)");
    }
    for s in &db.embedding_strategies {
        let marker = if db.is_default_embedding(&s.name) { style(" default").green().to_string() } else { String::new() };
        let model = s.config.get("model").and_then(|m| m.as_str()).unwrap_or("-");
        println!("  {} {}  {}  priority {}{marker}", s.name, style(&s.kind).dim(), model, s.priority);
    }
    println!();
    println!("{}", style("Retrieval strategies").bold());
    if db.retrieval_strategies.is_empty() {
        println!("  (none)");
    }
    for s in &db.retrieval_strategies {
        let marker = if s.default || db.is_default_retrieval(&s.name) {
            style(" default").green().to_string()
        } else {
            String::new()
        };
        println!("  {} {}{marker}", s.name, style(&s.kind).dim());
    }
    Ok(())
}

pub async fn show(ctx: &Context, database: &str, name: &str, json: bool) -> Result<()> {
    let project = ctx.session.project_config().await?;
    let db = project
        .database(database)
        .with_context(|| format!("Database '{database}' not found"))?;
    let strategy = db
        .embedding_strategy(name)
        .with_context(|| format!("Strategy '{name}' not found in '{database}'"))?;

    if json {
        let state = NavigationState {
            database: database.to_string(),
            strategy_name: Some(strategy.name.clone()),
            strategy_type: Some(strategy.kind.to_string()),
            current_config: Some(strategy.config.clone()),
            is_default: db.is_default_embedding(name),
            priority: Some(strategy.priority),
        };
        println!("{}", serde_json::to_string_pretty(&state)?);
        return Ok(());
    }

    println!("Name:       {}", strategy.name);
    println!("Type:       {}", strategy.kind);
    println!("Priority:   {}", strategy.priority);
    println!("Default:    {}", if db.is_default_embedding(name) { "yes" } else { "no" });
    match fields_from_strategy(strategy) {
        Some(fields) => {
            println!("Provider:   {}", fields.provider);
            let custom = if matches!(fields.model, ModelSelection::Custom(_)) { " (custom)" } else { "" };
            println!("Model:      {}{custom}", fields.model.id());
            if let Some(dim) = fields.dimension {
                println!("Dimension:  {dim}");
            }
            println!("API key:    {}", if fields.stored_api_key.is_some() { "stored (encrypted)" } else { "none" });
        }
        None => println!("{}", style("This strategy type can't be edited here.").yellow()),
    }
    println!("Config:");
    for (key, value) in &strategy.config {
        let shown = if key == "api_key" { "••••••".to_string() } else { value.to_string() };
        println!("  {key} = {shown}");
    }
    Ok(())
}

fn load_state(path: &Path) -> Result<NavigationState> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&contents).context("Invalid navigation state")
}

/// Edit mode when the name is already on the server, create mode otherwise.
async fn open_form(
    ctx: &Context,
    project: &ProjectConfig,
    args: &SaveArgs,
    legacy: &dyn LegacyStore,
) -> Result<StrategyForm> {
    let nav = args.state.as_deref().map(load_state).transpose()?;
    let existing = args
        .name
        .as_deref()
        .filter(|n| project.database(&args.database).is_some_and(|db| db.embedding_strategy(n).is_some()));
    let named_by_state = nav.as_ref().and_then(|n| n.strategy_name.clone());

    let mut form = match existing {
        Some(name) => StrategyForm::open(&ctx.session, &args.database, Some(name), nav, legacy).await?,
        None => StrategyForm::open(&ctx.session, &args.database, None, nav, legacy).await?,
    };
    if existing.is_none() {
        if let Some(name) = args.name.clone().or(named_by_state) {
            form.fields.name = name;
        }
    }
    Ok(form)
}

pub async fn save(ctx: &Context, args: &SaveArgs) -> Result<()> {
    let legacy = ctx.cfg.legacy_store();
    let project = ctx.session.project_config().await?;
    let mut form = open_form(ctx, &project, args, legacy.as_ref()).await?;
    args.apply(&mut form.fields);
    if args.download {
        fetch_selected_model(ctx, &mut form).await?;
    }

    let page = format!("{}/{}", args.database, form.fields.name);
    let guard = UnsavedChanges::new();
    guard.track(&page, &form);

    if let FormMode::Edit { original_name } = &form.mode {
        if !form.is_dirty() {
            println!("No changes to '{original_name}'.");
            return Ok(());
        }
        println!("Changed: {}", form.changed_fields().join(", "));
    }

    loop {
        match form.save(&ctx.session, ctx.cfg.client_secret.as_deref(), legacy.as_ref()).await {
            Ok(outcome) => {
                guard.track(&page, &form);
                print_notices(&outcome.notices);
                offer_reembed(ctx, &args.database, &outcome).await?;
                return Ok(());
            }
            Err(e) => {
                print_notices(&save_failure_notices(&e));
                guard.track(&page, &form);
                match leave_or_retry(&guard, &page)? {
                    Resolution::Save => continue,
                    Resolution::Discard => {
                        println!("Changes discarded.");
                        return Ok(());
                    }
                    Resolution::Cancel => bail!("Strategy not saved"),
                }
            }
        }
    }
}

/// Downloads the form's local model if it is not on disk yet, then selects it.
async fn fetch_selected_model(ctx: &Context, form: &mut StrategyForm) -> Result<()> {
    let model = local_model(form.fields.model.id())
        .filter(|_| form.fields.provider == Provider::OllamaLocal)
        .with_context(|| format!("'{}' is not a downloadable local model", form.fields.model.id()))?;
    let listing = ctx.session.cached_models(true).await?;
    if CacheInspector::new().is_downloaded(LOCAL_MODELS, &listing, model.id) {
        tracing::debug!("{} already downloaded", model.id);
        return Ok(());
    }

    let (manager, mut completions) = DownloadManager::new(ctx.session.clone(), ctx.cfg.auto_select_delay());
    let state = manager.subscribe(model.id);
    form.start_download(&manager, model);
    let Some(done) = models::follow(&manager, state, &mut completions, model).await? else {
        bail!("Download cancelled; strategy not saved");
    };
    models::report_done(&done, model);
    form.apply_download(&done);
    Ok(())
}

/// Asks what to do with a form whose save failed. Without a terminal the changes
/// are kept unsaved and the command fails.
fn leave_or_retry(guard: &UnsavedChanges, page: &str) -> Result<Resolution> {
    let NavigationCheck::Confirm { last_error, .. } = guard.check_navigation() else {
        return Ok(Resolution::Cancel);
    };
    if !interactive() {
        return Ok(Resolution::Cancel);
    }
    if let Some(error) = last_error {
        println!("  {} Last error: {error}", style("⚠").yellow());
    }
    let choice = Select::new()
        .with_prompt("You have unsaved changes")
        .items(&["Retry save", "Discard changes", "Keep editing"])
        .default(0)
        .interact()?;
    let resolution = match choice {
        0 => Resolution::Save,
        1 => Resolution::Discard,
        _ => Resolution::Cancel,
    };
    guard.resolve(page, resolution);
    Ok(resolution)
}

async fn offer_reembed(ctx: &Context, database: &str, outcome: &SaveOutcome) -> Result<()> {
    if !outcome.default_changed {
        return Ok(());
    }
    let project = ctx.session.project_config().await?;
    let datasets: Vec<String> = project
        .datasets_using(database)
        .iter()
        .map(|d| d.name.clone())
        .collect();
    println!(
        "  {} '{}' is now the default embedding strategy{}",
        style("ℹ").blue(),
        outcome.strategy,
        outcome
            .previous_default
            .as_ref()
            .map(|p| format!(" (was '{p}')"))
            .unwrap_or_default()
    );
    if datasets.is_empty() {
        return Ok(());
    }

    let now = interactive()
        && Confirm::new()
            .with_prompt(format!("Re-embed {} dataset(s) now?", datasets.len()))
            .default(false)
            .interact()?;
    if now {
        for dataset in &datasets {
            println!("  {} {dataset} queued for re-embedding", style("→").dim());
        }
    } else {
        println!(
            "  {} Existing vectors in {} stay on the old model until re-embedded",
            style("ℹ").blue(),
            datasets.join(", ")
        );
    }
    Ok(())
}

pub async fn remove(ctx: &Context, database: &str, name: &str, yes: bool) -> Result<()> {
    if !confirm_destructive(format!("Remove embedding strategy '{name}' from '{database}'?"), yes)? {
        println!("Cancelled.");
        return Ok(());
    }
    match remove_embedding_strategy(&ctx.session, database, name).await {
        Ok(plan) => {
            println!("  {} Removed '{name}'", style("✓").green().bold());
            if let Some(default) = plan.update.default_embedding_strategy {
                match default {
                    Some(next) => println!("    Default is now '{next}'"),
                    None => println!("    No embedding strategies left; default cleared"),
                }
            }
            Ok(())
        }
        Err(e) => {
            print_notices(&save_failure_notices(&e));
            Err(e.into())
        }
    }
}
