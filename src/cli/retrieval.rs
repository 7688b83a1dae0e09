use anyhow::{Context as _, Result};
use clap::Args;
use console::style;

use ragstudio::notice::save_failure_notices;
use ragstudio::project::RetrievalType;
use ragstudio::strategy::remove::remove_retrieval_strategy;
use ragstudio::strategy::{RetrievalDraft, save_retrieval};

use super::{Context, confirm_destructive, parse_pairs, print_notices};

#[derive(Args)]
pub struct SaveArgs {
    pub database: String,
    pub name: String,

    #[arg(long)]
    pub rename: Option<String>,

    /// Retrieval type, e.g. BasicSimilarityStrategy or RerankedStrategy
    #[arg(long = "type")]
    pub kind: Option<String>,

    /// key=value config entry; replaces the whole config when given
    #[arg(long = "config", value_name = "KEY=VALUE")]
    pub config: Vec<String>,

    /// Make this the database's default retrieval strategy
    #[arg(long = "default")]
    pub make_default: bool,
}

pub async fn save(ctx: &Context, args: &SaveArgs) -> Result<()> {
    let project = ctx.session.project_config().await?;
    let db = project
        .database(&args.database)
        .with_context(|| format!("Database '{}' not found", args.database))?;

    let existing = db.retrieval_strategy(&args.name);
    let mut draft = match existing {
        Some(strategy) => RetrievalDraft::from_strategy(strategy),
        None => RetrievalDraft::new(
            args.name.clone(),
            args.kind
                .clone()
                .map(RetrievalType::from)
                .unwrap_or(RetrievalType::BasicSimilarity),
        ),
    };
    if let Some(kind) = &args.kind {
        draft.kind = RetrievalType::from(kind.clone());
    }
    if let Some(rename) = &args.rename {
        draft.name = rename.clone();
    }
    if !args.config.is_empty() {
        draft.config = parse_pairs(&args.config)?;
    }
    draft.make_default = args.make_default;

    let original = existing.map(|s| s.name.as_str());
    match save_retrieval(&ctx.session, &args.database, original, &draft).await {
        Ok(plan) => {
            let verb = if original.is_some() { "Updated" } else { "Created" };
            println!("  {} {verb} retrieval strategy '{}'", style("✓").green().bold(), draft.name.trim());
            if plan.default_changed {
                println!("    Now the default retrieval strategy for '{}'", args.database);
            }
            Ok(())
        }
        Err(e) => {
            print_notices(&save_failure_notices(&e));
            Err(e.into())
        }
    }
}

pub async fn remove(ctx: &Context, database: &str, name: &str, yes: bool) -> Result<()> {
    if !confirm_destructive(format!("Remove retrieval strategy '{name}' from '{database}'?"), yes)? {
        println!("Cancelled.");
        return Ok(());
    }
    match remove_retrieval_strategy(&ctx.session, database, name).await {
        Ok(plan) => {
            println!("  {} Removed '{name}'", style("✓").green().bold());
            if let Some(default) = plan.update.default_retrieval_strategy {
                match default {
                    Some(next) => println!("    Default is now '{next}'"),
                    None => println!("    No retrieval strategies left; default cleared"),
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
