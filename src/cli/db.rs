use anyhow::{Context as _, Result, bail};
use console::style;
use dialoguer::Select;

use ragstudio::database::{CreateDraft, DatabaseModal, ModalMode, ModalOutcome};
use ragstudio::error::FormError;
use ragstudio::notice::save_failure_notices;
use ragstudio::project::StoreType;

use super::{Context, confirm_destructive, interactive, print_notices};

pub async fn list(ctx: &Context) -> Result<()> {
    let project = ctx.session.project_config().await?;
    let databases = project.databases();
    if databases.is_empty() {
        println!("No databases in {}.", ctx.session.project);
        return Ok(());
    }

    for db in databases {
        println!(
            "{} {}",
            style(&db.name).bold(),
            style(format!("({}, {})", db.store_type, db.config.distance_function.as_deref().unwrap_or("-"))).dim()
        );
        println!(
            "  Embedding:  {} strateg{}, default {}",
            db.embedding_strategies.len(),
            if db.embedding_strategies.len() == 1 { "y" } else { "ies" },
            db.default_embedding_strategy.as_deref().unwrap_or("none")
        );
        println!(
            "  Retrieval:  {} strateg{}, default {}",
            db.retrieval_strategies.len(),
            if db.retrieval_strategies.len() == 1 { "y" } else { "ies" },
            db.default_retrieval_strategy.as_deref().unwrap_or("none")
        );
        let datasets: Vec<&str> = project.datasets_using(&db.name).iter().map(|d| d.name.as_str()).collect();
        if !datasets.is_empty() {
            println!("  Datasets:   {}", datasets.join(", "));
        }
        println!();
    }
    Ok(())
}

fn report(result: Result<ModalOutcome, FormError>) -> Result<ModalOutcome> {
    match result {
        Ok(outcome) => Ok(outcome),
        Err(e) => {
            print_notices(&save_failure_notices(&e));
            Err(e.into())
        }
    }
}

pub async fn create(
    ctx: &Context,
    name: &str,
    store_type: &str,
    distance: &str,
    copy_from: Option<&str>,
    default_embedding: Option<&str>,
    default_retrieval: Option<&str>,
) -> Result<()> {
    let store_type: StoreType = store_type.parse().map_err(anyhow::Error::msg)?;
    let mut draft = CreateDraft::new(name, store_type);
    draft.distance_function = distance.to_string();
    draft.default_embedding_strategy = default_embedding.map(str::to_string);
    draft.default_retrieval_strategy = default_retrieval.map(str::to_string);

    if let Some(source) = copy_from {
        let project = ctx.session.project_config().await?;
        let source = project
            .database(source)
            .with_context(|| format!("Database '{source}' not found"))?;
        draft.copy_strategies_from(source);
    }

    let mut modal = DatabaseModal::create(draft);
    if let ModalOutcome::Created(db) = report(modal.submit(&ctx.session).await)? {
        println!("  {} Created database '{}' ({})", style("✓").green().bold(), db.name, db.store_type);
        if let Some(default) = &db.default_embedding_strategy {
            println!("    Default embedding strategy: {default}");
        }
    }
    Ok(())
}

pub async fn edit(
    ctx: &Context,
    name: &str,
    rename: Option<&str>,
    store_type: Option<&str>,
    distance: Option<&str>,
) -> Result<()> {
    let project = ctx.session.project_config().await?;
    let db = project
        .database(name)
        .with_context(|| format!("Database '{name}' not found"))?;

    let mut modal = DatabaseModal::edit(db);
    if let ModalMode::Edit(draft) = &mut modal.mode {
        if let Some(rename) = rename {
            draft.name = rename.to_string();
        }
        if let Some(store_type) = store_type {
            draft.store_type = store_type.parse().map_err(anyhow::Error::msg)?;
        }
        if let Some(distance) = distance {
            draft.distance_function = Some(distance.to_string());
        }
    }

    match report(modal.submit(&ctx.session).await)? {
        ModalOutcome::Updated { changed: false, .. } => println!("No changes to '{name}'."),
        ModalOutcome::Updated { name: new_name, .. } => {
            println!("  {} Updated database '{new_name}'", style("✓").green().bold())
        }
        _ => {}
    }
    Ok(())
}

pub async fn delete(ctx: &Context, name: &str, reassign_to: Option<&str>, yes: bool) -> Result<()> {
    let project = ctx.session.project_config().await?;
    let db = project
        .database(name)
        .with_context(|| format!("Database '{name}' not found"))?;

    let mut modal = DatabaseModal::edit(db);
    modal.request_delete(&project)?;
    let ModalMode::ConfirmingDelete { plan, .. } = &mut modal.mode else {
        bail!("Could not start deleting '{name}'");
    };

    if plan.needs_reassignment() {
        println!(
            "{} dataset(s) use '{name}': {}",
            plan.datasets.len(),
            plan.datasets.join(", ")
        );
        match reassign_to {
            Some(target) => plan.choose(target).map_err(|e| anyhow::anyhow!(e.message))?,
            None if interactive() && !plan.candidates.is_empty() => {
                let picked = Select::new()
                    .with_prompt("Move them to")
                    .items(&plan.candidates)
                    .default(0)
                    .interact_opt()?;
                let Some(index) = picked else {
                    println!("Cancelled.");
                    return Ok(());
                };
                let target = plan.candidates[index].clone();
                plan.choose(&target).map_err(|e| anyhow::anyhow!(e.message))?;
            }
            None => {}
        }
    }

    if !confirm_destructive(format!("Delete database '{name}'?"), yes)? {
        modal.cancel_delete();
        println!("Cancelled.");
        return Ok(());
    }

    if let ModalOutcome::Deleted { name, reassigned_to } = report(modal.submit(&ctx.session).await)? {
        match reassigned_to {
            Some(target) => println!(
                "  {} Deleted '{name}', datasets moved to '{target}'",
                style("✓").green().bold()
            ),
            None => println!("  {} Deleted '{name}'", style("✓").green().bold()),
        }
    }
    Ok(())
}
