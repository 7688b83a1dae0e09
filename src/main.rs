mod cli;

use clap::Parser;
use cli::{
    Cli, Command, Context, DbAction, ModelsAction, ParserAction, RetrievalAction, StrategyAction,
};
use ragstudio::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // stdout carries command output (`strategy show --json`, `parser render`)
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ragstudio=info".into()),
        )
        .init();

    let cfg = Config::load()?;
    let project = cli.project.as_deref();
    let namespace = cli.namespace.as_deref();

    match cli.command {
        Command::Init { server } => cli::init::run(cfg, server.as_deref(), project, namespace).await,
        Command::Db { action } => {
            let ctx = Context::connect(&cfg, project, namespace)?;
            match action {
                DbAction::List => cli::db::list(&ctx).await,
                DbAction::Create {
                    name,
                    store_type,
                    distance,
                    copy_from,
                    default_embedding,
                    default_retrieval,
                } => {
                    cli::db::create(
                        &ctx,
                        &name,
                        &store_type,
                        &distance,
                        copy_from.as_deref(),
                        default_embedding.as_deref(),
                        default_retrieval.as_deref(),
                    )
                    .await
                }
                DbAction::Edit { name, rename, store_type, distance } => {
                    cli::db::edit(&ctx, &name, rename.as_deref(), store_type.as_deref(), distance.as_deref()).await
                }
                DbAction::Delete { name, reassign_to, yes } => {
                    cli::db::delete(&ctx, &name, reassign_to.as_deref(), yes).await
                }
            }
        }
        Command::Strategy { action } => {
            let ctx = Context::connect(&cfg, project, namespace)?;
            match action {
                StrategyAction::List { database } => cli::strategy::list(&ctx, &database).await,
                StrategyAction::Show { database, name, json } => {
                    cli::strategy::show(&ctx, &database, &name, json).await
                }
                StrategyAction::Save(args) => cli::strategy::save(&ctx, &args).await,
                StrategyAction::Remove { database, name, yes } => {
                    cli::strategy::remove(&ctx, &database, &name, yes).await
                }
            }
        }
        Command::Retrieval { action } => {
            let ctx = Context::connect(&cfg, project, namespace)?;
            match action {
                RetrievalAction::Save(args) => cli::retrieval::save(&ctx, &args).await,
                RetrievalAction::Remove { database, name, yes } => {
                    cli::retrieval::remove(&ctx, &database, &name, yes).await
                }
            }
        }
        Command::Models { action } => {
            let ctx = Context::connect_global(&cfg, namespace)?;
            match action {
                ModelsAction::List { provider } => cli::models::list(&ctx, provider.as_deref()).await,
                ModelsAction::Download { model, background, force } => {
                    cli::models::download(&ctx, &model, background, force).await
                }
            }
        }
        Command::Preview { database, file_hash, strategy, chunks } => {
            let ctx = Context::connect(&cfg, project, namespace)?;
            cli::preview::run(&ctx, &database, &file_hash, strategy.as_deref(), chunks).await
        }
        Command::Parser { action } => match action {
            ParserAction::Render { schema, current, edits } => {
                cli::parser::render(&schema, current.as_deref(), &edits)
            }
        },
    }
}
