pub mod db;
pub mod init;
pub mod models;
pub mod parser;
pub mod preview;
pub mod retrieval;
pub mod strategy;

use anyhow::{Context as _, Result, bail};
use clap::{Parser, Subcommand};
use console::style;
use dialoguer::Confirm;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;

use ragstudio::api::{HttpApi, ProjectRef, Session};
use ragstudio::config::Config;
use ragstudio::notice::{Level, Notice};

#[derive(Parser)]
#[command(name = "ragstudio", about = "Configure RAG databases, strategies and embedding models.")]
#[command(version, propagate_version = true)]
pub struct Cli {
    /// Project to work on (defaults to `project` in config.toml)
    #[arg(long, global = true)]
    pub project: Option<String>,

    /// Project namespace (defaults to `namespace` in config.toml)
    #[arg(long, global = true)]
    pub namespace: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// First-time setup: server URL, default project and client secret
    Init {
        /// Designer API base URL
        #[arg(long)]
        server: Option<String>,
    },

    /// Create, edit and delete vector databases
    Db {
        #[command(subcommand)]
        action: DbAction,
    },

    /// Manage embedding strategies
    Strategy {
        #[command(subcommand)]
        action: StrategyAction,
    },

    /// Manage retrieval strategies
    Retrieval {
        #[command(subcommand)]
        action: RetrievalAction,
    },

    /// Browse and download embedding models
    Models {
        #[command(subcommand)]
        action: ModelsAction,
    },

    /// Preview how a file is chunked by a database's processing settings
    Preview {
        database: String,

        /// Hash of an uploaded file
        #[arg(long)]
        file_hash: String,

        /// Processing strategy to preview with
        #[arg(long)]
        strategy: Option<String>,

        /// Number of chunks to print
        #[arg(long, default_value = "5")]
        chunks: usize,
    },

    /// Parser and extractor settings
    Parser {
        #[command(subcommand)]
        action: ParserAction,
    },
}

#[derive(Subcommand)]
pub enum DbAction {
    /// List databases with their strategies and bound datasets
    List,
    /// Create a database
    Create {
        name: String,
        /// chroma or qdrant
        #[arg(long = "type", default_value = "chroma")]
        store_type: String,
        /// cosine, euclidean or dot
        #[arg(long, default_value = "cosine")]
        distance: String,
        /// Copy both strategy lists (and defaults) from this database
        #[arg(long)]
        copy_from: Option<String>,
        #[arg(long)]
        default_embedding: Option<String>,
        #[arg(long)]
        default_retrieval: Option<String>,
    },
    /// Rename a database or change its store settings
    Edit {
        name: String,
        #[arg(long)]
        rename: Option<String>,
        #[arg(long = "type")]
        store_type: Option<String>,
        #[arg(long)]
        distance: Option<String>,
    },
    /// Delete a database, moving its datasets to another one if needed
    Delete {
        name: String,
        #[arg(long)]
        reassign_to: Option<String>,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
pub enum StrategyAction {
    /// List embedding and retrieval strategies of a database
    List { database: String },
    /// Show one embedding strategy
    Show {
        database: String,
        name: String,
        /// Print as a navigation-state payload usable with `strategy save --state`
        #[arg(long)]
        json: bool,
    },
    /// Create or update an embedding strategy
    Save(strategy::SaveArgs),
    /// Remove an embedding strategy
    Remove {
        database: String,
        name: String,
        #[arg(short, long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
pub enum RetrievalAction {
    /// Create or update a retrieval strategy
    Save(retrieval::SaveArgs),
    /// Remove a retrieval strategy
    Remove {
        database: String,
        name: String,
        #[arg(short, long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
pub enum ModelsAction {
    /// List cloud and local embedding models
    List {
        /// Only this provider (local, ollama, openai, azure, google, bedrock, cohere)
        #[arg(long)]
        provider: Option<String>,
    },
    /// Download a local model through the server
    Download {
        model: String,
        /// Show a one-line indicator instead of a progress bar
        #[arg(long)]
        background: bool,
        /// Download again even if the model is already on disk
        #[arg(long)]
        force: bool,
    },
}

#[derive(Subcommand)]
pub enum ParserAction {
    /// Render a settings schema and apply edits
    Render {
        /// JSON schema file with a `properties` object
        schema: PathBuf,
        /// Current settings (JSON object)
        #[arg(long)]
        current: Option<PathBuf>,
        /// key=value edit, applied in order
        #[arg(long = "set", value_name = "KEY=VALUE")]
        edits: Vec<String>,
    },
}

/// Everything a command needs to talk to the designer API.
pub struct Context {
    pub cfg: Config,
    pub session: Session,
}

impl Context {
    pub fn connect(cfg: &Config, project: Option<&str>, namespace: Option<&str>) -> Result<Self> {
        let project = project
            .map(str::to_string)
            .or_else(|| cfg.project.clone())
            .context("No project selected. Pass --project or run `ragstudio init`.")?;
        Self::with_project(cfg, project, namespace)
    }

    /// For commands that never touch project resources.
    pub fn connect_global(cfg: &Config, namespace: Option<&str>) -> Result<Self> {
        let project = cfg.project.clone().unwrap_or_default();
        Self::with_project(cfg, project, namespace)
    }

    fn with_project(cfg: &Config, project: String, namespace: Option<&str>) -> Result<Self> {
        let namespace = namespace.unwrap_or(&cfg.namespace);
        let api = HttpApi::from_config(cfg)?;
        let session = Session::new(Arc::new(api), ProjectRef::new(namespace, project));
        Ok(Self { cfg: cfg.clone(), session })
    }
}

pub fn interactive() -> bool {
    std::io::stdin().is_terminal() && std::io::stdout().is_terminal()
}

#[derive(Debug, PartialEq, Eq)]
enum Confirmation {
    Skip,
    Ask,
    Refuse,
}

fn confirmation(yes: bool, interactive: bool) -> Confirmation {
    match (yes, interactive) {
        (true, _) => Confirmation::Skip,
        (false, true) => Confirmation::Ask,
        (false, false) => Confirmation::Refuse,
    }
}

/// Asks before a destructive action. `--yes` skips the prompt and is required when
/// there is no terminal to ask on.
pub fn confirm_destructive(prompt: String, yes: bool) -> Result<bool> {
    match confirmation(yes, interactive()) {
        Confirmation::Skip => Ok(true),
        Confirmation::Ask => Ok(Confirm::new().with_prompt(prompt).default(false).interact()?),
        Confirmation::Refuse => bail!("{prompt} Not running interactively; pass --yes to confirm."),
    }
}

pub fn print_notices(notices: &[Notice]) {
    for notice in notices {
        match notice {
            Notice::Toast { level: Level::Success, message } => {
                println!("  {} {message}", style("✓").green().bold())
            }
            Notice::Toast { level: Level::Info, message } => println!("  {} {message}", style("ℹ").blue()),
            Notice::Toast { level: Level::Warning, message } => {
                eprintln!("  {} {message}", style("⚠").yellow())
            }
            Notice::Toast { level: Level::Error, message } => eprintln!("  {} {message}", style("✗").red().bold()),
            Notice::Inline { field, message } => eprintln!("    {} {message}", style(format!("{field}:")).dim()),
            Notice::Banner(message) => eprintln!("\n  {}\n", style(message).red().bold()),
        }
    }
}

/// Parses `key=value` pairs into a JSON object. Values that parse as JSON keep their
/// type; anything else is a string.
pub fn parse_pairs(pairs: &[String]) -> Result<serde_json::Map<String, serde_json::Value>> {
    let mut map = serde_json::Map::new();
    for pair in pairs {
        let (key, value) = pair
            .split_once('=')
            .with_context(|| format!("Expected key=value, got '{pair}'"))?;
        let value = serde_json::from_str(value).unwrap_or_else(|_| serde_json::Value::String(value.to_string()));
        map.insert(key.trim().to_string(), value);
    }
    Ok(map)
}
