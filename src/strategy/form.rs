use super::fields::{FormSnapshot, StrategyFields, build_config};
use super::init::{NavigationState, resolve_initial_fields};
use crate::api::{DatabaseUpdate, Session};
use crate::catalog::models::LocalModel;
use crate::catalog::{ModelSelection, Provider};
use crate::download::{Completion, DownloadManager, DownloadRequest, StartOutcome};
use crate::error::{FormError, ValidationErrors};
use crate::legacy::LegacyStore;
use crate::notice::{Level, Notice};
use crate::project::{Database, EmbeddingStrategy, ProjectConfig};
use crate::validation::{validate_dimension, validate_model_selection, validate_strategy_name, validate_unique_name};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormMode {
    Create,
    Edit { original_name: String },
}

impl FormMode {
    pub fn original_name(&self) -> Option<&str> {
        match self {
            FormMode::Create => None,
            FormMode::Edit { original_name } => Some(original_name),
        }
    }
}

/// What a successful save did.
#[derive(Debug, Clone, PartialEq)]
pub struct SaveOutcome {
    pub strategy: String,
    /// The default strategy is now a different one; offer to re-embed.
    pub default_changed: bool,
    pub previous_default: Option<String>,
    pub notices: Vec<Notice>,
}

/// The single update a save sends.
#[derive(Debug, Clone, PartialEq)]
pub struct SavePlan {
    pub update: DatabaseUpdate,
    pub default_changed: bool,
    pub previous_default: Option<String>,
}

/// Replaces the edited strategy in place, or appends a new one, and works out where
/// the default pointer goes.
pub fn plan_save(database: &Database, original_name: Option<&str>, strategy: EmbeddingStrategy, make_default: bool) -> SavePlan {
    let previous_default = database.default_embedding_strategy.clone();
    let was_default = original_name.is_some_and(|o| database.is_default_embedding(o));
    let renamed = original_name.is_some_and(|o| o != strategy.name);

    let default = if make_default && !database.is_default_embedding(&strategy.name) {
        Some(Some(strategy.name.clone()))
    } else if was_default && renamed {
        Some(Some(strategy.name.clone()))
    } else {
        None
    };
    let default_changed = make_default && !was_default && previous_default.as_deref() != Some(strategy.name.as_str());

    let existing = original_name.filter(|o| database.embedding_strategy(o).is_some());
    let strategies = match existing {
        Some(original) => database
            .embedding_strategies
            .iter()
            .map(|s| {
                if s.name != original {
                    return s.clone();
                }
                let mut edited = strategy.clone();
                for (k, v) in &s.extra {
                    edited.extra.entry(k.clone()).or_insert_with(|| v.clone());
                }
                edited
            })
            .collect(),
        None => {
            let mut all = database.embedding_strategies.clone();
            all.push(strategy);
            all
        }
    };

    SavePlan {
        update: DatabaseUpdate {
            embedding_strategies: Some(strategies),
            default_embedding_strategy: default,
            ..DatabaseUpdate::default()
        },
        default_changed,
        previous_default,
    }
}

/// One create or edit session for an embedding strategy.
#[derive(Debug, Clone)]
pub struct StrategyForm {
    pub database: String,
    pub mode: FormMode,
    pub fields: StrategyFields,
    snapshot: FormSnapshot,
    siblings: Vec<String>,
    /// Message of the last failed save, kept for the unsaved-changes prompt.
    pub last_error: Option<String>,
    /// Model this form started downloading; selected when the download finishes.
    pending_download: Option<String>,
}

impl StrategyForm {
    /// Builds the form from an already loaded project config.
    ///
    /// Naming a strategy that is neither on the server nor in `nav` is a missing-context
    /// error: there is nothing to edit.
    pub fn from_project(
        project: &ProjectConfig,
        database: &str,
        strategy: Option<&str>,
        nav: Option<NavigationState>,
        legacy: &dyn LegacyStore,
    ) -> Result<Self, FormError> {
        let db = project
            .database(database)
            .ok_or_else(|| FormError::DatabaseNotFound(database.to_string()))?;
        let nav = nav.and_then(|n| n.validated(database));

        if let Some(name) = strategy {
            let known = db.embedding_strategy(name).is_some()
                || nav.as_ref().is_some_and(|n| n.strategy_name.as_deref() == Some(name));
            if !known {
                return Err(FormError::MissingContext(format!(
                    "strategy '{name}' in database '{database}'"
                )));
            }
        }

        let name = strategy
            .map(str::to_string)
            .or_else(|| nav.as_ref().and_then(|n| n.strategy_name.clone()));
        let legacy_record = name.as_deref().and_then(|n| legacy.strategy(database, n));
        let fields = resolve_initial_fields(Some(db), name.as_deref(), nav.as_ref(), legacy_record.as_ref())?;

        let mode = match name.filter(|n| db.embedding_strategy(n).is_some()) {
            Some(original_name) => FormMode::Edit { original_name },
            None => FormMode::Create,
        };

        Ok(Self {
            database: database.to_string(),
            mode,
            snapshot: FormSnapshot::capture(&fields),
            fields,
            siblings: db.embedding_strategies.iter().map(|s| s.name.clone()).collect(),
            last_error: None,
            pending_download: None,
        })
    }

    /// Loads the project through the session cache and builds the form.
    pub async fn open(
        session: &Session,
        database: &str,
        strategy: Option<&str>,
        nav: Option<NavigationState>,
        legacy: &dyn LegacyStore,
    ) -> Result<Self, FormError> {
        let project = session.project_config().await?;
        Self::from_project(&project, database, strategy, nav, legacy)
    }

    pub fn is_dirty(&self) -> bool {
        self.snapshot.is_dirty(&self.fields)
    }

    pub fn changed_fields(&self) -> Vec<&'static str> {
        self.snapshot.changed_fields(&self.fields)
    }

    /// Starts downloading a local model on behalf of this form.
    pub fn start_download(&mut self, downloads: &DownloadManager, model: &LocalModel) -> StartOutcome {
        self.pending_download = Some(model.id.to_string());
        downloads.start(model.id, DownloadRequest::for_local_model(model))
    }

    /// Selects the downloaded model if this form started the download. Returns whether
    /// the completion belonged to this form.
    pub fn apply_download(&mut self, completion: &Completion) -> bool {
        if self.pending_download.as_deref() != Some(completion.model_id.as_str()) {
            return false;
        }
        self.pending_download = None;
        self.fields.select_provider(Provider::OllamaLocal);
        self.fields.select_model(ModelSelection::Listed(completion.model_id.clone()));
        tracing::debug!("Selected downloaded model {}", completion.model_id);
        true
    }

    /// Runs every check and reports all failures at once.
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::default();
        let name = self.fields.name.trim();
        match validate_strategy_name(name) {
            Ok(()) => errors.push(validate_unique_name(
                name,
                self.siblings.iter().map(String::as_str),
                self.mode.original_name(),
            )),
            Err(e) => errors.0.push(e),
        }
        errors.push(validate_model_selection(self.fields.provider, &self.fields.model));
        if let Some(dimension) = self.fields.dimension {
            errors.push(validate_dimension(dimension));
        }
        errors.into_result()
    }

    /// Validates and builds the strategy record without touching the server.
    pub fn build(&self, client_secret: Option<&str>) -> Result<EmbeddingStrategy, FormError> {
        self.validate()?;
        build_config(&self.fields, client_secret)
    }

    /// Saves the strategy with one database update.
    ///
    /// Nothing is sent if validation or encryption fails. On failure the message is
    /// kept in `last_error`; on success the form switches to editing the saved
    /// strategy and takes a fresh snapshot.
    pub async fn save(
        &mut self,
        session: &Session,
        client_secret: Option<&str>,
        legacy: &dyn LegacyStore,
    ) -> Result<SaveOutcome, FormError> {
        let result = self.try_save(session, client_secret, legacy).await;
        match &result {
            Ok(_) => self.last_error = None,
            Err(e) => {
                tracing::warn!("Failed to save strategy '{}': {e}", self.fields.name);
                self.last_error = Some(e.to_string());
            }
        }
        result
    }

    async fn try_save(
        &mut self,
        session: &Session,
        client_secret: Option<&str>,
        legacy: &dyn LegacyStore,
    ) -> Result<SaveOutcome, FormError> {
        let strategy = self.build(client_secret)?;
        let project = session.project_config().await?;
        let db = project
            .database(&self.database)
            .ok_or_else(|| FormError::DatabaseNotFound(self.database.clone()))?;

        let name = strategy.name.clone();
        let plan = plan_save(db, self.mode.original_name(), strategy, self.fields.make_default);
        session.update_database(&self.database, &plan.update).await?;

        if let Some(original) = self.mode.original_name() {
            if let Err(e) = legacy.forget(&self.database, original) {
                tracing::warn!("Failed to drop legacy settings: {e:#}");
            }
        }
        if let Err(e) = legacy.forget(&self.database, &name) {
            tracing::warn!("Failed to drop legacy settings: {e:#}");
        }

        if let Some(original) = self.mode.original_name() {
            self.siblings.retain(|s| s != original);
        }
        self.siblings.push(name.clone());
        self.mode = FormMode::Edit { original_name: name.clone() };
        // the typed key is now stored encrypted
        if let Some(key) = plan
            .update
            .embedding_strategies
            .as_ref()
            .and_then(|all| all.iter().find(|s| s.name == name))
            .and_then(|s| s.config.get("api_key"))
            .and_then(|v| v.as_str())
        {
            self.fields.stored_api_key = Some(key.to_string());
        }
        self.fields.api_key.clear();
        self.fields.name = name.clone();
        self.snapshot = FormSnapshot::capture(&self.fields);

        Ok(SaveOutcome {
            notices: vec![Notice::toast(Level::Success, format!("Saved strategy '{name}'"))],
            strategy: name,
            default_changed: plan.default_changed,
            previous_default: plan.previous_default,
        })
    }
}
