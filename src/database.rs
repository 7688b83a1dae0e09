//! Create, edit and delete flow for vector databases.
//!
//! ```text
//! Create ──submit──▶ (closed)
//! Edit ──submit──▶ (closed)
//!   └──request_delete──▶ ConfirmingDelete ──confirm──▶ (closed)
//!                             └──cancel──▶ Edit
//! ```
//!
//! While a submit is in flight the modal cannot be dismissed.

use serde_json::Map;

use crate::api::{DatabaseUpdate, Session};
use crate::error::{FieldError, FormError, ValidationErrors};
use crate::project::{Database, EmbeddingStrategy, ProjectConfig, RetrievalStrategy, StoreConfig, StoreType};
use crate::validation::slugify;

pub const DEFAULT_DISTANCE: &str = "cosine";
pub const DISTANCE_FUNCTIONS: &[&str] = &["cosine", "euclidean", "dot"];

fn slug_name(name: &str) -> Result<String, FieldError> {
    let slug = slugify(name);
    if slug.is_empty() {
        return Err(FieldError::new("name", "Database name must contain letters or numbers"));
    }
    Ok(slug)
}

fn check_unique(project: &ProjectConfig, slug: &str, original: Option<&str>) -> Result<(), FieldError> {
    let clash = project
        .databases()
        .iter()
        .any(|d| Some(d.name.as_str()) != original && d.name == slug);
    if clash {
        return Err(FieldError::duplicate("name", format!("A database named '{slug}' already exists")));
    }
    Ok(())
}

fn check_distance(distance: &str) -> Result<(), FieldError> {
    if DISTANCE_FUNCTIONS.contains(&distance) {
        return Ok(());
    }
    Err(FieldError::new(
        "distance_function",
        format!("Distance function must be one of: {}", DISTANCE_FUNCTIONS.join(", ")),
    ))
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateDraft {
    pub name: String,
    pub store_type: StoreType,
    pub distance_function: String,
    pub copied_from: Option<String>,
    pub default_embedding_strategy: Option<String>,
    pub default_retrieval_strategy: Option<String>,
    pub embedding_strategies: Vec<EmbeddingStrategy>,
    pub retrieval_strategies: Vec<RetrievalStrategy>,
}

impl CreateDraft {
    pub fn new(name: impl Into<String>, store_type: StoreType) -> Self {
        Self {
            name: name.into(),
            store_type,
            distance_function: DEFAULT_DISTANCE.to_string(),
            copied_from: None,
            default_embedding_strategy: None,
            default_retrieval_strategy: None,
            embedding_strategies: Vec::new(),
            retrieval_strategies: Vec::new(),
        }
    }

    /// Copies both strategy lists from `source`. Its defaults are carried over unless
    /// different ones were already chosen.
    pub fn copy_strategies_from(&mut self, source: &Database) {
        self.embedding_strategies = source.embedding_strategies.clone();
        self.retrieval_strategies = source.retrieval_strategies.clone();
        if self.default_embedding_strategy.is_none() {
            self.default_embedding_strategy = source.default_embedding_strategy.clone();
        }
        if self.default_retrieval_strategy.is_none() {
            self.default_retrieval_strategy = source.default_retrieval_strategy.clone();
        }
        self.copied_from = Some(source.name.clone());
    }

    /// The database record to send, with its name normalized to a slug.
    pub fn build(&self, project: &ProjectConfig) -> Result<Database, ValidationErrors> {
        let mut errors = ValidationErrors::default();
        let slug = match slug_name(&self.name) {
            Ok(slug) => {
                errors.push(check_unique(project, &slug, None));
                slug
            }
            Err(e) => {
                errors.0.push(e);
                String::new()
            }
        };
        errors.push(check_distance(&self.distance_function));
        if let Some(name) = &self.default_embedding_strategy {
            if !self.embedding_strategies.iter().any(|s| &s.name == name) {
                errors.0.push(FieldError::new(
                    "default_embedding_strategy",
                    format!("Default embedding strategy '{name}' is not in the strategy list"),
                ));
            }
        }
        if let Some(name) = &self.default_retrieval_strategy {
            if !self.retrieval_strategies.iter().any(|s| &s.name == name) {
                errors.0.push(FieldError::new(
                    "default_retrieval_strategy",
                    format!("Default retrieval strategy '{name}' is not in the strategy list"),
                ));
            }
        }
        errors.into_result()?;

        Ok(Database {
            store_type: self.store_type.clone(),
            config: StoreConfig {
                persist_directory: Some(format!("./data/{slug}")),
                distance_function: Some(self.distance_function.clone()),
                collection_name: Some(slug.clone()),
                extra: Map::new(),
            },
            name: slug,
            default_embedding_strategy: self.default_embedding_strategy.clone(),
            default_retrieval_strategy: self.default_retrieval_strategy.clone(),
            embedding_strategies: self.embedding_strategies.clone(),
            retrieval_strategies: self.retrieval_strategies.clone(),
            extra: Map::new(),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EditDraft {
    pub original: String,
    pub name: String,
    pub store_type: StoreType,
    pub distance_function: Option<String>,
}

impl EditDraft {
    pub fn from_database(database: &Database) -> Self {
        Self {
            original: database.name.clone(),
            name: database.name.clone(),
            store_type: database.store_type.clone(),
            distance_function: database.config.distance_function.clone(),
        }
    }

    /// The update for the changed fields, or `None` when nothing changed.
    pub fn plan(&self, project: &ProjectConfig) -> Result<Option<DatabaseUpdate>, FormError> {
        let current = project
            .database(&self.original)
            .ok_or_else(|| FormError::DatabaseNotFound(self.original.clone()))?;

        let mut errors = ValidationErrors::default();
        let slug = match slug_name(&self.name) {
            Ok(slug) => {
                errors.push(check_unique(project, &slug, Some(&self.original)));
                slug
            }
            Err(e) => {
                errors.0.push(e);
                String::new()
            }
        };
        if self.distance_function != current.config.distance_function {
            if let Some(distance) = &self.distance_function {
                errors.push(check_distance(distance));
            }
        }
        errors.into_result()?;

        let mut update = DatabaseUpdate::default();
        if slug != current.name {
            update.name = Some(slug);
        }
        if self.store_type != current.store_type {
            update.store_type = Some(self.store_type.clone());
        }
        if self.distance_function != current.config.distance_function {
            update.config = Some(StoreConfig {
                distance_function: self.distance_function.clone(),
                ..current.config.clone()
            });
        }

        if update == DatabaseUpdate::default() {
            Ok(None)
        } else {
            Ok(Some(update))
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeletePlan {
    pub database: String,
    /// Datasets that point at the database.
    pub datasets: Vec<String>,
    /// Databases the datasets may move to.
    pub candidates: Vec<String>,
    pub reassign_to: Option<String>,
}

impl DeletePlan {
    pub fn for_database(project: &ProjectConfig, name: &str) -> Result<Self, FormError> {
        if project.database(name).is_none() {
            return Err(FormError::DatabaseNotFound(name.to_string()));
        }
        Ok(Self {
            database: name.to_string(),
            datasets: project.datasets_using(name).iter().map(|d| d.name.clone()).collect(),
            candidates: project
                .databases()
                .iter()
                .filter(|d| d.name != name)
                .map(|d| d.name.clone())
                .collect(),
            reassign_to: None,
        })
    }

    pub fn needs_reassignment(&self) -> bool {
        !self.datasets.is_empty()
    }

    pub fn choose(&mut self, target: &str) -> Result<(), FieldError> {
        if !self.candidates.iter().any(|c| c == target) {
            return Err(FieldError::new(
                "reassign_to",
                format!("'{target}' is not one of the remaining databases"),
            ));
        }
        self.reassign_to = Some(target.to_string());
        Ok(())
    }

    /// The reassignment target to send. Blocks deletion while datasets still need one.
    pub fn target(&self) -> Result<Option<&str>, FormError> {
        if !self.needs_reassignment() {
            return Ok(None);
        }
        if self.candidates.is_empty() {
            return Err(blocked(format!(
                "Create another database first: {} dataset(s) still use '{}'",
                self.datasets.len(),
                self.database
            )));
        }
        match &self.reassign_to {
            Some(target) => Ok(Some(target.as_str())),
            None => Err(blocked(format!(
                "Choose a database to move {} dataset(s) to",
                self.datasets.len()
            ))),
        }
    }
}

fn blocked(message: String) -> FormError {
    FormError::Validation(FieldError::new("reassign_to", message).into())
}

pub async fn create_database(session: &Session, draft: &CreateDraft) -> Result<Database, FormError> {
    let project = session.project_config().await?;
    let database = draft.build(&project)?;
    Ok(session.create_database(&database).await?)
}

/// Returns `false` when there was nothing to change.
pub async fn edit_database(session: &Session, draft: &EditDraft) -> Result<bool, FormError> {
    let project = session.project_config().await?;
    let Some(update) = draft.plan(&project)? else {
        return Ok(false);
    };
    session.update_database(&draft.original, &update).await?;
    Ok(true)
}

pub async fn delete_database(session: &Session, plan: &DeletePlan) -> Result<(), FormError> {
    let target = plan.target()?;
    session.delete_database(&plan.database, target).await?;
    Ok(())
}

#[derive(Debug, Clone, PartialEq)]
pub enum ModalMode {
    Create(CreateDraft),
    Edit(EditDraft),
    ConfirmingDelete { edit: EditDraft, plan: DeletePlan },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dismissal {
    Escape,
    Backdrop,
    CloseButton,
}

/// What a successful submit did; the modal closes afterwards.
#[derive(Debug, Clone, PartialEq)]
pub enum ModalOutcome {
    Created(Database),
    Updated { name: String, changed: bool },
    Deleted { name: String, reassigned_to: Option<String> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct DatabaseModal {
    pub mode: ModalMode,
    is_loading: bool,
    pub error: Option<String>,
}

impl DatabaseModal {
    pub fn create(draft: CreateDraft) -> Self {
        Self { mode: ModalMode::Create(draft), is_loading: false, error: None }
    }

    pub fn edit(database: &Database) -> Self {
        Self {
            mode: ModalMode::Edit(EditDraft::from_database(database)),
            is_loading: false,
            error: None,
        }
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    /// Escape, backdrop and close are all ignored while a request is in flight.
    pub fn can_dismiss(&self, _how: Dismissal) -> bool {
        !self.is_loading
    }

    pub fn request_delete(&mut self, project: &ProjectConfig) -> Result<(), FormError> {
        let ModalMode::Edit(edit) = &self.mode else {
            return Ok(());
        };
        let plan = DeletePlan::for_database(project, &edit.original)?;
        self.mode = ModalMode::ConfirmingDelete { edit: edit.clone(), plan };
        Ok(())
    }

    pub fn cancel_delete(&mut self) {
        if let ModalMode::ConfirmingDelete { edit, .. } = &self.mode {
            self.mode = ModalMode::Edit(edit.clone());
        }
    }

    /// Runs the request for the current mode with dismissal suppressed.
    pub async fn submit(&mut self, session: &Session) -> Result<ModalOutcome, FormError> {
        self.is_loading = true;
        self.error = None;
        let result = match &self.mode {
            ModalMode::Create(draft) => create_database(session, draft).await.map(ModalOutcome::Created),
            ModalMode::Edit(draft) => edit_database(session, draft).await.map(|changed| ModalOutcome::Updated {
                name: slugify(&draft.name),
                changed,
            }),
            ModalMode::ConfirmingDelete { plan, .. } => {
                delete_database(session, plan).await.map(|()| ModalOutcome::Deleted {
                    name: plan.database.clone(),
                    reassigned_to: plan.reassign_to.clone(),
                })
            }
        };
        self.is_loading = false;
        if let Err(e) = &result {
            self.error = Some(e.to_string());
        }
        result
    }
}
