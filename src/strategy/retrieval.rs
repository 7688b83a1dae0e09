//! Retrieval strategy drafts. Same naming rules as embedding strategies; the default
//! is tracked both by the database pointer and each record's `default` flag.

use serde_json::{Map, Value};

use super::form::SavePlan;
use crate::api::{DatabaseUpdate, Session};
use crate::error::{FormError, ValidationErrors};
use crate::project::{Database, RetrievalStrategy, RetrievalType};
use crate::validation::{validate_strategy_name, validate_unique_name};

#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalDraft {
    pub name: String,
    pub kind: RetrievalType,
    pub config: Map<String, Value>,
    pub make_default: bool,
}

impl RetrievalDraft {
    pub fn new(name: impl Into<String>, kind: RetrievalType) -> Self {
        Self {
            name: name.into(),
            kind,
            config: Map::new(),
            make_default: false,
        }
    }

    pub fn from_strategy(strategy: &RetrievalStrategy) -> Self {
        Self {
            name: strategy.name.clone(),
            kind: strategy.kind.clone(),
            config: strategy.config.clone(),
            make_default: false,
        }
    }

    pub fn validate(&self, database: &Database, original: Option<&str>) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::default();
        let name = self.name.trim();
        match validate_strategy_name(name) {
            Ok(()) => errors.push(validate_unique_name(
                name,
                database.retrieval_strategies.iter().map(|s| s.name.as_str()),
                original,
            )),
            Err(e) => errors.0.push(e),
        }
        errors.into_result()
    }
}

fn is_default(database: &Database, strategy: &RetrievalStrategy) -> bool {
    strategy.default || database.is_default_retrieval(&strategy.name)
}

/// Builds the update saving `draft` over `original` (or appending it).
pub fn plan_retrieval_save(
    database: &Database,
    original: Option<&str>,
    draft: &RetrievalDraft,
) -> Result<SavePlan, ValidationErrors> {
    draft.validate(database, original)?;
    let name = draft.name.trim().to_string();

    let existing = original.and_then(|o| database.retrieval_strategy(o));
    let was_default = existing.is_some_and(|s| is_default(database, s));
    let renamed = existing.is_some_and(|s| s.name != name);

    let record = RetrievalStrategy {
        name: name.clone(),
        kind: draft.kind.clone(),
        default: draft.make_default || was_default,
        config: draft.config.clone(),
        extra: existing.map(|s| s.extra.clone()).unwrap_or_default(),
    };

    let mut strategies: Vec<RetrievalStrategy> = Vec::with_capacity(database.retrieval_strategies.len() + 1);
    let mut replaced = false;
    for s in &database.retrieval_strategies {
        if existing.is_some_and(|e| e.name == s.name) {
            strategies.push(record.clone());
            replaced = true;
        } else {
            let mut s = s.clone();
            if draft.make_default {
                s.default = false;
            }
            strategies.push(s);
        }
    }
    if !replaced {
        strategies.push(record);
    }

    let previous_default = database.default_retrieval_strategy.clone();
    let pointer = if draft.make_default && previous_default.as_deref() != Some(name.as_str()) {
        Some(Some(name.clone()))
    } else if was_default && (renamed || previous_default.is_none()) {
        Some(Some(name.clone()))
    } else {
        None
    };

    Ok(SavePlan {
        update: DatabaseUpdate {
            retrieval_strategies: Some(strategies),
            default_retrieval_strategy: pointer,
            ..DatabaseUpdate::default()
        },
        default_changed: draft.make_default && !was_default,
        previous_default,
    })
}

pub async fn save_retrieval(
    session: &Session,
    database: &str,
    original: Option<&str>,
    draft: &RetrievalDraft,
) -> Result<SavePlan, FormError> {
    let project = session.project_config().await?;
    let db = project
        .database(database)
        .ok_or_else(|| FormError::DatabaseNotFound(database.to_string()))?;
    let plan = plan_retrieval_save(db, original, draft)?;
    session.update_database(database, &plan.update).await?;
    Ok(plan)
}
