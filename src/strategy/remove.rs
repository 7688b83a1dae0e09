use super::form::SavePlan;
use crate::api::{DatabaseUpdate, Session};
use crate::error::FormError;
use crate::project::{Database, EmbeddingStrategy, RetrievalStrategy};

/// Highest priority wins; ties go to the earlier entry.
pub fn fallback_default(strategies: &[EmbeddingStrategy]) -> Option<&EmbeddingStrategy> {
    strategies
        .iter()
        .fold(None, |best: Option<&EmbeddingStrategy>, s| match best {
            Some(b) if b.priority >= s.priority => Some(b),
            _ => Some(s),
        })
}

/// The first remaining strategy flagged default, else the first one.
pub fn fallback_retrieval_default(strategies: &[RetrievalStrategy]) -> Option<&RetrievalStrategy> {
    strategies.iter().find(|s| s.default).or_else(|| strategies.first())
}

pub fn plan_embedding_removal(database: &Database, name: &str) -> Result<SavePlan, FormError> {
    if database.embedding_strategy(name).is_none() {
        return Err(FormError::StrategyNotFound(name.to_string()));
    }
    let remaining: Vec<EmbeddingStrategy> = database
        .embedding_strategies
        .iter()
        .filter(|s| s.name != name)
        .cloned()
        .collect();

    let previous_default = database.default_embedding_strategy.clone();
    let default = if database.is_default_embedding(name) {
        Some(fallback_default(&remaining).map(|s| s.name.clone()))
    } else {
        None
    };

    Ok(SavePlan {
        default_changed: default.is_some(),
        previous_default,
        update: DatabaseUpdate {
            embedding_strategies: Some(remaining),
            default_embedding_strategy: default,
            ..DatabaseUpdate::default()
        },
    })
}

pub fn plan_retrieval_removal(database: &Database, name: &str) -> Result<SavePlan, FormError> {
    let removed = database
        .retrieval_strategy(name)
        .ok_or_else(|| FormError::StrategyNotFound(name.to_string()))?;
    let was_default = removed.default || database.is_default_retrieval(name);

    let mut remaining: Vec<RetrievalStrategy> = database
        .retrieval_strategies
        .iter()
        .filter(|s| s.name != name)
        .cloned()
        .collect();

    let default = if was_default {
        let next = fallback_retrieval_default(&remaining).map(|s| s.name.clone());
        for s in &mut remaining {
            s.default = next.as_deref() == Some(s.name.as_str());
        }
        Some(next)
    } else {
        None
    };

    Ok(SavePlan {
        default_changed: default.is_some(),
        previous_default: database.default_retrieval_strategy.clone(),
        update: DatabaseUpdate {
            retrieval_strategies: Some(remaining),
            default_retrieval_strategy: default,
            ..DatabaseUpdate::default()
        },
    })
}

pub async fn remove_embedding_strategy(session: &Session, database: &str, name: &str) -> Result<SavePlan, FormError> {
    let project = session.project_config().await?;
    let db = project
        .database(database)
        .ok_or_else(|| FormError::DatabaseNotFound(database.to_string()))?;
    let plan = plan_embedding_removal(db, name)?;
    session.update_database(database, &plan.update).await?;
    tracing::info!("Removed embedding strategy '{name}' from '{database}'");
    Ok(plan)
}

pub async fn remove_retrieval_strategy(session: &Session, database: &str, name: &str) -> Result<SavePlan, FormError> {
    let project = session.project_config().await?;
    let db = project
        .database(database)
        .ok_or_else(|| FormError::DatabaseNotFound(database.to_string()))?;
    let plan = plan_retrieval_removal(db, name)?;
    session.update_database(database, &plan.update).await?;
    tracing::info!("Removed retrieval strategy '{name}' from '{database}'");
    Ok(plan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::{EmbedderType, RetrievalType, StoreConfig, StoreType};
    use serde_json::Map;

    fn embedding(name: &str, priority: i64) -> EmbeddingStrategy {
        EmbeddingStrategy { name: name.into(), kind: EmbedderType::Ollama, priority, config: Map::new(), extra: Map::new() }
    }

    fn retrieval(name: &str, default: bool) -> RetrievalStrategy {
        RetrievalStrategy {
            name: name.into(),
            kind: RetrievalType::BasicSimilarity,
            default,
            config: Map::new(),
            extra: Map::new(),
        }
    }

    fn database() -> Database {
        Database {
            name: "main".into(),
            store_type: StoreType::Qdrant,
            config: StoreConfig::default(),
            default_embedding_strategy: Some("a".into()),
            default_retrieval_strategy: Some("r1".into()),
            embedding_strategies: vec![embedding("a", 9), embedding("b", 3), embedding("c", 7), embedding("d", 7)],
            retrieval_strategies: vec![retrieval("r1", true), retrieval("r2", false), retrieval("r3", false)],
            extra: Map::new(),
        }
    }

    #[test]
    fn test_priority_tie_goes_to_earlier() {
        let plan = plan_embedding_removal(&database(), "a").unwrap();
        assert_eq!(plan.update.default_embedding_strategy, Some(Some("c".into())));
        assert!(plan.default_changed);
        assert_eq!(plan.update.embedding_strategies.unwrap().len(), 3);
    }

    #[test]
    fn test_removing_non_default_keeps_pointer() {
        let plan = plan_embedding_removal(&database(), "b").unwrap();
        assert_eq!(plan.update.default_embedding_strategy, None);
        assert!(!plan.default_changed);
    }

    #[test]
    fn test_last_strategy_clears_default() {
        let mut db = database();
        db.embedding_strategies.truncate(1);
        let plan = plan_embedding_removal(&db, "a").unwrap();
        assert_eq!(plan.update.default_embedding_strategy, Some(None));
    }

    #[test]
    fn test_retrieval_fallback_is_list_order() {
        let plan = plan_retrieval_removal(&database(), "r1").unwrap();
        assert_eq!(plan.update.default_retrieval_strategy, Some(Some("r2".into())));
        let all = plan.update.retrieval_strategies.unwrap();
        assert!(all[0].default);
        assert!(!all[1].default);
    }

    #[test]
    fn test_unknown_strategy() {
        assert!(matches!(
            plan_embedding_removal(&database(), "zzz"),
            Err(FormError::StrategyNotFound(_))
        ));
    }
}
