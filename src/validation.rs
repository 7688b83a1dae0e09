//! Shared validation functions used by the strategy forms and the database modal.

use crate::catalog::{ModelSelection, Provider};
use crate::error::FieldError;

pub const MIN_DIMENSION: i64 = 1;
pub const MAX_DIMENSION: i64 = 8192;

/// Strategy names: non-empty, letters, digits, hyphen and underscore only.
pub fn validate_strategy_name(name: &str) -> Result<(), FieldError> {
    if name.trim().is_empty() {
        return Err(FieldError::new("name", "Strategy name is required"));
    }
    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
        return Err(FieldError::new(
            "name",
            "Strategy name may only contain letters, numbers, hyphens and underscores",
        ));
    }
    Ok(())
}

/// Case-insensitive uniqueness among sibling names.
///
/// `original` is the name the record had when editing started; it is excluded so that
/// keeping (or re-casing) the current name is not reported as a clash.
pub fn validate_unique_name<'a>(
    name: &str,
    siblings: impl IntoIterator<Item = &'a str>,
    original: Option<&str>,
) -> Result<(), FieldError> {
    let wanted = name.to_lowercase();
    let own = original.map(str::to_lowercase);
    let clash = siblings
        .into_iter()
        .map(str::to_lowercase)
        .filter(|s| Some(s) != own.as_ref())
        .any(|s| s == wanted);
    if clash {
        return Err(FieldError::duplicate(
            "name",
            format!("A strategy named '{name}' already exists"),
        ));
    }
    Ok(())
}

/// A listed model must come from the provider's catalog; a custom one must be a plain
/// identifier (letters, digits, `/ _ . -`).
pub fn validate_model_selection(provider: Provider, model: &ModelSelection) -> Result<(), FieldError> {
    match model {
        ModelSelection::Listed(id) if provider.offers(id) => Ok(()),
        ModelSelection::Listed(_) => Err(FieldError::new("model", "Select a model")),
        ModelSelection::Custom(id) if id.trim().is_empty() => {
            Err(FieldError::new("model", "Enter a custom model name"))
        }
        ModelSelection::Custom(id) => {
            let ok = id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '/' | '_' | '.' | '-'));
            if ok {
                Ok(())
            } else {
                Err(FieldError::new(
                    "model",
                    "Custom model may only contain letters, numbers, '/', '_', '.' and '-'",
                ))
            }
        }
    }
}

pub fn validate_dimension(dimension: i64) -> Result<(), FieldError> {
    if !(MIN_DIMENSION..=MAX_DIMENSION).contains(&dimension) {
        return Err(FieldError::new(
            "dimension",
            format!("Dimension must be between {MIN_DIMENSION} and {MAX_DIMENSION}"),
        ));
    }
    Ok(())
}

/// Lowercases and collapses every run of non-alphanumerics into one underscore,
/// trimming underscores at both ends. May return an empty string.
pub fn slugify(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut pending_sep = false;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_sep && !out.is_empty() {
                out.push('_');
            }
            pending_sep = false;
            out.push(c.to_ascii_lowercase());
        } else {
            pending_sep = true;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_name_rules() {
        assert!(validate_strategy_name("semantic_embeddings-2").is_ok());
        assert!(validate_strategy_name("").is_err());
        assert!(validate_strategy_name("   ").is_err());
        assert!(validate_strategy_name("has space").is_err());
        assert!(validate_strategy_name("dots.not.ok").is_err());
        assert!(validate_strategy_name("ünicode").is_err());
    }

    #[test]
    fn test_unique_name_is_case_insensitive() {
        let siblings = ["alpha", "Beta"];
        let err = validate_unique_name("BETA", siblings, None).unwrap_err();
        assert!(err.message.contains("already exists"));
        assert!(validate_unique_name("gamma", siblings, None).is_ok());
    }

    #[test]
    fn test_unique_name_allows_own_name() {
        let siblings = ["alpha", "beta"];
        assert!(validate_unique_name("alpha", siblings, Some("alpha")).is_ok());
        assert!(validate_unique_name("ALPHA", siblings, Some("alpha")).is_ok());
        assert!(validate_unique_name("beta", siblings, Some("alpha")).is_err());
    }

    #[test]
    fn test_unique_name_rejects_shared_duplicate() {
        // two siblings already share a name; a third record cannot take it
        let siblings = ["dup", "DUP", "other"];
        assert!(validate_unique_name("Dup", siblings, Some("other")).is_err());
    }

    #[test]
    fn test_dimension_bounds() {
        for bad in [0, -1, 8193] {
            assert!(validate_dimension(bad).is_err(), "{bad} accepted");
        }
        for good in [1, 768, 8192] {
            assert!(validate_dimension(good).is_ok(), "{good} rejected");
        }
    }

    #[test]
    fn test_model_selection() {
        let listed = ModelSelection::Listed("text-embedding-3-small".into());
        assert!(validate_model_selection(Provider::OpenAI, &listed).is_ok());
        assert!(validate_model_selection(Provider::Cohere, &listed).is_err());

        let custom = ModelSelection::Custom("org/model_v1.2-q4".into());
        assert!(validate_model_selection(Provider::OllamaRemote, &custom).is_ok());
        assert!(validate_model_selection(Provider::OllamaRemote, &ModelSelection::Custom("".into())).is_err());
        assert!(validate_model_selection(Provider::OllamaRemote, &ModelSelection::Custom("a b".into())).is_err());
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("My DB #1!"), "my_db_1");
        assert_eq!(slugify("Docs v2"), "docs_v2");
        assert_eq!(slugify("__already_ok__"), "already_ok");
        assert_eq!(slugify("###"), "");
        assert_eq!(slugify(""), "");
    }
}
