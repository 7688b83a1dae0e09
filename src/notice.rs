//! User-facing notifications, independent of how a front end renders them.

use crate::error::{FormError, ValidationErrors};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// Transient global message.
    Toast { level: Level, message: String },
    /// Next to the field the user can fix by typing.
    Inline { field: &'static str, message: String },
    /// Persistent message at the top of the page until the next save.
    Banner(String),
}

impl Notice {
    pub fn toast(level: Level, message: impl Into<String>) -> Self {
        Notice::Toast { level, message: message.into() }
    }
}

/// Every field error is shown inline. Everything except a duplicate-name clash also
/// raises one toast with the messages joined.
pub fn validation_notices(errors: &ValidationErrors) -> Vec<Notice> {
    let mut notices: Vec<Notice> = errors
        .0
        .iter()
        .map(|e| Notice::Inline { field: e.field, message: e.message.clone() })
        .collect();

    let toast: Vec<&str> = errors
        .0
        .iter()
        .filter(|e| !e.is_duplicate())
        .map(|e| e.message.as_str())
        .collect();
    if !toast.is_empty() {
        notices.push(Notice::toast(Level::Error, toast.join(". ")));
    }
    notices
}

/// Maps a failed save to what the user sees.
pub fn save_failure_notices(error: &FormError) -> Vec<Notice> {
    match error {
        FormError::Validation(errors) => validation_notices(errors),
        FormError::Encryption(_) => vec![Notice::toast(Level::Error, error.to_string())],
        FormError::Api(_) => vec![Notice::Banner(format!("Failed to save: {error}"))],
        FormError::MissingContext(_)
        | FormError::DatabaseNotFound(_)
        | FormError::StrategyNotFound(_)
        | FormError::UnsupportedType(_) => {
            vec![Notice::Banner(error.to_string())]
        }
    }
}
