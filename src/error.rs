use std::fmt;
use thiserror::Error;

use crate::crypto::CryptoError;

/// Failure talking to the designer API.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Invalid response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("Download stream error: {0}")]
    Stream(String),
    #[error("{0}")]
    Rejected(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldErrorKind {
    Invalid,
    /// The name clashes with a sibling. Shown next to the field only, never as a toast.
    Duplicate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub kind: FieldErrorKind,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self { field, kind: FieldErrorKind::Invalid, message: message.into() }
    }

    pub fn duplicate(field: &'static str, message: impl Into<String>) -> Self {
        Self { field, kind: FieldErrorKind::Duplicate, message: message.into() }
    }

    pub fn is_duplicate(&self) -> bool {
        self.kind == FieldErrorKind::Duplicate
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// All field errors found by one validation pass, in field order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors(pub Vec<FieldError>);

impl ValidationErrors {
    pub fn push(&mut self, result: Result<(), FieldError>) {
        if let Err(e) = result {
            self.0.push(e);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }

    pub fn for_field(&self, field: &str) -> Option<&FieldError> {
        self.0.iter().find(|e| e.field == field)
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages: Vec<&str> = self.0.iter().map(|e| e.message.as_str()).collect();
        f.write_str(&messages.join(". "))
    }
}

impl std::error::Error for ValidationErrors {}

impl From<FieldError> for ValidationErrors {
    fn from(e: FieldError) -> Self {
        Self(vec![e])
    }
}

/// Failure of a form or modal operation.
#[derive(Debug, Error)]
pub enum FormError {
    #[error("{0}")]
    Validation(#[from] ValidationErrors),
    #[error("Failed to encrypt API key: {0}")]
    Encryption(#[from] CryptoError),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error("Missing required information: {0}")]
    MissingContext(String),
    #[error("Database '{0}' not found")]
    DatabaseNotFound(String),
    #[error("Strategy '{0}' not found")]
    StrategyNotFound(String),
    #[error("Strategies of type '{0}' can't be edited here")]
    UnsupportedType(String),
}
