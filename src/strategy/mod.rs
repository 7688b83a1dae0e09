//! Embedding and retrieval strategy editing.
//!
//! A [`StrategyForm`] owns one create or edit session: initial values come from
//! [`resolve_initial_fields`], edits are tracked against a snapshot, and a save sends
//! exactly one database update carrying the full strategy list.

pub mod fields;
pub mod form;
pub mod init;
pub mod remove;
pub mod retrieval;
pub mod unsaved;

pub use fields::{FormSnapshot, StrategyFields, build_config, fields_from_strategy};
pub use form::{FormMode, SaveOutcome, SavePlan, StrategyForm, plan_save};
pub use init::{NavigationState, resolve_initial_fields};
pub use remove::{remove_embedding_strategy, remove_retrieval_strategy};
pub use retrieval::{RetrievalDraft, save_retrieval};
pub use unsaved::{NavigationCheck, Resolution, UnsavedChanges};
