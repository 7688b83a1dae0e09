//! Shared "unsaved changes" state consulted before leaving any editing page.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use super::form::StrategyForm;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationCheck {
    Proceed,
    /// Pages with pending edits, and the last save failure if one happened.
    Confirm { pages: Vec<String>, last_error: Option<String> },
}

/// The user's answer to the confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Save,
    Discard,
    Cancel,
}

#[derive(Debug, Default)]
struct Pages {
    dirty: BTreeMap<String, bool>,
    last_error: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct UnsavedChanges {
    inner: Arc<Mutex<Pages>>,
}

impl UnsavedChanges {
    pub fn new() -> Self {
        Self::default()
    }

    fn with<T>(&self, f: impl FnOnce(&mut Pages) -> T) -> T {
        let mut pages = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        f(&mut pages)
    }

    /// Mirrors a form's dirtiness and last save error under its page key.
    pub fn track(&self, page: &str, form: &StrategyForm) {
        self.with(|p| {
            p.dirty.insert(page.to_string(), form.is_dirty());
            p.last_error = form.last_error.clone();
        });
    }

    /// The page left the screen; its edits no longer block navigation.
    pub fn clear(&self, page: &str) {
        self.with(|p| {
            p.dirty.remove(page);
            if !p.dirty.values().any(|d| *d) {
                p.last_error = None;
            }
        });
    }

    pub fn check_navigation(&self) -> NavigationCheck {
        self.with(|p| {
            let pages: Vec<String> = p
                .dirty
                .iter()
                .filter(|(_, dirty)| **dirty)
                .map(|(page, _)| page.clone())
                .collect();
            if pages.is_empty() {
                NavigationCheck::Proceed
            } else {
                NavigationCheck::Confirm { pages, last_error: p.last_error.clone() }
            }
        })
    }

    /// Applies the user's answer for one page. Returns whether navigation may go on;
    /// `Save` only clears the page once the caller's save succeeds.
    pub fn resolve(&self, page: &str, resolution: Resolution) -> bool {
        match resolution {
            Resolution::Discard => {
                self.clear(page);
                true
            }
            Resolution::Save => !self.with(|p| p.dirty.get(page).copied().unwrap_or(false)),
            Resolution::Cancel => false,
        }
    }
}
