//! Hotkey (macro) slots.
//!
//! The list is persisted as a single `|`-joined string under `HOTKEYS`.
//! The delimiter is reserved: values containing it are rejected rather than
//! escaped, so the stored string stays readable by older clients.

use thiserror::Error;
use tracing::debug;

use crate::store::{shared_get, shared_set, SharedStore, StoreError};

pub const HOTKEYS: &str = "HOTKEYS";
pub const DELIMITER: char = '|';
pub const DEFAULT_HOTKEYS: &[&str] = &["/bcaa //sit", "/bcaa //stand", "/bcaa //follow"];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum HotkeyError {
    #[error("no hotkey slot {index} (have {len})")]
    OutOfRange { index: usize, len: usize },
    #[error("hotkeys may not contain '{0}'")]
    ReservedCharacter(char),
}

/// Ordered, persisted list of hotkey bodies.
pub struct HotkeyStore {
    slots: Vec<String>,
    store: SharedStore,
}

impl HotkeyStore {
    /// Load from `store`, falling back to [`DEFAULT_HOTKEYS`].
    pub fn load(store: SharedStore) -> Self {
        let slots: Vec<String> = match shared_get(&store, HOTKEYS) {
            Some(joined) => joined.split(DELIMITER).map(str::to_owned).collect(),
            None => DEFAULT_HOTKEYS.iter().map(|&s| s.to_owned()).collect(),
        };
        debug!(count = slots.len(), "loaded hotkeys");
        Self { slots, store }
    }

    pub fn hotkeys(&self) -> &[String] {
        &self.slots
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.slots.get(index).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Replace slot `index` with `value`.
    pub fn set(&mut self, index: usize, value: impl Into<String>) -> Result<(), HotkeyError> {
        let value = value.into();
        check_value(&value)?;
        let len = self.slots.len();
        let slot = self.slots.get_mut(index).ok_or(HotkeyError::OutOfRange { index, len })?;
        *slot = value;
        Ok(())
    }

    /// Append a new slot, returning its index.
    pub fn add(&mut self, value: impl Into<String>) -> Result<usize, HotkeyError> {
        let value = value.into();
        check_value(&value)?;
        self.slots.push(value);
        Ok(self.slots.len() - 1)
    }

    /// Write the current list back to the store.
    pub fn persist(&self) -> Result<(), StoreError> {
        let joined = self.slots.join(DELIMITER.to_string().as_str());
        shared_set(&self.store, HOTKEYS, &joined)
    }
}

fn check_value(value: &str) -> Result<(), HotkeyError> {
    match value.chars().find(|&c| c == DELIMITER || c == '\n' || c == '\r') {
        Some(c) => Err(HotkeyError::ReservedCharacter(c)),
        None => Ok(()),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
