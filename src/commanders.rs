//! Whitelist of phone numbers allowed to control the gateway.
//!
//! The first enrolled number is the supreme commander and the only one
//! allowed to run admin commands.

use crate::storage::{KeyValueStore, StorageError};
use thiserror::Error;
use tracing::{info, warn};

/// Default number of commanders.
pub const MAX_COMMANDERS: usize = 5;

const KEY_PREFIX: &str = "phone";

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Commander list is full")]
    Full,

    #[error("Empty phone number")]
    EmptyId,

    #[error(transparent)]
    Storage(#[from] StorageError),
}

pub struct CommanderRegistry {
    store: Box<dyn KeyValueStore>,
    commanders: Vec<String>,
    capacity: usize,
}

impl CommanderRegistry {
    pub fn new(store: Box<dyn KeyValueStore>) -> Self {
        Self::with_capacity(store, MAX_COMMANDERS)
    }

    pub fn with_capacity(store: Box<dyn KeyValueStore>, capacity: usize) -> Self {
        Self {
            store,
            commanders: Vec::new(),
            capacity,
        }
    }

    /// Reload the list from the store.
    pub fn refresh(&mut self) {
        self.commanders.clear();
        self.store.clear();
        if self.store.fetch() {
            self.commanders = self.store.items().into_iter().map(|(_, number)| number).collect();
        }
        info!("{} commander(s) loaded", self.commanders.len());
    }

    pub fn is_exist(&self, id: &str) -> bool {
        self.commanders.iter().any(|c| c == id)
    }

    pub fn is_supreme(&self, id: &str) -> bool {
        self.commanders.first().is_some_and(|c| c == id)
    }

    /// Enroll `id` and persist the whole list. Enrolling a known number succeeds without change.
    pub fn add_new(&mut self, id: &str) -> Result<(), RegistryError> {
        if id.is_empty() {
            return Err(RegistryError::EmptyId);
        }
        if self.is_full() {
            return Err(RegistryError::Full);
        }
        if self.is_exist(id) {
            return Ok(());
        }

        self.commanders.push(id.to_string());
        if let Err(e) = self.persist() {
            warn!("Failed to store commander {id}: {e}");
            self.commanders.pop();
            return Err(e.into());
        }
        info!("Commander {id} enrolled at position {}", self.commanders.len());
        Ok(())
    }

    fn persist(&mut self) -> Result<(), StorageError> {
        self.store.clear();
        for (i, number) in self.commanders.iter().enumerate() {
            self.store.add_item(&format!("{KEY_PREFIX}{}", i + 1), number)?;
        }
        self.store.commit()
    }

    pub fn is_full(&self) -> bool {
        self.commanders.len() >= self.capacity
    }

    pub fn is_empty(&self) -> bool {
        self.commanders.is_empty()
    }

    pub fn len(&self) -> usize {
        self.commanders.len()
    }

    pub fn commanders(&self) -> &[String] {
        &self.commanders
    }

    /// Numbered list, one `"<n>: <number>"` line per commander.
    pub fn get_list(&self) -> String {
        self.commanders
            .iter()
            .enumerate()
            .map(|(i, number)| format!("{}: {number}\n", i + 1))
            .collect()
    }

    /// Forget every commander, in memory and in the store.
    pub fn reset(&mut self) -> Result<(), RegistryError> {
        self.commanders.clear();
        self.store.mark_unused()?;
        Ok(())
    }
}
