//! Application name registry.
//!
//! Maps application identifiers to display names. The aggregator only
//! needs [`AppRegistry::resolve`]; [`StaticRegistry`] is a simple table
//! that can be built in code or loaded from a JSON file.

use crate::collector::types::AppId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Resolves application identifiers to names.
pub trait AppRegistry: Send + Sync {
    fn resolve(&self, app_id: AppId) -> Option<String>;
}

/// Registry backed by an in-memory table.
#[derive(Debug, Clone, Default)]
pub struct StaticRegistry {
    names: HashMap<AppId, String>,
}

/// One entry of a registry file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryEntry {
    pub id: AppId,
    pub name: String,
}

impl StaticRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, app_id: AppId, name: impl Into<String>) -> Self {
        self.insert(app_id, name);
        self
    }

    pub fn insert(&mut self, app_id: AppId, name: impl Into<String>) {
        self.names.insert(app_id, name.into());
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Load a registry from a JSON array of `{"id": .., "name": ..}` entries.
    pub fn load(path: &Path) -> Result<Self, RegistryError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| RegistryError::IoError(e.to_string()))?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self, RegistryError> {
        let entries: Vec<RegistryEntry> =
            serde_json::from_str(content).map_err(|e| RegistryError::ParseError(e.to_string()))?;

        let mut registry = Self::new();
        for entry in entries {
            registry.insert(entry.id, entry.name);
        }
        Ok(registry)
    }
}

impl AppRegistry for StaticRegistry {
    fn resolve(&self, app_id: AppId) -> Option<String> {
        self.names.get(&app_id).cloned()
    }
}

/// Registry loading errors.
#[derive(Debug)]
pub enum RegistryError {
    IoError(String),
    ParseError(String),
}

impl std::fmt::Display for RegistryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegistryError::IoError(e) => write!(f, "IO error: {e}"),
            RegistryError::ParseError(e) => write!(f, "Parse error: {e}"),
        }
    }
}

impl std::error::Error for RegistryError {}
