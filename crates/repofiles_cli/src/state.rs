//! Manifest and state files.
//!
//! The manifest declares resources by name:
//!
//! ```toml
//! [resources.docs]
//! type = "gitlab_repository_files"
//!
//! [resources.docs.config]
//! project = "group/project"
//! branch = "main"
//! commit_message = "Sync docs"
//!
//! [[resources.docs.config.file]]
//! file_path = "README.md"
//! content = "# Project\n"
//! ```
//!
//! The state file records what the last successful run observed, keyed by the
//! same names. It is JSON and only ever replaced as a whole.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;

use config::{Config as ConfigBuilder, File};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Declared resources, by name.
#[derive(Debug, Default, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub resources: BTreeMap<String, ManifestEntry>,
}

/// One declared resource.
#[derive(Debug, Clone, Deserialize)]
pub struct ManifestEntry {
    #[serde(rename = "type")]
    pub resource_type: String,
    pub config: Value,
}

impl Manifest {
    /// Load a TOML or JSON manifest, picking the format from the extension.
    pub fn load(path: &Path) -> Result<Self, config::ConfigError> {
        ConfigBuilder::builder()
            .add_source(File::from(path).required(true))
            .build()?
            .try_deserialize()
    }
}

/// Persisted resource state, by name.
#[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StateFile {
    #[serde(default)]
    pub resources: BTreeMap<String, StateEntry>,
}

/// State of one managed resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateEntry {
    #[serde(rename = "type")]
    pub resource_type: String,
    pub state: Value,
}

impl StateFile {
    /// Read the state file; a missing file is an empty state.
    pub fn load(path: &Path) -> io::Result<Self> {
        match fs::read(path) {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(io::Error::other),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e),
        }
    }

    /// Replace the state file, going through a sibling temp file so a crash
    /// never leaves a truncated state behind.
    pub fn save(&self, path: &Path) -> io::Result<()> {
        let body = serde_json::to_vec_pretty(self).map_err(io::Error::other)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, body)?;
        fs::rename(&tmp, path)
    }

    pub fn get(&self, name: &str) -> Option<&StateEntry> {
        self.resources.get(name)
    }

    pub fn set(&mut self, name: &str, resource_type: &str, state: Value) {
        self.resources.insert(
            name.to_string(),
            StateEntry {
                resource_type: resource_type.to_string(),
                state,
            },
        );
    }

    pub fn remove(&mut self, name: &str) -> Option<StateEntry> {
        self.resources.remove(name)
    }
}
