//! Repository configuration stored at `<root>/config.json`

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::Result;
use crate::fsutil::atomic_write;
use crate::storage::Compression;

pub const CONFIG_FILE: &str = "config.json";

/// Identity used for commits when none is given on the command line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoConfig {
    /// Branch HEAD points at in a new repository
    #[serde(default = "default_branch")]
    pub default_branch: String,
    /// Compression applied to newly written objects
    #[serde(default)]
    pub compression: Compression,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<Identity>,
}

fn default_branch() -> String {
    "main".to_string()
}

impl Default for RepoConfig {
    fn default() -> Self {
        Self {
            default_branch: default_branch(),
            compression: Compression::default(),
            author: None,
        }
    }
}

impl RepoConfig {
    /// Load config from a repository root; defaults when the file is absent.
    pub fn load(root: &Path) -> Result<Self> {
        let path = root.join(CONFIG_FILE);
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&data)?)
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let data = serde_json::to_string_pretty(self)?;
        atomic_write(&root.join(CONFIG_FILE), data.as_bytes())
    }
}
