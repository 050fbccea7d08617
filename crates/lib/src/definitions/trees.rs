//! Persisted map of component name to resolved source tree id.
//!
//! Resolving a ref against a remote is slow, so resolved tree ids are saved
//! next to the definitions (`.trees`) and reused on the next run.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::DefinitionsError;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TreeMap(BTreeMap<String, String>);

impl TreeMap {
  pub fn new() -> Self {
    Self::default()
  }

  /// Load a tree map. A missing file yields an empty map.
  pub fn load(path: &Path) -> Result<Self, DefinitionsError> {
    if !path.exists() {
      return Ok(Self::new());
    }

    let text = std::fs::read_to_string(path).map_err(|source| DefinitionsError::Read {
      path: path.to_path_buf(),
      source,
    })?;
    let trees: Option<TreeMap> = serde_yaml::from_str(&text).map_err(|source| DefinitionsError::Parse {
      path: path.to_path_buf(),
      source,
    })?;

    let trees = trees.unwrap_or_default();
    debug!(count = trees.len(), path = %path.display(), "restored source trees");
    Ok(trees)
  }

  pub fn save(&self, path: &Path) -> Result<(), DefinitionsError> {
    let text = serde_yaml::to_string(self).map_err(|source| DefinitionsError::Encode {
      path: path.to_path_buf(),
      source,
    })?;
    std::fs::write(path, text).map_err(|source| DefinitionsError::Write {
      path: path.to_path_buf(),
      source,
    })
  }

  pub fn get(&self, name: &str) -> Option<&str> {
    self.0.get(name).map(String::as_str)
  }

  pub fn insert(&mut self, name: &str, tree: &str) {
    self.0.insert(name.to_string(), tree.to_string());
  }

  pub fn len(&self) -> usize {
    self.0.len()
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }
}
