use std::fmt;

use serde::{Deserialize, Serialize};

use crate::definitions::{BuildMode, Commands};
use crate::platform::Arch;
use crate::util::hash::{ContentHash, Hashable};

/// Cache key of one component: `<name>.<sha256>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtifactKey(pub String);

impl ArtifactKey {
  /// `/` becomes `-` for readability only; `hash` covers the raw name.
  pub fn new(name: &str, hash: &ContentHash) -> Self {
    Self(format!("{}.{}", name.replace('/', "-"), hash))
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl fmt::Display for ArtifactKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}

/// Everything that makes one build of a component differ from another.
///
/// Dependency keys are included rather than dependency definitions, so a
/// change anywhere below a component changes its key too.
#[derive(Debug, Serialize)]
pub struct KeyMaterial<'a> {
  pub name: &'a str,
  pub tree: Option<&'a str>,
  pub build_system: Option<&'a str>,
  pub commands: &'a Commands,
  pub prefix: &'a str,
  pub build_mode: BuildMode,
  pub arch: Arch,
  pub build_depends: Vec<&'a ArtifactKey>,
  pub contents: Vec<&'a ArtifactKey>,
}

impl Hashable for KeyMaterial<'_> {}

impl KeyMaterial<'_> {
  pub fn key(&self) -> Result<ArtifactKey, serde_json::Error> {
    Ok(ArtifactKey::new(self.name, &self.compute_hash()?))
  }
}
