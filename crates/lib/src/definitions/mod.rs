//! The definitions graph.
//!
//! Definitions are loaded once from a directory of YAML documents and are
//! read-only afterwards. Anything resolved while assembling (source trees,
//! cache keys, sandbox paths) lives in side tables owned by the caller.
//!
//! # Submodules
//!
//! - [`trees`] - persisted name -> source tree map

pub mod trees;
mod types;

pub use types::*;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::consts::DEFINITION_EXTENSIONS;

#[derive(Debug, Error)]
pub enum DefinitionsError {
  /// No definition with this name was loaded.
  #[error("no definition found for {0}")]
  NotFound(String),

  #[error("failed to read {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to parse {path}: {source}")]
  Parse {
    path: PathBuf,
    #[source]
    source: serde_yaml::Error,
  },

  #[error("failed to write {path}: {source}")]
  Write {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to encode {path}: {source}")]
  Encode {
    path: PathBuf,
    #[source]
    source: serde_yaml::Error,
  },

  #[error("failed to walk {path}: {message}")]
  Walk { path: PathBuf, message: String },

  #[error("{path}: component reference without a name or morph")]
  UnnamedReference { path: PathBuf },
}

/// Every definition known to a run, keyed by name.
#[derive(Debug, Default)]
pub struct Definitions {
  definitions: HashMap<String, Definition>,
}

impl Definitions {
  pub fn new() -> Self {
    Self::default()
  }

  /// Load every `.def`/`.morph` document below `dir`, skipping `.git`.
  pub fn load(dir: &Path) -> Result<Self, DefinitionsError> {
    let mut definitions = Self::new();

    let walker = WalkDir::new(dir)
      .sort_by_file_name()
      .into_iter()
      .filter_entry(|e| e.file_name() != ".git");

    for entry in walker {
      let entry = entry.map_err(|e| DefinitionsError::Walk {
        path: dir.to_path_buf(),
        message: e.to_string(),
      })?;
      let path = entry.path();
      let is_definition = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| DEFINITION_EXTENSIONS.contains(&ext));

      if entry.file_type().is_file() && is_definition {
        definitions.load_file(path)?;
      }
    }

    debug!(count = definitions.len(), dir = %dir.display(), "loaded definitions");
    Ok(definitions)
  }

  pub fn load_file(&mut self, path: &Path) -> Result<(), DefinitionsError> {
    let text = std::fs::read_to_string(path).map_err(|source| DefinitionsError::Read {
      path: path.to_path_buf(),
      source,
    })?;
    self.load_str(&text, path)
  }

  /// Parse one document. `origin` is only used in error messages.
  pub fn load_str(&mut self, text: &str, origin: &Path) -> Result<(), DefinitionsError> {
    let raw: Option<RawDefinition> = serde_yaml::from_str(text).map_err(|source| DefinitionsError::Parse {
      path: origin.to_path_buf(),
      source,
    })?;

    let Some(mut raw) = raw else {
      return Ok(());
    };
    raw.normalize();

    if raw.name.is_none() {
      debug!(path = %origin.display(), "skipping document without a name");
      return Ok(());
    }

    let parent_depends = raw.build_depends.clone().unwrap_or_default();
    let mut parent_depends_names = Vec::new();
    for dependency in parent_depends {
      parent_depends_names.push(reference_name(&dependency, origin)?);
      if let RawRef::Inline(inline) = dependency
        && inline.repo.is_some()
      {
        self.insert(inline.into_definition(origin)?);
      }
    }

    for component in raw.contents.clone().unwrap_or_default() {
      if let RawRef::Inline(mut inline) = component {
        inline.normalize();
        let own = inline.build_depends.take().unwrap_or_default();
        let mut depends: Vec<RawRef> = parent_depends_names.iter().cloned().map(RawRef::Name).collect();
        for dependency in own {
          let name = reference_name(&dependency, origin)?;
          if !parent_depends_names.contains(&name) {
            depends.push(dependency);
          }
        }
        inline.build_depends = Some(depends);
        self.insert(inline.into_definition(origin)?);
      }
    }

    self.insert(raw.into_definition(origin)?);
    Ok(())
  }

  /// Insert a definition, merging with an earlier one of the same name.
  ///
  /// Conflicting fields keep the earlier value and are logged as warnings.
  pub fn insert(&mut self, definition: Definition) -> Vec<Conflict> {
    let Some(existing) = self.definitions.get_mut(&definition.name) else {
      self.definitions.insert(definition.name.clone(), definition);
      return Vec::new();
    };

    let conflicts = existing.merge(definition);
    for conflict in &conflicts {
      warn!(
        component = %existing.name,
        field = conflict.field,
        kept = %conflict.kept,
        ignored = %conflict.ignored,
        "multiple definitions, keeping the earlier value"
      );
    }
    conflicts
  }

  pub fn get(&self, name: &str) -> Result<&Definition, DefinitionsError> {
    self
      .definitions
      .get(name)
      .ok_or_else(|| DefinitionsError::NotFound(name.to_string()))
  }

  pub fn contains(&self, name: &str) -> bool {
    self.definitions.contains_key(name)
  }

  pub fn len(&self) -> usize {
    self.definitions.len()
  }

  pub fn is_empty(&self) -> bool {
    self.definitions.is_empty()
  }

  pub fn iter(&self) -> impl Iterator<Item = &Definition> {
    self.definitions.values()
  }
}

/// A definition document as written, before normalization.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct RawDefinition {
  name: Option<String>,
  morph: Option<String>,
  kind: Option<String>,
  repo: Option<String>,
  #[serde(rename = "ref")]
  git_ref: Option<String>,
  build_depends: Option<Vec<RawRef>>,
  contents: Option<Vec<RawRef>>,
  chunks: Option<Vec<RawRef>>,
  strata: Option<Vec<RawRef>>,
  build_system: Option<String>,
  build_mode: Option<BuildMode>,
  prefix: Option<String>,
  max_jobs: Option<usize>,
  pre_configure_commands: Option<Vec<String>>,
  configure_commands: Option<Vec<String>>,
  post_configure_commands: Option<Vec<String>>,
  pre_build_commands: Option<Vec<String>>,
  build_commands: Option<Vec<String>>,
  post_build_commands: Option<Vec<String>>,
  pre_test_commands: Option<Vec<String>>,
  test_commands: Option<Vec<String>>,
  post_test_commands: Option<Vec<String>>,
  pre_install_commands: Option<Vec<String>>,
  install_commands: Option<Vec<String>>,
  post_install_commands: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum RawRef {
  Name(String),
  Inline(Box<RawDefinition>),
}

impl RawDefinition {
  /// Rewrite legacy syntax: `chunks`/`strata` become `contents`, and a
  /// `morph` path supplies the name when none is given.
  fn normalize(&mut self) {
    if self.contents.is_none() {
      self.contents = self.chunks.take().or_else(|| self.strata.take());
    }
    if self.name.is_none()
      && let Some(morph) = &self.morph
    {
      self.name = Path::new(morph)
        .file_stem()
        .map(|stem| stem.to_string_lossy().to_string());
    }
  }

  fn into_definition(mut self, origin: &Path) -> Result<Definition, DefinitionsError> {
    self.normalize();
    let name = self.name.clone().ok_or_else(|| DefinitionsError::UnnamedReference {
      path: origin.to_path_buf(),
    })?;

    let build_depends = names(self.build_depends.take(), origin)?;
    let contents = names(self.contents.take(), origin)?;

    let mut commands = Commands::new();
    let phases = [
      (BuildStep::PreConfigure, self.pre_configure_commands),
      (BuildStep::Configure, self.configure_commands),
      (BuildStep::PostConfigure, self.post_configure_commands),
      (BuildStep::PreBuild, self.pre_build_commands),
      (BuildStep::Build, self.build_commands),
      (BuildStep::PostBuild, self.post_build_commands),
      (BuildStep::PreTest, self.pre_test_commands),
      (BuildStep::Test, self.test_commands),
      (BuildStep::PostTest, self.post_test_commands),
      (BuildStep::PreInstall, self.pre_install_commands),
      (BuildStep::Install, self.install_commands),
      (BuildStep::PostInstall, self.post_install_commands),
    ];
    for (step, list) in phases {
      if let Some(list) = list.filter(|l| !l.is_empty()) {
        commands.insert(step, list);
      }
    }

    Ok(Definition {
      name,
      kind: self.kind,
      repo: self.repo,
      git_ref: self.git_ref,
      build_depends,
      contents,
      build_system: self.build_system,
      commands,
      prefix: self.prefix,
      build_mode: self.build_mode,
      max_jobs: self.max_jobs,
    })
  }
}

fn reference_name(reference: &RawRef, origin: &Path) -> Result<String, DefinitionsError> {
  match reference {
    RawRef::Name(name) => Ok(name.clone()),
    RawRef::Inline(inline) => {
      let mut inline = inline.as_ref().clone();
      inline.normalize();
      inline.name.ok_or_else(|| DefinitionsError::UnnamedReference {
        path: origin.to_path_buf(),
      })
    }
  }
}

fn names(references: Option<Vec<RawRef>>, origin: &Path) -> Result<Vec<String>, DefinitionsError> {
  let mut names = Vec::new();
  for reference in references.unwrap_or_default() {
    let name = reference_name(&reference, origin)?;
    if !names.contains(&name) {
      names.push(name);
    }
  }
  Ok(names)
}
