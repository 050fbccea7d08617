//! Recursive assembly.
//!
//! [`Assembler::assemble`] makes sure a cached artifact exists for a
//! component and everything it depends on, building whatever is missing
//! depth-first:
//!
//! 1. Derive the component's cache key (resolving source trees on the way).
//! 2. Stop if the cache already has it.
//! 3. Acquire a sandbox.
//! 4. Assemble each build-dependency and install it into the sandbox root.
//! 5. Assemble each content component and install it into the install tree.
//! 6. Check out the source, run the build phases, cache the install tree.
//!
//! Everything resolved during a run (trees, keys, what was built) lives in
//! the assembler; the definitions are never modified.

pub mod pipeline;

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Instant;

use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::cache::{ArtifactCache, ArtifactKey, CacheError, KeyMaterial};
use crate::cache_lock::CacheLockError;
use crate::definitions::trees::TreeMap;
use crate::definitions::{BuildStep, Definition, Definitions, DefinitionsError};
use crate::repos::{RepoError, SourceRepos};
use crate::sandbox::{BuildContext, SandboxError};
use crate::settings::{Settings, SettingsError};
use crate::util::hash::HashError;

#[derive(Debug, Error)]
pub enum AssemblyError {
  #[error(transparent)]
  Definitions(#[from] DefinitionsError),

  #[error(transparent)]
  Repo(#[from] RepoError),

  #[error(transparent)]
  Cache(#[from] CacheError),

  #[error(transparent)]
  Sandbox(#[from] SandboxError),

  #[error(transparent)]
  Settings(#[from] SettingsError),

  #[error(transparent)]
  Lock(#[from] CacheLockError),

  #[error("failed to derive cache key: {0}")]
  Key(#[from] HashError),

  #[error("failed to list sources in {path}: {source}")]
  ListSources {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
}

/// What a run did, in the order it happened.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AssemblyReport {
  /// Components built during the run.
  pub built: Vec<String>,
  /// Components found in the cache.
  pub cached: Vec<String>,
}

pub struct Assembler<'a> {
  definitions: &'a Definitions,
  settings: &'a Settings,
  repos: &'a dyn SourceRepos,
  cache: ArtifactCache,
  trees: TreeMap,
  keys: HashMap<String, ArtifactKey>,
  report: AssemblyReport,
}

impl<'a> Assembler<'a> {
  pub fn new(definitions: &'a Definitions, settings: &'a Settings, trees: TreeMap, repos: &'a dyn SourceRepos) -> Self {
    Self {
      definitions,
      settings,
      repos,
      cache: ArtifactCache::from_settings(settings),
      trees,
      keys: HashMap::new(),
      report: AssemblyReport::default(),
    }
  }

  pub fn cache(&self) -> &ArtifactCache {
    &self.cache
  }

  pub fn report(&self) -> &AssemblyReport {
    &self.report
  }

  pub fn trees(&self) -> &TreeMap {
    &self.trees
  }

  /// Hand back the tree map, including every tree resolved by this run.
  pub fn into_trees(self) -> TreeMap {
    self.trees
  }

  /// Cache key of `name`, derived once per run.
  pub fn cache_key(&mut self, name: &str) -> Result<ArtifactKey, AssemblyError> {
    if let Some(key) = self.keys.get(name) {
      return Ok(key.clone());
    }

    let definitions = self.definitions;
    let definition = definitions.get(name)?;
    let tree = self.tree(definition)?;
    let build_depends = definition
      .build_depends
      .iter()
      .map(|dep| self.cache_key(dep))
      .collect::<Result<Vec<_>, _>>()?;
    let contents = definition
      .contents
      .iter()
      .map(|component| self.cache_key(component))
      .collect::<Result<Vec<_>, _>>()?;

    let key = KeyMaterial {
      name: &definition.name,
      tree: tree.as_deref(),
      build_system: definition.build_system.as_deref(),
      commands: &definition.commands,
      prefix: definition.install_prefix(),
      build_mode: definition.mode(),
      arch: self.settings.arch,
      build_depends: build_depends.iter().collect(),
      contents: contents.iter().collect(),
    }
    .key()?;

    self.keys.insert(name.to_string(), key.clone());
    Ok(key)
  }

  /// Assemble `name` and everything below it.
  pub async fn assemble(&mut self, name: &str) -> Result<ArtifactKey, AssemblyError> {
    let definitions = self.definitions;
    let definition = definitions.get(name)?;
    let key = self.cache_key(name)?;

    if let Some(path) = self.cache.get(&key) {
      info!(component = %name, path = %path.display(), "cache found");
      self.report.cached.push(name.to_string());
      return Ok(key);
    }

    let started = Instant::now();
    info!(component = %name, key = %key, "starting assembly");

    let build_depends = definition
      .build_depends
      .iter()
      .map(|dep| definitions.get(dep))
      .collect::<Result<Vec<_>, _>>()?;
    let ctx = BuildContext::acquire(definition, &build_depends, &key, self.settings)?;

    for dependency in &definition.build_depends {
      let dep_key = Box::pin(self.assemble(dependency)).await?;
      ctx.install_dependency(&self.cache, &dep_key)?;
    }

    for component in &definition.contents {
      let component_key = Box::pin(self.assemble(component)).await?;
      ctx.install_content(&self.cache, &component_key)?;
    }

    self.build(definition, &ctx).await?;

    self.cache.put(&key, &ctx.layout.install)?;
    ctx.cleanup()?;

    self.report.built.push(name.to_string());
    info!(component = %name, elapsed = ?started.elapsed(), "assembly complete");
    Ok(key)
  }

  async fn build(&mut self, definition: &Definition, ctx: &BuildContext) -> Result<(), AssemblyError> {
    info!(component = %definition.name, "start build");

    if let Some(tree) = self.tree(definition)? {
      self.repos.checkout(definition, &tree, &ctx.layout.build)?;
    }

    let commands = pipeline::effective_commands(definition, &ctx.layout.build)?;
    if commands.is_empty() {
      warn!(component = %definition.name, "no build commands");
    }

    for step in BuildStep::ALL {
      let Some(step_commands) = commands.get(&step) else {
        continue;
      };
      info!(component = %definition.name, phase = %step, "running");
      for command in step_commands {
        ctx.run(step, command).await?;
      }
    }

    Ok(())
  }

  /// Source tree of a definition with a repo, resolving it if unknown.
  fn tree(&mut self, definition: &Definition) -> Result<Option<String>, AssemblyError> {
    if definition.repo.is_none() {
      return Ok(None);
    }
    if let Some(tree) = self.trees.get(&definition.name) {
      return Ok(Some(tree.to_string()));
    }

    info!(component = %definition.name, "resolving source tree");
    let tree = self.repos.resolve(definition)?;
    self.trees.insert(&definition.name, &tree);
    Ok(Some(tree))
  }
}
