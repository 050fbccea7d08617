//! Shared helpers for assembly tests.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use strata_lib::assembly::{Assembler, AssemblyError, AssemblyReport};
use strata_lib::cache::ArtifactKey;
use strata_lib::definitions::trees::TreeMap;
use strata_lib::definitions::{Definition, Definitions};
use strata_lib::repos::{RepoError, SourceRepos};
use strata_lib::settings::Settings;
use tempfile::TempDir;

/// Isolated definitions directory, base and cache.
pub struct Workspace {
  pub temp: TempDir,
  pub settings: Settings,
}

impl Workspace {
  pub fn new() -> Self {
    let temp = TempDir::new().unwrap();
    let root = dunce::canonicalize(temp.path()).unwrap();
    let settings = Settings::rooted_at(&root);
    std::fs::create_dir_all(root.join("definitions")).unwrap();
    Self { temp, settings }
  }

  pub fn root(&self) -> PathBuf {
    dunce::canonicalize(self.temp.path()).unwrap()
  }

  pub fn definitions_dir(&self) -> PathBuf {
    self.root().join("definitions")
  }

  /// File every test component appends its name to when its build phase runs.
  pub fn order_log(&self) -> PathBuf {
    self.root().join("order.log")
  }

  pub fn order(&self) -> Vec<String> {
    std::fs::read_to_string(self.order_log())
      .unwrap_or_default()
      .lines()
      .map(str::to_string)
      .collect()
  }

  pub fn write(&self, file: &str, yaml: &str) {
    let path = self.definitions_dir().join(file);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, yaml).unwrap();
  }

  /// A bootstrap component that records its build and installs one file
  /// at `usr/share/<name>/file`.
  pub fn component(&self, name: &str, build_depends: &[&str], extra_build: &[&str]) {
    let mut build = extra_build.iter().map(|c| format!("  - '{}'\n", c)).collect::<String>();
    build.push_str(&format!("  - echo {} >> {}\n", name, self.order_log().display()));

    let yaml = format!(
      "name: {name}\n\
       kind: chunk\n\
       build-mode: bootstrap\n\
       build-depends: [{deps}]\n\
       build-commands:\n{build}\
       install-commands:\n\
       \x20 - mkdir -p \"$DESTDIR/usr/share/{name}\"\n\
       \x20 - echo {name} > \"$DESTDIR/usr/share/{name}/file\"\n",
      deps = build_depends.join(", "),
    );
    self.write(&format!("{}.morph", name), &yaml);
  }

  pub fn load(&self) -> Definitions {
    Definitions::load(&self.definitions_dir()).unwrap()
  }
}

/// Assemble `target` with a fresh assembler, returning the key and the report.
pub async fn assemble(
  ws: &Workspace,
  definitions: &Definitions,
  repos: &dyn SourceRepos,
  target: &str,
) -> (Result<ArtifactKey, AssemblyError>, AssemblyReport, TreeMap) {
  let mut assembler = Assembler::new(definitions, &ws.settings, TreeMap::new(), repos);
  let result = assembler.assemble(target).await;
  let report = assembler.report().clone();
  (result, report, assembler.into_trees())
}

/// For definitions without sources.
pub struct NoRepos;

impl SourceRepos for NoRepos {
  fn resolve(&self, definition: &Definition) -> Result<String, RepoError> {
    Err(RepoError::NoRepo(definition.name.clone()))
  }

  fn checkout(&self, definition: &Definition, _tree: &str, _dest: &Path) -> Result<(), RepoError> {
    Err(RepoError::NoRepo(definition.name.clone()))
  }
}

/// In-memory sources: one fixed tree per repo.
#[derive(Default)]
pub struct FakeRepos {
  pub trees: BTreeMap<String, (String, Vec<(&'static str, &'static str)>)>,
  resolved: AtomicUsize,
}

impl FakeRepos {
  pub fn with(mut self, repo: &str, tree: &str, files: Vec<(&'static str, &'static str)>) -> Self {
    self.trees.insert(repo.to_string(), (tree.to_string(), files));
    self
  }

  /// Number of `resolve` calls so far.
  pub fn resolves(&self) -> usize {
    self.resolved.load(Ordering::SeqCst)
  }

  fn entry(&self, definition: &Definition) -> Result<&(String, Vec<(&'static str, &'static str)>), RepoError> {
    definition
      .repo
      .as_ref()
      .and_then(|repo| self.trees.get(repo))
      .ok_or_else(|| RepoError::NoRepo(definition.name.clone()))
  }
}

impl SourceRepos for FakeRepos {
  fn resolve(&self, definition: &Definition) -> Result<String, RepoError> {
    self.resolved.fetch_add(1, Ordering::SeqCst);
    Ok(self.entry(definition)?.0.clone())
  }

  fn checkout(&self, definition: &Definition, tree: &str, dest: &Path) -> Result<(), RepoError> {
    let (known, files) = self.entry(definition)?;
    assert_eq!(known, tree, "checkout of an unresolved tree");
    for (name, content) in files {
      let path = dest.join(name);
      std::fs::create_dir_all(path.parent().unwrap()).unwrap();
      std::fs::write(path, content).unwrap();
    }
    Ok(())
  }
}
