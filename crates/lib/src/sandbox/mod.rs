//! Per-component build sandboxes.
//!
//! Every component is built in its own assembly directory:
//!
//! ```text
//! <assembly>/<name>/              # root of the sandbox, build-depends land here
//! ├── <name>.build/               # checked out source, working directory
//! └── <name>.inst/                # DESTDIR, becomes the artifact
//! ```
//!
//! A [`BuildContext`] carries the directories and the computed environment
//! explicitly; the calling process's environment and working directory are
//! never changed.

mod contain;
mod env;
mod exec;
mod install;

pub use contain::{Containment, Mount};
pub use env::{CCACHE_MOUNT, create_env};
pub use install::{hardlink_all, install_artifact};

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, warn};

use crate::cache::{ArtifactCache, ArtifactKey, CacheError};
use crate::consts::BUILD_LOG_SUFFIX;
use crate::definitions::{BuildMode, BuildStep, Definition};
use crate::settings::Settings;

#[derive(Debug, Error)]
pub enum SandboxError {
  #[error("{component}: {step} failed with exit code {code:?}: {command}\n  log: {}", .log.display())]
  CommandFailed {
    component: String,
    step: BuildStep,
    command: String,
    code: Option<i32>,
    log: PathBuf,
  },

  #[error("failed to spawn `{command}`: {source}")]
  Spawn {
    command: String,
    #[source]
    source: std::io::Error,
  },

  #[error("contained builds are only supported on Linux ({component})")]
  Unsupported { component: String },

  #[error("sandbox I/O error at {path}: {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error(transparent)]
  Cache(#[from] CacheError),
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> SandboxError + '_ {
  move |source| SandboxError::Io {
    path: path.to_path_buf(),
    source,
  }
}

/// Directory triple of one component's sandbox.
#[derive(Debug, Clone, PartialEq)]
pub struct Layout {
  pub assembly: PathBuf,
  pub build: PathBuf,
  pub install: PathBuf,
}

impl Layout {
  pub fn new(assembly_root: &Path, name: &str) -> Self {
    let dir = dir_name(name);
    let assembly = assembly_root.join(&dir);
    Self {
      build: assembly.join(format!("{}.build", dir)),
      install: assembly.join(format!("{}.inst", dir)),
      assembly,
    }
  }
}

/// Single path segment for a component name. `%` and `/` are
/// percent-encoded so no two names share a sandbox.
fn dir_name(name: &str) -> String {
  let mut dir = String::with_capacity(name.len());
  for c in name.chars() {
    match c {
      '%' => dir.push_str("%25"),
      '/' => dir.push_str("%2F"),
      c => dir.push(c),
    }
  }
  dir
}

#[derive(Debug)]
pub struct BuildContext {
  pub name: String,
  pub mode: BuildMode,
  pub layout: Layout,
  pub log: PathBuf,
  pub env: BTreeMap<String, String>,
  containment: Option<Containment>,
}

impl BuildContext {
  /// Set up a fresh sandbox for `definition`.
  ///
  /// A leftover sandbox from an earlier failed attempt is removed first.
  pub fn acquire(
    definition: &Definition,
    build_depends: &[&Definition],
    key: &ArtifactKey,
    settings: &Settings,
  ) -> Result<Self, SandboxError> {
    let layout = Layout::new(&settings.assembly_dir(), &definition.name);
    if layout.assembly.exists() {
      warn!(
        component = %definition.name,
        path = %layout.assembly.display(),
        "removing leftover sandbox"
      );
      std::fs::remove_dir_all(&layout.assembly).map_err(io_err(&layout.assembly))?;
    }
    for dir in [&layout.assembly, &layout.build, &layout.install] {
      std::fs::create_dir_all(dir).map_err(io_err(dir))?;
    }

    let env = create_env(definition, build_depends, &layout, settings);

    let mode = definition.mode();
    let containment = match mode {
      BuildMode::Staging => {
        let ccache = (!settings.no_ccache).then(|| settings.ccache_dir().join(dir_name(&definition.name)));
        let plan = Containment::new(&layout, ccache.as_deref());
        plan.prepare().map_err(io_err(&layout.assembly))?;
        Some(plan)
      }
      BuildMode::Bootstrap => None,
    };

    let artifacts = settings.artifacts_dir();
    std::fs::create_dir_all(&artifacts).map_err(io_err(&artifacts))?;
    let log = artifacts.join(format!("{}{}", key, BUILD_LOG_SUFFIX));
    write_log_header(&log, &env).map_err(io_err(&log))?;

    debug!(component = %definition.name, mode = %mode, path = %env["PATH"], "sandbox ready");

    Ok(Self {
      name: definition.name.clone(),
      mode,
      layout,
      log,
      env,
      containment,
    })
  }

  /// Run one build-step command, appending its output to the build log.
  pub async fn run(&self, step: BuildStep, command: &str) -> Result<(), SandboxError> {
    exec::run(self, step, command).await
  }

  /// Install a build-dependency's artifact into the sandbox root.
  pub fn install_dependency(&self, cache: &ArtifactCache, key: &ArtifactKey) -> Result<usize, SandboxError> {
    install_artifact(cache, key, &self.layout.assembly)
  }

  /// Install a content component's artifact into the install tree.
  pub fn install_content(&self, cache: &ArtifactCache, key: &ArtifactKey) -> Result<usize, SandboxError> {
    install_artifact(cache, key, &self.layout.install)
  }

  pub fn containment(&self) -> Option<&Containment> {
    self.containment.as_ref()
  }

  /// Remove the whole sandbox. Only called once the artifact is cached.
  pub fn cleanup(self) -> Result<(), SandboxError> {
    debug!(component = %self.name, "removing sandbox");
    std::fs::remove_dir_all(&self.layout.assembly).map_err(io_err(&self.layout.assembly))
  }
}

fn write_log_header(log: &Path, env: &BTreeMap<String, String>) -> std::io::Result<()> {
  let mut file = std::fs::File::create(log)?;
  for (key, value) in env {
    writeln!(file, "# {}={}", key, value)?;
  }
  Ok(())
}
