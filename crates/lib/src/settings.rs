//! Run-wide settings.
//!
//! Settings start from XDG-style defaults, are overridden by `STRATA_*`
//! environment variables, and finally by whatever the caller (usually the CLI)
//! sets on the returned struct.
//!
//! # Layout
//!
//! ```text
//! <base>/
//! ├── assembly/               # per-component sandboxes
//! ├── artifacts/              # <key>.build-log files
//! ├── gits/                   # mirrored source repositories
//! └── ccache/                 # per-component compiler caches
//! <cache>/
//! ├── artifacts/              # <key> archives and <key>.unpacked dirs
//! └── tmp/                    # partially written entries
//! ```

use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

use crate::platform::arch::{Arch, UnknownArch};
use crate::platform::paths::{cache_dir, data_dir};

#[derive(Debug, Error)]
pub enum SettingsError {
  #[error(transparent)]
  Arch(#[from] UnknownArch),

  #[error("host architecture is not supported, set STRATA_ARCH")]
  UnsupportedHost,

  #[error("invalid value for {var}: {value}")]
  InvalidNumber { var: &'static str, value: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct Settings {
  /// Root of working state (sandboxes, logs, mirrors, compiler caches).
  pub base_dir: PathBuf,

  /// Root of the artifact cache.
  pub cache_dir: PathBuf,

  /// Architecture the stack is assembled for.
  pub arch: Arch,

  /// Default build parallelism, overridable per definition.
  pub max_jobs: usize,

  /// Disable the compiler cache wrapper and its bind mount.
  pub no_ccache: bool,

  /// Do not route the compiler cache through distcc.
  pub no_distcc: bool,

  /// PATH inherited by bootstrap-mode builds, captured once at startup.
  pub host_path: String,
}

impl Settings {
  /// Read settings from the environment.
  pub fn from_env() -> Result<Self, SettingsError> {
    let base_dir = env_path("STRATA_BASE").unwrap_or_else(data_dir);
    let cache_dir = env_path("STRATA_CACHE").unwrap_or_else(cache_dir);

    let arch = match std::env::var("STRATA_ARCH") {
      Ok(value) => value.parse()?,
      Err(_) => Arch::current().ok_or(SettingsError::UnsupportedHost)?,
    };

    let max_jobs = match std::env::var("STRATA_MAX_JOBS") {
      Ok(value) => value.parse().map_err(|_| SettingsError::InvalidNumber {
        var: "STRATA_MAX_JOBS",
        value,
      })?,
      Err(_) => default_max_jobs(),
    };

    Ok(Self {
      base_dir,
      cache_dir,
      arch,
      max_jobs,
      no_ccache: env_flag("STRATA_NO_CCACHE"),
      no_distcc: env_flag("STRATA_NO_DISTCC"),
      host_path: std::env::var("PATH").unwrap_or_default(),
    })
  }

  /// Settings rooted in a single directory, with the compiler cache off.
  ///
  /// Used by tests and by callers that want a throwaway workspace.
  pub fn rooted_at(root: &Path) -> Self {
    Self {
      base_dir: root.join("base"),
      cache_dir: root.join("cache"),
      arch: Arch::current().unwrap_or(Arch::X86_64),
      max_jobs: 1,
      no_ccache: true,
      no_distcc: true,
      host_path: std::env::var("PATH").unwrap_or_default(),
    }
  }

  pub fn assembly_dir(&self) -> PathBuf {
    self.base_dir.join("assembly")
  }

  pub fn artifacts_dir(&self) -> PathBuf {
    self.base_dir.join("artifacts")
  }

  pub fn gits_dir(&self) -> PathBuf {
    self.base_dir.join("gits")
  }

  pub fn ccache_dir(&self) -> PathBuf {
    self.base_dir.join("ccache")
  }
}

fn default_max_jobs() -> usize {
  std::thread::available_parallelism().map(|p| p.get()).unwrap_or(4)
}

fn env_path(var: &str) -> Option<PathBuf> {
  std::env::var(var).ok().filter(|v| !v.is_empty()).map(PathBuf::from)
}

fn env_flag(var: &str) -> bool {
  std::env::var(var)
    .map(|v| !matches!(v.as_str(), "" | "0" | "false" | "no"))
    .unwrap_or(false)
}
