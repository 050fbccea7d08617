//! Artifact cache.
//!
//! Artifacts are tar.gz archives of a component's install tree, stored
//! write-once under their key:
//!
//! ```text
//! <cache>/
//! ├── artifacts/
//! │   ├── <key>               # archive
//! │   └── <key>.unpacked/     # extracted on first install, reused after
//! └── tmp/                    # in-flight writes, renamed into place
//! ```

mod archive;
mod key;

pub use key::{ArtifactKey, KeyMaterial};

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};

use crate::consts::UNPACKED_SUFFIX;
use crate::settings::Settings;

#[derive(Debug, Error)]
pub enum CacheError {
  /// An artifact was needed (to install it) but is not in the cache.
  #[error("cached artifact not found: {0}")]
  Missing(ArtifactKey),

  #[error("failed to archive {path}: {source}")]
  Pack {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to unpack {path}: {source}")]
  Unpack {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("cache I/O error at {path}: {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: io::Error,
  },
}

fn io_err(path: &Path) -> impl FnOnce(io::Error) -> CacheError + '_ {
  move |source| CacheError::Io {
    path: path.to_path_buf(),
    source,
  }
}

#[derive(Debug, Clone)]
pub struct ArtifactCache {
  root: PathBuf,
}

impl ArtifactCache {
  pub fn new(root: &Path) -> Self {
    Self {
      root: root.to_path_buf(),
    }
  }

  pub fn from_settings(settings: &Settings) -> Self {
    Self::new(&settings.cache_dir)
  }

  pub fn root(&self) -> &Path {
    &self.root
  }

  pub fn artifacts_dir(&self) -> PathBuf {
    self.root.join("artifacts")
  }

  fn tmp_dir(&self) -> PathBuf {
    self.root.join("tmp")
  }

  pub fn artifact_path(&self, key: &ArtifactKey) -> PathBuf {
    self.artifacts_dir().join(key.as_str())
  }

  pub fn unpacked_path(&self, key: &ArtifactKey) -> PathBuf {
    self.artifacts_dir().join(format!("{}{}", key, UNPACKED_SUFFIX))
  }

  /// Path of the archive for `key`, if it has been cached.
  pub fn get(&self, key: &ArtifactKey) -> Option<PathBuf> {
    let path = self.artifact_path(key);
    path.is_file().then_some(path)
  }

  /// Archive `install_dir` under `key`.
  ///
  /// An existing entry is never rewritten; its path is returned as is.
  pub fn put(&self, key: &ArtifactKey, install_dir: &Path) -> Result<PathBuf, CacheError> {
    if let Some(existing) = self.get(key) {
      debug!(key = %key, "artifact already cached");
      return Ok(existing);
    }

    let artifacts = self.artifacts_dir();
    let tmp = self.tmp_dir();
    std::fs::create_dir_all(&artifacts).map_err(io_err(&artifacts))?;
    std::fs::create_dir_all(&tmp).map_err(io_err(&tmp))?;

    let staged = tempfile::Builder::new()
      .prefix(key.as_str())
      .tempfile_in(&tmp)
      .map_err(io_err(&tmp))?;

    archive::pack(install_dir, staged.path()).map_err(|source| CacheError::Pack {
      path: install_dir.to_path_buf(),
      source,
    })?;

    let dest = self.artifact_path(key);
    staged.persist(&dest).map_err(|e| CacheError::Io {
      path: dest.clone(),
      source: e.error,
    })?;

    info!(key = %key, path = %dest.display(), "artifact cached");
    Ok(dest)
  }

  /// Extract the artifact for `key` next to its archive, once.
  ///
  /// Later calls return the existing directory without touching it.
  pub fn unpack(&self, key: &ArtifactKey) -> Result<PathBuf, CacheError> {
    let archive = self.get(key).ok_or_else(|| CacheError::Missing(key.clone()))?;
    let unpacked = self.unpacked_path(key);
    if unpacked.is_dir() {
      return Ok(unpacked);
    }

    let tmp = self.tmp_dir();
    std::fs::create_dir_all(&tmp).map_err(io_err(&tmp))?;
    let staging = tempfile::Builder::new()
      .prefix(key.as_str())
      .tempdir_in(&tmp)
      .map_err(io_err(&tmp))?;

    archive::unpack(&archive, staging.path()).map_err(|source| CacheError::Unpack {
      path: archive.clone(),
      source,
    })?;

    if let Err(source) = std::fs::rename(staging.path(), &unpacked) {
      // Someone else finished first.
      if !unpacked.is_dir() {
        return Err(CacheError::Io { path: unpacked, source });
      }
    }

    debug!(key = %key, path = %unpacked.display(), "artifact unpacked");
    Ok(unpacked)
  }
}
