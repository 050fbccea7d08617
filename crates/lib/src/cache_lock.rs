//! Advisory lock on the artifact cache.
//!
//! One exclusive holder at a time may build into a cache. The holder writes
//! its pid and command into the lock file so a second run can say who it is
//! waiting on.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

const LOCK_FILENAME: &str = ".lock";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
  /// Read-only access (e.g. `strata key`).
  Shared,
  /// Building into the cache.
  Exclusive,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LockMetadata {
  pub version: u32,
  pub pid: u32,
  pub started_at_unix: u64,
  pub command: String,
  pub cache: PathBuf,
}

#[derive(Debug, Error)]
pub enum CacheLockError {
  #[error(
    "cache is locked by another process: {command} (PID {pid}, started at unix time {started_at_unix})\n\
     If no strata process is running, remove the lock file:\n  {}",
    .lock_path.display()
  )]
  Contention {
    command: String,
    pid: u32,
    started_at_unix: u64,
    lock_path: PathBuf,
  },

  #[error(
    "cache is locked (lock metadata unreadable)\n\
     If no strata process is running, remove the lock file:\n  {}",
    .lock_path.display()
  )]
  ContentionUnknown { lock_path: PathBuf },

  #[error("failed to create cache directory: {0}")]
  CreateDir(#[source] io::Error),

  #[error("failed to open lock file: {0}")]
  OpenFile(#[source] io::Error),

  #[error("failed to write lock metadata: {0}")]
  WriteMetadata(#[source] io::Error),

  #[error("failed to acquire lock: {0}")]
  LockFailed(#[source] io::Error),
}

/// Held for as long as the value lives; dropping it releases the lock.
#[derive(Debug)]
pub struct CacheLock {
  file: File,
  lock_path: PathBuf,
}

impl CacheLock {
  pub fn acquire(cache_dir: &Path, mode: LockMode, command: &str) -> Result<Self, CacheLockError> {
    let lock_path = cache_dir.join(LOCK_FILENAME);
    std::fs::create_dir_all(cache_dir).map_err(CacheLockError::CreateDir)?;

    let file = OpenOptions::new()
      .read(true)
      .write(true)
      .create(true)
      .truncate(false)
      .open(&lock_path)
      .map_err(CacheLockError::OpenFile)?;

    if let Err(err) = try_lock(&file, mode) {
      if err.kind() == io::ErrorKind::WouldBlock {
        return Err(read_contention_error(&lock_path));
      }
      return Err(CacheLockError::LockFailed(err));
    }

    if mode == LockMode::Exclusive {
      write_metadata(&file, command, cache_dir)?;
    }

    debug!(path = %lock_path.display(), ?mode, "cache lock acquired");
    Ok(Self { file, lock_path })
  }

  pub fn read_metadata(&self) -> io::Result<LockMetadata> {
    let mut file = &self.file;
    file.seek(SeekFrom::Start(0))?;
    let mut contents = String::new();
    file.read_to_string(&mut contents)?;
    serde_json::from_str(&contents).map_err(io::Error::other)
  }

  pub fn lock_path(&self) -> &Path {
    &self.lock_path
  }
}

fn write_metadata(file: &File, command: &str, cache: &Path) -> Result<(), CacheLockError> {
  let metadata = LockMetadata {
    version: 1,
    pid: std::process::id(),
    started_at_unix: SystemTime::now()
      .duration_since(UNIX_EPOCH)
      .unwrap_or_default()
      .as_secs(),
    command: command.to_string(),
    cache: cache.to_path_buf(),
  };

  file.set_len(0).map_err(CacheLockError::WriteMetadata)?;
  let mut writer = io::BufWriter::new(file);
  serde_json::to_writer_pretty(&mut writer, &metadata).map_err(|e| CacheLockError::WriteMetadata(io::Error::other(e)))?;
  writer.flush().map_err(CacheLockError::WriteMetadata)?;
  Ok(())
}

fn read_contention_error(lock_path: &Path) -> CacheLockError {
  if let Ok(contents) = std::fs::read_to_string(lock_path)
    && let Ok(metadata) = serde_json::from_str::<LockMetadata>(&contents)
  {
    return CacheLockError::Contention {
      command: metadata.command,
      pid: metadata.pid,
      started_at_unix: metadata.started_at_unix,
      lock_path: lock_path.to_path_buf(),
    };
  }

  CacheLockError::ContentionUnknown {
    lock_path: lock_path.to_path_buf(),
  }
}

#[cfg(unix)]
fn try_lock(file: &File, mode: LockMode) -> io::Result<()> {
  use rustix::fs::{FlockOperation, flock};
  use std::os::unix::io::AsFd;

  let operation = match mode {
    LockMode::Shared => FlockOperation::NonBlockingLockShared,
    LockMode::Exclusive => FlockOperation::NonBlockingLockExclusive,
  };

  flock(file.as_fd(), operation).map_err(|e| io::Error::from_raw_os_error(e.raw_os_error()))
}

#[cfg(not(unix))]
fn try_lock(file: &File, mode: LockMode) -> io::Result<()> {
  match mode {
    LockMode::Shared => file.try_lock_shared(),
    LockMode::Exclusive => file.try_lock(),
  }
  .map_err(|e| match e {
    std::fs::TryLockError::WouldBlock => io::ErrorKind::WouldBlock.into(),
    std::fs::TryLockError::Error(e) => e,
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::TempDir;

  #[test]
  fn exclusive_lock_writes_metadata() {
    let temp = TempDir::new().unwrap();
    let lock = CacheLock::acquire(temp.path(), LockMode::Exclusive, "strata build zlib").unwrap();

    assert!(lock.lock_path().exists());
    let metadata = lock.read_metadata().unwrap();
    assert_eq!(metadata.version, 1);
    assert_eq!(metadata.command, "strata build zlib");
    assert_eq!(metadata.pid, std::process::id());
    assert_eq!(metadata.cache, temp.path());
  }

  #[test]
  fn shared_locks_coexist() {
    let temp = TempDir::new().unwrap();
    let _a = CacheLock::acquire(temp.path(), LockMode::Shared, "a").unwrap();
    let _b = CacheLock::acquire(temp.path(), LockMode::Shared, "b").unwrap();
  }

  #[cfg(unix)]
  #[test]
  fn second_exclusive_lock_reports_holder() {
    let temp = TempDir::new().unwrap();
    let _held = CacheLock::acquire(temp.path(), LockMode::Exclusive, "strata build core").unwrap();

    let err = CacheLock::acquire(temp.path(), LockMode::Exclusive, "strata build other").unwrap_err();
    match err {
      CacheLockError::Contention { command, pid, .. } => {
        assert_eq!(command, "strata build core");
        assert_eq!(pid, std::process::id());
      }
      other => panic!("unexpected error: {other}"),
    }
  }

  #[test]
  fn lock_released_on_drop() {
    let temp = TempDir::new().unwrap();
    {
      let _lock = CacheLock::acquire(temp.path(), LockMode::Exclusive, "first").unwrap();
    }
    CacheLock::acquire(temp.path(), LockMode::Exclusive, "second").unwrap();
  }
}
