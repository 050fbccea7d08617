//! Installing cached artifacts into sandbox trees.

use std::fs;
use std::io;
use std::path::Path;

use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::cache::{ArtifactCache, ArtifactKey};

use super::SandboxError;

/// Unpack `key` (once) and hard-link its files into `dest`.
pub fn install_artifact(cache: &ArtifactCache, key: &ArtifactKey, dest: &Path) -> Result<usize, SandboxError> {
  info!(key = %key, dest = %dest.display(), "installing artifact");
  let unpacked = cache.unpack(key)?;
  let linked = hardlink_all(&unpacked, dest).map_err(|source| SandboxError::Io {
    path: dest.to_path_buf(),
    source,
  })?;
  debug!(key = %key, files = linked, "artifact installed");
  Ok(linked)
}

/// Mirror `src` into `dest` with hard links, recreating directories and
/// symlinks. Existing files at the destination are replaced.
///
/// A symlink in `dest` where `src` has a directory is replaced by a real
/// directory; nothing is ever written through a link.
///
/// Returns the number of files and symlinks linked.
pub fn hardlink_all(src: &Path, dest: &Path) -> io::Result<usize> {
  fs::create_dir_all(dest)?;
  let mut linked = 0;

  for entry in WalkDir::new(src).min_depth(1).sort_by_file_name() {
    let entry = entry.map_err(io::Error::other)?;
    let rel = entry.path().strip_prefix(src).map_err(io::Error::other)?;
    let target = dest.join(rel);
    let file_type = entry.file_type();

    if file_type.is_dir() {
      match fs::symlink_metadata(&target) {
        Ok(meta) if meta.is_dir() => {}
        Ok(meta) => {
          if meta.file_type().is_symlink() {
            warn!(path = %target.display(), "replacing symlink with artifact directory");
          }
          remove_existing(&target)?;
          fs::create_dir(&target)?;
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => fs::create_dir(&target)?,
        Err(e) => return Err(e),
      }
      continue;
    }

    remove_existing(&target)?;
    if file_type.is_symlink() {
      symlink(&fs::read_link(entry.path())?, &target)?;
    } else {
      fs::hard_link(entry.path(), &target)?;
    }
    linked += 1;
  }

  Ok(linked)
}

fn remove_existing(path: &Path) -> io::Result<()> {
  match fs::symlink_metadata(path) {
    Ok(meta) if meta.is_dir() => fs::remove_dir_all(path),
    Ok(_) => fs::remove_file(path),
    Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
    Err(e) => Err(e),
  }
}

#[cfg(unix)]
fn symlink(original: &Path, link: &Path) -> io::Result<()> {
  std::os::unix::fs::symlink(original, link)
}

#[cfg(not(unix))]
fn symlink(_original: &Path, link: &Path) -> io::Result<()> {
  Err(io::Error::new(
    io::ErrorKind::Unsupported,
    format!("cannot recreate symlink {}", link.display()),
  ))
}
