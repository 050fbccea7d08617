//! Filesystem containment for staging-mode builds.
//!
//! A [`Containment`] describes the mount namespace a build step runs in: the
//! assembly directory becomes `/`, read-only except for the build, install
//! and tmp directories, with a private `/proc`, a tmpfs on `/dev/shm` and the
//! component's compiler cache bound onto `/tmp/ccache`.
//!
//! The plan is computed in the parent; [`Containment::enter`] runs in the
//! forked child right before exec.

use std::io;
use std::path::{Path, PathBuf};

use super::Layout;
use super::env::CCACHE_MOUNT;

#[derive(Debug, Clone, PartialEq)]
pub struct Mount {
  pub source: &'static str,
  pub target: PathBuf,
  pub fstype: &'static str,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Containment {
  /// New root directory (host path).
  pub root: PathBuf,
  /// Working directory, relative to the new root.
  pub cwd: PathBuf,
  /// Host paths under `root` that stay writable.
  pub writable: Vec<PathBuf>,
  /// Host directory -> host mount point under `root`.
  pub binds: Vec<(PathBuf, PathBuf)>,
  pub mounts: Vec<Mount>,
}

impl Containment {
  pub fn new(layout: &Layout, ccache_dir: Option<&Path>) -> Self {
    let root = layout.assembly.clone();
    let cwd = Path::new("/").join(super::env::file_name(&layout.build));

    let binds = ccache_dir
      .map(|dir| vec![(dir.to_path_buf(), inside(&root, CCACHE_MOUNT))])
      .unwrap_or_default();

    Self {
      writable: vec![layout.build.clone(), layout.install.clone(), root.join("tmp")],
      mounts: vec![
        Mount {
          source: "proc",
          target: root.join("proc"),
          fstype: "proc",
        },
        Mount {
          source: "none",
          target: root.join("dev/shm"),
          fstype: "tmpfs",
        },
      ],
      binds,
      cwd,
      root,
    }
  }

  /// Create every mount point and bind source the plan refers to.
  pub fn prepare(&self) -> io::Result<()> {
    for dir in &self.writable {
      std::fs::create_dir_all(dir)?;
    }
    for (source, target) in &self.binds {
      std::fs::create_dir_all(source)?;
      std::fs::create_dir_all(target)?;
    }
    for mount in &self.mounts {
      std::fs::create_dir_all(&mount.target)?;
    }
    Ok(())
  }

  /// Enter the contained root. Only call in a freshly forked child.
  #[cfg(target_os = "linux")]
  pub fn enter(&self) -> io::Result<()> {
    use nix::mount::{MsFlags, mount};
    use nix::sched::{CloneFlags, unshare};
    use nix::unistd::{chdir, chroot};

    const NONE: Option<&str> = None;

    unshare(CloneFlags::CLONE_NEWNS)?;
    mount(NONE, "/", NONE, MsFlags::MS_REC | MsFlags::MS_PRIVATE, NONE)?;

    // The root must be a mount point of its own to be remounted read-only.
    mount(Some(&self.root), &self.root, NONE, MsFlags::MS_BIND | MsFlags::MS_REC, NONE)?;
    for dir in &self.writable {
      mount(Some(dir), dir, NONE, MsFlags::MS_BIND, NONE)?;
    }
    for (source, target) in &self.binds {
      mount(Some(source), target, NONE, MsFlags::MS_BIND, NONE)?;
    }
    mount(
      NONE,
      &self.root,
      NONE,
      MsFlags::MS_REMOUNT | MsFlags::MS_BIND | MsFlags::MS_RDONLY,
      NONE,
    )?;
    for m in &self.mounts {
      mount(Some(m.source), &m.target, Some(m.fstype), MsFlags::empty(), NONE)?;
    }

    chroot(&self.root)?;
    chdir(&self.cwd)?;
    Ok(())
  }

  #[cfg(not(target_os = "linux"))]
  pub fn enter(&self) -> io::Result<()> {
    Err(io::Error::new(
      io::ErrorKind::Unsupported,
      "contained builds require Linux mount namespaces",
    ))
  }
}

fn inside(root: &Path, path: &str) -> PathBuf {
  root.join(path.trim_start_matches('/'))
}
