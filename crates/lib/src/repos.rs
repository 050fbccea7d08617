//! Source repositories.
//!
//! The assembler only needs two things from a source repo: the tree id a
//! definition's ref points at (it feeds the cache key) and a way to write
//! that tree into a build directory. [`SourceRepos`] is that seam;
//! [`GitRepos`] implements it with bare mirrors under `<base>/gits`.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use gix::bstr::ByteSlice;
use gix::objs::tree::EntryKind;
use gix::remote::Direction;
use thiserror::Error;
use tracing::{debug, info};

use crate::definitions::Definition;

#[derive(Debug, Error)]
pub enum RepoError {
  #[error("{0} has no repo")]
  NoRepo(String),

  #[error("failed to mirror '{url}': {source}")]
  Clone {
    url: String,
    #[source]
    source: Box<dyn std::error::Error + Send + Sync>,
  },

  #[error("failed to open mirror at '{path}': {source}")]
  Open {
    path: PathBuf,
    #[source]
    source: Box<gix::open::Error>,
  },

  #[error("failed to fetch from '{url}': {source}")]
  Fetch {
    url: String,
    #[source]
    source: Box<dyn std::error::Error + Send + Sync>,
  },

  #[error("ref '{git_ref}' not found in {url}")]
  RefNotFound { url: String, git_ref: String },

  #[error("failed to check out tree {tree}: {source}")]
  Checkout {
    tree: String,
    #[source]
    source: Box<dyn std::error::Error + Send + Sync>,
  },

  #[error("I/O error at {path}: {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
}

/// Where component sources come from.
pub trait SourceRepos {
  /// Tree id that the definition's repo and ref currently point at.
  fn resolve(&self, definition: &Definition) -> Result<String, RepoError>;

  /// Write the contents of `tree` into `dest`.
  fn checkout(&self, definition: &Definition, tree: &str, dest: &Path) -> Result<(), RepoError>;
}

/// Short repo prefixes accepted in definitions, `%s` is the remainder.
const DEFAULT_ALIASES: [(&str, &str); 2] = [
  ("upstream", "git://git.baserock.org/delta/%s"),
  ("baserock", "git://git.baserock.org/baserock/%s"),
];

pub struct GitRepos {
  gits_dir: PathBuf,
  aliases: BTreeMap<String, String>,
}

impl GitRepos {
  pub fn new(gits_dir: &Path) -> Self {
    Self {
      gits_dir: gits_dir.to_path_buf(),
      aliases: DEFAULT_ALIASES
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect(),
    }
  }

  pub fn with_alias(mut self, prefix: &str, template: &str) -> Self {
    self.aliases.insert(prefix.to_string(), template.to_string());
    self
  }

  /// Expand an aliased repo (`upstream:zlib`) into a fetchable URL.
  pub fn url(&self, repo: &str) -> String {
    if let Some((prefix, rest)) = repo.split_once(':')
      && let Some(template) = self.aliases.get(prefix)
    {
      return template.replace("%s", rest);
    }
    repo.to_string()
  }

  pub fn mirror_path(&self, url: &str) -> PathBuf {
    let name: String = url
      .chars()
      .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' { c } else { '_' })
      .collect();
    self.gits_dir.join(name)
  }

  fn mirror(&self, url: &str) -> Result<gix::Repository, RepoError> {
    let path = self.mirror_path(url);
    if path.exists() {
      debug!(url, path = %path.display(), "opening mirror");
      return gix::open(&path).map_err(|e| RepoError::Open {
        path,
        source: Box::new(e),
      });
    }

    fs::create_dir_all(&self.gits_dir).map_err(|source| RepoError::Io {
      path: self.gits_dir.clone(),
      source,
    })?;
    info!(url, path = %path.display(), "mirroring repository");

    let clone_err = |e: Box<dyn std::error::Error + Send + Sync>| RepoError::Clone {
      url: url.to_string(),
      source: e,
    };
    let mut prepared = gix::prepare_clone_bare(url, &path).map_err(|e| clone_err(Box::new(e)))?;
    let (repo, _outcome) = prepared
      .fetch_only(gix::progress::Discard, &gix::interrupt::IS_INTERRUPTED)
      .map_err(|e| clone_err(Box::new(e)))?;
    Ok(repo)
  }

  fn repo_of<'a>(&self, definition: &'a Definition) -> Result<&'a str, RepoError> {
    definition
      .repo
      .as_deref()
      .ok_or_else(|| RepoError::NoRepo(definition.name.clone()))
  }
}

impl SourceRepos for GitRepos {
  fn resolve(&self, definition: &Definition) -> Result<String, RepoError> {
    let url = self.url(self.repo_of(definition)?);
    let git_ref = definition.git_ref.as_deref().unwrap_or("HEAD");
    let repo = self.mirror(&url)?;

    let tree = match find_tree(&repo, git_ref) {
      Some(tree) => tree,
      None => {
        fetch_updates(&repo, &url)?;
        find_tree(&repo, git_ref).ok_or_else(|| RepoError::RefNotFound {
          url: url.clone(),
          git_ref: git_ref.to_string(),
        })?
      }
    };

    debug!(component = %definition.name, git_ref, tree = %tree, "resolved tree");
    Ok(tree)
  }

  fn checkout(&self, definition: &Definition, tree: &str, dest: &Path) -> Result<(), RepoError> {
    let url = self.url(self.repo_of(definition)?);
    let repo = self.mirror(&url)?;
    info!(component = %definition.name, tree, dest = %dest.display(), "checking out source");
    write_tree(&repo, tree, dest)
  }
}

/// Try `git_ref` as given, then as a remote-tracking branch.
fn find_tree(repo: &gix::Repository, git_ref: &str) -> Option<String> {
  [git_ref.to_string(), format!("origin/{}", git_ref)]
    .iter()
    .find_map(|candidate| {
      let id = repo.rev_parse_single(candidate.as_str()).ok()?;
      let tree = id.object().ok()?.peel_to_tree().ok()?;
      Some(tree.id.to_string())
    })
}

fn fetch_updates(repo: &gix::Repository, url: &str) -> Result<(), RepoError> {
  debug!(url, "fetching updates");
  let fetch_err = |e: Box<dyn std::error::Error + Send + Sync>| RepoError::Fetch {
    url: url.to_string(),
    source: e,
  };

  let remote = repo
    .find_default_remote(Direction::Fetch)
    .ok_or_else(|| fetch_err("no remote configured for mirror".into()))?
    .map_err(|e| fetch_err(Box::new(e)))?;

  remote
    .connect(Direction::Fetch)
    .map_err(|e| fetch_err(Box::new(e)))?
    .prepare_fetch(gix::progress::Discard, Default::default())
    .map_err(|e| fetch_err(Box::new(e)))?
    .receive(gix::progress::Discard, &gix::interrupt::IS_INTERRUPTED)
    .map_err(|e| fetch_err(Box::new(e)))?;

  Ok(())
}

fn write_tree(repo: &gix::Repository, tree: &str, dest: &Path) -> Result<(), RepoError> {
  let checkout_err = |e: Box<dyn std::error::Error + Send + Sync>| RepoError::Checkout {
    tree: tree.to_string(),
    source: e,
  };
  let io_err = |path: &Path, source| RepoError::Io {
    path: path.to_path_buf(),
    source,
  };

  let id = gix::ObjectId::from_hex(tree.as_bytes()).map_err(|e| checkout_err(Box::new(e)))?;
  let root = repo
    .find_object(id)
    .map_err(|e| checkout_err(Box::new(e)))?
    .peel_to_tree()
    .map_err(|e| checkout_err(Box::new(e)))?;

  let mut recorder = gix::traverse::tree::Recorder::default();
  root
    .traverse()
    .breadthfirst(&mut recorder)
    .map_err(|e| checkout_err(Box::new(e)))?;

  fs::create_dir_all(dest).map_err(|e| io_err(dest, e))?;
  for entry in recorder.records {
    let path = dest.join(gix::path::from_bstr(entry.filepath.as_bstr()));
    match entry.mode.kind() {
      EntryKind::Tree | EntryKind::Commit => {
        fs::create_dir_all(&path).map_err(|e| io_err(&path, e))?;
      }
      EntryKind::Blob | EntryKind::BlobExecutable => {
        let blob = repo.find_object(entry.oid).map_err(|e| checkout_err(Box::new(e)))?;
        fs::write(&path, &blob.data).map_err(|e| io_err(&path, e))?;
        if entry.mode.kind() == EntryKind::BlobExecutable {
          set_executable(&path).map_err(|e| io_err(&path, e))?;
        }
      }
      EntryKind::Link => {
        let blob = repo.find_object(entry.oid).map_err(|e| checkout_err(Box::new(e)))?;
        let target = gix::path::from_bstr(blob.data.as_bstr()).into_owned();
        symlink(&target, &path).map_err(|e| io_err(&path, e))?;
      }
    }
  }
  Ok(())
}

#[cfg(unix)]
fn set_executable(path: &Path) -> std::io::Result<()> {
  use std::os::unix::fs::PermissionsExt;
  fs::set_permissions(path, fs::Permissions::from_mode(0o755))
}

#[cfg(not(unix))]
fn set_executable(_path: &Path) -> std::io::Result<()> {
  Ok(())
}

#[cfg(unix)]
fn symlink(target: &Path, link: &Path) -> std::io::Result<()> {
  std::os::unix::fs::symlink(target, link)
}

#[cfg(not(unix))]
fn symlink(target: &Path, link: &Path) -> std::io::Result<()> {
  fs::write(link, target.to_string_lossy().as_bytes())
}
