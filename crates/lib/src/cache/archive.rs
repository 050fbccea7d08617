//! Deterministic tar.gz archives of install trees.
//!
//! Entries are written in path order with zeroed mtime/uid/gid, so packing the
//! same tree twice yields identical bytes.

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter};
use std::path::Path;

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use tar::{Archive, Builder, EntryType, Header};
use walkdir::WalkDir;

/// Pack the contents of `root` into a gzip-compressed tar at `dest`.
pub fn pack(root: &Path, dest: &Path) -> io::Result<()> {
  let file = BufWriter::new(File::create(dest)?);
  let mut builder = Builder::new(GzEncoder::new(file, Compression::default()));
  builder.follow_symlinks(false);

  for entry in WalkDir::new(root).min_depth(1).sort_by_file_name() {
    let entry = entry.map_err(io::Error::other)?;
    let path = entry.path();
    let rel = path.strip_prefix(root).map_err(io::Error::other)?;
    let metadata = fs::symlink_metadata(path)?;
    let file_type = metadata.file_type();

    let mut header = Header::new_gnu();
    header.set_mtime(0);
    header.set_uid(0);
    header.set_gid(0);
    header.set_mode(file_mode(&metadata));

    if file_type.is_dir() {
      header.set_entry_type(EntryType::Directory);
      header.set_size(0);
      builder.append_data(&mut header, rel, io::empty())?;
    } else if file_type.is_symlink() {
      header.set_entry_type(EntryType::Symlink);
      header.set_size(0);
      let target = fs::read_link(path)?;
      builder.append_link(&mut header, rel, &target)?;
    } else if file_type.is_file() {
      header.set_entry_type(EntryType::Regular);
      header.set_size(metadata.len());
      builder.append_data(&mut header, rel, File::open(path)?)?;
    }
  }

  let encoder = builder.into_inner()?;
  encoder.finish()?.into_inner().map_err(|e| e.into_error())?;
  Ok(())
}

/// Extract a tar.gz produced by [`pack`] into `dest`.
pub fn unpack(archive: &Path, dest: &Path) -> io::Result<()> {
  let file = File::open(archive)?;
  let mut archive = Archive::new(GzDecoder::new(BufReader::new(file)));
  archive.set_preserve_permissions(true);
  archive.set_overwrite(true);
  fs::create_dir_all(dest)?;
  archive.unpack(dest)
}

#[cfg(unix)]
fn file_mode(metadata: &fs::Metadata) -> u32 {
  use std::os::unix::fs::PermissionsExt;
  metadata.permissions().mode() & 0o7777
}

#[cfg(not(unix))]
fn file_mode(metadata: &fs::Metadata) -> u32 {
  if metadata.is_dir() { 0o755 } else { 0o644 }
}
