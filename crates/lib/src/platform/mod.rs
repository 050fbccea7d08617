//! Host platform detection and well-known directories.

pub mod arch;
pub mod paths;

pub use arch::Arch;

/// Returns true when the process runs with an effective uid of 0.
///
/// Contained builds need this to create mount namespaces.
#[cfg(unix)]
pub fn is_root() -> bool {
  rustix::process::geteuid().is_root()
}

#[cfg(not(unix))]
pub fn is_root() -> bool {
  false
}
