//! Build environment computation.

use std::collections::BTreeMap;
use std::path::Path;

use crate::consts::{BUILD_USER, TARGET_VENDOR};
use crate::definitions::{BuildMode, Definition};
use crate::settings::Settings;

use super::Layout;

const BASE_PATH: [&str; 4] = ["/sbin", "/usr/sbin", "/bin", "/usr/bin"];
const CCACHE_WRAPPERS: &str = "/usr/lib/ccache";

/// Mount point of the per-component compiler cache inside the sandbox.
pub const CCACHE_MOUNT: &str = "/tmp/ccache";

/// Compute the complete environment for a component's build steps.
///
/// Nothing is inherited from the calling process except, in bootstrap mode,
/// the PATH captured in `settings`.
pub fn create_env(
  definition: &Definition,
  build_depends: &[&Definition],
  layout: &Layout,
  settings: &Settings,
) -> BTreeMap<String, String> {
  let mut env = BTreeMap::new();

  let mut prefixes = vec![definition.install_prefix()];
  for dependency in build_depends {
    if let Some(prefix) = dependency.prefix.as_deref()
      && !prefixes.contains(&prefix)
    {
      prefixes.push(prefix);
    }
  }
  let mut extra_path: Vec<String> = prefixes.iter().map(|p| bin_dir(p)).collect();

  if !settings.no_ccache {
    extra_path.push(CCACHE_WRAPPERS.to_string());
    env.insert("CCACHE_DIR".to_string(), CCACHE_MOUNT.to_string());
    if !settings.no_distcc {
      env.insert("CCACHE_PREFIX".to_string(), "distcc".to_string());
    }
  }

  let path = match definition.mode() {
    BuildMode::Staging => extra_path
      .into_iter()
      .chain(BASE_PATH.iter().map(|p| p.to_string()))
      .collect::<Vec<_>>(),
    BuildMode::Bootstrap => extra_path
      .iter()
      .map(|p| under(&layout.assembly, p))
      .chain(
        settings
          .host_path
          .split(':')
          .filter(|p| !p.is_empty())
          .map(str::to_string),
      )
      .collect(),
  };
  env.insert("PATH".to_string(), path.join(":"));

  let destdir = match definition.mode() {
    BuildMode::Bootstrap => layout.install.display().to_string(),
    BuildMode::Staging => format!("/{}", file_name(&layout.install)),
  };
  env.insert("DESTDIR".to_string(), destdir);

  env.insert("TERM".to_string(), "dumb".to_string());
  env.insert("SHELL".to_string(), "/bin/sh".to_string());
  for var in ["USER", "USERNAME", "LOGNAME"] {
    env.insert(var.to_string(), BUILD_USER.to_string());
  }
  env.insert("LC_ALL".to_string(), "C".to_string());
  env.insert("HOME".to_string(), "/tmp".to_string());
  env.insert("PREFIX".to_string(), definition.install_prefix().to_string());

  let jobs = definition.max_jobs.unwrap_or(settings.max_jobs);
  env.insert("MAKEFLAGS".to_string(), format!("-j{}", jobs));

  let arch = settings.arch;
  env.insert("TARGET".to_string(), arch.target_triple(TARGET_VENDOR));
  env.insert("TARGET_STAGE1".to_string(), arch.target_triple("bootstrap"));
  env.insert("STRATA_ARCH".to_string(), arch.to_string());

  env
}

fn bin_dir(prefix: &str) -> String {
  format!("{}/bin", prefix.trim_end_matches('/'))
}

/// `path` re-rooted below `root`.
fn under(root: &Path, path: &str) -> String {
  root.join(path.trim_start_matches('/')).display().to_string()
}

pub(crate) fn file_name(path: &Path) -> String {
  path
    .file_name()
    .map(|n| n.to_string_lossy().into_owned())
    .unwrap_or_default()
}
