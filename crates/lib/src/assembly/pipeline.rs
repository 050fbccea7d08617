//! Phase filling.
//!
//! Explicit per-phase commands always win. A declared build system fills
//! only the phases left empty; with no usable declared build system, a
//! profile is detected from the source tree, but only when no phase has
//! commands. An unrecognised build-system name is treated as undeclared.

use std::path::Path;

use tracing::warn;

use crate::buildsystem::{self, BuildSystem};
use crate::definitions::{BuildStep, Commands, Definition};

use super::AssemblyError;

/// Pick the profile used to fill empty phases, if any.
///
/// `list_sources` is only called when detection is needed.
pub fn select_profile<F>(definition: &Definition, list_sources: F) -> Result<Option<&'static BuildSystem>, AssemblyError>
where
  F: FnOnce() -> Result<Vec<String>, AssemblyError>,
{
  if let Some(name) = definition.build_system.as_deref() {
    match buildsystem::lookup(name) {
      Some(profile) => return Ok(Some(profile)),
      None => warn!(component = %definition.name, build_system = name, "unknown build system, ignoring"),
    }
  }

  if definition.has_commands() {
    return Ok(None);
  }

  Ok(Some(buildsystem::detect(&list_sources()?)))
}

/// Explicit commands, with empty phases taken from `profile`.
pub fn fill_commands(definition: &Definition, profile: Option<&BuildSystem>) -> Commands {
  let mut commands = Commands::new();
  for step in BuildStep::ALL {
    let explicit = definition.commands_for(step);
    let chosen: Vec<String> = if !explicit.is_empty() {
      explicit.to_vec()
    } else if let Some(profile) = profile {
      profile.commands_for(step).iter().map(|c| c.to_string()).collect()
    } else {
      Vec::new()
    };
    if !chosen.is_empty() {
      commands.insert(step, chosen);
    }
  }
  commands
}

/// Commands to run for `definition`, with sources checked out in `source_dir`.
pub fn effective_commands(definition: &Definition, source_dir: &Path) -> Result<Commands, AssemblyError> {
  let profile = select_profile(definition, || {
    buildsystem::list_files(source_dir).map_err(|source| AssemblyError::ListSources {
      path: source_dir.to_path_buf(),
      source,
    })
  })?;
  Ok(fill_commands(definition, profile))
}
