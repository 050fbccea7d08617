//! Implementation of the `strata build` command.

use std::time::Instant;

use anyhow::{Context, Result};
use tracing::info;

use strata_lib::assembly::Assembler;
use strata_lib::cache_lock::{CacheLock, LockMode};
use strata_lib::repos::GitRepos;

use super::SettingsArgs;
use crate::output::{BuildSummary, OutputFormat};

/// Assemble `target`, then persist every source tree resolved on the way.
///
/// Trees are saved even when the build fails, so a retry does not resolve
/// refs again.
pub fn cmd_build(target: &str, args: &SettingsArgs, output: OutputFormat) -> Result<()> {
  let start = Instant::now();
  let settings = args.settings()?;
  let definitions = args.load_definitions()?;
  let trees = args.load_trees()?;

  let _lock = CacheLock::acquire(&settings.cache_dir, LockMode::Exclusive, &format!("strata build {}", target))
    .context("Failed to acquire cache lock")?;

  let repos = GitRepos::new(&settings.gits_dir());
  let mut assembler = Assembler::new(&definitions, &settings, trees, &repos);

  let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
  let result = rt.block_on(assembler.assemble(target));

  let trees_path = args.trees_path();
  assembler
    .trees()
    .save(&trees_path)
    .context("Failed to save source trees")?;
  info!(path = %trees_path.display(), "source trees saved");

  let key = result.with_context(|| format!("Failed to assemble {}", target))?;
  let artifact_bytes = std::fs::metadata(assembler.cache().artifact_path(&key))
    .map(|metadata| metadata.len())
    .ok();

  BuildSummary::new(target, &key, assembler.report(), artifact_bytes, start.elapsed()).emit(output)
}
