use anyhow::{Context, Result};

use strata_lib::assembly::Assembler;
use strata_lib::cache_lock::{CacheLock, LockMode};
use strata_lib::repos::GitRepos;

use super::SettingsArgs;
use crate::output::{CacheStatus, OutputFormat};

pub fn cmd_key(target: &str, args: &SettingsArgs, output: OutputFormat) -> Result<()> {
  let settings = args.settings()?;
  let definitions = args.load_definitions()?;
  let trees = args.load_trees()?;

  let _lock = CacheLock::acquire(&settings.cache_dir, LockMode::Shared, &format!("strata key {}", target))
    .context("Failed to acquire cache lock")?;

  let repos = GitRepos::new(&settings.gits_dir());
  let mut assembler = Assembler::new(&definitions, &settings, trees, &repos);
  let key = assembler
    .cache_key(target)
    .with_context(|| format!("Failed to compute key of {}", target))?;
  let cached = assembler.cache().get(&key).is_some();

  CacheStatus {
    target,
    key: &key,
    cached,
  }
  .emit(output)
}
