mod build;
mod info;
mod key;

pub use build::cmd_build;
pub use info::cmd_info;
pub use key::cmd_key;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use strata_lib::definitions::Definitions;
use strata_lib::definitions::trees::TreeMap;
use strata_lib::platform::Arch;
use strata_lib::settings::Settings;

/// Flags shared by every command that reads definitions or settings.
#[derive(Debug, Args)]
pub struct SettingsArgs {
  /// Directory holding the definition files
  #[arg(short, long, default_value = ".")]
  pub definitions: PathBuf,

  /// Architecture to assemble for (default: host)
  #[arg(long)]
  pub arch: Option<Arch>,

  /// Default build parallelism
  #[arg(short, long)]
  pub jobs: Option<usize>,

  /// Disable the compiler cache
  #[arg(long)]
  pub no_ccache: bool,

  /// Do not route compilation through distcc
  #[arg(long)]
  pub no_distcc: bool,
}

impl SettingsArgs {
  /// Settings from the environment with flags applied on top.
  pub fn settings(&self) -> Result<Settings> {
    let mut settings = Settings::from_env().context("Failed to read settings")?;
    if let Some(arch) = self.arch {
      settings.arch = arch;
    }
    if let Some(jobs) = self.jobs {
      settings.max_jobs = jobs.max(1);
    }
    settings.no_ccache |= self.no_ccache;
    settings.no_distcc |= self.no_distcc;
    Ok(settings)
  }

  pub fn load_definitions(&self) -> Result<Definitions> {
    Definitions::load(&self.definitions)
      .with_context(|| format!("Failed to load definitions from {}", self.definitions.display()))
  }

  pub fn trees_path(&self) -> PathBuf {
    self.definitions.join(strata_lib::consts::TREES_FILENAME)
  }

  pub fn load_trees(&self) -> Result<TreeMap> {
    Ok(TreeMap::load(&self.trees_path())?)
  }
}
