use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::consts::DEFAULT_PREFIX;

/// One of the twelve ordered build phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BuildStep {
  PreConfigure,
  Configure,
  PostConfigure,
  PreBuild,
  Build,
  PostBuild,
  PreTest,
  Test,
  PostTest,
  PreInstall,
  Install,
  PostInstall,
}

impl BuildStep {
  /// All phases in execution order.
  pub const ALL: [BuildStep; 12] = [
    BuildStep::PreConfigure,
    BuildStep::Configure,
    BuildStep::PostConfigure,
    BuildStep::PreBuild,
    BuildStep::Build,
    BuildStep::PostBuild,
    BuildStep::PreTest,
    BuildStep::Test,
    BuildStep::PostTest,
    BuildStep::PreInstall,
    BuildStep::Install,
    BuildStep::PostInstall,
  ];

  /// Key of this phase in a definition document, e.g. `pre-configure-commands`.
  pub fn key(self) -> &'static str {
    match self {
      Self::PreConfigure => "pre-configure-commands",
      Self::Configure => "configure-commands",
      Self::PostConfigure => "post-configure-commands",
      Self::PreBuild => "pre-build-commands",
      Self::Build => "build-commands",
      Self::PostBuild => "post-build-commands",
      Self::PreTest => "pre-test-commands",
      Self::Test => "test-commands",
      Self::PostTest => "post-test-commands",
      Self::PreInstall => "pre-install-commands",
      Self::Install => "install-commands",
      Self::PostInstall => "post-install-commands",
    }
  }
}

impl fmt::Display for BuildStep {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.key())
  }
}

/// Per-phase command lists. Phases without commands are absent.
pub type Commands = BTreeMap<BuildStep, Vec<String>>;

/// How build steps are executed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BuildMode {
  /// Contained: steps run chrooted into the component's assembly directory.
  #[default]
  #[serde(alias = "staged")]
  Staging,
  /// Direct: steps run against the host.
  Bootstrap,
}

impl fmt::Display for BuildMode {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Staging => write!(f, "staging"),
      Self::Bootstrap => write!(f, "bootstrap"),
    }
  }
}

/// A buildable component, as loaded from definition documents.
///
/// Dependencies and contents are referenced by name; the owning
/// [`Definitions`](super::Definitions) resolves them.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Definition {
  pub name: String,
  pub kind: Option<String>,
  pub repo: Option<String>,
  pub git_ref: Option<String>,
  pub build_depends: Vec<String>,
  pub contents: Vec<String>,
  pub build_system: Option<String>,
  pub commands: Commands,
  pub prefix: Option<String>,
  pub build_mode: Option<BuildMode>,
  pub max_jobs: Option<usize>,
}

impl Definition {
  pub fn new(name: &str) -> Self {
    Self {
      name: name.to_string(),
      ..Default::default()
    }
  }

  /// Commands declared for a phase (empty when none are).
  pub fn commands_for(&self, step: BuildStep) -> &[String] {
    self.commands.get(&step).map(Vec::as_slice).unwrap_or(&[])
  }

  /// True if any phase declares at least one command.
  pub fn has_commands(&self) -> bool {
    self.commands.values().any(|cmds| !cmds.is_empty())
  }

  pub fn install_prefix(&self) -> &str {
    self.prefix.as_deref().unwrap_or(DEFAULT_PREFIX)
  }

  pub fn mode(&self) -> BuildMode {
    self.build_mode.unwrap_or_default()
  }

  /// Fold a later definition of the same name into this one.
  ///
  /// Fields unset here are taken from `other`. Fields set on both with
  /// different values keep this (earlier) value and are reported back.
  pub fn merge(&mut self, other: Definition) -> Vec<Conflict> {
    let mut conflicts = Vec::new();

    merge_opt("kind", &mut self.kind, other.kind, &mut conflicts);
    merge_opt("repo", &mut self.repo, other.repo, &mut conflicts);
    merge_opt("ref", &mut self.git_ref, other.git_ref, &mut conflicts);
    merge_opt("build-system", &mut self.build_system, other.build_system, &mut conflicts);
    merge_opt("prefix", &mut self.prefix, other.prefix, &mut conflicts);
    merge_opt("build-mode", &mut self.build_mode, other.build_mode, &mut conflicts);
    merge_opt("max-jobs", &mut self.max_jobs, other.max_jobs, &mut conflicts);
    merge_list("build-depends", &mut self.build_depends, other.build_depends, &mut conflicts);
    merge_list("contents", &mut self.contents, other.contents, &mut conflicts);

    for (step, commands) in other.commands {
      let current = self.commands.entry(step).or_default();
      merge_list(step.key(), current, commands, &mut conflicts);
    }
    self.commands.retain(|_, cmds| !cmds.is_empty());

    conflicts
  }
}

/// A field that two definitions of one component disagree on.
#[derive(Debug, Clone, PartialEq)]
pub struct Conflict {
  pub field: &'static str,
  pub kept: String,
  pub ignored: String,
}

fn merge_opt<T: PartialEq + fmt::Debug>(
  field: &'static str,
  current: &mut Option<T>,
  incoming: Option<T>,
  conflicts: &mut Vec<Conflict>,
) {
  match (current.as_ref(), incoming) {
    (_, None) => {}
    (None, Some(value)) => *current = Some(value),
    (Some(existing), Some(value)) if *existing != value => conflicts.push(Conflict {
      field,
      kept: format!("{:?}", existing),
      ignored: format!("{:?}", value),
    }),
    (Some(_), Some(_)) => {}
  }
}

fn merge_list(field: &'static str, current: &mut Vec<String>, incoming: Vec<String>, conflicts: &mut Vec<Conflict>) {
  if incoming.is_empty() || *current == incoming {
    return;
  }
  if current.is_empty() {
    *current = incoming;
    return;
  }
  conflicts.push(Conflict {
    field,
    kept: format!("{:?}", current),
    ignored: format!("{:?}", incoming),
  });
}
