//! Build-step execution.
//!
//! Each command runs as `/bin/sh -c <command>` with a cleared environment.
//! Bootstrap components run directly in their build directory; staging
//! components first enter their [`Containment`](super::Containment).

use std::fs::OpenOptions;
use std::io::Write;
use std::process::Stdio;

use tokio::process::Command;
use tracing::{debug, error};

use crate::definitions::{BuildMode, BuildStep};

use super::{BuildContext, SandboxError, io_err};

const SHELL: &str = "/bin/sh";

pub(super) async fn run(ctx: &BuildContext, step: BuildStep, command: &str) -> Result<(), SandboxError> {
  let mut log = OpenOptions::new()
    .create(true)
    .append(true)
    .open(&ctx.log)
    .map_err(io_err(&ctx.log))?;
  writeln!(log, "# # {}", command).map_err(io_err(&ctx.log))?;
  let stdout = log.try_clone().map_err(io_err(&ctx.log))?;

  let mut cmd = Command::new(SHELL);
  cmd
    .arg("-c")
    .arg(command)
    .env_clear()
    .envs(&ctx.env)
    .stdin(Stdio::null())
    .stdout(Stdio::from(stdout))
    .stderr(Stdio::from(log));

  match ctx.mode {
    BuildMode::Bootstrap => {
      cmd.current_dir(&ctx.layout.build);
    }
    BuildMode::Staging => contain(&mut cmd, ctx)?,
  }

  debug!(component = %ctx.name, step = %step, command = %command, "spawning process");

  let status = cmd.status().await.map_err(|source| SandboxError::Spawn {
    command: command.to_string(),
    source,
  })?;

  if !status.success() {
    error!(
      component = %ctx.name,
      step = %step,
      command = %command,
      code = ?status.code(),
      log = %ctx.log.display(),
      "command failed"
    );
    return Err(SandboxError::CommandFailed {
      component: ctx.name.clone(),
      step,
      command: command.to_string(),
      code: status.code(),
      log: ctx.log.clone(),
    });
  }

  Ok(())
}

#[cfg(target_os = "linux")]
fn contain(cmd: &mut Command, ctx: &BuildContext) -> Result<(), SandboxError> {
  let Some(plan) = ctx.containment().cloned() else {
    return Err(SandboxError::Unsupported {
      component: ctx.name.clone(),
    });
  };

  // SAFETY: `enter` only issues unshare/mount/chroot/chdir syscalls on
  // memory owned by the closure; it neither locks nor touches shared state.
  unsafe {
    cmd.pre_exec(move || plan.enter());
  }
  Ok(())
}

#[cfg(not(target_os = "linux"))]
fn contain(_cmd: &mut Command, ctx: &BuildContext) -> Result<(), SandboxError> {
  Err(SandboxError::Unsupported {
    component: ctx.name.clone(),
  })
}
