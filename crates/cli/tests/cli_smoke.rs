//! CLI smoke tests for strata.
//!
//! Every test gets its own base, cache and definitions directories, and
//! only builds bootstrap components so no privileges are needed.

use std::path::PathBuf;

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use tempfile::TempDir;

struct TestEnv {
  temp: TempDir,
}

impl TestEnv {
  fn new() -> Self {
    let temp = TempDir::new().unwrap();
    std::fs::create_dir_all(temp.path().join("definitions")).unwrap();
    Self { temp }
  }

  fn root(&self) -> PathBuf {
    dunce::canonicalize(self.temp.path()).unwrap()
  }

  fn definitions(&self) -> PathBuf {
    self.root().join("definitions")
  }

  fn write_definition(&self, file: &str, content: &str) {
    std::fs::write(self.definitions().join(file), content).unwrap();
  }

  /// A `strata` command isolated to this environment.
  fn cmd(&self) -> Command {
    let mut cmd = cargo_bin_cmd!("strata");
    cmd
      .env("STRATA_BASE", self.root().join("base"))
      .env("STRATA_CACHE", self.root().join("cache"))
      .env("STRATA_ARCH", "x86_64")
      .env("STRATA_NO_CCACHE", "1")
      .env("STRATA_NO_DISTCC", "1")
      .env("STRATA_MAX_JOBS", "2")
      .env("XDG_DATA_HOME", self.root().join("data"))
      .env("XDG_CACHE_HOME", self.root().join("xdg-cache"))
      .env_remove("RUST_LOG")
      .current_dir(self.definitions());
    cmd
  }
}

const HELLO: &str = r#"
name: hello
build-mode: bootstrap
build-commands:
  - echo hello > greeting
install-commands:
  - mkdir -p "$DESTDIR/usr/share/hello"
  - cp greeting "$DESTDIR/usr/share/hello/"
"#;

const BROKEN: &str = r#"
name: broken
build-mode: bootstrap
build-commands:
  - exit 1
"#;

// =============================================================================
// Help & Version
// =============================================================================

#[test]
fn help_flag_works() {
  cargo_bin_cmd!("strata")
    .arg("--help")
    .assert()
    .success()
    .stdout(predicate::str::contains("Usage"));
}

#[test]
fn version_flag_works() {
  cargo_bin_cmd!("strata")
    .arg("--version")
    .assert()
    .success()
    .stdout(predicate::str::contains("strata"));
}

#[test]
fn subcommand_help_works() {
  for cmd in &["build", "key", "info"] {
    cargo_bin_cmd!("strata")
      .arg(cmd)
      .arg("--help")
      .assert()
      .success()
      .stdout(predicate::str::contains("--definitions"));
  }
}

#[test]
fn unknown_arch_is_rejected() {
  let env = TestEnv::new();
  env
    .cmd()
    .args(["info", "--arch", "vax"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("vax"));
}

// =============================================================================
// Info
// =============================================================================

#[test]
fn info_shows_settings() {
  let env = TestEnv::new();
  env
    .cmd()
    .args(["info", "--arch", "armv7lhf", "--jobs", "3"])
    .assert()
    .success()
    .stdout(predicate::str::contains("armv7lhf-strata-linux-gnueabi"))
    .stdout(predicate::str::contains("3"))
    .stdout(predicate::str::contains(env.root().join("base").display().to_string()));
}

#[test]
fn info_json_output() {
  let env = TestEnv::new();
  let output = env.cmd().args(["info", "--output", "json"]).output().unwrap();
  assert!(output.status.success());

  let settings: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
  assert_eq!(settings["arch"], "x86_64");
  assert_eq!(settings["max_jobs"], 2);
  assert_eq!(settings["no_ccache"], true);
}

// =============================================================================
// Build
// =============================================================================

#[test]
fn build_then_rebuild_is_up_to_date() {
  let env = TestEnv::new();
  env.write_definition("hello.morph", HELLO);

  env
    .cmd()
    .args(["build", "hello"])
    .assert()
    .success()
    .stdout(predicate::str::contains("Assembled hello"));

  env
    .cmd()
    .args(["build", "hello"])
    .assert()
    .success()
    .stdout(predicate::str::contains("hello is up to date"));

  assert!(env.definitions().join(".trees").exists());
}

#[test]
fn build_json_summary_lists_built_components() {
  let env = TestEnv::new();
  env.write_definition("hello.morph", HELLO);

  let output = env
    .cmd()
    .args(["build", "hello", "--output", "json"])
    .output()
    .unwrap();
  assert!(output.status.success());

  let summary: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
  assert_eq!(summary["target"], "hello");
  assert_eq!(summary["built"], serde_json::json!(["hello"]));
  assert!(summary["key"].as_str().unwrap().starts_with("hello."));
}

#[test]
fn build_with_explicit_definitions_dir() {
  let env = TestEnv::new();
  env.write_definition("hello.morph", HELLO);

  env
    .cmd()
    .current_dir(env.root())
    .args(["build", "hello", "--definitions"])
    .arg(env.definitions())
    .assert()
    .success();
}

#[test]
fn failing_build_exits_nonzero() {
  let env = TestEnv::new();
  env.write_definition("broken.morph", BROKEN);

  env
    .cmd()
    .args(["build", "broken"])
    .assert()
    .code(1)
    .stderr(predicate::str::contains("build-commands failed"));
}

#[test]
fn unknown_target_fails() {
  let env = TestEnv::new();

  env
    .cmd()
    .args(["build", "nope"])
    .assert()
    .code(1)
    .stderr(predicate::str::contains("no definition found for nope"));
}

// =============================================================================
// Key
// =============================================================================

#[test]
fn key_reports_cache_state() {
  let env = TestEnv::new();
  env.write_definition("hello.morph", HELLO);

  let before = env.cmd().args(["key", "hello"]).output().unwrap();
  assert!(before.status.success());
  let key = String::from_utf8(before.stdout).unwrap();
  assert!(key.starts_with("hello."));
  assert!(String::from_utf8_lossy(&before.stderr).contains("not cached"));

  env.cmd().args(["build", "hello"]).assert().success();

  env
    .cmd()
    .args(["key", "hello"])
    .assert()
    .success()
    .stdout(key)
    .stderr(predicate::str::contains("cached"));
}
