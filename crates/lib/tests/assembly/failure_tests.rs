use strata_lib::assembly::AssemblyError;
use strata_lib::sandbox::SandboxError;

use crate::common::{NoRepos, Workspace, assemble};

#[tokio::test]
async fn failing_descendant_stops_the_run() {
  let ws = Workspace::new();
  ws.component("d", &[], &["exit 3"]);
  ws.component("b", &["d"], &[]);
  ws.component("a", &["b"], &[]);
  let defs = ws.load();

  let mut assembler = strata_lib::assembly::Assembler::new(&defs, &ws.settings, Default::default(), &NoRepos);
  let keys: Vec<_> = ["a", "b", "d"]
    .iter()
    .map(|name| assembler.cache_key(name).unwrap())
    .collect();
  let err = assembler.assemble("a").await.unwrap_err();

  match err {
    AssemblyError::Sandbox(SandboxError::CommandFailed { component, code, log, .. }) => {
      assert_eq!(component, "d");
      assert_eq!(code, Some(3));
      assert!(log.exists());
    }
    other => panic!("unexpected error: {other}"),
  }

  for key in &keys {
    assert!(assembler.cache().get(key).is_none(), "{} was cached", key);
  }
  assert!(assembler.report().built.is_empty());
  assert!(ws.order().is_empty());
}

#[tokio::test]
async fn failed_sandbox_is_kept_then_replaced() {
  let ws = Workspace::new();
  ws.component("d", &[], &["false"]);
  let (result, _, _) = assemble(&ws, &ws.load(), &NoRepos, "d").await;
  assert!(result.is_err());

  let sandbox = ws.settings.assembly_dir().join("d");
  assert!(sandbox.join("d.build").is_dir());
  std::fs::write(sandbox.join("d.build/stale"), "").unwrap();

  ws.component("d", &[], &[]);
  let (result, _, _) = assemble(&ws, &ws.load(), &NoRepos, "d").await;
  result.unwrap();

  assert!(!sandbox.exists());
  assert_eq!(ws.order(), ["d"]);
}

#[tokio::test]
async fn unknown_build_system_falls_back_to_explicit_commands() {
  let ws = Workspace::new();
  let record = format!("  - echo odd >> {}", ws.order_log().display());
  ws.write(
    "odd.morph",
    &[
      "name: odd",
      "build-mode: bootstrap",
      "build-system: scons",
      "build-commands:",
      record.as_str(),
      "install-commands:",
      "  - mkdir -p \"$DESTDIR/usr/share/odd\"",
      "  - echo odd > \"$DESTDIR/usr/share/odd/file\"",
      "",
    ]
    .join("\n"),
  );

  let (result, report, _) = assemble(&ws, &ws.load(), &NoRepos, "odd").await;

  result.unwrap();
  assert_eq!(report.built, ["odd"]);
  assert_eq!(ws.order(), ["odd"]);
}
