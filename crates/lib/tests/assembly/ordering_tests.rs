use crate::common::{NoRepos, Workspace, assemble};

/// a -> {b, c} -> d
fn diamond(ws: &Workspace) {
  ws.component("d", &[], &[]);
  ws.component("b", &["d"], &["test -f ../usr/share/d/file"]);
  ws.component("c", &["d"], &["test -f ../usr/share/d/file"]);
  ws.component(
    "a",
    &["b", "c"],
    &["test -f ../usr/share/b/file", "test -f ../usr/share/c/file", "test ! -e ../usr/share/d/file"],
  );
}

#[tokio::test]
async fn shared_dependency_is_built_once_and_first() {
  let ws = Workspace::new();
  diamond(&ws);
  let defs = ws.load();

  let (result, report, _) = assemble(&ws, &defs, &NoRepos, "a").await;
  result.unwrap();

  assert_eq!(ws.order(), ["d", "b", "c", "a"]);
  assert_eq!(report.built, ["d", "b", "c", "a"]);
  assert_eq!(report.cached, ["d"]);
}

#[tokio::test]
async fn build_depends_are_installed_but_not_transitively() {
  // `a` itself asserts which artifacts are present in its sandbox root; a
  // failing check fails the build.
  let ws = Workspace::new();
  diamond(&ws);
  let defs = ws.load();

  let (result, _, _) = assemble(&ws, &defs, &NoRepos, "a").await;
  assert!(result.is_ok(), "{:?}", result.err());
}

#[tokio::test]
async fn sandboxes_are_removed_after_success() {
  let ws = Workspace::new();
  diamond(&ws);
  let defs = ws.load();

  let (result, _, _) = assemble(&ws, &defs, &NoRepos, "a").await;
  result.unwrap();

  let assembly = ws.settings.assembly_dir();
  for name in ["a", "b", "c", "d"] {
    assert!(!assembly.join(name).exists(), "sandbox of {} left behind", name);
  }
}

#[tokio::test]
async fn unknown_dependency_is_reported() {
  let ws = Workspace::new();
  ws.component("a", &["missing"], &[]);
  let defs = ws.load();

  let (result, report, _) = assemble(&ws, &defs, &NoRepos, "a").await;

  let err = result.unwrap_err();
  assert!(err.to_string().contains("missing"), "{}", err);
  assert!(report.built.is_empty());
  assert!(ws.order().is_empty());
}
