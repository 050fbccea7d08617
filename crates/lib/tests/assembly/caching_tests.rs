use crate::common::{NoRepos, Workspace, assemble};

fn chain(ws: &Workspace, d_extra: &[&str]) {
  ws.component("d", &[], d_extra);
  ws.component("b", &["d"], &[]);
  ws.component("a", &["b"], &[]);
}

#[tokio::test]
async fn second_run_builds_nothing() {
  let ws = Workspace::new();
  chain(&ws, &[]);
  let defs = ws.load();

  let (first, _, _) = assemble(&ws, &defs, &NoRepos, "a").await;
  let (second, report, _) = assemble(&ws, &defs, &NoRepos, "a").await;

  assert_eq!(first.unwrap(), second.unwrap());
  assert!(report.built.is_empty());
  assert_eq!(report.cached, ["a"]);
  assert_eq!(ws.order(), ["d", "b", "a"]);
}

#[tokio::test]
async fn changed_command_rebuilds_dependents() {
  let ws = Workspace::new();
  chain(&ws, &[]);
  let (first, _, _) = assemble(&ws, &ws.load(), &NoRepos, "a").await;
  let first = first.unwrap();

  chain(&ws, &["true"]);
  let (second, report, _) = assemble(&ws, &ws.load(), &NoRepos, "a").await;

  assert_ne!(first, second.unwrap());
  assert_eq!(report.built, ["d", "b", "a"]);
  assert_eq!(ws.order(), ["d", "b", "a", "d", "b", "a"]);
}

#[tokio::test]
async fn unrelated_change_keeps_siblings_cached() {
  let ws = Workspace::new();
  ws.component("left", &[], &[]);
  ws.component("right", &[], &[]);
  ws.write("top.morph", "name: top\nkind: stratum\nbuild-mode: bootstrap\ncontents: [left, right]\n");
  let (first, _, _) = assemble(&ws, &ws.load(), &NoRepos, "top").await;
  first.unwrap();

  ws.component("right", &[], &["true"]);
  let (second, report, _) = assemble(&ws, &ws.load(), &NoRepos, "top").await;
  second.unwrap();

  assert_eq!(report.built, ["right", "top"]);
  assert_eq!(report.cached, ["left"]);
}

#[tokio::test]
async fn artifact_and_build_log_are_written() {
  let ws = Workspace::new();
  ws.component("d", &[], &[]);
  let defs = ws.load();

  let (key, _, _) = assemble(&ws, &defs, &NoRepos, "d").await;
  let key = key.unwrap();

  let cache = strata_lib::cache::ArtifactCache::from_settings(&ws.settings);
  assert!(cache.get(&key).is_some());
  assert!(key.as_str().starts_with("d."));

  let log = ws.settings.artifacts_dir().join(format!("{}.build-log", key));
  let log = std::fs::read_to_string(log).unwrap();
  assert!(log.contains("# DESTDIR="));
  assert!(log.contains("# # mkdir -p"));
}

#[tokio::test]
async fn cache_key_matches_assembled_key() {
  let ws = Workspace::new();
  chain(&ws, &[]);
  let defs = ws.load();

  let mut assembler = strata_lib::assembly::Assembler::new(&defs, &ws.settings, Default::default(), &NoRepos);
  let predicted = assembler.cache_key("a").unwrap();
  let built = assembler.assemble("a").await.unwrap();

  assert_eq!(predicted, built);
}
