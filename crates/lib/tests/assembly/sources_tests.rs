use crate::common::{FakeRepos, NoRepos, Workspace, assemble};

const TREE: &str = "4b825dc642cb6eb9a060e54bf8d69288fbee4904";

#[tokio::test]
async fn sources_are_checked_out_before_building() {
  let ws = Workspace::new();
  ws.write(
    "hello.morph",
    &format!(
      "name: hello\n\
       build-mode: bootstrap\n\
       repo: upstream:hello\n\
       ref: master\n\
       build-commands:\n\
       \x20 - test -f configure.ac\n\
       \x20 - cat message >> {log}\n",
      log = ws.order_log().display()
    ),
  );
  let repos = FakeRepos::default().with("upstream:hello", TREE, vec![("configure.ac", ""), ("message", "hi\n")]);

  let (result, _, trees) = assemble(&ws, &ws.load(), &repos, "hello").await;
  result.unwrap();

  assert_eq!(ws.order(), ["hi"]);
  assert_eq!(repos.resolves(), 1);
  assert_eq!(trees.get("hello"), Some(TREE));
}

#[tokio::test]
async fn detected_build_system_fills_phases() {
  // A Makefile.PL marks the source as a Perl distribution. Whether or not
  // the host has perl, the chosen commands show up in the build log.
  let ws = Workspace::new();
  ws.write("mod.morph", "name: perl-mod\nbuild-mode: bootstrap\nrepo: upstream:mod\n");
  let repos = FakeRepos::default().with("upstream:mod", TREE, vec![("Makefile.PL", "")]);

  let defs = ws.load();
  let _ = assemble(&ws, &defs, &repos, "perl-mod").await;

  let mut assembler = strata_lib::assembly::Assembler::new(&defs, &ws.settings, Default::default(), &repos);
  let key = assembler.cache_key("perl-mod").unwrap();
  let log = ws.settings.artifacts_dir().join(format!("{}.build-log", key));
  let log = std::fs::read_to_string(log).unwrap();
  assert!(log.contains("# # perl Makefile.PL"), "{}", log);
}

#[tokio::test]
async fn known_trees_are_not_resolved_again() {
  let ws = Workspace::new();
  ws.write("hello.morph", "name: hello\nbuild-mode: bootstrap\nrepo: upstream:hello\nbuild-commands: ['true']\n");
  let defs = ws.load();

  let mut trees = strata_lib::definitions::trees::TreeMap::new();
  trees.insert("hello", TREE);
  let repos = FakeRepos::default().with("upstream:hello", TREE, vec![]);

  let mut assembler = strata_lib::assembly::Assembler::new(&defs, &ws.settings, trees, &repos);
  assembler.assemble("hello").await.unwrap();
  assert_eq!(assembler.trees().get("hello"), Some(TREE));
  assert_eq!(repos.resolves(), 0);
}

#[tokio::test]
async fn repo_without_sources_fails_resolution() {
  let ws = Workspace::new();
  ws.write("hello.morph", "name: hello\nbuild-mode: bootstrap\nrepo: upstream:hello\n");

  let (result, _, trees) = assemble(&ws, &ws.load(), &NoRepos, "hello").await;

  assert!(matches!(result, Err(strata_lib::assembly::AssemblyError::Repo(_))));
  assert!(trees.is_empty());
}
