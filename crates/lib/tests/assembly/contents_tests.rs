use crate::common::{NoRepos, Workspace, assemble};

#[tokio::test]
async fn artifact_holds_contents_but_not_build_depends() {
  let ws = Workspace::new();
  ws.component("tool", &[], &[]);
  ws.component("lib", &["tool"], &[]);
  ws.write(
    "stack.morph",
    "name: stack\n\
     kind: stratum\n\
     build-mode: bootstrap\n\
     build-depends: [tool]\n\
     contents: [lib]\n",
  );
  let defs = ws.load();

  let (key, _, _) = assemble(&ws, &defs, &NoRepos, "stack").await;
  let key = key.unwrap();

  let cache = strata_lib::cache::ArtifactCache::from_settings(&ws.settings);
  let unpacked = cache.unpack(&key).unwrap();
  assert_eq!(std::fs::read_to_string(unpacked.join("usr/share/lib/file")).unwrap(), "lib\n");
  assert!(!unpacked.join("usr/share/tool").exists());
}

#[tokio::test]
async fn inline_chunks_are_assembled_with_stratum_build_depends() {
  let ws = Workspace::new();
  ws.component("toolchain", &[], &[]);
  let record = format!("      - echo zlib >> {}", ws.order_log().display());
  let core = [
    "name: core",
    "kind: stratum",
    "build-mode: bootstrap",
    "build-depends:",
    "  - morph: toolchain.morph",
    "chunks:",
    "  - name: zlib",
    "    build-mode: bootstrap",
    "    build-commands:",
    "      - test -f ../usr/share/toolchain/file",
    record.as_str(),
    "    install-commands:",
    "      - mkdir -p \"$DESTDIR/usr/lib\"",
    "      - touch \"$DESTDIR/usr/lib/libz.so\"",
  ]
  .join("\n");
  ws.write("strata/core.morph", &core);
  let defs = ws.load();

  assert_eq!(defs.get("zlib").unwrap().build_depends, ["toolchain"]);

  let (key, report, _) = assemble(&ws, &defs, &NoRepos, "core").await;
  let key = key.unwrap();

  assert_eq!(ws.order(), ["toolchain", "zlib"]);
  assert_eq!(report.built, ["toolchain", "zlib", "core"]);

  let cache = strata_lib::cache::ArtifactCache::from_settings(&ws.settings);
  let unpacked = cache.unpack(&key).unwrap();
  assert!(unpacked.join("usr/lib/libz.so").is_file());
}
