//! Cross-file include scenarios: remapping, aliases, collisions.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde_json::json;
use strata_core::{ConfigReader, EnvExpander, ErrorKind, NodePath};
use tempfile::TempDir;

fn write_file(dir: &Path, name: &str, content: &str) {
    fs::write(dir.join(name), content).unwrap();
}

fn reader_in(dir: &Path) -> ConfigReader {
    reader_with(dir, HashMap::new())
}

fn reader_with(dir: &Path, vars: HashMap<String, String>) -> ConfigReader {
    ConfigReader::with_expander(dir, EnvExpander::new(vars))
}

fn path(text: &str) -> NodePath {
    NodePath::parse(text).unwrap()
}

#[test]
fn include_members_merge_into_the_root() {
    let dir = TempDir::new().unwrap();
    write_file(dir.path(), "common.json", r##"{"config":{"#shared": "yes"}}"##);
    write_file(
        dir.path(),
        "main.json",
        r##"{
            "includes": [{"type": "file", "path": "common.json"}],
            "config": {"#own": 1}
        }"##,
    );

    let resolved = reader_in(dir.path()).load("main.json").unwrap();
    assert_eq!(resolved.value_at(&path("/shared")), Some(&json!("yes")));
    assert_eq!(resolved.value_at(&path("/own")), Some(&json!(1)));
}

#[test]
fn destination_node_reroots_the_included_tree() {
    let dir = TempDir::new().unwrap();
    write_file(dir.path(), "dep.json", r##"{"config":{"#a": 1}}"##);
    write_file(
        dir.path(),
        "main.json",
        r#"{
            "includes": [
                {"type": "file", "path": "dep.json", "destination_node": "/third_party/dep"}
            ],
            "config": {}
        }"#,
    );

    let resolved = reader_in(dir.path()).load("main.json").unwrap();
    assert_eq!(resolved.value_at(&path("/third_party/dep/a")), Some(&json!(1)));
}

#[test]
fn source_node_extracts_a_subtree() {
    let dir = TempDir::new().unwrap();
    write_file(
        dir.path(),
        "lib.json",
        r##"{"config":{"exported": {"#a": 1}, "internal": {"#b": 2}}}"##,
    );
    write_file(
        dir.path(),
        "main.json",
        r#"{
            "includes": [
                {"type": "file", "path": "lib.json", "source_node": "/exported", "destination_node": "/dep"}
            ],
            "config": {}
        }"#,
    );

    let resolved = reader_in(dir.path()).load("main.json").unwrap();
    assert_eq!(resolved.value_at(&path("/dep/a")), Some(&json!(1)));
    assert!(resolved.node_at(&path("/internal")).is_none());
    assert!(resolved.node_at(&path("/dep/b")).is_none());
}

#[test]
fn missing_source_node_is_an_include_error() {
    let dir = TempDir::new().unwrap();
    write_file(dir.path(), "lib.json", r##"{"config":{"#a": 1}}"##);
    write_file(
        dir.path(),
        "main.json",
        r#"{
            "includes": [{"type": "file", "path": "lib.json", "source_node": "/nope"}],
            "config": {}
        }"#,
    );

    let err = reader_in(dir.path()).read("main.json").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Include);
}

#[test]
fn includes_nest_recursively() {
    let dir = TempDir::new().unwrap();
    write_file(dir.path(), "inner.json", r##"{"config":{"#deep": true}}"##);
    write_file(
        dir.path(),
        "middle.json",
        r##"{
            "includes": [{"type": "file", "path": "inner.json", "destination_node": "/inner"}],
            "config": {"#mid": 1}
        }"##,
    );
    write_file(
        dir.path(),
        "outer.json",
        r#"{
            "includes": [{"type": "file", "path": "middle.json", "destination_node": "/middle"}],
            "config": {}
        }"#,
    );

    let resolved = reader_in(dir.path()).load("outer.json").unwrap();
    assert_eq!(resolved.value_at(&path("/middle/mid")), Some(&json!(1)));
    assert_eq!(resolved.value_at(&path("/middle/inner/deep")), Some(&json!(true)));
}

#[test]
fn sibling_documents_are_reachable_through_aliases() {
    let dir = TempDir::new().unwrap();
    write_file(
        dir.path(),
        "defaults.json",
        r##"{"config":{"pool": {"#size": 8, "#timeout_ms": 100}}}"##,
    );
    write_file(
        dir.path(),
        "main.json",
        r##"{
            "includes": [
                {"type": "file", "path": "defaults.json", "destination_node": "/hidden"}
            ],
            "config": {
                "worker": {"base": "$defaults/pool", "#size": 2},
                "&direct": "$defaults/pool/timeout_ms"
            }
        }"##,
    );

    let resolved = reader_in(dir.path()).load("main.json").unwrap();
    assert_eq!(resolved.value_at(&path("/worker/size")), Some(&json!(2)));
    assert_eq!(resolved.value_at(&path("/worker/timeout_ms")), Some(&json!(100)));
    assert_eq!(resolved.value_at(&path("/direct")), Some(&json!(100)));
}

#[test]
fn alias_names_are_registered_in_read_order() {
    let dir = TempDir::new().unwrap();
    write_file(dir.path(), "first.json", r##"{"config":{"#a": 1}}"##);
    write_file(dir.path(), "second.json", r##"{"config":{"#b": 2}}"##);
    write_file(
        dir.path(),
        "main.json",
        r#"{
            "includes": [
                {"type": "file", "path": "first.json", "destination_node": "/one"},
                {"type": "file", "path": "second.json", "destination_node": "/two"}
            ],
            "config": {}
        }"#,
    );

    let unresolved = reader_in(dir.path()).read("main.json").unwrap();
    let names: Vec<&str> = unresolved.alias_names().collect();
    assert_eq!(names, ["first", "second"]);
}

#[test]
fn destination_collision_with_a_value_is_fatal() {
    let dir = TempDir::new().unwrap();
    write_file(dir.path(), "a.json", r##"{"config":{"#slot": 1}}"##);
    write_file(dir.path(), "b.json", r##"{"config":{"#slot": 2}}"##);
    write_file(
        dir.path(),
        "main.json",
        r#"{
            "includes": [
                {"type": "file", "path": "a.json"},
                {"type": "file", "path": "b.json"}
            ],
            "config": {}
        }"#,
    );

    let err = reader_in(dir.path()).read("main.json").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Include);
    assert!(err.to_string().contains("slot"));
}

#[test]
fn own_config_colliding_with_an_included_value_is_fatal() {
    let dir = TempDir::new().unwrap();
    write_file(dir.path(), "a.json", r##"{"config":{"#slot": 1}}"##);
    write_file(
        dir.path(),
        "main.json",
        r##"{
            "includes": [{"type": "file", "path": "a.json"}],
            "config": {"#slot": 2}
        }"##,
    );

    let err = reader_in(dir.path()).read("main.json").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Parse);
}

#[test]
fn disjoint_objects_merge_member_wise() {
    let dir = TempDir::new().unwrap();
    write_file(dir.path(), "a.json", r##"{"config":{"group": {"#left": 1}}}"##);
    write_file(
        dir.path(),
        "main.json",
        r##"{
            "includes": [{"type": "file", "path": "a.json"}],
            "config": {"group": {"#right": 2}}
        }"##,
    );

    let resolved = reader_in(dir.path()).load("main.json").unwrap();
    assert_eq!(resolved.value_at(&path("/group/left")), Some(&json!(1)));
    assert_eq!(resolved.value_at(&path("/group/right")), Some(&json!(2)));
}

#[test]
fn include_path_is_env_expanded() {
    let dir = TempDir::new().unwrap();
    write_file(dir.path(), "prod-db.json", r##"{"config":{"#url": "db://prod"}}"##);
    write_file(
        dir.path(),
        "main.json",
        r#"{
            "includes": [{"type": "file", "path": "${STAGE}-db.json"}],
            "config": {}
        }"#,
    );

    let mut vars = HashMap::new();
    vars.insert("STAGE".to_string(), "prod".to_string());
    let resolved = reader_with(dir.path(), vars).load("main.json").unwrap();
    assert_eq!(resolved.value_at(&path("/url")), Some(&json!("db://prod")));
}

#[test]
fn environment_variable_include_reads_the_path_from_a_variable() {
    let dir = TempDir::new().unwrap();
    write_file(dir.path(), "extra.json", r##"{"config":{"#found": true}}"##);
    write_file(
        dir.path(),
        "main.json",
        r#"{
            "env": {"EXTRA_CONFIG": "extra.json"},
            "includes": [{"type": "environment_variable", "name": "EXTRA_CONFIG"}],
            "config": {}
        }"#,
    );

    let resolved = reader_in(dir.path()).load("main.json").unwrap();
    assert_eq!(resolved.value_at(&path("/found")), Some(&json!(true)));
}

#[test]
fn env_overrides_from_includes_apply_to_later_values() {
    // env is injected before includes, includes before the own config, so an
    // included document's overrides are visible to the including config
    let dir = TempDir::new().unwrap();
    write_file(
        dir.path(),
        "stage.json",
        r#"{"env": {"STAGE_NAME": "staging"}, "config": {}}"#,
    );
    write_file(
        dir.path(),
        "main.json",
        r##"{
            "includes": [{"type": "file", "path": "stage.json"}],
            "config": {"#banner": "running in ${STAGE_NAME}"}
        }"##,
    );

    let resolved = reader_in(dir.path()).load("main.json").unwrap();
    assert_eq!(
        resolved.value_at(&path("/banner")),
        Some(&json!("running in staging"))
    );
}

#[test]
fn self_including_documents_hit_the_depth_cap() {
    let dir = TempDir::new().unwrap();
    write_file(
        dir.path(),
        "loop.json",
        r#"{
            "includes": [{"type": "file", "path": "loop.json"}],
            "config": {}
        }"#,
    );

    let err = reader_in(dir.path()).read("loop.json").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Include);
    assert!(err.to_string().contains("depth"));
}

#[test]
fn missing_top_level_document_is_an_io_error() {
    let dir = TempDir::new().unwrap();
    let err = reader_in(dir.path()).read("absent.json").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Io);
}
