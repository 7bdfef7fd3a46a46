//! End-to-end tests for the treesync binary.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;
use treesync_engine::{ImportStats, NodeData, StatsSummary};

fn treesync(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_treesync"))
        .args(args)
        .current_dir(dir)
        .env_remove("TREESYNC_SIZE_LIMIT")
        .env_remove("TREESYNC_STRICT_REFERENCES")
        .env_remove("TREESYNC_ID_SCHEME")
        .env("TREESYNC_PRETTY", "false")
        .env("RUST_LOG", "warn")
        .output()
        .unwrap()
}

fn write_spec(dir: &TempDir, name: &str, spec: &NodeData) {
    fs::write(dir.path().join(name), spec.to_json().unwrap()).unwrap();
}

fn read_tree(dir: &TempDir, name: &str) -> NodeData {
    NodeData::from_json(&fs::read_to_string(dir.path().join(name)).unwrap()).unwrap()
}

fn spec() -> NodeData {
    NodeData::new("root")
        .with_property("title", "Catalog")
        .with_child(NodeData::new("a").with_role("items").with_property("name", "A"))
        .with_child(NodeData::new("b").with_role("items").with_reference("peer", "a"))
}

#[test]
fn import_creates_snapshot() {
    let dir = TempDir::new().unwrap();
    write_spec(&dir, "spec.json", &spec());

    let output = treesync(dir.path(), &["import", "spec.json", "tree.json"]);
    assert!(output.status.success(), "{output:?}");

    assert_eq!(read_tree(&dir, "tree.json"), spec());
    let summary: StatsSummary = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(summary.additions, 2);
}

#[test]
fn import_to_separate_output() {
    let dir = TempDir::new().unwrap();
    write_spec(&dir, "spec.json", &spec());

    let output = treesync(
        dir.path(),
        &["import", "spec.json", "tree.json", "--out", "result.json"],
    );
    assert!(output.status.success(), "{output:?}");
    assert!(!dir.path().join("tree.json").exists());
    assert_eq!(read_tree(&dir, "result.json"), spec());
}

#[test]
fn plan_after_import_is_empty() {
    let dir = TempDir::new().unwrap();
    write_spec(&dir, "spec.json", &spec());
    assert!(treesync(dir.path(), &["import", "spec.json", "tree.json"])
        .status
        .success());
    let before = fs::read_to_string(dir.path().join("tree.json")).unwrap();

    let output = treesync(dir.path(), &["plan", "spec.json", "tree.json"]);
    assert!(output.status.success(), "{output:?}");
    let stats: ImportStats = serde_json::from_slice(&output.stdout).unwrap();
    assert!(stats.is_empty());

    // Plans never write.
    assert_eq!(fs::read_to_string(dir.path().join("tree.json")).unwrap(), before);
}

#[test]
fn plan_lists_edits() {
    let dir = TempDir::new().unwrap();
    write_spec(&dir, "spec.json", &spec());
    assert!(treesync(dir.path(), &["import", "spec.json", "tree.json"])
        .status
        .success());

    let changed = NodeData::new("root")
        .with_property("title", "Catalog")
        .with_child(NodeData::new("b").with_role("items"))
        .with_child(NodeData::new("c").with_role("items"));
    write_spec(&dir, "changed.json", &changed);

    let output = treesync(dir.path(), &["plan", "changed.json", "tree.json"]);
    assert!(output.status.success(), "{output:?}");
    let stats: ImportStats = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(stats.additions.len(), 1);
    assert_eq!(stats.additions[0].node_id, "c");
    assert_eq!(stats.deletions.len(), 1);
    assert_eq!(stats.deletions[0].node_id.as_deref(), Some("a"));
    assert_eq!(stats.reference_changes.len(), 1);
}

#[test]
fn invalid_spec_fails() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("spec.json"), "not json").unwrap();

    let output = treesync(dir.path(), &["import", "spec.json", "tree.json"]);
    assert!(!output.status.success());
    assert!(!dir.path().join("tree.json").exists());
}

#[test]
fn invalid_configuration_fails() {
    let dir = TempDir::new().unwrap();
    write_spec(&dir, "spec.json", &spec());

    let output = Command::new(env!("CARGO_BIN_EXE_treesync"))
        .args(["import", "spec.json", "tree.json"])
        .current_dir(dir.path())
        .env("TREESYNC_SIZE_LIMIT", "0")
        .output()
        .unwrap();
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("TREESYNC_SIZE_LIMIT"));
}
