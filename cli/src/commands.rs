//! Subcommand implementations.
//!
//! All file I/O of the tool lives here; the engine only sees parsed trees.

use crate::config::Config;
use crate::error::AppError;
use serde::Serialize;
use std::fs;
use std::path::Path;
use treesync_engine::{
    export_incremental, export_node, replay, ImportStats, Importer, InvalidatingVisitor,
    InvalidationTree, MemoryTree, NodeData,
};

/// Result of importing a specification into a snapshot.
#[derive(Debug)]
pub struct ImportOutcome {
    pub stats: ImportStats,
    /// The snapshot after the import
    pub export: NodeData,
}

/// Read a specification or snapshot file.
pub fn load_spec(path: &Path) -> Result<NodeData, AppError> {
    let json = fs::read_to_string(path).map_err(|e| AppError::io(path, e))?;
    Ok(NodeData::from_json(&json)?)
}

/// Load a live snapshot, or an empty root when the file does not exist yet.
pub fn load_tree(path: &Path) -> Result<MemoryTree, AppError> {
    if !path.exists() {
        tracing::info!(path = %path.display(), "snapshot not found, starting from an empty tree");
        return Ok(MemoryTree::new());
    }
    let data = load_spec(path)?;
    Ok(MemoryTree::from_data(&data)?)
}

/// Import `spec` into `tree` and re-export the result.
///
/// The export is incremental: only subtrees touched by the import are read
/// again.
pub fn run_import(
    config: &Config,
    spec: &NodeData,
    tree: &mut MemoryTree,
) -> Result<ImportOutcome, AppError> {
    let root = tree.root();
    let previous = export_node(&*tree, &root);
    tree.take_changes();

    let mut importer = Importer::new(config.import).with_observer(ImportStats::new());
    importer.import(tree, &root, spec)?;
    let stats = importer.into_observer();

    let mut invalidations = InvalidationTree::new(root, config.size_limit)?;
    let changes = tree.take_changes();
    replay(
        &changes,
        &mut InvalidatingVisitor::new(&*tree, &mut invalidations),
    )?;
    tracing::debug!(
        changes = changes.len(),
        entries = invalidations.size(),
        "journal replayed"
    );

    let export = export_incremental(&*tree, &root, &previous, &invalidations)?;
    Ok(ImportOutcome { stats, export })
}

/// `treesync import`: import and write the resulting snapshot.
pub fn import(
    config: &Config,
    spec_path: &Path,
    tree_path: &Path,
    out: Option<&Path>,
) -> Result<(), AppError> {
    let spec = load_spec(spec_path)?;
    let mut tree = load_tree(tree_path)?;
    let outcome = run_import(config, &spec, &mut tree)?;

    let out = out.unwrap_or(tree_path);
    let json = if config.pretty {
        outcome.export.to_json_pretty()?
    } else {
        outcome.export.to_json()?
    };
    fs::write(out, json).map_err(|e| AppError::io(out, e))?;
    tracing::info!(path = %out.display(), edits = outcome.stats.total(), "snapshot written");

    print_json(config, &outcome.stats.summary())
}

/// `treesync plan`: import in memory and print every edit.
pub fn plan(config: &Config, spec_path: &Path, tree_path: &Path) -> Result<(), AppError> {
    let spec = load_spec(spec_path)?;
    let mut tree = load_tree(tree_path)?;
    let outcome = run_import(config, &spec, &mut tree)?;
    print_json(config, &outcome.stats)
}

fn print_json<T: Serialize>(config: &Config, value: &T) -> Result<(), AppError> {
    let json = if config.pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{json}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> NodeData {
        NodeData::new("root")
            .with_child(NodeData::new("a").with_role("items").with_property("name", "A"))
            .with_child(NodeData::new("b").with_role("items").with_reference("peer", "a"))
    }

    #[test]
    fn run_import_into_empty_tree() {
        let mut tree = MemoryTree::new();
        let outcome = run_import(&Config::default(), &spec(), &mut tree).unwrap();

        assert_eq!(outcome.stats.additions.len(), 2);
        assert_eq!(outcome.export, spec());
        assert!(tree.changes().is_empty());
    }

    #[test]
    fn run_import_twice() {
        let mut tree = MemoryTree::new();
        run_import(&Config::default(), &spec(), &mut tree).unwrap();

        let changed = spec().with_child(NodeData::new("c").with_role("items"));
        let outcome = run_import(&Config::default(), &changed, &mut tree).unwrap();
        assert_eq!(outcome.stats.total(), 1);
        assert_eq!(outcome.export, changed);
    }

    #[test]
    fn run_import_with_tiny_trie() {
        let config = Config {
            size_limit: 1,
            ..Config::default()
        };
        let mut tree = MemoryTree::from_data(&spec()).unwrap();
        let reordered = NodeData::new("root")
            .with_child(NodeData::new("b").with_role("items").with_reference("peer", "a"))
            .with_child(NodeData::new("a").with_role("items").with_property("name", "A"));

        let outcome = run_import(&config, &reordered, &mut tree).unwrap();
        assert_eq!(outcome.stats.moves.len(), 1);
        assert_eq!(outcome.export, reordered);
    }

    #[test]
    fn strict_references_surface_as_engine_errors() {
        let mut config = Config::default();
        config.import.strict_references = true;
        let spec = NodeData::new("root")
            .with_child(NodeData::new("a").with_role("items").with_reference("peer", "nope"));

        let err = run_import(&config, &spec, &mut MemoryTree::new()).unwrap_err();
        assert!(matches!(err, AppError::Engine(_)));
    }

    #[test]
    fn missing_snapshot_is_empty_tree() {
        let tree = load_tree(Path::new("/definitely/not/here.json")).unwrap();
        assert!(tree.is_empty());
    }
}
