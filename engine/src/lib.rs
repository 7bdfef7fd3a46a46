//! # Treesync Engine
//!
//! Identity-based synchronization of live trees with specification trees.
//!
//! A specification tree ([`NodeData`]) describes what a live tree should look
//! like. The [`Importer`] edits the live tree in place until it matches,
//! preserving every node whose stable identity appears in both. Edits are
//! journaled as change notifications; an [`InvalidatingVisitor`] turns them into
//! a size-bounded [`InvalidationTree`] so that the next export only re-reads
//! what changed.
//!
//! ## Design Principles
//!
//! - **Identity first**: nodes are matched by the reserved
//!   [`ID_PROPERTY_KEY`] property, never by structure
//! - **Minimal edits**: nodes that already exist are moved, never recreated
//! - **No IO**: the engine knows nothing about files or storage backends
//! - **Generic**: any backend implementing [`LiveTree`] can be synchronized
//!
//! ## Core Concepts
//!
//! ### Live trees
//!
//! [`LiveTree`] is the capability set the engine needs: read and write
//! properties and references, add, move and remove children. [`MemoryTree`] is
//! the in-memory implementation with a change journal.
//!
//! ### Import
//!
//! [`Importer::import`] runs one ordered pass: sync properties, reorder, add,
//! move across parents, sync references, delete. An [`ImportObserver`] such as
//! [`ImportStats`] receives every edit; the default `()` observer costs nothing.
//!
//! ### Invalidation
//!
//! [`InvalidationTree`] records changed containment paths and collapses
//! subtrees into opaque entries once a size limit is reached.
//!
//! ## Quick Start
//!
//! ```rust
//! use treesync_engine::{
//!     export_incremental, export_node, replay, ImportStats, Importer, InvalidatingVisitor,
//!     InvalidationTree, LiveTree, MemoryTree, NodeData,
//! };
//!
//! // 1. Describe the desired tree
//! let spec = NodeData::new("root")
//!     .with_child(NodeData::new("a").with_role("items").with_property("name", "A"))
//!     .with_child(NodeData::new("b").with_role("items"));
//!
//! // 2. Import it into a live tree
//! let mut tree = MemoryTree::new();
//! let root = tree.root();
//! let mut importer = Importer::default().with_observer(ImportStats::new());
//! importer.import(&mut tree, &root, &spec).unwrap();
//! assert_eq!(importer.observer().additions.len(), 2);
//!
//! let previous = export_node(&tree, &root);
//! assert_eq!(previous, spec);
//! tree.take_changes();
//!
//! // 3. Edit the live tree and track what changed
//! let b = tree.find("b").unwrap();
//! tree.set_property(&b, "name", Some("B")).unwrap();
//!
//! let mut invalidations = InvalidationTree::new(root, 1000).unwrap();
//! let changes = tree.take_changes();
//! replay(&changes, &mut InvalidatingVisitor::new(&tree, &mut invalidations)).unwrap();
//! assert!(invalidations.needs_synchronization(&[root, b]));
//!
//! // 4. Re-export only what changed
//! let current = export_incremental(&tree, &root, &previous, &invalidations).unwrap();
//! assert_eq!(current, export_node(&tree, &root));
//! invalidations.reset();
//! ```

pub mod change;
pub mod data;
pub mod error;
pub mod export;
pub mod ids;
pub mod import;
pub mod index;
pub mod invalidation;
pub mod memory;
pub mod stats;
pub mod tree;
pub mod visitor;

// Re-export main types at crate root
pub use change::{replay, ChangeVisitor, TreeChange};
pub use data::{NodeData, ID_PROPERTY_KEY};
pub use error::Error;
pub use export::{export_incremental, export_node};
pub use ids::{with_assigned_ids, IdPolicy, IdScheme};
pub use import::{ImportOptions, Importer};
pub use invalidation::InvalidationTree;
pub use memory::{MemoryTree, NodeId};
pub use stats::{
    Addition, Deletion, ImportObserver, ImportStats, Move, PropertyChange, ReferenceChange,
    StatsSummary,
};
pub use tree::LiveTree;
pub use visitor::InvalidatingVisitor;

/// Type aliases for clarity
pub type OriginalId = String;
pub type Role = String;
