//! # idgraph
//!
//! Dependency queries over a store of typed library objects: who points at
//! whom, how, and which objects nothing meaningful uses anymore.
//!
//! ## Core Principles
//!
//! - **One traversal engine**: Every pointer of every object is reported
//!   through [`Walk`], in a fixed order, with usage flags
//! - **Snapshots for analysis**: [`Relations`] caches both edge directions
//!   for whole-store passes
//! - **No hidden state**: Analysis results live in returned values, never in
//!   the store
//! - **Zero Magic**: Explicit over implicit, always
//!
//! ## Architecture
//!
//! idgraph is organized in layers:
//!
//! ```text
//! Reports (unused analysis, usage counts, JSON export)
//!     ↓
//! Relations (reverse-adjacency cache)
//!     ↓
//! Walk (traversal engine, per-type enumerators)
//!     ↓
//! Object Store (objects, pointer slots, user counts)
//! ```
//!
//! ## Example
//!
//! ```rust
//! use idgraph::{helpers, ObjectStore, ObjectType};
//!
//! # fn example() -> idgraph::Result<()> {
//! let mut store = ObjectStore::new();
//! let scene = helpers::add_scene(&mut store, "Scene")?;
//! let master = helpers::master_collection(&store, scene)?;
//!
//! let (cube, _mesh) = helpers::add_mesh_object(&mut store, "Cube")?;
//! helpers::link_object(&mut store, master, cube)?;
//! let orphan = store.add_object(ObjectType::Material, "Orphan");
//!
//! let unused = store.unused().recursive(true).execute();
//! assert!(unused.contains(orphan));
//! assert!(!unused.contains(cube));
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod error;
pub mod export;
pub mod graph;
pub mod helpers;
pub mod relations;
pub mod unused;
pub mod walk;

// Re-export main types
pub use error::{GraphError, Result};
pub use graph::{
    IdPointer, LibraryObject, ObjectData, ObjectId, ObjectStore, ObjectType, PropertyGroup,
    PropertyValue, TypeFilter, TypeInfo, TypeRegistry,
};
pub use relations::{Relations, VisitState};
pub use unused::{UnusedCounts, UnusedQuery, UnusedSet};
pub use walk::{foreach_id, LinkInfo, LinkWalker, UsageFlags, Walk, WalkControl, WalkFlags};
