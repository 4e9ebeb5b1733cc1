//! Reverse-adjacency cache.
//!
//! For every object, the edges it holds (`to_ids`) and the edges pointing at
//! it (`from_ids`), recorded in discovery order by one read-only pass over the
//! store. The cache is a snapshot: any structural mutation of the store makes
//! it stale (see [`Relations::is_current`]).

use crate::graph::{IdPointer, ObjectId, ObjectStore};
use crate::walk::{foreach_id, UsageFlags, WalkControl, WalkFlags};
use log::debug;
use std::cell::Cell;
use std::collections::HashMap;

/// Visit state used by the unused analyzer's cycle handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VisitState {
    /// Not visited yet, or visited inside an unresolved loop
    #[default]
    Unvisited,
    /// On the current analysis path
    InProgress,
    /// Final answer known
    Processed,
}

/// One recorded edge.
///
/// In `to_ids`, `id` is the target; in `from_ids`, it is the object holding
/// the edge. `pointer` is a snapshot of the edge target.
#[derive(Debug, Clone)]
pub struct RelationItem {
    /// Object at the other end of the edge
    pub id: ObjectId,
    /// Snapshot of the edge slot
    pub pointer: IdPointer,
    /// Resolved usage flags
    pub usage: UsageFlags,
}

/// Edges of one object, both directions.
#[derive(Debug, Default)]
pub struct RelationEntry {
    from_ids: Vec<RelationItem>,
    to_ids: Vec<RelationItem>,
    state: Cell<VisitState>,
}

impl RelationEntry {
    /// Edges pointing at this object.
    pub fn from_ids(&self) -> &[RelationItem] {
        &self.from_ids
    }

    /// Edges held by this object.
    pub fn to_ids(&self) -> &[RelationItem] {
        &self.to_ids
    }

    /// Current visit state.
    pub fn state(&self) -> VisitState {
        self.state.get()
    }

    /// Update the visit state.
    pub fn set_state(&self, state: VisitState) {
        self.state.set(state);
    }
}

/// Reverse-adjacency cache of a whole store.
#[derive(Debug)]
pub struct Relations {
    entries: HashMap<ObjectId, RelationEntry>,
    include_ui: bool,
    generation: u64,
}

impl Relations {
    /// Build the cache with one read-only pass per top-level object.
    ///
    /// With `include_ui`, edges held by editor data are recorded too.
    pub fn build(store: &ObjectStore, include_ui: bool) -> Self {
        let mut flags = WalkFlags::READONLY;
        if include_ui {
            flags |= WalkFlags::INCLUDE_UI;
        }

        let mut entries: HashMap<ObjectId, RelationEntry> = HashMap::new();
        let mut edges = 0usize;
        for object in store.iter() {
            entries.entry(object.id()).or_default();
            foreach_id(store, object.id(), flags, |link| {
                let Some(target) = link.target() else {
                    return WalkControl::Continue;
                };
                entries
                    .entry(link.self_id)
                    .or_default()
                    .to_ids
                    .push(RelationItem {
                        id: target,
                        pointer: IdPointer::to(target),
                        usage: link.usage,
                    });
                entries
                    .entry(target)
                    .or_default()
                    .from_ids
                    .push(RelationItem {
                        id: link.self_id,
                        pointer: IdPointer::to(target),
                        usage: link.usage,
                    });
                edges += 1;
                WalkControl::Continue
            });
        }

        debug!(
            "Built relations: {} entries, {} edges, include_ui={}",
            entries.len(),
            edges,
            include_ui
        );

        Self {
            entries,
            include_ui,
            generation: store.generation(),
        }
    }

    /// Whether the store has not been structurally mutated since the build.
    pub fn is_current(&self, store: &ObjectStore) -> bool {
        self.generation == store.generation()
    }

    /// Whether edges held by editor data were recorded.
    pub fn include_ui(&self) -> bool {
        self.include_ui
    }

    /// Entry of one object.
    pub fn get(&self, id: ObjectId) -> Option<&RelationEntry> {
        self.entries.get(&id)
    }

    /// Edges pointing at `id`; empty for unknown objects.
    pub fn from_ids(&self, id: ObjectId) -> &[RelationItem] {
        self.get(id).map(RelationEntry::from_ids).unwrap_or(&[])
    }

    /// Edges held by `id`; empty for unknown objects.
    pub fn to_ids(&self, id: ObjectId) -> &[RelationItem] {
        self.get(id).map(RelationEntry::to_ids).unwrap_or(&[])
    }

    /// Visit state of `id`; unknown objects count as processed.
    pub fn state(&self, id: ObjectId) -> VisitState {
        self.get(id).map_or(VisitState::Processed, RelationEntry::state)
    }

    /// Update the visit state of `id`, if it has an entry.
    pub fn set_state(&self, id: ObjectId, state: VisitState) {
        if let Some(entry) = self.get(id) {
            entry.set_state(state);
        }
    }

    /// Reset every visit state to [`VisitState::Unvisited`].
    pub fn reset_states(&self) {
        for entry in self.entries.values() {
            entry.set_state(VisitState::Unvisited);
        }
    }

    /// Iterate over all entries, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (ObjectId, &RelationEntry)> {
        self.entries.iter().map(|(id, entry)| (*id, entry))
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache has no entry.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
