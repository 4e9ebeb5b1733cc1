//! Unused-object analysis.
//!
//! Finds objects with no meaningful user, optionally recursively: an object
//! whose only users are themselves unused is unused too. Cycles of objects
//! that only use each other are reported as a whole, unless something
//! outside the cycle uses one of its members.
//!
//! The analysis runs over a [`Relations`] snapshot and keeps its results in
//! an [`UnusedSet`]; the store itself is never modified.

use crate::graph::{
    ImageSource, LibraryObject, ObjectData, ObjectId, ObjectStore, ObjectTags, ObjectType,
    TypeFlags,
};
use crate::relations::{Relations, VisitState};
use crate::walk::{foreach_id, LinkInfo, UsageFlags, WalkControl, WalkFlags};
use log::{debug, info, warn};
use serde::Serialize;
use std::collections::{BTreeSet, HashSet};

/// Default bound on the passes of the linked-object exception fixed point.
pub const DEFAULT_MAX_EXCEPTION_PASSES: usize = 10;

/// A predicate over objects, used as filter or exception.
type ObjectPredicate<'a> = Box<dyn Fn(&LibraryObject) -> bool + 'a>;

/// Per-type counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TypeCounts {
    overall: usize,
    per_type: [usize; ObjectType::COUNT],
}

impl TypeCounts {
    /// Count over all types.
    pub fn overall(&self) -> usize {
        self.overall
    }

    /// Count for one type.
    pub fn get(&self, object_type: ObjectType) -> usize {
        self.per_type[object_type.index()]
    }

    fn add(&mut self, object_type: ObjectType) {
        self.overall += 1;
        self.per_type[object_type.index()] += 1;
    }

    fn sub(&mut self, object_type: ObjectType) {
        self.overall -= 1;
        self.per_type[object_type.index()] -= 1;
    }
}

/// Unused amounts, split by scope.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UnusedCounts {
    /// All unused objects
    pub total: TypeCounts,
    /// Unused local objects
    pub local: TypeCounts,
    /// Unused linked objects
    pub linked: TypeCounts,
}

/// Result of an unused analysis.
#[derive(Debug, Clone, Default)]
pub struct UnusedSet {
    ids: BTreeSet<ObjectId>,
    counts: UnusedCounts,
    exception_passes_exhausted: bool,
}

impl UnusedSet {
    /// Whether `id` was found unused.
    pub fn contains(&self, id: ObjectId) -> bool {
        self.ids.contains(&id)
    }

    /// Number of unused objects.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Whether nothing was found unused.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Iterate over unused objects in handle order.
    pub fn iter(&self) -> impl Iterator<Item = ObjectId> + '_ {
        self.ids.iter().copied()
    }

    /// Counters by scope and type.
    pub fn counts(&self) -> &UnusedCounts {
        &self.counts
    }

    /// Whether the linked-object exception fixed point hit its pass bound
    /// before converging. The result is still usable but may keep some
    /// linked objects that are actually used.
    pub fn exception_passes_exhausted(&self) -> bool {
        self.exception_passes_exhausted
    }

    fn insert(&mut self, object: &LibraryObject) {
        if !self.ids.insert(object.id()) {
            return;
        }
        let object_type = object.object_type();
        self.counts.total.add(object_type);
        if object.is_linked() {
            self.counts.linked.add(object_type);
        } else {
            self.counts.local.add(object_type);
        }
    }

    fn remove(&mut self, object: &LibraryObject) {
        if !self.ids.remove(&object.id()) {
            return;
        }
        let object_type = object.object_type();
        self.counts.total.sub(object_type);
        if object.is_linked() {
            self.counts.linked.sub(object_type);
        } else {
            self.counts.local.sub(object_type);
        }
    }
}

/// Fluent configuration of an unused analysis.
///
/// Scopes default to local and linked, non-recursive.
///
/// # Examples
///
/// ```
/// use idgraph::{ObjectStore, ObjectType, UnusedQuery};
///
/// let mut store = ObjectStore::new();
/// let orphan = store.add_object(ObjectType::Material, "Orphan");
///
/// let unused = UnusedQuery::new(&store).recursive(true).execute();
/// assert!(unused.contains(orphan));
/// ```
pub struct UnusedQuery<'a> {
    store: &'a ObjectStore,
    do_local: bool,
    do_linked: bool,
    do_recursive: bool,
    filter: Option<ObjectPredicate<'a>>,
    exception: Option<ObjectPredicate<'a>>,
    max_exception_passes: usize,
}

impl<'a> UnusedQuery<'a> {
    /// Create a new query over the given store.
    pub fn new(store: &'a ObjectStore) -> Self {
        Self {
            store,
            do_local: true,
            do_linked: true,
            do_recursive: false,
            filter: None,
            exception: None,
            max_exception_passes: DEFAULT_MAX_EXCEPTION_PASSES,
        }
    }

    /// Include local objects.
    pub fn local(mut self, enabled: bool) -> Self {
        self.do_local = enabled;
        self
    }

    /// Include linked objects.
    pub fn linked(mut self, enabled: bool) -> Self {
        self.do_linked = enabled;
        self
    }

    /// Also report objects only used by unused objects.
    pub fn recursive(mut self, enabled: bool) -> Self {
        self.do_recursive = enabled;
        self
    }

    /// Only objects matching `filter` are ever reported.
    pub fn filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&LibraryObject) -> bool + 'a,
    {
        self.filter = Some(Box::new(filter));
        self
    }

    /// Objects matching `exception` are treated as used.
    pub fn exception<F>(mut self, exception: F) -> Self
    where
        F: Fn(&LibraryObject) -> bool + 'a,
    {
        self.exception = Some(Box::new(exception));
        self
    }

    /// Bound on the passes of the linked-object exception fixed point.
    pub fn max_exception_passes(mut self, passes: usize) -> Self {
        self.max_exception_passes = passes;
        self
    }

    /// Run the analysis on a freshly built relations cache.
    pub fn execute(&self) -> UnusedSet {
        let relations = Relations::build(self.store, false);
        self.execute_with(&relations)
    }

    /// Run the analysis on a caller-supplied relations cache.
    ///
    /// The cache must be current; its visit states are reset first.
    pub fn execute_with(&self, relations: &Relations) -> UnusedSet {
        let unused = self.run(relations, self.do_local, self.do_linked);
        info!(
            "Found {} unused objects ({} local, {} linked)",
            unused.len(),
            unused.counts.local.overall(),
            unused.counts.linked.overall()
        );
        unused
    }

    /// Predict unused amounts per scope.
    ///
    /// The local amount is computed as if local scope were enabled and the
    /// linked amount as if linked scope were enabled; the total only covers
    /// the enabled scopes. Takes at most two passes.
    pub fn amounts(&self) -> UnusedCounts {
        let relations = Relations::build(self.store, false);
        let mut amounts = UnusedCounts::default();

        let first = self.run(&relations, true, self.do_linked);
        amounts.local = first.counts.local.clone();
        if self.do_local {
            amounts.total = first.counts.total.clone();
        }
        if self.do_local && self.do_linked {
            amounts.linked = first.counts.linked;
            return amounts;
        }

        let second = self.run(&relations, self.do_local, true);
        amounts.linked = second.counts.linked.clone();
        if !self.do_local && self.do_linked {
            amounts.total = second.counts.total;
        }
        amounts
    }

    fn run(&self, relations: &Relations, do_local: bool, do_linked: bool) -> UnusedSet {
        debug_assert!(relations.is_current(self.store), "relations cache is stale");
        relations.reset_states();

        let mut analysis = Analysis {
            query: self,
            store: self.store,
            relations,
            do_local,
            do_linked,
            unused: UnusedSet::default(),
        };
        analysis.tag_zero_users();
        analysis.clear_exceptions();
        if self.do_recursive {
            analysis.tag_recursive();
        }
        analysis.unused
    }
}

impl ObjectStore {
    /// Start an unused analysis over this store.
    pub fn unused(&self) -> UnusedQuery<'_> {
        UnusedQuery::new(self)
    }
}

/// One frame of the recursive analysis: an object and its remaining users.
struct Frame {
    id: ObjectId,
    users: Vec<ObjectId>,
    next: usize,
    has_valid_user: bool,
    in_loop: bool,
}

impl Frame {
    fn record(&mut self, user: ObjectId, user_in_loop: bool, unused: &UnusedSet) {
        if user_in_loop {
            self.in_loop = true;
        } else if !unused.contains(user) {
            self.has_valid_user = true;
        }
    }
}

enum Visit {
    // Answer known: whether the object is part of a pending loop
    Resolved(bool),
    Entered(Frame),
}

struct Analysis<'q, 'a> {
    query: &'q UnusedQuery<'a>,
    store: &'a ObjectStore,
    relations: &'q Relations,
    do_local: bool,
    do_linked: bool,
    unused: UnusedSet,
}

impl Analysis<'_, '_> {
    fn in_scope(&self, object: &LibraryObject) -> bool {
        if object.is_linked() {
            self.do_linked
        } else {
            self.do_local
        }
    }

    fn tag(&mut self, object: &LibraryObject) {
        if let Some(filter) = &self.query.filter {
            if !filter(object) {
                return;
            }
        }
        self.unused.insert(object);
    }

    // Edges held by embedded objects belong to their owner.
    fn resolve_user(&self, id: ObjectId) -> Option<ObjectId> {
        match self.store.get(id) {
            Ok(object) if object.is_embedded() => {
                debug_assert!(object.owner().is_some(), "embedded object without owner");
                object.owner()
            }
            Ok(_) => Some(id),
            Err(_) => None,
        }
    }

    fn has_exception_user(&self, object: &LibraryObject) -> bool {
        match object.object_type() {
            // Linked objects may be used only through their collections.
            ObjectType::Object if object.is_linked() => self
                .relations
                .from_ids(object.id())
                .iter()
                .filter_map(|item| self.resolve_user(item.id))
                .any(|user| !self.unused.contains(user)),
            ObjectType::Image => {
                matches!(&object.data, ObjectData::Image(image) if image.source == ImageSource::Viewer)
            }
            _ => false,
        }
    }

    fn tag_zero_users(&mut self) {
        let store = self.store;
        for object in store.iter() {
            if self.in_scope(object) && object.users() == 0 {
                self.tag(object);
            }
        }
        debug!("Zero-user pass tagged {} objects", self.unused.len());
    }

    fn clear_exceptions(&mut self) {
        let store = self.store;
        let max_passes = self.query.max_exception_passes;
        let mut converged = false;

        for pass in 0..max_passes {
            let mut changed = false;
            for object in store.iter_type(ObjectType::Object) {
                if self.unused.contains(object.id()) && self.has_exception_user(object) {
                    self.unused.remove(object);
                    changed = true;
                }
            }
            if !changed {
                debug!("Linked-object exceptions converged after {} passes", pass + 1);
                converged = true;
                break;
            }
        }

        if !converged {
            warn!(
                "Unexpected levels of dependencies between used linked objects, \
                 stopped after {max_passes} passes"
            );
            self.unused.exception_passes_exhausted = true;
        }
    }

    fn tag_recursive(&mut self) {
        let store = self.store;
        for object in store.iter() {
            let id = object.id();
            if self.tag_recurse(id)
                && !self.unused.contains(id)
                && self.relations.state(id) != VisitState::Processed
            {
                // Loop root: nothing outside the loop uses it.
                self.relations.set_state(id, VisitState::Processed);
                self.tag(object);
            }
            debug_assert_eq!(self.relations.state(id), VisitState::Processed);
        }
    }

    fn visit(&mut self, id: ObjectId) -> Visit {
        match self.relations.state(id) {
            VisitState::Processed => return Visit::Resolved(false),
            VisitState::InProgress => return Visit::Resolved(true),
            VisitState::Unvisited => {}
        }

        let store = self.store;
        let Ok(object) = store.get(id) else {
            warn!("Skipping dangling object handle {id}");
            self.relations.set_state(id, VisitState::Processed);
            return Visit::Resolved(false);
        };
        debug_assert!(!object.is_embedded(), "embedded objects are analysed through their owner");

        let settled = !self.in_scope(object)
            || self.unused.contains(id)
            || object.has_fake_user()
            || store
                .type_info(object.object_type())
                .flags
                .contains(TypeFlags::NEVER_UNUSED)
            || self.has_exception_user(object)
            || self.query.exception.as_ref().is_some_and(|exception| exception(object));
        if settled {
            self.relations.set_state(id, VisitState::Processed);
            return Visit::Resolved(false);
        }

        self.relations.set_state(id, VisitState::InProgress);
        let users = self
            .relations
            .from_ids(id)
            .iter()
            .filter(|item| is_owning_usage(item.usage))
            .filter_map(|item| self.resolve_user(item.id))
            .collect();

        Visit::Entered(Frame {
            id,
            users,
            next: 0,
            has_valid_user: false,
            in_loop: false,
        })
    }

    fn finish(&mut self, frame: &Frame) -> bool {
        let store = self.store;
        if !frame.has_valid_user && !frame.in_loop {
            if let Ok(object) = store.get(frame.id) {
                self.tag(object);
            }
        }
        // Loop members stay unvisited until the loop root resolves them.
        let state = if frame.has_valid_user || !frame.in_loop {
            VisitState::Processed
        } else {
            VisitState::Unvisited
        };
        self.relations.set_state(frame.id, state);
        frame.in_loop && !frame.has_valid_user
    }

    // Depth-first over users, with an explicit stack so that long user
    // chains cannot overflow the call stack.
    fn tag_recurse(&mut self, root: ObjectId) -> bool {
        let mut stack = match self.visit(root) {
            Visit::Resolved(in_loop) => return in_loop,
            Visit::Entered(frame) => vec![frame],
        };

        while let Some(mut frame) = stack.pop() {
            let child = loop {
                if frame.has_valid_user || frame.next >= frame.users.len() {
                    break None;
                }
                let user = frame.users[frame.next];
                frame.next += 1;
                match self.visit(user) {
                    Visit::Resolved(in_loop) => frame.record(user, in_loop, &self.unused),
                    Visit::Entered(child) => break Some(child),
                }
            };
            if let Some(child) = child {
                stack.push(frame);
                stack.push(child);
                continue;
            }

            let in_loop = self.finish(&frame);
            match stack.last_mut() {
                Some(parent) => parent.record(frame.id, in_loop, &self.unused),
                None => return in_loop,
            }
        }
        false
    }
}

fn is_owning_usage(usage: UsageFlags) -> bool {
    !usage.intersects(UsageFlags::LOOPBACK | UsageFlags::EMBEDDED | UsageFlags::EMBEDDED_NOT_OWNING)
        && usage.intersects(UsageFlags::REFCOUNTING)
}

/// Linked objects that nothing used needs.
///
/// Starts from every indirectly linked object and drops those used
/// (loop-back edges aside) by an object not in the set, until nothing
/// changes.
pub fn unused_linked_data(store: &ObjectStore) -> HashSet<ObjectId> {
    let mut tagged: HashSet<ObjectId> = store
        .iter()
        .filter(|object| object.is_linked() && object.tags().contains(ObjectTags::INDIRECT))
        .map(LibraryObject::id)
        .collect();

    loop {
        let mut changed = false;
        for object in store.iter() {
            if tagged.contains(&object.id()) {
                continue;
            }
            foreach_id(store, object.id(), WalkFlags::READONLY, |link| {
                changed |= clear_used_target(link, &mut tagged);
                WalkControl::Continue
            });
        }
        if !changed {
            break;
        }
    }

    debug!("{} linked objects are unused", tagged.len());
    tagged
}

/// Remove from `tagged` every object used by an untagged linked object,
/// until nothing changes.
pub fn clear_indirectly_used(store: &ObjectStore, tagged: &mut HashSet<ObjectId>) {
    loop {
        let mut changed = false;
        for object in store.iter() {
            if !object.is_linked() || tagged.contains(&object.id()) {
                continue;
            }
            foreach_id(store, object.id(), WalkFlags::READONLY, |link| {
                changed |= clear_used_target(link, tagged);
                WalkControl::Continue
            });
        }
        if !changed {
            break;
        }
    }
}

fn clear_used_target(link: &LinkInfo<'_>, tagged: &mut HashSet<ObjectId>) -> bool {
    if link.usage.contains(UsageFlags::LOOPBACK) || tagged.contains(&link.self_id) {
        return false;
    }
    link.target().is_some_and(|target| tagged.remove(&target))
}
