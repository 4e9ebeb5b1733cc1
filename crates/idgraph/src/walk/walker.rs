//! The traversal engine.
//!
//! One call visits every outgoing edge of a root object, invoking a callback
//! per edge with its owner, self object, slot and resolved usage flags. With
//! [`WalkFlags::RECURSE`] it goes on to every object reachable from the root,
//! each exactly once, using an explicit work stack rather than the call
//! stack.
//!
//! Edge order within one object is fixed:
//!
//! ```text
//! library pointer        (DO_LIBRARY_POINTER)
//! runtime pointers       (DO_INTERNAL_RUNTIME_POINTERS)
//! override reference, hierarchy root, override operation sub-items
//! custom properties      (stored order, ID values only)
//! system properties
//! animation data
//! type-specific edges    (TypeInfo::foreach_id)
//! ```

use super::flags::{UsageFlags, WalkControl, WalkFlags};
use crate::graph::{AnimData, IdPointer, ObjectId, ObjectStore, ObjectTags, PropertyGroup};
use crate::relations::{RelationEntry, Relations};
use log::{trace, warn};
use std::collections::HashSet;

/// One visited edge, as seen by a traversal callback.
#[derive(Debug)]
pub struct LinkInfo<'a> {
    /// Real object holding the edge. Differs from `self_id` when the edge
    /// belongs to an embedded object; `None` if that owner is unknown.
    pub owner: Option<ObjectId>,
    /// Object whose field is being visited.
    pub self_id: ObjectId,
    /// The edge slot. Non-read-only passes may redirect it.
    pub pointer: &'a IdPointer,
    /// Resolved usage flags of the edge.
    pub usage: UsageFlags,
}

impl LinkInfo<'_> {
    /// Current target of the edge.
    pub fn target(&self) -> Option<ObjectId> {
        self.pointer.get()
    }
}

type LinkCallback<'c> = dyn FnMut(&LinkInfo<'_>) -> WalkControl + 'c;

struct Recursion {
    // Objects already walked or waiting in `todo`
    handled: HashSet<ObjectId>,
    todo: Vec<ObjectId>,
}

/// Per-call traversal state, handed to per-type enumerators.
///
/// Enumerators report each pointer field through [`process`](Self::process),
/// or [`process_embedded`](Self::process_embedded) for slots holding an
/// embedded object.
pub struct LinkWalker<'s, 'c> {
    store: &'s ObjectStore,
    relations: Option<&'s Relations>,
    root: ObjectId,
    owner: Option<ObjectId>,
    self_id: ObjectId,
    flags: WalkFlags,
    // Added to every edge of the current object
    usage: UsageFlags,
    // Removed from every edge of the current object
    usage_clear: UsageFlags,
    callback: &'c mut LinkCallback<'c>,
    stopped: bool,
    recursion: Option<Recursion>,
}

impl<'s, 'c> LinkWalker<'s, 'c> {
    fn new(
        store: &'s ObjectStore,
        relations: Option<&'s Relations>,
        root: ObjectId,
        flags: WalkFlags,
        callback: &'c mut LinkCallback<'c>,
    ) -> Self {
        Self {
            store,
            relations,
            root,
            owner: None,
            self_id: root,
            flags,
            usage: UsageFlags::empty(),
            usage_clear: UsageFlags::empty(),
            callback,
            stopped: false,
            recursion: None,
        }
    }

    /// Store being walked.
    pub fn store(&self) -> &'s ObjectStore {
        self.store
    }

    /// Effective flags of this call.
    pub fn flags(&self) -> WalkFlags {
        self.flags
    }

    /// Object the call started from.
    pub fn root(&self) -> ObjectId {
        self.root
    }

    /// Object whose fields are currently visited.
    pub fn self_id(&self) -> ObjectId {
        self.self_id
    }

    /// Real owner of the current object.
    pub fn owner(&self) -> Option<ObjectId> {
        self.owner
    }

    /// Whether a callback requested to stop the whole call.
    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// Extend (or with `replace`, replace) the usage flags added to every
    /// following edge. Returns the previous flags for
    /// [`restore_usage`](Self::restore_usage).
    pub fn override_usage(&mut self, usage: UsageFlags, replace: bool) -> UsageFlags {
        let previous = self.usage;
        if replace {
            self.usage = usage;
        } else {
            self.usage |= usage;
        }
        previous
    }

    /// Restore usage flags saved by [`override_usage`](Self::override_usage).
    pub fn restore_usage(&mut self, previous: UsageFlags) {
        self.usage = previous;
    }

    /// Visit one edge.
    pub fn process(&mut self, pointer: &IdPointer, usage: UsageFlags) {
        if self.stopped {
            return;
        }

        let old = pointer.get();
        let mut usage = usage.union(self.usage).difference(self.usage_clear);
        if usage.intersects(UsageFlags::FORCE_NOT_OVERRIDABLE) {
            usage |= UsageFlags::OVERRIDE_LIBRARY_NOT_OVERRIDABLE;
        }

        let info = LinkInfo {
            owner: self.owner,
            self_id: self.self_id,
            pointer,
            usage,
        };
        let control = (self.callback)(&info);

        if self.flags.contains(WalkFlags::READONLY) {
            debug_assert_eq!(
                pointer.get(),
                old,
                "read-only traversal callback modified a pointer"
            );
        } else {
            debug_assert_eq!(
                control,
                WalkControl::Continue,
                "iteration over usages must not be interrupted in non-read-only passes"
            );
            if pointer.get() != old {
                self.store.touch();
            }
        }

        if let (Some(old), Some(recursion)) = (old, self.recursion.as_mut()) {
            // A pruned target stays handled and is never queued later.
            if recursion.handled.insert(old) && control != WalkControl::StopRecursion {
                recursion.todo.push(old);
            }
        }
        if control == WalkControl::StopIteration {
            self.stopped = true;
        }
    }

    /// Visit an edge to an embedded object, then the embedded object itself.
    ///
    /// The embedded object is walked inline with the current owner and usage
    /// context, or queued when recursing.
    pub fn process_embedded(&mut self, pointer: &IdPointer) {
        let embedded = pointer.get();
        self.process(pointer, UsageFlags::EMBEDDED);
        if self.stopped {
            return;
        }
        debug_assert_eq!(embedded, pointer.get(), "embedded pointers cannot be redirected");

        let Some(embedded) = embedded else {
            return;
        };
        if self.flags.contains(WalkFlags::IGNORE_EMBEDDED_ID) {
            return;
        }
        if let Some(recursion) = self.recursion.as_mut() {
            // Deferred to the main loop rather than walked inline.
            if recursion.handled.insert(embedded) {
                recursion.todo.push(embedded);
            }
            return;
        }

        let saved = (self.self_id, self.owner, self.usage, self.usage_clear);
        let inherited = (self.usage, self.usage_clear);
        let completed = self.walk_object(embedded, self.owner, Some(inherited));
        (self.self_id, self.owner, self.usage, self.usage_clear) = saved;
        if !completed {
            self.stopped = true;
        }
    }

    fn cached_entry(&self, id: ObjectId) -> Option<&'s RelationEntry> {
        let relations = self.relations?;
        if !self.flags.contains(WalkFlags::READONLY) {
            return None;
        }
        // The cache only holds what a plain read-only pass with the same UI
        // setting would visit.
        if relations.include_ui() != self.flags.contains(WalkFlags::INCLUDE_UI) {
            return None;
        }
        if self.flags.intersects(
            WalkFlags::DO_INTERNAL_RUNTIME_POINTERS
                | WalkFlags::DO_LIBRARY_POINTER
                | WalkFlags::DO_DEPRECATED_POINTERS,
        ) {
            return None;
        }
        relations.get(id)
    }

    /// Walk all edges of one object. Returns `false` if the call must stop.
    fn walk_object(
        &mut self,
        id: ObjectId,
        owner_hint: Option<ObjectId>,
        inherited: Option<(UsageFlags, UsageFlags)>,
    ) -> bool {
        let store = self.store;
        let Ok(object) = store.get(id) else {
            warn!("Skipping dangling object handle {id}");
            return true;
        };
        trace!("Walking {id} ({})", object.object_type());

        self.self_id = id;
        self.owner = if object.is_embedded() {
            if self.flags.contains(WalkFlags::IGNORE_MISSING_OWNER) {
                Some(owner_hint.unwrap_or(id))
            } else {
                // Remapping code may pass an owner the embedded object does
                // not point to yet; the hint wins.
                owner_hint.or_else(|| store.owner_of(id))
            }
        } else {
            debug_assert!(owner_hint.is_none() || owner_hint == Some(id));
            Some(id)
        };

        match inherited {
            Some((usage, usage_clear)) => {
                self.usage = usage;
                self.usage_clear = usage_clear;
            }
            None => {
                self.usage = if object.is_linked() {
                    UsageFlags::INDIRECT_USAGE
                } else {
                    UsageFlags::empty()
                };
                self.usage_clear = if object.tags().contains(ObjectTags::NO_USER_REFCOUNT) {
                    UsageFlags::REFCOUNTING
                } else {
                    UsageFlags::empty()
                };
            }
        }

        if let Some(entry) = self.cached_entry(id) {
            for item in entry.to_ids() {
                if item.usage.contains(UsageFlags::EMBEDDED) {
                    self.process_embedded(&item.pointer);
                } else {
                    self.process(&item.pointer, item.usage);
                }
                if self.stopped {
                    return false;
                }
            }
            return true;
        }

        if self.flags.contains(WalkFlags::DO_LIBRARY_POINTER) {
            self.process(
                &object.library,
                UsageFlags::LIBRARY_POINTER | UsageFlags::NEVER_SELF,
            );
        }

        if self.flags.contains(WalkFlags::DO_INTERNAL_RUNTIME_POINTERS) {
            self.process(&object.runtime.new_id, UsageFlags::INTERNAL);
            self.process(&object.runtime.orig_id, UsageFlags::INTERNAL);
        }

        if let Some(override_library) = &object.override_library {
            self.process(
                &override_library.reference,
                UsageFlags::USER | UsageFlags::OVERRIDE_LIBRARY_REFERENCE,
            );
            self.process(&override_library.hierarchy_root, UsageFlags::LOOPBACK);
            for property in &override_library.properties {
                for operation in &property.operations {
                    let usage =
                        UsageFlags::DIRECT_WEAK_LINK | UsageFlags::OVERRIDE_LIBRARY_REFERENCE;
                    self.process(&operation.subitem_reference, usage);
                    self.process(&operation.subitem_local, usage);
                }
            }
        }
        if self.stopped {
            return false;
        }

        self.process_properties(&object.properties);
        self.process_properties(&object.system_properties);
        if self.stopped {
            return false;
        }

        let type_info = store.type_info(object.object_type());
        if let Some(anim) = object.anim.as_ref().filter(|_| type_info.has_animdata()) {
            self.process_anim(anim);
            if self.stopped {
                return false;
            }
        }

        if let Some(foreach_id) = type_info.foreach_id {
            foreach_id(object, self);
            if self.stopped {
                return false;
            }
        }

        true
    }

    fn process_properties(&mut self, properties: &PropertyGroup) {
        properties.foreach_id(&mut |pointer, overridable| {
            let usage = if overridable {
                UsageFlags::USER
            } else {
                UsageFlags::USER | UsageFlags::OVERRIDE_LIBRARY_NOT_OVERRIDABLE
            };
            self.process(pointer, usage);
        });
    }

    fn process_anim(&mut self, anim: &AnimData) {
        self.process(&anim.action, UsageFlags::USER);
        self.process(&anim.tmp_action, UsageFlags::USER);
        for action in &anim.nla_actions {
            self.process(action, UsageFlags::USER);
        }
        for target in &anim.driver_targets {
            self.process(target, UsageFlags::empty());
        }
    }
}

/// Configuration of one traversal call.
///
/// # Examples
///
/// ```
/// use idgraph::{helpers, ObjectStore, UsageFlags, Walk, WalkControl, WalkFlags};
///
/// # fn example() -> idgraph::Result<()> {
/// let mut store = ObjectStore::new();
/// let (object, mesh) = helpers::add_mesh_object(&mut store, "Cube")?;
///
/// let mut users = Vec::new();
/// Walk::new(&store, WalkFlags::READONLY).run(object, |link| {
///     if link.usage.contains(UsageFlags::USER) {
///         users.extend(link.target());
///     }
///     WalkControl::Continue
/// });
/// assert_eq!(users, vec![mesh]);
/// # Ok(())
/// # }
/// ```
pub struct Walk<'s> {
    store: &'s ObjectStore,
    relations: Option<&'s Relations>,
    owner: Option<ObjectId>,
    flags: WalkFlags,
}

impl<'s> Walk<'s> {
    /// Create a traversal over `store` with the given flags.
    pub fn new(store: &'s ObjectStore, flags: WalkFlags) -> Self {
        Self {
            store,
            relations: None,
            owner: None,
            flags,
        }
    }

    /// Use a relations cache where the flags allow it.
    ///
    /// The cache must have been built from the current state of the store.
    pub fn with_relations(mut self, relations: &'s Relations) -> Self {
        self.relations = Some(relations);
        self
    }

    /// Owner to report when the root is an embedded object.
    pub fn with_owner(mut self, owner: ObjectId) -> Self {
        self.owner = Some(owner);
        self
    }

    /// Run the traversal from `root`.
    ///
    /// Returns `false` iff a callback requested [`WalkControl::StopIteration`].
    pub fn run<F>(&self, root: ObjectId, mut callback: F) -> bool
    where
        F: FnMut(&LinkInfo<'_>) -> WalkControl,
    {
        let mut flags = self.flags;
        debug_assert!(
            !flags.contains(WalkFlags::NO_ORIGINAL_POINTER_ACCESS | WalkFlags::RECURSE),
            "NO_ORIGINAL_POINTER_ACCESS and RECURSE are mutually exclusive"
        );
        if let Some(relations) = self.relations {
            debug_assert!(relations.is_current(self.store), "relations cache is stale");
        }

        if flags.contains(WalkFlags::NO_ORIGINAL_POINTER_ACCESS) {
            flags |= WalkFlags::IGNORE_MISSING_OWNER;
        }

        let mut walker = LinkWalker::new(self.store, self.relations, root, flags, &mut callback);
        if flags.contains(WalkFlags::RECURSE) {
            // Recursion implies read-only, and no runtime pointers.
            walker.flags |= WalkFlags::READONLY;
            walker.flags.remove(WalkFlags::DO_INTERNAL_RUNTIME_POINTERS);
            walker.recursion = Some(Recursion {
                handled: HashSet::from([root]),
                todo: Vec::new(),
            });
        }

        let mut next = Some((root, self.owner));
        while let Some((id, owner_hint)) = next {
            if !walker.walk_object(id, owner_hint, None) {
                return false;
            }
            next = walker
                .recursion
                .as_mut()
                .and_then(|recursion| recursion.todo.pop())
                .map(|id| (id, None));
        }
        true
    }
}

/// Visit the outgoing edges of `root` without a relations cache.
///
/// Shorthand for `Walk::new(store, flags).run(root, callback)`.
pub fn foreach_id<F>(store: &ObjectStore, root: ObjectId, flags: WalkFlags, callback: F) -> bool
where
    F: FnMut(&LinkInfo<'_>) -> WalkControl,
{
    Walk::new(store, flags).run(root, callback)
}

/// Run a caller-supplied enumerator over a sub-structure of `self_id`.
///
/// Useful for code that holds only part of an object (a modifier, a node)
/// and wants the same edge reporting as a full traversal. Recursion, runtime
/// pointers, library pointers and UI pointers are not available here.
pub fn foreach_subdata<S, F>(
    store: &ObjectStore,
    owner: ObjectId,
    self_id: ObjectId,
    flags: WalkFlags,
    subdata: S,
    mut callback: F,
) -> bool
where
    S: FnOnce(&mut LinkWalker<'_, '_>),
    F: FnMut(&LinkInfo<'_>) -> WalkControl,
{
    debug_assert!(
        !flags.intersects(
            WalkFlags::RECURSE
                | WalkFlags::DO_INTERNAL_RUNTIME_POINTERS
                | WalkFlags::DO_LIBRARY_POINTER
                | WalkFlags::INCLUDE_UI
        ),
        "unsupported flags for sub-data traversal"
    );

    let mut walker = LinkWalker::new(store, None, self_id, flags, &mut callback);
    walker.owner = Some(owner);
    subdata(&mut walker);
    !walker.stopped
}
