//! Usage queries: who uses an object, and user-count bookkeeping.

use super::flags::{UsageFlags, WalkControl, WalkFlags};
use super::walker::{foreach_id, LinkInfo};
use crate::error::Result;
use crate::graph::{LibraryObject, ObjectId, ObjectStore, ObjectTags, ObjectType, TypeFilter};
use log::debug;
use serde::Serialize;

/// Number of edges from one object (or from the whole store) to a target.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UseCount {
    /// Edges held by local objects
    pub direct: usize,
    /// Edges held by linked objects
    pub indirect: usize,
}

impl UseCount {
    /// Total number of edges.
    pub fn total(&self) -> usize {
        self.direct + self.indirect
    }

    fn record(&mut self, link: &LinkInfo<'_>, target: ObjectId) {
        if link.target() != Some(target) || link.usage.contains(UsageFlags::LOOPBACK) {
            return;
        }
        if link.usage.contains(UsageFlags::INDIRECT_USAGE) {
            self.indirect += 1;
        } else {
            self.direct += 1;
        }
    }
}

/// Count the edges from `user` to `target`.
///
/// Loop-back edges are not uses. Embedded objects of `user` count as part of
/// it.
pub fn count_uses(store: &ObjectStore, user: ObjectId, target: ObjectId) -> UseCount {
    let mut count = UseCount::default();
    foreach_id(store, user, WalkFlags::READONLY, |link| {
        count.record(link, target);
        WalkControl::Continue
    });
    count
}

/// Whether any local object uses `target`.
pub fn is_used_locally(store: &ObjectStore, target: ObjectId) -> bool {
    scan_users(store, target, |count| count.direct > 0).direct > 0
}

/// Whether any linked object uses `target`.
pub fn is_used_indirectly(store: &ObjectStore, target: ObjectId) -> bool {
    scan_users(store, target, |count| count.indirect > 0).indirect > 0
}

/// Both answers at once: `(used locally, used by linked data)`.
pub fn test_usages(store: &ObjectStore, target: ObjectId) -> (bool, bool) {
    let count = scan_users(store, target, |count| count.direct > 0 && count.indirect > 0);
    (count.direct > 0, count.indirect > 0)
}

// Accumulate uses of `target` over the store until `done` is satisfied.
fn scan_users(
    store: &ObjectStore,
    target: ObjectId,
    done: impl Fn(&UseCount) -> bool,
) -> UseCount {
    let mut count = UseCount::default();
    let Ok(target_object) = store.get(target) else {
        return count;
    };
    let target_type = target_object.object_type();

    for object in store.iter() {
        if object.id() == target || !can_use_type(store, object, target_type) {
            continue;
        }
        foreach_id(store, object.id(), WalkFlags::READONLY, |link| {
            count.record(link, target);
            WalkControl::Continue
        });
        if done(&count) {
            break;
        }
    }
    count
}

/// Types `object` may hold edges to.
///
/// Objects carrying generic data (custom properties, an embedded node tree,
/// animation data, a real override) may point at anything. With
/// `include_ui`, screens may too.
pub fn can_use_filter(store: &ObjectStore, object: &LibraryObject, include_ui: bool) -> TypeFilter {
    let object_type = object.object_type();
    if !object.properties.is_empty() || !object.system_properties.is_empty() {
        return TypeFilter::ALL;
    }
    if include_ui && object_type == ObjectType::Screen {
        return TypeFilter::ALL;
    }
    if object.node_tree().is_some_and(|tree| !tree.is_null()) {
        return TypeFilter::ALL;
    }
    let type_info = store.type_info(object_type);
    if (object.anim.is_some() && type_info.has_animdata()) || object.is_override_real() {
        return TypeFilter::ALL;
    }
    type_info.dependencies
}

/// Whether `object` may hold an edge to an object of type `target_type`.
pub fn can_use_type(store: &ObjectStore, object: &LibraryObject, target_type: ObjectType) -> bool {
    can_use_filter(store, object, false).intersects(target_type.filter())
}

/// Update user counts after an edge with `usage` moved from `old` to `new`.
///
/// # Errors
///
/// Returns [`GraphError::ObjectNotFound`](crate::GraphError::ObjectNotFound)
/// if either object doesn't exist.
pub fn update_link_user(
    store: &ObjectStore,
    new: Option<ObjectId>,
    old: Option<ObjectId>,
    usage: UsageFlags,
) -> Result<()> {
    if usage.contains(UsageFlags::USER) {
        if let Some(old) = old {
            store.remove_user(old)?;
        }
        if let Some(new) = new {
            store.add_user(new)?;
        }
    } else if usage.contains(UsageFlags::USER_ONE) {
        if let Some(new) = new {
            store.ensure_real_user(new)?;
        }
    }
    Ok(())
}

/// Rebuild every user count from the edges in the store.
///
/// A fake user counts as one user. Single-owner edges are applied last, so
/// they only grant an extra user to objects nothing else uses.
///
/// # Errors
///
/// Returns [`GraphError::ObjectNotFound`](crate::GraphError::ObjectNotFound)
/// if an edge points at a missing object.
pub fn recompute_user_counts(store: &ObjectStore) -> Result<()> {
    for object in store.iter_all() {
        object.set_tags(ObjectTags::EXTRA_USER, false);
        store.set_users(object.id(), u32::from(object.has_fake_user()))?;
    }

    let mut users = Vec::new();
    let mut single_users = Vec::new();
    for object in store.iter() {
        foreach_id(store, object.id(), WalkFlags::READONLY, |link| {
            if let Some(target) = link.target() {
                if link.usage.contains(UsageFlags::USER) {
                    users.push(target);
                } else if link.usage.contains(UsageFlags::USER_ONE) {
                    single_users.push(target);
                }
            }
            WalkControl::Continue
        });
    }

    debug!(
        "Recomputing user counts: {} users, {} single users",
        users.len(),
        single_users.len()
    );
    for target in users {
        store.add_user(target)?;
    }
    for target in single_users {
        store.ensure_real_user(target)?;
    }
    Ok(())
}
