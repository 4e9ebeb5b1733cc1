//! Flag sets shared by the traversal engine and its callers.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Options controlling one traversal call.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct WalkFlags: u32 {
        /// No pointer is modified; callbacks may request a stop.
        const READONLY = 1 << 0;
        /// Walk every object reachable from the root. Implies `READONLY`.
        const RECURSE = 1 << 1;
        /// Also visit pointers held by editor (UI) data.
        const INCLUDE_UI = 1 << 2;
        /// Do not descend into embedded objects.
        const IGNORE_EMBEDDED_ID = 1 << 3;
        /// Visit the library pointer of each object.
        const DO_LIBRARY_POINTER = 1 << 4;
        /// Visit runtime-only pointers. Ignored when recursing.
        const DO_INTERNAL_RUNTIME_POINTERS = 1 << 5;
        /// Visit deprecated pointers kept for versioning.
        const DO_DEPRECATED_POINTERS = 1 << 6;
        /// Embedded objects without a known owner use themselves as owner.
        const IGNORE_MISSING_OWNER = 1 << 7;
        /// Objects may be copies whose original pointers must not be read.
        /// Mutually exclusive with `RECURSE`; implies `IGNORE_MISSING_OWNER`.
        const NO_ORIGINAL_POINTER_ACCESS = 1 << 8;
    }
}

bitflags! {
    /// Usage kind of one edge.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct UsageFlags: u32 {
        /// Edge can never be null.
        const NEVER_NULL = 1 << 0;
        /// Edge can never point back at its own object.
        const NEVER_SELF = 1 << 1;
        /// Reference-counted edge.
        const USER = 1 << 2;
        /// Edge that needs at least one user on its target, without owning it.
        const USER_ONE = 1 << 3;
        /// Runtime-only edge.
        const INTERNAL = 1 << 4;
        /// Non-owning back-reference to the object that defines this one.
        const LOOPBACK = 1 << 5;
        /// Edge from an owner to its embedded object.
        const EMBEDDED = 1 << 6;
        /// Edge to an embedded object that the holder does not own.
        const EMBEDDED_NOT_OWNING = 1 << 7;
        /// Edge from an object to the library it is linked from.
        const LIBRARY_POINTER = 1 << 8;
        /// Weak edge that does not make its target directly used.
        const DIRECT_WEAK_LINK = 1 << 9;
        /// Edge to the reference data of a library override.
        const OVERRIDE_LIBRARY_REFERENCE = 1 << 10;
        /// Edge that library overrides cannot change.
        const OVERRIDE_LIBRARY_NOT_OVERRIDABLE = 1 << 11;
        /// Edge held by a linked object.
        const INDIRECT_USAGE = 1 << 12;
    }
}

impl UsageFlags {
    /// Edges of these kinds are never overridable.
    pub const FORCE_NOT_OVERRIDABLE: UsageFlags = UsageFlags::INTERNAL
        .union(UsageFlags::LOOPBACK)
        .union(UsageFlags::OVERRIDE_LIBRARY_REFERENCE);

    /// Edges of these kinds count towards reference ownership.
    pub const REFCOUNTING: UsageFlags = UsageFlags::USER.union(UsageFlags::USER_ONE);

    /// Names of the set flags, for reports.
    pub fn names(self) -> Vec<&'static str> {
        self.iter_names().map(|(name, _)| name).collect()
    }
}

/// What a traversal callback asks the engine to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WalkControl {
    /// Keep going.
    #[default]
    Continue,
    /// Abort the whole traversal call, pending recursive work included.
    StopIteration,
    /// Do not recurse into the target of this edge.
    StopRecursion,
}
