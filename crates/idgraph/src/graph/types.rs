//! Core graph types: handles, type tags, object flags and edge slots.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::cell::Cell;

/// Stable handle of a library object (monotonic counter, never reused).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(u64);

impl ObjectId {
    /// Wrap a raw handle value.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw handle value.
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Type of a library object.
///
/// Declaration order is the store's bucket order: full-store passes visit
/// all libraries first, then all scenes, and so on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ObjectType {
    /// External file that linked objects come from
    Library,
    /// Root of a visible hierarchy
    Scene,
    /// Grouping of objects and child collections
    Collection,
    /// Instance placed in a scene, pointing at its data
    Object,
    /// Geometry data
    Mesh,
    /// Shape key block of a geometry
    ShapeKey,
    /// Surface material
    Material,
    /// Node graph, standalone or embedded in its owner
    NodeTree,
    /// Procedural or image texture
    Texture,
    /// Image buffer
    Image,
    /// Environment settings
    World,
    /// Camera data
    Camera,
    /// Animation action
    Action,
    /// Editor layout
    Screen,
}

impl ObjectType {
    /// Number of object types.
    pub const COUNT: usize = 14;

    /// Every object type, in store order.
    pub const ALL: [ObjectType; Self::COUNT] = [
        ObjectType::Library,
        ObjectType::Scene,
        ObjectType::Collection,
        ObjectType::Object,
        ObjectType::Mesh,
        ObjectType::ShapeKey,
        ObjectType::Material,
        ObjectType::NodeTree,
        ObjectType::Texture,
        ObjectType::Image,
        ObjectType::World,
        ObjectType::Camera,
        ObjectType::Action,
        ObjectType::Screen,
    ];

    /// Position of this type in store order, usable as a counter index.
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Single-bit filter for this type.
    pub fn filter(self) -> TypeFilter {
        TypeFilter::from_bits_truncate(1 << self.index())
    }

    /// Whether objects of this type may exist embedded in an owner.
    pub fn can_be_embedded(self) -> bool {
        matches!(self, ObjectType::Collection | ObjectType::NodeTree)
    }
}

impl std::fmt::Display for ObjectType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ObjectType::Library => write!(f, "Library"),
            ObjectType::Scene => write!(f, "Scene"),
            ObjectType::Collection => write!(f, "Collection"),
            ObjectType::Object => write!(f, "Object"),
            ObjectType::Mesh => write!(f, "Mesh"),
            ObjectType::ShapeKey => write!(f, "ShapeKey"),
            ObjectType::Material => write!(f, "Material"),
            ObjectType::NodeTree => write!(f, "NodeTree"),
            ObjectType::Texture => write!(f, "Texture"),
            ObjectType::Image => write!(f, "Image"),
            ObjectType::World => write!(f, "World"),
            ObjectType::Camera => write!(f, "Camera"),
            ObjectType::Action => write!(f, "Action"),
            ObjectType::Screen => write!(f, "Screen"),
        }
    }
}

bitflags! {
    /// Set of object types, one bit per [`ObjectType`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct TypeFilter: u32 {
        const LIBRARY = 1 << 0;
        const SCENE = 1 << 1;
        const COLLECTION = 1 << 2;
        const OBJECT = 1 << 3;
        const MESH = 1 << 4;
        const SHAPE_KEY = 1 << 5;
        const MATERIAL = 1 << 6;
        const NODE_TREE = 1 << 7;
        const TEXTURE = 1 << 8;
        const IMAGE = 1 << 9;
        const WORLD = 1 << 10;
        const CAMERA = 1 << 11;
        const ACTION = 1 << 12;
        const SCREEN = 1 << 13;

        const ALL = (1 << 14) - 1;
    }
}

bitflags! {
    /// Persistent per-object flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct ObjectFlags: u8 {
        /// Owned by another object, absent from the top-level listing.
        const EMBEDDED = 1 << 0;
        /// Kept alive regardless of real users.
        const FAKE_USER = 1 << 1;
    }
}

bitflags! {
    /// Per-object status tags maintained by the store.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct ObjectTags: u8 {
        /// Outgoing edges never count as users.
        const NO_USER_REFCOUNT = 1 << 0;
        /// Linked only because another linked object needs it.
        const INDIRECT = 1 << 1;
        /// Holds one extra user granted by a single-owner edge.
        const EXTRA_USER = 1 << 2;
    }
}

/// An edge slot: one pointer-valued field of an object.
///
/// The target lives in a [`Cell`] so that a mutating traversal can redirect
/// edges while the store is only shared-borrowed. `None` is a null edge.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdPointer(Cell<Option<ObjectId>>);

impl IdPointer {
    /// Create a slot with the given target.
    pub fn new(target: Option<ObjectId>) -> Self {
        Self(Cell::new(target))
    }

    /// Create a slot pointing at `target`.
    pub fn to(target: ObjectId) -> Self {
        Self::new(Some(target))
    }

    /// Create an empty slot.
    pub fn null() -> Self {
        Self::default()
    }

    /// Current target.
    pub fn get(&self) -> Option<ObjectId> {
        self.0.get()
    }

    /// Redirect the slot.
    pub fn set(&self, target: Option<ObjectId>) {
        self.0.set(target);
    }

    /// Whether the slot is empty.
    pub fn is_null(&self) -> bool {
        self.0.get().is_none()
    }
}

impl From<ObjectId> for IdPointer {
    fn from(target: ObjectId) -> Self {
        Self::to(target)
    }
}

impl From<Option<ObjectId>> for IdPointer {
    fn from(target: Option<ObjectId>) -> Self {
        Self::new(target)
    }
}
