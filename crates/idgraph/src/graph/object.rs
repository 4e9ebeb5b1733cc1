//! Library objects and their per-type payloads.

use super::property::PropertyGroup;
use super::types::{IdPointer, ObjectFlags, ObjectId, ObjectTags, ObjectType};
use serde::{Deserialize, Serialize};
use std::cell::Cell;

/// A library object: one typed node of the object graph.
///
/// Pointer-valued fields are [`IdPointer`] slots; everything the store must
/// keep consistent (identity, type, ownership, users) is reached through
/// accessors.
#[derive(Debug, Clone)]
pub struct LibraryObject {
    id: ObjectId,
    object_type: ObjectType,
    owner: Option<ObjectId>,
    flags: ObjectFlags,
    tags: Cell<ObjectTags>,
    users: Cell<u32>,
    /// Display name
    pub name: String,
    /// Library this object is linked from; local when null
    pub library: IdPointer,
    /// Library override record, if this object overrides a linked one
    pub override_library: Option<OverrideLibrary>,
    /// User-defined properties
    pub properties: PropertyGroup,
    /// Properties owned by the application
    pub system_properties: PropertyGroup,
    /// Animation data
    pub anim: Option<AnimData>,
    /// Transient pointers maintained while copying or evaluating
    pub runtime: RuntimeLinks,
    /// Type-specific payload
    pub data: ObjectData,
}

impl LibraryObject {
    pub(crate) fn new(id: ObjectId, name: String, data: ObjectData) -> Self {
        Self {
            id,
            object_type: data.object_type(),
            owner: None,
            flags: ObjectFlags::empty(),
            tags: Cell::new(ObjectTags::empty()),
            users: Cell::new(0),
            name,
            library: IdPointer::null(),
            override_library: None,
            properties: PropertyGroup::new(),
            system_properties: PropertyGroup::new(),
            anim: None,
            runtime: RuntimeLinks::default(),
            data,
        }
    }

    pub(crate) fn new_embedded(id: ObjectId, name: String, data: ObjectData, owner: ObjectId) -> Self {
        let mut object = Self::new(id, name, data);
        object.owner = Some(owner);
        object.flags |= ObjectFlags::EMBEDDED;
        object
    }

    /// Stable handle.
    pub fn id(&self) -> ObjectId {
        self.id
    }

    /// Object type.
    pub fn object_type(&self) -> ObjectType {
        self.object_type
    }

    /// Owner of an embedded object; `None` for top-level objects.
    pub fn owner(&self) -> Option<ObjectId> {
        self.owner
    }

    /// Persistent flags.
    pub fn flags(&self) -> ObjectFlags {
        self.flags
    }

    pub(crate) fn flags_mut(&mut self) -> &mut ObjectFlags {
        &mut self.flags
    }

    /// Status tags.
    pub fn tags(&self) -> ObjectTags {
        self.tags.get()
    }

    /// Set or clear status tags.
    pub fn set_tags(&self, tags: ObjectTags, value: bool) {
        let mut current = self.tags.get();
        current.set(tags, value);
        self.tags.set(current);
    }

    /// Current user count.
    pub fn users(&self) -> u32 {
        self.users.get()
    }

    pub(crate) fn set_users(&self, users: u32) {
        self.users.set(users);
    }

    /// Whether this object is embedded in an owner.
    pub fn is_embedded(&self) -> bool {
        self.flags.contains(ObjectFlags::EMBEDDED)
    }

    /// Whether this object is linked from a library.
    pub fn is_linked(&self) -> bool {
        !self.library.is_null()
    }

    /// Whether this object has a fake user.
    pub fn has_fake_user(&self) -> bool {
        self.flags.contains(ObjectFlags::FAKE_USER)
    }

    /// Whether this object is a real library override (it has a reference).
    pub fn is_override_real(&self) -> bool {
        self.override_library
            .as_ref()
            .is_some_and(|ov| !ov.reference.is_null())
    }

    /// Slot of the embedded node tree, for types that carry one.
    pub fn node_tree(&self) -> Option<&IdPointer> {
        match &self.data {
            ObjectData::Scene(scene) => Some(&scene.compositing_tree),
            ObjectData::Material(material) => Some(&material.node_tree),
            ObjectData::Texture(texture) => Some(&texture.node_tree),
            ObjectData::World(world) => Some(&world.node_tree),
            _ => None,
        }
    }
}

/// Library override record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OverrideLibrary {
    /// Linked object being overridden
    pub reference: IdPointer,
    /// Root of the override hierarchy this object belongs to
    pub hierarchy_root: IdPointer,
    /// Overridden properties, in stored order
    pub properties: Vec<OverrideProperty>,
}

/// One overridden property.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OverrideProperty {
    /// Path of the overridden property
    pub rna_path: String,
    /// Override operations, in stored order
    pub operations: Vec<OverrideOperation>,
}

/// One override operation on a collection item.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OverrideOperation {
    /// Item in the reference data
    pub subitem_reference: IdPointer,
    /// Matching item in the local override
    pub subitem_local: IdPointer,
}

/// Animation data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnimData {
    /// Active action
    pub action: IdPointer,
    /// Action stashed while tweaking a strip
    pub tmp_action: IdPointer,
    /// Actions of the NLA strips
    pub nla_actions: Vec<IdPointer>,
    /// Driver variable targets
    pub driver_targets: Vec<IdPointer>,
}

/// Runtime-only pointers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuntimeLinks {
    /// Copy created from this object during a duplication
    pub new_id: IdPointer,
    /// Original this object was evaluated from
    pub orig_id: IdPointer,
}

/// Type-specific payload of a library object.
#[derive(Debug, Clone, PartialEq)]
pub enum ObjectData {
    /// Library payload
    Library(LibraryData),
    /// Scene payload
    Scene(SceneData),
    /// Collection payload
    Collection(CollectionData),
    /// Object payload
    Object(ObjectBody),
    /// Mesh payload
    Mesh(MeshData),
    /// Shape key payload
    ShapeKey(ShapeKeyData),
    /// Material payload
    Material(MaterialData),
    /// Node tree payload
    NodeTree(NodeTreeData),
    /// Texture payload
    Texture(TextureData),
    /// Image payload
    Image(ImageData),
    /// World payload
    World(WorldData),
    /// Camera payload
    Camera(CameraData),
    /// Action payload
    Action(ActionData),
    /// Screen payload
    Screen(ScreenData),
}

impl ObjectData {
    /// Empty payload for the given type.
    pub fn default_for(object_type: ObjectType) -> Self {
        match object_type {
            ObjectType::Library => ObjectData::Library(LibraryData::default()),
            ObjectType::Scene => ObjectData::Scene(SceneData::default()),
            ObjectType::Collection => ObjectData::Collection(CollectionData::default()),
            ObjectType::Object => ObjectData::Object(ObjectBody::default()),
            ObjectType::Mesh => ObjectData::Mesh(MeshData::default()),
            ObjectType::ShapeKey => ObjectData::ShapeKey(ShapeKeyData::default()),
            ObjectType::Material => ObjectData::Material(MaterialData::default()),
            ObjectType::NodeTree => ObjectData::NodeTree(NodeTreeData::default()),
            ObjectType::Texture => ObjectData::Texture(TextureData::default()),
            ObjectType::Image => ObjectData::Image(ImageData::default()),
            ObjectType::World => ObjectData::World(WorldData::default()),
            ObjectType::Camera => ObjectData::Camera(CameraData::default()),
            ObjectType::Action => ObjectData::Action(ActionData::default()),
            ObjectType::Screen => ObjectData::Screen(ScreenData::default()),
        }
    }

    /// Type this payload belongs to.
    pub fn object_type(&self) -> ObjectType {
        match self {
            ObjectData::Library(_) => ObjectType::Library,
            ObjectData::Scene(_) => ObjectType::Scene,
            ObjectData::Collection(_) => ObjectType::Collection,
            ObjectData::Object(_) => ObjectType::Object,
            ObjectData::Mesh(_) => ObjectType::Mesh,
            ObjectData::ShapeKey(_) => ObjectType::ShapeKey,
            ObjectData::Material(_) => ObjectType::Material,
            ObjectData::NodeTree(_) => ObjectType::NodeTree,
            ObjectData::Texture(_) => ObjectType::Texture,
            ObjectData::Image(_) => ObjectType::Image,
            ObjectData::World(_) => ObjectType::World,
            ObjectData::Camera(_) => ObjectType::Camera,
            ObjectData::Action(_) => ObjectType::Action,
            ObjectData::Screen(_) => ObjectType::Screen,
        }
    }
}

/// Library payload.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LibraryData {
    /// Path of the library file
    pub filepath: String,
    /// Library that linked this one
    pub parent: IdPointer,
}

/// Scene payload.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SceneData {
    /// Active camera object
    pub camera: IdPointer,
    /// World settings
    pub world: IdPointer,
    /// Background scene
    pub background_set: IdPointer,
    /// Embedded root collection
    pub master_collection: IdPointer,
    /// Embedded compositing node tree
    pub compositing_tree: IdPointer,
}

/// Collection payload.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CollectionData {
    /// Member objects
    pub objects: Vec<IdPointer>,
    /// Child collections
    pub children: Vec<IdPointer>,
    /// Back-references to parent collections
    pub parents: Vec<IdPointer>,
}

/// Object payload.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjectBody {
    /// Object data (mesh, camera, ...)
    pub data: IdPointer,
    /// Parent object
    pub parent: IdPointer,
    /// Object-level material slots
    pub materials: Vec<IdPointer>,
    /// Collection instanced by this object
    pub instance_collection: IdPointer,
    /// Targets of modifiers and constraints
    pub modifier_targets: Vec<IdPointer>,
    /// Deprecated proxy source, only visited on request
    pub proxy_from: IdPointer,
}

/// Mesh payload.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshData {
    /// Material slots
    pub materials: Vec<IdPointer>,
    /// Shape key block
    pub shape_key: IdPointer,
    /// Mesh providing texture space
    pub texture_mesh: IdPointer,
}

/// Shape key payload.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShapeKeyData {
    /// Geometry that owns this key block
    pub from: IdPointer,
}

/// Material payload.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MaterialData {
    /// Embedded shading node tree
    pub node_tree: IdPointer,
    /// Legacy texture slots
    pub textures: Vec<IdPointer>,
}

/// A node holding an ID reference.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeRef {
    /// Node name
    pub name: String,
    /// Referenced object
    pub id: IdPointer,
}

/// Node tree payload.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeTreeData {
    /// Nodes referencing other objects
    pub nodes: Vec<NodeRef>,
}

/// Texture payload.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TextureData {
    /// Source image
    pub image: IdPointer,
    /// Embedded node tree
    pub node_tree: IdPointer,
}

/// Where an image's pixels come from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImageSource {
    /// Loaded from a file
    #[default]
    File,
    /// Generated procedurally
    Generated,
    /// Result shown by a viewer (render result, compositor output)
    Viewer,
}

/// Image payload.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImageData {
    /// Pixel source
    pub source: ImageSource,
    /// File path for file-backed images
    pub filepath: String,
}

/// World payload.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorldData {
    /// Embedded shading node tree
    pub node_tree: IdPointer,
}

/// Camera payload.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CameraData {
    /// Focus object for depth of field
    pub dof_object: IdPointer,
}

/// Action payload.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActionData {
    /// Frame range covered by the action
    pub frame_range: (f32, f32),
}

/// Screen payload.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScreenData {
    /// Objects shown in the screen's editors
    pub spaces: Vec<IdPointer>,
}
