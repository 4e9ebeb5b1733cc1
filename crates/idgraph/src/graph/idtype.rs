//! Per-type descriptors and the builtin edge enumerators.
//!
//! Each [`ObjectType`] has one [`TypeInfo`]. Its `foreach_id` function reports
//! the type-specific pointer fields of an object, in field order, to the
//! [`LinkWalker`]; type-independent fields (library, override, properties,
//! animation) are handled by the walker itself.

use super::object::{LibraryObject, ObjectData};
use super::types::{ObjectType, TypeFilter};
use crate::walk::{LinkWalker, UsageFlags, WalkFlags};
use bitflags::bitflags;

/// Enumerates the type-specific edges of one object.
pub type ForeachIdFn = fn(&LibraryObject, &mut LinkWalker<'_, '_>);

bitflags! {
    /// Per-type behaviour flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TypeFlags: u8 {
        /// Objects of this type are roots and never reported as unused.
        const NEVER_UNUSED = 1 << 0;
        /// Objects of this type carry no animation data.
        const NO_ANIMDATA = 1 << 1;
    }
}

/// Descriptor of one object type.
#[derive(Debug, Clone)]
pub struct TypeInfo {
    /// Described type
    pub object_type: ObjectType,
    /// Human-readable type name
    pub name: &'static str,
    /// Behaviour flags
    pub flags: TypeFlags,
    /// Types objects of this type may point at
    pub dependencies: TypeFilter,
    /// Type-specific edge enumerator
    pub foreach_id: Option<ForeachIdFn>,
}

impl TypeInfo {
    /// Descriptor with no flags, no dependencies and no enumerator.
    pub fn new(object_type: ObjectType, name: &'static str) -> Self {
        Self {
            object_type,
            name,
            flags: TypeFlags::empty(),
            dependencies: TypeFilter::empty(),
            foreach_id: None,
        }
    }

    /// Whether objects of this type may carry animation data.
    pub fn has_animdata(&self) -> bool {
        !self.flags.contains(TypeFlags::NO_ANIMDATA)
    }

    fn with_flags(mut self, flags: TypeFlags) -> Self {
        self.flags = flags;
        self
    }

    fn with_dependencies(mut self, dependencies: TypeFilter) -> Self {
        self.dependencies = dependencies;
        self
    }

    fn with_foreach_id(mut self, foreach_id: ForeachIdFn) -> Self {
        self.foreach_id = Some(foreach_id);
        self
    }
}

/// Table of type descriptors, indexed by [`ObjectType`].
#[derive(Debug, Clone)]
pub struct TypeRegistry {
    infos: Vec<TypeInfo>,
}

impl TypeRegistry {
    /// Registry with the builtin descriptors of every type.
    pub fn builtin() -> Self {
        let infos = ObjectType::ALL.iter().map(|ty| builtin_info(*ty)).collect();
        Self { infos }
    }

    /// Replace the descriptor of `info.object_type`.
    pub fn register(&mut self, info: TypeInfo) {
        let index = info.object_type.index();
        self.infos[index] = info;
    }

    /// Descriptor of the given type.
    pub fn get(&self, object_type: ObjectType) -> &TypeInfo {
        &self.infos[object_type.index()]
    }

    /// Iterate over all descriptors in store order.
    pub fn iter(&self) -> impl Iterator<Item = &TypeInfo> {
        self.infos.iter()
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

fn builtin_info(object_type: ObjectType) -> TypeInfo {
    let info = TypeInfo::new(object_type, type_name(object_type));
    match object_type {
        ObjectType::Library => info
            .with_flags(TypeFlags::NEVER_UNUSED | TypeFlags::NO_ANIMDATA)
            .with_dependencies(TypeFilter::LIBRARY)
            .with_foreach_id(library_foreach_id),
        ObjectType::Scene => info
            .with_flags(TypeFlags::NEVER_UNUSED)
            .with_dependencies(
                TypeFilter::OBJECT
                    | TypeFilter::COLLECTION
                    | TypeFilter::WORLD
                    | TypeFilter::SCENE
                    | TypeFilter::NODE_TREE,
            )
            .with_foreach_id(scene_foreach_id),
        ObjectType::Collection => info
            .with_flags(TypeFlags::NO_ANIMDATA)
            .with_dependencies(TypeFilter::OBJECT | TypeFilter::COLLECTION)
            .with_foreach_id(collection_foreach_id),
        ObjectType::Object => info
            .with_dependencies(
                TypeFilter::MESH
                    | TypeFilter::CAMERA
                    | TypeFilter::OBJECT
                    | TypeFilter::MATERIAL
                    | TypeFilter::COLLECTION,
            )
            .with_foreach_id(object_foreach_id),
        ObjectType::Mesh => info
            .with_dependencies(TypeFilter::MATERIAL | TypeFilter::SHAPE_KEY | TypeFilter::MESH)
            .with_foreach_id(mesh_foreach_id),
        ObjectType::ShapeKey => info
            .with_dependencies(TypeFilter::MESH)
            .with_foreach_id(shape_key_foreach_id),
        ObjectType::Material => info
            .with_dependencies(TypeFilter::NODE_TREE | TypeFilter::TEXTURE)
            .with_foreach_id(material_foreach_id),
        // Node groups may reference anything
        ObjectType::NodeTree => info
            .with_dependencies(TypeFilter::ALL)
            .with_foreach_id(node_tree_foreach_id),
        ObjectType::Texture => info
            .with_dependencies(TypeFilter::IMAGE | TypeFilter::NODE_TREE)
            .with_foreach_id(texture_foreach_id),
        ObjectType::Image => info.with_flags(TypeFlags::NO_ANIMDATA),
        ObjectType::World => info
            .with_dependencies(TypeFilter::NODE_TREE)
            .with_foreach_id(world_foreach_id),
        ObjectType::Camera => info
            .with_dependencies(TypeFilter::OBJECT)
            .with_foreach_id(camera_foreach_id),
        ObjectType::Action => info.with_flags(TypeFlags::NO_ANIMDATA),
        ObjectType::Screen => info
            .with_flags(TypeFlags::NEVER_UNUSED | TypeFlags::NO_ANIMDATA)
            .with_foreach_id(screen_foreach_id),
    }
}

fn type_name(object_type: ObjectType) -> &'static str {
    match object_type {
        ObjectType::Library => "Library",
        ObjectType::Scene => "Scene",
        ObjectType::Collection => "Collection",
        ObjectType::Object => "Object",
        ObjectType::Mesh => "Mesh",
        ObjectType::ShapeKey => "ShapeKey",
        ObjectType::Material => "Material",
        ObjectType::NodeTree => "NodeTree",
        ObjectType::Texture => "Texture",
        ObjectType::Image => "Image",
        ObjectType::World => "World",
        ObjectType::Camera => "Camera",
        ObjectType::Action => "Action",
        ObjectType::Screen => "Screen",
    }
}

fn library_foreach_id(object: &LibraryObject, walker: &mut LinkWalker<'_, '_>) {
    if let ObjectData::Library(library) = &object.data {
        walker.process(&library.parent, UsageFlags::NEVER_SELF);
    }
}

fn scene_foreach_id(object: &LibraryObject, walker: &mut LinkWalker<'_, '_>) {
    let ObjectData::Scene(scene) = &object.data else {
        return;
    };
    walker.process(&scene.camera, UsageFlags::empty());
    walker.process(&scene.world, UsageFlags::USER);
    walker.process(&scene.background_set, UsageFlags::NEVER_SELF);
    walker.process_embedded(&scene.master_collection);
    walker.process_embedded(&scene.compositing_tree);
}

fn collection_foreach_id(object: &LibraryObject, walker: &mut LinkWalker<'_, '_>) {
    let ObjectData::Collection(collection) = &object.data else {
        return;
    };
    for member in &collection.objects {
        walker.process(member, UsageFlags::USER);
    }
    for child in &collection.children {
        walker.process(child, UsageFlags::USER);
    }
    for parent in &collection.parents {
        walker.process(parent, UsageFlags::LOOPBACK | UsageFlags::NEVER_SELF);
    }
}

fn object_foreach_id(object: &LibraryObject, walker: &mut LinkWalker<'_, '_>) {
    let ObjectData::Object(body) = &object.data else {
        return;
    };
    walker.process(&body.data, UsageFlags::USER);
    walker.process(&body.parent, UsageFlags::NEVER_SELF);
    for material in &body.materials {
        walker.process(material, UsageFlags::USER);
    }
    walker.process(&body.instance_collection, UsageFlags::USER);
    for target in &body.modifier_targets {
        walker.process(target, UsageFlags::empty());
    }
    if walker.flags().contains(WalkFlags::DO_DEPRECATED_POINTERS) {
        walker.process(&body.proxy_from, UsageFlags::empty());
    }
}

fn mesh_foreach_id(object: &LibraryObject, walker: &mut LinkWalker<'_, '_>) {
    let ObjectData::Mesh(mesh) = &object.data else {
        return;
    };
    for material in &mesh.materials {
        walker.process(material, UsageFlags::USER);
    }
    walker.process(&mesh.shape_key, UsageFlags::USER);
    walker.process(&mesh.texture_mesh, UsageFlags::NEVER_SELF);
}

fn shape_key_foreach_id(object: &LibraryObject, walker: &mut LinkWalker<'_, '_>) {
    if let ObjectData::ShapeKey(key) = &object.data {
        walker.process(&key.from, UsageFlags::LOOPBACK);
    }
}

fn material_foreach_id(object: &LibraryObject, walker: &mut LinkWalker<'_, '_>) {
    let ObjectData::Material(material) = &object.data else {
        return;
    };
    walker.process_embedded(&material.node_tree);
    for texture in &material.textures {
        walker.process(texture, UsageFlags::USER);
    }
}

fn node_tree_foreach_id(object: &LibraryObject, walker: &mut LinkWalker<'_, '_>) {
    if let ObjectData::NodeTree(tree) = &object.data {
        for node in &tree.nodes {
            walker.process(&node.id, UsageFlags::USER);
        }
    }
}

fn texture_foreach_id(object: &LibraryObject, walker: &mut LinkWalker<'_, '_>) {
    let ObjectData::Texture(texture) = &object.data else {
        return;
    };
    walker.process_embedded(&texture.node_tree);
    walker.process(&texture.image, UsageFlags::USER);
}

fn world_foreach_id(object: &LibraryObject, walker: &mut LinkWalker<'_, '_>) {
    if let ObjectData::World(world) = &object.data {
        walker.process_embedded(&world.node_tree);
    }
}

fn camera_foreach_id(object: &LibraryObject, walker: &mut LinkWalker<'_, '_>) {
    if let ObjectData::Camera(camera) = &object.data {
        walker.process(&camera.dof_object, UsageFlags::empty());
    }
}

fn screen_foreach_id(object: &LibraryObject, walker: &mut LinkWalker<'_, '_>) {
    let ObjectData::Screen(screen) = &object.data else {
        return;
    };
    if !walker.flags().contains(WalkFlags::INCLUDE_UI) {
        return;
    }
    // Editors only peek at data, they never own it.
    let previous = walker.override_usage(UsageFlags::DIRECT_WEAK_LINK, false);
    for space in &screen.spaces {
        walker.process(space, UsageFlags::empty());
    }
    walker.restore_usage(previous);
}
