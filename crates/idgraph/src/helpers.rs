//! Convenience helpers for common objects and relationships.
//!
//! These builders wire pointer slots and keep user counts consistent, so
//! that stores built with them are ready for analysis without a
//! [`recompute_user_counts`](crate::walk::usage::recompute_user_counts) pass.

use crate::error::{GraphError, Result};
use crate::graph::{
    AnimData, CollectionData, IdPointer, LibraryData, LibraryObject, NodeRef, NodeTreeData,
    ObjectData, ObjectId, ObjectStore, ObjectType,
};
use crate::walk::usage::update_link_user;
use crate::walk::{foreach_id, UsageFlags, WalkControl, WalkFlags};
use log::debug;

fn mismatch(expected: ObjectType, object: &LibraryObject) -> GraphError {
    GraphError::DataTypeMismatch {
        expected,
        actual: object.object_type(),
    }
}

/// Add a library object for an external file.
///
/// The library gets an extra user standing for the loaded file, so it is
/// never reported unused while the store holds it.
pub fn add_library(store: &mut ObjectStore, name: &str, filepath: &str) -> Result<ObjectId> {
    let library = store.add_object_with_data(
        name,
        ObjectData::Library(LibraryData {
            filepath: filepath.to_string(),
            parent: IdPointer::null(),
        }),
    );
    store.ensure_real_user(library)?;
    Ok(library)
}

/// Add a scene together with its embedded master collection.
///
/// The scene gets an extra user standing for the window showing it.
///
/// # Returns
///
/// The ID of the created scene.
pub fn add_scene(store: &mut ObjectStore, name: &str) -> Result<ObjectId> {
    let scene = store.add_object(ObjectType::Scene, name);
    store.ensure_real_user(scene)?;
    let master = store.add_embedded(
        scene,
        format!("{name} Master Collection"),
        ObjectData::Collection(CollectionData::default()),
    )?;

    let scene_object = store.get_mut(scene)?;
    let ObjectData::Scene(data) = &scene_object.data else {
        return Err(mismatch(ObjectType::Scene, scene_object));
    };
    data.master_collection.set(Some(master));
    Ok(scene)
}

/// Embedded master collection of a scene.
///
/// # Errors
///
/// Returns [`GraphError::InvalidOperation`] if the scene has none.
pub fn master_collection(store: &ObjectStore, scene: ObjectId) -> Result<ObjectId> {
    let scene_object = store.get(scene)?;
    let ObjectData::Scene(data) = &scene_object.data else {
        return Err(mismatch(ObjectType::Scene, scene_object));
    };
    data.master_collection
        .get()
        .ok_or_else(|| GraphError::invalid(format!("Scene {scene} has no master collection")))
}

/// Add a collection.
pub fn add_collection(store: &mut ObjectStore, name: &str) -> ObjectId {
    store.add_object(ObjectType::Collection, name)
}

/// Add an object to a collection (which may be a scene's master collection).
pub fn link_object(store: &mut ObjectStore, collection: ObjectId, object: ObjectId) -> Result<()> {
    store.get(object)?;
    let holder = store.get_mut(collection)?;
    let ObjectData::Collection(data) = &mut holder.data else {
        return Err(mismatch(ObjectType::Collection, holder));
    };
    data.objects.push(IdPointer::to(object));
    store.add_user(object)
}

/// Make `child` a child collection of `parent`.
///
/// The child keeps a loop-back pointer to its parent.
pub fn link_collection(store: &mut ObjectStore, parent: ObjectId, child: ObjectId) -> Result<()> {
    if parent == child {
        return Err(GraphError::invalid(format!(
            "Collection {child} cannot be its own child"
        )));
    }
    let parent_object = store.get(parent)?;
    if parent_object.object_type() != ObjectType::Collection {
        return Err(mismatch(ObjectType::Collection, parent_object));
    }

    let child_object = store.get_mut(child)?;
    let ObjectData::Collection(child_data) = &mut child_object.data else {
        return Err(mismatch(ObjectType::Collection, child_object));
    };
    child_data.parents.push(IdPointer::to(parent));

    let parent_object = store.get_mut(parent)?;
    let ObjectData::Collection(parent_data) = &mut parent_object.data else {
        return Err(mismatch(ObjectType::Collection, parent_object));
    };
    parent_data.children.push(IdPointer::to(child));
    store.add_user(child)
}

/// Add a mesh and an object using it.
///
/// # Returns
///
/// The IDs of the created object and mesh, in that order.
pub fn add_mesh_object(store: &mut ObjectStore, name: &str) -> Result<(ObjectId, ObjectId)> {
    let mesh = store.add_object(ObjectType::Mesh, name);
    let object = store.add_object(ObjectType::Object, name);
    set_object_data(store, object, Some(mesh))?;
    Ok((object, mesh))
}

/// Set (or clear) the data of an object, moving the user.
pub fn set_object_data(
    store: &mut ObjectStore,
    object: ObjectId,
    data: Option<ObjectId>,
) -> Result<()> {
    if let Some(data) = data {
        store.get(data)?;
    }
    let holder = store.get_mut(object)?;
    let ObjectData::Object(body) = &holder.data else {
        return Err(mismatch(ObjectType::Object, holder));
    };
    let old = body.data.get();
    body.data.set(data);
    update_link_user(store, data, old, UsageFlags::USER)
}

/// Set (or clear) the parent of an object. Parenting holds no user.
pub fn set_parent(store: &mut ObjectStore, child: ObjectId, parent: Option<ObjectId>) -> Result<()> {
    if parent == Some(child) {
        return Err(GraphError::invalid(format!("Object {child} cannot parent itself")));
    }
    if let Some(parent) = parent {
        store.get(parent)?;
    }
    let holder = store.get_mut(child)?;
    let ObjectData::Object(body) = &holder.data else {
        return Err(mismatch(ObjectType::Object, holder));
    };
    body.parent.set(parent);
    Ok(())
}

/// Add a material with an embedded shading node tree.
pub fn add_material(store: &mut ObjectStore, name: &str) -> Result<ObjectId> {
    let material = store.add_object(ObjectType::Material, name);
    let tree = store.add_embedded(
        material,
        format!("{name} Shader Nodetree"),
        ObjectData::NodeTree(NodeTreeData::default()),
    )?;
    if let Some(slot) = store.get_mut(material)?.node_tree() {
        slot.set(Some(tree));
    }
    Ok(material)
}

/// Embedded node tree of a material, world, texture or scene.
///
/// # Errors
///
/// Returns [`GraphError::InvalidOperation`] if the object has none.
pub fn embedded_node_tree(store: &ObjectStore, holder: ObjectId) -> Result<ObjectId> {
    store
        .get(holder)?
        .node_tree()
        .and_then(IdPointer::get)
        .ok_or_else(|| GraphError::invalid(format!("Object {holder} has no node tree")))
}

/// Append a material slot to a mesh or an object.
pub fn assign_material(store: &mut ObjectStore, holder: ObjectId, material: ObjectId) -> Result<()> {
    store.get(material)?;
    let holder_object = store.get_mut(holder)?;
    let actual = holder_object.object_type();
    match &mut holder_object.data {
        ObjectData::Mesh(mesh) => mesh.materials.push(IdPointer::to(material)),
        ObjectData::Object(body) => body.materials.push(IdPointer::to(material)),
        _ => {
            return Err(GraphError::DataTypeMismatch {
                expected: ObjectType::Mesh,
                actual,
            })
        }
    }
    store.add_user(material)
}

/// Add a shape key block to a mesh.
///
/// The key points back at its mesh with a loop-back pointer.
pub fn add_shape_key(store: &mut ObjectStore, mesh: ObjectId) -> Result<ObjectId> {
    let mesh_object = store.get(mesh)?;
    if mesh_object.object_type() != ObjectType::Mesh {
        return Err(mismatch(ObjectType::Mesh, mesh_object));
    }
    let name = format!("{} Key", mesh_object.name);

    let key = store.add_object(ObjectType::ShapeKey, name);
    if let ObjectData::ShapeKey(data) = &store.get_mut(key)?.data {
        data.from.set(Some(mesh));
    }
    if let ObjectData::Mesh(data) = &store.get_mut(mesh)?.data {
        data.shape_key.set(Some(key));
    }
    store.add_user(key)?;
    Ok(key)
}

/// Add a node referencing `target` to a node tree (standalone or embedded).
pub fn add_node_reference(
    store: &mut ObjectStore,
    tree: ObjectId,
    node_name: &str,
    target: ObjectId,
) -> Result<()> {
    store.get(target)?;
    let holder = store.get_mut(tree)?;
    let ObjectData::NodeTree(data) = &mut holder.data else {
        return Err(mismatch(ObjectType::NodeTree, holder));
    };
    data.nodes.push(NodeRef {
        name: node_name.to_string(),
        id: IdPointer::to(target),
    });
    store.add_user(target)
}

/// Store a reference to `target` in a custom property of `object`.
pub fn set_custom_property(
    store: &mut ObjectStore,
    object: ObjectId,
    key: &str,
    target: ObjectId,
) -> Result<()> {
    store.get(target)?;
    let holder = store.get_mut(object)?;
    let old = holder.properties.get_id(key);
    holder.properties.insert(key, target);
    update_link_user(store, Some(target), old, UsageFlags::USER)
}

/// Set the active action of an object.
pub fn set_action(store: &mut ObjectStore, object: ObjectId, action: ObjectId) -> Result<()> {
    let action_object = store.get(action)?;
    if action_object.object_type() != ObjectType::Action {
        return Err(mismatch(ObjectType::Action, action_object));
    }
    let holder = store.get_mut(object)?;
    let anim = holder.anim.get_or_insert_with(AnimData::default);
    let old = anim.action.get();
    anim.action.set(Some(action));
    update_link_user(store, Some(action), old, UsageFlags::USER)
}

/// Redirect every pointer to `old` onto `new` (or clear it).
///
/// Embedded pointers are left alone, as are pointers that would make an
/// object point at itself where that is forbidden. User counts follow the
/// moved edges.
///
/// # Returns
///
/// The number of redirected pointers.
pub fn remap_references(
    store: &mut ObjectStore,
    old: ObjectId,
    new: Option<ObjectId>,
) -> Result<usize> {
    if new == Some(old) {
        return Ok(0);
    }
    if let Some(new) = new {
        store.get(new)?;
    }

    let store = &*store;
    let mut remapped = Vec::new();
    for object in store.iter() {
        foreach_id(store, object.id(), WalkFlags::empty(), |link| {
            if link.target() != Some(old) || link.usage.contains(UsageFlags::EMBEDDED) {
                return WalkControl::Continue;
            }
            if new == Some(link.self_id) && link.usage.contains(UsageFlags::NEVER_SELF) {
                return WalkControl::Continue;
            }
            link.pointer.set(new);
            remapped.push(link.usage);
            WalkControl::Continue
        });
    }

    for usage in &remapped {
        update_link_user(store, new, Some(old), *usage)?;
    }
    debug!("Remapped {} pointers from {old} to {new:?}", remapped.len());
    Ok(remapped.len())
}
