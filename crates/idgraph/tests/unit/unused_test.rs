//! Unit tests for unused-object analysis: direct and recursive passes,
//! dependency loops, exceptions, scopes and amounts.

use idgraph::graph::{ImageData, ImageSource, ObjectTags, TextureData};
use idgraph::unused::{clear_indirectly_used, unused_linked_data};
use idgraph::{
    helpers, IdPointer, ObjectData, ObjectId, ObjectStore, ObjectType, Relations, UnusedQuery,
};
use std::collections::HashSet;

/// An object with a mesh using a material: object -> mesh -> material.
fn add_chain(store: &mut ObjectStore) -> (ObjectId, ObjectId, ObjectId) {
    let (object, mesh) = helpers::add_mesh_object(store, "Cube").unwrap();
    let material = store.add_object(ObjectType::Material, "Material");
    helpers::assign_material(store, mesh, material).unwrap();
    (object, mesh, material)
}

fn add_scene_root(store: &mut ObjectStore) -> ObjectId {
    let scene = helpers::add_scene(store, "Scene").unwrap();
    helpers::master_collection(store, scene).unwrap()
}

#[test]
fn test_direct_pass_only_tags_zero_users() {
    let mut store = ObjectStore::new();
    let (object, mesh, material) = add_chain(&mut store);

    let unused = store.unused().execute();
    assert!(unused.contains(object));
    assert!(!unused.contains(mesh));
    assert!(!unused.contains(material));
    assert_eq!(unused.len(), 1);
}

#[test]
fn test_recursive_pass_follows_unused_users() {
    let mut store = ObjectStore::new();
    let (object, mesh, material) = add_chain(&mut store);

    let unused = store.unused().recursive(true).execute();
    let ids: Vec<_> = unused.iter().collect();
    assert_eq!(ids.len(), 3);
    assert!(unused.contains(object) && unused.contains(mesh) && unused.contains(material));
}

#[test]
fn test_anchored_chain_is_used() {
    let mut store = ObjectStore::new();
    let master = add_scene_root(&mut store);
    let (object, _, _) = add_chain(&mut store);
    helpers::link_object(&mut store, master, object).unwrap();

    let unused = store.unused().recursive(true).execute();
    assert!(unused.is_empty());
}

#[test]
fn test_loopback_users_do_not_keep_alive() {
    let mut store = ObjectStore::new();
    let mesh = store.add_object(ObjectType::Mesh, "Orphan");
    let key = helpers::add_shape_key(&mut store, mesh).unwrap();

    let unused = store.unused().recursive(true).execute();
    assert!(unused.contains(mesh));
    assert!(unused.contains(key));
}

fn add_collection_cycle(store: &mut ObjectStore) -> [ObjectId; 3] {
    let a = helpers::add_collection(store, "A");
    let b = helpers::add_collection(store, "B");
    let c = helpers::add_collection(store, "C");
    helpers::link_collection(store, a, b).unwrap();
    helpers::link_collection(store, b, c).unwrap();
    helpers::link_collection(store, c, a).unwrap();
    [a, b, c]
}

#[test]
fn test_isolated_cycle_is_unused() {
    let mut store = ObjectStore::new();
    let cycle = add_collection_cycle(&mut store);

    // Every member has one user, so only recursion can find the island
    assert!(store.unused().execute().is_empty());

    let unused = store.unused().recursive(true).execute();
    for id in cycle {
        assert!(unused.contains(id));
    }
    assert_eq!(unused.counts().local.get(ObjectType::Collection), 3);
}

#[test]
fn test_anchored_cycle_is_used() {
    let mut store = ObjectStore::new();
    let master = add_scene_root(&mut store);
    let [a, _, _] = add_collection_cycle(&mut store);
    helpers::link_collection(&mut store, master, a).unwrap();

    let unused = store.unused().recursive(true).execute();
    assert!(unused.is_empty());
}

#[test]
fn test_cycle_members_carry_their_dependencies() {
    let mut store = ObjectStore::new();
    let [_, b, _] = add_collection_cycle(&mut store);
    let (object, mesh, material) = add_chain(&mut store);
    helpers::link_object(&mut store, b, object).unwrap();

    let unused = store.unused().recursive(true).execute();
    assert_eq!(unused.len(), 6);
    assert!(unused.contains(object) && unused.contains(mesh) && unused.contains(material));
}

#[test]
fn test_fake_user_keeps_dependencies() {
    let mut store = ObjectStore::new();
    let (object, mesh, material) = add_chain(&mut store);
    store.set_fake_user(object, true).unwrap();

    let unused = store.unused().recursive(true).execute();
    assert!(!unused.contains(object));
    assert!(!unused.contains(mesh));
    assert!(!unused.contains(material));
}

#[test]
fn test_exception_predicate_stops_recursion() {
    let mut store = ObjectStore::new();
    let (object, mesh, material) = add_chain(&mut store);

    let unused = store
        .unused()
        .recursive(true)
        .exception(move |candidate| candidate.id() == mesh)
        .execute();
    assert!(unused.contains(object));
    assert!(!unused.contains(mesh));
    assert!(!unused.contains(material));
}

#[test]
fn test_filter_rejected_objects_count_as_used() {
    let mut store = ObjectStore::new();
    let (object, mesh, material) = add_chain(&mut store);

    let unused = store
        .unused()
        .recursive(true)
        .filter(|candidate| candidate.object_type() != ObjectType::Mesh)
        .execute();
    assert!(unused.contains(object));
    assert!(!unused.contains(mesh));
    assert!(!unused.contains(material));
}

#[test]
fn test_viewer_images_are_never_unused_through_users() {
    let mut store = ObjectStore::new();
    let add_texture_with_image = |store: &mut ObjectStore, source: ImageSource| {
        let image = store.add_object_with_data(
            "Image",
            ObjectData::Image(ImageData {
                source,
                filepath: String::new(),
            }),
        );
        store.add_object_with_data(
            "Texture",
            ObjectData::Texture(TextureData {
                image: IdPointer::to(image),
                node_tree: IdPointer::null(),
            }),
        );
        store.add_user(image).unwrap();
        image
    };
    let viewer = add_texture_with_image(&mut store, ImageSource::Viewer);
    let file = add_texture_with_image(&mut store, ImageSource::File);

    let unused = store.unused().recursive(true).execute();
    assert!(!unused.contains(viewer));
    assert!(unused.contains(file));
    assert_eq!(unused.counts().total.get(ObjectType::Texture), 2);
}

fn add_linked(store: &mut ObjectStore, library: ObjectId, ty: ObjectType, name: &str) -> ObjectId {
    let id = store.add_object(ty, name);
    store.link_from_library(id, library).unwrap();
    id
}

#[test]
fn test_linked_object_used_without_users() {
    let mut store = ObjectStore::new();
    let library = helpers::add_library(&mut store, "rig", "//rig.blend").unwrap();
    let master = add_scene_root(&mut store);
    let armature = add_linked(&mut store, library, ObjectType::Object, "Armature");
    let (body, _) = helpers::add_mesh_object(&mut store, "Body").unwrap();
    helpers::link_object(&mut store, master, body).unwrap();
    helpers::set_parent(&mut store, body, Some(armature)).unwrap();

    assert_eq!(store.get(armature).unwrap().users(), 0);
    let unused = store.unused().recursive(true).execute();
    assert!(!unused.contains(armature));
    assert!(!unused.exception_passes_exhausted());
}

/// Linked objects parented in a chain from `anchor`, inserted so that each
/// fixed-point pass can only clear one of them.
fn add_parent_chain(store: &mut ObjectStore, length: usize) -> Vec<ObjectId> {
    let library = helpers::add_library(store, "chain", "//chain.blend").unwrap();
    let master = add_scene_root(store);

    let mut chain: Vec<ObjectId> = (0..length)
        .rev()
        .map(|i| add_linked(store, library, ObjectType::Object, &format!("Link {i}")))
        .collect();
    chain.reverse();
    for pair in chain.windows(2) {
        helpers::set_parent(store, pair[0], Some(pair[1])).unwrap();
    }

    let (anchor, _) = helpers::add_mesh_object(store, "Anchor").unwrap();
    helpers::link_object(store, master, anchor).unwrap();
    helpers::set_parent(store, anchor, Some(chain[0])).unwrap();
    chain
}

#[test]
fn test_exception_passes_are_bounded() {
    let mut store = ObjectStore::new();
    let chain = add_parent_chain(&mut store, 15);

    let unused = store.unused().execute();
    assert!(unused.exception_passes_exhausted());
    assert!(!unused.contains(chain[0]));
    assert!(!unused.contains(chain[9]));
    assert!(unused.contains(chain[10]));
    assert!(unused.contains(chain[14]));
}

#[test]
fn test_exception_passes_converge_with_higher_bound() {
    let mut store = ObjectStore::new();
    let chain = add_parent_chain(&mut store, 15);

    let unused = store.unused().max_exception_passes(32).execute();
    assert!(!unused.exception_passes_exhausted());
    for id in chain {
        assert!(!unused.contains(id));
    }
}

#[test]
fn test_scopes() {
    let mut store = ObjectStore::new();
    let library = helpers::add_library(&mut store, "lib", "//lib.blend").unwrap();
    let local = store.add_object(ObjectType::Material, "Local");
    let linked = add_linked(&mut store, library, ObjectType::Material, "Linked");

    let both = store.unused().execute();
    assert!(both.contains(local) && both.contains(linked));
    assert_eq!(both.counts().local.overall(), 1);
    assert_eq!(both.counts().linked.overall(), 1);

    let local_only = store.unused().linked(false).execute();
    assert!(local_only.contains(local) && !local_only.contains(linked));

    let linked_only = store.unused().local(false).execute();
    assert!(!linked_only.contains(local) && linked_only.contains(linked));
}

#[test]
fn test_amounts() {
    let mut store = ObjectStore::new();
    let library = helpers::add_library(&mut store, "lib", "//lib.blend").unwrap();
    store.add_object(ObjectType::Material, "Local");
    add_linked(&mut store, library, ObjectType::Material, "Linked");

    let both = store.unused().amounts();
    assert_eq!(both.total.overall(), 2);
    assert_eq!(both.local.overall(), 1);
    assert_eq!(both.linked.overall(), 1);

    let local_only = store.unused().linked(false).amounts();
    assert_eq!(local_only.total.overall(), 1);
    assert_eq!(local_only.local.overall(), 1);
    assert_eq!(local_only.linked.overall(), 1);

    let linked_only = store.unused().local(false).amounts();
    assert_eq!(linked_only.total.overall(), 1);
    assert_eq!(linked_only.local.overall(), 1);
    assert_eq!(linked_only.linked.overall(), 1);

    let neither = store.unused().local(false).linked(false).amounts();
    assert_eq!(neither.total.overall(), 0);
    assert_eq!(neither.local.overall(), 1);
    assert_eq!(neither.linked.overall(), 1);
}

#[test]
fn test_execute_with_shared_relations() {
    let mut store = ObjectStore::new();
    let cycle = add_collection_cycle(&mut store);
    let relations = Relations::build(&store, false);

    let query = UnusedQuery::new(&store).recursive(true);
    let first = query.execute_with(&relations);
    let second = query.execute_with(&relations);
    assert_eq!(first.iter().collect::<Vec<_>>(), second.iter().collect::<Vec<_>>());
    assert_eq!(first.len(), cycle.len());
}

#[test]
fn test_deep_user_chain() {
    let mut store = ObjectStore::new();
    let depth = 20_000;
    let ids: Vec<_> = (0..depth)
        .map(|i| store.add_object(ObjectType::Object, format!("Node {i}")))
        .collect();
    for pair in ids.windows(2) {
        helpers::set_custom_property(&mut store, pair[1], "next", pair[0]).unwrap();
    }

    let unused = store.unused().recursive(true).execute();
    assert_eq!(unused.len(), depth);
}

#[test]
fn test_unused_linked_data() {
    let mut store = ObjectStore::new();
    let library = helpers::add_library(&mut store, "lib", "//lib.blend").unwrap();
    let used = add_linked(&mut store, library, ObjectType::Material, "Used");
    let orphan = add_linked(&mut store, library, ObjectType::Material, "Orphan");
    let orphan_image = add_linked(&mut store, library, ObjectType::Image, "Orphan Image");
    for id in [used, orphan, orphan_image] {
        store.get(id).unwrap().set_tags(ObjectTags::INDIRECT, true);
    }

    let (object, _) = helpers::add_mesh_object(&mut store, "Cube").unwrap();
    helpers::assign_material(&mut store, object, used).unwrap();
    helpers::set_custom_property(&mut store, orphan, "image", orphan_image).unwrap();

    let tagged = unused_linked_data(&store);
    assert_eq!(tagged, HashSet::from([orphan, orphan_image]));
}

#[test]
fn test_clear_indirectly_used() {
    let mut store = ObjectStore::new();
    let library = helpers::add_library(&mut store, "lib", "//lib.blend").unwrap();
    let (linked_object, mesh) = helpers::add_mesh_object(&mut store, "Linked").unwrap();
    store.link_from_library(linked_object, library).unwrap();
    let material = store.add_object(ObjectType::Material, "Material");
    helpers::assign_material(&mut store, mesh, material).unwrap();

    let mut tagged = HashSet::from([mesh, material]);
    clear_indirectly_used(&store, &mut tagged);
    // The mesh is used by a linked object; the material only by the (local) mesh
    assert_eq!(tagged, HashSet::from([material]));
}
