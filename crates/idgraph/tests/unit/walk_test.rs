//! Unit tests for the traversal engine: edge order, usage flags, embedded
//! objects, recursion and stop signals.

use idgraph::graph::{
    AnimData, ImageSource, ObjectBody, ObjectTags, OverrideLibrary, ScreenData,
};
use idgraph::walk::foreach_subdata;
use idgraph::{
    foreach_id, helpers, IdPointer, ObjectData, ObjectId, ObjectStore, ObjectType, UsageFlags,
    Walk, WalkControl, WalkFlags,
};
use std::collections::HashSet;

fn collect_edges(
    store: &ObjectStore,
    id: ObjectId,
    flags: WalkFlags,
) -> Vec<(Option<ObjectId>, UsageFlags)> {
    let mut edges = Vec::new();
    foreach_id(store, id, flags, |link| {
        edges.push((link.target(), link.usage));
        WalkControl::Continue
    });
    edges
}

struct Rig {
    object: ObjectId,
    mesh: ObjectId,
    parent: ObjectId,
    material: ObjectId,
    collection: ObjectId,
    target: ObjectId,
    proxy: ObjectId,
    action: ObjectId,
    referenced: ObjectId,
}

fn build_rig(store: &mut ObjectStore) -> Rig {
    let mesh = store.add_object(ObjectType::Mesh, "Mesh");
    let parent = store.add_object(ObjectType::Object, "Parent");
    let material = store.add_object(ObjectType::Material, "Material");
    let collection = store.add_object(ObjectType::Collection, "Instanced");
    let target = store.add_object(ObjectType::Object, "Target");
    let proxy = store.add_object(ObjectType::Object, "Proxy");
    let action = store.add_object(ObjectType::Action, "Action");
    let referenced = store.add_object(ObjectType::Image, "Referenced");

    let body = ObjectBody {
        data: IdPointer::to(mesh),
        parent: IdPointer::to(parent),
        materials: vec![IdPointer::to(material)],
        instance_collection: IdPointer::to(collection),
        modifier_targets: vec![IdPointer::to(target)],
        proxy_from: IdPointer::to(proxy),
    };
    let object = store.add_object_with_data("Rig", ObjectData::Object(body));

    let rig = store.get_mut(object).unwrap();
    rig.properties.insert("reference", referenced);
    rig.anim = Some(AnimData {
        action: IdPointer::to(action),
        ..AnimData::default()
    });

    Rig {
        object,
        mesh,
        parent,
        material,
        collection,
        target,
        proxy,
        action,
        referenced,
    }
}

#[test]
fn test_object_edge_order() {
    let mut store = ObjectStore::new();
    let rig = build_rig(&mut store);

    let edges = collect_edges(&store, rig.object, WalkFlags::READONLY);
    assert_eq!(
        edges,
        vec![
            (
                Some(rig.referenced),
                UsageFlags::USER | UsageFlags::OVERRIDE_LIBRARY_NOT_OVERRIDABLE
            ),
            (Some(rig.action), UsageFlags::USER),
            (None, UsageFlags::USER),
            (Some(rig.mesh), UsageFlags::USER),
            (Some(rig.parent), UsageFlags::NEVER_SELF),
            (Some(rig.material), UsageFlags::USER),
            (Some(rig.collection), UsageFlags::USER),
            (Some(rig.target), UsageFlags::empty()),
        ]
    );
}

#[test]
fn test_optional_pointer_groups() {
    let mut store = ObjectStore::new();
    let rig = build_rig(&mut store);

    let edges = collect_edges(
        &store,
        rig.object,
        WalkFlags::READONLY | WalkFlags::DO_DEPRECATED_POINTERS | WalkFlags::DO_LIBRARY_POINTER,
    );
    assert_eq!(
        edges.first(),
        Some(&(None, UsageFlags::LIBRARY_POINTER | UsageFlags::NEVER_SELF))
    );
    assert_eq!(edges.last(), Some(&(Some(rig.proxy), UsageFlags::empty())));
    assert_eq!(edges.len(), 10);
}

#[test]
fn test_animation_skipped_on_types_without_animdata() {
    let mut store = ObjectStore::new();
    let image = store.add_object(ObjectType::Image, "Image");
    let camera = store.add_object(ObjectType::Camera, "Camera");
    let action = store.add_object(ObjectType::Action, "Action");
    for holder in [image, camera] {
        store.get_mut(holder).unwrap().anim = Some(AnimData {
            action: IdPointer::new(Some(action)),
            ..AnimData::default()
        });
    }

    assert!(collect_edges(&store, image, WalkFlags::READONLY).is_empty());
    let camera_edges = collect_edges(&store, camera, WalkFlags::READONLY);
    assert!(camera_edges.iter().any(|(target, _)| *target == Some(action)));
}

#[test]
fn test_runtime_pointers_are_internal() {
    let mut store = ObjectStore::new();
    let original = store.add_object(ObjectType::Camera, "Original");
    let copy = store.add_object(ObjectType::Camera, "Copy");
    store.get(copy).unwrap().runtime.orig_id.set(Some(original));

    let edges = collect_edges(
        &store,
        copy,
        WalkFlags::READONLY | WalkFlags::DO_INTERNAL_RUNTIME_POINTERS,
    );
    let internal = UsageFlags::INTERNAL | UsageFlags::OVERRIDE_LIBRARY_NOT_OVERRIDABLE;
    assert_eq!(edges[0], (None, internal));
    assert_eq!(edges[1], (Some(original), internal));
}

#[test]
fn test_override_edges() {
    let mut store = ObjectStore::new();
    let reference = store.add_object(ObjectType::Object, "Linked");
    let root = store.add_object(ObjectType::Object, "Root");
    let local = store.add_object(ObjectType::Object, "Override");
    store.get_mut(local).unwrap().override_library = Some(OverrideLibrary {
        reference: IdPointer::to(reference),
        hierarchy_root: IdPointer::to(root),
        properties: Vec::new(),
    });

    let edges = collect_edges(&store, local, WalkFlags::READONLY);
    assert_eq!(
        edges[0],
        (
            Some(reference),
            UsageFlags::USER
                | UsageFlags::OVERRIDE_LIBRARY_REFERENCE
                | UsageFlags::OVERRIDE_LIBRARY_NOT_OVERRIDABLE
        )
    );
    assert_eq!(
        edges[1],
        (
            Some(root),
            UsageFlags::LOOPBACK | UsageFlags::OVERRIDE_LIBRARY_NOT_OVERRIDABLE
        )
    );
}

#[test]
fn test_linked_object_edges_are_indirect() {
    let mut store = ObjectStore::new();
    let library = helpers::add_library(&mut store, "assets", "//assets.blend").unwrap();
    let (object, mesh) = helpers::add_mesh_object(&mut store, "Cube").unwrap();
    store.link_from_library(object, library).unwrap();

    let edges = collect_edges(&store, object, WalkFlags::READONLY);
    assert!(edges.contains(&(Some(mesh), UsageFlags::USER | UsageFlags::INDIRECT_USAGE)));
}

#[test]
fn test_no_user_refcount_clears_user_flags() {
    let mut store = ObjectStore::new();
    let (object, mesh) = helpers::add_mesh_object(&mut store, "Cube").unwrap();
    store
        .get(object)
        .unwrap()
        .set_tags(ObjectTags::NO_USER_REFCOUNT, true);

    let edges = collect_edges(&store, object, WalkFlags::READONLY);
    assert!(edges.contains(&(Some(mesh), UsageFlags::empty())));
}

#[test]
fn test_stop_iteration_short_circuits() {
    let mut store = ObjectStore::new();
    let rig = build_rig(&mut store);

    let mut visits = 0;
    let completed = foreach_id(&store, rig.object, WalkFlags::READONLY, |_| {
        visits += 1;
        WalkControl::StopIteration
    });

    assert!(!completed);
    assert_eq!(visits, 1);
}

#[test]
fn test_stop_iteration_inside_embedded_object() {
    let mut store = ObjectStore::new();
    let scene = helpers::add_scene(&mut store, "Scene").unwrap();
    let master = helpers::master_collection(&store, scene).unwrap();
    let (object, _) = helpers::add_mesh_object(&mut store, "Cube").unwrap();
    helpers::link_object(&mut store, master, object).unwrap();

    let mut after_stop = 0;
    let mut stopped = false;
    let completed = foreach_id(&store, scene, WalkFlags::READONLY, |link| {
        if stopped {
            after_stop += 1;
        }
        if link.self_id == master {
            stopped = true;
            return WalkControl::StopIteration;
        }
        WalkControl::Continue
    });

    assert!(!completed);
    assert_eq!(after_stop, 0);
}

#[test]
fn test_stop_iteration_drops_pending_recursion() {
    let mut store = ObjectStore::new();
    let scene = helpers::add_scene(&mut store, "Scene").unwrap();
    let master = helpers::master_collection(&store, scene).unwrap();
    for name in ["Cube", "Sphere"] {
        let (object, _) = helpers::add_mesh_object(&mut store, name).unwrap();
        helpers::link_object(&mut store, master, object).unwrap();
    }

    let mut non_null = 0;
    let mut after_stop = 0;
    let completed = foreach_id(&store, scene, WalkFlags::RECURSE, |link| {
        if non_null >= 2 {
            after_stop += 1;
        }
        if link.target().is_none() {
            return WalkControl::Continue;
        }
        non_null += 1;
        if non_null == 2 {
            // Inside the master collection, with the first object queued
            return WalkControl::StopIteration;
        }
        WalkControl::Continue
    });

    assert!(!completed);
    assert_eq!(non_null, 2);
    assert_eq!(after_stop, 0);
}

#[test]
fn test_embedded_objects_are_walked_inline() {
    let mut store = ObjectStore::new();
    let scene = helpers::add_scene(&mut store, "Scene").unwrap();
    let master = helpers::master_collection(&store, scene).unwrap();
    let (object, _) = helpers::add_mesh_object(&mut store, "Cube").unwrap();
    helpers::link_object(&mut store, master, object).unwrap();

    let mut links = Vec::new();
    foreach_id(&store, scene, WalkFlags::READONLY, |link| {
        links.push((link.owner, link.self_id, link.target(), link.usage));
        WalkControl::Continue
    });

    assert!(links.contains(&(Some(scene), scene, Some(master), UsageFlags::EMBEDDED)));
    assert!(links.contains(&(Some(scene), master, Some(object), UsageFlags::USER)));
}

#[test]
fn test_ignore_embedded_id() {
    let mut store = ObjectStore::new();
    let scene = helpers::add_scene(&mut store, "Scene").unwrap();
    let master = helpers::master_collection(&store, scene).unwrap();
    let (object, _) = helpers::add_mesh_object(&mut store, "Cube").unwrap();
    helpers::link_object(&mut store, master, object).unwrap();

    let mut self_ids = HashSet::new();
    let mut embedded_edges = 0;
    foreach_id(
        &store,
        scene,
        WalkFlags::READONLY | WalkFlags::IGNORE_EMBEDDED_ID,
        |link| {
            self_ids.insert(link.self_id);
            if link.usage.contains(UsageFlags::EMBEDDED) {
                embedded_edges += 1;
            }
            WalkControl::Continue
        },
    );

    assert_eq!(self_ids, HashSet::from([scene]));
    // Master collection and (null) compositing tree slots
    assert_eq!(embedded_edges, 2);
}

#[test]
fn test_embedded_root_owner_resolution() {
    let mut store = ObjectStore::new();
    let scene = helpers::add_scene(&mut store, "Scene").unwrap();
    let master = helpers::master_collection(&store, scene).unwrap();
    let (object, _) = helpers::add_mesh_object(&mut store, "Cube").unwrap();
    helpers::link_object(&mut store, master, object).unwrap();

    let owner_with = |flags: WalkFlags| {
        let mut owners = Vec::new();
        foreach_id(&store, master, flags, |link| {
            owners.push(link.owner);
            WalkControl::Continue
        });
        owners
    };

    assert_eq!(owner_with(WalkFlags::READONLY), vec![Some(scene)]);
    assert_eq!(
        owner_with(WalkFlags::READONLY | WalkFlags::IGNORE_MISSING_OWNER),
        vec![Some(master)]
    );

    let mut hinted = Vec::new();
    Walk::new(&store, WalkFlags::READONLY | WalkFlags::NO_ORIGINAL_POINTER_ACCESS)
        .with_owner(scene)
        .run(master, |link| {
            hinted.push(link.owner);
            WalkControl::Continue
        });
    assert_eq!(hinted, vec![Some(scene)]);
}

fn build_diamond(store: &mut ObjectStore) -> (ObjectId, ObjectId, ObjectId) {
    let top = helpers::add_collection(store, "Top");
    let left = helpers::add_collection(store, "Left");
    let right = helpers::add_collection(store, "Right");
    helpers::link_collection(store, top, left).unwrap();
    helpers::link_collection(store, top, right).unwrap();

    let (object, mesh) = helpers::add_mesh_object(store, "Shared").unwrap();
    helpers::link_object(store, left, object).unwrap();
    helpers::link_object(store, right, object).unwrap();
    (top, object, mesh)
}

#[test]
fn test_recursion_visits_each_object_once() {
    let mut store = ObjectStore::new();
    let (top, object, mesh) = build_diamond(&mut store);

    let mut object_edges = 0;
    let mut mesh_edges = 0;
    let completed = foreach_id(&store, top, WalkFlags::RECURSE, |link| {
        if link.self_id == object {
            object_edges += 1;
        }
        if link.self_id == mesh {
            mesh_edges += 1;
        }
        WalkControl::Continue
    });

    assert!(completed);
    // data, parent, instance collection
    assert_eq!(object_edges, 3);
    // shape key, texture mesh
    assert_eq!(mesh_edges, 2);
}

#[test]
fn test_stop_recursion_prunes_target() {
    let mut store = ObjectStore::new();
    let (top, object, mesh) = build_diamond(&mut store);

    let mut walked = HashSet::new();
    foreach_id(&store, top, WalkFlags::RECURSE, |link| {
        walked.insert(link.self_id);
        if link.target() == Some(object) {
            WalkControl::StopRecursion
        } else {
            WalkControl::Continue
        }
    });

    assert!(walked.contains(&top));
    assert!(!walked.contains(&object));
    assert!(!walked.contains(&mesh));
}

#[test]
fn test_recursion_queues_embedded_objects() {
    let mut store = ObjectStore::new();
    let scene = helpers::add_scene(&mut store, "Scene").unwrap();
    let master = helpers::master_collection(&store, scene).unwrap();
    let (object, mesh) = helpers::add_mesh_object(&mut store, "Cube").unwrap();
    helpers::link_object(&mut store, master, object).unwrap();

    let mut walked = HashSet::new();
    let mut master_owner = None;
    foreach_id(&store, scene, WalkFlags::RECURSE, |link| {
        walked.insert(link.self_id);
        if link.self_id == master {
            master_owner = link.owner;
        }
        WalkControl::Continue
    });

    assert_eq!(walked, HashSet::from([scene, master, object, mesh]));
    assert_eq!(master_owner, Some(scene));
}

#[test]
fn test_mutating_walk_redirects_pointer() {
    let mut store = ObjectStore::new();
    let (object, mesh) = helpers::add_mesh_object(&mut store, "Cube").unwrap();
    let other = store.add_object(ObjectType::Mesh, "Other");
    let before = store.generation();

    foreach_id(&store, object, WalkFlags::empty(), |link| {
        if link.target() == Some(mesh) {
            link.pointer.set(Some(other));
        }
        WalkControl::Continue
    });

    assert!(store.generation() > before);
    let edges = collect_edges(&store, object, WalkFlags::READONLY);
    assert!(edges.contains(&(Some(other), UsageFlags::USER)));
}

#[test]
#[cfg(debug_assertions)]
#[should_panic(expected = "must not be interrupted")]
fn test_mutating_walk_cannot_stop() {
    let mut store = ObjectStore::new();
    let (object, _) = helpers::add_mesh_object(&mut store, "Cube").unwrap();
    foreach_id(&store, object, WalkFlags::empty(), |_| WalkControl::StopIteration);
}

#[test]
fn test_screen_spaces_need_include_ui() {
    let mut store = ObjectStore::new();
    let image = store.add_object_with_data(
        "Viewer Node",
        ObjectData::Image(idgraph::graph::ImageData {
            source: ImageSource::Viewer,
            filepath: String::new(),
        }),
    );
    let screen = store.add_object_with_data(
        "Layout",
        ObjectData::Screen(ScreenData {
            spaces: vec![IdPointer::to(image)],
        }),
    );

    assert!(collect_edges(&store, screen, WalkFlags::READONLY).is_empty());
    assert_eq!(
        collect_edges(&store, screen, WalkFlags::READONLY | WalkFlags::INCLUDE_UI),
        vec![(Some(image), UsageFlags::DIRECT_WEAK_LINK)]
    );
}

#[test]
fn test_foreach_subdata_reports_given_pair() {
    let mut store = ObjectStore::new();
    let (object, mesh) = helpers::add_mesh_object(&mut store, "Cube").unwrap();
    let modifier_target = IdPointer::to(mesh);

    let mut seen = Vec::new();
    let completed = foreach_subdata(
        &store,
        object,
        object,
        WalkFlags::READONLY,
        |walker| walker.process(&modifier_target, UsageFlags::empty()),
        |link| {
            seen.push((link.owner, link.self_id, link.target()));
            WalkControl::Continue
        },
    );

    assert!(completed);
    assert_eq!(seen, vec![(Some(object), object, Some(mesh))]);
}
