//! Orphan report example for idgraph
//!
//! This example demonstrates:
//! - Building a small store with a scene, linked data and orphans
//! - Querying usages of one object
//! - Finding unused objects, directly and recursively
//! - Exporting the report as JSON

use idgraph::export::export_unused_json;
use idgraph::walk::usage::test_usages;
use idgraph::{helpers, ObjectStore, ObjectType};

fn main() -> idgraph::Result<()> {
    let mut store = ObjectStore::new();

    println!("Building a small library...\n");

    let library = helpers::add_library(&mut store, "props", "//props.blend")?;
    let scene = helpers::add_scene(&mut store, "Scene")?;
    let master = helpers::master_collection(&store, scene)?;

    let (cube, mesh) = helpers::add_mesh_object(&mut store, "Cube")?;
    helpers::link_object(&mut store, master, cube)?;
    let metal = helpers::add_material(&mut store, "Metal")?;
    helpers::assign_material(&mut store, mesh, metal)?;
    println!("✓ Added object Cube (ID: {cube}) with mesh {mesh} and material {metal}");

    let (lamp, _) = helpers::add_mesh_object(&mut store, "Lamp")?;
    store.link_from_library(lamp, library)?;
    helpers::set_parent(&mut store, cube, Some(lamp))?;
    println!("✓ Linked object Lamp (ID: {lamp}) from props.blend as parent of Cube");

    let (leftover, _) = helpers::add_mesh_object(&mut store, "Leftover")?;
    let rust = store.add_object(ObjectType::Material, "Rust");
    helpers::assign_material(&mut store, leftover, rust)?;
    println!("✓ Added unlinked object Leftover (ID: {leftover}) with material {rust}");

    let (local, linked) = test_usages(&store, metal);
    println!("\nMaterial Metal: used locally = {local}, used by linked data = {linked}");

    let direct = store.unused().execute();
    println!("\nUnused (direct): {}", direct.len());
    let recursive = store.unused().recursive(true).execute();
    println!("Unused (recursive): {}", recursive.len());
    for id in recursive.iter() {
        let object = store.get(id)?;
        println!("  - {} {} ({})", object.object_type(), object.name, id);
    }

    println!("\nJSON report:\n{}", export_unused_json(&store, &recursive)?);
    Ok(())
}
