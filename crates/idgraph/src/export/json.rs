//! JSON format export.
//!
//! Relations are exported with "nodes" and "links" arrays compatible with
//! D3.js force-directed layouts.

use crate::graph::{LibraryObject, ObjectStore};
use crate::relations::Relations;
use crate::unused::UnusedSet;
use crate::{GraphError, Result};
use serde_json::{json, Value};

/// Export a relations cache to D3.js-compatible JSON.
///
/// Nodes are every object of the store, embedded ones included, in handle
/// order. Links are the recorded edges, in discovery order per object.
pub fn export_relations_json(store: &ObjectStore, relations: &Relations) -> Result<String> {
    let mut objects: Vec<&LibraryObject> = store.iter_all().collect();
    objects.sort_by_key(|object| object.id());

    let mut nodes_array = Vec::new();
    let mut links_array = Vec::new();
    for object in objects {
        nodes_array.push(object_to_json(object));
        for item in relations.to_ids(object.id()) {
            links_array.push(json!({
                "source": object.id(),
                "target": item.id,
                "usage": item.usage.names(),
            }));
        }
    }

    let result = json!({
        "nodes": nodes_array,
        "links": links_array,
    });
    to_pretty(&result)
}

/// Export an unused-analysis result.
pub fn export_unused_json(store: &ObjectStore, unused: &UnusedSet) -> Result<String> {
    let objects: Vec<Value> = unused
        .iter()
        .filter_map(|id| store.get(id).ok())
        .map(object_to_json)
        .collect();

    let counts = serde_json::to_value(unused.counts())
        .map_err(|e| GraphError::serialization("Failed to serialize unused counts", Some(e)))?;

    let result = json!({
        "unused": objects,
        "counts": counts,
        "exception_passes_exhausted": unused.exception_passes_exhausted(),
    });
    to_pretty(&result)
}

/// Convert an object to a JSON node
fn object_to_json(object: &LibraryObject) -> Value {
    json!({
        "id": object.id(),
        "name": object.name,
        "type": object.object_type(),
        "users": object.users(),
        "linked": object.is_linked(),
        "owner": object.owner(),
    })
}

fn to_pretty(value: &Value) -> Result<String> {
    serde_json::to_string_pretty(value)
        .map_err(|e| GraphError::serialization("Failed to serialize JSON", Some(e)))
}
