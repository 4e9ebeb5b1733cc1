//! Core graph types and operations.
//!
//! This module defines the fundamental building blocks:
//! - [`LibraryObject`]: One typed object and its pointer slots
//! - [`IdPointer`]: An edge slot, possibly null
//! - [`ObjectStore`]: The arena owning every object
//! - [`TypeRegistry`]: Per-type descriptors and edge enumerators

mod idtype;
mod object;
mod property;
mod store;
mod types;

pub use idtype::{ForeachIdFn, TypeFlags, TypeInfo, TypeRegistry};
pub use object::{
    ActionData, AnimData, CameraData, CollectionData, ImageData, ImageSource, LibraryData,
    LibraryObject, MaterialData, MeshData, NodeRef, NodeTreeData, ObjectBody, ObjectData,
    OverrideLibrary, OverrideOperation, OverrideProperty, RuntimeLinks, SceneData, ScreenData,
    ShapeKeyData, TextureData, WorldData,
};
pub use property::{IdProperty, PropertyGroup, PropertyValue};
pub use store::ObjectStore;
pub use types::{IdPointer, ObjectFlags, ObjectId, ObjectTags, ObjectType, TypeFilter};
