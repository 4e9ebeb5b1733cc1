//! The object store: arena of library objects addressed by handle.

use super::idtype::{TypeInfo, TypeRegistry};
use super::object::{LibraryObject, ObjectData};
use super::types::{ObjectFlags, ObjectId, ObjectTags, ObjectType};
use crate::error::{GraphError, Result};
use log::{debug, trace};
use std::cell::Cell;
use std::collections::{BTreeMap, HashMap};

/// The store of library objects.
///
/// Objects reference each other through [`IdPointer`](super::IdPointer)
/// handles, so reference cycles need no special ownership. The store owns
/// every object; traversal only borrows it.
///
/// Top-level objects are listed per type in insertion order. Embedded
/// objects live in the arena but only appear through their owner.
pub struct ObjectStore {
    registry: TypeRegistry,
    // Monotonic counter for handle generation
    object_counter: u64,
    objects: HashMap<ObjectId, LibraryObject>,
    // Top-level listing, one bucket per type
    lists: BTreeMap<ObjectType, Vec<ObjectId>>,
    generation: Cell<u64>,
}

impl ObjectStore {
    /// Create an empty store using the builtin type registry.
    pub fn new() -> Self {
        Self::with_registry(TypeRegistry::builtin())
    }

    /// Create an empty store using the given type registry.
    pub fn with_registry(registry: TypeRegistry) -> Self {
        Self {
            registry,
            object_counter: 0,
            objects: HashMap::new(),
            lists: BTreeMap::new(),
            generation: Cell::new(0),
        }
    }

    /// Add a top-level object with an empty payload.
    pub fn add_object(&mut self, object_type: ObjectType, name: impl Into<String>) -> ObjectId {
        self.add_object_with_data(name, ObjectData::default_for(object_type))
    }

    /// Add a top-level object with the given payload.
    ///
    /// # Returns
    ///
    /// The handle assigned to the created object.
    pub fn add_object_with_data(&mut self, name: impl Into<String>, data: ObjectData) -> ObjectId {
        let id = self.next_object_id();
        let object_type = data.object_type();
        debug!("Adding object: id={id}, type={object_type}");

        self.objects
            .insert(id, LibraryObject::new(id, name.into(), data));
        self.lists.entry(object_type).or_default().push(id);
        self.touch();

        trace!("Object {id} added successfully");
        id
    }

    /// Add an object embedded in `owner`.
    ///
    /// The embedded object shares its owner's library. It is not listed at
    /// top level; the owner must store its handle in one of its slots.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::ObjectNotFound`] if the owner doesn't exist, and
    /// [`GraphError::InvalidOperation`] if the payload type cannot be embedded
    /// or the owner is itself embedded.
    pub fn add_embedded(
        &mut self,
        owner: ObjectId,
        name: impl Into<String>,
        data: ObjectData,
    ) -> Result<ObjectId> {
        let object_type = data.object_type();
        if !object_type.can_be_embedded() {
            return Err(GraphError::invalid(format!(
                "{object_type} objects cannot be embedded"
            )));
        }
        let owner_object = self.get(owner)?;
        if owner_object.is_embedded() {
            return Err(GraphError::invalid(format!(
                "Embedded object {owner} cannot own another embedded object"
            )));
        }
        let library = owner_object.library.get();

        let id = self.next_object_id();
        debug!("Adding embedded object: id={id}, type={object_type}, owner={owner}");
        let object = LibraryObject::new_embedded(id, name.into(), data, owner);
        object.library.set(library);
        self.objects.insert(id, object);
        self.touch();

        Ok(id)
    }

    /// Get an object by handle.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::ObjectNotFound`] if the object doesn't exist.
    pub fn get(&self, id: ObjectId) -> Result<&LibraryObject> {
        self.objects
            .get(&id)
            .ok_or(GraphError::ObjectNotFound { object_id: id })
    }

    /// Get a mutable reference to an object by handle.
    ///
    /// Counts as a structural mutation: relations built before this call are
    /// stale afterwards.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::ObjectNotFound`] if the object doesn't exist.
    pub fn get_mut(&mut self, id: ObjectId) -> Result<&mut LibraryObject> {
        self.touch();
        self.objects
            .get_mut(&id)
            .ok_or(GraphError::ObjectNotFound { object_id: id })
    }

    /// Check whether a handle resolves to a live object.
    pub fn contains(&self, id: ObjectId) -> bool {
        self.objects.contains_key(&id)
    }

    /// Remove an object and every object embedded in it.
    ///
    /// Pointers held by other objects are left untouched; redirect them first
    /// (see [`helpers::remap_references`](crate::helpers::remap_references)).
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::ObjectNotFound`] if the object doesn't exist.
    pub fn remove_object(&mut self, id: ObjectId) -> Result<LibraryObject> {
        debug!("Removing object: id={id}");
        let object = self
            .objects
            .remove(&id)
            .ok_or(GraphError::ObjectNotFound { object_id: id })?;

        if let Some(list) = self.lists.get_mut(&object.object_type()) {
            list.retain(|listed| *listed != id);
        }

        let embedded: Vec<_> = self
            .objects
            .values()
            .filter(|candidate| candidate.owner() == Some(id))
            .map(LibraryObject::id)
            .collect();
        trace!("Removing {} embedded objects owned by {}", embedded.len(), id);
        for child in embedded {
            self.objects.remove(&child);
        }

        self.touch();
        Ok(object)
    }

    /// Iterate over top-level objects in store order (by type bucket, then
    /// insertion order).
    pub fn iter(&self) -> impl Iterator<Item = &LibraryObject> + '_ {
        self.lists
            .values()
            .flatten()
            .filter_map(move |id| self.objects.get(id))
    }

    /// Iterate over top-level objects of one type, in insertion order.
    pub fn iter_type(&self, object_type: ObjectType) -> impl Iterator<Item = &LibraryObject> + '_ {
        self.lists
            .get(&object_type)
            .into_iter()
            .flatten()
            .filter_map(move |id| self.objects.get(id))
    }

    /// Iterate over every object, embedded ones included, in no particular
    /// order.
    pub fn iter_all(&self) -> impl Iterator<Item = &LibraryObject> + '_ {
        self.objects.values()
    }

    /// Owner of an embedded object; `None` for top-level or unknown objects.
    pub fn owner_of(&self, id: ObjectId) -> Option<ObjectId> {
        self.objects.get(&id).and_then(LibraryObject::owner)
    }

    /// Get the total number of objects, embedded ones included.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Check if the store holds no object.
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Type registry used for traversal.
    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    /// Descriptor of the given type.
    pub fn type_info(&self, object_type: ObjectType) -> &TypeInfo {
        self.registry.get(object_type)
    }

    /// Structural generation counter.
    ///
    /// Bumped by every structural mutation, including pointer rewrites done by
    /// a mutating traversal.
    pub fn generation(&self) -> u64 {
        self.generation.get()
    }

    /// Add one user to an object.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::ObjectNotFound`] if the object doesn't exist.
    pub fn add_user(&self, id: ObjectId) -> Result<()> {
        let object = self.get(id)?;
        object.set_users(object.users() + 1);
        Ok(())
    }

    /// Remove one user from an object, never going below its fake user.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::ObjectNotFound`] if the object doesn't exist.
    pub fn remove_user(&self, id: ObjectId) -> Result<()> {
        let object = self.get(id)?;
        let limit = u32::from(object.has_fake_user());
        if object.users() <= limit {
            debug!("Object {id} has no user to remove");
            return Ok(());
        }
        object.set_users(object.users() - 1);
        if object.users() <= limit {
            object.set_tags(ObjectTags::EXTRA_USER, false);
        }
        Ok(())
    }

    /// Overwrite the user count of an object.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::ObjectNotFound`] if the object doesn't exist.
    pub fn set_users(&self, id: ObjectId, users: u32) -> Result<()> {
        self.get(id)?.set_users(users);
        Ok(())
    }

    /// Make sure an object has at least one real user, granting an extra one
    /// if needed.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::ObjectNotFound`] if the object doesn't exist.
    pub fn ensure_real_user(&self, id: ObjectId) -> Result<()> {
        let object = self.get(id)?;
        let limit = u32::from(object.has_fake_user());
        object.set_tags(ObjectTags::EXTRA_USER, true);
        if object.users() <= limit {
            object.set_users(limit + 1);
        }
        Ok(())
    }

    /// Set or clear the fake user of an object. A fake user counts as a user.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::ObjectNotFound`] if the object doesn't exist.
    pub fn set_fake_user(&mut self, id: ObjectId, value: bool) -> Result<()> {
        let object = self.get_mut(id)?;
        if object.has_fake_user() == value {
            return Ok(());
        }
        object.flags_mut().set(ObjectFlags::FAKE_USER, value);
        if value {
            object.set_users(object.users() + 1);
        } else {
            object.set_users(object.users().saturating_sub(1));
        }
        Ok(())
    }

    /// Mark an object (and the objects embedded in it) as linked from
    /// `library`.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::ObjectNotFound`] if either object doesn't exist,
    /// and [`GraphError::InvalidOperation`] if `library` is not a library.
    pub fn link_from_library(&mut self, id: ObjectId, library: ObjectId) -> Result<()> {
        let library_type = self.get(library)?.object_type();
        if library_type != ObjectType::Library {
            return Err(GraphError::invalid(format!(
                "{library} is a {library_type}, not a Library"
            )));
        }
        self.get(id)?.library.set(Some(library));
        for object in self.objects.values() {
            if object.owner() == Some(id) {
                object.library.set(Some(library));
            }
        }
        self.touch();
        Ok(())
    }

    /// Clear all objects from the store.
    pub fn clear(&mut self) {
        debug!("Clearing store of {} objects", self.objects.len());
        self.objects.clear();
        self.lists.clear();
        self.object_counter = 0;
        self.touch();
    }

    pub(crate) fn touch(&self) {
        self.generation.set(self.generation.get() + 1);
    }

    // Private helper methods

    fn next_object_id(&mut self) -> ObjectId {
        let id = ObjectId::new(self.object_counter);
        self.object_counter += 1;
        id
    }
}

impl Default for ObjectStore {
    fn default() -> Self {
        Self::new()
    }
}
