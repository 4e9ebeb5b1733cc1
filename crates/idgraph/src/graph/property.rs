//! Custom properties attached to library objects.
//!
//! Properties keep their insertion order: ID-valued properties are
//! traversal edges, and traversal order is part of the contract.

use super::types::{IdPointer, ObjectId};
use serde::{Deserialize, Serialize};

/// Strongly-typed property value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PropertyValue {
    /// String value
    String(String),
    /// Integer value
    Int(i64),
    /// Floating point value
    Float(f64),
    /// Boolean flag
    Bool(bool),
    /// Reference to another library object
    Id(IdPointer),
    /// Nested group of properties
    Group(PropertyGroup),
    /// Explicit null/absence of value
    Null,
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        PropertyValue::String(value)
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        PropertyValue::String(value.to_string())
    }
}

impl From<i64> for PropertyValue {
    fn from(value: i64) -> Self {
        PropertyValue::Int(value)
    }
}

impl From<i32> for PropertyValue {
    fn from(value: i32) -> Self {
        PropertyValue::Int(value as i64)
    }
}

impl From<f64> for PropertyValue {
    fn from(value: f64) -> Self {
        PropertyValue::Float(value)
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        PropertyValue::Bool(value)
    }
}

impl From<ObjectId> for PropertyValue {
    fn from(value: ObjectId) -> Self {
        PropertyValue::Id(IdPointer::to(value))
    }
}

impl From<PropertyGroup> for PropertyValue {
    fn from(value: PropertyGroup) -> Self {
        PropertyValue::Group(value)
    }
}

/// A named property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdProperty {
    /// Property name, unique within its group
    pub name: String,
    /// Stored value
    pub value: PropertyValue,
    /// Whether library overrides may change this property
    pub overridable: bool,
}

/// Ordered key-value property store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PropertyGroup {
    items: Vec<IdProperty>,
}

impl PropertyGroup {
    /// Create a new empty group.
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }

    /// Builder pattern: add a property and return self.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.insert(key, value);
        self
    }

    /// Builder pattern: add an overridable property and return self.
    pub fn with_overridable(
        mut self,
        key: impl Into<String>,
        value: impl Into<PropertyValue>,
    ) -> Self {
        let index = self.upsert(key.into(), value.into());
        self.items[index].overridable = true;
        self
    }

    /// Insert a property value.
    ///
    /// An existing property keeps its position and has its value replaced.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<PropertyValue>) {
        self.upsert(key.into(), value.into());
    }

    // Index of the inserted or updated item
    fn upsert(&mut self, key: String, value: PropertyValue) -> usize {
        match self.items.iter().position(|item| item.name == key) {
            Some(index) => {
                self.items[index].value = value;
                index
            }
            None => {
                self.items.push(IdProperty {
                    name: key,
                    value,
                    overridable: false,
                });
                self.items.len() - 1
            }
        }
    }

    /// Get a property value by key.
    pub fn get(&self, key: &str) -> Option<&PropertyValue> {
        self.items
            .iter()
            .find(|item| item.name == key)
            .map(|item| &item.value)
    }

    /// Remove a property by key.
    pub fn remove(&mut self, key: &str) -> Option<PropertyValue> {
        let index = self.items.iter().position(|item| item.name == key)?;
        Some(self.items.remove(index).value)
    }

    /// Check if a property exists.
    pub fn contains_key(&self, key: &str) -> bool {
        self.items.iter().any(|item| item.name == key)
    }

    /// Get the number of top-level properties.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Check if the group is empty.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Iterate over top-level properties in stored order.
    pub fn iter(&self) -> impl Iterator<Item = &IdProperty> {
        self.items.iter()
    }

    /// Type-safe getter for string properties.
    pub fn get_string(&self, key: &str) -> Option<&str> {
        match self.get(key) {
            Some(PropertyValue::String(s)) => Some(s),
            _ => None,
        }
    }

    /// Type-safe getter for integer properties.
    pub fn get_int(&self, key: &str) -> Option<i64> {
        match self.get(key) {
            Some(PropertyValue::Int(i)) => Some(*i),
            _ => None,
        }
    }

    /// Type-safe getter for float properties.
    pub fn get_float(&self, key: &str) -> Option<f64> {
        match self.get(key) {
            Some(PropertyValue::Float(f)) => Some(*f),
            _ => None,
        }
    }

    /// Type-safe getter for boolean properties.
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        match self.get(key) {
            Some(PropertyValue::Bool(b)) => Some(*b),
            _ => None,
        }
    }

    /// Type-safe getter for ID properties.
    pub fn get_id(&self, key: &str) -> Option<ObjectId> {
        match self.get(key) {
            Some(PropertyValue::Id(pointer)) => pointer.get(),
            _ => None,
        }
    }

    /// Visit every ID-valued property, depth-first in stored order.
    ///
    /// The callback receives the slot and whether the property is overridable.
    pub fn foreach_id(&self, f: &mut dyn FnMut(&IdPointer, bool)) {
        for item in &self.items {
            match &item.value {
                PropertyValue::Id(pointer) => f(pointer, item.overridable),
                PropertyValue::Group(group) => group.foreach_id(f),
                _ => {}
            }
        }
    }
}

impl FromIterator<(String, PropertyValue)> for PropertyGroup {
    fn from_iter<T: IntoIterator<Item = (String, PropertyValue)>>(iter: T) -> Self {
        let mut group = Self::new();
        for (key, value) in iter {
            group.insert(key, value);
        }
        group
    }
}
