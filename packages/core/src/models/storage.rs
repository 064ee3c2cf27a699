//! Flat Entity Storage
//!
//! The normalized data model: one [`Record`] per entity, keyed by
//! `"Typename:id"`, plus a reserved root record for top-level query fields.
//! Cross-entity references are always [`EntityLink`]s resolved by lookup, so
//! cyclic object graphs never become cyclic in memory.
//!
//! # Merge rules
//!
//! - Leaf values: last write wins
//! - Embedded objects: merged recursively
//! - Lists of equal length: merged elementwise; otherwise replaced
//! - Entity links: replaced by the incoming value

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Display name of the root record
pub const ROOT_KEY: &str = "ROOT_QUERY";

/// Marker key used when an entity link is serialized
pub const ENTITY_LINK_MARKER: &str = "__ref";

/// Canonical entity identity: `"Typename:id"`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityKey(String);

impl EntityKey {
    pub fn new(typename: &str, id: &str) -> Self {
        Self(format!("{}:{}", typename, id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Typename portion of the key
    pub fn typename(&self) -> &str {
        self.0.split_once(':').map_or(self.0.as_str(), |(t, _)| t)
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Address of a record in [`Storage`]
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StorageKey {
    Root,
    Entity(EntityKey),
}

impl StorageKey {
    pub fn entity(typename: &str, id: &str) -> Self {
        Self::Entity(EntityKey::new(typename, id))
    }
}

impl From<EntityKey> for StorageKey {
    fn from(key: EntityKey) -> Self {
        Self::Entity(key)
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageKey::Root => f.write_str(ROOT_KEY),
            StorageKey::Entity(key) => key.fmt(f),
        }
    }
}

impl Serialize for StorageKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Storage keys touched by a write, or read by a denormalization
pub type DependencySet = BTreeSet<StorageKey>;

/// Indirection to an entity record; never carries the entity's data
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntityLink {
    key: EntityKey,
}

impl EntityLink {
    pub fn new(key: EntityKey) -> Self {
        Self { key }
    }

    /// Target entity key
    pub fn resolve(&self) -> &EntityKey {
        &self.key
    }
}

impl Serialize for EntityLink {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(ENTITY_LINK_MARKER, &self.key)?;
        map.end()
    }
}

/// A stored field value
///
/// An absent field is represented by the key being missing from its
/// [`Record`], never by a variant here, so absent and `null` stay distinct.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    /// Scalar, enum, typename or custom-scalar JSON, stored verbatim
    Scalar(Value),
    Link(EntityLink),
    /// Non-identified compound value stored inline
    Object(Record),
    List(Vec<FieldValue>),
}

impl FieldValue {
    /// Wrap a leaf value from response data
    pub fn from_scalar(value: Value) -> Self {
        match value {
            Value::Null => Self::Null,
            other => Self::Scalar(other),
        }
    }

    pub fn link(key: EntityKey) -> Self {
        Self::Link(EntityLink::new(key))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn is_object(&self) -> bool {
        matches!(self, Self::Object(_))
    }

    pub fn is_list(&self) -> bool {
        matches!(self, Self::List(_))
    }

    pub fn is_entity_link(&self) -> bool {
        matches!(self, Self::Link(_))
    }

    pub fn as_scalar(&self) -> Option<&Value> {
        match self {
            Self::Scalar(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        self.as_scalar().and_then(Value::as_str)
    }

    pub fn as_link(&self) -> Option<&EntityLink> {
        match self {
            Self::Link(link) => Some(link),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Record> {
        match self {
            Self::Object(record) => Some(record),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[FieldValue]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    /// Deep-merge `incoming` into this value
    pub fn merge(&mut self, incoming: FieldValue) {
        match (self, incoming) {
            (FieldValue::Object(existing), FieldValue::Object(incoming)) => {
                existing.merge(incoming)
            }
            (FieldValue::List(existing), FieldValue::List(incoming))
                if existing.len() == incoming.len() =>
            {
                for (slot, item) in existing.iter_mut().zip(incoming) {
                    slot.merge(item);
                }
            }
            (slot, incoming) => *slot = incoming,
        }
    }
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            FieldValue::Null => serializer.serialize_unit(),
            FieldValue::Scalar(value) => value.serialize(serializer),
            FieldValue::Link(link) => link.serialize(serializer),
            FieldValue::Object(record) => record.serialize(serializer),
            FieldValue::List(items) => items.serialize(serializer),
        }
    }
}

/// Field key → value mapping for one entity, the root, or an embedded object
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Record {
    fields: BTreeMap<String, FieldValue>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, field_key: &str) -> Option<&FieldValue> {
        self.fields.get(field_key)
    }

    pub fn contains_key(&self, field_key: &str) -> bool {
        self.fields.contains_key(field_key)
    }

    /// Overwrite a field without merging
    pub fn insert(&mut self, field_key: impl Into<String>, value: FieldValue) -> Option<FieldValue> {
        self.fields.insert(field_key.into(), value)
    }

    pub fn remove(&mut self, field_key: &str) -> Option<FieldValue> {
        self.fields.remove(field_key)
    }

    /// Deep-merge one field into the record
    pub fn merge_field(&mut self, field_key: impl Into<String>, value: FieldValue) {
        match self.fields.entry(field_key.into()) {
            Entry::Occupied(mut slot) => slot.get_mut().merge(value),
            Entry::Vacant(slot) => {
                slot.insert(value);
            }
        }
    }

    /// Deep-merge every field of `other` into the record
    pub fn merge(&mut self, other: Record) {
        for (field_key, value) in other.fields {
            self.merge_field(field_key, value);
        }
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Stored `__typename`, if any
    pub fn typename(&self) -> Option<&str> {
        self.get("__typename").and_then(FieldValue::as_str)
    }

    /// Entity identity if the record carries a string `__typename` and a string `id`
    pub fn entity_key(&self) -> Option<EntityKey> {
        let typename = self.typename()?;
        let id = self.get("id").and_then(FieldValue::as_str)?;
        Some(EntityKey::new(typename, id))
    }
}

impl<K: Into<String>> FromIterator<(K, FieldValue)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, FieldValue)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

/// The flat store: storage key → record
#[derive(Debug, Clone, PartialEq)]
pub struct Storage {
    records: BTreeMap<StorageKey, Record>,
}

impl Storage {
    /// Storage for a fresh store: an empty root record and nothing else
    pub fn new() -> Self {
        let mut records = BTreeMap::new();
        records.insert(StorageKey::Root, Record::new());
        Self { records }
    }

    /// Storage with no records at all, used as a normalization patch
    pub fn empty() -> Self {
        Self {
            records: BTreeMap::new(),
        }
    }

    pub fn get(&self, key: &StorageKey) -> Option<&Record> {
        self.records.get(key)
    }

    pub fn root(&self) -> Option<&Record> {
        self.records.get(&StorageKey::Root)
    }

    pub fn entity(&self, key: &EntityKey) -> Option<&Record> {
        self.records.get(&StorageKey::Entity(key.clone()))
    }

    pub fn contains(&self, key: &StorageKey) -> bool {
        self.records.contains_key(key)
    }

    /// Deep-merge a record into the one stored under `key`, creating it if needed
    pub fn merge_record(&mut self, key: StorageKey, record: Record) {
        match self.records.entry(key) {
            Entry::Occupied(mut slot) => slot.get_mut().merge(record),
            Entry::Vacant(slot) => {
                slot.insert(record);
            }
        }
    }

    /// Deep-merge every record of `patch`
    pub fn merge(&mut self, patch: Storage) {
        for (key, record) in patch.records {
            self.merge_record(key, record);
        }
    }

    /// Remove an entity record; links pointing at it are left in place
    pub fn remove_entity(&mut self, key: &EntityKey) -> Option<Record> {
        self.records.remove(&StorageKey::Entity(key.clone()))
    }

    /// Mutable access to a record, for direct edits
    pub fn record_mut(&mut self, key: &StorageKey) -> Option<&mut Record> {
        self.records.get_mut(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &StorageKey> {
        self.records.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&StorageKey, &Record)> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl Default for Storage {
    fn default() -> Self {
        Self::new()
    }
}

impl Serialize for Storage {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.records.len()))?;
        for (key, record) in &self.records {
            map.serialize_entry(&key.to_string(), record)?;
        }
        map.end()
    }
}
