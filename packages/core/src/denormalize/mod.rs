//! Denormalizer
//!
//! Rebuilds a query-shaped result from flat storage, starting at the root
//! record and following entity links by lookup. Missing data never aborts the
//! walk: the result is always a best-effort tree plus a `partial` flag, and
//! the set of storage keys that were consulted.
//!
//! Following a link records its target as a dependency even when the target
//! record does not exist, so an observer is notified once the entity arrives.

use crate::error::CacheError;
use crate::keys::selection_field_key;
use crate::models::{
    DependencySet, FieldSelection, FieldValue, Operation, Record, Selection, Storage, StorageKey,
    Variables,
};
use serde::Serialize;
use serde_json::{Map, Value};

/// Output of one denormalization pass
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Denormalized {
    /// Query-shaped result; absent fields are omitted
    pub data: Value,

    /// True when at least one selected field was absent from storage
    pub partial: bool,

    /// Storage keys read while building `data`
    pub dependencies: DependencySet,
}

/// Reconstruct the result of `operation` from `storage`
pub fn denormalize(
    operation: &Operation,
    variables: &Variables,
    storage: &Storage,
) -> Result<Denormalized, CacheError> {
    operation.validate()?;

    let mut denormalizer = Denormalizer {
        operation,
        variables,
        storage,
        partial: false,
        dependencies: DependencySet::from([StorageKey::Root]),
    };

    let empty = Record::new();
    let root = storage.root().unwrap_or(&empty);
    let mut data = Map::new();
    denormalizer.denormalize_selections(&operation.selections, root, &mut data)?;

    tracing::trace!(
        operation = operation.display_name(),
        partial = denormalizer.partial,
        dependencies = denormalizer.dependencies.len(),
        "Denormalized operation"
    );

    Ok(Denormalized {
        data: Value::Object(data),
        partial: denormalizer.partial,
        dependencies: denormalizer.dependencies,
    })
}

struct Denormalizer<'a> {
    operation: &'a Operation,
    variables: &'a Variables,
    storage: &'a Storage,
    partial: bool,
    dependencies: DependencySet,
}

impl<'a> Denormalizer<'a> {
    fn denormalize_selections(
        &mut self,
        selections: &'a [Selection],
        record: &Record,
        out: &mut Map<String, Value>,
    ) -> Result<(), CacheError> {
        for selection in selections {
            match selection {
                Selection::TypenameField(field)
                | Selection::ScalarField(field)
                | Selection::EnumField(field) => self.denormalize_leaf(field, record, out),
                Selection::ObjectField(field) => self.denormalize_object_field(field, record, out)?,
                Selection::FragmentSpread(spread) => {
                    let body = self.operation.fragment(&spread.name)?;
                    self.denormalize_selections(body, record, out)?;
                }
                Selection::InlineFragment(fragment) => {
                    if record
                        .typename()
                        .is_some_and(|typename| fragment.type_condition.matches(typename))
                    {
                        self.denormalize_selections(&fragment.children, record, out)?;
                    }
                }
            }
        }
        Ok(())
    }

    fn denormalize_leaf(
        &mut self,
        field: &FieldSelection,
        record: &Record,
        out: &mut Map<String, Value>,
    ) {
        let key = selection_field_key(field, self.variables);
        match record.get(&key) {
            Some(FieldValue::Null) => {
                out.insert(field.response_key().to_string(), Value::Null);
            }
            Some(FieldValue::Scalar(value)) => {
                out.insert(field.response_key().to_string(), value.clone());
            }
            Some(_) => {
                tracing::warn!(field = %key, "Stored value is not a leaf; treating as missing");
                self.partial = true;
            }
            None => self.partial = true,
        }
    }

    fn denormalize_object_field(
        &mut self,
        field: &'a FieldSelection,
        record: &Record,
        out: &mut Map<String, Value>,
    ) -> Result<(), CacheError> {
        let key = selection_field_key(field, self.variables);
        let Some(stored) = record.get(&key) else {
            self.partial = true;
            return Ok(());
        };

        let alias = field.response_key();
        let existing = out.remove(alias);
        if let Some(value) = self.denormalize_value(&field.children, stored, existing)? {
            out.insert(alias.to_string(), value);
        }
        Ok(())
    }

    /// Rebuild one object-selected value, merging into any result already at the output slot
    ///
    /// A bare scalar cannot satisfy an object selection: the read is marked
    /// partial and whatever earlier selections produced for the slot is
    /// handed back unchanged.
    fn denormalize_value(
        &mut self,
        children: &'a [Selection],
        stored: &FieldValue,
        existing: Option<Value>,
    ) -> Result<Option<Value>, CacheError> {
        match stored {
            FieldValue::Null => Ok(Some(Value::Null)),
            FieldValue::Scalar(_) => {
                tracing::warn!("Stored scalar does not match object selection");
                self.partial = true;
                Ok(existing)
            }
            FieldValue::Link(link) => {
                let target = link.resolve();
                self.dependencies.insert(StorageKey::Entity(target.clone()));

                let storage = self.storage;
                let mut out = into_object(existing);
                match storage.entity(target) {
                    Some(entity) => self.denormalize_selections(children, entity, &mut out)?,
                    None => self.denormalize_selections(children, &Record::new(), &mut out)?,
                }
                Ok(Some(Value::Object(out)))
            }
            FieldValue::Object(embedded) => {
                let mut out = into_object(existing);
                self.denormalize_selections(children, embedded, &mut out)?;
                Ok(Some(Value::Object(out)))
            }
            FieldValue::List(items) => {
                let mut previous = match existing {
                    Some(Value::Array(previous)) => previous,
                    _ => Vec::new(),
                };

                let mut elements = Vec::with_capacity(items.len());
                for (index, item) in items.iter().enumerate() {
                    let prior = previous.get_mut(index).map(Value::take);
                    let element = self.denormalize_value(children, item, prior)?;
                    elements.push(element.unwrap_or(Value::Null));
                }
                Ok(Some(Value::Array(elements)))
            }
        }
    }
}

fn into_object(existing: Option<Value>) -> Map<String, Value> {
    match existing {
        Some(Value::Object(map)) => map,
        _ => Map::new(),
    }
}
