//! Normalizer
//!
//! Walks a response tree guided by the operation's selections and produces a
//! flat storage patch: every identifiable object (string `__typename` and
//! `id`) becomes its own record and is replaced by an entity link where it
//! appeared. Non-identifiable objects stay embedded in their parent.
//!
//! # Shape mismatches
//!
//! A field whose runtime value does not have the shape its selection expects
//! (e.g. a scalar where an object was selected) is skipped with a warning.
//! The rest of the patch is unaffected.

use crate::error::CacheError;
use crate::keys::{entity_key_of, selection_field_key};
use crate::models::{
    DependencySet, FieldSelection, FieldValue, Operation, OperationKind, Record, Selection,
    Storage, StorageKey, Variables,
};
use serde_json::{Map, Value};

/// Output of one normalization pass
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedPatch {
    /// Records to deep-merge into the store
    pub storage: Storage,

    /// Every storage key the patch writes to
    pub touched: DependencySet,
}

/// Normalize `data` (the operation's response `data` object) into a storage patch
///
/// Query results are installed under the root record; mutation and
/// subscription results only contribute the entity records they contain.
pub fn normalize(
    operation: &Operation,
    variables: &Variables,
    data: &Value,
) -> Result<NormalizedPatch, CacheError> {
    operation.validate()?;

    let data = data.as_object().ok_or_else(|| {
        CacheError::invalid_response(format!(
            "operation {} returned non-object data",
            operation.display_name()
        ))
    })?;

    let mut normalizer = Normalizer {
        operation,
        variables,
        storage: Storage::empty(),
        touched: DependencySet::new(),
    };

    let mut root = Record::new();
    normalizer.normalize_selections(&operation.selections, data, &mut root)?;

    let Normalizer {
        mut storage,
        mut touched,
        ..
    } = normalizer;

    if operation.kind == OperationKind::Query {
        storage.merge_record(StorageKey::Root, root);
        touched.insert(StorageKey::Root);
    }

    tracing::debug!(
        operation = operation.display_name(),
        records = storage.len(),
        touched = touched.len(),
        "Normalized response"
    );

    Ok(NormalizedPatch { storage, touched })
}

struct Normalizer<'a> {
    operation: &'a Operation,
    variables: &'a Variables,
    storage: Storage,
    touched: DependencySet,
}

impl<'a> Normalizer<'a> {
    /// Merge the contributions of `selections` into `acc`, reading from the response object `data`
    fn normalize_selections(
        &mut self,
        selections: &'a [Selection],
        data: &Map<String, Value>,
        acc: &mut Record,
    ) -> Result<(), CacheError> {
        for selection in selections {
            match selection {
                Selection::TypenameField(field)
                | Selection::ScalarField(field)
                | Selection::EnumField(field) => {
                    if let Some(value) = data.get(field.response_key()) {
                        acc.merge_field(
                            selection_field_key(field, self.variables),
                            FieldValue::from_scalar(value.clone()),
                        );
                    }
                }
                Selection::ObjectField(field) => self.normalize_object_field(field, data, acc)?,
                Selection::FragmentSpread(spread) => {
                    let body = self.operation.fragment(&spread.name)?;
                    self.normalize_selections(body, data, acc)?;
                }
                Selection::InlineFragment(fragment) => {
                    let typename = data.get("__typename").and_then(Value::as_str);
                    match typename {
                        Some(typename) if fragment.type_condition.matches(typename) => {
                            self.normalize_selections(&fragment.children, data, acc)?;
                        }
                        _ => {
                            tracing::trace!(
                                condition = %fragment.type_condition.name,
                                typename = ?typename,
                                "Inline fragment does not apply"
                            );
                        }
                    }
                }
            }
        }
        Ok(())
    }

    fn normalize_object_field(
        &mut self,
        field: &'a FieldSelection,
        data: &Map<String, Value>,
        acc: &mut Record,
    ) -> Result<(), CacheError> {
        let Some(value) = data.get(field.response_key()) else {
            return Ok(());
        };

        match self.normalize_value(&field.children, value)? {
            Some(normalized) => {
                acc.merge_field(selection_field_key(field, self.variables), normalized);
            }
            None => {
                tracing::warn!(
                    operation = self.operation.display_name(),
                    field = %field.response_key(),
                    "Skipping field whose value does not match its object selection"
                );
            }
        }
        Ok(())
    }

    /// Normalize a value selected as an object (or list of objects)
    ///
    /// Returns `None` when the value's shape does not match the selection.
    fn normalize_value(
        &mut self,
        children: &'a [Selection],
        value: &Value,
    ) -> Result<Option<FieldValue>, CacheError> {
        match value {
            Value::Null => Ok(Some(FieldValue::Null)),
            Value::Array(items) => {
                let mut normalized = Vec::with_capacity(items.len());
                for item in items {
                    match self.normalize_value(children, item)? {
                        Some(element) => normalized.push(element),
                        None => return Ok(None),
                    }
                }
                Ok(Some(FieldValue::List(normalized)))
            }
            Value::Object(object) => {
                let mut record = Record::new();
                self.normalize_selections(children, object, &mut record)?;

                // A sibling selection of the same field may be the one that picked
                // `__typename`/`id`; the response object carries them either way.
                match record.entity_key().or_else(|| entity_key_of(value)) {
                    Some(key) => {
                        let storage_key = StorageKey::Entity(key.clone());
                        self.storage.merge_record(storage_key.clone(), record);
                        self.touched.insert(storage_key);
                        Ok(Some(FieldValue::link(key)))
                    }
                    None => Ok(Some(FieldValue::Object(record))),
                }
            }
            Value::Bool(_) | Value::Number(_) | Value::String(_) => Ok(None),
        }
    }
}

#[cfg(test)]
#[path = "normalize_test.rs"]
mod normalize_test;
