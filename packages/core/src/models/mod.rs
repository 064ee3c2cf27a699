//! Data Models
//!
//! - [`selection`] - Selection IR consumed from the code generation layer
//! - [`storage`] - Flat normalized storage (records, links, keys)

pub mod selection;
pub mod storage;

pub use selection::{
    Argument, ArgumentValue, FieldSelection, FragmentSpread, FragmentTable, InlineFragment,
    Operation, OperationKind, Selection, TypeCondition, TypeConditionKind, Variables,
};
pub use storage::{
    DependencySet, EntityKey, EntityLink, FieldValue, Record, Storage, StorageKey,
    ENTITY_LINK_MARKER, ROOT_KEY,
};
