//! GraphCache Core - Normalized Client Cache
//!
//! This crate turns nested graph query results into a flat, identity-deduplicated
//! entity store, rebuilds query-shaped views from that store, and notifies
//! observers whose data depends on entities that just changed.
//!
//! # Architecture
//!
//! - **Entity identity**: objects with `__typename` + `id` are stored once under `Typename:id`
//! - **Links, not copies**: references between entities are stored as entity links
//! - **Field keys**: `name@{canonical-args}` so argument order never splits the cache
//! - **Dependency tracking**: every read reports the records it touched; every write
//!   broadcasts the records it changed
//!
//! # Modules
//!
//! - [`models`] - Selection IR and flat storage types
//! - [`keys`] - Field/entity key encoding and argument resolution
//! - [`normalize`] - Response → storage patch
//! - [`denormalize`] - Storage → query-shaped result
//! - [`store`] - Session store with read/write/observe
//! - [`error`] - Error types

pub mod denormalize;
pub mod error;
pub mod keys;
pub mod models;
pub mod normalize;
pub mod store;

// Re-export commonly used types
pub use denormalize::{denormalize, Denormalized};
pub use error::CacheError;
pub use models::*;
pub use normalize::{normalize, NormalizedPatch};
pub use store::{Observation, ObservedData, Store, StoreConfig, StoreEvent};
