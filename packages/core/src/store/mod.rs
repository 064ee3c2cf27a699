//! Normalized Store
//!
//! Owns the flat [`Storage`] for one client session and exposes the three
//! operations transport and UI layers build on:
//!
//! - [`Store::write`] - normalize a result, merge it, broadcast the touched keys
//! - [`Store::read`] - denormalize from current storage; `None` on a cache miss
//! - [`Store::observe`] - a stream that re-emits whenever its dependencies change
//!
//! # Architecture
//!
//! A `Store` is a cheap handle: clones share the same storage and event
//! channel, so one instance can be threaded through every caller of a
//! session. There is no process-wide store.
//!
//! Normalization and denormalization are synchronous tree walks. The storage
//! lock is held only for the merge (writes) or the walk (reads). Once a
//! change is merged and the write lock released, the store re-reads every
//! affected observation before returning, so each relevant write yields its
//! own emission. The same change is then published as a [`StoreEvent`] for
//! raw subscribers.
//!
//! # Examples
//!
//! ```rust
//! use graphcache_core::models::{ArgumentValue, Operation, Selection, Variables};
//! use graphcache_core::store::Store;
//! use serde_json::json;
//!
//! # fn main() -> Result<(), graphcache_core::CacheError> {
//! let store = Store::new();
//! let query = Operation::query(vec![Selection::object(
//!     "book",
//!     vec![Selection::typename(), Selection::scalar("id"), Selection::scalar("title")],
//! )
//! .with_argument("id", ArgumentValue::literal("book1"))]);
//!
//! let data = json!({ "book": { "__typename": "Book", "id": "book1", "title": "GraphQL in Action" } });
//! store.write(&query, &Variables::new(), &data)?;
//! assert_eq!(store.read(&query, &Variables::new())?, Some(data));
//! # Ok(())
//! # }
//! ```

mod config;
mod events;
mod observation;
mod registry;

pub use config::{StoreConfig, DEFAULT_EVENT_CAPACITY};
pub use events::StoreEvent;
pub use observation::{Observation, ObservedData};

use crate::denormalize::{denormalize, Denormalized};
use crate::error::CacheError;
use crate::models::{DependencySet, EntityKey, Operation, Record, Storage, StorageKey, Variables};
use crate::normalize::{normalize, NormalizedPatch};
use registry::{ObserverId, ObserverRegistry};
use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::{broadcast, mpsc};

/// Session-scoped normalized cache
#[derive(Clone)]
pub struct Store {
    storage: Arc<RwLock<Storage>>,

    /// Live observations, re-read synchronously after each change
    observers: Arc<Mutex<ObserverRegistry>>,

    /// Broadcast channel for store events
    event_tx: broadcast::Sender<StoreEvent>,

    config: StoreConfig,
}

impl Store {
    /// Create an empty store with default configuration
    pub fn new() -> Self {
        Self::with_config(StoreConfig::default())
    }

    /// Create an empty store
    pub fn with_config(config: StoreConfig) -> Self {
        let (event_tx, _) = broadcast::channel(config.channel_capacity());
        Self {
            storage: Arc::new(RwLock::new(Storage::new())),
            observers: Arc::new(Mutex::new(ObserverRegistry::default())),
            event_tx,
            config,
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Normalize `data` and merge it into storage
    ///
    /// Partial payloads are legitimate: absent fields are simply not written.
    /// Fails only on malformed input, in which case storage is left untouched.
    pub fn write(
        &self,
        operation: &Operation,
        variables: &Variables,
        data: &Value,
    ) -> Result<(), CacheError> {
        let NormalizedPatch { storage: patch, touched } = normalize(operation, variables, data)?;

        self.write_storage().merge(patch);

        tracing::debug!(
            operation = operation.display_name(),
            touched = touched.len(),
            "Wrote operation result to store"
        );
        self.publish(StoreEvent::Written {
            touched: Arc::new(touched),
        });
        Ok(())
    }

    /// Read `operation` from the cache
    ///
    /// Returns `None` when any selected field is missing (a cache miss).
    pub fn read(
        &self,
        operation: &Operation,
        variables: &Variables,
    ) -> Result<Option<Value>, CacheError> {
        let result = self.read_denormalized(operation, variables)?;
        if result.partial {
            tracing::debug!(operation = operation.display_name(), "Cache miss (partial data)");
            return Ok(None);
        }
        Ok(Some(result.data))
    }

    /// Read `operation` and return the best-effort data with its completeness and dependencies
    pub fn read_denormalized(
        &self,
        operation: &Operation,
        variables: &Variables,
    ) -> Result<Denormalized, CacheError> {
        let storage = self.read_storage();
        denormalize(operation, variables, &storage)
    }

    /// Watch `operation` for changes
    ///
    /// The returned observation holds the current result immediately; later
    /// emissions follow writes that touch what that result was built from.
    pub fn observe(
        &self,
        operation: &Operation,
        variables: &Variables,
    ) -> Result<Observation, CacheError> {
        Observation::start(self.clone(), operation.clone(), variables.clone())
    }

    /// Remove one entity record
    ///
    /// Links to the entity stay in place and read as missing data afterwards.
    /// Returns whether a record was removed.
    pub fn invalidate(&self, key: &EntityKey) -> bool {
        let removed = self.write_storage().remove_entity(key).is_some();
        if removed {
            tracing::debug!(entity = %key, "Invalidated entity");
            self.publish(StoreEvent::Invalidated {
                key: StorageKey::Entity(key.clone()),
            });
        }
        removed
    }

    /// Drop every record, leaving an empty root
    pub fn clear(&self) {
        *self.write_storage() = Storage::new();
        tracing::debug!("Cleared store");
        self.publish(StoreEvent::Reset);
    }

    /// Copy of one entity record
    pub fn entity(&self, key: &EntityKey) -> Option<Record> {
        self.read_storage().entity(key).cloned()
    }

    /// Copy of the whole storage
    pub fn snapshot(&self) -> Storage {
        self.read_storage().clone()
    }

    /// Subscribe to raw store events
    pub fn subscribe_to_events(&self) -> broadcast::Receiver<StoreEvent> {
        self.event_tx.subscribe()
    }

    /// Register an observer, computing its first emission under the registry lock
    ///
    /// A write that lands between the first read and registration is still
    /// delivered: its notify step waits for the registry lock.
    fn register_observer(
        &self,
        operation: Operation,
        variables: Variables,
    ) -> Result<(ObserverId, mpsc::UnboundedReceiver<ObservedData>), CacheError> {
        let mut observers = self.lock_observers();
        let initial = self.read_denormalized(&operation, &variables)?;
        Ok(observers.register(operation, variables, initial))
    }

    fn unregister_observer(&self, id: ObserverId) -> bool {
        self.lock_observers().unregister(id)
    }

    fn observer_tracked(&self, id: ObserverId) -> Option<DependencySet> {
        self.lock_observers().tracked(id).cloned()
    }

    /// Re-read affected observers, then emit the event to raw subscribers
    fn publish(&self, event: StoreEvent) {
        {
            let mut observers = self.lock_observers();
            if !observers.is_empty() {
                let storage = self.read_storage();
                let sent = observers.notify(&event, &storage, self.config.dedupe_emissions);
                tracing::debug!(
                    event = event.event_type(),
                    observers = observers.len(),
                    sent,
                    "Notified observers"
                );
            }
        }
        self.emit_event(event);
    }

    /// Emit a store event to all subscribers
    ///
    /// Ignores errors if there are no subscribers.
    fn emit_event(&self, event: StoreEvent) {
        let _ = self.event_tx.send(event);
    }

    fn lock_observers(&self) -> MutexGuard<'_, ObserverRegistry> {
        self.observers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn read_storage(&self) -> RwLockReadGuard<'_, Storage> {
        self.storage.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_storage(&self) -> RwLockWriteGuard<'_, Storage> {
        self.storage.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}
