//! Store Events
//!
//! Events describing each storage change made by [`Store`](super::Store).
//! Observations are re-read only when an event intersects the set of storage
//! keys their last read depended on.
//!
//! # Event Flow
//!
//! 1. The store merges a normalized patch (or invalidates/clears records)
//! 2. Each registered observation checks [`StoreEvent::affects`] against its tracked set
//! 3. Affected observations re-read and queue an emission if the result changed
//! 4. The event is sent on the broadcast channel for raw subscribers

use crate::models::{DependencySet, StorageKey};
use std::sync::Arc;

/// A change to the store's contents
#[derive(Debug, Clone)]
pub enum StoreEvent {
    /// A write merged a patch touching these keys
    Written { touched: Arc<DependencySet> },

    /// One record was removed
    Invalidated { key: StorageKey },

    /// All records were dropped
    Reset,
}

impl StoreEvent {
    /// Get a string representation of the event type
    pub fn event_type(&self) -> &str {
        match self {
            StoreEvent::Written { .. } => "store:written",
            StoreEvent::Invalidated { .. } => "store:invalidated",
            StoreEvent::Reset => "store:reset",
        }
    }

    /// Whether a reader that depended on `tracked` may see different data after this event
    pub fn affects(&self, tracked: &DependencySet) -> bool {
        match self {
            StoreEvent::Written { touched } => !touched.is_disjoint(tracked),
            StoreEvent::Invalidated { key } => tracked.contains(key),
            StoreEvent::Reset => true,
        }
    }
}
