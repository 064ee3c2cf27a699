//! Configuration for the normalized store

use serde::{Deserialize, Serialize};

/// Default broadcast capacity for store events
pub const DEFAULT_EVENT_CAPACITY: usize = 128;

/// Store settings
///
/// All fields use `#[serde(default)]` so partial config objects deserialize
/// without error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StoreConfig {
    /// Events buffered per raw event subscriber (see `Store::subscribe_to_events`)
    ///
    /// Observations do not read this channel; their emissions are queued
    /// without a bound.
    pub event_capacity: usize,

    /// Suppress consecutive observer emissions that are structurally equal
    ///
    /// Every query write touches the root record and every observation
    /// depends on it, so any query write re-reads every observer. With
    /// deduplication off, a query write that only changes unrelated root
    /// fields therefore still emits (an unchanged value) to each observer.
    pub dedupe_emissions: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            event_capacity: DEFAULT_EVENT_CAPACITY,
            dedupe_emissions: true,
        }
    }
}

impl StoreConfig {
    pub fn with_event_capacity(mut self, event_capacity: usize) -> Self {
        self.event_capacity = event_capacity;
        self
    }

    pub fn with_dedupe_emissions(mut self, dedupe_emissions: bool) -> Self {
        self.dedupe_emissions = dedupe_emissions;
        self
    }

    /// Channel capacity actually used; a broadcast channel needs room for at least one event
    pub fn channel_capacity(&self) -> usize {
        self.event_capacity.max(1)
    }
}
