//! Observations
//!
//! An [`Observation`] is the push side of [`Store::observe`](super::Store::observe).
//! It is registered with the store, which does all of the work at write time:
//!
//! - The first emission is computed when the observation is created
//! - Each write that intersects the tracked set triggers one re-read
//! - The tracked set is replaced by the new read's dependencies
//! - A result structurally equal to the previous emission is not re-emitted
//!
//! Emissions are queued on an unbounded channel in write order; this type
//! only drains that queue.

use super::registry::ObserverId;
use super::Store;
use crate::error::CacheError;
use crate::models::{DependencySet, Operation, Variables};
use futures::Stream;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;

/// One emission of an observation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObservedData {
    /// Best-effort query-shaped result
    pub data: Value,

    /// True when some selected field is not in the cache yet
    pub partial: bool,
}

/// A live query against a [`Store`]
///
/// Dropping the observation unsubscribes it.
pub struct Observation {
    store: Store,
    id: ObserverId,
    operation_name: String,

    /// `None` once unsubscribed
    emissions: Option<mpsc::UnboundedReceiver<ObservedData>>,

    latest: Option<ObservedData>,
}

impl Observation {
    pub(super) fn start(
        store: Store,
        operation: Operation,
        variables: Variables,
    ) -> Result<Self, CacheError> {
        let operation_name = operation.display_name().to_string();
        let (id, emissions) = store.register_observer(operation, variables)?;

        tracing::debug!(observer = id, operation = %operation_name, "Observation started");

        Ok(Self {
            store,
            id,
            operation_name,
            emissions: Some(emissions),
            latest: None,
        })
    }

    /// Storage keys the most recent read depended on
    ///
    /// Empty once unsubscribed.
    pub fn tracked(&self) -> DependencySet {
        self.store.observer_tracked(self.id).unwrap_or_default()
    }

    /// Most recent emission handed out by [`try_next`](Self::try_next) or [`next`](Self::next)
    pub fn latest(&self) -> Option<&ObservedData> {
        self.latest.as_ref()
    }

    pub fn is_active(&self) -> bool {
        self.emissions.is_some()
    }

    /// Next queued emission, without waiting
    pub fn try_next(&mut self) -> Option<ObservedData> {
        let emission = self.emissions.as_mut()?.try_recv().ok()?;
        self.latest = Some(emission.clone());
        Some(emission)
    }

    /// Wait for the next emission
    ///
    /// Returns `None` once the observation is unsubscribed.
    pub async fn next(&mut self) -> Option<ObservedData> {
        let emission = self.emissions.as_mut()?.recv().await?;
        self.latest = Some(emission.clone());
        Some(emission)
    }

    /// Adapt into a `Stream` of emissions
    pub fn into_stream(self) -> impl Stream<Item = ObservedData> {
        futures::stream::unfold(self, |mut observation| async move {
            let emission = observation.next().await?;
            Some((emission, observation))
        })
    }

    /// Stop observing and remove the registration from the store
    ///
    /// Queued emissions are discarded. Safe to call more than once.
    pub fn unsubscribe(&mut self) {
        if self.emissions.take().is_some() {
            self.store.unregister_observer(self.id);
            tracing::debug!(
                observer = self.id,
                operation = %self.operation_name,
                "Observation unsubscribed"
            );
        }
    }
}

impl Drop for Observation {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

#[cfg(test)]
#[path = "observation_test.rs"]
mod observation_test;
