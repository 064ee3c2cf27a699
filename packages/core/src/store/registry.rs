//! Observer Registry
//!
//! Per-store bookkeeping for live observations. Each registered observer
//! owns its operation, the storage keys its last read depended on, the last
//! value it emitted, and the sending half of its emission channel.
//!
//! The store calls [`ObserverRegistry::notify`] after every storage change,
//! with the change already applied. Every observer whose tracked set the
//! change intersects is re-read right there, so each relevant write produces
//! its own emission even when the consumer polls much later.

use super::observation::ObservedData;
use super::StoreEvent;
use crate::denormalize::{denormalize, Denormalized};
use crate::models::{DependencySet, Operation, Storage, Variables};
use std::collections::BTreeMap;
use tokio::sync::mpsc;

pub(super) type ObserverId = u64;

struct ObserverSlot {
    operation: Operation,
    variables: Variables,
    tracked: DependencySet,
    last: ObservedData,
    tx: mpsc::UnboundedSender<ObservedData>,
}

#[derive(Default)]
pub(super) struct ObserverRegistry {
    next_id: ObserverId,
    slots: BTreeMap<ObserverId, ObserverSlot>,
}

impl ObserverRegistry {
    /// Register an observer whose first read produced `initial`
    ///
    /// The first emission is queued on the returned receiver before this returns.
    pub(super) fn register(
        &mut self,
        operation: Operation,
        variables: Variables,
        initial: Denormalized,
    ) -> (ObserverId, mpsc::UnboundedReceiver<ObservedData>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let first = ObservedData {
            data: initial.data,
            partial: initial.partial,
        };
        // The receiver is alive, so this cannot fail
        let _ = tx.send(first.clone());

        let id = self.next_id;
        self.next_id += 1;
        self.slots.insert(
            id,
            ObserverSlot {
                operation,
                variables,
                tracked: initial.dependencies,
                last: first,
                tx,
            },
        );
        (id, rx)
    }

    /// Drop an observer; returns whether it was still registered
    pub(super) fn unregister(&mut self, id: ObserverId) -> bool {
        self.slots.remove(&id).is_some()
    }

    pub(super) fn tracked(&self, id: ObserverId) -> Option<&DependencySet> {
        self.slots.get(&id).map(|slot| &slot.tracked)
    }

    pub(super) fn len(&self) -> usize {
        self.slots.len()
    }

    pub(super) fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Re-read every observer affected by `event` against `storage`
    ///
    /// Returns the number of emissions sent.
    pub(super) fn notify(&mut self, event: &StoreEvent, storage: &Storage, dedupe: bool) -> usize {
        let mut sent = 0;
        let mut closed = Vec::new();

        for (id, slot) in self.slots.iter_mut() {
            if !event.affects(&slot.tracked) {
                tracing::trace!(
                    observer = id,
                    operation = slot.operation.display_name(),
                    event = event.event_type(),
                    "Event does not affect observer"
                );
                continue;
            }

            let result = match denormalize(&slot.operation, &slot.variables, storage) {
                Ok(result) => result,
                Err(e) => {
                    tracing::error!(
                        observer = id,
                        operation = slot.operation.display_name(),
                        error = %e,
                        "Failed to re-read observed operation"
                    );
                    continue;
                }
            };

            slot.tracked = result.dependencies;
            let emission = ObservedData {
                data: result.data,
                partial: result.partial,
            };
            if dedupe && slot.last == emission {
                tracing::trace!(
                    observer = id,
                    operation = slot.operation.display_name(),
                    "Re-read produced identical data; not emitting"
                );
                continue;
            }

            slot.last = emission.clone();
            if slot.tx.send(emission).is_err() {
                closed.push(*id);
            } else {
                sent += 1;
            }
        }

        for id in closed {
            tracing::debug!(observer = id, "Dropping observer with closed receiver");
            self.slots.remove(&id);
        }
        sent
    }
}
