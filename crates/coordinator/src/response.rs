//! Correlated response slots.
//!
//! Each outstanding request owns exactly one slot, keyed by its [`RequestId`].
//! A slot is opened before the command goes out, so an authority that answers
//! faster than the waiter gets polled still lands its value: the one-shot
//! buffers it until the waiter reads.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::oneshot;
use tracing::{debug, warn};

use popguard_core::error::DecisionError;
use popguard_core::ids::RequestId;
use popguard_core::types::DecisionKind;

type Slots<T> = Arc<Mutex<HashMap<RequestId, oneshot::Sender<T>>>>;

pub struct ResponseChannel<T> {
    kind: DecisionKind,
    slots: Slots<T>,
}

/// The waiting half of a registered slot. Dropping it closes the slot.
pub struct PendingResponse<T> {
    request_id: RequestId,
    kind: DecisionKind,
    receiver: oneshot::Receiver<T>,
    slots: Slots<T>,
}

fn lock_slots<T>(slots: &Slots<T>) -> MutexGuard<'_, HashMap<RequestId, oneshot::Sender<T>>> {
    slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl<T> ResponseChannel<T> {
    pub fn new(kind: DecisionKind) -> Self {
        Self {
            kind,
            slots: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn register(&self, request_id: RequestId) -> PendingResponse<T> {
        let (sender, receiver) = oneshot::channel();
        if lock_slots(&self.slots).insert(request_id, sender).is_some() {
            warn!(kind = %self.kind, %request_id, "request id registered twice, earlier waiter abandoned");
        }
        PendingResponse {
            request_id,
            kind: self.kind,
            receiver,
            slots: Arc::clone(&self.slots),
        }
    }

    /// Hands `value` to the waiter registered under `request_id`.
    pub fn publish(&self, request_id: RequestId, value: T) -> Result<(), DecisionError> {
        let sender = lock_slots(&self.slots).remove(&request_id);
        let misuse = DecisionError::PolicyMisuse {
            kind: self.kind,
            request_id,
        };
        match sender {
            Some(sender) => sender.send(value).map_err(|_| misuse),
            None => Err(misuse),
        }
    }

    /// Drops every open slot; their waiters observe `Abandoned`.
    pub fn cancel_all(&self) -> usize {
        let mut slots = lock_slots(&self.slots);
        let count = slots.len();
        slots.clear();
        if count > 0 {
            debug!(kind = %self.kind, count, "cancelled outstanding waits");
        }
        count
    }

    pub fn outstanding(&self) -> usize {
        lock_slots(&self.slots).len()
    }
}

impl<T> PendingResponse<T> {
    pub fn kind(&self) -> DecisionKind {
        self.kind
    }

    pub async fn await_next(mut self) -> Result<T, DecisionError> {
        (&mut self.receiver)
            .await
            .map_err(|_| DecisionError::Abandoned { kind: self.kind })
    }
}

impl<T> Drop for PendingResponse<T> {
    fn drop(&mut self) {
        lock_slots(&self.slots).remove(&self.request_id);
    }
}
