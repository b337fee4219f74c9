//! The outbound send queue, drained one packet per event-loop turn.

use std::collections::VecDeque;

use tokio::sync::Mutex;

use strait_core::wire::Packet;

use crate::assoc::AssociationKey;

/// One outbound packet bound for one peer.
#[derive(Debug, Clone)]
pub(crate) struct Deliverable {
    pub key: AssociationKey,
    pub packet: Packet,
}

/// FIFO across all destinations, so a fast producer on one association
/// cannot starve another.
pub(crate) struct SendQueue {
    queue: Mutex<VecDeque<Deliverable>>,
}

impl SendQueue {
    pub(crate) fn new() -> Self {
        SendQueue {
            queue: Mutex::new(VecDeque::new()),
        }
    }

    pub(crate) async fn push(&self, deliverable: Deliverable) {
        self.queue.lock().await.push_back(deliverable);
    }

    pub(crate) async fn pop(&self) -> Option<Deliverable> {
        self.queue.lock().await.pop_front()
    }

    #[cfg(test)]
    pub(crate) async fn len(&self) -> usize {
        self.queue.lock().await.len()
    }
}
