//! The association table — all records behind a single mutex.

use std::collections::HashMap;

use tokio::sync::{Mutex, MutexGuard, Notify};

use crate::assoc::{Association, AssociationKey, AssociationState};

/// Mapping from peer endpoint to association record. Records are always
/// looked up by the remote address of a received datagram, never by
/// verification tag.
///
/// Critical sections must stay short and free of I/O; handlers decide a
/// state transition under the lock and enqueue any reply after releasing it.
pub(crate) struct AssociationTable {
    records: Mutex<HashMap<AssociationKey, Association>>,
    /// Signalled whenever any record transitions to Established.
    established: Notify,
}

impl AssociationTable {
    pub(crate) fn new() -> Self {
        AssociationTable {
            records: Mutex::new(HashMap::new()),
            established: Notify::new(),
        }
    }

    pub(crate) async fn lock(&self) -> MutexGuard<'_, HashMap<AssociationKey, Association>> {
        self.records.lock().await
    }

    pub(crate) async fn state_of(&self, key: &AssociationKey) -> Option<AssociationState> {
        self.records.lock().await.get(key).map(|assoc| assoc.state)
    }

    /// Wake everyone blocked in `await_established`.
    pub(crate) fn notify_established(&self) {
        self.established.notify_waiters();
    }

    pub(crate) fn established_signal(&self) -> &Notify {
        &self.established
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[tokio::test]
    async fn state_of_unknown_key_is_none() {
        let table = AssociationTable::new();
        let key = AssociationKey::new(Ipv4Addr::LOCALHOST, 5000);
        assert_eq!(table.state_of(&key).await, None);
    }

    #[tokio::test]
    async fn insert_then_read_back() {
        let table = AssociationTable::new();
        let key = AssociationKey::new(Ipv4Addr::LOCALHOST, 5000);
        table.lock().await.insert(key, Association::initiate(key));
        assert_eq!(table.state_of(&key).await, Some(AssociationState::CookieWait));
    }
}
