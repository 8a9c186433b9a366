use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use crate::core::types::{Flash, SessionId};
use crate::storage::clock::{is_expired, Clock};

/// Queued one-shot messages per session, drained by the next rendered page
pub struct FlashStore {
    queues: DashMap<SessionId, (Vec<Flash>, SystemTime)>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
}

impl FlashStore {
    pub fn new(clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        Self {
            queues: DashMap::new(),
            clock,
            ttl,
        }
    }

    pub fn push(&self, session: &SessionId, flash: Flash) {
        let now = self.clock.now();
        let mut queue = self
            .queues
            .entry(*session)
            .or_insert_with(|| (Vec::new(), now));
        queue.0.push(flash);
        queue.1 = now;
    }

    /// Remove and return every pending message for `session`
    pub fn take(&self, session: &SessionId) -> Vec<Flash> {
        self.queues
            .remove(session)
            .map(|(_, (flashes, _))| flashes)
            .unwrap_or_default()
    }

    /// Number of sessions with pending messages
    pub fn len(&self) -> usize {
        self.queues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queues.is_empty()
    }

    /// Drop queues of sessions that never came back
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let before = self.queues.len();
        self.queues
            .retain(|_, (_, touched)| !is_expired(now, *touched, self.ttl));
        before.saturating_sub(self.queues.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::clock::ManualClock;

    #[test]
    fn test_take_drains_in_order() {
        let store = FlashStore::new(Arc::new(ManualClock::starting_now()), Duration::from_secs(60));
        let session = SessionId::generate();
        store.push(&session, Flash::error("first"));
        store.push(&session, Flash::warning("second"));

        let taken = store.take(&session);
        assert_eq!(taken.len(), 2);
        assert_eq!(taken[0].message, "first");
        assert_eq!(taken[1].message, "second");
        assert!(store.take(&session).is_empty());
    }

    #[test]
    fn test_purge_drops_stale_queues() {
        let clock = Arc::new(ManualClock::starting_now());
        let store = FlashStore::new(clock.clone(), Duration::from_secs(60));
        let stale = SessionId::generate();
        store.push(&stale, Flash::error("never read"));
        clock.advance(Duration::from_secs(61));
        let fresh = SessionId::generate();
        store.push(&fresh, Flash::error("read soon"));

        assert_eq!(store.purge_expired(), 1);
        assert_eq!(store.len(), 1);
        assert!(store.take(&stale).is_empty());
        assert_eq!(store.take(&fresh).len(), 1);
    }
}
