use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use crate::core::types::{AnalysisResult, SessionId};
use crate::storage::clock::{is_expired, Clock};

/// Per-session holder of the most recent analysis outcome.
///
/// Concurrent writes for the same session are last-writer-wins.
pub trait ResultStore: Send + Sync {
    fn put(&self, session: &SessionId, result: AnalysisResult);

    fn get(&self, session: &SessionId) -> Option<AnalysisResult>;

    fn delete(&self, session: &SessionId) -> Option<AnalysisResult>;

    /// Drop every expired entry, returning how many were removed
    fn purge_expired(&self) -> usize;
}

struct Entry {
    result: AnalysisResult,
    last_access: SystemTime,
}

/// Sharded in-memory result store with TTL-tagged entries.
///
/// Expired entries are evicted lazily on read and in bulk by `purge_expired`.
pub struct MemoryResultStore {
    entries: DashMap<SessionId, Entry>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
}

impl MemoryResultStore {
    pub fn new(clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            clock,
            ttl,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl ResultStore for MemoryResultStore {
    fn put(&self, session: &SessionId, result: AnalysisResult) {
        self.entries.insert(
            *session,
            Entry {
                result,
                last_access: self.clock.now(),
            },
        );
    }

    /// Live result for `session`; a hit restarts its inactivity window.
    fn get(&self, session: &SessionId) -> Option<AnalysisResult> {
        let now = self.clock.now();
        {
            // Shard guard must drop before remove_if below
            let mut entry = self.entries.get_mut(session)?;
            if !is_expired(now, entry.last_access, self.ttl) {
                entry.last_access = now;
                return Some(entry.result.clone());
            }
        }
        self.entries
            .remove_if(session, |_, entry| is_expired(now, entry.last_access, self.ttl));
        None
    }

    fn delete(&self, session: &SessionId) -> Option<AnalysisResult> {
        self.entries.remove(session).map(|(_, entry)| entry.result)
    }

    fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| !is_expired(now, entry.last_access, self.ttl));
        before.saturating_sub(self.entries.len())
    }
}
