//! Process-wide unread notification counter.
//!
//! The count is synchronised from the backend on demand and nudged locally when
//! the app observes a new or read notification. A fetch that resolves after a
//! local nudge overwrites it; the store does not sequence requests.

use std::future::Future;
use std::sync::{Arc, RwLock};

/// Anything that can report the authoritative unread count.
pub trait UnreadCountSource: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    fn unread_count(&self) -> impl Future<Output = Result<u32, Self::Error>> + Send;
}

/// Snapshot of the counter for display.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnreadState {
    pub unread_count: u32,
    pub is_loading: bool,
    /// Message from the most recent failed fetch, cleared when a fetch starts.
    pub error: Option<String>,
}

/// Shared unread counter. Clones observe and mutate the same state.
#[derive(Debug, Clone, Default)]
pub struct NotificationStore {
    state: Arc<RwLock<UnreadState>>,
}

impl NotificationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> UnreadState {
        self.state.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn unread_count(&self) -> u32 {
        self.state.read().unwrap_or_else(|e| e.into_inner()).unread_count
    }

    /// Replace the count with the backend's value. On failure the previous
    /// count is kept and the error recorded.
    pub async fn fetch_unread_count<S: UnreadCountSource>(&self, source: &S) {
        self.update(|s| {
            s.is_loading = true;
            s.error = None;
        });

        let result = source.unread_count().await;

        self.update(|s| {
            s.is_loading = false;
            match result {
                Ok(count) => s.unread_count = count,
                Err(e) => {
                    tracing::warn!("Failed to fetch unread count: {e}");
                    s.error = Some(e.to_string());
                }
            }
        });
    }

    pub fn set_unread_count(&self, count: u32) {
        self.update(|s| s.unread_count = count);
    }

    pub fn increment_unread(&self) {
        self.update(|s| s.unread_count = s.unread_count.saturating_add(1));
    }

    /// Never goes below zero.
    pub fn decrement_unread(&self) {
        self.update(|s| s.unread_count = s.unread_count.saturating_sub(1));
    }

    pub fn reset_unread(&self) {
        self.update(|s| s.unread_count = 0);
    }

    fn update(&self, f: impl FnOnce(&mut UnreadState)) {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        f(&mut *state);
        tracing::debug!(unread = state.unread_count, "Unread count updated");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use tokio::sync::Notify;

    use super::*;

    #[derive(Debug, thiserror::Error)]
    #[error("network down")]
    struct Offline;

    struct Fixed(Result<u32, ()>);

    impl UnreadCountSource for Fixed {
        type Error = Offline;

        async fn unread_count(&self) -> Result<u32, Offline> {
            self.0.map_err(|_| Offline)
        }
    }

    /// Blocks until released, then answers with `count`.
    struct Gated {
        gate: Arc<Notify>,
        count: u32,
    }

    impl UnreadCountSource for Gated {
        type Error = Offline;

        async fn unread_count(&self) -> Result<u32, Offline> {
            self.gate.notified().await;
            Ok(self.count)
        }
    }

    #[tokio::test]
    async fn test_fetch_replaces_count() {
        let store = NotificationStore::new();
        store.set_unread_count(2);
        store.fetch_unread_count(&Fixed(Ok(7))).await;
        let snap = store.snapshot();
        assert_eq!(snap.unread_count, 7);
        assert!(!snap.is_loading);
        assert!(snap.error.is_none());
    }

    #[tokio::test]
    async fn test_fetch_failure_keeps_last_known_count() {
        let store = NotificationStore::new();
        store.set_unread_count(4);
        store.fetch_unread_count(&Fixed(Err(()))).await;
        let snap = store.snapshot();
        assert_eq!(snap.unread_count, 4);
        assert_eq!(snap.error.as_deref(), Some("network down"));
        assert!(!snap.is_loading);

        // A later success clears the error.
        store.fetch_unread_count(&Fixed(Ok(1))).await;
        assert_eq!(store.snapshot().error, None);
        assert_eq!(store.unread_count(), 1);
    }

    #[test]
    fn test_decrement_never_negative() {
        let store = NotificationStore::new();
        store.decrement_unread();
        assert_eq!(store.unread_count(), 0);

        for start in [0u32, 1, 5] {
            store.set_unread_count(start);
            for _ in 0..=start {
                store.decrement_unread();
            }
            assert_eq!(store.unread_count(), 0);
        }
    }

    #[test]
    fn test_increment_then_decrement_restores() {
        let store = NotificationStore::new();
        for start in [0u32, 1, 3, 99] {
            store.set_unread_count(start);
            store.increment_unread();
            store.decrement_unread();
            assert_eq!(store.unread_count(), start);
        }
    }

    #[test]
    fn test_reset_and_shared_clones() {
        let store = NotificationStore::new();
        let badge = store.clone();
        store.set_unread_count(3);
        assert_eq!(badge.unread_count(), 3);
        badge.reset_unread();
        assert_eq!(store.unread_count(), 0);
    }

    /// Known race, accepted: a fetch that resolves after a local increment
    /// overwrites it with the server's (older) view.
    #[tokio::test]
    async fn test_late_fetch_overwrites_local_increment() {
        let store = NotificationStore::new();
        store.set_unread_count(2);

        let gate = Arc::new(Notify::new());
        let source = Gated {
            gate: gate.clone(),
            count: 2,
        };

        let fetching = store.clone();
        let observed = Arc::new(Mutex::new(None));
        let seen = observed.clone();
        let task = tokio::spawn(async move {
            fetching.fetch_unread_count(&source).await;
            *seen.lock().unwrap() = Some(fetching.unread_count());
        });

        // Wait until the fetch is in flight.
        while !store.snapshot().is_loading {
            tokio::task::yield_now().await;
        }

        store.increment_unread();
        assert_eq!(store.unread_count(), 3);

        gate.notify_one();
        task.await.unwrap();

        assert_eq!(store.unread_count(), 2);
        assert_eq!(*observed.lock().unwrap(), Some(2));
    }
}
