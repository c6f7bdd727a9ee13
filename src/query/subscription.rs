use std::sync::{Arc, Weak};

use tokio::time::Instant;
use tracing::debug;

use super::client::{Inner, Listener, QueryClient};
use super::key::QueryKey;
use super::state::AnyResult;

/// Keeps a listener registered on a key. Dropping it unsubscribes.
pub struct Subscription {
  client: Weak<Inner>,
  key: QueryKey,
  id: u64,
}

impl Subscription {
  pub fn key(&self) -> &QueryKey {
    &self.key
  }
}

impl std::fmt::Debug for Subscription {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Subscription")
      .field("key", &self.key)
      .field("id", &self.id)
      .finish()
  }
}

impl Drop for Subscription {
  fn drop(&mut self) {
    if let Some(client) = QueryClient::upgrade(&self.client) {
      client.unsubscribe(&self.key, self.id);
    }
  }
}

impl QueryClient {
  /// Register `listener` for changes to `key`, creating an idle entry if
  /// needed. The listener runs synchronously on whichever task caused the
  /// change, after the client's lock is released.
  pub fn subscribe<F>(&self, key: &QueryKey, listener: F) -> Subscription
  where
    F: Fn(&AnyResult) + Send + Sync + 'static,
  {
    let listener: Listener = Arc::new(listener);
    let id = self.with_state(|state| {
      state.next_listener_id += 1;
      let id = state.next_listener_id;
      let entry = state.store.ensure(key);
      entry.subscribers += 1;
      entry.idle_since = None;
      state.cancel_gc(key);
      state
        .listeners
        .entry(key.hash())
        .or_default()
        .push((id, listener));
      id
    });
    debug!(key = %key, id, "Subscribed");
    Subscription {
      client: Arc::downgrade(&self.inner),
      key: key.clone(),
      id,
    }
  }

  fn unsubscribe(&self, key: &QueryKey, id: u64) {
    self.with_state(|state| {
      let hash = key.hash();
      let removed = match state.listeners.get_mut(&hash) {
        Some(listeners) => {
          let before = listeners.len();
          listeners.retain(|(listener_id, _)| *listener_id != id);
          let removed = listeners.len() < before;
          if listeners.is_empty() {
            state.listeners.remove(&hash);
          }
          removed
        }
        None => false,
      };
      if !removed {
        return;
      }
      if let Some(entry) = state.store.get_mut(key) {
        entry.subscribers = entry.subscribers.saturating_sub(1);
        entry.updated_at = Instant::now();
      }
      state.release(&self.inner, key, false);
    });
    debug!(key = %key, id, "Unsubscribed");
  }

  /// Number of live subscriptions on `key`.
  pub fn subscriber_count(&self, key: &QueryKey) -> usize {
    self.with_state(|state| state.store.get(key).map_or(0, |entry| entry.subscribers))
  }
}
