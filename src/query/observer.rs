//! `QueryHandle`: what a view holds to display one query.

use std::future::Future;
use std::marker::PhantomData;
use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::debug;

use super::client::{erase_fetcher, Fetcher, Inner, QueryClient, Registration};
use super::error::FetchError;
use super::key::QueryKey;
use super::options::QueryOptions;
use super::state::{AnyResult, QueryResult, QueryState};
use super::subscription::Subscription;

/// A live subscription to one query plus the means to refetch it.
///
/// Dropping the handle unsubscribes and stops polling.
pub struct QueryHandle<V> {
  client: QueryClient,
  key: QueryKey,
  options: QueryOptions,
  fetcher: Fetcher,
  poller: Option<JoinHandle<()>>,
  _subscription: Subscription,
  _marker: PhantomData<fn() -> V>,
}

impl QueryClient {
  /// Observe `key`: subscribe `listener`, fetch on mount and arm polling.
  ///
  /// A missing or failed entry is always fetched. Successful data is
  /// refetched on mount only when stale and `refetch_on_mount` is set.
  pub fn watch<V, F, Fut, L>(
    &self,
    key: &QueryKey,
    options: QueryOptions,
    fetcher: F,
    listener: L,
  ) -> QueryHandle<V>
  where
    V: Send + Sync + 'static,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<V, FetchError>> + Send + 'static,
    L: Fn(&QueryResult<V>) + Send + Sync + 'static,
  {
    let fetcher = erase_fetcher(fetcher);
    let subscription = self.subscribe(key, move |result: &AnyResult| {
      if let Some(typed) = result.downcast::<V>() {
        listener(&typed);
      }
    });

    let mount = self.with_state(|state| {
      state.registrations.insert(
        key.hash(),
        Registration {
          fetcher: fetcher.clone(),
          options: options.clone(),
        },
      );
      let entry = state.store.get_or_create(key, &options);
      !matches!(entry.state, QueryState::Success(_)) || options.refetch_on_mount
    });
    if mount {
      self.spawn_fetch(key, &fetcher, &options, false);
    }

    let poller = options
      .poll_interval
      .filter(|every| !every.is_zero())
      .map(|every| spawn_poller(Arc::downgrade(&self.inner), key.clone(), every));

    QueryHandle {
      client: self.clone(),
      key: key.clone(),
      options,
      fetcher,
      poller,
      _subscription: subscription,
      _marker: PhantomData,
    }
  }

  fn is_subscribed(&self, key: &QueryKey) -> bool {
    self.subscriber_count(key) > 0
  }
}

/// Polls regardless of freshness, only while the key has subscribers.
fn spawn_poller(client: Weak<Inner>, key: QueryKey, every: Duration) -> JoinHandle<()> {
  tokio::spawn(async move {
    let mut ticks = interval(every);
    ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticks.tick().await;
    loop {
      ticks.tick().await;
      let Some(client) = QueryClient::upgrade(&client) else {
        break;
      };
      if !client.is_subscribed(&key) {
        continue;
      }
      debug!(key = %key, "Polling");
      client.refetch(&key);
    }
  })
}

impl<V: Send + Sync + 'static> QueryHandle<V> {
  pub fn key(&self) -> &QueryKey {
    &self.key
  }

  /// Current snapshot. Idle if the entry is gone.
  pub fn result(&self) -> QueryResult<V> {
    self
      .client
      .query_result::<V>(&self.key)
      .unwrap_or_else(|| QueryResult {
        state: QueryState::Idle,
        stale_data: None,
        fetched_at: None,
        failure_count: 0,
        is_stale: true,
      })
  }

  /// Fresh data, falling back to the stale value.
  pub fn data(&self) -> Option<Arc<V>> {
    self.result().data_or_stale().cloned()
  }

  /// Fetch now in the background, regardless of freshness.
  pub fn refetch(&self) {
    self
      .client
      .spawn_fetch(&self.key, &self.fetcher, &self.options, true);
  }

  /// Fetch now and wait for the outcome.
  pub async fn refetch_now(&self) -> Result<Arc<V>, FetchError> {
    let value = self
      .client
      .execute(&self.key, self.fetcher.clone(), &self.options, true)
      .await?;
    value.downcast::<V>().map_err(|_| {
      FetchError::unclassified(format!("cached value for {} has a different type", self.key))
    })
  }
}

impl<V> Drop for QueryHandle<V> {
  fn drop(&mut self) {
    if let Some(poller) = self.poller.take() {
      poller.abort();
    }
  }
}

impl<V> std::fmt::Debug for QueryHandle<V> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("QueryHandle")
      .field("key", &self.key)
      .field("options", &self.options)
      .field("polling", &self.poller.is_some())
      .finish()
  }
}
