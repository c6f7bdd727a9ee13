//! The shared query client.
//!
//! `QueryClient` owns the cache store and decides, per call, whether to
//! serve cached data, join a running fetch or start a new one. Fetches run
//! in their own tokio task and are shared between callers through a
//! [`Shared`](futures::future::Shared) future, so a request is never
//! issued twice for the same key and dropping a caller never cancels it.
//!
//! All state lives behind one mutex. It is only held for short
//! synchronous sections; listeners are invoked after it is released.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError, Weak};

use futures::future::{BoxFuture, FutureExt};
use tokio::runtime::Handle;
use tokio::task::AbortHandle;
use tokio::time::{sleep, sleep_until, Instant};
use tracing::{debug, warn};

use super::error::FetchError;
use super::key::QueryKey;
use super::options::QueryOptions;
use super::retry::RetryPolicy;
use super::state::{AnyResult, QueryResult, QueryState};
use super::store::{AnyValue, CacheStore, SharedFetch};

/// Type-erased fetch function.
pub type Fetcher = Arc<dyn Fn() -> BoxFuture<'static, Result<AnyValue, FetchError>> + Send + Sync>;

/// Type-erased change listener.
pub type Listener = Arc<dyn Fn(&AnyResult) + Send + Sync>;

/// Wrap a typed fetch function so it can be stored in the cache.
pub fn erase_fetcher<V, F, Fut>(fetcher: F) -> Fetcher
where
  V: Send + Sync + 'static,
  F: Fn() -> Fut + Send + Sync + 'static,
  Fut: Future<Output = Result<V, FetchError>> + Send + 'static,
{
  Arc::new(move || {
    let fut = fetcher();
    async move { fut.await.map(|value| Arc::new(value) as AnyValue) }.boxed()
  })
}

/// The most recent fetch function and options used for a key, so that
/// background triggers can refetch it.
#[derive(Clone)]
pub(super) struct Registration {
  pub fetcher: Fetcher,
  pub options: QueryOptions,
}

pub(super) enum Lookup {
  Cached(AnyValue),
  InFlight(SharedFetch),
}

pub(super) struct ClientState {
  pub store: CacheStore,
  pub listeners: HashMap<String, Vec<(u64, Listener)>>,
  pub registrations: HashMap<String, Registration>,
  pub gc_timers: HashMap<String, AbortHandle>,
  pub next_listener_id: u64,
  pub online: bool,
  /// Notifications collected under the lock, delivered after it is released.
  pub pending: Vec<(Vec<Listener>, AnyResult)>,
}

impl ClientState {
  fn new() -> Self {
    Self {
      store: CacheStore::new(),
      listeners: HashMap::new(),
      registrations: HashMap::new(),
      gc_timers: HashMap::new(),
      next_listener_id: 0,
      online: true,
      pending: Vec::new(),
    }
  }

  /// Serve from cache, join the running fetch, or start a new one.
  /// `waiter` counts the caller as observing the key until it releases.
  pub fn begin(
    &mut self,
    inner: &Arc<Inner>,
    key: &QueryKey,
    fetcher: &Fetcher,
    options: &QueryOptions,
    force: bool,
    waiter: bool,
  ) -> Lookup {
    let now = Instant::now();
    let hash = key.hash();
    self.registrations.insert(
      hash.clone(),
      Registration {
        fetcher: fetcher.clone(),
        options: options.clone(),
      },
    );

    let entry = self.store.get_or_create(key, options);
    if waiter {
      entry.waiters += 1;
      entry.idle_since = None;
      if let Some(timer) = self.gc_timers.remove(&hash) {
        timer.abort();
      }
    }

    if !force && entry.is_fresh(now) {
      if let QueryState::Success(value) = &entry.state {
        debug!(key = %key, "Cache hit");
        return Lookup::Cached(value.clone());
      }
    }
    if let Some(fetch) = &entry.in_flight {
      debug!(key = %key, "Joining in-flight fetch");
      return Lookup::InFlight(fetch.clone());
    }

    debug!(key = %key, force, "Cache miss, fetching");
    entry.set_loading(now);
    let fetch = start_fetch(
      inner,
      key.clone(),
      entry.generation,
      fetcher.clone(),
      options.retry_policy(),
    );
    entry.in_flight = Some(fetch.clone());
    self.notify(key, now);
    Lookup::InFlight(fetch)
  }

  /// Queue a snapshot of `key` for its listeners.
  pub fn notify(&mut self, key: &QueryKey, now: Instant) {
    let Some(listeners) = self.listeners.get(&key.hash()) else {
      return;
    };
    if listeners.is_empty() {
      return;
    }
    let Some(entry) = self.store.get(key) else {
      return;
    };
    let listeners = listeners.iter().map(|(_, l)| l.clone()).collect();
    self.pending.push((listeners, entry.snapshot(now)));
  }

  /// Start the gc horizon for `key` if nothing observes it. `reset`
  /// restarts the horizon from now.
  pub fn release(&mut self, inner: &Arc<Inner>, key: &QueryKey, reset: bool) {
    let now = Instant::now();
    let Some(entry) = self.store.get_mut(key) else {
      return;
    };
    if entry.is_observed() {
      return;
    }
    let since = match entry.idle_since {
      Some(since) if !reset => since,
      _ => {
        entry.idle_since = Some(now);
        now
      }
    };
    if let Some(deadline) = since.checked_add(entry.gc_time) {
      self.schedule_gc(inner, key, deadline);
    }
  }

  fn schedule_gc(&mut self, inner: &Arc<Inner>, key: &QueryKey, deadline: Instant) {
    let Ok(runtime) = Handle::try_current() else {
      return;
    };
    let weak = Arc::downgrade(inner);
    let timer_key = key.clone();
    let task = runtime.spawn(async move {
      sleep_until(deadline).await;
      if let Some(client) = QueryClient::upgrade(&weak) {
        client.collect(&timer_key);
      }
    });
    if let Some(previous) = self.gc_timers.insert(key.hash(), task.abort_handle()) {
      previous.abort();
    }
  }

  pub fn cancel_gc(&mut self, key: &QueryKey) {
    if let Some(timer) = self.gc_timers.remove(&key.hash()) {
      timer.abort();
    }
  }

  /// Drop everything the client knows about `key`.
  pub fn forget(&mut self, key: &QueryKey) -> bool {
    let hash = key.hash();
    self.cancel_gc(key);
    self.registrations.remove(&hash);
    if self.listeners.get(&hash).is_some_and(|l| l.is_empty()) {
      self.listeners.remove(&hash);
    }
    self.store.evict(key).is_some()
  }

  /// Keys with subscribers whose registration passes `wants` and whose
  /// data is not fresh.
  fn stale_observed(&self, wants: impl Fn(&QueryOptions) -> bool) -> Vec<(QueryKey, Registration)> {
    let now = Instant::now();
    self
      .store
      .iter()
      .filter(|entry| entry.subscribers > 0 && !entry.is_fresh(now))
      .filter_map(|entry| {
        let registration = self.registrations.get(&entry.key.hash())?;
        wants(&registration.options).then(|| (entry.key.clone(), registration.clone()))
      })
      .collect()
  }
}

pub(super) struct Inner {
  state: Mutex<ClientState>,
}

/// Cloneable handle to the shared cache.
///
/// Create one at start-up and pass clones to every consumer. Methods that
/// start fetches must be called from within a tokio runtime.
#[derive(Clone)]
pub struct QueryClient {
  pub(super) inner: Arc<Inner>,
}

impl Default for QueryClient {
  fn default() -> Self {
    Self::new()
  }
}

impl fmt::Debug for QueryClient {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("QueryClient")
      .field("entries", &self.len())
      .field("online", &self.is_online())
      .finish_non_exhaustive()
  }
}

impl QueryClient {
  pub fn new() -> Self {
    Self {
      inner: Arc::new(Inner {
        state: Mutex::new(ClientState::new()),
      }),
    }
  }

  pub(super) fn upgrade(weak: &Weak<Inner>) -> Option<Self> {
    weak.upgrade().map(|inner| Self { inner })
  }

  /// Run `f` under the lock, then deliver the notifications it queued.
  pub(super) fn with_state<R>(&self, f: impl FnOnce(&mut ClientState) -> R) -> R {
    let (result, pending) = {
      let mut state = self
        .inner
        .state
        .lock()
        .unwrap_or_else(PoisonError::into_inner);
      let result = f(&mut state);
      (result, std::mem::take(&mut state.pending))
    };
    for (listeners, snapshot) in pending {
      for listener in listeners {
        listener(&snapshot);
      }
    }
    result
  }

  /// Return cached data for `key` if fresh, otherwise fetch it. Concurrent
  /// calls for the same key share one fetch and receive the same value.
  pub async fn fetch_query<V, F, Fut>(
    &self,
    key: &QueryKey,
    options: &QueryOptions,
    fetcher: F,
  ) -> Result<Arc<V>, FetchError>
  where
    V: Send + Sync + 'static,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<V, FetchError>> + Send + 'static,
  {
    let value = self
      .execute(key, erase_fetcher(fetcher), options, false)
      .await?;
    downcast_value(key, value)
  }

  /// Fetch `key` regardless of freshness. Still joins a fetch that is
  /// already running.
  pub async fn refetch_query<V, F, Fut>(
    &self,
    key: &QueryKey,
    options: &QueryOptions,
    fetcher: F,
  ) -> Result<Arc<V>, FetchError>
  where
    V: Send + Sync + 'static,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<V, FetchError>> + Send + 'static,
  {
    let value = self
      .execute(key, erase_fetcher(fetcher), options, true)
      .await?;
    downcast_value(key, value)
  }

  pub(super) async fn execute(
    &self,
    key: &QueryKey,
    fetcher: Fetcher,
    options: &QueryOptions,
    force: bool,
  ) -> Result<AnyValue, FetchError> {
    let lookup =
      self.with_state(|state| state.begin(&self.inner, key, &fetcher, options, force, true));
    let _waiter = WaiterGuard { client: self, key };
    match lookup {
      Lookup::Cached(value) => Ok(value),
      Lookup::InFlight(fetch) => fetch.await,
    }
  }

  /// Start a fetch in the background without waiting for it.
  pub(super) fn spawn_fetch(
    &self,
    key: &QueryKey,
    fetcher: &Fetcher,
    options: &QueryOptions,
    force: bool,
  ) {
    self.with_state(|state| {
      state.begin(&self.inner, key, fetcher, options, force, false);
    });
  }

  /// Refetch `key` in the background with the fetch function last used
  /// for it. Returns false when the key has never been fetched.
  pub fn refetch(&self, key: &QueryKey) -> bool {
    let registration = self.with_state(|state| state.registrations.get(&key.hash()).cloned());
    match registration {
      Some(registration) => {
        self.spawn_fetch(key, &registration.fetcher, &registration.options, true);
        true
      }
      None => false,
    }
  }

  /// Mark `key` stale. If it is observed, a refetch starts immediately.
  pub fn invalidate(&self, key: &QueryKey) -> bool {
    self.with_state(|state| {
      if !state.store.invalidate(key) {
        return false;
      }
      refetch_if_observed(state, &self.inner, key);
      true
    })
  }

  /// Invalidate every key starting with `prefix`.
  pub fn invalidate_prefix(&self, prefix: &QueryKey) -> Vec<QueryKey> {
    self.with_state(|state| {
      let matched = state.store.invalidate_prefix(prefix);
      for key in &matched {
        refetch_if_observed(state, &self.inner, key);
      }
      debug!(prefix = %prefix, count = matched.len(), "Invalidated keys");
      matched
    })
  }

  /// The application window regained focus.
  pub fn on_focus(&self) -> usize {
    self.refetch_stale("focus", |options| options.refetch_on_focus)
  }

  /// Record connectivity. Going from offline to online refetches stale
  /// observed keys.
  pub fn set_online(&self, online: bool) -> usize {
    let reconnected = self.with_state(|state| {
      let was_online = state.online;
      state.online = online;
      online && !was_online
    });
    if reconnected {
      self.refetch_stale("reconnect", |options| options.refetch_on_reconnect)
    } else {
      0
    }
  }

  pub fn is_online(&self) -> bool {
    self.with_state(|state| state.online)
  }

  fn refetch_stale(&self, reason: &str, wants: impl Fn(&QueryOptions) -> bool) -> usize {
    self.with_state(|state| {
      let targets = state.stale_observed(wants);
      for (key, registration) in &targets {
        debug!(key = %key, reason, "Refetching stale key");
        state.begin(
          &self.inner,
          key,
          &registration.fetcher,
          &registration.options,
          false,
          false,
        );
      }
      targets.len()
    })
  }

  /// Write a value into the cache as if it had just been fetched.
  pub fn set_query_data<V: Send + Sync + 'static>(&self, key: &QueryKey, value: V) {
    self.with_state(|state| {
      let now = Instant::now();
      state.store.ensure(key).set_data(Arc::new(value), now);
      state.notify(key, now);
      state.release(&self.inner, key, true);
    });
  }

  /// Last successfully fetched value for `key`, fresh or not.
  pub fn get_query_data<V: Send + Sync + 'static>(&self, key: &QueryKey) -> Option<Arc<V>> {
    let value = self.with_state(|state| state.store.get(key)?.last_data.clone())?;
    value.downcast::<V>().ok()
  }

  /// Typed snapshot of `key`, or `None` when absent or of another type.
  pub fn query_result<V: Send + Sync + 'static>(&self, key: &QueryKey) -> Option<QueryResult<V>> {
    self.snapshot(key)?.downcast::<V>()
  }

  pub fn snapshot(&self, key: &QueryKey) -> Option<AnyResult> {
    self.with_state(|state| {
      let now = Instant::now();
      state.store.get(key).map(|entry| entry.snapshot(now))
    })
  }

  pub fn contains(&self, key: &QueryKey) -> bool {
    self.with_state(|state| state.store.contains(key))
  }

  pub fn len(&self) -> usize {
    self.with_state(|state| state.store.len())
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  pub fn keys(&self) -> Vec<QueryKey> {
    self.with_state(|state| state.store.keys())
  }

  /// Remove `key` unconditionally.
  pub fn remove(&self, key: &QueryKey) -> bool {
    self.with_state(|state| state.forget(key))
  }

  /// Evict every entry past its gc horizon.
  pub fn sweep(&self) -> Vec<QueryKey> {
    self.with_state(|state| {
      let evicted = state.store.sweep(Instant::now());
      for key in &evicted {
        state.forget(key);
      }
      evicted
    })
  }

  /// Evict `key` if it is past its gc horizon.
  pub(super) fn collect(&self, key: &QueryKey) -> bool {
    self.with_state(|state| {
      state.gc_timers.remove(&key.hash());
      let collectable = state
        .store
        .get(key)
        .is_some_and(|entry| entry.is_collectable(Instant::now()));
      if collectable {
        debug!(key = %key, "Garbage collecting unobserved entry");
        state.forget(key);
      }
      collectable
    })
  }

  /// Drop all cached data and stop gc timers. Running fetches finish but
  /// their results are discarded.
  pub fn shutdown(&self) {
    self.with_state(|state| {
      for (_, timer) in state.gc_timers.drain() {
        timer.abort();
      }
      state.store.clear();
      state.registrations.clear();
      state.listeners.clear();
    });
    debug!("Query client shut down");
  }

  /// Apply the outcome of a fetch unless the entry has moved on to a
  /// newer generation.
  fn settle(
    &self,
    key: &QueryKey,
    generation: u64,
    outcome: Result<AnyValue, FetchError>,
    failures: u32,
  ) {
    self.with_state(|state| {
      let now = Instant::now();
      let Some(entry) = state.store.get_mut(key) else {
        debug!(key = %key, "Entry gone, dropping fetch result");
        return;
      };
      if entry.generation != generation {
        debug!(key = %key, generation, current = entry.generation, "Discarding superseded result");
        state.release(&self.inner, key, false);
        return;
      }
      entry.in_flight = None;
      match outcome {
        Ok(value) => {
          debug!(key = %key, "Fetch succeeded");
          entry.set_data(value, now);
          state.online = true;
        }
        Err(error) => {
          warn!(key = %key, failures, error = %error, "Fetch failed");
          entry.failure_count = failures;
          if error.is_network() {
            state.online = false;
          }
          entry.set_error(error, now);
        }
      }
      state.notify(key, now);
      state.release(&self.inner, key, true);
    });
  }

  /// Record a failed attempt that will be retried. Returns false when the
  /// fetch has been superseded.
  fn note_failure(&self, key: &QueryKey, generation: u64, failures: u32, error: &FetchError) -> bool {
    self.with_state(|state| {
      let Some(entry) = state.store.get_mut(key) else {
        return false;
      };
      if entry.generation != generation {
        state.release(&self.inner, key, false);
        return false;
      }
      entry.failure_count = failures;
      if error.is_network() {
        state.online = false;
      }
      true
    })
  }

  /// Decide after a retry delay whether to try again. An unobserved key
  /// settles with the last error instead.
  fn resume_retry(&self, key: &QueryKey, generation: u64, error: &FetchError) -> bool {
    self.with_state(|state| {
      let now = Instant::now();
      let Some(entry) = state.store.get_mut(key) else {
        return false;
      };
      if entry.generation != generation {
        state.release(&self.inner, key, false);
        return false;
      }
      if entry.is_observed() {
        return true;
      }
      debug!(key = %key, "Abandoning retry, key is no longer observed");
      entry.in_flight = None;
      entry.set_error(error.clone(), now);
      state.notify(key, now);
      state.release(&self.inner, key, true);
      false
    })
  }
}

fn refetch_if_observed(state: &mut ClientState, inner: &Arc<Inner>, key: &QueryKey) {
  let observed = state.store.get(key).is_some_and(|entry| entry.is_observed());
  if !observed {
    return;
  }
  if let Some(registration) = state.registrations.get(&key.hash()).cloned() {
    state.begin(
      inner,
      key,
      &registration.fetcher,
      &registration.options,
      false,
      false,
    );
  }
}

fn downcast_value<V: Send + Sync + 'static>(key: &QueryKey, value: AnyValue) -> Result<Arc<V>, FetchError> {
  value.downcast::<V>().map_err(|_| {
    FetchError::unclassified(format!("cached value for {} has a different type", key))
  })
}

/// Keeps a caller counted as observing the key while it awaits a fetch.
struct WaiterGuard<'a> {
  client: &'a QueryClient,
  key: &'a QueryKey,
}

impl Drop for WaiterGuard<'_> {
  fn drop(&mut self) {
    self.client.with_state(|state| {
      if let Some(entry) = state.store.get_mut(self.key) {
        entry.waiters = entry.waiters.saturating_sub(1);
      }
      state.release(&self.client.inner, self.key, false);
    });
  }
}

fn start_fetch(
  inner: &Arc<Inner>,
  key: QueryKey,
  generation: u64,
  fetcher: Fetcher,
  policy: Arc<dyn RetryPolicy>,
) -> SharedFetch {
  let task = tokio::spawn(run_fetch(
    Arc::downgrade(inner),
    key,
    generation,
    fetcher,
    policy,
  ));
  async move {
    task
      .await
      .unwrap_or_else(|e| Err(FetchError::unclassified(format!("fetch task failed: {}", e))))
  }
  .boxed()
  .shared()
}

/// One fetch with its retries. Holds only a weak reference to the client
/// so a dropped client does not keep retrying.
async fn run_fetch(
  inner: Weak<Inner>,
  key: QueryKey,
  generation: u64,
  fetcher: Fetcher,
  policy: Arc<dyn RetryPolicy>,
) -> Result<AnyValue, FetchError> {
  let mut failures = 0;
  loop {
    let outcome = fetcher().await;
    let Some(client) = QueryClient::upgrade(&inner) else {
      return outcome;
    };
    let error = match outcome {
      Ok(value) => {
        client.settle(&key, generation, Ok(value.clone()), failures);
        return Ok(value);
      }
      Err(error) => error,
    };

    failures += 1;
    if !policy.should_retry(failures, &error) {
      client.settle(&key, generation, Err(error.clone()), failures);
      return Err(error);
    }
    if !client.note_failure(&key, generation, failures, &error) {
      return Err(error);
    }
    drop(client);

    let delay = policy.delay_for(failures - 1);
    debug!(key = %key, failures, ?delay, error = %error, "Retrying fetch");
    sleep(delay).await;

    let Some(client) = QueryClient::upgrade(&inner) else {
      return Err(error);
    };
    if !client.resume_retry(&key, generation, &error) {
      return Err(error);
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::query::state::QueryStatus;
  use crate::query_key;
  use std::sync::atomic::{AtomicU32, Ordering};
  use std::time::Duration;

  fn counter() -> Arc<AtomicU32> {
    Arc::new(AtomicU32::new(0))
  }

  #[tokio::test(start_paused = true)]
  async fn test_fresh_hit_makes_no_call() {
    let client = QueryClient::new();
    let key = query_key!["stock", "data", 6];
    let options = QueryOptions::default().with_stale_time(Duration::from_secs(60));
    let calls = counter();

    for _ in 0..3 {
      let calls = calls.clone();
      let value = client
        .fetch_query(&key, &options, move || {
          let calls = calls.clone();
          async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok::<_, FetchError>(42u32)
          }
        })
        .await
        .unwrap();
      assert_eq!(*value, 42);
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test(start_paused = true)]
  async fn test_concurrent_callers_share_one_fetch() {
    let client = QueryClient::new();
    let key = query_key!["orders", "list", 6];
    let options = QueryOptions::default();
    let calls = counter();

    let requests = (0..5).map(|_| {
      let calls = calls.clone();
      client.fetch_query(&key, &options, move || {
        let calls = calls.clone();
        async move {
          calls.fetch_add(1, Ordering::SeqCst);
          sleep(Duration::from_millis(100)).await;
          Ok::<_, FetchError>(vec![1, 2, 3])
        }
      })
    });
    let results: Vec<_> = futures::future::join_all(requests)
      .await
      .into_iter()
      .map(|r| r.unwrap())
      .collect();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(results.iter().all(|r| Arc::ptr_eq(r, &results[0])));
  }

  #[tokio::test(start_paused = true)]
  async fn test_concurrent_callers_share_one_error() {
    let client = QueryClient::new();
    let key = query_key!["orders", "detail", 404];
    let options = QueryOptions::default();
    let calls = counter();

    let requests = (0..3).map(|_| {
      let calls = calls.clone();
      client.fetch_query(&key, &options, move || {
        let calls = calls.clone();
        async move {
          calls.fetch_add(1, Ordering::SeqCst);
          sleep(Duration::from_millis(10)).await;
          Err::<u32, _>(FetchError::from_status(404, "no such order"))
        }
      })
    });
    let results = futures::future::join_all(requests).await;

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    for result in results {
      assert_eq!(result.unwrap_err(), FetchError::from_status(404, "no such order"));
    }
  }

  #[tokio::test(start_paused = true)]
  async fn test_authorization_failure_is_not_retried() {
    let client = QueryClient::new();
    let key = query_key!["stock", "data", 1];
    let calls = counter();

    let fetch_calls = calls.clone();
    let result = client
      .fetch_query(&key, &QueryOptions::default(), move || {
        let calls = fetch_calls.clone();
        async move {
          calls.fetch_add(1, Ordering::SeqCst);
          Err::<u32, _>(FetchError::from_status(401, "token expired"))
        }
      })
      .await;

    assert!(result.is_err());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    let snapshot = client.snapshot(&key).unwrap();
    assert_eq!(snapshot.status(), QueryStatus::Error);
    assert_eq!(snapshot.failure_count, 1);
  }

  #[tokio::test(start_paused = true)]
  async fn test_transient_failures_back_off_exponentially() {
    let client = QueryClient::new();
    let key = query_key!["history", "list", 1];
    let options = QueryOptions::default()
      .with_retry(3)
      .with_retry_delays(Duration::from_secs(1), Duration::from_secs(30));
    let attempts = Arc::new(Mutex::new(Vec::new()));

    let recorded = attempts.clone();
    let result = client
      .fetch_query(&key, &options, move || {
        let recorded = recorded.clone();
        async move {
          recorded.lock().unwrap().push(Instant::now());
          Err::<u32, _>(FetchError::from_status(503, "unavailable"))
        }
      })
      .await;

    assert!(result.is_err());
    let attempts = attempts.lock().unwrap();
    assert_eq!(attempts.len(), 4);
    let gaps: Vec<u128> = attempts
      .windows(2)
      .map(|w| (w[1] - w[0]).as_millis())
      .collect();
    assert_eq!(gaps, vec![1000, 2000, 4000]);
    assert_eq!(client.snapshot(&key).unwrap().failure_count, 4);
  }

  #[tokio::test(start_paused = true)]
  async fn test_invalidate_forces_refetch_within_stale_time() {
    let client = QueryClient::new();
    let key = query_key!["stock", "data", 6];
    let options = QueryOptions::default().with_stale_time(Duration::from_secs(60));
    let calls = counter();

    let fetch = |calls: Arc<AtomicU32>| {
      move || {
        let calls = calls.clone();
        async move { Ok::<_, FetchError>(calls.fetch_add(1, Ordering::SeqCst) + 1) }
      }
    };

    let first = client.fetch_query(&key, &options, fetch(calls.clone())).await.unwrap();
    assert!(client.invalidate(&key));
    let second = client.fetch_query(&key, &options, fetch(calls.clone())).await.unwrap();

    assert_eq!((*first, *second), (1, 2));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
  }

  #[tokio::test(start_paused = true)]
  async fn test_superseded_result_is_discarded() {
    let client = QueryClient::new();
    let key = query_key!["orders", "list", 6];
    let options = QueryOptions::default();
    let calls = counter();

    let fetch_calls = calls.clone();
    let fetcher = move || {
      let calls = fetch_calls.clone();
      async move {
        let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
        let delay = if n == 1 { 100 } else { 10 };
        sleep(Duration::from_millis(delay)).await;
        Ok::<_, FetchError>(n)
      }
    };

    let waiting = {
      let client = client.clone();
      let key = key.clone();
      let options = options.clone();
      tokio::spawn(async move { client.fetch_query(&key, &options, fetcher).await })
    };
    sleep(Duration::from_millis(5)).await;

    // The pending caller keeps the key observed, so this starts a new fetch.
    client.invalidate(&key);
    let first = waiting.await.unwrap().unwrap();
    sleep(Duration::from_millis(200)).await;

    assert_eq!(*first, 1);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(client.get_query_data::<u32>(&key).as_deref(), Some(&2));
  }

  #[tokio::test(start_paused = true)]
  async fn test_unobserved_entry_is_collected_after_gc_time() {
    let client = QueryClient::new();
    let key = query_key!["history", "list", 3];
    let options = QueryOptions::default().with_gc_time(Duration::from_secs(10));

    client
      .fetch_query(&key, &options, || async { Ok::<_, FetchError>("rows") })
      .await
      .unwrap();
    assert!(client.contains(&key));

    sleep(Duration::from_secs(9)).await;
    assert!(client.contains(&key));

    sleep(Duration::from_secs(2)).await;
    assert!(!client.contains(&key));
  }

  #[tokio::test(start_paused = true)]
  async fn test_error_keeps_stale_data() {
    let client = QueryClient::new();
    let key = query_key!["stock", "data", 9];
    let options = QueryOptions::default().with_retry(0);
    client.set_query_data(&key, 7u32);

    let result = client
      .refetch_query(&key, &options, || async {
        Err::<u32, _>(FetchError::from_status(500, "boom"))
      })
      .await;
    assert!(result.is_err());

    let snapshot = client.query_result::<u32>(&key).unwrap();
    assert_eq!(snapshot.status(), QueryStatus::Error);
    assert!(snapshot.data().is_none());
    assert_eq!(snapshot.data_or_stale().map(|v| **v), Some(7));
  }

  #[tokio::test(start_paused = true)]
  async fn test_network_error_marks_offline() {
    let client = QueryClient::new();
    let key = query_key!["stock", "data", 4];
    let options = QueryOptions::default().with_retry(0);

    let _ = client
      .fetch_query(&key, &options, || async {
        Err::<u32, _>(FetchError::network("connection refused"))
      })
      .await;
    assert!(!client.is_online());

    client
      .refetch_query(&key, &options, || async { Ok::<_, FetchError>(1u32) })
      .await
      .unwrap();
    assert!(client.is_online());
  }

  #[tokio::test(start_paused = true)]
  async fn test_remove_and_shutdown() {
    let client = QueryClient::new();
    client.set_query_data(&query_key!["a"], 1u8);
    client.set_query_data(&query_key!["b"], 2u8);
    assert_eq!(client.len(), 2);

    assert!(client.remove(&query_key!["a"]));
    assert!(!client.remove(&query_key!["a"]));
    client.shutdown();
    assert!(client.is_empty());
  }

  #[tokio::test(start_paused = true)]
  async fn test_wrong_type_is_an_error() {
    let client = QueryClient::new();
    let key = query_key!["stock", "data", 5];
    client.set_query_data(&key, 1u32);

    let options = QueryOptions::default().with_stale_time(Duration::from_secs(60));
    let result = client
      .fetch_query(&key, &options, || async { Ok::<_, FetchError>(String::new()) })
      .await;
    assert!(result.is_err());
    assert!(client.get_query_data::<String>(&key).is_none());
  }

  #[tokio::test(start_paused = true)]
  async fn test_invalidated_background_fetch_is_still_collected() {
    let client = QueryClient::new();
    let key = query_key!["orders", "detail", 7];
    let options = QueryOptions::default().with_gc_time(Duration::from_secs(10));
    let calls = counter();

    let fetch_calls = calls.clone();
    let fetcher = move || {
      let calls = fetch_calls.clone();
      async move {
        let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
        if n > 1 {
          sleep(Duration::from_secs(20)).await;
        }
        Ok::<_, FetchError>(n)
      }
    };

    client.fetch_query(&key, &options, fetcher).await.unwrap();
    sleep(Duration::from_secs(5)).await;
    assert!(client.refetch(&key));

    // The gc deadline passes while the background fetch is running.
    sleep(Duration::from_secs(7)).await;
    assert!(client.contains(&key));
    assert!(client.invalidate(&key));
    assert_eq!(client.snapshot(&key).unwrap().status(), QueryStatus::Success);

    sleep(Duration::from_secs(20)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert!(!client.contains(&key));
  }
}

