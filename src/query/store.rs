//! The cache store: one entry per query key, kept for the lifetime of the
//! client. Pure structural mutation; the client drives all I/O.

use std::any::Any;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::future::{BoxFuture, Shared};
use tokio::time::Instant;
use tracing::debug;

use super::error::FetchError;
use super::key::QueryKey;
use super::options::QueryOptions;
use super::state::{AnyResult, QueryState};

/// A cached value with its concrete type erased.
pub type AnyValue = Arc<dyn Any + Send + Sync>;

/// Handle to a running fetch that any number of callers can await.
pub type SharedFetch = Shared<BoxFuture<'static, Result<AnyValue, FetchError>>>;

pub struct CacheEntry {
  pub key: QueryKey,
  pub state: QueryState<AnyValue>,
  /// Last successful value, kept across later failures and refetches.
  pub last_data: Option<AnyValue>,
  pub fetched_at: Option<Instant>,
  pub stale_time: Duration,
  pub gc_time: Duration,
  pub keep_stale_on_error: bool,
  /// False while the entry only carries the defaults `ensure` gave it.
  pub options_applied: bool,
  pub in_flight: Option<SharedFetch>,
  pub subscribers: usize,
  /// Callers currently awaiting `in_flight`.
  pub waiters: usize,
  pub generation: u64,
  pub failure_count: u32,
  /// Set while nobody observes the entry.
  pub idle_since: Option<Instant>,
  pub updated_at: Instant,
}

impl CacheEntry {
  fn new(key: QueryKey, options: Option<&QueryOptions>, generation: u64, now: Instant) -> Self {
    let options_applied = options.is_some();
    let defaults = QueryOptions::default();
    let options = options.unwrap_or(&defaults);
    Self {
      key,
      state: QueryState::Idle,
      last_data: None,
      fetched_at: None,
      stale_time: options.stale_time,
      gc_time: options.gc_time,
      keep_stale_on_error: options.keep_stale_on_error,
      options_applied,
      in_flight: None,
      subscribers: 0,
      waiters: 0,
      generation,
      failure_count: 0,
      idle_since: Some(now),
      updated_at: now,
    }
  }

  /// Successful data younger than the stale time.
  pub fn is_fresh(&self, now: Instant) -> bool {
    match (&self.state, self.fetched_at) {
      (QueryState::Success(_), Some(at)) => now.saturating_duration_since(at) < self.stale_time,
      _ => false,
    }
  }

  pub fn is_observed(&self) -> bool {
    self.subscribers > 0 || self.waiters > 0
  }

  /// Unobserved, not fetching, and idle for at least the gc time.
  pub fn is_collectable(&self, now: Instant) -> bool {
    if self.is_observed() || self.in_flight.is_some() {
      return false;
    }
    self
      .idle_since
      .map(|since| now.saturating_duration_since(since) >= self.gc_time)
      .unwrap_or(false)
  }

  /// Store a successful value.
  pub fn set_data(&mut self, value: AnyValue, now: Instant) {
    self.state = QueryState::Success(value.clone());
    self.last_data = Some(value);
    self.fetched_at = Some(now);
    self.failure_count = 0;
    self.updated_at = now;
  }

  pub fn set_error(&mut self, error: FetchError, now: Instant) {
    self.state = QueryState::Error(error);
    self.updated_at = now;
  }

  pub fn set_loading(&mut self, now: Instant) {
    self.state = QueryState::Loading;
    self.failure_count = 0;
    self.updated_at = now;
  }

  pub fn snapshot(&self, now: Instant) -> AnyResult {
    let stale_data = match &self.state {
      QueryState::Loading => self.last_data.clone(),
      QueryState::Error(_) if self.keep_stale_on_error => self.last_data.clone(),
      _ => None,
    };
    AnyResult {
      state: self.state.clone(),
      stale_data,
      fetched_at: self.fetched_at,
      failure_count: self.failure_count,
      is_stale: !self.is_fresh(now),
    }
  }

  /// Merge options from another caller of the same key. The latest stale
  /// time wins; between callers the gc time only grows. The first caller
  /// replaces the placeholder defaults outright.
  pub fn apply_options(&mut self, options: &QueryOptions) {
    self.stale_time = options.stale_time;
    self.gc_time = if self.options_applied {
      self.gc_time.max(options.gc_time)
    } else {
      options.gc_time
    };
    self.keep_stale_on_error = options.keep_stale_on_error;
    self.options_applied = true;
  }

  /// Forget a fetch that has been superseded. A `Loading` state left
  /// without a fetch falls back to the last value, or `Idle`.
  fn orphan_fetch(&mut self) {
    if self.in_flight.take().is_none() || !self.state.is_loading() {
      return;
    }
    self.state = match &self.last_data {
      Some(value) => QueryState::Success(value.clone()),
      None => QueryState::Idle,
    };
  }
}

#[derive(Default)]
pub struct CacheStore {
  entries: HashMap<String, CacheEntry>,
  next_generation: u64,
}

impl CacheStore {
  pub fn new() -> Self {
    Self::default()
  }

  fn next_generation(&mut self) -> u64 {
    self.next_generation += 1;
    self.next_generation
  }

  pub fn get(&self, key: &QueryKey) -> Option<&CacheEntry> {
    self.entries.get(&key.hash())
  }

  pub fn get_mut(&mut self, key: &QueryKey) -> Option<&mut CacheEntry> {
    self.entries.get_mut(&key.hash())
  }

  pub fn contains(&self, key: &QueryKey) -> bool {
    self.entries.contains_key(&key.hash())
  }

  /// Like [`get_or_create`](Self::get_or_create), but an existing entry
  /// keeps its options.
  pub fn ensure(&mut self, key: &QueryKey) -> &mut CacheEntry {
    match self.entries.entry(key.hash()) {
      Entry::Occupied(occupied) => occupied.into_mut(),
      Entry::Vacant(vacant) => {
        self.next_generation += 1;
        let generation = self.next_generation;
        vacant.insert(CacheEntry::new(key.clone(), None, generation, Instant::now()))
      }
    }
  }

  /// Fetch the entry for `key`, creating an idle one if absent.
  pub fn get_or_create(&mut self, key: &QueryKey, options: &QueryOptions) -> &mut CacheEntry {
    match self.entries.entry(key.hash()) {
      Entry::Occupied(occupied) => {
        let entry = occupied.into_mut();
        entry.apply_options(options);
        entry
      }
      Entry::Vacant(vacant) => {
        self.next_generation += 1;
        let generation = self.next_generation;
        debug!(key = %key, generation, "Creating cache entry");
        vacant.insert(CacheEntry::new(key.clone(), Some(options), generation, Instant::now()))
      }
    }
  }

  /// Mark the entry stale and orphan its in-flight fetch so that a
  /// superseded response cannot land. Subscribers are kept.
  pub fn invalidate(&mut self, key: &QueryKey) -> bool {
    let generation = self.next_generation();
    match self.entries.get_mut(&key.hash()) {
      Some(entry) => {
        entry.fetched_at = None;
        entry.generation = generation;
        entry.orphan_fetch();
        debug!(key = %key, generation, "Invalidated cache entry");
        true
      }
      None => false,
    }
  }

  /// Invalidate every entry whose key starts with `prefix`.
  pub fn invalidate_prefix(&mut self, prefix: &QueryKey) -> Vec<QueryKey> {
    let matched: Vec<QueryKey> = self
      .entries
      .values()
      .filter(|entry| entry.key.starts_with(prefix))
      .map(|entry| entry.key.clone())
      .collect();
    for key in &matched {
      self.invalidate(key);
    }
    matched
  }

  pub fn evict(&mut self, key: &QueryKey) -> Option<CacheEntry> {
    let removed = self.entries.remove(&key.hash());
    if removed.is_some() {
      debug!(key = %key, "Evicted cache entry");
    }
    removed
  }

  /// Evict every collectable entry, returning their keys.
  pub fn sweep(&mut self, now: Instant) -> Vec<QueryKey> {
    let expired: Vec<QueryKey> = self
      .entries
      .values()
      .filter(|entry| entry.is_collectable(now))
      .map(|entry| entry.key.clone())
      .collect();
    for key in &expired {
      self.evict(key);
    }
    expired
  }

  pub fn clear(&mut self) {
    self.entries.clear();
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  pub fn keys(&self) -> Vec<QueryKey> {
    self.entries.values().map(|entry| entry.key.clone()).collect()
  }

  pub fn iter(&self) -> impl Iterator<Item = &CacheEntry> {
    self.entries.values()
  }
}
