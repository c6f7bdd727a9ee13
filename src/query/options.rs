use std::sync::Arc;
use std::time::Duration;

use super::key::QueryKey;
use super::retry::{
  MutationRetry, QueryRetry, RetryPolicy, DEFAULT_BASE_DELAY, DEFAULT_MAX_DELAY,
  DEFAULT_MAX_RETRIES,
};

pub const DEFAULT_GC_TIME: Duration = Duration::from_secs(5 * 60);

/// Per-query tuning.
///
/// Build with the `with_*` methods:
///
/// ```
/// use std::time::Duration;
/// use abattoir_dash::query::QueryOptions;
///
/// let options = QueryOptions::default()
///   .with_stale_time(Duration::from_secs(60))
///   .with_poll_interval(Duration::from_secs(60));
/// assert_eq!(options.max_retries, 3);
/// ```
#[derive(Clone)]
pub struct QueryOptions {
  /// How long a successful result is served without refetching.
  pub stale_time: Duration,
  /// How long an unobserved entry survives before eviction.
  pub gc_time: Duration,
  pub max_retries: u32,
  pub retry_base_delay: Duration,
  pub retry_max_delay: Duration,
  /// Refetch unconditionally at this interval while subscribed.
  pub poll_interval: Option<Duration>,
  pub refetch_on_focus: bool,
  pub refetch_on_reconnect: bool,
  pub refetch_on_mount: bool,
  /// Expose the last good value alongside an error.
  pub keep_stale_on_error: bool,
  /// Replaces the policy built from the retry fields.
  pub retry_policy: Option<Arc<dyn RetryPolicy>>,
}

impl Default for QueryOptions {
  fn default() -> Self {
    Self {
      stale_time: Duration::ZERO,
      gc_time: DEFAULT_GC_TIME,
      max_retries: DEFAULT_MAX_RETRIES,
      retry_base_delay: DEFAULT_BASE_DELAY,
      retry_max_delay: DEFAULT_MAX_DELAY,
      poll_interval: None,
      refetch_on_focus: true,
      refetch_on_reconnect: true,
      refetch_on_mount: true,
      keep_stale_on_error: true,
      retry_policy: None,
    }
  }
}

impl QueryOptions {
  pub fn with_stale_time(mut self, stale_time: Duration) -> Self {
    self.stale_time = stale_time;
    self
  }

  pub fn with_gc_time(mut self, gc_time: Duration) -> Self {
    self.gc_time = gc_time;
    self
  }

  pub fn with_retry(mut self, max_retries: u32) -> Self {
    self.max_retries = max_retries;
    self
  }

  pub fn with_retry_delays(mut self, base: Duration, cap: Duration) -> Self {
    self.retry_base_delay = base;
    self.retry_max_delay = cap;
    self
  }

  pub fn with_retry_policy(mut self, policy: Arc<dyn RetryPolicy>) -> Self {
    self.retry_policy = Some(policy);
    self
  }

  pub fn with_poll_interval(mut self, interval: Duration) -> Self {
    self.poll_interval = Some(interval);
    self
  }

  pub fn refetch_on_focus(mut self, enabled: bool) -> Self {
    self.refetch_on_focus = enabled;
    self
  }

  pub fn refetch_on_reconnect(mut self, enabled: bool) -> Self {
    self.refetch_on_reconnect = enabled;
    self
  }

  pub fn refetch_on_mount(mut self, enabled: bool) -> Self {
    self.refetch_on_mount = enabled;
    self
  }

  pub fn keep_stale_on_error(mut self, enabled: bool) -> Self {
    self.keep_stale_on_error = enabled;
    self
  }

  pub fn retry_policy(&self) -> Arc<dyn RetryPolicy> {
    match &self.retry_policy {
      Some(policy) => policy.clone(),
      None => Arc::new(QueryRetry {
        max_retries: self.max_retries,
        base_delay: self.retry_base_delay,
        max_delay: self.retry_max_delay,
      }),
    }
  }
}

impl std::fmt::Debug for QueryOptions {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("QueryOptions")
      .field("stale_time", &self.stale_time)
      .field("gc_time", &self.gc_time)
      .field("max_retries", &self.max_retries)
      .field("retry_base_delay", &self.retry_base_delay)
      .field("retry_max_delay", &self.retry_max_delay)
      .field("poll_interval", &self.poll_interval)
      .field("refetch_on_focus", &self.refetch_on_focus)
      .field("refetch_on_reconnect", &self.refetch_on_reconnect)
      .field("refetch_on_mount", &self.refetch_on_mount)
      .field("keep_stale_on_error", &self.keep_stale_on_error)
      .finish_non_exhaustive()
  }
}

/// Settings for a write operation.
#[derive(Debug, Clone, Default)]
pub struct MutationOptions {
  pub retry: MutationRetry,
  /// Prefixes invalidated after a successful write.
  pub invalidates: Vec<QueryKey>,
}

impl MutationOptions {
  pub fn with_retry(mut self, max_retries: u32) -> Self {
    self.retry.max_retries = max_retries;
    self
  }

  pub fn invalidating(mut self, prefix: QueryKey) -> Self {
    self.invalidates.push(prefix);
    self
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::query::error::FetchError;

  #[test]
  fn test_defaults() {
    let options = QueryOptions::default();
    assert_eq!(options.stale_time, Duration::ZERO);
    assert_eq!(options.gc_time, Duration::from_secs(300));
    assert_eq!(options.max_retries, 3);
    assert!(options.poll_interval.is_none());
    assert!(options.refetch_on_focus && options.refetch_on_reconnect && options.refetch_on_mount);
    assert!(options.keep_stale_on_error);
  }

  #[test]
  fn test_retry_policy_follows_fields() {
    let options = QueryOptions::default()
      .with_retry(1)
      .with_retry_delays(Duration::from_millis(100), Duration::from_millis(250));
    let policy = options.retry_policy();
    let err = FetchError::from_status(500, "boom");
    assert!(policy.should_retry(1, &err));
    assert!(!policy.should_retry(2, &err));
    assert_eq!(policy.delay_for(2), Duration::from_millis(250));
  }

  #[test]
  fn test_mutation_options_builder() {
    let options = MutationOptions::default()
      .with_retry(2)
      .invalidating(crate::query_key!["orders"]);
    assert_eq!(options.retry.max_retries, 2);
    assert_eq!(options.invalidates, vec![crate::query_key!["orders"]]);
  }
}
