//! Retry decisions for failed fetches.
//!
//! A policy answers two questions: should another attempt be made after
//! `failures` consecutive failures, and how long to wait before retry `n`
//! (zero-based). Delays grow as `min(base * 2^n, cap)`.

use std::time::Duration;

use super::error::{ErrorKind, FetchError};

pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(30);

pub trait RetryPolicy: Send + Sync {
  /// `failures` is the number of consecutive failed attempts so far,
  /// 1 after the first failure.
  fn should_retry(&self, failures: u32, error: &FetchError) -> bool;

  /// Delay before the zero-based retry `retry`.
  fn delay_for(&self, retry: u32) -> Duration;
}

/// `min(base * 2^retry, cap)`, saturating at `cap` on overflow.
pub fn exponential_delay(base: Duration, cap: Duration, retry: u32) -> Duration {
  2u32
    .checked_pow(retry)
    .and_then(|factor| base.checked_mul(factor))
    .map_or(cap, |delay| delay.min(cap))
}

/// Policy used for reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryRetry {
  pub max_retries: u32,
  pub base_delay: Duration,
  pub max_delay: Duration,
}

impl Default for QueryRetry {
  fn default() -> Self {
    Self {
      max_retries: DEFAULT_MAX_RETRIES,
      base_delay: DEFAULT_BASE_DELAY,
      max_delay: DEFAULT_MAX_DELAY,
    }
  }
}

impl RetryPolicy for QueryRetry {
  fn should_retry(&self, failures: u32, error: &FetchError) -> bool {
    match error.kind() {
      ErrorKind::Authorization | ErrorKind::ClientRequest => false,
      ErrorKind::Transient | ErrorKind::Unclassified => failures <= self.max_retries,
    }
  }

  fn delay_for(&self, retry: u32) -> Duration {
    exponential_delay(self.base_delay, self.max_delay, retry)
  }
}

/// Policy used for writes. Any 4xx response is final, including 408 and
/// 429, and the default budget is zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MutationRetry {
  pub max_retries: u32,
  pub base_delay: Duration,
  pub max_delay: Duration,
}

impl Default for MutationRetry {
  fn default() -> Self {
    Self {
      max_retries: 0,
      base_delay: DEFAULT_BASE_DELAY,
      max_delay: DEFAULT_MAX_DELAY,
    }
  }
}

impl RetryPolicy for MutationRetry {
  fn should_retry(&self, failures: u32, error: &FetchError) -> bool {
    if matches!(error.status(), Some(400..=499)) {
      return false;
    }
    match error.kind() {
      ErrorKind::Authorization | ErrorKind::ClientRequest => false,
      ErrorKind::Transient | ErrorKind::Unclassified => failures <= self.max_retries,
    }
  }

  fn delay_for(&self, retry: u32) -> Duration {
    exponential_delay(self.base_delay, self.max_delay, retry)
  }
}
