//! Query states and the snapshots handed to consumers.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use tokio::time::Instant;

use super::error::FetchError;

/// The state of a cache entry.
///
/// Data and error are carried by the variants, so a successful entry can
/// never hold an error and a failed one never holds data.
#[derive(Debug, Clone)]
pub enum QueryState<T> {
  /// Nothing fetched yet
  Idle,
  /// A fetch (or a retry delay) is in progress
  Loading,
  /// Last fetch succeeded
  Success(T),
  /// Last fetch failed and retries are exhausted
  Error(FetchError),
}

impl<T> QueryState<T> {
  pub fn status(&self) -> QueryStatus {
    match self {
      QueryState::Idle => QueryStatus::Idle,
      QueryState::Loading => QueryStatus::Loading,
      QueryState::Success(_) => QueryStatus::Success,
      QueryState::Error(_) => QueryStatus::Error,
    }
  }

  pub fn is_loading(&self) -> bool {
    matches!(self, QueryState::Loading)
  }

  pub fn is_success(&self) -> bool {
    matches!(self, QueryState::Success(_))
  }

  pub fn is_error(&self) -> bool {
    matches!(self, QueryState::Error(_))
  }

  pub fn data(&self) -> Option<&T> {
    match self {
      QueryState::Success(data) => Some(data),
      _ => None,
    }
  }

  pub fn error(&self) -> Option<&FetchError> {
    match self {
      QueryState::Error(e) => Some(e),
      _ => None,
    }
  }
}

/// Status without the payload, for comparisons and display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStatus {
  Idle,
  Loading,
  Success,
  Error,
}

impl fmt::Display for QueryStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let label = match self {
      QueryStatus::Idle => "idle",
      QueryStatus::Loading => "loading",
      QueryStatus::Success => "success",
      QueryStatus::Error => "error",
    };
    f.write_str(label)
  }
}

/// Point-in-time view of one cache entry.
pub struct QueryResult<T: ?Sized> {
  pub state: QueryState<Arc<T>>,
  /// Last good value while loading, or alongside an error when the query
  /// keeps stale data on error.
  pub stale_data: Option<Arc<T>>,
  /// When the last successful fetch completed.
  pub fetched_at: Option<Instant>,
  /// Consecutive failed attempts of the current or last fetch.
  pub failure_count: u32,
  pub is_stale: bool,
}

/// Snapshot with a type-erased payload, as stored in the cache.
pub type AnyResult = QueryResult<dyn Any + Send + Sync>;

impl<T: ?Sized> QueryResult<T> {
  pub fn status(&self) -> QueryStatus {
    self.state.status()
  }

  pub fn data(&self) -> Option<&Arc<T>> {
    self.state.data()
  }

  pub fn error(&self) -> Option<&FetchError> {
    self.state.error()
  }

  pub fn is_loading(&self) -> bool {
    self.state.is_loading()
  }

  /// Fresh data if present, otherwise the stale fallback.
  pub fn data_or_stale(&self) -> Option<&Arc<T>> {
    self.data().or(self.stale_data.as_ref())
  }
}

impl AnyResult {
  /// Recover the concrete payload type. Returns `None` when the stored
  /// value is of a different type.
  pub fn downcast<V: Send + Sync + 'static>(&self) -> Option<QueryResult<V>> {
    let state = match &self.state {
      QueryState::Idle => QueryState::Idle,
      QueryState::Loading => QueryState::Loading,
      QueryState::Success(data) => QueryState::Success(data.clone().downcast::<V>().ok()?),
      QueryState::Error(e) => QueryState::Error(e.clone()),
    };
    let stale_data = match &self.stale_data {
      Some(data) => Some(data.clone().downcast::<V>().ok()?),
      None => None,
    };
    Some(QueryResult {
      state,
      stale_data,
      fetched_at: self.fetched_at,
      failure_count: self.failure_count,
      is_stale: self.is_stale,
    })
  }
}

impl<T: ?Sized> Clone for QueryResult<T> {
  fn clone(&self) -> Self {
    let state = match &self.state {
      QueryState::Idle => QueryState::Idle,
      QueryState::Loading => QueryState::Loading,
      QueryState::Success(data) => QueryState::Success(data.clone()),
      QueryState::Error(e) => QueryState::Error(e.clone()),
    };
    Self {
      state,
      stale_data: self.stale_data.clone(),
      fetched_at: self.fetched_at,
      failure_count: self.failure_count,
      is_stale: self.is_stale,
    }
  }
}

impl<T: ?Sized> fmt::Debug for QueryResult<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("QueryResult")
      .field("status", &self.status())
      .field("error", &self.error())
      .field("has_stale_data", &self.stale_data.is_some())
      .field("fetched_at", &self.fetched_at)
      .field("failure_count", &self.failure_count)
      .field("is_stale", &self.is_stale)
      .finish_non_exhaustive()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn erased(state: QueryState<Arc<dyn Any + Send + Sync>>) -> AnyResult {
    QueryResult {
      state,
      stale_data: None,
      fetched_at: None,
      failure_count: 0,
      is_stale: false,
    }
  }

  #[test]
  fn test_state_accessors() {
    let state: QueryState<i32> = QueryState::Success(7);
    assert!(state.is_success());
    assert_eq!(state.data(), Some(&7));
    assert!(state.error().is_none());

    let state: QueryState<i32> = QueryState::Error(FetchError::network("down"));
    assert!(state.is_error());
    assert!(state.data().is_none());
    assert_eq!(state.status(), QueryStatus::Error);
  }

  #[test]
  fn test_downcast_success() {
    let value: Arc<dyn Any + Send + Sync> = Arc::new(42u32);
    let result = erased(QueryState::Success(value));
    let typed = result.downcast::<u32>().unwrap();
    assert_eq!(typed.data().map(|v| **v), Some(42));
  }

  #[test]
  fn test_downcast_wrong_type_is_none() {
    let value: Arc<dyn Any + Send + Sync> = Arc::new(42u32);
    let result = erased(QueryState::Success(value));
    assert!(result.downcast::<String>().is_none());
  }

  #[test]
  fn test_data_or_stale_falls_back() {
    let mut result = erased(QueryState::Error(FetchError::from_status(503, "down")));
    assert!(result.data_or_stale().is_none());

    result.stale_data = Some(Arc::new(String::from("yesterday")));
    let typed = result.downcast::<String>().unwrap();
    assert_eq!(typed.data_or_stale().map(|s| s.as_str()), Some("yesterday"));
    assert_eq!(typed.status(), QueryStatus::Error);
  }
}
