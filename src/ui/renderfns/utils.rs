use crate::api::types::OrderStatus;
use crate::query::{QueryResult, QueryState};
use ratatui::prelude::Color;
use std::time::Duration;
use tokio::time::Instant;

/// Truncate a string to a maximum number of characters, adding "..." if truncated
pub fn truncate(s: &str, max_len: usize) -> String {
  if s.chars().count() <= max_len {
    s.to_string()
  } else {
    let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
    format!("{}...", kept)
  }
}

/// Get the display color for an order status
pub fn status_color(status: OrderStatus) -> Color {
  match status {
    OrderStatus::Validated | OrderStatus::Delivered => Color::Green,
    OrderStatus::Pending => Color::Yellow,
    OrderStatus::Cancelled => Color::Red,
    OrderStatus::Unknown => Color::White,
  }
}

/// "12s", "4m", "2h"
pub fn format_age(age: Duration) -> String {
  let secs = age.as_secs();
  if secs < 60 {
    format!("{}s", secs)
  } else if secs < 3600 {
    format!("{}m", secs / 60)
  } else {
    format!("{}h", secs / 3600)
  }
}

/// Block title reflecting the query's state, e.g. " Orders (12) · 30s ago ".
pub fn query_title<T: ?Sized>(label: &str, result: &QueryResult<T>, count: Option<usize>) -> String {
  let count = count.map(|n| format!(" ({})", n)).unwrap_or_default();
  let age = result
    .fetched_at
    .map(|at| format!(" · {} ago", format_age(Instant::now().saturating_duration_since(at))))
    .unwrap_or_default();
  match &result.state {
    QueryState::Idle => format!(" {} ", label),
    QueryState::Loading if result.failure_count > 0 => {
      format!(" {}{} (retrying, attempt {}...) ", label, count, result.failure_count + 1)
    }
    QueryState::Loading => format!(" {}{} (loading...) ", label, count),
    QueryState::Success(_) => format!(" {}{}{} ", label, count, age),
    QueryState::Error(e) if result.stale_data.is_some() => {
      format!(" {}{} (stale{}, error: {}) ", label, count, age, e)
    }
    QueryState::Error(e) => format!(" {} (error: {}) ", label, e),
  }
}

/// Border color for a query-backed block
pub fn border_color<T: ?Sized>(result: &QueryResult<T>) -> Color {
  match &result.state {
    QueryState::Error(_) => Color::Red,
    QueryState::Loading => Color::Yellow,
    _ => Color::Blue,
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::query::FetchError;
  use std::sync::Arc;

  fn result(state: QueryState<Arc<u32>>) -> QueryResult<u32> {
    QueryResult {
      state,
      stale_data: None,
      fetched_at: None,
      failure_count: 0,
      is_stale: true,
    }
  }

  #[test]
  fn test_truncate_short_string() {
    assert_eq!(truncate("hello", 10), "hello");
  }

  #[test]
  fn test_truncate_exact_length() {
    assert_eq!(truncate("hello", 5), "hello");
  }

  #[test]
  fn test_truncate_long_string() {
    assert_eq!(truncate("hello world", 8), "hello...");
  }

  #[test]
  fn test_truncate_multibyte() {
    assert_eq!(truncate("Génisse limousine", 8), "Génis...");
  }

  #[test]
  fn test_status_color() {
    assert_eq!(status_color(OrderStatus::Validated), Color::Green);
    assert_eq!(status_color(OrderStatus::Pending), Color::Yellow);
    assert_eq!(status_color(OrderStatus::Cancelled), Color::Red);
  }

  #[test]
  fn test_format_age() {
    assert_eq!(format_age(Duration::from_secs(12)), "12s");
    assert_eq!(format_age(Duration::from_secs(240)), "4m");
    assert_eq!(format_age(Duration::from_secs(7300)), "2h");
  }

  #[test]
  fn test_query_title() {
    assert_eq!(query_title("Stock", &result(QueryState::Loading), None), " Stock (loading...) ");

    let mut retrying = result(QueryState::Loading);
    retrying.failure_count = 2;
    assert_eq!(
      query_title("Orders", &retrying, Some(3)),
      " Orders (3) (retrying, attempt 3...) "
    );

    let failed = result(QueryState::Error(FetchError::network("down")));
    assert_eq!(
      query_title("History", &failed, None),
      " History (error: network error: down) "
    );
  }
}
