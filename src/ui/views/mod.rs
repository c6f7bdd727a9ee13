mod history;
mod order_detail;
mod orders;
mod stock;

pub use history::HistoryView;
pub use order_detail::OrderDetailView;
pub use orders::OrdersView;
pub use stock::StockView;

use crate::query::QueryResult;

/// Body text for a query-backed view with nothing to list yet
fn empty_message<T: ?Sized>(result: &QueryResult<T>, what: &str) -> String {
  if result.is_loading() {
    format!("Loading {}...", what)
  } else if let Some(error) = result.error() {
    format!("Failed to load {}: {}\n\nPress 'r' to retry.", what, error)
  } else {
    format!("No {} found.", what)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::query::{FetchError, QueryState};
  use std::sync::Arc;

  fn result(state: QueryState<Arc<Vec<u32>>>) -> QueryResult<Vec<u32>> {
    QueryResult {
      state,
      stale_data: None,
      fetched_at: None,
      failure_count: 0,
      is_stale: true,
    }
  }

  #[test]
  fn test_empty_message() {
    assert_eq!(empty_message(&result(QueryState::Loading), "orders"), "Loading orders...");
    assert_eq!(
      empty_message(&result(QueryState::Success(Arc::new(vec![]))), "orders"),
      "No orders found."
    );
    let failed = result(QueryState::Error(FetchError::network("refused")));
    assert!(empty_message(&failed, "stock").starts_with("Failed to load stock: network error"));
  }
}
