use std::future::Future;

use tokio::time::sleep;
use tracing::{debug, warn};

use super::client::QueryClient;
use super::error::FetchError;
use super::options::MutationOptions;
use super::retry::RetryPolicy;

impl QueryClient {
  /// Run a write, retrying per the mutation policy. On success every
  /// prefix in `options.invalidates` is invalidated, which refetches the
  /// affected queries that are on screen.
  pub async fn mutate<V, F, Fut>(&self, options: &MutationOptions, mutation: F) -> Result<V, FetchError>
  where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<V, FetchError>>,
  {
    let mut failures = 0;
    loop {
      match mutation().await {
        Ok(value) => {
          for prefix in &options.invalidates {
            self.invalidate_prefix(prefix);
          }
          return Ok(value);
        }
        Err(error) => {
          failures += 1;
          if !options.retry.should_retry(failures, &error) {
            warn!(failures, error = %error, "Mutation failed");
            return Err(error);
          }
          let delay = options.retry.delay_for(failures - 1);
          debug!(failures, ?delay, error = %error, "Retrying mutation");
          sleep(delay).await;
        }
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::query::QueryOptions;
  use crate::query_key;
  use std::sync::atomic::{AtomicU32, Ordering};
  use std::sync::Arc;
  use std::time::Duration;

  #[tokio::test(start_paused = true)]
  async fn test_success_invalidates_prefixes() {
    let client = QueryClient::new();
    let options = QueryOptions::default().with_stale_time(Duration::from_secs(60));
    let list = query_key!["orders", "list", 6];
    let stock = query_key!["stock", "data", 6];
    client
      .fetch_query(&list, &options, || async { Ok::<_, FetchError>(1u32) })
      .await
      .unwrap();
    client
      .fetch_query(&stock, &options, || async { Ok::<_, FetchError>(2u32) })
      .await
      .unwrap();

    let mutation = MutationOptions::default().invalidating(query_key!["orders"]);
    client
      .mutate(&mutation, || async { Ok::<_, FetchError>(()) })
      .await
      .unwrap();

    assert!(client.query_result::<u32>(&list).unwrap().is_stale);
    assert!(!client.query_result::<u32>(&stock).unwrap().is_stale);
  }

  #[tokio::test(start_paused = true)]
  async fn test_client_errors_are_final() {
    let client = QueryClient::new();
    let calls = Arc::new(AtomicU32::new(0));
    let options = MutationOptions::default().with_retry(2);

    let counted = calls.clone();
    let result = client
      .mutate(&options, move || {
        let calls = counted.clone();
        async move {
          calls.fetch_add(1, Ordering::SeqCst);
          Err::<(), _>(FetchError::from_status(409, "already validated"))
        }
      })
      .await;

    assert_eq!(result, Err(FetchError::from_status(409, "already validated")));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test(start_paused = true)]
  async fn test_transient_errors_use_budget() {
    let client = QueryClient::new();
    let calls = Arc::new(AtomicU32::new(0));
    let options = MutationOptions::default().with_retry(2);

    let counted = calls.clone();
    let result = client
      .mutate(&options, move || {
        let calls = counted.clone();
        async move {
          calls.fetch_add(1, Ordering::SeqCst);
          Err::<(), _>(FetchError::from_status(502, "bad gateway"))
        }
      })
      .await;

    assert!(result.is_err());
    assert_eq!(calls.load(Ordering::SeqCst), 3);
  }
}
