use abattoir_dash::query::{
  FetchError, MutationOptions, QueryClient, QueryOptions, QueryStatus,
};
use abattoir_dash::query_key;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::sleep;

fn stock_options() -> QueryOptions {
  QueryOptions::default().with_stale_time(Duration::from_secs(60))
}

#[tokio::test(start_paused = true)]
async fn stock_is_served_from_cache_until_stale() {
  let client = QueryClient::new();
  let key = query_key!["stock", "data", 6];
  let calls = Arc::new(AtomicU32::new(0));
  let fetcher = {
    let calls = calls.clone();
    move || {
      calls.fetch_add(1, Ordering::SeqCst);
      async { Ok::<_, FetchError>(json!({ "count": 42 })) }
    }
  };

  let first: Arc<Value> = client
    .fetch_query(&key, &stock_options(), fetcher.clone())
    .await
    .unwrap();
  assert_eq!(first["count"], 42);
  assert_eq!(calls.load(Ordering::SeqCst), 1);

  sleep(Duration::from_secs(30)).await;
  let second: Arc<Value> = client
    .fetch_query(&key, &stock_options(), fetcher.clone())
    .await
    .unwrap();
  assert!(Arc::ptr_eq(&first, &second));
  assert_eq!(calls.load(Ordering::SeqCst), 1);

  sleep(Duration::from_secs(40)).await;
  let third: Arc<Value> = client
    .fetch_query(&key, &stock_options(), fetcher)
    .await
    .unwrap();
  assert_eq!(third["count"], 42);
  assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn transient_failures_are_retried_without_surfacing_an_error() {
  let client = QueryClient::new();
  let key = query_key!["orders", "list", 6];
  let calls = Arc::new(AtomicU32::new(0));
  let statuses = Arc::new(Mutex::new(Vec::new()));

  let fetcher = {
    let calls = calls.clone();
    move || {
      let attempt = calls.fetch_add(1, Ordering::SeqCst) + 1;
      async move {
        if attempt < 3 {
          Err(FetchError::from_status(503, "Service Unavailable"))
        } else {
          Ok(vec!["BC-001".to_string()])
        }
      }
    }
  };
  let recorded = statuses.clone();
  let handle = client.watch(
    &key,
    QueryOptions::default().with_retry(3),
    fetcher,
    move |result| recorded.lock().unwrap().push(result.status()),
  );

  sleep(Duration::from_secs(10)).await;

  let mut seen = statuses.lock().unwrap().clone();
  seen.dedup();
  assert_eq!(seen, vec![QueryStatus::Loading, QueryStatus::Success]);
  assert_eq!(calls.load(Ordering::SeqCst), 3);
  assert_eq!(handle.data().map(|v| v.len()), Some(1));
}

#[tokio::test(start_paused = true)]
async fn unauthorized_fails_after_one_attempt() {
  let client = QueryClient::new();
  let key = query_key!["history", "list", 6];
  let calls = Arc::new(AtomicU32::new(0));
  let fetcher = {
    let calls = calls.clone();
    move || {
      calls.fetch_add(1, Ordering::SeqCst);
      async { Err::<u32, _>(FetchError::from_status(401, "Unauthorized")) }
    }
  };

  let err = client
    .fetch_query(&key, &QueryOptions::default().with_retry(3), fetcher)
    .await
    .unwrap_err();
  assert!(matches!(err, FetchError::Authorization { status: 401, .. }));
  assert_eq!(calls.load(Ordering::SeqCst), 1);
  assert_eq!(
    client.snapshot(&key).map(|r| r.status()),
    Some(QueryStatus::Error)
  );
}

#[tokio::test(start_paused = true)]
async fn concurrent_callers_share_one_request() {
  let client = QueryClient::new();
  let key = query_key!["orders", "detail", 42];
  let calls = Arc::new(AtomicU32::new(0));
  let fetcher = {
    let calls = calls.clone();
    move || {
      calls.fetch_add(1, Ordering::SeqCst);
      async {
        sleep(Duration::from_millis(200)).await;
        Ok::<_, FetchError>("BC-042".to_string())
      }
    }
  };

  let options = QueryOptions::default();
  let callers = (0..8).map(|_| client.fetch_query(&key, &options, fetcher.clone()));
  let results: Vec<Arc<String>> = futures::future::try_join_all(callers).await.unwrap();

  assert_eq!(calls.load(Ordering::SeqCst), 1);
  assert!(results.iter().all(|r| Arc::ptr_eq(r, &results[0])));
}

#[tokio::test(start_paused = true)]
async fn mutation_invalidates_watched_orders() {
  let client = QueryClient::new();
  let list = query_key!["orders", "list", 6];
  let calls = Arc::new(AtomicU32::new(0));
  let fetcher = {
    let calls = calls.clone();
    move || {
      let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
      async move { Ok::<_, FetchError>(n) }
    }
  };

  let handle = client.watch(
    &list,
    QueryOptions::default().with_stale_time(Duration::from_secs(300)),
    fetcher,
    |_| {},
  );
  sleep(Duration::from_millis(1)).await;
  assert_eq!(handle.data().as_deref(), Some(&1));

  let options = MutationOptions::default().invalidating(query_key!["orders"]);
  let validated = client
    .mutate(&options, || async { Ok::<_, FetchError>("validated") })
    .await
    .unwrap();
  assert_eq!(validated, "validated");

  sleep(Duration::from_millis(1)).await;
  assert_eq!(calls.load(Ordering::SeqCst), 2);
  assert_eq!(handle.data().as_deref(), Some(&2));
}

#[tokio::test(start_paused = true)]
async fn unobserved_entries_are_collected_after_gc_time() {
  let client = QueryClient::new();
  let key = query_key!["history", "list", 9];
  let options = QueryOptions::default().with_gc_time(Duration::from_secs(10));

  let handle = client.watch(&key, options, || async { Ok::<_, FetchError>(7u32) }, |_| {});
  sleep(Duration::from_millis(1)).await;
  assert!(client.contains(&key));

  drop(handle);
  sleep(Duration::from_secs(9)).await;
  assert!(client.contains(&key));

  sleep(Duration::from_secs(2)).await;
  assert!(!client.contains(&key));
}
