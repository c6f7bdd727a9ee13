//! Client-side data fetching and caching, inspired by TanStack Query.
//!
//! A single [`QueryClient`] is shared by every view. Views ask for data by
//! [`QueryKey`]; the client serves fresh data from its cache, coalesces
//! concurrent requests for the same key into one fetch, retries transient
//! failures with exponential backoff and notifies subscribers whenever an
//! entry changes.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use abattoir_dash::query::{FetchError, QueryClient, QueryOptions};
//! use abattoir_dash::query_key;
//!
//! # async fn demo() -> Result<(), FetchError> {
//! let client = QueryClient::new();
//! let options = QueryOptions::default().with_stale_time(Duration::from_secs(60));
//!
//! let stock = client
//!   .fetch_query(&query_key!["stock", "data", 6], &options, || async {
//!     Ok::<_, FetchError>(42u32)
//!   })
//!   .await?;
//! assert_eq!(*stock, 42);
//! # Ok(())
//! # }
//! ```

mod client;
mod error;
mod key;
mod mutation;
mod observer;
mod options;
mod retry;
mod state;
mod store;
mod subscription;

pub use client::{erase_fetcher, Fetcher, Listener, QueryClient};
pub use error::{ErrorKind, FetchError};
pub use key::{KeySegment, QueryKey};
pub use observer::QueryHandle;
pub use options::{MutationOptions, QueryOptions, DEFAULT_GC_TIME};
pub use retry::{exponential_delay, MutationRetry, QueryRetry, RetryPolicy};
pub use state::{AnyResult, QueryResult, QueryState, QueryStatus};
pub use store::{AnyValue, CacheEntry, CacheStore, SharedFetch};
pub use subscription::Subscription;
