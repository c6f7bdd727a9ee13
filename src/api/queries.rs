//! Cache keys and default tuning for each API resource, and a service that
//! wires them to the shared [`QueryClient`].
//!
//! Keys are scoped per resource and per parameter so that invalidating
//! `["orders"]` reaches both the list of an abattoir and every order
//! detail.

use crate::api::client::ApiClient;
use crate::api::types::{HistoryEntry, Order, OrderSummary, StockReport};
use crate::config::QueriesConfig;
use crate::query::{
  FetchError, MutationOptions, QueryClient, QueryHandle, QueryKey, QueryOptions, QueryResult,
};
use crate::query_key;
use std::sync::Arc;
use std::time::Duration;

pub fn stock_key(abattoir_id: i64) -> QueryKey {
  query_key!["stock", "data", abattoir_id]
}

pub fn orders_key(abattoir_id: i64) -> QueryKey {
  query_key!["orders", "list", abattoir_id]
}

pub fn order_key(order_id: i64) -> QueryKey {
  query_key!["orders", "detail", order_id]
}

pub fn history_key(abattoir_id: i64) -> QueryKey {
  query_key!["history", "list", abattoir_id]
}

/// Options per resource.
#[derive(Debug, Clone)]
pub struct QueryDefaults {
  pub stock: QueryOptions,
  pub orders: QueryOptions,
  pub order_detail: QueryOptions,
  pub history: QueryOptions,
  pub validate: MutationOptions,
}

impl Default for QueryDefaults {
  fn default() -> Self {
    Self {
      stock: QueryOptions::default()
        .with_stale_time(Duration::from_secs(60))
        .with_poll_interval(Duration::from_secs(60)),
      orders: QueryOptions::default().with_stale_time(Duration::from_secs(30)),
      order_detail: QueryOptions::default().with_stale_time(Duration::from_secs(30)),
      history: QueryOptions::default()
        .with_stale_time(Duration::from_secs(5 * 60))
        .with_gc_time(Duration::from_secs(10 * 60)),
      validate: MutationOptions::default()
        .invalidating(query_key!["orders"])
        .invalidating(query_key!["stock"]),
    }
  }
}

impl QueryDefaults {
  /// Built-in defaults overridden by the `queries` section of the config.
  pub fn from_config(config: &QueriesConfig) -> Self {
    let defaults = Self::default();
    let mut validate = defaults.validate;
    if let Some(retries) = config.validate_retries {
      validate.retry.max_retries = retries;
    }
    Self {
      stock: config.stock.apply(defaults.stock),
      orders: config.orders.apply(defaults.orders),
      order_detail: config.order_detail.apply(defaults.order_detail),
      history: config.history.apply(defaults.history),
      validate,
    }
  }
}

/// Typed access to the dashboard's resources through the shared cache.
#[derive(Clone)]
pub struct StatsQueries {
  client: QueryClient,
  api: ApiClient,
  defaults: Arc<QueryDefaults>,
}

impl StatsQueries {
  pub fn new(client: QueryClient, api: ApiClient, defaults: QueryDefaults) -> Self {
    Self {
      client,
      api,
      defaults: Arc::new(defaults),
    }
  }

  pub fn client(&self) -> &QueryClient {
    &self.client
  }

  pub fn watch_stock<L>(&self, abattoir_id: i64, listener: L) -> QueryHandle<StockReport>
  where
    L: Fn(&QueryResult<StockReport>) + Send + Sync + 'static,
  {
    let api = self.api.clone();
    self.client.watch(
      &stock_key(abattoir_id),
      self.defaults.stock.clone(),
      move || {
        let api = api.clone();
        async move { api.stock(abattoir_id).await }
      },
      listener,
    )
  }

  pub fn watch_orders<L>(&self, abattoir_id: i64, listener: L) -> QueryHandle<Vec<OrderSummary>>
  where
    L: Fn(&QueryResult<Vec<OrderSummary>>) + Send + Sync + 'static,
  {
    let api = self.api.clone();
    self.client.watch(
      &orders_key(abattoir_id),
      self.defaults.orders.clone(),
      move || {
        let api = api.clone();
        async move { api.orders(abattoir_id).await }
      },
      listener,
    )
  }

  pub fn watch_order<L>(&self, order_id: i64, listener: L) -> QueryHandle<Order>
  where
    L: Fn(&QueryResult<Order>) + Send + Sync + 'static,
  {
    let api = self.api.clone();
    self.client.watch(
      &order_key(order_id),
      self.defaults.order_detail.clone(),
      move || {
        let api = api.clone();
        async move { api.order(order_id).await }
      },
      listener,
    )
  }

  pub fn watch_history<L>(&self, abattoir_id: i64, listener: L) -> QueryHandle<Vec<HistoryEntry>>
  where
    L: Fn(&QueryResult<Vec<HistoryEntry>>) + Send + Sync + 'static,
  {
    let api = self.api.clone();
    self.client.watch(
      &history_key(abattoir_id),
      self.defaults.history.clone(),
      move || {
        let api = api.clone();
        async move { api.history(abattoir_id).await }
      },
      listener,
    )
  }

  /// Stock report, served from cache while fresh.
  pub async fn stock(&self, abattoir_id: i64) -> Result<Arc<StockReport>, FetchError> {
    let api = self.api.clone();
    self
      .client
      .fetch_query(&stock_key(abattoir_id), &self.defaults.stock, move || {
        let api = api.clone();
        async move { api.stock(abattoir_id).await }
      })
      .await
  }

  /// Validate a bon de commande. Orders and stock are invalidated on
  /// success and the returned order is written into the detail cache.
  pub async fn validate_order(&self, order_id: i64) -> Result<Order, FetchError> {
    let api = self.api.clone();
    let order = self
      .client
      .mutate(&self.defaults.validate, || api.validate_order(order_id))
      .await?;
    self.client.set_query_data(&order_key(order_id), order.clone());
    Ok(order)
  }
}
