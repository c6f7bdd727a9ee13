use crate::api::types::{HistoryEntry, Order, OrderSummary, StockReport};
use crate::config::Config;
use crate::query::FetchError;
use color_eyre::{eyre::eyre, Result};
use reqwest::header::CONTENT_TYPE;
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;
use url::Url;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// HTTP client for the abattoir statistics API.
///
/// Every failure is mapped to a classified [`FetchError`] so the query
/// layer can decide whether to retry.
#[derive(Clone)]
pub struct ApiClient {
  http: reqwest::Client,
  base: Url,
  token: Option<String>,
}

impl ApiClient {
  pub fn new(config: &Config) -> Result<Self> {
    let token = Config::get_api_token()?;
    let timeout = config
      .api
      .timeout_secs
      .map(Duration::from_secs)
      .unwrap_or(DEFAULT_TIMEOUT);
    Self::with_token(&config.api.url, Some(token), timeout)
  }

  pub fn with_token(base_url: &str, token: Option<String>, timeout: Duration) -> Result<Self> {
    let base = parse_base_url(base_url)?;
    let http = reqwest::Client::builder()
      .timeout(timeout)
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;
    Ok(Self { http, base, token })
  }

  pub fn base_url(&self) -> &Url {
    &self.base
  }

  /// Current stock of an abattoir
  pub async fn stock(&self, abattoir_id: i64) -> Result<StockReport, FetchError> {
    self
      .get_json(&format!("abattoirs/{}/stock", abattoir_id))
      .await
  }

  /// Bons de commande of an abattoir
  pub async fn orders(&self, abattoir_id: i64) -> Result<Vec<OrderSummary>, FetchError> {
    self
      .get_json(&format!("abattoirs/{}/orders", abattoir_id))
      .await
  }

  /// A single bon de commande with its lines
  pub async fn order(&self, order_id: i64) -> Result<Order, FetchError> {
    self.get_json(&format!("orders/{}", order_id)).await
  }

  pub async fn history(&self, abattoir_id: i64) -> Result<Vec<HistoryEntry>, FetchError> {
    self
      .get_json(&format!("abattoirs/{}/history", abattoir_id))
      .await
  }

  /// Validate a pending bon de commande, returning the updated order
  pub async fn validate_order(&self, order_id: i64) -> Result<Order, FetchError> {
    self
      .post_json(&format!("orders/{}/validate", order_id), &Value::Object(Default::default()))
      .await
  }

  fn endpoint(&self, path: &str) -> Result<Url, FetchError> {
    self
      .base
      .join(path)
      .map_err(|e| FetchError::unclassified(format!("invalid endpoint {}: {}", path, e)))
  }

  async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, FetchError> {
    let url = self.endpoint(path)?;
    debug!(%url, "GET");
    let response = self.send(self.http.get(url)).await?;
    decode(path, response).await
  }

  async fn post_json<T: DeserializeOwned>(&self, path: &str, body: &Value) -> Result<T, FetchError> {
    let url = self.endpoint(path)?;
    debug!(%url, "POST");
    let payload = serde_json::to_vec(body)
      .map_err(|e| FetchError::unclassified(format!("failed to encode request: {}", e)))?;
    let request = self
      .http
      .post(url)
      .header(CONTENT_TYPE, "application/json")
      .body(payload);
    let response = self.send(request).await?;
    decode(path, response).await
  }

  async fn send(&self, request: RequestBuilder) -> Result<Response, FetchError> {
    let request = match &self.token {
      Some(token) => request.bearer_auth(token),
      None => request,
    };
    let response = request.send().await.map_err(transport_error)?;
    let status = response.status();
    if status.is_success() {
      return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(FetchError::from_status(
      status.as_u16(),
      error_message(status, &body),
    ))
  }
}

async fn decode<T: DeserializeOwned>(path: &str, response: Response) -> Result<T, FetchError> {
  let bytes = response.bytes().await.map_err(transport_error)?;
  serde_json::from_slice(&bytes)
    .map_err(|e| FetchError::unclassified(format!("invalid response from {}: {}", path, e)))
}

/// Parse the configured base URL, making sure relative endpoints are
/// joined below its path rather than replacing the last segment.
fn parse_base_url(raw: &str) -> Result<Url> {
  let mut url = Url::parse(raw).map_err(|e| eyre!("Invalid API URL {}: {}", raw, e))?;
  if url.cannot_be_a_base() {
    return Err(eyre!("Invalid API URL {}: not a base URL", raw));
  }
  if !url.path().ends_with('/') {
    let path = format!("{}/", url.path());
    url.set_path(&path);
  }
  Ok(url)
}

fn transport_error(e: reqwest::Error) -> FetchError {
  if let Some(status) = e.status() {
    return FetchError::from_status(status.as_u16(), e.to_string());
  }
  if e.is_decode() {
    return FetchError::unclassified(e.to_string());
  }
  FetchError::network(e.to_string())
}

/// Prefer the API's own `message` field, fall back to the raw body or the
/// status reason.
fn error_message(status: StatusCode, body: &str) -> String {
  let from_json = serde_json::from_str::<Value>(body).ok().and_then(|v| {
    v.get("message")
      .or_else(|| v.get("error"))
      .and_then(Value::as_str)
      .map(str::to_string)
  });
  if let Some(message) = from_json {
    return message;
  }
  let body = body.trim();
  if !body.is_empty() {
    return body.chars().take(200).collect();
  }
  status
    .canonical_reason()
    .unwrap_or("unknown error")
    .to_string()
}
