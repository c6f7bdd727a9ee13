use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Current stock of one abattoir
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StockReport {
  /// Total head count across all lines
  pub count: u64,
  #[serde(default)]
  pub lines: Vec<StockLine>,
  #[serde(default)]
  pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StockLine {
  pub species: String,
  #[serde(default)]
  pub category: Option<String>,
  pub quantity: u64,
  #[serde(default)]
  pub weight_kg: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
  Pending,
  Validated,
  Delivered,
  Cancelled,
  #[serde(other)]
  Unknown,
}

impl fmt::Display for OrderStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let label = match self {
      OrderStatus::Pending => "Pending",
      OrderStatus::Validated => "Validated",
      OrderStatus::Delivered => "Delivered",
      OrderStatus::Cancelled => "Cancelled",
      OrderStatus::Unknown => "Unknown",
    };
    f.write_str(label)
  }
}

/// Bon de commande, as listed
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderSummary {
  pub id: i64,
  pub reference: String,
  pub client: String,
  pub status: OrderStatus,
  pub created_at: DateTime<Utc>,
  #[serde(default)]
  pub total_quantity: u64,
}

/// Bon de commande with its lines
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
  pub id: i64,
  pub reference: String,
  pub client: String,
  pub status: OrderStatus,
  pub created_at: DateTime<Utc>,
  #[serde(default)]
  pub validated_at: Option<DateTime<Utc>>,
  #[serde(default)]
  pub lines: Vec<OrderLine>,
  #[serde(default)]
  pub notes: Option<String>,
}

impl Order {
  pub fn total_quantity(&self) -> u64 {
    self.lines.iter().map(|line| line.quantity).sum()
  }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLine {
  pub product: String,
  pub quantity: u64,
  #[serde(default)]
  pub weight_kg: Option<f64>,
}

/// One event in an abattoir's history
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
  pub id: i64,
  pub at: DateTime<Utc>,
  pub kind: String,
  pub description: String,
  #[serde(default)]
  pub quantity: Option<i64>,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_stock_report_minimal() {
    let report: StockReport = serde_json::from_str(r#"{"count":42}"#).unwrap();
    assert_eq!(report.count, 42);
    assert!(report.lines.is_empty());
    assert!(report.updated_at.is_none());
  }

  #[test]
  fn test_order_with_lines() {
    let json = r#"{
      "id": 12,
      "reference": "BC-2024-012",
      "client": "Boucherie Martin",
      "status": "validated",
      "createdAt": "2024-03-01T08:30:00Z",
      "validatedAt": "2024-03-01T10:00:00Z",
      "lines": [
        {"product": "Carcasse bovine", "quantity": 3, "weightKg": 1050.5},
        {"product": "Agneau", "quantity": 10}
      ]
    }"#;
    let order: Order = serde_json::from_str(json).unwrap();
    assert_eq!(order.status, OrderStatus::Validated);
    assert_eq!(order.total_quantity(), 13);
    assert_eq!(order.lines[0].weight_kg, Some(1050.5));
    assert!(order.notes.is_none());
  }

  #[test]
  fn test_unknown_order_status() {
    let status: OrderStatus = serde_json::from_str(r#""archived""#).unwrap();
    assert_eq!(status, OrderStatus::Unknown);
    assert_eq!(OrderStatus::Pending.to_string(), "Pending");
  }
}
