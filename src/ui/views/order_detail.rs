use super::empty_message;
use crate::api::types::{Order, OrderStatus};
use crate::query::QueryHandle;
use crate::ui::renderfns::{border_color, query_title, status_color};
use crate::ui::view::{ShortcutInfo, View, ViewAction, ViewContext};
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};
use tracing::{info, warn};

/// One bon de commande with its lines
pub struct OrderDetailView {
  ctx: ViewContext,
  order_id: i64,
  reference: String,
  handle: QueryHandle<Order>,
  scroll: u16,
}

impl OrderDetailView {
  pub fn new(ctx: &ViewContext, order_id: i64, reference: String) -> Self {
    let handle = ctx.queries.watch_order(order_id, ctx.redraw());
    Self {
      ctx: ctx.clone(),
      order_id,
      reference,
      handle,
      scroll: 0,
    }
  }

  /// Validate in the background; the outcome lands in the footer.
  fn validate(&self) {
    let pending = self
      .handle
      .data()
      .is_some_and(|order| order.status == OrderStatus::Pending);
    if !pending {
      self.ctx.notify(format!("{} is not pending", self.reference));
      return;
    }

    let ctx = self.ctx.clone();
    let order_id = self.order_id;
    let reference = self.reference.clone();
    ctx.notify(format!("Validating {}...", reference));
    tokio::spawn(async move {
      match ctx.queries.validate_order(order_id).await {
        Ok(_) => {
          info!(order_id, "Order validated");
          ctx.notify(format!("{} validated", reference));
        }
        Err(e) => {
          warn!(order_id, error = %e, "Order validation failed");
          ctx.notify(format!("Validation of {} failed: {}", reference, e));
        }
      }
    });
  }

  fn field(label: &str, value: String, color: Color) -> Line<'static> {
    Line::from(vec![
      Span::styled(format!("{:<12}", label), Style::default().fg(Color::DarkGray)),
      Span::styled(value, Style::default().fg(color)),
    ])
  }

  fn lines(order: &Order) -> Vec<Line<'static>> {
    let mut lines = vec![
      Self::field("Client", order.client.clone(), Color::White),
      Self::field(
        "Status",
        order.status.to_string(),
        status_color(order.status),
      ),
      Self::field(
        "Created",
        order.created_at.format("%Y-%m-%d %H:%M").to_string(),
        Color::White,
      ),
    ];
    if let Some(validated) = order.validated_at {
      lines.push(Self::field(
        "Validated",
        validated.format("%Y-%m-%d %H:%M").to_string(),
        Color::Green,
      ));
    }
    lines.push(Self::field(
      "Quantity",
      order.total_quantity().to_string(),
      Color::White,
    ));

    lines.push(Line::raw(""));
    lines.push(Line::styled(
      "Lines",
      Style::default().fg(Color::Cyan).bold(),
    ));
    for line in &order.lines {
      let weight = line
        .weight_kg
        .map(|kg| format!("  {:.1} kg", kg))
        .unwrap_or_default();
      lines.push(Line::from(vec![
        Span::raw(format!("  {:>5} x ", line.quantity)),
        Span::raw(line.product.clone()),
        Span::styled(weight, Style::default().fg(Color::DarkGray)),
      ]));
    }

    if let Some(notes) = &order.notes {
      lines.push(Line::raw(""));
      lines.push(Line::styled(
        "Notes",
        Style::default().fg(Color::Cyan).bold(),
      ));
      for note in notes.lines() {
        lines.push(Line::raw(note.to_string()));
      }
    }
    lines
  }
}

impl View for OrderDetailView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    match key.code {
      KeyCode::Char('j') | KeyCode::Down => self.scroll = self.scroll.saturating_add(1),
      KeyCode::Char('k') | KeyCode::Up => self.scroll = self.scroll.saturating_sub(1),
      KeyCode::Char('r') => self.handle.refetch(),
      KeyCode::Char('v') => self.validate(),
      KeyCode::Char('q') | KeyCode::Esc => return ViewAction::Pop,
      _ => {}
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    let result = self.handle.result();
    let block = Block::default()
      .title(query_title(&self.reference, &result, None))
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(border_color(&result)));

    let paragraph = match result.data_or_stale() {
      Some(order) => Paragraph::new(Self::lines(order))
        .wrap(Wrap { trim: false })
        .scroll((self.scroll, 0)),
      None => Paragraph::new(empty_message(&result, "order"))
        .style(Style::default().fg(Color::DarkGray)),
    };
    frame.render_widget(paragraph.block(block), area);
  }

  fn breadcrumb_label(&self) -> String {
    self.reference.clone()
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new(":", "command").with_priority(10),
      ShortcutInfo::new("v", "validate").with_priority(15),
      ShortcutInfo::new("r", "refresh").with_priority(20),
      ShortcutInfo::new("q", "back").with_priority(90),
    ]
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::types::OrderLine;
  use chrono::{TimeZone, Utc};

  #[test]
  fn test_detail_lines() {
    let order = Order {
      id: 12,
      reference: "BC-012".to_string(),
      client: "Boucherie Martin".to_string(),
      status: OrderStatus::Pending,
      created_at: Utc.with_ymd_and_hms(2024, 3, 1, 8, 30, 0).unwrap(),
      validated_at: None,
      lines: vec![OrderLine {
        product: "Agneau".to_string(),
        quantity: 10,
        weight_kg: None,
      }],
      notes: Some("Livraison lundi".to_string()),
    };
    let text: Vec<String> = OrderDetailView::lines(&order)
      .iter()
      .map(|line| line.spans.iter().map(|s| s.content.as_ref()).collect())
      .collect();
    assert!(text.contains(&"Created     2024-03-01 08:30".to_string()));
    assert!(text.contains(&"Quantity    10".to_string()));
    assert!(text.contains(&"     10 x Agneau".to_string()));
    assert_eq!(text.last().map(String::as_str), Some("Livraison lundi"));
  }
}
