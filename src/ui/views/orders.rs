use super::{empty_message, OrderDetailView};
use crate::api::types::OrderSummary;
use crate::query::QueryHandle;
use crate::ui::ensure_valid_selection;
use crate::ui::renderfns::{border_color, query_title, status_color, truncate};
use crate::ui::view::{ShortcutInfo, View, ViewAction, ViewContext};
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph};

/// Bons de commande of the current abattoir
pub struct OrdersView {
  ctx: ViewContext,
  handle: QueryHandle<Vec<OrderSummary>>,
  list_state: ListState,
}

impl OrdersView {
  pub fn new(ctx: &ViewContext) -> Self {
    let handle = ctx.queries.watch_orders(ctx.abattoir_id, ctx.redraw());
    Self {
      ctx: ctx.clone(),
      handle,
      list_state: ListState::default(),
    }
  }

  fn selected_order(&self) -> Option<OrderSummary> {
    let orders = self.handle.data()?;
    let idx = self.list_state.selected()?;
    orders.get(idx).cloned()
  }
}

impl View for OrdersView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    match key.code {
      KeyCode::Char('j') | KeyCode::Down => self.list_state.select_next(),
      KeyCode::Char('k') | KeyCode::Up => self.list_state.select_previous(),
      KeyCode::Char('g') => self.list_state.select_first(),
      KeyCode::Char('G') => self.list_state.select_last(),
      KeyCode::Char('r') => self.handle.refetch(),
      KeyCode::Enter => {
        if let Some(order) = self.selected_order() {
          return ViewAction::Push(Box::new(OrderDetailView::new(
            &self.ctx,
            order.id,
            order.reference,
          )));
        }
      }
      KeyCode::Char('q') | KeyCode::Esc => return ViewAction::Pop,
      _ => {}
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    let result = self.handle.result();
    let orders = result.data_or_stale().cloned().unwrap_or_default();
    ensure_valid_selection(&mut self.list_state, orders.len());

    let block = Block::default()
      .title(query_title("Bons de commande", &result, Some(orders.len())))
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(border_color(&result)));

    if orders.is_empty() {
      let paragraph = Paragraph::new(empty_message(&result, "orders"))
        .block(block)
        .style(Style::default().fg(Color::DarkGray));
      frame.render_widget(paragraph, area);
      return;
    }

    let items: Vec<ListItem> = orders
      .iter()
      .map(|order| {
        ListItem::new(Line::from(vec![
          Span::styled(
            format!("{:<14}", truncate(&order.reference, 14)),
            Style::default().fg(Color::Cyan),
          ),
          Span::raw(" "),
          Span::styled(
            format!("{:<10}", order.status),
            Style::default().fg(status_color(order.status)),
          ),
          Span::raw(" "),
          Span::styled(
            order.created_at.format("%Y-%m-%d").to_string(),
            Style::default().fg(Color::DarkGray),
          ),
          Span::raw(format!("{:>6}  ", order.total_quantity)),
          Span::raw(truncate(&order.client, 40)),
        ]))
      })
      .collect();

    let list = List::new(items)
      .block(block)
      .highlight_style(
        Style::default()
          .bg(Color::DarkGray)
          .add_modifier(Modifier::BOLD),
      )
      .highlight_symbol("> ");
    frame.render_stateful_widget(list, area, &mut self.list_state);
  }

  fn breadcrumb_label(&self) -> String {
    "Orders".to_string()
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new(":", "command").with_priority(10),
      ShortcutInfo::new("enter", "open").with_priority(15),
      ShortcutInfo::new("r", "refresh").with_priority(20),
      ShortcutInfo::new("q", "back").with_priority(90),
    ]
  }
}
