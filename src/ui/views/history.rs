use super::empty_message;
use crate::api::types::HistoryEntry;
use crate::query::QueryHandle;
use crate::ui::ensure_valid_selection;
use crate::ui::renderfns::{border_color, query_title, truncate};
use crate::ui::view::{View, ViewAction, ViewContext};
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph};

pub struct HistoryView {
  handle: QueryHandle<Vec<HistoryEntry>>,
  list_state: ListState,
}

impl HistoryView {
  pub fn new(ctx: &ViewContext) -> Self {
    let handle = ctx.queries.watch_history(ctx.abattoir_id, ctx.redraw());
    Self {
      handle,
      list_state: ListState::default(),
    }
  }
}

impl View for HistoryView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    match key.code {
      KeyCode::Char('j') | KeyCode::Down => self.list_state.select_next(),
      KeyCode::Char('k') | KeyCode::Up => self.list_state.select_previous(),
      KeyCode::Char('r') => self.handle.refetch(),
      KeyCode::Char('q') | KeyCode::Esc => return ViewAction::Pop,
      _ => {}
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    let result = self.handle.result();
    let entries = result.data_or_stale().cloned().unwrap_or_default();
    ensure_valid_selection(&mut self.list_state, entries.len());

    let block = Block::default()
      .title(query_title("History", &result, Some(entries.len())))
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(border_color(&result)));

    if entries.is_empty() {
      let paragraph = Paragraph::new(empty_message(&result, "history"))
        .block(block)
        .style(Style::default().fg(Color::DarkGray));
      frame.render_widget(paragraph, area);
      return;
    }

    let items: Vec<ListItem> = entries
      .iter()
      .map(|entry| {
        let quantity = entry
          .quantity
          .map(|q| format!("{:>+6}", q))
          .unwrap_or_else(|| " ".repeat(6));
        ListItem::new(Line::from(vec![
          Span::styled(
            entry.at.format("%Y-%m-%d %H:%M").to_string(),
            Style::default().fg(Color::DarkGray),
          ),
          Span::raw(" "),
          Span::styled(
            format!("{:<14}", truncate(&entry.kind, 14)),
            Style::default().fg(Color::Yellow),
          ),
          Span::raw(quantity),
          Span::raw("  "),
          Span::raw(truncate(&entry.description, 60)),
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
    "History".to_string()
  }
}
