use super::empty_message;
use crate::api::types::StockReport;
use crate::query::QueryHandle;
use crate::ui::ensure_valid_selection;
use crate::ui::renderfns::{border_color, query_title, truncate};
use crate::ui::view::{ShortcutInfo, View, ViewAction, ViewContext};
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph};

/// Current stock, polled in the background while shown
pub struct StockView {
  handle: QueryHandle<StockReport>,
  list_state: ListState,
}

impl StockView {
  pub fn new(ctx: &ViewContext) -> Self {
    let handle = ctx.queries.watch_stock(ctx.abattoir_id, ctx.redraw());
    Self {
      handle,
      list_state: ListState::default(),
    }
  }

  fn summary(report: &StockReport) -> Line<'static> {
    let mut spans = vec![
      Span::styled(" Total: ", Style::default().fg(Color::DarkGray)),
      Span::styled(
        format!("{} head", report.count),
        Style::default().fg(Color::Green).bold(),
      ),
    ];
    if let Some(updated) = report.updated_at {
      spans.push(Span::styled(
        format!("   updated {}", updated.format("%Y-%m-%d %H:%M")),
        Style::default().fg(Color::DarkGray),
      ));
    }
    Line::from(spans)
  }
}

impl View for StockView {
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
    let report = result.data_or_stale().cloned();

    let block = Block::default()
      .title(query_title(
        "Stock",
        &result,
        report.as_ref().map(|r| r.lines.len()),
      ))
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(border_color(&result)));

    let Some(report) = report else {
      let paragraph = Paragraph::new(empty_message(&result, "stock"))
        .block(block)
        .style(Style::default().fg(Color::DarkGray));
      frame.render_widget(paragraph, area);
      return;
    };

    let inner = block.inner(area);
    frame.render_widget(block, area);
    let [summary_area, list_area] =
      Layout::vertical([Constraint::Length(2), Constraint::Min(0)]).areas(inner);
    frame.render_widget(Paragraph::new(Self::summary(&report)), summary_area);

    ensure_valid_selection(&mut self.list_state, report.lines.len());
    let items: Vec<ListItem> = report
      .lines
      .iter()
      .map(|line| {
        let weight = line
          .weight_kg
          .map(|kg| format!("{:>10.1} kg", kg))
          .unwrap_or_default();
        ListItem::new(Line::from(vec![
          Span::styled(
            format!("{:<20}", truncate(&line.species, 20)),
            Style::default().fg(Color::Cyan),
          ),
          Span::raw(" "),
          Span::styled(
            format!("{:<16}", truncate(line.category.as_deref().unwrap_or("-"), 16)),
            Style::default().fg(Color::Yellow),
          ),
          Span::raw(format!("{:>6}", line.quantity)),
          Span::styled(weight, Style::default().fg(Color::DarkGray)),
        ]))
      })
      .collect();

    let list = List::new(items)
      .highlight_style(
        Style::default()
          .bg(Color::DarkGray)
          .add_modifier(Modifier::BOLD),
      )
      .highlight_symbol("> ");
    frame.render_stateful_widget(list, list_area, &mut self.list_state);
  }

  fn breadcrumb_label(&self) -> String {
    "Stock".to_string()
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new(":", "command").with_priority(10),
      ShortcutInfo::new("r", "refresh").with_priority(20),
      ShortcutInfo::new("q", "quit").with_priority(90),
    ]
  }
}
