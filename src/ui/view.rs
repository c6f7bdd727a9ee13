use crate::api::StatsQueries;
use crate::event::Event;
use crate::query::QueryResult;
use crossterm::event::KeyEvent;
use ratatui::prelude::*;
use tokio::sync::mpsc;
use tracing::trace;

/// A keyboard shortcut hint for display in the header
#[derive(Debug, Clone)]
pub struct ShortcutInfo {
  pub key: &'static str,
  pub label: &'static str,
  pub priority: u8, // Lower = shown first
}

impl ShortcutInfo {
  pub const fn new(key: &'static str, label: &'static str) -> Self {
    Self {
      key,
      label,
      priority: 100,
    }
  }

  pub const fn with_priority(mut self, priority: u8) -> Self {
    self.priority = priority;
    self
  }
}

/// Actions that a view can request in response to user input
pub enum ViewAction {
  /// No action needed
  None,
  /// Push a new view onto the stack
  Push(Box<dyn View>),
  /// Pop current view from stack (go back)
  Pop,
}

/// What every view needs to reach the API and wake the UI.
#[derive(Clone)]
pub struct ViewContext {
  pub queries: StatsQueries,
  pub events: mpsc::UnboundedSender<Event>,
  pub abattoir_id: i64,
}

impl ViewContext {
  /// Query listener that asks the app to redraw.
  pub fn redraw<T: ?Sized>(&self) -> impl Fn(&QueryResult<T>) + Send + Sync + 'static {
    let tx = self.events.clone();
    move |_| {
      if tx.send(Event::QueryUpdated).is_err() {
        trace!("Event loop gone, dropping redraw");
      }
    }
  }

  /// Show a message in the footer.
  pub fn notify(&self, message: impl Into<String>) {
    if let Err(e) = self.events.send(Event::Notice(message.into())) {
      trace!(notice = ?e.0, "Event loop gone, dropping notice");
    }
  }
}

/// Trait for view behavior
///
/// Views own the `QueryHandle`s for the data they show. Dropping a view
/// (popping it off the stack) unsubscribes from its queries, leaving the
/// cached data to the gc horizon.
pub trait View {
  /// Handle a key event, returning an action for App to execute
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction;

  /// Render the view to the frame
  fn render(&mut self, frame: &mut Frame, area: Rect);

  /// Get the breadcrumb label for this view
  fn breadcrumb_label(&self) -> String;

  /// Get keyboard shortcuts to display in the header
  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new(":", "command").with_priority(10),
      ShortcutInfo::new("r", "refresh").with_priority(20),
      ShortcutInfo::new("q", "back").with_priority(90),
    ]
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::{ApiClient, QueryDefaults};
  use crate::query::{QueryClient, QueryState};
  use std::sync::Arc;
  use std::time::Duration;

  fn context() -> (ViewContext, mpsc::UnboundedReceiver<Event>) {
    let api = ApiClient::with_token("http://127.0.0.1:9", None, Duration::from_secs(1)).unwrap();
    let queries = StatsQueries::new(QueryClient::new(), api, QueryDefaults::default());
    let (tx, rx) = mpsc::unbounded_channel();
    let ctx = ViewContext {
      queries,
      events: tx,
      abattoir_id: 6,
    };
    (ctx, rx)
  }

  fn loaded() -> QueryResult<u32> {
    QueryResult {
      state: QueryState::Success(Arc::new(1)),
      stale_data: None,
      fetched_at: None,
      failure_count: 0,
      is_stale: false,
    }
  }

  #[test]
  fn test_events_reach_the_app() {
    let (ctx, mut rx) = context();
    ctx.redraw::<u32>()(&loaded());
    ctx.notify("BC-012 validated");

    assert!(matches!(rx.try_recv(), Ok(Event::QueryUpdated)));
    assert!(matches!(rx.try_recv(), Ok(Event::Notice(msg)) if msg == "BC-012 validated"));
  }

  #[test]
  fn test_events_after_shutdown_are_dropped() {
    let (ctx, rx) = context();
    drop(rx);
    ctx.redraw::<u32>()(&loaded());
    ctx.notify("late");
    assert!(ctx.events.is_closed());
  }
}
