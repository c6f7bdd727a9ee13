use crate::api::{ApiClient, QueryDefaults, StatsQueries};
use crate::config::Config;
use crate::event::{Event, EventHandler};
use crate::query::QueryClient;
use crate::ui;
use crate::ui::components::{CommandEvent, CommandInput, KeyResult};
use crate::ui::renderfns::extract_host;
use crate::ui::view::{View, ViewAction, ViewContext};
use crate::ui::views::{HistoryView, OrdersView, StockView};
use color_eyre::{eyre::eyre, Result};
use crossterm::event::{DisableFocusChange, EnableFocusChange, KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{
  disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::prelude::*;
use std::io::stdout;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

/// How often to retry the API while offline
const RECONNECT_CHECK: Duration = Duration::from_secs(10);

/// Main application state
pub struct App {
  /// Navigation stack - root is always at index 0
  view_stack: Vec<Box<dyn View>>,

  /// `:` command palette
  command_input: CommandInput,

  config: Config,

  /// Shared cache, also reachable through `ctx.queries`
  client: QueryClient,

  ctx: ViewContext,

  events: EventHandler,

  /// Latest footer message
  notice: Option<String>,

  /// Last time connectivity was checked while offline
  last_check: Option<Instant>,

  should_quit: bool,
}

impl App {
  pub fn new(config: Config) -> Result<Self> {
    let abattoir_id = config.abattoir_id.ok_or_else(|| {
      eyre!("No abattoir selected. Set abattoir_id in the config or pass --abattoir.")
    })?;

    let api = ApiClient::new(&config)?;
    let client = QueryClient::new();
    let defaults = QueryDefaults::from_config(&config.queries);
    let queries = StatsQueries::new(client.clone(), api, defaults);

    let events = EventHandler::new(config.tick_rate());
    let ctx = ViewContext {
      queries,
      events: events.sender(),
      abattoir_id,
    };

    Ok(Self {
      view_stack: vec![Box::new(StockView::new(&ctx))],
      command_input: CommandInput::new(),
      config,
      client,
      ctx,
      events,
      notice: None,
      last_check: None,
      should_quit: false,
    })
  }

  pub async fn run(&mut self) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    stdout().execute(EnableFocusChange)?;

    let result = self.event_loop().await;

    // Cleanup terminal, even if the loop failed
    let _ = stdout().execute(DisableFocusChange);
    let _ = stdout().execute(LeaveAlternateScreen);
    let _ = disable_raw_mode();

    self.client.shutdown();
    result
  }

  async fn event_loop(&mut self) -> Result<()> {
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;
    info!(abattoir_id = self.ctx.abattoir_id, "Dashboard started");

    while !self.should_quit {
      terminal.draw(|frame| ui::draw(frame, self))?;

      match self.events.next().await {
        Some(event) => self.handle_event(event),
        None => break,
      }
    }
    Ok(())
  }

  fn handle_event(&mut self, event: Event) {
    match event {
      Event::Key(key) => self.handle_key(key),
      Event::FocusGained => {
        let refetched = self.client.on_focus();
        debug!(refetched, "Window focused");
      }
      Event::Tick => self.check_connectivity(),
      Event::QueryUpdated => {} // Redraw happens on the next loop
      Event::Notice(message) => self.notice = Some(message),
    }
  }

  /// While offline, periodically assume the network is back. Observed
  /// stale queries refetch and a network failure flips us offline again.
  fn check_connectivity(&mut self) {
    if self.client.is_online() {
      self.last_check = None;
      return;
    }
    let now = Instant::now();
    match self.last_check {
      None => self.last_check = Some(now),
      Some(last) if now.duration_since(last) >= RECONNECT_CHECK => {
        self.last_check = Some(now);
        let refetched = self.client.set_online(true);
        info!(refetched, "Retrying connectivity");
      }
      Some(_) => {}
    }
  }

  fn handle_key(&mut self, key: KeyEvent) {
    match self.command_input.handle_key(key) {
      KeyResult::Handled => return,
      KeyResult::Event(CommandEvent::Submitted(cmd)) => {
        self.execute_command(&cmd);
        return;
      }
      KeyResult::Event(CommandEvent::Cancelled) => return,
      KeyResult::NotHandled => {}
    }

    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
      self.should_quit = true;
      return;
    }

    let action = match self.view_stack.last_mut() {
      Some(view) => view.handle_key(key),
      None => ViewAction::None,
    };
    self.apply(action);
  }

  fn apply(&mut self, action: ViewAction) {
    match action {
      ViewAction::None => {}
      ViewAction::Push(view) => self.view_stack.push(view),
      ViewAction::Pop => {
        if self.view_stack.len() > 1 {
          self.view_stack.pop();
        } else {
          self.should_quit = true;
        }
      }
    }
  }

  fn execute_command(&mut self, cmd: &str) {
    let root: Box<dyn View> = match cmd {
      "stock" => Box::new(StockView::new(&self.ctx)),
      "orders" => Box::new(OrdersView::new(&self.ctx)),
      "history" => Box::new(HistoryView::new(&self.ctx)),
      "quit" => {
        self.should_quit = true;
        return;
      }
      "" => return,
      other => {
        self.notice = Some(format!("Unknown command: {}", other));
        return;
      }
    };
    debug!(command = cmd, "Switching root view");
    // Drop the old stack first so its queries are released
    self.view_stack.clear();
    self.view_stack.push(root);
    self.notice = None;
  }

  // Accessors for UI rendering
  pub fn current_view(&self) -> Option<&dyn View> {
    self.view_stack.last().map(|v| v.as_ref())
  }

  pub fn current_view_mut(&mut self) -> Option<&mut Box<dyn View>> {
    self.view_stack.last_mut()
  }

  pub fn command_input(&self) -> &CommandInput {
    &self.command_input
  }

  pub fn title(&self) -> &str {
    self
      .config
      .title
      .as_deref()
      .unwrap_or_else(|| extract_host(&self.config.api.url))
  }

  pub fn abattoir_id(&self) -> i64 {
    self.ctx.abattoir_id
  }

  pub fn is_online(&self) -> bool {
    self.client.is_online()
  }

  pub fn notice(&self) -> Option<&str> {
    self.notice.as_deref()
  }

  pub fn view_breadcrumb(&self) -> Vec<String> {
    self
      .view_stack
      .iter()
      .map(|v| v.breadcrumb_label())
      .collect()
  }
}
