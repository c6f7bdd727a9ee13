use crate::query::QueryOptions;
use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

const APP_NAME: &str = "abattoir-dash";
const DEFAULT_TICK_RATE_MS: u64 = 250;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  pub api: ApiConfig,
  /// Abattoir shown at start-up
  pub abattoir_id: Option<i64>,
  /// Custom title for header (defaults to the API host if not set)
  pub title: Option<String>,
  pub tick_rate_ms: Option<u64>,
  #[serde(default)]
  pub queries: QueriesConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
  pub url: String,
  /// Per-request timeout
  pub timeout_secs: Option<u64>,
}

/// Cache tuning per resource. Unset fields keep the built-in defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QueriesConfig {
  #[serde(default)]
  pub stock: QueryTuning,
  #[serde(default)]
  pub orders: QueryTuning,
  #[serde(default)]
  pub order_detail: QueryTuning,
  #[serde(default)]
  pub history: QueryTuning,
  /// Retries for order validation (default 0)
  pub validate_retries: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct QueryTuning {
  pub stale_time_secs: Option<u64>,
  pub gc_time_secs: Option<u64>,
  pub max_retries: Option<u32>,
  /// 0 disables polling
  pub poll_interval_secs: Option<u64>,
}

impl QueryTuning {
  /// Override `options` with whatever is set here.
  pub fn apply(&self, mut options: QueryOptions) -> QueryOptions {
    if let Some(secs) = self.stale_time_secs {
      options.stale_time = Duration::from_secs(secs);
    }
    if let Some(secs) = self.gc_time_secs {
      options.gc_time = Duration::from_secs(secs);
    }
    if let Some(retries) = self.max_retries {
      options.max_retries = retries;
    }
    match self.poll_interval_secs {
      Some(0) => options.poll_interval = None,
      Some(secs) => options.poll_interval = Some(Duration::from_secs(secs)),
      None => {}
    }
    options
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./abattoir-dash.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/abattoir-dash/config.yaml
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Err(eyre!(
        "No configuration file found. Create one at ~/.config/{}/config.yaml\n\
         See config.example.yaml for the format.",
        APP_NAME
      )),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from(format!("{}.yaml", APP_NAME));
    if local.exists() {
      return Some(local);
    }

    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join(APP_NAME).join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents).map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  pub fn parse(contents: &str) -> Result<Self> {
    let config: Config = serde_yaml::from_str(contents)?;
    Ok(config)
  }

  pub fn tick_rate(&self) -> Duration {
    Duration::from_millis(self.tick_rate_ms.unwrap_or(DEFAULT_TICK_RATE_MS))
  }

  /// Get the API token from environment variables.
  ///
  /// Checks ABATTOIR_DASH_TOKEN first, then API_TOKEN as fallback.
  pub fn get_api_token() -> Result<String> {
    std::env::var("ABATTOIR_DASH_TOKEN")
      .or_else(|_| std::env::var("API_TOKEN"))
      .map_err(|_| {
        eyre!("API token not found. Set ABATTOIR_DASH_TOKEN or API_TOKEN environment variable.")
      })
  }

  /// Directory for the log file.
  pub fn data_dir() -> PathBuf {
    dirs::data_local_dir()
      .unwrap_or_else(std::env::temp_dir)
      .join(APP_NAME)
  }
}
