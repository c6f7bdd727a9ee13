use abattoir_dash::app::App;
use abattoir_dash::config::Config;
use abattoir_dash::logging;
use clap::Parser;
use color_eyre::Result;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "abattoir-dash")]
#[command(about = "A terminal dashboard for abattoir stock, orders and history")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/abattoir-dash/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Abattoir to show
  #[arg(short, long)]
  abattoir: Option<i64>,

  /// Override the API base URL
  #[arg(short, long)]
  url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  // Load configuration
  let mut config = Config::load(args.config.as_deref())?;

  // Command line wins over the config file
  if let Some(abattoir) = args.abattoir {
    config.abattoir_id = Some(abattoir);
  }
  if let Some(url) = args.url {
    config.api.url = url;
  }

  let _log_guard = logging::init(&Config::data_dir())?;

  let mut app = App::new(config)?;
  app.run().await?;

  Ok(())
}
