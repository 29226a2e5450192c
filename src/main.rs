mod app;
mod config;
mod filter;
mod profile;
mod remote;
mod store;
mod sync;
mod tags;
mod types;

use clap::Parser;
use color_eyre::Result;
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "mth")]
#[command(about = "Offline-first client for a shared catalog of mix recipes")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/mth/config.yaml)
  #[arg(short, long, global = true)]
  config: Option<PathBuf>,

  /// Keep all local state in memory for this run
  #[arg(long, global = true)]
  ephemeral: bool,

  /// Do not contact the server; read from the local store only
  #[arg(long, global = true)]
  offline: bool,

  #[command(subcommand)]
  command: app::Command,
}

/// Log to `<data dir>/mth/mth.log` so stdout stays clean for command output.
/// `RUST_LOG` overrides the default `mth=info`.
fn init_logging() -> Option<WorkerGuard> {
  let dir = dirs::data_dir()?.join("mth");
  std::fs::create_dir_all(&dir).ok()?;

  let appender = tracing_appender::rolling::never(&dir, "mth.log");
  let (writer, guard) = tracing_appender::non_blocking(appender);
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("mth=info"));

  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(writer)
    .with_ansi(false)
    .try_init()
    .ok()?;
  Some(guard)
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  // Dropping the guard flushes pending log lines
  let _guard = init_logging();

  let config = config::Config::load(args.config.as_deref())?;
  let options = app::RunOptions {
    ephemeral: args.ephemeral,
    offline: args.offline,
  };

  let mut app = app::App::new(&config, options)?;
  app.run(args.command).await?;

  Ok(())
}
