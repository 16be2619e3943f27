//! Pointsboard - dance competition points from the command line.
//!
//! Loads the pre-computed points dataset through the offline cache, prints
//! a summary, and picks up upstream changes as soon as the cache worker
//! reports them.

mod app;

use std::io;

use anyhow::{bail, Context, Result};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use app::App;

/// Set to a directory to also write a daily rolling log file there
const LOG_DIR_ENV: &str = "POINTSBOARD_LOG_DIR";

const LOG_FILE_PREFIX: &str = "pointsboard.log";

const USAGE: &str = "\
Usage: pointsboard [COMMAND]

Commands:
  (none)            Print a summary of the current dataset
  --watch           Print a summary every time the dataset changes
  --dancer <id>     Show one dancer's placements
  --favorite <id>   Add or remove a favorite dancer
  --favorites       List favorite dancers
  --cache-status    List cached responses
  --prune-caches    Delete old cache generations
  --help            Show this message";

#[derive(Debug, PartialEq, Eq)]
enum Command {
    Summary,
    Watch,
    Dancer(u32),
    ToggleFavorite(u32),
    Favorites,
    CacheStatus,
    PruneCaches,
    Help,
}

fn parse_args(args: &[String]) -> Result<Command> {
    let Some(flag) = args.get(1) else {
        return Ok(Command::Summary);
    };
    let id = || -> Result<u32> {
        let raw = args
            .get(2)
            .with_context(|| format!("{} needs a dancer id", flag))?;
        raw.parse()
            .with_context(|| format!("Invalid dancer id: {}", raw))
    };

    let command = match flag.as_str() {
        "--watch" => Command::Watch,
        "--dancer" => Command::Dancer(id()?),
        "--favorite" => Command::ToggleFavorite(id()?),
        "--favorites" => Command::Favorites,
        "--cache-status" => Command::CacheStatus,
        "--prune-caches" => Command::PruneCaches,
        "--help" | "-h" => Command::Help,
        other => bail!("Unknown argument: {}\n\n{}", other, USAGE),
    };
    Ok(command)
}

/// Initialize the tracing subscriber for logging.
/// The returned guard flushes the file log when dropped.
fn init_tracing() -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match std::env::var(LOG_DIR_ENV) {
        Ok(dir) if !dir.trim().is_empty() => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(fmt::layer().with_writer(writer).with_ansi(false)), Some(guard))
        }
        _ => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let args: Vec<String> = std::env::args().collect();
    let command = parse_args(&args)?;
    if command == Command::Help {
        println!("{}", USAGE);
        return Ok(());
    }

    let _log_guard = init_tracing();
    info!(?command, "Pointsboard starting");

    let app = App::new().await?;
    match command {
        Command::Summary => app.summary().await?,
        Command::Watch => app.watch().await?,
        Command::Dancer(id) => app.show_dancer(id).await?,
        Command::ToggleFavorite(id) => app.toggle_favorite(id)?,
        Command::Favorites => app.list_favorites().await?,
        Command::CacheStatus => app.cache_status()?,
        Command::PruneCaches => app.prune_caches()?,
        Command::Help => {}
    }

    // Let background refreshes land in the cache before exiting
    app.finish().await;
    info!("Pointsboard shutting down");
    Ok(())
}
