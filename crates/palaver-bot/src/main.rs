//! Palaver Telegram bot entry point.
//!
//! Binary name: `palaver`
//!
//! Parses CLI arguments, loads and validates the config file, wires the
//! session store and completion backends, then runs the Telegram
//! long-polling dispatcher until ctrl-c.

mod state;
mod telegram;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use teloxide::Bot;

use palaver_infra::config::load_config;
use state::AppState;

/// Telegram chat bot backed by OpenAI-compatible completion APIs.
#[derive(Debug, Parser)]
#[command(name = "palaver", version)]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "palaver.toml", env = "PALAVER_CONFIG")]
    config: PathBuf,

    /// Export spans to stdout via OpenTelemetry.
    #[arg(long)]
    otel: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    palaver_observe::tracing_setup::init_tracing(args.otel)
        .map_err(|e| anyhow::anyhow!("failed to initialize tracing: {e}"))?;

    let config = load_config(&args.config).await?;
    let bot = Bot::new(config.telegram.token.clone());
    let state = Arc::new(AppState::init(&config, bot.clone()).await?);

    tracing::info!("Starting palaver");
    telegram::run(bot, state.clone()).await;

    // Dispatcher has stopped; cancel in-flight completions and flush traces.
    state.cancel.cancel();
    palaver_observe::tracing_setup::shutdown_tracing();
    Ok(())
}
