//! VERSUS TETRS matchmaking relay

use anyhow::{Context, Result};
use clap::Parser;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing_subscriber::{EnvFilter, fmt};
use versus_tetrs::matchmaking::DEFAULT_PORT;
use versus_tetrs::relay::{Relay, RelayConfig};

/// Pairs players and relays their match traffic
#[derive(Parser, Debug, Clone)]
#[command(name = "versus-relay", version)]
struct Opts {
    /// Address to listen on
    #[arg(long, default_value_t = format!("0.0.0.0:{DEFAULT_PORT}"))]
    bind: String,
    /// Rooms that may be open at once (at most 9000)
    #[arg(long, default_value_t = 1000)]
    max_rooms: usize,
    /// Seconds between liveness checks of waiting clients
    #[arg(long, default_value_t = 5)]
    probe_interval_secs: u64,
    /// Seconds a client gets to say what it wants
    #[arg(long, default_value_t = 10)]
    handshake_timeout_secs: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let opts = Opts::parse();
    let config = RelayConfig {
        max_rooms: opts.max_rooms,
        probe_interval: Duration::from_secs(opts.probe_interval_secs.max(1)),
        handshake_timeout: Duration::from_secs(opts.handshake_timeout_secs.max(1)),
    };

    let listener = TcpListener::bind(&opts.bind)
        .await
        .with_context(|| format!("binding {}", opts.bind))?;
    Relay::new(config).serve(listener).await?;
    Ok(())
}
