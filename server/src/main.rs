use anyhow::Context;
use clap::Parser;
use log::info;
use speedball_server::config::ServerConfig;
use speedball_server::level::LevelDescription;
use speedball_server::network::Server;
use speedball_shared::HEARTBEAT_INTERVAL;
use std::path::PathBuf;

/// Command line arguments
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Server IP address to bind to
    #[clap(short = 'H', long, default_value = "127.0.0.1")]
    host: String,
    /// Server port to listen on
    #[clap(short, long, default_value = "8080")]
    port: u16,
    /// Tick rate (steps per second)
    #[clap(short, long, default_value = "30")]
    tick_rate: u32,
    /// JSON level description, the built-in testing level if omitted
    #[clap(short, long)]
    level: Option<PathBuf>,
    /// Seconds between heartbeat probes
    #[clap(long, default_value_t = HEARTBEAT_INTERVAL)]
    heartbeat_interval: f64,
    /// Unanswered heartbeat intervals before a client is dropped, 0 disables
    #[clap(long, default_value = "10")]
    heartbeat_timeout: u32,
    /// Goals needed to end the match
    #[clap(long)]
    score_limit: Option<u32>,
}

/// Parses command-line arguments, loads the level and runs the server until Ctrl+C.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let level = match &args.level {
        Some(path) => LevelDescription::load(path)
            .with_context(|| format!("failed to load level {}", path.display()))?,
        None => LevelDescription::testing(),
    };

    let config = ServerConfig {
        max_players: level.teams.len(),
        tick_rate: args.tick_rate,
        heartbeat_interval: args.heartbeat_interval,
        heartbeat_timeout_intervals: (args.heartbeat_timeout > 0).then_some(args.heartbeat_timeout),
        score_limit: args.score_limit,
    };

    let address = format!("{}:{}", args.host, args.port);
    let server = Server::bind(&address, config, &level)
        .await
        .with_context(|| format!("failed to start server on {}", address))?;

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
