use clap::Parser;
use log::info;
use server::{Server, ServerConfig};
use shared::{BuiltinLevels, MEDIATION_PORT, SERVER_PORT};
use std::net::{SocketAddr, ToSocketAddrs};
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Address to bind the game socket to
    #[arg(short = 'b', long, default_value_t = format!("0.0.0.0:{}", SERVER_PORT))]
    bind: String,

    /// Mediation service host; omit to only accept local players
    #[arg(short = 'm', long)]
    mediation: Option<String>,

    /// Keyword players use to join this host
    #[arg(short = 'k', long, default_value = "ABCD")]
    keyword: String,

    /// Simulation ticks per second
    #[arg(short = 't', long, default_value_t = 60)]
    tick_rate: u32,

    /// Seed for level picks and enemy spawns
    #[arg(long)]
    seed: Option<u64>,
}

/// Accepts either `host` or `host:port`, defaulting to the mediation port
fn resolve_mediation(host: &str) -> Result<SocketAddr, Box<dyn std::error::Error>> {
    let with_port = if host.contains(':') {
        host.to_string()
    } else {
        format!("{}:{}", host, MEDIATION_PORT)
    };

    with_port
        .to_socket_addrs()?
        .next()
        .ok_or_else(|| format!("could not resolve {}", host).into())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Tip: Set RUST_LOG=info to see server logs");
    }

    let args = Args::parse();

    let mediation_addr = args.mediation.as_deref().map(resolve_mediation).transpose()?;

    let config = ServerConfig {
        bind_addr: args.bind,
        mediation_addr,
        keyword: args.keyword,
        tick_interval: Duration::from_secs_f64(1.0 / f64::from(args.tick_rate.max(1))),
        seed: args.seed,
        ..ServerConfig::default()
    };

    info!(
        "Starting host '{}' at {} ticks/s",
        config.keyword, args.tick_rate
    );

    let mut server = Server::new(config, Box::new(BuiltinLevels)).await?;
    server.run().await
}
