use clap::Parser;
use log::info;
use mediation::{MediationConfig, MediationServer};
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about = "Rendezvous server for hosts and joiners", long_about = None)]
struct Args {
    /// Address to bind to
    #[arg(short = 'b', long, default_value = "0.0.0.0:8080")]
    bind: String,

    /// Seconds without a keep-alive before a host is dropped
    #[arg(short = 't', long, default_value = "7")]
    host_timeout: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    let config = MediationConfig {
        bind_addr: args.bind,
        host_timeout: Duration::from_secs(args.host_timeout),
        ..MediationConfig::default()
    };

    info!("Starting mediation server...");
    let server = MediationServer::bind(config).await?;
    server.run().await?;

    Ok(())
}
