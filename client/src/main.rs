use clap::Parser;
use client::{Client, ClientConfig, ClientEvent, ClientHandle, Intent, Session};
use log::{error, info, warn};
use server::{Server, ServerConfig};
use shared::{BuiltinLevels, RoundPhase, MEDIATION_PORT, SERVER_PORT};
use std::net::{SocketAddr, ToSocketAddrs};
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Mediation service host
    #[arg(short = 'm', long, default_value = "127.0.0.1")]
    mediation: String,

    /// Keyword of the host to join, or to host under
    #[arg(short = 'k', long, default_value = "ABCD")]
    keyword: String,

    /// Connect straight to a host, skipping mediation
    #[arg(short = 'l', long, conflicts_with = "host")]
    local: Option<String>,

    /// Run the host in this process and join it
    #[arg(long)]
    host: bool,

    /// Address to bind the client socket to
    #[arg(short = 'b', long, default_value = "0.0.0.0:0")]
    bind: String,

    /// Play without a keyboard: ready up, shoot the nearest enemy, take the
    /// first boon
    #[arg(short = 'a', long)]
    auto: bool,
}

/// Accepts either `host` or `host:port`
fn resolve(host: &str, default_port: u16) -> Result<SocketAddr, Box<dyn std::error::Error>> {
    let with_port = if host.contains(':') {
        host.to_string()
    } else {
        format!("{}:{}", host, default_port)
    };

    with_port
        .to_socket_addrs()?
        .next()
        .ok_or_else(|| format!("could not resolve {}", host).into())
}

/// Starts the authoritative server next to this client
async fn start_host(
    mediation: SocketAddr,
    keyword: &str,
) -> Result<SocketAddr, Box<dyn std::error::Error>> {
    let config = ServerConfig {
        bind_addr: format!("0.0.0.0:{}", SERVER_PORT),
        mediation_addr: Some(mediation),
        keyword: keyword.to_string(),
        ..ServerConfig::default()
    };

    let mut server = Server::new(config, Box::new(BuiltinLevels)).await?;
    let port = server.local_addr()?.port();
    tokio::spawn(async move {
        if let Err(e) = server.run().await {
            error!("Host stopped: {}", e);
        }
    });

    Ok(SocketAddr::from(([127, 0, 0, 1], port)))
}

fn log_event(event: &ClientEvent) {
    match event {
        ClientEvent::LevelChanged(level) => info!("Entered {}", level),
        ClientEvent::EnemiesSpawned(enemies) => info!("{} enemies incoming", enemies.len()),
        ClientEvent::BoonSpawned(boons) => {
            for boon in boons {
                info!("Boon offered: {:?}", boon.modifiers);
            }
        }
        ClientEvent::PlayerDied(addr) => info!("Player at {} died", addr),
        ClientEvent::RoundStateChanged(state) => info!("Round is now {:?}", state.phase),
        ClientEvent::GameOver => info!("Game over"),
        ClientEvent::PrepareNewLevel => info!("Next level starting"),
    }
}

/// One step of the keyboard-less player
async fn autopilot(handle: &ClientHandle) -> Vec<Intent> {
    let world = handle.world.read().await;
    let me = world.local.position;
    let mut intents = Vec::new();

    if let Some(boon) = world.boons.first() {
        if boon.in_range(&me) {
            intents.push(Intent::Move((0.0, 0.0)));
            intents.push(Intent::PickModifier);
        } else {
            intents.push(Intent::Move((boon.position.x - me.x, boon.position.y - me.y)));
        }
        return intents;
    }

    let nearest = world
        .enemies
        .iter()
        .filter(|enemy| !enemy.is_idle())
        .min_by(|a, b| a.position.distance(&me).total_cmp(&b.position.distance(&me)));
    if let Some(enemy) = nearest {
        let aim = (enemy.position.y - me.y).atan2(enemy.position.x - me.x);
        intents.push(Intent::Aim(aim));
        intents.push(Intent::Shoot);
    }

    intents
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    let session = if args.host {
        let mediation = resolve(&args.mediation, MEDIATION_PORT)?;
        let host = start_host(mediation, &args.keyword).await?;
        info!("Hosting '{}' on port {}", args.keyword, host.port());
        Session::Local(host)
    } else if let Some(local) = &args.local {
        Session::Local(resolve(local, SERVER_PORT)?)
    } else {
        Session::Join {
            mediation: resolve(&args.mediation, MEDIATION_PORT)?,
            keyword: args.keyword.clone(),
        }
    };

    let config = ClientConfig {
        bind_addr: args.bind.clone(),
        ..ClientConfig::default()
    };

    let (client, mut handle) = Client::connect(config, session, Box::new(BuiltinLevels)).await?;
    info!("Connected to host at {}", client.host());
    let intents = handle.intents.clone();
    let session = tokio::spawn(client.run());

    if args.auto {
        intents.send(Intent::ToggleReady)?;
    }

    let mut autopilot_interval = interval(Duration::from_millis(100));
    autopilot_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut game_over = false;

    loop {
        tokio::select! {
            event = handle.events.recv() => {
                let Some(event) = event else {
                    break;
                };
                log_event(&event);

                match &event {
                    ClientEvent::GameOver => game_over = true,
                    ClientEvent::RoundStateChanged(state)
                        if args.auto && game_over && state.phase == RoundPhase::WaitingRoom =>
                    {
                        game_over = false;
                        intents.send(Intent::ToggleReady)?;
                    }
                    _ => {}
                }
            },

            _ = autopilot_interval.tick(), if args.auto => {
                for intent in autopilot(&handle).await {
                    intents.send(intent)?;
                }
            },

            _ = tokio::signal::ctrl_c() => {
                info!("Quitting");
                intents.send(Intent::Quit)?;
                break;
            },
        }
    }

    match session.await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(e.into()),
        Err(e) => {
            warn!("Session task failed: {}", e);
            Ok(())
        }
    }
}
