//! IRXR client entry point.
//!
//! Loads the config, installs logging, then drives [`NetManager::tick`] from
//! a Tokio interval until Ctrl-C.
//!
//! # Architecture
//!
//! ```text
//! main()
//!  └─ load_config_from(path) / load_config()
//!  └─ NetManager::new(TcpTransport, SystemInterfaces)
//!  └─ loop
//!       ├─ interval tick   -> manager.tick(), then drain NetEvents
//!       └─ Ctrl-C          -> manager.shutdown()
//! ```
//!
//! # Usage
//!
//! ```text
//! irxr-client [path/to/config.toml]
//! ```
//!
//! Without an argument the platform config file is used; a missing file
//! means defaults.  `RUST_LOG` overrides the config's `log_level`.
//!
//! # Why a current-thread runtime? (for beginners)
//!
//! The manager is not shared between threads: every socket call happens
//! inside `tick` on the thread that owns it.  A single-threaded runtime is
//! enough to multiplex the tick timer with the Ctrl-C signal.

use std::path::PathBuf;

use anyhow::Context;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use irxr_client::application::net_manager::{NetEvent, NetManager};
use irxr_client::infrastructure::config::{load_config, load_config_from};
use irxr_client::infrastructure::interfaces::SystemInterfaces;
use irxr_client::infrastructure::tcp::TcpTransport;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let config = match std::env::args_os().nth(1).map(PathBuf::from) {
        Some(path) => load_config_from(&path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => load_config().context("loading platform config")?,
    };

    // Initialise structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.client.log_level)),
        )
        .init();

    info!("IRXR client starting as {}", config.client.host_name);

    let manager_config = config.to_manager_config().context("invalid config")?;
    let (mut manager, mut events) = NetManager::new(
        manager_config,
        Box::new(TcpTransport::new()),
        Box::new(SystemInterfaces::new()),
    )
    .context("starting network manager")?;

    for topic in &config.client.subscribe_topics {
        let name = topic.clone();
        manager.subscribe_topic(
            topic,
            Box::new(move |msg: &str| info!(topic = %name, "received {msg}")),
        );
    }

    let mut interval = tokio::time::interval(config.tick_interval());
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                manager.tick();
                log_events(&mut events);
            }
            signal = tokio::signal::ctrl_c() => {
                if let Err(e) = signal {
                    warn!("failed to listen for Ctrl-C: {e}");
                }
                info!("shutdown signal received");
                break;
            }
        }
    }

    manager.shutdown();
    log_events(&mut events);
    info!("IRXR client stopped");
    Ok(())
}

/// Logs every event queued since the last call.
fn log_events(events: &mut mpsc::UnboundedReceiver<NetEvent>) {
    while let Ok(event) = events.try_recv() {
        match event {
            NetEvent::ServerDiscovered { server, local_ip } => {
                info!("server {} at {} reachable from {local_ip}", server.name, server.ip);
            }
            NetEvent::ConnectionCompleted { ack: Some(ack) } => {
                info!("registered with server: {ack}");
            }
            NetEvent::ConnectionCompleted { ack: None } => {
                warn!("connected, but registration was not acknowledged");
            }
            NetEvent::Disconnected => info!("server connection lost"),
        }
    }
}
