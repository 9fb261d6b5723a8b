//! Parley — session relay and dispatch loop in one process
//!
//! The relay HTTP API and the dispatch loop share a single SessionStore, so
//! the loop reads and writes sessions in-process while external callers go
//! through the API. Ctrl-C shuts both down gracefully: the server drains
//! in-flight requests, the loop finishes its current iteration.

use clap::{Parser, ValueEnum};
use parley_dispatch::{
    DispatchConfig, DispatchLoop, EventReporter, HttpAgentClient, HttpBacklogClient,
};
use parley_relay::RelayService;
use parley_store::SessionStore;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum BindMode {
    Loopback,
    Lan,
}

impl BindMode {
    fn to_addr(self) -> &'static str {
        match self {
            BindMode::Loopback => "127.0.0.1",
            BindMode::Lan => "0.0.0.0",
        }
    }
}

#[derive(Parser)]
#[command(name = "parley", about = "Session relay with a dispatch heartbeat")]
struct Cli {
    /// Port for the relay HTTP API
    #[arg(long, default_value_t = 8080)]
    port: u16,

    /// Bind address mode
    #[arg(long, value_enum, default_value_t = BindMode::Loopback)]
    bind: BindMode,

    /// Serve the relay API only, without running the dispatch loop
    #[arg(long)]
    no_dispatch: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "parley=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = DispatchConfig::from_env();

    let store = Arc::new(SessionStore::new());
    let relay = Arc::new(RelayService::new(store));
    let shutdown = CancellationToken::new();

    info!("Parley v{} starting", env!("CARGO_PKG_VERSION"));

    let loop_handle = if cli.no_dispatch {
        info!("Dispatch loop disabled (--no-dispatch)");
        None
    } else {
        let agent = Arc::new(HttpAgentClient::new(&config.agent_url));
        let backlog = Arc::new(HttpBacklogClient::new(&config.backlog_url));
        let events = EventReporter::new(config.events_url.clone());
        let dispatch = DispatchLoop::new(relay.clone(), agent, backlog, events, config);
        let token = shutdown.clone();
        Some(tokio::spawn(async move { dispatch.run(token).await }))
    };

    let addr: SocketAddr = format!("{}:{}", cli.bind.to_addr(), cli.port).parse()?;
    let server = tokio::spawn(parley_relay::serve(relay, addr, shutdown.clone()));

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");
    shutdown.cancel();

    if let Some(handle) = loop_handle {
        let _ = handle.await;
    }
    server.await??;
    Ok(())
}
