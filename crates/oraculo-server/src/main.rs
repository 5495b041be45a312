use std::sync::Arc;

use clap::Parser;
use tokio::signal::unix::{signal, SignalKind};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod server;
use server::ServerState;

use oraculo_core::config::OraculoConfig;
use oraculo_core::ipc::{logs_dir, IpcServer};

#[derive(Parser)]
#[command(name = "oraculo-server")]
#[command(about = "Standalone OráculoScript session server")]
#[command(version)]
struct Args {
    /// Server name for the IPC socket
    #[arg(short, long, default_value = "default", env = "ORACULO_SOCKET")]
    socket: String,

    /// Program backing ai.craftHtml (overrides the config file)
    #[arg(short, long, env = "ORACULO_GENERATOR")]
    generator: Option<String>,

    /// Evict sessions idle for this many seconds (overrides the config file)
    #[arg(long)]
    idle_secs: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let file_appender = tracing_appender::rolling::never(logs_dir(), "oraculo-server.log");
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(file_appender)
        .with_ansi(false)
        .init();

    info!(server = %args.socket, "Starting oraculo-server");

    let mut config = OraculoConfig::load();
    if let Some(idle_secs) = args.idle_secs {
        config.session_idle_secs = idle_secs;
    }
    let state = Arc::new(ServerState::new(args.socket.clone(), &config, args.generator));

    let server = IpcServer::new(state.store(), &state.name);
    let shutdown = server.shutdown_signal();
    let sweeper = state.spawn_sweeper();

    let mut sigterm = signal(SignalKind::terminate())?;

    tokio::select! {
        result = server.run() => {
            if let Err(e) = result {
                info!(error = %e, "IPC server exited");
            }
        }
        _ = shutdown.notified() => {
            info!("Shutdown requested via IPC");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received SIGINT");
        }
        _ = sigterm.recv() => {
            info!("Received SIGTERM");
        }
    }

    info!("Cleaning up");
    sweeper.abort();
    let sessions = state.store().len().await;
    // Dropping the server removes its socket.
    drop(server);
    info!(sessions, "Server stopped");

    Ok(())
}
