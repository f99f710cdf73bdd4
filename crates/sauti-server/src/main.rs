//! Sauti Server - duplex WebSocket speech job server

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sauti_core::config::{DEFAULT_MAX_PAYLOAD_BYTES, DEFAULT_PORT};
use sauti_core::{Executor, ExecutorKind, FfmpegTranscoder, PackageResolver, ServerConfig};
use sauti_server::backend::BasicBackend;
use sauti_server::state::AppState;
use sauti_server::{build_router, routing};

#[derive(Parser, Debug)]
#[command(name = "sauti-server", about = "Duplex WebSocket speech job server", version)]
struct Args {
    /// Port to bind on
    #[arg(long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Terminate TLS on the listener (requires --cert-path and --key-path)
    #[arg(long)]
    secure: bool,

    /// PEM certificate file for TLS
    #[arg(long)]
    cert_path: Option<PathBuf>,

    /// PEM private key file for TLS
    #[arg(long)]
    key_path: Option<PathBuf>,

    /// Maximum size of a single inbound envelope, in bytes
    #[arg(long, default_value_t = DEFAULT_MAX_PAYLOAD_BYTES)]
    max_payload_bytes: usize,

    /// Run the execution engine on the I/O runtime instead of a dedicated
    /// single-threaded one
    #[arg(long)]
    in_process: bool,

    /// Directory for downloaded model and voice packages
    #[arg(long)]
    packages_dir: Option<PathBuf>,

    /// ffmpeg executable used for transcoding
    #[arg(long, default_value = "ffmpeg")]
    ffmpeg_path: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sauti_server=debug,sauti_core=debug,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    info!("Starting Sauti speech server");

    let config = ServerConfig {
        port: args.port,
        secure: args.secure,
        cert_path: args.cert_path.clone(),
        key_path: args.key_path.clone(),
        max_payload_bytes: args.max_payload_bytes,
        dedicated_worker: !args.in_process,
        ..ServerConfig::default()
    };
    if config.compression {
        // The WebSocket layer does not negotiate permessage-deflate;
        // frames go out uncompressed either way.
        info!("per-message compression is not supported and will not be negotiated");
    }

    let packages_dir = args
        .packages_dir
        .unwrap_or_else(PackageResolver::default_dir);
    info!("Packages directory: {:?}", packages_dir);

    let backend = BasicBackend::new(
        PackageResolver::new(packages_dir),
        FfmpegTranscoder::new(args.ffmpeg_path),
    );
    let kind = if config.dedicated_worker {
        ExecutorKind::Dedicated
    } else {
        ExecutorKind::InProcess
    };
    let (engine, events) = Executor::spawn(Arc::new(backend), kind);
    info!(?kind, "execution engine started");

    let state = AppState::new(engine, config.clone());
    tokio::spawn(routing::route_events(events, state.connections.clone()));

    let app = build_router(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));

    if config.secure {
        let cert_path = config
            .cert_path
            .as_ref()
            .context("--secure requires --cert-path")?;
        let key_path = config
            .key_path
            .as_ref()
            .context("--secure requires --key-path")?;
        // Both files must exist before binding; a missing one is fatal.
        for path in [cert_path, key_path] {
            if !path.is_file() {
                anyhow::bail!("TLS file not found: {}", path.display());
            }
        }

        let tls = axum_server::tls_rustls::RustlsConfig::from_pem_file(cert_path, key_path)
            .await
            .context("failed to load TLS certificate or key")?;

        // Same Ctrl+C/SIGTERM handling as the plaintext listener.
        let handle = axum_server::Handle::new();
        let shutdown_handle = handle.clone();
        tokio::spawn(async move {
            shutdown_signal().await;
            shutdown_handle.graceful_shutdown(Some(std::time::Duration::from_secs(5)));
        });

        info!("Server listening on wss://{}", addr);
        axum_server::bind_rustls(addr, tls)
            .handle(handle)
            .serve(app.into_make_service())
            .await?;
    } else {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        info!("Server listening on ws://{}", addr);
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
    }

    Ok(())
}

/// Wait for Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down...");
        },
        _ = terminate => {
            info!("Received SIGTERM, shutting down...");
        },
    }
    warn!("Shutting down; queued jobs will not be answered");
}
