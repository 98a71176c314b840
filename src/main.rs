use std::net::SocketAddr;
use std::path::PathBuf;
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api_grpc::{ServerOptions, StorageNodeService};
use storage_node_core::config::node_id_from_env_value;
use storage_node_core::constants::DEFAULT_STORAGE_DIR;
use storage_node_core::{CoreConfig, StorageEngine};

/// Main entry point for the storage node.
///
/// Resolves configuration once from the environment, opens the storage engine and serves the
/// `StorageNode` gRPC service until Ctrl+C or SIGTERM.
///
/// # Environment Variables
/// - `STORAGE_NODE_ADDR`: gRPC server address (default: "0.0.0.0:50051")
/// - `STORAGE_NODE_ID`: node identifier (default: "node-<HOSTNAME>")
/// - `STORAGE_NODE_DIR`: directory holding stored files (default: "./storage")
/// - `STORAGE_NODE_ENABLE_REFLECTION`: "true" registers gRPC reflection
/// - `STORAGE_NODE_MAX_MESSAGE_BYTES`: per-message limit (default: 100 MiB)
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("storage_node=info".parse()?)
                .add_directive("api_grpc=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let addr: SocketAddr = std::env::var("STORAGE_NODE_ADDR")
        .unwrap_or_else(|_| "0.0.0.0:50051".into())
        .parse()?;
    let node_id = node_id_from_env_value(
        std::env::var("STORAGE_NODE_ID").ok(),
        std::env::var("HOSTNAME").ok(),
    );
    let storage_dir = std::env::var("STORAGE_NODE_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_STORAGE_DIR));
    let options = server_options(
        std::env::var("STORAGE_NODE_ENABLE_REFLECTION").ok(),
        std::env::var("STORAGE_NODE_MAX_MESSAGE_BYTES").ok(),
    )?;

    let cfg = CoreConfig::new(node_id, storage_dir)?;
    let engine = StorageEngine::open(cfg)?;

    tracing::info!(
        "++ Starting storage node {} on {}",
        engine.node_id(),
        addr
    );
    tracing::info!("storage path: {}", engine.storage_dir().display());

    api_grpc::serve(
        StorageNodeService::new(engine),
        addr,
        options,
        shutdown_signal(),
    )
    .await?;

    tracing::info!("storage node shutdown complete");
    Ok(())
}

/// Builds transport options from raw environment values.
fn server_options(
    reflection: Option<String>,
    max_message_bytes: Option<String>,
) -> anyhow::Result<ServerOptions> {
    let mut options = ServerOptions {
        enable_reflection: reflection.as_deref().map(str::trim) == Some("true"),
        ..ServerOptions::default()
    };

    if let Some(raw) = max_message_bytes.filter(|v| !v.trim().is_empty()) {
        options.max_message_bytes = raw.trim().parse().map_err(|e| {
            anyhow::anyhow!("STORAGE_NODE_MAX_MESSAGE_BYTES must be a byte count: {e}")
        })?;
    }

    Ok(options)
}

/// Resolves on Ctrl+C, or SIGTERM on Unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("received Ctrl+C, starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        },
    }
}
