use std::future::Future;
use std::net::SocketAddr;
use tonic::transport::Server;
use tonic_reflection::server::Builder;

use crate::StorageNodeService;
use api_shared::pb::storage_node_server::StorageNodeServer;
use api_shared::FILE_DESCRIPTOR_SET;

/// Transport settings for [`serve`].
#[derive(Clone, Debug)]
pub struct ServerOptions {
    /// Applied to both decoded requests and encoded responses.
    pub max_message_bytes: usize,
    pub enable_reflection: bool,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            max_message_bytes: 100 * 1024 * 1024,
            enable_reflection: false,
        }
    }
}

/// Serves `service` on `addr` until `shutdown` resolves.
pub async fn serve<F>(
    service: StorageNodeService,
    addr: SocketAddr,
    options: ServerOptions,
    shutdown: F,
) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send,
{
    let node = StorageNodeServer::new(service)
        .max_decoding_message_size(options.max_message_bytes)
        .max_encoding_message_size(options.max_message_bytes);

    let reflection = if options.enable_reflection {
        tracing::info!("gRPC server reflection enabled");
        Some(
            Builder::configure()
                .register_encoded_file_descriptor_set(FILE_DESCRIPTOR_SET)
                .build_v1()?,
        )
    } else {
        tracing::info!("gRPC server reflection disabled");
        None
    };

    tracing::info!(
        "maximum message size: {} MB",
        options.max_message_bytes / (1024 * 1024)
    );

    Server::builder()
        .add_service(node)
        .add_optional_service(reflection)
        .serve_with_shutdown(addr, shutdown)
        .await?;

    Ok(())
}
