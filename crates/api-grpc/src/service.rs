// Re-export the proto module from the shared `api-shared` crate so callers
// can reference `api_grpc::pb`.
pub use api_shared::pb;

use api_shared::pb::storage_node_server::StorageNode;
use api_shared::pb::{
    DeleteResponse, FileChunk, FileRequest, StatusRequest, StatusResponse, UploadResponse,
};
use futures::{Stream, StreamExt};
use std::pin::Pin;
use storage_node_core::{StorageEngine, StorageError, UploadChunk};
use tonic::{Request, Response, Status, Streaming};

pub type DownloadFileStream = Pin<Box<dyn Stream<Item = Result<FileChunk, Status>> + Send>>;

/// Maps a core error onto the gRPC status returned to the caller.
pub fn status_from_error(err: &StorageError) -> Status {
    match err {
        StorageError::NotFound(_) => Status::not_found(err.to_string()),
        StorageError::InvalidIdentifier(_) => Status::invalid_argument(err.to_string()),
        StorageError::Transport(_) => Status::aborted(err.to_string()),
        _ => Status::internal(err.to_string()),
    }
}

/// gRPC front of one storage node.
#[derive(Clone)]
pub struct StorageNodeService {
    engine: StorageEngine,
}

impl StorageNodeService {
    pub fn new(engine: StorageEngine) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &StorageEngine {
        &self.engine
    }

    /// Drives one upload from a stream of protobuf chunks.
    ///
    /// Split out of [`StorageNode::upload_file`] because `tonic::Streaming` can only be built
    /// by the transport.
    #[allow(clippy::result_large_err)]
    pub async fn receive_upload<S>(&self, chunks: S) -> Result<UploadResponse, Status>
    where
        S: Stream<Item = Result<FileChunk, Status>> + Unpin,
    {
        let chunks = chunks.map(|item| {
            item.map(|chunk| UploadChunk {
                id: Some(chunk.file_id).filter(|id| !id.is_empty()),
                content: chunk.content,
            })
        });

        let receipt = self.engine.upload(chunks).await.map_err(|e| {
            tracing::warn!("upload failed: {}", e);
            status_from_error(&e)
        })?;

        Ok(UploadResponse {
            success: true,
            file_id: receipt.id,
            message: receipt.message,
        })
    }
}

#[tonic::async_trait]
impl StorageNode for StorageNodeService {
    async fn upload_file(
        &self,
        req: Request<Streaming<FileChunk>>,
    ) -> Result<Response<UploadResponse>, Status> {
        let res = self.receive_upload(req.into_inner()).await?;
        Ok(Response::new(res))
    }

    type DownloadFileStream = DownloadFileStream;

    async fn download_file(
        &self,
        req: Request<FileRequest>,
    ) -> Result<Response<Self::DownloadFileStream>, Status> {
        let file_id = req.into_inner().file_id;
        let chunks = self
            .engine
            .download(&file_id)
            .await
            .map_err(|e| status_from_error(&e))?;

        let stream = chunks.map(|item| {
            item.map(|chunk| FileChunk {
                file_id: chunk.id,
                content: chunk.content,
                chunk_number: chunk.chunk_number,
            })
            .map_err(|e| {
                tracing::error!("download aborted: {}", e);
                status_from_error(&e)
            })
        });

        Ok(Response::new(Box::pin(stream)))
    }

    async fn delete_file(
        &self,
        req: Request<FileRequest>,
    ) -> Result<Response<DeleteResponse>, Status> {
        let outcome = self.engine.delete(&req.into_inner().file_id).await;
        Ok(Response::new(DeleteResponse {
            success: outcome.success,
            message: outcome.message,
        }))
    }

    async fn get_node_status(
        &self,
        _req: Request<StatusRequest>,
    ) -> Result<Response<StatusResponse>, Status> {
        let status = self
            .engine
            .status()
            .await
            .map_err(|e| status_from_error(&e))?;

        Ok(Response::new(StatusResponse {
            node_id: status.node_id,
            files_stored: i32::try_from(status.files_stored).unwrap_or(i32::MAX),
            disk_space_available: status.disk_space_available as f64,
            healthy: status.healthy,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;
    use std::path::Path;
    use std::sync::Arc;
    use storage_node_core::{CoreConfig, FreeSpace};
    use tempfile::TempDir;
    use tonic::Code;

    struct FixedFreeSpace(u64);

    impl FreeSpace for FixedFreeSpace {
        fn available_bytes(&self, _path: &Path) -> std::io::Result<u64> {
            Ok(self.0)
        }
    }

    fn service(temp: &TempDir) -> StorageNodeService {
        let cfg = CoreConfig::new("node-grpc", temp.path().join("storage")).unwrap();
        let engine = StorageEngine::open(cfg)
            .unwrap()
            .with_free_space(Arc::new(FixedFreeSpace(10 * 1024 * 1024)));
        StorageNodeService::new(engine)
    }

    fn chunk(file_id: &str, content: &[u8]) -> Result<FileChunk, Status> {
        Ok(FileChunk {
            file_id: file_id.to_string(),
            content: content.to_vec(),
            chunk_number: 0,
        })
    }

    fn file_request(file_id: &str) -> Request<FileRequest> {
        Request::new(FileRequest {
            file_id: file_id.to_string(),
        })
    }

    #[tokio::test]
    async fn test_upload_then_download_over_service() {
        let temp = TempDir::new().unwrap();
        let svc = service(&temp);

        let res = svc
            .receive_upload(stream::iter(vec![
                chunk("photo", b"abc"),
                chunk("", b"def"),
            ]))
            .await
            .unwrap();
        assert!(res.success);
        assert_eq!(res.file_id, "photo");
        assert_eq!(res.message, "File uploaded successfully");

        let stream = svc
            .download_file(file_request("photo"))
            .await
            .unwrap()
            .into_inner();
        let chunks: Vec<FileChunk> = stream.map(|c| c.unwrap()).collect().await;

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].chunk_number, 1);
        assert_eq!(chunks[0].file_id, "photo");
        assert_eq!(chunks[0].content, b"abcdef");
    }

    #[tokio::test]
    async fn test_upload_without_id_gets_generated_hex_id() {
        let temp = TempDir::new().unwrap();
        let svc = service(&temp);

        let res = svc
            .receive_upload(stream::iter(vec![chunk("", b"anonymous")]))
            .await
            .unwrap();

        assert_eq!(res.file_id.len(), 64);
    }

    #[tokio::test]
    async fn test_upload_stream_error_is_aborted_status() {
        let temp = TempDir::new().unwrap();
        let svc = service(&temp);

        let result = svc
            .receive_upload(stream::iter(vec![
                chunk("cut", b"abc"),
                Err(Status::cancelled("client went away")),
            ]))
            .await;

        assert_eq!(result.unwrap_err().code(), Code::Aborted);
        assert_eq!(svc.engine().index().count(), 0);
    }

    #[tokio::test]
    async fn test_upload_invalid_id_is_invalid_argument() {
        let temp = TempDir::new().unwrap();
        let svc = service(&temp);

        let result = svc
            .receive_upload(stream::iter(vec![chunk("a/b", b"abc")]))
            .await;

        assert_eq!(result.unwrap_err().code(), Code::InvalidArgument);
    }

    #[tokio::test]
    async fn test_download_unknown_id_is_not_found() {
        let temp = TempDir::new().unwrap();
        let svc = service(&temp);

        let result = svc.download_file(file_request("missing")).await;

        let status = result.err().expect("download should fail");
        assert_eq!(status.code(), Code::NotFound);
        assert!(status.message().contains("missing"));
    }

    #[tokio::test]
    async fn test_delete_unknown_id_is_structured_failure() {
        let temp = TempDir::new().unwrap();
        let svc = service(&temp);

        let res = svc
            .delete_file(file_request("missing"))
            .await
            .unwrap()
            .into_inner();

        assert!(!res.success);
        assert_eq!(res.message, "File not found: missing");
    }

    #[tokio::test]
    async fn test_status_reports_node_fields() {
        let temp = TempDir::new().unwrap();
        let svc = service(&temp);
        svc.receive_upload(stream::iter(vec![chunk("one", b"1")]))
            .await
            .unwrap();
        svc.receive_upload(stream::iter(vec![chunk("two", b"2")]))
            .await
            .unwrap();
        svc.delete_file(file_request("one")).await.unwrap();

        let res = svc
            .get_node_status(Request::new(StatusRequest {}))
            .await
            .unwrap()
            .into_inner();

        assert_eq!(res.node_id, "node-grpc");
        assert_eq!(res.files_stored, 1);
        assert_eq!(res.disk_space_available, 10.0 * 1024.0 * 1024.0);
        assert!(res.healthy);
    }

    #[test]
    fn test_status_from_error_codes() {
        let io = || std::io::Error::other("disk on fire");
        assert_eq!(
            status_from_error(&StorageError::NotFound("x".into())).code(),
            Code::NotFound
        );
        assert_eq!(
            status_from_error(&StorageError::FileWrite(io())).code(),
            Code::Internal
        );
        let status = status_from_error(&StorageError::FreeSpace(io()));
        assert_eq!(status.code(), Code::Internal);
        assert!(status.message().contains("disk on fire"));
    }
}
