use clap::{Parser, Subcommand};
use futures::channel::mpsc;
use futures::SinkExt;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tonic::transport::Channel;

use api_shared::pb::storage_node_client::StorageNodeClient;
use api_shared::pb::{FileChunk, FileRequest, StatusRequest};

mod codec;

use codec::Encoding;

/// Size of each block read from the source file. A multiple of 3, so base64 blocks
/// concatenate without inner padding.
const CHUNK_SIZE: usize = 768 * 1024;

const MAX_MESSAGE_BYTES: usize = 100 * 1024 * 1024;

#[derive(Parser)]
#[command(name = "storage-node")]
#[command(about = "Storage node client CLI")]
struct Cli {
    /// Storage node address
    #[arg(long, env = "STORAGE_NODE_ADDR", default_value = "http://localhost:50051")]
    addr: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload a file
    Upload {
        /// File to upload
        path: PathBuf,
        /// Identifier to store the file under (assigned by the node if omitted)
        #[arg(long)]
        id: Option<String>,
        /// Wire representation of the file bytes
        #[arg(long, value_enum, default_value_t = Encoding::Raw)]
        encoding: Encoding,
    },
    /// Download a file
    Download {
        /// File identifier
        id: String,
        /// Output path (default: downloaded_<id>_<unix seconds>)
        #[arg(long, short)]
        output: Option<PathBuf>,
        /// Wire representation the file was uploaded with
        #[arg(long, value_enum, default_value_t = Encoding::Raw)]
        encoding: Encoding,
    },
    /// Delete a file
    Delete {
        /// File identifier
        id: String,
    },
    /// Show node status
    Status {
        /// Print the raw response as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let Some(command) = cli.command else {
        println!("Use 'storage-node --help' for commands");
        return Ok(());
    };

    let mut client = StorageNodeClient::connect(cli.addr)
        .await?
        .max_decoding_message_size(MAX_MESSAGE_BYTES)
        .max_encoding_message_size(MAX_MESSAGE_BYTES);

    match command {
        Commands::Upload { path, id, encoding } => {
            let file_id = upload(&mut client, &path, id, encoding).await?;
            println!("Upload successful. File ID: {}", file_id);
        }
        Commands::Download {
            id,
            output,
            encoding,
        } => {
            let output = output.unwrap_or_else(|| default_output_path(&id));
            download(&mut client, &id, &output, encoding).await?;
            println!("File saved as: {}", output.display());
        }
        Commands::Delete { id } => {
            let res = client
                .delete_file(FileRequest { file_id: id })
                .await?
                .into_inner();
            if res.success {
                println!("File deleted successfully");
            } else {
                eprintln!("Delete failed: {}", res.message);
            }
        }
        Commands::Status { json } => {
            let res = client
                .get_node_status(StatusRequest {})
                .await?
                .into_inner();
            if json {
                println!("{}", serde_json::to_string_pretty(&res)?);
            } else {
                println!("Node Status:");
                println!("ID: {}", res.node_id);
                println!("Files Stored: {}", res.files_stored);
                println!(
                    "Available Space: {:.2} MB",
                    res.disk_space_available / (1024.0 * 1024.0)
                );
                println!("Healthy: {}", res.healthy);
            }
        }
    }

    Ok(())
}

/// Streams `path` to the node and returns the identifier it was stored under.
///
/// A local read error cancels the call, so the node never stores a truncated file.
async fn upload(
    client: &mut StorageNodeClient<Channel>,
    path: &Path,
    id: Option<String>,
    encoding: Encoding,
) -> Result<String, Box<dyn std::error::Error>> {
    let mut file = tokio::fs::File::open(path).await?;

    let (mut tx, rx) = mpsc::channel::<FileChunk>(4);
    let call = client.upload_file(rx);
    tokio::pin!(call);

    let feed = async {
        let mut buffer = vec![0u8; CHUNK_SIZE];
        let mut file_id = id.unwrap_or_default();
        loop {
            let n = read_block(&mut file, &mut buffer).await?;
            if n == 0 {
                break;
            }
            let chunk = FileChunk {
                file_id: std::mem::take(&mut file_id),
                content: encoding.encode(&buffer[..n]),
                chunk_number: 0,
            };
            // A closed channel means the node already answered; the call result says why.
            if tx.send(chunk).await.is_err() {
                break;
            }
        }
        Ok::<(), std::io::Error>(())
    };

    tokio::select! {
        res = &mut call => {
            let res = res?.into_inner();
            return Ok(res.file_id);
        }
        fed = feed => fed?,
    }

    // Everything is sent; closing the channel ends the stream.
    tx.close_channel();
    let res = call.await?.into_inner();
    Ok(res.file_id)
}

/// Receives `id` into `output`, removing the partial output if the transfer fails.
async fn download(
    client: &mut StorageNodeClient<Channel>,
    id: &str,
    output: &Path,
    encoding: Encoding,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut stream = client
        .download_file(FileRequest {
            file_id: id.to_string(),
        })
        .await?
        .into_inner();

    let mut file = tokio::fs::File::create(output).await?;
    let received = async {
        let mut decoder = encoding.decoder();
        while let Some(chunk) = stream.message().await? {
            file.write_all(&decoder.push(&chunk.content)?).await?;
        }
        decoder.finish()?;
        file.flush().await?;
        Ok::<(), Box<dyn std::error::Error>>(())
    }
    .await;

    if let Err(e) = received {
        drop(file);
        remove_partial_output(output).await;
        return Err(e);
    }
    Ok(())
}

/// Best-effort removal of a failed download; returns whether the file is gone.
async fn remove_partial_output(output: &Path) -> bool {
    match tokio::fs::remove_file(output).await {
        Ok(()) => true,
        Err(e) => {
            eprintln!(
                "Warning: could not remove partial download {}: {}",
                output.display(),
                e
            );
            false
        }
    }
}

/// Fills `buffer` unless end of file comes first; returns the byte count.
async fn read_block(file: &mut tokio::fs::File, buffer: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buffer.len() {
        let n = file.read(&mut buffer[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

fn default_output_path(id: &str) -> PathBuf {
    PathBuf::from(format!(
        "downloaded_{}_{}",
        id,
        chrono::Utc::now().timestamp()
    ))
}
