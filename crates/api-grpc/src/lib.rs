//! # API gRPC
//!
//! gRPC server implementation for the storage node.
//!
//! Handles:
//! - The `StorageNode` service, backed by `storage-node-core`
//! - Mapping core errors onto `tonic::Status`
//! - Server assembly (message limits, optional reflection, graceful shutdown)
//!
//! Uses `api-shared` for the generated protobuf types.

#![warn(rust_2018_idioms)]

pub use server::{serve, ServerOptions};
pub use service::{pb, status_from_error, StorageNodeService};

pub mod server;
pub mod service;
