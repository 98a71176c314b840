//! # API Shared
//!
//! Shared protobuf definitions for the storage node.
//!
//! Contains:
//! - Protobuf-generated types (`pb` module), with both the server trait and the client stub
//! - The encoded file-descriptor set used for gRPC reflection
//!
//! Used by `api-grpc` (server side) and `storage-node-cli` (client side).

// The generated code is placed into OUT_DIR at build time by the build script.
pub mod pb {
    tonic::include_proto!("storagenode");
}

pub const FILE_DESCRIPTOR_SET: &[u8] = tonic::include_file_descriptor_set!("proto_descriptor");

pub use pb::*;
