//! Protocol Buffer definitions and generated code for the blog RPC service.
//!
//! Types are generated from `proto/blog.proto` by [`tonic-build`] at build
//! time, along with the encoded descriptor set served over gRPC reflection.

#![allow(clippy::all)]
tonic::include_proto!("blog");

/// Encoded `FileDescriptorSet` for `proto/blog.proto`
pub const FILE_DESCRIPTOR_SET: &[u8] = tonic::include_file_descriptor_set!("blog_descriptor");
