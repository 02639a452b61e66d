//! ags-s3: AWS S3 backend for agnostic-storages
//!
//! This crate provides the implementation of the StorageBackend trait
//! using the aws-sdk-s3 crate. It is the only crate that directly
//! depends on the AWS SDK.

pub mod client;
pub mod multipart;

pub use client::S3Backend;
