//! Pluggable output storage.
//!
//! A single `OutputAdapter` contract with four implementations, selected at
//! startup by `STORAGE_ADAPTER`: local filesystem, Bunny Edge Storage,
//! Bunny Stream, and S3-compatible object stores.

pub mod adapter;
pub mod bunny_storage;
pub mod bunny_stream;
pub mod content_type;
pub mod error;
pub mod file;
pub mod s3;

pub use adapter::{new_adapter, OutputAdapter};
pub use bunny_storage::BunnyStorageAdapter;
pub use bunny_stream::BunnyStreamAdapter;
pub use error::{StorageError, StorageResult};
pub use file::FileAdapter;
pub use s3::S3Adapter;
