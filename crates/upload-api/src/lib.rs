//! Temp-upload backend client and presigned-URL part uploader.
//!
//! Two trust domains live here. [`SessionClient`] talks to the platform
//! API with the caller's credentials; [`StorageClient`] PUTs raw part
//! bytes to presigned object-storage URLs and never carries them.
//! [`PartUploader`] wraps any [`PartStorage`] with bounded retries.

pub mod client;
pub mod error;
pub mod retry;
pub mod storage;
pub mod transport;
pub mod types;

#[cfg(test)]
mod test_server;

pub use client::SessionClient;
pub use error::{Error, PartUploadError, StorageError};
pub use retry::{PartUploader, RetryPolicy};
pub use storage::StorageClient;
pub use transport::{BoxFuture, PartStorage, SentCallback, UploadBackend};
pub use types::{PartCredential, UploadSession};
