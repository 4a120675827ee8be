//! Seams between the upload pipeline and the network.
//!
//! [`SessionClient`](crate::SessionClient) and
//! [`StorageClient`](crate::StorageClient) implement these over HTTP;
//! tests substitute in-memory mocks.

use std::future::Future;
use std::pin::Pin;

use bytes::Bytes;
use clipvault_protocol::CompletedPart;

use crate::error::{Error, StorageError};
use crate::types::{PartCredential, UploadSession};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Receives the cumulative number of bytes sent for the current attempt.
pub type SentCallback<'a> = &'a (dyn Fn(u64) + Send + Sync);

/// Backend that allocates sessions, presigns parts and assembles objects.
pub trait UploadBackend: Send + Sync {
    /// Creates a session for `filename`.
    fn initialize<'a>(
        &'a self,
        filename: &'a str,
        content_type: &'a str,
    ) -> BoxFuture<'a, Result<UploadSession, Error>>;

    /// Requests a presigned URL for one part, just before it is sent.
    fn request_part_credential<'a>(
        &'a self,
        session: &'a UploadSession,
        part_number: u32,
    ) -> BoxFuture<'a, Result<PartCredential, Error>>;

    /// Submits the completed parts, sorted by part number, and returns the
    /// storage key of the assembled object.
    fn finalize<'a>(
        &'a self,
        session: UploadSession,
        parts: &'a [CompletedPart],
    ) -> BoxFuture<'a, Result<String, Error>>;
}

/// Object storage reachable through presigned URLs.
pub trait PartStorage: Send + Sync {
    /// Performs one PUT attempt and returns the part's ETag.
    fn put_part<'a>(
        &'a self,
        url: &'a str,
        data: Bytes,
        on_sent: SentCallback<'a>,
    ) -> BoxFuture<'a, Result<String, StorageError>>;
}
