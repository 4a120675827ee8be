//! Object-storage PUT client for presigned part URLs.
//!
//! The storage endpoint is a different trust domain from the backend API:
//! this client is built without default headers or a cookie store, so no
//! session credentials ever reach it.

use std::time::Duration;

use bytes::Bytes;
use clipvault_protocol::constants::{ETAG_HEADER, MIN_STORAGE_TIMEOUT};
use futures_util::StreamExt;
use futures_util::stream::{self, Stream};
use reqwest::header::CONTENT_LENGTH;
use tokio::sync::mpsc;
use tracing::trace;

use crate::error::{Error, StorageError, truncate_body};
use crate::transport::{BoxFuture, PartStorage, SentCallback};

/// Size of the frames a part body is streamed in; progress is reported
/// once per frame.
const FRAME_SIZE: usize = 256 * 1024;

/// Storage client for presigned PUTs.
pub struct StorageClient {
    http: reqwest::Client,
}

impl StorageClient {
    /// Creates a client with `timeout`, raised to at least ten minutes.
    pub fn new(timeout: Duration) -> Result<Self, Error> {
        let http = reqwest::Client::builder()
            .timeout(timeout.max(MIN_STORAGE_TIMEOUT))
            .build()?;
        Ok(Self { http })
    }

    async fn put(&self, url: &str, data: Bytes, on_sent: SentCallback<'_>) -> Result<String, StorageError> {
        let total = data.len();
        let (sent_tx, mut sent_rx) = mpsc::unbounded_channel();
        let body = reqwest::Body::wrap_stream(counted_frames(data, sent_tx));

        let request = self
            .http
            .put(url)
            .header(CONTENT_LENGTH, total)
            .body(body)
            .send();
        tokio::pin!(request);

        let result = loop {
            tokio::select! {
                r = &mut request => break r,
                Some(sent) = sent_rx.recv() => on_sent(sent),
            }
        };
        while let Ok(sent) = sent_rx.try_recv() {
            on_sent(sent);
        }

        let resp = result.map_err(|e| StorageError::Transport(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(StorageError::Status {
                status: status.as_u16(),
                body: truncate_body(&body),
            });
        }

        let etag = resp
            .headers()
            .get(ETAG_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or(StorageError::MissingEtag)?;
        trace!(bytes = total, etag, "part stored");
        Ok(etag.to_string())
    }
}

impl PartStorage for StorageClient {
    fn put_part<'a>(
        &'a self,
        url: &'a str,
        data: Bytes,
        on_sent: SentCallback<'a>,
    ) -> BoxFuture<'a, Result<String, StorageError>> {
        Box::pin(self.put(url, data, on_sent))
    }
}

/// Splits `data` into frames, reporting the cumulative bytes handed to the
/// transport after each one.
fn counted_frames(
    data: Bytes,
    sent_tx: mpsc::UnboundedSender<u64>,
) -> impl Stream<Item = Result<Bytes, std::io::Error>> + Send + 'static {
    let total = data.len();
    let frames = (0..total)
        .step_by(FRAME_SIZE)
        .map(move |start| data.slice(start..(start + FRAME_SIZE).min(total)));

    let mut sent = 0u64;
    stream::iter(frames).map(move |frame| {
        sent += frame.len() as u64;
        let _ = sent_tx.send(sent);
        Ok(frame)
    })
}
