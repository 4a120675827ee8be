//! Upload orchestrator.
//!
//! Drives one file through the session state machine: plan the parts,
//! open a session, presign and PUT each part, then finalize with the parts
//! sorted by number. Any error aborts the whole upload.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use clipvault_protocol::{CompletedPart, UploadProgress, UploadStatus};
use clipvault_transfer::{
    PartPlan, ProgressAggregator, SourceFile, SpeedCalculator, detect_content_type, plan_parts,
    validate_upload_filename,
};
use clipvault_upload_api::{PartStorage, PartUploader, UploadBackend, UploadSession};
use futures_util::{StreamExt, TryStreamExt, stream};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::error::UploadError;
use crate::types::{FALLBACK_CONTENT_TYPE, ProgressFn, UploadEvent, UploadOptions, UploadResult};

const EVENT_BUFFER: usize = 256;

/// Uploads files through a backend session and presigned part URLs.
pub struct UploadOrchestrator {
    backend: Arc<dyn UploadBackend>,
    uploader: PartUploader,
    options: UploadOptions,
    events_tx: mpsc::Sender<UploadEvent>,
    events_rx: Option<mpsc::Receiver<UploadEvent>>,
    cancel: Mutex<CancellationToken>,
}

impl UploadOrchestrator {
    pub fn new(
        backend: Arc<dyn UploadBackend>,
        storage: Arc<dyn PartStorage>,
        options: UploadOptions,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::channel(EVENT_BUFFER);
        let uploader = PartUploader::new(storage, options.retry.clone());
        Self {
            backend,
            uploader,
            options,
            events_tx,
            events_rx: Some(events_rx),
            cancel: Mutex::new(CancellationToken::new()),
        }
    }

    /// Takes the event receiver. Can only be called once.
    ///
    /// Progress and per-part events are dropped when the buffer is full.
    /// Once the receiver is taken, `Completed`, `Failed` and the final
    /// state change wait for room instead, so drain it while `upload` runs.
    pub fn take_events(&mut self) -> Option<mpsc::Receiver<UploadEvent>> {
        self.events_rx.take()
    }

    /// Returns the token that cancels the uploads currently running.
    ///
    /// A tripped token is replaced when the upload it stopped returns, so
    /// the orchestrator can upload again from `Idle`. Fetch the token again
    /// for each new upload.
    pub fn cancel_token(&self) -> CancellationToken {
        lock(&self.cancel).clone()
    }

    pub fn options(&self) -> &UploadOptions {
        &self.options
    }

    /// Opens `path` and uploads it.
    pub async fn upload_path(
        &self,
        path: &Path,
        on_progress: Option<&ProgressFn<'_>>,
    ) -> Result<UploadResult, UploadError> {
        let source = SourceFile::open(path).await?;
        self.upload(&source, on_progress).await
    }

    /// Uploads `source` and returns the storage key of the assembled object.
    ///
    /// `on_progress` receives the whole-file percentage each time it
    /// changes, and 100 once more after finalize succeeds.
    pub async fn upload(
        &self,
        source: &SourceFile,
        on_progress: Option<&ProgressFn<'_>>,
    ) -> Result<UploadResult, UploadError> {
        let cancel = self.cancel_token();
        let run = Run::new(
            &self.events_tx,
            self.events_rx.is_none(),
            source.size(),
            on_progress,
        );
        let result = self.run(source, &run, &cancel).await;
        self.rearm_cancel();

        match &result {
            Ok(done) => {
                run.settle(UploadStatus::Completed).await;
                run.deliver(UploadEvent::Completed {
                    storage_key: done.s3_key.clone(),
                })
                .await;
            }
            Err(UploadError::Cancelled) => {
                warn!(upload_id = %run.upload_id(), file = source.file_name(), "upload cancelled");
                run.settle(UploadStatus::Cancelled).await;
            }
            Err(e) => {
                error!(upload_id = %run.upload_id(), file = source.file_name(), error = %e, "upload failed");
                run.settle(UploadStatus::Failed).await;
                run.deliver(UploadEvent::Failed {
                    error: e.to_string(),
                })
                .await;
            }
        }
        result
    }

    async fn run(
        &self,
        source: &SourceFile,
        run: &Run<'_>,
        cancel: &CancellationToken,
    ) -> Result<UploadResult, UploadError> {
        check_cancelled(cancel)?;
        if source.size() == 0 {
            return Err(UploadError::EmptyFile);
        }
        validate_upload_filename(source.file_name())?;
        let parts = plan_parts(source.size(), self.options.part_size)?;
        let total_parts = parts.last().map_or(0, |p| p.part_number);
        let content_type = self.content_type_for(source.file_name());

        run.set_status(UploadStatus::Initializing);
        let session = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(UploadError::Cancelled),
            r = self.backend.initialize(source.file_name(), &content_type) => {
                r.map_err(UploadError::SessionInit)?
            }
        };
        run.set_upload_id(session.upload_id());
        info!(
            upload_id = session.upload_id(),
            s3_key = session.storage_key(),
            parts = total_parts,
            bytes = source.size(),
            content_type = %content_type,
            "upload session created"
        );

        let mut completed = if self.options.concurrency <= 1 {
            let mut done = Vec::with_capacity(parts.len());
            for part in &parts {
                done.push(
                    self.upload_part(&session, source, part, total_parts, run, cancel)
                        .await?,
                );
            }
            done
        } else {
            stream::iter(&parts)
                .map(|part| self.upload_part(&session, source, part, total_parts, run, cancel))
                .buffer_unordered(self.options.concurrency)
                .try_collect::<Vec<_>>()
                .await?
        };
        completed.sort_by_key(|p| p.part_number);

        // Finalize is not raced against cancellation: once sent, its outcome
        // must be observed.
        check_cancelled(cancel)?;
        run.set_status(UploadStatus::Finalizing);
        let upload_id = session.upload_id().to_string();
        let s3_key = self
            .backend
            .finalize(session, &completed)
            .await
            .map_err(UploadError::Completion)?;

        info!(upload_id = %upload_id, s3_key = %s3_key, speed = run.speed(), "upload finalized");
        run.finish();
        Ok(UploadResult { s3_key })
    }

    async fn upload_part(
        &self,
        session: &UploadSession,
        source: &SourceFile,
        part: &PartPlan,
        total_parts: u32,
        run: &Run<'_>,
        cancel: &CancellationToken,
    ) -> Result<CompletedPart, UploadError> {
        check_cancelled(cancel)?;
        run.set_status(UploadStatus::UploadingPart {
            part_number: part.part_number,
            total_parts,
        });
        let data = source.read_part(part).await?;

        let credential = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(UploadError::Cancelled),
            r = self.backend.request_part_credential(session, part.part_number) => {
                r.map_err(|e| UploadError::Credential {
                    part_number: part.part_number,
                    source: e,
                })?
            }
        };
        debug!(
            upload_id = session.upload_id(),
            part = part.part_number,
            bytes = part.len(),
            "part credential issued"
        );

        let on_progress = |pct: f64| run.part_progress(part, pct);
        let etag = self
            .uploader
            .put(
                part.part_number,
                &credential.upload_url,
                data,
                &on_progress,
                cancel,
            )
            .await
            .map_err(|e| UploadError::from_part(part.part_number, e))?;

        run.complete_part(part, &etag);
        Ok(CompletedPart {
            part_number: part.part_number,
            etag,
        })
    }

    fn content_type_for(&self, file_name: &str) -> String {
        self.options
            .content_type
            .as_deref()
            .filter(|t| !t.is_empty())
            .or_else(|| detect_content_type(file_name))
            .unwrap_or(FALLBACK_CONTENT_TYPE)
            .to_string()
    }

    /// Swaps a tripped token for a fresh one. Uploads still holding the old
    /// token stay cancelled.
    fn rearm_cancel(&self) {
        let mut token = lock(&self.cancel);
        if token.is_cancelled() {
            debug!("cancellation token re-armed");
            *token = CancellationToken::new();
        }
    }
}

fn check_cancelled(cancel: &CancellationToken) -> Result<(), UploadError> {
    if cancel.is_cancelled() {
        Err(UploadError::Cancelled)
    } else {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Per-invocation state
// ---------------------------------------------------------------------------

/// State owned by one `upload` call; never shared between uploads.
struct Run<'a> {
    events_tx: &'a mpsc::Sender<UploadEvent>,
    /// A receiver has been handed out, so terminal events are awaited.
    await_terminal: bool,
    on_progress: Option<&'a ProgressFn<'a>>,
    progress: Mutex<ProgressState>,
    speed: SpeedCalculator,
    state: Mutex<RunState>,
}

struct ProgressState {
    aggregator: ProgressAggregator,
    /// Transferred bytes at the last speed sample.
    sampled: u64,
}

struct RunState {
    status: UploadStatus,
    upload_id: String,
}

impl<'a> Run<'a> {
    fn new(
        events_tx: &'a mpsc::Sender<UploadEvent>,
        await_terminal: bool,
        file_size: u64,
        on_progress: Option<&'a ProgressFn<'a>>,
    ) -> Self {
        Self {
            events_tx,
            await_terminal,
            on_progress,
            progress: Mutex::new(ProgressState {
                aggregator: ProgressAggregator::new(file_size),
                sampled: 0,
            }),
            speed: SpeedCalculator::default(),
            state: Mutex::new(RunState {
                status: UploadStatus::Idle,
                upload_id: String::new(),
            }),
        }
    }

    fn set_status(&self, status: UploadStatus) {
        lock(&self.state).status = status.clone();
        trace!(?status, "upload state changed");
        self.emit(UploadEvent::StateChanged(status));
    }

    /// Enters a terminal state.
    async fn settle(&self, status: UploadStatus) {
        lock(&self.state).status = status.clone();
        debug!(?status, "upload settled");
        self.deliver(UploadEvent::StateChanged(status)).await;
    }

    fn set_upload_id(&self, upload_id: &str) {
        lock(&self.state).upload_id = upload_id.to_string();
    }

    fn upload_id(&self) -> String {
        lock(&self.state).upload_id.clone()
    }

    fn speed(&self) -> f64 {
        self.speed.bytes_per_second()
    }

    fn part_progress(&self, part: &PartPlan, part_percent: f64) {
        let mut p = lock(&self.progress);
        let before = p.aggregator.percent();
        let percent = p.aggregator.update(part, part_percent);
        self.sample_speed(&mut p);
        if percent != before {
            self.report(&p.aggregator, percent);
        }
    }

    fn complete_part(&self, part: &PartPlan, etag: &str) {
        let remaining = {
            let mut p = lock(&self.progress);
            let before = p.aggregator.percent();
            let percent = p.aggregator.complete_part(part);
            self.sample_speed(&mut p);
            if percent != before {
                self.report(&p.aggregator, percent);
            }
            p.aggregator.file_size().saturating_sub(p.aggregator.uploaded_bytes_base())
        };
        info!(
            part = part.part_number,
            bytes = part.len(),
            speed = self.speed(),
            eta = ?self.speed.eta(remaining),
            "part completed"
        );
        self.emit(UploadEvent::PartCompleted {
            part_number: part.part_number,
            etag: etag.to_string(),
            bytes: part.len(),
        });
    }

    /// Forces a final 100%.
    fn finish(&self) {
        let mut p = lock(&self.progress);
        let percent = p.aggregator.finish();
        self.report(&p.aggregator, percent);
    }

    fn sample_speed(&self, p: &mut ProgressState) {
        let transferred = p.aggregator.transferred_bytes();
        if transferred > p.sampled {
            self.speed.add_sample(transferred - p.sampled);
            p.sampled = transferred;
        }
    }

    /// Called with the progress lock held so concurrent parts cannot
    /// reorder reported percentages.
    fn report(&self, aggregator: &ProgressAggregator, percent: u8) {
        if let Some(cb) = self.on_progress {
            cb(percent);
        }
        let (status, upload_id) = {
            let s = lock(&self.state);
            (s.status.clone(), s.upload_id.clone())
        };
        let transferred_bytes = if percent == 100 {
            aggregator.file_size()
        } else {
            aggregator.transferred_bytes()
        };
        self.emit(UploadEvent::Progress(UploadProgress {
            upload_id,
            status,
            total_bytes: aggregator.file_size(),
            transferred_bytes,
            percent,
            bytes_per_second: self.speed.bytes_per_second(),
        }));
    }

    /// Never blocks: a full buffer drops the event.
    fn emit(&self, event: UploadEvent) {
        if let Err(mpsc::error::TrySendError::Full(_)) = self.events_tx.try_send(event) {
            trace!("event buffer full, dropping event");
        }
    }

    /// Terminal events wait for buffer space when someone holds the
    /// receiver; everything else goes through `emit`.
    async fn deliver(&self, event: UploadEvent) {
        if self.await_terminal && event.is_terminal() {
            if self.events_tx.send(event).await.is_err() {
                trace!("event receiver dropped");
            }
        } else {
            self.emit(event);
        }
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}
