use crate::document::{LogDocument, MalformedLine, MirrorRecord};
use crate::index::{IndexBackend, IndexNames, DEFAULT_ORDINARY_PREFIX, DEFAULT_TRACE_PREFIX};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep, Duration, MissedTickBehavior};

const MAX_RETRY_BACKOFF: Duration = Duration::from_secs(5);

/// Mirror queue, batching and retry settings.
///
/// **Fields**
/// - `channel_buffer`: records queued before new ones are dropped.
/// - `batch_size`: records taken off the queue before persisting.
/// - `flush_interval`: longest time a partial batch waits.
/// - `max_retries`: extra attempts for a failed save before the document is
///   dropped and counted as failed.
/// - `retry_backoff`: first retry delay, doubled per attempt.
/// - `ordinary_prefix` / `trace_prefix`: index prefixes before host scoping.
/// - `document_type`: passed through to the backend.
#[derive(Clone, Debug)]
pub struct MirrorConfig {
    pub channel_buffer: usize,
    pub batch_size: usize,
    pub flush_interval: Duration,
    pub max_retries: u32,
    pub retry_backoff: Duration,
    pub ordinary_prefix: String,
    pub trace_prefix: String,
    pub document_type: String,
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            channel_buffer: 1024,
            batch_size: 128,
            flush_interval: Duration::from_secs(1),
            max_retries: 2,
            retry_backoff: Duration::from_millis(100),
            ordinary_prefix: DEFAULT_ORDINARY_PREFIX.to_string(),
            trace_prefix: DEFAULT_TRACE_PREFIX.to_string(),
            document_type: "log".to_string(),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum MirrorError {
    #[error(transparent)]
    MalformedLine(#[from] MalformedLine),

    #[error("mirror queue is full, record dropped")]
    QueueFull,

    #[error("mirror worker has stopped")]
    Closed,
}

#[derive(Debug, Default)]
struct Counters {
    submitted: AtomicU64,
    dropped: AtomicU64,
    malformed: AtomicU64,
    persisted: AtomicU64,
    failed: AtomicU64,
}

/// Point-in-time view of the mirror counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MirrorStats {
    /// Accepted onto the queue.
    pub submitted: u64,
    /// Rejected because the queue was full or the worker had stopped.
    pub dropped: u64,
    /// Lines that did not carry the mirror columns.
    pub malformed: u64,
    pub persisted: u64,
    /// Given up on after all retries.
    pub failed: u64,
}

enum Control {
    Flush(oneshot::Sender<()>),
    Shutdown(oneshot::Sender<()>),
}

/// Secondary path that copies written entries into host-scoped indices.
///
/// Submission is a non-blocking `try_send` onto a bounded queue; a
/// background task batches records, turns them into [`LogDocument`]s,
/// routes them through [`IndexNames`] and saves them via the
/// [`IndexBackend`]. Nothing that happens on that task is reported back to
/// the submitter; the counters in [`MirrorStats`] are the only signal.
pub struct ErrorMirror {
    sender: mpsc::Sender<MirrorRecord>,
    control: mpsc::Sender<Control>,
    counters: Arc<Counters>,
    names: IndexNames,
}

impl ErrorMirror {
    /// Create the mirror and spawn its worker on the current Tokio runtime.
    ///
    /// Minimal thresholds are enforced for `channel_buffer`, `batch_size`
    /// and `flush_interval` to avoid degenerate configurations.
    pub fn spawn(
        backend: Arc<dyn IndexBackend>,
        names: IndexNames,
        config: MirrorConfig,
    ) -> (Arc<Self>, JoinHandle<()>) {
        let buffer = config.channel_buffer.max(16);
        let batch_size = config.batch_size.max(1);
        let flush_interval = config.flush_interval.max(Duration::from_millis(10));

        let (tx, rx) = mpsc::channel::<MirrorRecord>(buffer);
        let (control_tx, control_rx) = mpsc::channel::<Control>(8);
        let counters = Arc::new(Counters::default());

        let worker = MirrorWorker {
            backend,
            names: names.clone(),
            document_type: config.document_type,
            max_retries: config.max_retries,
            retry_backoff: config.retry_backoff,
            counters: Arc::clone(&counters),
        };
        let handle = tokio::spawn(worker.run(rx, control_rx, batch_size, flush_interval));

        let mirror = ErrorMirror { sender: tx, control: control_tx, counters, names };
        (Arc::new(mirror), handle)
    }

    /// Queue a record without waiting.
    pub fn submit(&self, record: MirrorRecord) -> Result<(), MirrorError> {
        match self.sender.try_send(record) {
            Ok(()) => {
                self.counters.submitted.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                Err(MirrorError::QueueFull)
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                Err(MirrorError::Closed)
            }
        }
    }

    /// Parse a line rendered in the tab layout and queue it.
    pub fn submit_line(&self, line: &str) -> Result<(), MirrorError> {
        match MirrorRecord::parse_line(line) {
            Ok(record) => self.submit(record),
            Err(e) => {
                self.counters.malformed.fetch_add(1, Ordering::Relaxed);
                Err(e.into())
            }
        }
    }

    pub fn index_names(&self) -> &IndexNames {
        &self.names
    }

    pub fn stats(&self) -> MirrorStats {
        MirrorStats {
            submitted: self.counters.submitted.load(Ordering::Relaxed),
            dropped: self.counters.dropped.load(Ordering::Relaxed),
            malformed: self.counters.malformed.load(Ordering::Relaxed),
            persisted: self.counters.persisted.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
        }
    }

    /// Wait until every record queued before this call has been persisted
    /// or given up on.
    pub async fn flush(&self) -> Result<(), MirrorError> {
        let (done, wait) = oneshot::channel();
        self.control.send(Control::Flush(done)).await.map_err(|_| MirrorError::Closed)?;
        wait.await.map_err(|_| MirrorError::Closed)
    }

    /// Drain the queue and stop the worker. Later submissions are dropped.
    pub async fn shutdown(&self) -> Result<(), MirrorError> {
        let (done, wait) = oneshot::channel();
        self.control.send(Control::Shutdown(done)).await.map_err(|_| MirrorError::Closed)?;
        wait.await.map_err(|_| MirrorError::Closed)
    }
}

struct MirrorWorker {
    backend: Arc<dyn IndexBackend>,
    names: IndexNames,
    document_type: String,
    max_retries: u32,
    retry_backoff: Duration,
    counters: Arc<Counters>,
}

impl MirrorWorker {
    async fn run(
        self,
        mut rx: mpsc::Receiver<MirrorRecord>,
        mut control: mpsc::Receiver<Control>,
        batch_size: usize,
        flush_interval: Duration,
    ) {
        let mut batch = Vec::with_capacity(batch_size);
        let mut ticker = interval(flush_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                received = rx.recv() => match received {
                    Some(record) => {
                        batch.push(record);
                        if batch.len() >= batch_size {
                            self.persist(&mut batch).await;
                        }
                    }
                    None => {
                        self.persist(&mut batch).await;
                        return;
                    }
                },
                Some(request) = control.recv() => match request {
                    Control::Flush(done) => {
                        while let Ok(record) = rx.try_recv() {
                            batch.push(record);
                        }
                        self.persist(&mut batch).await;
                        let _ = done.send(());
                    }
                    Control::Shutdown(done) => {
                        // Close before persisting so nothing is accepted
                        // after the final drain.
                        rx.close();
                        while let Some(record) = rx.recv().await {
                            batch.push(record);
                        }
                        self.persist(&mut batch).await;
                        let _ = done.send(());
                        return;
                    }
                },
                _ = ticker.tick() => {
                    if !batch.is_empty() {
                        self.persist(&mut batch).await;
                    }
                }
            }
        }
    }

    async fn persist(&self, batch: &mut Vec<MirrorRecord>) {
        for record in batch.drain(..) {
            let document = LogDocument::from_record(record);
            let index = self.names.route(&document);
            if self.save_with_retry(&document, index).await {
                self.counters.persisted.fetch_add(1, Ordering::Relaxed);
            } else {
                self.counters.failed.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    async fn save_with_retry(&self, document: &LogDocument, index: &str) -> bool {
        let mut backoff = self.retry_backoff;
        let mut attempt = 0;
        loop {
            match self.backend.save(document, index, &self.document_type, document.time).await {
                Ok(()) => return true,
                Err(e) if attempt < self.max_retries => {
                    attempt += 1;
                    tracing::debug!(index, attempt, error = %e, "mirror save failed, retrying in {:?}", backoff);
                    sleep(backoff).await;
                    backoff = (backoff * 2).min(MAX_RETRY_BACKOFF);
                }
                Err(e) => {
                    tracing::warn!(index, error = %e, "dropping mirrored log document");
                    return false;
                }
            }
        }
    }
}
