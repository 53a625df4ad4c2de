//! Unbounded FIFO handoff between notification intake and download workers.

use crate::error::{Error, Result};
use crate::types::{DownloadJob, JobOutcome, QueueStats};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use tokio::sync::{Mutex, mpsc, watch};

#[derive(Debug, Default)]
struct Counters {
    pending: AtomicUsize,
    in_flight: AtomicUsize,
    processed: AtomicU64,
    downloaded: AtomicU64,
    skipped: AtomicU64,
    no_canonical_link: AtomicU64,
    failed: AtomicU64,
}

/// Job queue shared by the intake (producer) and any number of workers
///
/// `push` never blocks. `pop` suspends the calling worker until a job is
/// available. Every popped job must be reported back with
/// [`JobQueue::task_done`], whatever its outcome.
#[derive(Clone, Debug)]
pub struct JobQueue {
    tx: mpsc::UnboundedSender<DownloadJob>,
    rx: Arc<Mutex<mpsc::UnboundedReceiver<DownloadJob>>>,
    counters: Arc<Counters>,
    /// Jobs pushed but not yet marked done
    unfinished: Arc<watch::Sender<usize>>,
}

impl Default for JobQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl JobQueue {
    /// Create an empty queue
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let (unfinished, _) = watch::channel(0);
        Self {
            tx,
            rx: Arc::new(Mutex::new(rx)),
            counters: Arc::new(Counters::default()),
            unfinished: Arc::new(unfinished),
        }
    }

    /// Append a job
    pub fn push(&self, job: DownloadJob) -> Result<()> {
        self.unfinished.send_modify(|n| *n += 1);
        self.counters.pending.fetch_add(1, Ordering::SeqCst);

        if self.tx.send(job).is_err() {
            // Receiver lives as long as the queue, so this only happens mid-teardown
            self.counters.pending.fetch_sub(1, Ordering::SeqCst);
            self.unfinished.send_modify(|n| *n = n.saturating_sub(1));
            return Err(Error::ShuttingDown);
        }
        Ok(())
    }

    /// Wait for the next job
    ///
    /// Returns `None` only if the channel has been closed.
    pub async fn pop(&self) -> Option<DownloadJob> {
        let job = self.rx.lock().await.recv().await?;
        self.counters.pending.fetch_sub(1, Ordering::SeqCst);
        self.counters.in_flight.fetch_add(1, Ordering::SeqCst);
        Some(job)
    }

    /// Record that a popped job has finished processing
    pub fn task_done(&self, outcome: &JobOutcome) {
        let counter = match outcome {
            JobOutcome::Downloaded { .. } => &self.counters.downloaded,
            JobOutcome::AlreadyPresent { .. } => &self.counters.skipped,
            JobOutcome::NoCanonicalLink => &self.counters.no_canonical_link,
            JobOutcome::Failed { .. } => &self.counters.failed,
        };
        counter.fetch_add(1, Ordering::SeqCst);
        self.counters.processed.fetch_add(1, Ordering::SeqCst);
        self.counters.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.unfinished.send_modify(|n| *n = n.saturating_sub(1));
    }

    /// Jobs waiting for a worker
    pub fn pending(&self) -> usize {
        self.counters.pending.load(Ordering::SeqCst)
    }

    /// Jobs popped but not yet done
    pub fn in_flight(&self) -> usize {
        self.counters.in_flight.load(Ordering::SeqCst)
    }

    /// Wait until every pushed job has been marked done
    pub async fn join(&self) {
        let mut rx = self.unfinished.subscribe();
        // Sender is owned by self, so wait_for cannot observe a closed channel
        let _ = rx.wait_for(|n| *n == 0).await;
    }

    /// Snapshot of queue counters
    pub fn stats(&self) -> QueueStats {
        QueueStats {
            pending: self.pending(),
            in_flight: self.in_flight(),
            processed: self.counters.processed.load(Ordering::SeqCst),
            downloaded: self.counters.downloaded.load(Ordering::SeqCst),
            skipped: self.counters.skipped.load(Ordering::SeqCst),
            no_canonical_link: self.counters.no_canonical_link.load(Ordering::SeqCst),
            failed: self.counters.failed.load(Ordering::SeqCst),
        }
    }
}
