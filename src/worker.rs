//! Download worker: turns one queued job into one stored file
//!
//! Each job is handled in isolation. Retrieval and write failures end the
//! job, are logged and reported as [`JobOutcome::Failed`], and never reach
//! the worker loop, so one bad notification cannot stop the pipeline.

use crate::error::{Error, JobError, Result};
use crate::queue::JobQueue;
use crate::registry::TopicRegistry;
use crate::types::{DownloadJob, Event, JobOutcome};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use url::Url;

/// Character removed from data identifiers before they become paths
pub const DISALLOWED_PATH_CHAR: char = ':';

/// Strip characters that may not appear in the on-disk path
///
/// Only [`DISALLOWED_PATH_CHAR`] is removed. Path separators and `..`
/// segments are kept, so nested identifiers produce nested directories.
pub fn sanitize_data_id(data_id: &str) -> String {
    data_id.replace(DISALLOWED_PATH_CHAR, "")
}

/// Path a job's file is written to
pub fn target_path(output_dir: &Path, data_id: &str) -> PathBuf {
    output_dir.join(sanitize_data_id(data_id))
}

/// Build the HTTP client shared by all workers
///
/// Every retrieval is bounded by `timeout`.
pub fn build_http_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("wis2-downloader/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| Error::Other(format!("failed to create HTTP client: {}", e)))
}

/// Last path segment of a URL, used for log output
fn file_name(url: &Url) -> &str {
    url.path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|name| !name.is_empty())
        .unwrap_or(url.as_str())
}

/// A consumer of the job queue
#[derive(Clone)]
pub struct DownloadWorker {
    id: usize,
    registry: TopicRegistry,
    queue: JobQueue,
    client: reqwest::Client,
    event_tx: broadcast::Sender<Event>,
}

impl DownloadWorker {
    /// Create a worker; `id` only appears in logs
    pub fn new(
        id: usize,
        registry: TopicRegistry,
        queue: JobQueue,
        client: reqwest::Client,
        event_tx: broadcast::Sender<Event>,
    ) -> Self {
        Self {
            id,
            registry,
            queue,
            client,
            event_tx,
        }
    }

    /// Pull jobs until cancelled
    ///
    /// A job that has been popped is always finished and reported to the
    /// queue, even if cancellation arrives meanwhile.
    pub async fn run(self, cancel: CancellationToken) {
        tracing::info!(worker = self.id, "Download worker started");

        loop {
            let job = tokio::select! {
                _ = cancel.cancelled() => break,
                job = self.queue.pop() => job,
            };

            let Some(job) = job else {
                tracing::warn!(worker = self.id, "Job queue closed");
                break;
            };

            let span = tracing::info_span!(
                "download_job",
                worker = self.id,
                topic = %job.topic,
                data_id = %job.payload.properties.data_id,
            );
            let outcome = self.process(&job).instrument(span).await;
            self.report(&job, &outcome);
            self.queue.task_done(&outcome);
        }

        tracing::info!(worker = self.id, "Download worker stopped");
    }

    /// Process one job end to end
    ///
    /// Never fails: every error is folded into the returned outcome.
    pub async fn process(&self, job: &DownloadJob) -> JobOutcome {
        let output_dir = self.registry.resolve(&job.topic).await;
        let path = target_path(&output_dir, &job.payload.properties.data_id);

        if let Some(parent) = path.parent()
            && let Err(e) = tokio::fs::create_dir_all(parent).await
        {
            let error = JobError::Write {
                path: parent.to_path_buf(),
                reason: e.to_string(),
            };
            tracing::error!(path = %parent.display(), error = %e, "Error creating directory");
            return JobOutcome::Failed { error };
        }

        let Some(link) = job.payload.canonical_link() else {
            tracing::info!("No canonical link in notification, nothing to download");
            return JobOutcome::NoCanonicalLink;
        };

        if is_file(&path).await {
            tracing::info!(path = %path.display(), "File already exists, skipping download");
            return JobOutcome::AlreadyPresent { path };
        }

        match self.download(&link.href, &path).await {
            Ok(bytes) => {
                tracing::info!(path = %path.display(), bytes, "Download complete");
                JobOutcome::Downloaded { path, bytes }
            }
            Err(e) => {
                tracing::error!(url = %link.href, path = %path.display(), error = %e, "Download failed");
                JobOutcome::Failed { error: e }
            }
        }
    }

    async fn download(&self, href: &str, path: &Path) -> std::result::Result<u64, JobError> {
        let url = Url::parse(href).map_err(|e| JobError::InvalidLink {
            href: href.to_string(),
            reason: e.to_string(),
        })?;

        tracing::info!(url = %url, file = file_name(&url), "Downloading");

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| JobError::Request {
                url: url.to_string(),
                reason: describe_request_error(&e),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(JobError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await.map_err(|e| JobError::Request {
            url: url.to_string(),
            reason: describe_request_error(&e),
        })?;

        tokio::fs::write(path, &body)
            .await
            .map_err(|e| JobError::Write {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;

        Ok(body.len() as u64)
    }

    fn report(&self, job: &DownloadJob, outcome: &JobOutcome) {
        let topic = job.topic.clone();
        let data_id = job.payload.properties.data_id.clone();

        let event = match outcome {
            JobOutcome::Downloaded { path, bytes } => Event::DownloadComplete {
                topic,
                path: path.clone(),
                bytes: *bytes,
            },
            JobOutcome::AlreadyPresent { path } => Event::DownloadSkipped {
                topic,
                path: path.clone(),
            },
            JobOutcome::NoCanonicalLink => Event::NoCanonicalLink { topic, data_id },
            JobOutcome::Failed { error } => Event::DownloadFailed {
                topic,
                data_id,
                error: error.to_string(),
            },
        };

        // No subscribers is fine
        self.event_tx.send(event).ok();
    }
}

async fn is_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_file())
        .unwrap_or(false)
}

fn describe_request_error(e: &reqwest::Error) -> String {
    if e.is_timeout() {
        format!("request timed out: {}", e)
    } else if e.is_connect() {
        format!("connection failed: {}", e)
    } else {
        e.to_string()
    }
}
