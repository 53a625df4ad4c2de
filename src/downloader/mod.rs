//! Pipeline orchestration split into focused submodules.
//!
//! The `Wis2Downloader` struct owns every pipeline component and wires them
//! together:
//! - [`lifecycle`] - Startup from configuration and graceful shutdown
//! - [`services`] - Spawning the intake loop and download workers

mod lifecycle;
mod services;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

use crate::broker::Broker;
use crate::config::Config;
use crate::controller::SubscriptionController;
use crate::error::Result;
use crate::queue::JobQueue;
use crate::registry::TopicRegistry;
use crate::types::{Event, QueueStats};
use crate::worker::build_http_client;
use std::sync::Arc;
use tokio::sync::{Mutex, broadcast};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Capacity of the event broadcast channel
const EVENT_CHANNEL_CAPACITY: usize = 1000;

/// Main pipeline instance (cloneable - all fields are Arc-wrapped or cheap handles)
#[derive(Clone)]
pub struct Wis2Downloader {
    /// Configuration
    pub(crate) config: Arc<Config>,
    /// Topic → directory mapping shared by the controller and the workers
    pub(crate) registry: TopicRegistry,
    /// Handoff between intake and workers
    pub(crate) queue: JobQueue,
    /// Subscription management entry point
    pub(crate) controller: SubscriptionController,
    /// Pub/sub connection handle
    pub(crate) broker: Arc<dyn Broker>,
    /// HTTP client shared by every worker
    pub(crate) http_client: reqwest::Client,
    /// Event broadcast channel sender (multiple subscribers supported)
    pub(crate) event_tx: broadcast::Sender<Event>,
    /// Cancelled on shutdown; stops the intake loop and the workers
    pub(crate) cancel: CancellationToken,
    /// Handles of spawned intake/worker tasks
    pub(crate) tasks: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl Wis2Downloader {
    /// Assemble a pipeline from already-built parts
    ///
    /// Nothing is spawned yet; see [`Wis2Downloader::start`] for the full
    /// startup sequence, or call [`Wis2Downloader::start_workers`] directly.
    ///
    /// # Errors
    ///
    /// Fails only if the HTTP client cannot be built.
    pub fn new(config: Config, registry: TopicRegistry, broker: Arc<dyn Broker>) -> Result<Self> {
        let http_client = build_http_client(config.download.request_timeout)?;
        let (event_tx, _rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let controller = SubscriptionController::new(registry.clone(), broker.clone(), event_tx.clone());

        Ok(Self {
            config: Arc::new(config),
            registry,
            queue: JobQueue::new(),
            controller,
            broker,
            http_client,
            event_tx,
            cancel: CancellationToken::new(),
            tasks: Arc::new(Mutex::new(Vec::new())),
        })
    }

    /// Subscribe to pipeline events
    ///
    /// Each subscriber receives all events independently. A subscriber that
    /// falls more than 1000 events behind gets `RecvError::Lagged`.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Get the current configuration
    pub fn get_config(&self) -> Arc<Config> {
        Arc::clone(&self.config)
    }

    /// Subscription controller used by the admin API
    pub fn controller(&self) -> &SubscriptionController {
        &self.controller
    }

    /// Topic registry
    pub fn registry(&self) -> &TopicRegistry {
        &self.registry
    }

    /// Job queue
    pub fn queue(&self) -> &JobQueue {
        &self.queue
    }

    /// Snapshot of queue counters
    pub fn queue_stats(&self) -> QueueStats {
        self.queue.stats()
    }

    /// Whether shutdown has begun
    pub fn is_shutting_down(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Emit an event to all subscribers
    ///
    /// Dropped silently when nobody is listening.
    pub(crate) fn emit_event(&self, event: Event) {
        self.event_tx.send(event).ok();
    }

    /// Spawn the REST API server in a background task
    ///
    /// The server stops accepting connections once shutdown begins.
    pub fn spawn_api_server(self: &Arc<Self>) -> JoinHandle<Result<()>> {
        let downloader = self.clone();
        let config = self.config.clone();

        tokio::spawn(async move { crate::api::start_api_server(downloader, config).await })
    }
}
