//! Startup and shutdown coordination.

use crate::broker::MqttBroker;
use crate::config::Config;
use crate::error::Result;
use crate::registry::TopicRegistry;
use crate::types::Event;
use std::sync::Arc;
use std::time::Duration;

use super::Wis2Downloader;

/// How long shutdown waits for the DISCONNECT request to be queued
const DISCONNECT_TIMEOUT: Duration = Duration::from_secs(2);

impl Wis2Downloader {
    /// Build and start the whole pipeline from configuration
    ///
    /// Startup sequence:
    /// 1. Validates the configuration (an explicit download directory must
    ///    exist and be writable)
    /// 2. Loads the startup subscription list
    /// 3. Creates the MQTT client
    /// 4. Spawns the download workers and the intake loop, which connects and
    ///    subscribes to every registered topic
    ///
    /// # Errors
    ///
    /// Any failure here is fatal: invalid configuration, a missing or
    /// malformed subscription file, or unusable broker options.
    pub async fn start(config: Config) -> Result<Self> {
        config.validate()?;

        let subscriptions_path = config.subscriptions_path();
        let registry =
            TopicRegistry::from_file(&subscriptions_path, config.download.default_directory())?;

        let (broker, eventloop) = MqttBroker::connect(&config.broker)?;
        let downloader = Self::new(config, registry, Arc::new(broker))?;

        downloader.start_workers().await;
        downloader.start_intake(eventloop).await;

        tracing::info!(
            subscriptions = %subscriptions_path.display(),
            default_dir = %downloader.registry.default_dir().display(),
            "Pipeline started"
        );

        Ok(downloader)
    }

    /// Gracefully shut down the pipeline
    ///
    /// This method performs a graceful shutdown sequence:
    /// 1. Asks the broker to close the connection
    /// 2. Cancels the workers and the intake loop, which keeps polling just
    ///    long enough to put the DISCONNECT on the wire
    /// 3. Gives in-flight jobs the configured grace period, then aborts
    ///    whatever is still running
    ///
    /// Jobs still queued when shutdown begins are not processed. Calling this
    /// more than once is harmless.
    pub async fn shutdown(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            tracing::debug!("Shutdown already in progress");
            return Ok(());
        }
        tracing::info!("Initiating graceful shutdown");

        match tokio::time::timeout(DISCONNECT_TIMEOUT, self.broker.disconnect()).await {
            Ok(Ok(())) => tracing::debug!(broker = self.broker.name(), "Disconnect requested"),
            Ok(Err(e)) => tracing::warn!(error = %e, "Failed to request broker disconnect"),
            Err(_) => tracing::warn!("Timed out requesting broker disconnect"),
        }

        self.cancel.cancel();

        let handles: Vec<_> = std::mem::take(&mut *self.tasks.lock().await);
        let deadline = tokio::time::Instant::now() + self.config.download.shutdown_grace;
        let mut aborted = 0;

        for mut handle in handles {
            match tokio::time::timeout_at(deadline, &mut handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::warn!(error = %e, "Background task ended abnormally"),
                Err(_) => {
                    handle.abort();
                    aborted += 1;
                }
            }
        }

        if aborted > 0 {
            tracing::warn!(
                aborted,
                grace_secs = self.config.download.shutdown_grace.as_secs(),
                "Tasks still running after grace period were aborted"
            );
        }

        let pending = self.queue.pending();
        if pending > 0 {
            tracing::warn!(pending, "Queued jobs were not processed");
        }

        self.emit_event(Event::Shutdown);
        tracing::info!("Graceful shutdown complete");
        Ok(())
    }
}
