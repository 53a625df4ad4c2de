//! Background task starters: the notification intake loop and download workers.

use crate::intake::NotificationIntake;
use crate::worker::DownloadWorker;
use rumqttc::EventLoop;

use super::Wis2Downloader;

impl Wis2Downloader {
    /// Intake bound to this pipeline's queue and event channel
    pub fn intake(&self) -> NotificationIntake {
        NotificationIntake::new(self.queue.clone(), self.event_tx.clone())
    }

    /// Spawn the configured number of download workers
    ///
    /// Each worker is scheduled as its own task; nothing runs inline.
    pub async fn start_workers(&self) {
        let count = self.config.download.workers.max(1);
        let mut tasks = self.tasks.lock().await;

        for id in 0..count {
            let worker = DownloadWorker::new(
                id,
                self.registry.clone(),
                self.queue.clone(),
                self.http_client.clone(),
                self.event_tx.clone(),
            );
            tasks.push(tokio::spawn(worker.run(self.cancel.clone())));
        }

        tracing::info!(workers = count, "Download workers started");
    }

    /// Spawn the task driving the MQTT event loop
    pub async fn start_intake(&self, eventloop: EventLoop) {
        let intake = self.intake();
        let handle = tokio::spawn(intake.run(
            eventloop,
            self.controller.clone(),
            self.config.broker.reconnect.clone(),
            self.cancel.clone(),
        ));

        self.tasks.lock().await.push(handle);
        tracing::debug!(host = %self.config.broker.host, "Broker event loop task spawned");
    }
}
