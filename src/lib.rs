//! # wis2-downloader
//!
//! Notification-driven download pipeline for WIS2 data.
//!
//! The pipeline subscribes to topics on a WIS2 global broker, turns every
//! notification it receives into a download job, and stores the announced
//! resource under the directory mapped to the notification's topic.
//!
//! ```text
//! MQTT broker → NotificationIntake → JobQueue → DownloadWorker(s) → filesystem
//!                    ▲                               │
//!   admin API → SubscriptionController ─→ TopicRegistry
//! ```
//!
//! ## Quick Start
//!
//! ```no_run
//! use wis2_downloader::{Config, Wis2Downloader};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut config = Config::default();
//!     config.broker.host = "globalbroker.meteo.fr".to_string();
//!
//!     let downloader = Wis2Downloader::start(config).await?;
//!
//!     let mut events = downloader.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     wis2_downloader::run_with_shutdown(downloader).await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Administrative REST API
pub mod api;
/// Pub/sub broker handle
pub mod broker;
/// Configuration types
pub mod config;
/// Subscription management
pub mod controller;
/// Pipeline orchestration
pub mod downloader;
/// Error types
pub mod error;
/// Inbound notification handling
pub mod intake;
/// Job queue between intake and workers
pub mod queue;
/// Topic → directory mapping
pub mod registry;
/// Reconnect backoff
pub mod retry;
/// Core types and events
pub mod types;
/// Download worker
pub mod worker;

// Re-export commonly used types
pub use broker::{Broker, MqttBroker};
pub use config::{BrokerConfig, BrokerTransport, Config, DownloadConfig};
pub use controller::SubscriptionController;
pub use downloader::Wis2Downloader;
pub use error::{ApiError, Error, ErrorDetail, JobError, Result, SubscriptionError, ToHttpStatus};
pub use intake::NotificationIntake;
pub use queue::JobQueue;
pub use registry::TopicRegistry;
pub use types::{
    AddOutcome, DownloadJob, Event, JobOutcome, Link, NotificationPayload, QueueStats,
    RemoveOutcome, Subscription,
};
pub use worker::DownloadWorker;

/// Run the pipeline until a termination signal arrives, then shut it down.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
pub async fn run_with_shutdown(downloader: Wis2Downloader) -> Result<()> {
    wait_for_signal().await;
    downloader.shutdown().await
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Registration may fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), _) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            if let Ok(mut sigint) = signal(SignalKind::interrupt()) {
                sigint.recv().await;
                tracing::info!("Received SIGINT signal (Ctrl+C)");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
        (_, Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                sigterm.recv().await;
                tracing::info!("Received SIGTERM signal");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
