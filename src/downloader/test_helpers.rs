//! Shared test helpers: a recording broker and a ready-made pipeline.

use crate::broker::Broker;
use crate::config::Config;
use crate::downloader::Wis2Downloader;
use crate::error::{Error, Result};
use crate::registry::TopicRegistry;
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tempfile::tempdir;
use tokio::sync::Mutex;

/// Broker fake that records every request instead of talking to a server
#[derive(Clone, Default)]
pub(crate) struct RecordingBroker {
    subscribed: Arc<Mutex<Vec<String>>>,
    unsubscribed: Arc<Mutex<Vec<String>>>,
    active: Arc<Mutex<BTreeSet<String>>>,
    disconnects: Arc<AtomicUsize>,
    fail: bool,
    latency: Option<Duration>,
}

impl RecordingBroker {
    /// A broker whose subscribe/unsubscribe requests always fail
    pub(crate) fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    /// A broker that takes `latency` to accept each subscribe request
    pub(crate) fn slow(latency: Duration) -> Self {
        Self {
            latency: Some(latency),
            ..Default::default()
        }
    }

    /// Every accepted subscribe request, in order
    pub(crate) async fn subscribed(&self) -> Vec<String> {
        self.subscribed.lock().await.clone()
    }

    /// Every accepted unsubscribe request, in order
    pub(crate) async fn unsubscribed(&self) -> Vec<String> {
        self.unsubscribed.lock().await.clone()
    }

    /// Topics currently subscribed
    pub(crate) async fn active(&self) -> Vec<String> {
        self.active.lock().await.iter().cloned().collect()
    }

    /// Number of disconnect calls
    pub(crate) fn disconnects(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Broker for RecordingBroker {
    async fn subscribe(&self, topic: &str) -> Result<()> {
        if self.fail {
            return Err(Error::Mqtt("request channel closed".to_string()));
        }
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        self.subscribed.lock().await.push(topic.to_string());
        self.active.lock().await.insert(topic.to_string());
        Ok(())
    }

    async fn unsubscribe(&self, topic: &str) -> Result<()> {
        if self.fail {
            return Err(Error::Mqtt("request channel closed".to_string()));
        }
        self.unsubscribed.lock().await.push(topic.to_string());
        self.active.lock().await.remove(topic);
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

/// Create a pipeline over a [`RecordingBroker`] with its download root in a
/// temp dir. Returns the tempdir, which must be kept alive.
pub(crate) fn create_test_downloader() -> (Wis2Downloader, RecordingBroker, tempfile::TempDir) {
    let temp_dir = tempdir().unwrap();

    let mut config = Config::default();
    config.broker.host = "localhost".to_string();
    config.download.download_dir = Some(temp_dir.path().join("downloads"));
    config.download.workers = 2;
    config.download.shutdown_grace = std::time::Duration::from_secs(1);

    std::fs::create_dir_all(temp_dir.path().join("downloads")).unwrap();

    let registry = TopicRegistry::new(config.download.default_directory());
    let broker = RecordingBroker::default();
    let downloader = Wis2Downloader::new(config, registry, Arc::new(broker.clone())).unwrap();

    (downloader, broker, temp_dir)
}
