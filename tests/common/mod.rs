//! Common test utilities for wis2-downloader integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use wis2_downloader::{Broker, Config, Event, Result, TopicRegistry, Wis2Downloader};

/// Broker that accepts every request and remembers the active topics
#[derive(Clone, Default)]
pub struct FakeBroker {
    active: Arc<Mutex<Vec<String>>>,
}

impl FakeBroker {
    pub fn active(&self) -> Vec<String> {
        self.active.lock().map(|topics| topics.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Broker for FakeBroker {
    async fn subscribe(&self, topic: &str) -> Result<()> {
        if let Ok(mut topics) = self.active.lock()
            && !topics.iter().any(|t| t == topic)
        {
            topics.push(topic.to_string());
        }
        Ok(())
    }

    async fn unsubscribe(&self, topic: &str) -> Result<()> {
        if let Ok(mut topics) = self.active.lock() {
            topics.retain(|t| t != topic);
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}

/// Pipeline over a [`FakeBroker`], download root in a fresh temp dir,
/// pre-loaded with `subscriptions` (directories relative to the temp dir)
pub fn create_pipeline(
    subscriptions: &[(&str, &str)],
    workers: usize,
) -> (Wis2Downloader, FakeBroker, TempDir) {
    let temp_dir = tempfile::tempdir().expect("temp dir");
    let root = temp_dir.path().join("downloads");
    std::fs::create_dir_all(&root).expect("download root");

    let mut config = Config::default();
    config.broker.host = "localhost".to_string();
    config.download.download_dir = Some(root.clone());
    config.download.workers = workers;
    config.download.request_timeout = Duration::from_secs(5);
    config.download.shutdown_grace = Duration::from_secs(1);

    let mapping: BTreeMap<String, PathBuf> = subscriptions
        .iter()
        .map(|(topic, dir)| (topic.to_string(), temp_dir.path().join(dir)))
        .collect();
    let registry = TopicRegistry::with_subscriptions(root, mapping);

    let broker = FakeBroker::default();
    let downloader = Wis2Downloader::new(config, registry, Arc::new(broker.clone()))
        .expect("pipeline should build");

    (downloader, broker, temp_dir)
}

/// WIS2 notification body with an optional canonical link
pub fn notification(data_id: &str, canonical: Option<&str>) -> Vec<u8> {
    let mut links = vec![serde_json::json!({
        "rel": "via",
        "href": "https://example.org/metadata",
        "type": "text/html"
    })];
    if let Some(href) = canonical {
        links.push(serde_json::json!({
            "rel": "canonical",
            "href": href,
            "type": "application/octet-stream"
        }));
    }

    serde_json::json!({
        "id": "31e9d66a-cd83-4174-9429-b932f1abe1be",
        "conformsTo": ["http://wis.wmo.int/spec/wnm/1/conf/core"],
        "type": "Feature",
        "geometry": null,
        "properties": {
            "data_id": data_id,
            "pubtime": "2024-01-01T00:00:00Z"
        },
        "links": links
    })
    .to_string()
    .into_bytes()
}

/// Wait for the first event matching `predicate`
pub async fn wait_for_event<F>(
    events: &mut tokio::sync::broadcast::Receiver<Event>,
    timeout: Duration,
    predicate: F,
) -> Option<Event>
where
    F: Fn(&Event) -> bool,
{
    let result = tokio::time::timeout(timeout, async {
        loop {
            match events.recv().await {
                Ok(event) if predicate(&event) => return Some(event),
                Ok(_) => continue,
                Err(_) => return None,
            }
        }
    })
    .await;

    result.ok().flatten()
}
