//! Topic registry: which directory receives files for each subscribed topic.

use crate::error::{Error, Result};
use crate::types::Subscription;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Shared topic → directory mapping
///
/// Cloning is cheap and every clone sees the same map. Workers resolve on
/// every job concurrently; the subscription controller is the only writer.
#[derive(Clone, Debug)]
pub struct TopicRegistry {
    topics: Arc<RwLock<BTreeMap<String, PathBuf>>>,
    default_dir: Arc<PathBuf>,
}

impl TopicRegistry {
    /// Create an empty registry with the given fallback directory
    pub fn new(default_dir: impl Into<PathBuf>) -> Self {
        Self::with_subscriptions(default_dir, BTreeMap::new())
    }

    /// Create a registry pre-populated with subscriptions
    pub fn with_subscriptions(
        default_dir: impl Into<PathBuf>,
        subscriptions: BTreeMap<String, PathBuf>,
    ) -> Self {
        Self {
            topics: Arc::new(RwLock::new(subscriptions)),
            default_dir: Arc::new(default_dir.into()),
        }
    }

    /// Load the startup subscription list (a JSON object of topic → directory)
    ///
    /// A missing or malformed file is fatal for the caller.
    pub fn from_file(path: &Path, default_dir: impl Into<PathBuf>) -> Result<Self> {
        let raw = std::fs::read(path).map_err(|e| Error::SubscriptionFile {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let subscriptions: BTreeMap<String, PathBuf> =
            serde_json::from_slice(&raw).map_err(|e| Error::SubscriptionFile {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;

        tracing::info!(
            path = %path.display(),
            count = subscriptions.len(),
            "Loaded subscriptions"
        );

        Ok(Self::with_subscriptions(default_dir, subscriptions))
    }

    /// Directory for `topic`, or the default directory when it is unknown
    pub async fn resolve(&self, topic: &str) -> PathBuf {
        let topics = self.topics.read().await;
        match topics.get(topic) {
            Some(dir) => dir.clone(),
            None => (*self.default_dir).clone(),
        }
    }

    /// Insert or overwrite a mapping
    pub async fn set(&self, topic: impl Into<String>, directory: impl Into<PathBuf>) {
        let topic = topic.into();
        let directory = directory.into();
        tracing::debug!(topic = %topic, directory = %directory.display(), "Registry entry set");
        self.topics.write().await.insert(topic, directory);
    }

    /// Remove a mapping, returning whether it existed
    pub async fn remove(&self, topic: &str) -> bool {
        let existed = self.topics.write().await.remove(topic).is_some();
        if !existed {
            tracing::info!(topic = %topic, "Topic not found in registry");
        }
        existed
    }

    /// Whether `topic` is registered
    pub async fn contains(&self, topic: &str) -> bool {
        self.topics.read().await.contains_key(topic)
    }

    /// All subscriptions, ordered by topic
    pub async fn list(&self) -> Vec<Subscription> {
        self.topics
            .read()
            .await
            .iter()
            .map(|(topic, directory)| Subscription {
                topic: topic.clone(),
                directory: directory.clone(),
            })
            .collect()
    }

    /// Registered topics, ordered
    pub async fn topics(&self) -> Vec<String> {
        self.topics.read().await.keys().cloned().collect()
    }

    /// Current mapping as a map (used for admin responses)
    pub async fn snapshot(&self) -> BTreeMap<String, PathBuf> {
        self.topics.read().await.clone()
    }

    /// Directory used for unknown topics
    pub fn default_dir(&self) -> &Path {
        &self.default_dir
    }
}
