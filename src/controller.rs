//! Subscription controller: keeps broker subscriptions and the topic
//! registry in step.
//!
//! Every mutation talks to the broker first and touches the registry only
//! once the broker request has been accepted. A registry entry therefore
//! never exists without a matching subscription, except for the duration of
//! a single call. Mutations are serialized so two concurrent requests for
//! the same topic cannot interleave.

use crate::broker::Broker;
use crate::error::{Result, SubscriptionError};
use crate::registry::TopicRegistry;
use crate::types::{AddOutcome, Event, RemoveOutcome, Subscription};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{Mutex, broadcast};

/// Administrative entry point for subscription changes
#[derive(Clone)]
pub struct SubscriptionController {
    registry: TopicRegistry,
    broker: Arc<dyn Broker>,
    event_tx: broadcast::Sender<Event>,
    mutation: Arc<Mutex<()>>,
}

impl SubscriptionController {
    /// Create a controller over `registry` and `broker`
    pub fn new(
        registry: TopicRegistry,
        broker: Arc<dyn Broker>,
        event_tx: broadcast::Sender<Event>,
    ) -> Self {
        Self {
            registry,
            broker,
            event_tx,
            mutation: Arc::new(Mutex::new(())),
        }
    }

    /// Subscribe to `topic` and register its directory
    ///
    /// Without `directory` the registry's default directory is used. Adding
    /// a topic that is already registered changes nothing.
    ///
    /// # Errors
    ///
    /// Returns [`SubscriptionError`] for an empty or malformed topic, or the
    /// broker error if the subscribe request could not be issued. In both
    /// cases the registry is left untouched.
    pub async fn add_subscription(
        &self,
        topic: &str,
        directory: Option<PathBuf>,
    ) -> Result<AddOutcome> {
        validate_topic(topic)?;
        let _guard = self.mutation.lock().await;

        if self.registry.contains(topic).await {
            tracing::debug!(topic = %topic, "Topic already subscribed");
            return Ok(AddOutcome::AlreadySubscribed);
        }

        let directory = directory.unwrap_or_else(|| self.registry.default_dir().to_path_buf());

        self.broker.subscribe(topic).await?;
        self.registry.set(topic, directory.clone()).await;

        tracing::info!(
            topic = %topic,
            directory = %directory.display(),
            broker = self.broker.name(),
            "Subscribed"
        );
        self.event_tx
            .send(Event::Subscribed {
                topic: topic.to_string(),
                directory,
            })
            .ok();

        Ok(AddOutcome::Subscribed)
    }

    /// Unsubscribe from `topic` and drop its registry entry
    ///
    /// Removing an unknown topic is not an error: it is logged, no broker
    /// request is made, and [`RemoveOutcome::NotFound`] is returned.
    pub async fn remove_subscription(&self, topic: &str) -> Result<RemoveOutcome> {
        if topic.is_empty() {
            return Err(SubscriptionError::MissingTopic.into());
        }
        let _guard = self.mutation.lock().await;

        if !self.registry.contains(topic).await {
            tracing::info!(topic = %topic, "Topic not found");
            return Ok(RemoveOutcome::NotFound);
        }

        self.broker.unsubscribe(topic).await?;
        self.registry.remove(topic).await;

        tracing::info!(topic = %topic, broker = self.broker.name(), "Unsubscribed");
        self.event_tx
            .send(Event::Unsubscribed {
                topic: topic.to_string(),
            })
            .ok();

        Ok(RemoveOutcome::Unsubscribed)
    }

    /// Re-issue a subscribe request for every registered topic
    ///
    /// Called after each (re)connect. Topics are taken one at a time under
    /// the mutation lock and re-checked against the registry, so a topic
    /// removed while this runs is never subscribed again. Returns how many
    /// requests were accepted.
    pub async fn resubscribe_all(&self) -> usize {
        let topics = self.registry.topics().await;
        let mut accepted = 0;

        for topic in &topics {
            let _guard = self.mutation.lock().await;
            if !self.registry.contains(topic).await {
                tracing::debug!(topic = %topic, "Topic removed before resubscribe");
                continue;
            }

            match self.broker.subscribe(topic).await {
                Ok(()) => accepted += 1,
                Err(e) => tracing::error!(
                    topic = %topic,
                    broker = self.broker.name(),
                    error = %e,
                    "Subscribe failed"
                ),
            }
        }

        tracing::info!(
            subscribed = accepted,
            total = topics.len(),
            "Subscriptions re-established"
        );
        accepted
    }

    /// Current topic → directory mapping
    pub async fn list_subscriptions(&self) -> BTreeMap<String, PathBuf> {
        self.registry.snapshot().await
    }

    /// Current subscriptions as a list, ordered by topic
    pub async fn subscriptions(&self) -> Vec<Subscription> {
        self.registry.list().await
    }
}

/// Check that `topic` is a usable MQTT topic filter
///
/// `#` must be a whole segment and the last one; `+` must be a whole segment.
pub fn validate_topic(topic: &str) -> std::result::Result<(), SubscriptionError> {
    if topic.trim().is_empty() {
        return Err(SubscriptionError::MissingTopic);
    }

    let invalid = |reason: &str| SubscriptionError::InvalidTopic {
        topic: topic.to_string(),
        reason: reason.to_string(),
    };

    if topic.contains('\0') {
        return Err(invalid("topic contains a NUL character"));
    }

    let segments: Vec<&str> = topic.split('/').collect();
    let last = segments.len() - 1;

    for (i, segment) in segments.iter().enumerate() {
        if segment.contains('#') && (*segment != "#" || i != last) {
            return Err(invalid("'#' must be the whole last segment"));
        }
        if segment.contains('+') && *segment != "+" {
            return Err(invalid("'+' must be a whole segment"));
        }
    }

    Ok(())
}
