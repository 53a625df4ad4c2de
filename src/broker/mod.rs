//! Pub/sub broker handle
//!
//! The subscription controller and the intake loop only need to issue
//! subscribe/unsubscribe requests; they do so through the [`Broker`] trait so
//! the MQTT client can be swapped for a recording fake in tests.

mod mqtt;

pub use mqtt::{MqttBroker, build_mqtt_options, qos_level};

use async_trait::async_trait;

/// Subscribe/unsubscribe side of a pub/sub connection
///
/// Implementations must be idempotent: subscribing twice to the same topic
/// filter is harmless.
#[async_trait]
pub trait Broker: Send + Sync {
    /// Subscribe to a topic filter
    ///
    /// # Errors
    ///
    /// Returns an error if the request could not be handed to the connection.
    async fn subscribe(&self, topic: &str) -> crate::Result<()>;

    /// Unsubscribe from a topic filter
    async fn unsubscribe(&self, topic: &str) -> crate::Result<()>;

    /// Close the connection. The default does nothing.
    async fn disconnect(&self) -> crate::Result<()> {
        Ok(())
    }

    /// Human-readable name for logging
    fn name(&self) -> &'static str;
}
