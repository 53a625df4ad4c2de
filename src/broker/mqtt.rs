//! rumqttc-backed broker handle

use super::Broker;
use crate::config::{BrokerConfig, BrokerTransport};
use crate::error::{Error, Result};
use async_trait::async_trait;
use rumqttc::{AsyncClient, EventLoop, MqttOptions, QoS, Transport};
use std::time::Duration;

/// Largest notification we accept; WIS2 messages may embed small payloads inline
const MAX_PACKET_SIZE: usize = 1024 * 1024;

/// Shortest keep-alive the client accepts without tripping the broker
const MIN_KEEP_ALIVE: Duration = Duration::from_secs(5);

/// Broker handle wrapping an MQTT [`AsyncClient`]
///
/// Requests are queued on the client's channel and sent by the event loop,
/// so the event loop must be polled for them to go out.
#[derive(Clone)]
pub struct MqttBroker {
    client: AsyncClient,
    qos: QoS,
}

impl MqttBroker {
    /// Build the client and its event loop from configuration
    ///
    /// No network activity happens until the returned [`EventLoop`] is polled.
    pub fn connect(config: &BrokerConfig) -> Result<(Self, EventLoop)> {
        let options = build_mqtt_options(config)?;
        let qos = qos_level(config.qos)?;
        let (client, eventloop) = AsyncClient::new(options, config.request_capacity.max(1));

        tracing::info!(
            host = %config.host,
            port = config.port,
            transport = ?config.transport,
            "MQTT client initialised"
        );

        Ok((Self { client, qos }, eventloop))
    }
}

#[async_trait]
impl Broker for MqttBroker {
    async fn subscribe(&self, topic: &str) -> Result<()> {
        tracing::debug!(topic = %topic, qos = ?self.qos, "Subscribing");
        self.client.subscribe(topic, self.qos).await?;
        Ok(())
    }

    async fn unsubscribe(&self, topic: &str) -> Result<()> {
        tracing::debug!(topic = %topic, "Unsubscribing");
        self.client.unsubscribe(topic).await?;
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        tracing::debug!("Sending DISCONNECT");
        self.client.disconnect().await?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "mqtt"
    }
}

/// Translate broker settings into client options
pub fn build_mqtt_options(config: &BrokerConfig) -> Result<MqttOptions> {
    let client_id = config
        .client_id
        .clone()
        .unwrap_or_else(|| format!("wis2-downloader-{:08x}", rand::random::<u32>()));

    let mut options = match config.transport {
        BrokerTransport::Wss => {
            // Websocket transports take the full URL in place of the host
            let url = format!("wss://{}:{}{}", config.host, config.port, config.ws_path);
            let mut options = MqttOptions::new(client_id, url, config.port);
            options.set_transport(Transport::wss_with_default_config());
            options
        }
        BrokerTransport::Tls => {
            let mut options = MqttOptions::new(client_id, config.host.clone(), config.port);
            options.set_transport(Transport::tls_with_default_config());
            options
        }
        BrokerTransport::Tcp => MqttOptions::new(client_id, config.host.clone(), config.port),
    };

    if config.username.is_empty() {
        return Err(Error::Config {
            message: "broker username must not be empty".to_string(),
            key: Some("broker.username".to_string()),
        });
    }

    options
        .set_credentials(config.username.clone(), config.password.clone())
        .set_keep_alive(config.keep_alive.max(MIN_KEEP_ALIVE))
        .set_clean_session(true)
        .set_max_packet_size(MAX_PACKET_SIZE, MAX_PACKET_SIZE);

    Ok(options)
}

/// Map a numeric QoS level onto the client's enum
pub fn qos_level(level: u8) -> Result<QoS> {
    match level {
        0 => Ok(QoS::AtMostOnce),
        1 => Ok(QoS::AtLeastOnce),
        2 => Ok(QoS::ExactlyOnce),
        other => Err(Error::Config {
            message: format!("qos must be 0, 1 or 2 (got {other})"),
            key: Some("broker.qos".to_string()),
        }),
    }
}
