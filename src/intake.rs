//! Notification intake: bridges broker message delivery into the job queue
//!
//! The intake owns the MQTT event loop. On every CONNACK it has the
//! subscription controller re-establish the full subscription set (a clean
//! session loses subscriptions on reconnect). On every PUBLISH it parses the payload and
//! queues a [`DownloadJob`]; nothing else happens on this path, so a slow
//! download can never stall the connection.

use crate::config::ReconnectConfig;
use crate::controller::SubscriptionController;
use crate::queue::JobQueue;
use crate::retry::Backoff;
use crate::types::{DownloadJob, Event, NotificationPayload};
use rumqttc::{EventLoop, Outgoing, Packet};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// How long a cancelled intake keeps polling to send a queued DISCONNECT
const DISCONNECT_FLUSH_TIMEOUT: Duration = Duration::from_secs(1);

/// Subscriber side of the pub/sub connection
#[derive(Clone)]
pub struct NotificationIntake {
    queue: JobQueue,
    event_tx: broadcast::Sender<Event>,
}

impl NotificationIntake {
    /// Create an intake feeding `queue`
    pub fn new(queue: JobQueue, event_tx: broadcast::Sender<Event>) -> Self {
        Self { queue, event_tx }
    }

    /// Handle one inbound message
    ///
    /// Malformed payloads are logged and dropped. Returns whether a job was
    /// queued.
    pub fn handle_message(&self, topic: &str, payload: &[u8]) -> bool {
        debug!(topic = %topic, bytes = payload.len(), "Message received");

        let payload = match NotificationPayload::from_slice(payload) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(topic = %topic, error = %e, "Dropping malformed notification");
                self.event_tx
                    .send(Event::NotificationRejected {
                        topic: topic.to_string(),
                        error: e.to_string(),
                    })
                    .ok();
                return false;
            }
        };

        let data_id = payload.properties.data_id.clone();
        let job = DownloadJob::new(topic, payload);

        if let Err(e) = self.queue.push(job) {
            error!(topic = %topic, data_id = %data_id, error = %e, "Failed to queue job");
            return false;
        }

        debug!(
            topic = %topic,
            data_id = %data_id,
            pending = self.queue.pending(),
            "Job queued"
        );
        self.event_tx
            .send(Event::JobQueued {
                topic: topic.to_string(),
                data_id,
            })
            .ok();
        true
    }

    /// Drive the MQTT event loop until cancelled
    ///
    /// Connection errors are logged and followed by a backoff delay; the next
    /// poll makes the client reconnect. Every CONNACK hands resubscription to
    /// `controller`, which serializes it with admin changes. Once cancelled,
    /// the loop keeps polling briefly so a queued DISCONNECT reaches the broker.
    pub async fn run(
        self,
        mut eventloop: EventLoop,
        controller: SubscriptionController,
        reconnect: ReconnectConfig,
        cancel: CancellationToken,
    ) {
        info!("Notification intake started");
        let mut backoff = Backoff::new(reconnect);

        loop {
            let polled = tokio::select! {
                _ = cancel.cancelled() => {
                    flush_disconnect(&mut eventloop).await;
                    break;
                }
                polled = eventloop.poll() => polled,
            };

            match polled {
                Ok(rumqttc::Event::Incoming(Packet::ConnAck(ack))) => {
                    info!(code = ?ack.code, session_present = ack.session_present, "Connected to broker");
                    backoff.reset();
                    self.event_tx.send(Event::BrokerConnected).ok();

                    // Requests are drained by this loop, so subscribe from a separate task
                    let controller = controller.clone();
                    tokio::spawn(async move {
                        controller.resubscribe_all().await;
                    });
                }
                Ok(rumqttc::Event::Incoming(Packet::Publish(publish))) => {
                    self.handle_message(&publish.topic, &publish.payload);
                }
                Ok(rumqttc::Event::Incoming(Packet::SubAck(ack))) => {
                    debug!(pkid = ack.pkid, return_codes = ?ack.return_codes, "Subscription acknowledged");
                }
                Ok(rumqttc::Event::Incoming(Packet::UnsubAck(ack))) => {
                    debug!(pkid = ack.pkid, "Unsubscription acknowledged");
                }
                Ok(rumqttc::Event::Outgoing(Outgoing::Disconnect)) => {
                    info!("Disconnect sent to broker");
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    let delay = backoff.next_delay();
                    warn!(
                        error = %e,
                        attempt = backoff.attempts(),
                        delay_ms = delay.as_millis() as u64,
                        "Broker connection error, reconnecting"
                    );
                    self.event_tx
                        .send(Event::BrokerDisconnected {
                            error: e.to_string(),
                        })
                        .ok();

                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }

        info!("Notification intake stopped");
    }
}

/// Poll until a pending DISCONNECT has been written, the connection fails,
/// or [`DISCONNECT_FLUSH_TIMEOUT`] passes
async fn flush_disconnect(eventloop: &mut EventLoop) {
    let flushed = tokio::time::timeout(DISCONNECT_FLUSH_TIMEOUT, async {
        loop {
            match eventloop.poll().await {
                Ok(rumqttc::Event::Outgoing(Outgoing::Disconnect)) => return true,
                Ok(_) => {}
                Err(_) => return false,
            }
        }
    })
    .await;

    match flushed {
        Ok(true) => info!("Disconnect sent to broker"),
        Ok(false) => debug!("Connection closed before disconnect was sent"),
        Err(_) => debug!("No disconnect sent before timeout"),
    }
}
