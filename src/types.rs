//! Core types for wis2-downloader

use crate::error::JobError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use utoipa::ToSchema;

/// `rel` value marking the authoritative retrieval address
pub const CANONICAL_REL: &str = "canonical";

/// One entry of a notification's `links` array
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Link {
    /// Relation type ("canonical", "update", ...)
    #[serde(default)]
    pub rel: String,

    /// Target address; empty when the link carries none
    #[serde(default)]
    pub href: String,

    /// Any other link metadata (type, length, ...)
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// `properties` object of a notification
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NotificationProperties {
    /// Identifier of the data item, used to derive the on-disk path
    pub data_id: String,

    /// Remaining properties (pubtime, integrity, ...)
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Structured payload of a notification message
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NotificationPayload {
    /// Notification properties
    pub properties: NotificationProperties,

    /// Ordered links to the announced resource
    #[serde(default)]
    pub links: Vec<Link>,

    /// Everything else in the message (id, geometry, ...)
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl NotificationPayload {
    /// Parse a raw UTF-8 JSON message body
    pub fn from_slice(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }

    /// First link whose `rel` is `canonical`
    pub fn canonical_link(&self) -> Option<&Link> {
        self.links.iter().find(|link| link.rel == CANONICAL_REL)
    }
}

/// A unit of work: one notification awaiting download
#[derive(Clone, Debug, PartialEq)]
pub struct DownloadJob {
    /// Topic the notification arrived on
    pub topic: String,
    /// Parsed notification payload
    pub payload: NotificationPayload,
}

impl DownloadJob {
    /// Create a job for a notification received on `topic`
    pub fn new(topic: impl Into<String>, payload: NotificationPayload) -> Self {
        Self {
            topic: topic.into(),
            payload,
        }
    }
}

/// How a job finished. Only `Failed` is an error; the rest are normal
/// completions.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum JobOutcome {
    /// Resource was retrieved and written
    Downloaded {
        /// Where the file was written
        path: PathBuf,
        /// Number of bytes written
        bytes: u64,
    },
    /// Target already existed; no network access happened
    AlreadyPresent {
        /// Existing file
        path: PathBuf,
    },
    /// Notification had no canonical link
    NoCanonicalLink,
    /// Retrieval or write failed
    Failed {
        /// What went wrong
        error: JobError,
    },
}

/// A (topic, directory) pair as exposed by listings
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Subscription {
    /// MQTT topic filter
    pub topic: String,
    /// Directory receiving files for this topic
    #[schema(value_type = String)]
    pub directory: PathBuf,
}

/// Result of an add request
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AddOutcome {
    /// New subscription was created
    Subscribed,
    /// Topic was already subscribed; nothing changed
    AlreadySubscribed,
}

/// Result of a delete request
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RemoveOutcome {
    /// Subscription was removed
    Unsubscribed,
    /// Topic was not subscribed; nothing changed
    NotFound,
}

/// Event emitted by the pipeline
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Connected (or reconnected) to the broker
    BrokerConnected,

    /// Event loop lost the broker connection
    BrokerDisconnected {
        /// Connection error
        error: String,
    },

    /// Notification converted to a job and queued
    JobQueued {
        /// Arrival topic
        topic: String,
        /// Data identifier
        data_id: String,
    },

    /// Notification dropped because its payload could not be parsed
    NotificationRejected {
        /// Arrival topic
        topic: String,
        /// Parse error
        error: String,
    },

    /// File retrieved and written
    DownloadComplete {
        /// Arrival topic
        topic: String,
        /// Written file
        #[schema(value_type = String)]
        path: PathBuf,
        /// Size in bytes
        bytes: u64,
    },

    /// Target already existed
    DownloadSkipped {
        /// Arrival topic
        topic: String,
        /// Existing file
        #[schema(value_type = String)]
        path: PathBuf,
    },

    /// Notification carried no canonical link
    NoCanonicalLink {
        /// Arrival topic
        topic: String,
        /// Data identifier
        data_id: String,
    },

    /// Retrieval or write failed
    DownloadFailed {
        /// Arrival topic
        topic: String,
        /// Data identifier
        data_id: String,
        /// Failure description
        error: String,
    },

    /// Subscription added
    Subscribed {
        /// Topic filter
        topic: String,
        /// Target directory
        #[schema(value_type = String)]
        directory: PathBuf,
    },

    /// Subscription removed
    Unsubscribed {
        /// Topic filter
        topic: String,
    },

    /// Pipeline is shutting down
    Shutdown,
}

impl Event {
    /// Stable name used as the SSE event type
    pub fn kind(&self) -> &'static str {
        match self {
            Event::BrokerConnected => "broker_connected",
            Event::BrokerDisconnected { .. } => "broker_disconnected",
            Event::JobQueued { .. } => "job_queued",
            Event::NotificationRejected { .. } => "notification_rejected",
            Event::DownloadComplete { .. } => "download_complete",
            Event::DownloadSkipped { .. } => "download_skipped",
            Event::NoCanonicalLink { .. } => "no_canonical_link",
            Event::DownloadFailed { .. } => "download_failed",
            Event::Subscribed { .. } => "subscribed",
            Event::Unsubscribed { .. } => "unsubscribed",
            Event::Shutdown => "shutdown",
        }
    }
}

/// Job queue statistics
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct QueueStats {
    /// Jobs waiting for a worker
    pub pending: usize,
    /// Jobs currently being processed
    pub in_flight: usize,
    /// Jobs finished (any outcome)
    pub processed: u64,
    /// Files written
    pub downloaded: u64,
    /// Jobs skipped because the file already existed
    pub skipped: u64,
    /// Jobs without a canonical link
    pub no_canonical_link: u64,
    /// Jobs that failed
    pub failed: u64,
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "id": "b9c2a5e8",
        "type": "Feature",
        "properties": {
            "data_id": "2024:01:01:file.grib2",
            "pubtime": "2024-01-01T00:00:00Z"
        },
        "links": [
            {"rel": "update", "href": "https://example.org/other"},
            {"rel": "canonical", "href": "https://example.org/x/file.grib2", "type": "application/x-grib2"}
        ]
    }"#;

    #[test]
    fn parses_wis2_notification() {
        let payload = NotificationPayload::from_slice(SAMPLE.as_bytes()).unwrap();
        assert_eq!(payload.properties.data_id, "2024:01:01:file.grib2");
        assert_eq!(payload.links.len(), 2);
        assert_eq!(payload.extra["id"], "b9c2a5e8");
        assert_eq!(payload.properties.extra["pubtime"], "2024-01-01T00:00:00Z");
    }

    #[test]
    fn canonical_link_is_first_matching_rel() {
        let payload = NotificationPayload::from_slice(SAMPLE.as_bytes()).unwrap();
        let link = payload.canonical_link().unwrap();
        assert_eq!(link.href, "https://example.org/x/file.grib2");
        assert_eq!(link.extra["type"], "application/x-grib2");
    }

    #[test]
    fn missing_links_means_no_canonical_link() {
        let payload =
            NotificationPayload::from_slice(br#"{"properties": {"data_id": "a/b"}}"#).unwrap();
        assert!(payload.links.is_empty());
        assert!(payload.canonical_link().is_none());
    }

    #[test]
    fn link_without_href_does_not_reject_the_notification() {
        let payload = NotificationPayload::from_slice(
            br#"{
                "properties": {"data_id": "a/b"},
                "links": [
                    {"rel": "via", "type": "text/html"},
                    {"rel": "canonical", "href": "https://example.org/a/b"}
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(payload.links[0].href, "");
        assert_eq!(
            payload.canonical_link().unwrap().href,
            "https://example.org/a/b"
        );
    }

    #[test]
    fn missing_data_id_is_a_parse_error() {
        let result = NotificationPayload::from_slice(br#"{"properties": {}, "links": []}"#);
        assert!(result.is_err());
    }

    #[test]
    fn event_serializes_with_type_tag() {
        let event = Event::JobQueued {
            topic: "cache/a/wis2/#".to_string(),
            data_id: "x".to_string(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "job_queued");
        assert_eq!(event.kind(), "job_queued");
    }
}
