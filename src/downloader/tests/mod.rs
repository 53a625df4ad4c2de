use super::*;
use crate::downloader::test_helpers::{RecordingBroker, create_test_downloader};
use crate::types::NotificationPayload;


fn notification(data_id: &str, canonical: Option<&str>) -> Vec<u8> {
    let links = match canonical {
        Some(href) => serde_json::json!([{"rel": "canonical", "href": href}]),
        None => serde_json::json!([]),
    };
    serde_json::json!({
        "id": "test-notification",
        "properties": {"data_id": data_id},
        "links": links,
    })
    .to_string()
    .into_bytes()
}

#[test]
fn notification_helper_builds_parseable_payload() {
    let raw = notification("a:b", Some("https://example.org/a"));
    let payload = NotificationPayload::from_slice(&raw).unwrap();
    assert!(payload.canonical_link().is_some());
}

#[tokio::test]
async fn new_downloader_exposes_components() {
    let (downloader, _broker, temp_dir) = create_test_downloader();

    assert_eq!(
        downloader.registry().default_dir(),
        temp_dir.path().join("downloads")
    );
    assert_eq!(downloader.queue_stats(), crate::types::QueueStats::default());
    assert!(!downloader.is_shutting_down());
    assert_eq!(downloader.get_config().download.workers, 2);
}

#[tokio::test]
async fn controller_changes_reach_broker_and_registry() {
    let (downloader, broker, _temp_dir) = create_test_downloader();

    downloader
        .controller()
        .add_subscription("cache/a/wis2/+/data/#", None)
        .await
        .unwrap();

    assert_eq!(broker.active().await, vec!["cache/a/wis2/+/data/#"]);
    assert!(downloader.registry().contains("cache/a/wis2/+/data/#").await);
}

#[tokio::test]
async fn subscribers_receive_emitted_events() {
    let (downloader, _broker, _temp_dir) = create_test_downloader();
    let mut first = downloader.subscribe();
    let mut second = downloader.subscribe();

    downloader.emit_event(Event::BrokerConnected);

    assert!(matches!(first.recv().await.unwrap(), Event::BrokerConnected));
    assert!(matches!(second.recv().await.unwrap(), Event::BrokerConnected));
}
