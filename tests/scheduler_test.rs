// Live poller: publishes fresh readings and stops once nobody is listening

mod common;

use std::sync::Arc;
use std::time::Duration;

use aqi_dashboard::alerts::{AlertMonitor, FirePolicy, LogNotifier};
use aqi_dashboard::api::ApiClient;
use aqi_dashboard::models::{AlertChannel, AlertRule};
use aqi_dashboard::scheduler::start_live_poller;
use aqi_dashboard::services::LiveService;
use aqi_dashboard::store::AlertRuleStore;
use mockito::{Matcher, Server};
use tokio::sync::watch;
use tokio::time::timeout;

#[tokio::test]
async fn test_poller_publishes_update_and_stops_without_listeners() {
    let mut server = Server::new_async().await;

    let live = server
        .mock("GET", "/live/aqi")
        .match_query(Matcher::UrlEncoded("city".into(), "Lucknow".into()))
        .with_status(200)
        .with_body(r#"{"city":"Lucknow","aqi":"231","dominant_pollutant":"pm25"}"#)
        .expect_at_least(1)
        .create_async()
        .await;
    let satellite = server
        .mock("GET", "/satellite/live")
        .match_query(Matcher::Any)
        .with_status(503)
        .expect_at_least(1)
        .create_async()
        .await;

    let (_dir, store) = common::temp_store();
    let rules = AlertRuleStore::new(store);
    rules
        .add(AlertRule {
            city: "Lucknow".to_string(),
            threshold: 200.0,
            start: "00:00".to_string(),
            end: "23:59".to_string(),
            channel: AlertChannel::Browser,
            contact: None,
        })
        .unwrap();
    let monitor = Arc::new(AlertMonitor::new(rules, LogNotifier, FirePolicy::EveryCheck));

    let service = LiveService::new(ApiClient::with_base_url(server.url()));
    let (tx, mut rx) = watch::channel(None);
    let handle = tokio::spawn(start_live_poller(
        service,
        "Lucknow".to_string(),
        Duration::from_millis(50),
        tx,
        Some(monitor),
    ));

    timeout(Duration::from_secs(5), rx.changed())
        .await
        .expect("No update within 5s")
        .unwrap();
    let update = rx.borrow_and_update().clone().expect("Update should be set");

    assert!(update.ticket >= 1);
    assert_eq!(update.snapshot.reading.aqi, Some(231.0));
    assert_eq!(update.snapshot.category.label, "Very Unhealthy");
    assert!(update.snapshot.satellite.is_none());
    assert_eq!(update.fired.len(), 1);

    drop(rx);
    timeout(Duration::from_secs(5), handle)
        .await
        .expect("Poller should stop once the receiver is dropped")
        .unwrap();

    live.assert_async().await;
    satellite.assert_async().await;
}
