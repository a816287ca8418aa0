// Alert rules: local persistence, backend mirroring and evaluation

mod common;

use std::sync::Mutex;

use aqi_dashboard::alerts::{AlertMonitor, FirePolicy, Notifier, Permission};
use aqi_dashboard::api::ApiClient;
use aqi_dashboard::fetch_error::FetchError;
use aqi_dashboard::models::{AlertChannel, AlertRule, DailySummaryRequest};
use aqi_dashboard::services::AlertService;
use aqi_dashboard::store::AlertRuleStore;
use chrono::NaiveDate;
use mockito::{Matcher, Server};
use serde_json::json;

fn rule(city: &str, threshold: f64) -> AlertRule {
    AlertRule {
        city: city.to_string(),
        threshold,
        start: "07:00".to_string(),
        end: "21:00".to_string(),
        channel: AlertChannel::Browser,
        contact: None,
    }
}

#[derive(Default)]
struct CountingNotifier {
    sent: Mutex<Vec<String>>,
}

impl Notifier for CountingNotifier {
    fn permission(&self) -> Permission {
        Permission::Granted
    }

    fn request_permission(&self) -> Permission {
        Permission::Granted
    }

    fn notify(&self, title: &str, _body: &str) {
        self.sent.lock().unwrap().push(title.to_string());
    }
}

#[tokio::test]
async fn test_mirror_failure_keeps_local_rule() {
    let mut server = Server::new_async().await;

    let mock = server
        .mock("POST", "/alerts")
        .with_status(500)
        .with_body(r#"{"detail":"database unavailable"}"#)
        .create_async()
        .await;

    let (_dir, store) = common::temp_store();
    let service = AlertService::new(
        ApiClient::with_base_url(server.url()),
        AlertRuleStore::new(store),
    );

    let rules = service.add_rule(rule("Delhi", 150.0)).await.unwrap();
    assert_eq!(rules.len(), 1);
    assert_eq!(service.list().unwrap(), vec![rule("Delhi", 150.0)]);

    mock.assert_async().await;
}

#[tokio::test]
async fn test_rule_is_mirrored_in_wire_format() {
    let mut server = Server::new_async().await;

    let mock = server
        .mock("POST", "/alerts")
        .match_body(Matcher::Json(json!({
            "city": "Pune",
            "threshold": 100.0,
            "start": "07:00",
            "end": "21:00",
            "channel": "email",
            "contact": "asha@example.in"
        })))
        .with_status(200)
        .with_body(r#"{"status":"ok","count":1}"#)
        .create_async()
        .await;

    let (_dir, store) = common::temp_store();
    let service = AlertService::new(
        ApiClient::with_base_url(server.url()),
        AlertRuleStore::new(store),
    );

    let email_rule = AlertRule {
        channel: AlertChannel::Email,
        contact: Some("asha@example.in".to_string()),
        ..rule("Pune", 100.0)
    };
    service.add_rule(email_rule).await.unwrap();

    mock.assert_async().await;
}

#[tokio::test]
async fn test_invalid_rule_is_not_stored() {
    let (_dir, store) = common::temp_store();
    let service = AlertService::new(
        ApiClient::with_base_url("http://127.0.0.1:9"),
        AlertRuleStore::new(store),
    );

    let bad = AlertRule {
        end: "9pm".to_string(),
        ..rule("Delhi", 150.0)
    };
    assert!(matches!(
        service.add_rule(bad).await,
        Err(FetchError::InvalidInput(_))
    ));
    assert!(service.list().unwrap().is_empty());
}

#[tokio::test]
async fn test_subscribe_daily_summary_validates_time() {
    let mut server = Server::new_async().await;

    let mock = server
        .mock("POST", "/subscribe_daily_summary")
        .with_status(200)
        .with_body(r#"{"status":"scheduled"}"#)
        .expect(1)
        .create_async()
        .await;

    let (_dir, store) = common::temp_store();
    let service = AlertService::new(
        ApiClient::with_base_url(server.url()),
        AlertRuleStore::new(store),
    );

    let mut request = DailySummaryRequest {
        city: "Delhi".to_string(),
        time: "8 o'clock".to_string(),
        channel: AlertChannel::Whatsapp,
        contact: "+91 98765 43210".to_string(),
    };
    assert!(service.subscribe_daily_summary(&request).await.is_err());

    request.time = "08:00".to_string();
    service.subscribe_daily_summary(&request).await.unwrap();

    mock.assert_async().await;
}

#[test]
fn test_monitor_fires_once_per_day() {
    let (_dir, store) = common::temp_store();
    let rules = AlertRuleStore::new(store);
    rules.add(rule("Delhi", 150.0)).unwrap();
    rules.add(rule("Mumbai", 100.0)).unwrap();

    let monitor = AlertMonitor::new(
        rules.clone(),
        CountingNotifier::default(),
        FirePolicy::OncePerDay,
    );
    let morning = NaiveDate::from_ymd_opt(2026, 10, 18)
        .unwrap()
        .and_hms_opt(9, 30, 0)
        .unwrap();

    let fired = monitor.check("delhi", Some(180.0), morning).unwrap();
    assert_eq!(fired, vec![rule("Delhi", 150.0)]);

    // Same day: suppressed
    let later = morning + chrono::Duration::hours(2);
    assert!(monitor.check("Delhi", Some(200.0), later).unwrap().is_empty());

    // Next day: fires again
    let tomorrow = morning + chrono::Duration::days(1);
    assert_eq!(monitor.check("Delhi", Some(200.0), tomorrow).unwrap().len(), 1);

    // Outside the window or below threshold
    let night = morning + chrono::Duration::hours(13);
    assert!(monitor.check("Mumbai", Some(300.0), night).unwrap().is_empty());
    assert!(monitor.check("Mumbai", Some(99.0), morning).unwrap().is_empty());
}
