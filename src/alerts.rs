//! Local alert rule evaluation.
//!
//! Rules are re-evaluated against every fresh reading. A rule matches when the
//! city matches case-insensitively, the AQI is at or above its threshold and
//! the local clock time lies inside `[start, end]` (inclusive, no wrap past
//! midnight). Only the `browser` channel is delivered locally; the others are
//! delivered by the backend from the mirrored copy of the rule.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use chrono::{NaiveDateTime, NaiveTime, Timelike};
use tracing::{debug, info, warn};

use crate::models::{AlertChannel, AlertRule};
use crate::store::{AlertRuleStore, StoreError};
use crate::utils::parse_clock_minutes;

/// Whether a rule may fire again after it has fired once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FirePolicy {
    /// At most once per rule per calendar day.
    #[default]
    OncePerDay,
    /// On every matching check.
    EveryCheck,
}

impl FirePolicy {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "once-per-day" | "once_per_day" | "daily" => Some(FirePolicy::OncePerDay),
            "every-check" | "every_check" | "always" => Some(FirePolicy::EveryCheck),
            _ => None,
        }
    }
}

/// Identity of a rule in the last-fired history.
pub fn rule_key(rule: &AlertRule) -> String {
    format!(
        "{}|{}|{}|{}|{:?}",
        rule.city.trim().to_lowercase(),
        rule.threshold,
        rule.start,
        rule.end,
        rule.channel
    )
}

fn within_window(rule: &AlertRule, minutes: u32) -> bool {
    match (parse_clock_minutes(&rule.start), parse_clock_minutes(&rule.end)) {
        (Some(start), Some(end)) => start <= minutes && minutes <= end,
        _ => false,
    }
}

/// Rules that fire for `city` at `aqi` observed at local time `now`.
pub fn matching_rules<'a>(
    rules: &'a [AlertRule],
    city: &str,
    aqi: f64,
    now: NaiveTime,
) -> Vec<&'a AlertRule> {
    if !aqi.is_finite() {
        return Vec::new();
    }
    let city = city.trim().to_lowercase();
    let minutes = now.hour() * 60 + now.minute();

    rules
        .iter()
        .filter(|rule| rule.city.trim().to_lowercase() == city)
        .filter(|rule| aqi >= rule.threshold)
        .filter(|rule| within_window(rule, minutes))
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    Granted,
    Denied,
    /// Not yet asked.
    Default,
}

/// Platform notification sink for the `browser` channel.
pub trait Notifier: Send + Sync {
    fn permission(&self) -> Permission;
    fn request_permission(&self) -> Permission;
    fn notify(&self, title: &str, body: &str);
}

/// Terminal notifier: alerts are emitted as log events.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn permission(&self) -> Permission {
        Permission::Granted
    }

    fn request_permission(&self) -> Permission {
        Permission::Granted
    }

    fn notify(&self, title: &str, body: &str) {
        warn!(target: "aqi_dashboard::alert", "{}: {}", title, body);
    }
}

pub struct AlertMonitor<N: Notifier> {
    rules: AlertRuleStore,
    notifier: N,
    policy: FirePolicy,
    permission_requested: AtomicBool,
    /// Held across the last-fired read and its update.
    checking: Mutex<()>,
}

impl<N: Notifier> AlertMonitor<N> {
    pub fn new(rules: AlertRuleStore, notifier: N, policy: FirePolicy) -> Self {
        Self {
            rules,
            notifier,
            policy,
            permission_requested: AtomicBool::new(false),
            checking: Mutex::new(()),
        }
    }

    pub fn policy(&self) -> FirePolicy {
        self.policy
    }

    /// Evaluates stored rules against a fresh reading and notifies for each
    /// browser rule that fires. Returns the rules that were delivered.
    pub fn check(
        &self,
        city: &str,
        aqi: Option<f64>,
        now: NaiveDateTime,
    ) -> Result<Vec<AlertRule>, StoreError> {
        let Some(aqi) = aqi else {
            return Ok(Vec::new());
        };

        let _checking = self
            .checking
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let rules = self.rules.list()?;
        let matches = matching_rules(&rules, city, aqi, now.time());
        if matches.is_empty() {
            return Ok(Vec::new());
        }

        let today = now.date();
        let last_fired = match self.policy {
            FirePolicy::OncePerDay => self.rules.last_fired()?,
            FirePolicy::EveryCheck => Default::default(),
        };

        let mut fired = Vec::new();
        for rule in matches {
            if rule.channel != AlertChannel::Browser {
                debug!(
                    "Rule for {} is delivered by the backend via {:?}",
                    rule.city, rule.channel
                );
                continue;
            }

            let key = rule_key(rule);
            if self.policy == FirePolicy::OncePerDay && last_fired.get(&key) == Some(&today) {
                debug!("Rule for {} already fired today", rule.city);
                continue;
            }

            if !self.permitted() {
                continue;
            }

            self.notifier.notify(
                &format!("AQI alert for {}", rule.city),
                &format!("AQI is {} (threshold {})", aqi, rule.threshold),
            );
            info!("Alert fired for {} at AQI {}", rule.city, aqi);

            if self.policy == FirePolicy::OncePerDay {
                self.rules.record_fired(&key, today)?;
            }
            fired.push(rule.clone());
        }

        Ok(fired)
    }

    fn permitted(&self) -> bool {
        match self.notifier.permission() {
            Permission::Granted => true,
            Permission::Denied => false,
            Permission::Default => {
                if self.permission_requested.swap(true, Ordering::SeqCst) {
                    return false;
                }
                self.notifier.request_permission() == Permission::Granted
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::LocalStore;
    use chrono::NaiveDate;
    use std::sync::Mutex;
    use tempfile::tempdir;

    fn rule(city: &str, threshold: f64, start: &str, end: &str) -> AlertRule {
        AlertRule {
            city: city.to_string(),
            threshold,
            start: start.to_string(),
            end: end.to_string(),
            channel: AlertChannel::Browser,
            contact: None,
        }
    }

    fn at(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn test_matching_rules_threshold_and_window() {
        let rules = vec![rule("Delhi", 150.0, "06:00", "10:00")];
        assert_eq!(matching_rules(&rules, "Delhi", 160.0, at(7, 30)).len(), 1);
        assert!(matching_rules(&rules, "Delhi", 100.0, at(7, 30)).is_empty());
        assert!(matching_rules(&rules, "Delhi", 160.0, at(12, 0)).is_empty());
    }

    #[test]
    fn test_matching_rules_edges() {
        let rules = vec![rule("Delhi", 150.0, "06:00", "10:00")];
        assert_eq!(matching_rules(&rules, "delhi", 150.0, at(6, 0)).len(), 1);
        assert_eq!(matching_rules(&rules, " DELHI ", 150.0, at(10, 0)).len(), 1);
        assert!(matching_rules(&rules, "Mumbai", 300.0, at(7, 0)).is_empty());
        assert!(matching_rules(&rules, "Delhi", f64::NAN, at(7, 0)).is_empty());
    }

    #[test]
    fn test_overnight_and_malformed_windows_never_match() {
        let rules = vec![
            rule("Delhi", 100.0, "22:00", "06:00"),
            rule("Delhi", 100.0, "bad", "10:00"),
        ];
        assert!(matching_rules(&rules, "Delhi", 200.0, at(23, 0)).is_empty());
        assert!(matching_rules(&rules, "Delhi", 200.0, at(8, 0)).is_empty());
    }

    #[test]
    fn test_fire_policy_parse() {
        assert_eq!(FirePolicy::parse("once-per-day"), Some(FirePolicy::OncePerDay));
        assert_eq!(FirePolicy::parse("EVERY-CHECK"), Some(FirePolicy::EveryCheck));
        assert_eq!(FirePolicy::parse("sometimes"), None);
        assert_eq!(FirePolicy::default(), FirePolicy::OncePerDay);
    }

    struct RecordingNotifier {
        permission: Mutex<Permission>,
        grant_on_request: bool,
        requests: Mutex<usize>,
        sent: Mutex<Vec<String>>,
    }

    impl RecordingNotifier {
        fn new(permission: Permission, grant_on_request: bool) -> Self {
            Self {
                permission: Mutex::new(permission),
                grant_on_request,
                requests: Mutex::new(0),
                sent: Mutex::new(Vec::new()),
            }
        }
    }

    impl Notifier for RecordingNotifier {
        fn permission(&self) -> Permission {
            *self.permission.lock().unwrap()
        }

        fn request_permission(&self) -> Permission {
            *self.requests.lock().unwrap() += 1;
            let answer = if self.grant_on_request {
                Permission::Granted
            } else {
                Permission::Denied
            };
            *self.permission.lock().unwrap() = answer;
            answer
        }

        fn notify(&self, title: &str, _body: &str) {
            self.sent.lock().unwrap().push(title.to_string());
        }
    }

    fn monitor_with(
        notifier: RecordingNotifier,
        policy: FirePolicy,
    ) -> (tempfile::TempDir, AlertMonitor<RecordingNotifier>) {
        let dir = tempdir().unwrap();
        let rules = AlertRuleStore::new(LocalStore::open(dir.path().join("state.json")));
        rules.add(rule("Delhi", 150.0, "06:00", "10:00")).unwrap();
        (dir, AlertMonitor::new(rules, notifier, policy))
    }

    fn morning(day: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 11, day)
            .unwrap()
            .and_hms_opt(7, 30, 0)
            .unwrap()
    }

    #[test]
    fn test_once_per_day_suppresses_refire() {
        let (_dir, monitor) = monitor_with(
            RecordingNotifier::new(Permission::Granted, true),
            FirePolicy::OncePerDay,
        );

        assert_eq!(monitor.check("Delhi", Some(160.0), morning(5)).unwrap().len(), 1);
        assert!(monitor.check("Delhi", Some(170.0), morning(5)).unwrap().is_empty());
        assert_eq!(monitor.check("Delhi", Some(160.0), morning(6)).unwrap().len(), 1);
        assert_eq!(monitor.notifier.sent.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_concurrent_checks_fire_once_per_day() {
        let (_dir, monitor) = monitor_with(
            RecordingNotifier::new(Permission::Granted, true),
            FirePolicy::OncePerDay,
        );

        let monitor = &monitor;
        let fired: usize = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    scope.spawn(move || monitor.check("Delhi", Some(180.0), morning(5)).unwrap())
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap().len()).sum()
        });

        assert_eq!(fired, 1);
        assert_eq!(monitor.notifier.sent.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_every_check_refires() {
        let (_dir, monitor) = monitor_with(
            RecordingNotifier::new(Permission::Granted, true),
            FirePolicy::EveryCheck,
        );
        monitor.check("Delhi", Some(160.0), morning(5)).unwrap();
        monitor.check("Delhi", Some(160.0), morning(5)).unwrap();
        assert_eq!(monitor.notifier.sent.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_denied_permission_is_silent() {
        let (_dir, monitor) = monitor_with(
            RecordingNotifier::new(Permission::Default, false),
            FirePolicy::EveryCheck,
        );
        assert!(monitor.check("Delhi", Some(160.0), morning(5)).unwrap().is_empty());
        assert!(monitor.check("Delhi", Some(160.0), morning(5)).unwrap().is_empty());
        assert_eq!(*monitor.notifier.requests.lock().unwrap(), 1);
        assert!(monitor.notifier.sent.lock().unwrap().is_empty());
    }

    #[test]
    fn test_permission_granted_on_request() {
        let (_dir, monitor) = monitor_with(
            RecordingNotifier::new(Permission::Default, true),
            FirePolicy::EveryCheck,
        );
        assert_eq!(monitor.check("Delhi", Some(160.0), morning(5)).unwrap().len(), 1);
    }

    #[test]
    fn test_missing_aqi_never_fires() {
        let (_dir, monitor) = monitor_with(
            RecordingNotifier::new(Permission::Granted, true),
            FirePolicy::EveryCheck,
        );
        assert!(monitor.check("Delhi", None, morning(5)).unwrap().is_empty());
    }
}
