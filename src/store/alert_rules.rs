use std::collections::BTreeMap;

use chrono::NaiveDate;
use tracing::{debug, warn};

use crate::models::AlertRule;
use crate::store::local_store::{ALERT_LAST_FIRED_KEY, ALERT_RULES_KEY};
use crate::store::{LocalStore, StoreError};

/// Alert rules defined on this machine, plus the per-rule last-fired dates
/// used by the once-per-day policy.
#[derive(Debug, Clone)]
pub struct AlertRuleStore {
    store: LocalStore,
}

impl AlertRuleStore {
    pub fn new(store: LocalStore) -> Self {
        Self { store }
    }

    /// Stored rules. An unreadable list is treated as empty.
    pub fn list(&self) -> Result<Vec<AlertRule>, StoreError> {
        match self.store.get_json::<Vec<AlertRule>>(ALERT_RULES_KEY) {
            Ok(rules) => Ok(rules.unwrap_or_default()),
            Err(StoreError::Json(e)) => {
                warn!("Ignoring unreadable alert rules: {}", e);
                Ok(Vec::new())
            }
            Err(e) => Err(e),
        }
    }

    /// Appends a rule and returns the new list.
    pub fn add(&self, rule: AlertRule) -> Result<Vec<AlertRule>, StoreError> {
        let mut rules = self.list()?;
        rules.push(rule);
        self.store.set_json(ALERT_RULES_KEY, &rules)?;
        debug!("Stored {} alert rules", rules.len());
        Ok(rules)
    }

    pub fn clear(&self) -> Result<(), StoreError> {
        self.store.remove_many(&[ALERT_RULES_KEY, ALERT_LAST_FIRED_KEY])
    }

    pub fn last_fired(&self) -> Result<BTreeMap<String, NaiveDate>, StoreError> {
        match self.store.get_json(ALERT_LAST_FIRED_KEY) {
            Ok(map) => Ok(map.unwrap_or_default()),
            Err(StoreError::Json(e)) => {
                warn!("Ignoring unreadable alert history: {}", e);
                Ok(BTreeMap::new())
            }
            Err(e) => Err(e),
        }
    }

    pub fn record_fired(&self, rule_key: &str, date: NaiveDate) -> Result<(), StoreError> {
        let mut fired = self.last_fired()?;
        fired.insert(rule_key.to_string(), date);
        self.store.set_json(ALERT_LAST_FIRED_KEY, &fired)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AlertChannel;
    use tempfile::tempdir;

    fn rule(city: &str) -> AlertRule {
        AlertRule {
            city: city.to_string(),
            threshold: 150.0,
            start: "06:00".to_string(),
            end: "10:00".to_string(),
            channel: AlertChannel::Browser,
            contact: None,
        }
    }

    #[test]
    fn test_add_list_clear() {
        let dir = tempdir().unwrap();
        let rules = AlertRuleStore::new(LocalStore::open(dir.path().join("state.json")));
        assert!(rules.list().unwrap().is_empty());

        rules.add(rule("Delhi")).unwrap();
        let all = rules.add(rule("Mumbai")).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(rules.list().unwrap()[1].city, "Mumbai");

        let today = NaiveDate::from_ymd_opt(2024, 11, 5).unwrap();
        rules.record_fired("delhi", today).unwrap();
        assert_eq!(rules.last_fired().unwrap().get("delhi"), Some(&today));

        rules.clear().unwrap();
        assert!(rules.list().unwrap().is_empty());
        assert!(rules.last_fired().unwrap().is_empty());
    }

    #[test]
    fn test_unreadable_rules_read_as_empty() {
        let dir = tempdir().unwrap();
        let store = LocalStore::open(dir.path().join("state.json"));
        store.set(ALERT_RULES_KEY, "[{\"city\":").unwrap();
        assert!(AlertRuleStore::new(store).list().unwrap().is_empty());
    }
}
