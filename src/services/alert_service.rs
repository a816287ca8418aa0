use tracing::{info, instrument, warn};

use crate::api::{validate_contact, ApiClient};
use crate::fetch_error::FetchError;
use crate::models::{AlertChannel, AlertRule, DailySummaryRequest};
use crate::store::AlertRuleStore;
use crate::utils::parse_clock_minutes;

/// Local alert rules, mirrored to the backend so it can deliver the
/// non-browser channels.
#[derive(Clone)]
pub struct AlertService {
    api: ApiClient,
    rules: AlertRuleStore,
}

impl AlertService {
    pub fn new(api: ApiClient, rules: AlertRuleStore) -> Self {
        Self { api, rules }
    }

    pub fn rules(&self) -> &AlertRuleStore {
        &self.rules
    }

    /// Stores the rule locally, then mirrors it. A failed mirror is logged and
    /// does not undo the local rule.
    #[instrument(skip(self, rule), fields(city = %rule.city))]
    pub async fn add_rule(&self, rule: AlertRule) -> Result<Vec<AlertRule>, FetchError> {
        validate_rule(&rule)?;
        let rules = self.rules.add(rule.clone())?;
        info!("Alert rule saved for {} (threshold {})", rule.city, rule.threshold);

        match self.api.create_alert(&rule).await {
            Ok(ack) => info!("Rule mirrored to backend ({:?} rules stored)", ack.count),
            Err(e) => warn!("Could not mirror alert rule to backend: {}", e),
        }
        Ok(rules)
    }

    pub fn list(&self) -> Result<Vec<AlertRule>, FetchError> {
        Ok(self.rules.list()?)
    }

    pub fn clear(&self) -> Result<(), FetchError> {
        self.rules.clear()?;
        info!("Alert rules cleared");
        Ok(())
    }

    #[instrument(skip(self, request), fields(city = %request.city))]
    pub async fn subscribe_daily_summary(
        &self,
        request: &DailySummaryRequest,
    ) -> Result<(), FetchError> {
        if parse_clock_minutes(&request.time).is_none() {
            return Err(FetchError::InvalidInput(
                "Time must be in HH:MM format".to_string(),
            ));
        }
        self.api.subscribe_daily_summary(request).await?;
        info!("Subscribed to daily summary for {}", request.city);
        Ok(())
    }
}

pub fn validate_rule(rule: &AlertRule) -> Result<(), FetchError> {
    if rule.city.trim().is_empty() {
        return Err(FetchError::InvalidInput("City name is required".to_string()));
    }
    if !rule.threshold.is_finite() || rule.threshold < 0.0 {
        return Err(FetchError::InvalidInput(
            "Threshold must be a non-negative number".to_string(),
        ));
    }
    if parse_clock_minutes(&rule.start).is_none() || parse_clock_minutes(&rule.end).is_none() {
        return Err(FetchError::InvalidInput(
            "Start and end must be in HH:MM format".to_string(),
        ));
    }
    if rule.channel != AlertChannel::Browser {
        validate_contact(rule.channel, rule.contact.as_deref().unwrap_or_default())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule() -> AlertRule {
        AlertRule {
            city: "Delhi".to_string(),
            threshold: 150.0,
            start: "06:00".to_string(),
            end: "10:00".to_string(),
            channel: AlertChannel::Browser,
            contact: None,
        }
    }

    #[test]
    fn test_validate_rule() {
        assert!(validate_rule(&rule()).is_ok());
        assert!(validate_rule(&AlertRule {
            start: "6am".into(),
            ..rule()
        })
        .is_err());
        assert!(validate_rule(&AlertRule {
            threshold: -1.0,
            ..rule()
        })
        .is_err());
        assert!(validate_rule(&AlertRule {
            channel: AlertChannel::Email,
            ..rule()
        })
        .is_err());
        assert!(validate_rule(&AlertRule {
            channel: AlertChannel::Email,
            contact: Some("asha@example.in".into()),
            ..rule()
        })
        .is_ok());
    }
}
