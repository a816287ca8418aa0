//! Typed client for the air-quality backend.
//!
//! Each method maps to one backend endpoint. Inputs are validated before a
//! request is made. Authenticated calls attach `Authorization: Bearer` from
//! the session store; a `401` on such a call clears the session and returns
//! [`FetchError::Unauthorized`].

use std::time::Duration;

use reqwest::{Client, RequestBuilder, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::{debug, error, instrument, warn};

use crate::fetch_error::FetchError;
use crate::models::{
    AlertAck, AlertChannel, AlertRule, AnalyticsSeries, AqiReading, AuthResponse, BestWorstTimes,
    ChatReply, CityList, CityStations, CompareResponse, DailySummaryRequest, FavoriteEntry,
    FavoritesResponse, MigrationAdvice, MultiCityComparison, PollutantInputs, Prediction, Profile,
    SafeZones, SatelliteReading, SeasonalTrends, ShareChannel, ShareReceipt, ShareRequest,
    YearlyComparison,
};
use crate::store::SessionStore;
use crate::utils::{is_valid_email, is_valid_phone};

pub const MAX_COMPARED_CITIES: usize = 5;

#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    session: Option<SessionStore>,
}

impl ApiClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            session: None,
        })
    }

    /// Client without a request timeout, mainly for tests against a mock server.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            session: None,
        }
    }

    pub fn with_session(mut self, session: SessionStore) -> Self {
        self.session = Some(session);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn session(&self) -> Option<&SessionStore> {
        self.session.as_ref()
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// `path` followed by one percent-encoded segment.
    fn segment_url(&self, path: &str, segment: &str) -> Result<Url, FetchError> {
        let mut url = Url::parse(&self.url(path))
            .map_err(|e| FetchError::InvalidInput(format!("invalid backend URL: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| FetchError::InvalidInput("backend URL cannot take a path".to_string()))?
            .pop_if_empty()
            .push(segment);
        Ok(url)
    }

    fn bearer_token(&self) -> Result<String, FetchError> {
        self.session
            .as_ref()
            .and_then(SessionStore::token)
            .ok_or(FetchError::LoginRequired)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, FetchError> {
        let response = request.send().await?;
        let status = response.status();
        debug!("Received HTTP response with status: {}", status);
        let body = response.text().await?;

        if !status.is_success() {
            return Err(status_error(status, &body));
        }
        Ok(serde_json::from_str(&body)?)
    }

    async fn send_authenticated<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<T, FetchError> {
        let token = self.bearer_token()?;
        match self.send(request.bearer_auth(token)).await {
            Err(FetchError::Status { status: 401, .. }) => {
                warn!("Backend rejected the session token, logging out");
                if let Some(session) = &self.session {
                    if let Err(e) = session.clear() {
                        error!("Failed to clear the rejected session: {}", e);
                    }
                }
                Err(FetchError::Unauthorized)
            }
            other => other,
        }
    }

    #[instrument(skip(self), fields(base_url = %self.base_url))]
    pub async fn cities(&self) -> Result<Vec<String>, FetchError> {
        self.send(self.client.get(self.url("/cities"))).await
    }

    #[instrument(skip(self), fields(base_url = %self.base_url))]
    pub async fn cities_all(&self) -> Result<CityList, FetchError> {
        self.send(self.client.get(self.url("/cities/all"))).await
    }

    #[instrument(skip(self), fields(base_url = %self.base_url))]
    pub async fn cities_available(&self) -> Result<CityList, FetchError> {
        self.send(self.client.get(self.url("/cities/available"))).await
    }

    #[instrument(skip(self), fields(base_url = %self.base_url))]
    pub async fn live_aqi(&self, city: &str) -> Result<AqiReading, FetchError> {
        let city = require_city(city)?;
        self.send(self.client.get(self.url("/live/aqi")).query(&[("city", city)]))
            .await
    }

    #[instrument(skip(self), fields(base_url = %self.base_url))]
    pub async fn city_stations(&self, city: &str) -> Result<CityStations, FetchError> {
        let city = require_city(city)?;
        self.send(
            self.client
                .get(self.url("/live/aqi/stations"))
                .query(&[("city", city)]),
        )
        .await
    }

    #[instrument(skip(self), fields(base_url = %self.base_url))]
    pub async fn satellite_live(&self, city: &str) -> Result<SatelliteReading, FetchError> {
        let city = require_city(city)?;
        self.send(
            self.client
                .get(self.url("/satellite/live"))
                .query(&[("city", city)]),
        )
        .await
    }

    #[instrument(skip(self), fields(base_url = %self.base_url))]
    pub async fn satellite_map(&self) -> Result<Vec<SatelliteReading>, FetchError> {
        self.send(self.client.get(self.url("/satellite/map"))).await
    }

    #[instrument(skip(self), fields(base_url = %self.base_url))]
    pub async fn analytics(&self, city: &str) -> Result<AnalyticsSeries, FetchError> {
        let city = require_city(city)?;
        self.send(self.client.get(self.url("/analytics")).query(&[("city", city)]))
            .await
    }

    #[instrument(skip(self), fields(base_url = %self.base_url))]
    pub async fn compare(&self, city1: &str, city2: &str) -> Result<CompareResponse, FetchError> {
        let city1 = require_city(city1)?;
        let city2 = require_city(city2)?;
        if city1.eq_ignore_ascii_case(city2) {
            return Err(FetchError::InvalidInput(
                "Please choose two different cities".to_string(),
            ));
        }
        self.send(
            self.client
                .get(self.url("/compare"))
                .query(&[("city1", city1), ("city2", city2)]),
        )
        .await
    }

    #[instrument(skip(self), fields(base_url = %self.base_url))]
    pub async fn yearly_comparison(&self, city: &str) -> Result<YearlyComparison, FetchError> {
        let url = self.segment_url("/api/historical/yearly-comparison", require_city(city)?)?;
        self.send(self.client.get(url)).await
    }

    #[instrument(skip(self), fields(base_url = %self.base_url))]
    pub async fn seasonal_trends(&self, city: &str) -> Result<SeasonalTrends, FetchError> {
        let url = self.segment_url("/api/historical/seasonal-trends", require_city(city)?)?;
        self.send(self.client.get(url)).await
    }

    #[instrument(skip(self), fields(base_url = %self.base_url))]
    pub async fn best_worst_times(&self, city: &str) -> Result<BestWorstTimes, FetchError> {
        let url = self.segment_url("/api/historical/best-worst-times", require_city(city)?)?;
        self.send(self.client.get(url)).await
    }

    #[instrument(skip(self), fields(base_url = %self.base_url))]
    pub async fn predict(&self, inputs: &PollutantInputs) -> Result<Prediction, FetchError> {
        inputs.validate()?;
        self.send(
            self.client
                .get(self.url("/predict"))
                .query(&inputs.query_pairs()[..]),
        )
        .await
    }

    /// Failed logins surface the backend's `detail` verbatim and are never retried.
    #[instrument(skip(self, password), fields(base_url = %self.base_url))]
    pub async fn login(&self, email: &str, password: &str) -> Result<AuthResponse, FetchError> {
        require_credentials(email, password)?;
        self.send(
            self.client
                .post(self.url("/api/auth/login"))
                .json(&json!({ "email": email.trim(), "password": password })),
        )
        .await
    }

    #[instrument(skip(self, password), fields(base_url = %self.base_url))]
    pub async fn register(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<AuthResponse, FetchError> {
        require_credentials(email, password)?;
        if name.trim().is_empty() {
            return Err(FetchError::InvalidInput("Name is required".to_string()));
        }
        self.send(self.client.post(self.url("/api/auth/register")).json(&json!({
            "name": name.trim(),
            "email": email.trim(),
            "password": password,
        })))
        .await
    }

    /// Exchange an identity-provider access token for a backend session.
    #[instrument(skip(self, access_token, user), fields(base_url = %self.base_url))]
    pub async fn supabase_callback(
        &self,
        access_token: &str,
        user: &Value,
    ) -> Result<AuthResponse, FetchError> {
        if access_token.trim().is_empty() {
            return Err(FetchError::InvalidInput(
                "Access token is required".to_string(),
            ));
        }
        self.send(
            self.client
                .post(self.url("/api/auth/supabase-callback"))
                .json(&json!({ "access_token": access_token, "user": user })),
        )
        .await
    }

    #[instrument(skip(self), fields(base_url = %self.base_url))]
    pub async fn profile(&self) -> Result<Profile, FetchError> {
        self.send_authenticated(self.client.get(self.url("/api/auth/me")))
            .await
    }

    #[instrument(skip(self), fields(base_url = %self.base_url))]
    pub async fn favorites(&self) -> Result<Vec<FavoriteEntry>, FetchError> {
        let response: FavoritesResponse = self
            .send_authenticated(self.client.get(self.url("/api/favorites")))
            .await?;
        Ok(response.favorites)
    }

    #[instrument(skip(self), fields(base_url = %self.base_url))]
    pub async fn add_favorite(&self, city: &str) -> Result<(), FetchError> {
        let url = self.segment_url("/api/favorites", require_city(city)?)?;
        let _: Value = self.send_authenticated(self.client.post(url)).await?;
        Ok(())
    }

    #[instrument(skip(self), fields(base_url = %self.base_url))]
    pub async fn remove_favorite(&self, city: &str) -> Result<(), FetchError> {
        let url = self.segment_url("/api/favorites", require_city(city)?)?;
        let _: Value = self.send_authenticated(self.client.delete(url)).await?;
        Ok(())
    }

    #[instrument(skip(self, rule), fields(base_url = %self.base_url, city = %rule.city))]
    pub async fn create_alert(&self, rule: &AlertRule) -> Result<AlertAck, FetchError> {
        require_city(&rule.city)?;
        self.send(self.client.post(self.url("/alerts")).json(rule))
            .await
    }

    #[instrument(skip(self, request), fields(base_url = %self.base_url, city = %request.city))]
    pub async fn subscribe_daily_summary(
        &self,
        request: &DailySummaryRequest,
    ) -> Result<Value, FetchError> {
        require_city(&request.city)?;
        if request.time.trim().is_empty() {
            return Err(FetchError::InvalidInput(
                "Please fill city, time and contact".to_string(),
            ));
        }
        validate_contact(request.channel, &request.contact)?;
        self.send(
            self.client
                .post(self.url("/subscribe_daily_summary"))
                .json(request),
        )
        .await
    }

    #[instrument(skip(self, request), fields(base_url = %self.base_url))]
    pub async fn share(&self, request: &ShareRequest) -> Result<ShareReceipt, FetchError> {
        match request.channel {
            ShareChannel::Email => {
                let email = request.email.as_deref().unwrap_or_default();
                if !is_valid_email(email) {
                    return Err(FetchError::InvalidInput(
                        "A valid email is required for the email channel".to_string(),
                    ));
                }
            }
            ShareChannel::Whatsapp => {
                let phone = request.phone.as_deref().unwrap_or_default();
                if !is_valid_phone(phone) {
                    return Err(FetchError::InvalidInput(
                        "A valid phone number is required for WhatsApp".to_string(),
                    ));
                }
            }
        }
        self.send(self.client.post(self.url("/share")).json(request))
            .await
    }

    #[instrument(skip(self), fields(base_url = %self.base_url))]
    pub async fn chatbot_query(&self, query: &str) -> Result<ChatReply, FetchError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(FetchError::InvalidInput("Please type a question".to_string()));
        }
        self.send(
            self.client
                .post(self.url("/api/chatbot/query"))
                .json(&json!({ "query": query })),
        )
        .await
    }

    #[instrument(skip(self), fields(base_url = %self.base_url))]
    pub async fn compare_multi_city(
        &self,
        cities: &[String],
    ) -> Result<MultiCityComparison, FetchError> {
        let cities: Vec<&str> = cities
            .iter()
            .map(|c| c.trim())
            .filter(|c| !c.is_empty())
            .collect();
        if cities.len() < 2 || cities.len() > MAX_COMPARED_CITIES {
            return Err(FetchError::InvalidInput(format!(
                "Choose between 2 and {MAX_COMPARED_CITIES} cities"
            )));
        }
        self.send(
            self.client
                .post(self.url("/api/compare/multi-city"))
                .json(&cities),
        )
        .await
    }

    /// Cities whose current AQI is below `threshold`.
    #[instrument(skip(self), fields(base_url = %self.base_url))]
    pub async fn safe_zones(&self, threshold: u32) -> Result<SafeZones, FetchError> {
        if threshold == 0 {
            return Err(FetchError::InvalidInput(
                "Threshold must be greater than zero".to_string(),
            ));
        }
        self.send(
            self.client
                .get(self.url("/api/location/safe-zones"))
                .query(&[("threshold", threshold)]),
        )
        .await
    }

    #[instrument(skip(self), fields(base_url = %self.base_url))]
    pub async fn migration_advisor(
        &self,
        current_city: &str,
        max_results: Option<usize>,
    ) -> Result<MigrationAdvice, FetchError> {
        let current_city = require_city(current_city)?;
        let mut query = vec![("current_city", current_city.to_string())];
        if let Some(max) = max_results {
            query.push(("max_results", max.to_string()));
        }
        self.send(
            self.client
                .get(self.url("/api/compare/migration-advisor"))
                .query(&query),
        )
        .await
    }
}

fn require_city(city: &str) -> Result<&str, FetchError> {
    let city = city.trim();
    if city.is_empty() {
        return Err(FetchError::InvalidInput("City name is required".to_string()));
    }
    Ok(city)
}

fn require_credentials(email: &str, password: &str) -> Result<(), FetchError> {
    if email.trim().is_empty() || password.is_empty() {
        return Err(FetchError::InvalidInput(
            "Email and password are required".to_string(),
        ));
    }
    Ok(())
}

pub(crate) fn validate_contact(channel: AlertChannel, contact: &str) -> Result<(), FetchError> {
    let contact = contact.trim();
    let valid = match channel {
        AlertChannel::Email => is_valid_email(contact),
        AlertChannel::Whatsapp => is_valid_phone(contact),
        AlertChannel::Telegram | AlertChannel::Browser => !contact.is_empty(),
    };
    if valid {
        Ok(())
    } else {
        Err(FetchError::InvalidInput(format!(
            "Invalid contact for the {channel:?} channel"
        )))
    }
}

/// Builds a status error, preferring the backend's `detail` message.
fn status_error(status: StatusCode, body: &str) -> FetchError {
    let detail = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| match v.get("detail") {
            Some(Value::String(s)) => Some(s.clone()),
            Some(other) if !other.is_null() => Some(other.to_string()),
            _ => None,
        })
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("Request failed")
                .to_string()
        });
    FetchError::Status {
        status: status.as_u16(),
        detail,
    }
}
