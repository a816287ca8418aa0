use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, instrument};

use crate::api::ApiClient;
use crate::category::{classify, Category};
use crate::fetch_error::FetchError;
use crate::models::{AqiReading, SatelliteReading};

/// One refresh of the live view.
#[derive(Debug, Clone, Serialize)]
pub struct LiveSnapshot {
    pub query: String,
    pub reading: AqiReading,
    pub category: Category,
    /// Best-effort overlay; absent when the satellite source failed.
    pub satellite: Option<SatelliteReading>,
    pub fetched_at: DateTime<Utc>,
}

impl LiveSnapshot {
    pub fn share_payload(&self) -> Value {
        json!({
            "city": self.reading.city,
            "aqi": self.reading.aqi,
            "time": self.reading.time,
            "dominant_pollutant": self.reading.dominant_pollutant,
            "category": self.category.label,
        })
    }
}

#[derive(Clone)]
pub struct LiveService {
    api: ApiClient,
}

impl LiveService {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    /// Live reading for `city`, with the satellite overlay fetched alongside.
    /// Only the live reading can fail the call.
    #[instrument(skip(self))]
    pub async fn snapshot(
        &self,
        city: &str,
        with_satellite: bool,
    ) -> Result<LiveSnapshot, FetchError> {
        let (reading, satellite) = if with_satellite {
            let (reading, satellite) =
                tokio::join!(self.api.live_aqi(city), self.api.satellite_live(city));
            let satellite = match satellite {
                Ok(s) => Some(s),
                Err(e) => {
                    debug!("Satellite overlay unavailable for {}: {}", city, e);
                    None
                }
            };
            (reading?, satellite)
        } else {
            (self.api.live_aqi(city).await?, None)
        };

        let category = classify(reading.aqi);
        Ok(LiveSnapshot {
            query: city.trim().to_string(),
            reading,
            category,
            satellite,
            fetched_at: Utc::now(),
        })
    }

    #[instrument(skip(self))]
    pub async fn satellite_map(&self) -> Result<Vec<SatelliteReading>, FetchError> {
        self.api.satellite_map().await
    }
}
