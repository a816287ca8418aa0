use futures::future::join_all;
use tracing::{debug, info, instrument, warn};

use crate::api::ApiClient;
use crate::fetch_error::FetchError;
use crate::geo::{candidate_cities, select_nearby, Coordinates, NearbyOutcome};
use crate::models::Station;

#[derive(Clone)]
pub struct NearbyService {
    api: ApiClient,
    radius_km: f64,
}

impl NearbyService {
    pub fn new(api: ApiClient, radius_km: f64) -> Self {
        Self { api, radius_km }
    }

    pub fn radius_km(&self) -> f64 {
        self.radius_km
    }

    pub async fn find_nearby(&self, user: Coordinates) -> Result<NearbyOutcome, FetchError> {
        self.find_nearby_within(user, self.radius_km).await
    }

    /// Stations within `radius_km` of `user`.
    ///
    /// Only the city list can fail the search. Station lookups run
    /// concurrently and a failed city contributes no stations.
    #[instrument(skip(self), fields(lat = user.lat, lng = user.lng))]
    pub async fn find_nearby_within(
        &self,
        user: Coordinates,
        radius_km: f64,
    ) -> Result<NearbyOutcome, FetchError> {
        if !user.is_valid() {
            return Err(FetchError::InvalidInput(
                "Location coordinates are out of range".to_string(),
            ));
        }
        if !radius_km.is_finite() || radius_km <= 0.0 {
            return Err(FetchError::InvalidInput(
                "Radius must be a positive number of kilometres".to_string(),
            ));
        }

        let cities = self.api.cities_all().await?.cities;
        let candidates = candidate_cities(user, radius_km, &cities);
        info!(
            "{} of {} cities within the {} km search area",
            candidates.len(),
            cities.len(),
            radius_km * crate::geo::CITY_SEARCH_FACTOR
        );
        if candidates.is_empty() {
            return Ok(NearbyOutcome::NoCandidateCities);
        }

        let lookups = candidates.iter().map(|city| async move {
            match self.api.city_stations(&city.name).await {
                Ok(found) => {
                    debug!("{} stations for {}", found.stations.len(), city.name);
                    found.stations
                }
                Err(e) => {
                    warn!("Skipping stations for {}: {}", city.name, e);
                    Vec::new()
                }
            }
        });
        let stations: Vec<Station> = join_all(lookups).await.into_iter().flatten().collect();

        let nearby = select_nearby(user, radius_km, stations);
        if nearby.is_empty() {
            return Ok(NearbyOutcome::NoStationsInRadius);
        }
        Ok(NearbyOutcome::Found(nearby))
    }
}
