use futures::stream::{self, StreamExt};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, info, instrument, warn};

use crate::aggregation::{
    rank_by_aqi, CategoryTally, HasAqi, Ranked, RepresentativeStationPolicy, SortDirection,
};
use crate::api::ApiClient;
use crate::category::classify;
use crate::fetch_error::FetchError;
use crate::models::{City, SafeZone, Station};

/// Concurrent station lookups while building the city ranking.
const RANKING_CONCURRENCY: usize = 8;

#[derive(Debug, Clone, Serialize)]
pub struct CityStanding {
    pub name: String,
    pub aqi: Option<f64>,
    /// Station that set the city's AQI under the max policy.
    pub station: Option<String>,
}

impl HasAqi for CityStanding {
    fn aqi(&self) -> Option<f64> {
        self.aqi
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CityRanking {
    pub direction_descending: bool,
    pub entries: Vec<Ranked<CityStanding>>,
    pub tally: CategoryTally,
    /// Cities left out for lack of a valid AQI.
    pub unranked: Vec<String>,
}

impl CityRanking {
    pub fn share_payload(&self) -> Value {
        let items: Vec<Value> = self
            .entries
            .iter()
            .map(|r| {
                json!({
                    "rank": r.rank,
                    "city": r.item.name,
                    "aqi": r.aqi,
                    "category": classify(Some(r.aqi)).label,
                })
            })
            .collect();
        json!({ "items": items })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StationRanking {
    pub city: String,
    pub station_count: usize,
    pub representative_aqi: Option<f64>,
    pub entries: Vec<Ranked<Station>>,
}

#[derive(Clone)]
pub struct RankingService {
    api: ApiClient,
    policy: RepresentativeStationPolicy,
}

impl RankingService {
    pub fn new(api: ApiClient, policy: RepresentativeStationPolicy) -> Self {
        Self { api, policy }
    }

    /// Ranks every available city by its representative station AQI.
    /// When a city's stations cannot be fetched its listed AQI is used.
    #[instrument(skip(self))]
    pub async fn city_ranking(&self, direction: SortDirection) -> Result<CityRanking, FetchError> {
        let cities = self.api.cities_available().await?.cities;
        info!("Ranking {} cities", cities.len());

        let standings: Vec<CityStanding> = stream::iter(cities)
            .map(|city| async move { self.standing(city).await })
            .buffered(RANKING_CONCURRENCY)
            .collect()
            .await;

        let tally = CategoryTally::from_values(standings.iter().map(|s| s.aqi));
        let unranked = standings
            .iter()
            .filter(|s| s.aqi.is_none())
            .map(|s| s.name.clone())
            .collect();
        let entries = rank_by_aqi(standings, direction);

        Ok(CityRanking {
            direction_descending: direction == SortDirection::Descending,
            entries,
            tally,
            unranked,
        })
    }

    async fn standing(&self, city: City) -> CityStanding {
        match self.api.city_stations(&city.name).await {
            Ok(found) => {
                let aqi = self.policy.representative_aqi(&found.stations).or(city.aqi);
                let station = match self.policy {
                    RepresentativeStationPolicy::Max => {
                        RepresentativeStationPolicy::representative_station(&found.stations)
                            .map(|s| s.station_name.clone())
                    }
                    RepresentativeStationPolicy::Mean => None,
                };
                debug!("{}: representative AQI {:?}", city.name, aqi);
                CityStanding {
                    name: city.name,
                    aqi,
                    station,
                }
            }
            Err(e) => {
                warn!("Using listed AQI for {}: {}", city.name, e);
                CityStanding {
                    name: city.name,
                    aqi: city.aqi,
                    station: None,
                }
            }
        }
    }

    /// Cities below `threshold`, cleanest first. Entries at or above the
    /// threshold or without a valid AQI are dropped.
    #[instrument(skip(self))]
    pub async fn safe_zones(&self, threshold: u32) -> Result<Vec<Ranked<SafeZone>>, FetchError> {
        let zones: Vec<SafeZone> = self
            .api
            .safe_zones(threshold)
            .await?
            .safe_zones
            .into_iter()
            .filter(|z| z.aqi.is_some_and(|aqi| aqi < f64::from(threshold)))
            .collect();
        info!("{} safe zones below AQI {}", zones.len(), threshold);
        Ok(rank_by_aqi(zones, SortDirection::Ascending))
    }

    /// Stations of one city, ranked.
    #[instrument(skip(self))]
    pub async fn station_ranking(
        &self,
        city: &str,
        direction: SortDirection,
    ) -> Result<StationRanking, FetchError> {
        let found = self.api.city_stations(city).await?;
        let representative_aqi = self.policy.representative_aqi(&found.stations);
        let station_count = found.station_count.max(found.stations.len());
        Ok(StationRanking {
            city: if found.city.is_empty() {
                city.trim().to_string()
            } else {
                found.city
            },
            station_count,
            representative_aqi,
            entries: rank_by_aqi(found.stations, direction),
        })
    }
}
