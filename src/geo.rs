//! Great-circle distance and the nearby-station selection used by the
//! "stations near me" view.

use std::cmp::Ordering;
use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::models::{City, Station};

pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Cities are pre-filtered at this multiple of the search radius, since a
/// station can sit far from its city's nominal centre and still be close to
/// the user.
pub const CITY_SEARCH_FACTOR: f64 = 3.0;

/// Stations whose distances differ by at most this much are ordered by AQI
/// (worst first) instead of by distance.
pub const CO_LOCATED_KM: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinates {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }

    pub fn distance_km(&self, other: &Coordinates) -> f64 {
        haversine_km(self.lat, self.lng, other.lat, other.lng)
    }
}

/// Haversine distance in kilometres.
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();

    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2);

    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_KM * c
}

#[derive(Debug, Clone, Serialize)]
pub struct NearbyStation {
    pub station: Station,
    pub coordinates: Coordinates,
    pub aqi: f64,
    /// Rounded to two decimals, matching what is displayed.
    pub distance_km: f64,
}

/// Result of a nearby search that reached the backend. Empty outcomes are
/// distinct from transport errors, which surface as `Err` from the service.
#[derive(Debug, Clone)]
pub enum NearbyOutcome {
    Found(Vec<NearbyStation>),
    NoCandidateCities,
    NoStationsInRadius,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum StationKey {
    Uid(i64),
    Name(String),
    Position(u64, u64),
}

fn station_key(station: &Station, coords: &Coordinates) -> StationKey {
    if let Some(uid) = station.uid {
        return StationKey::Uid(uid);
    }
    if !station.station_name.is_empty() {
        return StationKey::Name(station.station_name.clone());
    }
    StationKey::Position(coords.lat.to_bits(), coords.lng.to_bits())
}

/// Cities whose centre lies within `CITY_SEARCH_FACTOR * radius_km` of the
/// user. Cities without coordinates are dropped.
pub fn candidate_cities(user: Coordinates, radius_km: f64, cities: &[City]) -> Vec<City> {
    let search_radius = radius_km * CITY_SEARCH_FACTOR;
    cities
        .iter()
        .filter(|c| {
            c.coordinates()
                .map(|coords| user.distance_km(&coords) <= search_radius)
                .unwrap_or(false)
        })
        .cloned()
        .collect()
}

/// Filter, deduplicate, and order stations around `user`.
///
/// Stations without valid coordinates or a finite AQI are dropped. Duplicates
/// are detected by uid, then name, then position; the first one seen wins.
/// Deduplication happens before the radius check so a station reported twice
/// is only ever considered once.
pub fn select_nearby(
    user: Coordinates,
    radius_km: f64,
    stations: Vec<Station>,
) -> Vec<NearbyStation> {
    let mut seen = HashSet::new();
    let mut nearby = Vec::new();

    for station in stations {
        let Some(coordinates) = station.position() else {
            continue;
        };
        let Some(aqi) = station.aqi.filter(|v| v.is_finite()) else {
            continue;
        };

        if !seen.insert(station_key(&station, &coordinates)) {
            continue;
        }

        let distance_km = round_to(user.distance_km(&coordinates), 2);
        if distance_km > radius_km {
            continue;
        }

        nearby.push(NearbyStation {
            station,
            coordinates,
            aqi,
            distance_km,
        });
    }

    order_by_proximity(&mut nearby);
    nearby
}

/// Sort ascending by distance; runs of stations within `CO_LOCATED_KM` of the
/// first station in the run are ordered by descending AQI.
fn order_by_proximity(stations: &mut [NearbyStation]) {
    stations.sort_by(|a, b| a.distance_km.total_cmp(&b.distance_km));

    let mut start = 0;
    while start < stations.len() {
        let anchor = stations[start].distance_km;
        let mut end = start + 1;
        while end < stations.len() && stations[end].distance_km - anchor <= CO_LOCATED_KM {
            end += 1;
        }
        stations[start..end].sort_by(|a, b| b.aqi.partial_cmp(&a.aqi).unwrap_or(Ordering::Equal));
        start = end;
    }
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::StationCoordinates;

    const DELHI: Coordinates = Coordinates {
        lat: 28.6139,
        lng: 77.2090,
    };

    /// Point `km` kilometres due north of `origin`.
    fn north_of(origin: Coordinates, km: f64) -> Coordinates {
        Coordinates::new(origin.lat + (km / EARTH_RADIUS_KM).to_degrees(), origin.lng)
    }

    fn station(name: &str, uid: Option<i64>, aqi: Option<f64>, at: Option<Coordinates>) -> Station {
        Station {
            station_name: name.to_string(),
            aqi,
            uid,
            coordinates: at.map(|c| StationCoordinates {
                lat: Some(c.lat),
                lng: Some(c.lng),
            }),
            ..Station::default()
        }
    }

    #[test]
    fn test_haversine_zero_for_same_point() {
        assert_eq!(haversine_km(28.6139, 77.2090, 28.6139, 77.2090), 0.0);
    }

    #[test]
    fn test_haversine_delhi_mumbai() {
        let d = haversine_km(28.6139, 77.2090, 19.0760, 72.8777);
        assert!(d > 1150.0 && d < 1160.0, "got {d}");
    }

    #[test]
    fn test_radius_boundary() {
        let far = station("Far", Some(1), Some(90.0), Some(north_of(DELHI, 20.0)));
        assert!(select_nearby(DELHI, 15.0, vec![far]).is_empty());

        let near = station("Near", Some(2), Some(90.0), Some(north_of(DELHI, 14.9)));
        let result = select_nearby(DELHI, 15.0, vec![near]);
        assert_eq!(result.len(), 1);
        assert!((result[0].distance_km - 14.9).abs() < 0.01);
    }

    #[test]
    fn test_co_located_stations_order_by_worst_aqi() {
        let a = station("A", Some(1), Some(80.0), Some(north_of(DELHI, 3.0)));
        let b = station("B", Some(2), Some(120.0), Some(north_of(DELHI, 3.2)));
        let result = select_nearby(DELHI, 15.0, vec![a, b]);
        let aqis: Vec<f64> = result.iter().map(|s| s.aqi).collect();
        assert_eq!(aqis, vec![120.0, 80.0]);
    }

    #[test]
    fn test_distant_stations_order_by_distance() {
        let a = station("A", Some(1), Some(40.0), Some(north_of(DELHI, 2.0)));
        let b = station("B", Some(2), Some(300.0), Some(north_of(DELHI, 6.0)));
        let result = select_nearby(DELHI, 15.0, vec![b, a]);
        let names: Vec<&str> = result.iter().map(|s| s.station.station_name.as_str()).collect();
        assert_eq!(names, vec!["A", "B"]);
    }

    #[test]
    fn test_invalid_stations_are_dropped() {
        let no_aqi = station("NoAqi", Some(1), None, Some(north_of(DELHI, 1.0)));
        let no_coords = station("NoCoords", Some(2), Some(50.0), None);
        let nan = station("Nan", Some(3), Some(f64::NAN), Some(north_of(DELHI, 1.0)));
        assert!(select_nearby(DELHI, 15.0, vec![no_aqi, no_coords, nan]).is_empty());
    }

    #[test]
    fn test_dedup_first_occurrence_wins() {
        let first = station("Same", Some(7), Some(60.0), Some(north_of(DELHI, 1.0)));
        let second = station("Same again", Some(7), Some(200.0), Some(north_of(DELHI, 1.0)));
        let by_name_a = station("Shared name", None, Some(30.0), Some(north_of(DELHI, 4.0)));
        let by_name_b = station("Shared name", None, Some(31.0), Some(north_of(DELHI, 4.0)));

        let result = select_nearby(DELHI, 15.0, vec![first, second, by_name_a, by_name_b]);
        assert_eq!(result.len(), 2);
        assert_eq!(result[0].aqi, 60.0);
        assert_eq!(result[1].aqi, 30.0);
    }

    #[test]
    fn test_candidate_cities_use_tripled_radius() {
        let cities = vec![
            City::named("Close", Some(north_of(DELHI, 40.0))),
            City::named("Too far", Some(north_of(DELHI, 50.0))),
            City::named("Nowhere", None),
        ];
        let candidates = candidate_cities(DELHI, 15.0, &cities);
        let names: Vec<&str> = candidates.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Close"]);
    }
}
