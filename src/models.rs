//! Wire and domain types exchanged with the air-quality backend.
//!
//! The backend proxies several upstream providers and is loose about types:
//! AQI values arrive as numbers, numeric strings, `"-"`, `"N/A"` or null.
//! Every AQI field here goes through [`LenientAqi`] so that anything that is
//! not a finite, non-negative number becomes `None` ("no data") and never a
//! misleading zero.

use std::collections::BTreeMap;
use std::fmt;

use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::fetch_error::FetchError;
use crate::geo::Coordinates;

/// An AQI value that tolerates the backend's placeholder forms.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct LenientAqi(pub Option<f64>);

impl LenientAqi {
    fn from_f64(value: f64) -> Self {
        if value.is_finite() && value >= 0.0 {
            LenientAqi(Some(value))
        } else {
            LenientAqi(None)
        }
    }
}

impl<'de> Deserialize<'de> for LenientAqi {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct AqiVisitor;

        impl<'de> Visitor<'de> for AqiVisitor {
            type Value = LenientAqi;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a number, a numeric string, a placeholder string or null")
            }

            fn visit_f64<E>(self, value: f64) -> Result<LenientAqi, E>
            where
                E: de::Error,
            {
                Ok(LenientAqi::from_f64(value))
            }

            fn visit_i64<E>(self, value: i64) -> Result<LenientAqi, E>
            where
                E: de::Error,
            {
                Ok(LenientAqi::from_f64(value as f64))
            }

            fn visit_u64<E>(self, value: u64) -> Result<LenientAqi, E>
            where
                E: de::Error,
            {
                Ok(LenientAqi::from_f64(value as f64))
            }

            fn visit_str<E>(self, value: &str) -> Result<LenientAqi, E>
            where
                E: de::Error,
            {
                // "-" and "N/A" are the provider's "no reading" markers
                Ok(value
                    .trim()
                    .parse::<f64>()
                    .map(LenientAqi::from_f64)
                    .unwrap_or_default())
            }

            fn visit_bool<E>(self, _value: bool) -> Result<LenientAqi, E>
            where
                E: de::Error,
            {
                Ok(LenientAqi(None))
            }

            fn visit_none<E>(self) -> Result<LenientAqi, E>
            where
                E: de::Error,
            {
                Ok(LenientAqi(None))
            }

            fn visit_unit<E>(self) -> Result<LenientAqi, E>
            where
                E: de::Error,
            {
                Ok(LenientAqi(None))
            }

            fn visit_some<D>(self, deserializer: D) -> Result<LenientAqi, D::Error>
            where
                D: Deserializer<'de>,
            {
                deserializer.deserialize_any(AqiVisitor)
            }
        }

        deserializer.deserialize_any(AqiVisitor)
    }
}

/// `deserialize_with` adapter for a single lenient AQI field.
pub fn deserialize_aqi<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    LenientAqi::deserialize(deserializer).map(|v| v.0)
}

/// `deserialize_with` adapter for a parallel AQI array. Positions are kept so
/// they still line up with the matching `dates` array.
pub fn deserialize_aqi_series<'de, D>(deserializer: D) -> Result<Vec<Option<f64>>, D::Error>
where
    D: Deserializer<'de>,
{
    let values = Vec::<LenientAqi>::deserialize(deserializer)?;
    Ok(values.into_iter().map(|v| v.0).collect())
}

/// A pollutant reading. The live feed wraps values as `{"v": n}` while the
/// station feed flattens them to bare numbers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ComponentValue {
    Wrapped { v: f64 },
    Bare(f64),
    Other(Value),
}

impl ComponentValue {
    pub fn value(&self) -> Option<f64> {
        match self {
            ComponentValue::Wrapped { v } | ComponentValue::Bare(v) if v.is_finite() => Some(*v),
            _ => None,
        }
    }
}

pub type Components = BTreeMap<String, ComponentValue>;

/// Current city-level reading from `/live/aqi`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AqiReading {
    #[serde(default)]
    pub city: String,
    #[serde(default, deserialize_with = "deserialize_aqi")]
    pub aqi: Option<f64>,
    #[serde(default)]
    pub dominant_pollutant: Option<String>,
    #[serde(default)]
    pub components: Components,
    #[serde(default)]
    pub time: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StationCoordinates {
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lng: Option<f64>,
}

impl StationCoordinates {
    pub fn resolve(&self) -> Option<Coordinates> {
        let coords = Coordinates::new(self.lat?, self.lng?);
        coords.is_valid().then_some(coords)
    }
}

/// One monitoring station inside a city.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Station {
    #[serde(default)]
    pub station_name: String,
    #[serde(default, deserialize_with = "deserialize_aqi")]
    pub aqi: Option<f64>,
    #[serde(default)]
    pub uid: Option<i64>,
    #[serde(default)]
    pub time: Option<String>,
    #[serde(default)]
    pub components: Components,
    #[serde(default)]
    pub coordinates: Option<StationCoordinates>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl Station {
    pub fn position(&self) -> Option<Coordinates> {
        self.coordinates.as_ref().and_then(StationCoordinates::resolve)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CityStations {
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub station_count: usize,
    #[serde(default)]
    pub stations: Vec<Station>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct City {
    pub name: String,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lng: Option<f64>,
    #[serde(default, deserialize_with = "deserialize_aqi")]
    pub aqi: Option<f64>,
}

impl City {
    pub fn named(name: &str, coordinates: Option<Coordinates>) -> Self {
        City {
            name: name.to_string(),
            lat: coordinates.map(|c| c.lat),
            lng: coordinates.map(|c| c.lng),
            aqi: None,
        }
    }

    pub fn coordinates(&self) -> Option<Coordinates> {
        let coords = Coordinates::new(self.lat?, self.lng?);
        coords.is_valid().then_some(coords)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CityList {
    #[serde(default)]
    pub cities: Vec<City>,
    #[serde(default)]
    pub count: usize,
}

/// Model-derived reading from `/satellite/live` and `/satellite/map`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SatelliteReading {
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lng: Option<f64>,
    #[serde(default)]
    pub time: Option<String>,
    #[serde(default)]
    pub pm10: Option<f64>,
    #[serde(default)]
    pub pm2_5: Option<f64>,
    #[serde(default)]
    pub dust: Option<f64>,
    #[serde(default)]
    pub carbon_monoxide: Option<f64>,
    #[serde(default)]
    pub nitrogen_dioxide: Option<f64>,
    #[serde(default)]
    pub sulphur_dioxide: Option<f64>,
    #[serde(default)]
    pub ozone: Option<f64>,
    #[serde(default, deserialize_with = "deserialize_aqi")]
    pub us_aqi: Option<f64>,
    #[serde(default, deserialize_with = "deserialize_aqi")]
    pub european_aqi: Option<f64>,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub wind_speed: Option<f64>,
    #[serde(default)]
    pub wind_dir: Option<f64>,
}

/// Parallel `dates`/`aqi` arrays from `/analytics`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalyticsSeries {
    #[serde(default)]
    pub dates: Vec<String>,
    #[serde(default, deserialize_with = "deserialize_aqi_series")]
    pub aqi: Vec<Option<f64>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CitySeries {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub dates: Vec<String>,
    #[serde(default, deserialize_with = "deserialize_aqi_series")]
    pub aqi: Vec<Option<f64>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompareResponse {
    pub city1: CitySeries,
    pub city2: CitySeries,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Prediction {
    #[serde(default, deserialize_with = "deserialize_aqi")]
    pub predicted_aqi: Option<f64>,
    #[serde(default)]
    pub note: Option<String>,
}

/// Pollutant concentrations submitted to `/predict`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct PollutantInputs {
    pub pm25: f64,
    pub pm10: f64,
    pub no2: f64,
    pub so2: f64,
    pub co: f64,
    pub o3: f64,
}

impl PollutantInputs {
    /// Every input must be a finite, non-negative number.
    pub fn validate(&self) -> Result<(), FetchError> {
        let fields = [
            ("pm25", self.pm25),
            ("pm10", self.pm10),
            ("no2", self.no2),
            ("so2", self.so2),
            ("co", self.co),
            ("o3", self.o3),
        ];
        for (name, value) in fields {
            if !value.is_finite() || value < 0.0 {
                return Err(FetchError::InvalidInput(format!(
                    "{name} must be a non-negative number"
                )));
            }
        }
        Ok(())
    }

    pub fn query_pairs(&self) -> [(&'static str, String); 6] {
        [
            ("pm25", self.pm25.to_string()),
            ("pm10", self.pm10.to_string()),
            ("no2", self.no2.to_string()),
            ("so2", self.so2.to_string()),
            ("co", self.co.to_string()),
            ("o3", self.o3.to_string()),
        ]
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MonthlyPoint {
    pub year: i32,
    pub month: u32,
    #[serde(default, deserialize_with = "deserialize_aqi")]
    pub aqi: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct YearlyComparison {
    #[serde(default)]
    pub city: String,
    /// Keyed by year as sent by the backend (`"2021"`).
    #[serde(default)]
    pub yearly_averages: BTreeMap<String, f64>,
    #[serde(default)]
    pub monthly_data: Vec<MonthlyPoint>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SeasonStats {
    pub mean: f64,
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SeasonalTrends {
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub seasonal_trends: BTreeMap<crate::aggregation::Season, SeasonStats>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MonthAverage {
    pub month_name: String,
    #[serde(default, deserialize_with = "deserialize_aqi")]
    pub aqi: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BestWorstTimes {
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub best_months: Vec<MonthAverage>,
    #[serde(default)]
    pub worst_months: Vec<MonthAverage>,
    #[serde(default)]
    pub monthly_averages: Vec<MonthAverage>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CityComparisonEntry {
    pub city: String,
    #[serde(default, deserialize_with = "deserialize_aqi")]
    pub aqi: Option<f64>,
    #[serde(default)]
    pub pm25: Option<f64>,
    #[serde(default)]
    pub pm10: Option<f64>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MultiCityComparison {
    #[serde(default)]
    pub comparison: Vec<CityComparisonEntry>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MigrationRecommendation {
    pub city: String,
    #[serde(default, deserialize_with = "deserialize_aqi")]
    pub aqi: Option<f64>,
    #[serde(default)]
    pub improvement: f64,
    #[serde(default)]
    pub improvement_percent: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MigrationAdvice {
    #[serde(default)]
    pub current_city: String,
    #[serde(default, deserialize_with = "deserialize_aqi")]
    pub current_aqi: Option<f64>,
    #[serde(default)]
    pub recommendations: Vec<MigrationRecommendation>,
}

/// City whose current AQI is below the requested safe-zone threshold.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SafeZone {
    pub city: String,
    #[serde(default, deserialize_with = "deserialize_aqi")]
    pub aqi: Option<f64>,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lng: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SafeZones {
    #[serde(default)]
    pub safe_zones: Vec<SafeZone>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatReply {
    #[serde(default)]
    pub response: String,
    #[serde(default)]
    pub suggestions: Vec<String>,
}

/// User ids are numeric from the password backend and opaque strings from
/// the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UserId {
    Number(i64),
    Text(String),
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserId::Number(n) => write!(f, "{n}"),
            UserId::Text(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    #[serde(default)]
    pub id: Option<UserId>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Session {
    pub token: Option<String>,
    pub user: Option<User>,
}

impl Session {
    pub fn is_authenticated(&self) -> bool {
        self.token.as_deref().is_some_and(|t| !t.is_empty())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthResponse {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub user: Option<User>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Profile {
    #[serde(default)]
    pub id: Option<UserId>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub favorite_cities: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FavoriteEntry {
    pub city: String,
    #[serde(default, deserialize_with = "deserialize_aqi")]
    pub aqi: Option<f64>,
    #[serde(default)]
    pub added_at: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FavoritesResponse {
    #[serde(default)]
    pub favorites: Vec<FavoriteEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertChannel {
    Browser,
    Email,
    Whatsapp,
    Telegram,
}

impl AlertChannel {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "browser" => Some(AlertChannel::Browser),
            "email" => Some(AlertChannel::Email),
            "whatsapp" => Some(AlertChannel::Whatsapp),
            "telegram" => Some(AlertChannel::Telegram),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRule {
    pub city: String,
    pub threshold: f64,
    /// Local clock time, `HH:MM`.
    pub start: String,
    pub end: String,
    pub channel: AlertChannel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AlertAck {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub count: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DailySummaryRequest {
    pub city: String,
    pub time: String,
    pub channel: AlertChannel,
    pub contact: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShareSection {
    Live,
    Ranking,
    Analytics,
    Compare,
    Predict,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShareChannel {
    Email,
    Whatsapp,
}

#[derive(Debug, Clone, Serialize)]
pub struct ShareRequest {
    pub section: ShareSection,
    pub payload: Value,
    pub channel: ShareChannel,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ShareReceipt {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub pdf_base64: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_lenient_aqi_placeholders_are_none() {
        let reading: AqiReading =
            serde_json::from_value(json!({"city": "Delhi", "aqi": "-"})).unwrap();
        assert_eq!(reading.aqi, None);

        let reading: AqiReading =
            serde_json::from_value(json!({"city": "Delhi", "aqi": "N/A"})).unwrap();
        assert_eq!(reading.aqi, None);

        let reading: AqiReading =
            serde_json::from_value(json!({"city": "Delhi", "aqi": null})).unwrap();
        assert_eq!(reading.aqi, None);

        let reading: AqiReading = serde_json::from_value(json!({"city": "Delhi"})).unwrap();
        assert_eq!(reading.aqi, None);
    }

    #[test]
    fn test_lenient_aqi_numbers() {
        let reading: AqiReading = serde_json::from_value(json!({"aqi": 154})).unwrap();
        assert_eq!(reading.aqi, Some(154.0));

        let reading: AqiReading = serde_json::from_value(json!({"aqi": "87"})).unwrap();
        assert_eq!(reading.aqi, Some(87.0));

        let reading: AqiReading = serde_json::from_value(json!({"aqi": -1})).unwrap();
        assert_eq!(reading.aqi, None);
    }

    #[test]
    fn test_live_components_wrapped_and_station_components_bare() {
        let reading: AqiReading = serde_json::from_value(json!({
            "city": "Delhi",
            "aqi": 180,
            "components": {"pm25": {"v": 180}, "no2": {"v": "-"}}
        }))
        .unwrap();
        assert_eq!(reading.components["pm25"].value(), Some(180.0));
        assert_eq!(reading.components["no2"].value(), None);

        let station: Station = serde_json::from_value(json!({
            "station_name": "Anand Vihar",
            "aqi": 310,
            "uid": 2553,
            "components": {"pm10": 250.5},
            "coordinates": {"lat": 28.6469, "lng": 77.3152}
        }))
        .unwrap();
        assert_eq!(station.components["pm10"].value(), Some(250.5));
        assert!(station.position().is_some());
    }

    #[test]
    fn test_station_with_out_of_range_coordinates_has_no_position() {
        let station: Station = serde_json::from_value(json!({
            "station_name": "Broken",
            "aqi": 50,
            "coordinates": {"lat": 128.0, "lng": 77.0}
        }))
        .unwrap();
        assert!(station.position().is_none());
    }

    #[test]
    fn test_analytics_series_keeps_positions() {
        let series: AnalyticsSeries = serde_json::from_value(json!({
            "dates": ["2024-01-01", "2024-01-02", "2024-01-03"],
            "aqi": [120, "-", 98.5]
        }))
        .unwrap();
        assert_eq!(series.aqi, vec![Some(120.0), None, Some(98.5)]);
    }

    #[test]
    fn test_user_id_accepts_number_or_text() {
        let user: User = serde_json::from_value(json!({"id": 4, "email": "a@b.in"})).unwrap();
        assert_eq!(user.id, Some(UserId::Number(4)));

        let user: User = serde_json::from_value(json!({"id": "a1b2-c3", "name": "Asha"})).unwrap();
        assert_eq!(user.id.map(|id| id.to_string()).as_deref(), Some("a1b2-c3"));
    }

    #[test]
    fn test_alert_rule_wire_format() {
        let rule = AlertRule {
            city: "Delhi".to_string(),
            threshold: 150.0,
            start: "08:00".to_string(),
            end: "20:00".to_string(),
            channel: AlertChannel::Browser,
            contact: None,
        };
        let value = serde_json::to_value(&rule).unwrap();
        assert_eq!(value["channel"], "browser");
        assert!(value.get("contact").is_none());
    }

    #[test]
    fn test_pollutant_inputs_reject_negative_and_nan() {
        let ok = PollutantInputs {
            pm25: 80.0,
            pm10: 120.0,
            no2: 30.0,
            so2: 8.0,
            co: 1.2,
            o3: 40.0,
        };
        assert!(ok.validate().is_ok());

        let negative = PollutantInputs { pm10: -1.0, ..ok };
        assert!(matches!(negative.validate(), Err(FetchError::InvalidInput(_))));

        let nan = PollutantInputs { o3: f64::NAN, ..ok };
        assert!(nan.validate().is_err());
    }

    #[test]
    fn test_session_requires_non_empty_token() {
        assert!(!Session::default().is_authenticated());
        let empty = Session {
            token: Some(String::new()),
            user: None,
        };
        assert!(!empty.is_authenticated());
    }
}
