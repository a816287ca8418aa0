//! Client-side aggregation over AQI series and lists.
//!
//! Non-finite or missing values never contribute to an aggregate; empty inputs
//! produce `None` (or an empty list) rather than `NaN` or infinity.

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::category::AqiLevel;
use crate::models::{
    City, CityComparisonEntry, FavoriteEntry, MigrationRecommendation, SafeZone, Station,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Season {
    Winter,
    Spring,
    Summer,
    /// September to November. The backend labels this range "Autumn".
    #[serde(alias = "Autumn")]
    Monsoon,
}

impl Season {
    pub fn from_month(month: u32) -> Option<Self> {
        match month {
            12 | 1 | 2 => Some(Season::Winter),
            3..=5 => Some(Season::Spring),
            6..=8 => Some(Season::Summer),
            9..=11 => Some(Season::Monsoon),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Season::Winter => "Winter",
            Season::Spring => "Spring",
            Season::Summer => "Summer",
            Season::Monsoon => "Monsoon",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesPoint {
    pub date: String,
    pub aqi: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Extremum {
    pub value: f64,
    pub index: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SeasonAverage {
    pub season: Season,
    pub average: f64,
    pub count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct YearAverage {
    pub year: i32,
    pub average: f64,
    pub count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct SeriesSummary {
    pub count: usize,
    pub average: Option<f64>,
    pub peak: Option<Extremum>,
    pub trough: Option<Extremum>,
}

/// Zip the backend's parallel `dates` and `aqi` arrays. Extra entries on
/// either side are dropped.
pub fn series_points(dates: &[String], aqi: &[Option<f64>]) -> Vec<SeriesPoint> {
    dates
        .iter()
        .zip(aqi.iter())
        .map(|(date, aqi)| SeriesPoint {
            date: date.clone(),
            aqi: *aqi,
        })
        .collect()
}

/// Arithmetic mean of the finite values.
pub fn average(series: &[f64]) -> Option<f64> {
    let (sum, count) = series
        .iter()
        .filter(|v| v.is_finite())
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    (count > 0).then(|| sum / count as f64)
}

/// Largest finite value; the first occurrence wins on ties.
pub fn peak(series: &[f64]) -> Option<Extremum> {
    extremum(series, |candidate, best| candidate > best)
}

/// Smallest finite value; the first occurrence wins on ties.
pub fn trough(series: &[f64]) -> Option<Extremum> {
    extremum(series, |candidate, best| candidate < best)
}

fn extremum(series: &[f64], better: impl Fn(f64, f64) -> bool) -> Option<Extremum> {
    let mut best: Option<Extremum> = None;
    for (index, &value) in series.iter().enumerate() {
        if !value.is_finite() {
            continue;
        }
        match best {
            Some(current) if !better(value, current.value) => {}
            _ => best = Some(Extremum { value, index }),
        }
    }
    best
}

pub fn summarize(series: &[f64]) -> SeriesSummary {
    SeriesSummary {
        count: series.iter().filter(|v| v.is_finite()).count(),
        average: average(series),
        peak: peak(series),
        trough: trough(series),
    }
}

/// Summary over the AQI column of a point series. Indices in the result refer
/// to `points`, so they can be used to look up the matching date.
pub fn summarize_points(points: &[SeriesPoint]) -> SeriesSummary {
    let values: Vec<f64> = points.iter().map(|p| p.aqi.unwrap_or(f64::NAN)).collect();
    summarize(&values)
}

fn parse_date(date: &str) -> Option<NaiveDate> {
    let day = date.get(..10)?;
    NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}

fn valid_aqi(point: &SeriesPoint) -> Option<f64> {
    point.aqi.filter(|v| v.is_finite())
}

/// Average AQI per season, rounded to a whole number. Seasons without a
/// contributing entry are omitted.
pub fn bucket_by_season(series: &[SeriesPoint]) -> Vec<SeasonAverage> {
    let mut buckets: BTreeMap<Season, (f64, usize)> = BTreeMap::new();

    for point in series {
        let Some(aqi) = valid_aqi(point) else {
            continue;
        };
        let Some(season) =
            parse_date(&point.date).and_then(|d| Season::from_month(d.month()))
        else {
            continue;
        };
        let entry = buckets.entry(season).or_insert((0.0, 0));
        entry.0 += aqi;
        entry.1 += 1;
    }

    buckets
        .into_iter()
        .map(|(season, (sum, count))| SeasonAverage {
            season,
            average: (sum / count as f64).round(),
            count,
        })
        .collect()
}

/// Average AQI per calendar year (from the 4-digit date prefix), ascending,
/// rounded to one decimal.
pub fn bucket_by_year(series: &[SeriesPoint]) -> Vec<YearAverage> {
    let mut buckets: BTreeMap<i32, (f64, usize)> = BTreeMap::new();

    for point in series {
        let Some(aqi) = valid_aqi(point) else {
            continue;
        };
        let Some(year) = year_prefix(&point.date) else {
            continue;
        };
        let entry = buckets.entry(year).or_insert((0.0, 0));
        entry.0 += aqi;
        entry.1 += 1;
    }

    buckets
        .into_iter()
        .map(|(year, (sum, count))| YearAverage {
            year,
            average: round_one_decimal(sum / count as f64),
            count,
        })
        .collect()
}

fn year_prefix(date: &str) -> Option<i32> {
    let prefix = date.get(..4)?;
    if !prefix.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    prefix.parse().ok()
}

pub fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Relative gap between two values as shown in the compare headline:
/// `|a - b| / b * 100`, or zero when `b` is zero.
pub fn percent_difference(a: f64, b: f64) -> f64 {
    if b == 0.0 || !a.is_finite() || !b.is_finite() {
        return 0.0;
    }
    ((a - b) / b * 100.0).abs()
}

/// Signed change from `previous` to `current` in percent.
pub fn percent_change(current: f64, previous: f64) -> Option<f64> {
    if previous == 0.0 || !current.is_finite() || !previous.is_finite() {
        return None;
    }
    Some((current - previous) / previous * 100.0)
}

/// Anything with an optional AQI snapshot that can be ranked.
pub trait HasAqi {
    fn aqi(&self) -> Option<f64>;
}

impl HasAqi for City {
    fn aqi(&self) -> Option<f64> {
        self.aqi
    }
}

impl HasAqi for Station {
    fn aqi(&self) -> Option<f64> {
        self.aqi
    }
}

impl HasAqi for FavoriteEntry {
    fn aqi(&self) -> Option<f64> {
        self.aqi
    }
}

impl HasAqi for CityComparisonEntry {
    fn aqi(&self) -> Option<f64> {
        self.aqi
    }
}

impl HasAqi for MigrationRecommendation {
    fn aqi(&self) -> Option<f64> {
        self.aqi
    }
}

impl HasAqi for SafeZone {
    fn aqi(&self) -> Option<f64> {
        self.aqi
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    /// Cleanest first.
    Ascending,
    /// Most polluted first.
    #[default]
    Descending,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Ranked<T> {
    pub rank: usize,
    pub aqi: f64,
    pub item: T,
}

/// Stable sort by AQI with 1-based ranks. Items without a valid AQI are
/// excluded rather than ranked last.
pub fn rank_by_aqi<T: HasAqi>(items: Vec<T>, direction: SortDirection) -> Vec<Ranked<T>> {
    let mut valid: Vec<(f64, T)> = items
        .into_iter()
        .filter_map(|item| {
            item.aqi()
                .filter(|v| v.is_finite() && *v >= 0.0)
                .map(|aqi| (aqi, item))
        })
        .collect();

    match direction {
        SortDirection::Ascending => valid.sort_by(|a, b| a.0.total_cmp(&b.0)),
        SortDirection::Descending => valid.sort_by(|a, b| b.0.total_cmp(&a.0)),
    }

    valid
        .into_iter()
        .enumerate()
        .map(|(i, (aqi, item))| Ranked {
            rank: i + 1,
            aqi,
            item,
        })
        .collect()
}

/// How a city's single AQI is derived from its stations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RepresentativeStationPolicy {
    /// The worst station stands in for the city; first one wins on ties.
    #[default]
    Max,
    Mean,
}

impl RepresentativeStationPolicy {
    pub fn representative_aqi(self, stations: &[Station]) -> Option<f64> {
        let values: Vec<f64> = stations
            .iter()
            .filter_map(|s| s.aqi.filter(|v| v.is_finite()))
            .collect();
        match self {
            RepresentativeStationPolicy::Max => peak(&values).map(|p| p.value),
            RepresentativeStationPolicy::Mean => average(&values).map(round_one_decimal),
        }
    }

    /// The station displayed for the city under the max policy.
    pub fn representative_station(stations: &[Station]) -> Option<&Station> {
        let values: Vec<f64> = stations.iter().map(|s| s.aqi.unwrap_or(f64::NAN)).collect();
        peak(&values).map(|p| &stations[p.index])
    }
}

/// Counts behind the ranking and dashboard stat cards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct CategoryTally {
    pub total: usize,
    /// AQI at most 50.
    pub good: usize,
    /// AQI in (50, 150].
    pub moderate: usize,
    /// AQI above 150.
    pub unhealthy: usize,
    pub no_data: usize,
}

impl CategoryTally {
    pub fn from_values(values: impl IntoIterator<Item = Option<f64>>) -> Self {
        let mut tally = CategoryTally::default();
        for value in values {
            tally.total += 1;
            match value.filter(|v| v.is_finite()).map(AqiLevel::from_aqi) {
                None => tally.no_data += 1,
                Some(AqiLevel::Good) => tally.good += 1,
                Some(AqiLevel::Moderate | AqiLevel::UnhealthyForSensitiveGroups) => {
                    tally.moderate += 1
                }
                Some(_) => tally.unhealthy += 1,
            }
        }
        tally
    }
}
