use serde::Serialize;
use serde_json::{json, Value};
use tracing::instrument;

use crate::aggregation::{
    average, bucket_by_season, bucket_by_year, percent_change, percent_difference,
    round_one_decimal, series_points, summarize_points, SeasonAverage, SeriesPoint, SeriesSummary,
    YearAverage,
};
use crate::api::ApiClient;
use crate::category::{classify, Category};
use crate::fetch_error::FetchError;
use crate::models::{
    BestWorstTimes, MigrationAdvice, MultiCityComparison, PollutantInputs, SeasonalTrends,
    YearlyComparison,
};

/// Trailing points compared with the whole series for the trend figure.
pub const TREND_WINDOW: usize = 6;

#[derive(Debug, Clone, Serialize)]
pub struct CityAnalytics {
    pub city: String,
    pub points: Vec<SeriesPoint>,
    pub summary: SeriesSummary,
    pub seasons: Vec<SeasonAverage>,
    pub years: Vec<YearAverage>,
    /// Whole-series average against the last `TREND_WINDOW` points, in percent.
    pub change_percent: Option<f64>,
}

impl CityAnalytics {
    pub fn from_points(city: &str, points: Vec<SeriesPoint>) -> Self {
        let summary = summarize_points(&points);
        let recent: Vec<f64> = points
            .iter()
            .rev()
            .take(TREND_WINDOW)
            .filter_map(|p| p.aqi)
            .collect();
        let change_percent = match (summary.average, average(&recent)) {
            (Some(all), Some(recent)) => percent_change(all, recent),
            _ => None,
        };

        Self {
            city: city.trim().to_string(),
            seasons: bucket_by_season(&points),
            years: bucket_by_year(&points),
            summary,
            points,
            change_percent,
        }
    }

    pub fn date_at(&self, index: usize) -> Option<&str> {
        self.points.get(index).map(|p| p.date.as_str())
    }

    pub fn peak_date(&self) -> Option<&str> {
        self.summary.peak.and_then(|p| self.date_at(p.index))
    }

    pub fn share_payload(&self) -> Value {
        json!({
            "city": self.city,
            "max_aqi": self.summary.peak.map(|p| p.value),
            "min_aqi": self.summary.trough.map(|p| p.value),
            "avg_aqi": self.summary.average.map(round_one_decimal),
            "max_date": self.peak_date(),
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Comparison {
    pub first: CityAnalytics,
    pub second: CityAnalytics,
    /// `|avg1 - avg2| / avg2` in percent.
    pub difference_percent: Option<f64>,
    /// City with the lower average, if both have data and they differ.
    pub cleaner: Option<String>,
}

impl Comparison {
    fn new(first: CityAnalytics, second: CityAnalytics) -> Self {
        let (difference_percent, cleaner) = match (first.summary.average, second.summary.average) {
            (Some(a), Some(b)) => {
                let cleaner = if a < b {
                    Some(first.city.clone())
                } else if b < a {
                    Some(second.city.clone())
                } else {
                    None
                };
                (Some(percent_difference(a, b)), cleaner)
            }
            _ => (None, None),
        };
        Self {
            first,
            second,
            difference_percent,
            cleaner,
        }
    }

    pub fn share_payload(&self) -> Value {
        let side = |c: &CityAnalytics| {
            json!({
                "name": c.city,
                "avg": c.summary.average.map(round_one_decimal),
                "max": c.summary.peak.map(|p| p.value),
                "min": c.summary.trough.map(|p| p.value),
            })
        };
        json!({ "city1": side(&self.first), "city2": side(&self.second) })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HistoricalReport {
    pub yearly: YearlyComparison,
    pub seasonal: SeasonalTrends,
    pub best_worst: BestWorstTimes,
}

#[derive(Debug, Clone, Serialize)]
pub struct PredictionView {
    pub inputs: PollutantInputs,
    pub predicted_aqi: Option<f64>,
    pub category: Category,
    pub note: Option<String>,
}

impl PredictionView {
    pub fn share_payload(&self) -> Value {
        json!({
            "predicted_aqi": self.predicted_aqi,
            "category": self.category.label,
            "note": self.note,
        })
    }
}

#[derive(Clone)]
pub struct AnalyticsService {
    api: ApiClient,
}

impl AnalyticsService {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    #[instrument(skip(self))]
    pub async fn city_analytics(&self, city: &str) -> Result<CityAnalytics, FetchError> {
        let series = self.api.analytics(city).await?;
        let points = series_points(&series.dates, &series.aqi);
        Ok(CityAnalytics::from_points(city, points))
    }

    #[instrument(skip(self))]
    pub async fn compare(&self, city1: &str, city2: &str) -> Result<Comparison, FetchError> {
        let response = self.api.compare(city1, city2).await?;
        let label = |name: &str, fallback: &str| {
            if name.is_empty() {
                fallback.to_string()
            } else {
                name.to_string()
            }
        };
        let first = CityAnalytics::from_points(
            &label(&response.city1.name, city1),
            series_points(&response.city1.dates, &response.city1.aqi),
        );
        let second = CityAnalytics::from_points(
            &label(&response.city2.name, city2),
            series_points(&response.city2.dates, &response.city2.aqi),
        );
        Ok(Comparison::new(first, second))
    }

    /// Yearly, seasonal and best/worst month views, fetched together.
    #[instrument(skip(self))]
    pub async fn historical(&self, city: &str) -> Result<HistoricalReport, FetchError> {
        let (yearly, seasonal, best_worst) = tokio::try_join!(
            self.api.yearly_comparison(city),
            self.api.seasonal_trends(city),
            self.api.best_worst_times(city),
        )?;
        Ok(HistoricalReport {
            yearly,
            seasonal,
            best_worst,
        })
    }

    #[instrument(skip(self))]
    pub async fn predict(&self, inputs: PollutantInputs) -> Result<PredictionView, FetchError> {
        let prediction = self.api.predict(&inputs).await?;
        Ok(PredictionView {
            inputs,
            predicted_aqi: prediction.predicted_aqi,
            category: classify(prediction.predicted_aqi),
            note: prediction.note,
        })
    }

    #[instrument(skip(self))]
    pub async fn compare_many(&self, cities: &[String]) -> Result<MultiCityComparison, FetchError> {
        self.api.compare_multi_city(cities).await
    }

    #[instrument(skip(self))]
    pub async fn migration_advice(
        &self,
        current_city: &str,
        max_results: Option<usize>,
    ) -> Result<MigrationAdvice, FetchError> {
        self.api.migration_advisor(current_city, max_results).await
    }
}
