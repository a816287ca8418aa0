//! Plain-text renderers for the terminal views.
//!
//! Each function turns a service result into the text printed on stdout.
//! Missing values render as `N/A`.

use crate::aggregation::Ranked;
use crate::category::{classify, gauge_fraction, marker_color, Category};
use crate::geo::{NearbyOutcome, CITY_SEARCH_FACTOR};
use crate::models::{
    AlertRule, ChatReply, MigrationAdvice, MultiCityComparison, Profile, SafeZone,
    SatelliteReading, Session, ShareReceipt,
};
use crate::services::analytics_service::{
    CityAnalytics, Comparison, HistoricalReport, PredictionView,
};
use crate::services::favorites_service::DashboardStats;
use crate::services::live_service::LiveSnapshot;
use crate::services::ranking_service::{CityRanking, StationRanking};
use crate::store::Theme;

const GAUGE_WIDTH: usize = 30;

pub fn fmt_aqi(aqi: Option<f64>) -> String {
    match aqi {
        Some(v) if v.is_finite() => format!("{}", v.round() as i64),
        _ => "N/A".to_string(),
    }
}

fn fmt_value(value: Option<f64>) -> String {
    match value {
        Some(v) if v.is_finite() => format!("{:.1}", v),
        _ => "N/A".to_string(),
    }
}

fn fmt_text(value: Option<&str>) -> &str {
    value.filter(|s| !s.is_empty()).unwrap_or("N/A")
}

/// `[#########.....]` bar for the live gauge.
pub fn render_gauge(aqi: Option<f64>) -> String {
    let filled = (gauge_fraction(aqi) * GAUGE_WIDTH as f64).round() as usize;
    format!("[{}{}]", "#".repeat(filled), ".".repeat(GAUGE_WIDTH - filled))
}

fn category_line(category: &Category) -> String {
    if category.description.is_empty() {
        category.label.to_string()
    } else {
        format!("{} - {}", category.label, category.description)
    }
}

pub fn render_live(snapshot: &LiveSnapshot) -> String {
    let reading = &snapshot.reading;
    let city = if reading.city.is_empty() {
        snapshot.query.as_str()
    } else {
        reading.city.as_str()
    };

    let mut lines = vec![
        format!("Live AQI - {}", city),
        format!(
            "AQI {:>4} {}  {}",
            fmt_aqi(reading.aqi),
            render_gauge(reading.aqi),
            category_line(&snapshot.category)
        ),
        format!(
            "Dominant pollutant: {}",
            fmt_text(reading.dominant_pollutant.as_deref())
        ),
        format!("Observed: {}", fmt_text(reading.time.as_deref())),
    ];

    if !reading.components.is_empty() {
        lines.push("Pollutants:".to_string());
        for (key, value) in &reading.components {
            lines.push(format!("  {:<6} {}", key, fmt_value(value.value())));
        }
    }

    let actions = snapshot.category.level.health_actions();
    if !actions.is_empty() {
        lines.push("Health recommendations:".to_string());
        lines.extend(actions.iter().map(|a| format!("  - {}", a)));
    }

    if let Some(satellite) = &snapshot.satellite {
        lines.push(format!(
            "Satellite: US AQI {}, EU AQI {}, PM2.5 {}, dust {}",
            fmt_aqi(satellite.us_aqi),
            fmt_aqi(satellite.european_aqi),
            fmt_value(satellite.pm2_5),
            fmt_value(satellite.dust)
        ));
    }

    lines.join("\n")
}

pub fn render_stations(ranking: &StationRanking) -> String {
    let mut lines = vec![format!(
        "{} - {} stations, representative AQI {}",
        ranking.city,
        ranking.station_count,
        fmt_aqi(ranking.representative_aqi)
    )];
    for Ranked { rank, aqi, item } in &ranking.entries {
        lines.push(format!(
            "{:>3}. {:<40} {:>4}  {}",
            rank,
            item.station_name,
            fmt_aqi(Some(*aqi)),
            classify(Some(*aqi)).label
        ));
    }
    if ranking.entries.is_empty() {
        lines.push("No stations with a current reading".to_string());
    }
    lines.join("\n")
}

pub fn render_satellite(reading: &SatelliteReading) -> String {
    let rows = [
        ("US AQI", fmt_aqi(reading.us_aqi)),
        ("EU AQI", fmt_aqi(reading.european_aqi)),
        ("PM10", fmt_value(reading.pm10)),
        ("PM2.5", fmt_value(reading.pm2_5)),
        ("Dust", fmt_value(reading.dust)),
        ("CO", fmt_value(reading.carbon_monoxide)),
        ("NO2", fmt_value(reading.nitrogen_dioxide)),
        ("SO2", fmt_value(reading.sulphur_dioxide)),
        ("O3", fmt_value(reading.ozone)),
        ("Temp", fmt_value(reading.temperature)),
        ("Wind", fmt_value(reading.wind_speed)),
    ];
    let mut lines = vec![format!(
        "Satellite - {} ({})",
        fmt_text(reading.city.as_deref()),
        fmt_text(reading.time.as_deref())
    )];
    lines.extend(rows.iter().map(|(k, v)| format!("  {:<7} {}", k, v)));
    lines.join("\n")
}

/// Map markers as a table: one row per city with its marker color.
pub fn render_map(readings: &[SatelliteReading]) -> String {
    if readings.is_empty() {
        return "No satellite data available".to_string();
    }
    let mut lines = vec![format!(
        "{:<20} {:>8} {:>8} {:>6}  {}",
        "City", "Lat", "Lng", "AQI", "Marker"
    )];
    for r in readings {
        lines.push(format!(
            "{:<20} {:>8} {:>8} {:>6}  {}",
            fmt_text(r.city.as_deref()),
            r.lat.map(|v| format!("{:.3}", v)).unwrap_or_else(|| "N/A".into()),
            r.lng.map(|v| format!("{:.3}", v)).unwrap_or_else(|| "N/A".into()),
            fmt_aqi(r.us_aqi),
            marker_color(r.us_aqi)
        ));
    }
    lines.join("\n")
}

pub fn render_city_ranking(ranking: &CityRanking) -> String {
    let order = if ranking.direction_descending {
        "most polluted first"
    } else {
        "cleanest first"
    };
    let mut lines = vec![format!(
        "City ranking ({}) - good {}, moderate {}, unhealthy {}",
        order, ranking.tally.good, ranking.tally.moderate, ranking.tally.unhealthy
    )];
    for entry in &ranking.entries {
        let station = entry
            .item
            .station
            .as_deref()
            .map(|s| format!(" ({})", s))
            .unwrap_or_default();
        lines.push(format!(
            "{:>3}. {:<20} {:>4}  {}{}",
            entry.rank,
            entry.item.name,
            fmt_aqi(Some(entry.aqi)),
            classify(Some(entry.aqi)).label,
            station
        ));
    }
    if !ranking.unranked.is_empty() {
        lines.push(format!("No data: {}", ranking.unranked.join(", ")));
    }
    lines.join("\n")
}

pub fn render_nearby(outcome: &NearbyOutcome, radius_km: f64) -> String {
    match outcome {
        NearbyOutcome::NoCandidateCities => {
            format!(
                "No monitored cities within {:.0} km of your location",
                radius_km * CITY_SEARCH_FACTOR
            )
        }
        NearbyOutcome::NoStationsInRadius => {
            format!("No stations with a current reading within {:.0} km", radius_km)
        }
        NearbyOutcome::Found(stations) => {
            let mut lines = vec![format!("{} stations within {:.0} km", stations.len(), radius_km)];
            for s in stations {
                lines.push(format!(
                    "{:>7.2} km  {:<40} {:>4}  {}",
                    s.distance_km,
                    s.station.station_name,
                    fmt_aqi(Some(s.aqi)),
                    classify(Some(s.aqi)).label
                ));
            }
            lines.join("\n")
        }
    }
}

pub fn render_safe_zones(zones: &[Ranked<SafeZone>], threshold: u32) -> String {
    if zones.is_empty() {
        return format!("No cities currently below AQI {}", threshold);
    }
    let mut lines = vec![format!("Safe zones (AQI < {})", threshold)];
    for zone in zones {
        lines.push(format!(
            "{:>3}. {:<20} {:>4}  {}",
            zone.rank,
            zone.item.city,
            fmt_aqi(Some(zone.aqi)),
            classify(Some(zone.aqi)).label
        ));
    }
    lines.join("\n")
}

pub fn render_city_names(cities: &[String]) -> String {
    if cities.is_empty() {
        return "No cities available".to_string();
    }
    let mut lines = vec![format!("{} cities", cities.len())];
    lines.extend(cities.iter().map(|c| format!("  {}", c)));
    lines.join("\n")
}

/// One-line favorite marker shown under the live view when logged in.
pub fn render_favorite_marker(city: &str, is_favorite: bool) -> String {
    if is_favorite {
        format!("* {} is one of your favorites", city)
    } else {
        format!("  Not a favorite (favorites add \"{}\")", city)
    }
}

pub fn render_analytics(analytics: &CityAnalytics) -> String {
    let summary = &analytics.summary;
    let mut lines = vec![
        format!("Analytics - {} ({} readings)", analytics.city, summary.count),
        format!(
            "Average {}  Peak {} on {}  Lowest {} on {}",
            fmt_aqi(summary.average),
            fmt_aqi(summary.peak.map(|p| p.value)),
            fmt_text(analytics.peak_date()),
            fmt_aqi(summary.trough.map(|p| p.value)),
            fmt_text(summary.trough.and_then(|t| analytics.date_at(t.index)))
        ),
        format!(
            "Change from previous period: {}",
            analytics
                .change_percent
                .map(|c| format!("{:+.1}%", c))
                .unwrap_or_else(|| "N/A".to_string())
        ),
    ];
    if !analytics.seasons.is_empty() {
        lines.push("Seasons:".to_string());
        for s in &analytics.seasons {
            lines.push(format!("  {:<8} {:>4}", s.season.name(), s.average));
        }
    }
    if !analytics.years.is_empty() {
        lines.push("Years:".to_string());
        for y in &analytics.years {
            lines.push(format!("  {}  {:>6.1}", y.year, y.average));
        }
    }
    lines.join("\n")
}

pub fn render_comparison(comparison: &Comparison) -> String {
    let side = |c: &CityAnalytics| {
        format!(
            "{:<16} avg {:>4}  max {:>4}  min {:>4}",
            c.city,
            fmt_aqi(c.summary.average),
            fmt_aqi(c.summary.peak.map(|p| p.value)),
            fmt_aqi(c.summary.trough.map(|p| p.value))
        )
    };
    let mut lines = vec![side(&comparison.first), side(&comparison.second)];
    match (&comparison.cleaner, comparison.difference_percent) {
        (Some(cleaner), Some(diff)) => {
            lines.push(format!("{} has cleaner air ({:.1}% difference)", cleaner, diff))
        }
        (None, Some(_)) => lines.push("Both cities average the same AQI".to_string()),
        _ => lines.push("Not enough data to compare".to_string()),
    }
    lines.join("\n")
}

pub fn render_multi_city(comparison: &MultiCityComparison) -> String {
    let mut lines = Vec::new();
    for entry in &comparison.comparison {
        match &entry.error {
            Some(err) => lines.push(format!("{:<16} error: {}", entry.city, err)),
            None => lines.push(format!(
                "{:<16} AQI {:>4}  PM2.5 {:>6}  PM10 {:>6}  {}",
                entry.city,
                fmt_aqi(entry.aqi),
                fmt_value(entry.pm25),
                fmt_value(entry.pm10),
                classify(entry.aqi).label
            )),
        }
    }
    lines.join("\n")
}

pub fn render_migration(advice: &MigrationAdvice) -> String {
    let mut lines = vec![format!(
        "Current: {} (AQI {})",
        advice.current_city,
        fmt_aqi(advice.current_aqi)
    )];
    if advice.recommendations.is_empty() {
        lines.push("No cleaner cities found".to_string());
    }
    for r in &advice.recommendations {
        lines.push(format!(
            "  {:<16} AQI {:>4}  {:.1} better ({:.1}%)",
            r.city,
            fmt_aqi(r.aqi),
            r.improvement,
            r.improvement_percent
        ));
    }
    lines.join("\n")
}

pub fn render_historical(report: &HistoricalReport) -> String {
    let mut lines = vec![format!("Historical - {}", report.yearly.city)];
    lines.push("Yearly averages:".to_string());
    for (year, avg) in &report.yearly.yearly_averages {
        lines.push(format!("  {}  {:>6.1}", year, avg));
    }
    lines.push("Seasonal trends:".to_string());
    for (season, stats) in &report.seasonal.seasonal_trends {
        lines.push(format!(
            "  {:<8} mean {:>6.1}  min {:>6.1}  max {:>6.1}",
            season.name(),
            stats.mean,
            stats.min,
            stats.max
        ));
    }
    let months = |label: &str, list: &[crate::models::MonthAverage]| {
        let names: Vec<String> = list
            .iter()
            .map(|m| format!("{} ({})", m.month_name, fmt_aqi(m.aqi)))
            .collect();
        format!("{}: {}", label, names.join(", "))
    };
    lines.push(months("Best months", &report.best_worst.best_months));
    lines.push(months("Worst months", &report.best_worst.worst_months));
    lines.join("\n")
}

pub fn render_prediction(view: &PredictionView) -> String {
    let mut lines = vec![format!(
        "Predicted AQI {}  {}",
        fmt_aqi(view.predicted_aqi),
        category_line(&view.category)
    )];
    if let Some(note) = &view.note {
        lines.push(note.clone());
    }
    lines.join("\n")
}

pub fn render_session(session: &Session) -> String {
    match (&session.token, &session.user) {
        (Some(_), Some(user)) => format!(
            "Logged in as {} <{}>",
            fmt_text(user.name.as_deref()),
            fmt_text(user.email.as_deref())
        ),
        (Some(_), None) => "Logged in".to_string(),
        _ => "Not logged in".to_string(),
    }
}

pub fn render_profile(profile: &Profile) -> String {
    let mut lines = vec![format!(
        "{} <{}>",
        fmt_text(profile.name.as_deref()),
        fmt_text(profile.email.as_deref())
    )];
    if let Some(created) = &profile.created_at {
        lines.push(format!("Member since {}", created));
    }
    if !profile.favorite_cities.is_empty() {
        lines.push(format!("Favorites: {}", profile.favorite_cities.join(", ")));
    }
    lines.join("\n")
}

pub fn render_dashboard(stats: &DashboardStats) -> String {
    let mut lines = vec![format!(
        "Favorites {}  Good air {}  Poor air {}  Average AQI {}",
        stats.count,
        stats.good,
        stats.bad,
        fmt_aqi(stats.average_aqi)
    )];
    if stats.favorites.is_empty() {
        lines.push("No favorite cities yet".to_string());
    }
    for f in &stats.favorites {
        lines.push(format!(
            "  {:<20} {:>4}  {}",
            f.city,
            fmt_aqi(f.aqi),
            classify(f.aqi).label
        ));
    }
    lines.join("\n")
}

pub fn render_alert_rules(rules: &[AlertRule]) -> String {
    if rules.is_empty() {
        return "No alert rules".to_string();
    }
    rules
        .iter()
        .enumerate()
        .map(|(i, r)| {
            format!(
                "{:>2}. {} AQI >= {} between {} and {} via {:?}{}",
                i + 1,
                r.city,
                r.threshold,
                r.start,
                r.end,
                r.channel,
                r.contact
                    .as_deref()
                    .map(|c| format!(" ({})", c))
                    .unwrap_or_default()
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn render_share_receipt(receipt: &ShareReceipt) -> String {
    let target = receipt
        .email
        .as_deref()
        .or(receipt.phone.as_deref())
        .unwrap_or("N/A");
    let size = receipt.pdf_base64.as_ref().map(|p| p.len()).unwrap_or(0);
    format!(
        "Report {} via {} to {} ({} bytes of PDF)",
        fmt_text(receipt.status.as_deref()),
        fmt_text(receipt.channel.as_deref()),
        target,
        size
    )
}

pub fn render_chat(reply: &ChatReply) -> String {
    let mut lines = vec![reply.response.clone()];
    if !reply.suggestions.is_empty() {
        lines.push("Try asking:".to_string());
        lines.extend(reply.suggestions.iter().map(|s| format!("  - {}", s)));
    }
    lines.join("\n")
}

pub fn render_theme(theme: Theme) -> String {
    format!("Theme: {}", theme)
}
