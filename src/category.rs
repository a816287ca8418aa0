//! AQI category classification.
//!
//! Maps a numeric AQI onto one of the six US-EPA style bands used across every
//! view. Breakpoints are cumulative and inclusive (`aqi <= upper`), so the
//! first band whose upper bound covers the value wins. Anything that is not a
//! finite number classifies as [`AqiLevel::Unknown`].

use serde::Serialize;

/// Upper AQI shown by the live gauge. Values above it render a full gauge.
pub const GAUGE_MAX_AQI: f64 = 500.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum AqiLevel {
    Good,
    Moderate,
    UnhealthyForSensitiveGroups,
    Unhealthy,
    VeryUnhealthy,
    Hazardous,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Category {
    pub level: AqiLevel,
    pub label: &'static str,
    pub color: &'static str,
    pub background: &'static str,
    pub border: &'static str,
    pub description: &'static str,
}

const BREAKPOINTS: [(f64, AqiLevel); 5] = [
    (50.0, AqiLevel::Good),
    (100.0, AqiLevel::Moderate),
    (150.0, AqiLevel::UnhealthyForSensitiveGroups),
    (200.0, AqiLevel::Unhealthy),
    (300.0, AqiLevel::VeryUnhealthy),
];

impl AqiLevel {
    /// Band for a finite AQI. Negative values land in `Good` since the
    /// breakpoints are cumulative.
    pub fn from_aqi(aqi: f64) -> Self {
        if !aqi.is_finite() {
            return AqiLevel::Unknown;
        }
        BREAKPOINTS
            .iter()
            .find(|(upper, _)| aqi <= *upper)
            .map(|(_, level)| *level)
            .unwrap_or(AqiLevel::Hazardous)
    }

    pub fn label(self) -> &'static str {
        match self {
            AqiLevel::Good => "Good",
            AqiLevel::Moderate => "Moderate",
            AqiLevel::UnhealthyForSensitiveGroups => "Unhealthy for Sensitive Groups",
            AqiLevel::Unhealthy => "Unhealthy",
            AqiLevel::VeryUnhealthy => "Very Unhealthy",
            AqiLevel::Hazardous => "Hazardous",
            AqiLevel::Unknown => "Unknown",
        }
    }

    pub fn color(self) -> &'static str {
        match self {
            AqiLevel::Good => "#10b981",
            AqiLevel::Moderate => "#f59e0b",
            AqiLevel::UnhealthyForSensitiveGroups => "#f97316",
            AqiLevel::Unhealthy => "#ef4444",
            AqiLevel::VeryUnhealthy => "#a855f7",
            AqiLevel::Hazardous => "#dc2626",
            AqiLevel::Unknown => "#6b7280",
        }
    }

    fn background(self) -> &'static str {
        match self {
            AqiLevel::Good => "rgba(16, 185, 129, 0.15)",
            AqiLevel::Moderate => "rgba(245, 158, 11, 0.15)",
            AqiLevel::UnhealthyForSensitiveGroups => "rgba(249, 115, 22, 0.15)",
            AqiLevel::Unhealthy => "rgba(239, 68, 68, 0.15)",
            AqiLevel::VeryUnhealthy => "rgba(168, 85, 247, 0.15)",
            AqiLevel::Hazardous => "rgba(220, 38, 38, 0.15)",
            AqiLevel::Unknown => "rgba(107, 114, 128, 0.15)",
        }
    }

    fn border(self) -> &'static str {
        match self {
            AqiLevel::Good => "rgba(16, 185, 129, 0.4)",
            AqiLevel::Moderate => "rgba(245, 158, 11, 0.4)",
            AqiLevel::UnhealthyForSensitiveGroups => "rgba(249, 115, 22, 0.4)",
            AqiLevel::Unhealthy => "rgba(239, 68, 68, 0.4)",
            AqiLevel::VeryUnhealthy => "rgba(168, 85, 247, 0.4)",
            AqiLevel::Hazardous => "rgba(220, 38, 38, 0.5)",
            AqiLevel::Unknown => "rgba(107, 114, 128, 0.4)",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            AqiLevel::Good => {
                "Air quality is satisfactory, and air pollution poses little or no risk."
            }
            AqiLevel::Moderate => {
                "Air quality is acceptable. However, there may be a risk for some people."
            }
            AqiLevel::UnhealthyForSensitiveGroups => {
                "Members of sensitive groups may experience health effects."
            }
            AqiLevel::Unhealthy => {
                "Everyone may begin to experience health effects. Sensitive groups at greater risk."
            }
            AqiLevel::VeryUnhealthy => {
                "Health alert: everyone may experience more serious health effects."
            }
            AqiLevel::Hazardous => {
                "Health warning of emergency conditions. The entire population is likely to be affected."
            }
            AqiLevel::Unknown => "",
        }
    }

    /// Recommended actions for the health recommendations panel.
    pub fn health_actions(self) -> &'static [&'static str] {
        match self {
            AqiLevel::Good => &[
                "Enjoy outdoor activities",
                "Open windows for fresh air",
                "No special precautions needed",
            ],
            AqiLevel::Moderate => &[
                "People with respiratory issues should consider limiting prolonged outdoor exertion",
                "Keep windows closed during peak pollution hours",
                "Consider using air purifiers indoors",
            ],
            AqiLevel::UnhealthyForSensitiveGroups => &[
                "Sensitive individuals should avoid prolonged outdoor activities",
                "Wear masks when outdoors",
                "Keep indoor air clean with air purifiers",
                "Stay hydrated and monitor symptoms",
            ],
            AqiLevel::Unhealthy | AqiLevel::VeryUnhealthy | AqiLevel::Hazardous => &[
                "Avoid prolonged outdoor activities",
                "Wear N95 masks when outdoors",
                "Keep windows and doors closed",
                "Use air purifiers and HVAC filters",
                "Stay indoors as much as possible",
            ],
            AqiLevel::Unknown => &[],
        }
    }
}

/// Classify an AQI value. `None` and NaN both yield `Unknown`.
pub fn classify(aqi: Option<f64>) -> Category {
    let level = aqi.map(AqiLevel::from_aqi).unwrap_or(AqiLevel::Unknown);
    Category {
        level,
        label: level.label(),
        color: level.color(),
        background: level.background(),
        border: level.border(),
        description: level.description(),
    }
}

/// Map marker color. The hazardous band uses a darker red than the badge.
pub fn marker_color(aqi: Option<f64>) -> &'static str {
    match aqi.map(AqiLevel::from_aqi).unwrap_or(AqiLevel::Unknown) {
        AqiLevel::Hazardous => "#7f1d1d",
        level => level.color(),
    }
}

/// Fill fraction of the live gauge in `[0, 1]`.
pub fn gauge_fraction(aqi: Option<f64>) -> f64 {
    match aqi {
        Some(v) if v.is_finite() => (v / GAUGE_MAX_AQI).clamp(0.0, 1.0),
        _ => 0.0,
    }
}
