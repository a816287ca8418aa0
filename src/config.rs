use std::env;
use std::path::PathBuf;

use crate::alerts::FirePolicy;

pub const DEFAULT_API_BASE_URL: &str = "http://127.0.0.1:8000";
pub const DEFAULT_STATE_FILE: &str = ".aqi-dashboard/state.json";

#[derive(Debug, Clone)]
pub struct Config {
    pub api_base_url: String,
    pub state_file: PathBuf,
    pub live_poll_interval_minutes: u64,
    pub nearby_radius_km: f64,
    pub http_timeout_secs: u64,
    pub alert_fire_policy: FirePolicy,
}

impl Config {
    pub fn from_env() -> Self {
        Config {
            api_base_url: env::var("API_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_API_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            state_file: env::var("STATE_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_STATE_FILE)),
            live_poll_interval_minutes: env::var("LIVE_POLL_INTERVAL_MINUTES")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .unwrap_or(5),
            nearby_radius_km: env::var("NEARBY_RADIUS_KM")
                .unwrap_or_else(|_| "15".to_string())
                .parse()
                .unwrap_or(15.0),
            http_timeout_secs: env::var("HTTP_TIMEOUT_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .unwrap_or(30),
            alert_fire_policy: env::var("ALERT_FIRE_POLICY")
                .ok()
                .and_then(|v| FirePolicy::parse(&v))
                .unwrap_or_default(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            state_file: PathBuf::from(DEFAULT_STATE_FILE),
            live_poll_interval_minutes: 5,
            nearby_radius_km: 15.0,
            http_timeout_secs: 30,
            alert_fire_policy: FirePolicy::default(),
        }
    }
}
