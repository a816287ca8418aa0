// Configuration loading from environment variables

use aqi_dashboard::alerts::FirePolicy;
use aqi_dashboard::config::{Config, DEFAULT_API_BASE_URL};
use serial_test::serial;
use std::env;
use std::path::PathBuf;

const VARS: [&str; 6] = [
    "API_BASE_URL",
    "STATE_FILE",
    "LIVE_POLL_INTERVAL_MINUTES",
    "NEARBY_RADIUS_KM",
    "HTTP_TIMEOUT_SECS",
    "ALERT_FIRE_POLICY",
];

fn clear_env() {
    for var in VARS {
        env::remove_var(var);
    }
}

#[test]
#[serial]
fn test_config_defaults() {
    clear_env();

    let config = Config::from_env();
    assert_eq!(config.api_base_url, DEFAULT_API_BASE_URL);
    assert_eq!(config.live_poll_interval_minutes, 5);
    assert_eq!(config.nearby_radius_km, 15.0);
    assert_eq!(config.http_timeout_secs, 30);
    assert_eq!(config.alert_fire_policy, FirePolicy::OncePerDay);
}

#[test]
#[serial]
fn test_config_from_env() {
    clear_env();
    env::set_var("API_BASE_URL", "https://aqi.example.in/");
    env::set_var("STATE_FILE", "/tmp/aqi-state.json");
    env::set_var("LIVE_POLL_INTERVAL_MINUTES", "2");
    env::set_var("NEARBY_RADIUS_KM", "25.5");
    env::set_var("ALERT_FIRE_POLICY", "every-check");

    let config = Config::from_env();
    assert_eq!(config.api_base_url, "https://aqi.example.in");
    assert_eq!(config.state_file, PathBuf::from("/tmp/aqi-state.json"));
    assert_eq!(config.live_poll_interval_minutes, 2);
    assert_eq!(config.nearby_radius_km, 25.5);
    assert_eq!(config.alert_fire_policy, FirePolicy::EveryCheck);

    clear_env();
}

#[test]
#[serial]
fn test_config_invalid_numbers_fall_back() {
    clear_env();
    env::set_var("LIVE_POLL_INTERVAL_MINUTES", "soon");
    env::set_var("NEARBY_RADIUS_KM", "far");
    env::set_var("ALERT_FIRE_POLICY", "sometimes");

    let config = Config::from_env();
    assert_eq!(config.live_poll_interval_minutes, 5);
    assert_eq!(config.nearby_radius_km, 15.0);
    assert_eq!(config.alert_fire_policy, FirePolicy::OncePerDay);

    clear_env();
}
