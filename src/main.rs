use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::Value;
use tracing::{info, instrument, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use aqi_dashboard::aggregation::{RepresentativeStationPolicy, SortDirection};
use aqi_dashboard::api::ApiClient;
use aqi_dashboard::app::Application;
use aqi_dashboard::config::Config;
use aqi_dashboard::fetch_error::FetchError;
use aqi_dashboard::geo::Coordinates;
use aqi_dashboard::models::{
    AlertChannel, AlertRule, DailySummaryRequest, PollutantInputs, ShareChannel, ShareSection,
};
use aqi_dashboard::services::favorites_service::{DashboardStats, FavoriteAdded};
use aqi_dashboard::services::{
    AlertService, AnalyticsService, AuthService, FavoritesService, LiveService, NearbyService,
    RankingService, ShareService,
};
use aqi_dashboard::store::{AlertRuleStore, LocalStore, Preferences, SessionStore, Theme};
use aqi_dashboard::view;

#[derive(Parser)]
#[command(name = "aqi-dashboard")]
#[command(about = "Air quality dashboard for Indian cities", long_about = None)]
struct Cli {
    /// Backend base URL
    #[arg(long, env = "API_BASE_URL", global = true)]
    api_base_url: Option<String>,

    /// Local state file (session, alert rules, theme)
    #[arg(long, env = "STATE_FILE", global = true)]
    state_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Live AQI for a city
    Live {
        city: String,
        /// Skip the satellite overlay
        #[arg(long)]
        no_satellite: bool,
    },
    /// Monitoring stations of a city, ranked by AQI
    Stations {
        city: String,
        #[arg(long)]
        ascending: bool,
        /// Use the mean of all stations as the city AQI instead of the maximum
        #[arg(long)]
        mean: bool,
    },
    /// Satellite readings for a city
    Satellite { city: String },
    /// Satellite readings for every mapped city
    Map,
    /// Names of the cities with historical data
    Cities,
    /// Cities currently below an AQI threshold, cleanest first
    SafeZones {
        #[arg(long, default_value_t = 100)]
        threshold: u32,
    },
    /// Rank all monitored cities by AQI
    Ranking {
        /// Cleanest first
        #[arg(long)]
        ascending: bool,
        #[arg(long)]
        mean: bool,
    },
    /// Stations near a location
    Nearby {
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
        #[arg(long, allow_hyphen_values = true)]
        lng: f64,
        /// Search radius in km (defaults to NEARBY_RADIUS_KM)
        #[arg(long)]
        radius: Option<f64>,
    },
    /// Historical AQI statistics for a city
    Analytics { city: String },
    /// Compare two cities
    Compare { city1: String, city2: String },
    /// Compare two to five cities side by side
    CompareMany {
        #[arg(required = true, num_args = 2..=5)]
        cities: Vec<String>,
    },
    /// Cleaner cities to move to
    Migrate {
        city: String,
        #[arg(long)]
        max_results: Option<usize>,
    },
    /// Yearly, seasonal and monthly history for a city
    Historical { city: String },
    /// Predict AQI from pollutant concentrations
    Predict(PollutantArgs),
    /// Log in with email and password
    Login {
        email: String,
        #[arg(long, env = "AQI_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Create an account
    Register {
        name: String,
        email: String,
        #[arg(long, env = "AQI_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Complete an identity-provider sign-in
    OauthCallback {
        #[arg(long)]
        access_token: String,
        /// Provider user object as JSON
        #[arg(long, default_value = "{}")]
        user: String,
    },
    /// Forget the stored session
    Logout,
    /// Show the current session and profile
    Whoami,
    /// Manage favorite cities
    Favorites {
        #[command(subcommand)]
        action: FavoritesAction,
    },
    /// Summary of favorite cities
    Dashboard,
    /// Manage alert rules
    Alerts {
        #[command(subcommand)]
        action: AlertsAction,
    },
    /// Subscribe to a daily AQI summary
    Subscribe {
        city: String,
        /// Delivery time, HH:MM
        #[arg(long)]
        time: String,
        #[arg(long, value_parser = parse_alert_channel)]
        channel: AlertChannel,
        #[arg(long)]
        contact: String,
    },
    /// Send a report of a dashboard section
    Share {
        #[arg(value_parser = parse_share_section)]
        section: ShareSection,
        /// City for live and analytics, first city for compare
        #[arg(long)]
        city: Option<String>,
        /// Second city for compare
        #[arg(long)]
        other: Option<String>,
        #[arg(long, conflicts_with = "phone")]
        email: Option<String>,
        #[arg(long)]
        phone: Option<String>,
        #[command(flatten)]
        pollutants: PollutantArgs,
    },
    /// Ask the assistant
    Chat {
        #[arg(required = true)]
        query: Vec<String>,
    },
    /// Show, set or toggle the color theme
    Theme {
        /// light, dark or toggle
        value: Option<String>,
    },
    /// Follow the live AQI of a city, with alerts
    Watch { city: String },
}

#[derive(Subcommand)]
enum FavoritesAction {
    List,
    Add { city: String },
    Remove { city: String },
}

#[derive(Subcommand)]
enum AlertsAction {
    Add {
        city: String,
        #[arg(long)]
        threshold: f64,
        #[arg(long, default_value = "00:00")]
        start: String,
        #[arg(long, default_value = "23:59")]
        end: String,
        #[arg(long, value_parser = parse_alert_channel, default_value = "browser")]
        channel: AlertChannel,
        #[arg(long)]
        contact: Option<String>,
    },
    List,
    Clear,
}

#[derive(Args, Clone, Copy)]
struct PollutantArgs {
    #[arg(long, default_value_t = 0.0)]
    pm25: f64,
    #[arg(long, default_value_t = 0.0)]
    pm10: f64,
    #[arg(long, default_value_t = 0.0)]
    no2: f64,
    #[arg(long, default_value_t = 0.0)]
    so2: f64,
    #[arg(long, default_value_t = 0.0)]
    co: f64,
    #[arg(long, default_value_t = 0.0)]
    o3: f64,
}

impl From<PollutantArgs> for PollutantInputs {
    fn from(args: PollutantArgs) -> Self {
        PollutantInputs {
            pm25: args.pm25,
            pm10: args.pm10,
            no2: args.no2,
            so2: args.so2,
            co: args.co,
            o3: args.o3,
        }
    }
}

fn parse_alert_channel(value: &str) -> Result<AlertChannel, String> {
    AlertChannel::parse(value)
        .ok_or_else(|| format!("unknown channel '{}' (browser, email, whatsapp, telegram)", value))
}

fn parse_share_section(value: &str) -> Result<ShareSection, String> {
    serde_json::from_value(Value::String(value.trim().to_ascii_lowercase())).map_err(|_| {
        format!(
            "unknown section '{}' (live, ranking, analytics, compare, predict)",
            value
        )
    })
}

fn spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

fn direction(ascending: bool) -> SortDirection {
    if ascending {
        SortDirection::Ascending
    } else {
        SortDirection::Descending
    }
}

fn policy(mean: bool) -> RepresentativeStationPolicy {
    if mean {
        RepresentativeStationPolicy::Mean
    } else {
        RepresentativeStationPolicy::Max
    }
}

/// Services sharing one client and one state file.
struct Context {
    config: Config,
    api: ApiClient,
    store: LocalStore,
    sessions: SessionStore,
}

impl Context {
    fn new(config: Config) -> Result<Self, FetchError> {
        let store = LocalStore::open(config.state_file.clone());
        let sessions = SessionStore::new(store.clone());
        let api = ApiClient::new(
            &config.api_base_url,
            Duration::from_secs(config.http_timeout_secs),
        )?
        .with_session(sessions.clone());
        Ok(Self {
            config,
            api,
            store,
            sessions,
        })
    }

    fn analytics(&self) -> AnalyticsService {
        AnalyticsService::new(self.api.clone())
    }

    fn auth(&self) -> AuthService {
        AuthService::new(self.api.clone(), self.sessions.clone())
    }

    fn favorites(&self) -> FavoritesService {
        FavoritesService::new(self.api.clone(), self.sessions.clone())
    }

    fn alerts(&self) -> AlertService {
        AlertService::new(self.api.clone(), AlertRuleStore::new(self.store.clone()))
    }
}

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Logs go to stderr so stdout carries only the rendered views
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,aqi_dashboard=debug")),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_thread_ids(true)
                .with_line_number(true),
        )
        .init();

    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let mut config = Config::from_env();
    if let Some(url) = cli.api_base_url {
        config.api_base_url = url.trim_end_matches('/').to_string();
    }
    if let Some(path) = cli.state_file {
        config.state_file = path;
    }
    info!("Using backend {}", config.api_base_url);

    let ctx = Context::new(config)?;
    if let Err(e) = run(&ctx, cli.command).await {
        eprintln!("Error: {}", e.user_message());
        std::process::exit(1);
    }
    Ok(())
}

async fn run(ctx: &Context, command: Command) -> Result<(), FetchError> {
    match command {
        Command::Live { city, no_satellite } => {
            let snapshot = LiveService::new(ctx.api.clone())
                .snapshot(&city, !no_satellite)
                .await?;
            println!("{}", view::render_live(&snapshot));
            if ctx.sessions.is_authenticated() {
                match ctx.favorites().is_favorite(&city).await {
                    Ok(is_favorite) => {
                        println!("{}", view::render_favorite_marker(city.trim(), is_favorite))
                    }
                    Err(e) => warn!("Could not check favorites: {}", e),
                }
            }
        }
        Command::Stations {
            city,
            ascending,
            mean,
        } => {
            let ranking = RankingService::new(ctx.api.clone(), policy(mean))
                .station_ranking(&city, direction(ascending))
                .await?;
            println!("{}", view::render_stations(&ranking));
        }
        Command::Satellite { city } => {
            let reading = ctx.api.satellite_live(&city).await?;
            println!("{}", view::render_satellite(&reading));
        }
        Command::Map => {
            let readings = LiveService::new(ctx.api.clone()).satellite_map().await?;
            println!("{}", view::render_map(&readings));
        }
        Command::Cities => {
            let cities = ctx.api.cities().await?;
            println!("{}", view::render_city_names(&cities));
        }
        Command::SafeZones { threshold } => {
            let zones = RankingService::new(ctx.api.clone(), policy(false))
                .safe_zones(threshold)
                .await?;
            println!("{}", view::render_safe_zones(&zones, threshold));
        }
        Command::Ranking { ascending, mean } => {
            let pb = spinner("Fetching stations for every city...");
            let result = RankingService::new(ctx.api.clone(), policy(mean))
                .city_ranking(direction(ascending))
                .await;
            pb.finish_and_clear();
            println!("{}", view::render_city_ranking(&result?));
        }
        Command::Nearby { lat, lng, radius } => {
            let service = NearbyService::new(ctx.api.clone(), ctx.config.nearby_radius_km);
            let radius = radius.unwrap_or_else(|| service.radius_km());
            let pb = spinner("Searching nearby stations...");
            let result = service
                .find_nearby_within(Coordinates::new(lat, lng), radius)
                .await;
            pb.finish_and_clear();
            println!("{}", view::render_nearby(&result?, radius));
        }
        Command::Analytics { city } => {
            let analytics = ctx.analytics().city_analytics(&city).await?;
            println!("{}", view::render_analytics(&analytics));
        }
        Command::Compare { city1, city2 } => {
            let comparison = ctx.analytics().compare(&city1, &city2).await?;
            println!("{}", view::render_comparison(&comparison));
        }
        Command::CompareMany { cities } => {
            let comparison = ctx.analytics().compare_many(&cities).await?;
            println!("{}", view::render_multi_city(&comparison));
        }
        Command::Migrate { city, max_results } => {
            let advice = ctx.analytics().migration_advice(&city, max_results).await?;
            println!("{}", view::render_migration(&advice));
        }
        Command::Historical { city } => {
            let report = ctx.analytics().historical(&city).await?;
            println!("{}", view::render_historical(&report));
        }
        Command::Predict(args) => {
            let prediction = ctx.analytics().predict(args.into()).await?;
            println!("{}", view::render_prediction(&prediction));
        }
        Command::Login { email, password } => {
            let session = ctx.auth().login(&email, &password).await?;
            println!("{}", view::render_session(&session));
        }
        Command::Register {
            name,
            email,
            password,
        } => {
            let session = ctx.auth().register(&name, &email, &password).await?;
            println!("{}", view::render_session(&session));
        }
        Command::OauthCallback { access_token, user } => {
            let user: Value = serde_json::from_str(&user)?;
            let session = ctx.auth().complete_oauth(&access_token, &user).await?;
            println!("{}", view::render_session(&session));
        }
        Command::Logout => {
            ctx.auth().logout()?;
            println!("Logged out");
        }
        Command::Whoami => {
            let auth = ctx.auth();
            let session = auth.current();
            println!("{}", view::render_session(&session));
            if session.is_authenticated() {
                let profile = auth.profile().await?;
                println!("{}", view::render_profile(&profile));
            }
        }
        Command::Favorites { action } => match action {
            FavoritesAction::List => {
                let favorites = ctx.favorites().list().await?;
                println!(
                    "{}",
                    view::render_dashboard(&DashboardStats::from_favorites(favorites))
                );
            }
            FavoritesAction::Add { city } => match ctx.favorites().add(&city).await? {
                FavoriteAdded::Added => println!("Added {} to favorites", city.trim()),
                FavoriteAdded::AlreadyFavorite(existing) => {
                    println!("{} is already a favorite ({})", city.trim(), existing)
                }
            },
            FavoritesAction::Remove { city } => {
                ctx.favorites().remove(&city).await?;
                println!("Removed {} from favorites", city.trim());
            }
        },
        Command::Dashboard => {
            let stats = ctx.favorites().dashboard().await?;
            println!("{}", view::render_dashboard(&stats));
        }
        Command::Alerts { action } => match action {
            AlertsAction::Add {
                city,
                threshold,
                start,
                end,
                channel,
                contact,
            } => {
                let rule = AlertRule {
                    city: city.trim().to_string(),
                    threshold,
                    start,
                    end,
                    channel,
                    contact,
                };
                let rules = ctx.alerts().add_rule(rule).await?;
                println!("{}", view::render_alert_rules(&rules));
            }
            AlertsAction::List => {
                println!("{}", view::render_alert_rules(&ctx.alerts().list()?));
            }
            AlertsAction::Clear => {
                ctx.alerts().clear()?;
                println!("Alert rules cleared");
            }
        },
        Command::Subscribe {
            city,
            time,
            channel,
            contact,
        } => {
            let request = DailySummaryRequest {
                city: city.trim().to_string(),
                time,
                channel,
                contact,
            };
            ctx.alerts().subscribe_daily_summary(&request).await?;
            println!("Daily summary for {} scheduled at {}", request.city, request.time);
        }
        Command::Share {
            section,
            city,
            other,
            email,
            phone,
            pollutants,
        } => {
            let payload = share_payload(ctx, section, city, other, pollutants).await?;
            let (channel, contact) = match (email, phone) {
                (Some(email), _) => (ShareChannel::Email, email),
                (None, Some(phone)) => (ShareChannel::Whatsapp, phone),
                (None, None) => {
                    return Err(FetchError::InvalidInput(
                        "Provide --email or --phone".to_string(),
                    ))
                }
            };
            let receipt = ShareService::new(ctx.api.clone())
                .share(section, payload, channel, &contact)
                .await?;
            println!("{}", view::render_share_receipt(&receipt));
        }
        Command::Chat { query } => {
            let reply = ShareService::new(ctx.api.clone())
                .ask(&query.join(" "))
                .await?;
            println!("{}", view::render_chat(&reply));
        }
        Command::Theme { value } => {
            let preferences = Preferences::new(ctx.store.clone());
            let theme = match value.as_deref() {
                None => preferences.theme()?,
                Some("toggle") => {
                    let theme = preferences.theme()?.toggled();
                    preferences.set_theme(theme)?;
                    theme
                }
                Some(other) => {
                    let theme = Theme::parse(other).ok_or_else(|| {
                        FetchError::InvalidInput("Theme must be light, dark or toggle".to_string())
                    })?;
                    preferences.set_theme(theme)?;
                    theme
                }
            };
            println!("{}", view::render_theme(theme));
        }
        Command::Watch { city } => {
            Application::build(&ctx.config, &city)
                .await?
                .run_until_stopped()
                .await?;
        }
    }
    Ok(())
}

/// Current data of `section`, as sent with a share request.
async fn share_payload(
    ctx: &Context,
    section: ShareSection,
    city: Option<String>,
    other: Option<String>,
    pollutants: PollutantArgs,
) -> Result<Value, FetchError> {
    let require = |value: Option<String>, flag: &str| {
        value
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| {
                FetchError::InvalidInput(format!("--{} is required for this section", flag))
            })
    };

    Ok(match section {
        ShareSection::Live => LiveService::new(ctx.api.clone())
            .snapshot(&require(city, "city")?, false)
            .await?
            .share_payload(),
        ShareSection::Ranking => RankingService::new(ctx.api.clone(), policy(false))
            .city_ranking(SortDirection::Descending)
            .await?
            .share_payload(),
        ShareSection::Analytics => ctx
            .analytics()
            .city_analytics(&require(city, "city")?)
            .await?
            .share_payload(),
        ShareSection::Compare => ctx
            .analytics()
            .compare(&require(city, "city")?, &require(other, "other")?)
            .await?
            .share_payload(),
        ShareSection::Predict => ctx.analytics().predict(pollutants.into()).await?.share_payload(),
    })
}
