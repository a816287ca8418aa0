use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::alerts::{AlertMonitor, LogNotifier};
use crate::api::ApiClient;
use crate::config::Config;
use crate::fetch_error::FetchError;
use crate::models::Session;
use crate::scheduler::{self, LiveUpdate};
use crate::services::LiveService;
use crate::store::{AlertRuleStore, LocalStore, SessionStore};
use crate::view;

/// How often the state file is re-read for logins and logouts made by
/// another process.
const SESSION_REFRESH_SECS: u64 = 5;

/// Live watch mode with its background tasks.
///
/// The poller refreshes the reading and evaluates alert rules; a second task
/// keeps the session in sync with the state file. Both are aborted when
/// [`Application::run_until_stopped`] returns.
pub struct Application {
    pub poller_handle: JoinHandle<()>,
    pub session_handle: JoinHandle<()>,
    updates: watch::Receiver<Option<LiveUpdate>>,
    sessions: watch::Receiver<Session>,
}

impl Application {
    /// Build the services for `city` and spawn:
    /// - the live poller (configurable interval, default 5 min)
    /// - the session refresher
    pub async fn build(config: &Config, city: &str) -> Result<Self, FetchError> {
        info!("Initializing watch mode for {}", city);

        let store = LocalStore::open(config.state_file.clone());
        let session_store = SessionStore::new(store.clone());
        let api = ApiClient::new(
            &config.api_base_url,
            Duration::from_secs(config.http_timeout_secs),
        )?
        .with_session(session_store.clone());

        let live = LiveService::new(api);
        let monitor = Arc::new(AlertMonitor::new(
            AlertRuleStore::new(store),
            LogNotifier,
            config.alert_fire_policy,
        ));

        let (tx, updates) = watch::channel(None);
        let interval = Duration::from_secs(config.live_poll_interval_minutes.max(1) * 60);

        let poller_handle = {
            let city = city.trim().to_string();
            tokio::spawn(async move {
                scheduler::start_live_poller(live, city, interval, tx, Some(monitor)).await;
            })
        };

        let sessions = session_store.subscribe();
        let session_handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(SESSION_REFRESH_SECS));
            loop {
                ticker.tick().await;
                session_store.refresh();
            }
        });

        info!("Watch mode initialized, refreshing every {:?}", interval);

        Ok(Self {
            poller_handle,
            session_handle,
            updates,
            sessions,
        })
    }

    /// Prints every fresh reading and session change until Ctrl-C.
    pub async fn run_until_stopped(mut self) -> Result<(), FetchError> {
        println!("{}", view::render_session(&self.sessions.borrow_and_update()));

        loop {
            tokio::select! {
                changed = self.updates.changed() => {
                    if changed.is_err() {
                        debug!("Live poller stopped");
                        break;
                    }
                    let update = self.updates.borrow_and_update().clone();
                    if let Some(update) = update {
                        println!();
                        println!("{}", view::render_live(&update.snapshot));
                        for rule in &update.fired {
                            println!(
                                "ALERT: {} AQI at or above {} ({} - {})",
                                rule.city, rule.threshold, rule.start, rule.end
                            );
                        }
                    }
                }
                changed = self.sessions.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let session = self.sessions.borrow_and_update().clone();
                    println!("{}", view::render_session(&session));
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("Stopping watch mode");
                    break;
                }
            }
        }

        self.poller_handle.abort();
        self.session_handle.abort();
        Ok(())
    }
}
