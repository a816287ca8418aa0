use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::aggregation::{average, round_one_decimal};
use crate::api::ApiClient;
use crate::fetch_error::FetchError;
use crate::models::FavoriteEntry;
use crate::store::SessionStore;
use crate::utils::same_city;

/// Upper AQI of a "good" favorite on the dashboard.
pub const GOOD_AQI_MAX: f64 = 50.0;
/// Favorites above this AQI count as "bad" on the dashboard.
pub const BAD_AQI_MIN: f64 = 150.0;

#[derive(Debug, Clone, Serialize)]
pub struct DashboardStats {
    pub favorites: Vec<FavoriteEntry>,
    pub count: usize,
    pub good: usize,
    pub bad: usize,
    pub average_aqi: Option<f64>,
}

impl DashboardStats {
    pub fn from_favorites(favorites: Vec<FavoriteEntry>) -> Self {
        let values: Vec<f64> = favorites.iter().filter_map(|f| f.aqi).collect();
        Self {
            count: favorites.len(),
            good: values.iter().filter(|v| **v <= GOOD_AQI_MAX).count(),
            bad: values.iter().filter(|v| **v > BAD_AQI_MIN).count(),
            average_aqi: average(&values).map(round_one_decimal),
            favorites,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FavoriteAdded {
    Added,
    /// Stored name of the favorite that already covers the city.
    AlreadyFavorite(String),
}

#[derive(Clone)]
pub struct FavoritesService {
    api: ApiClient,
    sessions: SessionStore,
}

impl FavoritesService {
    pub fn new(api: ApiClient, sessions: SessionStore) -> Self {
        Self { api, sessions }
    }

    fn require_session(&self) -> Result<(), FetchError> {
        if self.sessions.is_authenticated() {
            Ok(())
        } else {
            Err(FetchError::LoginRequired)
        }
    }

    #[instrument(skip(self))]
    pub async fn list(&self) -> Result<Vec<FavoriteEntry>, FetchError> {
        self.require_session()?;
        self.api.favorites().await
    }

    /// Adds `city` unless a favorite with the same normalized name exists,
    /// so "Connaught Place, Delhi, India" is not added next to "Delhi".
    #[instrument(skip(self))]
    pub async fn add(&self, city: &str) -> Result<FavoriteAdded, FetchError> {
        let favorites = self.list().await?;
        if let Some(existing) = favorites.iter().find(|f| same_city(&f.city, city)) {
            debug!("{} already a favorite as {}", city.trim(), existing.city);
            return Ok(FavoriteAdded::AlreadyFavorite(existing.city.clone()));
        }
        self.api.add_favorite(city).await?;
        info!("Added {} to favorites", city.trim());
        Ok(FavoriteAdded::Added)
    }

    #[instrument(skip(self))]
    pub async fn remove(&self, city: &str) -> Result<(), FetchError> {
        self.require_session()?;
        self.api.remove_favorite(city).await?;
        info!("Removed {} from favorites", city.trim());
        Ok(())
    }

    /// Whether `city` is among `favorites`, comparing normalized names.
    pub fn contains(favorites: &[FavoriteEntry], city: &str) -> bool {
        favorites.iter().any(|f| same_city(&f.city, city))
    }

    pub async fn is_favorite(&self, city: &str) -> Result<bool, FetchError> {
        Ok(Self::contains(&self.list().await?, city))
    }

    pub async fn dashboard(&self) -> Result<DashboardStats, FetchError> {
        Ok(DashboardStats::from_favorites(self.list().await?))
    }
}
