pub mod alert_service;
pub mod analytics_service;
pub mod auth_service;
pub mod favorites_service;
pub mod live_service;
pub mod nearby_service;
pub mod ranking_service;
pub mod share_service;

pub use alert_service::AlertService;
pub use analytics_service::AnalyticsService;
pub use auth_service::AuthService;
pub use favorites_service::FavoritesService;
pub use live_service::LiveService;
pub use nearby_service::NearbyService;
pub use ranking_service::RankingService;
pub use share_service::ShareService;
