pub mod alert_rules;
pub mod error;
pub mod local_store;
pub mod preferences;
pub mod session;

pub use alert_rules::AlertRuleStore;
pub use error::StoreError;
pub use local_store::LocalStore;
pub use preferences::{Preferences, Theme};
pub use session::SessionStore;
