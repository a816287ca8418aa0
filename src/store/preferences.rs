use std::fmt;

use crate::store::local_store::THEME_KEY;
use crate::store::{LocalStore, StoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "light" => Some(Theme::Light),
            "dark" => Some(Theme::Dark),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct Preferences {
    store: LocalStore,
}

impl Preferences {
    pub fn new(store: LocalStore) -> Self {
        Self { store }
    }

    /// Unknown or missing values fall back to the light theme.
    pub fn theme(&self) -> Result<Theme, StoreError> {
        Ok(self
            .store
            .get(THEME_KEY)?
            .and_then(|v| Theme::parse(&v))
            .unwrap_or_default())
    }

    pub fn set_theme(&self, theme: Theme) -> Result<(), StoreError> {
        self.store.set(THEME_KEY, theme.as_str())
    }
}
