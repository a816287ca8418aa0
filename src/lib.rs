pub mod aggregation;
pub mod alerts;
pub mod api;
pub mod app;
pub mod category;
pub mod config;
pub mod fetch_error;
pub mod geo;
pub mod models;
pub mod scheduler;
pub mod services;
pub mod store;
pub mod utils;
pub mod view;
