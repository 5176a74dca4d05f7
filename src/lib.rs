pub mod analytics;
pub mod api;
pub mod config;
pub mod error;
pub mod location;
pub mod models;
pub mod observability;
pub mod session;
pub mod state;
pub mod tracking;
