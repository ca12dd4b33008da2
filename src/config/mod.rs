/// Database connection and schema creation
pub mod database;

/// Application settings loading from settings.toml
pub mod settings;

pub use settings::{AccountSettings, AggregationSettings, AppConfig, DatabaseSettings};
