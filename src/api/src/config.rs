//! Configuration for the Arima dashboard.

use serde::{Deserialize, Serialize};

use crate::types::RaceContext;

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Model configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default = "default_model_path")]
    pub path: String,
}

fn default_model_path() -> String {
    "data/models/arima_model.onnx".to_string()
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            path: default_model_path(),
        }
    }
}

/// Input data locations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    /// Per-horse feature table (CSV)
    #[serde(default = "default_features_path")]
    pub features_path: String,
    /// SQLite database holding `race_history`
    #[serde(default = "default_db_path")]
    pub db_path: String,
}

fn default_features_path() -> String {
    "data/processed/arima_kinen_features.csv".to_string()
}

fn default_db_path() -> String {
    "data/races.db".to_string()
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            features_path: default_features_path(),
            db_path: default_db_path(),
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub data: DataConfig,
    /// Race context used when a request leaves a parameter out
    #[serde(default)]
    pub race: RaceContext,
}

impl AppConfig {
    /// Load configuration from environment and config file
    pub fn load() -> anyhow::Result<Self> {
        let config = config::Config::builder()
            // Start with defaults
            .add_source(config::Config::try_from(&AppConfig::default())?)
            // Add config file if exists
            .add_source(config::File::with_name("config").required(false))
            // Override with environment variables (ARIMA_DATA__DB_PATH, etc.)
            .add_source(
                config::Environment::with_prefix("ARIMA")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(config.try_deserialize()?)
    }
}

/// Feature names in model input order
pub const FEATURE_NAMES: [&str; 10] = [
    "Speed_kph",
    "PosChange",
    "FinalCornerPos",
    "Runners",
    "AvgPlacement_Last3",
    "DaysSinceLastRace",
    "Distance",
    "RaceGrade_numeric",
    "Course",
    "Track",
];

/// Column holding the horse name in the feature table
pub const HORSE_COLUMN: &str = "Horse";
