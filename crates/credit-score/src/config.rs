use std::path::Path;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

pub const DEFAULT_OUTPUT_PATH: &str = "wallet_scores.csv";
pub const DEFAULT_LOG_FILTER: &str = "wallet_credit_score=info,credit_core=info";

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub output: OutputConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct OutputConfig {
    /// CSV file the score table is written to
    pub path: String,
    /// Sort rows by score, highest first
    pub rank: bool,
    /// Re-read the written table and re-score every row
    pub verify: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// `EnvFilter` directives, used when `RUST_LOG` is unset
    pub filter: String,
    /// Emit JSON log lines instead of the human-readable format
    pub json: bool,
}

impl AppConfig {
    pub fn load(config_file: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder()
            .set_default("output.path", DEFAULT_OUTPUT_PATH)?
            .set_default("output.rank", false)?
            .set_default("output.verify", false)?
            .set_default("logging.filter", DEFAULT_LOG_FILTER)?
            .set_default("logging.json", false)?
            // Load from config files if they exist
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false));

        if let Some(path) = config_file {
            builder = builder.add_source(File::from(path).required(true));
        }

        // Override with environment variables (CREDIT__OUTPUT__PATH, etc.)
        let config = builder
            .add_source(
                Environment::with_prefix("CREDIT")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}
