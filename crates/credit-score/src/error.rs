use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed JSON input: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Score mismatch for wallet {wallet}: table has {written}, features give {recomputed}")]
    ScoreMismatch {
        wallet: String,
        written: u16,
        recomputed: u16,
    },

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error(transparent)]
    Credit(#[from] credit_core::CreditError),
}

impl AppError {
    pub fn io(path: &Path) -> impl FnOnce(std::io::Error) -> AppError + '_ {
        move |source| AppError::Io {
            path: path.display().to_string(),
            source,
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;
