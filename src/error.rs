use thiserror::Error;

#[derive(Error, Debug)]
pub enum ListingError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP server error: {0}")]
    Server(#[from] hyper::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{entity} with ID {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    #[error("{0}")]
    Validation(String),

    #[error("Database connection lock was poisoned")]
    LockPoisoned,
}

pub type Result<T> = std::result::Result<T, ListingError>;
