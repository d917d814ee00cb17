use thiserror::Error;

#[derive(Error, Debug)]
pub enum WarehouseError {
    #[error("Connection failed: {message}")]
    Connection { message: String },

    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    #[cfg(feature = "redshift")]
    #[error(transparent)]
    Postgres(#[from] sqlx::Error),

    #[error("Invalid record in {path} line {line}: {message}")]
    InvalidRecord {
        path: String,
        line: usize,
        message: String,
    },

    #[error("Table '{table}' depends on '{dependency}' which is not created or loaded before it")]
    DependencyOrder { table: String, dependency: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("JSON deserialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Directory walk failed: {0}")]
    Walk(#[from] walkdir::Error),
}

pub type Result<T> = std::result::Result<T, WarehouseError>;
