use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("failed to read reference catalog {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse TOML reference catalog: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("failed to parse JSON reference catalog: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unsupported reference catalog format: {0:?}")]
    UnsupportedFormat(PathBuf),

    #[error("reference ids start at 1, found {0}")]
    InvalidId(u32),

    #[error("reference id {0} is defined more than once")]
    DuplicateId(u32),

    #[error("reference {0} has an empty target phrase")]
    EmptyPhrase(u32),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("poll.max_attempts must be at least 1")]
    InvalidAttempts,
}
