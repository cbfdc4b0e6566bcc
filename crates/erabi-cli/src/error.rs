use std::path::PathBuf;
use std::time::Duration;

use erabi_core::ErabiError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] ErabiError),

    #[error("failed to read fixture {path}: {source}")]
    FixtureIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid fixture {path}: {source}")]
    FixtureParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("fixture {path} defines source {id:?} twice")]
    DuplicateSource { path: PathBuf, id: String },

    #[error("timed out after {0:?} waiting for sources")]
    Timeout(Duration),

    #[error("failed to encode report: {0}")]
    Json(#[from] serde_json::Error),
}
