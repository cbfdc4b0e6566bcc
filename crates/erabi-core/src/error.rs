use thiserror::Error;

#[derive(Debug, Error)]
pub enum ErabiError {
    #[error("config error: {0}")]
    Config(String),

    #[error("no Tokio runtime available: {0}")]
    NoRuntime(#[from] tokio::runtime::TryCurrentError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A failure reported by a media source adapter.
///
/// Only ever surfaces through that source's fetch state; it never fails the
/// session or other sources.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("network error: {0}")]
    Network(String),

    #[error("unexpected status {status} from {url}")]
    Status { status: u16, url: String },

    #[error("could not parse response: {0}")]
    Parse(String),

    #[error("{0}")]
    Other(String),
}
