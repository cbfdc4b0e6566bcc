//! Concurrent fetching across media sources.
//!
//! A [`MediaFetcher`] binds a fixed set of sources. Each
//! [`MediaFetchSession`] it creates owns one [`SourceFetchResult`] per source
//! and merges their results. All result streams are lazily started and
//! shared: the first observer triggers work, later observers replay the
//! latest snapshot, and work is torn down after
//! [`FetcherConfig::stop_timeout`] without observers.

mod fetcher;
mod registry;
mod request;
mod result;
mod session;
mod share;
mod source;
mod state;

pub use fetcher::{FetcherConfig, MediaFetcher};
pub use registry::SessionRegistry;
pub use result::SourceFetchResult;
pub use session::MediaFetchSession;
pub use source::{MediaSource, MediaSourceInfo, MediaSourceInstance, PagedSource};
pub use state::{AbandonCause, CompletedCondition, FetchState};
