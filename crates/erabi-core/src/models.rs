pub mod episode;
pub mod media;
pub mod preference;
pub mod request;
pub mod resolution;

pub use episode::{EpisodeRange, EpisodeSort};
pub use media::{
    Media, MediaExtraFiles, MediaList, MediaProperties, MediaSourceKind, MediaSourceLocation,
    Subtitle, SubtitleKind,
};
pub use preference::{MediaPreference, OptionalPreference};
pub use request::MediaFetchRequest;
