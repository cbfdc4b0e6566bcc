use serde::{Deserialize, Serialize};

use super::episode::EpisodeSort;

/// What a fetch session searches for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaFetchRequest {
    pub subject_id: String,
    pub episode_id: String,
    /// Name used as the primary search keyword.
    pub subject_primary_name: String,
    /// Every known name of the subject, including the primary one.
    pub subject_names: Vec<String>,
    pub episode_sort: EpisodeSort,
    /// Episode number within its season, when it differs from `episode_sort`.
    pub episode_ep: Option<EpisodeSort>,
    pub episode_name: String,
}
