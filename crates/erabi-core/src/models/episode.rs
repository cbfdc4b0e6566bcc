use std::fmt;

use serde::{Deserialize, Serialize};

/// Position of an episode within its subject.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EpisodeSort {
    Normal(u32),
    /// Specials such as "SP1" or "OVA" that sit outside the main numbering.
    Special(String),
}

impl fmt::Display for EpisodeSort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Normal(n) => write!(f, "{n:02}"),
            Self::Special(label) => f.write_str(label),
        }
    }
}

/// Episodes covered by one media item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EpisodeRange {
    Single(EpisodeSort),
    /// Inclusive run of normal episodes.
    Range { start: u32, end: u32 },
    /// A whole season; the number is unknown for e.g. disc rips.
    Season(Option<u32>),
    Combined(Vec<EpisodeRange>),
}

impl EpisodeRange {
    pub fn is_single_episode(&self) -> bool {
        match self {
            Self::Single(_) => true,
            Self::Range { start, end } => start == end,
            Self::Season(_) => false,
            Self::Combined(parts) => parts.len() == 1 && parts[0].is_single_episode(),
        }
    }

    /// Whether this item is a season pack.
    pub fn has_season(&self) -> bool {
        match self {
            Self::Season(_) => true,
            Self::Combined(parts) => parts.iter().any(EpisodeRange::has_season),
            Self::Single(_) | Self::Range { .. } => false,
        }
    }

    pub fn contains(&self, sort: &EpisodeSort) -> bool {
        match (self, sort) {
            (Self::Single(own), _) => own == sort,
            (Self::Range { start, end }, EpisodeSort::Normal(n)) => (*start..=*end).contains(n),
            (Self::Range { .. }, EpisodeSort::Special(_)) => false,
            (Self::Season(_), _) => true,
            (Self::Combined(parts), _) => parts.iter().any(|p| p.contains(sort)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_and_season() {
        let single = EpisodeRange::Single(EpisodeSort::Normal(5));
        assert!(single.is_single_episode());
        assert!(!single.has_season());

        let season = EpisodeRange::Season(None);
        assert!(!season.is_single_episode());
        assert!(season.has_season());

        let combined = EpisodeRange::Combined(vec![
            EpisodeRange::Range { start: 1, end: 12 },
            EpisodeRange::Season(Some(2)),
        ]);
        assert!(combined.has_season());
        assert!(!combined.is_single_episode());
    }

    #[test]
    fn test_contains() {
        let range = EpisodeRange::Range { start: 1, end: 12 };
        assert!(range.contains(&EpisodeSort::Normal(12)));
        assert!(!range.contains(&EpisodeSort::Normal(13)));
        assert!(!range.contains(&EpisodeSort::Special("SP".into())));
        assert!(EpisodeRange::Season(None).contains(&EpisodeSort::Normal(40)));
    }

    #[test]
    fn test_sort_display() {
        assert_eq!(EpisodeSort::Normal(5).to_string(), "05");
        assert_eq!(EpisodeSort::Special("OVA".into()).to_string(), "OVA");
    }
}
