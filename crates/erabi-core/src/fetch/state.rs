use std::fmt;
use std::sync::Arc;

use crate::error::SourceError;
use crate::models::MediaSourceKind;

/// Why a query ended on our side rather than the source's.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbandonCause {
    /// Every observer left and the cooldown elapsed mid-query.
    Cancelled,
    /// The owning session was closed mid-query.
    SessionClosed,
    /// The request stream ended without producing a request.
    RequestUnavailable,
    /// The accumulation pipeline panicked.
    PipelinePanicked,
}

impl fmt::Display for AbandonCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Cancelled => "cancelled after observers left",
            Self::SessionClosed => "session closed",
            Self::RequestUnavailable => "no request was provided",
            Self::PipelinePanicked => "result pipeline panicked",
        };
        f.write_str(text)
    }
}

/// Lifecycle of one source within a session.
///
/// `Idle -> Working -> {PendingSuccess -> Succeeded | Failed | Abandoned}`.
/// Terminal states carry the generation they belong to; only `restart`
/// leaves a terminal state, by starting a new generation.
#[derive(Debug, Clone)]
pub enum FetchState {
    Idle,
    Working,
    /// The source is exhausted but the final snapshot is not cached yet.
    PendingSuccess { generation: u64 },
    Succeeded { generation: u64 },
    /// The source reported an error.
    Failed {
        cause: Arc<SourceError>,
        generation: u64,
    },
    /// The query was torn down on our side.
    Abandoned { cause: AbandonCause, generation: u64 },
    Disabled,
}

impl FetchState {
    /// `Succeeded`, `Failed` or `Abandoned`.
    pub fn is_completed(&self) -> bool {
        matches!(
            self,
            Self::Succeeded { .. } | Self::Failed { .. } | Self::Abandoned { .. }
        )
    }

    pub fn is_completed_or_disabled(&self) -> bool {
        self.is_completed() || matches!(self, Self::Disabled)
    }

    /// Whether a run for `generation` already happened and must not repeat.
    pub(crate) fn finished_generation(&self, generation: u64) -> bool {
        match self {
            Self::PendingSuccess { generation: g }
            | Self::Succeeded { generation: g }
            | Self::Failed { generation: g, .. }
            | Self::Abandoned { generation: g, .. } => *g == generation,
            Self::Idle | Self::Working | Self::Disabled => false,
        }
    }

    /// States from which `restart` may start a new generation.
    pub(crate) fn is_restartable(&self) -> bool {
        self.is_completed_or_disabled()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Working => "working",
            Self::PendingSuccess { .. } => "pending_success",
            Self::Succeeded { .. } => "succeeded",
            Self::Failed { .. } => "failed",
            Self::Abandoned { .. } => "abandoned",
            Self::Disabled => "disabled",
        }
    }
}

impl PartialEq for FetchState {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Idle, Self::Idle)
            | (Self::Working, Self::Working)
            | (Self::Disabled, Self::Disabled) => true,
            (Self::PendingSuccess { generation: a }, Self::PendingSuccess { generation: b })
            | (Self::Succeeded { generation: a }, Self::Succeeded { generation: b }) => a == b,
            (
                Self::Failed {
                    cause: a,
                    generation: ga,
                },
                Self::Failed {
                    cause: b,
                    generation: gb,
                },
            ) => ga == gb && Arc::ptr_eq(a, b),
            (
                Self::Abandoned {
                    cause: a,
                    generation: ga,
                },
                Self::Abandoned {
                    cause: b,
                    generation: gb,
                },
            ) => ga == gb && a == b,
            _ => false,
        }
    }
}

impl fmt::Display for FetchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Failed { cause, generation } => write!(f, "failed (gen {generation}): {cause}"),
            Self::Abandoned { cause, generation } => {
                write!(f, "abandoned (gen {generation}): {cause}")
            }
            other => f.write_str(other.as_str()),
        }
    }
}

/// Completion snapshot across a session's sources.
///
/// A kind with no sources at all reports `false`; `all` is true when every
/// source is completed or disabled, which includes a session with no sources.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompletedCondition {
    pub web: bool,
    pub bit_torrent: bool,
    pub local_cache: bool,
    pub all: bool,
}

impl CompletedCondition {
    pub fn from_states<'a>(states: impl IntoIterator<Item = (MediaSourceKind, &'a FetchState)>) -> Self {
        let mut seen = [false; 3];
        let mut done = [true; 3];
        for (kind, state) in states {
            let slot = kind_index(kind);
            seen[slot] = true;
            done[slot] &= state.is_completed_or_disabled();
        }
        let completed = |slot: usize| seen[slot] && done[slot];
        Self {
            web: completed(0),
            bit_torrent: completed(1),
            local_cache: completed(2),
            all: done.iter().all(|d| *d),
        }
    }

    pub fn for_kind(&self, kind: MediaSourceKind) -> bool {
        match kind {
            MediaSourceKind::Web => self.web,
            MediaSourceKind::BitTorrent => self.bit_torrent,
            MediaSourceKind::LocalCache => self.local_cache,
        }
    }
}

fn kind_index(kind: MediaSourceKind) -> usize {
    match kind {
        MediaSourceKind::Web => 0,
        MediaSourceKind::BitTorrent => 1,
        MediaSourceKind::LocalCache => 2,
    }
}
