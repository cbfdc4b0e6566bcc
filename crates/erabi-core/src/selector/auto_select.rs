//! Automatic selection driven by a session's progress.
//!
//! These helpers expect a selector built with [`MediaSelector::for_session`]
//! over the same session, so that the selector's list catches up with the
//! session's merged results.

use futures::StreamExt;
use tokio::sync::watch;
use tracing::{debug, info};

use crate::fetch::{CompletedCondition, FetchState, MediaFetchSession};
use crate::models::{Media, MediaList, MediaSourceKind};

use super::MediaSelector;

/// Wait for every source to finish, then select by preference.
///
/// With `prefer_kind`, selection happens as soon as that kind's sources are
/// done and at least one candidate is of that kind. Returns `None` when
/// something is already selected or the session closes first.
pub async fn await_completed_and_select_default(
    selector: &MediaSelector,
    session: &MediaFetchSession,
    prefer_kind: Option<MediaSourceKind>,
) -> Option<Media> {
    let list = selector.media_list_receiver();
    let ready = wait_until(selector, session, |condition| {
        if condition.all && caught_up(&list, session) {
            return true;
        }
        prefer_kind.is_some_and(|kind| {
            condition.for_kind(kind)
                && selector
                    .filtered_candidates_now()
                    .iter()
                    .any(|media| media.kind == kind)
        })
    })
    .await;
    if !ready {
        debug!("session closed before completion, skipping default selection");
        return None;
    }
    selector.try_select_default().await
}

/// Wait for the local cache sources, then select the first cached candidate.
///
/// Returns `None` right away when the session has no local cache source.
pub async fn select_cached(selector: &MediaSelector, session: &MediaFetchSession) -> Option<Media> {
    let has_cache = session
        .results_per_source()
        .iter()
        .any(|result| result.kind() == MediaSourceKind::LocalCache);
    if !has_cache {
        return None;
    }
    let list = selector.media_list_receiver();
    let ready = wait_until(selector, session, |condition| {
        condition.local_cache && caught_up(&list, session)
    })
    .await;
    if !ready {
        return None;
    }
    selector.try_select_cached().await
}

/// Enable the source the user last selected if it is disabled in `session`.
///
/// Returns whether a source was enabled.
pub fn auto_enable_last_selected(selector: &MediaSelector, session: &MediaFetchSession) -> bool {
    let Some(source_id) = selector.media_source_id().final_selected() else {
        return false;
    };
    let Some(result) = session.result_for(&source_id) else {
        return false;
    };
    if result.state_now() != FetchState::Disabled {
        return false;
    }
    info!(source = %source_id, "enabling last selected source");
    result.enable();
    true
}

/// Whether the selector has seen the session's current merged list.
fn caught_up(list: &watch::Receiver<Option<MediaList>>, session: &MediaFetchSession) -> bool {
    match &*list.borrow() {
        Some(list) => list[..] == session.merged_now()[..],
        None => false,
    }
}

/// Re-check `ready` on every completion or list change. `false` if the
/// session closed first.
async fn wait_until(
    selector: &MediaSelector,
    session: &MediaFetchSession,
    mut ready: impl FnMut(&CompletedCondition) -> bool,
) -> bool {
    let mut completion = session.has_completed();
    let mut list = selector.media_list_receiver();
    let mut list_open = true;
    let mut condition = None;
    loop {
        if condition.as_ref().is_some_and(&mut ready) {
            return true;
        }
        tokio::select! {
            next = completion.next() => match next {
                Some(next) => condition = Some(next),
                None => return false,
            },
            changed = list.changed(), if list_open => list_open = changed.is_ok(),
        }
    }
}
