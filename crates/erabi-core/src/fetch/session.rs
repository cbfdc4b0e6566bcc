use std::collections::HashSet;
use std::sync::{Arc, Weak};
use std::time::Duration;

use futures::future;
use futures::stream::{self, BoxStream, StreamExt};
use futures::FutureExt;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

use super::request::RequestCell;
use super::result::SourceFetchResult;
use super::share::{Publisher, SharedReplay};
use super::source::MediaSourceInstance;
use super::state::{CompletedCondition, FetchState};
use crate::models::media::empty_media_list;
use crate::models::{Media, MediaFetchRequest, MediaList, MediaSourceKind};

/// All sources' queries for one request.
///
/// Cloning is cheap. The session closes when [`close`](Self::close) is
/// called or the last handle is dropped; after that every stream replays
/// its last value and ends, and per-source states stop changing.
#[derive(Clone)]
pub struct MediaFetchSession {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    request: Arc<RequestCell>,
    results: Vec<SourceFetchResult>,
    cumulative: Arc<SharedReplay<MediaList>>,
    closed: watch::Sender<bool>,
    request_feeder: Option<JoinHandle<()>>,
    runtime: Handle,
}

impl MediaFetchSession {
    pub(crate) fn new(
        sources: &[MediaSourceInstance],
        request: Arc<RequestCell>,
        request_feeder: Option<JoinHandle<()>>,
        stop_timeout: Duration,
        runtime: Handle,
    ) -> Self {
        // The merged stream owns the cooldown. Per-source drivers stop as
        // soon as the merge lets go of them.
        let results: Vec<SourceFetchResult> = sources
            .iter()
            .map(|instance| {
                SourceFetchResult::new(instance, Arc::clone(&request), Duration::ZERO, runtime.clone())
            })
            .collect();

        let merged = results.clone();
        let cumulative = SharedReplay::new("session", stop_timeout, runtime.clone(), move |publisher| {
            merge_results(merged.clone(), publisher).boxed()
        });
        let (closed, _) = watch::channel(false);

        Self {
            inner: Arc::new(SessionInner {
                request,
                results,
                cumulative: Arc::new(cumulative),
                closed,
                request_feeder,
                runtime,
            }),
        }
    }

    /// The request this session is bound to: one value once known, then the stream ends.
    pub fn request(&self) -> BoxStream<'static, Arc<MediaFetchRequest>> {
        self.inner.request.stream()
    }

    /// Wait for the request; `None` if the request stream ended empty.
    pub async fn await_request(&self) -> Option<Arc<MediaFetchRequest>> {
        self.inner.request.get().await
    }

    /// One result per configured source, in configuration order. Disabled
    /// sources are included.
    pub fn results_per_source(&self) -> &[SourceFetchResult] {
        &self.inner.results
    }

    pub fn result_for(&self, source_id: &str) -> Option<&SourceFetchResult> {
        self.inner
            .results
            .iter()
            .find(|result| result.source_id() == source_id)
    }

    /// Merged, globally deduplicated results of every enabled source.
    ///
    /// Observing this stream is what starts the queries. Emits once every
    /// source has reported at least one snapshot, then on every change.
    pub fn cumulative_results(&self) -> BoxStream<'static, MediaList> {
        self.inner.cumulative.subscribe()
    }

    /// The merge of every source's latest snapshot, without subscribing.
    pub fn merged_now(&self) -> MediaList {
        merge_lists(
            self.inner
                .results
                .iter()
                .map(|result| (result.state_now(), result.latest())),
        )
    }

    /// Completion of each source kind. Observing this does not start any
    /// query. Emits on change and only ends when the session is closed.
    pub fn has_completed(&self) -> BoxStream<'static, CompletedCondition> {
        let watched = Watched {
            states: self
                .inner
                .results
                .iter()
                .map(|result| (result.kind(), result.state()))
                .collect(),
            closed: self.inner.closed.subscribe(),
        };
        stream::unfold((watched, None), |(mut watched, last)| async move {
            loop {
                if last.is_some() && !watched.changed().await {
                    return None;
                }
                let condition = watched.condition();
                if last != Some(condition) {
                    return Some((condition, (watched, Some(condition))));
                }
            }
        })
        .boxed()
    }

    pub fn completed_condition(&self) -> CompletedCondition {
        let states: Vec<(MediaSourceKind, FetchState)> = self
            .inner
            .results
            .iter()
            .map(|result| (result.kind(), result.state_now()))
            .collect();
        CompletedCondition::from_states(states.iter().map(|(kind, state)| (*kind, state)))
    }

    /// Wait until every source is completed or disabled. Does not start queries.
    pub async fn await_completion(&self) {
        let mut completion = self.has_completed();
        while let Some(condition) = completion.next().await {
            if condition.all {
                return;
            }
        }
    }

    /// Start every query, wait for all of them, and return the merged results.
    pub async fn await_completed_results(&self) -> MediaList {
        let _observing = self.cumulative_results();
        self.await_completion().await;
        self.merged_now()
    }

    /// Cancel every outstanding query. Idempotent.
    pub fn close(&self) {
        self.inner.close();
    }

    pub fn is_closed(&self) -> bool {
        *self.inner.closed.borrow()
    }

    /// Whether both handles refer to the same session.
    pub fn same_session(&self, other: &MediaFetchSession) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn runtime(&self) -> &Handle {
        &self.inner.runtime
    }

    pub(crate) fn downgrade(&self) -> WeakSession {
        WeakSession(Arc::downgrade(&self.inner))
    }
}

/// A session handle that does not keep the session open.
#[derive(Clone)]
pub(crate) struct WeakSession(Weak<SessionInner>);

impl WeakSession {
    pub(crate) fn upgrade(&self) -> Option<MediaFetchSession> {
        self.0.upgrade().map(|inner| MediaFetchSession { inner })
    }
}

impl SessionInner {
    fn close(&self) {
        if self.closed.send_replace(true) {
            return;
        }
        debug!(sources = self.results.len(), "closing fetch session");
        if let Some(feeder) = &self.request_feeder {
            feeder.abort();
        }
        self.request.abandon();
        for result in &self.results {
            result.close();
        }
        self.cumulative.close();
    }
}

impl Drop for SessionInner {
    fn drop(&mut self) {
        self.close();
    }
}

struct Watched {
    states: Vec<(MediaSourceKind, watch::Receiver<FetchState>)>,
    closed: watch::Receiver<bool>,
}

impl Watched {
    fn condition(&self) -> CompletedCondition {
        let states: Vec<(MediaSourceKind, FetchState)> = self
            .states
            .iter()
            .map(|(kind, rx)| (*kind, rx.borrow().clone()))
            .collect();
        CompletedCondition::from_states(states.iter().map(|(kind, state)| (*kind, state)))
    }

    /// Wait for any state to change. `false` once the session is closed.
    async fn changed(&mut self) -> bool {
        if *self.closed.borrow() {
            return false;
        }
        let any_state = future::select_all(
            self.states
                .iter_mut()
                .map(|(_, rx)| rx.changed().boxed())
                .chain(std::iter::once(future::pending().boxed())),
        );
        tokio::select! {
            (changed, _, _) = any_state => changed.is_ok(),
            _ = self.closed.changed() => false,
        }
    }
}

/// Drives the session-level merge: waits for every source's first snapshot,
/// then republishes the deduplicated union on every change.
async fn merge_results(results: Vec<SourceFetchResult>, publisher: Publisher<MediaList>) {
    if results.is_empty() {
        publisher.publish(empty_media_list());
        return;
    }
    let streams = results.iter().enumerate().map(|(index, result)| {
        result.results().map(move |list| (index, list))
    });
    let mut merged = stream::select_all(streams);
    let mut latest: Vec<Option<MediaList>> = vec![None; results.len()];

    while let Some((index, list)) = merged.next().await {
        latest[index] = Some(list);
        if latest.iter().any(Option::is_none) {
            continue;
        }
        let lists = results
            .iter()
            .zip(&latest)
            .filter_map(|(result, list)| Some((result.state_now(), MediaList::clone(list.as_ref()?))));
        publisher.publish(merge_lists(lists));
    }
}

/// Flatten per-source lists, skipping disabled sources, keeping the first
/// occurrence of each media id.
fn merge_lists(lists: impl IntoIterator<Item = (FetchState, MediaList)>) -> MediaList {
    let mut seen = HashSet::new();
    let merged: Vec<Media> = lists
        .into_iter()
        .filter(|(state, _)| *state != FetchState::Disabled)
        .flat_map(|(_, list)| list.iter().cloned().collect::<Vec<_>>())
        .filter(|media| seen.insert(media.media_id.clone()))
        .collect();
    MediaList::from(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::{AbandonCause, FetcherConfig, MediaFetcher};
    use crate::testing::{self, TestSource};

    fn fetcher(sources: Vec<(Arc<TestSource>, bool)>) -> MediaFetcher {
        let sources = sources
            .into_iter()
            .map(|(source, enabled)| MediaSourceInstance::new(source, enabled))
            .collect();
        MediaFetcher::new(sources, FetcherConfig::default()).unwrap()
    }

    fn ids(list: &MediaList) -> Vec<&str> {
        list.iter().map(|m| m.media_id.as_str()).collect()
    }

    #[tokio::test]
    async fn test_one_query_per_source_per_generation() {
        let a = TestSource::web("a", vec![vec![testing::media("1", "a")]]);
        let b = TestSource::web("b", vec![vec![testing::media("2", "b")]]);
        let fetcher = fetcher(vec![(a.clone(), true), (b.clone(), true)]);
        let session = fetcher.new_session(testing::request("1", "1"));

        let _first = session.cumulative_results();
        let _second = session.cumulative_results();
        session.await_completion().await;
        let _third = session.cumulative_results();

        assert_eq!(a.calls(), 1);
        assert_eq!(b.calls(), 1);
    }

    #[tokio::test]
    async fn test_cumulative_is_globally_deduplicated() {
        let a = TestSource::web("a", vec![vec![testing::media("x", "a"), testing::media("1", "a")]]);
        let b = TestSource::web("b", vec![vec![testing::media("x", "b"), testing::media("2", "b")]]);
        let fetcher = fetcher(vec![(a, true), (b, true)]);
        let session = fetcher.new_session(testing::request("1", "1"));

        let merged = session.await_completed_results().await;
        assert_eq!(ids(&merged), vec!["x", "1", "2"]);
        assert_eq!(merged[0].media_source_id, "a");
    }

    #[tokio::test]
    async fn test_cumulative_stream_reaches_final_list() {
        let a = TestSource::web("a", vec![vec![testing::media("1", "a")], vec![testing::media("2", "a")]]);
        let fetcher = fetcher(vec![(a, true)]);
        let session = fetcher.new_session(testing::request("1", "1"));

        let mut results = session.cumulative_results();
        let mut last = empty_media_list();
        while last.len() < 2 {
            last = results.next().await.unwrap();
        }
        assert_eq!(ids(&last), vec!["1", "2"]);
    }

    #[tokio::test]
    async fn test_disabled_source_contributes_nothing() {
        let a = TestSource::web("a", vec![vec![testing::media("1", "a")]]);
        let off = TestSource::web("off", vec![vec![testing::media("2", "off")]]);
        let fetcher = fetcher(vec![(a, true), (off.clone(), false)]);
        let session = fetcher.new_session(testing::request("1", "1"));

        assert_eq!(session.results_per_source().len(), 2);
        let merged = session.await_completed_results().await;
        assert_eq!(ids(&merged), vec!["1"]);
        assert_eq!(off.calls(), 0);
    }

    #[tokio::test]
    async fn test_has_completed_does_not_start_queries() {
        let a = TestSource::web("a", vec![vec![testing::media("1", "a")]]);
        let fetcher = fetcher(vec![(a.clone(), true)]);
        let session = fetcher.new_session(testing::request("1", "1"));

        let mut completion = session.has_completed();
        let first = completion.next().await.unwrap();
        assert!(!first.all);
        tokio::task::yield_now().await;
        assert!(completion.next().now_or_never().is_none());
        assert_eq!(a.calls(), 0);
    }

    #[tokio::test]
    async fn test_has_completed_tracks_restart() {
        let a = TestSource::web("a", vec![vec![testing::media("1", "a")]]);
        let fetcher = fetcher(vec![(a, true)]);
        let session = fetcher.new_session(testing::request("1", "1"));

        let _observing = session.cumulative_results();
        let mut completion = session.has_completed();
        while !completion.next().await.unwrap().all {}

        session.result_for("a").unwrap().restart();
        assert!(!completion.next().await.unwrap().all);
        assert!(completion.next().await.unwrap().all);
    }

    #[tokio::test]
    async fn test_all_failed_session_completes_with_partial_pages() {
        let fetcher = fetcher(vec![(TestSource::failing("a"), true), (TestSource::failing("b"), true)]);
        let session = fetcher.new_session(testing::request("1", "1"));
        let merged = session.await_completed_results().await;
        assert_eq!(merged.len(), 2, "partial pages before the failure are kept");
        assert!(session.completed_condition().all);
        assert!(session
            .results_per_source()
            .iter()
            .all(|r| matches!(r.state_now(), FetchState::Failed { .. })));
    }

    #[tokio::test]
    async fn test_no_sources_is_complete() {
        let session = fetcher(vec![]).new_session(testing::request("1", "1"));
        assert!(session.completed_condition().all);
        assert_eq!(session.await_completed_results().await.len(), 0);
    }

    #[tokio::test]
    async fn test_close_abandons_and_ends_streams() {
        let a = TestSource::web("a", vec![vec![testing::media("1", "a")]]).gated();
        let fetcher = fetcher(vec![(a, true)]);
        let session = fetcher.new_session(testing::request("1", "1"));

        let mut results = session.cumulative_results();
        let mut state = session.result_for("a").unwrap().state();
        state.wait_for(|s| *s == FetchState::Working).await.unwrap();

        session.close();
        while results.next().await.is_some() {}
        let state = state.wait_for(|s| s.is_completed()).await.unwrap().clone();
        assert_eq!(
            state,
            FetchState::Abandoned {
                cause: AbandonCause::SessionClosed,
                generation: 0
            }
        );
        // Replays the frozen condition once, then ends.
        assert_eq!(session.has_completed().collect::<Vec<_>>().await.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unobserved_session_stops_after_one_cooldown() {
        let a = TestSource::web("a", vec![vec![testing::media("1", "a")]]).gated();
        let fetcher = fetcher(vec![(a, true)]);
        let session = fetcher.new_session(testing::request("1", "1"));
        let result = session.result_for("a").unwrap();

        let results = session.cumulative_results();
        let mut state = result.state();
        state.wait_for(|s| *s == FetchState::Working).await.unwrap();
        drop(results);

        tokio::time::advance(Duration::from_millis(4_900)).await;
        tokio::task::yield_now().await;
        assert_eq!(result.state_now(), FetchState::Working);

        tokio::time::advance(Duration::from_millis(200)).await;
        let state = tokio::time::timeout(Duration::from_millis(1), state.wait_for(|s| s.is_completed()))
            .await
            .expect("query still running after the cooldown")
            .unwrap()
            .clone();
        assert_eq!(
            state,
            FetchState::Abandoned {
                cause: AbandonCause::Cancelled,
                generation: 0
            }
        );
    }

    #[tokio::test]
    async fn test_lazy_request_takes_first_value() {
        let a = TestSource::web("a", vec![vec![testing::media("1", "a")]]);
        let fetcher = fetcher(vec![(a, true)]);
        let session = fetcher.new_session_lazy(stream::iter(vec![
            testing::request("1", "1"),
            testing::request("2", "2"),
        ]));
        let request = session.await_request().await.unwrap();
        assert_eq!(request.subject_id, "1");
        assert_eq!(session.request().collect::<Vec<_>>().await.len(), 1);
    }

    #[tokio::test]
    async fn test_missing_request_abandons_sources() {
        let a = TestSource::web("a", vec![vec![testing::media("1", "a")]]);
        let fetcher = fetcher(vec![(a.clone(), true)]);
        let session = fetcher.new_session_lazy(stream::empty());
        let merged = session.await_completed_results().await;
        assert!(merged.is_empty());
        assert_eq!(
            session.result_for("a").unwrap().state_now(),
            FetchState::Abandoned {
                cause: AbandonCause::RequestUnavailable,
                generation: 0
            }
        );
        assert_eq!(a.calls(), 0);
    }
}
