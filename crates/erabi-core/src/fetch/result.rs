use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use futures::stream::{BoxStream, StreamExt};
use futures::FutureExt;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::request::RequestCell;
use super::share::{Publisher, SharedReplay};
use super::source::{MediaSource, MediaSourceInfo, MediaSourceInstance};
use super::state::{AbandonCause, FetchState};
use crate::models::media::empty_media_list;
use crate::models::{Media, MediaList, MediaSourceKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Control {
    generation: u64,
    enabled: bool,
}

/// Accumulated results of the most recent run.
struct Cache {
    generation: u64,
    list: MediaList,
}

/// One source's query within a session: its state machine, its
/// accumulated results, and restart control.
///
/// Cloning is cheap and yields a handle to the same result.
#[derive(Clone)]
pub struct SourceFetchResult {
    inner: Arc<ResultInner>,
}

struct ResultInner {
    source: Arc<dyn MediaSource>,
    request: Arc<RequestCell>,
    state: watch::Sender<FetchState>,
    control: watch::Sender<Control>,
    restart_lock: Mutex<()>,
    cache: Mutex<Option<Cache>>,
    results: Arc<SharedReplay<MediaList>>,
    closing: AtomicBool,
}

impl SourceFetchResult {
    pub(crate) fn new(
        instance: &MediaSourceInstance,
        request: Arc<RequestCell>,
        stop_timeout: Duration,
        runtime: Handle,
    ) -> Self {
        let source = Arc::clone(&instance.source);
        let initial = if instance.enabled {
            FetchState::Idle
        } else {
            FetchState::Disabled
        };
        let (state, _) = watch::channel(initial);
        let (control, _) = watch::channel(Control {
            generation: 0,
            enabled: instance.enabled,
        });
        let name = format!("source:{}", source.id());

        let inner = Arc::new_cyclic(|weak: &std::sync::Weak<ResultInner>| {
            let weak = weak.clone();
            let results = SharedReplay::new(name, stop_timeout, runtime, move |publisher| {
                let weak = weak.clone();
                async move {
                    if let Some(inner) = weak.upgrade() {
                        inner.drive(publisher).await;
                    }
                }
                .boxed()
            });
            ResultInner {
                source,
                request,
                state,
                control,
                restart_lock: Mutex::new(()),
                cache: Mutex::new(None),
                results: Arc::new(results),
                closing: AtomicBool::new(false),
            }
        });
        Self { inner }
    }

    pub fn source_id(&self) -> &str {
        self.inner.source.id()
    }

    pub fn kind(&self) -> MediaSourceKind {
        self.inner.source.kind()
    }

    pub fn info(&self) -> MediaSourceInfo {
        self.inner.source.info()
    }

    /// Observe the state. Does not start the query.
    pub fn state(&self) -> watch::Receiver<FetchState> {
        self.inner.state.subscribe()
    }

    pub fn state_now(&self) -> FetchState {
        self.inner.state.borrow().clone()
    }

    pub fn generation(&self) -> u64 {
        self.inner.control.borrow().generation
    }

    /// Cumulative, deduplicated results of this source.
    ///
    /// The first observer starts a query for the current generation unless
    /// that generation already finished, in which case its results are
    /// replayed without querying again.
    pub fn results(&self) -> BoxStream<'static, MediaList> {
        self.inner.results.subscribe()
    }

    /// The latest accumulated list without subscribing.
    pub fn latest(&self) -> MediaList {
        self.inner
            .results
            .latest()
            .unwrap_or_else(empty_media_list)
    }

    /// Start a new generation. Only has an effect from a completed or
    /// disabled state; while a query is idle or in flight this is a no-op.
    pub fn restart(&self) {
        let inner = &self.inner;
        let _serialized = inner.restart_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let observed = inner.state.borrow().clone();
        if !observed.is_restartable() {
            debug!(source = %self.source_id(), state = %observed, "restart ignored");
            return;
        }
        // The running pipeline owns the state; only swap if it did not move.
        let swapped = inner.state.send_if_modified(|state| {
            if *state == observed {
                *state = FetchState::Idle;
                true
            } else {
                false
            }
        });
        if !swapped {
            return;
        }
        inner.control.send_modify(|control| {
            control.generation += 1;
            control.enabled = true;
        });
        info!(source = %self.source_id(), generation = self.generation(), "restarted");
    }

    /// Turn an administratively disabled source on, once. Keeps the generation.
    pub fn enable(&self) {
        let inner = &self.inner;
        let _serialized = inner.restart_lock.lock().unwrap_or_else(PoisonError::into_inner);
        if inner.control.borrow().enabled {
            return;
        }
        inner.state.send_if_modified(|state| {
            if *state == FetchState::Disabled {
                *state = FetchState::Idle;
                true
            } else {
                false
            }
        });
        inner.control.send_modify(|control| control.enabled = true);
        info!(source = %self.source_id(), "enabled");
    }

    pub(crate) fn close(&self) {
        self.inner.closing.store(true, Ordering::SeqCst);
        self.inner.results.close();
    }
}

impl ResultInner {
    fn id(&self) -> &str {
        self.source.id()
    }

    /// Runs the query for each generation, restarting when control changes.
    async fn drive(self: Arc<Self>, publisher: Publisher<MediaList>) {
        let mut control = self.control.subscribe();
        loop {
            let current = *control.borrow_and_update();
            let run = self.run(current, &publisher);
            tokio::pin!(run);
            let finished = tokio::select! {
                _ = &mut run => true,
                changed = control.changed() => {
                    if changed.is_err() {
                        return;
                    }
                    false
                }
            };
            if finished && control.changed().await.is_err() {
                return;
            }
        }
    }

    async fn run(&self, control: Control, publisher: &Publisher<MediaList>) {
        let generation = control.generation;
        if !control.enabled {
            publisher.publish(empty_media_list());
            return;
        }

        if self.state.borrow().finished_generation(generation) {
            debug!(source = %self.id(), generation, "replaying finished generation");
            publisher.publish(self.cached(generation));
            self.finish_pending(generation);
            return;
        }

        // 1. Wait for the session's request.
        let Some(request) = self.request.get().await else {
            warn!(source = %self.id(), "request unavailable, not querying");
            publisher.publish(empty_media_list());
            self.state.send_replace(FetchState::Abandoned {
                cause: AbandonCause::RequestUnavailable,
                generation,
            });
            return;
        };

        // 2. Query, accumulating every page.
        self.state.send_replace(FetchState::Working);
        let guard = WorkingGuard {
            inner: self,
            generation,
            armed: true,
        };
        debug!(source = %self.id(), generation, "query started");

        let mut accumulated: Vec<Media> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        self.store(generation, empty_media_list(), publisher);

        let mut pages = self.source.fetch(request);
        while let Some(page) = pages.next().await {
            match page {
                Ok(items) => {
                    let before = accumulated.len();
                    accumulated.extend(items.into_iter().filter(|m| seen.insert(m.media_id.clone())));
                    debug!(
                        source = %self.id(),
                        generation,
                        new = accumulated.len() - before,
                        total = accumulated.len(),
                        "page received"
                    );
                    self.store(generation, MediaList::from(accumulated.clone()), publisher);
                }
                Err(err) => {
                    warn!(source = %self.id(), generation, error = %err, "query failed");
                    guard.disarm();
                    self.state.send_replace(FetchState::Failed {
                        cause: Arc::new(err),
                        generation,
                    });
                    return;
                }
            }
        }

        // 3. Exhausted. The final snapshot is already cached by `store`.
        guard.disarm();
        self.state
            .send_replace(FetchState::PendingSuccess { generation });
        self.finish_pending(generation);
        debug!(source = %self.id(), generation, total = accumulated.len(), "query succeeded");
    }

    fn store(&self, generation: u64, list: MediaList, publisher: &Publisher<MediaList>) {
        *self.cache.lock().unwrap_or_else(PoisonError::into_inner) = Some(Cache {
            generation,
            list: MediaList::clone(&list),
        });
        publisher.publish(list);
    }

    fn cached(&self, generation: u64) -> MediaList {
        let cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        match &*cache {
            Some(cache) if cache.generation == generation => MediaList::clone(&cache.list),
            _ => empty_media_list(),
        }
    }

    fn finish_pending(&self, generation: u64) {
        self.state.send_if_modified(|state| {
            if *state == (FetchState::PendingSuccess { generation }) {
                *state = FetchState::Succeeded { generation };
                true
            } else {
                false
            }
        });
    }
}

/// Marks a `Working` query as abandoned if it is dropped before finishing.
struct WorkingGuard<'a> {
    inner: &'a ResultInner,
    generation: u64,
    armed: bool,
}

impl WorkingGuard<'_> {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for WorkingGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let cause = if std::thread::panicking() {
            AbandonCause::PipelinePanicked
        } else if self.inner.closing.load(Ordering::SeqCst) {
            AbandonCause::SessionClosed
        } else {
            AbandonCause::Cancelled
        };
        let generation = self.generation;
        let abandoned = self.inner.state.send_if_modified(|state| {
            if *state == FetchState::Working {
                *state = FetchState::Abandoned { cause, generation };
                true
            } else {
                false
            }
        });
        if abandoned {
            debug!(source = %self.inner.id(), generation, %cause, "query abandoned");
        }
    }
}
