use std::sync::Arc;

use futures::stream::{self, BoxStream, Stream, StreamExt};
use tokio::sync::watch;

use crate::models::MediaFetchRequest;

#[derive(Debug, Clone)]
enum Slot {
    Pending,
    Ready(Arc<MediaFetchRequest>),
    /// The request stream ended without a value.
    Unavailable,
}

/// Holds the single request a session is bound to.
pub(crate) struct RequestCell {
    slot: watch::Sender<Slot>,
}

impl RequestCell {
    pub(crate) fn ready(request: MediaFetchRequest) -> Self {
        let (slot, _) = watch::channel(Slot::Ready(Arc::new(request)));
        Self { slot }
    }

    pub(crate) fn pending() -> Self {
        let (slot, _) = watch::channel(Slot::Pending);
        Self { slot }
    }

    /// Take the first request from `requests`; later values are ignored.
    pub(crate) async fn feed_from<S>(self: Arc<Self>, requests: S)
    where
        S: Stream<Item = MediaFetchRequest> + Send + 'static,
    {
        let first = Box::pin(requests).next().await;
        let slot = match first {
            Some(request) => Slot::Ready(Arc::new(request)),
            None => Slot::Unavailable,
        };
        self.slot.send_if_modified(|current| {
            if matches!(current, Slot::Pending) {
                *current = slot;
                true
            } else {
                false
            }
        });
    }

    /// Mark the request as never arriving, unless it already did.
    pub(crate) fn abandon(&self) {
        self.slot.send_if_modified(|current| {
            if matches!(current, Slot::Pending) {
                *current = Slot::Unavailable;
                true
            } else {
                false
            }
        });
    }

    /// Wait for the request; `None` if it will never arrive.
    pub(crate) async fn get(&self) -> Option<Arc<MediaFetchRequest>> {
        let mut rx = self.slot.subscribe();
        let slot = rx.wait_for(|slot| !matches!(slot, Slot::Pending)).await.ok()?;
        match &*slot {
            Slot::Ready(request) => Some(Arc::clone(request)),
            Slot::Pending | Slot::Unavailable => None,
        }
    }

    /// A stream yielding the request once it is known, then ending.
    pub(crate) fn stream(self: &Arc<Self>) -> BoxStream<'static, Arc<MediaFetchRequest>> {
        let cell = Arc::clone(self);
        stream::once(async move { cell.get().await })
            .filter_map(|request| async move { request })
            .boxed()
    }
}
