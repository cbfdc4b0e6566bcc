use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use futures::future::BoxFuture;
use futures::stream::{self, BoxStream, StreamExt};
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::trace;

/// Write side handed to a driver; publishing replaces the cached value.
pub(crate) struct Publisher<T> {
    value: Arc<watch::Sender<Option<T>>>,
}

impl<T> Publisher<T> {
    pub(crate) fn publish(&self, value: T) {
        self.value.send_replace(Some(value));
    }
}

type StartFn<T> = Box<dyn Fn(Publisher<T>) -> BoxFuture<'static, ()> + Send + Sync>;

#[derive(Default)]
struct Sharing {
    subscribers: usize,
    driver: Option<JoinHandle<()>>,
    teardown: Option<JoinHandle<()>>,
}

/// A lazily started, shared, replay-1 value stream.
///
/// The first subscriber spawns the driver. Late subscribers see the cached
/// value immediately. When the last subscriber leaves, the driver is
/// aborted after `stop_timeout`; the cached value survives for the next
/// subscriber. After [`close`](Self::close) subscribers get the last value
/// and the stream ends.
pub(crate) struct SharedReplay<T> {
    name: String,
    value: Arc<watch::Sender<Option<T>>>,
    closed: watch::Sender<bool>,
    start: StartFn<T>,
    stop_timeout: Duration,
    runtime: Handle,
    sharing: Mutex<Sharing>,
}

impl<T> SharedReplay<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub(crate) fn new<F>(name: impl Into<String>, stop_timeout: Duration, runtime: Handle, start: F) -> Self
    where
        F: Fn(Publisher<T>) -> BoxFuture<'static, ()> + Send + Sync + 'static,
    {
        let (value, _) = watch::channel(None);
        let (closed, _) = watch::channel(false);
        Self {
            name: name.into(),
            value: Arc::new(value),
            closed,
            start: Box::new(start),
            stop_timeout,
            runtime,
            sharing: Mutex::new(Sharing::default()),
        }
    }

    /// Subscribe, starting the driver if it is not running.
    pub(crate) fn subscribe(self: &Arc<Self>) -> BoxStream<'static, T> {
        let guard = self.acquire();
        let subscription = Subscription {
            value: self.value.subscribe(),
            closed: self.closed.subscribe(),
            unread: true,
            _guard: guard,
        };
        stream::unfold(subscription, |mut sub| async move {
            let next = sub.next().await?;
            Some((next, sub))
        })
        .boxed()
    }

    /// The cached value, without subscribing.
    pub(crate) fn latest(&self) -> Option<T> {
        self.value.borrow().clone()
    }

    pub(crate) fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }

    /// Stop the driver for good. Existing subscribers drain and end.
    pub(crate) fn close(&self) {
        self.closed.send_replace(true);
        let mut sharing = self.lock();
        if let Some(teardown) = sharing.teardown.take() {
            teardown.abort();
        }
        if let Some(driver) = sharing.driver.take() {
            driver.abort();
        }
    }

    fn acquire(self: &Arc<Self>) -> SubscriberGuard<T> {
        let mut sharing = self.lock();
        sharing.subscribers += 1;
        if let Some(teardown) = sharing.teardown.take() {
            teardown.abort();
        }
        let running = sharing.driver.as_ref().is_some_and(|d| !d.is_finished());
        if !running && !self.is_closed() {
            trace!(stream = %self.name, "starting shared driver");
            let publisher = Publisher {
                value: Arc::clone(&self.value),
            };
            sharing.driver = Some(self.runtime.spawn((self.start)(publisher)));
        }
        SubscriberGuard {
            shared: Arc::clone(self),
        }
    }

    fn release(self: &Arc<Self>) {
        let mut sharing = self.lock();
        sharing.subscribers = sharing.subscribers.saturating_sub(1);
        if sharing.subscribers > 0 || sharing.driver.is_none() {
            return;
        }
        if self.stop_timeout.is_zero() {
            Self::stop_driver(&self.name, &mut sharing);
            return;
        }
        let weak: Weak<Self> = Arc::downgrade(self);
        let timeout = self.stop_timeout;
        sharing.teardown = Some(self.runtime.spawn(async move {
            tokio::time::sleep(timeout).await;
            if let Some(shared) = weak.upgrade() {
                let mut sharing = shared.lock();
                if sharing.subscribers == 0 {
                    sharing.teardown = None;
                    Self::stop_driver(&shared.name, &mut sharing);
                }
            }
        }));
    }

    fn stop_driver(name: &str, sharing: &mut Sharing) {
        if let Some(driver) = sharing.driver.take() {
            trace!(stream = %name, "no observers left, stopping shared driver");
            driver.abort();
        }
    }

    fn lock(&self) -> MutexGuard<'_, Sharing> {
        self.sharing.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T> Drop for SharedReplay<T> {
    fn drop(&mut self) {
        let sharing = self.sharing.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(teardown) = sharing.teardown.take() {
            teardown.abort();
        }
        if let Some(driver) = sharing.driver.take() {
            driver.abort();
        }
    }
}

struct SubscriberGuard<T>
where
    T: Clone + Send + Sync + 'static,
{
    shared: Arc<SharedReplay<T>>,
}

impl<T> Drop for SubscriberGuard<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn drop(&mut self) {
        self.shared.release();
    }
}

struct Subscription<T>
where
    T: Clone + Send + Sync + 'static,
{
    value: watch::Receiver<Option<T>>,
    closed: watch::Receiver<bool>,
    /// The current value has not been handed out yet.
    unread: bool,
    _guard: SubscriberGuard<T>,
}

impl<T> Subscription<T>
where
    T: Clone + Send + Sync + 'static,
{
    async fn next(&mut self) -> Option<T> {
        loop {
            if self.unread || self.value.has_changed().unwrap_or(false) {
                self.unread = false;
                if let Some(value) = self.value.borrow_and_update().clone() {
                    return Some(value);
                }
            }
            if *self.closed.borrow() {
                return None;
            }
            tokio::select! {
                changed = self.value.changed() => {
                    if changed.is_err() {
                        return None;
                    }
                    self.unread = true;
                }
                changed = self.closed.changed() => {
                    if changed.is_err() {
                        return None;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use futures::FutureExt;

    fn counting(stop_timeout: Duration) -> (Arc<SharedReplay<u32>>, Arc<AtomicUsize>) {
        let starts = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&starts);
        let shared = SharedReplay::new("test", stop_timeout, Handle::current(), move |publisher| {
            let run = counter.fetch_add(1, Ordering::SeqCst) as u32;
            async move {
                publisher.publish(run * 10);
                std::future::pending::<()>().await;
            }
            .boxed()
        });
        (Arc::new(shared), starts)
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_subscriber_starts_driver_once() {
        let (shared, starts) = counting(Duration::from_secs(5));
        let mut a = shared.subscribe();
        let mut b = shared.subscribe();
        assert_eq!(a.next().await, Some(0));
        assert_eq!(b.next().await, Some(0));
        assert_eq!(starts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_resubscribe_within_cooldown_keeps_driver() {
        let (shared, starts) = counting(Duration::from_secs(5));
        let mut a = shared.subscribe();
        assert_eq!(a.next().await, Some(0));
        drop(a);
        tokio::time::advance(Duration::from_secs(2)).await;
        let mut b = shared.subscribe();
        assert_eq!(b.next().await, Some(0));
        assert_eq!(starts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cooldown_elapsed_restarts_driver() {
        let (shared, starts) = counting(Duration::from_secs(5));
        let mut a = shared.subscribe();
        assert_eq!(a.next().await, Some(0));
        drop(a);
        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(shared.latest(), Some(0));

        let mut b = shared.subscribe();
        // Cached value first, then the fresh driver's value.
        assert_eq!(b.next().await, Some(0));
        assert_eq!(b.next().await, Some(10));
        assert_eq!(starts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_close_replays_last_then_ends() {
        let (shared, _) = counting(Duration::ZERO);
        let mut a = shared.subscribe();
        assert_eq!(a.next().await, Some(0));
        shared.close();
        assert_eq!(a.next().await, None);

        let late: Vec<_> = shared.subscribe().collect().await;
        assert_eq!(late, vec![0]);
    }
}
