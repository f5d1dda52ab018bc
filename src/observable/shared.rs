/// Reference-counted multicast stream with single-value replay
///
/// A [`SharedStream`] owns one lazily started producer (built from a factory)
/// and fans every value it yields out to all current subscribers, in order.
/// Late subscribers first receive the most recent value. When the last
/// subscriber goes away the producer task is aborted and the replay buffer is
/// cleared, so the next subscriber starts a fresh run of the factory.
///
/// Subscribing spawns the producer with `tokio::spawn`, so it must happen
/// inside a Tokio runtime.
use futures::stream::{BoxStream, Stream, StreamExt};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::logger::{self, LogTag};

/// Factory producing a fresh underlying stream for each producer run
pub type StreamFactory<T> = Arc<dyn Fn() -> BoxStream<'static, T> + Send + Sync>;

/// Mutable state guarded by the stream's lock
struct SharedState<T> {
    /// Live senders, one per subscriber still attached to the running producer
    senders: HashMap<u64, mpsc::UnboundedSender<T>>,
    /// Number of live `Subscription` handles (including ones that only got a replay)
    subscriber_count: usize,
    /// Replay buffer (size 1)
    latest: Option<T>,
    producer: Option<JoinHandle<()>>,
    /// Bumped on every reset; values from an older run are discarded
    generation: u64,
    /// The current run's underlying stream has ended
    completed: bool,
}

struct SharedInner<T> {
    label: String,
    factory: StreamFactory<T>,
    state: Mutex<SharedState<T>>,
    next_subscriber_id: AtomicU64,
    producer_runs: AtomicU64,
}

/// Handle to a shared, replaying stream. Clones refer to the same producer.
pub struct SharedStream<T> {
    inner: Arc<SharedInner<T>>,
}

impl<T> Clone for SharedStream<T> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl<T> std::fmt::Debug for SharedStream<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedStream").field("label", &self.inner.label).finish()
    }
}

impl<T> SharedStream<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Wrap a stream factory. The factory is not called until the first subscription.
    pub fn new<F, S>(label: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> S + Send + Sync + 'static,
        S: Stream<Item = T> + Send + 'static,
    {
        let factory: StreamFactory<T> = Arc::new(move || factory().boxed());
        Self::from_factory(label, factory)
    }

    pub fn from_factory(label: impl Into<String>, factory: StreamFactory<T>) -> Self {
        Self {
            inner: Arc::new(SharedInner {
                label: label.into(),
                factory,
                state: Mutex::new(SharedState {
                    senders: HashMap::new(),
                    subscriber_count: 0,
                    latest: None,
                    producer: None,
                    generation: 0,
                    completed: false,
                }),
                next_subscriber_id: AtomicU64::new(1),
                producer_runs: AtomicU64::new(0),
            }),
        }
    }

    /// Attach a new subscriber
    ///
    /// The subscriber receives the buffered latest value (if any) followed by
    /// every value the producer yields from now on. The first subscriber
    /// starts the producer.
    pub fn subscribe(&self) -> Subscription<T> {
        let id = self.inner.next_subscriber_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();

        let mut state = self.inner.state.lock();
        state.subscriber_count += 1;

        if let Some(latest) = &state.latest {
            let _ = tx.send(latest.clone());
        }

        if state.completed {
            // Replay only; dropping tx ends this subscriber's stream
            drop(tx);
        } else {
            state.senders.insert(id, tx);
            if state.producer.is_none() {
                let generation = state.generation;
                state.producer = Some(self.spawn_producer(generation));
            }
        }
        drop(state);

        Subscription {
            id,
            rx,
            inner: Arc::clone(&self.inner),
        }
    }

    fn spawn_producer(&self, generation: u64) -> JoinHandle<()> {
        let weak = Arc::downgrade(&self.inner);
        let factory = Arc::clone(&self.inner.factory);
        let run = self.inner.producer_runs.fetch_add(1, Ordering::Relaxed) + 1;

        logger::debug(
            LogTag::Cache,
            &format!("Starting producer for {} (run {})", self.inner.label, run),
        );

        tokio::spawn(run_producer(weak, factory, generation))
    }

    /// Number of attached subscribers
    pub fn subscriber_count(&self) -> usize {
        self.inner.state.lock().subscriber_count
    }

    /// Whether a producer is currently running
    pub fn is_active(&self) -> bool {
        self.inner.state.lock().producer.is_some()
    }

    /// How many times a producer has been started
    pub fn producer_runs(&self) -> u64 {
        self.inner.producer_runs.load(Ordering::Relaxed)
    }

    /// Most recent value of the current run, if any
    pub fn latest(&self) -> Option<T> {
        self.inner.state.lock().latest.clone()
    }

    pub fn label(&self) -> &str {
        &self.inner.label
    }

    /// Whether both handles refer to the same shared producer
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

async fn run_producer<T>(weak: Weak<SharedInner<T>>, factory: StreamFactory<T>, generation: u64)
where
    T: Clone + Send + Sync + 'static,
{
    let mut upstream = factory();

    while let Some(item) = upstream.next().await {
        let Some(inner) = weak.upgrade() else {
            return;
        };
        if !inner.publish(generation, item) {
            return;
        }
    }

    if let Some(inner) = weak.upgrade() {
        inner.complete(generation);
    }
}

impl<T: Clone> SharedInner<T> {
    /// Store and fan out one value. Returns false when this run is obsolete.
    fn publish(&self, generation: u64, item: T) -> bool {
        let mut state = self.state.lock();
        if state.generation != generation {
            return false;
        }

        state.senders.retain(|_, tx| tx.send(item.clone()).is_ok());
        state.latest = Some(item);
        true
    }

    fn complete(&self, generation: u64) {
        let mut state = self.state.lock();
        if state.generation != generation {
            return;
        }

        state.completed = true;
        state.producer = None;
        state.senders.clear();
        drop(state);

        logger::debug(LogTag::Cache, &format!("Producer for {} completed", self.label));
    }
}

impl<T> SharedInner<T> {
    /// Detach one subscriber; the last one out tears the producer down
    fn release(&self, id: u64) {
        let mut state = self.state.lock();
        state.senders.remove(&id);
        state.subscriber_count = state.subscriber_count.saturating_sub(1);

        if state.subscriber_count > 0 {
            return;
        }

        let producer = state.producer.take();
        state.latest = None;
        state.completed = false;
        state.generation += 1;
        drop(state);

        if let Some(handle) = producer {
            handle.abort();
            logger::debug(
                LogTag::Cache,
                &format!("Last subscriber left {}, producer torn down", self.label),
            );
        }
    }
}

/// One subscriber's view of a [`SharedStream`]. Dropping it unsubscribes.
pub struct Subscription<T> {
    id: u64,
    rx: mpsc::UnboundedReceiver<T>,
    inner: Arc<SharedInner<T>>,
}

impl<T> Stream for Subscription<T> {
    type Item = T;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
        self.get_mut().rx.poll_recv(cx)
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        self.inner.release(self.id);
    }
}
