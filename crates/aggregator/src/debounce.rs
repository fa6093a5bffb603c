//! Debounce scheduler for merged task sequences
//!
//! Holds the pending merged queue and a single cancellable timer.
//! Enqueues within the window merge into the queue and restart the
//! timer; expiry (or a manual flush) drains the queue through the
//! executor exactly once per logical batch.

use crate::config::AggregatorConfig;
use crate::executor::Executor;
use parking_lot::Mutex;
use sequence::{merge, Callback, Element, MergeError, Step};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

/// Transform hook run on the merged sequence just before execution
///
/// Returning `None` (or an empty replacement) means "execute the merged
/// sequence unchanged"; it is a transform, not a veto.
type PostProcess = Box<dyn Fn(&[Element]) -> Option<Vec<Element>> + Send + Sync>;

/// Debouncing aggregator for ordered task sequences
///
/// Sequences enqueued within the configured window are merged into one
/// queue; when the window elapses without a further enqueue, the merged
/// sequence is handed to the executor. Instances are independent: each
/// owns its queue and timer, and any number may coexist.
///
/// All operations are synchronous; the only suspension point is the
/// timer itself, which runs as a spawned task. `enqueue` must therefore
/// be called from within a tokio runtime.
pub struct Aggregator {
    inner: Arc<Inner>,
}

struct Inner {
    /// Debounce window
    window: Duration,

    /// External sequence runner
    executor: Box<dyn Executor>,

    /// Optional pre-execution transform
    post_process: Option<PostProcess>,

    /// Queue and timer state
    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    /// Current merged sequence
    queue: Vec<Element>,

    /// The single outstanding timer, if any
    timer: Option<JoinHandle<()>>,

    /// Bumped whenever the timer is disarmed; a timer that fires with a
    /// stale epoch was superseded and must not flush
    epoch: u64,
}

impl Aggregator {
    /// Create an aggregator that hands merged sequences to `executor`
    pub fn new(config: AggregatorConfig, executor: impl Executor + 'static) -> Self {
        Self::build(config, executor, None)
    }

    /// Create an aggregator with a pre-execution transform
    ///
    /// `post_process` sees the merged sequence immediately before it is
    /// executed and may return a replacement; `None` or an empty result
    /// leaves the sequence unchanged.
    pub fn with_post_process(
        config: AggregatorConfig,
        executor: impl Executor + 'static,
        post_process: impl Fn(&[Element]) -> Option<Vec<Element>> + Send + Sync + 'static,
    ) -> Self {
        Self::build(config, executor, Some(Box::new(post_process)))
    }

    fn build(
        config: AggregatorConfig,
        executor: impl Executor + 'static,
        post_process: Option<PostProcess>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                window: config.window(),
                executor: Box::new(executor),
                post_process,
                state: Mutex::new(State::default()),
            }),
        }
    }

    /// Merge a new sequence into the queue and restart the window
    ///
    /// The merge is computed in full before the queue is replaced, so a
    /// failed enqueue leaves the queue (and any armed timer) exactly as
    /// they were. Returns the queue contents after the merge.
    pub fn enqueue(&self, elements: Vec<Element>) -> Result<Vec<Element>, MergeError> {
        self.inner.enqueue(elements)
    }

    /// Drain the queue through the executor immediately
    ///
    /// Idempotent: flushing an empty queue does nothing, and a timer
    /// armed before a manual flush will not fire a second time for the
    /// same batch.
    pub fn flush(&self) {
        self.inner.flush();
    }

    /// Build a watch handler that enqueues `steps` on every trigger
    ///
    /// The returned closure takes an event payload (ignored) and a
    /// completion callback, and enqueues the steps with the callback
    /// appended, so each trigger site gets its completion invoked after
    /// the shared batch runs. A merge failure inside the handler is
    /// logged and dropped; the event source has no way to handle it.
    pub fn handler<P>(&self, steps: Vec<Step>) -> impl Fn(P, Callback) + Send + Sync + 'static {
        let inner = Arc::clone(&self.inner);
        move |_payload: P, done: Callback| {
            let mut elements: Vec<Element> =
                steps.iter().cloned().map(Element::Step).collect();
            elements.push(Element::Callback(done));

            if let Err(error) = inner.enqueue(elements) {
                warn!(%error, "watch handler enqueue failed; sequence dropped");
            }
        }
    }
}

impl Inner {
    fn enqueue(self: &Arc<Self>, elements: Vec<Element>) -> Result<Vec<Element>, MergeError> {
        let mut state = self.state.lock();

        // Compute the merged queue in full before committing it.
        let merged = merge(&[state.queue.as_slice(), elements.as_slice()])?;
        state.queue = merged;

        // Disarm the previous timer; every enqueue restarts the window.
        state.epoch += 1;
        if let Some(timer) = state.timer.take() {
            timer.abort();
        }

        if !state.queue.is_empty() {
            let inner = Arc::clone(self);
            let epoch = state.epoch;
            // The window is measured from the enqueue itself; an
            // absolute deadline keeps it independent of when the timer
            // task is first polled.
            let deadline = tokio::time::Instant::now() + self.window;
            state.timer = Some(tokio::spawn(async move {
                tokio::time::sleep_until(deadline).await;
                inner.timer_fired(epoch);
            }));
            trace!(
                window_ms = self.window.as_millis() as u64,
                "debounce timer armed"
            );
        }

        debug!(queue_len = state.queue.len(), "sequence enqueued");
        Ok(state.queue.clone())
    }

    fn flush(&self) {
        let batch = {
            let mut state = self.state.lock();
            Self::drain(&mut state)
        };
        self.dispatch(batch);
    }

    fn timer_fired(&self, epoch: u64) {
        let batch = {
            let mut state = self.state.lock();
            if state.epoch != epoch {
                trace!("stale debounce timer ignored");
                return;
            }
            Self::drain(&mut state)
        };
        self.dispatch(batch);
    }

    /// Reset the queue and disarm the timer; must run under the lock
    fn drain(state: &mut State) -> Vec<Element> {
        state.epoch += 1;
        if let Some(timer) = state.timer.take() {
            timer.abort();
        }
        std::mem::take(&mut state.queue)
    }

    /// Hand a drained batch to the executor, outside the lock
    fn dispatch(&self, batch: Vec<Element>) {
        if batch.is_empty() {
            return;
        }

        let filtered = match &self.post_process {
            Some(post_process) => match post_process(&batch) {
                Some(replacement) if !replacement.is_empty() => replacement,
                _ => batch,
            },
            None => batch,
        };

        info!(len = filtered.len(), "dispatching merged sequence");
        self.executor.execute(filtered);
    }
}
