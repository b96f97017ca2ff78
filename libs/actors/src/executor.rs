//! Executor: one mailbox, one dedicated worker thread
//!
//! The worker drains its [`WorkQueue`] strictly in order, one action at a
//! time. A panicking action is caught at the executor boundary, published
//! on the error channel and flips the executor into the stopping state
//! (fail-fast): everything posted afterwards is silently dropped.
//!
//! ## Lifecycle
//!
//! ```text
//! running --stop()/panic--> stopping --queue empty--> completed
//! ```
//!
//! `stop()` never discards actions that were already accepted; the worker
//! drains them before firing the completion signal.

use crate::ambient;
use crate::completion::{completion_pair, Completion, CompletionSource};
use crate::error::{ActorError, ExecutorError, Result};
use crate::queue::{Action, WorkQueue};
use courier_config::runtime::{
    DEFAULT_POLL_INTERVAL_MS, ERROR_CHANNEL_CAPACITY, UNBOUNDED_CAPACITY,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread::ThreadId;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, error, info, trace};

static EXECUTOR_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// A serial scheduler that runs actions one at a time, in enqueue order.
///
/// Implementors must never run two actions concurrently and must run them
/// in the order `enqueue` accepted them.
pub trait Executor: Send + Sync + 'static {
    /// Append an action; silently dropped once the executor is stopping
    fn enqueue(&self, action: Action);

    /// Stop accepting work, drain what is pending, then complete. Idempotent.
    fn stop(&self) -> Completion;

    /// Signal that fires once the executor has drained after a stop
    fn completion(&self) -> Completion;

    /// Subscribe to failures raised by actions
    fn subscribe_errors(&self) -> broadcast::Receiver<ExecutorError>;

    /// Whether new work is being refused
    fn is_stopping(&self) -> bool;

    /// Whether the calling thread is the one draining this executor
    fn is_worker_thread(&self) -> bool;

    /// Diagnostic label
    fn name(&self) -> &str;
}

/// Executor tuning
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorSettings {
    /// Maximum pending actions before producers block; 0 is unbounded
    pub queue_capacity: usize,
    /// Idle wait between stop-flag checks (milliseconds)
    pub poll_interval_ms: u64,
    /// Install the executor as the ambient dispatcher while actions run
    pub ambient_context: bool,
}

impl Default for ExecutorSettings {
    fn default() -> Self {
        Self {
            queue_capacity: UNBOUNDED_CAPACITY,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            ambient_context: true,
        }
    }
}

impl ExecutorSettings {
    /// Settings for a mailbox that blocks producers beyond `capacity`
    pub fn bounded(capacity: usize) -> Self {
        Self {
            queue_capacity: capacity,
            ..Self::default()
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn with_ambient_context(mut self, enabled: bool) -> Self {
        self.ambient_context = enabled;
        self
    }

    /// Idle wait, never shorter than one millisecond
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

struct Shared {
    name: String,
    queue: WorkQueue,
    stopping: AtomicBool,
    settings: ExecutorSettings,
    completion: Completion,
    errors: broadcast::Sender<ExecutorError>,
    worker: OnceLock<ThreadId>,
}

/// Executor backed by a dedicated OS thread.
///
/// Cloning yields another handle to the same executor.
#[derive(Clone)]
pub struct ThreadExecutor {
    shared: Arc<Shared>,
}

impl ThreadExecutor {
    /// Start an unnamed executor with default settings
    pub fn new() -> Result<Self> {
        Self::with_settings(None, ExecutorSettings::default())
    }

    /// Start a named executor with default settings
    pub fn named(name: impl Into<String>) -> Result<Self> {
        Self::with_settings(Some(name.into()), ExecutorSettings::default())
    }

    /// Start an executor and its worker thread
    pub fn with_settings(name: Option<String>, settings: ExecutorSettings) -> Result<Self> {
        let id = EXECUTOR_ID_COUNTER.fetch_add(1, Ordering::Relaxed);
        let name = name.unwrap_or_else(|| format!("executor-{}", id));
        let (source, completion) = completion_pair();
        let (errors, _) = broadcast::channel(ERROR_CHANNEL_CAPACITY);

        let shared = Arc::new(Shared {
            name: name.clone(),
            queue: WorkQueue::new(settings.queue_capacity),
            stopping: AtomicBool::new(false),
            settings,
            completion,
            errors,
            worker: OnceLock::new(),
        });

        let worker_shared = Arc::clone(&shared);
        let handle = std::thread::Builder::new()
            .name(format!("courier-{}", name))
            .spawn(move || run_worker(worker_shared, source))
            .map_err(|e| ActorError::spawn(name.clone(), e))?;
        let _ = shared.worker.set(handle.thread().id());

        debug!(
            executor = %name,
            capacity = shared.settings.queue_capacity,
            poll_interval_ms = shared.settings.poll_interval_ms,
            ambient_context = shared.settings.ambient_context,
            "Executor started"
        );

        Ok(Self { shared })
    }

    /// Actions waiting in the mailbox
    pub fn pending(&self) -> usize {
        self.shared.queue.len()
    }

    pub fn settings(&self) -> &ExecutorSettings {
        &self.shared.settings
    }
}

impl Executor for ThreadExecutor {
    fn enqueue(&self, action: Action) {
        if self.shared.stopping.load(Ordering::Acquire) {
            trace!(executor = %self.shared.name, "Dropping action posted after stop");
            return;
        }

        if self.shared.queue.enqueue(action).is_err() {
            trace!(executor = %self.shared.name, "Mailbox closed, action dropped");
        }
    }

    fn stop(&self) -> Completion {
        if !self.shared.stopping.swap(true, Ordering::AcqRel) {
            debug!(
                executor = %self.shared.name,
                pending = self.shared.queue.len(),
                "Stop requested, draining mailbox"
            );
        }
        self.shared.completion.clone()
    }

    fn completion(&self) -> Completion {
        self.shared.completion.clone()
    }

    fn subscribe_errors(&self) -> broadcast::Receiver<ExecutorError> {
        self.shared.errors.subscribe()
    }

    fn is_stopping(&self) -> bool {
        self.shared.stopping.load(Ordering::Acquire)
    }

    fn is_worker_thread(&self) -> bool {
        self.shared.worker.get() == Some(&std::thread::current().id())
    }

    fn name(&self) -> &str {
        &self.shared.name
    }
}

impl fmt::Debug for ThreadExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadExecutor")
            .field("name", &self.shared.name)
            .field("pending", &self.shared.queue.len())
            .field("stopping", &self.is_stopping())
            .finish()
    }
}

impl fmt::Display for ThreadExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "executor `{}`", self.shared.name)
    }
}

fn run_worker(shared: Arc<Shared>, source: CompletionSource) {
    // The spawner records the id too; whichever runs first wins.
    let _ = shared.worker.set(std::thread::current().id());
    let ambient: Option<Arc<dyn Executor>> = if shared.settings.ambient_context {
        Some(Arc::new(ThreadExecutor {
            shared: Arc::clone(&shared),
        }))
    } else {
        None
    };
    let poll_interval = shared.settings.poll_interval();
    let mut executed: u64 = 0;

    loop {
        if shared.stopping.load(Ordering::Acquire) && shared.queue.is_empty() {
            break;
        }

        if let Some(action) = shared.queue.dequeue_timeout(poll_interval) {
            execute(&shared, ambient.as_ref(), action);
            executed += 1;
        }
    }

    info!(executor = %shared.name, executed, "Executor drained and completed");
    drop(ambient);
    source.complete();
}

fn execute(shared: &Shared, ambient: Option<&Arc<dyn Executor>>, action: Action) {
    let guard = ambient.map(|executor| ambient::enter(Arc::clone(executor)));
    let result = catch_unwind(AssertUnwindSafe(action));
    drop(guard);

    if let Err(payload) = result {
        let failure = ExecutorError::from_panic(&shared.name, payload.as_ref());
        error!(executor = %shared.name, error = %failure, "Action failed, executor stopping");
        shared.stopping.store(true, Ordering::Release);
        // No subscribers is fine; the failure is already logged.
        let _ = shared.errors.send(failure);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    fn wait(completion: &Completion) {
        assert!(
            completion.wait_timeout(Duration::from_secs(5)),
            "executor did not complete in time"
        );
    }

    #[test]
    fn test_executes_in_order_and_completes() {
        let executor = ThreadExecutor::named("ordered").unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for i in 0..100 {
            let seen = Arc::clone(&seen);
            executor.enqueue(Box::new(move || seen.lock().push(i)));
        }

        wait(&executor.stop());
        assert_eq!(*seen.lock(), (0..100).collect::<Vec<_>>());
        assert_eq!(executor.pending(), 0);
    }

    #[test]
    fn test_stop_is_idempotent() {
        let executor = ThreadExecutor::new().unwrap();
        let first = executor.stop();
        let second = executor.stop();
        wait(&first);
        assert!(second.is_complete());
        assert!(executor.completion().is_complete());
        assert!(executor.is_stopping());
    }

    #[test]
    fn test_enqueue_after_stop_is_dropped() {
        let executor = ThreadExecutor::new().unwrap();
        let ran = Arc::new(AtomicBool::new(false));
        wait(&executor.stop());

        let flag = Arc::clone(&ran);
        executor.enqueue(Box::new(move || flag.store(true, Ordering::SeqCst)));
        std::thread::sleep(Duration::from_millis(20));
        assert!(!ran.load(Ordering::SeqCst));
    }

    #[test]
    fn test_actions_run_on_worker_thread() {
        let executor = ThreadExecutor::named("threaded").unwrap();
        assert!(!executor.is_worker_thread());

        let (tx, rx) = std::sync::mpsc::channel();
        let handle = executor.clone();
        executor.enqueue(Box::new(move || {
            let name = std::thread::current().name().map(str::to_string);
            tx.send((handle.is_worker_thread(), name)).unwrap();
        }));

        let (on_worker, name) = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(on_worker);
        assert_eq!(name.as_deref(), Some("courier-threaded"));
        wait(&executor.stop());
    }

    #[test]
    fn test_settings_defaults() {
        let settings = ExecutorSettings::default();
        assert_eq!(settings.queue_capacity, 0);
        assert_eq!(settings.poll_interval(), Duration::from_millis(50));
        assert!(settings.ambient_context);

        let tuned = ExecutorSettings::bounded(8)
            .with_poll_interval(Duration::ZERO)
            .with_ambient_context(false);
        assert_eq!(tuned.queue_capacity, 8);
        assert_eq!(tuned.poll_interval(), Duration::from_millis(1));
        assert!(!tuned.ambient_context);

        let saturated = ExecutorSettings::default().with_poll_interval(Duration::MAX);
        assert_eq!(saturated.poll_interval_ms, u64::MAX);
    }

    #[test]
    fn test_display_uses_name() {
        let executor = ThreadExecutor::named("mailbox-a").unwrap();
        assert_eq!(executor.to_string(), "executor `mailbox-a`");
        assert_eq!(executor.name(), "mailbox-a");
        wait(&executor.stop());
    }
}
