//! Actor execution context
//!
//! An [`ActorContext`] is the handle an actor keeps to its executor. Inside
//! a body started with [`ActorContext::spawn`], awaiting a context (or
//! [`ActorContext::switch_to`]) moves the rest of the body onto that
//! executor's worker thread, behind everything already queued there:
//!
//! ```no_run
//! use courier_actors::ActorContext;
//!
//! # async fn demo() -> courier_actors::Result<()> {
//! let ctx = ActorContext::named("counter")?;
//! let worker = ctx.clone();
//! ctx.spawn(async move {
//!     worker.switch_to().await;
//!     // runs on the `counter` worker thread, one step at a time
//! });
//! # Ok(())
//! # }
//! ```
//!
//! Awaited from any other runtime (e.g. a plain tokio task) the same future
//! is only an ordering barrier: it resolves after the executor has drained
//! everything queued before it, but the body keeps running on the foreign
//! runtime's threads, concurrently with later actions. Actor state must
//! not be touched there; use `spawn`, `post` or `call` instead.

use crate::ambient;
use crate::completion::Completion;
use crate::error::{ActorError, ExecutorError, Result};
use crate::executor::{Executor, ExecutorSettings, ThreadExecutor};
use crate::task::{self, Task};
use futures::channel::oneshot;
use futures::task::AtomicWaker;
use std::fmt;
use std::future::{Future, IntoFuture};
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::broadcast;
use tracing::{trace, warn};

/// Per-actor facade over exactly one executor
#[derive(Clone)]
pub struct ActorContext {
    executor: Arc<dyn Executor>,
    name: Option<Arc<str>>,
}

impl ActorContext {
    /// Context with its own executor and default settings
    pub fn new() -> Result<Self> {
        Self::with_settings(None, ExecutorSettings::default())
    }

    /// Context with its own named executor
    pub fn named(name: &str) -> Result<Self> {
        Self::with_settings(Some(name), ExecutorSettings::default())
    }

    pub fn with_settings(name: Option<&str>, settings: ExecutorSettings) -> Result<Self> {
        let executor = ThreadExecutor::with_settings(name.map(str::to_string), settings)?;
        Ok(Self::with_executor(name, Arc::new(executor)))
    }

    /// Wrap an externally owned executor; stopping this context stops it too
    pub fn with_executor(name: Option<&str>, executor: Arc<dyn Executor>) -> Self {
        Self {
            executor,
            name: name.map(Arc::from),
        }
    }

    /// Adopt the executor installed on the calling thread
    pub fn from_current() -> Result<Self> {
        let executor = ambient::current().ok_or(ActorError::NoAmbientDispatcher)?;
        Ok(Self::with_executor(None, executor))
    }

    /// Fire-and-forget: run `action` on the worker thread
    pub fn post<F>(&self, action: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.executor.enqueue(Box::new(action));
    }

    /// Run `f` on the worker thread and hand back its result.
    ///
    /// The receiver reports `Canceled` if the context stops before `f` runs.
    pub fn call<F, R>(&self, f: F) -> oneshot::Receiver<R>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        self.post(move || {
            let _ = tx.send(f());
        });
        rx
    }

    /// Drive `future` to completion, polling it only on the worker thread
    pub fn spawn<F>(&self, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        Task::spawn(Arc::clone(&self.executor), future);
    }

    /// Hop onto this context.
    ///
    /// Inside a body started with [`spawn`](Self::spawn) on any context, the
    /// rest of the body runs on this context's worker thread. Awaited from a
    /// foreign runtime it only waits for the queue ahead of it to drain and
    /// does not move the body; see the module docs.
    pub fn switch_to(&self) -> SwitchTo {
        SwitchTo {
            target: Arc::clone(&self.executor),
            state: SwitchState::Init,
        }
    }

    pub fn stop(&self) -> Completion {
        self.executor.stop()
    }

    pub fn completion(&self) -> Completion {
        self.executor.completion()
    }

    pub fn subscribe_errors(&self) -> broadcast::Receiver<ExecutorError> {
        self.executor.subscribe_errors()
    }

    pub fn is_stopping(&self) -> bool {
        self.executor.is_stopping()
    }

    /// Executor handle for explicit passing
    pub fn executor(&self) -> &Arc<dyn Executor> {
        &self.executor
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

/// `(&ctx).await` is `ctx.switch_to().await`, with the same thread affinity
/// caveat outside spawned bodies.
impl<'a> IntoFuture for &'a ActorContext {
    type Output = ();
    type IntoFuture = SwitchTo;

    fn into_future(self) -> SwitchTo {
        self.switch_to()
    }
}

impl fmt::Debug for ActorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActorContext")
            .field("name", &self.name)
            .field("executor", &self.executor.name())
            .finish()
    }
}

impl fmt::Display for ActorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "actor context `{}`", name),
            None => write!(f, "actor context on `{}`", self.executor.name()),
        }
    }
}

struct Signal {
    fired: AtomicBool,
    waker: AtomicWaker,
}

enum SwitchState {
    Init,
    /// Running inside a courier task that was re-homed to the target
    Rehomed,
    /// Running under some other executor; resumed through its waker on that
    /// executor's threads, so only ordering is guaranteed
    Foreign(Arc<Signal>),
}

static FOREIGN_AWAIT_WARNED: AtomicBool = AtomicBool::new(false);

/// Tell the user once that a foreign await does not move onto the worker
fn warn_foreign_await(executor: &str) {
    if FOREIGN_AWAIT_WARNED.swap(true, Ordering::Relaxed) {
        trace!(executor, "Context awaited outside a spawned body");
    } else {
        warn!(
            executor,
            "Context awaited outside a spawned body; the awaiting code keeps running on the \
             caller's runtime and must not touch actor state (use ActorContext::spawn)"
        );
    }
}

/// Future returned by [`ActorContext::switch_to`].
///
/// The first poll is always `Pending`. If the target is stopping the
/// continuation is dropped and the future never resolves.
#[must_use = "futures do nothing unless awaited"]
pub struct SwitchTo {
    target: Arc<dyn Executor>,
    state: SwitchState,
}

impl Future for SwitchTo {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        let this = self.get_mut();
        match &this.state {
            SwitchState::Init => {
                if let Some(current) = task::current() {
                    current.rehome(Arc::clone(&this.target));
                    cx.waker().wake_by_ref();
                    this.state = SwitchState::Rehomed;
                } else {
                    warn_foreign_await(this.target.name());
                    let signal = Arc::new(Signal {
                        fired: AtomicBool::new(false),
                        waker: AtomicWaker::new(),
                    });
                    signal.waker.register(cx.waker());

                    let continuation = Arc::clone(&signal);
                    this.target.enqueue(Box::new(move || {
                        continuation.fired.store(true, Ordering::Release);
                        continuation.waker.wake();
                    }));
                    this.state = SwitchState::Foreign(signal);
                }
                Poll::Pending
            }
            SwitchState::Rehomed => {
                if this.target.is_worker_thread() {
                    Poll::Ready(())
                } else {
                    // Polled early on the old home; the next poll is routed to the target.
                    cx.waker().wake_by_ref();
                    Poll::Pending
                }
            }
            SwitchState::Foreign(signal) => {
                signal.waker.register(cx.waker());
                if signal.fired.load(Ordering::Acquire) {
                    Poll::Ready(())
                } else {
                    Poll::Pending
                }
            }
        }
    }
}

impl fmt::Debug for SwitchTo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self.state {
            SwitchState::Init => "init",
            SwitchState::Rehomed => "rehomed",
            SwitchState::Foreign(_) => "foreign",
        };
        f.debug_struct("SwitchTo")
            .field("target", &self.target.name())
            .field("state", &state)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_from_current_without_ambient_fails() {
        assert_eq!(
            ActorContext::from_current().unwrap_err(),
            ActorError::NoAmbientDispatcher
        );
    }

    #[test]
    fn test_from_current_inside_action() {
        let ctx = ActorContext::named("ambient").unwrap();
        let rx = ctx.call(|| {
            ActorContext::from_current()
                .map(|adopted| adopted.executor().name().to_string())
        });

        let adopted = futures::executor::block_on(rx).unwrap().unwrap();
        assert_eq!(adopted, "ambient");
        assert!(ctx.stop().wait_timeout(Duration::from_secs(5)));
    }

    #[test]
    fn test_ambient_disabled() {
        let settings = ExecutorSettings::default().with_ambient_context(false);
        let ctx = ActorContext::with_settings(Some("plain"), settings).unwrap();
        let rx = ctx.call(|| ActorContext::from_current().is_err());

        assert!(futures::executor::block_on(rx).unwrap());
        assert!(ctx.stop().wait_timeout(Duration::from_secs(5)));
    }

    #[test]
    fn test_display() {
        let named = ActorContext::named("display").unwrap();
        assert_eq!(named.to_string(), "actor context `display`");
        assert_eq!(named.name(), Some("display"));

        let anonymous = ActorContext::with_executor(None, Arc::clone(named.executor()));
        assert_eq!(anonymous.to_string(), "actor context on `display`");
        assert!(named.stop().wait_timeout(Duration::from_secs(5)));
    }

    #[test]
    fn test_call_after_stop_is_canceled() {
        let ctx = ActorContext::new().unwrap();
        assert!(ctx.stop().wait_timeout(Duration::from_secs(5)));

        let rx = ctx.call(|| 1);
        assert!(futures::executor::block_on(rx).is_err());
    }
}
