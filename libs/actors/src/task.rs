//! Futures driven by actor executors
//!
//! A task is polled only from actions on its home executor. Waking it
//! enqueues one poll on the home; the `scheduled` flag collapses repeated
//! wakes into a single pending poll. `SwitchTo` re-homes the running task
//! so its next poll lands on the target executor.

use crate::executor::Executor;
use futures::future::BoxFuture;
use futures::task::{waker_ref, ArcWake};
use parking_lot::Mutex;
use std::cell::RefCell;
use std::future::Future;
use std::panic::{catch_unwind, resume_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::Context;

thread_local! {
    static CURRENT_TASK: RefCell<Option<Arc<Task>>> = const { RefCell::new(None) };
}

/// Task being polled on the calling thread
pub(crate) fn current() -> Option<Arc<Task>> {
    CURRENT_TASK.with(|slot| slot.borrow().clone())
}

struct CurrentTaskGuard {
    previous: Option<Arc<Task>>,
}

impl CurrentTaskGuard {
    fn enter(task: Arc<Task>) -> Self {
        let previous = CURRENT_TASK.with(|slot| slot.borrow_mut().replace(task));
        Self { previous }
    }
}

impl Drop for CurrentTaskGuard {
    fn drop(&mut self) {
        CURRENT_TASK.with(|slot| *slot.borrow_mut() = self.previous.take());
    }
}

pub(crate) struct Task {
    future: Mutex<Option<BoxFuture<'static, ()>>>,
    home: Mutex<Arc<dyn Executor>>,
    scheduled: AtomicBool,
}

impl Task {
    pub(crate) fn spawn<F>(home: Arc<dyn Executor>, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let task = Arc::new(Task {
            future: Mutex::new(Some(Box::pin(future))),
            home: Mutex::new(home),
            scheduled: AtomicBool::new(false),
        });
        task.schedule();
    }

    /// Route subsequent polls to `executor`
    pub(crate) fn rehome(&self, executor: Arc<dyn Executor>) {
        *self.home.lock() = executor;
    }

    fn schedule(self: &Arc<Self>) {
        if self.scheduled.swap(true, Ordering::AcqRel) {
            return;
        }

        let home = Arc::clone(&*self.home.lock());
        let task = Arc::clone(self);
        home.enqueue(Box::new(move || task.run()));
    }

    fn run(self: Arc<Self>) {
        // Cleared before polling so a wake during the poll schedules again.
        self.scheduled.store(false, Ordering::Release);

        let waker = waker_ref(&self);
        let mut cx = Context::from_waker(&waker);
        let _current = CurrentTaskGuard::enter(Arc::clone(&self));

        let mut slot = self.future.lock();
        let Some(future) = slot.as_mut() else {
            return;
        };

        let polled = catch_unwind(AssertUnwindSafe(|| future.as_mut().poll(&mut cx)));
        match polled {
            Ok(poll) => {
                if poll.is_ready() {
                    *slot = None;
                }
            }
            Err(payload) => {
                *slot = None;
                drop(slot);
                resume_unwind(payload);
            }
        }
    }
}

impl ArcWake for Task {
    fn wake_by_ref(arc_self: &Arc<Self>) {
        arc_self.schedule();
    }
}
