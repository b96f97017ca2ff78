//! Per-thread ambient dispatcher
//!
//! While an executor runs an action (with `ambient_context` enabled) it is
//! installed here, so code deep inside the action can find "the executor I
//! am running on" via [`current`]. The previous value is restored after
//! every action, even if the action replaced it.

use crate::executor::Executor;
use std::cell::RefCell;
use std::sync::Arc;

thread_local! {
    static CURRENT: RefCell<Option<Arc<dyn Executor>>> = const { RefCell::new(None) };
}

/// Executor installed on the calling thread, if any
pub fn current() -> Option<Arc<dyn Executor>> {
    CURRENT.with(|slot| slot.borrow().clone())
}

/// Replace the calling thread's ambient executor, returning the previous one
pub fn set_current(executor: Option<Arc<dyn Executor>>) -> Option<Arc<dyn Executor>> {
    CURRENT.with(|slot| std::mem::replace(&mut *slot.borrow_mut(), executor))
}

/// Restores the previous ambient executor on drop
#[must_use = "the ambient executor is restored when the guard drops"]
pub(crate) struct AmbientGuard {
    previous: Option<Arc<dyn Executor>>,
}

pub(crate) fn enter(executor: Arc<dyn Executor>) -> AmbientGuard {
    AmbientGuard {
        previous: set_current(Some(executor)),
    }
}

impl Drop for AmbientGuard {
    fn drop(&mut self) {
        set_current(self.previous.take());
    }
}
