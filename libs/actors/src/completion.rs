//! One-shot completion signal
//!
//! Fired exactly once by an executor when its worker finishes draining after
//! a stop request. Every clone of a [`Completion`] observes the same signal
//! and stays readable forever afterwards. It can be awaited from async code
//! or waited on from plain threads.

use futures::channel::oneshot;
use futures::future::{FutureExt, Shared};
use parking_lot::{Condvar, Mutex};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

struct Flag {
    done: Mutex<bool>,
    cond: Condvar,
}

/// Setter side of a completion signal
pub(crate) struct CompletionSource {
    tx: Mutex<Option<oneshot::Sender<()>>>,
    flag: Arc<Flag>,
}

/// Observer side of a completion signal
#[derive(Clone)]
pub struct Completion {
    rx: Shared<oneshot::Receiver<()>>,
    flag: Arc<Flag>,
}

/// Create a linked source/observer pair
pub(crate) fn completion_pair() -> (CompletionSource, Completion) {
    let (tx, rx) = oneshot::channel();
    let flag = Arc::new(Flag {
        done: Mutex::new(false),
        cond: Condvar::new(),
    });

    (
        CompletionSource {
            tx: Mutex::new(Some(tx)),
            flag: Arc::clone(&flag),
        },
        Completion {
            rx: rx.shared(),
            flag,
        },
    )
}

impl CompletionSource {
    /// Fire the signal. Returns `false` if it had already fired.
    pub(crate) fn complete(&self) -> bool {
        let Some(tx) = self.tx.lock().take() else {
            return false;
        };

        {
            let mut done = self.flag.done.lock();
            *done = true;
            self.flag.cond.notify_all();
        }
        let _ = tx.send(());
        true
    }
}

impl Drop for CompletionSource {
    fn drop(&mut self) {
        // A source dropped without firing still releases its waiters.
        self.complete();
    }
}

impl Completion {
    /// Whether the signal has fired
    pub fn is_complete(&self) -> bool {
        *self.flag.done.lock()
    }

    /// Block the calling thread until the signal fires
    pub fn wait(&self) {
        let mut done = self.flag.done.lock();
        while !*done {
            self.flag.cond.wait(&mut done);
        }
    }

    /// Block up to `timeout`; returns whether the signal fired
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut done = self.flag.done.lock();
        while !*done {
            if self.flag.cond.wait_until(&mut done, deadline).timed_out() {
                return *done;
            }
        }
        true
    }
}

impl Future for Completion {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        // Cancellation only happens when the source is dropped, which also
        // counts as completion.
        Pin::new(&mut self.rx).poll(cx).map(|_| ())
    }
}

impl fmt::Debug for Completion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Completion")
            .field("complete", &self.is_complete())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fires_once_and_stays_readable() {
        let (source, completion) = completion_pair();
        let observer = completion.clone();
        assert!(!completion.is_complete());
        assert!(!completion.wait_timeout(Duration::from_millis(5)));

        assert!(source.complete());
        assert!(!source.complete());

        assert!(completion.is_complete());
        assert!(observer.wait_timeout(Duration::from_millis(5)));
        futures::executor::block_on(observer.clone());
        futures::executor::block_on(observer);
    }

    #[test]
    fn test_wait_across_threads() {
        let (source, completion) = completion_pair();
        let waiter = {
            let completion = completion.clone();
            std::thread::spawn(move || completion.wait())
        };

        std::thread::sleep(Duration::from_millis(10));
        source.complete();
        waiter.join().unwrap();
        assert!(completion.is_complete());
    }

    #[test]
    fn test_dropped_source_releases_waiters() {
        let (source, completion) = completion_pair();
        drop(source);
        assert!(completion.is_complete());
        futures::executor::block_on(completion);
    }
}
