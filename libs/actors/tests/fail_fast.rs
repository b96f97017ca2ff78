//! Failure containment
//!
//! A panicking action is reported once on the error channel, the executor
//! stops, and the process survives. Other contexts are unaffected.

use courier_actors::{ActorContext, ExecutorError};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

const TIMEOUT: Duration = Duration::from_secs(10);

#[test]
fn test_panic_is_reported_and_stops_executor() {
    let ctx = ActorContext::named("faulty").unwrap();
    let mut errors = ctx.subscribe_errors();

    let before = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&before);
    ctx.post(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    ctx.post(|| panic!("handler exploded"));

    assert!(ctx.completion().wait_timeout(TIMEOUT));
    assert!(ctx.is_stopping());
    assert_eq!(before.load(Ordering::SeqCst), 1);

    let failure = errors.try_recv().expect("one failure published");
    assert_eq!(
        failure,
        ExecutorError::ActionPanicked {
            executor: "faulty".to_string(),
            message: "handler exploded".to_string(),
        }
    );
    assert!(errors.try_recv().is_err(), "exactly one failure expected");
}

/// Fail-fast is deliberate: once one action panics, every later post to the
/// same context is silently discarded.
#[test]
fn test_posts_after_failure_are_discarded() {
    let ctx = ActorContext::named("discarding").unwrap();
    ctx.post(|| panic!("first failure"));
    assert!(ctx.completion().wait_timeout(TIMEOUT));

    let ran = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&ran);
    ctx.post(move || flag.store(true, Ordering::SeqCst));

    std::thread::sleep(Duration::from_millis(100));
    assert!(!ran.load(Ordering::SeqCst));
}

#[test]
fn test_failure_is_isolated_to_one_context() {
    let faulty = ActorContext::named("isolated-faulty").unwrap();
    let healthy = ActorContext::named("isolated-healthy").unwrap();

    faulty.post(|| panic!("only me"));
    assert!(faulty.completion().wait_timeout(TIMEOUT));

    let reply = healthy.call(|| 42);
    assert_eq!(futures::executor::block_on(reply).unwrap(), 42);
    assert!(!healthy.is_stopping());
    assert!(healthy.stop().wait_timeout(TIMEOUT));
}

#[test]
fn test_spawned_future_panic_is_contained() {
    let ctx = ActorContext::named("task-panic").unwrap();
    let mut errors = ctx.subscribe_errors();

    let worker = ctx.clone();
    ctx.spawn(async move {
        (&worker).await;
        panic!("async body failed");
    });

    assert!(ctx.completion().wait_timeout(TIMEOUT));
    let failure = errors.try_recv().unwrap();
    assert!(failure.to_string().contains("async body failed"));
}
