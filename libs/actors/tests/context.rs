//! Continuation protocol: awaiting a context resumes on its worker thread

use courier_actors::{ambient, ActorContext, ActorError, Executor};
use futures::FutureExt;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, ThreadId};
use std::time::Duration;

const TIMEOUT: Duration = Duration::from_secs(10);

fn worker_thread_id(ctx: &ActorContext) -> ThreadId {
    futures::executor::block_on(ctx.call(|| thread::current().id())).unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_await_from_foreign_runtime_orders_without_moving_threads() {
    let ctx = ActorContext::named("foreign").unwrap();
    let worker = worker_thread_id(&ctx);

    (&ctx).await;
    // Woken from the worker, but tokio keeps polling the body on its own
    // threads: only the ordering behind the queue is guaranteed.
    let order = Arc::new(Mutex::new(Vec::new()));
    let first = Arc::clone(&order);
    ctx.post(move || first.lock().push("queued"));
    ctx.switch_to().await;
    order.lock().push("resumed");

    assert_eq!(*order.lock(), vec!["queued", "resumed"]);
    assert_ne!(thread::current().id(), worker);
    assert!(ctx.stop().wait_timeout(TIMEOUT));
}

#[test]
fn test_first_poll_is_always_pending() {
    let ctx = ActorContext::named("first-poll").unwrap();
    let (release, gate) = std::sync::mpsc::channel::<()>();
    ctx.post(move || {
        let _ = gate.recv();
    });

    let mut switch = tokio_test::task::spawn(ctx.switch_to());
    tokio_test::assert_pending!(switch.poll());
    // Still pending while the worker is busy with the gated action.
    tokio_test::assert_pending!(switch.poll());
    assert!(!switch.is_woken());

    release.send(()).unwrap();
    let deadline = std::time::Instant::now() + TIMEOUT;
    while !switch.is_woken() {
        assert!(std::time::Instant::now() < deadline, "continuation never ran");
        thread::sleep(Duration::from_millis(1));
    }
    tokio_test::assert_ready!(switch.poll());
    assert!(ctx.stop().wait_timeout(TIMEOUT));
}

#[test]
fn test_spawned_body_runs_on_each_awaited_context() {
    let a = ActorContext::named("hop-a").unwrap();
    let b = ActorContext::named("hop-b").unwrap();
    let a_thread = worker_thread_id(&a);
    let b_thread = worker_thread_id(&b);

    let (tx, rx) = std::sync::mpsc::channel();
    let (ctx_a, ctx_b) = (a.clone(), b.clone());
    a.spawn(async move {
        let mut trail = vec![thread::current().id()];
        ctx_b.switch_to().await;
        trail.push(thread::current().id());
        (&ctx_a).await;
        trail.push(thread::current().id());
        tx.send(trail).unwrap();
    });

    let trail = rx.recv_timeout(TIMEOUT).unwrap();
    assert_eq!(trail, vec![a_thread, b_thread, a_thread]);

    for ctx in [a, b] {
        assert!(ctx.stop().wait_timeout(TIMEOUT));
    }
}

#[test]
fn test_switch_to_same_context_yields_behind_queue() {
    let ctx = ActorContext::named("yield").unwrap();
    let order = Arc::new(Mutex::new(Vec::new()));
    let (tx, rx) = std::sync::mpsc::channel();

    let (worker, log) = (ctx.clone(), Arc::clone(&order));
    ctx.spawn(async move {
        log.lock().push("before");
        let queued = Arc::clone(&log);
        worker.post(move || queued.lock().push("posted"));
        worker.switch_to().await;
        log.lock().push("after");
        tx.send(()).unwrap();
    });

    rx.recv_timeout(TIMEOUT).unwrap();
    assert_eq!(*order.lock(), vec!["before", "posted", "after"]);
    assert!(ctx.stop().wait_timeout(TIMEOUT));
}

#[test]
fn test_continuation_runs_at_most_once() {
    const TASKS: usize = 100;

    let ctx = ActorContext::named("once").unwrap();
    let resumed = Arc::new(AtomicUsize::new(0));
    let (tx, rx) = std::sync::mpsc::channel();

    for _ in 0..TASKS {
        let (worker, resumed, tx) = (ctx.clone(), Arc::clone(&resumed), tx.clone());
        ctx.spawn(async move {
            worker.switch_to().await;
            resumed.fetch_add(1, Ordering::SeqCst);
            tx.send(()).unwrap();
        });
    }

    for _ in 0..TASKS {
        rx.recv_timeout(TIMEOUT).unwrap();
    }
    // Continuations must not fire again once consumed.
    thread::sleep(Duration::from_millis(100));
    assert_eq!(resumed.load(Ordering::SeqCst), TASKS);
    assert!(ctx.stop().wait_timeout(TIMEOUT));
}

#[test]
fn test_await_on_stopped_context_never_resumes() {
    let target = ActorContext::named("stopped-target").unwrap();
    assert!(target.stop().wait_timeout(TIMEOUT));

    let mut switch = target.switch_to();
    assert!((&mut switch).now_or_never().is_none());
    thread::sleep(Duration::from_millis(100));
    assert!(switch.now_or_never().is_none());
}

#[test]
fn test_spawn_on_stopped_context_is_dropped() {
    let ctx = ActorContext::new().unwrap();
    assert!(ctx.stop().wait_timeout(TIMEOUT));

    let ran = Arc::new(AtomicUsize::new(0));
    let flag = Arc::clone(&ran);
    ctx.spawn(async move {
        flag.fetch_add(1, Ordering::SeqCst);
    });
    thread::sleep(Duration::from_millis(100));
    assert_eq!(ran.load(Ordering::SeqCst), 0);
}

#[test]
fn test_ambient_restored_after_action_replaces_it() {
    let ctx = ActorContext::named("restore").unwrap();
    let other = ActorContext::named("restore-other").unwrap();

    let replacement = Arc::clone(other.executor());
    let done = ctx.call(move || {
        ambient::set_current(Some(replacement));
    });
    futures::executor::block_on(done).unwrap();

    let seen = ctx.call(|| ambient::current().map(|e| e.name().to_string()));
    assert_eq!(
        futures::executor::block_on(seen).unwrap().as_deref(),
        Some("restore")
    );

    // The worker thread itself has nothing installed between actions.
    assert!(ambient::current().is_none());
    assert_eq!(
        ActorContext::from_current().unwrap_err(),
        ActorError::NoAmbientDispatcher
    );

    for ctx in [ctx, other] {
        assert!(ctx.stop().wait_timeout(TIMEOUT));
    }
}

#[tokio::test]
async fn test_completion_is_awaitable_and_idempotent() {
    let ctx = ActorContext::named("await-completion").unwrap();
    let first = ctx.stop();
    let second = ctx.stop();

    first.await;
    second.await;
    ctx.completion().await;
    assert!(ctx.completion().is_complete());
}
