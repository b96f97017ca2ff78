//! Actor execution contexts with ordered, single-threaded mailboxes
//!
//! Every actor owns an [`ActorContext`]. All work posted to a context, and
//! every spawned async body that awaits it, runs one step at a time on the
//! context's dedicated worker thread, in the order it was enqueued.
//!
//! # Architecture
//!
//! ```text
//!  producers (any thread)          ThreadExecutor
//! ┌──────────────────────┐   ┌─────────────────────────────┐
//! │ ctx.post(action)     │   │  WorkQueue (crossbeam)      │
//! │ ctx.spawn(future)    │──▶│  ┌───┬───┬───┬───┐          │
//! │ ctx.switch_to().await│   │  │ a │ b │ c │...│ ──▶ worker│
//! └──────────────────────┘   │  └───┴───┴───┴───┘   thread │
//!                            │  completion · error channel │
//!                            └─────────────────────────────┘
//! ```
//!
//! A panicking action stops its executor (fail-fast) and is reported on
//! [`ActorContext::subscribe_errors`]; the process keeps running.
//!
//! # Examples
//!
//! ```rust
//! use courier_actors::ActorContext;
//! use std::time::Duration;
//!
//! let ctx = ActorContext::named("greeter").unwrap();
//! let reply = ctx.call(|| "hello from the worker".to_string());
//! assert_eq!(futures::executor::block_on(reply).unwrap(), "hello from the worker");
//!
//! assert!(ctx.stop().wait_timeout(Duration::from_secs(5)));
//! ```

pub mod ambient;
pub mod completion;
pub mod context;
pub mod error;
pub mod executor;
pub mod queue;
mod task;

pub use completion::Completion;
pub use context::{ActorContext, SwitchTo};
pub use error::{ActorError, ExecutorError, Result};
pub use executor::{Executor, ExecutorSettings, ThreadExecutor};
pub use queue::{Action, WorkQueue};
