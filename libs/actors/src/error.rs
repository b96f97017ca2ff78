//! Error types for executors and actor contexts

use thiserror::Error;

/// Result type for actor operations
pub type Result<T> = std::result::Result<T, ActorError>;

/// Errors returned synchronously by actor context operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ActorError {
    /// `ActorContext::from_current` was called outside an executor action
    #[error("no ambient dispatcher is installed on this thread")]
    NoAmbientDispatcher,

    /// The executor worker thread could not be started
    #[error("failed to spawn worker thread for {name}: {message}")]
    Spawn { name: String, message: String },
}

impl ActorError {
    pub(crate) fn spawn(name: impl Into<String>, source: std::io::Error) -> Self {
        Self::Spawn {
            name: name.into(),
            message: source.to_string(),
        }
    }
}

/// Failures published on an executor's error channel
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExecutorError {
    /// An action panicked on the worker thread; the executor is now stopping
    #[error("action panicked on {executor}: {message}")]
    ActionPanicked { executor: String, message: String },
}

impl ExecutorError {
    /// Build an `ActionPanicked` error from a `catch_unwind` payload
    pub(crate) fn from_panic(executor: &str, payload: &(dyn std::any::Any + Send)) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&'static str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };

        Self::ActionPanicked {
            executor: executor.to_string(),
            message,
        }
    }

    /// Name of the executor that reported the failure
    pub fn executor(&self) -> &str {
        match self {
            Self::ActionPanicked { executor, .. } => executor,
        }
    }
}
