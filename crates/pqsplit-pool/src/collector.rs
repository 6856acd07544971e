// Thread-safe collection of fire-and-forget task failures

use std::any::Any;
use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::pool::TaskId;

/// Why a fire-and-forget task did not succeed
#[derive(Debug)]
pub enum TaskError {
    /// The task returned an error
    Failed(Box<dyn StdError + Send + Sync>),
    /// The task panicked; holds the panic message when it was a string
    Panicked(String),
}

impl TaskError {
    /// Downcast a returned error to its concrete type.
    pub fn downcast_ref<E: StdError + 'static>(&self) -> Option<&E> {
        match self {
            TaskError::Failed(err) => err.downcast_ref::<E>(),
            TaskError::Panicked(_) => None,
        }
    }

    pub(crate) fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        TaskError::Panicked(panic_message(payload))
    }
}

impl fmt::Display for TaskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskError::Failed(err) => write!(f, "{}", err),
            TaskError::Panicked(msg) => write!(f, "panicked: {}", msg),
        }
    }
}

pub(crate) fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// One failed fire-and-forget task
#[derive(Debug)]
pub struct TaskFailure {
    pub task_id: TaskId,
    pub label: String,
    pub error: TaskError,
}

impl fmt::Display for TaskFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task {} ({}): {}", self.task_id, self.label, self.error)
    }
}

/// Aggregated failure channel shared by all workers of a pool.
#[derive(Debug, Clone, Default)]
pub struct ErrorCollector {
    inner: Arc<Mutex<Vec<TaskFailure>>>,
}

impl ErrorCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, failure: TaskFailure) {
        tracing::error!(
            task_id = failure.task_id,
            label = %failure.label,
            error = %failure.error,
            "Fire-and-forget task failed"
        );
        self.inner.lock().push(failure);
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// Remove and return every recorded failure.
    pub fn take(&self) -> Vec<TaskFailure> {
        std::mem::take(&mut *self.inner.lock())
    }

    /// Remove and return the failures matching `predicate`, keeping the rest.
    pub fn take_where<F>(&self, mut predicate: F) -> Vec<TaskFailure>
    where
        F: FnMut(&TaskFailure) -> bool,
    {
        let mut guard = self.inner.lock();
        let (taken, kept): (Vec<_>, Vec<_>) =
            std::mem::take(&mut *guard).into_iter().partition(|f| predicate(f));
        *guard = kept;
        taken
    }
}
