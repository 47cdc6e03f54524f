//! Cooperative cancellation token for one unit of work.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::Duration;

use smol_str::SmolStr;
use tracing::debug;

use crate::error::{RenderError, Result};

struct TaskInner {
    name: SmolStr,
    terminated: AtomicBool,
    finished: Mutex<bool>,
    finished_signal: Condvar,
}

/// A cancellable unit of work such as rendering one page.
///
/// Clones share state: the producer holds one and calls
/// [`ensure_not_terminated`](Self::ensure_not_terminated) between steps and
/// [`finish`](Self::finish) when it stops; the owner holds another and may
/// [`terminate`](Self::terminate) it or wait for it from any thread.
#[derive(Clone)]
pub struct WorkerTask {
    inner: Arc<TaskInner>,
}

impl fmt::Debug for WorkerTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerTask")
            .field("name", &self.inner.name)
            .field("terminated", &self.is_terminated())
            .field("finished", &self.is_finished())
            .finish()
    }
}

impl WorkerTask {
    pub fn new(name: impl AsRef<str>) -> Self {
        Self {
            inner: Arc::new(TaskInner {
                name: SmolStr::new(name),
                terminated: AtomicBool::new(false),
                finished: Mutex::new(false),
                finished_signal: Condvar::new(),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Requests cancellation. Idempotent; never blocks on the producer.
    pub fn terminate(&self) {
        if !self.inner.terminated.swap(true, Ordering::AcqRel) {
            debug!(task = %self.inner.name, "worker task terminated");
        }
    }

    pub fn is_terminated(&self) -> bool {
        self.inner.terminated.load(Ordering::Acquire)
    }

    /// Fails with [`RenderError::Terminated`] once the task was terminated.
    pub fn ensure_not_terminated(&self) -> Result<()> {
        if self.is_terminated() {
            return Err(RenderError::Terminated {
                task: self.inner.name.to_string(),
            });
        }
        Ok(())
    }

    /// Resolves the completion signal. Later calls have no effect.
    pub fn finish(&self) {
        let mut finished = self
            .inner
            .finished
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if !*finished {
            *finished = true;
            self.inner.finished_signal.notify_all();
        }
    }

    pub fn is_finished(&self) -> bool {
        *self
            .inner
            .finished
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Blocks until [`finish`](Self::finish) was called.
    pub fn wait_finished(&self) {
        let finished = self
            .inner
            .finished
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let _finished = self
            .inner
            .finished_signal
            .wait_while(finished, |done| !*done)
            .unwrap_or_else(PoisonError::into_inner);
    }

    /// Like [`wait_finished`](Self::wait_finished) with a deadline.
    /// Returns whether the task finished in time.
    pub fn wait_finished_timeout(&self, timeout: Duration) -> bool {
        let finished = self
            .inner
            .finished
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let (finished, _) = self
            .inner
            .finished_signal
            .wait_timeout_while(finished, timeout, |done| !*done)
            .unwrap_or_else(PoisonError::into_inner);
        *finished
    }

    /// Whether `self` and `other` are handles to the same task.
    pub fn same_task(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}
