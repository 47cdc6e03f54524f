//! Outstanding tasks of one document worker.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::debug;

use super::task::WorkerTask;
use crate::error::{RenderError, Result};

#[derive(Debug, Default)]
struct RegistryInner {
    tasks: Mutex<Vec<WorkerTask>>,
    terminated: AtomicBool,
}

/// The set of tasks a document worker is running.
///
/// Shutting the worker down terminates every task and waits until each one
/// has finished, after which shared document state can be torn down.
#[derive(Debug, Clone, Default)]
pub struct TaskRegistry {
    inner: Arc<RegistryInner>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn tasks(&self) -> std::sync::MutexGuard<'_, Vec<WorkerTask>> {
        self.inner
            .tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Fails with [`RenderError::DocumentTerminated`] after
    /// [`terminate_all`](Self::terminate_all).
    pub fn ensure_not_terminated(&self) -> Result<()> {
        if self.is_terminated() {
            return Err(RenderError::DocumentTerminated);
        }
        Ok(())
    }

    pub fn is_terminated(&self) -> bool {
        self.inner.terminated.load(Ordering::Acquire)
    }

    /// Registers a running task, unless the worker is shutting down.
    ///
    /// The shutdown check and the registration happen under the task lock,
    /// so a task either lands in the set [`cancel_all`](Self::cancel_all)
    /// terminates or is refused.
    pub fn start(&self, task: &WorkerTask) -> Result<()> {
        let mut tasks = self.tasks();
        self.ensure_not_terminated()?;
        tasks.push(task.clone());
        Ok(())
    }

    /// Creates and registers a task, unless the worker is shutting down.
    pub fn start_new(&self, name: impl AsRef<str>) -> Result<WorkerTask> {
        let task = WorkerTask::new(name);
        self.start(&task)?;
        Ok(task)
    }

    /// Resolves the task's completion signal and forgets it.
    pub fn finish(&self, task: &WorkerTask) {
        task.finish();
        self.tasks().retain(|t| !t.same_task(task));
    }

    /// Tasks started and not yet finished.
    pub fn active_count(&self) -> usize {
        self.tasks().len()
    }

    /// Terminates every outstanding task without waiting for them.
    ///
    /// Returns the tasks that were outstanding.
    pub fn cancel_all(&self) -> Vec<WorkerTask> {
        let outstanding: Vec<WorkerTask> = {
            let tasks = self.tasks();
            self.inner.terminated.store(true, Ordering::Release);
            tasks.clone()
        };
        debug!(tasks = outstanding.len(), "terminating document worker");
        for task in &outstanding {
            task.terminate();
        }
        outstanding
    }

    /// Terminates every outstanding task and blocks until all have finished.
    pub fn terminate_all(&self) {
        for task in self.cancel_all() {
            task.wait_finished();
        }
    }
}
