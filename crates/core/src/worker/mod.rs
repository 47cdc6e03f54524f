//! Worker tasks and their cooperative cancellation.

pub mod registry;
pub mod task;

pub use registry::TaskRegistry;
pub use task::WorkerTask;
