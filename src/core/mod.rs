//! Runtime core: task abstraction and process lifecycle.
//!
//! Internal modules:
//! - [`task`]: the [`Task`] trait and function-backed [`TaskFn`];
//! - [`runtime`]: registration, task execution and graceful shutdown;
//! - [`shutdown`]: cross-platform termination signal handling.

mod runtime;
mod shutdown;
mod task;

pub use runtime::Runtime;
pub use shutdown::ShutdownSignal;
pub use task::{Task, TaskFn, TaskRef};
