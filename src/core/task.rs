//! # Long-running task abstraction and function-backed implementation.
//!
//! This module defines the [`Task`] trait (async, cancelable) driven by the
//! [`Runtime`](crate::Runtime), and a convenient function-backed implementation [`TaskFn`].
//! The common handle type is [`TaskRef`], an `Arc<dyn Task>` suitable for sharing.
//!
//! A task receives a [`CancellationToken`] and must return promptly once it fires,
//! preferably with [`Error::Cancelled`].

use std::borrow::Cow;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::Error;

/// Shared handle to a task.
pub type TaskRef = Arc<dyn Task>;

/// # Asynchronous, cancelable unit of work.
///
/// # Example
/// ```
/// use tokio_util::sync::CancellationToken;
/// use async_trait::async_trait;
/// use taskflow::{Error, Task};
///
/// struct Demo;
///
/// #[async_trait]
/// impl Task for Demo {
///     fn name(&self) -> &str { "demo" }
///
///     async fn run(&self, ctx: CancellationToken) -> Result<(), Error> {
///         ctx.cancelled().await;
///         Err(Error::Cancelled)
///     }
/// }
/// ```
#[async_trait]
pub trait Task: Send + Sync + 'static {
    /// Returns a stable, human-readable task name (used in logs and shutdown reports).
    fn name(&self) -> &str;

    /// Runs until completion, failure or cancellation.
    async fn run(&self, ctx: CancellationToken) -> Result<(), Error>;
}

/// Function-backed task.
///
/// Wraps a closure that *creates* a new future per run.
///
/// ## Example
/// ```rust
/// use tokio_util::sync::CancellationToken;
/// use taskflow::{Error, TaskFn, TaskRef};
///
/// let t: TaskRef = TaskFn::arc("ticker", |ctx: CancellationToken| async move {
///     ctx.cancelled().await;
///     Ok::<_, Error>(())
/// });
/// assert_eq!(t.name(), "ticker");
/// ```
#[derive(Debug)]
pub struct TaskFn<F> {
    name: Cow<'static, str>,
    f: F,
}

impl<F> TaskFn<F> {
    /// Creates a new function-backed task.
    pub fn new(name: impl Into<Cow<'static, str>>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }

    /// Creates the task and returns it as a shared handle.
    pub fn arc(name: impl Into<Cow<'static, str>>, f: F) -> Arc<Self> {
        Arc::new(Self::new(name, f))
    }
}

#[async_trait]
impl<F, Fut> Task for TaskFn<F>
where
    F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), Error>> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, ctx: CancellationToken) -> Result<(), Error> {
        (self.f)(ctx).await
    }
}
