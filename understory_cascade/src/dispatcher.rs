// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Serializing dispatchers.
//!
//! A [`Dispatcher`] owns one component tree's execution context: a tokio task
//! that drains a queue of work items one at a time, awaiting each to
//! completion before starting the next. Code running inside a work item can
//! ask [`Dispatcher::is_current`]; subscription bookkeeping asserts it.

use core::fmt;
use core::future::Future;
use core::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::future::BoxFuture;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, trace};

use crate::error::DispatchError;

/// Identifies a [`Dispatcher`] for the lifetime of the process.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DispatcherId(u64);

impl DispatcherId {
    pub(crate) fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw id value.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

type WorkItem = Box<dyn FnOnce() -> BoxFuture<'static, ()> + Send>;

tokio::task_local! {
    static CURRENT: DispatcherId;
}

/// Handle to a serializing execution context.
///
/// Cloning the handle does not create a new context. The context stops once
/// every handle has been dropped and the queue has drained.
#[derive(Clone)]
pub struct Dispatcher {
    id: DispatcherId,
    name: Arc<str>,
    sender: mpsc::UnboundedSender<WorkItem>,
}

impl Dispatcher {
    /// Starts a dispatcher on the current tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn spawn(name: impl Into<Arc<str>>) -> Self {
        let id = DispatcherId::next();
        let name: Arc<str> = name.into();
        let (sender, mut receiver) = mpsc::unbounded_channel::<WorkItem>();

        let loop_name = Arc::clone(&name);
        tokio::spawn(CURRENT.scope(id, async move {
            while let Some(item) = receiver.recv().await {
                trace!(dispatcher = %loop_name, "running work item");
                item().await;
            }
            debug!(dispatcher = %loop_name, "dispatcher stopped");
        }));
        debug!(dispatcher = %name, id = id.0, "dispatcher started");

        Self { id, name, sender }
    }

    /// This dispatcher's id.
    #[must_use]
    pub fn id(&self) -> DispatcherId {
        self.id
    }

    /// This dispatcher's name, for diagnostics.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns `true` if the caller is running inside this dispatcher.
    #[must_use]
    pub fn is_current(&self) -> bool {
        CURRENT.try_with(|current| *current == self.id).unwrap_or(false)
    }

    /// Panics unless the caller is running inside this dispatcher.
    #[track_caller]
    pub fn assert_current(&self) {
        assert!(
            self.is_current(),
            "the current task is not associated with dispatcher `{}`",
            self.name
        );
    }

    /// Runs `work` inside this dispatcher and returns its output.
    ///
    /// When already inside this dispatcher the work runs inline, so a work
    /// item can invoke its own dispatcher without deadlocking. Otherwise it is
    /// queued behind any pending items.
    pub async fn invoke<F, Fut, R>(&self, work: F) -> Result<R, DispatchError>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: Send + 'static,
    {
        if self.is_current() {
            return Ok(work().await);
        }

        let (reply, response) = oneshot::channel();
        let item: WorkItem = Box::new(move || {
            Box::pin(async move {
                // The caller may have stopped waiting; the work still ran.
                let _ = reply.send(work().await);
            })
        });
        self.sender.send(item).map_err(|_| self.closed())?;
        response.await.map_err(|_| self.closed())
    }

    fn closed(&self) -> DispatchError {
        DispatchError::Closed {
            dispatcher: Arc::clone(&self.name),
        }
    }
}

impl PartialEq for Dispatcher {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Dispatcher {}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("id", &self.id)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[tokio::test]
    async fn invoke_runs_inside_the_dispatcher() {
        let dispatcher = Dispatcher::spawn("main");
        assert!(!dispatcher.is_current());

        let inner = dispatcher.clone();
        let inside = dispatcher
            .invoke(move || async move { inner.is_current() })
            .await
            .unwrap();
        assert!(inside);
    }

    #[tokio::test]
    async fn nested_invoke_runs_inline() {
        let dispatcher = Dispatcher::spawn("main");
        let inner = dispatcher.clone();
        let value = dispatcher
            .invoke(move || async move {
                let again = inner.clone();
                inner.invoke(move || async move { again.is_current() }).await
            })
            .await
            .unwrap()
            .unwrap();
        assert!(value);
    }

    #[tokio::test]
    async fn items_run_one_at_a_time_in_order() {
        let dispatcher = Dispatcher::spawn("main");
        let log = Arc::new(Mutex::new(Vec::new()));

        let slow_log = Arc::clone(&log);
        let slow = dispatcher.invoke(move || async move {
            slow_log.lock().unwrap().push("slow:start");
            tokio::task::yield_now().await;
            slow_log.lock().unwrap().push("slow:end");
        });
        let fast_log = Arc::clone(&log);
        let fast = dispatcher.invoke(move || async move {
            fast_log.lock().unwrap().push("fast");
        });
        let (a, b) = futures::join!(slow, fast);
        a.unwrap();
        b.unwrap();

        assert_eq!(*log.lock().unwrap(), ["slow:start", "slow:end", "fast"]);
    }

    #[tokio::test]
    async fn other_dispatchers_are_not_current() {
        let first = Dispatcher::spawn("first");
        let second = Dispatcher::spawn("second");
        assert_ne!(first, second);
        let probe = second.clone();
        let inside_second = first
            .invoke(move || async move { probe.is_current() })
            .await
            .unwrap();
        assert!(!inside_second);
    }
}
