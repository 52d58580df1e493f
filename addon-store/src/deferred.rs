//! Settable, shareable future.
//!
//! A [`Deferred`] is created either pending or already settled. Whoever holds
//! a clone may observe it; the first `resolve`/`reject` wins and every later
//! settlement attempt is ignored. Waiters that arrive after settlement get the
//! stored outcome straight away.

use crate::Error;
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::any::Any;
use std::fmt;
use std::future::{Future, IntoFuture};
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use strum_macros::{Display, IntoStaticStr};
use tokio::sync::Notify;
use tokio::task::JoinHandle;

/// Lifecycle of a [`Deferred`]. `Resolved` and `Rejected` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum DeferredState {
    Pending,
    Resolved,
    Rejected,
}

struct Settlement<T, E> {
    result: Result<T, E>,
    at: DateTime<Utc>,
}

struct Shared<T, E> {
    settlement: Mutex<Option<Settlement<T, E>>>,
    settled: Notify,
}

/// Handle to a value that some other party will provide.
pub struct Deferred<T, E = Error> {
    shared: Arc<Shared<T, E>>,
}

impl<T, E> Deferred<T, E> {
    /// Creates a pending handle.
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                settlement: Mutex::new(None),
                settled: Notify::new(),
            }),
        }
    }

    /// Creates a handle that is already resolved with `value`.
    pub fn resolved(value: T) -> Self {
        let deferred = Self::new();
        deferred.resolve(value);
        deferred
    }

    /// Creates a handle that is already rejected with `error`.
    pub fn rejected(error: E) -> Self {
        let deferred = Self::new();
        deferred.reject(error);
        deferred
    }

    pub fn resolve(&self, value: T) -> bool {
        self.settle(Ok(value))
    }

    pub fn reject(&self, error: E) -> bool {
        self.settle(Err(error))
    }

    /// Moves a pending handle into its terminal state.
    ///
    /// Returns `false` and leaves the stored outcome untouched when the handle
    /// was already settled.
    pub fn settle(&self, result: Result<T, E>) -> bool {
        {
            let mut settlement = self.lock();
            if let Some(existing) = settlement.as_ref() {
                log::debug!(
                    "Ignoring settlement of a handle already {} at {}",
                    state_of(&existing.result),
                    existing.at
                );
                return false;
            }
            *settlement = Some(Settlement {
                result,
                at: Utc::now(),
            });
        }
        self.shared.settled.notify_waiters();
        true
    }

    pub fn state(&self) -> DeferredState {
        match self.lock().as_ref() {
            None => DeferredState::Pending,
            Some(settlement) => state_of(&settlement.result),
        }
    }

    pub fn is_pending(&self) -> bool {
        self.state() == DeferredState::Pending
    }

    /// When the handle left the pending state, if it has.
    pub fn settled_at(&self) -> Option<DateTime<Utc>> {
        self.lock().as_ref().map(|settlement| settlement.at)
    }

    /// Whether both handles observe the same underlying state.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }

    fn lock(&self) -> MutexGuard<'_, Option<Settlement<T, E>>> {
        self.shared
            .settlement
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T: Clone, E: Clone> Deferred<T, E> {
    /// The outcome, if the handle has settled.
    pub fn outcome(&self) -> Option<Result<T, E>> {
        self.lock()
            .as_ref()
            .map(|settlement| settlement.result.clone())
    }

    /// Waits for the handle to settle and returns a copy of the outcome.
    pub async fn wait(&self) -> Result<T, E> {
        loop {
            let notified = self.shared.settled.notified();
            tokio::pin!(notified);
            // Register before checking so a settlement in between is not missed.
            notified.as_mut().enable();

            if let Some(result) = self.outcome() {
                return result;
            }
            notified.await;
        }
    }
}

impl<T, E> Deferred<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + From<Error> + 'static,
{
    /// Adapts a one-shot future into a handle. Must be called from within a
    /// Tokio runtime; the future is driven by a spawned task. A panic in the
    /// future rejects the handle with [`Error::Panicked`].
    pub fn wrap<F>(future: F) -> Self
    where
        F: Future<Output = Result<T, E>> + Send + 'static,
    {
        let deferred = Self::new();
        let settler = deferred.clone();
        tokio::spawn(async move {
            settler.settle(catch_panic(future).await);
        });
        deferred
    }
}

impl<T, E> Deferred<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    /// Runs `callback` once with the outcome, immediately if already settled.
    pub fn on_settled<F>(&self, callback: F) -> JoinHandle<()>
    where
        F: FnOnce(Result<T, E>) + Send + 'static,
    {
        let deferred = self.clone();
        tokio::spawn(async move { callback(deferred.wait().await) })
    }
}

/// Runs `future` to completion, turning a panic into [`Error::Panicked`] so
/// the handle it feeds still settles.
pub(crate) async fn catch_panic<T, E, F>(future: F) -> Result<T, E>
where
    F: Future<Output = Result<T, E>>,
    E: From<Error>,
{
    match AssertUnwindSafe(future).catch_unwind().await {
        Ok(result) => result,
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            log::warn!("Future behind a deferred handle panicked: {}", message);
            Err(Error::Panicked(message).into())
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

fn state_of<T, E>(result: &Result<T, E>) -> DeferredState {
    match result {
        Ok(_) => DeferredState::Resolved,
        Err(_) => DeferredState::Rejected,
    }
}

impl<T, E> Clone for Deferred<T, E> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T, E> Default for Deferred<T, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, E> fmt::Debug for Deferred<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Deferred")
            .field("state", &self.state())
            .field("settled_at", &self.settled_at())
            .finish()
    }
}

impl<T, E> IntoFuture for Deferred<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    type Output = Result<T, E>;
    type IntoFuture = BoxFuture<'static, Result<T, E>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(async move { self.wait().await })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::sync::oneshot;

    type Handle = Deferred<u32, String>;

    #[test]
    fn test_new_handle_is_pending() {
        let handle = Handle::new();

        assert_eq!(handle.state(), DeferredState::Pending);
        assert!(handle.outcome().is_none());
        assert!(handle.settled_at().is_none());
    }

    #[test]
    fn test_second_resolution_is_ignored() {
        let handle = Handle::new();

        assert!(handle.resolve(1));
        assert!(!handle.resolve(2));
        assert!(!handle.reject("late".to_string()));

        assert_eq!(handle.outcome(), Some(Ok(1)));
        assert_eq!(handle.state(), DeferredState::Resolved);
    }

    #[test]
    fn test_rejection_is_terminal() {
        let handle = Handle::rejected("boom".to_string());

        assert!(!handle.resolve(7));
        assert_eq!(handle.outcome(), Some(Err("boom".to_string())));
        assert_eq!(handle.state().to_string(), "rejected");
    }

    #[test]
    fn test_clones_share_state() {
        let handle = Handle::new();
        let other = handle.clone();

        other.resolve(5);

        assert!(handle.ptr_eq(&other));
        assert_eq!(handle.outcome(), Some(Ok(5)));
        assert!(!handle.ptr_eq(&Handle::resolved(5)));
    }

    #[tokio::test]
    async fn test_waiters_before_and_after_settlement() {
        let handle = Handle::new();

        let early: Vec<_> = (0..3)
            .map(|_| {
                let handle = handle.clone();
                tokio::spawn(async move { handle.wait().await })
            })
            .collect();

        tokio::task::yield_now().await;
        handle.resolve(9);

        for waiter in futures::future::join_all(early).await {
            assert_eq!(waiter.unwrap(), Ok(9));
        }
        assert_eq!(handle.wait().await, Ok(9));
        assert_eq!(handle.clone().await, Ok(9));
    }

    #[tokio::test]
    async fn test_wrap_settles_from_future() {
        let (tx, rx) = oneshot::channel::<u32>();
        let handle = Deferred::<u32>::wrap(async move {
            rx.await.map_err(|e| Error::Backend {
                request: "test",
                source: e.to_string().into(),
            })
        });

        assert!(handle.is_pending());
        tx.send(3).unwrap();

        let result = tokio::time::timeout(Duration::from_secs(1), handle.wait())
            .await
            .unwrap();
        assert_eq!(result, Ok(3));
        assert!(handle.settled_at().is_some());
    }

    #[tokio::test]
    async fn test_wrap_rejects_when_future_panics() {
        let handle = Deferred::<u32>::wrap(async { panic!("backend blew up") });

        let result = tokio::time::timeout(Duration::from_secs(1), handle.wait())
            .await
            .unwrap();
        assert_eq!(result, Err(Error::Panicked("backend blew up".to_string())));
        assert_eq!(handle.state(), DeferredState::Rejected);
    }

    #[tokio::test]
    async fn test_on_settled_runs_once_with_outcome() {
        let handle = Handle::new();
        let (tx, rx) = oneshot::channel();

        let continuation = handle.on_settled(move |result| {
            let _ = tx.send(result);
        });
        handle.reject("nope".to_string());

        continuation.await.unwrap();
        assert_eq!(rx.await.unwrap(), Err("nope".to_string()));
    }
}
