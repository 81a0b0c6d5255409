//! Single-assignment completion handle
//!
//! A [`Promise`] is resolved at most once; later resolutions are ignored and
//! reported as `false`. Any number of waiters can await the outcome.

use crate::traits::{NetconfError, Result};
use futures::future::BoxFuture;
use std::fmt;
use std::future::{Future, IntoFuture};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::watch;

pub struct Promise<T> {
    slot: Arc<watch::Sender<Option<Result<T>>>>,
}

impl<T> Clone for Promise<T> {
    fn clone(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
        }
    }
}

impl<T> Default for Promise<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Promise<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { slot: Arc::new(tx) }
    }

    fn try_complete(&self, outcome: Result<T>) -> bool {
        let mut outcome = Some(outcome);
        self.slot.send_if_modified(|slot| {
            if slot.is_none() {
                *slot = outcome.take();
                true
            } else {
                false
            }
        })
    }

    /// Resolve with a value; returns false if already resolved
    pub fn try_success(&self, value: T) -> bool {
        self.try_complete(Ok(value))
    }

    /// Resolve with an error; returns false if already resolved
    pub fn try_failure(&self, error: NetconfError) -> bool {
        self.try_complete(Err(error))
    }

    /// Resolve with [`NetconfError::Cancelled`]; returns false if already resolved
    pub fn cancel(&self) -> bool {
        self.try_failure(NetconfError::Cancelled)
    }

    pub fn is_done(&self) -> bool {
        self.slot.borrow().is_some()
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(*self.slot.borrow(), Some(Err(NetconfError::Cancelled)))
    }

    /// The outcome, if resolved
    pub fn result(&self) -> Option<Result<T>> {
        self.slot.borrow().clone()
    }

    /// A future resolving with the outcome
    pub fn future(&self) -> CompletionFuture<T> {
        let mut rx = self.slot.subscribe();
        CompletionFuture {
            inner: Box::pin(async move {
                match rx.wait_for(Option::is_some).await {
                    Ok(outcome) => outcome
                        .clone()
                        .unwrap_or_else(|| Err(NetconfError::Cancelled)),
                    Err(_) => Err(NetconfError::Cancelled),
                }
            }),
        }
    }

    /// Run `callback` on a separate task once the promise resolves
    pub fn on_complete<F>(&self, callback: F)
    where
        F: FnOnce(Result<T>) + Send + 'static,
    {
        let future = self.future();
        tokio::spawn(async move {
            callback(future.await);
        });
    }
}

impl<T> IntoFuture for Promise<T>
where
    T: Clone + Send + Sync + 'static,
{
    type Output = Result<T>;
    type IntoFuture = CompletionFuture<T>;

    fn into_future(self) -> Self::IntoFuture {
        self.future()
    }
}

impl<T> fmt::Debug for Promise<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match &*self.slot.borrow() {
            None => "pending",
            Some(Ok(_)) => "success",
            Some(Err(_)) => "failure",
        };
        f.debug_struct("Promise").field("state", &state).finish()
    }
}

/// Future returned by [`Promise::future`]
pub struct CompletionFuture<T> {
    inner: BoxFuture<'static, Result<T>>,
}

impl<T> Future for CompletionFuture<T> {
    type Output = Result<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.inner.as_mut().poll(cx)
    }
}
