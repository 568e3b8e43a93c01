use std::future::Future;
use std::pin::Pin;
use std::sync::{Mutex, PoisonError};
use std::task::{Context, Poll};

use tokio::sync::oneshot;

use crate::error::{Result, RtviError};

/// The settling half of a single-assignment result.
///
/// Only the first call to [`Promise::resolve`] or [`Promise::reject`] has an
/// effect, later calls are ignored.
#[derive(Debug)]
pub struct Promise<T> {
    tx: Mutex<Option<oneshot::Sender<Result<T>>>>,
}

/// The awaiting half of a [`Promise`].
///
/// Settlement that happens before the first poll is kept, so it does not matter
/// whether the consumer starts awaiting before or after the promise settles.
#[derive(Debug)]
pub struct Pending<T> {
    rx: oneshot::Receiver<Result<T>>,
}

impl<T> Promise<T> {
    pub fn new() -> (Promise<T>, Pending<T>) {
        let (tx, rx) = oneshot::channel();
        (
            Promise {
                tx: Mutex::new(Some(tx)),
            },
            Pending { rx },
        )
    }

    /// Returns `true` if this call settled the promise.
    pub fn resolve(&self, value: T) -> bool {
        self.settle(Ok(value))
    }

    /// Returns `true` if this call settled the promise.
    pub fn reject(&self, error: RtviError) -> bool {
        self.settle(Err(error))
    }

    pub fn is_settled(&self) -> bool {
        self.tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }

    fn settle(&self, result: Result<T>) -> bool {
        let tx = self
            .tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match tx {
            Some(tx) => {
                // the awaiting side may be gone already, the promise is settled either way
                let _ = tx.send(result);
                true
            }
            None => false,
        }
    }
}

impl<T> Future for Pending<T> {
    type Output = Result<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(_)) => Poll::Ready(Err(RtviError::other(
                "promise was dropped before it settled",
            ))),
            Poll::Pending => Poll::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_first_settlement_wins() {
        let (promise, pending) = Promise::new();
        assert!(promise.resolve(1));
        assert!(!promise.resolve(2));
        assert!(!promise.reject(RtviError::ResponseTimeout));
        assert!(promise.is_settled());

        assert_eq!(pending.await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_rejection_is_delivered() {
        let (promise, pending) = Promise::<()>::new();
        let waiter = tokio::spawn(pending);
        tokio::task::yield_now().await;

        promise.reject(RtviError::ResponseTimeout);
        let result = waiter.await.unwrap();
        assert!(matches!(result, Err(RtviError::ResponseTimeout)));
    }

    #[tokio::test]
    async fn test_dropped_promise_fails_the_waiter() {
        let (promise, pending) = Promise::<()>::new();
        drop(promise);
        assert!(matches!(pending.await, Err(RtviError::Other { .. })));
    }
}
