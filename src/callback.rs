use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};

use tokio::sync::oneshot;

use crate::{CancellationToken, Error, HttpResponse, Result};

/// Receives the outcome of an asynchronous request.
///
/// Both methods take `self`, so exactly one of them runs, once.
pub trait AsyncCallback: Send + 'static {
    fn on_success(self, response: HttpResponse);

    fn on_error(self, error: Error);
}

impl<F> AsyncCallback for F
where
    F: FnOnce(Result<HttpResponse>) + Send + 'static,
{
    fn on_success(self, response: HttpResponse) {
        self(Ok(response))
    }

    fn on_error(self, error: Error) {
        self(Err(error))
    }
}

pub(crate) fn deliver<C: AsyncCallback>(callback: C, outcome: Result<HttpResponse>) {
    match outcome {
        Ok(response) => callback.on_success(response),
        Err(error) => callback.on_error(error),
    }
}

/// Holds a callback until an outcome is delivered.
///
/// Dropped without delivering, for instance when the executor discards the
/// job or the request panics, it reports [`Error::Abandoned`].
pub(crate) struct Pending<C: AsyncCallback>(Option<C>);

impl<C: AsyncCallback> Pending<C> {
    pub(crate) fn new(callback: C) -> Self {
        Self(Some(callback))
    }

    pub(crate) fn deliver(mut self, outcome: Result<HttpResponse>) {
        if let Some(callback) = self.0.take() {
            deliver(callback, outcome);
        }
    }
}

impl<C: AsyncCallback> Drop for Pending<C> {
    fn drop(&mut self) {
        if let Some(callback) = self.0.take() {
            #[cfg(feature = "tracing")]
            tracing::debug!("request dropped before delivering an outcome");
            callback.on_error(Error::Abandoned);
        }
    }
}

/// Forwards the outcome into a oneshot channel.
pub(crate) struct OneshotCallback(pub(crate) oneshot::Sender<Result<HttpResponse>>);

impl AsyncCallback for OneshotCallback {
    fn on_success(self, response: HttpResponse) {
        // The receiver may already be gone; nobody is left to notify.
        let _ = self.0.send(Ok(response));
    }

    fn on_error(self, error: Error) {
        let _ = self.0.send(Err(error));
    }
}

/// Future resolving to the outcome of a submitted request.
///
/// Dropping it does not stop the request; use [`cancel`](Self::cancel) to
/// stop further retries.
#[derive(Debug)]
pub struct ResponseFuture {
    rx: oneshot::Receiver<Result<HttpResponse>>,
    cancel: CancellationToken,
}

impl ResponseFuture {
    pub(crate) fn new(
        rx: oneshot::Receiver<Result<HttpResponse>>,
        cancel: CancellationToken,
    ) -> Self {
        Self { rx, cancel }
    }

    /// Interrupts the wait before the next retry.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}

impl Future for ResponseFuture {
    type Output = Result<HttpResponse>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(Error::Abandoned)))
    }
}
