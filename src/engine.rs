use std::{
    fmt,
    sync::{Arc, PoisonError, RwLock},
    time::Instant,
};

use crate::{
    backoff::TimeoutSchedule,
    classify::{classify, Disposition, RequestHandler},
    options::MaxRetries,
    CancellationToken, ClientOptions, Error, HttpRequest, HttpResponse, Result, Transport,
};

/// Runs a request until it succeeds, fails for good, or the retry budget is
/// spent.
///
/// Attempt `n` is given the `n`-th Fibonacci timeout. A failure that took
/// at least that long is retried at once; a quicker failure is retried after
/// waiting one timeout, but only if the [`RequestHandler`] agrees.
pub struct RetryEngine {
    transport: Arc<dyn Transport>,
    handler: Arc<dyn RequestHandler>,
    // Budget and timeout unit change together; a sequence reads both at once.
    options: RwLock<ClientOptions>,
}

impl fmt::Debug for RetryEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryEngine")
            .field("max_retries", &self.max_retries())
            .field("timeout_base", &self.schedule().base())
            .finish_non_exhaustive()
    }
}

impl RetryEngine {
    pub fn new(transport: Arc<dyn Transport>, handler: Arc<dyn RequestHandler>) -> Self {
        Self {
            transport,
            handler,
            options: RwLock::new(ClientOptions::default()),
        }
    }

    /// Replaces the retry budget and timeout unit.
    ///
    /// Sequences already running keep the values they started with.
    pub fn apply(&self, options: &ClientOptions) -> Result<()> {
        options.validate()?;
        *self.options.write().unwrap_or_else(PoisonError::into_inner) = options.clone();
        Ok(())
    }

    pub fn max_retries(&self) -> u32 {
        self.snapshot().0
    }

    /// Sets the retry budget. Values outside `1..=18` are rejected and the
    /// current budget is kept.
    pub fn set_max_retries(&self, max_retries: u32) -> Result<()> {
        let max_retries = MaxRetries::new(max_retries)?;
        self.options
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .max_retries = max_retries;
        Ok(())
    }

    pub fn schedule(&self) -> TimeoutSchedule {
        self.snapshot().1
    }

    fn snapshot(&self) -> (u32, TimeoutSchedule) {
        let options = self.options.read().unwrap_or_else(PoisonError::into_inner);
        (
            options.max_retries.get(),
            TimeoutSchedule::from_millis(options.timeout_base_ms),
        )
    }

    /// Runs `request` to completion on the current thread.
    pub fn execute(&self, request: &HttpRequest) -> Result<HttpResponse> {
        self.execute_with(request, &CancellationToken::new())
    }

    /// Like [`execute`](Self::execute), but `cancel` can cut short the wait
    /// before a retry. A cancelled sequence returns the failure it would have
    /// retried.
    ///
    /// Exhausting the budget yields [`Error::RetriesExhausted`] wrapping the
    /// last failure. There is no wait after the final attempt: a recoverable
    /// failure that spends the budget is returned at once.
    pub fn execute_with(
        &self,
        request: &HttpRequest,
        cancel: &CancellationToken,
    ) -> Result<HttpResponse> {
        let (max_retries, schedule) = self.snapshot();
        let mut attempt = 0u32;

        loop {
            let timeout = schedule.timeout_for(attempt);

            #[cfg(feature = "tracing")]
            tracing::debug!(
                "{} of {}, trying {} {}",
                attempt + 1,
                max_retries,
                request.method,
                request.path
            );

            let started = Instant::now();
            let err = match self.transport.send(request, timeout) {
                Ok(response) => return Ok(response),
                Err(err) => err,
            };

            let disposition = classify(&err, started.elapsed(), timeout, self.handler.as_ref());
            if disposition == Disposition::Fatal {
                #[cfg(feature = "tracing")]
                tracing::debug!("giving up on {}: {}", request.path, err);
                return Err(err);
            }

            attempt += 1;
            if attempt >= max_retries {
                #[cfg(feature = "tracing")]
                tracing::debug!("retries exhausted for {} after {} attempt(s)", request.path, attempt);
                return Err(Error::RetriesExhausted {
                    attempts: attempt,
                    last: Box::new(err),
                });
            }

            if disposition == Disposition::Recoverable {
                #[cfg(feature = "tracing")]
                tracing::debug!("retrying {} after {} ms", request.path, timeout.as_millis());

                if cancel.wait_timeout(timeout) {
                    return Err(err);
                }
            }
        }
    }
}
