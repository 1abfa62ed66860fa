//! Disposition of a failed attempt.

use std::time::Duration;

use crate::Error;

/// What the retry loop does after a failed attempt.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Disposition {
    /// The attempt ran out its timeout. Retry immediately.
    Timeout,
    /// The handler asked for a retry. Wait one timeout, then retry.
    Recoverable,
    /// Stop and surface the failure.
    Fatal,
}

/// Decides whether a non-timeout failure is worth retrying.
pub trait RequestHandler: Send + Sync {
    fn on_error(&self, error: &Error) -> bool;
}

impl<F> RequestHandler for F
where
    F: Fn(&Error) -> bool + Send + Sync,
{
    fn on_error(&self, error: &Error) -> bool {
        self(error)
    }
}

/// Retries transient transport failures and throttling/5xx statuses.
#[derive(Clone, Copy, Debug, Default)]
pub struct BasicRequestHandler;

impl RequestHandler for BasicRequestHandler {
    fn on_error(&self, error: &Error) -> bool {
        match error {
            Error::Transport(err) => should_retry_transport(err),
            Error::Http { status, .. } => should_retry_status(*status),
            _ => false,
        }
    }
}

fn should_retry_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

fn should_retry_transport(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request() || err.is_body()
}

/// Classifies a failed attempt.
///
/// Elapsed time decides timeouts on its own, so a transport that reports a
/// timeout as some other error kind is still treated as one. The handler is
/// consulted only for failures that finished inside the timeout.
pub fn classify(
    error: &Error,
    elapsed: Duration,
    timeout: Duration,
    handler: &dyn RequestHandler,
) -> Disposition {
    if elapsed >= timeout {
        Disposition::Timeout
    } else if handler.on_error(error) {
        Disposition::Recoverable
    } else {
        Disposition::Fatal
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::atomic::{AtomicUsize, Ordering},
        time::Duration,
    };

    use super::{classify, BasicRequestHandler, Disposition, RequestHandler};
    use crate::Error;

    fn http(status: u16) -> Error {
        Error::Http {
            status,
            body: String::new(),
        }
    }

    #[test]
    fn elapsed_timeout_skips_handler() {
        let calls = AtomicUsize::new(0);
        let handler = |_: &Error| {
            calls.fetch_add(1, Ordering::SeqCst);
            false
        };
        let timeout = Duration::from_millis(100);

        assert_eq!(
            classify(&http(404), timeout, timeout, &handler),
            Disposition::Timeout
        );
        assert_eq!(
            classify(&http(404), timeout * 2, timeout, &handler),
            Disposition::Timeout
        );
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn handler_decides_errors_inside_timeout() {
        let timeout = Duration::from_secs(1);
        let elapsed = Duration::from_millis(10);
        let retry_all = |_: &Error| true;
        let retry_none = |_: &Error| false;

        assert_eq!(
            classify(&http(404), elapsed, timeout, &retry_all),
            Disposition::Recoverable
        );
        assert_eq!(
            classify(&http(503), elapsed, timeout, &retry_none),
            Disposition::Fatal
        );
    }

    #[test]
    fn basic_handler_retries_server_errors_only() {
        let handler = BasicRequestHandler;
        for status in [429, 500, 502, 503, 504] {
            assert!(handler.on_error(&http(status)), "{status} must be retried");
        }
        for status in [400, 401, 403, 404, 409, 501] {
            assert!(!handler.on_error(&http(status)), "{status} must not be retried");
        }
        assert!(!handler.on_error(&Error::Abandoned));
    }
}
