//! `fibretry-http` is an HTTP client that retries on a Fibonacci timeout
//! schedule and reports results through callbacks.
//!
//! - [`RetryEngine`] runs the blocking retry loop for one request.
//! - [`AsyncHttpClient`] hands that loop to an [`Executor`] and delivers the
//!   outcome to an [`AsyncCallback`] or a [`ResponseFuture`].
//! - [`Transport`] and [`RequestHandler`] plug in the I/O and the
//!   recoverability policy.

pub mod backoff;
mod callback;
mod cancel;
mod classify;
mod client;
mod engine;
mod error;
mod executor;
mod options;
mod params;
mod transport;
mod types;

pub use backoff::{next_timeout, TimeoutSchedule};
pub use callback::{AsyncCallback, ResponseFuture};
pub use cancel::CancellationToken;
pub use classify::{classify, BasicRequestHandler, Disposition, RequestHandler};
pub use client::{AsyncHttpClient, Submission};
pub use engine::RetryEngine;
pub use error::Error;
pub use executor::{Executor, Job, ThreadExecutor, TokioExecutor};
pub use options::{ClientOptions, MaxRetries};
pub use params::ParameterMap;
pub use transport::{ReqwestTransport, Transport};
pub use types::{HttpMethod, HttpRequest, HttpResponse};

pub type Result<T> = std::result::Result<T, Error>;
