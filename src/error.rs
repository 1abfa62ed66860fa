/// Error type returned by this crate.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Network or request execution error from `reqwest`.
    #[error("transport error: {0}")]
    Transport(reqwest::Error),
    /// Non-success HTTP status code with raw response body.
    #[error("http error {status}: {body}")]
    Http { status: u16, body: String },
    /// Every attempt in the retry budget failed without a terminal error.
    #[error("gave up after {attempts} attempt(s): {last}")]
    RetriesExhausted {
        /// Number of attempts performed.
        attempts: u32,
        /// Failure observed on the final attempt.
        #[source]
        last: Box<Error>,
    },
    /// Rejected retry budget.
    #[error("maximum retries must be between 1 and 18, got {0}")]
    InvalidMaxRetries(u32),
    /// Invalid client configuration.
    #[error("config error: {0}")]
    Config(String),
    /// The execution strategy could not start a worker.
    #[error("failed to spawn request worker: {0}")]
    Spawn(#[source] std::io::Error),
    /// The worker went away without reporting an outcome.
    #[error("request worker exited without delivering an outcome")]
    Abandoned,
}

impl Error {
    /// HTTP status carried by this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            Self::Transport(err) => err.status().map(|status| status.as_u16()),
            Self::RetriesExhausted { last, .. } => last.status(),
            _ => None,
        }
    }
}
