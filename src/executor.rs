//! Execution strategies for retry sequences.
//!
//! A sequence blocks its worker for the whole run, including the waits
//! between retries, so every strategy here hands it a thread of its own.

use std::thread;

use crate::{Error, Result};

/// Unit of work handed to an [`Executor`].
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Runs jobs away from the caller's thread.
pub trait Executor: Send + Sync {
    /// Schedules `job` and returns without waiting for it.
    fn spawn(&self, job: Job) -> Result<()>;
}

/// Starts one OS thread per job.
#[derive(Clone, Debug)]
pub struct ThreadExecutor {
    name: String,
}

impl ThreadExecutor {
    pub fn new() -> Self {
        Self::named("fibretry-http")
    }

    /// Names the spawned threads, which shows up in panics and profilers.
    pub fn named(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Default for ThreadExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl Executor for ThreadExecutor {
    fn spawn(&self, job: Job) -> Result<()> {
        thread::Builder::new()
            .name(self.name.clone())
            .spawn(job)
            .map(drop)
            .map_err(Error::Spawn)
    }
}

/// Runs jobs on the blocking pool of a Tokio runtime.
#[derive(Clone, Debug)]
pub struct TokioExecutor {
    handle: tokio::runtime::Handle,
}

impl TokioExecutor {
    pub fn new(handle: tokio::runtime::Handle) -> Self {
        Self { handle }
    }

    /// Uses the runtime the caller is running on.
    ///
    /// Returns [`Error::Config`] outside of a Tokio runtime.
    pub fn current() -> Result<Self> {
        tokio::runtime::Handle::try_current()
            .map(Self::new)
            .map_err(|err| Error::Config(format!("no tokio runtime available: {err}")))
    }
}

impl Executor for TokioExecutor {
    fn spawn(&self, job: Job) -> Result<()> {
        drop(self.handle.spawn_blocking(job));
        Ok(())
    }
}
