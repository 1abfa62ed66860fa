use serde::Deserialize;

use crate::{
    backoff::{MAX_RETRIES_LIMIT, MIN_RETRIES},
    Error, Result,
};

/// Retry budget, always within `1..=18`.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Deserialize)]
#[serde(try_from = "u32")]
pub struct MaxRetries(u32);

impl MaxRetries {
    /// Validates a retry budget. Out-of-range values are rejected, not clamped.
    pub fn new(value: u32) -> Result<Self> {
        if (MIN_RETRIES..=MAX_RETRIES_LIMIT).contains(&value) {
            Ok(Self(value))
        } else {
            Err(Error::InvalidMaxRetries(value))
        }
    }

    pub fn get(self) -> u32 {
        self.0
    }
}

impl Default for MaxRetries {
    fn default() -> Self {
        Self(3)
    }
}

impl TryFrom<u32> for MaxRetries {
    type Error = Error;

    fn try_from(value: u32) -> Result<Self> {
        Self::new(value)
    }
}

impl From<MaxRetries> for u32 {
    fn from(value: MaxRetries) -> Self {
        value.0
    }
}

/// Configures retry behavior.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize)]
#[serde(default)]
pub struct ClientOptions {
    /// Maximum number of attempts per request.
    pub max_retries: MaxRetries,
    /// Unit of the Fibonacci timeout schedule in milliseconds.
    pub timeout_base_ms: u64,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            max_retries: MaxRetries::default(),
            timeout_base_ms: 1_000,
        }
    }
}

impl ClientOptions {
    /// Reads options from the environment, falling back to defaults.
    ///
    /// Reads:
    /// - `FIBRETRY_MAX_RETRIES` — retry budget, `1..=18`
    /// - `FIBRETRY_TIMEOUT_BASE_MS` — timeout unit in milliseconds
    pub fn from_env() -> Result<Self> {
        let mut options = Self::default();
        if let Some(raw) = read_env("FIBRETRY_MAX_RETRIES") {
            let value = raw.parse::<u32>().map_err(|err| {
                Error::Config(format!("invalid FIBRETRY_MAX_RETRIES '{raw}': {err}"))
            })?;
            options.max_retries = MaxRetries::new(value)?;
        }
        if let Some(raw) = read_env("FIBRETRY_TIMEOUT_BASE_MS") {
            options.timeout_base_ms = raw.parse::<u64>().map_err(|err| {
                Error::Config(format!("invalid FIBRETRY_TIMEOUT_BASE_MS '{raw}': {err}"))
            })?;
        }
        options.validate()?;
        Ok(options)
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.timeout_base_ms == 0 {
            return Err(Error::Config(
                "timeout_base_ms must be greater than zero".to_owned(),
            ));
        }
        Ok(())
    }
}

fn read_env(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}
