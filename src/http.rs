//! Shared HTTP plumbing: agent construction, bearer auth, and the retry
//! policy applied to individual requests.

use backoff::backoff::Constant;
use serde::de::DeserializeOwned;
use std::cell::Cell;
use std::fmt;
use std::io::Read;
use std::time::Duration;
use tracing::warn;

use crate::auth::Session;
use crate::config::RetryConfig;
use crate::error::{PipelineError, Result};

/// Errors that may go away if the same call is simply made again.
pub trait Retryable {
    fn is_transient(&self) -> bool;
}

impl Retryable for ureq::Error {
    fn is_transient(&self) -> bool {
        match self {
            ureq::Error::Transport(transport) => matches!(
                transport.kind(),
                ureq::ErrorKind::Dns | ureq::ErrorKind::ConnectionFailed | ureq::ErrorKind::Io
            ),
            ureq::Error::Status(..) => false,
        }
    }
}

/// A failure of a request that creates something remotely. Only failures
/// that happened before a connection existed are repeated; once the body
/// may have reached the server a resend could create a duplicate.
struct Unsent(ureq::Error);

impl Retryable for Unsent {
    fn is_transient(&self) -> bool {
        match &self.0 {
            ureq::Error::Transport(transport) => {
                matches!(transport.kind(), ureq::ErrorKind::Dns | ureq::ErrorKind::ConnectionFailed)
            }
            ureq::Error::Status(..) => false,
        }
    }
}

impl fmt::Display for Unsent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// The last error seen by [`RetryPolicy::run`] and how many attempts were made.
#[derive(Debug)]
pub struct RetryFailure<E> {
    pub error: E,
    pub attempts: u32,
}

/// Fixed-count, fixed-delay retry for transient failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            delay: Duration::from_millis(config.delay_ms),
        }
    }

    /// A policy that never repeats a call.
    pub fn once() -> Self {
        Self {
            max_attempts: 1,
            delay: Duration::ZERO,
        }
    }

    /// Run `call` until it succeeds, fails with a non-transient error, or
    /// `max_attempts` is reached.
    pub fn run<T, E, F>(&self, operation: &str, mut call: F) -> Result<T, RetryFailure<E>>
    where
        E: Retryable + fmt::Display,
        F: FnMut() -> Result<T, E>,
    {
        let max_attempts = self.max_attempts.max(1);
        let attempts = Cell::new(0u32);

        let result = backoff::retry_notify(
            Constant::new(self.delay),
            || {
                attempts.set(attempts.get() + 1);
                call().map_err(|error| {
                    if error.is_transient() && attempts.get() < max_attempts {
                        backoff::Error::transient(error)
                    } else {
                        backoff::Error::permanent(error)
                    }
                })
            },
            |error: E, wait: Duration| {
                warn!(
                    operation,
                    attempt = attempts.get(),
                    max_attempts,
                    "Transient failure, retrying in {:?}: {}",
                    wait,
                    error
                );
            },
        );

        result.map_err(|error| {
            let error = match error {
                backoff::Error::Permanent(error) => error,
                backoff::Error::Transient { err, .. } => err,
            };
            RetryFailure {
                error,
                attempts: attempts.get(),
            }
        })
    }
}

/// Build a blocking agent with connect and overall request timeouts.
pub fn agent(timeout: Duration) -> ureq::Agent {
    ureq::AgentBuilder::new()
        .timeout_connect(Duration::from_secs(15))
        .timeout(timeout)
        .build()
}

pub fn bearer(session: &Session) -> String {
    format!("Bearer {}", session.access_token())
}

/// Send a request under `policy`, mapping failures to [`PipelineError`].
pub fn send<F>(policy: &RetryPolicy, operation: &str, call: F) -> Result<ureq::Response>
where
    F: FnMut() -> Result<ureq::Response, ureq::Error>,
{
    policy
        .run(operation, call)
        .map_err(|failure| request_error(operation, failure.error, failure.attempts))
}

/// Send a request that creates something remotely. It is repeated under
/// `policy` only while the connection could not be established.
pub fn send_create<F>(policy: &RetryPolicy, operation: &str, mut call: F) -> Result<ureq::Response>
where
    F: FnMut() -> Result<ureq::Response, ureq::Error>,
{
    policy
        .run(operation, || call().map_err(Unsent))
        .map_err(|failure| request_error(operation, failure.error.0, failure.attempts))
}

fn request_error(operation: &str, error: ureq::Error, attempts: u32) -> PipelineError {
    match error {
        ureq::Error::Status(status, response) => PipelineError::Http {
            operation: operation.to_string(),
            status,
            body: response.into_string().unwrap_or_default(),
        },
        ureq::Error::Transport(transport) => PipelineError::Transport {
            operation: operation.to_string(),
            attempts,
            message: transport.to_string(),
        },
    }
}

pub fn read_json<T: DeserializeOwned>(response: ureq::Response) -> Result<T> {
    Ok(serde_json::from_reader(response.into_reader())?)
}

pub fn read_bytes(response: ureq::Response) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    response.into_reader().read_to_end(&mut bytes)?;
    Ok(bytes)
}

pub fn read_text(response: ureq::Response) -> Result<String> {
    let mut text = String::new();
    response.into_reader().read_to_string(&mut text)?;
    Ok(text)
}
