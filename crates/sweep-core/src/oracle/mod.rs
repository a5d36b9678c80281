pub mod openai;
pub mod retry;

pub use openai::ChatCompletionsOracle;
pub use retry::{RetryPolicy, Sleeper, ThreadSleeper};

use crate::model::{Classification, FileRecord, Importance};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error, info, warn};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OracleError {
    #[error("rate limited")]
    RateLimited,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed response: {0}")]
    Malformed(String),
}

/// A single request/response exchange with the external decision service.
///
/// Implementations return the raw verdict text; parsing and the retry
/// policy live in [`OracleClient`].
pub trait Oracle: Send + Sync {
    fn ask(&self, record: &FileRecord) -> Result<String, OracleError>;
}

impl<T: Oracle + ?Sized> Oracle for &T {
    fn ask(&self, record: &FileRecord) -> Result<String, OracleError> {
        (**self).ask(record)
    }
}

impl<T: Oracle + ?Sized> Oracle for Box<T> {
    fn ask(&self, record: &FileRecord) -> Result<String, OracleError> {
        (**self).ask(record)
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum VerdictError {
    #[error("JSON parse error: {0}")]
    Parse(String),

    #[error("Invalid JSON structure")]
    Structure,
}

#[derive(Deserialize)]
struct RawVerdict {
    important: bool,
    importance: Value,
    reason: Value,
}

/// Parse the oracle's JSON verdict.
///
/// An out-of-range tier is lenient (Medium); anything structurally wrong is
/// an error so the caller can fall back to keeping the file.
pub fn parse_verdict(content: &str) -> Result<Classification, VerdictError> {
    let value: Value =
        serde_json::from_str(content).map_err(|e| VerdictError::Parse(e.to_string()))?;

    let Some(object) = value.as_object() else {
        return Err(VerdictError::Structure);
    };
    if !["important", "importance", "reason"]
        .iter()
        .all(|key| object.contains_key(*key))
    {
        return Err(VerdictError::Structure);
    }

    let raw: RawVerdict = serde_json::from_value(value).map_err(|_| VerdictError::Structure)?;

    let importance = raw
        .importance
        .as_str()
        .and_then(|tier| tier.parse::<Importance>().ok())
        .unwrap_or(Importance::Medium);

    let reason = match raw.reason {
        Value::String(s) => s,
        other => other.to_string(),
    };

    Ok(Classification {
        important: raw.important,
        importance,
        reason,
    })
}

/// Wraps an [`Oracle`] with the retry/fallback contract: every call yields
/// exactly one classification, never an error.
pub struct OracleClient<O, S = ThreadSleeper> {
    oracle: O,
    policy: RetryPolicy,
    sleeper: S,
}

impl<O: Oracle> OracleClient<O, ThreadSleeper> {
    pub fn new(oracle: O, policy: RetryPolicy) -> Self {
        Self::with_sleeper(oracle, policy, ThreadSleeper)
    }
}

impl<O: Oracle, S: Sleeper> OracleClient<O, S> {
    pub fn with_sleeper(oracle: O, policy: RetryPolicy, sleeper: S) -> Self {
        Self {
            oracle,
            policy,
            sleeper,
        }
    }

    /// Classify one record. Rate limits are retried after the cooldown up to
    /// `max_attempts`; every other failure falls back immediately.
    pub fn classify(&self, record: &FileRecord) -> Classification {
        let path = record.path.display();

        for attempt in 1..=self.policy.max_attempts {
            match self.oracle.ask(record) {
                Ok(content) => {
                    return match parse_verdict(&content) {
                        Ok(classification) => {
                            info!(
                                "File: {}, Important: {}, Importance: {}, Reason: {}",
                                path,
                                classification.important,
                                classification.importance,
                                classification.reason
                            );
                            classification
                        }
                        Err(e) => {
                            warn!("{} for {}: {}", e, path, content);
                            Classification::fail_safe(e.to_string())
                        }
                    };
                }
                Err(OracleError::RateLimited) => {
                    if attempt < self.policy.max_attempts {
                        warn!(
                            "Rate limit hit for {} (attempt {}/{}), retrying in {:?}",
                            path, attempt, self.policy.max_attempts, self.policy.cooldown
                        );
                        self.sleeper.sleep(self.policy.cooldown);
                    } else {
                        debug!("Rate limit hit for {} on final attempt", path);
                    }
                }
                Err(e) => {
                    error!("Oracle error for {}: {}", path, e);
                    return Classification::fail_safe(format!("API error: {}", e));
                }
            }
        }

        error!("Failed after retries for {}", path);
        Classification::fail_safe("Failed after retries")
    }
}
