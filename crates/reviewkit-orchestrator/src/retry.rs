// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Retry policy for token fetch and review-flow invocation.
//
// Classifies errors into Transient / StaleToken (retry), Unsupported /
// HostGone / Permanent (give up). Review prompts are best-effort, so the
// budget is small: one retry by default.

use std::time::Duration;

use reviewkit_core::error::ReviewError;
use reviewkit_core::types::{ErrorClass, ErrorKind};
use reviewkit_core::ReviewConfig;
use tracing::{debug, info, warn};

/// Retry configuration.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts.
    pub max_retries: u32,
    /// Delay before the first retry; doubles per further attempt.
    pub base_delay: Duration,
    /// Maximum delay between retries.
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 1,
            base_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(2),
        }
    }
}

impl From<&ReviewConfig> for RetryConfig {
    fn from(config: &ReviewConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: config.retry_delay(),
            ..Default::default()
        }
    }
}

/// Result of evaluating whether to retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry after this delay.
    RetryAfter(Duration),
    /// Do not retry: error is not retryable.
    GiveUp(ErrorClass),
    /// Maximum retries exhausted.
    Exhausted,
}

/// Classify a `ReviewError` into an `ErrorClass` for retry decisions.
pub fn classify_error(err: &ReviewError) -> ErrorClass {
    match err {
        ReviewError::NoHostContext(_) => ErrorClass::HostGone,

        ReviewError::Unsupported(_) | ReviewError::PlatformUnavailable => ErrorClass::Unsupported,

        ReviewError::StaleToken(_) => ErrorClass::StaleToken,

        ReviewError::TokenFetch(_) | ReviewError::FlowInvocation(_) | ReviewError::Bridge(_) => {
            ErrorClass::Transient
        }

        ReviewError::Launch(_)
        | ReviewError::InvalidArgument(_)
        | ReviewError::Config(_)
        | ReviewError::Serialization(_) => ErrorClass::Permanent,

        ReviewError::Io(io_err) => match io_err.kind() {
            std::io::ErrorKind::TimedOut
            | std::io::ErrorKind::ConnectionRefused
            | std::io::ErrorKind::ConnectionReset
            | std::io::ErrorKind::ConnectionAborted
            | std::io::ErrorKind::Interrupted => ErrorClass::Transient,
            _ => ErrorClass::Permanent,
        },
    }
}

/// Boundary kind for an error class that gave up, given the operation that
/// failed (`fallback` is the kind for plain transient failures).
pub fn kind_for(class: ErrorClass, fallback: ErrorKind) -> ErrorKind {
    match class {
        ErrorClass::HostGone => ErrorKind::NoHostContext,
        ErrorClass::Unsupported => ErrorKind::CapabilityUnsupported,
        ErrorClass::Transient | ErrorClass::StaleToken | ErrorClass::Permanent => fallback,
    }
}

/// Decide whether to retry based on the error class and attempt count.
pub fn should_retry(err: &ReviewError, attempt: u32, config: &RetryConfig) -> RetryDecision {
    let class = classify_error(err);

    match class {
        ErrorClass::Unsupported | ErrorClass::HostGone | ErrorClass::Permanent => {
            info!(?class, "not retrying");
            RetryDecision::GiveUp(class)
        }
        ErrorClass::Transient | ErrorClass::StaleToken => {
            if attempt >= config.max_retries {
                warn!(attempt, max = config.max_retries, "retry limit exhausted");
                RetryDecision::Exhausted
            } else {
                let delay = compute_delay(attempt, config);
                debug!(attempt, delay_ms = delay.as_millis(), "scheduling retry");
                RetryDecision::RetryAfter(delay)
            }
        }
    }
}

/// delay = min(base * 2^attempt, max_delay)
fn compute_delay(attempt: u32, config: &RetryConfig) -> Duration {
    let base_ms = config.base_delay.as_millis() as u64;
    let exp_ms = base_ms.saturating_mul(1u64 << attempt.min(10));
    Duration::from_millis(exp_ms.min(config.max_delay.as_millis() as u64))
}
