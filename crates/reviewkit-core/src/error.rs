// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for reviewkit.

use thiserror::Error;

/// Top-level error type for all reviewkit operations.
///
/// Platform bridges produce these; the orchestrator translates them into an
/// [`ErrorKind`](crate::types::ErrorKind) before anything crosses the method
/// channel.
#[derive(Debug, Error)]
pub enum ReviewError {
    // -- Host environment --
    #[error("host environment not attached: {0}")]
    NoHostContext(String),

    // -- Review flow --
    #[error("in-app review not supported: {0}")]
    Unsupported(String),

    #[error("review token rejected as stale: {0}")]
    StaleToken(String),

    #[error("review token fetch failed: {0}")]
    TokenFetch(String),

    #[error("review flow invocation failed: {0}")]
    FlowInvocation(String),

    // -- Store listing --
    #[error("store listing launch failed: {0}")]
    Launch(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    // -- Configuration / persistence --
    #[error("configuration error: {0}")]
    Config(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // -- Platform bridge --
    #[error("platform bridge error: {0}")]
    Bridge(String),

    #[error("feature not available on this platform")]
    PlatformUnavailable,
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, ReviewError>;
