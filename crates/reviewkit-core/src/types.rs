// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for in-app review orchestration.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

use crate::error::{ReviewError, Result};

/// Local identifier for a review token. Only used for log correlation; the
/// platform never sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TokenId(pub Uuid);

impl TokenId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TokenId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TokenId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque, platform-issued handle authorising one review-flow invocation.
///
/// The payload shape is platform defined (a parcelled `ReviewInfo` on
/// Android, empty on StoreKit). Tokens live in memory only and are discarded
/// after a single invocation attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewToken {
    pub id: TokenId,
    pub payload: Vec<u8>,
    pub issued_at: DateTime<Utc>,
}

impl ReviewToken {
    pub fn new(payload: Vec<u8>) -> Self {
        Self {
            id: TokenId::new(),
            payload,
            issued_at: Utc::now(),
        }
    }
}

/// Handle to the foreground activity (or key window scene) that a review
/// flow is presented over.
///
/// The host shell assigns the id; bridges use it to check they are still
/// talking to the activity the caller saw.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ActivityHandle {
    pub id: u64,
    pub name: String,
}

impl ActivityHandle {
    pub fn new(id: u64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

/// Result of the platform capability probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Capability {
    Supported,
    /// OS below minimum, store client missing, etc.
    Unsupported(String),
}

/// Why a review cannot currently be requested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnavailableReason {
    /// No application context attached.
    NoHostContext,
    /// Context attached but no foreground activity.
    NoActivity,
    /// The platform reports the feature unsupported.
    Unsupported(String),
}

/// Tri-state outcome of an availability check. Recomputed on every call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AvailabilityResult {
    Available,
    Unavailable(UnavailableReason),
    /// The probe itself failed; availability could not be determined.
    Unknown(String),
}

impl AvailabilityResult {
    pub fn is_available(&self) -> bool {
        matches!(self, Self::Available)
    }
}

/// Boundary error taxonomy. These names are the error codes sent across the
/// method channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Host environment not attached. Caller may retry after attach.
    NoHostContext,
    /// Platform or OS cannot show the review flow. Not retryable.
    CapabilityUnsupported,
    /// Token fetch failed after the internal retry.
    TokenFetchError,
    /// Platform rejected the flow after the internal retry.
    FlowInvocationError,
    /// Store-listing URL launch failed.
    LaunchError,
    /// Malformed method arguments or an unbuildable store URL.
    InvalidArgument,
}

impl ErrorKind {
    /// Machine-readable code used on the method channel.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NoHostContext => "NoHostContext",
            Self::CapabilityUnsupported => "CapabilityUnsupported",
            Self::TokenFetchError => "TokenFetchError",
            Self::FlowInvocationError => "FlowInvocationError",
            Self::LaunchError => "LaunchError",
            Self::InvalidArgument => "InvalidArgument",
        }
    }

    /// Whether the host app should silently route the user to the store
    /// listing instead.
    pub fn suggests_store_fallback(&self) -> bool {
        matches!(self, Self::NoHostContext | Self::CapabilityUnsupported)
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// Result of attempting a review flow or store-listing launch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOutcome {
    /// The flow ran (or the launch was initiated). Never implies that a
    /// prompt was shown to the user.
    Completed,
    Failed(ErrorKind),
    Skipped(ErrorKind),
}

impl RequestOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed)
    }

    /// The error kind carried by a non-completed outcome.
    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Completed => None,
            Self::Failed(kind) | Self::Skipped(kind) => Some(*kind),
        }
    }
}

/// Classification of errors for retry logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorClass {
    /// Network blip or platform service hiccup: retry once.
    Transient,
    /// The platform rejected the token: invalidate it, then retry once.
    StaleToken,
    /// Feature absent on this device: never retry.
    Unsupported,
    /// Host context went away: never retry.
    HostGone,
    /// Bad input or broken bridge: never retry.
    Permanent,
}

/// Marketplace a store-listing link points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreTarget {
    PlayStore,
    AppStore,
    MacAppStore,
    MicrosoftStore,
}

impl StoreTarget {
    /// Build the store-listing URL for `app_id`.
    ///
    /// The result is deterministic and contains `app_id` verbatim. Apple
    /// stores take the numeric App Store id (an `id` prefix is tolerated).
    pub fn listing_url(&self, app_id: &str) -> Result<Url> {
        let app_id = app_id.trim();
        if app_id.is_empty() {
            return Err(ReviewError::InvalidArgument("app id is empty".into()));
        }
        if app_id.chars().any(char::is_whitespace) {
            return Err(ReviewError::InvalidArgument(format!(
                "app id contains whitespace: {app_id:?}"
            )));
        }

        let raw = match self {
            Self::PlayStore => {
                return Url::parse_with_params(
                    "https://play.google.com/store/apps/details",
                    &[("id", app_id)],
                )
                .map_err(|e| ReviewError::InvalidArgument(format!("url_construct_fail: {e}")));
            }
            Self::AppStore => format!(
                "https://apps.apple.com/app/id{}?action=write-review",
                apple_store_id(app_id)?
            ),
            Self::MacAppStore => format!(
                "macappstore://apps.apple.com/app/id{}?action=write-review",
                apple_store_id(app_id)?
            ),
            Self::MicrosoftStore => {
                if !app_id.chars().all(|c| c.is_ascii_alphanumeric()) {
                    return Err(ReviewError::InvalidArgument(format!(
                        "Microsoft Store product id must be alphanumeric: {app_id:?}"
                    )));
                }
                format!("ms-windows-store://review/?ProductId={app_id}")
            }
        };

        Url::parse(&raw).map_err(|e| ReviewError::InvalidArgument(format!("url_construct_fail: {e}")))
    }
}

/// App Store ids are numeric; accept `id123` as well as `123`.
fn apple_store_id(app_id: &str) -> Result<&str> {
    let digits = app_id.strip_prefix("id").unwrap_or(app_id);
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(ReviewError::InvalidArgument(format!(
            "App Store id must be numeric: {app_id:?}"
        )));
    }
    Ok(digits)
}
