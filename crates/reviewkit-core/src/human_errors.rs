// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Diagnostic messages for review outcomes.
//
// Review prompts are a non-critical enhancement, so nothing here is ever
// shown as a blocking dialog. The message goes into logs and into the error
// sent across the method channel; `action` tells the host app what to do.

use crate::error::ReviewError;
use crate::types::ErrorKind;

/// What the host app should do with a failed review request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackAction {
    /// Silently open the store listing instead.
    OpenStoreListing,
    /// Record it in diagnostics and move on.
    LogOnly,
}

/// A diagnostic description of a failure.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    /// Human-readable message (sent as the channel error message).
    pub message: String,
    /// Recommended host-side reaction.
    pub action: FallbackAction,
}

/// Describe a boundary error kind.
pub fn describe(kind: ErrorKind) -> Diagnostic {
    match kind {
        ErrorKind::NoHostContext => Diagnostic {
            message: "The app is not attached to a foreground activity, so no review prompt can be shown.".into(),
            action: FallbackAction::OpenStoreListing,
        },
        ErrorKind::CapabilityUnsupported => Diagnostic {
            message: "In-app review is not supported on this device. Open the store listing instead.".into(),
            action: FallbackAction::OpenStoreListing,
        },
        ErrorKind::TokenFetchError => Diagnostic {
            message: "The store service did not hand out a review token.".into(),
            action: FallbackAction::LogOnly,
        },
        ErrorKind::FlowInvocationError => Diagnostic {
            message: "The platform rejected the review flow.".into(),
            action: FallbackAction::LogOnly,
        },
        ErrorKind::LaunchError => Diagnostic {
            message: "The store listing could not be opened.".into(),
            action: FallbackAction::LogOnly,
        },
        ErrorKind::InvalidArgument => Diagnostic {
            message: "The request was malformed (missing or invalid store id).".into(),
            action: FallbackAction::LogOnly,
        },
    }
}

/// Describe an internal error, appending its detail to the kind's message.
pub fn describe_error(kind: ErrorKind, err: &ReviewError) -> Diagnostic {
    let base = describe(kind);
    Diagnostic {
        message: format!("{} ({err})", base.message),
        action: base.action,
    }
}
