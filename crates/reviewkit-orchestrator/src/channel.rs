// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Method-channel surface.
//
// The host transport decodes each incoming call into a `MethodCall`; this
// module turns it into a typed `ReviewMethod`, runs it against the
// orchestrator, and hands back a `MethodResponse` for the transport to
// encode. Only error codes and messages cross the boundary.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use reviewkit_core::error::{ReviewError, Result};
use reviewkit_core::human_errors::describe;
use reviewkit_core::types::{ErrorKind, RequestOutcome};

use crate::orchestrator::ReviewOrchestrator;

/// A decoded method call: name plus JSON arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodCall {
    pub method: String,
    #[serde(default)]
    pub arguments: Value,
}

impl MethodCall {
    pub fn new(method: impl Into<String>, arguments: Value) -> Self {
        Self {
            method: method.into(),
            arguments,
        }
    }
}

/// The closed set of requests the channel understands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReviewMethod {
    IsAvailable,
    RequestReview,
    /// `None` means "use the configured default app id".
    OpenStoreListing { app_id: Option<String> },
}

impl ReviewMethod {
    /// Parse a call. `Ok(None)` means the method name is unknown.
    pub fn parse(call: &MethodCall) -> Result<Option<Self>> {
        let method = match call.method.as_str() {
            "isAvailable" => Self::IsAvailable,
            "requestReview" => Self::RequestReview,
            "openStoreListing" => Self::OpenStoreListing {
                app_id: store_listing_app_id(&call.arguments)?,
            },
            _ => return Ok(None),
        };
        Ok(Some(method))
    }
}

/// `openStoreListing` takes `{"appId": "..."}`, a bare string, or nothing.
fn store_listing_app_id(arguments: &Value) -> Result<Option<String>> {
    match arguments {
        Value::Null => Ok(None),
        Value::String(id) => Ok(Some(id.clone())),
        Value::Object(map) => match map.get("appId") {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(id)) => Ok(Some(id.clone())),
            Some(other) => Err(ReviewError::InvalidArgument(format!(
                "appId must be a string, got {other}"
            ))),
        },
        other => Err(ReviewError::InvalidArgument(format!(
            "unexpected openStoreListing arguments: {other}"
        ))),
    }
}

/// What goes back over the channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MethodResponse {
    Ok(Value),
    Error { code: String, message: String },
    NotImplemented,
}

impl MethodResponse {
    pub fn error(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self::Error {
            code: kind.code().to_string(),
            message: message.into(),
        }
    }

    /// `Completed` → `Ok(null)`; anything else → an error carrying the kind.
    pub fn from_outcome(outcome: RequestOutcome) -> Self {
        match outcome.error_kind() {
            None => Self::Ok(Value::Null),
            Some(kind) => Self::error(kind, describe(kind).message),
        }
    }
}

/// Run one method call against the orchestrator.
pub async fn dispatch(orchestrator: &ReviewOrchestrator, call: &MethodCall) -> MethodResponse {
    debug!(method = %call.method, arguments = %call.arguments, "method call");

    let method = match ReviewMethod::parse(call) {
        Ok(Some(method)) => method,
        Ok(None) => {
            info!(method = %call.method, "method not implemented");
            return MethodResponse::NotImplemented;
        }
        Err(e) => return MethodResponse::error(ErrorKind::InvalidArgument, e.to_string()),
    };

    match method {
        ReviewMethod::IsAvailable => MethodResponse::Ok(Value::Bool(orchestrator.is_available().await)),
        ReviewMethod::RequestReview => {
            MethodResponse::from_outcome(orchestrator.request_review().await)
        }
        ReviewMethod::OpenStoreListing { app_id } => {
            let Some(app_id) = app_id.or_else(|| orchestrator.config().default_app_id.clone())
            else {
                return MethodResponse::error(
                    ErrorKind::InvalidArgument,
                    "openStoreListing needs an appId and no default is configured",
                );
            };
            MethodResponse::from_outcome(orchestrator.open_store_listing(&app_id).await)
        }
    }
}
