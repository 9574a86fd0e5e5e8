// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// reviewkit Orchestrator: decides whether and how to request an in-app
// review, and falls back to the store listing when it can't. Sits between
// the method channel and the platform bridge from `reviewkit-bridge`.

pub mod channel;
pub mod host;
pub mod orchestrator;
pub mod retry;

pub use channel::{dispatch, MethodCall, MethodResponse, ReviewMethod};
pub use host::{HostBinding, HostState};
pub use orchestrator::ReviewOrchestrator;
