// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scripted bridge: a simulated review platform for desktop development and
// tests.
//
// Responses are queued per operation; an empty queue means success. The
// bridge enforces the platform's single-use token contract itself, so a
// token spent twice comes back as `StaleToken` just like on a device.

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use tokio::sync::Notify;
use url::Url;

use reviewkit_core::error::{ReviewError, Result};
use reviewkit_core::types::{ActivityHandle, Capability, ReviewToken, StoreTarget, TokenId};

use crate::traits::*;

/// Scripted response for one platform call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Succeed,
    /// Fail with a transient platform error.
    Fail(String),
    /// Reject the token as stale (flow only).
    Stale,
    /// Report the feature unsupported.
    Unsupported(String),
}

#[derive(Default)]
struct Script {
    capability: Option<Capability>,
    fetches: VecDeque<Step>,
    flows: VecDeque<Step>,
    launches: VecDeque<Step>,
    issued: HashSet<TokenId>,
    spent: Vec<TokenId>,
    released: Vec<TokenId>,
    launched: Vec<Url>,
}

/// Simulated platform with call counters.
pub struct ScriptedBridge {
    store: StoreTarget,
    script: Mutex<Script>,
    fetch_calls: AtomicUsize,
    flow_calls: AtomicUsize,
    probe_calls: AtomicUsize,
    launch_calls: AtomicUsize,
    fetch_started: Arc<Notify>,
    fetch_gate: Mutex<Option<Arc<Notify>>>,
    flow_started: Arc<Notify>,
    flow_gate: Mutex<Option<Arc<Notify>>>,
}

fn install_gate(slot: &Mutex<Option<Arc<Notify>>>) -> Arc<Notify> {
    let gate = Arc::new(Notify::new());
    *slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(Arc::clone(&gate));
    gate
}

async fn pass_gate(slot: &Mutex<Option<Arc<Notify>>>) {
    let gate = slot.lock().unwrap_or_else(PoisonError::into_inner).clone();
    if let Some(gate) = gate {
        gate.notified().await;
    }
}

impl ScriptedBridge {
    /// A bridge where everything succeeds.
    pub fn new(store: StoreTarget) -> Self {
        Self {
            store,
            script: Mutex::new(Script::default()),
            fetch_calls: AtomicUsize::new(0),
            flow_calls: AtomicUsize::new(0),
            probe_calls: AtomicUsize::new(0),
            launch_calls: AtomicUsize::new(0),
            fetch_started: Arc::new(Notify::new()),
            fetch_gate: Mutex::new(None),
            flow_started: Arc::new(Notify::new()),
            flow_gate: Mutex::new(None),
        }
    }

    fn script(&self) -> std::sync::MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_capability(&self, capability: Capability) {
        self.script().capability = Some(capability);
    }

    pub fn push_fetch(&self, step: Step) {
        self.script().fetches.push_back(step);
    }

    pub fn push_flow(&self, step: Step) {
        self.script().flows.push_back(step);
    }

    pub fn push_launch(&self, step: Step) {
        self.script().launches.push_back(step);
    }

    /// Make every subsequent fetch wait until the returned gate is notified
    /// (one `notify_one` releases one fetch).
    pub fn hold_fetches(&self) -> Arc<Notify> {
        install_gate(&self.fetch_gate)
    }

    /// Same as [`hold_fetches`](Self::hold_fetches), for flow launches.
    pub fn hold_flows(&self) -> Arc<Notify> {
        install_gate(&self.flow_gate)
    }

    /// Notified each time a fetch begins.
    pub fn fetch_started(&self) -> Arc<Notify> {
        Arc::clone(&self.fetch_started)
    }

    /// Notified each time a flow launch begins.
    pub fn flow_started(&self) -> Arc<Notify> {
        Arc::clone(&self.flow_started)
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    pub fn flow_calls(&self) -> usize {
        self.flow_calls.load(Ordering::SeqCst)
    }

    pub fn probe_calls(&self) -> usize {
        self.probe_calls.load(Ordering::SeqCst)
    }

    pub fn launch_calls(&self) -> usize {
        self.launch_calls.load(Ordering::SeqCst)
    }

    /// Total platform calls of any kind.
    pub fn total_calls(&self) -> usize {
        self.fetch_calls() + self.flow_calls() + self.probe_calls() + self.launch_calls()
    }

    /// Tokens passed to the flow, in order.
    pub fn spent_tokens(&self) -> Vec<TokenId> {
        self.script().spent.clone()
    }

    /// Tokens given back unspent, in order.
    pub fn released_tokens(&self) -> Vec<TokenId> {
        self.script().released.clone()
    }

    /// Tokens issued and neither spent nor released.
    pub fn live_tokens(&self) -> usize {
        self.script().issued.len()
    }

    /// URLs handed to the launcher, in order.
    pub fn launched_urls(&self) -> Vec<Url> {
        self.script().launched.clone()
    }
}

impl ReviewPlatform for ScriptedBridge {
    fn platform_name(&self) -> &str {
        "Scripted"
    }

    fn store_target(&self) -> StoreTarget {
        self.store
    }
}

#[async_trait]
impl NativeReviewCapability for ScriptedBridge {
    async fn probe_capability(&self) -> Result<Capability> {
        self.probe_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .script()
            .capability
            .clone()
            .unwrap_or(Capability::Supported))
    }
}

#[async_trait]
impl NativeReviewFlow for ScriptedBridge {
    async fn fetch_review_token(&self) -> Result<ReviewToken> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        self.fetch_started.notify_one();
        pass_gate(&self.fetch_gate).await;

        let mut script = self.script();
        match script.fetches.pop_front().unwrap_or(Step::Succeed) {
            Step::Succeed => {
                let token = ReviewToken::new(Vec::new());
                script.issued.insert(token.id);
                tracing::debug!(token_id = %token.id, "scripted: token issued");
                Ok(token)
            }
            Step::Fail(msg) => Err(ReviewError::TokenFetch(msg)),
            Step::Stale => Err(ReviewError::TokenFetch("stale fetch".into())),
            Step::Unsupported(reason) => Err(ReviewError::Unsupported(reason)),
        }
    }

    async fn launch_review_flow(
        &self,
        _activity: &ActivityHandle,
        token: &ReviewToken,
    ) -> Result<()> {
        self.flow_calls.fetch_add(1, Ordering::SeqCst);
        self.flow_started.notify_one();
        pass_gate(&self.flow_gate).await;

        let mut script = self.script();
        script.spent.push(token.id);

        // Single-use: the token leaves the issued set whatever the outcome.
        if !script.issued.remove(&token.id) {
            return Err(ReviewError::StaleToken(format!(
                "token {} was never issued or already spent",
                token.id
            )));
        }

        match script.flows.pop_front().unwrap_or(Step::Succeed) {
            Step::Succeed => Ok(()),
            Step::Fail(msg) => Err(ReviewError::FlowInvocation(msg)),
            Step::Stale => Err(ReviewError::StaleToken(format!("token {} expired", token.id))),
            Step::Unsupported(reason) => Err(ReviewError::Unsupported(reason)),
        }
    }

    fn release_token(&self, token: &ReviewToken) {
        let mut script = self.script();
        if script.issued.remove(&token.id) {
            script.released.push(token.id);
        }
    }
}

#[async_trait]
impl NativeUrlLauncher for ScriptedBridge {
    async fn launch_url(&self, url: &Url) -> Result<()> {
        self.launch_calls.fetch_add(1, Ordering::SeqCst);

        let mut script = self.script();
        match script.launches.pop_front().unwrap_or(Step::Succeed) {
            Step::Succeed => {
                script.launched.push(url.clone());
                Ok(())
            }
            Step::Fail(msg) | Step::Unsupported(msg) => Err(ReviewError::Launch(msg)),
            Step::Stale => Err(ReviewError::Launch("launcher rejected request".into())),
        }
    }
}
