// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Host environment lifecycle.
//
// The host shell reports engine/activity attach and detach here. State is
// published on a watch channel so requests in flight can notice when the UI
// they were going to present over disappears.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::info;

use reviewkit_core::types::ActivityHandle;

/// Snapshot of what the host currently provides.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostState {
    /// Application context (plugin engine) attached.
    pub context_attached: bool,
    /// Foreground activity, if any.
    pub activity: Option<ActivityHandle>,
}

impl HostState {
    /// A review flow needs both a context and a foreground activity.
    pub fn is_ready(&self) -> bool {
        self.context_attached && self.activity.is_some()
    }
}

/// Cloneable handle over the host lifecycle.
#[derive(Clone)]
pub struct HostBinding {
    tx: Arc<watch::Sender<HostState>>,
}

impl Default for HostBinding {
    fn default() -> Self {
        Self::new()
    }
}

impl HostBinding {
    /// Start fully detached.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(HostState::default());
        Self { tx: Arc::new(tx) }
    }

    pub fn attach_context(&self) {
        info!("host context attached");
        self.tx.send_modify(|s| s.context_attached = true);
    }

    /// Engine detach also drops the activity.
    pub fn detach_context(&self) {
        info!("host context detached");
        self.tx.send_modify(|s| {
            s.context_attached = false;
            s.activity = None;
        });
    }

    pub fn attach_activity(&self, activity: ActivityHandle) {
        info!(activity = %activity.name, id = activity.id, "host activity attached");
        self.tx.send_modify(|s| s.activity = Some(activity));
    }

    /// Also used for config-change detach; reattach with `attach_activity`.
    pub fn detach_activity(&self) {
        info!("host activity detached");
        self.tx.send_modify(|s| s.activity = None);
    }

    pub fn state(&self) -> HostState {
        self.tx.borrow().clone()
    }

    pub fn context_attached(&self) -> bool {
        self.tx.borrow().context_attached
    }

    pub fn current_activity(&self) -> Option<ActivityHandle> {
        self.tx.borrow().activity.clone()
    }

    /// The activity to present over, if the host is ready.
    pub fn ready_activity(&self) -> Option<ActivityHandle> {
        let state = self.tx.borrow();
        if state.is_ready() {
            state.activity.clone()
        } else {
            None
        }
    }

    /// Resolves once the host can no longer present UI. Resolves
    /// immediately if it already cannot.
    pub async fn detached(&self) {
        let mut rx = self.tx.subscribe();
        let _ = rx.wait_for(|s| !s.is_ready()).await;
    }
}
