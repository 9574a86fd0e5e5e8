// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Platform-agnostic trait definitions for the native review capabilities.
//
// Each trait maps onto one piece of platform SDK surface. The orchestrator
// only ever sees `ReviewPlatform`, so bridges never leak raw platform errors:
// everything comes back as a `ReviewError`.

use async_trait::async_trait;
use url::Url;

use reviewkit_core::error::Result;
use reviewkit_core::types::{ActivityHandle, Capability, ReviewToken, StoreTarget};

/// Unified bridge that groups the native review capabilities.
pub trait ReviewPlatform: NativeReviewCapability + NativeReviewFlow + NativeUrlLauncher {
    /// Human-readable platform name (e.g. "Android", "iOS").
    fn platform_name(&self) -> &str;

    /// Marketplace this platform's store listings live in.
    fn store_target(&self) -> StoreTarget;
}

/// Feature detection for the in-app review flow.
#[async_trait]
pub trait NativeReviewCapability: Send + Sync {
    /// Check OS version and store client presence.
    ///
    /// Must not present UI or consume quota.
    async fn probe_capability(&self) -> Result<Capability>;
}

/// The two-step review flow: obtain a token, then spend it.
#[async_trait]
pub trait NativeReviewFlow: Send + Sync {
    /// Ask the platform review service for a single-use token.
    async fn fetch_review_token(&self) -> Result<ReviewToken>;

    /// Run the review flow over `activity` with `token`.
    ///
    /// `Ok(())` means the flow ran to completion. Platforms never say
    /// whether a prompt was actually displayed. A token the platform no
    /// longer accepts is reported as `ReviewError::StaleToken`.
    async fn launch_review_flow(&self, activity: &ActivityHandle, token: &ReviewToken)
    -> Result<()>;

    /// Give up `token` without spending it. Bridges holding per-token
    /// platform objects drop them here.
    fn release_token(&self, _token: &ReviewToken) {}
}

/// Open external URLs (store listings) through the OS.
#[async_trait]
pub trait NativeUrlLauncher: Send + Sync {
    /// Hand `url` to the OS. Returns once the launch was initiated.
    async fn launch_url(&self, url: &Url) -> Result<()>;
}
