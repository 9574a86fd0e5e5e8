// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Stub bridge for desktop/CI builds where no in-app review SDK exists.
//
// The review flow always reports `PlatformUnavailable`. Store links are still
// useful on desktop, so `launch_url` hands them to the OS opener.

use async_trait::async_trait;
use tokio::process::Command;
use url::Url;

use reviewkit_core::error::{ReviewError, Result};
use reviewkit_core::types::{ActivityHandle, Capability, ReviewToken, StoreTarget};

use crate::traits::*;

/// Bridge returned on non-mobile platforms.
pub struct StubBridge {
    store: StoreTarget,
}

impl StubBridge {
    pub fn new() -> Self {
        let store = if cfg!(target_os = "macos") {
            StoreTarget::MacAppStore
        } else if cfg!(target_os = "windows") {
            StoreTarget::MicrosoftStore
        } else {
            StoreTarget::PlayStore
        };
        Self { store }
    }
}

impl Default for StubBridge {
    fn default() -> Self {
        Self::new()
    }
}

impl ReviewPlatform for StubBridge {
    fn platform_name(&self) -> &str {
        "Desktop (stub)"
    }

    fn store_target(&self) -> StoreTarget {
        self.store
    }
}

#[async_trait]
impl NativeReviewCapability for StubBridge {
    async fn probe_capability(&self) -> Result<Capability> {
        Ok(Capability::Unsupported(
            "no in-app review SDK on desktop".into(),
        ))
    }
}

#[async_trait]
impl NativeReviewFlow for StubBridge {
    async fn fetch_review_token(&self) -> Result<ReviewToken> {
        tracing::warn!("NativeReviewFlow::fetch_review_token called on stub bridge");
        Err(ReviewError::PlatformUnavailable)
    }

    async fn launch_review_flow(
        &self,
        _activity: &ActivityHandle,
        _token: &ReviewToken,
    ) -> Result<()> {
        tracing::warn!("NativeReviewFlow::launch_review_flow called on stub bridge");
        Err(ReviewError::PlatformUnavailable)
    }
}

#[async_trait]
impl NativeUrlLauncher for StubBridge {
    async fn launch_url(&self, url: &Url) -> Result<()> {
        let mut cmd = opener_command(url);
        tracing::info!(url = %url, "desktop: opening store listing");

        let status = cmd
            .status()
            .await
            .map_err(|e| ReviewError::Launch(format!("failed to spawn opener: {e}")))?;

        if status.success() {
            Ok(())
        } else {
            Err(ReviewError::Launch(format!("opener exited with {status}")))
        }
    }
}

fn opener_command(url: &Url) -> Command {
    if cfg!(target_os = "macos") {
        let mut cmd = Command::new("open");
        cmd.arg(url.as_str());
        cmd
    } else if cfg!(target_os = "windows") {
        let mut cmd = Command::new("cmd");
        cmd.args(["/C", "start", "", url.as_str()]);
        cmd
    } else {
        let mut cmd = Command::new("xdg-open");
        cmd.arg(url.as_str());
        cmd
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn review_flow_is_unsupported() {
        let bridge = StubBridge::new();
        assert!(matches!(
            bridge.probe_capability().await.unwrap(),
            Capability::Unsupported(_)
        ));
        assert!(matches!(
            bridge.fetch_review_token().await,
            Err(ReviewError::PlatformUnavailable)
        ));
    }

    #[test]
    fn platform_name() {
        assert_eq!(StubBridge::new().platform_name(), "Desktop (stub)");
    }

    #[test]
    fn opener_receives_url() {
        let url = Url::parse("https://play.google.com/store/apps/details?id=com.example.app").unwrap();
        let cmd = opener_command(&url);
        let args: Vec<_> = cmd.as_std().get_args().collect();
        assert!(args.iter().any(|a| a.to_str() == Some(url.as_str())));
    }
}
