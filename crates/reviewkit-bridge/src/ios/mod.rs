// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// iOS review bridge via objc2 and StoreKit.
//
// Requires compilation with the iOS SDK (Xcode). StoreKit has no review
// token: `SKStoreReviewController` decides on its own whether to show a
// prompt, so the bridge issues synthetic tokens and the single-use rule is
// enforced by the orchestrator alone.
//
// All UIKit and StoreKit calls require the main thread. The host shell is
// expected to drive the orchestrator from a main-thread executor; calls
// from any other thread fail with `ReviewError::Bridge`.

#![cfg(target_os = "ios")]

use async_trait::async_trait;
use objc2::rc::Retained;
use objc2::runtime::AnyObject;
use objc2::{msg_send, MainThreadMarker};
use objc2_foundation::{NSDictionary, NSString, NSURL};
use objc2_ui_kit::{UIApplication, UIDevice};
use url::Url;

use reviewkit_core::error::{ReviewError, Result};
use reviewkit_core::types::{ActivityHandle, Capability, ReviewToken, StoreTarget};

use crate::traits::*;

// StoreKit is not wrapped by objc2-ui-kit; link it so the class resolves.
#[link(name = "StoreKit", kind = "framework")]
unsafe extern "C" {}

/// `SKStoreReviewController` appeared in iOS 10.3.
const MIN_IOS_VERSION: (u32, u32) = (10, 3);

fn require_main_thread() -> Result<MainThreadMarker> {
    MainThreadMarker::new()
        .ok_or_else(|| ReviewError::Bridge("must be called from the main thread".into()))
}

/// Parse "17.2.1" into (17, 2).
fn parse_version(version: &str) -> Option<(u32, u32)> {
    let mut parts = version.split('.');
    let major = parts.next()?.parse().ok()?;
    let minor = parts.next().map_or(Some(0), |m| m.parse().ok())?;
    Some((major, minor))
}

/// Concrete iOS review bridge.
pub struct IosBridge;

impl IosBridge {
    pub fn new() -> Self {
        Self
    }
}

impl Default for IosBridge {
    fn default() -> Self {
        Self::new()
    }
}

impl ReviewPlatform for IosBridge {
    fn platform_name(&self) -> &str {
        "iOS"
    }

    fn store_target(&self) -> StoreTarget {
        StoreTarget::AppStore
    }
}

#[async_trait]
impl NativeReviewCapability for IosBridge {
    async fn probe_capability(&self) -> Result<Capability> {
        let mtm = require_main_thread()?;
        let version = UIDevice::currentDevice(mtm).systemVersion().to_string();

        match parse_version(&version) {
            Some(v) if v >= MIN_IOS_VERSION => Ok(Capability::Supported),
            Some(_) => Ok(Capability::Unsupported(format!(
                "iOS {version} predates SKStoreReviewController"
            ))),
            None => Err(ReviewError::Bridge(format!(
                "unparseable systemVersion {version:?}"
            ))),
        }
    }
}

#[async_trait]
impl NativeReviewFlow for IosBridge {
    async fn fetch_review_token(&self) -> Result<ReviewToken> {
        Ok(ReviewToken::new(Vec::new()))
    }

    async fn launch_review_flow(
        &self,
        activity: &ActivityHandle,
        token: &ReviewToken,
    ) -> Result<()> {
        let _mtm = require_main_thread()?;

        tracing::info!(
            scene = %activity.name,
            token_id = %token.id,
            "iOS: SKStoreReviewController requestReview"
        );

        // SAFETY: `+requestReview` is a documented StoreKit class method with
        // no arguments; main thread is guaranteed above.
        unsafe {
            let _: () = msg_send![objc2::class!(SKStoreReviewController), requestReview];
        }

        Ok(())
    }
}

#[async_trait]
impl NativeUrlLauncher for IosBridge {
    async fn launch_url(&self, url: &Url) -> Result<()> {
        let mtm = require_main_thread()?;

        let ns_url = NSURL::URLWithString(&NSString::from_str(url.as_str()))
            .ok_or_else(|| ReviewError::Launch(format!("NSURL rejected {url}")))?;

        tracing::info!(url = %url, "iOS: UIApplication openURL");

        let app = UIApplication::sharedApplication(mtm);
        let options: Retained<NSDictionary<NSString, AnyObject>> = NSDictionary::new();

        // SAFETY: openURL_options_completionHandler is a documented UIKit
        // method; no completion handler is permitted.
        unsafe { app.openURL_options_completionHandler(&ns_url, &options, None) };

        Ok(())
    }
}
