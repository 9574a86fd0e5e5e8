// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>

//! reviewkit: Native in-app review bridge abstractions.
//!
//! Defines the [`ReviewPlatform`](traits::ReviewPlatform) seam the
//! orchestrator talks to, plus one implementation per target OS: Play
//! In-App Review over JNI on Android, StoreKit over objc2 on iOS, and a
//! desktop stub that can only open store links. [`scripted`] simulates a
//! platform for desktop development and tests.

pub mod scripted;
pub mod traits;

#[cfg(target_os = "ios")]
pub mod ios;

#[cfg(target_os = "android")]
pub mod android;

#[cfg(not(any(target_os = "ios", target_os = "android")))]
pub mod stub;

use std::sync::Arc;

/// Returns the review bridge for the target operating system.
pub fn platform_bridge() -> Arc<dyn traits::ReviewPlatform> {
    #[cfg(target_os = "ios")]
    {
        Arc::new(ios::IosBridge::new())
    }
    #[cfg(target_os = "android")]
    {
        Arc::new(android::AndroidBridge::new())
    }
    #[cfg(not(any(target_os = "ios", target_os = "android")))]
    {
        // Desktop/CI: no review flow, store links open in the browser.
        Arc::new(stub::StubBridge::new())
    }
}
