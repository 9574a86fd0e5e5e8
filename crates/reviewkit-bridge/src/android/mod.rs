// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Android review bridge via JNI.
//
// Requires the Android NDK and targets `aarch64-linux-android` or
// `armv7-linux-androideabi`. The host app must ship
// `com.google.android.play:review` so `ReviewManagerFactory` resolves.
//
// ## Architecture notes
//
// Play's review API is Task based. Every JNI sequence here runs inside
// `spawn_blocking` and waits on `com.google.android.gms.tasks.Tasks.await`,
// which must never run on the main looper thread.
//
// A `ReviewInfo` is a Java object, so it cannot travel inside the opaque
// token payload. The bridge keeps a global ref per issued token and drops it
// once the token has been spent or released; an unknown token id is reported
// as stale. The orchestrator holds at most one unspent token, so a new fetch
// evicts whatever is still in the table (e.g. a fetch whose caller was
// cancelled by a detach).

#![cfg(target_os = "android")]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use jni::objects::{GlobalRef, JObject, JString, JValue};
use jni::JNIEnv;
use url::Url;

use reviewkit_core::error::{ReviewError, Result};
use reviewkit_core::types::{ActivityHandle, Capability, ReviewToken, StoreTarget, TokenId};

use crate::traits::*;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Package name of the Google Play Store client.
const PLAY_STORE_PACKAGE: &str = "com.android.vending";

/// Play In-App Review requires Lollipop (API 21) or newer.
const MIN_SDK_INT: i32 = 21;

/// `Intent.FLAG_ACTIVITY_NEW_TASK`.
const FLAG_ACTIVITY_NEW_TASK: i32 = 0x1000_0000;

// ---------------------------------------------------------------------------
// JNI bootstrap helpers
// ---------------------------------------------------------------------------

/// Obtain a [`JNIEnv`] handle from the global Android context, attaching
/// the current thread if needed.
fn jni_env() -> Result<JNIEnv<'static>> {
    let ctx = ndk_context::android_context();
    // SAFETY: `ctx.vm()` returns the `JavaVM*` set by the NDK glue code.
    // The pointer is valid for the lifetime of the process.
    let vm = unsafe { jni::JavaVM::from_raw(ctx.vm().cast()) }
        .map_err(|e| ReviewError::Bridge(format!("failed to obtain JavaVM: {e}")))?;
    vm.attach_current_thread_permanently()
        .map_err(|e| ReviewError::Bridge(format!("failed to attach JNI thread: {e}")))
}

/// Obtain the hosting `Activity` (or application context) as a [`JObject`].
fn context() -> Result<JObject<'static>> {
    let ptr = ndk_context::android_context().context();
    if ptr.is_null() {
        return Err(ReviewError::NoHostContext(
            "Android context is null, native activity not initialised".into(),
        ));
    }
    // SAFETY: the NDK guarantees this pointer is a valid global jobject for
    // the hosting Activity.
    Ok(unsafe { JObject::from_raw(ptr.cast()) })
}

/// Map a JNI failure, clearing any pending Java exception so the thread
/// stays usable for the next call.
fn jni_err(env: &mut JNIEnv<'_>, context: &str, e: jni::errors::Error) -> String {
    if env.exception_check().unwrap_or(false) {
        let _ = env.exception_describe();
        let _ = env.exception_clear();
    }
    format!("{context}: {e}")
}

/// Run a JNI sequence on a blocking worker thread.
async fn on_jni_thread<T, F>(f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce(&mut JNIEnv<'static>) -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        let mut env = jni_env()?;
        f(&mut env)
    })
    .await
    .map_err(|e| ReviewError::Bridge(format!("JNI worker panicked: {e}")))?
}

// ---------------------------------------------------------------------------
// Bridge struct
// ---------------------------------------------------------------------------

/// Android implementation of the review bridge.
pub struct AndroidBridge {
    /// `ReviewInfo` objects for tokens that have been issued but not spent.
    review_infos: Arc<Mutex<HashMap<TokenId, GlobalRef>>>,
}

impl AndroidBridge {
    /// Create a new Android bridge. Does not touch JNI.
    pub fn new() -> Self {
        Self {
            review_infos: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

impl Default for AndroidBridge {
    fn default() -> Self {
        Self::new()
    }
}

impl ReviewPlatform for AndroidBridge {
    fn platform_name(&self) -> &str {
        "Android"
    }

    fn store_target(&self) -> StoreTarget {
        StoreTarget::PlayStore
    }
}

// ---------------------------------------------------------------------------
// NativeReviewCapability: Build.VERSION + PackageManager
// ---------------------------------------------------------------------------

#[async_trait]
impl NativeReviewCapability for AndroidBridge {
    async fn probe_capability(&self) -> Result<Capability> {
        on_jni_thread(|env| {
            let sdk_int = env
                .get_static_field("android/os/Build$VERSION", "SDK_INT", "I")
                .and_then(|v| v.i())
                .map_err(|e| ReviewError::Bridge(jni_err(env, "Build.VERSION.SDK_INT", e)))?;

            if sdk_int < MIN_SDK_INT {
                return Ok(Capability::Unsupported(format!(
                    "Android API {sdk_int} is below {MIN_SDK_INT}"
                )));
            }

            if !is_play_store_installed(env)? {
                return Ok(Capability::Unsupported(
                    "Google Play Store is not installed".into(),
                ));
            }

            Ok(Capability::Supported)
        })
        .await
    }
}

/// `context.getPackageManager().getPackageInfo("com.android.vending", 0)`
/// throws `NameNotFoundException` when the store is missing.
fn is_play_store_installed(env: &mut JNIEnv<'static>) -> Result<bool> {
    let ctx = context()?;

    let pm: JObject = env
        .call_method(
            &ctx,
            "getPackageManager",
            "()Landroid/content/pm/PackageManager;",
            &[],
        )
        .and_then(|v| v.l())
        .map_err(|e| ReviewError::Bridge(jni_err(env, "getPackageManager", e)))?;

    let j_pkg: JString = env
        .new_string(PLAY_STORE_PACKAGE)
        .map_err(|e| ReviewError::Bridge(jni_err(env, "new_string(package)", e)))?;

    let lookup = env.call_method(
        &pm,
        "getPackageInfo",
        "(Ljava/lang/String;I)Landroid/content/pm/PackageInfo;",
        &[JValue::Object(&j_pkg), JValue::Int(0)],
    );

    match lookup {
        Ok(_) => Ok(true),
        Err(jni::errors::Error::JavaException) => {
            let _ = env.exception_clear();
            Ok(false)
        }
        Err(e) => Err(ReviewError::Bridge(jni_err(env, "getPackageInfo", e))),
    }
}

// ---------------------------------------------------------------------------
// NativeReviewFlow: com.google.android.play.core.review.ReviewManager
// ---------------------------------------------------------------------------

/// `ReviewManagerFactory.create(context)`.
fn review_manager<'a>(env: &mut JNIEnv<'a>, ctx: &JObject<'_>) -> Result<JObject<'a>> {
    env.call_static_method(
        "com/google/android/play/core/review/ReviewManagerFactory",
        "create",
        "(Landroid/content/Context;)Lcom/google/android/play/core/review/ReviewManager;",
        &[JValue::Object(ctx)],
    )
    .and_then(|v| v.l())
    .map_err(|e| ReviewError::Bridge(jni_err(env, "ReviewManagerFactory.create", e)))
}

/// Block on a Play `Task` via `Tasks.await(task)`.
fn await_task<'a>(
    env: &mut JNIEnv<'a>,
    task: &JObject<'_>,
) -> std::result::Result<JObject<'a>, String> {
    env.call_static_method(
        "com/google/android/gms/tasks/Tasks",
        "await",
        "(Lcom/google/android/gms/tasks/Task;)Ljava/lang/Object;",
        &[JValue::Object(task)],
    )
    .and_then(|v| v.l())
    .map_err(|e| jni_err(env, "Tasks.await", e))
}

#[async_trait]
impl NativeReviewFlow for AndroidBridge {
    async fn fetch_review_token(&self) -> Result<ReviewToken> {
        let review_infos = Arc::clone(&self.review_infos);

        on_jni_thread(move |env| {
            let ctx = context()?;
            let manager = review_manager(env, &ctx)?;

            tracing::info!("Android: requesting review flow");

            let task: JObject = env
                .call_method(
                    &manager,
                    "requestReviewFlow",
                    "()Lcom/google/android/gms/tasks/Task;",
                    &[],
                )
                .and_then(|v| v.l())
                .map_err(|e| ReviewError::TokenFetch(jni_err(env, "requestReviewFlow", e)))?;

            let info = await_task(env, &task).map_err(ReviewError::TokenFetch)?;
            let info = env
                .new_global_ref(info)
                .map_err(|e| ReviewError::Bridge(jni_err(env, "new_global_ref(ReviewInfo)", e)))?;

            let token = ReviewToken::new(Vec::new());
            let mut table = review_infos
                .lock()
                .map_err(|_| ReviewError::Bridge("review info table poisoned".into()))?;
            if !table.is_empty() {
                tracing::debug!(evicted = table.len(), "Android: dropping unspent review infos");
                table.clear();
            }
            table.insert(token.id, info);

            tracing::info!(token_id = %token.id, "Android: review info cached");
            Ok(token)
        })
        .await
    }

    async fn launch_review_flow(
        &self,
        activity: &ActivityHandle,
        token: &ReviewToken,
    ) -> Result<()> {
        // Tokens are single-use: take the ReviewInfo out whatever happens next.
        let info = self
            .review_infos
            .lock()
            .map_err(|_| ReviewError::Bridge("review info table poisoned".into()))?
            .remove(&token.id)
            .ok_or_else(|| {
                ReviewError::StaleToken(format!("no ReviewInfo held for token {}", token.id))
            })?;

        let activity_name = activity.name.clone();
        on_jni_thread(move |env| {
            let ctx = context()?;
            let manager = review_manager(env, &ctx)?;

            tracing::info!(activity = %activity_name, "Android: launching review flow");

            let task: JObject = env
                .call_method(
                    &manager,
                    "launchReviewFlow",
                    "(Landroid/app/Activity;Lcom/google/android/play/core/review/ReviewInfo;)Lcom/google/android/gms/tasks/Task;",
                    &[JValue::Object(&ctx), JValue::Object(info.as_obj())],
                )
                .and_then(|v| v.l())
                .map_err(|e| ReviewError::FlowInvocation(jni_err(env, "launchReviewFlow", e)))?;

            await_task(env, &task).map_err(ReviewError::FlowInvocation)?;

            tracing::info!("Android: review flow finished");
            Ok(())
        })
        .await
    }

    fn release_token(&self, token: &ReviewToken) {
        // GlobalRef's Drop deletes the Java reference.
        let released = self
            .review_infos
            .lock()
            .map(|mut table| table.remove(&token.id).is_some())
            .unwrap_or(false);
        tracing::debug!(token_id = %token.id, released, "Android: review info released");
    }
}

// ---------------------------------------------------------------------------
// NativeUrlLauncher: Intent ACTION_VIEW
// ---------------------------------------------------------------------------

#[async_trait]
impl NativeUrlLauncher for AndroidBridge {
    async fn launch_url(&self, url: &Url) -> Result<()> {
        let url = url.to_string();

        on_jni_thread(move |env| {
            let ctx = context()?;

            tracing::info!(url = %url, "Android: dispatching ACTION_VIEW intent");

            let j_url: JString = env
                .new_string(&url)
                .map_err(|e| ReviewError::Launch(jni_err(env, "new_string(url)", e)))?;

            let uri: JObject = env
                .call_static_method(
                    "android/net/Uri",
                    "parse",
                    "(Ljava/lang/String;)Landroid/net/Uri;",
                    &[JValue::Object(&j_url)],
                )
                .and_then(|v| v.l())
                .map_err(|e| ReviewError::Launch(jni_err(env, "Uri.parse", e)))?;

            let j_action: JString = env
                .new_string("android.intent.action.VIEW")
                .map_err(|e| ReviewError::Launch(jni_err(env, "new_string(ACTION_VIEW)", e)))?;

            let intent: JObject = env
                .new_object(
                    "android/content/Intent",
                    "(Ljava/lang/String;Landroid/net/Uri;)V",
                    &[JValue::Object(&j_action), JValue::Object(&uri)],
                )
                .map_err(|e| ReviewError::Launch(jni_err(env, "new Intent", e)))?;

            env.call_method(
                &intent,
                "addFlags",
                "(I)Landroid/content/Intent;",
                &[JValue::Int(FLAG_ACTIVITY_NEW_TASK)],
            )
            .map_err(|e| ReviewError::Launch(jni_err(env, "addFlags", e)))?;

            // ActivityNotFoundException lands here when nothing handles the URL.
            env.call_method(
                &ctx,
                "startActivity",
                "(Landroid/content/Intent;)V",
                &[JValue::Object(&intent)],
            )
            .map_err(|e| ReviewError::Launch(jni_err(env, "startActivity", e)))?;

            Ok(())
        })
        .await
    }
}
