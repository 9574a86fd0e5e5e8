// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Review orchestrator: availability, token caching, the review flow, and
// the store-listing fallback.
//
// Requests are single-flight. A `request_review` issued while another is in
// flight joins it and resolves with the same outcome, so overlapping calls
// cost one token fetch and one flow invocation. Every platform await races
// the host's detach signal.

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::watch;
use tracing::{debug, info, warn};

use reviewkit_bridge::traits::ReviewPlatform;
use reviewkit_core::error::ReviewError;
use reviewkit_core::human_errors::describe_error;
use reviewkit_core::types::{
    ActivityHandle, AvailabilityResult, Capability, ErrorKind, RequestOutcome, ReviewToken,
    StoreTarget, UnavailableReason,
};
use reviewkit_core::ReviewConfig;

use crate::host::HostBinding;
use crate::retry::{classify_error, kind_for, should_retry, RetryConfig, RetryDecision};

/// What the current flight is doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FlightKind {
    Review,
    Prefetch,
}

struct Flight {
    kind: FlightKind,
    rx: watch::Receiver<Option<RequestOutcome>>,
}

enum Slot<'a> {
    Lead(FlightGuard<'a>),
    Join(FlightKind, watch::Receiver<Option<RequestOutcome>>),
}

/// Held by the leader of a flight. Publishing the outcome (or dropping the
/// guard) frees the slot.
struct FlightGuard<'a> {
    slot: &'a Mutex<Option<Flight>>,
    tx: watch::Sender<Option<RequestOutcome>>,
    finished: bool,
}

impl FlightGuard<'_> {
    fn finish(mut self, outcome: RequestOutcome) -> RequestOutcome {
        // Free the slot before publishing so late callers start a new cycle.
        self.clear();
        self.tx.send_replace(Some(outcome));
        self.finished = true;
        outcome
    }

    fn clear(&self) {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        // Leader cancelled: free the slot; joiners see the sender drop.
        if !self.finished {
            self.clear();
        }
    }
}

/// Wait for a joined flight. A leader that vanished without an outcome was
/// cancelled, which only happens when the host went away.
async fn wait_for_flight(mut rx: watch::Receiver<Option<RequestOutcome>>) -> RequestOutcome {
    match rx.wait_for(Option::is_some).await {
        Ok(outcome) => (*outcome).unwrap_or(RequestOutcome::Failed(ErrorKind::NoHostContext)),
        Err(_) => RequestOutcome::Failed(ErrorKind::NoHostContext),
    }
}

/// Single authority for availability checks, token caching, and review
/// flow invocation.
pub struct ReviewOrchestrator {
    platform: Arc<dyn ReviewPlatform>,
    host: HostBinding,
    config: ReviewConfig,
    retry: RetryConfig,
    /// Token fetched but not yet spent. Lives for the session only.
    cached_token: Mutex<Option<ReviewToken>>,
    inflight: Mutex<Option<Flight>>,
}

impl ReviewOrchestrator {
    pub fn new(platform: Arc<dyn ReviewPlatform>, host: HostBinding, config: ReviewConfig) -> Self {
        let retry = RetryConfig::from(&config);
        info!(platform = platform.platform_name(), "review orchestrator ready");
        Self {
            platform,
            host,
            config,
            retry,
            cached_token: Mutex::new(None),
            inflight: Mutex::new(None),
        }
    }

    pub fn host(&self) -> &HostBinding {
        &self.host
    }

    pub fn config(&self) -> &ReviewConfig {
        &self.config
    }

    /// Store used for listing links: config override, else the platform's.
    pub fn store_target(&self) -> StoreTarget {
        self.config
            .store_target
            .unwrap_or_else(|| self.platform.store_target())
    }

    /// Whether a token is waiting to be spent.
    pub fn has_cached_token(&self) -> bool {
        self.token_slot().is_some()
    }

    // -- Availability --------------------------------------------------------

    /// Probe whether a review flow could run right now. No side effects.
    pub async fn check_availability(&self) -> AvailabilityResult {
        let state = self.host.state();
        if !state.context_attached {
            return AvailabilityResult::Unavailable(UnavailableReason::NoHostContext);
        }
        if state.activity.is_none() {
            return AvailabilityResult::Unavailable(UnavailableReason::NoActivity);
        }

        match self.platform.probe_capability().await {
            Ok(Capability::Supported) => AvailabilityResult::Available,
            Ok(Capability::Unsupported(reason)) => {
                debug!(%reason, "in-app review unsupported");
                AvailabilityResult::Unavailable(UnavailableReason::Unsupported(reason))
            }
            Err(e) => {
                warn!(error = %e, "capability probe failed");
                AvailabilityResult::Unknown(e.to_string())
            }
        }
    }

    /// `check_availability() == Available`, warming the token cache when
    /// configured to.
    pub async fn is_available(&self) -> bool {
        let available = self.check_availability().await.is_available();
        if available && self.config.prefetch_on_availability {
            let outcome = self.prefetch_token().await;
            debug!(?outcome, "prefetch after availability check");
        }
        available
    }

    // -- Review flow ---------------------------------------------------------

    /// Request the in-app review flow.
    ///
    /// `Completed` means the flow ran; platforms never report whether a
    /// prompt was actually shown.
    pub async fn request_review(&self) -> RequestOutcome {
        loop {
            match self.enter(FlightKind::Review) {
                Slot::Lead(guard) => {
                    let outcome = self.run_review().await;
                    info!(?outcome, "review request finished");
                    return guard.finish(outcome);
                }
                Slot::Join(FlightKind::Review, rx) => {
                    debug!("joining in-flight review request");
                    return wait_for_flight(rx).await;
                }
                Slot::Join(FlightKind::Prefetch, rx) => {
                    // Let the prefetch land, then spend its token.
                    wait_for_flight(rx).await;
                }
            }
        }
    }

    /// Fetch a token ahead of time so the next `request_review` can skip the
    /// fetch. No-op when one is already cached.
    pub async fn prefetch_token(&self) -> RequestOutcome {
        loop {
            match self.enter(FlightKind::Prefetch) {
                Slot::Lead(guard) => {
                    let outcome = self.run_prefetch().await;
                    return guard.finish(outcome);
                }
                Slot::Join(FlightKind::Prefetch, rx) => return wait_for_flight(rx).await,
                Slot::Join(FlightKind::Review, rx) => {
                    // The review spends whatever token exists; start over after it.
                    wait_for_flight(rx).await;
                }
            }
        }
    }

    fn enter(&self, kind: FlightKind) -> Slot<'_> {
        let mut slot = self.inflight.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(flight) = slot.as_ref() {
            return Slot::Join(flight.kind, flight.rx.clone());
        }
        let (tx, rx) = watch::channel(None);
        *slot = Some(Flight { kind, rx });
        Slot::Lead(FlightGuard {
            slot: &self.inflight,
            tx,
            finished: false,
        })
    }

    async fn run_review(&self) -> RequestOutcome {
        let Some(activity) = self.host.ready_activity() else {
            info!("review requested without a host environment");
            return RequestOutcome::Failed(ErrorKind::NoHostContext);
        };

        match self.until_detached(self.platform.probe_capability()).await {
            None => return RequestOutcome::Failed(ErrorKind::NoHostContext),
            Some(Ok(Capability::Supported)) => {}
            Some(Ok(Capability::Unsupported(reason))) => {
                info!(%reason, "in-app review unsupported on this device");
                return RequestOutcome::Failed(ErrorKind::CapabilityUnsupported);
            }
            // The fetch will tell us whether the platform really can't do it.
            Some(Err(e)) => warn!(error = %e, "capability probe failed, trying anyway"),
        }

        self.invoke_with_retry(&activity).await
    }

    /// One retry budget covers the whole request: a fetch retry and a flow
    /// retry are not both available.
    async fn invoke_with_retry(&self, activity: &ActivityHandle) -> RequestOutcome {
        let mut attempt = 0;
        let cached = self.token_slot().take();
        let mut token = match cached {
            Some(token) => {
                debug!(token_id = %token.id, "using cached token");
                token
            }
            None => match self.fetch_with_retry(&mut attempt).await {
                Ok(token) => token,
                Err(kind) => return RequestOutcome::Failed(kind),
            },
        };

        loop {
            // The token is out of the cache: spent whatever happens below.
            info!(token_id = %token.id, attempt, "launching review flow");
            let result = self
                .until_detached(self.platform.launch_review_flow(activity, &token))
                .await;

            let err = match result {
                None => return RequestOutcome::Failed(ErrorKind::NoHostContext),
                Some(Ok(())) => return RequestOutcome::Completed,
                Some(Err(e)) => e,
            };

            let kind = match should_retry(&err, attempt, &self.retry) {
                RetryDecision::RetryAfter(delay) => {
                    warn!(error = %err, attempt, "review flow failed, retrying with a fresh token");
                    self.invalidate_token();
                    if !self.pause(delay).await {
                        return RequestOutcome::Failed(ErrorKind::NoHostContext);
                    }
                    attempt += 1;
                    token = match self.fetch_once().await {
                        Ok(token) => token,
                        Err(kind) => return RequestOutcome::Failed(kind),
                    };
                    continue;
                }
                RetryDecision::GiveUp(class) => kind_for(class, ErrorKind::FlowInvocationError),
                RetryDecision::Exhausted => ErrorKind::FlowInvocationError,
            };
            warn!(detail = %describe_error(kind, &err).message, "review flow failed");
            return RequestOutcome::Failed(kind);
        }
    }

    /// Replacement token for a flow retry. No retry of its own; a failure
    /// here is the second failure of the flow.
    async fn fetch_once(&self) -> Result<ReviewToken, ErrorKind> {
        match self.until_detached(self.platform.fetch_review_token()).await {
            None => Err(ErrorKind::NoHostContext),
            Some(Ok(token)) => {
                debug!(token_id = %token.id, "replacement token fetched");
                Ok(token)
            }
            Some(Err(e)) => {
                let kind = kind_for(classify_error(&e), ErrorKind::FlowInvocationError);
                warn!(detail = %describe_error(kind, &e).message, "replacement token fetch failed");
                Err(kind)
            }
        }
    }

    async fn run_prefetch(&self) -> RequestOutcome {
        if self.host.ready_activity().is_none() {
            return RequestOutcome::Failed(ErrorKind::NoHostContext);
        }
        if self.has_cached_token() {
            debug!("token already cached");
            return RequestOutcome::Completed;
        }
        match self.fetch_with_retry(&mut 0).await {
            Ok(token) => {
                debug!(token_id = %token.id, "token cached");
                *self.token_slot() = Some(token);
                RequestOutcome::Completed
            }
            Err(kind) => RequestOutcome::Failed(kind),
        }
    }

    /// Fetch a token, spending retries from `attempt`.
    async fn fetch_with_retry(&self, attempt: &mut u32) -> Result<ReviewToken, ErrorKind> {
        loop {
            let err = match self.until_detached(self.platform.fetch_review_token()).await {
                None => return Err(ErrorKind::NoHostContext),
                Some(Ok(token)) => {
                    debug!(token_id = %token.id, issued_at = %token.issued_at, "token fetched");
                    return Ok(token);
                }
                Some(Err(e)) => e,
            };

            let kind = match should_retry(&err, *attempt, &self.retry) {
                RetryDecision::RetryAfter(delay) => {
                    warn!(error = %err, attempt = *attempt, "token fetch failed, retrying");
                    if !self.pause(delay).await {
                        return Err(ErrorKind::NoHostContext);
                    }
                    *attempt += 1;
                    continue;
                }
                RetryDecision::GiveUp(class) => kind_for(class, ErrorKind::TokenFetchError),
                RetryDecision::Exhausted => ErrorKind::TokenFetchError,
            };
            warn!(detail = %describe_error(kind, &err).message, "token fetch failed");
            return Err(kind);
        }
    }

    /// Discard any cached token, e.g. when the platform session was reset.
    pub fn invalidate_token(&self) {
        let cached = self.token_slot().take();
        if let Some(token) = cached {
            debug!(token_id = %token.id, "cached token invalidated");
            self.platform.release_token(&token);
        }
    }

    fn token_slot(&self) -> std::sync::MutexGuard<'_, Option<ReviewToken>> {
        self.cached_token
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `fut` unless the host detaches first.
    async fn until_detached<F: Future>(&self, fut: F) -> Option<F::Output> {
        tokio::select! {
            biased;
            _ = self.host.detached() => {
                info!("host detached while a platform call was pending");
                None
            }
            out = fut => Some(out),
        }
    }

    /// Sleep before a retry. Returns false if the host detached meanwhile.
    async fn pause(&self, delay: std::time::Duration) -> bool {
        if delay.is_zero() {
            return self.host.ready_activity().is_some();
        }
        self.until_detached(tokio::time::sleep(delay)).await.is_some()
    }

    // -- Store listing -------------------------------------------------------

    /// Open the store listing for `app_id`. Launch failures are not retried.
    pub async fn open_store_listing(&self, app_id: &str) -> RequestOutcome {
        if !self.host.context_attached() {
            info!(app_id, "store listing requested without a host context");
            return RequestOutcome::Skipped(ErrorKind::NoHostContext);
        }

        let url = match self.store_target().listing_url(app_id) {
            Ok(url) => url,
            Err(e) => {
                warn!(app_id, error = %e, "could not build store listing url");
                return RequestOutcome::Failed(ErrorKind::InvalidArgument);
            }
        };

        info!(app_id, url = %url, "opening store listing");
        match self.platform.launch_url(&url).await {
            Ok(()) => RequestOutcome::Completed,
            Err(e) => {
                let kind = match e {
                    ReviewError::NoHostContext(_) => ErrorKind::NoHostContext,
                    _ => ErrorKind::LaunchError,
                };
                warn!(detail = %describe_error(kind, &e).message, "store listing launch failed");
                RequestOutcome::Failed(kind)
            }
        }
    }
}

impl Drop for ReviewOrchestrator {
    fn drop(&mut self) {
        // Release the unspent token, if any.
        self.invalidate_token();
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use reviewkit_bridge::scripted::{ScriptedBridge, Step};

    use super::*;

    fn quick_config() -> ReviewConfig {
        ReviewConfig {
            retry_delay_ms: 0,
            ..Default::default()
        }
    }

    fn attached_host() -> HostBinding {
        let host = HostBinding::new();
        host.attach_context();
        host.attach_activity(ActivityHandle::new(1, "MainActivity"));
        host
    }

    fn setup() -> (Arc<ScriptedBridge>, Arc<ReviewOrchestrator>) {
        setup_with(quick_config())
    }

    fn setup_with(config: ReviewConfig) -> (Arc<ScriptedBridge>, Arc<ReviewOrchestrator>) {
        let bridge = Arc::new(ScriptedBridge::new(StoreTarget::PlayStore));
        let orchestrator = Arc::new(ReviewOrchestrator::new(bridge.clone(), attached_host(), config));
        (bridge, orchestrator)
    }

    /// Retries wait long enough that only a detach can end the pause.
    fn slow_retry_config() -> ReviewConfig {
        ReviewConfig {
            retry_delay_ms: 60_000,
            ..Default::default()
        }
    }

    async fn settle() {
        for _ in 0..8 {
            tokio::task::yield_now().await;
        }
    }

    async fn outcome_of(task: tokio::task::JoinHandle<RequestOutcome>) -> RequestOutcome {
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .unwrap()
            .unwrap()
    }

    #[tokio::test]
    async fn happy_path_completes() {
        let (bridge, orch) = setup();
        assert!(orch.is_available().await);
        assert_eq!(orch.request_review().await, RequestOutcome::Completed);
        assert_eq!(bridge.fetch_calls(), 1);
        assert_eq!(bridge.flow_calls(), 1);
        assert!(!orch.has_cached_token());
    }

    #[tokio::test]
    async fn detached_host_makes_no_platform_calls() {
        let bridge = Arc::new(ScriptedBridge::new(StoreTarget::PlayStore));
        let orch = ReviewOrchestrator::new(bridge.clone(), HostBinding::new(), quick_config());

        assert_eq!(
            orch.check_availability().await,
            AvailabilityResult::Unavailable(UnavailableReason::NoHostContext)
        );
        assert!(!orch.is_available().await);
        assert_eq!(
            orch.request_review().await,
            RequestOutcome::Failed(ErrorKind::NoHostContext)
        );
        assert_eq!(bridge.total_calls(), 0);
    }

    #[tokio::test]
    async fn context_without_activity_is_unavailable() {
        let bridge = Arc::new(ScriptedBridge::new(StoreTarget::PlayStore));
        let host = HostBinding::new();
        host.attach_context();
        let orch = ReviewOrchestrator::new(bridge, host, quick_config());
        assert_eq!(
            orch.check_availability().await,
            AvailabilityResult::Unavailable(UnavailableReason::NoActivity)
        );
    }

    #[tokio::test]
    async fn unsupported_os_fails_with_capability_unsupported() {
        let (bridge, orch) = setup();
        bridge.set_capability(Capability::Unsupported("API 19".into()));

        assert!(!orch.is_available().await);
        assert_eq!(
            orch.request_review().await,
            RequestOutcome::Failed(ErrorKind::CapabilityUnsupported)
        );
        assert_eq!(bridge.fetch_calls(), 0);
    }

    #[tokio::test]
    async fn stale_token_is_retried_transparently() {
        let (bridge, orch) = setup();
        bridge.push_flow(Step::Stale);

        assert_eq!(orch.request_review().await, RequestOutcome::Completed);
        assert_eq!(bridge.fetch_calls(), 2);
        assert_eq!(bridge.flow_calls(), 2);

        let spent = bridge.spent_tokens();
        assert_ne!(spent[0], spent[1]);
    }

    #[tokio::test]
    async fn second_flow_failure_surfaces() {
        let (bridge, orch) = setup();
        bridge.push_flow(Step::Stale);
        bridge.push_flow(Step::Fail("rejected".into()));

        assert_eq!(
            orch.request_review().await,
            RequestOutcome::Failed(ErrorKind::FlowInvocationError)
        );
        assert_eq!(bridge.flow_calls(), 2);
    }

    #[tokio::test]
    async fn fetch_retried_once_then_surfaced() {
        let (bridge, orch) = setup();
        bridge.push_fetch(Step::Fail("offline".into()));
        bridge.push_fetch(Step::Fail("offline".into()));

        assert_eq!(
            orch.request_review().await,
            RequestOutcome::Failed(ErrorKind::TokenFetchError)
        );
        assert_eq!(bridge.fetch_calls(), 2);
        assert_eq!(bridge.flow_calls(), 0);
    }

    #[tokio::test]
    async fn single_fetch_failure_recovers() {
        let (bridge, orch) = setup();
        bridge.push_fetch(Step::Fail("offline".into()));

        assert_eq!(orch.request_review().await, RequestOutcome::Completed);
        assert_eq!(bridge.fetch_calls(), 2);
    }

    #[tokio::test]
    async fn unsupported_flow_is_not_retried() {
        let (bridge, orch) = setup();
        bridge.push_flow(Step::Unsupported("store client disabled".into()));

        assert_eq!(
            orch.request_review().await,
            RequestOutcome::Failed(ErrorKind::CapabilityUnsupported)
        );
        assert_eq!(bridge.flow_calls(), 1);
    }

    #[tokio::test]
    async fn tokens_never_reused_across_requests() {
        let (bridge, orch) = setup();
        bridge.push_flow(Step::Fail("rejected".into()));
        bridge.push_flow(Step::Fail("rejected".into()));

        assert_eq!(
            orch.request_review().await,
            RequestOutcome::Failed(ErrorKind::FlowInvocationError)
        );
        assert_eq!(orch.request_review().await, RequestOutcome::Completed);

        let spent = bridge.spent_tokens();
        assert_eq!(spent.len(), 3);
        let unique: std::collections::HashSet<_> = spent.iter().collect();
        assert_eq!(unique.len(), 3);
        assert_eq!(bridge.fetch_calls(), 3);
    }

    #[tokio::test]
    async fn prefetched_token_is_spent_by_next_request() {
        let (bridge, orch) = setup();

        assert_eq!(orch.prefetch_token().await, RequestOutcome::Completed);
        assert_eq!(orch.prefetch_token().await, RequestOutcome::Completed);
        assert!(orch.has_cached_token());
        assert_eq!(bridge.fetch_calls(), 1);

        assert_eq!(orch.request_review().await, RequestOutcome::Completed);
        assert_eq!(bridge.fetch_calls(), 1);
        assert!(!orch.has_cached_token());

        assert_eq!(orch.request_review().await, RequestOutcome::Completed);
        assert_eq!(bridge.fetch_calls(), 2);
    }

    #[tokio::test]
    async fn prefetch_on_availability() {
        let bridge = Arc::new(ScriptedBridge::new(StoreTarget::PlayStore));
        let config = ReviewConfig {
            prefetch_on_availability: true,
            ..quick_config()
        };
        let orch = ReviewOrchestrator::new(bridge.clone(), attached_host(), config);

        assert!(orch.is_available().await);
        assert!(orch.has_cached_token());
        assert_eq!(bridge.fetch_calls(), 1);
    }

    #[tokio::test]
    async fn overlapping_requests_share_one_fetch() {
        let (bridge, orch) = setup();
        let gate = bridge.hold_fetches();
        let started = bridge.fetch_started();

        let first = tokio::spawn({
            let orch = Arc::clone(&orch);
            async move { orch.request_review().await }
        });
        started.notified().await;

        let followers: Vec<_> = (0..4)
            .map(|_| {
                let orch = Arc::clone(&orch);
                tokio::spawn(async move { orch.request_review().await })
            })
            .collect();
        for _ in 0..8 {
            tokio::task::yield_now().await;
        }

        gate.notify_one();
        assert_eq!(first.await.unwrap(), RequestOutcome::Completed);
        for follower in followers {
            assert_eq!(follower.await.unwrap(), RequestOutcome::Completed);
        }
        assert_eq!(bridge.fetch_calls(), 1);
        assert_eq!(bridge.flow_calls(), 1);
    }

    #[tokio::test]
    async fn detach_during_fetch_resolves_no_host_context() {
        let (bridge, orch) = setup();
        let _gate = bridge.hold_fetches();
        let started = bridge.fetch_started();

        let pending = tokio::spawn({
            let orch = Arc::clone(&orch);
            async move { orch.request_review().await }
        });
        started.notified().await;

        orch.host().detach_activity();
        let outcome = tokio::time::timeout(Duration::from_secs(1), pending)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(outcome, RequestOutcome::Failed(ErrorKind::NoHostContext));
        assert_eq!(bridge.flow_calls(), 0);
    }

    #[tokio::test]
    async fn cancelled_leader_releases_joiners() {
        let (bridge, orch) = setup();
        let _gate = bridge.hold_fetches();
        let started = bridge.fetch_started();

        let leader = tokio::spawn({
            let orch = Arc::clone(&orch);
            async move { orch.request_review().await }
        });
        started.notified().await;

        let joiner = tokio::spawn({
            let orch = Arc::clone(&orch);
            async move { orch.request_review().await }
        });
        tokio::task::yield_now().await;

        leader.abort();
        let outcome = tokio::time::timeout(Duration::from_secs(1), joiner)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(outcome, RequestOutcome::Failed(ErrorKind::NoHostContext));
    }

    #[tokio::test]
    async fn fetch_retry_uses_up_the_request_budget() {
        let (bridge, orch) = setup();
        bridge.push_fetch(Step::Fail("offline".into()));
        bridge.push_fetch(Step::Succeed);
        bridge.push_fetch(Step::Fail("offline".into()));
        bridge.push_flow(Step::Stale);
        bridge.push_flow(Step::Stale);

        assert_eq!(
            orch.request_review().await,
            RequestOutcome::Failed(ErrorKind::FlowInvocationError)
        );
        assert!(bridge.fetch_calls() <= 2);
        assert_eq!(bridge.flow_calls(), 1);
    }

    #[tokio::test]
    async fn failed_refetch_after_stale_token_is_flow_error() {
        let (bridge, orch) = setup();
        bridge.push_fetch(Step::Succeed);
        bridge.push_fetch(Step::Fail("offline".into()));
        bridge.push_fetch(Step::Fail("offline".into()));
        bridge.push_flow(Step::Stale);

        assert_eq!(
            orch.request_review().await,
            RequestOutcome::Failed(ErrorKind::FlowInvocationError)
        );
        assert_eq!(bridge.fetch_calls(), 2);
        assert_eq!(bridge.flow_calls(), 1);
    }

    #[tokio::test]
    async fn invalidated_token_is_released_to_platform() {
        let (bridge, orch) = setup();
        assert_eq!(orch.prefetch_token().await, RequestOutcome::Completed);
        assert_eq!(bridge.live_tokens(), 1);

        orch.invalidate_token();
        assert!(!orch.has_cached_token());
        assert_eq!(bridge.live_tokens(), 0);
        assert_eq!(bridge.released_tokens().len(), 1);
    }

    #[tokio::test]
    async fn dropping_orchestrator_releases_cached_token() {
        let (bridge, orch) = setup();
        assert_eq!(orch.prefetch_token().await, RequestOutcome::Completed);

        drop(orch);
        assert_eq!(bridge.live_tokens(), 0);
        assert_eq!(bridge.released_tokens().len(), 1);
    }

    #[tokio::test]
    async fn detach_during_flow_resolves_no_host_context() {
        let (bridge, orch) = setup();
        let _gate = bridge.hold_flows();
        let started = bridge.flow_started();

        let pending = tokio::spawn({
            let orch = Arc::clone(&orch);
            async move { orch.request_review().await }
        });
        started.notified().await;

        orch.host().detach_activity();
        assert_eq!(
            outcome_of(pending).await,
            RequestOutcome::Failed(ErrorKind::NoHostContext)
        );
        assert_eq!(bridge.fetch_calls(), 1);
        assert_eq!(bridge.flow_calls(), 1);
    }

    #[tokio::test]
    async fn detach_during_flow_retry_pause() {
        let (bridge, orch) = setup_with(slow_retry_config());
        bridge.push_flow(Step::Stale);
        let started = bridge.flow_started();

        let pending = tokio::spawn({
            let orch = Arc::clone(&orch);
            async move { orch.request_review().await }
        });
        started.notified().await;
        settle().await;

        orch.host().detach_activity();
        assert_eq!(
            outcome_of(pending).await,
            RequestOutcome::Failed(ErrorKind::NoHostContext)
        );
        // No replacement token was fetched.
        assert_eq!(bridge.fetch_calls(), 1);
        assert_eq!(bridge.flow_calls(), 1);
    }

    #[tokio::test]
    async fn detach_during_fetch_retry_pause() {
        let (bridge, orch) = setup_with(slow_retry_config());
        bridge.push_fetch(Step::Fail("offline".into()));
        let started = bridge.fetch_started();

        let pending = tokio::spawn({
            let orch = Arc::clone(&orch);
            async move { orch.request_review().await }
        });
        started.notified().await;
        settle().await;

        orch.host().detach_activity();
        assert_eq!(
            outcome_of(pending).await,
            RequestOutcome::Failed(ErrorKind::NoHostContext)
        );
        assert_eq!(bridge.fetch_calls(), 1);
        assert_eq!(bridge.flow_calls(), 0);
    }

    #[tokio::test]
    async fn request_behind_prefetch_spends_prefetched_token() {
        let (bridge, orch) = setup();
        let gate = bridge.hold_fetches();
        let started = bridge.fetch_started();

        let prefetch = tokio::spawn({
            let orch = Arc::clone(&orch);
            async move { orch.prefetch_token().await }
        });
        started.notified().await;

        let request = tokio::spawn({
            let orch = Arc::clone(&orch);
            async move { orch.request_review().await }
        });
        settle().await;
        assert!(!request.is_finished());

        gate.notify_one();
        assert_eq!(outcome_of(prefetch).await, RequestOutcome::Completed);
        assert_eq!(outcome_of(request).await, RequestOutcome::Completed);

        assert_eq!(bridge.fetch_calls(), 1);
        assert_eq!(bridge.spent_tokens().len(), 1);
        assert!(!orch.has_cached_token());
    }

    #[tokio::test]
    async fn store_listing_builds_play_url() {
        let (bridge, orch) = setup();
        assert_eq!(
            orch.open_store_listing("com.example.app").await,
            RequestOutcome::Completed
        );
        let urls = bridge.launched_urls();
        assert_eq!(urls.len(), 1);
        assert!(urls[0].as_str().contains("com.example.app"));
    }

    #[tokio::test]
    async fn store_listing_skipped_without_host() {
        let bridge = Arc::new(ScriptedBridge::new(StoreTarget::PlayStore));
        let orch = ReviewOrchestrator::new(bridge.clone(), HostBinding::new(), quick_config());
        assert_eq!(
            orch.open_store_listing("com.example.app").await,
            RequestOutcome::Skipped(ErrorKind::NoHostContext)
        );
        assert_eq!(bridge.launch_calls(), 0);
    }

    #[tokio::test]
    async fn store_listing_launch_failure_not_retried() {
        let (bridge, orch) = setup();
        bridge.push_launch(Step::Fail("no browser".into()));
        assert_eq!(
            orch.open_store_listing("com.example.app").await,
            RequestOutcome::Failed(ErrorKind::LaunchError)
        );
        assert_eq!(bridge.launch_calls(), 1);
    }

    #[tokio::test]
    async fn store_target_override() {
        let bridge = Arc::new(ScriptedBridge::new(StoreTarget::PlayStore));
        let config = ReviewConfig {
            store_target: Some(StoreTarget::AppStore),
            ..quick_config()
        };
        let orch = ReviewOrchestrator::new(bridge.clone(), attached_host(), config);

        assert_eq!(
            orch.open_store_listing("com.example.app").await,
            RequestOutcome::Failed(ErrorKind::InvalidArgument)
        );
        assert_eq!(orch.open_store_listing("1234").await, RequestOutcome::Completed);
        assert_eq!(bridge.launched_urls()[0].host_str(), Some("apps.apple.com"));
    }
}
