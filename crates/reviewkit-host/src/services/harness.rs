// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// JSON-lines harness: stands in for the app shell's method channel on
// desktop.
//
// Each input line is either a method call
// (`{"id": 1, "channel": "...", "method": ..., "arguments": ...}`, with `id`
// and `channel` optional) or a lifecycle event
// (`{"lifecycle": "detachActivity"}`). Every line gets exactly one response
// line.
//
// Lifecycle events apply as soon as they are read, and method calls run as
// separate tasks, so a detach can land while a request is still pending.
// Replies are written in completion order; calls that carry an `id` get
// `{"id": ..., "response": ...}` back so the caller can match them up.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::{json, Value};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use reviewkit_bridge::traits::ReviewPlatform;
use reviewkit_core::error::{ReviewError, Result};
use reviewkit_core::types::{ActivityHandle, ErrorKind};
use reviewkit_core::ReviewConfig;
use reviewkit_orchestrator::{dispatch, HostBinding, MethodCall, MethodResponse, ReviewOrchestrator};

/// Host lifecycle events the shell would normally report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LifecycleEvent {
    AttachContext,
    DetachContext,
    AttachActivity,
    DetachActivity,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum HarnessLine {
    Lifecycle { lifecycle: LifecycleEvent },
    Call(CallLine),
}

#[derive(Debug, Deserialize)]
struct CallLine {
    #[serde(default)]
    id: Option<Value>,
    /// Absent means the orchestrator's own channel.
    #[serde(default)]
    channel: Option<String>,
    #[serde(flatten)]
    call: MethodCall,
}

#[derive(Debug)]
struct Reply {
    id: Option<Value>,
    response: MethodResponse,
}

impl Reply {
    fn untagged(response: MethodResponse) -> Self {
        Self { id: None, response }
    }

    fn encode(&self) -> serde_json::Result<Vec<u8>> {
        let body = serde_json::to_value(&self.response)?;
        let line = match &self.id {
            Some(id) => json!({ "id": id, "response": body }),
            None => body,
        };
        let mut encoded = serde_json::to_vec(&line)?;
        encoded.push(b'\n');
        Ok(encoded)
    }
}

/// What to do with one input line.
enum Accepted {
    Ignored,
    Reply(Reply),
    Dispatch { id: Option<Value>, call: MethodCall },
}

pub struct Harness {
    orchestrator: Arc<ReviewOrchestrator>,
    channel: String,
    next_activity_id: u64,
}

impl Harness {
    /// Wire an orchestrator to `platform`. With `attached`, the harness
    /// behaves like an app in the foreground from the start.
    pub fn new(platform: Arc<dyn ReviewPlatform>, config: ReviewConfig, attached: bool) -> Self {
        info!(
            platform = platform.platform_name(),
            channel = %config.channel_name,
            attached,
            "starting review harness"
        );
        let channel = config.channel_name.clone();
        let host = HostBinding::new();
        let mut harness = Self {
            orchestrator: Arc::new(ReviewOrchestrator::new(platform, host, config)),
            channel,
            next_activity_id: 1,
        };
        if attached {
            harness.apply(LifecycleEvent::AttachContext);
            harness.apply(LifecycleEvent::AttachActivity);
        }
        harness
    }

    fn apply(&mut self, event: LifecycleEvent) {
        let host = self.orchestrator.host();
        match event {
            LifecycleEvent::AttachContext => host.attach_context(),
            LifecycleEvent::DetachContext => host.detach_context(),
            LifecycleEvent::AttachActivity => {
                let id = self.next_activity_id;
                self.next_activity_id += 1;
                host.attach_activity(ActivityHandle::new(id, "HarnessActivity"));
            }
            LifecycleEvent::DetachActivity => host.detach_activity(),
        }
    }

    fn accept(&mut self, line: &str) -> Accepted {
        let line = line.trim();
        if line.is_empty() {
            return Accepted::Ignored;
        }

        match serde_json::from_str::<HarnessLine>(line) {
            Ok(HarnessLine::Lifecycle { lifecycle }) => {
                debug!(?lifecycle, "lifecycle event");
                self.apply(lifecycle);
                Accepted::Reply(Reply::untagged(MethodResponse::Ok(Value::Null)))
            }
            Ok(HarnessLine::Call(CallLine { id, channel, call })) => match channel {
                Some(channel) if channel != self.channel => {
                    info!(%channel, method = %call.method, "call for another channel");
                    Accepted::Reply(Reply {
                        id,
                        response: MethodResponse::NotImplemented,
                    })
                }
                _ => Accepted::Dispatch { id, call },
            },
            Err(e) => {
                warn!(error = %e, "unparseable harness line");
                Accepted::Reply(Reply::untagged(MethodResponse::error(
                    ErrorKind::InvalidArgument,
                    format!("bad request: {e}"),
                )))
            }
        }
    }

    /// Pump lines from `input` to `output` until EOF and every pending call
    /// has answered.
    pub async fn run<R, W>(&mut self, input: R, mut output: W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = input.lines();
        let mut pending: JoinSet<Reply> = JoinSet::new();
        let mut input_open = true;

        loop {
            tokio::select! {
                line = lines.next_line(), if input_open => match line? {
                    Some(line) => match self.accept(&line) {
                        Accepted::Ignored => {}
                        Accepted::Reply(reply) => write_reply(&mut output, &reply).await?,
                        Accepted::Dispatch { id, call } => {
                            let orchestrator = Arc::clone(&self.orchestrator);
                            pending.spawn(async move {
                                let response = dispatch(&orchestrator, &call).await;
                                Reply { id, response }
                            });
                        }
                    },
                    None => {
                        debug!(pending = pending.len(), "input closed");
                        input_open = false;
                    }
                },
                Some(joined) = pending.join_next() => {
                    let reply = joined
                        .map_err(|e| ReviewError::Bridge(format!("dispatch task failed: {e}")))?;
                    write_reply(&mut output, &reply).await?;
                }
                else => break,
            }
        }

        info!("harness exiting");
        Ok(())
    }
}

async fn write_reply<W: AsyncWrite + Unpin>(output: &mut W, reply: &Reply) -> Result<()> {
    output.write_all(&reply.encode()?).await?;
    output.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use reviewkit_bridge::scripted::ScriptedBridge;
    use reviewkit_core::types::StoreTarget;
    use tokio::io::BufReader;

    use super::*;

    fn config() -> ReviewConfig {
        ReviewConfig {
            retry_delay_ms: 0,
            ..Default::default()
        }
    }

    fn harness(attached: bool) -> (Arc<ScriptedBridge>, Harness) {
        let bridge = Arc::new(ScriptedBridge::new(StoreTarget::PlayStore));
        let harness = Harness::new(bridge.clone(), config(), attached);
        (bridge, harness)
    }

    fn parse_output(output: Vec<u8>) -> Vec<Value> {
        String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    async fn run_lines(harness: &mut Harness, input: &str) -> Vec<Value> {
        let mut output = Vec::new();
        harness.run(input.as_bytes(), &mut output).await.unwrap();
        parse_output(output)
    }

    fn reply_for(out: &[Value], id: u64) -> &Value {
        &out.iter().find(|v| v["id"] == json!(id)).unwrap()["response"]
    }

    #[tokio::test]
    async fn one_response_per_line() {
        let (_, mut h) = harness(true);
        let out = run_lines(
            &mut h,
            "{\"id\":1,\"method\":\"isAvailable\"}\n\n{\"id\":2,\"method\":\"requestReview\"}\n",
        )
        .await;
        assert_eq!(out.len(), 2);
        assert_eq!(reply_for(&out, 1), &json!({"ok": true}));
        assert_eq!(reply_for(&out, 2), &json!({"ok": null}));
    }

    #[tokio::test]
    async fn lifecycle_applies_before_later_calls() {
        let (_, mut h) = harness(true);
        let out = run_lines(
            &mut h,
            "{\"lifecycle\":\"detachActivity\"}\n{\"method\":\"requestReview\"}\n",
        )
        .await;
        assert_eq!(out[0], json!({"ok": null}));
        assert_eq!(out[1]["error"]["code"], json!("NoHostContext"));
    }

    #[tokio::test]
    async fn detach_line_cancels_pending_request() {
        let (bridge, mut h) = harness(true);
        let _gate = bridge.hold_fetches();
        let started = bridge.fetch_started();

        let (mut client, server) = tokio::io::duplex(1024);
        let mut output = Vec::new();
        let driver = async move {
            client
                .write_all(b"{\"id\":7,\"method\":\"requestReview\"}\n")
                .await
                .unwrap();
            started.notified().await;
            client
                .write_all(b"{\"lifecycle\":\"detachActivity\"}\n")
                .await
                .unwrap();
        };
        let (result, ()) = tokio::join!(h.run(BufReader::new(server), &mut output), driver);
        result.unwrap();

        let out = parse_output(output);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0], json!({"ok": null}));
        assert_eq!(reply_for(&out, 7)["error"]["code"], json!("NoHostContext"));
        assert_eq!(bridge.flow_calls(), 0);
    }

    #[tokio::test]
    async fn calls_for_other_channels_are_not_implemented() {
        let (bridge, mut h) = harness(true);
        let out = run_lines(
            &mut h,
            concat!(
                "{\"id\":1,\"channel\":\"plugins.other/share\",\"method\":\"requestReview\"}\n",
                "{\"id\":2,\"channel\":\"dev.britannio.in_app_review\",\"method\":\"isAvailable\"}\n",
            ),
        )
        .await;
        assert_eq!(reply_for(&out, 1), &json!("notImplemented"));
        assert_eq!(reply_for(&out, 2), &json!({"ok": true}));
        assert_eq!(bridge.fetch_calls(), 0);
    }

    #[tokio::test]
    async fn garbage_is_invalid_argument() {
        let (_, mut h) = harness(false);
        match h.accept("not json") {
            Accepted::Reply(Reply {
                response: MethodResponse::Error { code, .. },
                ..
            }) => assert_eq!(code, "InvalidArgument"),
            _ => panic!("expected an InvalidArgument reply"),
        }
    }
}
