// crates/raro-agent/src/lifecycle.rs
// Purpose: Drives one agent instance through init -> message loop -> cleanup.
// Architecture: single task per agent; process_message is awaited to
//   completion before the next message is pulled, which is what gives
//   agents the single-threaded handling guarantee.
// Dependencies: tokio, futures (panic recovery), tracing

use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use raro_broker::{Message, Subscription};

use crate::agent::Agent;
use crate::error::AgentError;
use crate::services::BaseAgentServices;

/// Owns one agent instance plus its declared ingress/egress topic, if any.
/// The cell/pool schema allows at most one `sub:` ingress and one `pub:`
/// egress per agent; routing fan-out belongs to the broker and cell graph,
/// not to this runtime.
pub struct AgentRuntime<A: Agent> {
    agent: A,
    base: BaseAgentServices,
    ingress_topic: Option<String>,
    egress_topic: Option<String>,
}

impl<A: Agent> AgentRuntime<A> {
    pub fn new(
        agent: A,
        base: BaseAgentServices,
        ingress_topic: Option<String>,
        egress_topic: Option<String>,
    ) -> Self {
        Self {
            agent,
            base,
            ingress_topic,
            egress_topic,
        }
    }

    /// Runs init, the message loop, and cleanup. Returns on a fatal init
    /// error or once the cancellation token fires and the in-flight message
    /// (if any) has drained.
    pub async fn run(mut self) -> Result<(), AgentError> {
        self.agent.init(&self.base).await.map_err(|e| {
            tracing::error!(agent_id = %self.base.agent_id, error = %e, "agent init failed");
            e
        })?;

        let mut subscription: Option<Subscription> = match &self.ingress_topic {
            Some(topic) => Some(self.base.broker.subscribe(topic)?),
            None => None,
        };

        let cancellation = self.base.cancellation_token();
        loop {
            let message = match subscription.as_mut() {
                Some(sub) => {
                    tokio::select! {
                        _ = cancellation.cancelled() => break,
                        msg = sub.recv() => msg,
                    }
                }
                // No ingress topic: the agent is egress-only or externally
                // driven (e.g. file:/http: pseudo-ingress handled upstream);
                // just wait for shutdown.
                None => {
                    cancellation.cancelled().await;
                    break;
                }
            };

            let Some(message) = message else {
                tracing::info!(agent_id = %self.base.agent_id, "ingress subscription closed");
                break;
            };

            self.handle_one(message).await;
        }

        self.agent.cleanup(&self.base).await;
        Ok(())
    }

    async fn handle_one(&mut self, message: Message) {
        let agent_id = self.base.agent_id.clone();
        let outcome = AssertUnwindSafe(self.agent.process_message(message, &self.base))
            .catch_unwind()
            .await;

        let result = match outcome {
            Ok(inner) => inner,
            Err(panic) => {
                let reason = panic_message(&panic);
                tracing::error!(agent_id = %agent_id, reason = %reason, "process_message panicked");
                Err(AgentError::HandlerPanic(reason))
            }
        };

        match result {
            Ok(Some(reply)) => {
                if let Some(topic) = &self.egress_topic {
                    if let Err(e) = self.base.publish(topic, reply).await {
                        tracing::error!(agent_id = %agent_id, error = %e, "failed to publish reply");
                    }
                }
            }
            Ok(None) => {}
            Err(e) => {
                tracing::error!(agent_id = %agent_id, error = %e, "process_message returned an error");
            }
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
