use raro_broker::{Broker, Message};
use raro_vfs::Vfs;
use tokio_util::sync::CancellationToken;

use crate::config::AgentConfig;

/// Services the runtime injects into every agent: broker client, a VFS
/// rooted at the agent's own project subtree, merged config, identity, and
/// the shutdown signal. Agents hold a `&BaseAgentServices`, never construct
/// one themselves.
pub struct BaseAgentServices {
    pub agent_id: String,
    pub broker: Broker,
    pub vfs: Vfs,
    pub config: AgentConfig,
    cancellation: CancellationToken,
}

impl BaseAgentServices {
    pub fn new(agent_id: impl Into<String>, broker: Broker, vfs: Vfs, config: AgentConfig) -> Self {
        Self {
            agent_id: agent_id.into(),
            broker,
            vfs,
            config,
            cancellation: CancellationToken::new(),
        }
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    pub fn is_shutting_down(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    pub fn request_shutdown(&self) {
        self.cancellation.cancel();
    }

    pub async fn publish(&self, topic: &str, message: Message) -> Result<(), raro_broker::BrokerError> {
        self.broker.publish(topic, message).await
    }
}
