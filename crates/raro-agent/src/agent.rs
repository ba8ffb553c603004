use async_trait::async_trait;
use raro_broker::Message;

use crate::error::AgentError;
use crate::services::BaseAgentServices;

/// Capability every concrete agent implements. The runtime owns the
/// lifecycle (subscribe, serialize, shutdown); an `Agent` only supplies the
/// three callbacks.
#[async_trait]
pub trait Agent: Send {
    async fn init(&mut self, base: &BaseAgentServices) -> Result<(), AgentError>;

    /// Called once per ingress message, never concurrently with itself.
    /// A `None` reply means nothing is published to egress.
    async fn process_message(
        &mut self,
        message: Message,
        base: &BaseAgentServices,
    ) -> Result<Option<Message>, AgentError>;

    async fn cleanup(&mut self, base: &BaseAgentServices);
}
