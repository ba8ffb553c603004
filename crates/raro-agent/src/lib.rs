mod agent;
mod config;
mod error;
mod lifecycle;
mod services;

pub use agent::Agent;
pub use config::AgentConfig;
pub use error::AgentError;
pub use lifecycle::AgentRuntime;
pub use services::BaseAgentServices;

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use raro_broker::{Broker, Message};
    use raro_vfs::Vfs;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    struct EchoAgent {
        calls: Arc<AtomicUsize>,
        init_called: bool,
        cleanup_called: Arc<std::sync::atomic::AtomicBool>,
    }

    #[async_trait]
    impl Agent for EchoAgent {
        async fn init(&mut self, _base: &BaseAgentServices) -> Result<(), AgentError> {
            self.init_called = true;
            Ok(())
        }

        async fn process_message(
            &mut self,
            message: Message,
            _base: &BaseAgentServices,
        ) -> Result<Option<Message>, AgentError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Some(Message::new("echo-reply", message.payload)))
        }

        async fn cleanup(&mut self, _base: &BaseAgentServices) {
            self.cleanup_called.store(true, Ordering::SeqCst);
        }
    }

    fn test_services(broker: Broker) -> BaseAgentServices {
        let dir = tempfile::tempdir().unwrap();
        let vfs = Vfs::open(dir.path(), false).unwrap();
        std::mem::forget(dir); // keep the sandbox alive for the test's duration
        BaseAgentServices::new("echo-1", broker, vfs, AgentConfig::default())
    }

    #[tokio::test]
    async fn process_message_publishes_reply_to_egress() {
        let broker = Broker::new();
        let mut egress = broker.subscribe("out.topic").unwrap();

        let base = test_services(broker.clone());
        let cancellation = base.cancellation_token();
        let agent = EchoAgent {
            calls: Arc::new(AtomicUsize::new(0)),
            init_called: false,
            cleanup_called: Arc::new(std::sync::atomic::AtomicBool::new(false)),
        };
        let runtime = AgentRuntime::new(
            agent,
            base,
            Some("in.topic".to_string()),
            Some("out.topic".to_string()),
        );

        let handle = tokio::spawn(runtime.run());
        broker
            .publish("in.topic", Message::new("request", json!({"n": 42})))
            .await
            .unwrap();

        let reply = tokio::time::timeout(Duration::from_secs(1), egress.recv())
            .await
            .expect("reply within timeout")
            .expect("reply present");
        assert_eq!(reply.payload, json!({"n": 42}));

        cancellation.cancel();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn shutdown_drains_without_new_messages() {
        let broker = Broker::new();
        let base = test_services(broker.clone());
        let cancellation = base.cancellation_token();
        let agent = EchoAgent {
            calls: Arc::new(AtomicUsize::new(0)),
            init_called: false,
            cleanup_called: Arc::new(std::sync::atomic::AtomicBool::new(false)),
        };
        let cleanup_flag = agent.cleanup_called.clone();
        let runtime = AgentRuntime::new(agent, base, Some("in.topic".to_string()), None);

        let handle = tokio::spawn(runtime.run());
        cancellation.cancel();
        handle.await.unwrap().unwrap();
        assert!(cleanup_flag.load(Ordering::SeqCst));
    }
}
