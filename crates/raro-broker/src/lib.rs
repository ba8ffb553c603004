mod broker;
mod error;
mod message;

pub use broker::{Broker, Subscription};
pub use error::BrokerError;
pub use message::Message;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    #[tokio::test]
    async fn publish_delivers_to_all_subscribers_in_order() {
        let broker = Broker::new();
        let mut a = broker.subscribe("topic.x").unwrap();
        let mut b = broker.subscribe("topic.x").unwrap();

        broker.publish("topic.x", Message::new("evt", json!(1))).await.unwrap();
        broker.publish("topic.x", Message::new("evt", json!(2))).await.unwrap();

        assert_eq!(a.recv().await.unwrap().payload, json!(1));
        assert_eq!(a.recv().await.unwrap().payload, json!(2));
        assert_eq!(b.recv().await.unwrap().payload, json!(1));
        assert_eq!(b.recv().await.unwrap().payload, json!(2));
    }

    #[tokio::test]
    async fn publish_to_topic_with_no_subscribers_is_a_noop() {
        let broker = Broker::new();
        broker.publish("nobody.home", Message::new("evt", json!({}))).await.unwrap();
    }

    // Scenario E6: publish_and_wait returns the exact reply carrying the
    // correlation id, and the response-topic subscription does not linger
    // once the call resolves.
    #[tokio::test]
    async fn publish_and_wait_returns_correlated_reply_and_cleans_up() {
        let broker = Broker::new();
        let mut requests = broker.subscribe("Q").unwrap();

        let responder = {
            let broker = broker.clone();
            tokio::spawn(async move {
                let req = requests.recv().await.expect("request delivered");
                let correlation = req.correlation_id().unwrap().to_string();
                let mut reply = Message::new("reply", json!({"ok": true}));
                reply.meta.insert("correlation_id".into(), correlation.into());
                broker.publish("R", reply).await.unwrap();
            })
        };

        let reply = broker
            .publish_and_wait("Q", "R", Message::new("request", json!({"q": 1})), Duration::from_secs(1))
            .await
            .expect("reply arrives within timeout");

        responder.await.unwrap();
        assert_eq!(reply.payload, json!({"ok": true}));

        // No lingering subscription on the response topic.
        let leftover = broker.publish("R", Message::new("ghost", json!(null))).await;
        assert!(leftover.is_ok());
    }

    #[tokio::test]
    async fn publish_and_wait_times_out_without_a_responder() {
        let broker = Broker::new();
        let result = broker
            .publish_and_wait("Q", "R", Message::new("request", json!({})), Duration::from_millis(20))
            .await;
        assert!(matches!(result, Err(BrokerError::Timeout)));
    }

    #[tokio::test]
    async fn close_unblocks_pending_publish_and_wait_with_broker_closed() {
        let broker = Broker::new();
        let waiter = {
            let broker = broker.clone();
            tokio::spawn(async move {
                broker
                    .publish_and_wait("Q", "R", Message::new("request", json!({})), Duration::from_secs(5))
                    .await
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        broker.close();

        let result = waiter.await.unwrap();
        assert!(matches!(result, Err(BrokerError::BrokerClosed)));
    }

    #[tokio::test]
    async fn publish_after_close_fails_with_broker_closed() {
        let broker = Broker::new();
        broker.close();
        let result = broker.publish("topic.x", Message::new("evt", json!({}))).await;
        assert!(matches!(result, Err(BrokerError::BrokerClosed)));
    }

    #[tokio::test]
    async fn dropping_subscription_unsubscribes() {
        let broker = Broker::new();
        let sub = broker.subscribe("topic.x").unwrap();
        drop(sub);
        // Publishing with zero live subscribers must not hang or error.
        broker.publish("topic.x", Message::new("evt", json!(1))).await.unwrap();
    }
}
