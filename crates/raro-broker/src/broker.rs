// crates/raro-broker/src/broker.rs
// Purpose: Topic-based pub/sub with a synchronous request/reply primitive.
// Architecture: one DashMap<topic, Vec<subscriber>> registry; publish hands
//   each subscriber a clone of the message through a bounded mpsc channel,
//   which is the cooperative backpressure point. A tokio::sync::Notify is
//   fired on close() so blocked publish_and_wait calls unblock promptly.
// Dependencies: tokio, dashmap, uuid

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::{mpsc, Notify};
use uuid::Uuid;

use crate::error::BrokerError;
use crate::message::Message;

type Result<T> = std::result::Result<T, BrokerError>;

const DEFAULT_QUEUE_DEPTH: usize = 64;

struct Subscriber {
    id: Uuid,
    sender: mpsc::Sender<Message>,
}

struct Inner {
    topics: DashMap<String, Vec<Subscriber>>,
    closed: AtomicBool,
    closed_notify: Notify,
}

/// Shared handle every agent holds to publish and subscribe.
#[derive(Clone)]
pub struct Broker {
    inner: Arc<Inner>,
}

impl Default for Broker {
    fn default() -> Self {
        Self::new()
    }
}

impl Broker {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                topics: DashMap::new(),
                closed: AtomicBool::new(false),
                closed_notify: Notify::new(),
            }),
        }
    }

    fn check_open(&self) -> Result<()> {
        if self.inner.closed.load(Ordering::SeqCst) {
            return Err(BrokerError::BrokerClosed);
        }
        Ok(())
    }

    pub fn subscribe(&self, topic: impl Into<String>) -> Result<Subscription> {
        self.subscribe_with_depth(topic, DEFAULT_QUEUE_DEPTH)
    }

    pub fn subscribe_with_depth(&self, topic: impl Into<String>, depth: usize) -> Result<Subscription> {
        self.check_open()?;
        let topic = topic.into();
        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::channel(depth.max(1));
        self.inner
            .topics
            .entry(topic.clone())
            .or_default()
            .push(Subscriber { id, sender: tx });
        Ok(Subscription {
            id,
            topic,
            receiver: rx,
            broker: Arc::clone(&self.inner),
        })
    }

    pub fn unsubscribe(&self, subscription: Subscription) {
        drop(subscription);
    }

    /// Enqueues `message` for every current subscriber of `topic`, in
    /// publish order. Awaits each send, so a full subscriber queue applies
    /// backpressure to the publisher.
    pub async fn publish(&self, topic: &str, message: Message) -> Result<()> {
        self.check_open()?;
        // Snapshot the sender list and release the DashMap shard guard before
        // awaiting sends, so a subscribe() on the same topic from another
        // task can't deadlock against an in-flight publish.
        let senders: Vec<(Uuid, mpsc::Sender<Message>)> = match self.inner.topics.get(topic) {
            Some(subs) => subs.iter().map(|s| (s.id, s.sender.clone())).collect(),
            None => Vec::new(),
        };
        for (id, sender) in senders {
            if sender.send(message.clone()).await.is_err() {
                tracing::debug!(topic, subscriber = %id, "subscriber dropped before delivery");
            }
        }
        Ok(())
    }

    /// Classic ask-pattern: registers a correlation id, publishes the
    /// request, and awaits the first reply carrying it on `response_topic`.
    pub async fn publish_and_wait(
        &self,
        request_topic: &str,
        response_topic: &str,
        mut payload_message: Message,
        timeout: Duration,
    ) -> Result<Message> {
        self.check_open()?;
        let correlation_id = Uuid::new_v4();
        payload_message.set_correlation_id(correlation_id);

        let mut reply_sub = self.subscribe(response_topic)?;
        self.publish(request_topic, payload_message).await?;

        let expected = correlation_id.to_string();
        let deadline = tokio::time::sleep(timeout);
        tokio::pin!(deadline);
        loop {
            tokio::select! {
                _ = &mut deadline => return Err(BrokerError::Timeout),
                _ = self.inner.closed_notify.notified() => return Err(BrokerError::BrokerClosed),
                maybe_msg = reply_sub.receiver.recv() => {
                    match maybe_msg {
                        None => return Err(BrokerError::BrokerClosed),
                        Some(msg) if msg.correlation_id() == Some(expected.as_str()) => {
                            return Ok(msg);
                        }
                        Some(_) => continue,
                    }
                }
            }
        }
    }

    /// Delivers a terminal signal to every subscription and unblocks every
    /// pending `publish_and_wait`.
    pub fn close(&self) {
        self.inner.closed.store(true, Ordering::SeqCst);
        self.inner.topics.clear();
        self.inner.closed_notify.notify_waiters();
        tracing::info!("broker closed");
    }
}

/// A per-subscription handle; dropping it unsubscribes.
pub struct Subscription {
    id: Uuid,
    topic: String,
    receiver: mpsc::Receiver<Message>,
    broker: Arc<Inner>,
}

impl Subscription {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Awaits the next message; `None` once the broker has closed.
    pub async fn recv(&mut self) -> Option<Message> {
        self.receiver.recv().await
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(mut subs) = self.broker.topics.get_mut(&self.topic) {
            subs.retain(|s| s.id != self.id);
        }
    }
}
