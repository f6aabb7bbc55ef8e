//! In-memory broker for tests and single-process runs.
//!
//! [`InMemoryBroker`] implements the same [`BrokerConnector`] /
//! [`BrokerClient`] traits as a real broker, so the publisher and the
//! subscriber run unchanged against it:
//! - topics fan out to every subscription opened on them
//! - receivers pull from their own subscription queue
//! - completions and dead-letters are recorded for inspection
//! - send, receive and connect failures can be injected

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;
use tokio::time::Instant;

use super::broker::{BrokerClient, BrokerConnector};
use super::error::BusError;
use super::listener::{ReceivedMessage, SubscriptionReceiver};
use super::sender::{Message, TopicSender};

/// A message moved to a subscription's dead-letter queue.
#[derive(Clone, Debug, PartialEq)]
pub struct DeadLetter {
    pub message: Message,
    pub reason: String,
    pub description: String,
}

#[derive(Default)]
struct SubscriptionQueue {
    pending: VecDeque<ReceivedMessage>,
    in_flight: HashMap<String, ReceivedMessage>,
    completed: Vec<String>,
    dead_letters: Vec<DeadLetter>,
}

#[derive(Default)]
struct BrokerState {
    /// Every message sent, per topic.
    sent: HashMap<String, Vec<Message>>,
    /// Subscription queues keyed by (topic, subscription).
    subscriptions: HashMap<(String, String), SubscriptionQueue>,
}

struct Inner {
    state: Mutex<BrokerState>,
    notify: Notify,
    sequence: AtomicU64,
    fail_connect: AtomicBool,
    fail_sends: AtomicBool,
    failing_receives: AtomicUsize,
    closed: AtomicBool,
}

/// Thread-safe in-memory broker. Clones share the same state.
#[derive(Clone)]
pub struct InMemoryBroker {
    inner: Arc<Inner>,
}

impl Default for InMemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(BrokerState::default()),
                notify: Notify::new(),
                sequence: AtomicU64::new(1),
                fail_connect: AtomicBool::new(false),
                fail_sends: AtomicBool::new(false),
                failing_receives: AtomicUsize::new(0),
                closed: AtomicBool::new(false),
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, BrokerState> {
        // A panic while holding the lock leaves plain data behind; keep going.
        self.inner
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Make every subsequent `connect()` fail.
    pub fn fail_connect(&self, fail: bool) {
        self.inner.fail_connect.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent send fail.
    pub fn fail_sends(&self, fail: bool) {
        self.inner.fail_sends.store(fail, Ordering::SeqCst);
    }

    /// Make the next `count` receive calls fail.
    pub fn fail_next_receives(&self, count: usize) {
        self.inner.failing_receives.store(count, Ordering::SeqCst);
    }

    /// All messages sent to `topic`, in order.
    pub fn sent(&self, topic: &str) -> Vec<Message> {
        self.state().sent.get(topic).cloned().unwrap_or_default()
    }

    /// Message ids completed on a subscription, in order.
    pub fn completed(&self, topic: &str, subscription: &str) -> Vec<String> {
        self.with_queue(topic, subscription, |q| q.completed.clone())
            .unwrap_or_default()
    }

    /// Dead-lettered messages on a subscription, in order.
    pub fn dead_letters(&self, topic: &str, subscription: &str) -> Vec<DeadLetter> {
        self.with_queue(topic, subscription, |q| q.dead_letters.clone())
            .unwrap_or_default()
    }

    /// Messages received but not yet settled.
    pub fn in_flight(&self, topic: &str, subscription: &str) -> usize {
        self.with_queue(topic, subscription, |q| q.in_flight.len())
            .unwrap_or_default()
    }

    pub fn has_subscription(&self, topic: &str, subscription: &str) -> bool {
        self.with_queue(topic, subscription, |_| ()).is_some()
    }

    /// Wait until a receiver has been opened for the subscription.
    pub async fn wait_for_subscription(&self, topic: &str, subscription: &str) {
        while !self.has_subscription(topic, subscription) {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    /// Whether `close()` has been called on the connection.
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    fn with_queue<T>(
        &self,
        topic: &str,
        subscription: &str,
        f: impl FnOnce(&SubscriptionQueue) -> T,
    ) -> Option<T> {
        let state = self.state();
        state
            .subscriptions
            .get(&(topic.to_string(), subscription.to_string()))
            .map(f)
    }

    fn deliver(&self, topic: &str, message: Message) {
        let mut state = self.state();
        for ((t, _), queue) in state.subscriptions.iter_mut() {
            if t == topic {
                let delivery_id = self.inner.sequence.fetch_add(1, Ordering::SeqCst);
                queue.pending.push_back(ReceivedMessage {
                    delivery_id: delivery_id.to_string(),
                    message: message.clone(),
                });
            }
        }
        state
            .sent
            .entry(topic.to_string())
            .or_default()
            .push(message);
        drop(state);
        self.inner.notify.notify_waiters();
    }
}

#[async_trait]
impl BrokerConnector for InMemoryBroker {
    async fn connect(&self) -> Result<Arc<dyn BrokerClient>, BusError> {
        if self.inner.fail_connect.load(Ordering::SeqCst) {
            return Err(BusError::ConnectionFailed("in-memory broker unavailable".into()));
        }
        self.inner.closed.store(false, Ordering::SeqCst);
        Ok(Arc::new(self.clone()))
    }
}

#[async_trait]
impl BrokerClient for InMemoryBroker {
    async fn topic_sender(&self, topic: &str) -> Result<Box<dyn TopicSender>, BusError> {
        Ok(Box::new(InMemorySender {
            broker: self.clone(),
            topic: topic.to_string(),
        }))
    }

    async fn subscription_receiver(
        &self,
        topic: &str,
        subscription: &str,
    ) -> Result<Box<dyn SubscriptionReceiver>, BusError> {
        self.state()
            .subscriptions
            .entry((topic.to_string(), subscription.to_string()))
            .or_default();
        Ok(Box::new(InMemoryReceiver {
            broker: self.clone(),
            key: (topic.to_string(), subscription.to_string()),
        }))
    }

    async fn close(&self) -> Result<(), BusError> {
        self.inner.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

struct InMemorySender {
    broker: InMemoryBroker,
    topic: String,
}

#[async_trait]
impl TopicSender for InMemorySender {
    async fn send(&self, message: Message) -> Result<(), BusError> {
        if self.broker.inner.fail_sends.load(Ordering::SeqCst) {
            return Err(BusError::SendFailed(format!(
                "in-memory send to {} rejected",
                self.topic
            )));
        }
        self.broker.deliver(&self.topic, message);
        Ok(())
    }
}

struct InMemoryReceiver {
    broker: InMemoryBroker,
    key: (String, String),
}

impl InMemoryReceiver {
    fn take_batch(&self, max_messages: usize) -> Vec<ReceivedMessage> {
        let mut state = self.broker.state();
        let Some(queue) = state.subscriptions.get_mut(&self.key) else {
            return Vec::new();
        };
        let count = max_messages.min(queue.pending.len());
        let batch: Vec<ReceivedMessage> = queue.pending.drain(..count).collect();
        for message in &batch {
            queue
                .in_flight
                .insert(message.delivery_id.clone(), message.clone());
        }
        batch
    }

    fn settle(
        &self,
        message: &ReceivedMessage,
        f: impl FnOnce(&mut SubscriptionQueue, ReceivedMessage),
    ) -> Result<(), BusError> {
        let mut state = self.broker.state();
        let queue = state
            .subscriptions
            .get_mut(&self.key)
            .ok_or_else(|| BusError::SettleFailed("unknown subscription".into()))?;
        let settled = queue.in_flight.remove(&message.delivery_id).ok_or_else(|| {
            BusError::SettleFailed(format!("message {} is not in flight", message.delivery_id))
        })?;
        f(queue, settled);
        Ok(())
    }
}

#[async_trait]
impl SubscriptionReceiver for InMemoryReceiver {
    async fn receive(
        &self,
        max_messages: usize,
        max_wait: Duration,
    ) -> Result<Vec<ReceivedMessage>, BusError> {
        let failing = &self.broker.inner.failing_receives;
        if failing
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(BusError::ReceiveFailed("in-memory receive failure".into()));
        }

        let deadline = Instant::now() + max_wait;
        loop {
            let notified = self.broker.inner.notify.notified();
            let batch = self.take_batch(max_messages);
            if !batch.is_empty() {
                return Ok(batch);
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return Ok(Vec::new());
            }
        }
    }

    async fn complete(&self, message: &ReceivedMessage) -> Result<(), BusError> {
        self.settle(message, |queue, settled| {
            queue.completed.push(settled.message.message_id)
        })
    }

    async fn dead_letter(
        &self,
        message: &ReceivedMessage,
        reason: &str,
        description: &str,
    ) -> Result<(), BusError> {
        self.settle(message, |queue, settled| {
            queue.dead_letters.push(DeadLetter {
                message: settled.message,
                reason: reason.to_string(),
                description: description.to_string(),
            })
        })
    }
}
