//! Subscription consumer.
//!
//! [`BusSubscriber`] runs one background task per (topic, subscription)
//! pair. Each task pulls batches, hands every decoded body to the
//! registered [`MessageHandler`], completes on success and dead-letters on
//! failure. A failed receive is logged and retried after a fixed backoff.
//!
//! `stop()` signals every task, waits for the current receive and batch to
//! finish up to the drain timeout, then aborts whatever is left.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::broker::{BrokerClient, BrokerConnector};
use super::listener::{ReceivedMessage, SubscriptionReceiver};

/// Error returned by a message handler.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Dead-letter reason recorded for every handler or decode failure.
pub const DEAD_LETTER_REASON: &str = "ProcessingFailed";

/// Handles decoded message bodies for one subscription.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, body: Value) -> Result<(), HandlerError>;
}

struct FnHandler<F>(F);

#[async_trait]
impl<F, Fut> MessageHandler for FnHandler<F>
where
    F: Fn(Value) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), HandlerError>> + Send,
{
    async fn handle(&self, body: Value) -> Result<(), HandlerError> {
        (self.0)(body).await
    }
}

/// Wrap an async closure as a [`MessageHandler`].
pub fn handler_fn<F, Fut>(f: F) -> Arc<dyn MessageHandler>
where
    F: Fn(Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
{
    Arc::new(FnHandler(f))
}

/// Topic → (subscription, handler) registrations.
///
/// Registering the same topic twice keeps the last registration.
#[derive(Clone, Default)]
pub struct Subscriptions {
    entries: BTreeMap<String, (String, Arc<dyn MessageHandler>)>,
}

impl Subscriptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `topic` through `subscription`.
    pub fn on(
        mut self,
        topic: impl Into<String>,
        subscription: impl Into<String>,
        handler: Arc<dyn MessageHandler>,
    ) -> Self {
        self.entries
            .insert(topic.into(), (subscription.into(), handler));
        self
    }

    /// Registered topic names, sorted.
    pub fn topics(&self) -> Vec<&str> {
        self.entries.keys().map(|t| t.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Tuning knobs for the consumption loop.
#[derive(Clone, Debug)]
pub struct ConsumerOptions {
    /// Maximum messages pulled per receive call.
    pub batch_size: usize,
    /// Maximum wait for a receive call before it returns an empty batch.
    pub max_wait: Duration,
    /// Sleep after a transport-level receive failure.
    pub receive_backoff: Duration,
    /// How long `stop()` waits for tasks to finish their current batch.
    pub drain_timeout: Duration,
}

impl Default for ConsumerOptions {
    fn default() -> Self {
        Self {
            batch_size: 10,
            max_wait: Duration::from_secs(5),
            receive_backoff: Duration::from_secs(5),
            drain_timeout: Duration::from_secs(30),
        }
    }
}

/// Counters shared by all consumption tasks.
#[derive(Debug, Default)]
struct Counters {
    batches: AtomicUsize,
    completed: AtomicUsize,
    dead_lettered: AtomicUsize,
    receive_failures: AtomicUsize,
}

/// Snapshot of consumption statistics.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ConsumerStats {
    /// Receive calls that returned (possibly empty) batches.
    pub batches: usize,
    /// Messages handled and completed.
    pub completed: usize,
    /// Messages moved to the dead-letter queue.
    pub dead_lettered: usize,
    /// Receive calls that failed at the transport level.
    pub receive_failures: usize,
}

#[derive(Default)]
struct SubscriberState {
    client: Option<Arc<dyn BrokerClient>>,
    tasks: Vec<JoinHandle<()>>,
}

/// Long-running consumer for broker subscriptions.
pub struct BusSubscriber {
    connector: Option<Arc<dyn BrokerConnector>>,
    options: ConsumerOptions,
    state: Mutex<SubscriberState>,
    running: Arc<AtomicBool>,
    shutdown: watch::Sender<bool>,
    counters: Arc<Counters>,
}

impl BusSubscriber {
    /// A subscriber for in-process mode: `start()` delivers nothing.
    pub fn in_process() -> Self {
        Self::build(None, ConsumerOptions::default())
    }

    /// A subscriber that consumes through `connector`.
    pub fn with_broker(connector: Arc<dyn BrokerConnector>, options: ConsumerOptions) -> Self {
        Self::build(Some(connector), options)
    }

    fn build(connector: Option<Arc<dyn BrokerConnector>>, options: ConsumerOptions) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            connector,
            options,
            state: Mutex::new(SubscriberState::default()),
            running: Arc::new(AtomicBool::new(false)),
            shutdown,
            counters: Arc::new(Counters::default()),
        }
    }

    /// Launch one consumption task per registered subscription.
    ///
    /// In in-process mode this only logs. A broker connect failure is logged
    /// and no task is started. Tasks are not joined here; `stop()` joins them.
    pub async fn start(&self, subscriptions: Subscriptions) {
        let Some(connector) = &self.connector else {
            info!("subscriber using in-process bus, no subscriptions started");
            return;
        };

        let mut state = self.state.lock().await;
        if self.running.load(Ordering::SeqCst) {
            warn!("subscriber already running");
            return;
        }

        let client = match connector.connect().await {
            Ok(client) => client,
            Err(e) => {
                error!(error = %e, "subscriber start failed");
                return;
            }
        };

        self.running.store(true, Ordering::SeqCst);
        self.shutdown.send_replace(false);

        let topics: Vec<String> = subscriptions.topics().into_iter().map(String::from).collect();
        for (topic, (subscription, handler)) in subscriptions.entries {
            let task = ConsumerTask {
                client: Arc::clone(&client),
                topic,
                subscription,
                handler,
                options: self.options.clone(),
                running: Arc::clone(&self.running),
                shutdown: self.shutdown.subscribe(),
                counters: Arc::clone(&self.counters),
            };
            state.tasks.push(tokio::spawn(task.run()));
        }
        state.client = Some(client);

        info!(topics = ?topics, "subscriber started");
    }

    /// Signal every task to stop, wait for in-flight batches up to the
    /// drain timeout, then release the broker connection. Idempotent.
    pub async fn stop(&self) {
        let mut state = self.state.lock().await;
        self.running.store(false, Ordering::SeqCst);
        self.shutdown.send_replace(true);

        let mut tasks = std::mem::take(&mut state.tasks);
        if !tasks.is_empty() {
            let drained = tokio::time::timeout(self.options.drain_timeout, async {
                for task in tasks.iter_mut() {
                    if let Err(e) = task.await {
                        warn!(error = %e, "consumer task ended abnormally");
                    }
                }
            })
            .await;

            if drained.is_err() {
                warn!(
                    timeout_ms = self.options.drain_timeout.as_millis() as u64,
                    "drain timeout reached, aborting consumer tasks"
                );
                for task in &tasks {
                    task.abort();
                }
            }
        }

        if let Some(client) = state.client.take() {
            if let Err(e) = client.close().await {
                warn!(error = %e, "subscriber broker close failed");
            }
            info!("subscriber stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> ConsumerStats {
        ConsumerStats {
            batches: self.counters.batches.load(Ordering::SeqCst),
            completed: self.counters.completed.load(Ordering::SeqCst),
            dead_lettered: self.counters.dead_lettered.load(Ordering::SeqCst),
            receive_failures: self.counters.receive_failures.load(Ordering::SeqCst),
        }
    }
}

struct ConsumerTask {
    client: Arc<dyn BrokerClient>,
    topic: String,
    subscription: String,
    handler: Arc<dyn MessageHandler>,
    options: ConsumerOptions,
    running: Arc<AtomicBool>,
    shutdown: watch::Receiver<bool>,
    counters: Arc<Counters>,
}

impl ConsumerTask {
    async fn run(mut self) {
        let receiver = match self
            .client
            .subscription_receiver(&self.topic, &self.subscription)
            .await
        {
            Ok(receiver) => receiver,
            Err(e) => {
                error!(
                    topic = %self.topic,
                    subscription = %self.subscription,
                    error = %e,
                    "failed to open subscription receiver"
                );
                return;
            }
        };

        debug!(topic = %self.topic, subscription = %self.subscription, "consumer task started");

        // A receive is never cancelled: messages it pulls are already
        // delivered, so they are processed and settled before checking for
        // shutdown again.
        while self.running.load(Ordering::SeqCst) && !*self.shutdown.borrow() {
            let batch = receiver
                .receive(self.options.batch_size, self.options.max_wait)
                .await;

            match batch {
                Ok(messages) => {
                    self.counters.batches.fetch_add(1, Ordering::SeqCst);
                    for message in messages {
                        self.process(receiver.as_ref(), message).await;
                    }
                }
                Err(e) => {
                    self.counters.receive_failures.fetch_add(1, Ordering::SeqCst);
                    error!(topic = %self.topic, error = %e, "receive failed");
                    tokio::select! {
                        _ = self.shutdown.changed() => break,
                        _ = tokio::time::sleep(self.options.receive_backoff) => {}
                    }
                }
            }
        }

        if let Err(e) = receiver.close().await {
            warn!(topic = %self.topic, error = %e, "receiver close failed");
        }
        debug!(topic = %self.topic, subscription = %self.subscription, "consumer task exited");
    }

    async fn process(&self, receiver: &dyn SubscriptionReceiver, message: ReceivedMessage) {
        let outcome = match serde_json::from_slice::<Value>(&message.message.body) {
            Ok(body) => self.handler.handle(body).await,
            Err(e) => Err(e.into()),
        };

        match outcome {
            Ok(()) => match receiver.complete(&message).await {
                Ok(()) => {
                    self.counters.completed.fetch_add(1, Ordering::SeqCst);
                    debug!(
                        topic = %self.topic,
                        message_id = %message.message.message_id,
                        "message completed"
                    );
                }
                Err(e) => error!(
                    topic = %self.topic,
                    message_id = %message.message.message_id,
                    error = %e,
                    "message completion failed"
                ),
            },
            Err(handler_error) => {
                let description = handler_error.to_string();
                error!(
                    topic = %self.topic,
                    message_id = %message.message.message_id,
                    error = %description,
                    "message processing failed"
                );
                match receiver
                    .dead_letter(&message, DEAD_LETTER_REASON, &description)
                    .await
                {
                    Ok(()) => {
                        self.counters.dead_lettered.fetch_add(1, Ordering::SeqCst);
                    }
                    Err(e) => error!(
                        topic = %self.topic,
                        message_id = %message.message.message_id,
                        error = %e,
                        "dead-lettering failed"
                    ),
                }
            }
        }
    }
}
