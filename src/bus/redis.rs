//! Redis Streams broker transport.
//!
//! Topics map to streams, subscriptions to consumer groups:
//! - send: `XADD <topic>` with the message metadata as stream fields
//! - receive: `XAUTOCLAIM` entries another (or a previous) consumer left
//!   pending for longer than the claim threshold, otherwise
//!   `XREADGROUP GROUP <subscription> <consumer> ... STREAMS <topic> >`
//! - complete: `XACK`
//! - dead-letter: `XADD <topic>:<subscription>:dlq` then `XACK`

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use deadpool_redis::redis::streams::{StreamId, StreamReadOptions, StreamReadReply};
use deadpool_redis::redis::{cmd, from_redis_value, AsyncCommands, Value as RedisValue};
use deadpool_redis::{Config, Pool, Runtime};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::broker::{BrokerClient, BrokerConnector};
use super::error::BusError;
use super::listener::{ReceivedMessage, SubscriptionReceiver};
use super::sender::{Message, TopicSender, JSON_CONTENT_TYPE};

/// Approximate cap on stream length; older entries are trimmed.
const STREAM_MAX_LEN: usize = 100_000;

/// Default idle time after which a pending delivery is reclaimed.
pub const DEFAULT_CLAIM_IDLE: Duration = Duration::from_secs(30);

/// Dead-letter stream name for a subscription.
pub fn dead_letter_stream(topic: &str, subscription: &str) -> String {
    format!("{topic}:{subscription}:dlq")
}

/// Connects to Redis from a `redis://` URL.
pub struct RedisConnector {
    url: String,
    consumer_name: String,
    claim_idle: Duration,
}

impl RedisConnector {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            consumer_name: format!("prescriptions-{}", Uuid::new_v4()),
            claim_idle: DEFAULT_CLAIM_IDLE,
        }
    }

    /// Override the consumer name used inside consumer groups.
    pub fn with_consumer_name(mut self, name: impl Into<String>) -> Self {
        self.consumer_name = name.into();
        self
    }

    /// Idle time after which pending deliveries are reclaimed.
    pub fn with_claim_idle(mut self, claim_idle: Duration) -> Self {
        self.claim_idle = claim_idle;
        self
    }

    pub fn consumer_name(&self) -> &str {
        &self.consumer_name
    }
}

#[async_trait]
impl BrokerConnector for RedisConnector {
    async fn connect(&self) -> Result<Arc<dyn BrokerClient>, BusError> {
        if self.url.is_empty() {
            return Err(BusError::ConnectionFailed(
                "broker connection string is empty".into(),
            ));
        }

        let pool = Config::from_url(self.url.as_str())
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| BusError::ConnectionFailed(e.to_string()))?;

        let mut conn = pool
            .get()
            .await
            .map_err(|e| BusError::ConnectionFailed(e.to_string()))?;
        let _: String = cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| BusError::ConnectionFailed(e.to_string()))?;

        info!(consumer = %self.consumer_name, "connected to redis broker");
        Ok(Arc::new(RedisBroker {
            pool,
            consumer_name: self.consumer_name.clone(),
            claim_idle: self.claim_idle,
        }))
    }
}

/// A pooled Redis connection shared by senders and receivers.
pub struct RedisBroker {
    pool: Pool,
    consumer_name: String,
    claim_idle: Duration,
}

#[async_trait]
impl BrokerClient for RedisBroker {
    async fn topic_sender(&self, topic: &str) -> Result<Box<dyn TopicSender>, BusError> {
        Ok(Box::new(RedisTopicSender {
            pool: self.pool.clone(),
            topic: topic.to_string(),
        }))
    }

    async fn subscription_receiver(
        &self,
        topic: &str,
        subscription: &str,
    ) -> Result<Box<dyn SubscriptionReceiver>, BusError> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| BusError::ConnectionFailed(e.to_string()))?;

        let created: Result<(), _> = cmd("XGROUP")
            .arg("CREATE")
            .arg(topic)
            .arg(subscription)
            .arg("$")
            .arg("MKSTREAM")
            .query_async(&mut conn)
            .await;

        match created {
            Ok(()) => info!(topic = %topic, subscription = %subscription, "created consumer group"),
            Err(e) if e.to_string().contains("BUSYGROUP") => {
                debug!(topic = %topic, subscription = %subscription, "consumer group already exists")
            }
            Err(e) => return Err(BusError::ConnectionFailed(e.to_string())),
        }

        Ok(Box::new(RedisSubscriptionReceiver {
            pool: self.pool.clone(),
            topic: topic.to_string(),
            subscription: subscription.to_string(),
            consumer_name: self.consumer_name.clone(),
            claim_idle: self.claim_idle,
        }))
    }

    async fn close(&self) -> Result<(), BusError> {
        self.pool.close();
        Ok(())
    }
}

struct RedisTopicSender {
    pool: Pool,
    topic: String,
}

#[async_trait]
impl TopicSender for RedisTopicSender {
    async fn send(&self, message: Message) -> Result<(), BusError> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| BusError::SendFailed(e.to_string()))?;

        let _: String = cmd("XADD")
            .arg(&self.topic)
            .arg("MAXLEN")
            .arg("~")
            .arg(STREAM_MAX_LEN)
            .arg("*")
            .arg("body")
            .arg(message.body.as_slice())
            .arg("content_type")
            .arg(&message.content_type)
            .arg("subject")
            .arg(&message.subject)
            .arg("message_id")
            .arg(&message.message_id)
            .arg("correlation_id")
            .arg(message.correlation_id.as_deref().unwrap_or(""))
            .query_async(&mut conn)
            .await
            .map_err(|e| BusError::SendFailed(e.to_string()))?;
        Ok(())
    }
}

struct RedisSubscriptionReceiver {
    pool: Pool,
    topic: String,
    subscription: String,
    consumer_name: String,
    claim_idle: Duration,
}

impl RedisSubscriptionReceiver {
    /// Take over entries left pending in the group for longer than
    /// `claim_idle`, e.g. by a consumer that stopped or crashed mid-batch.
    ///
    /// Older servers without `XAUTOCLAIM` yield an empty batch.
    async fn claim_idle_entries(
        &self,
        conn: &mut deadpool_redis::Connection,
        max_messages: usize,
    ) -> Vec<ReceivedMessage> {
        let reply: Result<RedisValue, _> = cmd("XAUTOCLAIM")
            .arg(&self.topic)
            .arg(&self.subscription)
            .arg(&self.consumer_name)
            .arg(self.claim_idle.as_millis() as u64)
            .arg("0-0")
            .arg("COUNT")
            .arg(max_messages)
            .query_async(conn)
            .await;

        let entries = match reply {
            Ok(reply) => parse_autoclaim_reply(&reply),
            Err(e) => {
                debug!(topic = %self.topic, error = %e, "XAUTOCLAIM failed, skipping pending recovery");
                return Vec::new();
            }
        };
        if !entries.is_empty() {
            info!(
                topic = %self.topic,
                subscription = %self.subscription,
                count = entries.len(),
                "claimed idle pending messages"
            );
        }
        entries
            .iter()
            .map(|entry| received(&self.topic, entry))
            .collect()
    }
}

#[async_trait]
impl SubscriptionReceiver for RedisSubscriptionReceiver {
    async fn receive(
        &self,
        max_messages: usize,
        max_wait: Duration,
    ) -> Result<Vec<ReceivedMessage>, BusError> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| BusError::ReceiveFailed(e.to_string()))?;

        let claimed = self.claim_idle_entries(&mut conn, max_messages).await;
        if !claimed.is_empty() {
            return Ok(claimed);
        }

        let opts = StreamReadOptions::default()
            .group(&self.subscription, &self.consumer_name)
            .count(max_messages)
            .block(block_millis(max_wait));

        let reply: Option<StreamReadReply> = conn
            .xread_options(&[&self.topic], &[">"], &opts)
            .await
            .map_err(|e| BusError::ReceiveFailed(e.to_string()))?;

        let Some(reply) = reply else {
            return Ok(Vec::new());
        };

        Ok(reply
            .keys
            .iter()
            .flat_map(|key| key.ids.iter())
            .map(|entry| received(&self.topic, entry))
            .collect())
    }

    async fn complete(&self, message: &ReceivedMessage) -> Result<(), BusError> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| BusError::SettleFailed(e.to_string()))?;
        let _: i64 = conn
            .xack(&self.topic, &self.subscription, &[&message.delivery_id])
            .await
            .map_err(|e| BusError::SettleFailed(e.to_string()))?;
        Ok(())
    }

    async fn dead_letter(
        &self,
        message: &ReceivedMessage,
        reason: &str,
        description: &str,
    ) -> Result<(), BusError> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| BusError::SettleFailed(e.to_string()))?;

        let stream = dead_letter_stream(&self.topic, &self.subscription);
        let _: String = cmd("XADD")
            .arg(&stream)
            .arg("MAXLEN")
            .arg("~")
            .arg(STREAM_MAX_LEN)
            .arg("*")
            .arg("body")
            .arg(message.message.body.as_slice())
            .arg("subject")
            .arg(&message.message.subject)
            .arg("message_id")
            .arg(&message.message.message_id)
            .arg("correlation_id")
            .arg(message.message.correlation_id.as_deref().unwrap_or(""))
            .arg("original_id")
            .arg(&message.delivery_id)
            .arg("dead_letter_reason")
            .arg(reason)
            .arg("dead_letter_error_description")
            .arg(description)
            .query_async(&mut conn)
            .await
            .map_err(|e| BusError::SettleFailed(e.to_string()))?;

        let _: i64 = conn
            .xack(&self.topic, &self.subscription, &[&message.delivery_id])
            .await
            .map_err(|e| BusError::SettleFailed(e.to_string()))?;

        info!(
            topic = %self.topic,
            subscription = %self.subscription,
            dlq = %stream,
            message_id = %message.message.message_id,
            "message moved to dead-letter stream"
        );
        Ok(())
    }
}

/// `BLOCK` milliseconds for a receive; `BLOCK 0` would wait forever.
fn block_millis(max_wait: Duration) -> usize {
    max_wait.as_millis().clamp(1, usize::MAX as u128) as usize
}

/// Wrap a stream entry for settlement. An entry without a body still gets
/// an empty message so the subscriber dead-letters it instead of leaving it
/// pending.
fn received(topic: &str, entry: &StreamId) -> ReceivedMessage {
    let message = parse_entry(entry).unwrap_or_else(|| {
        warn!(topic = %topic, id = %entry.id, "stream entry without body");
        Message::new(entry.id.clone(), "", Vec::new())
    });
    ReceivedMessage {
        delivery_id: entry.id.clone(),
        message,
    }
}

/// Entries from an `XAUTOCLAIM` reply:
/// `[next-cursor, [[id, [field, value, ...]], ...], [deleted-ids]]`.
///
/// Entries deleted from the stream come back with a nil field list and are
/// skipped; the server already dropped them from the pending list.
fn parse_autoclaim_reply(reply: &RedisValue) -> Vec<StreamId> {
    let RedisValue::Array(parts) = reply else {
        return Vec::new();
    };
    let Some(RedisValue::Array(entries)) = parts.get(1) else {
        return Vec::new();
    };

    entries
        .iter()
        .filter_map(|entry| {
            let RedisValue::Array(pair) = entry else {
                return None;
            };
            let id: String = from_redis_value(pair.first()?).ok()?;
            let RedisValue::Array(fields) = pair.get(1)? else {
                return None;
            };
            let map = fields
                .chunks_exact(2)
                .filter_map(|kv| {
                    let key: String = from_redis_value(&kv[0]).ok()?;
                    Some((key, kv[1].clone()))
                })
                .collect();
            Some(StreamId { id, map })
        })
        .collect()
}

fn parse_entry(entry: &StreamId) -> Option<Message> {
    let body: Vec<u8> = field(&entry.map, "body")?;
    let text = |name: &str| -> Option<String> {
        field::<String>(&entry.map, name).filter(|s| !s.is_empty())
    };

    let mut message = Message::new(
        text("message_id").unwrap_or_else(|| entry.id.clone()),
        text("subject").unwrap_or_default(),
        body,
    )
    .with_content_type(text("content_type").unwrap_or_else(|| JSON_CONTENT_TYPE.to_string()));
    message.correlation_id = text("correlation_id");
    Some(message)
}

fn field<T: deadpool_redis::redis::FromRedisValue>(
    map: &HashMap<String, RedisValue>,
    key: &str,
) -> Option<T> {
    map.get(key).and_then(|v| from_redis_value(v).ok())
}
