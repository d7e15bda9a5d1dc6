//! Kafka-backed event bus
//!
//! Producer uses `acks=all` with the record key as the partition key.
//! Consumers run with auto-commit disabled; `commit` stores `offset + 1` for
//! the record's partition and `nack` seeks the partition back to the record.

use crate::{BusError, BusResult, Delivery, EventBus, Subscription};
use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::error::KafkaError;
use rdkafka::message::Message;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::{Offset, TopicPartitionList};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info, warn};

const SEND_TIMEOUT: Duration = Duration::from_secs(5);
const SEEK_TIMEOUT: Duration = Duration::from_secs(5);

fn unavailable(err: KafkaError) -> BusError {
    BusError::Unavailable(err.to_string())
}

pub struct KafkaEventBus {
    brokers: String,
    producer: FutureProducer,
}

impl KafkaEventBus {
    pub fn new(brokers: &str) -> BusResult<Self> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("message.timeout.ms", "5000")
            .set("acks", "all")
            .set("enable.idempotence", "true")
            .create()
            .map_err(unavailable)?;

        info!(brokers = %brokers, "Kafka producer created");
        Ok(Self {
            brokers: brokers.to_string(),
            producer,
        })
    }
}

#[async_trait]
impl EventBus for KafkaEventBus {
    async fn publish(&self, topic: &str, key: &str, payload: &[u8]) -> BusResult<()> {
        let record = FutureRecord::to(topic).key(key).payload(payload);

        match self.producer.send(record, SEND_TIMEOUT).await {
            Ok((partition, offset)) => {
                debug!(topic = %topic, key = %key, partition, offset, "Record published");
                Ok(())
            }
            Err((err, _)) => {
                warn!(topic = %topic, key = %key, error = %err, "Publish failed");
                Err(unavailable(err))
            }
        }
    }

    async fn subscribe(&self, topic: &str, group_id: &str) -> BusResult<Box<dyn Subscription>> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", &self.brokers)
            .set("group.id", group_id)
            .set("auto.offset.reset", "earliest")
            .set("enable.auto.commit", "false")
            .set("session.timeout.ms", "30000")
            .set("heartbeat.interval.ms", "10000")
            .create()
            .map_err(unavailable)?;

        consumer.subscribe(&[topic]).map_err(unavailable)?;

        info!(topic = %topic, group_id = %group_id, "Kafka consumer subscribed");
        Ok(Box::new(KafkaSubscription {
            topic: topic.to_string(),
            consumer,
            attempts: HashMap::new(),
        }))
    }
}

struct KafkaSubscription {
    topic: String,
    consumer: StreamConsumer,
    attempts: HashMap<(i32, i64), u32>,
}

#[async_trait]
impl Subscription for KafkaSubscription {
    fn topic(&self) -> &str {
        &self.topic
    }

    async fn next(&mut self) -> Option<BusResult<Delivery>> {
        let delivery = match self.consumer.recv().await {
            Ok(msg) => Delivery {
                topic: msg.topic().to_string(),
                partition: msg.partition(),
                offset: msg.offset(),
                key: msg.key().map(|k| String::from_utf8_lossy(k).into_owned()),
                payload: msg.payload().map(<[u8]>::to_vec).unwrap_or_default(),
                attempt: 1,
            },
            Err(err) => return Some(Err(unavailable(err))),
        };

        let previous = self
            .attempts
            .get(&(delivery.partition, delivery.offset))
            .copied()
            .unwrap_or(0);
        Some(Ok(Delivery {
            attempt: previous + 1,
            ..delivery
        }))
    }

    async fn commit(&mut self, delivery: &Delivery) -> BusResult<()> {
        let mut tpl = TopicPartitionList::new();
        tpl.add_partition_offset(
            &delivery.topic,
            delivery.partition,
            Offset::Offset(delivery.offset + 1),
        )
        .map_err(|e| BusError::InvalidDelivery(e.to_string()))?;

        self.consumer
            .commit(&tpl, CommitMode::Async)
            .map_err(unavailable)?;

        self.attempts
            .retain(|(p, o), _| !(*p == delivery.partition && *o <= delivery.offset));
        Ok(())
    }

    async fn nack(&mut self, delivery: &Delivery) -> BusResult<()> {
        self.consumer
            .seek(
                &delivery.topic,
                delivery.partition,
                Offset::Offset(delivery.offset),
                SEEK_TIMEOUT,
            )
            .map_err(unavailable)?;

        self.attempts
            .insert((delivery.partition, delivery.offset), delivery.attempt);
        Ok(())
    }
}
