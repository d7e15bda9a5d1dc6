//! In-memory partitioned event bus
//!
//! Each topic is a fixed set of append-only partition logs. Consumer groups
//! keep committed offsets per (group, topic, partition); a subscription starts
//! from its group's committed offsets and keeps its own read positions.
//! There is no rebalancing: two live subscriptions in one group both read
//! every partition, which is still at-least-once.

use crate::{BusError, BusResult, Delivery, EventBus, Subscription};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::{debug, info};

const DEFAULT_PARTITIONS: usize = 4;

#[derive(Debug, Clone)]
struct Record {
    key: String,
    payload: Vec<u8>,
}

struct TopicLog {
    partitions: Vec<Vec<Record>>,
    notify: Arc<Notify>,
}

impl TopicLog {
    fn new(partitions: usize) -> Self {
        Self {
            partitions: vec![Vec::new(); partitions],
            notify: Arc::new(Notify::new()),
        }
    }
}

struct Inner {
    partitions: usize,
    topics: Mutex<HashMap<String, TopicLog>>,
    /// (group, topic, partition) -> next offset to consume
    committed: Mutex<HashMap<(String, String, i32), i64>>,
    closed: AtomicBool,
    unavailable: AtomicBool,
}

#[derive(Clone)]
pub struct InMemoryEventBus {
    inner: Arc<Inner>,
}

impl Default for InMemoryEventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryEventBus {
    pub fn new() -> Self {
        Self::with_partitions(DEFAULT_PARTITIONS)
    }

    pub fn with_partitions(partitions: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                partitions: partitions.max(1),
                topics: Mutex::new(HashMap::new()),
                committed: Mutex::new(HashMap::new()),
                closed: AtomicBool::new(false),
                unavailable: AtomicBool::new(false),
            }),
        }
    }

    /// Stable key -> partition mapping
    pub fn partition_for(&self, key: &str) -> i32 {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        (hasher.finish() % self.inner.partitions as u64) as i32
    }

    /// Simulate a broker outage: publishes fail with `Unavailable` while set.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.inner.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Stop the bus. Pending `next()` calls resolve to `None`.
    pub fn close(&self) {
        self.inner.closed.store(true, Ordering::SeqCst);
        let topics = self.inner.topics.lock();
        for log in topics.values() {
            log.notify.notify_waiters();
        }
        info!("In-memory event bus closed");
    }

    /// Every (key, payload) on `topic`, partition by partition
    pub fn records(&self, topic: &str) -> Vec<(String, Vec<u8>)> {
        let topics = self.inner.topics.lock();
        topics
            .get(topic)
            .map(|log| {
                log.partitions
                    .iter()
                    .flatten()
                    .map(|r| (r.key.clone(), r.payload.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn len(&self, topic: &str) -> usize {
        let topics = self.inner.topics.lock();
        topics
            .get(topic)
            .map(|log| log.partitions.iter().map(Vec::len).sum())
            .unwrap_or(0)
    }

    pub fn committed_offset(&self, group_id: &str, topic: &str, partition: i32) -> Option<i64> {
        self.inner
            .committed
            .lock()
            .get(&(group_id.to_string(), topic.to_string(), partition))
            .copied()
    }

    /// Records on `topic` not yet committed by `group_id`
    pub fn lag(&self, group_id: &str, topic: &str) -> usize {
        let topics = self.inner.topics.lock();
        let committed = self.inner.committed.lock();
        topics
            .get(topic)
            .map(|log| {
                log.partitions
                    .iter()
                    .enumerate()
                    .map(|(p, records)| {
                        let done = committed
                            .get(&(group_id.to_string(), topic.to_string(), p as i32))
                            .copied()
                            .unwrap_or(0) as usize;
                        records.len().saturating_sub(done)
                    })
                    .sum()
            })
            .unwrap_or(0)
    }

    fn topic_notify(&self, topic: &str) -> Arc<Notify> {
        let mut topics = self.inner.topics.lock();
        let log = topics
            .entry(topic.to_string())
            .or_insert_with(|| TopicLog::new(self.inner.partitions));
        Arc::clone(&log.notify)
    }
}

#[async_trait]
impl EventBus for InMemoryEventBus {
    async fn publish(&self, topic: &str, key: &str, payload: &[u8]) -> BusResult<()> {
        if self.inner.closed.load(Ordering::SeqCst) {
            return Err(BusError::Closed);
        }
        if self.inner.unavailable.load(Ordering::SeqCst) {
            return Err(BusError::Unavailable(format!("broker down for topic {topic}")));
        }

        let partition = self.partition_for(key);
        let notify = {
            let mut topics = self.inner.topics.lock();
            let log = topics
                .entry(topic.to_string())
                .or_insert_with(|| TopicLog::new(self.inner.partitions));
            log.partitions[partition as usize].push(Record {
                key: key.to_string(),
                payload: payload.to_vec(),
            });
            Arc::clone(&log.notify)
        };
        notify.notify_waiters();

        debug!(topic = %topic, key = %key, partition, "Record published");
        Ok(())
    }

    async fn subscribe(&self, topic: &str, group_id: &str) -> BusResult<Box<dyn Subscription>> {
        if self.inner.closed.load(Ordering::SeqCst) {
            return Err(BusError::Closed);
        }

        let notify = self.topic_notify(topic);
        let positions = {
            let committed = self.inner.committed.lock();
            (0..self.inner.partitions)
                .map(|p| {
                    committed
                        .get(&(group_id.to_string(), topic.to_string(), p as i32))
                        .copied()
                        .unwrap_or(0)
                })
                .collect()
        };

        info!(topic = %topic, group_id = %group_id, "Subscribed");
        Ok(Box::new(InMemorySubscription {
            bus: self.clone(),
            topic: topic.to_string(),
            group_id: group_id.to_string(),
            positions,
            attempts: HashMap::new(),
            next_partition: 0,
            notify,
        }))
    }
}

struct InMemorySubscription {
    bus: InMemoryEventBus,
    topic: String,
    group_id: String,
    positions: Vec<i64>,
    /// Attempts already made for records handed back with `nack`
    attempts: HashMap<(i32, i64), u32>,
    /// Round-robin start so one busy partition cannot starve the others
    next_partition: usize,
    notify: Arc<Notify>,
}

impl InMemorySubscription {
    fn try_next(&mut self) -> Option<Delivery> {
        let inner = Arc::clone(&self.bus.inner);
        let topics = inner.topics.lock();
        let log = topics.get(&self.topic)?;
        let count = log.partitions.len();

        for i in 0..count {
            let p = (self.next_partition + i) % count;
            let offset = self.positions[p];
            if let Some(record) = log.partitions[p].get(offset as usize) {
                self.positions[p] += 1;
                self.next_partition = (p + 1) % count;
                let previous = self.attempts.get(&(p as i32, offset)).copied().unwrap_or(0);
                return Some(Delivery {
                    topic: self.topic.clone(),
                    partition: p as i32,
                    offset,
                    key: Some(record.key.clone()),
                    payload: record.payload.clone(),
                    attempt: previous + 1,
                });
            }
        }
        None
    }

    fn check(&self, delivery: &Delivery) -> BusResult<usize> {
        if delivery.topic != self.topic {
            return Err(BusError::InvalidDelivery(format!(
                "record from {} on subscription to {}",
                delivery.topic, self.topic
            )));
        }
        let partition = delivery.partition as usize;
        if delivery.partition < 0 || partition >= self.positions.len() {
            return Err(BusError::InvalidDelivery(format!(
                "partition {} out of range",
                delivery.partition
            )));
        }
        Ok(partition)
    }
}

#[async_trait]
impl Subscription for InMemorySubscription {
    fn topic(&self) -> &str {
        &self.topic
    }

    async fn next(&mut self) -> Option<BusResult<Delivery>> {
        loop {
            let notify = Arc::clone(&self.notify);
            let notified = notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(delivery) = self.try_next() {
                return Some(Ok(delivery));
            }
            if self.bus.inner.closed.load(Ordering::SeqCst) {
                return None;
            }
            notified.await;
        }
    }

    async fn commit(&mut self, delivery: &Delivery) -> BusResult<()> {
        self.check(delivery)?;

        let key = (self.group_id.clone(), self.topic.clone(), delivery.partition);
        {
            let mut committed = self.bus.inner.committed.lock();
            let next = committed.entry(key).or_insert(0);
            *next = (*next).max(delivery.offset + 1);
        }
        self.attempts
            .retain(|(p, o), _| !(*p == delivery.partition && *o <= delivery.offset));
        Ok(())
    }

    async fn nack(&mut self, delivery: &Delivery) -> BusResult<()> {
        let partition = self.check(delivery)?;

        self.positions[partition] = self.positions[partition].min(delivery.offset);
        self.attempts
            .insert((delivery.partition, delivery.offset), delivery.attempt);

        debug!(
            topic = %self.topic,
            partition = delivery.partition,
            offset = delivery.offset,
            attempt = delivery.attempt,
            "Record handed back for redelivery"
        );
        Ok(())
    }
}
