//! Consumer-group loop over the global event stream
//!
//! Each pipeline consumer runs in its own consumer group and receives
//! its own copy of every ledger entry. Within one consumer, processing
//! is strictly sequential: read, process, acknowledge. Failed entries
//! stay in the Pending Entries List and are re-delivered by the drain
//! pass on the next startup; no explicit retry bookkeeping exists.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::streams::{StreamReadOptions, StreamReadReply};
use redis::AsyncCommands;
use tracing::{error, info, warn};

use crate::errors::WorkerResult;

/// One pipeline consumer's message handler
#[async_trait]
pub trait StreamConsumer: Send {
    /// Consumer group this handler belongs to
    fn group_name(&self) -> &str;

    /// Name of this consumer within its group
    fn consumer_name(&self) -> &str;

    /// Process a single stream entry. An error leaves the entry
    /// unacknowledged in the PEL.
    async fn process_entry(
        &mut self,
        entry_id: &str,
        fields: &HashMap<String, String>,
    ) -> WorkerResult<()>;
}

/// Shared cooperative stop signal for all consumer loops
#[derive(Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Runs a [`StreamConsumer`] against the global stream
pub struct ConsumerRunner {
    manager: ConnectionManager,
    stream_key: String,
    batch_size: usize,
    block_timeout_ms: u64,
    stop: StopSignal,
}

impl ConsumerRunner {
    pub fn new(
        manager: ConnectionManager,
        stream_key: String,
        batch_size: usize,
        block_timeout_ms: u64,
        stop: StopSignal,
    ) -> Self {
        Self {
            manager,
            stream_key,
            batch_size,
            block_timeout_ms,
            stop,
        }
    }

    /// Create the consumer group if it does not already exist. The
    /// stream is created alongside it when missing.
    async fn ensure_group(&self, group: &str) -> WorkerResult<()> {
        let mut con = self.manager.clone();
        let created: Result<(), redis::RedisError> = con
            .xgroup_create_mkstream(&self.stream_key, group, "0")
            .await;
        match created {
            Ok(()) => {
                info!(group = group, stream = %self.stream_key, "consumer group created");
                Ok(())
            }
            Err(err) if err.to_string().contains("BUSYGROUP") => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    async fn ack(&self, group: &str, entry_id: &str) -> WorkerResult<()> {
        let mut con = self.manager.clone();
        let _: i64 = redis::cmd("XACK")
            .arg(&self.stream_key)
            .arg(group)
            .arg(entry_id)
            .query_async(&mut con)
            .await?;
        Ok(())
    }

    fn decode_fields(map: &HashMap<String, redis::Value>) -> HashMap<String, String> {
        map.iter()
            .filter_map(|(key, value)| {
                redis::from_redis_value::<String>(value)
                    .ok()
                    .map(|decoded| (key.clone(), decoded))
            })
            .collect()
    }

    async fn read(
        &self,
        group: &str,
        consumer: &str,
        id: &str,
        block_ms: Option<u64>,
    ) -> WorkerResult<Vec<(String, HashMap<String, String>)>> {
        let mut con = self.manager.clone();
        let mut options = StreamReadOptions::default()
            .group(group, consumer)
            .count(self.batch_size);
        if let Some(block_ms) = block_ms {
            options = options.block(block_ms as usize);
        }
        let reply: Option<StreamReadReply> = con
            .xread_options(&[&self.stream_key], &[id], &options)
            .await?;

        let mut entries = Vec::new();
        if let Some(reply) = reply {
            for key in reply.keys {
                for entry in key.ids {
                    entries.push((entry.id.clone(), Self::decode_fields(&entry.map)));
                }
            }
        }
        Ok(entries)
    }

    /// Drain this consumer's Pending Entries List, then tail the
    /// stream until the stop signal fires.
    pub async fn run<H: StreamConsumer>(&self, mut handler: H) -> WorkerResult<()> {
        let group = handler.group_name().to_string();
        let consumer = handler.consumer_name().to_string();

        self.ensure_group(&group).await?;
        info!(group = %group, consumer = %consumer, "consumer started");

        // PEL recovery: re-process everything read but not acknowledged
        // in a prior run. Entries that fail again stay pending.
        let mut attempted: HashSet<String> = HashSet::new();
        while !self.stop.is_stopped() {
            let pending = self.read(&group, &consumer, "0", None).await?;
            let fresh: Vec<_> = pending
                .into_iter()
                .filter(|(id, _)| !attempted.contains(id))
                .collect();
            if fresh.is_empty() {
                break;
            }
            for (entry_id, fields) in fresh {
                attempted.insert(entry_id.clone());
                match handler.process_entry(&entry_id, &fields).await {
                    Ok(()) => self.ack(&group, &entry_id).await?,
                    Err(err) => {
                        error!(
                            entry_id = %entry_id,
                            group = %group,
                            error = %err,
                            "pending entry processing failed"
                        );
                    }
                }
            }
        }
        info!(group = %group, "pending drain completed");

        // Tail new entries
        while !self.stop.is_stopped() {
            let entries = self
                .read(&group, &consumer, ">", Some(self.block_timeout_ms))
                .await?;
            for (entry_id, fields) in entries {
                match handler.process_entry(&entry_id, &fields).await {
                    Ok(()) => self.ack(&group, &entry_id).await?,
                    Err(err) => {
                        // Entry stays in the PEL for redelivery
                        error!(
                            entry_id = %entry_id,
                            group = %group,
                            consumer = %consumer,
                            error = %err,
                            "entry processing failed"
                        );
                    }
                }
                if self.stop.is_stopped() {
                    break;
                }
            }
        }

        info!(group = %group, consumer = %consumer, "consumer stopped");
        Ok(())
    }
}

/// Field lookup that logs once when an expected field is missing
pub(crate) fn field<'a>(
    fields: &'a HashMap<String, String>,
    name: &str,
    entry_id: &str,
) -> Option<&'a str> {
    let value = fields.get(name).map(String::as_str);
    if value.is_none() {
        warn!(entry_id = entry_id, field = name, "stream entry missing field");
    }
    value
}
