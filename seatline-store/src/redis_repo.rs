use async_trait::async_trait;
use redis::{AsyncCommands, RedisResult};
use std::sync::Arc;
use tracing::{error, info};

use seatline_core::{dead_letter_queue, Clock, CoreError, CoreResult, DelayedJob, DelayedScheduler};

// Select-and-remove in one server-side step so concurrent pollers never share a member.
const POP_DUE_SCRIPT: &str = r#"
    local due = redis.call("ZRANGEBYSCORE", KEYS[1], "-inf", ARGV[1], "LIMIT", 0, ARGV[2])
    if #due > 0 then
        redis.call("ZREM", KEYS[1], unpack(due))
    end
    return due
"#;

#[derive(Clone)]
pub struct RedisClient {
    client: redis::Client,
}

impl RedisClient {
    pub async fn new(connection_string: &str) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(connection_string)?;
        Ok(Self { client })
    }

    pub async fn ping(&self) -> RedisResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        redis::cmd("PING").query_async::<()>(&mut conn).await
    }

    pub async fn zadd_member(&self, key: &str, member: &str, score: i64) -> RedisResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        conn.zadd(key, member, score).await
    }

    pub async fn pop_due_members(&self, key: &str, max_score: i64, limit: usize) -> RedisResult<Vec<String>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let script = redis::Script::new(POP_DUE_SCRIPT);
        script.key(key).arg(max_score).arg(limit).invoke_async(&mut conn).await
    }

    pub async fn zcard(&self, key: &str) -> RedisResult<u64> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        conn.zcard(key).await
    }
}

/// Sorted set per queue: score = due time in epoch millis, member = job JSON.
pub struct RedisDelayedScheduler {
    redis: RedisClient,
    clock: Arc<dyn Clock>,
}

impl RedisDelayedScheduler {
    pub fn new(redis: RedisClient, clock: Arc<dyn Clock>) -> Self {
        Self { redis, clock }
    }

    fn key(queue: &str) -> String {
        format!("delayed:{}", queue)
    }
}

/// Splits popped members into jobs and the raw members that failed to decode.
fn decode_members(members: Vec<String>) -> (Vec<DelayedJob>, Vec<(String, serde_json::Error)>) {
    let mut jobs = Vec::with_capacity(members.len());
    let mut undecodable = Vec::new();
    for member in members {
        match serde_json::from_str::<DelayedJob>(&member) {
            Ok(job) => jobs.push(job),
            Err(e) => undecodable.push((member, e)),
        }
    }
    (jobs, undecodable)
}

#[async_trait]
impl DelayedScheduler for RedisDelayedScheduler {
    async fn schedule(&self, queue: &str, job: &DelayedJob) -> CoreResult<()> {
        let member = serde_json::to_string(job).map_err(CoreError::internal)?;
        self.redis
            .zadd_member(&Self::key(queue), &member, job.due_at.timestamp_millis())
            .await
            .map_err(CoreError::transient)?;
        info!("Scheduled {:?} job {} on {} for {}", job.job_type, job.id, queue, job.due_at);
        Ok(())
    }

    async fn poll(&self, queue: &str, limit: usize) -> CoreResult<Vec<DelayedJob>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let now = self.clock.now().timestamp_millis();
        let members = self
            .redis
            .pop_due_members(&Self::key(queue), now, limit)
            .await
            .map_err(CoreError::transient)?;

        let (jobs, undecodable) = decode_members(members);
        for (member, e) in undecodable {
            // Already removed from the live queue; park the raw member instead of losing it.
            error!("Undecodable job on {}: {} ({})", queue, member, e);
            let parked = self
                .redis
                .zadd_member(&Self::key(&dead_letter_queue(queue)), &member, now)
                .await;
            if let Err(park_err) = parked {
                error!("Could not dead-letter undecodable job on {}: {} ({})", queue, member, park_err);
            }
        }
        Ok(jobs)
    }

    async fn len(&self, queue: &str) -> CoreResult<u64> {
        self.redis.zcard(&Self::key(queue)).await.map_err(CoreError::transient)
    }
}
