use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::MultiplexedConnection;
use tracing::warn;

use super::JobQueue;
use crate::common::error::InfrastructureError;
use crate::infrastructure::redis::client::RedisService;

// `BRPOP` treats 0 as "block forever", which would hide a stop request.
const MIN_POLL_TIMEOUT: Duration = Duration::from_secs(1);

/// Consumes a Redis list with `BRPOP`.
pub struct RedisJobQueue {
    redis: RedisService,
    queue_name: String,
    poll_timeout: Duration,
    conn: Option<MultiplexedConnection>,
}

impl RedisJobQueue {
    pub fn new(redis: RedisService, queue_name: &str, poll_timeout: Duration) -> Self {
        Self {
            redis,
            queue_name: queue_name.to_string(),
            poll_timeout: poll_timeout.max(MIN_POLL_TIMEOUT),
            conn: None,
        }
    }

    pub fn queue_name(&self) -> &str {
        &self.queue_name
    }
}

#[async_trait]
impl JobQueue for RedisJobQueue {
    async fn pop(&mut self) -> Result<Option<Vec<u8>>, InfrastructureError> {
        let mut conn = match self.conn.take() {
            Some(conn) => conn,
            None => self.redis.get_conn().await?,
        };

        let popped: Result<Option<(String, Vec<u8>)>, redis::RedisError> = conn
            .brpop(&self.queue_name, self.poll_timeout.as_secs_f64())
            .await;

        match popped {
            Ok(item) => {
                self.conn = Some(conn);
                Ok(item.map(|(_, payload)| payload))
            }
            Err(e) => {
                // Leave the slot empty so the next pop opens a fresh connection.
                warn!("Dropping Redis connection after error: {}", e);
                Err(e.into())
            }
        }
    }
}
