use redis::{Client, aio::MultiplexedConnection};
use tracing::info;

#[derive(Clone)]
pub struct RedisService {
    client: Client,
}

impl RedisService {
    /// Only validates the URL. Connections are opened on demand so an
    /// unreachable broker at startup is handled like any later outage.
    pub fn new(connection_string: &str) -> Result<Self, redis::RedisError> {
        let client = Client::open(connection_string)?;
        Ok(Self { client })
    }

    pub async fn get_conn(&self) -> Result<MultiplexedConnection, redis::RedisError> {
        let conn = self.client.get_multiplexed_async_connection().await?;
        info!("Connected to Redis");
        Ok(conn)
    }
}
