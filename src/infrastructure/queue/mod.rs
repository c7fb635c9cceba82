pub mod redis_list;

use async_trait::async_trait;

use crate::common::error::InfrastructureError;

/// Source of raw job payloads.
#[async_trait]
pub trait JobQueue: Send {
    /// Blocks until a payload is available or the poll window elapses.
    /// `Ok(None)` means the window elapsed with nothing to do. Popping
    /// removes the payload; there is no acknowledgement.
    async fn pop(&mut self) -> Result<Option<Vec<u8>>, InfrastructureError>;
}
