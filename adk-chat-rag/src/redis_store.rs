//! Redis backing store for the generation cache.
//!
//! This module is only available when the `redis` feature is enabled.

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::MultiplexedConnection;
use tracing::error;

use crate::cache::KeyValueStore;
use crate::error::{RagError, Result};

const BACKEND: &str = "redis";

/// A [`KeyValueStore`] over a multiplexed Redis connection.
///
/// The connection is cloned per call, so concurrent reads and writes share
/// one socket without locking.
///
/// # Example
///
/// ```rust,ignore
/// use adk_chat_rag::redis_store::RedisKeyValueStore;
///
/// let store = RedisKeyValueStore::connect("redis://127.0.0.1/").await?;
/// let cache = SlotCache::new(Arc::new(store), CacheConfig::default());
/// ```
#[derive(Clone)]
pub struct RedisKeyValueStore {
    connection: MultiplexedConnection,
}

impl RedisKeyValueStore {
    /// Open a connection to the server at `url`.
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url).map_err(store_error)?;
        let connection = client.get_multiplexed_async_connection().await.map_err(store_error)?;
        Ok(Self { connection })
    }

    /// Wrap an existing connection.
    pub fn from_connection(connection: MultiplexedConnection) -> Self {
        Self { connection }
    }
}

fn store_error(e: redis::RedisError) -> RagError {
    error!(backend = BACKEND, error = %e, "redis command failed");
    RagError::Cache { backend: BACKEND.to_string(), message: e.to_string() }
}

#[async_trait]
impl KeyValueStore for RedisKeyValueStore {
    fn backend(&self) -> &str {
        BACKEND
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut connection = self.connection.clone();
        connection.get::<_, Option<String>>(key).await.map_err(store_error)
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut connection = self.connection.clone();
        connection.set::<_, _, ()>(key, value).await.map_err(store_error)
    }
}
