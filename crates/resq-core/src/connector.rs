//! Builds a `QueueConnection` from configuration.

use std::sync::Arc;

use tracing::info;

use crate::config::ResqConfig;
use crate::error::Result;
use crate::impls::{InMemoryJobStore, InMemoryScheduler, RedisJobStore, RedisScheduler, TracingEventSink};
use crate::queue::{KeySpace, QueueConnection};

/// Connect to Redis as described by `config`.
pub async fn connect(config: &ResqConfig) -> Result<Arc<QueueConnection>> {
    let store = RedisJobStore::connect(&config.redis_url).await?;
    let keys = KeySpace::new(config.namespace.clone());

    let mut connection = QueueConnection::new(Arc::new(store.clone()))
        .with_default_queue(config.default_queue.clone())
        .with_events(Arc::new(TracingEventSink));
    if config.scheduler {
        connection = connection.with_scheduler(Arc::new(RedisScheduler::new(
            store.connection(),
            keys.delayed_schedule(),
        )));
    }
    info!(
        connection = %config.connection,
        namespace = %config.namespace,
        scheduler = config.scheduler,
        "connected to redis"
    );
    Ok(Arc::new(connection.with_keys(keys)))
}

/// A process-local connection with the same settings, for development.
pub fn in_memory(config: &ResqConfig) -> Arc<QueueConnection> {
    let mut connection = QueueConnection::new(Arc::new(InMemoryJobStore::new()))
        .with_keys(KeySpace::new(config.namespace.clone()))
        .with_default_queue(config.default_queue.clone())
        .with_events(Arc::new(TracingEventSink));
    if config.scheduler {
        connection = connection.with_scheduler(Arc::new(InMemoryScheduler::new()));
    }
    Arc::new(connection)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn in_memory_connection_follows_config() {
        let config = ResqConfig::from_lookup(None, |key| match key {
            "RESQ_NAMESPACE" => Some("app".to_string()),
            "RESQ_DEFAULT_QUEUE" => Some("main".to_string()),
            _ => None,
        });
        let conn = in_memory(&config);

        assert_eq!(conn.keys().namespace(), "app");
        assert_eq!(conn.default_queue(), "main");
        assert!(conn.has_scheduler());

        conn.enqueue("Job", json!({}), Some("main"), false).await.unwrap();
        assert!(conn.reserve(None).await.unwrap().is_some());
    }
}
