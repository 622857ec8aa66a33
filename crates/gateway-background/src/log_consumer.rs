use std::sync::Arc;

use gateway_storage::Storage;

const BATCH_SIZE: usize = 25;

/// Drains one batch of locally-queued structured log records into the
/// process's tracing subscriber. A delete failure leaves the batch in
/// the queue for the next tick instead of losing it.
pub async fn drain_log_batch<S: Storage>(storage: &Arc<S>) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let batch = storage.pop_log_batch(BATCH_SIZE).await?;
    if batch.is_empty() {
        return Ok(());
    }

    for row in &batch {
        tracing::info!(payload = %row.payload, "log_queue entry");
    }

    let ids: Vec<i64> = batch.iter().map(|row| row.id).collect();
    storage.delete_logs(&ids).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use gateway_storage::SeaOrmStorage;

    #[tokio::test]
    async fn drains_a_batch_and_removes_it_from_the_queue() {
        let storage = Arc::new(SeaOrmStorage::connect("sqlite::memory:").await.unwrap());
        storage.sync().await.unwrap();
        storage.enqueue_log(serde_json::json!({"event": "test"})).await.unwrap();

        drain_log_batch(&storage).await.unwrap();

        assert!(storage.pop_log_batch(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn empty_queue_is_a_no_op() {
        let storage = Arc::new(SeaOrmStorage::connect("sqlite::memory:").await.unwrap());
        storage.sync().await.unwrap();
        drain_log_batch(&storage).await.unwrap();
    }
}
