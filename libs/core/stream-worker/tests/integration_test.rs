//! Integration tests against a real Redis instance via testcontainers
//!
//! These exercise the producer/consumer pair the way a domain worker
//! actually drives them: enqueue through `StreamProducer`, read the
//! message back through `StreamConsumer`'s consumer-group API, and
//! acknowledge it.

use redis::aio::ConnectionManager;
use serde::{Deserialize, Serialize};
use stream_worker::{StreamConsumer, StreamJob, StreamProducer, WorkerConfig};
use test_utils::TestRedis;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
struct EchoJob {
    id: String,
    payload: String,
    retry_count: u32,
}

impl StreamJob for EchoJob {
    fn job_id(&self) -> String {
        self.id.clone()
    }

    fn retry_count(&self) -> u32 {
        self.retry_count
    }

    fn with_retry(&self) -> Self {
        Self {
            retry_count: self.retry_count + 1,
            ..self.clone()
        }
    }
}

async fn connection_manager(redis: &TestRedis) -> ConnectionManager {
    redis::Client::open(redis.connection_string())
        .unwrap()
        .get_connection_manager()
        .await
        .unwrap()
}

#[tokio::test]
async fn a_produced_job_is_readable_and_acknowledgeable_through_the_consumer_group() {
    let redis = TestRedis::new().await;
    let config = WorkerConfig::new("jobs:echo", "echo-workers").with_blocking(None);

    let consumer = StreamConsumer::new(connection_manager(&redis).await, config.clone());
    consumer.ensure_consumer_group().await.unwrap();

    let producer = StreamProducer::new(connection_manager(&redis).await, "jobs:echo");
    let job = EchoJob {
        id: "job-1".to_string(),
        payload: "hello".to_string(),
        retry_count: 0,
    };
    producer.send(&job).await.unwrap();

    let messages = consumer.read_new_messages::<EchoJob>().await.unwrap();
    assert_eq!(messages.len(), 1);
    let (message_id, received) = &messages[0];
    assert_eq!(received, &job);

    consumer.ack_message(message_id).await.unwrap();

    // Acknowledged messages no longer show up as pending for this consumer.
    let pending = consumer.read_pending_messages::<EchoJob>().await.unwrap();
    assert!(pending.is_empty());
}

#[tokio::test]
async fn unacknowledged_messages_remain_claimable_as_pending() {
    let redis = TestRedis::new().await;
    let config = WorkerConfig::new("jobs:pending", "pending-workers").with_blocking(None);

    let consumer = StreamConsumer::new(connection_manager(&redis).await, config.clone());
    consumer.ensure_consumer_group().await.unwrap();

    let producer = StreamProducer::new(connection_manager(&redis).await, "jobs:pending");
    let job = EchoJob {
        id: "job-2".to_string(),
        payload: "unacked".to_string(),
        retry_count: 0,
    };
    producer.send(&job).await.unwrap();

    let messages = consumer.read_new_messages::<EchoJob>().await.unwrap();
    assert_eq!(messages.len(), 1);

    // Never acked; it should still show up as pending for this consumer.
    let pending = consumer.read_pending_messages::<EchoJob>().await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].1, job);
}

#[tokio::test]
async fn move_to_dlq_writes_the_job_and_its_failure_reason() {
    let redis = TestRedis::new().await;
    let config = WorkerConfig::new("jobs:dlq-src", "dlq-workers")
        .with_dlq_stream("jobs:dlq-src:dlq")
        .with_blocking(None);

    let consumer = StreamConsumer::new(connection_manager(&redis).await, config.clone());

    let job = EchoJob {
        id: "job-3".to_string(),
        payload: "will fail".to_string(),
        retry_count: 3,
    };
    consumer.move_to_dlq(&job, "exceeded max retries").await.unwrap();

    let dlq_config = WorkerConfig::new(config.dlq_stream_name.clone(), "dlq-workers");
    let dlq_consumer = StreamConsumer::new(connection_manager(&redis).await, dlq_config);
    let info = dlq_consumer.get_stream_info().await.unwrap();
    assert_eq!(info.length, 1, "the DLQ stream should hold the one failed job");
}
