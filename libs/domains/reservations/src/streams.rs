//! Stream definitions for the two logical queues described in §2/§6.

use stream_worker::StreamDef;

pub struct ReservationsStream;

impl StreamDef for ReservationsStream {
    const STREAM_NAME: &'static str = "gpu_reservations";
    const CONSUMER_GROUP: &'static str = "reservation_processor";
    const DLQ_STREAM: &'static str = "gpu_reservations:dlq";
    const MAX_LENGTH: i64 = 100_000;
    const POLL_INTERVAL_MS: u64 = 5_000;
    const BATCH_SIZE: usize = 1;
    const CLAIM_TIMEOUT_MS: u64 = 300_000;
}

pub struct DiskOpsStream;

impl StreamDef for DiskOpsStream {
    const STREAM_NAME: &'static str = "disk_operations";
    const CONSUMER_GROUP: &'static str = "reservation_processor";
    const DLQ_STREAM: &'static str = "disk_operations:dlq";
    const MAX_LENGTH: i64 = 100_000;
    const POLL_INTERVAL_MS: u64 = 5_000;
    const BATCH_SIZE: usize = 1;
    const CLAIM_TIMEOUT_MS: u64 = 300_000;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reservations_stream_names_match_the_documented_defaults() {
        assert_eq!(ReservationsStream::STREAM_NAME, "gpu_reservations");
        assert_eq!(ReservationsStream::CONSUMER_GROUP, "reservation_processor");
    }

    #[test]
    fn disk_ops_stream_names_match_the_documented_defaults() {
        assert_eq!(DiskOpsStream::STREAM_NAME, "disk_operations");
    }
}
