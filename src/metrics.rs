use metrics::{register_counter, register_gauge, register_histogram, Counter, Gauge, Histogram};
use std::time::Duration;

/// Metric handles shared by the reader thread and the upload workers.
///
/// Handles are no-ops unless a recorder is installed, so tests and the
/// default binary pay nothing for them.
#[derive(Clone)]
pub struct Metrics {
    pub records_read: Counter,
    pub transactions: Counter,
    pub uploads_succeeded: Counter,
    pub uploads_failed: Counter,
    pub body_read_errors: Counter,
    pub bytes_uploaded: Counter,
    pub upload_duration: Histogram,
    pub queue_depth: Gauge,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            records_read: register_counter!("warc_records_read_total"),
            transactions: register_counter!("warc_transactions_total"),
            uploads_succeeded: register_counter!("warc_uploads_succeeded_total"),
            uploads_failed: register_counter!("warc_uploads_failed_total"),
            body_read_errors: register_counter!("warc_body_read_errors_total"),
            bytes_uploaded: register_counter!("warc_bytes_uploaded_total"),
            upload_duration: register_histogram!("warc_upload_duration_seconds"),
            queue_depth: register_gauge!("warc_queue_depth"),
        }
    }

    pub fn noop() -> Self {
        Self {
            records_read: Counter::noop(),
            transactions: Counter::noop(),
            uploads_succeeded: Counter::noop(),
            uploads_failed: Counter::noop(),
            body_read_errors: Counter::noop(),
            bytes_uploaded: Counter::noop(),
            upload_duration: Histogram::noop(),
            queue_depth: Gauge::noop(),
        }
    }

    pub fn record_upload(&self, duration: Duration, bytes: usize, success: bool) {
        if success {
            self.uploads_succeeded.increment(1);
            self.bytes_uploaded.increment(bytes as u64);
        } else {
            self.uploads_failed.increment(1);
        }

        self.upload_duration.record(duration.as_secs_f64());
    }

    pub fn set_queue_depth(&self, depth: usize) {
        self.queue_depth.set(depth as f64);
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handles_without_recorder() {
        let metrics = Metrics::new();
        metrics.record_upload(Duration::from_millis(5), 1024, true);
        metrics.record_upload(Duration::from_millis(5), 0, false);
        metrics.set_queue_depth(3);

        let noop = Metrics::noop();
        noop.records_read.increment(1);
    }
}
