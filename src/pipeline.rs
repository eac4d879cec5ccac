//! Producer/worker wiring between the archive and the object store.
//!
//! The reconstructor runs on a blocking thread and feeds a bounded queue;
//! `concurrency` upload workers share the receiving end. A full queue
//! suspends the reader, which keeps memory bounded when uploads lag behind
//! parsing. Dropping the only sender closes the queue, and the run returns
//! once every worker has drained it.

use crate::archive::{open_archive, RecordSource};
use crate::publisher::{PublishTask, PublishWorker, WorkerStats};
use crate::reconstructor::{Reconstructor, StreamEnd};
use crate::{Config, Metrics, ObjectSink, ObjectStoreSink, PublishError};
use futures::future::join_all;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::{error, info};

pub struct Pipeline {
    config: Config,
    sink: Arc<dyn ObjectSink>,
    metrics: Metrics,
}

impl Pipeline {
    pub fn new(config: Config, sink: Arc<dyn ObjectSink>) -> Self {
        Self {
            config,
            sink,
            metrics: Metrics::noop(),
        }
    }

    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = metrics;
        self
    }

    /// Publish every transaction in `source`, returning once all workers finish.
    ///
    /// Per-item failures are counted in the stats, not returned. An error here
    /// means the reader thread itself died.
    pub async fn run<S>(&self, source: S) -> Result<PipelineStats, PublishError>
    where
        S: RecordSource + 'static,
    {
        let concurrency = self.config.concurrency.max(1);
        let bucket: Arc<str> = Arc::from(self.config.bucket_name());
        let (sender, receiver) = mpsc::channel::<PublishTask>(self.config.queue_capacity.max(1));
        let shared_receiver = Arc::new(Mutex::new(receiver));

        info!(
            "Publishing to bucket {} with {} workers (queue capacity {})",
            bucket, concurrency, self.config.queue_capacity
        );

        let workers: Vec<PublishWorker> = (0..concurrency)
            .map(|id| {
                PublishWorker::new(
                    id,
                    self.sink.clone(),
                    self.config.add_banner,
                    self.metrics.clone(),
                )
            })
            .collect();

        let handles: Vec<_> = workers
            .iter()
            .map(|worker| {
                let worker = worker.clone();
                let rx = shared_receiver.clone();
                tokio::spawn(async move {
                    worker.run_with_shared_receiver(rx).await;
                })
            })
            .collect();
        drop(shared_receiver);

        let metrics = self.metrics.clone();
        let producer =
            tokio::task::spawn_blocking(move || produce(source, sender, bucket, metrics)).await;

        for result in join_all(handles).await {
            if let Err(e) = result {
                error!("Publish worker exited abnormally: {}", e);
            }
        }

        let production = producer?;
        let worker_stats: Vec<WorkerStats> = workers.iter().map(|w| w.get_stats()).collect();

        Ok(PipelineStats {
            records_read: production.records_read,
            transactions: production.transactions,
            uploaded: worker_stats.iter().map(|w| w.uploaded_count).sum(),
            failed: worker_stats.iter().map(|w| w.failed_count).sum(),
            body_read_errors: worker_stats.iter().map(|w| w.body_error_count).sum(),
            stream_end: production.stream_end,
            worker_stats,
        })
    }
}

struct Production {
    records_read: u64,
    transactions: u64,
    stream_end: Option<StreamEnd>,
}

fn produce<S: RecordSource>(
    source: S,
    sender: mpsc::Sender<PublishTask>,
    bucket: Arc<str>,
    metrics: Metrics,
) -> Production {
    let mut reconstructor = Reconstructor::new(source).with_metrics(metrics.clone());
    let mut transactions = 0;

    for transaction in reconstructor.by_ref() {
        let task = PublishTask::from_transaction(transactions, bucket.clone(), transaction);
        if sender.blocking_send(task).is_err() {
            error!("Upload queue closed before the archive was fully read");
            break;
        }
        transactions += 1;
        metrics.set_queue_depth(sender.max_capacity() - sender.capacity());
    }

    // Closes the queue; workers exit once it is drained.
    drop(sender);

    Production {
        records_read: reconstructor.records_read(),
        transactions,
        stream_end: reconstructor.into_outcome(),
    }
}

/// Open the configured archive and publish it to the configured S3 bucket.
pub async fn publish_archive(config: Config) -> Result<PipelineStats, PublishError> {
    config.validate()?;

    let input = config.input.clone().unwrap_or_default();
    let source = open_archive(&input)?;
    info!("Reading archive {}", input.display());

    let sink = Arc::new(ObjectStoreSink::s3(config.storage.clone()));
    Pipeline::new(config, sink)
        .with_metrics(Metrics::new())
        .run(source)
        .await
}

/// Statistics from a pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineStats {
    pub records_read: u64,
    pub transactions: u64,
    pub uploaded: usize,
    pub failed: usize,
    pub body_read_errors: usize,
    pub stream_end: Option<StreamEnd>,
    pub worker_stats: Vec<WorkerStats>,
}

impl std::fmt::Display for PipelineStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Records: {}, Transactions: {}, Uploaded: {}, Failed: {}, Body read errors: {}",
            self.records_read, self.transactions, self.uploaded, self.failed, self.body_read_errors
        )
    }
}
