//! Pairs request and response records into HTTP transactions.

use tracing::{debug, info, warn};

use crate::archive::{RecordKind, RecordSource};
use crate::transaction::{parse_request, parse_response, HttpRequest, HttpTransaction};
use crate::{Metrics, PublishError};

/// Why the transaction sequence ended.
#[derive(Debug, Clone)]
pub enum StreamEnd {
    /// The archive ran out of records
    Exhausted,
    /// The archive reader failed
    ReadFailed(PublishError),
    /// A request or response record could not be parsed, or a response had no request
    ParseFailed(PublishError),
}

impl StreamEnd {
    pub fn is_clean(&self) -> bool {
        matches!(self, StreamEnd::Exhausted)
    }
}

/// Lazy, single-pass sequence of transactions over a record source.
///
/// A request record becomes the pending request; the next response record is
/// parsed against it and emitted together with it. Any parse failure ends the
/// sequence for good.
pub struct Reconstructor<S> {
    source: S,
    pending: Option<HttpRequest>,
    end: Option<StreamEnd>,
    records_read: u64,
    metrics: Option<Metrics>,
}

impl<S: RecordSource> Reconstructor<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            pending: None,
            end: None,
            records_read: 0,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// How the sequence ended, `None` while records remain.
    pub fn outcome(&self) -> Option<&StreamEnd> {
        self.end.as_ref()
    }

    pub fn into_outcome(self) -> Option<StreamEnd> {
        self.end
    }

    pub fn records_read(&self) -> u64 {
        self.records_read
    }

    fn finish(&mut self, end: StreamEnd) {
        match &end {
            StreamEnd::Exhausted => info!("Reached end of archive after {} records", self.records_read),
            StreamEnd::ReadFailed(e) => e.log("Can't read WARC record"),
            StreamEnd::ParseFailed(e) => e.log("Stopping archive read"),
        }
        self.pending = None;
        self.end = Some(end);
    }
}

impl<S: RecordSource> Iterator for Reconstructor<S> {
    type Item = HttpTransaction;

    fn next(&mut self) -> Option<HttpTransaction> {
        if self.end.is_some() {
            return None;
        }

        loop {
            let record = match self.source.next_record() {
                Some(Ok(record)) => record,
                Some(Err(e)) => {
                    self.finish(StreamEnd::ReadFailed(e));
                    return None;
                }
                None => {
                    self.finish(StreamEnd::Exhausted);
                    return None;
                }
            };

            self.records_read += 1;
            if let Some(metrics) = &self.metrics {
                metrics.records_read.increment(1);
            }

            match record.kind {
                RecordKind::Metadata | RecordKind::Other => {
                    debug!(
                        "Skipping {} record for {} at offset {}",
                        record.warc_type().unwrap_or("untyped"),
                        record.target_uri().unwrap_or("-"),
                        record.offset
                    );
                }
                RecordKind::HttpRequest => match parse_request(record.body()) {
                    Ok(request) => {
                        if let Some(dropped) = self.pending.replace(request) {
                            warn!(
                                "Dropping request {} {} with no matching response",
                                dropped.method, dropped.target
                            );
                        }
                    }
                    Err(e) => {
                        self.finish(StreamEnd::ParseFailed(e));
                        return None;
                    }
                },
                RecordKind::HttpResponse => {
                    let Some(request) = self.pending.take() else {
                        self.finish(StreamEnd::ParseFailed(PublishError::OrphanResponse {
                            offset: record.offset,
                        }));
                        return None;
                    };

                    match parse_response(record.content, &request) {
                        Ok(response) => {
                            if let Some(metrics) = &self.metrics {
                                metrics.transactions.increment(1);
                            }
                            return Some(HttpTransaction { request, response });
                        }
                        Err(e) => {
                            self.finish(StreamEnd::ParseFailed(e));
                            return None;
                        }
                    }
                }
            }
        }
    }
}

impl<S: RecordSource> std::iter::FusedIterator for Reconstructor<S> {}
