use crate::transaction::{HttpTransaction, ResponseBody};
use crate::{Metrics, ObjectSink};
use bytes::Bytes;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info};

/// Content type whose pages get the banner. Compared byte for byte.
pub const BANNER_CONTENT_TYPE: &str = "text/html; charset=utf-8";

const BODY_TAG: &[u8] = b"<body>";

pub const BANNER: &str = "<div style=\"margin:0;padding:5px;width:100%;background:#a00;color:#fff\">⚠️&nbsp;<strong>This is a static archive and is no longer maintained.</div>";

/// What a worker needs to publish one captured response.
#[derive(Debug)]
pub struct PublishTask {
    /// Position of the transaction in the archive
    pub seq: u64,
    pub bucket: Arc<str>,
    pub path: String,
    pub content_type: String,
    pub body: ResponseBody,
}

impl PublishTask {
    pub fn from_transaction(seq: u64, bucket: Arc<str>, transaction: HttpTransaction) -> Self {
        let content_type = transaction.response.content_type().to_string();
        Self {
            seq,
            bucket,
            path: transaction.request.path,
            content_type,
            body: transaction.response.body,
        }
    }
}

/// Storage key for a request path.
///
/// Leading slashes are removed and directory paths get `index.html`, so a
/// static website endpoint serves `/docs/` from `docs/index.html`.
pub fn upload_key(path: &str) -> String {
    let key = path.trim_start_matches('/');
    if key.is_empty() || key.ends_with('/') {
        format!("{key}index.html")
    } else {
        key.to_string()
    }
}

/// Insert [`BANNER`] right after the first `<body>` tag.
///
/// Returns the body unchanged when there is no such tag.
pub fn inject_banner(body: &[u8]) -> Vec<u8> {
    match body.windows(BODY_TAG.len()).position(|w| w == BODY_TAG) {
        Some(pos) => {
            let split = pos + BODY_TAG.len();
            let mut out = Vec::with_capacity(body.len() + BANNER.len());
            out.extend_from_slice(&body[..split]);
            out.extend_from_slice(BANNER.as_bytes());
            out.extend_from_slice(&body[split..]);
            out
        }
        None => body.to_vec(),
    }
}

pub fn should_inject_banner(add_banner: bool, content_type: &str) -> bool {
    add_banner && content_type == BANNER_CONTENT_TYPE
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    Uploaded { key: String },
    Failed { key: String, error: String },
}

pub struct PublishWorker {
    id: usize,
    sink: Arc<dyn ObjectSink>,
    add_banner: bool,
    metrics: Metrics,
    is_running: Arc<AtomicBool>,
    uploaded_count: Arc<AtomicUsize>,
    failed_count: Arc<AtomicUsize>,
    body_error_count: Arc<AtomicUsize>,
}

impl PublishWorker {
    pub fn new(id: usize, sink: Arc<dyn ObjectSink>, add_banner: bool, metrics: Metrics) -> Self {
        Self {
            id,
            sink,
            add_banner,
            metrics,
            is_running: Arc::new(AtomicBool::new(false)),
            uploaded_count: Arc::new(AtomicUsize::new(0)),
            failed_count: Arc::new(AtomicUsize::new(0)),
            body_error_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Drain the shared queue until it is closed and empty.
    pub async fn run_with_shared_receiver(&self, tasks: Arc<Mutex<mpsc::Receiver<PublishTask>>>) {
        debug!("Starting publish worker {}", self.id);
        self.is_running.store(true, Ordering::Relaxed);

        loop {
            let task = {
                let mut receiver = tasks.lock().await;
                receiver.recv().await
            };

            match task {
                Some(task) => {
                    self.publish(task).await;
                }
                None => break,
            }
        }

        self.is_running.store(false, Ordering::Relaxed);
        debug!("Publish worker {} stopped", self.id);
    }

    pub async fn publish(&self, task: PublishTask) -> PublishOutcome {
        let key = upload_key(&task.path);
        debug!("Worker {} publishing #{} {} as {}", self.id, task.seq, task.path, key);

        let (body, read_error) = task.body.read_all();
        if let Some(e) = read_error {
            self.body_error_count.fetch_add(1, Ordering::Relaxed);
            self.metrics.body_read_errors.increment(1);
            e.log(&format!("Error reading body for s3://{}/{}", task.bucket, key));
        }

        let body = if should_inject_banner(self.add_banner, &task.content_type) {
            Bytes::from(inject_banner(&body))
        } else {
            body
        };
        let size = body.len();

        let started = Instant::now();
        let result = self
            .sink
            .put_object(&task.bucket, &key, &task.content_type, body)
            .await;
        self.metrics.record_upload(started.elapsed(), size, result.is_ok());

        match result {
            Ok(()) => {
                self.uploaded_count.fetch_add(1, Ordering::Relaxed);
                info!("Uploaded to s3://{}/{}", task.bucket, key);
                PublishOutcome::Uploaded { key }
            }
            Err(e) => {
                self.failed_count.fetch_add(1, Ordering::Relaxed);
                e.log(&format!("Error uploading s3://{}/{} to S3", task.bucket, key));
                PublishOutcome::Failed {
                    key,
                    error: e.to_string(),
                }
            }
        }
    }

    pub fn get_stats(&self) -> WorkerStats {
        WorkerStats {
            id: self.id,
            is_running: self.is_running.load(Ordering::Relaxed),
            uploaded_count: self.uploaded_count.load(Ordering::Relaxed),
            failed_count: self.failed_count.load(Ordering::Relaxed),
            body_error_count: self.body_error_count.load(Ordering::Relaxed),
        }
    }
}

impl Clone for PublishWorker {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            sink: self.sink.clone(),
            add_banner: self.add_banner,
            metrics: self.metrics.clone(),
            is_running: self.is_running.clone(),
            uploaded_count: self.uploaded_count.clone(),
            failed_count: self.failed_count.clone(),
            body_error_count: self.body_error_count.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct WorkerStats {
    pub id: usize,
    pub is_running: bool,
    pub uploaded_count: usize,
    pub failed_count: usize,
    pub body_error_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MockObjectSink;
    use crate::transaction::BodyFraming;
    use crate::PublishError;

    fn task(path: &str, content_type: &str, body: &'static [u8]) -> PublishTask {
        PublishTask {
            seq: 0,
            bucket: Arc::from("site"),
            path: path.to_string(),
            content_type: content_type.to_string(),
            body: ResponseBody::new(Bytes::from_static(body), BodyFraming::UntilEof),
        }
    }

    #[test]
    fn test_upload_key() {
        assert_eq!(upload_key("/foo/bar.png"), "foo/bar.png");
        assert_eq!(upload_key("/docs/"), "docs/index.html");
        assert_eq!(upload_key("/a/"), "a/index.html");
        assert_eq!(upload_key("/"), "index.html");
        assert_eq!(upload_key(""), "index.html");
        assert_eq!(upload_key("//double/slash.css"), "double/slash.css");
        assert_eq!(upload_key("/no-extension"), "no-extension");
        assert_eq!(upload_key("/a b/c d.html"), "a b/c d.html");
    }

    #[test]
    fn test_inject_banner_first_body_only() {
        let out = inject_banner(b"<html><body><p>hi</p><body></html>");
        let out = String::from_utf8(out).unwrap();

        assert_eq!(out, format!("<html><body>{BANNER}<p>hi</p><body></html>"));
        assert_eq!(out.matches(BANNER).count(), 1);
        assert!(out.ends_with("<body></html>"));
    }

    #[test]
    fn test_inject_banner_without_body_tag() {
        let page = b"<html><BODY class=\"x\">case and attributes differ</BODY></html>";
        assert_eq!(inject_banner(page), page.to_vec());
    }

    #[test]
    fn test_banner_requires_exact_content_type() {
        assert!(should_inject_banner(true, "text/html; charset=utf-8"));
        assert!(!should_inject_banner(false, "text/html; charset=utf-8"));
        assert!(!should_inject_banner(true, "text/html"));
        assert!(!should_inject_banner(true, "text/html; charset=UTF-8"));
        assert!(!should_inject_banner(true, "text/html;charset=utf-8"));
    }

    #[tokio::test]
    async fn test_publish_rewrites_utf8_html() {
        let mut sink = MockObjectSink::new();
        sink.expect_put_object()
            .withf(|bucket, key, content_type, body| {
                bucket == "site"
                    && key == "docs/index.html"
                    && content_type == "text/html; charset=utf-8"
                    && body.starts_with(format!("<body>{BANNER}").as_bytes())
            })
            .times(1)
            .returning(|_, _, _, _| Ok(()));

        let worker = PublishWorker::new(0, Arc::new(sink), true, Metrics::noop());
        let outcome = worker
            .publish(task("/docs/", "text/html; charset=utf-8", b"<body>x</body>"))
            .await;

        assert_eq!(outcome, PublishOutcome::Uploaded { key: "docs/index.html".to_string() });
        assert_eq!(worker.get_stats().uploaded_count, 1);
    }

    #[tokio::test]
    async fn test_publish_leaves_plain_html_untouched() {
        let mut sink = MockObjectSink::new();
        sink.expect_put_object()
            .withf(|_, _, content_type, body| {
                content_type == "text/html" && &body[..] == b"<body>x</body>"
            })
            .times(1)
            .returning(|_, _, _, _| Ok(()));

        let worker = PublishWorker::new(0, Arc::new(sink), true, Metrics::noop());
        worker.publish(task("/page.html", "text/html", b"<body>x</body>")).await;
    }

    #[tokio::test]
    async fn test_failed_upload_is_reported_not_raised() {
        let mut sink = MockObjectSink::new();
        sink.expect_put_object()
            .returning(|_, _, _, _| Err(PublishError::Upload("access denied".to_string())));

        let worker = PublishWorker::new(3, Arc::new(sink), false, Metrics::noop());
        let outcome = worker.publish(task("/a.css", "text/css", b"a{}")).await;

        assert!(matches!(outcome, PublishOutcome::Failed { ref key, .. } if key == "a.css"));
        let stats = worker.get_stats();
        assert_eq!(stats.id, 3);
        assert_eq!(stats.failed_count, 1);
        assert_eq!(stats.uploaded_count, 0);
    }

    #[tokio::test]
    async fn test_partial_body_is_still_uploaded() {
        let mut sink = MockObjectSink::new();
        sink.expect_put_object()
            .withf(|_, key, _, body| key == "big.bin" && &body[..] == b"part")
            .times(1)
            .returning(|_, _, _, _| Ok(()));

        let worker = PublishWorker::new(0, Arc::new(sink), false, Metrics::noop());
        let truncated = PublishTask {
            body: ResponseBody::new(Bytes::from_static(b"part"), BodyFraming::Length(100)),
            ..task("/big.bin", "application/octet-stream", b"")
        };

        let outcome = worker.publish(truncated).await;
        assert!(matches!(outcome, PublishOutcome::Uploaded { .. }));
        assert_eq!(worker.get_stats().body_error_count, 1);
    }
}
