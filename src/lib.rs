//! # WARC Publisher
//!
//! Turns a web-archive capture (WARC) into a static website on an object
//! storage bucket. Every captured response is uploaded under a key derived
//! from its request path, so the bucket can be served directly by a static
//! website endpoint.
//!
//! ## Pipeline
//!
//! | Stage | Runs on | Role |
//! |-------|---------|------|
//! | **Archive reader** | blocking thread | Reads WARC records in order (plain or gzip) |
//! | **Reconstructor** | same thread | Pairs each request record with the response that follows |
//! | **Queue** | bounded mpsc | Backpressure between reading and uploading |
//! | **Publish workers** | tokio tasks | Derive key, optionally add banner, put object |
//!
//! Reading stops at the end of the archive or at the first record that can't
//! be parsed; everything already queued is still published. A failed upload
//! is logged and skipped without affecting the other items.
//!
//! ## Storage keys
//!
//! | Request path | Key |
//! |--------------|-----|
//! | `/foo/bar.png` | `foo/bar.png` |
//! | `/docs/` | `docs/index.html` |
//! | `/` | `index.html` |
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use warc_publisher::{open_archive, Config, ObjectStoreSink, Pipeline};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config {
//!         input: Some("crawl.warc.gz".into()),
//!         bucket: Some("static-archive".to_string()),
//!         add_banner: true,
//!         ..Default::default()
//!     };
//!
//!     let source = open_archive(config.input.as_deref().unwrap())?;
//!     let sink = Arc::new(ObjectStoreSink::s3(config.storage.clone()));
//!     let stats = Pipeline::new(config, sink).run(source).await?;
//!     println!("{stats}");
//!
//!     Ok(())
//! }
//! ```
//!
//! ## CLI Usage
//!
//! ```bash
//! warc-publisher --input crawl.warc.gz --bucket static-archive --concurrency 32 --add-banner
//! ```

/// Run configuration with serde support
pub mod config;

/// Error types and error classification
pub mod error;

/// Case-insensitive header fields
pub mod headers;

/// WARC record reading
pub mod archive;

/// Captured HTTP request/response parsing
pub mod transaction;

/// Request/response pairing over the record stream
pub mod reconstructor;

/// Upload workers, key derivation and banner injection
pub mod publisher;

/// Object storage sink
pub mod storage;

/// Producer/worker wiring
pub mod pipeline;

/// Command-line interface
pub mod cli;

/// Metric handles
pub mod metrics;


pub use archive::*;
pub use cli::*;
pub use config::*;
pub use error::*;
pub use headers::*;
pub use self::metrics::*;
pub use pipeline::*;
pub use publisher::*;
pub use reconstructor::*;
pub use storage::*;
pub use transaction::*;
