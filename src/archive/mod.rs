//! WARC archive reading.
//!
//! The pipeline consumes archives one record at a time through the
//! [`RecordSource`] capability, so anything that yields
//! `Result<ArchiveRecord, PublishError>` can feed it: the on-disk
//! [`WarcReader`] in production, a plain `Vec` iterator in tests.
//!
//! ## Format
//!
//! A WARC file is a sequence of records, each made of:
//! 1. A version line (`WARC/1.0` or `WARC/1.1`)
//! 2. Named header fields terminated by an empty line
//! 3. A content block of exactly `Content-Length` bytes
//! 4. Two CRLF sequences
//!
//! Compressed archives gzip every record as its own member, which
//! [`open_archive`] handles with a multi-member decoder.

mod reader;
mod record;

pub use reader::{open_archive, WarcReader};
pub use record::{ArchiveRecord, RecordKind};

use crate::PublishError;

/// Produces archive records one at a time until end of stream.
pub trait RecordSource: Send {
    /// Next record, `None` at end of stream.
    fn next_record(&mut self) -> Option<Result<ArchiveRecord, PublishError>>;
}

impl<I> RecordSource for I
where
    I: Iterator<Item = Result<ArchiveRecord, PublishError>> + Send,
{
    fn next_record(&mut self) -> Option<Result<ArchiveRecord, PublishError>> {
        self.next()
    }
}
