use bytes::Bytes;

use crate::HeaderFields;

/// What a record carries, classified from its WARC `Content-Type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    /// `application/warc-fields` (warcinfo, metadata records)
    Metadata,
    /// `application/http;msgtype=request`
    HttpRequest,
    /// `application/http;msgtype=response`
    HttpResponse,
    /// Anything else: resources, conversions, revisits without a payload
    Other,
}

impl RecordKind {
    pub fn from_content_type(content_type: &str) -> Self {
        // Writers disagree on spacing and case around the msgtype parameter.
        let normalized: String = content_type
            .chars()
            .filter(|c| !c.is_ascii_whitespace())
            .map(|c| c.to_ascii_lowercase())
            .collect();

        match normalized.as_str() {
            "application/warc-fields" => RecordKind::Metadata,
            "application/http;msgtype=request" => RecordKind::HttpRequest,
            "application/http;msgtype=response" => RecordKind::HttpResponse,
            _ => RecordKind::Other,
        }
    }
}

/// One entry of the archive stream.
#[derive(Debug, Clone)]
pub struct ArchiveRecord {
    pub kind: RecordKind,
    pub headers: HeaderFields,
    pub content: Bytes,
    /// Byte offset of the record in the (decompressed) stream
    pub offset: u64,
}

impl ArchiveRecord {
    /// Builds a record, deriving its kind from the `Content-Type` header.
    pub fn new(headers: HeaderFields, content: impl Into<Bytes>, offset: u64) -> Self {
        let kind = headers
            .get("content-type")
            .map(RecordKind::from_content_type)
            .unwrap_or(RecordKind::Other);

        Self {
            kind,
            headers,
            content: content.into(),
            offset,
        }
    }

    pub fn warc_type(&self) -> Option<&str> {
        self.headers.get("WARC-Type")
    }

    pub fn target_uri(&self) -> Option<&str> {
        self.headers.get("WARC-Target-URI")
    }

    /// Readable view of the content block.
    pub fn body(&self) -> &[u8] {
        &self.content
    }
}
