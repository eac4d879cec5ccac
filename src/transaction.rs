//! Captured HTTP messages and the transactions built from them.
//!
//! Request and response heads are parsed eagerly when a record is read.
//! Response bodies are decoded lazily: the framing (length, chunked, to end
//! of record) is decided from the head and the originating request, and the
//! actual decoding happens when an upload worker calls
//! [`ResponseBody::read_all`]. A malformed body therefore costs one item,
//! not the whole run.

use bytes::{Bytes, BytesMut};
use percent_encoding::percent_decode_str;
use url::Url;

use crate::{HeaderFields, PublishError};

const MIN_HEADERS: usize = 64;

#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: String,
    /// Request target exactly as captured (origin or absolute form)
    pub target: String,
    /// Percent-decoded URL path without query or fragment. Escapes that do
    /// not decode to UTF-8 are kept as captured.
    pub path: String,
    pub headers: HeaderFields,
}

impl HttpRequest {
    pub fn is_head(&self) -> bool {
        self.method.eq_ignore_ascii_case("HEAD")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyFraming {
    /// HEAD responses and 1xx/204/304 statuses
    Empty,
    Chunked,
    Length(u64),
    /// Everything up to the end of the record
    UntilEof,
}

/// Undecoded response body.
#[derive(Debug, Clone)]
pub struct ResponseBody {
    raw: Bytes,
    framing: BodyFraming,
}

impl ResponseBody {
    pub fn new(raw: Bytes, framing: BodyFraming) -> Self {
        Self { raw, framing }
    }

    pub fn framing(&self) -> BodyFraming {
        self.framing
    }

    /// Decode the whole body.
    ///
    /// Always returns the bytes decoded so far; the error is set when the
    /// body is truncated or its chunk framing is malformed.
    pub fn read_all(self) -> (Bytes, Option<PublishError>) {
        match self.framing {
            BodyFraming::Empty => (Bytes::new(), None),
            BodyFraming::UntilEof => (self.raw, None),
            BodyFraming::Length(expected) => {
                let available = self.raw.len() as u64;
                if available < expected {
                    let err = PublishError::BodyRead(format!(
                        "unexpected EOF: got {available} of {expected} bytes"
                    ));
                    (self.raw, Some(err))
                } else {
                    (self.raw.slice(..expected as usize), None)
                }
            }
            BodyFraming::Chunked => decode_chunked(&self.raw),
        }
    }
}

fn decode_chunked(raw: &[u8]) -> (Bytes, Option<PublishError>) {
    let mut out = BytesMut::new();
    let mut pos = 0;

    loop {
        let (consumed, size) = match httparse::parse_chunk_size(&raw[pos..]) {
            Ok(httparse::Status::Complete(parsed)) => parsed,
            Ok(httparse::Status::Partial) => {
                let err = PublishError::BodyRead("unexpected EOF in chunk size line".to_string());
                return (out.freeze(), Some(err));
            }
            Err(_) => {
                let err = PublishError::BodyRead(format!("invalid chunk size at byte {pos}"));
                return (out.freeze(), Some(err));
            }
        };
        pos += consumed;

        if size == 0 {
            // Trailers, if any, are not part of the payload.
            return (out.freeze(), None);
        }

        let remaining = raw.len() - pos;
        if (remaining as u64) < size {
            out.extend_from_slice(&raw[pos..]);
            let err = PublishError::BodyRead(format!(
                "unexpected EOF in chunk: got {remaining} of {size} bytes"
            ));
            return (out.freeze(), Some(err));
        }

        let end = pos + size as usize;
        out.extend_from_slice(&raw[pos..end]);
        pos = end;

        let rest = &raw[pos..];
        if rest.starts_with(b"\r\n") {
            pos += 2;
        } else if rest.starts_with(b"\n") {
            pos += 1;
        } else {
            let err = PublishError::BodyRead("missing CRLF after chunk data".to_string());
            return (out.freeze(), Some(err));
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub reason: String,
    pub headers: HeaderFields,
    pub body: ResponseBody,
}

impl HttpResponse {
    /// Raw `Content-Type` value, empty when absent.
    pub fn content_type(&self) -> &str {
        self.headers.get("Content-Type").unwrap_or_default()
    }
}

/// A captured request paired with the response that followed it.
#[derive(Debug, Clone)]
pub struct HttpTransaction {
    pub request: HttpRequest,
    pub response: HttpResponse,
}

/// Parse the content block of a request record.
pub fn parse_request(content: &[u8]) -> Result<HttpRequest, PublishError> {
    let mut headers = vec![httparse::EMPTY_HEADER; header_capacity(content)];
    let mut req = httparse::Request::new(&mut headers);

    match req.parse(content) {
        Ok(httparse::Status::Complete(_)) => {}
        Ok(httparse::Status::Partial) => {
            return Err(PublishError::RequestParse("incomplete request head".to_string()))
        }
        Err(e) => return Err(PublishError::RequestParse(e.to_string())),
    }

    let method = req
        .method
        .ok_or_else(|| PublishError::RequestParse("missing method".to_string()))?;
    let target = req
        .path
        .ok_or_else(|| PublishError::RequestParse("missing request target".to_string()))?;

    Ok(HttpRequest {
        method: method.to_string(),
        target: target.to_string(),
        path: request_path(target)?,
        headers: HeaderFields::from(&*req.headers),
    })
}

/// Extract the decoded path from a request target.
pub fn request_path(target: &str) -> Result<String, PublishError> {
    let raw_path = if target.starts_with('/') {
        let end = target.find(['?', '#']).unwrap_or(target.len());
        target[..end].to_string()
    } else if target.contains("://") {
        let url = Url::parse(target)
            .map_err(|e| PublishError::RequestParse(format!("invalid URL {target:?}: {e}")))?;
        url.path().to_string()
    } else if target == "*" {
        return Ok(target.to_string());
    } else {
        // Authority form (CONNECT host:port) has no path.
        String::new()
    };

    let decoded = percent_decode_str(&raw_path)
        .decode_utf8()
        .map(|path| path.into_owned());
    Ok(decoded.unwrap_or(raw_path))
}

/// Upper bound on the header lines in a message head: one per line break
/// before the first empty line.
fn header_capacity(content: &[u8]) -> usize {
    let mut lines = 0;
    for (i, &byte) in content.iter().enumerate() {
        if byte != b'\n' {
            continue;
        }
        lines += 1;
        let rest = &content[i + 1..];
        if rest.starts_with(b"\n") || rest.starts_with(b"\r\n") {
            break;
        }
    }
    lines.max(MIN_HEADERS)
}

/// Parse the content block of a response record.
///
/// The originating request decides whether a body is expected at all.
pub fn parse_response(content: Bytes, request: &HttpRequest) -> Result<HttpResponse, PublishError> {
    let mut headers = vec![httparse::EMPTY_HEADER; header_capacity(&content)];
    let mut resp = httparse::Response::new(&mut headers);

    let head_len = match resp.parse(&content) {
        Ok(httparse::Status::Complete(len)) => len,
        Ok(httparse::Status::Partial) => {
            return Err(PublishError::ResponseParse("incomplete response head".to_string()))
        }
        Err(e) => return Err(PublishError::ResponseParse(e.to_string())),
    };

    let status = resp
        .code
        .ok_or_else(|| PublishError::ResponseParse("missing status code".to_string()))?;
    let reason = resp.reason.unwrap_or_default().to_string();
    let headers = HeaderFields::from(&*resp.headers);

    let framing = body_framing(status, &headers, request)?;

    Ok(HttpResponse {
        status,
        reason,
        headers,
        body: ResponseBody::new(content.slice(head_len..), framing),
    })
}

fn body_framing(
    status: u16,
    headers: &HeaderFields,
    request: &HttpRequest,
) -> Result<BodyFraming, PublishError> {
    if request.is_head() || (100..200).contains(&status) || status == 204 || status == 304 {
        return Ok(BodyFraming::Empty);
    }

    let chunked = headers
        .get_all("Transfer-Encoding")
        .flat_map(|v| v.split(','))
        .last()
        .is_some_and(|coding| coding.trim().eq_ignore_ascii_case("chunked"));
    if chunked {
        return Ok(BodyFraming::Chunked);
    }

    match headers.get("Content-Length") {
        Some(value) => value
            .trim()
            .parse()
            .map(BodyFraming::Length)
            .map_err(|_| PublishError::ResponseParse(format!("bad Content-Length {value:?}"))),
        None => Ok(BodyFraming::UntilEof),
    }
}
