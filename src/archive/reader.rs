use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use flate2::read::MultiGzDecoder;
use tracing::debug;

use super::ArchiveRecord;
use crate::{HeaderFields, PublishError};

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Sequential WARC record reader.
///
/// Yields records in file order. After the first error the reader is
/// exhausted; it never tries to resynchronise on the next record.
pub struct WarcReader<R> {
    inner: R,
    offset: u64,
    done: bool,
}

/// Open a WARC file from disk, transparently decompressing `.warc.gz`.
pub fn open_archive(path: &Path) -> Result<WarcReader<Box<dyn BufRead + Send>>, PublishError> {
    let file = File::open(path).map_err(|e| {
        PublishError::Io(format!("Error opening file {}: {}", path.display(), e))
    })?;
    let mut reader = BufReader::new(file);

    let is_gzip = reader
        .fill_buf()
        .map_err(|e| PublishError::ArchiveFormat(format!("Couldn't open WARC: {e}")))?
        .starts_with(&GZIP_MAGIC);

    let inner: Box<dyn BufRead + Send> = if is_gzip {
        debug!("Detected gzip compressed archive: {}", path.display());
        Box::new(BufReader::new(MultiGzDecoder::new(reader)))
    } else {
        Box::new(reader)
    };

    Ok(WarcReader::new(inner))
}

impl<R: BufRead> WarcReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            offset: 0,
            done: false,
        }
    }

    pub fn read_record(&mut self) -> Result<Option<ArchiveRecord>, PublishError> {
        let mut line = Vec::new();

        // Skip blank lines left over from the previous record's trailer.
        loop {
            line.clear();
            if self.read_line(&mut line)? == 0 {
                return Ok(None);
            }
            if !trim_line_ending(&line).is_empty() {
                break;
            }
        }

        let record_offset = self.offset - line.len() as u64;
        let version = trim_line_ending(&line);
        if !version.starts_with(b"WARC/") {
            return Err(PublishError::ArchiveFormat(format!(
                "Expected WARC version line at offset {}, found {:?}",
                record_offset,
                String::from_utf8_lossy(version)
            )));
        }

        let headers = self.read_headers()?;

        let content_length: u64 = headers
            .get("Content-Length")
            .ok_or_else(|| {
                PublishError::ArchiveFormat(format!(
                    "Record at offset {record_offset} has no Content-Length"
                ))
            })?
            .trim()
            .parse()
            .map_err(|e| {
                PublishError::ArchiveFormat(format!(
                    "Record at offset {record_offset} has invalid Content-Length: {e}"
                ))
            })?;

        let mut content = Vec::new();
        let read = (&mut self.inner)
            .take(content_length)
            .read_to_end(&mut content)
            .map_err(|e| PublishError::ArchiveFormat(format!("Error reading record block: {e}")))?;
        self.offset += read as u64;

        if (read as u64) < content_length {
            return Err(PublishError::ArchiveFormat(format!(
                "Record at offset {record_offset} truncated: expected {content_length} bytes, got {read}"
            )));
        }

        Ok(Some(ArchiveRecord::new(headers, content, record_offset)))
    }

    fn read_headers(&mut self) -> Result<HeaderFields, PublishError> {
        let mut fields: Vec<(String, String)> = Vec::new();
        let mut line = Vec::new();

        loop {
            line.clear();
            if self.read_line(&mut line)? == 0 {
                return Err(PublishError::ArchiveFormat(
                    "Unexpected end of archive inside record header".to_string(),
                ));
            }

            let text = trim_line_ending(&line);
            if text.is_empty() {
                break;
            }

            let text = String::from_utf8_lossy(text);
            if text.starts_with([' ', '\t']) {
                // Folded continuation of the previous field
                match fields.last_mut() {
                    Some((_, value)) => {
                        value.push(' ');
                        value.push_str(text.trim());
                    }
                    None => {
                        return Err(PublishError::ArchiveFormat(
                            "Header continuation before first field".to_string(),
                        ))
                    }
                }
                continue;
            }

            let (name, value) = text.split_once(':').ok_or_else(|| {
                PublishError::ArchiveFormat(format!("Malformed WARC header line: {text:?}"))
            })?;
            fields.push((name.trim().to_string(), value.trim().to_string()));
        }

        let mut headers = HeaderFields::new();
        for (name, value) in fields {
            headers.insert(name, value);
        }
        Ok(headers)
    }

    fn read_line(&mut self, buf: &mut Vec<u8>) -> Result<usize, PublishError> {
        let n = self
            .inner
            .read_until(b'\n', buf)
            .map_err(|e| PublishError::ArchiveFormat(format!("Can't read WARC record: {e}")))?;
        self.offset += n as u64;
        Ok(n)
    }
}

impl<R: BufRead> Iterator for WarcReader<R> {
    type Item = Result<ArchiveRecord, PublishError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        match self.read_record() {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

fn trim_line_ending(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}
