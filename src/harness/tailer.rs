//! Incremental log file reader
//!
//! The tailer never rescans content it has already handed out: a
//! [`LogCursor`] remembers the byte offset consumed so far and each poll
//! reads only what was appended since. Partial lines are held back by a
//! [`LineAssembler`] until their newline arrives.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;

use crate::common::{Error, Result};

/// How much of the log file has been consumed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LogCursor {
    byte_offset: u64,
}

impl LogCursor {
    /// Cursor positioned at `byte_offset`
    pub fn at(byte_offset: u64) -> Self {
        Self { byte_offset }
    }

    pub fn byte_offset(&self) -> u64 {
        self.byte_offset
    }
}

/// Result of one poll
#[derive(Debug, Default)]
pub struct TailChunk {
    /// Bytes appended since the previous cursor
    pub bytes: Vec<u8>,
    /// Cursor to pass to the next poll
    pub cursor: LogCursor,
    /// The file was shorter than the cursor and was re-read from the start
    pub truncated: bool,
}

/// Read everything appended to `path` since `cursor`
///
/// A missing file is not an error: the chunk is empty and the cursor is
/// returned unchanged so the caller simply tries again on its next tick.
/// If the file shrank below the cursor (rotation or truncation) the cursor
/// resets to zero and the file is read from the start. Other I/O failures
/// come back as [`Error::LogAccess`], which callers treat as transient.
pub fn poll(path: &Path, cursor: LogCursor) -> Result<TailChunk> {
    let mut file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Ok(TailChunk {
                bytes: Vec::new(),
                cursor,
                truncated: false,
            });
        }
        Err(e) => return Err(Error::log_access(path, e)),
    };

    let len = file.metadata().map_err(|e| Error::log_access(path, e))?.len();

    let (start, truncated) = if len < cursor.byte_offset {
        tracing::info!(
            path = %path.display(),
            offset = cursor.byte_offset,
            len,
            "Log file shrank, reading from the start"
        );
        (0, true)
    } else {
        (cursor.byte_offset, false)
    };

    file.seek(SeekFrom::Start(start))
        .map_err(|e| Error::log_access(path, e))?;

    // Stop at the length observed above so the cursor never runs past it,
    // even if the writer appends while we read.
    let mut bytes = Vec::with_capacity((len - start) as usize);
    file.take(len - start)
        .read_to_end(&mut bytes)
        .map_err(|e| Error::log_access(path, e))?;

    let cursor = LogCursor::at(start + bytes.len() as u64);
    Ok(TailChunk {
        bytes,
        cursor,
        truncated,
    })
}

/// Reassembles complete lines from arbitrarily split chunks
#[derive(Debug, Default)]
pub struct LineAssembler {
    pending: Vec<u8>,
}

impl LineAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk, returning every line it completes
    ///
    /// Bytes after the last newline are kept until a later chunk ends the
    /// line. Trailing `\r` is stripped; invalid UTF-8 is replaced.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();
        let mut rest = chunk;

        while let Some(pos) = rest.iter().position(|&b| b == b'\n') {
            self.pending.extend_from_slice(&rest[..pos]);
            lines.push(Self::decode(&self.pending));
            self.pending.clear();
            rest = &rest[pos + 1..];
        }
        self.pending.extend_from_slice(rest);

        lines
    }

    /// Drop any partial line, used when the file was truncated
    pub fn reset(&mut self) {
        self.pending.clear();
    }

    /// Take the unterminated remainder as a final line, if any
    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let line = Self::decode(&self.pending);
        self.pending.clear();
        Some(line)
    }

    /// Number of bytes waiting for a newline
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    fn decode(raw: &[u8]) -> String {
        let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
        String::from_utf8_lossy(raw).into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    fn append(path: &Path, text: &str) {
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .unwrap();
        file.write_all(text.as_bytes()).unwrap();
    }

    #[test]
    fn test_missing_file_keeps_cursor() {
        let dir = tempdir().unwrap();
        let cursor = LogCursor::at(42);
        let chunk = poll(&dir.path().join("absent.txt"), cursor).unwrap();
        assert!(chunk.bytes.is_empty());
        assert_eq!(chunk.cursor, cursor);
        assert!(!chunk.truncated);
    }

    #[test]
    fn test_poll_returns_only_new_bytes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("log.txt");
        append(&path, "first\n");

        let chunk = poll(&path, LogCursor::default()).unwrap();
        assert_eq!(chunk.bytes, b"first\n");
        assert_eq!(chunk.cursor.byte_offset(), 6);

        let again = poll(&path, chunk.cursor).unwrap();
        assert!(again.bytes.is_empty());
        assert_eq!(again.cursor, chunk.cursor);

        append(&path, "second\n");
        let next = poll(&path, again.cursor).unwrap();
        assert_eq!(next.bytes, b"second\n");
        assert_eq!(next.cursor.byte_offset(), 13);
    }

    #[test]
    fn test_cursor_past_end_resets_to_start() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("log.txt");
        append(&path, "after rotation\n");

        let chunk = poll(&path, LogCursor::at(1_000)).unwrap();
        assert!(chunk.truncated);
        assert_eq!(chunk.bytes, b"after rotation\n");
        assert_eq!(chunk.cursor.byte_offset(), 15);
    }

    #[test]
    fn test_truncation_is_detected_between_polls() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("log.txt");
        append(&path, "a fairly long first generation line\n");
        let first = poll(&path, LogCursor::default()).unwrap();

        std::fs::write(&path, "new\n").unwrap();
        let second = poll(&path, first.cursor).unwrap();
        assert!(second.truncated);
        assert_eq!(second.bytes, b"new\n");
        assert_eq!(second.cursor.byte_offset(), 4);
    }

    #[test]
    fn test_assembler_joins_split_lines() {
        let mut lines = LineAssembler::new();
        assert!(lines.push(b"Device found - TV at 10.0.0").is_empty());
        assert_eq!(lines.pending_len(), 27);

        let complete = lines.push(b".2:7000\nnext");
        assert_eq!(complete, vec!["Device found - TV at 10.0.0.2:7000".to_string()]);
        assert_eq!(lines.finish(), Some("next".to_string()));
        assert_eq!(lines.finish(), None);
    }

    #[test]
    fn test_assembler_strips_crlf_and_keeps_empty_lines() {
        let mut lines = LineAssembler::new();
        let complete = lines.push(b"one\r\n\r\ntwo\n");
        assert_eq!(complete, vec!["one", "", "two"]);
    }

    #[test]
    fn test_assembler_reset_discards_partial() {
        let mut lines = LineAssembler::new();
        lines.push(b"stale fragment");
        lines.reset();
        assert_eq!(lines.push(b"fresh\n"), vec!["fresh"]);
    }
}
