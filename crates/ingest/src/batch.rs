//! Cutting JSONL content into upload batches.
//!
//! Two strategies are offered and both keep every line whole:
//!
//! - [`read_batch`] / [`BatchReader`] stream batches from any [`BufRead`],
//!   skipping whitespace-only lines.
//! - [`split_batches`] cuts an in-memory body into borrowed slices.
//!   Concatenating the slices in order gives back the input byte for byte.
//!
//! Batches are bounded by line count. A batch never ends in the middle of a
//! line, and line terminators (`\n` or `\r\n`) stay with their line.
//!
//! ```rust
//! use ingest::split_batches;
//!
//! let body = "{\"id\":\"a\"}\n{\"id\":\"b\"}\n{\"id\":\"c\"}";
//! let batches = split_batches(body, 2).unwrap();
//! assert_eq!(batches, ["{\"id\":\"a\"}\n{\"id\":\"b\"}\n", "{\"id\":\"c\"}"]);
//! assert_eq!(batches.concat(), body);
//! ```
use std::io::BufRead;

use crate::error::IngestError;

/// Reads up to `batch_size` non-blank lines from `reader` and returns them concatenated.
///
/// Line terminators are kept. Whitespace-only lines are dropped and do not
/// count towards `batch_size`. An empty string means the input is exhausted.
pub fn read_batch<R: BufRead>(reader: &mut R, batch_size: usize) -> Result<String, IngestError> {
    if batch_size == 0 {
        return Err(IngestError::InvalidBatchSize);
    }

    let mut batch = String::new();
    let mut line = String::new();
    let mut taken = 0usize;
    while taken < batch_size {
        line.clear();
        if reader.read_line(&mut line)? == 0 {
            break;
        }
        if line.trim().is_empty() {
            continue;
        }
        batch.push_str(&line);
        taken += 1;
    }
    Ok(batch)
}

/// Iterator over the batches [`read_batch`] produces.
///
/// ```rust
/// use ingest::BatchReader;
///
/// let body = "a\n\nb\nc\n";
/// let batches: Vec<String> = BatchReader::new(body.as_bytes(), 2)
///     .unwrap()
///     .collect::<Result<_, _>>()
///     .unwrap();
/// assert_eq!(batches, ["a\nb\n", "c\n"]);
/// ```
#[derive(Debug)]
pub struct BatchReader<R> {
    reader: R,
    batch_size: usize,
    done: bool,
}

impl<R: BufRead> BatchReader<R> {
    pub fn new(reader: R, batch_size: usize) -> Result<Self, IngestError> {
        if batch_size == 0 {
            return Err(IngestError::InvalidBatchSize);
        }
        Ok(Self {
            reader,
            batch_size,
            done: false,
        })
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }
}

impl<R: BufRead> Iterator for BatchReader<R> {
    type Item = Result<String, IngestError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match read_batch(&mut self.reader, self.batch_size) {
            Ok(batch) if batch.is_empty() => {
                self.done = true;
                None
            }
            Ok(batch) => Some(Ok(batch)),
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}

/// Splits `text` into consecutive slices of at most `batch_size` lines.
///
/// Every slice but the last ends right after a `\n`. The last slice may be
/// shorter and may lack a terminator. An empty input yields no slices.
pub fn split_batches(text: &str, batch_size: usize) -> Result<Vec<&str>, IngestError> {
    if batch_size == 0 {
        return Err(IngestError::InvalidBatchSize);
    }

    let mut batches = Vec::new();
    let mut start = 0usize;
    let mut lines = 0usize;
    for (idx, byte) in text.bytes().enumerate() {
        if byte != b'\n' {
            continue;
        }
        lines += 1;
        if lines == batch_size {
            batches.push(&text[start..=idx]);
            start = idx + 1;
            lines = 0;
        }
    }
    if start < text.len() {
        batches.push(&text[start..]);
    }
    Ok(batches)
}

/// Number of lines in `text`: every `\r\n` and every lone `\n` ends one, plus one for the last line.
///
/// A trailing terminator therefore counts an empty final line.
pub fn count_lines(text: &str) -> usize {
    let crlf = text.matches("\r\n").count();
    let lf = text.matches('\n').count() - crlf;
    crlf + lf + 1
}
