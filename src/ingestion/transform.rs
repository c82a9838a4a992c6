//! Streaming validation and normalization stages.
//!
//! Both stages are byte oriented. Every byte they act on (`\r`, `\n`, space,
//! tab) is ASCII and can never occur inside a multi-byte UTF-8 sequence, so
//! chunk boundaries may fall anywhere.

use crate::ingestion::error::{IngestionError, IngestionResult};

/// Rejects empty chunks and a cumulative size above the ceiling
///
/// The processor treats a zero-length read as end of file and never passes an
/// empty chunk; the empty check guards other callers that feed chunks directly.
#[derive(Debug, Clone)]
pub struct ChunkValidator {
    max_bytes: u64,
    seen_bytes: u64,
}

impl ChunkValidator {
    pub fn new(max_bytes: u64) -> Self {
        Self {
            max_bytes,
            seen_bytes: 0,
        }
    }

    pub fn validate(&mut self, chunk: &[u8]) -> IngestionResult<()> {
        if chunk.is_empty() {
            return Err(IngestionError::EmptyChunk);
        }
        self.seen_bytes = self.seen_bytes.saturating_add(chunk.len() as u64);
        if self.seen_bytes > self.max_bytes {
            return Err(IngestionError::TooLarge {
                limit: self.max_bytes,
            });
        }
        Ok(())
    }

    pub fn seen_bytes(&self) -> u64 {
        self.seen_bytes
    }
}

/// Line-ending and trailing-whitespace normalizer.
///
/// CRLF and lone CR become LF; spaces and tabs at the end of a line are
/// dropped. State carries across chunks: a CR at the end of one chunk followed
/// by LF at the start of the next is one line break.
#[derive(Debug, Default)]
pub struct Normalizer {
    pending_cr: bool,
    pending_whitespace: Vec<u8>,
}

impl Normalizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: &[u8], out: &mut Vec<u8>) {
        for &byte in chunk {
            if self.pending_cr {
                self.pending_cr = false;
                if byte == b'\n' {
                    continue;
                }
            }
            match byte {
                b'\r' => {
                    self.pending_whitespace.clear();
                    out.push(b'\n');
                    self.pending_cr = true;
                }
                b'\n' => {
                    self.pending_whitespace.clear();
                    out.push(b'\n');
                }
                b' ' | b'\t' => self.pending_whitespace.push(byte),
                _ => {
                    out.append(&mut self.pending_whitespace);
                    out.push(byte);
                }
            }
        }
    }

    /// End of input: whitespace still pending is trailing and is dropped
    pub fn finish(&mut self) {
        self.pending_whitespace.clear();
        self.pending_cr = false;
    }
}

/// Normalize a complete string in one pass
pub fn normalize(input: &str) -> String {
    let mut normalizer = Normalizer::new();
    let mut out = Vec::with_capacity(input.len());
    normalizer.push(input.as_bytes(), &mut out);
    normalizer.finish();
    String::from_utf8_lossy(&out).into_owned()
}

/// Final checks on normalized content
pub fn check_content(content: &str, max_bytes: u64, markers: &[String]) -> IngestionResult<()> {
    if content.trim().is_empty() {
        return Err(IngestionError::EmptyContent);
    }
    if content.len() as u64 > max_bytes {
        return Err(IngestionError::TooLarge { limit: max_bytes });
    }

    let lowered = content.to_lowercase();
    let has_marker = markers
        .iter()
        .map(|marker| marker.trim().to_lowercase())
        .filter(|marker| !marker.is_empty())
        .any(|marker| lowered.contains(&marker));
    if !has_marker {
        return Err(IngestionError::MissingMarker);
    }
    Ok(())
}
