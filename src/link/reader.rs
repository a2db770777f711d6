//! Non-blocking line reads.

use super::SerialLink;
use std::io;
use tracing::{trace, warn};

/// Longest line accepted, excluding the terminator. Longer lines are dropped
/// whole.
pub const MAX_LINE_LEN: usize = 1024;

/// Splits the incoming byte stream into lines.
///
/// Holds one bit of state across polls: whether the rest of an overlong line
/// still has to be skipped. A fresh reader belongs to every new connection.
#[derive(Debug, Default)]
pub struct LineReader {
    skipping: bool,
}

impl LineReader {
    /// Reader positioned at a line start.
    pub fn new() -> Self {
        Self::default()
    }

    /// True while the tail of an overlong line is still being discarded.
    pub fn is_skipping(&self) -> bool {
        self.skipping
    }

    /// Reads the next line if any bytes are pending.
    ///
    /// Returns `Ok(None)` without touching the handle when nothing is
    /// buffered, and also when the line trims down to nothing. Otherwise
    /// reads byte by byte up to and including `\n`; a read timeout or an
    /// empty read ends the line early with whatever arrived. Invalid UTF-8
    /// is dropped, surrounding whitespace is trimmed.
    ///
    /// A line longer than [`MAX_LINE_LEN`] is discarded through its `\n`,
    /// even when that arrives on a later call, and yields `Ok(None)`.
    pub fn read_line(&mut self, link: &mut dyn SerialLink) -> io::Result<Option<String>> {
        if link.bytes_available()? == 0 {
            return Ok(None);
        }

        if self.skipping {
            let (dropped, terminated) = skip_to_newline(link)?;
            self.skipping = !terminated;
            trace!(dropped, terminated, "Discarded tail of overlong line");
            return Ok(None);
        }

        let mut raw = Vec::with_capacity(64);
        loop {
            match next_byte(link)? {
                Some(b'\n') | None => break,
                Some(byte) if raw.len() < MAX_LINE_LEN => raw.push(byte),
                Some(_) => {
                    let (dropped, terminated) = skip_to_newline(link)?;
                    self.skipping = !terminated;
                    warn!(
                        "Dropped line longer than {} bytes ({} bytes discarded)",
                        MAX_LINE_LEN,
                        raw.len() + 1 + dropped
                    );
                    return Ok(None);
                }
            }
        }

        let line = decode_lossy(&raw);
        let trimmed = line.trim();
        if trimmed.is_empty() {
            Ok(None)
        } else {
            Ok(Some(trimmed.to_string()))
        }
    }
}

/// One byte, or `None` once the link has nothing more right now.
fn next_byte(link: &mut dyn SerialLink) -> io::Result<Option<u8>> {
    let mut byte = [0u8; 1];
    loop {
        match link.read(&mut byte) {
            Ok(0) => return Ok(None),
            Ok(_) => return Ok(Some(byte[0])),
            Err(e) if e.kind() == io::ErrorKind::TimedOut => return Ok(None),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
}

/// Consumes bytes through the next `\n`. Returns the count dropped (not
/// counting the terminator) and whether the terminator was reached.
fn skip_to_newline(link: &mut dyn SerialLink) -> io::Result<(usize, bool)> {
    let mut dropped = 0;
    loop {
        match next_byte(link)? {
            Some(b'\n') => return Ok((dropped, true)),
            Some(_) => dropped += 1,
            None => return Ok((dropped, false)),
        }
    }
}

/// Decodes UTF-8, skipping invalid sequences instead of substituting them.
pub fn decode_lossy(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    for chunk in bytes.utf8_chunks() {
        out.push_str(chunk.valid());
    }
    out
}
