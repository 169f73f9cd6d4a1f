//! Incremental splitting of a byte stream into delimiter-terminated segments.
//!
//! Network reads do not respect frame, token or UTF-8 boundaries, so bytes
//! are buffered until a full delimiter is seen. Splitting happens on raw
//! bytes; a multi-byte character split across two reads is reassembled
//! before any segment is decoded.

#[derive(Debug, Clone)]
pub struct DelimitedBuffer {
    delimiter: &'static [u8],
    buf: Vec<u8>,
    // Bytes of `buf` already known not to start a delimiter
    scanned: usize,
}

impl DelimitedBuffer {
    pub fn new(delimiter: &'static [u8]) -> Self {
        DelimitedBuffer {
            delimiter,
            buf: Vec::new(),
            scanned: 0,
        }
    }

    /// Newline-delimited JSON from the model server
    pub fn lines() -> Self {
        Self::new(b"\n")
    }

    /// Event frames separated by a blank line
    pub fn events() -> Self {
        Self::new(b"\n\n")
    }

    pub fn push(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    /// Pop the next complete segment, without its delimiter
    pub fn next_segment(&mut self) -> Option<Vec<u8>> {
        let width = self.delimiter.len();
        let found = self.buf[self.scanned..]
            .windows(width)
            .position(|window| window == self.delimiter);

        match found {
            Some(offset) => {
                let end = self.scanned + offset;
                let segment = self.buf[..end].to_vec();
                self.buf.drain(..end + width);
                self.scanned = 0;
                Some(segment)
            }
            None => {
                self.scanned = self.buf.len().saturating_sub(width - 1);
                None
            }
        }
    }

    /// Pop every complete segment currently buffered
    pub fn drain_segments(&mut self) -> Vec<Vec<u8>> {
        std::iter::from_fn(|| self.next_segment()).collect()
    }

    /// Take the trailing partial segment once the stream has ended
    pub fn take_remainder(&mut self) -> Option<Vec<u8>> {
        self.scanned = 0;
        if self.buf.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.buf))
        }
    }
}
