//! Buffered byte window over any `Read`
//!
//! Holds the unconsumed tail of the input. The window grows only when a
//! single token does not fit and shrinks back to its initial size as soon
//! as the oversized token has been consumed.

use std::io::{ErrorKind, Read};

/// Buffer size for reading chunks
pub const DEFAULT_BUFFER_SIZE: usize = 64 * 1024;

/// Buffered reader for streaming input
pub struct BufferedReader<R: Read> {
    reader: R,
    buffer: Vec<u8>,
    pos: usize,
    end: usize,
    eof: bool,
    initial_capacity: usize,
    total_read: u64,
}

impl<R: Read> BufferedReader<R> {
    pub fn new(reader: R) -> Self {
        Self::with_capacity(reader, DEFAULT_BUFFER_SIZE)
    }

    /// Create a new buffered reader with specified buffer capacity
    pub fn with_capacity(reader: R, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        BufferedReader {
            reader,
            buffer: vec![0u8; capacity],
            pos: 0,
            end: 0,
            eof: false,
            initial_capacity: capacity,
            total_read: 0,
        }
    }

    /// Read more bytes into the window. Returns false once the source is exhausted.
    pub fn fill_buffer(&mut self) -> std::io::Result<bool> {
        if self.eof {
            return Ok(false);
        }

        // Compact: move remaining data to start
        if self.pos > 0 {
            self.buffer.copy_within(self.pos..self.end, 0);
            self.end -= self.pos;
            self.pos = 0;
        }

        if self.buffer.len() > self.initial_capacity && self.end < self.initial_capacity {
            self.buffer.truncate(self.initial_capacity);
            self.buffer.shrink_to_fit();
        }

        // Window is full of one unfinished token: make room
        if self.end == self.buffer.len() {
            let grown = self.buffer.len() * 2;
            self.buffer.resize(grown, 0);
        }

        loop {
            match self.reader.read(&mut self.buffer[self.end..]) {
                Ok(0) => {
                    self.eof = true;
                    return Ok(false);
                }
                Ok(read) => {
                    self.end += read;
                    self.total_read += read as u64;
                    return Ok(true);
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }

    /// Get current buffered data as a slice
    pub fn buffered(&self) -> &[u8] {
        &self.buffer[self.pos..self.end]
    }

    /// True once the underlying reader has reported end of input
    pub fn is_exhausted(&self) -> bool {
        self.eof
    }

    /// Consume n bytes from the buffer
    pub fn consume(&mut self, n: usize) {
        self.pos += n.min(self.end - self.pos);
    }

    /// Current window allocation in bytes
    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    /// Bytes pulled from the underlying reader so far
    pub fn total_read(&self) -> u64 {
        self.total_read
    }
}
