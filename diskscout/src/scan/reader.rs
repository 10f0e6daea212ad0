use std::fs::File;
use std::io::{self, ErrorKind, Read};
use std::path::Path;

use crate::config::DEFAULT_CHUNK_SIZE;

/// Streams a reader as consecutive fixed-size chunks.
///
/// Every chunk except the last is exactly `chunk_size` bytes long, so memory use
/// stays bounded by one chunk regardless of the file size. The buffer is reused
/// between calls; a chunk borrowed from [`ChunkedReader::next_chunk`] is only
/// valid until the next call.
#[derive(Debug)]
pub struct ChunkedReader<R> {
    inner: R,
    buffer: Vec<u8>,
    chunk_size: usize,
    finished: bool,
}

impl ChunkedReader<File> {
    /// Opens a file for chunked reading
    pub fn open(path: &Path, chunk_size: usize) -> io::Result<Self> {
        Ok(Self::new(File::open(path)?, chunk_size))
    }
}

impl<R: Read> ChunkedReader<R> {
    /// Wraps a reader. A `chunk_size` of zero falls back to the default size.
    pub fn new(inner: R, chunk_size: usize) -> Self {
        let chunk_size = if chunk_size == 0 {
            DEFAULT_CHUNK_SIZE
        } else {
            chunk_size
        };
        Self {
            inner,
            buffer: Vec::new(),
            chunk_size,
            finished: false,
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Reads the next chunk. Returns `Ok(None)` once the reader is exhausted.
    pub fn next_chunk(&mut self) -> io::Result<Option<&[u8]>> {
        if self.finished {
            return Ok(None);
        }
        if self.buffer.len() != self.chunk_size {
            self.buffer.resize(self.chunk_size, 0);
        }

        // Fill the whole buffer unless the reader ends first, so chunk
        // boundaries do not depend on how the OS splits reads.
        let mut filled = 0;
        while filled < self.chunk_size {
            match self.inner.read(&mut self.buffer[filled..]) {
                Ok(0) => {
                    self.finished = true;
                    break;
                }
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }

        if filled == 0 {
            return Ok(None);
        }
        Ok(Some(&self.buffer[..filled]))
    }
}
