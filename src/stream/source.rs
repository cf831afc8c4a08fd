use std::io::{self, BufRead, Read};

/// Default buffer capacity of a [`ByteSource`].
const DEFAULT_CAPACITY: usize = 8 * 1024;

/// A buffered byte source that can look ahead without consuming.
pub trait PeekSource: BufRead {
    /// Return up to `len` upcoming bytes without advancing the read position.
    ///
    /// Fewer than `len` bytes are returned only at end of data.
    fn peek(&mut self, len: usize) -> io::Result<&[u8]>;
}

impl PeekSource for &[u8] {
    fn peek(&mut self, len: usize) -> io::Result<&[u8]> {
        Ok(&self[..len.min(self.len())])
    }
}

/// Wraps any reader with a growable look-ahead buffer.
pub struct ByteSource<R> {
    inner: R,
    buf: Vec<u8>,
    pos: usize,
    capacity: usize,
}

impl<R: Read> ByteSource<R> {
    pub fn new(inner: R) -> Self {
        Self::with_capacity(DEFAULT_CAPACITY, inner)
    }

    /// Create a source whose regular reads fetch `capacity` bytes at a time.
    pub fn with_capacity(capacity: usize, inner: R) -> Self {
        Self {
            inner,
            buf: Vec::with_capacity(capacity),
            pos: 0,
            capacity: capacity.max(1),
        }
    }

    /// Number of bytes buffered but not yet consumed.
    pub fn buffered(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Move unconsumed bytes to the front of the buffer.
    fn compact(&mut self) {
        if self.pos > 0 {
            self.buf.drain(..self.pos);
            self.pos = 0;
        }
    }

    /// Read once from the inner reader, appending up to `want` bytes.
    fn read_more(&mut self, want: usize) -> io::Result<usize> {
        let start = self.buf.len();
        self.buf.resize(start + want, 0);
        loop {
            match self.inner.read(&mut self.buf[start..]) {
                Ok(n) => {
                    self.buf.truncate(start + n);
                    return Ok(n);
                }
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => {
                    self.buf.truncate(start);
                    return Err(err);
                }
            }
        }
    }
}

impl<R: Read> Read for ByteSource<R> {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        let available = self.fill_buf()?;
        let n = available.len().min(out.len());
        out[..n].copy_from_slice(&available[..n]);
        self.consume(n);
        Ok(n)
    }
}

impl<R: Read> BufRead for ByteSource<R> {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        if self.pos >= self.buf.len() {
            self.buf.clear();
            self.pos = 0;
            self.read_more(self.capacity)?;
        }
        Ok(&self.buf[self.pos..])
    }

    fn consume(&mut self, amt: usize) {
        self.pos = (self.pos + amt).min(self.buf.len());
    }
}

impl<R: Read> PeekSource for ByteSource<R> {
    fn peek(&mut self, len: usize) -> io::Result<&[u8]> {
        if self.buffered() < len {
            self.compact();
            while self.buf.len() < len {
                let want = (len - self.buf.len()).max(self.capacity);
                if self.read_more(want)? == 0 {
                    break;
                }
            }
        }
        let end = (self.pos + len).min(self.buf.len());
        Ok(&self.buf[self.pos..end])
    }
}
