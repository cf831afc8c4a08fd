use std::io::{self, Read};

use crate::charset::{Charset, DecodePolicy, Decoder};
use crate::error::{MalformedInput, Result, TranscodeError};

use super::PeekSource;

/// A byte source decoded to UTF-8 under one charset.
///
/// Reading yields UTF-8 bytes. The underlying source is only advanced by
/// the bytes handed to the decoder, so peeking through the stream never
/// loses data.
pub struct TextStream<S> {
    source: S,
    charset: Charset,
    decoder: Decoder,
    policy: DecodePolicy,
    pending: String,
    pending_pos: usize,
    consumed: u64,
    decoding_started: bool,
    finished: bool,
}

impl<S: PeekSource> TextStream<S> {
    /// Decode `source` as `charset`, failing on malformed input.
    pub fn new(source: S, charset: Charset) -> Self {
        Self::with_policy(source, charset, DecodePolicy::Strict)
    }

    pub fn with_policy(source: S, charset: Charset, policy: DecodePolicy) -> Self {
        Self {
            source,
            decoder: charset.new_decoder(),
            charset,
            policy,
            pending: String::new(),
            pending_pos: 0,
            consumed: 0,
            decoding_started: false,
            finished: false,
        }
    }

    /// The declared charset.
    pub fn charset(&self) -> &Charset {
        &self.charset
    }

    pub fn policy(&self) -> DecodePolicy {
        self.policy
    }

    /// Peek raw bytes that have not been handed to the decoder yet.
    pub fn peek_bytes(&mut self, len: usize) -> io::Result<&[u8]> {
        self.source.peek(len)
    }

    /// Whether decoded text is waiting to be read.
    pub fn has_buffered_text(&self) -> bool {
        self.pending_pos < self.pending.len()
    }

    /// True before the first decode and after end of data: the decoder
    /// holds no partial sequence at either point.
    pub fn at_decode_boundary(&self) -> bool {
        !self.decoding_started || self.finished
    }

    /// Raw bytes consumed from the source by this stream.
    pub fn bytes_consumed(&self) -> u64 {
        self.consumed
    }

    /// Give back the byte source, positioned after the last decoded byte.
    ///
    /// Fails when decoded text or decoder state would be lost.
    pub fn detach(self) -> Result<S> {
        if self.has_buffered_text() {
            return Err(TranscodeError::IncompatibleStreamState(format!(
                "{} bytes of text decoded as {} have not been read",
                self.pending.len() - self.pending_pos,
                self.charset
            )));
        }
        if !self.at_decode_boundary() {
            return Err(TranscodeError::IncompatibleStreamState(format!(
                "decoding as {} started {} bytes ago and may hold a partial character",
                self.charset, self.consumed
            )));
        }
        Ok(self.source)
    }

    /// Decode the next chunk into `pending`. Returns false at end of data.
    fn fill_pending(&mut self) -> io::Result<bool> {
        self.pending.clear();
        self.pending_pos = 0;
        while self.pending.is_empty() {
            if self.finished {
                return Ok(false);
            }
            let chunk = self.source.fill_buf()?;
            let last = chunk.is_empty();
            self.decoding_started = true;
            let read = self
                .decoder
                .decode(chunk, &mut self.pending, last, self.policy)
                .map_err(|malformed| {
                    MalformedInput {
                        encoding: self.charset.name(),
                        offset: self.consumed + malformed.offset as u64,
                    }
                    .into_io()
                })?;
            self.source.consume(read);
            self.consumed += read as u64;
            self.finished = last;
        }
        Ok(true)
    }
}

impl<S: PeekSource> Read for TextStream<S> {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        if out.is_empty() {
            return Ok(0);
        }
        if !self.has_buffered_text() && !self.fill_pending()? {
            return Ok(0);
        }
        let available = &self.pending.as_bytes()[self.pending_pos..];
        let n = available.len().min(out.len());
        out[..n].copy_from_slice(&available[..n]);
        self.pending_pos += n;
        Ok(n)
    }
}
