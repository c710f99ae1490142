//! Streaming lzma compression over abstract byte sinks and sources.
//!
//! Diary files are single `.xz` streams (CRC64-checked, self-terminating)
//! written through [`StreamCompressor`] and read back through
//! [`StreamDecompressor`]. Both chunk their work through a fixed staging
//! buffer so callers can push or pull slices of any size.

use std::io::{Read, Write};

use xz2::stream::{Action, Check, Status, Stream};

use crate::error::{DiaryError, ErrorSink};

/// Staging buffer size for both directions.
const CHUNK_SIZE: usize = 8 * 1024;

/// Compression preset. The diary favors throughput over ratio: frames are
/// large and short-lived, and capture must never wait on the compressor.
const PRESET: u32 = 0;

/// Writes an lzma-compressed stream to an underlying byte sink.
///
/// A hard codec or sink failure is reported once through the shared error
/// sink; after that the compressor goes silent and drops all further input,
/// leaving the file truncated rather than corrupt.
pub struct StreamCompressor<W: Write> {
    sink: W,
    stream: Stream,
    out_buf: Box<[u8; CHUNK_SIZE]>,
    failed: bool,
    on_error: ErrorSink,
}

impl<W: Write> StreamCompressor<W> {
    /// Create a compressor bound to `sink`.
    ///
    /// Codec setup failure is reported through `on_error` and returned.
    pub fn new(sink: W, on_error: ErrorSink) -> Result<Self, DiaryError> {
        let stream = match Stream::new_easy_encoder(PRESET, Check::Crc64) {
            Ok(s) => s,
            Err(e) => {
                let err = DiaryError::Lzma(e);
                on_error(&err);
                return Err(err);
            }
        };
        Ok(Self {
            sink,
            stream,
            out_buf: Box::new([0; CHUNK_SIZE]),
            failed: false,
            on_error,
        })
    }

    /// Whether a hard failure has silenced this stream.
    pub fn is_failed(&self) -> bool {
        self.failed
    }

    /// Compress and write an arbitrary-length byte slice.
    pub fn push(&mut self, mut data: &[u8]) {
        while !data.is_empty() && !self.failed {
            let before_in = self.stream.total_in();
            let before_out = self.stream.total_out();
            match self.stream.process(data, &mut self.out_buf[..], Action::Run) {
                Ok(_) => {}
                Err(e) => {
                    self.fail(DiaryError::Lzma(e));
                    return;
                }
            }
            let consumed = (self.stream.total_in() - before_in) as usize;
            let produced = (self.stream.total_out() - before_out) as usize;
            if let Err(e) = self.sink.write_all(&self.out_buf[..produced]) {
                self.fail(DiaryError::Io(e));
                return;
            }
            data = &data[consumed..];
        }
    }

    /// Drain the codec into the stream-ending marker and flush the sink.
    ///
    /// Must be called before the underlying file is closed; a stream that is
    /// dropped without `finish` decodes as truncated.
    pub fn finish(mut self) {
        while !self.failed {
            let before_out = self.stream.total_out();
            let status = match self.stream.process(&[], &mut self.out_buf[..], Action::Finish) {
                Ok(s) => s,
                Err(e) => {
                    self.fail(DiaryError::Lzma(e));
                    return;
                }
            };
            let produced = (self.stream.total_out() - before_out) as usize;
            if let Err(e) = self.sink.write_all(&self.out_buf[..produced]) {
                self.fail(DiaryError::Io(e));
                return;
            }
            if status == Status::StreamEnd {
                break;
            }
        }
        if let Err(e) = self.sink.flush() {
            self.fail(DiaryError::Io(e));
        }
    }

    fn fail(&mut self, err: DiaryError) {
        (self.on_error)(&err);
        self.failed = true;
    }
}

/// Reads an lzma-compressed stream from an underlying byte source.
///
/// A decode error mid-stream is treated as silent truncation: everything
/// decoded so far is kept, decoding stops, and no error is raised. Readers
/// observe the same thing they would at a clean end-of-stream, just earlier.
pub struct StreamDecompressor<R: Read> {
    source: R,
    stream: Stream,
    in_buf: Box<[u8; CHUNK_SIZE]>,
    in_pos: usize,
    in_len: usize,
    source_eof: bool,
    done: bool,
}

impl<R: Read> StreamDecompressor<R> {
    /// Create a decompressor over `source`.
    pub fn new(source: R) -> Result<Self, DiaryError> {
        let stream = Stream::new_stream_decoder(u64::MAX, 0)?;
        Ok(Self {
            source,
            stream,
            in_buf: Box::new([0; CHUNK_SIZE]),
            in_pos: 0,
            in_len: 0,
            source_eof: false,
            done: false,
        })
    }

    /// Fill as much of `out` as the stream still has, returning the count.
    pub fn pull(&mut self, out: &mut [u8]) -> usize {
        let mut filled = 0;
        while filled < out.len() && !self.done {
            if self.in_pos == self.in_len && !self.source_eof {
                match self.source.read(&mut self.in_buf[..]) {
                    Ok(0) => self.source_eof = true,
                    Ok(n) => {
                        self.in_pos = 0;
                        self.in_len = n;
                    }
                    // read errors end the usable data, same as a short file
                    Err(_) => self.source_eof = true,
                }
            }

            let input = &self.in_buf[self.in_pos..self.in_len];
            let before_in = self.stream.total_in();
            let before_out = self.stream.total_out();
            let status = match self.stream.process(input, &mut out[filled..], Action::Run) {
                Ok(s) => s,
                Err(_) => {
                    // corrupt tail: keep what we decoded, stop quietly
                    self.done = true;
                    break;
                }
            };
            let consumed = (self.stream.total_in() - before_in) as usize;
            let produced = (self.stream.total_out() - before_out) as usize;
            self.in_pos += consumed;
            filled += produced;

            if status == Status::StreamEnd {
                self.done = true;
            } else if produced == 0 && self.in_pos == self.in_len && self.source_eof {
                // source exhausted mid-stream
                self.done = true;
            }
        }
        filled
    }

    /// Fill `out` completely, or report a short/zero read.
    pub fn pull_exact(&mut self, out: &mut [u8]) -> bool {
        self.pull(out) == out.len()
    }

    /// Advance the logical decompressed stream by `count` bytes without
    /// keeping them. Used to hop over pixel payloads when scanning headers.
    pub fn skip(&mut self, count: usize) -> bool {
        let mut scratch = [0u8; CHUNK_SIZE];
        let mut remaining = count;
        while remaining > 0 {
            let want = remaining.min(CHUNK_SIZE);
            let got = self.pull(&mut scratch[..want]);
            if got < want {
                return false;
            }
            remaining -= got;
        }
        true
    }

    /// Whether the stream has ended (cleanly or by truncation).
    pub fn is_exhausted(&self) -> bool {
        self.done
    }
}
