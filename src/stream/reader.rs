//! `io::Read`-backed streaming unpacker.

use std::io::{self, Read};

use tracing::{debug, trace};

use crate::codec::{Error, OwnedItem, Result, Unpacker};

/// Window growth increment per refill.
const DEFAULT_CHUNK: usize = 8 * 1024;

/// Streaming decoder that owns its window and copies items out.
///
/// Items are detached from the window as [`OwnedItem`]s so the window can
/// be compacted and refilled underneath them. A stream that ends exactly at
/// an item boundary reports `Ok(None)`; a stream truncated inside an item
/// reports [`Error::BufferUnderflow`].
///
/// Reader failures surface as [`Error::ErrorInHandler`] carrying the OS
/// errno when one exists; the full [`io::Error`] is stashed and can be
/// retrieved with [`ReadUnpacker::take_io_error`].
#[derive(Debug)]
pub struct ReadUnpacker<R: Read> {
    reader: R,
    window: Vec<u8>,
    start: usize,
    chunk: usize,
    eof: bool,
    io_error: Option<io::Error>,
}

impl<R: Read> ReadUnpacker<R> {
    /// Wrap a reader with the default window increment.
    pub fn new(reader: R) -> Self {
        Self::with_chunk_size(reader, DEFAULT_CHUNK)
    }

    /// Wrap a reader, growing the window by `chunk` bytes per refill.
    pub fn with_chunk_size(reader: R, chunk: usize) -> Self {
        assert!(chunk > 0, "chunk must be positive");
        Self {
            reader,
            window: Vec::new(),
            start: 0,
            chunk,
            eof: false,
            io_error: None,
        }
    }

    /// Take the I/O error behind the last `ErrorInHandler`, if any.
    pub fn take_io_error(&mut self) -> Option<io::Error> {
        self.io_error.take()
    }

    /// Unwrap the inner reader, discarding buffered bytes.
    pub fn into_inner(self) -> R {
        self.reader
    }

    /// Decode the next item, refilling from the reader as needed.
    pub fn next_item(&mut self) -> Result<Option<OwnedItem>> {
        loop {
            let mut unpacker = Unpacker::new(&self.window[self.start..]);
            match unpacker.next_item() {
                Ok(item) => {
                    let item = item.to_owned();
                    self.start += unpacker.position();
                    return Ok(Some(item));
                }
                Err(Error::EndOfInput) if self.eof => return Ok(None),
                Err(Error::EndOfInput) => self.fill(1)?,
                Err(Error::BufferUnderflow { needed }) => {
                    if self.eof {
                        return Err(Error::BufferUnderflow { needed });
                    }
                    self.fill(needed)?;
                }
                Err(err) => return Err(err),
            }
        }
    }

    fn fill(&mut self, hint: usize) -> Result<()> {
        if self.start > 0 {
            self.window.drain(..self.start);
            self.start = 0;
        }
        let target = self.chunk.max(hint);
        let old_len = self.window.len();
        self.window.resize(old_len + target, 0);

        let mut read_total = 0;
        while read_total == 0 {
            match self.reader.read(&mut self.window[old_len + read_total..]) {
                Ok(0) => {
                    debug!("input stream ended");
                    self.eof = true;
                    break;
                }
                Ok(n) => read_total += n,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
                Err(err) => {
                    self.window.truncate(old_len);
                    return Err(self.stash(err));
                }
            }
        }
        self.window.truncate(old_len + read_total);
        trace!(
            bytes = read_total,
            window = self.window.len(),
            "refilled unpack window"
        );
        Ok(())
    }

    fn stash(&mut self, err: io::Error) -> Error {
        let code = err.raw_os_error().unwrap_or(-1);
        self.io_error = Some(err);
        Error::ErrorInHandler { code }
    }
}
