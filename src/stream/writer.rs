//! `io::Write`-backed pack sink.

use std::io::{self, Write};

use tracing::trace;

use crate::codec::{Error, PackSink, Result};

/// Pack sink that drains the filled window prefix to a writer.
///
/// On overflow the written bytes are handed to the writer and the window is
/// reused from the start, so a fixed window streams arbitrarily long
/// output. An item larger than the whole window still fails with
/// [`Error::BufferOverflow`].
///
/// Writer failures surface as [`Error::ErrorInHandler`] carrying the OS
/// errno when one exists; the full [`io::Error`] is stashed and can be
/// retrieved with [`WriteFlush::take_io_error`].
#[derive(Debug)]
pub struct WriteFlush<W: Write> {
    writer: W,
    io_error: Option<io::Error>,
}

impl<W: Write> WriteFlush<W> {
    /// Wrap a writer.
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            io_error: None,
        }
    }

    /// Take the I/O error behind the last `ErrorInHandler`, if any.
    pub fn take_io_error(&mut self) -> Option<io::Error> {
        self.io_error.take()
    }

    /// Unwrap the inner writer.
    pub fn into_inner(self) -> W {
        self.writer
    }

    fn stash(&mut self, err: io::Error) -> Error {
        let code = err.raw_os_error().unwrap_or(-1);
        self.io_error = Some(err);
        Error::ErrorInHandler { code }
    }

    fn drain(&mut self, window: &[u8], filled: &mut usize) -> Result<()> {
        if *filled == 0 {
            return Ok(());
        }
        match self.writer.write_all(&window[..*filled]) {
            Ok(()) => {
                trace!(bytes = *filled, "drained pack window");
                *filled = 0;
                Ok(())
            }
            Err(err) => Err(self.stash(err)),
        }
    }
}

impl<'a, W: Write> PackSink<'a> for WriteFlush<W> {
    fn overflow(
        &mut self,
        window: &mut &'a mut [u8],
        filled: &mut usize,
        needed: usize,
    ) -> Result<()> {
        self.drain(&window[..], filled)?;
        if window.len() < needed {
            return Err(Error::BufferOverflow { needed });
        }
        Ok(())
    }

    fn flush(&mut self, window: &mut &'a mut [u8], filled: &mut usize) -> Result<()> {
        self.drain(&window[..], filled)?;
        self.writer.flush().map_err(|err| self.stash(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{Item, Packer, Unpacker};

    #[test]
    fn test_long_output_streams_through_small_window() {
        let mut out = Vec::new();
        let mut window = [0u8; 16];
        let mut packer = Packer::with_sink(&mut window, WriteFlush::new(&mut out));

        packer.pack_array_size(100).unwrap();
        for i in 0..100 {
            packer.pack_unsigned(i).unwrap();
        }
        packer.flush().unwrap();
        assert_eq!(packer.return_code(), 0);
        drop(packer);

        let mut unpacker = Unpacker::new(&out);
        assert_eq!(unpacker.next_item(), Ok(Item::Array(100)));
        for i in 0..100 {
            assert_eq!(unpacker.next_item(), Ok(Item::PositiveInteger(i)));
        }
        assert_eq!(unpacker.next_item(), Err(Error::EndOfInput));
    }

    #[test]
    fn test_item_wider_than_window_overflows() {
        let mut out = Vec::new();
        let mut window = [0u8; 8];
        let mut packer = Packer::with_sink(&mut window, WriteFlush::new(&mut out));

        let err = packer.pack_bin(&[0u8; 32]).unwrap_err();
        assert_eq!(err, Error::BufferOverflow { needed: 34 });
    }

    #[test]
    fn test_writer_failure_reports_handler_error() {
        struct Broken;
        impl Write for Broken {
            fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
                Err(io::Error::other("wire cut"))
            }
            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }

        let mut window = [0u8; 4];
        let mut packer = Packer::with_sink(&mut window, WriteFlush::new(Broken));
        packer.pack_unsigned(1).unwrap();
        let err = packer.pack_double(0.5).unwrap_err();
        assert_eq!(err.code(), -6);
        assert!(packer.sink_mut().take_io_error().is_some());
    }
}
