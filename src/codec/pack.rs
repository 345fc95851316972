//! Packing context and the per-type encoders.

use std::mem;

use super::error::{Error, Result};
use super::wire;

/// Handler consulted when the packer needs space it does not have.
///
/// The handler owns the relationship between the packer's window and
/// whatever backs it: it may drain written bytes to an output, swap in a
/// larger region, or refuse. The packer stores the handler by value.
pub trait PackSink<'a> {
    /// Make at least `needed` contiguous free bytes available.
    ///
    /// `window` is the whole writable region and `*filled` counts the valid
    /// bytes at its start. The handler may drain the filled prefix and
    /// reset `*filled`, replace `*window` with a region that starts with
    /// the same filled prefix, or both. An error becomes the packer's
    /// terminal fault.
    fn overflow(
        &mut self,
        window: &mut &'a mut [u8],
        filled: &mut usize,
        needed: usize,
    ) -> Result<()>;

    /// Consume the filled prefix of the window and reset it.
    ///
    /// The default refuses, matching a context without a flush handler.
    fn flush(&mut self, window: &mut &'a mut [u8], filled: &mut usize) -> Result<()> {
        let _ = (window, filled);
        Err(Error::IllegalCall {
            reason: "no flush handler installed",
        })
    }
}

/// Sink for fixed windows: running out of space is final.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoSink;

impl<'a> PackSink<'a> for NoSink {
    fn overflow(
        &mut self,
        _window: &mut &'a mut [u8],
        _filled: &mut usize,
        needed: usize,
    ) -> Result<()> {
        Err(Error::BufferOverflow { needed })
    }
}

/// Streaming MessagePack encoder over a caller-owned window.
///
/// Every operation picks the tightest wire form for its value, reserves the
/// exact number of bytes (consulting the sink when short) and advances the
/// write position. The first error makes the context terminal: later
/// operations return the stored error without writing anything.
#[derive(Debug)]
pub struct Packer<'a, S: PackSink<'a> = NoSink> {
    window: &'a mut [u8],
    filled: usize,
    compatible: bool,
    fault: Option<Error>,
    err_no: i32,
    sink: S,
}

impl<'a> Packer<'a, NoSink> {
    /// Create a packer over a fixed window.
    #[must_use]
    pub fn new(window: &'a mut [u8]) -> Self {
        Self::with_sink(window, NoSink)
    }
}

impl<'a, S: PackSink<'a>> Packer<'a, S> {
    /// Create a packer whose space exhaustion is handled by `sink`.
    ///
    /// Under a mismatched endianness declaration the context starts
    /// terminal with [`Error::WrongByteOrder`].
    pub fn with_sink(window: &'a mut [u8], sink: S) -> Self {
        Self {
            window,
            filled: 0,
            compatible: false,
            fault: wire::probe_byte_order().err(),
            err_no: 0,
            sink,
        }
    }

    /// Bytes written and not yet flushed.
    #[must_use]
    pub fn written(&self) -> &[u8] {
        &self.window[..self.filled]
    }

    /// Free bytes left in the current window.
    #[must_use]
    pub fn remaining_capacity(&self) -> usize {
        self.window.len() - self.filled
    }

    /// First error recorded on this context, if any.
    #[must_use]
    pub fn fault(&self) -> Option<Error> {
        self.fault
    }

    /// Numeric return code: 0 while healthy, the first error's code after.
    #[must_use]
    pub fn return_code(&self) -> i32 {
        self.fault.map_or(0, Error::code)
    }

    /// Auxiliary diagnostic slot.
    #[must_use]
    pub fn err_no(&self) -> i32 {
        self.err_no
    }

    /// Store an auxiliary diagnostic code next to the fault.
    pub fn set_err_no(&mut self, err_no: i32) {
        self.err_no = err_no;
    }

    /// Whether the pre-2013 compatibility profile is active.
    #[must_use]
    pub fn is_compatible(&self) -> bool {
        self.compatible
    }

    /// Toggle the pre-2013 compatibility profile.
    ///
    /// The profile suppresses `str 8`, routes binary payloads through the
    /// str family and rejects extensions and timestamps.
    pub fn set_compatibility(&mut self, be_compatible: bool) {
        self.compatible = be_compatible;
    }

    /// Access the sink handler.
    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    /// Consume the packer, returning its sink.
    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Write a nil.
    pub fn pack_nil(&mut self) -> Result<()> {
        self.guard()?;
        self.emit(wire::NIL, &[])
    }

    /// Write a boolean.
    pub fn pack_bool(&mut self, value: bool) -> Result<()> {
        self.guard()?;
        self.emit(if value { wire::TRUE } else { wire::FALSE }, &[])
    }

    /// Write an unsigned integer in its shortest wire form.
    pub fn pack_unsigned(&mut self, value: u64) -> Result<()> {
        self.guard()?;
        if value < 128 {
            self.emit(value as u8, &[])
        } else if value < 256 {
            self.emit(wire::UINT8, &[value as u8])
        } else if value < 0x1_0000 {
            self.emit(wire::UINT16, &(value as u16).to_be_bytes())
        } else if value < 0x1_0000_0000 {
            self.emit(wire::UINT32, &(value as u32).to_be_bytes())
        } else {
            self.emit(wire::UINT64, &value.to_be_bytes())
        }
    }

    /// Write a signed integer in its shortest wire form.
    ///
    /// Non-negative values take the same forms as [`Packer::pack_unsigned`].
    pub fn pack_signed(&mut self, value: i64) -> Result<()> {
        self.guard()?;
        if value >= 0 {
            return self.pack_unsigned(value as u64);
        }
        if value >= -32 {
            self.emit(value as u8, &[])
        } else if value >= i64::from(i8::MIN) {
            self.emit(wire::INT8, &(value as i8).to_be_bytes())
        } else if value >= i64::from(i16::MIN) {
            self.emit(wire::INT16, &(value as i16).to_be_bytes())
        } else if value >= i64::from(i32::MIN) {
            self.emit(wire::INT32, &(value as i32).to_be_bytes())
        } else {
            self.emit(wire::INT64, &value.to_be_bytes())
        }
    }

    /// Write an IEEE-754 binary32, always 5 bytes.
    pub fn pack_float(&mut self, value: f32) -> Result<()> {
        self.guard()?;
        self.emit(wire::FLOAT32, &value.to_bits().to_be_bytes())
    }

    /// Write an IEEE-754 binary64, always 9 bytes.
    pub fn pack_double(&mut self, value: f64) -> Result<()> {
        self.guard()?;
        self.emit(wire::FLOAT64, &value.to_bits().to_be_bytes())
    }

    /// Write an array header; the caller must follow with `size` items.
    pub fn pack_array_size(&mut self, size: u32) -> Result<()> {
        self.guard()?;
        if size < 16 {
            self.emit(wire::FIXARRAY | size as u8, &[])
        } else if size < 0x1_0000 {
            self.emit(wire::ARRAY16, &(size as u16).to_be_bytes())
        } else {
            self.emit(wire::ARRAY32, &size.to_be_bytes())
        }
    }

    /// Write a map header; the caller must follow with `size` key/value
    /// pairs, key first.
    pub fn pack_map_size(&mut self, size: u32) -> Result<()> {
        self.guard()?;
        if size < 16 {
            self.emit(wire::FIXMAP | size as u8, &[])
        } else if size < 0x1_0000 {
            self.emit(wire::MAP16, &(size as u16).to_be_bytes())
        } else {
            self.emit(wire::MAP32, &size.to_be_bytes())
        }
    }

    /// Write a str item.
    pub fn pack_str(&mut self, value: &str) -> Result<()> {
        self.guard()?;
        let length = self.blob_length(value.len())?;
        self.emit_str(value.as_bytes(), length)
    }

    /// Write a bin item.
    ///
    /// The compatibility profile has no bin family; the payload is routed
    /// through the str forms there.
    pub fn pack_bin(&mut self, value: &[u8]) -> Result<()> {
        self.guard()?;
        let length = self.blob_length(value.len())?;
        if self.compatible {
            return self.emit_str(value, length);
        }
        if length < 256 {
            self.emit_blob(wire::BIN8, &[length as u8], value)
        } else if length < 0x1_0000 {
            self.emit_blob(wire::BIN16, &(length as u16).to_be_bytes(), value)
        } else {
            self.emit_blob(wire::BIN32, &length.to_be_bytes(), value)
        }
    }

    /// Write an extension item with its type code.
    ///
    /// Payloads of exactly 1, 2, 4, 8 or 16 bytes take the fixext forms.
    pub fn pack_ext(&mut self, type_code: i8, payload: &[u8]) -> Result<()> {
        self.guard()?;
        if self.compatible {
            return Err(self.fail(Error::IllegalCall {
                reason: "ext is not part of the compatibility profile",
            }));
        }
        let length = self.blob_length(payload.len())?;
        let type_byte = type_code as u8;
        match length {
            1 => self.emit_blob(wire::FIXEXT1, &[type_byte], payload),
            2 => self.emit_blob(wire::FIXEXT2, &[type_byte], payload),
            4 => self.emit_blob(wire::FIXEXT4, &[type_byte], payload),
            8 => self.emit_blob(wire::FIXEXT8, &[type_byte], payload),
            16 => self.emit_blob(wire::FIXEXT16, &[type_byte], payload),
            _ if length < 256 => self.emit_blob(wire::EXT8, &[length as u8, type_byte], payload),
            _ if length < 0x1_0000 => {
                let mut field = [0u8; 3];
                field[..2].copy_from_slice(&(length as u16).to_be_bytes());
                field[2] = type_byte;
                self.emit_blob(wire::EXT16, &field, payload)
            }
            _ => {
                let mut field = [0u8; 5];
                field[..4].copy_from_slice(&length.to_be_bytes());
                field[4] = type_byte;
                self.emit_blob(wire::EXT32, &field, payload)
            }
        }
    }

    /// Write a timestamp in the narrowest of the three wire widths.
    pub fn pack_time(&mut self, sec: i64, nsec: u32) -> Result<()> {
        self.guard()?;
        if self.compatible {
            return Err(self.fail(Error::IllegalCall {
                reason: "timestamp is not part of the compatibility profile",
            }));
        }
        if nsec >= wire::NANOS_PER_SECOND {
            return Err(self.fail(Error::ValueError {
                reason: "nanoseconds not below one second",
            }));
        }
        if (sec as u64 & wire::TS96_SECONDS_MASK) != 0 {
            // timestamp 96: separate nanoseconds and seconds fields
            let mut field = [0u8; 14];
            field[0] = 12;
            field[1] = wire::TIMESTAMP_TYPE as u8;
            field[2..6].copy_from_slice(&nsec.to_be_bytes());
            field[6..].copy_from_slice(&sec.to_be_bytes());
            self.emit(wire::EXT8, &field)
        } else {
            let data64 = (u64::from(nsec) << 34) | sec as u64;
            if (data64 & wire::TS64_OVERFLOW_MASK) != 0 {
                // timestamp 64: 30-bit nanoseconds over 34-bit seconds
                let mut field = [0u8; 9];
                field[0] = wire::TIMESTAMP_TYPE as u8;
                field[1..].copy_from_slice(&data64.to_be_bytes());
                self.emit(wire::FIXEXT8, &field)
            } else {
                // timestamp 32: seconds only
                let mut field = [0u8; 5];
                field[0] = wire::TIMESTAMP_TYPE as u8;
                field[1..].copy_from_slice(&(data64 as u32).to_be_bytes());
                self.emit(wire::FIXEXT4, &field)
            }
        }
    }

    /// Copy pre-encoded bytes into the stream verbatim.
    ///
    /// No validation is performed; the fragment is trusted to hold whole
    /// encoded items.
    pub fn insert(&mut self, fragment: &[u8]) -> Result<()> {
        self.guard()?;
        self.reserve(fragment.len())?;
        self.put(fragment);
        Ok(())
    }

    /// Hand the filled window prefix to the sink's flush.
    pub fn flush(&mut self) -> Result<()> {
        self.guard()?;
        let mut window = mem::take(&mut self.window);
        let mut filled = self.filled;
        let outcome = self.sink.flush(&mut window, &mut filled);
        self.window = window;
        self.filled = filled;
        outcome.map_err(|err| self.fail(err))
    }

    fn guard(&self) -> Result<()> {
        match self.fault {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn fail(&mut self, err: Error) -> Error {
        if self.fault.is_none() {
            self.fault = Some(err);
        }
        err
    }

    fn blob_length(&mut self, len: usize) -> Result<u32> {
        u32::try_from(len).map_err(|_| {
            self.fail(Error::ValueError {
                reason: "payload exceeds the 32-bit wire length field",
            })
        })
    }

    /// Ensure `needed` free bytes, consulting the sink when short.
    fn reserve(&mut self, needed: usize) -> Result<()> {
        if self.window.len() - self.filled >= needed {
            return Ok(());
        }
        let mut window = mem::take(&mut self.window);
        let mut filled = self.filled;
        let outcome = self.sink.overflow(&mut window, &mut filled, needed);
        self.window = window;
        self.filled = filled;
        match outcome {
            Ok(()) if self.window.len() - self.filled >= needed => Ok(()),
            Ok(()) => Err(self.fail(Error::BufferOverflow { needed })),
            Err(err) => Err(self.fail(err)),
        }
    }

    fn put(&mut self, bytes: &[u8]) {
        self.window[self.filled..self.filled + bytes.len()].copy_from_slice(bytes);
        self.filled += bytes.len();
    }

    fn emit(&mut self, opcode: u8, field: &[u8]) -> Result<()> {
        self.reserve(1 + field.len())?;
        self.window[self.filled] = opcode;
        self.filled += 1;
        self.put(field);
        Ok(())
    }

    fn emit_blob(&mut self, opcode: u8, field: &[u8], payload: &[u8]) -> Result<()> {
        self.reserve(1 + field.len() + payload.len())?;
        self.window[self.filled] = opcode;
        self.filled += 1;
        self.put(field);
        self.put(payload);
        Ok(())
    }

    fn emit_str(&mut self, payload: &[u8], length: u32) -> Result<()> {
        if length < 32 {
            self.emit_blob(wire::FIXSTR | length as u8, &[], payload)
        } else if length < 256 && !self.compatible {
            self.emit_blob(wire::STR8, &[length as u8], payload)
        } else if length < 0x1_0000 {
            self.emit_blob(wire::STR16, &(length as u16).to_be_bytes(), payload)
        } else {
            self.emit_blob(wire::STR32, &length.to_be_bytes(), payload)
        }
    }
}
