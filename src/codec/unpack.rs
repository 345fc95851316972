//! Unpacking context: item decoding, look-ahead and skipping.

use super::error::{Error, Result};
use super::item::{Item, ItemKind, TimeSpec, TimestampItem};
use super::wire;

/// Source consulted when the unpacker needs bytes it does not have.
///
/// The unpacker stores the source by value and calls it whenever a read
/// would run past the window.
pub trait FillSource<'a> {
    /// Make at least `needed` bytes readable at `*pos`.
    ///
    /// `window` is the readable region and `*pos` its first unread byte.
    /// The handler may reveal more of the same region or replace `*window`
    /// (adjusting `*pos`) as long as the unread bytes are preserved in
    /// order. Report exhaustion with [`Error::EndOfInput`]; the unpacker
    /// re-grades it to [`Error::BufferUnderflow`] when it strikes inside an
    /// item. Any other error becomes the context's terminal fault.
    fn refill(&mut self, window: &mut &'a [u8], pos: &mut usize, needed: usize) -> Result<()>;
}

/// Source for fixed windows: exhaustion is final.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoFill;

impl<'a> FillSource<'a> for NoFill {
    fn refill(&mut self, _window: &mut &'a [u8], _pos: &mut usize, _needed: usize) -> Result<()> {
        Err(Error::EndOfInput)
    }
}

/// Streaming MessagePack decoder over a caller-owned window.
///
/// [`Unpacker::next_item`] reports one item per call as a tagged value
/// whose blob payloads borrow the window; a refill invalidates outstanding
/// payloads, so copy them out first. The first error makes the context
/// terminal: later calls return the stored error without moving the cursor.
#[derive(Debug)]
pub struct Unpacker<'a, F: FillSource<'a> = NoFill> {
    window: &'a [u8],
    pos: usize,
    fault: Option<Error>,
    err_no: i32,
    source: F,
}

impl<'a> Unpacker<'a, NoFill> {
    /// Create an unpacker over a fixed window.
    #[must_use]
    pub fn new(window: &'a [u8]) -> Self {
        Self::with_source(window, NoFill)
    }
}

impl<'a, F: FillSource<'a>> Unpacker<'a, F> {
    /// Create an unpacker whose exhaustion is handled by `source`.
    ///
    /// Under a mismatched endianness declaration the context starts
    /// terminal with [`Error::WrongByteOrder`].
    pub fn with_source(window: &'a [u8], source: F) -> Self {
        Self {
            window,
            pos: 0,
            fault: wire::probe_byte_order().err(),
            err_no: 0,
            source,
        }
    }

    /// Unread bytes left in the current window.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.window.len() - self.pos
    }

    /// Read offset within the current window (a refill may remap it).
    #[must_use]
    pub fn position(&self) -> usize {
        self.pos
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

    /// Access the fill source.
    pub fn source_mut(&mut self) -> &mut F {
        &mut self.source
    }

    /// Decode the next item and advance past it.
    ///
    /// Scalars and blobs are consumed whole; containers report their header
    /// only. An exhausted window before the first byte reports
    /// [`Error::EndOfInput`]; exhaustion inside an item reports
    /// [`Error::BufferUnderflow`].
    pub fn next_item(&mut self) -> Result<Item<'a>> {
        self.guard()?;
        self.need(1, true)?;
        let opcode = self.take1();
        match opcode {
            0x00..=0x7f => Ok(Item::PositiveInteger(u64::from(opcode))),
            0x80..=0x8f => Ok(Item::Map(u32::from(opcode & 0x0f))),
            0x90..=0x9f => Ok(Item::Array(u32::from(opcode & 0x0f))),
            0xa0..=0xbf => {
                let length = u32::from(opcode & 0x1f);
                Ok(Item::Str(self.read_blob(length)?))
            }
            wire::NIL => Ok(Item::Nil),
            wire::FALSE => Ok(Item::Boolean(false)),
            wire::TRUE => Ok(Item::Boolean(true)),
            wire::BIN8 => {
                let length = u32::from(self.read_u8()?);
                Ok(Item::Bin(self.read_blob(length)?))
            }
            wire::BIN16 => {
                let length = u32::from(self.read_u16()?);
                Ok(Item::Bin(self.read_blob(length)?))
            }
            wire::BIN32 => {
                let length = self.read_u32()?;
                Ok(Item::Bin(self.read_blob(length)?))
            }
            wire::EXT8 => {
                let length = u32::from(self.read_u8()?);
                self.ext_item(length, true)
            }
            wire::EXT16 => {
                let length = u32::from(self.read_u16()?);
                self.ext_item(length, false)
            }
            wire::EXT32 => {
                let length = self.read_u32()?;
                self.ext_item(length, false)
            }
            wire::FLOAT32 => Ok(Item::Float(f32::from_bits(self.read_u32()?))),
            wire::FLOAT64 => Ok(Item::Double(f64::from_bits(self.read_u64()?))),
            wire::UINT8 => Ok(Item::PositiveInteger(u64::from(self.read_u8()?))),
            wire::UINT16 => Ok(Item::PositiveInteger(u64::from(self.read_u16()?))),
            wire::UINT32 => Ok(Item::PositiveInteger(u64::from(self.read_u32()?))),
            wire::UINT64 => Ok(Item::PositiveInteger(self.read_u64()?)),
            wire::INT8 => Ok(Self::signed_item(i64::from(self.read_u8()? as i8))),
            wire::INT16 => Ok(Self::signed_item(i64::from(self.read_u16()? as i16))),
            wire::INT32 => Ok(Self::signed_item(i64::from(self.read_u32()? as i32))),
            wire::INT64 => Ok(Self::signed_item(self.read_u64()? as i64)),
            wire::FIXEXT1 => self.fixext_item(1),
            wire::FIXEXT2 => self.fixext_item(2),
            wire::FIXEXT4 => self.fixext_item(4),
            wire::FIXEXT8 => self.fixext_item(8),
            wire::FIXEXT16 => self.fixext_item(16),
            wire::STR8 => {
                let length = u32::from(self.read_u8()?);
                Ok(Item::Str(self.read_blob(length)?))
            }
            wire::STR16 => {
                let length = u32::from(self.read_u16()?);
                Ok(Item::Str(self.read_blob(length)?))
            }
            wire::STR32 => {
                let length = self.read_u32()?;
                Ok(Item::Str(self.read_blob(length)?))
            }
            wire::ARRAY16 => Ok(Item::Array(u32::from(self.read_u16()?))),
            wire::ARRAY32 => Ok(Item::Array(self.read_u32()?)),
            wire::MAP16 => Ok(Item::Map(u32::from(self.read_u16()?))),
            wire::MAP32 => Ok(Item::Map(self.read_u32()?)),
            0xe0..=0xff => Ok(Item::NegativeInteger(i64::from(opcode as i8))),
            _ => Err(self.fail(Error::MalformedInput { opcode })),
        }
    }

    /// Report the kind of the next item without consuming it.
    ///
    /// The cursor still points at the opcode byte afterwards, though the
    /// window may have been refilled to peek at ext type codes. `None`
    /// means no item could be classified: either the context carries
    /// [`Error::EndOfInput`]/[`Error::BufferUnderflow`] from the peek, or
    /// the lead byte is reserved.
    pub fn look_ahead(&mut self) -> Option<ItemKind> {
        if self.fault.is_some() {
            return None;
        }
        self.need(1, true).ok()?;
        let opcode = self.window[self.pos];
        match opcode {
            0x00..=0x7f => Some(ItemKind::PositiveInteger),
            0x80..=0x8f => Some(ItemKind::Map),
            0x90..=0x9f => Some(ItemKind::Array),
            0xa0..=0xbf | 0xd9..=0xdb => Some(ItemKind::Str),
            wire::NIL => Some(ItemKind::Nil),
            wire::FALSE | wire::TRUE => Some(ItemKind::Boolean),
            wire::BIN8 | wire::BIN16 | wire::BIN32 => Some(ItemKind::Bin),
            wire::EXT8 => self.peek_ext_type(3),
            wire::EXT16 => self.peek_ext_type(4),
            wire::EXT32 => self.peek_ext_type(6),
            wire::FLOAT32 => Some(ItemKind::Float),
            wire::FLOAT64 => Some(ItemKind::Double),
            0xcc..=0xcf => Some(ItemKind::PositiveInteger),
            0xd0..=0xd3 => Some(ItemKind::NegativeInteger),
            0xd4..=0xd8 => self.peek_ext_type(2),
            wire::ARRAY16 | wire::ARRAY32 => Some(ItemKind::Array),
            wire::MAP16 | wire::MAP32 => Some(ItemKind::Map),
            0xe0..=0xff => Some(ItemKind::NegativeInteger),
            _ => None,
        }
    }

    /// Advance past `count` items without decoding their payloads.
    ///
    /// Container headers enlarge the workload: a map of `k` pairs adds `2k`
    /// pending items and an array of `k` adds `k`. Constant memory at any
    /// nesting depth.
    pub fn skip_items(&mut self, count: u64) -> Result<()> {
        self.guard()?;
        let mut pending = count;
        while pending > 0 {
            pending -= 1;
            self.need(1, true)?;
            let opcode = self.take1();
            match opcode {
                0x00..=0x7f | 0xe0..=0xff | wire::NIL | wire::FALSE | wire::TRUE => {}
                wire::UINT8 | wire::INT8 => self.skip_bytes(1)?,
                wire::UINT16 | wire::INT16 => self.skip_bytes(2)?,
                wire::FIXEXT1 => self.skip_bytes(2)?,
                wire::FIXEXT2 => self.skip_bytes(3)?,
                wire::FLOAT32 | wire::UINT32 | wire::INT32 => self.skip_bytes(4)?,
                wire::FIXEXT4 => self.skip_bytes(5)?,
                wire::FLOAT64 | wire::UINT64 | wire::INT64 => self.skip_bytes(8)?,
                wire::FIXEXT8 => self.skip_bytes(9)?,
                wire::FIXEXT16 => self.skip_bytes(17)?,
                0xa0..=0xbf => self.skip_bytes(usize::from(opcode & 0x1f))?,
                wire::STR8 | wire::BIN8 => {
                    let length = self.read_u8()?;
                    self.skip_bytes(usize::from(length))?;
                }
                wire::STR16 | wire::BIN16 => {
                    let length = self.read_u16()?;
                    self.skip_bytes(usize::from(length))?;
                }
                wire::STR32 | wire::BIN32 => {
                    let length = self.read_u32()?;
                    self.skip_bytes(length as usize)?;
                }
                0x80..=0x8f => pending += 2 * u64::from(opcode & 0x0f),
                0x90..=0x9f => pending += u64::from(opcode & 0x0f),
                wire::ARRAY16 => pending += u64::from(self.read_u16()?),
                wire::ARRAY32 => pending += u64::from(self.read_u32()?),
                wire::MAP16 => pending += 2 * u64::from(self.read_u16()?),
                wire::MAP32 => pending += 2 * u64::from(self.read_u32()?),
                wire::EXT8 => {
                    let length = self.read_u8()?;
                    self.skip_bytes(usize::from(length) + 1)?;
                }
                wire::EXT16 => {
                    let length = self.read_u16()?;
                    self.skip_bytes(usize::from(length) + 1)?;
                }
                wire::EXT32 => {
                    let length = self.read_u32()?;
                    self.skip_bytes(length as usize + 1)?;
                }
                _ => return Err(self.fail(Error::MalformedInput { opcode })),
            }
        }
        Ok(())
    }

    fn ext_item(&mut self, length: u32, is_ext8: bool) -> Result<Item<'a>> {
        self.need(1, false)?;
        let type_code = self.take1() as i8;
        if type_code == wire::TIMESTAMP_TYPE {
            if is_ext8 {
                if length == 12 {
                    self.need(4, false)?;
                    let nsec = u32::from_be_bytes(self.take(4).try_into().unwrap());
                    self.need(8, false)?;
                    let sec = i64::from_be_bytes(self.take(8).try_into().unwrap());
                    return Ok(Item::Timestamp(TimestampItem::Parts(TimeSpec {
                        tv_sec: sec,
                        tv_nsec: nsec,
                    })));
                }
                return Err(self.fail(Error::WrongTimestampLength { length }));
            }
            let payload = self.read_blob(length)?;
            return Ok(Item::Timestamp(TimestampItem::Raw(payload)));
        }
        Ok(Item::Ext(type_code, self.read_blob(length)?))
    }

    fn fixext_item(&mut self, length: u32) -> Result<Item<'a>> {
        self.need(1, false)?;
        let type_code = self.take1() as i8;
        let payload = self.read_blob(length)?;
        if type_code == wire::TIMESTAMP_TYPE {
            Ok(Item::Timestamp(TimestampItem::Raw(payload)))
        } else {
            Ok(Item::Ext(type_code, payload))
        }
    }

    fn signed_item(value: i64) -> Item<'a> {
        if value >= 0 {
            Item::PositiveInteger(value as u64)
        } else {
            Item::NegativeInteger(value)
        }
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

    /// Ensure `needed` unread bytes, consulting the source when short.
    ///
    /// `boundary` marks the first byte of an item, where exhaustion is a
    /// clean end rather than truncation.
    fn need(&mut self, needed: usize, boundary: bool) -> Result<()> {
        if self.window.len() - self.pos >= needed {
            return Ok(());
        }
        let mut window = self.window;
        let mut pos = self.pos;
        let outcome = self.source.refill(&mut window, &mut pos, needed);
        self.window = window;
        self.pos = pos;
        match outcome {
            Ok(()) if self.window.len() - self.pos >= needed => Ok(()),
            Ok(()) | Err(Error::EndOfInput) => Err(self.fail(Self::exhausted(boundary, needed))),
            Err(err) => Err(self.fail(err)),
        }
    }

    const fn exhausted(boundary: bool, needed: usize) -> Error {
        if boundary {
            Error::EndOfInput
        } else {
            Error::BufferUnderflow { needed }
        }
    }

    fn take(&mut self, n: usize) -> &'a [u8] {
        let bytes = &self.window[self.pos..self.pos + n];
        self.pos += n;
        bytes
    }

    fn take1(&mut self) -> u8 {
        let byte = self.window[self.pos];
        self.pos += 1;
        byte
    }

    fn read_u8(&mut self) -> Result<u8> {
        self.need(1, false)?;
        Ok(self.take1())
    }

    fn read_u16(&mut self) -> Result<u16> {
        self.need(2, false)?;
        Ok(u16::from_be_bytes(self.take(2).try_into().unwrap()))
    }

    fn read_u32(&mut self) -> Result<u32> {
        self.need(4, false)?;
        Ok(u32::from_be_bytes(self.take(4).try_into().unwrap()))
    }

    fn read_u64(&mut self) -> Result<u64> {
        self.need(8, false)?;
        Ok(u64::from_be_bytes(self.take(8).try_into().unwrap()))
    }

    fn read_blob(&mut self, length: u32) -> Result<&'a [u8]> {
        let length = length as usize;
        self.need(length, false)?;
        Ok(self.take(length))
    }

    fn skip_bytes(&mut self, n: usize) -> Result<()> {
        self.need(n, false)?;
        self.pos += n;
        Ok(())
    }

    fn peek_ext_type(&mut self, span: usize) -> Option<ItemKind> {
        self.need(span, false).ok()?;
        let type_code = self.window[self.pos + span - 1] as i8;
        Some(ItemKind::from_ext_type(type_code))
    }
}
