//! wirepack — streaming MessagePack codec with caller-owned buffers.
//!
//! The crate provides two cooperating engines. The [`Packer`] writes a
//! sequence of typed values into a writable window, always choosing the
//! shortest wire form; the [`Unpacker`] scans a readable window and reports
//! the next encoded item as a tagged value whose blob payloads borrow the
//! window instead of being copied. Space exhaustion on either side is
//! delegated to a caller-supplied handler, so fixed windows, growing
//! regions and streaming I/O all ride the same core.
//!
//! # Quick Start
//!
//! ```rust
//! use wirepack::{Item, Packer, Unpacker};
//!
//! let mut buf = [0u8; 64];
//! let mut packer = Packer::new(&mut buf);
//! packer.pack_array_size(3)?;
//! packer.pack_signed(1)?;
//! packer.pack_str("two")?;
//! packer.pack_bool(true)?;
//!
//! let mut unpacker = Unpacker::new(packer.written());
//! assert_eq!(unpacker.next_item()?, Item::Array(3));
//! assert_eq!(unpacker.next_item()?, Item::PositiveInteger(1));
//! assert_eq!(unpacker.next_item()?, Item::Str(b"two"));
//! assert_eq!(unpacker.next_item()?, Item::Boolean(true));
//! # Ok::<(), wirepack::Error>(())
//! ```
//!
//! # Error model
//!
//! Errors are coded, not thrown away: the first error makes a context
//! terminal and every later operation returns it unchanged, so callers may
//! check per call or once per batch. See [`Error::code`] for the numeric
//! code table.
//!
//! # Streaming
//!
//! The [`stream`] module adapts the handler protocol to `std::io`:
//! [`WriteFlush`] drains a fixed window to any writer, and
//! [`ReadUnpacker`] decodes an arbitrarily long stream, copying items out
//! of its window as it refills.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod codec;
pub mod stream;

pub use codec::{
    Error, FillSource, Item, ItemKind, NoFill, NoSink, OwnedItem, PackSink, Packer, Result,
    TimeSpec, TimestampItem, Unpacker, TIMESTAMP_TYPE,
};
pub use stream::{ReadUnpacker, WriteFlush};
