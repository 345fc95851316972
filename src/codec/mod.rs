//! Streaming MessagePack codec core.
//!
//! This module provides the wire-format state machine: a [`Packer`] that
//! writes typed values into a caller-owned window using the tightest legal
//! encoding, and an [`Unpacker`] that reports one encoded item per call
//! without copying payload bytes. Neither side allocates; space exhaustion
//! is delegated to caller-supplied [`PackSink`]/[`FillSource`] handlers.

mod error;
mod item;
mod pack;
mod unpack;
mod wire;

pub use error::{Error, Result};
pub use item::{Item, ItemKind, OwnedItem, TimeSpec, TimestampItem};
pub use pack::{NoSink, PackSink, Packer};
pub use unpack::{FillSource, NoFill, Unpacker};
pub use wire::TIMESTAMP_TYPE;
