//! Decoded item model.

use std::fmt;

use bytes::Bytes;

use super::error::{Error, Result};
use super::wire;

/// Seconds/nanoseconds pair carried by the timestamp extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimeSpec {
    /// Seconds since the Unix epoch
    pub tv_sec: i64,
    /// Nanoseconds, always below `1_000_000_000`
    pub tv_nsec: u32,
}

impl TimeSpec {
    /// Decode a timestamp extension payload.
    ///
    /// Accepts the three wire widths: 4 bytes (seconds only), 8 bytes
    /// (30-bit nanoseconds over 34-bit seconds) and 12 bytes (full fields).
    pub fn from_payload(payload: &[u8]) -> Result<Self> {
        match payload.len() {
            4 => {
                let sec = u32::from_be_bytes(payload.try_into().unwrap());
                Ok(Self {
                    tv_sec: i64::from(sec),
                    tv_nsec: 0,
                })
            }
            8 => {
                let data64 = u64::from_be_bytes(payload.try_into().unwrap());
                Ok(Self {
                    tv_sec: (data64 & 0x3_ffff_ffff) as i64,
                    tv_nsec: (data64 >> 34) as u32,
                })
            }
            12 => {
                let nsec = u32::from_be_bytes(payload[..4].try_into().unwrap());
                let sec = i64::from_be_bytes(payload[4..].try_into().unwrap());
                Ok(Self {
                    tv_sec: sec,
                    tv_nsec: nsec,
                })
            }
            other => Err(Error::WrongTimestampLength {
                length: u32::try_from(other).unwrap_or(u32::MAX),
            }),
        }
    }
}

/// Timestamp payload, either destructured or still in wire form.
///
/// The decoder destructures only the 12-byte `ext 8` wire form; the fixext
/// forms arrive raw and can be destructured with
/// [`TimestampItem::to_timespec`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimestampItem<B> {
    /// Destructured seconds and nanoseconds
    Parts(TimeSpec),
    /// Undecoded fixext payload
    Raw(B),
}

impl<B: AsRef<[u8]>> TimestampItem<B> {
    /// Destructure the payload, decoding the raw form if necessary.
    pub fn to_timespec(&self) -> Result<TimeSpec> {
        match self {
            Self::Parts(time) => Ok(*time),
            Self::Raw(payload) => TimeSpec::from_payload(payload.as_ref()),
        }
    }
}

/// One decoded MessagePack item.
///
/// Container items carry only their header; the caller drives the children.
/// Blob payloads borrow the unpacker's input window and stay valid until
/// the next refill; use [`Item::to_owned`] to detach them first.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Item<'a> {
    /// Absent value
    Nil,
    /// True or false
    Boolean(bool),
    /// Integer that fits `u64`
    PositiveInteger(u64),
    /// Integer below zero
    NegativeInteger(i64),
    /// IEEE-754 binary32
    Float(f32),
    /// IEEE-754 binary64
    Double(f64),
    /// UTF-8-intended bytes
    Str(&'a [u8]),
    /// Opaque bytes
    Bin(&'a [u8]),
    /// Array header: element count
    Array(u32),
    /// Map header: key/value pair count
    Map(u32),
    /// Extension payload with its type code
    Ext(i8, &'a [u8]),
    /// Timestamp extension (reserved type −1)
    Timestamp(TimestampItem<&'a [u8]>),
}

impl Item<'_> {
    /// The payload-free discriminant of this item.
    #[must_use]
    pub fn kind(&self) -> ItemKind {
        match *self {
            Item::Nil => ItemKind::Nil,
            Item::Boolean(_) => ItemKind::Boolean,
            Item::PositiveInteger(_) => ItemKind::PositiveInteger,
            Item::NegativeInteger(_) => ItemKind::NegativeInteger,
            Item::Float(_) => ItemKind::Float,
            Item::Double(_) => ItemKind::Double,
            Item::Str(_) => ItemKind::Str,
            Item::Bin(_) => ItemKind::Bin,
            Item::Array(_) => ItemKind::Array,
            Item::Map(_) => ItemKind::Map,
            Item::Ext(type_code, _) => ItemKind::Ext(type_code),
            Item::Timestamp(_) => ItemKind::Timestamp,
        }
    }

    /// Copy the item out of the input window.
    #[must_use]
    pub fn to_owned(&self) -> OwnedItem {
        match *self {
            Item::Nil => OwnedItem::Nil,
            Item::Boolean(value) => OwnedItem::Boolean(value),
            Item::PositiveInteger(value) => OwnedItem::PositiveInteger(value),
            Item::NegativeInteger(value) => OwnedItem::NegativeInteger(value),
            Item::Float(value) => OwnedItem::Float(value),
            Item::Double(value) => OwnedItem::Double(value),
            Item::Str(payload) => OwnedItem::Str(Bytes::copy_from_slice(payload)),
            Item::Bin(payload) => OwnedItem::Bin(Bytes::copy_from_slice(payload)),
            Item::Array(size) => OwnedItem::Array(size),
            Item::Map(size) => OwnedItem::Map(size),
            Item::Ext(type_code, payload) => {
                OwnedItem::Ext(type_code, Bytes::copy_from_slice(payload))
            }
            Item::Timestamp(TimestampItem::Parts(time)) => {
                OwnedItem::Timestamp(TimestampItem::Parts(time))
            }
            Item::Timestamp(TimestampItem::Raw(payload)) => {
                OwnedItem::Timestamp(TimestampItem::Raw(Bytes::copy_from_slice(payload)))
            }
        }
    }
}

/// Heap-owning form of [`Item`], detached from the input window.
#[derive(Debug, Clone, PartialEq)]
pub enum OwnedItem {
    /// Absent value
    Nil,
    /// True or false
    Boolean(bool),
    /// Integer that fits `u64`
    PositiveInteger(u64),
    /// Integer below zero
    NegativeInteger(i64),
    /// IEEE-754 binary32
    Float(f32),
    /// IEEE-754 binary64
    Double(f64),
    /// UTF-8-intended bytes
    Str(Bytes),
    /// Opaque bytes
    Bin(Bytes),
    /// Array header: element count
    Array(u32),
    /// Map header: key/value pair count
    Map(u32),
    /// Extension payload with its type code
    Ext(i8, Bytes),
    /// Timestamp extension (reserved type −1)
    Timestamp(TimestampItem<Bytes>),
}

/// Discriminant of an item, as reported by look-ahead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemKind {
    /// Absent value
    Nil,
    /// True or false
    Boolean,
    /// Integer that fits `u64`
    PositiveInteger,
    /// Integer below zero
    NegativeInteger,
    /// IEEE-754 binary32
    Float,
    /// IEEE-754 binary64
    Double,
    /// UTF-8-intended bytes
    Str,
    /// Opaque bytes
    Bin,
    /// Array header
    Array,
    /// Map header
    Map,
    /// Extension with its type code
    Ext(i8),
    /// Timestamp extension (reserved type −1)
    Timestamp,
}

impl ItemKind {
    /// Classify an extension type code; −1 is the timestamp reservation.
    pub(crate) fn from_ext_type(type_code: i8) -> Self {
        if type_code == wire::TIMESTAMP_TYPE {
            Self::Timestamp
        } else {
            Self::Ext(type_code)
        }
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nil => write!(f, "nil"),
            Self::Boolean => write!(f, "boolean"),
            Self::PositiveInteger => write!(f, "positive integer"),
            Self::NegativeInteger => write!(f, "negative integer"),
            Self::Float => write!(f, "float"),
            Self::Double => write!(f, "double"),
            Self::Str => write!(f, "str"),
            Self::Bin => write!(f, "bin"),
            Self::Array => write!(f, "array"),
            Self::Map => write!(f, "map"),
            Self::Ext(type_code) => write!(f, "ext({type_code})"),
            Self::Timestamp => write!(f, "timestamp"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timespec_from_4_byte_payload() {
        let time = TimeSpec::from_payload(&0x5a49_9a00_u32.to_be_bytes()).unwrap();
        assert_eq!(time.tv_sec, 0x5a49_9a00);
        assert_eq!(time.tv_nsec, 0);
    }

    #[test]
    fn test_timespec_from_8_byte_payload() {
        let data64 = (7u64 << 34) | 12_345;
        let time = TimeSpec::from_payload(&data64.to_be_bytes()).unwrap();
        assert_eq!(time.tv_sec, 12_345);
        assert_eq!(time.tv_nsec, 7);
    }

    #[test]
    fn test_timespec_from_12_byte_payload() {
        let mut payload = [0u8; 12];
        payload[..4].copy_from_slice(&999_999_999_u32.to_be_bytes());
        payload[4..].copy_from_slice(&(-1i64).to_be_bytes());
        let time = TimeSpec::from_payload(&payload).unwrap();
        assert_eq!(time.tv_sec, -1);
        assert_eq!(time.tv_nsec, 999_999_999);
    }

    #[test]
    fn test_timespec_rejects_other_lengths() {
        for len in [0usize, 1, 3, 5, 7, 11, 13, 16] {
            let payload = vec![0u8; len];
            assert_eq!(
                TimeSpec::from_payload(&payload),
                Err(Error::WrongTimestampLength {
                    length: len as u32
                })
            );
        }
    }

    #[test]
    fn test_ext_type_classification() {
        assert_eq!(ItemKind::from_ext_type(-1), ItemKind::Timestamp);
        assert_eq!(ItemKind::from_ext_type(0), ItemKind::Ext(0));
        assert_eq!(ItemKind::from_ext_type(127), ItemKind::Ext(127));
        assert_eq!(ItemKind::from_ext_type(-2), ItemKind::Ext(-2));
    }

    #[test]
    fn test_to_owned_detaches_blobs() {
        let payload = [1u8, 2, 3];
        let item = Item::Bin(&payload);
        let owned = item.to_owned();
        assert_eq!(owned, OwnedItem::Bin(Bytes::copy_from_slice(&payload)));
        assert_eq!(item.kind(), ItemKind::Bin);
    }
}
