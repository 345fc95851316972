//! Codec error codes.

use thiserror::Error;

/// Wire codec errors.
///
/// The first error recorded on a context makes the context terminal: every
/// later operation returns the stored error without moving the cursor or
/// touching the output. [`Error::code`] exposes the numeric code table for
/// callers that check batches of operations at once.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Input ended cleanly at an item boundary
    #[error("end of input at item boundary")]
    EndOfInput,

    /// Encoder out of space and the sink could not provide more
    #[error("buffer overflow: {needed} contiguous bytes unavailable")]
    BufferOverflow {
        /// Bytes the failed reservation asked for
        needed: usize,
    },

    /// Decoder ran out of bytes inside an item
    #[error("buffer underflow: {needed} more bytes required mid-item")]
    BufferUnderflow {
        /// Bytes the failed read asked for
        needed: usize,
    },

    /// Reserved or undefined opcode
    #[error("malformed input: reserved opcode {opcode:#04x}")]
    MalformedInput {
        /// The offending lead byte
        opcode: u8,
    },

    /// Host endianness contradicts the declared compile-time endianness
    #[error("host byte order contradicts compiled configuration")]
    WrongByteOrder,

    /// A space handler reported failure
    #[error("handler reported failure (code {code})")]
    ErrorInHandler {
        /// Auxiliary code supplied by the handler (e.g. an OS errno)
        code: i32,
    },

    /// Operation not valid in the current mode
    #[error("illegal call: {reason}")]
    IllegalCall {
        /// What made the call illegal
        reason: &'static str,
    },

    /// Reserved for handlers that fail to allocate
    #[error("allocation failed in handler")]
    MallocError,

    /// Reserved for handlers that cancel the operation
    #[error("stopped by handler")]
    Stopped,

    /// Reserved for schema layers above the codec
    #[error("type mismatch")]
    TypeError,

    /// Argument outside its legal range
    #[error("value out of range: {reason}")]
    ValueError {
        /// Which range was violated
        reason: &'static str,
    },

    /// Timestamp extension with a payload length other than 4, 8 or 12
    #[error("timestamp extension with illegal payload length {length}")]
    WrongTimestampLength {
        /// The declared payload length
        length: u32,
    },
}

impl Error {
    /// Numeric return code (0 is reserved for the healthy state).
    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            Self::EndOfInput => -1,
            Self::BufferOverflow { .. } => -2,
            Self::BufferUnderflow { .. } => -3,
            Self::MalformedInput { .. } => -4,
            Self::WrongByteOrder => -5,
            Self::ErrorInHandler { .. } => -6,
            Self::IllegalCall { .. } => -7,
            Self::MallocError => -8,
            Self::Stopped => -9,
            Self::TypeError => -10,
            Self::ValueError { .. } => -11,
            Self::WrongTimestampLength { .. } => -12,
        }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
