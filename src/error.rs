use crate::{chunk::ChunkId, primitive::u4};
use std::io;
use thiserror::Error;

/// Represents an error while reading or writing a MIDI file.
///
/// Every reading condition has a matching policy in
/// [`ReadingSettings`](struct.ReadingSettings.html).
/// Errors are only produced when that policy is set to `Abort`; tolerant policies recover
/// locally and log the recovery through `tracing` instead.
///
/// Errors raised while reading carry the byte position in the input at which the condition
/// was detected.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The header chunk declares a file format other than 0, 1 or 2.
    #[error("unknown file format {format}")]
    UnknownFileFormat { format: u16 },

    /// The file contains no `MThd` header chunk.
    #[error("no header chunk found")]
    NoHeaderChunk,

    /// The amount of track chunks differs from the amount declared in the header chunk.
    #[error("expected {expected} track chunks, found {actual}")]
    UnexpectedTrackChunksCount { expected: u16, actual: usize },

    /// A chunk with an id that is neither standard nor registered as custom.
    #[error("unknown chunk {id} at position {position}")]
    UnknownChunk { id: ChunkId, position: u64 },

    /// The declared size of a chunk does not match the amount of bytes its content used.
    #[error("chunk {id} declares {expected} bytes but {actual} were read")]
    InvalidChunkSize {
        id: ChunkId,
        expected: u32,
        actual: u64,
    },

    /// The input ended before a complete object could be read.
    #[error("reading at position {position}: expected {expected} bytes, got {actual}")]
    NotEnoughBytes {
        position: u64,
        expected: u64,
        actual: u64,
    },

    /// A status byte that does not correspond to any channel event.
    #[error("unknown channel event with status 0x{status:02X} (channel {channel}) at position {position}")]
    UnknownChannelEvent {
        status: u8,
        channel: u4,
        position: u64,
    },

    /// A channel event data byte with its top bit set.
    #[error("invalid {parameter} value {value} for channel event 0x{status:02X} at position {position}")]
    InvalidChannelEventParameterValue {
        status: u8,
        parameter: &'static str,
        value: u8,
        position: u64,
    },

    /// A meta event field outside of its valid range.
    #[error("invalid {parameter} value {value} for meta event 0x{meta_type:02X} at position {position}")]
    InvalidMetaEventParameterValue {
        meta_type: u8,
        parameter: &'static str,
        value: i16,
        position: u64,
    },

    /// A data byte appeared where a status byte was expected, with no running status active.
    #[error("event missing status with no running status active at position {position}")]
    UnexpectedRunningStatus { position: u64 },

    /// A track chunk ended without an `EndOfTrack` meta event.
    #[error("track chunk ending at position {position} has no end of track event")]
    MissedEndOfTrackEvent { position: u64 },

    /// The SMPTE frame rate in the header time division is not one of 24, 25, 29 or 30.
    #[error("invalid time division 0x{raw:04X}")]
    InvalidTimeDivision { raw: u16 },

    /// A variable-length quantity that does not fit in 64 bits.
    #[error("variable length quantity overflows at position {position}")]
    VlqOverflow { position: u64 },

    /// A custom event or chunk whose type was not registered in the settings.
    #[error("custom type `{type_name}` is not registered")]
    UnregisteredCustomType { type_name: &'static str },

    /// A value cannot be represented in the MIDI format.
    #[error("{0}")]
    TooLarge(&'static str),

    /// The requested operation is not valid with the current configuration or state.
    #[error("invalid operation: {0}")]
    InvalidOperation(&'static str),

    /// An error produced by the underlying reader or writer.
    #[error(transparent)]
    Io(#[from] io::Error),
}
impl Error {
    /// Whether this error comes from the input ending prematurely.
    #[inline]
    pub fn is_not_enough_bytes(&self) -> bool {
        matches!(self, Error::NotEnoughBytes { .. })
    }
}

/// The result type used by the MIDI reader and writer.
pub type Result<T> = std::result::Result<T, Error>;
