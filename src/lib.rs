//! # Overview
//!
//! `smfkit` is a Standard Midi File (SMF) reader and writer with fine-grained control over how
//! malformed input is handled, plus an absolute-time view over delta-timed tracks.
//!
//! Reading a file is as simple as:
//!
//! ```rust
//! use smfkit::{MidiFile, ReadingSettings};
//!
//! let bytes = b"MThd\x00\x00\x00\x06\x00\x00\x00\x01\x00\x60\
//!               MTrk\x00\x00\x00\x08\x00\x90\x3C\x40\x00\xFF\x2F\x00";
//! let smf = MidiFile::read(&bytes[..], &ReadingSettings::default()).unwrap();
//!
//! for (i, track) in smf.tracks().enumerate() {
//!     println!("track {} has {} events", i, track.events.len());
//! }
//! ```
//!
//! The [`MidiFile`](struct.MidiFile.html) struct is the main type in the crate.
//! It holds the chunks of the file in order, along with the time division of its header.
//!
//! # Reading settings
//!
//! Real-world MIDI files are frequently broken in some way. Every kind of problem the reader can
//! detect has a matching policy in [`ReadingSettings`](struct.ReadingSettings.html), which
//! either aborts reading with an [`Error`](enum.Error.html) or recovers and logs a warning
//! through `tracing`.
//!
//! ```rust
//! use smfkit::{MidiFile, NotEnoughBytesPolicy, ReadingSettings};
//!
//! //The track chunk is cut short
//! let bytes = b"MThd\x00\x00\x00\x06\x00\x00\x00\x01\x00\x60\
//!               MTrk\x00\x00\x00\x08\x00\x90\x3C\x40\x00";
//! assert!(MidiFile::read(&bytes[..], &ReadingSettings::default()).is_err());
//!
//! let mut settings = ReadingSettings::default();
//! settings.not_enough_bytes_policy = NotEnoughBytesPolicy::Ignore;
//! let smf = MidiFile::read(&bytes[..], &settings).unwrap();
//! assert_eq!(smf.tracks().next().unwrap().events.len(), 1);
//! ```
//!
//! # Writing Standard Midi Files
//!
//! Files are written into any `std::io::Write` destination, choosing the format declared in
//! the header:
//!
//! ```rust
//! use smfkit::{Format, MidiFile, ReadingSettings, WritingSettings};
//!
//! # let bytes = b"MThd\x00\x00\x00\x06\x00\x00\x00\x01\x00\x60\
//! #               MTrk\x00\x00\x00\x08\x00\x90\x3C\x40\x00\xFF\x2F\x00";
//! let smf = MidiFile::read(&bytes[..], &ReadingSettings::default()).unwrap();
//!
//! let mut in_memory = Vec::new();
//! smf.write(&mut in_memory, Format::SingleTrack, &WritingSettings::default())
//!     .unwrap();
//! assert_eq!(&in_memory[..], &bytes[..]);
//! ```
//!
//! # Absolute times
//!
//! The [`timed`](timed/index.html) module merges tracks into a single sequence ordered by
//! absolute time, and commits changes made to that sequence back into the tracks.
//!
//! # About features
//!
//! - The `parallel` feature
//!
//!   Enabled by default. Encodes the track chunks of large files in parallel when writing,
//!   through the `rayon` dependency. The output is the same with or without it.

macro_rules! bail {
    ($err:expr) => {{
        return Err($err.into());
    }};
}
macro_rules! ensure {
    ($cond:expr, $err:expr) => {{
        if !$cond {
            bail!($err)
        }
    }};
}

/// All of the errors this crate produces.
mod error;

mod prelude {
    pub(crate) use crate::{
        error::{Error, Result},
        primitive::{u14, u24, u4, u7},
    };
    pub(crate) use std::{
        cmp,
        convert::TryFrom,
        fmt,
        io::{self, Read, Seek, Write},
        mem, ops,
        sync::Arc,
    };

    pub(crate) fn bit_range<T>(val: T, range: ops::Range<u32>) -> T
    where
        T: From<u8>
            + ops::Shr<u32, Output = T>
            + ops::Shl<u32, Output = T>
            + ops::Not<Output = T>
            + ops::BitAnd<Output = T>,
    {
        let mask = !((!T::from(0)) << (range.end - range.start));
        (val >> range.start) & mask
    }
}

mod chunk;
mod custom;
mod event;
mod handler;
pub mod io;
mod primitive;
mod riff;
mod settings;
mod smf;
pub mod stream;
pub mod timed;

pub use crate::{
    chunk::{Chunk, ChunkId, TrackChunk, UnknownChunk},
    custom::{
        ChunkTypesCollection, CustomChunk, CustomChunkBox, CustomMeta, CustomMetaEvent,
        DynCustomChunk, DynCustomMeta, EventTypesCollection,
    },
    error::{Error, Result},
    event::{MetaMessage, MidiMessage, PitchBend, TrackEvent, TrackEventKind},
    handler::{HandlerScope, ReadingHandler},
    primitive::{vlq_len, Format, Fps, SmpteTime, Timing},
    settings::{
        DecodeTextCallback, EndOfTrackStoringPolicy, EqualitySettings, ExtraTrackChunkPolicy,
        InvalidChannelEventParameterValuePolicy, InvalidChunkSizePolicy,
        InvalidMetaEventParameterValuePolicy, MissedEndOfTrackPolicy, NoHeaderChunkPolicy,
        NotEnoughBytesPolicy, ReaderBufferingPolicy, ReaderSettings, ReadingSettings,
        SilentNoteOnPolicy, TextEncoding, UnexpectedTrackChunksCountPolicy,
        UnknownChannelEventAction, UnknownChannelEventCallback, UnknownChannelEventPolicy,
        UnknownChunkIdPolicy, UnknownFileFormatPolicy, WriterBufferingPolicy, WriterSettings,
        WritingSettings, ZeroLengthDataPolicy,
    },
    smf::MidiFile,
    timed::{
        EventIndices, TimedEvent, TimedEventData, TimedEventDetectionSettings,
        TimedEventProcessingHint,
    },
};

/// Exotically-sized integers used by the MIDI standard.
pub mod num {
    pub use crate::primitive::{u14, u15, u2, u24, u4, u7};
}

#[cfg(test)]
mod test;
