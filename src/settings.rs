//! Settings controlling how files are read and written.
//!
//! Every recoverable condition met while reading has a policy here. `Abort` turns the condition
//! into an [`Error`](enum.Error.html), anything else recovers and keeps reading.

use crate::{
    custom::{ChunkTypesCollection, EventTypesCollection},
    prelude::*,
};

/// What to do when the amount of track chunks differs from the amount declared in the header.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum UnexpectedTrackChunksCountPolicy {
    Ignore,
    Abort,
}

/// What to do with track chunks beyond the amount declared in the header.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum ExtraTrackChunkPolicy {
    Read,
    Skip,
}

/// What to do with chunks whose id is neither standard nor registered as custom.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum UnknownChunkIdPolicy {
    ReadAsUnknownChunk,
    Skip,
    Abort,
}

/// What to do when a track chunk ends without an `EndOfTrack` meta event.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum MissedEndOfTrackPolicy {
    Ignore,
    Abort,
}

/// How to represent a `NoteOn` event with zero velocity.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum SilentNoteOnPolicy {
    /// Read it as a `NoteOff` event with zero velocity.
    NoteOff,
    /// Keep it as a `NoteOn` event.
    NoteOn,
}

/// What to do when a chunk's content does not use exactly its declared size.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum InvalidChunkSizePolicy {
    Abort,
    Ignore,
}

/// What to do when the header declares an unknown file format.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum UnknownFileFormatPolicy {
    Ignore,
    Abort,
}

/// What to do with a status byte that does not correspond to any channel event.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum UnknownChannelEventPolicy {
    Abort,
    SkipStatusByte,
    SkipStatusByteAndOneDataByte,
    SkipStatusByteAndTwoDataBytes,
    /// Ask [`ReadingSettings::unknown_channel_event_callback`] what to do.
    ///
    /// Reading fails with `Error::InvalidOperation` if no callback is set.
    UseCallback,
}

/// The decision returned by an unknown channel event callback.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum UnknownChannelEventAction {
    Abort,
    /// Skip the status byte and this many data bytes.
    SkipData(usize),
}

/// What to do with channel event data bytes with their top bit set.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum InvalidChannelEventParameterValuePolicy {
    Abort,
    /// Keep the bottom 7 bits.
    ReadValid,
    /// Clamp the value to 127.
    SnapToLimits,
}

/// What to do with meta event fields out of their valid range.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum InvalidMetaEventParameterValuePolicy {
    Abort,
    SnapToLimits,
}

/// What to do when the input ends in the middle of an object.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum NotEnoughBytesPolicy {
    Abort,
    /// Stop reading and keep everything decoded so far.
    Ignore,
}

/// What to do when the file has no header chunk.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum NoHeaderChunkPolicy {
    Abort,
    /// Read the file anyway, leaving its timing unknown.
    Ignore,
}

/// How to represent zero-length text and binary payloads.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum ZeroLengthDataPolicy {
    /// As `Some` empty string or empty vector.
    ReadAsEmptyObject,
    /// As `None`.
    ReadAsNull,
}

/// Whether `EndOfTrack` events are kept in the decoded track chunks.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum EndOfTrackStoringPolicy {
    Omit,
    Store,
}

/// How the reader buffers its input.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum ReaderBufferingPolicy {
    /// Read directly from the source.
    DontUseBuffering,
    /// Read through an internal buffer of `ReaderSettings::buffer_size` bytes.
    UseFixedSizeBuffer,
    /// Read through a buffer supplied by the caller.
    UseCustomBuffer,
    /// Read the whole source into memory before decoding.
    BufferAllData,
}

/// How the writer buffers its output.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum WriterBufferingPolicy {
    DontUseBuffering,
    UseBuffering,
}

/// Character encoding of text meta events.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum TextEncoding {
    /// 7-bit ASCII. Other bytes and characters are replaced by `?`.
    Ascii,
    /// UTF-8. Invalid sequences are replaced by U+FFFD when decoding.
    Utf8,
    /// ISO-8859-1. Characters above U+00FF are replaced by `?` when encoding.
    Latin1,
}
impl TextEncoding {
    pub fn decode(self, bytes: &[u8]) -> String {
        match self {
            TextEncoding::Ascii => bytes
                .iter()
                .map(|&b| if b.is_ascii() { b as char } else { '?' })
                .collect(),
            TextEncoding::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
            TextEncoding::Latin1 => bytes.iter().map(|&b| b as char).collect(),
        }
    }

    pub fn encode(self, text: &str) -> Vec<u8> {
        match self {
            TextEncoding::Ascii => text
                .chars()
                .map(|c| if c.is_ascii() { c as u8 } else { b'?' })
                .collect(),
            TextEncoding::Utf8 => text.as_bytes().to_vec(),
            TextEncoding::Latin1 => text
                .chars()
                .map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?'))
                .collect(),
        }
    }
}
impl Default for TextEncoding {
    fn default() -> TextEncoding {
        TextEncoding::Ascii
    }
}

/// Decides what to do with an unknown channel event, given its status byte and channel.
pub type UnknownChannelEventCallback =
    Arc<dyn Fn(u8, u4) -> UnknownChannelEventAction + Send + Sync>;

/// Decodes the raw bytes of a text meta event.
pub type DecodeTextCallback = Arc<dyn Fn(&[u8], &ReadingSettings) -> String + Send + Sync>;

/// Low-level settings of the byte reader.
#[derive(Clone, Debug)]
pub struct ReaderSettings {
    pub buffering_policy: ReaderBufferingPolicy,
    /// Size of the internal buffer used by `UseFixedSizeBuffer`.
    pub buffer_size: usize,
    /// Reads of more than this many bytes are performed incrementally, in steps of
    /// `incremental_bytes_reading_step` bytes, so that bogus sizes fail on EOF before
    /// allocating.
    pub incremental_bytes_reading_threshold: usize,
    pub incremental_bytes_reading_step: usize,
    /// Maximum size of the `BytesPacket` tokens produced by the lazy reader.
    pub bytes_packet_max_length: usize,
}
impl Default for ReaderSettings {
    fn default() -> ReaderSettings {
        ReaderSettings {
            buffering_policy: ReaderBufferingPolicy::UseFixedSizeBuffer,
            buffer_size: 4096,
            incremental_bytes_reading_threshold: 16384,
            incremental_bytes_reading_step: 2048,
            bytes_packet_max_length: 1024,
        }
    }
}

/// Settings for reading MIDI files.
#[derive(Clone)]
pub struct ReadingSettings {
    pub unexpected_track_chunks_count_policy: UnexpectedTrackChunksCountPolicy,
    pub extra_track_chunk_policy: ExtraTrackChunkPolicy,
    pub unknown_chunk_id_policy: UnknownChunkIdPolicy,
    pub missed_end_of_track_policy: MissedEndOfTrackPolicy,
    pub silent_note_on_policy: SilentNoteOnPolicy,
    pub invalid_chunk_size_policy: InvalidChunkSizePolicy,
    pub unknown_file_format_policy: UnknownFileFormatPolicy,
    pub unknown_channel_event_policy: UnknownChannelEventPolicy,
    pub unknown_channel_event_callback: Option<UnknownChannelEventCallback>,
    pub invalid_channel_event_parameter_value_policy: InvalidChannelEventParameterValuePolicy,
    pub invalid_meta_event_parameter_value_policy: InvalidMetaEventParameterValuePolicy,
    pub not_enough_bytes_policy: NotEnoughBytesPolicy,
    pub no_header_chunk_policy: NoHeaderChunkPolicy,
    pub zero_length_data_policy: ZeroLengthDataPolicy,
    pub end_of_track_storing_policy: EndOfTrackStoringPolicy,
    /// Stop reading as soon as the amount of track chunks declared in the header was read.
    pub stop_reading_on_expected_track_chunks_count_reached: bool,
    pub text_encoding: TextEncoding,
    /// Overrides `text_encoding` when set.
    pub decode_text_callback: Option<DecodeTextCallback>,
    pub custom_meta_event_types: EventTypesCollection,
    pub custom_chunk_types: ChunkTypesCollection,
    pub reader_settings: ReaderSettings,
}
impl ReadingSettings {
    pub(crate) fn decode_text(&self, bytes: &[u8]) -> Option<String> {
        if bytes.is_empty() && self.zero_length_data_policy == ZeroLengthDataPolicy::ReadAsNull {
            return None;
        }
        Some(match &self.decode_text_callback {
            Some(callback) => callback(bytes, self),
            None => self.text_encoding.decode(bytes),
        })
    }

    pub(crate) fn wrap_data(&self, bytes: &[u8]) -> Option<Vec<u8>> {
        if bytes.is_empty() && self.zero_length_data_policy == ZeroLengthDataPolicy::ReadAsNull {
            None
        } else {
            Some(bytes.to_vec())
        }
    }
}
impl Default for ReadingSettings {
    fn default() -> ReadingSettings {
        ReadingSettings {
            unexpected_track_chunks_count_policy: UnexpectedTrackChunksCountPolicy::Ignore,
            extra_track_chunk_policy: ExtraTrackChunkPolicy::Read,
            unknown_chunk_id_policy: UnknownChunkIdPolicy::ReadAsUnknownChunk,
            missed_end_of_track_policy: MissedEndOfTrackPolicy::Ignore,
            silent_note_on_policy: SilentNoteOnPolicy::NoteOff,
            invalid_chunk_size_policy: InvalidChunkSizePolicy::Abort,
            unknown_file_format_policy: UnknownFileFormatPolicy::Ignore,
            unknown_channel_event_policy: UnknownChannelEventPolicy::Abort,
            unknown_channel_event_callback: None,
            invalid_channel_event_parameter_value_policy:
                InvalidChannelEventParameterValuePolicy::Abort,
            invalid_meta_event_parameter_value_policy: InvalidMetaEventParameterValuePolicy::Abort,
            not_enough_bytes_policy: NotEnoughBytesPolicy::Abort,
            no_header_chunk_policy: NoHeaderChunkPolicy::Abort,
            zero_length_data_policy: ZeroLengthDataPolicy::ReadAsEmptyObject,
            end_of_track_storing_policy: EndOfTrackStoringPolicy::Omit,
            stop_reading_on_expected_track_chunks_count_reached: false,
            text_encoding: TextEncoding::default(),
            decode_text_callback: None,
            custom_meta_event_types: EventTypesCollection::new(),
            custom_chunk_types: ChunkTypesCollection::new(),
            reader_settings: ReaderSettings::default(),
        }
    }
}
impl fmt::Debug for ReadingSettings {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("ReadingSettings")
            .field("unknown_chunk_id_policy", &self.unknown_chunk_id_policy)
            .field("invalid_chunk_size_policy", &self.invalid_chunk_size_policy)
            .field("unknown_channel_event_policy", &self.unknown_channel_event_policy)
            .field("not_enough_bytes_policy", &self.not_enough_bytes_policy)
            .field("no_header_chunk_policy", &self.no_header_chunk_policy)
            .field("zero_length_data_policy", &self.zero_length_data_policy)
            .field("text_encoding", &self.text_encoding)
            .field("reader_settings", &self.reader_settings)
            .finish_non_exhaustive()
    }
}

/// Low-level settings of the byte writer.
#[derive(Clone, Debug)]
pub struct WriterSettings {
    pub buffering_policy: WriterBufferingPolicy,
    pub buffer_size: usize,
}
impl Default for WriterSettings {
    fn default() -> WriterSettings {
        WriterSettings {
            buffering_policy: WriterBufferingPolicy::UseBuffering,
            buffer_size: 4096,
        }
    }
}

/// Settings for writing MIDI files.
#[derive(Clone, Debug)]
pub struct WritingSettings {
    /// Omit channel event status bytes that repeat the previous one.
    pub use_running_status: bool,
    /// Write `NoteOff` events as `NoteOn` events with zero velocity.
    pub note_off_as_silent_note_on: bool,
    pub delete_unknown_meta_events: bool,
    pub delete_unknown_chunks: bool,
    /// Skip leading key signatures equal to C major.
    pub delete_default_key_signature: bool,
    /// Skip leading tempo changes equal to 500000 microseconds per beat.
    pub delete_default_set_tempo: bool,
    /// Skip leading time signatures equal to 4/4 with 24 clocks per click.
    pub delete_default_time_signature: bool,
    /// When disabled, the file is written without its `MThd` chunk.
    pub write_header_chunk: bool,
    pub text_encoding: TextEncoding,
    pub custom_meta_event_types: EventTypesCollection,
    pub custom_chunk_types: ChunkTypesCollection,
    pub writer_settings: WriterSettings,
}
impl Default for WritingSettings {
    fn default() -> WritingSettings {
        WritingSettings {
            use_running_status: false,
            note_off_as_silent_note_on: false,
            delete_unknown_meta_events: false,
            delete_unknown_chunks: false,
            delete_default_key_signature: false,
            delete_default_set_tempo: false,
            delete_default_time_signature: false,
            write_header_chunk: true,
            text_encoding: TextEncoding::default(),
            custom_meta_event_types: EventTypesCollection::new(),
            custom_chunk_types: ChunkTypesCollection::new(),
            writer_settings: WriterSettings::default(),
        }
    }
}

/// Controls what structural equality takes into account.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct EqualitySettings {
    /// Also require both files to have been read with the same header format.
    pub compare_original_format: bool,
    pub compare_delta_times: bool,
}
impl Default for EqualitySettings {
    fn default() -> EqualitySettings {
        EqualitySettings {
            compare_original_format: false,
            compare_delta_times: true,
        }
    }
}
