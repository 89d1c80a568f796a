//! Chunk-level structure of Standard Midi Files.

use crate::{
    custom::{write_checked, CustomChunkBox},
    event::{EventWriter, TrackEvent},
    io::{MidiReader, WriteExt},
    prelude::*,
    primitive::{Format, Timing},
    settings::{EndOfTrackStoringPolicy, MissedEndOfTrackPolicy, ReadingSettings, WritingSettings},
};
use tracing::{debug, warn};

/// A 4-byte chunk identifier, usually ASCII.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkId(pub [u8; 4]);
impl ChunkId {
    /// The `MThd` header chunk.
    pub const HEADER: ChunkId = ChunkId(*b"MThd");
    /// The `MTrk` track chunk.
    pub const TRACK: ChunkId = ChunkId(*b"MTrk");

    #[inline]
    pub const fn new(id: &[u8; 4]) -> ChunkId {
        ChunkId(*id)
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }
}
impl fmt::Display for ChunkId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for &b in self.0.iter() {
            if b.is_ascii_graphic() || b == b' ' {
                write!(f, "{}", b as char)?;
            } else {
                write!(f, "\\x{:02X}", b)?;
            }
        }
        Ok(())
    }
}
impl fmt::Debug for ChunkId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "ChunkId(\"{}\")", self)
    }
}

/// A chunk of a MIDI file, other than the header chunk.
#[derive(Clone, PartialEq, Debug)]
pub enum Chunk {
    Track(TrackChunk),
    /// A chunk with an id that is neither standard nor registered as custom.
    Unknown(UnknownChunk),
    /// A chunk of a type registered in the settings' `custom_chunk_types`.
    Custom(CustomChunkBox),
}
impl Chunk {
    #[inline]
    pub fn as_track(&self) -> Option<&TrackChunk> {
        match self {
            Chunk::Track(track) => Some(track),
            _ => None,
        }
    }

    #[inline]
    pub fn as_track_mut(&mut self) -> Option<&mut TrackChunk> {
        match self {
            Chunk::Track(track) => Some(track),
            _ => None,
        }
    }

    /// Encode the whole chunk, including its id and size, at the end of `out`.
    pub(crate) fn write(&self, out: &mut Vec<u8>, settings: &WritingSettings) -> Result<()> {
        match self {
            Chunk::Track(track) => write_track(track.events.iter(), out, settings),
            Chunk::Unknown(chunk) => {
                let data = chunk.data.as_deref().unwrap_or(&[]);
                out.write_all(chunk.id.as_bytes())?;
                out.write_u32(chunk_size(data.len())?)?;
                out.write_all(data)?;
                Ok(())
            }
            Chunk::Custom(custom) => {
                let id = settings.custom_chunk_types.chunk_id(custom).ok_or(
                    Error::UnregisteredCustomType {
                        type_name: custom.get().type_name(),
                    },
                )?;
                let size = custom.get().content_size(settings);
                out.write_all(id.as_bytes())?;
                out.write_u32(chunk_size(size)?)?;
                write_checked(out, size, |w| custom.get().write_content(w, settings))
            }
        }
    }
}
impl From<TrackChunk> for Chunk {
    fn from(track: TrackChunk) -> Chunk {
        Chunk::Track(track)
    }
}
impl From<UnknownChunk> for Chunk {
    fn from(chunk: UnknownChunk) -> Chunk {
        Chunk::Unknown(chunk)
    }
}

fn chunk_size(len: usize) -> Result<u32> {
    u32::try_from(len).map_err(|_| Error::TooLarge("midi chunk size exceeds 32 bit range"))
}

/// A track chunk, holding a sequence of delta-timed events.
///
/// The closing `EndOfTrack` event is normally not stored: it is dropped when reading and
/// always appended when writing.
#[derive(Clone, PartialEq, Debug, Default)]
pub struct TrackChunk {
    pub events: Vec<TrackEvent>,
}
impl TrackChunk {
    #[inline]
    pub fn new(events: Vec<TrackEvent>) -> TrackChunk {
        TrackChunk { events }
    }

    /// Read events until `end`, an `EndOfTrack` event or the end of the input.
    ///
    /// Events are appended to `self` as they are read, so on failure the events decoded so far
    /// remain available. `on_event` is called with each stored event and its absolute time.
    pub(crate) fn read_content<R, F>(
        &mut self,
        reader: &mut MidiReader<'_, R>,
        end: u64,
        settings: &ReadingSettings,
        mut on_event: F,
    ) -> Result<()>
    where
        R: Read,
        F: FnMut(&TrackEvent, u64),
    {
        let mut running_status = None;
        let mut time = 0u64;
        let mut ended = false;
        while reader.position() < end && !reader.end_reached()? {
            let event = match TrackEvent::read(reader, &mut running_status, settings)? {
                Some(event) => event,
                None => continue,
            };
            time = time.saturating_add(event.delta);
            if event.is_end_of_track() {
                ended = true;
                if settings.end_of_track_storing_policy == EndOfTrackStoringPolicy::Store {
                    on_event(&event, time);
                    self.events.push(event);
                }
                break;
            }
            on_event(&event, time);
            self.events.push(event);
        }
        if !ended {
            let position = reader.position();
            match settings.missed_end_of_track_policy {
                MissedEndOfTrackPolicy::Abort => bail!(Error::MissedEndOfTrackEvent { position }),
                MissedEndOfTrackPolicy::Ignore => {
                    debug!(position, "track chunk has no end of track event")
                }
            }
        }
        Ok(())
    }
}
impl From<Vec<TrackEvent>> for TrackChunk {
    fn from(events: Vec<TrackEvent>) -> TrackChunk {
        TrackChunk { events }
    }
}

/// A chunk kept as raw bytes.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct UnknownChunk {
    pub id: ChunkId,
    /// `None` only when an empty chunk is read with `ZeroLengthDataPolicy::ReadAsNull`.
    pub data: Option<Vec<u8>>,
}

/// The decoded content of an `MThd` chunk.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub(crate) struct HeaderChunk {
    /// `None` for formats other than 0, 1 and 2.
    pub format: Option<Format>,
    pub raw_format: u16,
    pub track_count: u16,
    pub timing: Timing,
}
impl HeaderChunk {
    pub(crate) fn read_content<R: Read>(reader: &mut MidiReader<'_, R>) -> Result<HeaderChunk> {
        let raw_format = reader.read_u16()?;
        let track_count = reader.read_u16()?;
        let timing = Timing::from_bits(reader.read_u16()?)?;
        Ok(HeaderChunk {
            format: Format::from_bits(raw_format),
            raw_format,
            track_count,
            timing,
        })
    }

    /// Write a whole header chunk.
    pub(crate) fn write<W: Write + ?Sized>(
        out: &mut W,
        format: Format,
        timing: Timing,
        track_count: usize,
    ) -> Result<()> {
        let track_count = u16::try_from(track_count)
            .map_err(|_| Error::TooLarge("track count exceeds 16 bit range"))?;
        let mut header_chunk = [0; 4 + 4 + 6];
        header_chunk[0..4].copy_from_slice(ChunkId::HEADER.as_bytes());
        header_chunk[4..8].copy_from_slice(&6u32.to_be_bytes());
        header_chunk[8..10].copy_from_slice(&format.as_bits().to_be_bytes());
        header_chunk[10..12].copy_from_slice(&track_count.to_be_bytes());
        header_chunk[12..14].copy_from_slice(&timing.encode());
        out.write_all(&header_chunk)?;
        Ok(())
    }
}

/// Write a track chunk at the end of a `Vec`, applying the writing pipeline to its events.
pub(crate) fn write_track<'a>(
    events: impl IntoIterator<Item = &'a TrackEvent>,
    out: &mut Vec<u8>,
    settings: &WritingSettings,
) -> Result<()> {
    let start = out.len();
    out.extend_from_slice(b"MTrk\0\0\0\0");
    let events = events.into_iter();
    out.reserve(events.size_hint().0 * 3);
    let mut writer = EventWriter::new();
    for ev in events {
        writer.write(ev, out, settings)?;
    }
    writer.finish(out)?;
    let len = chunk_size(out.len() - start - 8)?;
    out[start + 4..start + 8].copy_from_slice(&len.to_be_bytes());
    Ok(())
}

/// Read the content of a chunk that is not a track or header chunk.
///
/// Returns `None` if the chunk is skipped by the unknown chunk policy.
pub(crate) fn read_other_chunk<R: Read>(
    reader: &mut MidiReader<'_, R>,
    id: ChunkId,
    size: u32,
    position: u64,
    settings: &ReadingSettings,
) -> Result<Option<Chunk>> {
    use crate::settings::UnknownChunkIdPolicy;
    if let Some(mut custom) = settings.custom_chunk_types.create(id) {
        let data = reader.read_bytes(size as usize)?;
        custom.read_content(&data, settings)?;
        return Ok(Some(Chunk::Custom(CustomChunkBox::from_box(custom))));
    }
    match settings.unknown_chunk_id_policy {
        UnknownChunkIdPolicy::ReadAsUnknownChunk => {
            let data = reader.read_bytes(size as usize)?;
            Ok(Some(Chunk::Unknown(UnknownChunk {
                id,
                data: settings.wrap_data(&data),
            })))
        }
        UnknownChunkIdPolicy::Skip => {
            debug!(%id, position, size, "skipping unknown chunk");
            Ok(None)
        }
        UnknownChunkIdPolicy::Abort => bail!(Error::UnknownChunk { id, position }),
    }
}

/// Validate the amount of bytes consumed by a chunk's content and skip any unread remainder.
///
/// `content_start` is the position right after the chunk size field.
pub(crate) fn finish_chunk<R: Read>(
    reader: &mut MidiReader<'_, R>,
    id: ChunkId,
    size: u32,
    content_start: u64,
    settings: &ReadingSettings,
) -> Result<()> {
    use crate::settings::InvalidChunkSizePolicy;
    let consumed = reader.position() - content_start;
    if consumed == size as u64 {
        return Ok(());
    }
    if consumed < size as u64 && reader.end_reached()? {
        //The input ended before the chunk did
        bail!(Error::NotEnoughBytes {
            position: content_start,
            expected: size as u64,
            actual: consumed,
        });
    }
    match settings.invalid_chunk_size_policy {
        InvalidChunkSizePolicy::Abort => bail!(Error::InvalidChunkSize {
            id,
            expected: size,
            actual: consumed,
        }),
        InvalidChunkSizePolicy::Ignore => {
            warn!(%id, size, consumed, "chunk content does not match its declared size");
        }
    }
    if consumed < size as u64 {
        reader.skip(size as u64 - consumed)?;
    }
    Ok(())
}
