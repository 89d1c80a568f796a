//! Token-level access to Standard Midi Files, for reading and writing files without holding
//! them in memory as a whole.
//!
//! [`MidiTokensReader`](struct.MidiTokensReader.html) produces a flat stream of tokens as the
//! input is consumed: a header for every chunk, followed by the decoded header, the track events
//! or the raw bytes of the chunk.
//!
//! [`MidiTokensWriter`](struct.MidiTokensWriter.html) goes the other way, writing events one at
//! a time and patching chunk sizes once they are known. The output is the same as writing a
//! [`MidiFile`](../struct.MidiFile.html) with the same contents.

use crate::{
    chunk::{Chunk, ChunkId, HeaderChunk},
    event::{EventWriter, TrackEvent},
    io::{MidiReader, MidiWriter, WriteExt},
    prelude::*,
    primitive::{Format, Timing},
    riff,
    settings::{NotEnoughBytesPolicy, ReadingSettings, WritingSettings},
};
use std::io::SeekFrom;
use tracing::{trace, warn};

/// A piece of a MIDI file.
#[derive(Clone, PartialEq, Debug)]
pub enum MidiTokenKind {
    /// The id and declared size of a chunk, including the header chunk.
    ChunkHeader { id: ChunkId, size: u32 },
    /// The content of the `MThd` chunk.
    FileHeader {
        /// The raw format number, which may be other than 0, 1 or 2.
        format: u16,
        timing: Timing,
        track_count: u16,
    },
    /// An event of a track chunk. `EndOfTrack` events are included.
    MidiEvent(TrackEvent),
    /// Raw content of a chunk other than the header or a track.
    BytesPacket(Vec<u8>),
}

/// A token along with the bytes of the input it was read from.
#[derive(Clone, PartialEq, Debug)]
pub struct MidiToken {
    pub kind: MidiTokenKind,
    /// Offset of the first byte of the token in the input.
    pub position: u64,
    /// Amount of bytes the token spans.
    pub length: u64,
}

#[derive(Copy, Clone, Debug)]
enum State {
    Initial,
    ChunkHeader,
    ChunkContent {
        id: ChunkId,
        end: u64,
        running_status: Option<u8>,
    },
    Done,
}

/// Reads a MIDI file token by token.
///
/// Yields `None` forever once the input is exhausted or an error was yielded.
pub struct MidiTokensReader<'b, R> {
    reader: MidiReader<'b, R>,
    settings: ReadingSettings,
    state: State,
}
impl<'b, R: Read> MidiTokensReader<'b, R> {
    pub fn new(source: R, settings: &ReadingSettings) -> Result<MidiTokensReader<'b, R>> {
        MidiTokensReader::with_buffer(source, settings, None)
    }

    /// Read through a caller-supplied buffer, as required by
    /// `ReaderBufferingPolicy::UseCustomBuffer`.
    pub fn with_buffer(
        source: R,
        settings: &ReadingSettings,
        buffer: Option<&'b mut [u8]>,
    ) -> Result<MidiTokensReader<'b, R>> {
        Ok(MidiTokensReader {
            reader: MidiReader::new(source, &settings.reader_settings, buffer)?,
            settings: settings.clone(),
            state: State::Initial,
        })
    }

    /// Amount of input bytes consumed so far.
    pub fn position(&self) -> u64 {
        self.reader.position()
    }

    fn read_token(&mut self) -> Result<Option<MidiToken>> {
        loop {
            let position = self.reader.position();
            let kind = match self.state {
                State::Done => return Ok(None),
                State::Initial | State::ChunkHeader => {
                    if self.reader.end_reached()? {
                        self.state = State::Done;
                        return Ok(None);
                    }
                    let (id, got) = self.reader.read_id()?;
                    if got < 4 {
                        self.state = State::Done;
                        match self.settings.not_enough_bytes_policy {
                            NotEnoughBytesPolicy::Abort => bail!(Error::NotEnoughBytes {
                                position,
                                expected: 4,
                                actual: got as u64,
                            }),
                            NotEnoughBytesPolicy::Ignore => {
                                warn!(position, got, "input ended inside a chunk id");
                                return Ok(None);
                            }
                        }
                    }
                    if let (State::Initial, riff::RIFF) = (self.state, id) {
                        riff::enter_data_chunk(&mut self.reader)?;
                        self.state = State::ChunkHeader;
                        continue;
                    }
                    let id = ChunkId(id);
                    let size = self.reader.read_u32()?;
                    self.state = State::ChunkContent {
                        id,
                        end: self.reader.position() + size as u64,
                        running_status: None,
                    };
                    MidiTokenKind::ChunkHeader { id, size }
                }
                State::ChunkContent {
                    id,
                    end,
                    ref mut running_status,
                } => {
                    if position >= end || self.reader.end_reached()? {
                        self.state = State::ChunkHeader;
                        continue;
                    }
                    if id == ChunkId::HEADER {
                        let header = HeaderChunk::read_content(&mut self.reader)?;
                        let rest = end.saturating_sub(self.reader.position());
                        self.reader.skip(rest)?;
                        self.state = State::ChunkHeader;
                        MidiTokenKind::FileHeader {
                            format: header.raw_format,
                            timing: header.timing,
                            track_count: header.track_count,
                        }
                    } else if id == ChunkId::TRACK {
                        match TrackEvent::read(&mut self.reader, running_status, &self.settings)? {
                            Some(event) => MidiTokenKind::MidiEvent(event),
                            None => continue,
                        }
                    } else {
                        let max_len = self.settings.reader_settings.bytes_packet_max_length.max(1);
                        let len = ((end - position) as usize).min(max_len);
                        MidiTokenKind::BytesPacket(self.reader.read_bytes_available(len)?)
                    }
                }
            };
            let length = self.reader.position() - position;
            trace!(position, length, "read token");
            return Ok(Some(MidiToken {
                kind,
                position,
                length,
            }));
        }
    }
}
impl<'b, R: Read> Iterator for MidiTokensReader<'b, R> {
    type Item = Result<MidiToken>;

    fn next(&mut self) -> Option<Result<MidiToken>> {
        //Flip around option and result
        match self.read_token() {
            Ok(Some(token)) => Some(Ok(token)),
            Ok(None) => None,
            Err(err) => {
                //Ensure no more tokens are produced from a corrupted state
                self.state = State::Done;
                Some(Err(err))
            }
        }
    }
}

/// A track chunk being written.
struct OpenTrack {
    /// Position of the `MTrk` id.
    start: u64,
    events: EventWriter,
    ended: bool,
}

/// Writes a MIDI file incrementally.
///
/// The header chunk is written right away and its track count is patched in
/// [`finish`](#method.finish). Track chunk sizes are patched as each track ends, so the
/// destination must be seekable.
pub struct MidiTokensWriter<W: Write + Seek> {
    out: MidiWriter<W>,
    /// Stream position of the first written byte.
    base: u64,
    settings: WritingSettings,
    track_count: usize,
    track: Option<OpenTrack>,
}
impl<W: Write + Seek> MidiTokensWriter<W> {
    /// Start writing a file, emitting its header chunk unless disabled in `settings`.
    ///
    /// Unlike [`MidiFile::write`](../struct.MidiFile.html#method.write), tracks are not merged
    /// for `Format::SingleTrack`.
    pub fn new(
        mut out: W,
        format: Format,
        timing: Timing,
        settings: &WritingSettings,
    ) -> Result<MidiTokensWriter<W>> {
        let base = out.stream_position()?;
        let mut out = MidiWriter::new(out, &settings.writer_settings);
        if settings.write_header_chunk {
            HeaderChunk::write(&mut out, format, timing, 0)?;
        }
        Ok(MidiTokensWriter {
            out,
            base,
            settings: settings.clone(),
            track_count: 0,
            track: None,
        })
    }

    /// Open a new track chunk, ending the current one if any.
    pub fn start_track_chunk(&mut self) -> Result<()> {
        self.end_track_chunk()?;
        let start = self.out.position();
        self.out.write_all(ChunkId::TRACK.as_bytes())?;
        self.out.write_u32(0)?;
        self.track = Some(OpenTrack {
            start,
            events: EventWriter::new(),
            ended: false,
        });
        self.track_count += 1;
        Ok(())
    }

    /// Write an event into the open track chunk.
    ///
    /// An `EndOfTrack` event closes the track for further events; its delta time is kept for
    /// the `EndOfTrack` written when the chunk ends.
    pub fn write_event(&mut self, event: &TrackEvent) -> Result<()> {
        let track = match &mut self.track {
            Some(track) if !track.ended => track,
            Some(_) => bail!(Error::InvalidOperation(
                "cannot write events after the end of track event"
            )),
            None => bail!(Error::InvalidOperation("no track chunk has been started")),
        };
        track.events.write(event, &mut self.out, &self.settings)?;
        if event.is_end_of_track() {
            track.ended = true;
        }
        Ok(())
    }

    /// Close the open track chunk, if any, and write its size.
    pub fn end_track_chunk(&mut self) -> Result<()> {
        let track = match self.track.take() {
            Some(track) => track,
            None => return Ok(()),
        };
        track.events.finish(&mut self.out)?;
        let end = self.out.position();
        let size = u32::try_from(end - track.start - 8)
            .map_err(|_| Error::TooLarge("midi chunk size exceeds 32 bit range"))?;
        self.patch(track.start + 4, &size.to_be_bytes(), end)
    }

    /// Write a complete chunk. No track chunk may be open.
    pub fn write_chunk(&mut self, chunk: &Chunk) -> Result<()> {
        ensure!(
            self.track.is_none(),
            Error::InvalidOperation("cannot write a chunk while a track chunk is open")
        );
        if self.settings.delete_unknown_chunks {
            if let Chunk::Unknown(_) = chunk {
                return Ok(());
            }
        }
        let mut buf = Vec::new();
        chunk.write(&mut buf, &self.settings)?;
        self.out.write_all(&buf)?;
        if let Chunk::Track(_) = chunk {
            self.track_count += 1;
        }
        Ok(())
    }

    /// End any open track, write the final track count and give the destination back.
    pub fn finish(mut self) -> Result<W> {
        self.end_track_chunk()?;
        if self.settings.write_header_chunk {
            let track_count = u16::try_from(self.track_count)
                .map_err(|_| Error::TooLarge("track count exceeds 16 bit range"))?;
            let end = self.out.position();
            self.patch(10, &track_count.to_be_bytes(), end)?;
        }
        Ok(self.out.finish()?)
    }

    /// Overwrite already written bytes at `offset`, then continue at `end`.
    fn patch(&mut self, offset: u64, bytes: &[u8], end: u64) -> Result<()> {
        let base = self.base;
        let out = self.out.get_mut()?;
        out.seek(SeekFrom::Start(base + offset))?;
        out.write_all(bytes)?;
        out.seek(SeekFrom::Start(base + end))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        chunk::{TrackChunk, UnknownChunk},
        event::{MetaMessage, MidiMessage, TrackEventKind},
        settings::ReaderSettings,
        smf::MidiFile,
    };
    use pretty_assertions::assert_eq;
    use std::io::Cursor;

    fn note(delta: u64, key: u8) -> TrackEvent {
        TrackEvent::new(
            delta,
            TrackEventKind::Midi {
                channel: u4::new(3),
                message: MidiMessage::NoteOn {
                    key: u7::new(key),
                    vel: u7::new(64),
                },
            },
        )
    }

    fn sample() -> MidiFile {
        let mut smf = MidiFile::from_tracks(vec![
            TrackChunk::new(vec![note(0, 60), note(10, 62)]),
            TrackChunk::new(vec![TrackEvent::new(
                5,
                TrackEventKind::Meta(MetaMessage::Text(Some("hi".to_string()))),
            )]),
        ]);
        smf.chunks.push(Chunk::Unknown(UnknownChunk {
            id: ChunkId(*b"Abcd"),
            data: Some((0..10).collect()),
        }));
        smf
    }

    #[test]
    fn token_sequence() {
        let bytes = sample()
            .to_bytes(Format::Parallel, &WritingSettings::default())
            .unwrap();
        let mut settings = ReadingSettings::default();
        settings.reader_settings = ReaderSettings {
            bytes_packet_max_length: 4,
            ..Default::default()
        };
        let tokens = MidiTokensReader::new(&bytes[..], &settings)
            .unwrap()
            .collect::<Result<Vec<_>>>()
            .unwrap();
        let kinds: Vec<&MidiTokenKind> = tokens.iter().map(|t| &t.kind).collect();
        assert_eq!(
            kinds[..3],
            [
                &MidiTokenKind::ChunkHeader {
                    id: ChunkId::HEADER,
                    size: 6
                },
                &MidiTokenKind::FileHeader {
                    format: 1,
                    timing: Timing::default(),
                    track_count: 2
                },
                &MidiTokenKind::ChunkHeader {
                    id: ChunkId::TRACK,
                    size: 12
                },
            ]
        );
        assert_eq!(tokens[3].kind, MidiTokenKind::MidiEvent(note(0, 60)));
        assert_eq!((tokens[3].position, tokens[3].length), (22, 4));
        assert_eq!(
            tokens[5].kind,
            MidiTokenKind::MidiEvent(TrackEvent::new(
                0,
                TrackEventKind::Meta(MetaMessage::EndOfTrack)
            ))
        );
        let packets: Vec<usize> = tokens
            .iter()
            .filter_map(|t| match &t.kind {
                MidiTokenKind::BytesPacket(data) => Some(data.len()),
                _ => None,
            })
            .collect();
        assert_eq!(packets, vec![4, 4, 2]);
        //Contiguous coverage of the input
        let mut expected = 0;
        for token in &tokens {
            assert_eq!(token.position, expected);
            expected += token.length;
        }
        assert_eq!(expected, bytes.len() as u64);
    }

    #[test]
    fn stops_after_error() {
        let bytes = b"MThd\x00\x00\x00\x06\x00\x01\x00\x01\x00\x60MTrk\x00\x00\x00\x04\x00\x40";
        let mut reader = MidiTokensReader::new(&bytes[..], &ReadingSettings::default()).unwrap();
        assert!(reader.by_ref().take(3).all(|t| t.is_ok()));
        assert!(matches!(
            reader.next(),
            Some(Err(Error::UnexpectedRunningStatus { .. }))
        ));
        assert!(reader.next().is_none());
        assert!(reader.next().is_none());
    }

    #[test]
    fn lazy_writer_matches_file_writer() {
        let smf = sample();
        let settings = WritingSettings {
            use_running_status: true,
            ..Default::default()
        };
        let eager = smf.to_bytes(Format::Parallel, &settings).unwrap();

        let mut writer =
            MidiTokensWriter::new(Cursor::new(Vec::new()), Format::Parallel, Timing::default(), &settings)
                .unwrap();
        for chunk in &smf.chunks {
            match chunk {
                Chunk::Track(track) => {
                    writer.start_track_chunk().unwrap();
                    for ev in &track.events {
                        writer.write_event(ev).unwrap();
                    }
                }
                chunk => {
                    writer.end_track_chunk().unwrap();
                    writer.write_chunk(chunk).unwrap();
                }
            }
        }
        let lazy = writer.finish().unwrap().into_inner();
        assert_eq!(lazy, eager);
    }

    #[test]
    fn writer_misuse() {
        let settings = WritingSettings::default();
        let mut writer =
            MidiTokensWriter::new(Cursor::new(Vec::new()), Format::Parallel, Timing::default(), &settings)
                .unwrap();
        assert!(matches!(
            writer.write_event(&note(0, 1)),
            Err(Error::InvalidOperation(_))
        ));
        writer.start_track_chunk().unwrap();
        assert!(matches!(
            writer.write_chunk(&Chunk::Track(TrackChunk::default())),
            Err(Error::InvalidOperation(_))
        ));
        writer
            .write_event(&TrackEvent::new(7, TrackEventKind::Meta(MetaMessage::EndOfTrack)))
            .unwrap();
        assert!(matches!(
            writer.write_event(&note(0, 1)),
            Err(Error::InvalidOperation(_))
        ));
        let bytes = writer.finish().unwrap().into_inner();
        assert_eq!(&bytes[10..12], &[0, 1]);
        assert_eq!(&bytes[14..], b"MTrk\x00\x00\x00\x04\x07\xFF\x2F\x00");
    }
}
