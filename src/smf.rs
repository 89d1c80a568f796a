//! Reading and writing whole Standard Midi Files.

use crate::{
    chunk::{finish_chunk, read_other_chunk, Chunk, ChunkId, HeaderChunk, TrackChunk},
    handler::{HandlerScope, Handlers, ReadingHandler},
    io::{MidiReader, MidiWriter},
    prelude::*,
    primitive::{Format, Timing},
    riff,
    settings::{
        EqualitySettings, ExtraTrackChunkPolicy, NoHeaderChunkPolicy, NotEnoughBytesPolicy,
        ReadingSettings, UnexpectedTrackChunksCountPolicy, UnknownFileFormatPolicy,
        WritingSettings,
    },
    timed::{merge_tracks, TimedEventDetectionSettings},
};
use std::{fs::File, path::Path};
use tracing::{debug, trace, warn};

/// How many bytes per event to estimate when deciding whether to encode in parallel.
#[cfg(feature = "parallel")]
const EVENTS_TO_BYTES: usize = 3;

/// How many bytes must the track chunks have in order to enable multithreading.
#[cfg(feature = "parallel")]
const PARALLEL_ENABLE_THRESHOLD: usize = 3 * 1024;

/// A Standard Midi File, held in memory.
///
/// The header chunk is not part of `chunks`: its contents are kept in `timing` and
/// `original_format` when reading, and it is generated from the track chunks when writing.
///
/// Equality through `==` ignores `original_format`. Use [`equals`](#method.equals) for a
/// configurable comparison.
#[derive(Clone, Debug)]
pub struct MidiFile {
    /// Track chunks and any other chunks, in file order.
    pub chunks: Vec<Chunk>,
    /// The time division. A file without one can only be written headerless.
    pub timing: Option<Timing>,
    /// The format declared by the header of the file this was read from.
    ///
    /// `None` if the file was not read, or declared a format other than 0, 1 or 2.
    pub original_format: Option<Format>,
}
impl Default for MidiFile {
    fn default() -> MidiFile {
        MidiFile::new(Vec::new())
    }
}
impl PartialEq for MidiFile {
    fn eq(&self, other: &MidiFile) -> bool {
        self.timing == other.timing && self.chunks == other.chunks
    }
}
impl MidiFile {
    /// Create a file with the default timing of 96 ticks per beat.
    pub fn new(chunks: Vec<Chunk>) -> MidiFile {
        MidiFile {
            chunks,
            timing: Some(Timing::default()),
            original_format: None,
        }
    }

    /// Create a file holding the given tracks.
    pub fn from_tracks<I: IntoIterator<Item = TrackChunk>>(tracks: I) -> MidiFile {
        MidiFile::new(tracks.into_iter().map(Chunk::Track).collect())
    }

    /// Iterate over the track chunks, skipping any other chunks.
    pub fn tracks(&self) -> impl Iterator<Item = &TrackChunk> {
        self.chunks.iter().filter_map(Chunk::as_track)
    }

    pub fn tracks_mut(&mut self) -> impl Iterator<Item = &mut TrackChunk> {
        self.chunks.iter_mut().filter_map(Chunk::as_track_mut)
    }

    /// Compare two files, with control over which details matter.
    pub fn equals(&self, other: &MidiFile, settings: &EqualitySettings) -> bool {
        if settings.compare_original_format && self.original_format != other.original_format {
            return false;
        }
        if self.timing != other.timing || self.chunks.len() != other.chunks.len() {
            return false;
        }
        if settings.compare_delta_times {
            return self.chunks == other.chunks;
        }
        self.chunks
            .iter()
            .zip(other.chunks.iter())
            .all(|pair| match pair {
                (Chunk::Track(a), Chunk::Track(b)) => {
                    a.events.len() == b.events.len()
                        && a.events
                            .iter()
                            .zip(b.events.iter())
                            .all(|(a, b)| a.kind == b.kind)
                }
                (a, b) => a == b,
            })
    }

    /// Read a file from an arbitrary source.
    ///
    /// The source is read sequentially and never rewound, and is not closed afterwards.
    pub fn read<R: Read>(source: R, settings: &ReadingSettings) -> Result<MidiFile> {
        MidiFile::read_with(source, settings, None, &mut [])
    }

    /// Read a file through a caller-supplied buffer.
    ///
    /// Requires `ReaderBufferingPolicy::UseCustomBuffer`.
    pub fn read_with_buffer<R: Read>(
        source: R,
        settings: &ReadingSettings,
        buffer: &mut [u8],
    ) -> Result<MidiFile> {
        MidiFile::read_with(source, settings, Some(buffer), &mut [])
    }

    /// Read a file, notifying `handlers` as chunks and events are read.
    pub fn read_with_handlers<R: Read>(
        source: R,
        settings: &ReadingSettings,
        handlers: &mut [&mut dyn ReadingHandler],
    ) -> Result<MidiFile> {
        MidiFile::read_with(source, settings, None, handlers)
    }

    /// Read a file with every reading option available.
    pub fn read_with<R: Read>(
        source: R,
        settings: &ReadingSettings,
        buffer: Option<&mut [u8]>,
        handlers: &mut [&mut dyn ReadingHandler],
    ) -> Result<MidiFile> {
        let mut reader = MidiReader::new(source, &settings.reader_settings, buffer)?;
        let mut handlers = Handlers::new(handlers);
        FileReader::default().read(&mut reader, settings, &mut handlers)
    }

    /// Read a file from the filesystem.
    pub fn read_file<P: AsRef<Path>>(path: P, settings: &ReadingSettings) -> Result<MidiFile> {
        fn read_impl(path: &Path, settings: &ReadingSettings) -> Result<MidiFile> {
            MidiFile::read(File::open(path)?, settings)
        }
        read_impl(path.as_ref(), settings)
    }

    /// Encode the file into the given writer, which is flushed but not closed.
    ///
    /// The header declares `format` and counts the track chunks actually written.
    /// `Format::SingleTrack` merges every track chunk into one first.
    pub fn write<W: Write>(
        &self,
        out: &mut W,
        format: Format,
        settings: &WritingSettings,
    ) -> Result<()> {
        let merged;
        let mut chunks: Vec<&Chunk> = Vec::with_capacity(self.chunks.len());
        if format == Format::SingleTrack {
            merged = Chunk::Track(merge_tracks(
                self.tracks(),
                &TimedEventDetectionSettings::default(),
            ));
            chunks.push(&merged);
            chunks.extend(self.chunks.iter().filter(|c| c.as_track().is_none()));
        } else {
            chunks.extend(self.chunks.iter());
        }
        if settings.delete_unknown_chunks {
            chunks.retain(|chunk| !matches!(chunk, Chunk::Unknown(_)));
        }

        let mut out = MidiWriter::new(out, &settings.writer_settings);
        if settings.write_header_chunk {
            let timing = self.timing.ok_or(Error::InvalidOperation(
                "a file without time division cannot be written with a header chunk",
            ))?;
            let track_count = chunks.iter().filter(|c| c.as_track().is_some()).count();
            HeaderChunk::write(&mut out, format, timing, track_count)?;
        }

        //Try to write the file in parallel
        #[cfg(feature = "parallel")]
        {
            //Figure out whether multithreading is worth it
            let event_count = chunks
                .iter()
                .filter_map(|c| c.as_track())
                .map(|track| track.events.len())
                .sum::<usize>();
            if event_count * EVENTS_TO_BYTES > PARALLEL_ENABLE_THRESHOLD {
                use rayon::prelude::*;

                trace!(event_count, "encoding chunks in parallel");
                //Write out the chunks in parallel into several different buffers
                let encoded = chunks
                    .par_iter()
                    .map(|chunk| {
                        let mut buf = Vec::new();
                        chunk.write(&mut buf, settings)?;
                        Ok(buf)
                    })
                    .collect::<Result<Vec<Vec<u8>>>>()?;

                //Write down the chunks sequentially and in order
                for buf in encoded {
                    out.write_all(&buf)?;
                }
                out.finish()?;
                return Ok(());
            }
        }

        //Write the chunks into a reusable buffer before writing them out
        let mut buf = Vec::with_capacity(8 * 1024);
        for chunk in chunks {
            chunk.write(&mut buf, settings)?;
            out.write_all(&buf)?;
            buf.clear();
        }
        out.finish()?;
        Ok(())
    }

    /// Encode the file into a `Vec`.
    pub fn to_bytes(&self, format: Format, settings: &WritingSettings) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        self.write(&mut out, format, settings)?;
        Ok(out)
    }

    /// Write the file to the filesystem, creating or truncating it.
    pub fn save<P: AsRef<Path>>(
        &self,
        path: P,
        format: Format,
        settings: &WritingSettings,
    ) -> Result<()> {
        fn save_impl(
            smf: &MidiFile,
            path: &Path,
            format: Format,
            settings: &WritingSettings,
        ) -> Result<()> {
            smf.write(&mut File::create(path)?, format, settings)
        }
        save_impl(self, path.as_ref(), format, settings)
    }
}

/// State carried across the chunks of a file being read.
#[derive(Default)]
struct FileReader {
    file: MidiFile,
    header: Option<HeaderChunk>,
    track_count: usize,
}
impl FileReader {
    fn read<R: Read>(
        mut self,
        reader: &mut MidiReader<'_, R>,
        settings: &ReadingSettings,
        handlers: &mut Handlers,
    ) -> Result<MidiFile> {
        self.file.timing = None;
        handlers.notify(HandlerScope::FILE, |h| h.on_start_file_reading());
        while !reader.end_reached()? {
            if settings.stop_reading_on_expected_track_chunks_count_reached {
                if let Some(header) = &self.header {
                    if self.track_count >= header.track_count as usize {
                        debug!(count = self.track_count, "read every expected track chunk");
                        break;
                    }
                }
            }
            match self.read_chunk(reader, settings, handlers) {
                Ok(true) => {}
                Ok(false) => break,
                Err(err)
                    if err.is_not_enough_bytes()
                        && settings.not_enough_bytes_policy == NotEnoughBytesPolicy::Ignore =>
                {
                    warn!(%err, "input ended prematurely, keeping what was read");
                    break;
                }
                Err(err) => return Err(err),
            }
        }

        match &self.header {
            Some(header) => {
                let expected = header.track_count;
                if self.track_count != expected as usize {
                    match settings.unexpected_track_chunks_count_policy {
                        UnexpectedTrackChunksCountPolicy::Abort => {
                            bail!(Error::UnexpectedTrackChunksCount {
                                expected,
                                actual: self.track_count,
                            })
                        }
                        UnexpectedTrackChunksCountPolicy::Ignore => warn!(
                            expected,
                            actual = self.track_count,
                            "unexpected amount of track chunks"
                        ),
                    }
                }
            }
            None => match settings.no_header_chunk_policy {
                NoHeaderChunkPolicy::Abort => bail!(Error::NoHeaderChunk),
                NoHeaderChunkPolicy::Ignore => warn!("file has no header chunk"),
            },
        }
        handlers.notify(HandlerScope::FILE, |h| h.on_finish_file_reading(&self.file));
        Ok(self.file)
    }

    /// Read a single chunk. Returns `false` if reading should stop.
    fn read_chunk<R: Read>(
        &mut self,
        reader: &mut MidiReader<'_, R>,
        settings: &ReadingSettings,
        handlers: &mut Handlers,
    ) -> Result<bool> {
        let position = reader.position();
        let (id, got) = reader.read_id()?;
        if got < 4 {
            match settings.not_enough_bytes_policy {
                NotEnoughBytesPolicy::Abort => bail!(Error::NotEnoughBytes {
                    position,
                    expected: 4,
                    actual: got as u64,
                }),
                NotEnoughBytesPolicy::Ignore => {
                    warn!(position, got, "input ended inside a chunk id");
                    return Ok(false);
                }
            }
        }
        if position == 0 && id == riff::RIFF {
            riff::enter_data_chunk(reader)?;
            return Ok(true);
        }
        let id = ChunkId(id);
        let size = reader.read_u32()?;
        let content_start = reader.position();
        trace!(%id, position, size, "reading chunk");

        if id == ChunkId::HEADER {
            let header = HeaderChunk::read_content(reader)?;
            finish_chunk(reader, id, size, content_start, settings)?;
            self.read_header(header, settings, handlers)?;
        } else if id == ChunkId::TRACK {
            let extra = self
                .header
                .map_or(false, |h| self.track_count >= h.track_count as usize);
            if extra && settings.extra_track_chunk_policy == ExtraTrackChunkPolicy::Skip {
                debug!(position, "skipping extra track chunk");
                reader.skip(size as u64)?;
                finish_chunk(reader, id, size, content_start, settings)?;
                return Ok(true);
            }
            self.read_track(reader, id, size, content_start, settings, handlers)?;
        } else {
            match read_other_chunk(reader, id, size, position, settings)? {
                Some(chunk) => self.file.chunks.push(chunk),
                None => {
                    reader.skip(size as u64)?;
                }
            }
            finish_chunk(reader, id, size, content_start, settings)?;
        }
        Ok(true)
    }

    fn read_header(
        &mut self,
        header: HeaderChunk,
        settings: &ReadingSettings,
        handlers: &mut Handlers,
    ) -> Result<()> {
        if self.header.is_some() {
            debug!("ignoring duplicate header chunk");
            return Ok(());
        }
        if header.format.is_none() {
            match settings.unknown_file_format_policy {
                UnknownFileFormatPolicy::Abort => bail!(Error::UnknownFileFormat {
                    format: header.raw_format,
                }),
                UnknownFileFormatPolicy::Ignore => {
                    warn!(format = header.raw_format, "unknown file format")
                }
            }
        }
        self.header = Some(header);
        self.file.timing = Some(header.timing);
        self.file.original_format = header.format;
        handlers.notify(HandlerScope::FILE, |h| {
            h.on_finish_header_chunk_reading(header.timing, header.track_count)
        });
        Ok(())
    }

    fn read_track<R: Read>(
        &mut self,
        reader: &mut MidiReader<'_, R>,
        id: ChunkId,
        size: u32,
        content_start: u64,
        settings: &ReadingSettings,
        handlers: &mut Handlers,
    ) -> Result<()> {
        handlers.notify(HandlerScope::TRACK_CHUNK, |h| h.on_start_track_chunk_reading());
        let mut track = TrackChunk::default();
        handlers.notify(HandlerScope::TRACK_CHUNK, |h| {
            h.on_start_track_chunk_content_reading(&track)
        });
        let end = content_start + size as u64;
        let result = track
            .read_content(reader, end, settings, |ev, time| {
                handlers.notify(HandlerScope::EVENT, |h| h.on_finish_event_reading(ev, time))
            })
            .and_then(|()| finish_chunk(reader, id, size, content_start, settings));
        self.track_count += 1;
        if let Err(err) = result {
            //Keep the partial track in case the error is tolerated
            self.file.chunks.push(Chunk::Track(track));
            return Err(err);
        }
        handlers.notify(HandlerScope::TRACK_CHUNK, |h| {
            h.on_finish_track_chunk_reading(&track)
        });
        self.file.chunks.push(Chunk::Track(track));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{num::u15, settings::InvalidChunkSizePolicy};

    const HEADER: &[u8] = b"MThd\x00\x00\x00\x06\x00\x01\x00\x01\x00\x60";

    fn file(chunks: &[&[u8]]) -> Vec<u8> {
        let mut bytes = HEADER.to_vec();
        for chunk in chunks {
            bytes.extend_from_slice(chunk);
        }
        bytes
    }

    #[test]
    fn header_is_consumed() {
        let bytes = file(&[b"MTrk\x00\x00\x00\x04\x00\xFF\x2F\x00"]);
        let smf = MidiFile::read(&bytes[..], &ReadingSettings::default()).unwrap();
        assert_eq!(smf.timing, Some(Timing::Metrical(u15::new(96))));
        assert_eq!(smf.original_format, Some(Format::Parallel));
        assert_eq!(smf.chunks, vec![Chunk::Track(TrackChunk::default())]);
    }

    #[test]
    fn missing_header() {
        let bytes = b"MTrk\x00\x00\x00\x04\x00\xFF\x2F\x00";
        let mut settings = ReadingSettings::default();
        assert!(matches!(
            MidiFile::read(&bytes[..], &settings),
            Err(Error::NoHeaderChunk)
        ));
        settings.no_header_chunk_policy = NoHeaderChunkPolicy::Ignore;
        let smf = MidiFile::read(&bytes[..], &settings).unwrap();
        assert_eq!(smf.timing, None);
        assert_eq!(smf.tracks().count(), 1);
    }

    #[test]
    fn unknown_format() {
        let mut bytes = file(&[b"MTrk\x00\x00\x00\x04\x00\xFF\x2F\x00"]);
        bytes[9] = 7;
        let mut settings = ReadingSettings::default();
        let smf = MidiFile::read(&bytes[..], &settings).unwrap();
        assert_eq!(smf.original_format, None);
        settings.unknown_file_format_policy = UnknownFileFormatPolicy::Abort;
        assert!(matches!(
            MidiFile::read(&bytes[..], &settings),
            Err(Error::UnknownFileFormat { format: 7 })
        ));
    }

    #[test]
    fn track_count_mismatch() {
        let bytes = file(&[]);
        let mut settings = ReadingSettings::default();
        assert!(MidiFile::read(&bytes[..], &settings).is_ok());
        settings.unexpected_track_chunks_count_policy = UnexpectedTrackChunksCountPolicy::Abort;
        assert!(matches!(
            MidiFile::read(&bytes[..], &settings),
            Err(Error::UnexpectedTrackChunksCount {
                expected: 1,
                actual: 0
            })
        ));
    }

    #[test]
    fn extra_tracks() {
        let track: &[u8] = b"MTrk\x00\x00\x00\x04\x00\xFF\x2F\x00";
        let bytes = file(&[track, track, b"Abcd\x00\x00\x00\x01x"]);
        let mut settings = ReadingSettings::default();
        assert_eq!(
            MidiFile::read(&bytes[..], &settings).unwrap().chunks.len(),
            3
        );

        settings.extra_track_chunk_policy = ExtraTrackChunkPolicy::Skip;
        let smf = MidiFile::read(&bytes[..], &settings).unwrap();
        assert_eq!(smf.tracks().count(), 1);
        assert_eq!(smf.chunks.len(), 2);

        settings.extra_track_chunk_policy = ExtraTrackChunkPolicy::Read;
        settings.stop_reading_on_expected_track_chunks_count_reached = true;
        assert_eq!(
            MidiFile::read(&bytes[..], &settings).unwrap().chunks.len(),
            1
        );
    }

    #[test]
    fn chunk_size_mismatch() {
        //Declares 6 bytes, but the end of track event comes after 4
        let bytes = file(&[b"MTrk\x00\x00\x00\x06\x00\xFF\x2F\x00\x00\x00"]);
        let mut settings = ReadingSettings::default();
        assert!(matches!(
            MidiFile::read(&bytes[..], &settings),
            Err(Error::InvalidChunkSize {
                expected: 6,
                actual: 4,
                ..
            })
        ));
        settings.invalid_chunk_size_policy = InvalidChunkSizePolicy::Ignore;
        let smf = MidiFile::read(&bytes[..], &settings).unwrap();
        assert_eq!(smf.tracks().count(), 1);
    }

    #[test]
    fn truncated_track_is_kept() {
        let bytes = file(&[b"MTrk\x00\x00\x00\x10\x00\xFF\x01\x01a\x00\x90\x40"]);
        let mut settings = ReadingSettings::default();
        assert!(matches!(
            MidiFile::read(&bytes[..], &settings),
            Err(Error::NotEnoughBytes { .. })
        ));
        settings.not_enough_bytes_policy = NotEnoughBytesPolicy::Ignore;
        let smf = MidiFile::read(&bytes[..], &settings).unwrap();
        let track = smf.tracks().next().unwrap();
        assert_eq!(track.events.len(), 1);
    }

    #[test]
    fn truncated_chunk_id() {
        let bytes = file(&[b"MT"]);
        let mut settings = ReadingSettings::default();
        assert!(matches!(
            MidiFile::read(&bytes[..], &settings),
            Err(Error::NotEnoughBytes {
                position: 14,
                expected: 4,
                actual: 2
            })
        ));
        settings.not_enough_bytes_policy = NotEnoughBytesPolicy::Ignore;
        assert!(MidiFile::read(&bytes[..], &settings).is_ok());
    }

    #[test]
    fn header_track_count_counts_written_tracks() {
        let mut smf = MidiFile::from_tracks(vec![TrackChunk::default(), TrackChunk::default()]);
        smf.chunks.push(Chunk::Unknown(crate::chunk::UnknownChunk {
            id: ChunkId(*b"Abcd"),
            data: Some(vec![1, 2]),
        }));
        let bytes = smf
            .to_bytes(Format::Parallel, &WritingSettings::default())
            .unwrap();
        assert_eq!(&bytes[10..12], &[0, 2]);
        let bytes = smf
            .to_bytes(Format::SingleTrack, &WritingSettings::default())
            .unwrap();
        assert_eq!(&bytes[8..12], &[0, 0, 0, 1]);

        let mut settings = WritingSettings::default();
        settings.delete_unknown_chunks = true;
        let bytes = smf.to_bytes(Format::Parallel, &settings).unwrap();
        assert_eq!(bytes.len(), 14 + 2 * 12);
    }

    #[test]
    fn missing_timing() {
        let mut smf = MidiFile::default();
        smf.timing = None;
        assert!(matches!(
            smf.to_bytes(Format::Parallel, &WritingSettings::default()),
            Err(Error::InvalidOperation(_))
        ));
        let mut settings = WritingSettings::default();
        settings.write_header_chunk = false;
        assert_eq!(smf.to_bytes(Format::Parallel, &settings).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn equality_ignores_original_format() {
        let bytes = file(&[b"MTrk\x00\x00\x00\x04\x00\xFF\x2F\x00"]);
        let read = MidiFile::read(&bytes[..], &ReadingSettings::default()).unwrap();
        let built = MidiFile::from_tracks(vec![TrackChunk::default()]);
        assert_eq!(read, built);
        let strict = EqualitySettings {
            compare_original_format: true,
            ..Default::default()
        };
        assert!(!read.equals(&built, &strict));
    }
}
