use crate::{
    io::WriteCounter,
    num::{u14, u15, u24, u4, u7},
    timed, Chunk, ChunkId, CustomChunk, CustomChunkBox, CustomMeta, CustomMetaEvent,
    EqualitySettings, Error, Format, Fps, HandlerScope, MetaMessage, MidiFile, MidiMessage,
    PitchBend, ReaderBufferingPolicy, ReaderSettings, ReadingHandler, ReadingSettings, Result,
    SmpteTime, TextEncoding, Timing, TrackChunk, TrackEvent, TrackEventKind, UnknownChunk,
    WriterBufferingPolicy, WritingSettings, ZeroLengthDataPolicy,
};
use pretty_assertions::assert_eq;
use std::{io::Write as _, sync::Arc};

/// Encode a file, panicking on failure.
macro_rules! encode {
    ($smf:expr, $format:expr) => {
        encode!($smf, $format, WritingSettings::default())
    };
    ($smf:expr, $format:expr, $settings:expr) => {
        match $smf.to_bytes($format, &$settings) {
            Ok(bytes) => bytes,
            Err(err) => panic!("failed to write midi file: {}", err),
        }
    };
}

/// Decode a file, panicking on failure.
macro_rules! decode {
    ($bytes:expr) => {
        decode!($bytes, ReadingSettings::default())
    };
    ($bytes:expr, $settings:expr) => {
        match MidiFile::read(&$bytes[..], &$settings) {
            Ok(smf) => smf,
            Err(err) => panic!("failed to read midi file: {}", err),
        }
    };
}

/// Write a file, read it back and check that nothing changed.
macro_rules! test_rewrite {
    ($smf:expr) => {
        test_rewrite!($smf, WritingSettings::default(), ReadingSettings::default())
    };
    ($smf:expr, $wsettings:expr, $rsettings:expr) => {{
        let smf = $smf;
        let bytes = encode!(smf, Format::Parallel, $wsettings);
        let reread = decode!(bytes, $rsettings);
        assert_eq!(smf, reread, "reread midi file is not identical to the original");
        bytes
    }};
}

fn midi(delta: u64, channel: u8, message: MidiMessage) -> TrackEvent {
    TrackEvent::new(
        delta,
        TrackEventKind::Midi {
            channel: u4::new(channel),
            message,
        },
    )
}

fn meta(delta: u64, meta: MetaMessage) -> TrackEvent {
    TrackEvent::new(delta, TrackEventKind::Meta(meta))
}

fn note_on(delta: u64, key: u8) -> TrackEvent {
    midi(
        delta,
        0,
        MidiMessage::NoteOn {
            key: u7::new(key),
            vel: u7::new(100),
        },
    )
}

fn note_off(delta: u64, key: u8) -> TrackEvent {
    midi(
        delta,
        0,
        MidiMessage::NoteOff {
            key: u7::new(key),
            vel: u7::new(0),
        },
    )
}

fn text(delta: u64, text: &str) -> TrackEvent {
    meta(delta, MetaMessage::Text(Some(text.to_string())))
}

/// A file using every kind of event.
fn kitchen_sink() -> MidiFile {
    let info = TrackChunk::new(vec![
        meta(0, MetaMessage::TrackNumber(Some(3))),
        meta(0, MetaMessage::TrackName(Some("info".to_string()))),
        meta(0, MetaMessage::Copyright(Some("(c)".to_string()))),
        meta(0, MetaMessage::Tempo(u24::new(400_000))),
        meta(0, MetaMessage::TimeSignature(3, 2, 24, 8)),
        meta(0, MetaMessage::KeySignature(-3, true)),
        meta(
            0,
            MetaMessage::SmpteOffset(SmpteTime::new(1, 2, 3, 4, 5, Fps::Fps25).unwrap()),
        ),
        meta(0, MetaMessage::MidiChannel(u4::new(9))),
        meta(0, MetaMessage::MidiPort(u7::new(2))),
        meta(5, MetaMessage::Marker(Some("verse".to_string()))),
        meta(0, MetaMessage::SequencerSpecific(Some(vec![0x41, 0x10]))),
        meta(0, MetaMessage::Unknown(0x60, Some(vec![1, 2, 3]))),
    ]);
    let notes = TrackChunk::new(vec![
        midi(
            0,
            1,
            MidiMessage::ProgramChange {
                program: u7::new(19),
            },
        ),
        midi(
            0,
            1,
            MidiMessage::Controller {
                controller: u7::new(7),
                value: u7::new(90),
            },
        ),
        note_on(10, 60),
        note_on(0, 64),
        midi(
            2,
            0,
            MidiMessage::Aftertouch {
                key: u7::new(60),
                vel: u7::new(30),
            },
        ),
        midi(
            2,
            0,
            MidiMessage::ChannelAftertouch {
                vel: u7::new(20),
            },
        ),
        midi(
            2,
            0,
            MidiMessage::PitchBend {
                bend: PitchBend::from_int(-1000),
            },
        ),
        note_off(200, 60),
        TrackEvent::new(0, TrackEventKind::SysEx(vec![0x7E, 0x7F, 0x09, 0x01, 0xF7])),
        TrackEvent::new(1, TrackEventKind::Escape(vec![0xF3, 0x01])),
        meta(1, MetaMessage::Lyric(Some("la".to_string()))),
    ]);
    let mut smf = MidiFile::from_tracks(vec![info, notes]);
    smf.chunks.push(Chunk::Unknown(UnknownChunk {
        id: ChunkId(*b"XFIH"),
        data: Some(b"extra".to_vec()),
    }));
    smf
}

mod rewrite {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn kitchen_sink() {
        test_rewrite!(super::kitchen_sink());
    }

    #[test]
    fn smpte_timing() {
        let mut smf = super::kitchen_sink();
        smf.timing = Some(Timing::Timecode(Fps::Fps29, 40));
        test_rewrite!(smf);
    }

    #[test]
    fn clone_is_deep() {
        let smf = super::kitchen_sink();
        let mut clone = smf.clone();
        assert_eq!(smf, clone);
        clone.tracks_mut().next().unwrap().events.clear();
        assert_ne!(smf, clone);
        assert_eq!(smf, super::kitchen_sink());
    }

    #[test]
    fn running_status() {
        let smf = super::kitchen_sink();
        let plain = encode!(smf, Format::Parallel);
        let settings = WritingSettings {
            use_running_status: true,
            ..Default::default()
        };
        let compressed = test_rewrite!(smf.clone(), settings, ReadingSettings::default());
        assert!(compressed.len() < plain.len());

        let mut counter = WriteCounter::default();
        smf.write(&mut counter, Format::Parallel, &WritingSettings::default())
            .unwrap();
        assert_eq!(counter.0, plain.len() as u64);
    }

    #[test]
    fn silent_note_off() {
        let smf = MidiFile::from_tracks(vec![TrackChunk::new(vec![
            note_on(0, 60),
            note_off(10, 60),
        ])]);
        let settings = WritingSettings {
            note_off_as_silent_note_on: true,
            ..Default::default()
        };
        let bytes = test_rewrite!(smf, settings, ReadingSettings::default());
        assert_eq!(&bytes[26..30], &[0x0A, 0x90, 60, 0]);
    }

    #[test]
    fn text_encodings() {
        let smf = MidiFile::from_tracks(vec![TrackChunk::new(vec![text(0, "caf\u{e9}")])]);
        let wsettings = WritingSettings {
            text_encoding: TextEncoding::Latin1,
            ..Default::default()
        };
        let rsettings = ReadingSettings {
            text_encoding: TextEncoding::Latin1,
            ..Default::default()
        };
        test_rewrite!(smf.clone(), wsettings.clone(), rsettings);

        let reread = decode!(encode!(smf, Format::Parallel, wsettings));
        assert_eq!(
            reread.tracks().next().unwrap().events[0],
            text(0, "caf?")
        );
    }

    #[test]
    fn decode_text_callback() {
        let smf = MidiFile::from_tracks(vec![TrackChunk::new(vec![text(0, "abc")])]);
        let settings = ReadingSettings {
            decode_text_callback: Some(Arc::new(|bytes: &[u8], _: &ReadingSettings| {
                bytes.iter().rev().map(|&b| b as char).collect::<String>()
            })),
            ..Default::default()
        };
        let reread = decode!(encode!(smf, Format::Parallel), settings);
        assert_eq!(reread.tracks().next().unwrap().events[0], text(0, "cba"));
    }

    #[test]
    fn zero_length_payloads() {
        let empty = MidiFile::from_tracks(vec![TrackChunk::new(vec![
            text(0, ""),
            meta(0, MetaMessage::SequencerSpecific(Some(Vec::new()))),
        ])]);
        let null = MidiFile::from_tracks(vec![TrackChunk::new(vec![
            meta(0, MetaMessage::Text(None)),
            meta(0, MetaMessage::SequencerSpecific(None)),
        ])]);
        assert_ne!(empty, null);
        //Both are written the same way
        assert_eq!(encode!(empty, Format::Parallel), encode!(null, Format::Parallel));

        test_rewrite!(empty);
        let settings = ReadingSettings {
            zero_length_data_policy: ZeroLengthDataPolicy::ReadAsNull,
            ..Default::default()
        };
        test_rewrite!(null, WritingSettings::default(), settings);
    }

    #[test]
    fn default_meta_events_are_dropped() {
        let smf = MidiFile::from_tracks(vec![TrackChunk::new(vec![
            meta(0, MetaMessage::default_tempo()),
            meta(0, MetaMessage::default_time_signature()),
            meta(0, MetaMessage::default_key_signature()),
            note_on(4, 60),
        ])]);
        let settings = WritingSettings {
            delete_default_set_tempo: true,
            delete_default_time_signature: true,
            delete_default_key_signature: true,
            ..Default::default()
        };
        let reread = decode!(encode!(smf, Format::Parallel, settings));
        assert_eq!(reread.tracks().next().unwrap().events, vec![note_on(4, 60)]);
    }

    #[test]
    fn single_track_merges() {
        let smf = MidiFile::from_tracks(vec![
            TrackChunk::new(vec![note_on(0, 60), note_off(20, 60)]),
            TrackChunk::new(vec![note_on(10, 64), note_off(20, 64)]),
        ]);
        let reread = decode!(encode!(smf, Format::SingleTrack));
        assert_eq!(reread.original_format, Some(Format::SingleTrack));
        assert_eq!(
            reread.chunks,
            vec![Chunk::Track(TrackChunk::new(vec![
                note_on(0, 60),
                note_on(10, 64),
                note_off(10, 60),
                note_off(10, 64),
            ]))]
        );
    }

    #[test]
    fn large_file() {
        //Large enough to be encoded in parallel
        let tracks = (0..8u8)
            .map(|t| {
                TrackChunk::new(
                    (0..600u32)
                        .map(|i| note_on(i as u64 % 7, ((i + t as u32) % 128) as u8))
                        .collect(),
                )
            })
            .collect::<Vec<_>>();
        let smf = MidiFile::from_tracks(tracks);
        let bytes = test_rewrite!(smf.clone());
        let serial = {
            let mut out = Vec::new();
            for track in smf.tracks() {
                let one = MidiFile::from_tracks(vec![track.clone()]);
                out.extend_from_slice(&encode!(one, Format::Parallel)[14..]);
            }
            out
        };
        assert_eq!(&bytes[14..], &serial[..]);
    }

    #[test]
    fn equality_settings() {
        let a = MidiFile::from_tracks(vec![TrackChunk::new(vec![note_on(0, 60)])]);
        let b = MidiFile::from_tracks(vec![TrackChunk::new(vec![note_on(7, 60)])]);
        assert_ne!(a, b);
        let settings = EqualitySettings {
            compare_delta_times: false,
            ..Default::default()
        };
        assert!(a.equals(&b, &settings));
    }
}

mod reading {
    use super::*;
    use pretty_assertions::assert_eq;

    fn buffering_settings() -> Vec<ReaderSettings> {
        let mut all = Vec::new();
        for &policy in &[
            ReaderBufferingPolicy::DontUseBuffering,
            ReaderBufferingPolicy::UseFixedSizeBuffer,
            ReaderBufferingPolicy::BufferAllData,
        ] {
            for &buffer_size in &[1, 4, 123, 4096, 10000] {
                for &threshold in &[1, 128, 500_000] {
                    all.push(ReaderSettings {
                        buffering_policy: policy,
                        buffer_size,
                        incremental_bytes_reading_threshold: threshold,
                        ..Default::default()
                    });
                }
            }
        }
        all
    }

    /// A source that hands out its data a few bytes at a time.
    struct Trickle<'a>(&'a [u8]);
    impl std::io::Read for Trickle<'_> {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            let len = buf.len().min(self.0.len()).min(3);
            buf[..len].copy_from_slice(&self.0[..len]);
            self.0 = &self.0[len..];
            Ok(len)
        }
    }

    #[test]
    fn buffering_policies_agree() {
        let smf = super::kitchen_sink();
        let bytes = encode!(smf, Format::Parallel);
        for reader_settings in buffering_settings() {
            let settings = ReadingSettings {
                reader_settings: reader_settings.clone(),
                ..Default::default()
            };
            let reread = MidiFile::read(Trickle(&bytes), &settings).unwrap();
            assert_eq!(reread, smf, "failed with {:?}", reader_settings);
        }
    }

    #[test]
    fn custom_buffer() {
        let smf = super::kitchen_sink();
        let bytes = encode!(smf, Format::Parallel);
        let mut settings = ReadingSettings::default();
        settings.reader_settings.buffering_policy = ReaderBufferingPolicy::UseCustomBuffer;
        let mut buffer = [0; 17];
        let reread = MidiFile::read_with_buffer(&bytes[..], &settings, &mut buffer).unwrap();
        assert_eq!(reread, smf);
        assert!(matches!(
            MidiFile::read(&bytes[..], &settings),
            Err(Error::InvalidOperation(_))
        ));
    }

    #[test]
    fn unbuffered_writer() {
        let smf = super::kitchen_sink();
        let mut settings = WritingSettings::default();
        settings.writer_settings.buffering_policy = WriterBufferingPolicy::DontUseBuffering;
        assert_eq!(encode!(smf, Format::Parallel, settings), encode!(smf, Format::Parallel));
    }

    #[test]
    fn rmid() {
        let smf = super::kitchen_sink();
        let bytes = encode!(smf, Format::Parallel);
        let mut rmid = Vec::new();
        rmid.write_all(b"RIFF").unwrap();
        rmid.write_all(&(bytes.len() as u32 + 12).to_le_bytes()).unwrap();
        rmid.write_all(b"RMIDdata").unwrap();
        rmid.write_all(&(bytes.len() as u32).to_le_bytes()).unwrap();
        rmid.write_all(&bytes).unwrap();
        if bytes.len() % 2 == 1 {
            rmid.push(0);
        }
        rmid.write_all(b"LIST\x04\x00\x00\x00INFO").unwrap();
        assert_eq!(decode!(rmid), smf);
    }

    #[test]
    fn file_roundtrip() {
        let smf = super::kitchen_sink();
        let path = std::env::temp_dir().join(format!("smfkit-test-{}.mid", std::process::id()));
        smf.save(&path, Format::Parallel, &WritingSettings::default())
            .unwrap();
        let reread = MidiFile::read_file(&path, &ReadingSettings::default());
        let _ = std::fs::remove_file(&path);
        assert_eq!(reread.unwrap(), smf);
    }

    #[test]
    fn unknown_chunks() {
        let smf = super::kitchen_sink();
        let bytes = encode!(smf, Format::Parallel);
        let mut settings = ReadingSettings::default();
        settings.unknown_chunk_id_policy = crate::UnknownChunkIdPolicy::Skip;
        assert_eq!(decode!(bytes, settings).chunks.len(), 2);
        settings.unknown_chunk_id_policy = crate::UnknownChunkIdPolicy::Abort;
        assert!(matches!(
            MidiFile::read(&bytes[..], &settings),
            Err(Error::UnknownChunk { id: ChunkId(ref id), .. }) if id == b"XFIH"
        ));
    }
}

mod handlers {
    use super::*;
    use pretty_assertions::assert_eq;

    #[derive(Default)]
    struct Counter {
        scope: Option<HandlerScope>,
        file_starts: usize,
        headers: Vec<(Timing, u16)>,
        track_starts: usize,
        content_starts: usize,
        track_ends: usize,
        events: Vec<u64>,
        file_ends: usize,
    }
    impl ReadingHandler for Counter {
        fn scope(&self) -> HandlerScope {
            self.scope.unwrap_or(HandlerScope::all())
        }
        fn on_start_file_reading(&mut self) {
            self.file_starts += 1;
        }
        fn on_finish_header_chunk_reading(&mut self, timing: Timing, track_count: u16) {
            self.headers.push((timing, track_count));
        }
        fn on_start_track_chunk_reading(&mut self) {
            self.track_starts += 1;
        }
        fn on_start_track_chunk_content_reading(&mut self, track: &TrackChunk) {
            assert!(track.events.is_empty());
            self.content_starts += 1;
        }
        fn on_finish_event_reading(&mut self, _event: &TrackEvent, absolute_time: u64) {
            self.events.push(absolute_time);
        }
        fn on_finish_track_chunk_reading(&mut self, _track: &TrackChunk) {
            self.track_ends += 1;
        }
        fn on_finish_file_reading(&mut self, file: &MidiFile) {
            assert_eq!(file.tracks().count(), 3);
            self.file_ends += 1;
        }
    }

    fn bytes() -> Vec<u8> {
        let smf = MidiFile::from_tracks(vec![
            TrackChunk::new(vec![text(0, "a"), text(10, "b")]),
            TrackChunk::default(),
            TrackChunk::new(vec![meta(5, MetaMessage::Tempo(u24::new(600_000)))]),
        ]);
        encode!(smf, Format::Parallel)
    }

    #[test]
    fn scopes_are_isolated() {
        let mut file = Counter {
            scope: Some(HandlerScope::FILE),
            ..Default::default()
        };
        let mut track = Counter {
            scope: Some(HandlerScope::TRACK_CHUNK),
            ..Default::default()
        };
        let mut event = Counter {
            scope: Some(HandlerScope::EVENT),
            ..Default::default()
        };
        let bytes = bytes();
        MidiFile::read_with_handlers(
            &bytes[..],
            &ReadingSettings::default(),
            &mut [&mut file, &mut track, &mut event],
        )
        .unwrap();

        assert_eq!((file.file_starts, file.file_ends), (1, 1));
        assert_eq!(file.headers, vec![(Timing::Metrical(u15::new(96)), 3)]);
        assert_eq!(
            (file.track_starts, file.content_starts, file.track_ends),
            (0, 0, 0)
        );
        assert!(file.events.is_empty());

        assert_eq!(
            (track.track_starts, track.content_starts, track.track_ends),
            (3, 3, 3)
        );
        assert_eq!((track.file_starts, track.file_ends), (0, 0));
        assert!(track.headers.is_empty() && track.events.is_empty());

        //End of track events are not stored, so they are not reported
        assert_eq!(event.events, vec![0, 10, 5]);
        assert_eq!((event.file_starts, event.track_starts), (0, 0));
    }

    #[test]
    fn stored_end_of_track_is_reported() {
        let mut all = Counter::default();
        let settings = ReadingSettings {
            end_of_track_storing_policy: crate::EndOfTrackStoringPolicy::Store,
            ..Default::default()
        };
        let bytes = bytes();
        MidiFile::read_with_handlers(&bytes[..], &settings, &mut [&mut all]).unwrap();
        assert_eq!(all.events, vec![0, 10, 10, 0, 5, 5]);
    }
}

mod custom {
    use super::*;
    use pretty_assertions::assert_eq;

    /// A meta event holding a big-endian counter.
    #[derive(Clone, PartialEq, Debug, Default)]
    struct Counter(u32);
    impl CustomMetaEvent for Counter {
        fn read_content(&mut self, data: &[u8], _settings: &ReadingSettings) -> Result<()> {
            let mut raw = [0; 4];
            let len = data.len().min(4);
            raw[4 - len..].copy_from_slice(&data[..len]);
            self.0 = u32::from_be_bytes(raw);
            Ok(())
        }
        fn write_content(
            &self,
            out: &mut dyn std::io::Write,
            _settings: &WritingSettings,
        ) -> Result<()> {
            out.write_all(&self.0.to_be_bytes())?;
            Ok(())
        }
        fn content_size(&self, _settings: &WritingSettings) -> usize {
            4
        }
    }

    /// A chunk listing names, one per line.
    #[derive(Clone, PartialEq, Debug, Default)]
    struct Names(Vec<String>);
    impl CustomChunk for Names {
        fn read_content(&mut self, data: &[u8], _settings: &ReadingSettings) -> Result<()> {
            self.0 = String::from_utf8_lossy(data)
                .lines()
                .map(str::to_string)
                .collect();
            Ok(())
        }
        fn write_content(
            &self,
            out: &mut dyn std::io::Write,
            _settings: &WritingSettings,
        ) -> Result<()> {
            for name in &self.0 {
                writeln!(out, "{}", name)?;
            }
            Ok(())
        }
        fn content_size(&self, _settings: &WritingSettings) -> usize {
            self.0.iter().map(|name| name.len() + 1).sum()
        }
    }

    #[test]
    fn custom_types_roundtrip() {
        let mut smf = MidiFile::from_tracks(vec![TrackChunk::new(vec![meta(
            3,
            MetaMessage::Custom(CustomMeta::new(Counter(0xBEEF))),
        )])]);
        smf.chunks.push(Chunk::Custom(CustomChunkBox::new(Names(vec![
            "alto".to_string(),
            "tenor".to_string(),
        ]))));

        let mut wsettings = WritingSettings::default();
        assert!(matches!(
            smf.to_bytes(Format::Parallel, &wsettings),
            Err(Error::UnregisteredCustomType { .. })
        ));
        wsettings.custom_meta_event_types.add::<Counter>(0x70);
        wsettings.custom_chunk_types.add::<Names>(ChunkId(*b"Name"));
        let mut rsettings = ReadingSettings::default();
        rsettings.custom_meta_event_types.add::<Counter>(0x70);
        rsettings.custom_chunk_types.add::<Names>(ChunkId(*b"Name"));
        test_rewrite!(smf.clone(), wsettings.clone(), rsettings);

        //Without registration they come back as unknown data
        let reread = decode!(encode!(smf, Format::Parallel, wsettings));
        assert_eq!(
            reread.tracks().next().unwrap().events[0],
            meta(3, MetaMessage::Unknown(0x70, Some(vec![0, 0, 0xBE, 0xEF])))
        );
        assert_eq!(
            reread.chunks[1],
            Chunk::Unknown(UnknownChunk {
                id: ChunkId(*b"Name"),
                data: Some(b"alto\ntenor\n".to_vec()),
            })
        );
    }

    #[test]
    fn downcasting() {
        let ev = CustomMeta::new(Counter(5));
        assert_eq!(ev.downcast_ref::<Counter>(), Some(&Counter(5)));
        assert_eq!(ev.downcast_ref::<Names>(), None);
    }
}

mod timing {
    use super::*;
    use pretty_assertions::assert_eq;
    use crate::TimedEventDetectionSettings;

    #[test]
    fn process_across_tracks() {
        let mut smf = MidiFile::from_tracks(vec![
            TrackChunk::new(vec![note_on(0, 60), note_off(100, 60)]),
            TrackChunk::new(vec![note_on(50, 64), note_off(100, 64)]),
        ]);
        //Delay every note off by 10 ticks
        let matched = timed::process_timed_events_where(
            smf.tracks_mut(),
            &TimedEventDetectionSettings::default(),
            Default::default(),
            |ev| {
                matches!(
                    ev.event,
                    TrackEventKind::Midi {
                        message: MidiMessage::NoteOff { .. },
                        ..
                    }
                )
            },
            |ev| ev.time += 10,
        );
        assert_eq!(matched, 2);
        let times: Vec<(u64, usize)> = smf
            .timed_events()
            .iter()
            .map(|ev| (ev.time, ev.track_index))
            .collect();
        assert_eq!(times, vec![(0, 0), (50, 1), (110, 0), (160, 1)]);
    }

    #[test]
    fn merged_track_survives_rewrite() {
        let smf = MidiFile::from_tracks(vec![
            TrackChunk::new(vec![text(0, "a"), text(30, "c")]),
            TrackChunk::new(vec![text(10, "b")]),
        ]);
        let merged = MidiFile::from_tracks(vec![smf.merged_track()]);
        assert_eq!(
            merged.timed_events(),
            smf.timed_events()
                .into_iter()
                .map(|mut ev| {
                    ev.track_index = 0;
                    ev
                })
                .collect::<Vec<_>>()
        );
        test_rewrite!(merged);
    }

    #[test]
    fn remove_from_file() {
        let mut smf = MidiFile::from_tracks(vec![
            TrackChunk::new(vec![note_on(0, 60), text(5, "x"), note_off(5, 60)]),
            TrackChunk::new(vec![text(1, "y")]),
        ]);
        let removed = smf.remove_timed_events_where(|ev| match &ev.event {
            TrackEventKind::Meta(_) => true,
            _ => false,
        });
        assert_eq!(removed, 2);
        assert_eq!(
            smf.chunks,
            vec![
                Chunk::Track(TrackChunk::new(vec![note_on(0, 60), note_off(10, 60)])),
                Chunk::Track(TrackChunk::default()),
            ]
        );
        assert_eq!(smf.remove_timed_events(), 2);
    }
}

#[test]
fn pitch_bend_range() {
    assert_eq!(PitchBend::from_int(0), PitchBend::centered());
    assert_eq!(PitchBend(u14::new(0)).as_int(), -0x2000);
}
