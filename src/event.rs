//! Track events: decoding with the reading policies applied, and the per-track encoder.

use crate::{
    custom::{write_checked, CustomMeta},
    io::{MidiReader, WriteExt},
    prelude::*,
    primitive::SmpteTime,
    settings::{
        InvalidChannelEventParameterValuePolicy, InvalidMetaEventParameterValuePolicy,
        ReadingSettings, SilentNoteOnPolicy, UnknownChannelEventAction, UnknownChannelEventPolicy,
        WritingSettings,
    },
};
use tracing::{trace, warn};

/// An event stored in a track chunk.
#[derive(Clone, PartialEq, Debug)]
pub struct TrackEvent {
    /// Ticks since the previous event of the same track.
    pub delta: u64,
    pub kind: TrackEventKind,
}
impl TrackEvent {
    #[inline]
    pub fn new(delta: u64, kind: TrackEventKind) -> TrackEvent {
        TrackEvent { delta, kind }
    }

    /// Read a single event, updating `running_status`.
    ///
    /// Returns `Ok(None)` when the event was dropped by the unknown channel event policy. Its
    /// delta time is dropped along with it.
    pub(crate) fn read<R: Read>(
        reader: &mut MidiReader<'_, R>,
        running_status: &mut Option<u8>,
        settings: &ReadingSettings,
    ) -> Result<Option<TrackEvent>> {
        let delta = reader.read_vlq()?;
        let kind = TrackEventKind::read(reader, running_status, settings)?;
        Ok(kind.map(|kind| TrackEvent { delta, kind }))
    }

    /// Whether this is an `EndOfTrack` meta event.
    #[inline]
    pub fn is_end_of_track(&self) -> bool {
        self.kind.is_end_of_track()
    }
}

/// The payload of a track event, without its time.
#[derive(Clone, PartialEq, Debug)]
pub enum TrackEventKind {
    /// Channel event, status `0x80..=0xEF`.
    Midi { channel: u4, message: MidiMessage },
    /// System exclusive event (`0xF0`). The status byte is not part of the data.
    SysEx(Vec<u8>),
    /// Escape event (`0xF7`), for sysex continuations and other raw device data.
    Escape(Vec<u8>),
    /// Meta event (`0xFF`). Never sent to devices.
    Meta(MetaMessage),
}
impl TrackEventKind {
    fn read<R: Read>(
        reader: &mut MidiReader<'_, R>,
        running_status: &mut Option<u8>,
        settings: &ReadingSettings,
    ) -> Result<Option<TrackEventKind>> {
        //Read status
        let position = reader.position();
        let byte = reader.read_u8()?;
        let (status, mut pending) = if byte < 0x80 {
            //Running status, the byte we just read is the first data byte
            match *running_status {
                Some(status) => (status, Some(byte)),
                None => bail!(Error::UnexpectedRunningStatus { position }),
            }
        } else {
            (byte, None)
        };
        //Status ranges
        let kind = match status {
            0x80..=0xEF => {
                *running_status = Some(status);
                let (channel, mut message) = MidiMessage::read(status, |parameter| {
                    read_data_byte(reader, &mut pending, status, parameter, settings)
                })?;
                if let MidiMessage::NoteOn { key, vel } = message {
                    if vel == 0 && settings.silent_note_on_policy == SilentNoteOnPolicy::NoteOff {
                        message = MidiMessage::NoteOff { key, vel };
                    }
                }
                TrackEventKind::Midi { channel, message }
            }
            0xFF => TrackEventKind::Meta(MetaMessage::read(reader, settings)?),
            0xF0 => TrackEventKind::SysEx(read_varlen_bytes(reader)?),
            0xF7 => TrackEventKind::Escape(read_varlen_bytes(reader)?),
            _ => {
                skip_unknown_channel_event(reader, status, position, settings)?;
                return Ok(None);
            }
        };
        Ok(Some(kind))
    }

    /// Whether this is an `EndOfTrack` meta event.
    #[inline]
    pub fn is_end_of_track(&self) -> bool {
        matches!(self, TrackEventKind::Meta(MetaMessage::EndOfTrack))
    }
}

fn read_varlen_bytes<R: Read>(reader: &mut MidiReader<'_, R>) -> Result<Vec<u8>> {
    let len = reader.read_vlq()?;
    let len = usize::try_from(len).map_err(|_| Error::TooLarge("event length"))?;
    reader.read_bytes(len)
}

/// Read a channel event data byte, or take the one already consumed through running status.
fn read_data_byte<R: Read>(
    reader: &mut MidiReader<'_, R>,
    pending: &mut Option<u8>,
    status: u8,
    parameter: &'static str,
    settings: &ReadingSettings,
) -> Result<u7> {
    let (value, position) = match pending.take() {
        Some(value) => (value, reader.position() - 1),
        None => {
            let position = reader.position();
            (reader.read_u8()?, position)
        }
    };
    if let Some(value) = u7::try_from(value) {
        return Ok(value);
    }
    let fixed = match settings.invalid_channel_event_parameter_value_policy {
        InvalidChannelEventParameterValuePolicy::Abort => {
            bail!(Error::InvalidChannelEventParameterValue {
                status,
                parameter,
                value,
                position,
            })
        }
        InvalidChannelEventParameterValuePolicy::ReadValid => u7::new(value),
        InvalidChannelEventParameterValuePolicy::SnapToLimits => u7::max_value(),
    };
    warn!(
        status,
        parameter, value, position, "invalid channel event data byte replaced with {}", fixed
    );
    Ok(fixed)
}

fn skip_unknown_channel_event<R: Read>(
    reader: &mut MidiReader<'_, R>,
    status: u8,
    position: u64,
    settings: &ReadingSettings,
) -> Result<()> {
    let channel = u4::from(status);
    let abort = Error::UnknownChannelEvent {
        status,
        channel,
        position,
    };
    let data_len = match settings.unknown_channel_event_policy {
        UnknownChannelEventPolicy::Abort => bail!(abort),
        UnknownChannelEventPolicy::SkipStatusByte => 0,
        UnknownChannelEventPolicy::SkipStatusByteAndOneDataByte => 1,
        UnknownChannelEventPolicy::SkipStatusByteAndTwoDataBytes => 2,
        UnknownChannelEventPolicy::UseCallback => {
            let callback = settings.unknown_channel_event_callback.as_ref().ok_or(
                Error::InvalidOperation("unknown channel event callback policy without a callback"),
            )?;
            match callback(status, channel) {
                UnknownChannelEventAction::Abort => bail!(abort),
                UnknownChannelEventAction::SkipData(len) => len,
            }
        }
    };
    warn!(status, position, data_len, "skipping unknown channel event");
    let skip_position = reader.position();
    let skipped = reader.skip(data_len as u64)?;
    ensure!(
        skipped == data_len as u64,
        Error::NotEnoughBytes {
            position: skip_position,
            expected: data_len as u64,
            actual: skipped,
        }
    );
    Ok(())
}

/// The message of a channel event, keyed by the high nibble of its status.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash)]
pub enum MidiMessage {
    /// `0x8n`.
    NoteOff { key: u7, vel: u7 },
    /// `0x9n`.
    ///
    /// Unless `SilentNoteOnPolicy::NoteOn` is used, zero velocity is read as a `NoteOff`.
    NoteOn { key: u7, vel: u7 },
    /// `0xAn`, polyphonic key pressure.
    Aftertouch { key: u7, vel: u7 },
    /// `0xBn`, control change.
    Controller { controller: u7, value: u7 },
    /// `0xCn`.
    ProgramChange { program: u7 },
    /// `0xDn`, channel pressure.
    ChannelAftertouch { vel: u7 },
    /// `0xEn`.
    PitchBend { bend: PitchBend },
}
impl MidiMessage {
    /// Decode a message given its status and a source of validated data bytes.
    ///
    /// `status` must be a channel message status (0x80..=0xEF).
    fn read<F>(status: u8, mut data: F) -> Result<(u4, MidiMessage)>
    where
        F: FnMut(&'static str) -> Result<u7>,
    {
        let channel = u4::from(status);
        let msg = match status >> 4 {
            0x8 => MidiMessage::NoteOff {
                key: data("note number")?,
                vel: data("velocity")?,
            },
            0x9 => MidiMessage::NoteOn {
                key: data("note number")?,
                vel: data("velocity")?,
            },
            0xA => MidiMessage::Aftertouch {
                key: data("note number")?,
                vel: data("aftertouch value")?,
            },
            0xB => MidiMessage::Controller {
                controller: data("controller number")?,
                value: data("controller value")?,
            },
            0xC => MidiMessage::ProgramChange {
                program: data("program number")?,
            },
            0xD => MidiMessage::ChannelAftertouch {
                vel: data("aftertouch value")?,
            },
            _ => {
                //Least significant 7 bits first
                let lsb = data("pitch value")?.as_int() as u16;
                let msb = data("pitch value")?.as_int() as u16;
                MidiMessage::PitchBend {
                    bend: PitchBend(u14::from(msb << 7 | lsb)),
                }
            }
        };
        Ok((channel, msg))
    }

    pub(crate) fn status_nibble(&self) -> u8 {
        match self {
            MidiMessage::NoteOff { .. } => 0x8,
            MidiMessage::NoteOn { .. } => 0x9,
            MidiMessage::Aftertouch { .. } => 0xA,
            MidiMessage::Controller { .. } => 0xB,
            MidiMessage::ProgramChange { .. } => 0xC,
            MidiMessage::ChannelAftertouch { .. } => 0xD,
            MidiMessage::PitchBend { .. } => 0xE,
        }
    }

    /// Data bytes only.
    fn write<W: Write + ?Sized>(&self, out: &mut W) -> io::Result<()> {
        match self {
            MidiMessage::NoteOff { key, vel }
            | MidiMessage::NoteOn { key, vel }
            | MidiMessage::Aftertouch { key, vel } => out.write_all(&[key.as_int(), vel.as_int()]),
            MidiMessage::Controller { controller, value } => {
                out.write_all(&[controller.as_int(), value.as_int()])
            }
            MidiMessage::ProgramChange { program } => out.write_u8(program.as_int()),
            MidiMessage::ChannelAftertouch { vel } => out.write_u8(vel.as_int()),
            MidiMessage::PitchBend { bend } => {
                let raw = bend.0.as_int();
                out.write_all(&[(raw & 0x7F) as u8, (raw >> 7) as u8])
            }
        }
    }
}

/// A raw 14-bit pitch wheel position. `0x2000` is the centre.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash)]
pub struct PitchBend(pub u14);
impl PitchBend {
    const CENTER: i16 = 0x2000;

    /// The wheel at rest.
    #[inline]
    pub const fn centered() -> PitchBend {
        PitchBend(u14::new(PitchBend::CENTER as u16))
    }

    /// Build from a signed offset from the centre, clamped to `-0x2000..=0x1FFF`.
    #[inline]
    pub fn from_int(offset: i16) -> PitchBend {
        let offset = offset.max(-PitchBend::CENTER).min(PitchBend::CENTER - 1);
        PitchBend(u14::new((offset + PitchBend::CENTER) as u16))
    }

    /// Signed offset from the centre.
    #[inline]
    pub fn as_int(self) -> i16 {
        self.0.as_int() as i16 - PitchBend::CENTER
    }
}

/// The payload of a meta event, decoded by type byte.
///
/// Text and binary payloads are `None` only when read with `ZeroLengthDataPolicy::ReadAsNull`
/// from an empty payload. `None` and an empty payload are distinct values.
#[derive(Clone, PartialEq, Debug)]
pub enum MetaMessage {
    /// `0x00`. `None` when the payload is empty.
    TrackNumber(Option<u16>),
    /// `0x01`.
    Text(Option<String>),
    /// `0x02`.
    Copyright(Option<String>),
    /// `0x03`, sequence or track name.
    TrackName(Option<String>),
    /// `0x04`.
    InstrumentName(Option<String>),
    /// `0x05`.
    Lyric(Option<String>),
    /// `0x06`.
    Marker(Option<String>),
    /// `0x07`.
    CuePoint(Option<String>),
    /// `0x08`.
    ProgramName(Option<String>),
    /// `0x09`.
    DeviceName(Option<String>),
    /// `0x20`, channel prefix.
    MidiChannel(u4),
    /// `0x21`.
    MidiPort(u7),
    /// `0x2F`. Written once at the end of every track chunk.
    EndOfTrack,
    /// `0x51`, microseconds per quarter note.
    Tempo(u24),
    /// `0x54`.
    SmpteOffset(SmpteTime),
    /// `0x58`: numerator, power-of-two denominator, clocks per metronome click and 32nd notes
    /// per quarter note.
    TimeSignature(u8, u8, u8, u8),
    /// `0x59`: sharps when positive or flats when negative, and whether the key is minor.
    KeySignature(i8, bool),
    /// `0x7F`.
    SequencerSpecific(Option<Vec<u8>>),
    /// Any other type byte, or a known one whose payload is too short.
    Unknown(u8, Option<Vec<u8>>),
    /// A meta event of a type registered in the settings' `custom_meta_event_types`.
    Custom(CustomMeta),
}
impl MetaMessage {
    /// 120 beats per minute.
    pub const DEFAULT_TEMPO: u32 = 500_000;

    /// The tempo assumed in the absence of tempo events.
    pub fn default_tempo() -> MetaMessage {
        MetaMessage::Tempo(u24::new(MetaMessage::DEFAULT_TEMPO))
    }

    /// 4/4 with 24 MIDI clocks per click and 8 32nd notes per quarter.
    pub fn default_time_signature() -> MetaMessage {
        MetaMessage::TimeSignature(4, 2, 24, 8)
    }

    /// C major.
    pub fn default_key_signature() -> MetaMessage {
        MetaMessage::KeySignature(0, false)
    }

    fn read<R: Read>(
        reader: &mut MidiReader<'_, R>,
        settings: &ReadingSettings,
    ) -> Result<MetaMessage> {
        let meta_type = reader.read_u8()?;
        let len = reader.read_vlq()?;
        let len = usize::try_from(len).map_err(|_| Error::TooLarge("meta event length"))?;
        let position = reader.position();
        let data = reader.read_bytes(len)?;
        MetaMessage::decode(meta_type, &data, position, settings)
    }

    /// Decode a meta event payload, sliced to exactly its declared length.
    pub(crate) fn decode(
        meta_type: u8,
        data: &[u8],
        position: u64,
        settings: &ReadingSettings,
    ) -> Result<MetaMessage> {
        if let Some(mut custom) = settings.custom_meta_event_types.create(meta_type) {
            custom.read_content(data, settings)?;
            return Ok(MetaMessage::Custom(CustomMeta::from_box(custom)));
        }
        let text = |data: &[u8]| settings.decode_text(data);
        let check = |parameter: &'static str, value: i16, min: i16, max: i16| {
            check_meta_param(meta_type, parameter, value, min, max, position, settings)
        };
        let msg = match meta_type {
            0x00 if data.is_empty() => MetaMessage::TrackNumber(None),
            0x00 if data.len() >= 2 => {
                MetaMessage::TrackNumber(Some(u16::from_be_bytes([data[0], data[1]])))
            }
            0x01 => MetaMessage::Text(text(data)),
            0x02 => MetaMessage::Copyright(text(data)),
            0x03 => MetaMessage::TrackName(text(data)),
            0x04 => MetaMessage::InstrumentName(text(data)),
            0x05 => MetaMessage::Lyric(text(data)),
            0x06 => MetaMessage::Marker(text(data)),
            0x07 => MetaMessage::CuePoint(text(data)),
            0x08 => MetaMessage::ProgramName(text(data)),
            0x09 => MetaMessage::DeviceName(text(data)),
            0x20 if !data.is_empty() && data[0] <= 0x0F => {
                MetaMessage::MidiChannel(u4::new(data[0]))
            }
            0x21 if !data.is_empty() && data[0] <= 0x7F => MetaMessage::MidiPort(u7::new(data[0])),
            0x2F => MetaMessage::EndOfTrack,
            0x51 if data.len() >= 3 => {
                MetaMessage::Tempo(u24::new(u32::from_be_bytes([0, data[0], data[1], data[2]])))
            }
            0x54 if data.len() >= 5 => {
                let (fps, hour) = SmpteTime::split_hour_byte(data[0]);
                let max_frame = fps.max_frame() as i16;
                let hour = check("hours", hour as i16, 0, SmpteTime::MAX_HOUR as i16)?;
                let minute = check("minutes", data[1] as i16, 0, SmpteTime::MAX_MINUTE as i16)?;
                let second = check("seconds", data[2] as i16, 0, SmpteTime::MAX_SECOND as i16)?;
                let frame = check("frames", data[3] as i16, 0, max_frame)?;
                let subframe =
                    check("subframes", data[4] as i16, 0, SmpteTime::MAX_SUBFRAME as i16)?;
                MetaMessage::SmpteOffset(SmpteTime::from_checked(
                    hour as u8,
                    minute as u8,
                    second as u8,
                    frame as u8,
                    subframe as u8,
                    fps,
                ))
            }
            0x58 if data.len() >= 2 => MetaMessage::TimeSignature(
                data[0],
                data[1],
                data.get(2).copied().unwrap_or(24),
                data.get(3).copied().unwrap_or(8),
            ),
            0x59 if data.len() >= 2 => {
                let key = check("key", data[0] as i8 as i16, -7, 7)?;
                let scale = check("scale", data[1] as i16, 0, 1)?;
                MetaMessage::KeySignature(key as i8, scale != 0)
            }
            0x7F => MetaMessage::SequencerSpecific(settings.wrap_data(data)),
            _ => {
                if let 0x00 | 0x20 | 0x21 | 0x51 | 0x54 | 0x58 | 0x59 = meta_type {
                    trace!(meta_type, position, "malformed meta event kept as unknown");
                }
                MetaMessage::Unknown(meta_type, settings.wrap_data(data))
            }
        };
        Ok(msg)
    }

    /// Write the type byte, length and payload of this meta event.
    pub(crate) fn write<W: Write + ?Sized>(
        &self,
        out: &mut W,
        settings: &WritingSettings,
    ) -> Result<()> {
        let text = |text: &Option<String>| match text {
            Some(text) => settings.text_encoding.encode(text),
            None => Vec::new(),
        };
        match self {
            MetaMessage::TrackNumber(None) => write_meta(out, 0x00, &[]),
            MetaMessage::TrackNumber(Some(number)) => {
                write_meta(out, 0x00, &number.to_be_bytes())
            }
            MetaMessage::Text(data) => write_meta(out, 0x01, &text(data)),
            MetaMessage::Copyright(data) => write_meta(out, 0x02, &text(data)),
            MetaMessage::TrackName(data) => write_meta(out, 0x03, &text(data)),
            MetaMessage::InstrumentName(data) => write_meta(out, 0x04, &text(data)),
            MetaMessage::Lyric(data) => write_meta(out, 0x05, &text(data)),
            MetaMessage::Marker(data) => write_meta(out, 0x06, &text(data)),
            MetaMessage::CuePoint(data) => write_meta(out, 0x07, &text(data)),
            MetaMessage::ProgramName(data) => write_meta(out, 0x08, &text(data)),
            MetaMessage::DeviceName(data) => write_meta(out, 0x09, &text(data)),
            MetaMessage::MidiChannel(chan) => write_meta(out, 0x20, &[chan.as_int()]),
            MetaMessage::MidiPort(port) => write_meta(out, 0x21, &[port.as_int()]),
            MetaMessage::EndOfTrack => write_meta(out, 0x2F, &[]),
            MetaMessage::Tempo(tempo) => {
                write_meta(out, 0x51, &tempo.as_int().to_be_bytes()[1..])
            }
            MetaMessage::SmpteOffset(smpte) => write_meta(out, 0x54, &smpte.encode()[..]),
            MetaMessage::TimeSignature(a, b, c, d) => write_meta(out, 0x58, &[*a, *b, *c, *d]),
            MetaMessage::KeySignature(key, minor) => {
                write_meta(out, 0x59, &[*key as u8, *minor as u8])
            }
            MetaMessage::SequencerSpecific(data) => write_meta(out, 0x7F, payload(data)),
            MetaMessage::Unknown(type_byte, data) => write_meta(out, *type_byte, payload(data)),
            MetaMessage::Custom(custom) => {
                let type_byte = settings
                    .custom_meta_event_types
                    .status_byte(custom)
                    .ok_or(Error::UnregisteredCustomType {
                        type_name: custom.get().type_name(),
                    })?;
                let size = custom.get().content_size(settings);
                out.write_u8(type_byte)?;
                out.write_vlq(size as u64)?;
                write_checked(out, size, |w| custom.get().write_content(w, settings))
            }
        }
    }
}

fn payload(data: &Option<Vec<u8>>) -> &[u8] {
    data.as_deref().unwrap_or(&[])
}

fn write_meta<W: Write + ?Sized>(out: &mut W, type_byte: u8, data: &[u8]) -> Result<()> {
    out.write_u8(type_byte)?;
    out.write_vlq(data.len() as u64)?;
    out.write_all(data)?;
    Ok(())
}

fn check_meta_param(
    meta_type: u8,
    parameter: &'static str,
    value: i16,
    min: i16,
    max: i16,
    position: u64,
    settings: &ReadingSettings,
) -> Result<i16> {
    if (min..=max).contains(&value) {
        return Ok(value);
    }
    match settings.invalid_meta_event_parameter_value_policy {
        InvalidMetaEventParameterValuePolicy::Abort => {
            bail!(Error::InvalidMetaEventParameterValue {
                meta_type,
                parameter,
                value,
                position,
            })
        }
        InvalidMetaEventParameterValuePolicy::SnapToLimits => {
            let snapped = value.max(min).min(max);
            warn!(
                meta_type,
                parameter, value, position, "meta event parameter snapped to {}", snapped
            );
            Ok(snapped)
        }
    }
}

/// Per-track state of the event encoder.
///
/// Every event of a track chunk goes through [`write`](#method.write), in order, and the chunk
/// is closed with [`finish`](#method.finish), which appends the single `EndOfTrack` event.
#[derive(Debug)]
pub(crate) struct EventWriter {
    running_status: Option<u8>,
    /// Delta time of skipped events, carried onto the next written event.
    pending_delta: u64,
    skip_default_tempo: bool,
    skip_default_key_signature: bool,
    skip_default_time_signature: bool,
}
impl EventWriter {
    pub(crate) fn new() -> EventWriter {
        EventWriter {
            running_status: None,
            pending_delta: 0,
            skip_default_tempo: true,
            skip_default_key_signature: true,
            skip_default_time_signature: true,
        }
    }

    /// Whether the event is omitted from the output.
    fn skips(&mut self, kind: &TrackEventKind, settings: &WritingSettings) -> bool {
        //Only the leading run of default values is dropped
        fn leading_default(still_leading: &mut bool, is_default: bool) -> bool {
            if *still_leading && is_default {
                return true;
            }
            *still_leading = false;
            false
        }
        let meta = match kind {
            TrackEventKind::Meta(meta) => meta,
            _ => return false,
        };
        match meta {
            MetaMessage::EndOfTrack => true,
            MetaMessage::Unknown(..) => settings.delete_unknown_meta_events,
            MetaMessage::Tempo(_) if settings.delete_default_set_tempo => leading_default(
                &mut self.skip_default_tempo,
                *meta == MetaMessage::default_tempo(),
            ),
            MetaMessage::KeySignature(..) if settings.delete_default_key_signature => {
                leading_default(
                    &mut self.skip_default_key_signature,
                    *meta == MetaMessage::default_key_signature(),
                )
            }
            MetaMessage::TimeSignature(..) if settings.delete_default_time_signature => {
                leading_default(
                    &mut self.skip_default_time_signature,
                    *meta == MetaMessage::default_time_signature(),
                )
            }
            _ => false,
        }
    }

    /// Encode a single event, returning whether it was written at all.
    ///
    /// `EndOfTrack` events are never written here; their delta time is carried forward instead.
    pub(crate) fn write<W: Write + ?Sized>(
        &mut self,
        event: &TrackEvent,
        out: &mut W,
        settings: &WritingSettings,
    ) -> Result<bool> {
        let delta = self.pending_delta.saturating_add(event.delta);
        if self.skips(&event.kind, settings) {
            self.pending_delta = delta;
            return Ok(false);
        }
        self.pending_delta = 0;
        out.write_vlq(delta)?;
        //Only channel events set and reuse running status, everything else clears it
        match &event.kind {
            TrackEventKind::Midi { channel, message } => {
                let message = match *message {
                    MidiMessage::NoteOff { key, .. } if settings.note_off_as_silent_note_on => {
                        MidiMessage::NoteOn {
                            key,
                            vel: u7::new(0),
                        }
                    }
                    message => message,
                };
                let status = message.status_nibble() << 4 | channel.as_int();
                if !settings.use_running_status || Some(status) != self.running_status {
                    out.write_u8(status)?;
                }
                self.running_status = Some(status);
                message.write(out)?;
            }
            TrackEventKind::SysEx(data) => {
                self.running_status = None;
                out.write_u8(0xF0)?;
                out.write_vlq(data.len() as u64)?;
                out.write_all(data)?;
            }
            TrackEventKind::Escape(data) => {
                self.running_status = None;
                out.write_u8(0xF7)?;
                out.write_vlq(data.len() as u64)?;
                out.write_all(data)?;
            }
            TrackEventKind::Meta(meta) => {
                self.running_status = None;
                out.write_u8(0xFF)?;
                meta.write(out, settings)?;
            }
        }
        Ok(true)
    }

    /// Append the closing `EndOfTrack` event.
    ///
    /// It carries the delta time of any trailing events that were not written, most notably
    /// an explicit `EndOfTrack` at the end of the input.
    pub(crate) fn finish<W: Write + ?Sized>(self, out: &mut W) -> Result<()> {
        out.write_vlq(self.pending_delta)?;
        out.write_all(&[0xFF, 0x2F, 0x00])?;
        Ok(())
    }
}
