//! Fixed-size values found in headers and event payloads.

use crate::prelude::*;

/// Integers narrower than their backing type.
///
/// Every constructor keeps the value within `$bits` bits, so `as_int` never needs to mask.
macro_rules! narrow_int {
    {$( $(#[$attr:meta])* $name:ident($inner:ty, $bits:expr); )*} => {$(
        $(#[$attr])*
        #[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
        #[repr(transparent)]
        #[allow(non_camel_case_types)]
        pub struct $name($inner);
        impl $name {
            const MASK: $inner = (1 << $bits) - 1;

            /// Keep the low bits of `raw`, dropping the rest.
            #[inline]
            pub const fn new(raw: $inner) -> $name {
                $name(raw & Self::MASK)
            }

            #[inline]
            pub const fn max_value() -> $name {
                $name(Self::MASK)
            }

            /// `None` if `raw` does not fit.
            #[inline]
            pub fn try_from(raw: $inner) -> Option<$name> {
                if raw > Self::MASK {
                    return None;
                }
                Some($name(raw))
            }

            /// Clamp `raw` to the largest representable value.
            #[inline]
            pub fn saturating_from(raw: $inner) -> $name {
                $name(cmp::min(raw, Self::MASK))
            }

            #[inline]
            pub const fn as_int(self) -> $inner {
                self.0
            }
        }
        impl From<$inner> for $name {
            /// Lossy, see `new`.
            #[inline]
            fn from(raw: $inner) -> $name {
                $name::new(raw)
            }
        }
        impl From<$name> for $inner {
            #[inline]
            fn from(value: $name) -> $inner {
                value.0
            }
        }
        impl PartialEq<$inner> for $name {
            #[inline]
            fn eq(&self, rhs: &$inner) -> bool {
                self.0 == *rhs
            }
        }
        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                fmt::Debug::fmt(&self.0, f)
            }
        }
        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }
    )*};
}

narrow_int! {
    /// Ticks per quarter note of a metrical time division.
    u15(u16, 15);
    /// Pitch bend amount, sent as two 7-bit data bytes.
    u14(u16, 14);
    /// Channel event data byte.
    u7(u8, 7);
    /// MIDI channel, the low nibble of a channel event status.
    u4(u8, 4);
    /// Frame rate code of an SMPTE offset.
    u2(u8, 2);
    /// Microseconds per quarter note.
    u24(u32, 24);
}

/// Amount of bytes needed to encode `value` as a variable-length quantity.
pub fn vlq_len(value: u64) -> usize {
    let bits = 64 - value.leading_zeros() as usize;
    ((bits + 6) / 7).max(1)
}

/// Encode `value` as a variable-length quantity into a stack buffer.
///
/// Returns the buffer and the index of the first used byte.
pub(crate) fn encode_vlq(value: u64) -> ([u8; 10], usize) {
    let mut buf = [0; 10];
    let len = vlq_len(value);
    let start = buf.len() - len;
    for (i, byte) in buf[start..].iter_mut().enumerate() {
        let shift = (len - 1 - i) * 7;
        let bits = ((value >> shift) & 0x7F) as u8;
        *byte = if i + 1 == len { bits } else { bits | 0x80 };
    }
    (buf, start)
}

/// How the track chunks of a file relate to each other.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash)]
pub enum Format {
    /// Format 0: all events live in one track chunk.
    ///
    /// Writing a file with this format merges all of its track chunks into one.
    SingleTrack,
    /// Format 1: the tracks play simultaneously, usually with tempo and song data in the first.
    Parallel,
    /// Format 2: every track is an independent sequence.
    Sequential,
}
impl Format {
    /// Decode a raw header format field, returning `None` for unknown formats.
    pub fn from_bits(format: u16) -> Option<Format> {
        match format {
            0 => Some(Format::SingleTrack),
            1 => Some(Format::Parallel),
            2 => Some(Format::Sequential),
            _ => None,
        }
    }

    pub fn as_bits(self) -> u16 {
        self as u16
    }
}
impl Default for Format {
    fn default() -> Format {
        Format::Parallel
    }
}

/// The time division of a file, the meaning of one delta-time tick.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash)]
pub enum Timing {
    /// Ticks per quarter note. The duration of a quarter note is set by tempo events.
    Metrical(u15),
    /// Frames per second and ticks per frame, independent of tempo.
    Timecode(Fps, u8),
}
impl Timing {
    /// Time division given to files built from scratch.
    pub const DEFAULT_TICKS_PER_BEAT: u16 = 96;

    pub(crate) fn from_bits(raw: u16) -> Result<Timing> {
        if bit_range(raw, 15..16) == 0 {
            return Ok(Timing::Metrical(u15::new(raw)));
        }
        //The upper byte holds the negated frame rate
        let fps = (bit_range(raw, 8..16) as u8 as i8).wrapping_neg() as u8;
        let fps = Fps::from_int(fps).ok_or(Error::InvalidTimeDivision { raw })?;
        Ok(Timing::Timecode(fps, bit_range(raw, 0..8) as u8))
    }

    pub(crate) fn encode(&self) -> [u8; 2] {
        match *self {
            Timing::Metrical(ticks) => ticks.as_int().to_be_bytes(),
            Timing::Timecode(fps, ticks) => [(fps.as_int() as i8).wrapping_neg() as u8, ticks],
        }
    }
}
impl Default for Timing {
    fn default() -> Timing {
        Timing::Metrical(u15::new(Timing::DEFAULT_TICKS_PER_BEAT))
    }
}

/// An SMPTE timestamp, as carried by the `SmpteOffset` meta event.
///
/// All fields are within range: hours up to 23, minutes and seconds up to 59, frames up to
/// `fps.max_frame()` and subframes up to 99.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash)]
pub struct SmpteTime {
    hour: u8,
    minute: u8,
    second: u8,
    frame: u8,
    subframe: u8,
    fps: Fps,
}
impl SmpteTime {
    pub const MAX_HOUR: u8 = 23;
    pub const MAX_MINUTE: u8 = 59;
    pub const MAX_SECOND: u8 = 59;
    pub const MAX_SUBFRAME: u8 = 99;

    /// Returns `None` if any component is out of range.
    pub fn new(
        hour: u8,
        minute: u8,
        second: u8,
        frame: u8,
        subframe: u8,
        fps: Fps,
    ) -> Option<SmpteTime> {
        let in_range = hour <= Self::MAX_HOUR
            && minute <= Self::MAX_MINUTE
            && second <= Self::MAX_SECOND
            && frame <= fps.max_frame()
            && subframe <= Self::MAX_SUBFRAME;
        if !in_range {
            return None;
        }
        Some(SmpteTime::from_checked(
            hour, minute, second, frame, subframe, fps,
        ))
    }

    pub(crate) fn from_checked(
        hour: u8,
        minute: u8,
        second: u8,
        frame: u8,
        subframe: u8,
        fps: Fps,
    ) -> SmpteTime {
        SmpteTime {
            hour,
            minute,
            second,
            frame,
            subframe,
            fps,
        }
    }

    #[inline]
    pub fn hour(&self) -> u8 {
        self.hour
    }
    #[inline]
    pub fn minute(&self) -> u8 {
        self.minute
    }
    #[inline]
    pub fn second(&self) -> u8 {
        self.second
    }
    /// Frame within the second, counted at `fps`.
    #[inline]
    pub fn frame(&self) -> u8 {
        self.frame
    }
    /// Hundredths of a frame.
    #[inline]
    pub fn subframe(&self) -> u8 {
        self.subframe
    }
    #[inline]
    pub fn fps(&self) -> Fps {
        self.fps
    }

    /// Split the first payload byte into its frame rate (bits 5-6) and hour (bits 0-4).
    pub(crate) fn split_hour_byte(hour_fps: u8) -> (Fps, u8) {
        let fps = Fps::from_code(u2::new(bit_range(hour_fps, 5..7)));
        (fps, bit_range(hour_fps, 0..5))
    }

    pub(crate) fn encode(&self) -> [u8; 5] {
        [
            self.fps.as_code().as_int() << 5 | self.hour,
            self.minute,
            self.second,
            self.frame,
            self.subframe,
        ]
    }
}

/// SMPTE frame rates.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash)]
pub enum Fps {
    Fps24,
    Fps25,
    /// 29.97 drop-frame.
    Fps29,
    Fps30,
}
impl Fps {
    const ALL: [Fps; 4] = [Fps::Fps24, Fps::Fps25, Fps::Fps29, Fps::Fps30];

    pub(crate) fn from_code(code: u2) -> Fps {
        Fps::ALL[code.as_int() as usize]
    }

    pub(crate) fn as_code(self) -> u2 {
        u2::new(self as u8)
    }

    /// The rate named by its whole number of frames, as stored in timecode divisions.
    pub fn from_int(raw: u8) -> Option<Fps> {
        Fps::ALL.iter().copied().find(|fps| fps.as_int() == raw)
    }

    pub fn as_int(self) -> u8 {
        match self {
            Fps::Fps24 => 24,
            Fps::Fps25 => 25,
            Fps::Fps29 => 29,
            Fps::Fps30 => 30,
        }
    }

    /// The largest valid frame number at this rate.
    pub fn max_frame(self) -> u8 {
        match self {
            Fps::Fps29 => 29,
            fps => fps.as_int() - 1,
        }
    }
}
