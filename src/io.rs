//! Byte-level reading and writing.
//!
//! [`MidiReader`] wraps any `std::io::Read` source. Only forward movement is ever needed, so
//! non-seekable sources decode exactly like in-memory ones.
//! The writing half is an extension trait over `std::io::Write`, plus a buffering
//! [`MidiWriter`] and a byte-counting [`WriteCounter`].

use crate::{
    prelude::*,
    primitive::encode_vlq,
    settings::{ReaderBufferingPolicy, ReaderSettings, WriterBufferingPolicy, WriterSettings},
};

enum Buffer<'b> {
    Owned(Vec<u8>),
    Borrowed(&'b mut [u8]),
}
impl Buffer<'_> {
    fn as_slice(&self) -> &[u8] {
        match self {
            Buffer::Owned(buf) => buf,
            Buffer::Borrowed(buf) => buf,
        }
    }
    fn as_mut_slice(&mut self) -> &mut [u8] {
        match self {
            Buffer::Owned(buf) => buf,
            Buffer::Borrowed(buf) => buf,
        }
    }
}

/// A big-endian byte reader over an arbitrary source.
///
/// Short reads produce `Error::NotEnoughBytes` carrying the position where the read started.
pub struct MidiReader<'b, R> {
    source: R,
    buffer: Buffer<'b>,
    /// Unread data lives in `buffer[start..end]`.
    start: usize,
    end: usize,
    position: u64,
    exhausted: bool,
    limit: Option<u64>,
    incremental_threshold: usize,
    incremental_step: usize,
}
impl<'b, R: Read> MidiReader<'b, R> {
    /// Create a reader following the buffering policy in `settings`.
    ///
    /// `custom_buffer` is only used by `ReaderBufferingPolicy::UseCustomBuffer`, for which it
    /// is mandatory. It is borrowed for the lifetime of the reader and overwritten as data is
    /// read through it.
    pub fn new(
        mut source: R,
        settings: &ReaderSettings,
        custom_buffer: Option<&'b mut [u8]>,
    ) -> Result<MidiReader<'b, R>> {
        let mut exhausted = false;
        let mut end = 0;
        let buffer = match settings.buffering_policy {
            ReaderBufferingPolicy::DontUseBuffering => Buffer::Owned(vec![0; 1]),
            ReaderBufferingPolicy::UseFixedSizeBuffer => {
                ensure!(
                    settings.buffer_size > 0,
                    Error::InvalidOperation("reader buffer size must be positive")
                );
                Buffer::Owned(vec![0; settings.buffer_size])
            }
            ReaderBufferingPolicy::UseCustomBuffer => match custom_buffer {
                Some(buf) if !buf.is_empty() => Buffer::Borrowed(buf),
                Some(_) => bail!(Error::InvalidOperation("custom reader buffer is empty")),
                None => bail!(Error::InvalidOperation(
                    "custom buffering policy selected but no buffer was supplied"
                )),
            },
            ReaderBufferingPolicy::BufferAllData => {
                let mut all = Vec::new();
                source.read_to_end(&mut all)?;
                exhausted = true;
                end = all.len();
                Buffer::Owned(all)
            }
        };
        Ok(MidiReader {
            source,
            buffer,
            start: 0,
            end,
            position: 0,
            exhausted,
            limit: None,
            incremental_threshold: settings.incremental_bytes_reading_threshold,
            incremental_step: settings.incremental_bytes_reading_step.max(1),
        })
    }

    /// Amount of bytes consumed so far.
    #[inline]
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Treat everything after `limit` as the end of the data.
    pub(crate) fn set_limit(&mut self, limit: u64) {
        self.limit = Some(limit);
    }

    /// Whether there is no more data to read.
    pub fn end_reached(&mut self) -> Result<bool> {
        if let Some(limit) = self.limit {
            if self.position >= limit {
                return Ok(true);
            }
        }
        if self.start < self.end {
            return Ok(false);
        }
        Ok(!self.refill()?)
    }

    /// Read from the source into the buffer. Returns `false` on EOF.
    fn refill(&mut self) -> Result<bool> {
        if self.exhausted {
            return Ok(false);
        }
        let buf = self.buffer.as_mut_slice();
        let n = read_some(&mut self.source, buf)?;
        self.start = 0;
        self.end = n;
        if n == 0 {
            self.exhausted = true;
        }
        Ok(n > 0)
    }

    /// Fill as much of `dst` as possible, returning how many bytes were read.
    ///
    /// Only returns less than `dst.len()` when the end of the source is reached.
    fn read_into(&mut self, dst: &mut [u8]) -> Result<usize> {
        let capacity = self.buffer.as_slice().len();
        let mut filled = 0;
        while filled < dst.len() {
            if self.start < self.end {
                let n = (self.end - self.start).min(dst.len() - filled);
                dst[filled..filled + n]
                    .copy_from_slice(&self.buffer.as_slice()[self.start..self.start + n]);
                self.start += n;
                filled += n;
            } else if self.exhausted {
                break;
            } else if dst.len() - filled >= capacity {
                //Large read, bypass the buffer
                let n = read_some(&mut self.source, &mut dst[filled..])?;
                if n == 0 {
                    self.exhausted = true;
                    break;
                }
                filled += n;
            } else if !self.refill()? {
                break;
            }
        }
        self.position += filled as u64;
        Ok(filled)
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let position = self.position;
        let mut bytes = [0; N];
        let got = self.read_into(&mut bytes)?;
        if got < N {
            bail!(Error::NotEnoughBytes {
                position,
                expected: N as u64,
                actual: got as u64,
            });
        }
        Ok(bytes)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_array::<1>()?[0])
    }

    pub fn read_i8(&mut self) -> Result<i8> {
        Ok(self.read_u8()? as i8)
    }

    /// Read a big-endian word.
    pub fn read_u16(&mut self) -> Result<u16> {
        Ok(u16::from_be_bytes(self.read_array()?))
    }

    /// Read a big-endian 3-byte dword.
    pub fn read_u24(&mut self) -> Result<u32> {
        let [a, b, c] = self.read_array::<3>()?;
        Ok(u32::from_be_bytes([0, a, b, c]))
    }

    /// Read a big-endian dword.
    pub fn read_u32(&mut self) -> Result<u32> {
        Ok(u32::from_be_bytes(self.read_array()?))
    }

    /// Read a little-endian dword, as found in RIFF headers.
    pub fn read_u32_le(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.read_array()?))
    }

    /// Read a variable-length quantity.
    pub fn read_vlq(&mut self) -> Result<u64> {
        let position = self.position;
        let mut value: u64 = 0;
        loop {
            let mut byte = [0];
            if self.read_into(&mut byte)? == 0 {
                let actual = self.position - position;
                bail!(Error::NotEnoughBytes {
                    position,
                    expected: actual + 1,
                    actual,
                });
            }
            ensure!(value >> 57 == 0, Error::VlqOverflow { position });
            value = value << 7 | (byte[0] & 0x7F) as u64;
            if byte[0] & 0x80 == 0 {
                return Ok(value);
            }
        }
    }

    /// Read a 4-byte identifier. Fewer bytes are returned only at the end of the input.
    pub fn read_id(&mut self) -> Result<([u8; 4], usize)> {
        let mut id = [0; 4];
        let got = self.read_into(&mut id)?;
        Ok((id, got))
    }

    /// Read exactly `len` bytes.
    ///
    /// Reads above the incremental threshold proceed in steps, so a bogus length fails on EOF
    /// instead of allocating the whole amount up front.
    pub fn read_bytes(&mut self, len: usize) -> Result<Vec<u8>> {
        let position = self.position;
        let data = self.read_bytes_available(len)?;
        if data.len() < len {
            bail!(Error::NotEnoughBytes {
                position,
                expected: len as u64,
                actual: data.len() as u64,
            });
        }
        Ok(data)
    }

    /// Read up to `len` bytes, stopping early at the end of the input.
    pub fn read_bytes_available(&mut self, len: usize) -> Result<Vec<u8>> {
        if len <= self.incremental_threshold {
            let mut data = vec![0; len];
            let got = self.read_into(&mut data)?;
            data.truncate(got);
            return Ok(data);
        }
        let mut data = Vec::with_capacity(self.incremental_step);
        while data.len() < len {
            let step = self.incremental_step.min(len - data.len());
            let old_len = data.len();
            data.resize(old_len + step, 0);
            let got = self.read_into(&mut data[old_len..])?;
            if got < step {
                data.truncate(old_len + got);
                break;
            }
        }
        Ok(data)
    }

    /// Skip up to `len` bytes, returning how many were actually skipped.
    pub fn skip(&mut self, len: u64) -> Result<u64> {
        let mut scratch = [0; 512];
        let mut skipped = 0;
        while skipped < len {
            let step = (len - skipped).min(scratch.len() as u64) as usize;
            let got = self.read_into(&mut scratch[..step])?;
            skipped += got as u64;
            if got < step {
                break;
            }
        }
        Ok(skipped)
    }
}

fn read_some<R: Read>(source: &mut R, buf: &mut [u8]) -> Result<usize> {
    loop {
        match source.read(buf) {
            Ok(n) => return Ok(n),
            Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
            Err(err) => return Err(err.into()),
        }
    }
}

/// Big-endian MIDI primitives on top of any `std::io::Write`.
pub trait WriteExt: Write {
    #[inline]
    fn write_u8(&mut self, value: u8) -> io::Result<()> {
        self.write_all(&[value])
    }

    #[inline]
    fn write_u16(&mut self, value: u16) -> io::Result<()> {
        self.write_all(&value.to_be_bytes())
    }

    #[inline]
    fn write_u24(&mut self, value: u32) -> io::Result<()> {
        self.write_all(&value.to_be_bytes()[1..])
    }

    #[inline]
    fn write_u32(&mut self, value: u32) -> io::Result<()> {
        self.write_all(&value.to_be_bytes())
    }

    /// Write a variable-length quantity using the minimum amount of bytes.
    #[inline]
    fn write_vlq(&mut self, value: u64) -> io::Result<()> {
        let (buf, start) = encode_vlq(value);
        self.write_all(&buf[start..])
    }
}
impl<W: Write + ?Sized> WriteExt for W {}

/// A writer that optionally buffers its output and keeps track of the amount written.
///
/// The destination is borrowed; [`finish`](#method.finish) flushes pending data and gives it
/// back without closing it.
pub struct MidiWriter<W: Write> {
    out: W,
    buffer: Vec<u8>,
    buffered: bool,
    capacity: usize,
    position: u64,
}
impl<W: Write> MidiWriter<W> {
    pub fn new(out: W, settings: &WriterSettings) -> MidiWriter<W> {
        let buffered = settings.buffering_policy == WriterBufferingPolicy::UseBuffering
            && settings.buffer_size > 0;
        MidiWriter {
            out,
            buffer: Vec::with_capacity(if buffered { settings.buffer_size } else { 0 }),
            buffered,
            capacity: settings.buffer_size,
            position: 0,
        }
    }

    /// Amount of bytes written so far, including still-buffered bytes.
    #[inline]
    pub fn position(&self) -> u64 {
        self.position
    }

    fn flush_buffer(&mut self) -> io::Result<()> {
        if !self.buffer.is_empty() {
            self.out.write_all(&self.buffer)?;
            self.buffer.clear();
        }
        Ok(())
    }

    /// Flush pending data and return the destination.
    pub fn finish(mut self) -> io::Result<W> {
        self.flush_buffer()?;
        self.out.flush()?;
        Ok(self.out)
    }

    /// Flush pending data and get the destination back temporarily.
    pub(crate) fn get_mut(&mut self) -> io::Result<&mut W> {
        self.flush_buffer()?;
        Ok(&mut self.out)
    }
}
impl<W: Write> Write for MidiWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_all(buf)?;
        Ok(buf.len())
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        if self.buffered && buf.len() < self.capacity {
            if self.buffer.len() + buf.len() > self.capacity {
                self.flush_buffer()?;
            }
            self.buffer.extend_from_slice(buf);
        } else {
            self.flush_buffer()?;
            self.out.write_all(buf)?;
        }
        self.position += buf.len() as u64;
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.flush_buffer()?;
        self.out.flush()
    }
}

/// A sink that only counts the bytes written to it.
#[derive(Default, Debug)]
pub struct WriteCounter(pub u64);
impl Write for WriteCounter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0 += buf.len() as u64;
        Ok(buf.len())
    }
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
