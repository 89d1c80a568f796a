//! There's an abomination called RMID, MIDI embedded in a RIFF file.
//! Support for these files is provided by walking the RIFF wrapper up to its `data` chunk and
//! limiting the reader to the raw SMF file inside of it.

use crate::{chunk::ChunkId, io::MidiReader, prelude::*};
use tracing::debug;

pub(crate) const RIFF: [u8; 4] = *b"RIFF";

/// Position the reader at the start of the embedded SMF data.
///
/// Must be called right after the leading `RIFF` id was consumed. Everything after the `data`
/// chunk is treated as the end of the input. If there is no `data` chunk the reader is left at
/// the end of the input.
pub(crate) fn enter_data_chunk<R: Read>(reader: &mut MidiReader<'_, R>) -> Result<()> {
    let position = reader.position() - 4;
    let _riff_len = reader.read_u32_le()?;
    let (formtype, got) = reader.read_id()?;
    if got < 4 || &formtype != b"RMID" {
        bail!(Error::UnknownChunk {
            id: ChunkId(RIFF),
            position,
        });
    }
    loop {
        let (id, got) = reader.read_id()?;
        if got < 4 {
            debug!("rmid file without a data chunk");
            return Ok(());
        }
        let len = reader.read_u32_le()?;
        if &id == b"data" {
            let start = reader.position();
            reader.set_limit(start + len as u64);
            debug!(start, len, "reading smf data embedded in rmid");
            return Ok(());
        }
        //Chunks are padded to an even length
        reader.skip(len as u64 + (len % 2) as u64)?;
    }
}
