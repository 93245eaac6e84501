//! RIFF chunk walking and writing.
//!
//! A chunk is a four-character id, a little-endian u32 size and `size`
//! bytes of data, padded to an even length. `RIFF` and `LIST` chunks start
//! their data with a four-character form type followed by sub-chunks.

use std::fmt;

use byteorder::{LittleEndian, WriteBytesExt};

use crate::error::{Result, Sf2Error};

/// Four-character chunk identifier.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct FourCC(pub [u8; 4]);

impl FourCC {
    pub const fn new(id: &[u8; 4]) -> Self {
        Self(*id)
    }
}

impl fmt::Debug for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FourCC({})", String::from_utf8_lossy(&self.0))
    }
}

impl fmt::Display for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.0))
    }
}

pub const RIFF: FourCC = FourCC::new(b"RIFF");
pub const LIST: FourCC = FourCC::new(b"LIST");
pub const SFBK: FourCC = FourCC::new(b"sfbk");
pub const INFO: FourCC = FourCC::new(b"INFO");
pub const SDTA: FourCC = FourCC::new(b"sdta");
pub const PDTA: FourCC = FourCC::new(b"pdta");

/// A chunk borrowed from the input buffer.
#[derive(Debug, Clone, Copy)]
pub struct Chunk<'a> {
    pub id: FourCC,
    pub data: &'a [u8],
}

impl<'a> Chunk<'a> {
    /// Form type of a `RIFF` or `LIST` chunk.
    pub fn form(&self) -> Option<FourCC> {
        if self.data.len() < 4 {
            return None;
        }
        Some(FourCC([self.data[0], self.data[1], self.data[2], self.data[3]]))
    }

    /// Sub-chunks of a `RIFF` or `LIST` chunk.
    pub fn children(&self) -> ChunkIter<'a> {
        ChunkIter::new(self.data.get(4..).unwrap_or(&[]))
    }
}

/// Iterator over consecutive chunks in a byte slice.
pub struct ChunkIter<'a> {
    rest: &'a [u8],
}

impl<'a> ChunkIter<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { rest: data }
    }
}

impl<'a> Iterator for ChunkIter<'a> {
    type Item = Result<Chunk<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.rest.is_empty() {
            return None;
        }
        if self.rest.len() < 8 {
            self.rest = &[];
            return Some(Err(Sf2Error::corrupt("truncated chunk header")));
        }
        let id = FourCC([self.rest[0], self.rest[1], self.rest[2], self.rest[3]]);
        let size = u32::from_le_bytes([self.rest[4], self.rest[5], self.rest[6], self.rest[7]]) as usize;
        let body = &self.rest[8..];
        if size > body.len() {
            self.rest = &[];
            return Some(Err(Sf2Error::corrupt(format!(
                "chunk '{}' claims {} bytes but only {} remain",
                id,
                size,
                body.len()
            ))));
        }
        let data = &body[..size];
        let padded = (size + (size & 1)).min(body.len());
        self.rest = &body[padded..];
        Some(Ok(Chunk { id, data }))
    }
}

/// Parse the top-level `RIFF` chunk of a buffer.
///
/// Bytes after the RIFF chunk are ignored.
pub fn read_riff(bytes: &[u8], form: FourCC) -> Result<Chunk<'_>> {
    let chunk = ChunkIter::new(bytes)
        .next()
        .ok_or_else(|| Sf2Error::corrupt("empty file"))??;
    if chunk.id != RIFF {
        return Err(Sf2Error::corrupt("not a RIFF file"));
    }
    if chunk.form() != Some(form) {
        return Err(Sf2Error::corrupt(format!("RIFF form is not '{}'", form)));
    }
    Ok(chunk)
}

/// Write a plain chunk, padding odd sizes.
pub fn write_chunk(out: &mut Vec<u8>, id: FourCC, data: &[u8]) -> Result<()> {
    let size = u32::try_from(data.len()).map_err(|_| Sf2Error::Limit("bytes in one chunk"))?;
    out.extend_from_slice(&id.0);
    out.write_u32::<LittleEndian>(size)?;
    out.extend_from_slice(data);
    if data.len() % 2 == 1 {
        out.push(0);
    }
    Ok(())
}

/// Write a `LIST` (or `RIFF`) chunk whose body is `form` plus `body`.
pub fn write_list(out: &mut Vec<u8>, id: FourCC, form: FourCC, body: &[u8]) -> Result<()> {
    let mut data = Vec::with_capacity(body.len() + 4);
    data.extend_from_slice(&form.0);
    data.extend_from_slice(body);
    write_chunk(out, id, &data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_padding() {
        let mut buf = Vec::new();
        write_chunk(&mut buf, FourCC::new(b"abcd"), &[1, 2, 3]).unwrap();
        write_chunk(&mut buf, FourCC::new(b"efgh"), &[4]).unwrap();
        assert_eq!(buf.len(), 8 + 4 + 8 + 2);

        let chunks: Vec<_> = ChunkIter::new(&buf).collect::<Result<_>>().unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].data, &[1, 2, 3]);
        assert_eq!(chunks[1].id, FourCC::new(b"efgh"));
        assert_eq!(chunks[1].data, &[4]);
    }

    #[test]
    fn test_truncated_chunk_is_corrupt() {
        let mut buf = Vec::new();
        write_chunk(&mut buf, FourCC::new(b"abcd"), &[0; 16]).unwrap();
        buf.truncate(12);
        let result: Result<Vec<_>> = ChunkIter::new(&buf).collect();
        assert!(matches!(result, Err(Sf2Error::Corrupt(_))));
    }

    #[test]
    fn test_read_riff_checks_form() {
        let mut buf = Vec::new();
        write_list(&mut buf, RIFF, FourCC::new(b"WAVE"), &[]).unwrap();
        assert!(matches!(read_riff(&buf, SFBK), Err(Sf2Error::Corrupt(_))));

        let mut buf = Vec::new();
        write_list(&mut buf, RIFF, SFBK, &[]).unwrap();
        let riff = read_riff(&buf, SFBK).unwrap();
        assert_eq!(riff.children().count(), 0);
    }
}
