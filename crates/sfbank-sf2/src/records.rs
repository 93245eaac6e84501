//! Fixed-size records of the `pdta` list.
//!
//! Each table is a flat array of little-endian records closed by one
//! terminal record. Instruments and presets name the first entry of their
//! zone range in the bag table; the range ends where the next record's
//! starts, which is why every table carries the extra terminal entry.

use std::io;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::error::{Result, Sf2Error};

/// Length of a fixed name field.
pub const NAME_LEN: usize = 20;

pub const SAMPLE_TYPE_MONO: u16 = 1;
pub const SAMPLE_TYPE_RIGHT: u16 = 2;
pub const SAMPLE_TYPE_LEFT: u16 = 4;
pub const SAMPLE_TYPE_LINKED: u16 = 8;
pub const SAMPLE_TYPE_COMPRESSED: u16 = 0x10;
pub const SAMPLE_TYPE_ROM: u16 = 0x8000;

/// A record that can be read from and written to a pdta table.
pub trait Record: Sized {
    /// Size of one record in bytes.
    const SIZE: usize;
    /// Chunk id of the table.
    const CHUNK: &'static str;

    fn read(r: &mut &[u8]) -> io::Result<Self>;
    fn write(&self, out: &mut Vec<u8>) -> io::Result<()>;
}

/// Parse a whole table, terminal record included.
pub fn read_table<R: Record>(data: &[u8]) -> Result<Vec<R>> {
    if data.len() % R::SIZE != 0 {
        return Err(Sf2Error::corrupt(format!(
            "'{}' length {} is not a multiple of {}",
            R::CHUNK,
            data.len(),
            R::SIZE
        )));
    }
    if data.is_empty() {
        return Err(Sf2Error::corrupt(format!("'{}' has no terminal record", R::CHUNK)));
    }
    let mut cursor = data;
    let mut records = Vec::with_capacity(data.len() / R::SIZE);
    while !cursor.is_empty() {
        records.push(R::read(&mut cursor)?);
    }
    Ok(records)
}

/// Serialize a table, terminal record included.
pub fn write_table<R: Record>(records: &[R]) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(records.len() * R::SIZE);
    for record in records {
        record.write(&mut out)?;
    }
    Ok(out)
}

fn read_name(r: &mut &[u8]) -> io::Result<String> {
    let mut raw = [0u8; NAME_LEN];
    io::Read::read_exact(r, &mut raw)?;
    Ok(decode_name(&raw))
}

/// Decode a zero-terminated fixed-width name, dropping trailing spaces.
pub fn decode_name(raw: &[u8]) -> String {
    let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
    String::from_utf8_lossy(&raw[..end]).trim_end().to_string()
}

fn write_name(out: &mut Vec<u8>, name: &str) {
    let name = sfbank_model::sample::truncate_name(name).as_bytes();
    out.extend_from_slice(name);
    out.resize(out.len() + NAME_LEN - name.len(), 0);
}

/// `phdr` entry.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PresetHeader {
    pub name: String,
    pub program: u16,
    pub bank: u16,
    pub bag_index: u16,
    pub library: u32,
    pub genre: u32,
    pub morphology: u32,
}

impl PresetHeader {
    pub fn terminal(bag_index: u16) -> Self {
        Self {
            name: "EOP".to_string(),
            bag_index,
            ..Default::default()
        }
    }
}

impl Record for PresetHeader {
    const SIZE: usize = 38;
    const CHUNK: &'static str = "phdr";

    fn read(r: &mut &[u8]) -> io::Result<Self> {
        Ok(Self {
            name: read_name(r)?,
            program: r.read_u16::<LittleEndian>()?,
            bank: r.read_u16::<LittleEndian>()?,
            bag_index: r.read_u16::<LittleEndian>()?,
            library: r.read_u32::<LittleEndian>()?,
            genre: r.read_u32::<LittleEndian>()?,
            morphology: r.read_u32::<LittleEndian>()?,
        })
    }

    fn write(&self, out: &mut Vec<u8>) -> io::Result<()> {
        write_name(out, &self.name);
        out.write_u16::<LittleEndian>(self.program)?;
        out.write_u16::<LittleEndian>(self.bank)?;
        out.write_u16::<LittleEndian>(self.bag_index)?;
        out.write_u32::<LittleEndian>(self.library)?;
        out.write_u32::<LittleEndian>(self.genre)?;
        out.write_u32::<LittleEndian>(self.morphology)
    }
}

/// `inst` entry.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InstrumentHeader {
    pub name: String,
    pub bag_index: u16,
}

impl Record for InstrumentHeader {
    const SIZE: usize = 22;
    const CHUNK: &'static str = "inst";

    fn read(r: &mut &[u8]) -> io::Result<Self> {
        Ok(Self {
            name: read_name(r)?,
            bag_index: r.read_u16::<LittleEndian>()?,
        })
    }

    fn write(&self, out: &mut Vec<u8>) -> io::Result<()> {
        write_name(out, &self.name);
        out.write_u16::<LittleEndian>(self.bag_index)
    }
}

/// `pbag` / `ibag` entry: start of the zone's generators and modulators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Bag {
    pub gen_index: u16,
    pub mod_index: u16,
}

impl Record for Bag {
    const SIZE: usize = 4;
    const CHUNK: &'static str = "bag";

    fn read(r: &mut &[u8]) -> io::Result<Self> {
        Ok(Self {
            gen_index: r.read_u16::<LittleEndian>()?,
            mod_index: r.read_u16::<LittleEndian>()?,
        })
    }

    fn write(&self, out: &mut Vec<u8>) -> io::Result<()> {
        out.write_u16::<LittleEndian>(self.gen_index)?;
        out.write_u16::<LittleEndian>(self.mod_index)
    }
}

/// `pmod` / `imod` entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ModRecord {
    pub source: u16,
    pub destination: u16,
    pub amount: i16,
    pub amount_source: u16,
    pub transform: u16,
}

impl Record for ModRecord {
    const SIZE: usize = 10;
    const CHUNK: &'static str = "mod";

    fn read(r: &mut &[u8]) -> io::Result<Self> {
        Ok(Self {
            source: r.read_u16::<LittleEndian>()?,
            destination: r.read_u16::<LittleEndian>()?,
            amount: r.read_i16::<LittleEndian>()?,
            amount_source: r.read_u16::<LittleEndian>()?,
            transform: r.read_u16::<LittleEndian>()?,
        })
    }

    fn write(&self, out: &mut Vec<u8>) -> io::Result<()> {
        out.write_u16::<LittleEndian>(self.source)?;
        out.write_u16::<LittleEndian>(self.destination)?;
        out.write_i16::<LittleEndian>(self.amount)?;
        out.write_u16::<LittleEndian>(self.amount_source)?;
        out.write_u16::<LittleEndian>(self.transform)
    }
}

/// Id of the private INFO sub-chunk listing disabled modulators.
pub const DISABLED_CHUNK: &[u8; 4] = b"xdmd";

/// Table a disabled mark points into.
pub const MARK_PRESET: u16 = 0;
pub const MARK_INSTRUMENT: u16 = 1;

/// Entry of the `xdmd` INFO sub-chunk.
///
/// The wire format has no disabled state, so a disabled modulator is written
/// as an amount-zero record and this mark names its absolute position in
/// `pmod` or `imod`. Other readers skip the sub-chunk and see the silent
/// record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DisabledMark {
    pub table: u16,
    pub index: u32,
}

impl Record for DisabledMark {
    const SIZE: usize = 6;
    const CHUNK: &'static str = "xdmd";

    fn read(r: &mut &[u8]) -> io::Result<Self> {
        Ok(Self {
            table: r.read_u16::<LittleEndian>()?,
            index: r.read_u32::<LittleEndian>()?,
        })
    }

    fn write(&self, out: &mut Vec<u8>) -> io::Result<()> {
        out.write_u16::<LittleEndian>(self.table)?;
        out.write_u32::<LittleEndian>(self.index)
    }
}

/// `pgen` / `igen` entry. The amount is kept as the raw word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GenRecord {
    pub operator: u16,
    pub amount: u16,
}

impl Record for GenRecord {
    const SIZE: usize = 4;
    const CHUNK: &'static str = "gen";

    fn read(r: &mut &[u8]) -> io::Result<Self> {
        Ok(Self {
            operator: r.read_u16::<LittleEndian>()?,
            amount: r.read_u16::<LittleEndian>()?,
        })
    }

    fn write(&self, out: &mut Vec<u8>) -> io::Result<()> {
        out.write_u16::<LittleEndian>(self.operator)?;
        out.write_u16::<LittleEndian>(self.amount)
    }
}

/// `shdr` entry. Offsets are absolute: frames into `smpl`, or bytes for
/// compressed samples.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SampleHeader {
    pub name: String,
    pub start: u32,
    pub end: u32,
    pub loop_start: u32,
    pub loop_end: u32,
    pub sample_rate: u32,
    pub original_pitch: u8,
    pub pitch_correction: i8,
    pub sample_link: u16,
    pub sample_type: u16,
}

impl SampleHeader {
    pub fn terminal() -> Self {
        Self {
            name: "EOS".to_string(),
            ..Default::default()
        }
    }

    pub fn is_rom(&self) -> bool {
        self.sample_type & SAMPLE_TYPE_ROM != 0
    }

    pub fn is_compressed(&self) -> bool {
        self.sample_type & SAMPLE_TYPE_COMPRESSED != 0
    }

    /// Stereo role bits without the ROM and compression flags.
    pub fn role(&self) -> u16 {
        self.sample_type & 0x000f
    }
}

impl Record for SampleHeader {
    const SIZE: usize = 46;
    const CHUNK: &'static str = "shdr";

    fn read(r: &mut &[u8]) -> io::Result<Self> {
        Ok(Self {
            name: read_name(r)?,
            start: r.read_u32::<LittleEndian>()?,
            end: r.read_u32::<LittleEndian>()?,
            loop_start: r.read_u32::<LittleEndian>()?,
            loop_end: r.read_u32::<LittleEndian>()?,
            sample_rate: r.read_u32::<LittleEndian>()?,
            original_pitch: r.read_u8()?,
            pitch_correction: r.read_i8()?,
            sample_link: r.read_u16::<LittleEndian>()?,
            sample_type: r.read_u16::<LittleEndian>()?,
        })
    }

    fn write(&self, out: &mut Vec<u8>) -> io::Result<()> {
        write_name(out, &self.name);
        out.write_u32::<LittleEndian>(self.start)?;
        out.write_u32::<LittleEndian>(self.end)?;
        out.write_u32::<LittleEndian>(self.loop_start)?;
        out.write_u32::<LittleEndian>(self.loop_end)?;
        out.write_u32::<LittleEndian>(self.sample_rate)?;
        out.write_u8(self.original_pitch)?;
        out.write_i8(self.pitch_correction)?;
        out.write_u16::<LittleEndian>(self.sample_link)?;
        out.write_u16::<LittleEndian>(self.sample_type)
    }
}
