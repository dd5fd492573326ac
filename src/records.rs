use crate::chunk::{tag_name, Chunk};
use crate::error::{ParseError, Result};
use crate::generator::GeneratorType;
use crate::stream::{make_string, ByteCursor};
use binread::{BinRead, BinResult};
use log::debug;
use riff::ChunkId;

const IFIL: ChunkId = ChunkId { value: *b"ifil" };
const ISNG: ChunkId = ChunkId { value: *b"isng" };
const INAM: ChunkId = ChunkId { value: *b"INAM" };
const IROM: ChunkId = ChunkId { value: *b"irom" };
const IVER: ChunkId = ChunkId { value: *b"iver" };
const ICRD: ChunkId = ChunkId { value: *b"ICRD" };
const IENG: ChunkId = ChunkId { value: *b"IENG" };
const IPRD: ChunkId = ChunkId { value: *b"IPRD" };
const ICOP: ChunkId = ChunkId { value: *b"ICOP" };
const ICMT: ChunkId = ChunkId { value: *b"ICMT" };
const ISFT: ChunkId = ChunkId { value: *b"ISFT" };

/// `sampleType` values from the shdr records.
pub mod sample_type {
    pub const MONO: u16 = 1;
    pub const RIGHT: u16 = 2;
    pub const LEFT: u16 = 4;
    pub const LINKED: u16 = 8;
    pub const ROM_MONO: u16 = 0x8001;
    pub const ROM_RIGHT: u16 = 0x8002;
    pub const ROM_LEFT: u16 = 0x8004;
    pub const ROM_LINKED: u16 = 0x8008;
}

#[derive(BinRead, Debug, Clone, Copy, PartialEq, Eq)]
#[br(little)]
pub struct VersionTag {
    pub major: u16,
    pub minor: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Info {
    pub comment: Option<String>,
    pub copyright: Option<String>,
    pub creation_date: Option<String>,
    pub engineer: Option<String>,
    pub name: String,
    pub product: Option<String>,
    pub software: Option<String>,
    pub version: VersionTag,
    pub sound_engine: String,
    pub rom_name: Option<String>,
    pub rom_version: Option<VersionTag>,
}

impl Info {
    /// Build the metadata from the sub-chunks of the INFO list.
    pub fn parse(data: &[u8], chunks: &[Chunk]) -> Result<Info> {
        let find = |id: ChunkId| chunks.iter().find(|c| c.id == id);
        let read_string = |id: ChunkId| -> Result<Option<String>> {
            match find(id) {
                Some(chunk) => {
                    let available = data.len().saturating_sub(chunk.offset);
                    if chunk.size as usize > available {
                        return Err(ParseError::Read(format!(
                            "{} chunk of {} bytes runs past the {} bytes left",
                            chunk.tag(),
                            chunk.size,
                            available
                        )));
                    }
                    let mut cursor = ByteCursor::new(data, chunk.offset);
                    Ok(Some(cursor.read_string(chunk.size as usize)?))
                }
                None => Ok(None),
            }
        };
        let read_version = |id: ChunkId| -> Result<Option<VersionTag>> {
            match find(id) {
                Some(chunk) => {
                    let mut cursor = ByteCursor::new(data, chunk.offset);
                    Ok(Some(cursor.read_record()?))
                }
                None => Ok(None),
            }
        };

        let version = read_version(IFIL)?.ok_or(ParseError::MissingChunk("ifil"))?;
        debug!("Version: {}.{}", version.major, version.minor);
        Ok(Info {
            comment: read_string(ICMT)?,
            copyright: read_string(ICOP)?,
            creation_date: read_string(ICRD)?,
            engineer: read_string(IENG)?,
            name: read_string(INAM)?.unwrap_or_default(),
            product: read_string(IPRD)?,
            software: read_string(ISFT)?,
            version,
            sound_engine: read_string(ISNG)?.unwrap_or_default(),
            rom_name: read_string(IROM)?,
            rom_version: read_version(IVER)?,
        })
    }
}

#[derive(BinRead, Debug, Clone, PartialEq, Eq)]
#[br(little)]
pub struct PresetHeader {
    #[br(map = |x: [u8; 20]| make_string(&x))]
    pub preset_name: String,
    pub preset: u16,
    pub bank: u16,
    pub preset_bag_index: u16,
    pub library: u32,
    pub genre: u32,
    pub morphology: u32,
}

impl PresetHeader {
    pub fn is_end(&self) -> bool {
        self.preset_name == "EOP"
    }
}

#[derive(BinRead, Debug, Clone, PartialEq, Eq)]
#[br(little)]
pub struct Instrument {
    #[br(map = |x: [u8; 20]| make_string(&x))]
    pub instrument_name: String,
    pub instrument_bag_index: u16,
}

impl Instrument {
    pub fn is_end(&self) -> bool {
        self.instrument_name == "EOI"
    }
}

#[derive(BinRead, Debug, Clone, Copy, PartialEq, Eq)]
#[br(little)]
pub struct Bag {
    pub generator_index: u16,
    pub modulator_index: u16,
}

#[derive(BinRead, Debug, Clone, Copy, PartialEq, Eq)]
#[br(little)]
pub struct ModulatorList {
    pub source_oper: u16,
    pub destination_oper: u16,
    pub value: i16,
    pub amount_source_oper: u16,
    pub trans_oper: u16,
}

impl ModulatorList {
    pub fn is_end(&self) -> bool {
        self.source_oper == 0
            && self.destination_oper == 0
            && self.value == 0
            && self.amount_source_oper == 0
            && self.trans_oper == 0
    }

    pub fn destination(&self) -> Option<GeneratorType> {
        GeneratorType::from_code(self.destination_oper)
    }
}

/// Inclusive key or velocity range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RangeValue {
    pub lo: u8,
    pub hi: u8,
}

impl RangeValue {
    pub const FULL: RangeValue = RangeValue { lo: 0, hi: 127 };

    pub fn new(lo: u8, hi: u8) -> Self {
        RangeValue { lo, hi }
    }

    pub fn contains(&self, value: u8) -> bool {
        self.lo <= value && value <= self.hi
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneratorAmount {
    Value(i16),
    Range(RangeValue),
}

#[derive(BinRead)]
#[br(little)]
struct GeneratorData {
    oper: u16,
    amount: [u8; 2],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeneratorList {
    pub code: u16,
    pub value: GeneratorAmount,
}

impl GeneratorList {
    pub fn parse(cursor: &mut ByteCursor<'_>) -> BinResult<Self> {
        let data: GeneratorData = cursor.read_record()?;
        let value = match GeneratorType::from_code(data.oper) {
            Some(t) if t.is_range() => {
                GeneratorAmount::Range(RangeValue::new(data.amount[0], data.amount[1]))
            }
            _ => GeneratorAmount::Value(i16::from_le_bytes(data.amount)),
        };
        Ok(GeneratorList {
            code: data.oper,
            value,
        })
    }

    pub fn generator_type(&self) -> Option<GeneratorType> {
        GeneratorType::from_code(self.code)
    }
}

#[derive(BinRead, Debug, Clone, PartialEq, Eq)]
#[br(little)]
pub struct SampleHeader {
    #[br(map = |x: [u8; 20]| make_string(&x))]
    pub sample_name: String,
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
    /// Read one shdr record. PCM loop points are stored as absolute positions
    /// in the sample data and are rebased onto `start`; SF3 headers already
    /// store them relative to the sample.
    pub fn parse(cursor: &mut ByteCursor<'_>, is_sf3: bool) -> BinResult<Self> {
        let mut header: SampleHeader = cursor.read_record()?;
        if !is_sf3 {
            header.loop_start = header.loop_start.saturating_sub(header.start);
            header.loop_end = header.loop_end.saturating_sub(header.start);
        }
        Ok(header)
    }

    pub fn is_end(&self) -> bool {
        self.sample_name == "EOS"
    }

    pub fn is_rom(&self) -> bool {
        self.sample_type & 0x8000 != 0
    }
}

/// Decode a list of fixed-width records from `chunk`.
///
/// Reading stops at the end of the chunk or at the first record matched by
/// `terminate`. The terminal record is returned separately and is never part
/// of the list.
pub fn read_records<T, F>(
    data: &[u8],
    chunk: &Chunk,
    expected: ChunkId,
    mut read: F,
    terminate: Option<fn(&T) -> bool>,
) -> Result<(Vec<T>, Option<T>)>
where
    F: FnMut(&mut ByteCursor<'_>) -> BinResult<T>,
{
    if chunk.id != expected {
        return Err(ParseError::UnexpectedChunk {
            expected: tag_name(&expected),
            found: chunk.tag(),
        });
    }
    let mut cursor = ByteCursor::new(data, chunk.offset);
    let end = chunk.end();
    let mut records = vec![];
    let mut terminal = None;
    while cursor.position() < end {
        let record = read(&mut cursor)?;
        if terminate.map_or(false, |is_end| is_end(&record)) {
            terminal = Some(record);
            break;
        }
        records.push(record);
    }
    debug!("  {}: {} records", chunk.tag(), records.len());
    Ok((records, terminal))
}
