use crate::chunk::{
    parse_chunk, parse_riff, tag_name, Chunk, RiffOptions, IBAG, IGEN, IMOD, INFO, INST, PBAG,
    PDTA, PGEN, PHDR, PMOD, SDTA, SFBK, SHDR, SM24,
};
use crate::error::{ParseError, Result};
use crate::records::{
    read_records, Bag, GeneratorList, Info, Instrument, ModulatorList, PresetHeader, SampleHeader,
};
use crate::stream::ByteCursor;
use log::{debug, warn};
use riff::ChunkId;

pub type ParseOptions = RiffOptions;

/// Byte offsets of the sample data chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplingData {
    /// Start of `smpl`.
    pub offset_msb: usize,
    /// Start of `sm24`, present for 24-bit files.
    pub offset_lsb: Option<usize>,
    /// Size of `smpl` in bytes.
    pub size: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleEncoding {
    Pcm16,
    Pcm24,
    Compressed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParseResult {
    pub preset_headers: Vec<PresetHeader>,
    pub preset_bags: Vec<Bag>,
    pub preset_modulators: Vec<ModulatorList>,
    pub preset_generators: Vec<GeneratorList>,
    pub instruments: Vec<Instrument>,
    pub instrument_bags: Vec<Bag>,
    pub instrument_modulators: Vec<ModulatorList>,
    pub instrument_generators: Vec<GeneratorList>,
    pub sample_headers: Vec<SampleHeader>,
    pub samples: Vec<Vec<u8>>,
    pub sampling_data: SamplingData,
    pub info: Info,
    /// Bag index of the EOP record, closing the last preset's zones.
    pub preset_bag_limit: Option<u16>,
    /// Bag index of the EOI record, closing the last instrument's zones.
    pub instrument_bag_limit: Option<u16>,
}

impl ParseResult {
    pub fn is_sf3(&self) -> bool {
        self.info.version.major == 3
    }

    pub fn sample_encoding(&self) -> SampleEncoding {
        if self.is_sf3() {
            SampleEncoding::Compressed
        } else if self.sampling_data.offset_lsb.is_some() {
            SampleEncoding::Pcm24
        } else {
            SampleEncoding::Pcm16
        }
    }
}

pub fn parse(data: &[u8]) -> Result<ParseResult> {
    parse_with_options(data, ParseOptions::default())
}

pub fn parse_with_options(data: &[u8], options: ParseOptions) -> Result<ParseResult> {
    let chunks = parse_riff(data, 0, data.len(), options)?;
    if chunks.len() != 1 {
        return Err(ParseError::TopLevelChunkCount(chunks.len()));
    }
    // Only the outer header may be big-endian.
    let inner = ParseOptions {
        big_endian: false,
        ..options
    };
    let mut chunk_list = get_chunk_list(data, &chunks[0], &riff::RIFF_ID, &SFBK, inner)?;
    if chunk_list.len() != 3 {
        return Err(ParseError::SubChunkCount {
            list: "sfbk",
            expected: 3,
            found: chunk_list.len(),
        });
    }

    let info_chunks = get_chunk_list(data, &chunk_list[0], &riff::LIST_ID, &INFO, inner)?;
    let info = Info::parse(data, &info_chunks)?;
    let is_sf3 = info.version.major == 3;
    if is_sf3 && chunk_list[2].id != riff::LIST_ID && chunk_list[2].offset >= 9 {
        warn!(
            "SF3 pdta chunk misaligned (found '{}'), re-reading its header",
            chunk_list[2].tag()
        );
        chunk_list[2] = parse_chunk(data, chunk_list[2].offset - 9, false)?;
    }

    let sampling_data = parse_sdta_list(data, &chunk_list[1], inner)?;
    let pdta = get_chunk_list(data, &chunk_list[2], &riff::LIST_ID, &PDTA, inner)?;
    if pdta.len() != 9 {
        return Err(ParseError::SubChunkCount {
            list: "pdta",
            expected: 9,
            found: pdta.len(),
        });
    }

    let (preset_headers, eop) = read_records(
        data,
        &pdta[0],
        PHDR,
        |c| c.read_record::<PresetHeader>(),
        Some(PresetHeader::is_end),
    )?;
    let (preset_bags, _) = read_records(data, &pdta[1], PBAG, |c| c.read_record::<Bag>(), None)?;
    let (preset_modulators, _) = read_records(
        data,
        &pdta[2],
        PMOD,
        |c| c.read_record::<ModulatorList>(),
        Some(ModulatorList::is_end),
    )?;
    let (preset_generators, _) = read_records(data, &pdta[3], PGEN, GeneratorList::parse, None)?;
    let (instruments, eoi) = read_records(
        data,
        &pdta[4],
        INST,
        |c| c.read_record::<Instrument>(),
        Some(Instrument::is_end),
    )?;
    let (instrument_bags, _) =
        read_records(data, &pdta[5], IBAG, |c| c.read_record::<Bag>(), None)?;
    let (instrument_modulators, _) = read_records(
        data,
        &pdta[6],
        IMOD,
        |c| c.read_record::<ModulatorList>(),
        Some(ModulatorList::is_end),
    )?;
    let (instrument_generators, _) =
        read_records(data, &pdta[7], IGEN, GeneratorList::parse, None)?;
    let (sample_headers, _) = read_records(
        data,
        &pdta[8],
        SHDR,
        |c| SampleHeader::parse(c, is_sf3),
        Some(SampleHeader::is_end),
    )?;

    let samples = load_samples(data, &sample_headers, &sampling_data, is_sf3);

    Ok(ParseResult {
        preset_headers,
        preset_bags,
        preset_modulators,
        preset_generators,
        instruments,
        instrument_bags,
        instrument_modulators,
        instrument_generators,
        sample_headers,
        samples,
        sampling_data,
        info,
        preset_bag_limit: eop.map(|p| p.preset_bag_index),
        instrument_bag_limit: eoi.map(|i| i.instrument_bag_index),
    })
}

/// Check that `chunk` is a `expected_type` chunk carrying `signature`, and
/// walk the chunks inside it.
fn get_chunk_list(
    data: &[u8],
    chunk: &Chunk,
    expected_type: &ChunkId,
    signature: &ChunkId,
    options: ParseOptions,
) -> Result<Vec<Chunk>> {
    if chunk.id != *expected_type {
        return Err(ParseError::UnexpectedChunk {
            expected: tag_name(expected_type),
            found: chunk.tag(),
        });
    }
    let mut cursor = ByteCursor::new(data, chunk.offset);
    let found: [u8; 4] = cursor.read_record()?;
    if found != signature.value {
        return Err(ParseError::UnexpectedSignature {
            expected: tag_name(signature),
            found: tag_name(&ChunkId { value: found }),
        });
    }
    debug!("{} {}:", chunk.tag(), tag_name(signature));
    let length = (chunk.size as usize).saturating_sub(4);
    Ok(parse_riff(data, cursor.position(), length, options)?)
}

fn parse_sdta_list(data: &[u8], chunk: &Chunk, options: ParseOptions) -> Result<SamplingData> {
    let chunks = get_chunk_list(data, chunk, &riff::LIST_ID, &SDTA, options)?;
    let smpl = chunks.first().ok_or(ParseError::MissingChunk("smpl"))?;
    let sm24 = chunks.get(1).filter(|c| c.id == SM24);
    if sm24.is_some() {
        warn!("24-bit sample data is not decoded, only the upper 16 bits are sliced");
    }
    Ok(SamplingData {
        offset_msb: smpl.offset,
        offset_lsb: sm24.map(|c| c.offset),
        size: smpl.size as usize,
    })
}

/// Slice every sample out of `smpl`. PCM positions count 16-bit frames,
/// SF3 positions count bytes of the compressed stream.
fn load_samples(
    data: &[u8],
    headers: &[SampleHeader],
    sampling: &SamplingData,
    is_sf3: bool,
) -> Vec<Vec<u8>> {
    let unit = if is_sf3 { 1 } else { 2 };
    let limit = (sampling.offset_msb + sampling.size).min(data.len());
    headers
        .iter()
        .map(|header| {
            let start = header.start as usize * unit;
            let end = header.end as usize * unit;
            if start > end || end > sampling.size {
                warn!(
                    "Sample {} [{}, {}) exceeds the sample data, clamped",
                    header.sample_name, header.start, header.end
                );
            }
            let end = (sampling.offset_msb + end).min(limit);
            let start = (sampling.offset_msb + start).min(end);
            data[start..end].to_vec()
        })
        .collect()
}
