use crate::stream::ByteCursor;
use binread::BinResult;
use log::debug;
use riff::ChunkId;
use std::fmt;

pub const INFO: ChunkId = ChunkId { value: *b"INFO" };
pub const SFBK: ChunkId = ChunkId { value: *b"sfbk" };
pub const SDTA: ChunkId = ChunkId { value: *b"sdta" };
pub const PDTA: ChunkId = ChunkId { value: *b"pdta" };
pub const SM24: ChunkId = ChunkId { value: *b"sm24" };
pub const PHDR: ChunkId = ChunkId { value: *b"phdr" };
pub const PBAG: ChunkId = ChunkId { value: *b"pbag" };
pub const PMOD: ChunkId = ChunkId { value: *b"pmod" };
pub const PGEN: ChunkId = ChunkId { value: *b"pgen" };
pub const INST: ChunkId = ChunkId { value: *b"inst" };
pub const IBAG: ChunkId = ChunkId { value: *b"ibag" };
pub const IMOD: ChunkId = ChunkId { value: *b"imod" };
pub const IGEN: ChunkId = ChunkId { value: *b"igen" };
pub const SHDR: ChunkId = ChunkId { value: *b"shdr" };

/// Render a tag for messages without assuming it is valid UTF-8.
pub fn tag_name(id: &ChunkId) -> String {
    id.value.iter().map(|&b| b as char).collect()
}

/// A chunk header. `offset` points at the chunk data, just past the 8-byte
/// header.
#[derive(Clone, PartialEq, Eq)]
pub struct Chunk {
    pub id: ChunkId,
    pub size: u32,
    pub offset: usize,
}

impl Chunk {
    pub fn tag(&self) -> String {
        tag_name(&self.id)
    }

    pub fn end(&self) -> usize {
        self.offset + self.size as usize
    }
}

impl fmt::Debug for Chunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Chunk")
            .field("id", &self.tag())
            .field("size", &self.size)
            .field("offset", &self.offset)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RiffOptions {
    /// Skip a pad byte whenever an odd number of bytes has been consumed.
    pub padding: bool,
    /// Read the chunk size field as big-endian.
    pub big_endian: bool,
}

impl Default for RiffOptions {
    fn default() -> Self {
        RiffOptions {
            padding: true,
            big_endian: false,
        }
    }
}

pub fn parse_chunk(data: &[u8], offset: usize, big_endian: bool) -> BinResult<Chunk> {
    let mut cursor = ByteCursor::new(data, offset);
    let id: [u8; 4] = cursor.read_record()?;
    let size = cursor.read_u32(big_endian)?;
    Ok(Chunk {
        id: ChunkId { value: id },
        size,
        offset: cursor.position(),
    })
}

/// Walk the chunks laid out back to back in `data[start..start + length]`.
///
/// LIST chunks are not descended into.
pub fn parse_riff(
    data: &[u8],
    start: usize,
    length: usize,
    options: RiffOptions,
) -> BinResult<Vec<Chunk>> {
    let mut chunks = vec![];
    let end = start + length;
    let mut offset = start;
    while offset < end {
        let chunk = parse_chunk(data, offset, options.big_endian)?;
        debug!(
            "Chunk: id: {}, len: {}, offset: {}",
            chunk.tag(),
            chunk.size,
            chunk.offset
        );
        offset = chunk.end();
        if options.padding && (offset - start) & 1 == 1 {
            offset += 1;
        }
        chunks.push(chunk);
    }
    Ok(chunks)
}
