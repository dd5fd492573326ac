use binread::{BinRead, BinReaderExt, BinResult};
use std::io::{self, Cursor, Read, Seek, SeekFrom};

/// Decode a fixed-width SoundFont string field.
///
/// Bytes map one-to-one onto chars (Latin-1). The field is cut at the first
/// NUL found after its first byte; without one the full width is kept.
pub fn make_string(s: &[u8]) -> String {
    let len = s
        .iter()
        .skip(1)
        .position(|&x| x == 0)
        .map(|p| p + 1)
        .unwrap_or(s.len());
    s[..len].iter().map(|&b| b as char).collect()
}

/// Sequential little-endian reader over an in-memory buffer.
///
/// Every read advances the position by the width of the field. Reading past
/// the end of the buffer fails with an I/O error from `binread`.
pub struct ByteCursor<'a> {
    inner: Cursor<&'a [u8]>,
}

impl<'a> ByteCursor<'a> {
    pub fn new(data: &'a [u8], offset: usize) -> Self {
        let mut inner = Cursor::new(data);
        inner.set_position(offset as u64);
        ByteCursor { inner }
    }

    pub fn position(&self) -> usize {
        self.inner.position() as usize
    }

    pub fn read_string(&mut self, size: usize) -> BinResult<String> {
        let mut buf = vec![0u8; size];
        self.inner.read_exact(&mut buf).map_err(binread::Error::Io)?;
        Ok(make_string(&buf))
    }

    pub fn read_u8(&mut self) -> BinResult<u8> {
        self.inner.read_le()
    }

    pub fn read_i8(&mut self) -> BinResult<i8> {
        self.inner.read_le()
    }

    pub fn read_u16(&mut self) -> BinResult<u16> {
        self.inner.read_le()
    }

    pub fn read_i16(&mut self) -> BinResult<i16> {
        self.inner.read_le()
    }

    pub fn read_u32(&mut self, big_endian: bool) -> BinResult<u32> {
        if big_endian {
            self.inner.read_be()
        } else {
            self.inner.read_le()
        }
    }

    /// Read one fixed-layout record.
    pub fn read_record<T: BinRead<Args = ()>>(&mut self) -> BinResult<T> {
        self.inner.read_le()
    }
}

impl Read for ByteCursor<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl Seek for ByteCursor<'_> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.inner.seek(pos)
    }
}
