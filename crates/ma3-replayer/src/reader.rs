//! Bounds-checked big-endian cursor shared by both decoders

use crate::error::{FormatError, FormatResult};

/// Big-endian cursor over a byte slice
///
/// A reader never looks past its own slice: a sub-reader spawned for a chunk
/// fails with [`FormatError::UnexpectedEof`] as soon as a read crosses the
/// chunk's declared length, even if the enclosing data continues. Error
/// offsets are absolute, counted from the start of the outermost reader.
#[derive(Debug, Clone)]
pub struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
    base: usize,
}

impl<'a> ByteReader<'a> {
    /// Reader over the whole slice
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            base: 0,
        }
    }

    /// Offset from the start of this reader
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Offset from the start of the outermost reader
    pub fn absolute_position(&self) -> usize {
        self.base + self.pos
    }

    /// Bytes left in this reader
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// True once every byte has been consumed
    pub fn is_at_end(&self) -> bool {
        self.pos >= self.data.len()
    }

    fn take(&mut self, len: usize) -> FormatResult<&'a [u8]> {
        if len > self.remaining() {
            return Err(FormatError::UnexpectedEof {
                offset: self.absolute_position(),
                needed: len,
            });
        }
        let slice = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    /// Read one byte
    pub fn u8(&mut self) -> FormatResult<u8> {
        Ok(self.take(1)?[0])
    }

    /// Read a big-endian `u16`
    pub fn u16(&mut self) -> FormatResult<u16> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    /// Read a big-endian `u32`
    pub fn u32(&mut self) -> FormatResult<u32> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Borrow the next `len` bytes
    pub fn bytes(&mut self, len: usize) -> FormatResult<&'a [u8]> {
        self.take(len)
    }

    /// Read a four-character chunk identifier
    pub fn tag(&mut self) -> FormatResult<[u8; 4]> {
        let b = self.take(4)?;
        Ok([b[0], b[1], b[2], b[3]])
    }

    /// Read a tag and fail unless it equals `expected`
    pub fn expect_tag(&mut self, expected: &'static str) -> FormatResult<()> {
        let offset = self.absolute_position();
        let tag = self.tag()?;
        if tag.as_slice() != expected.as_bytes() {
            return Err(FormatError::BadMagic {
                expected,
                found: String::from_utf8_lossy(&tag).into_owned(),
                offset,
            });
        }
        Ok(())
    }

    /// Skip `len` bytes
    pub fn skip(&mut self, len: usize) -> FormatResult<()> {
        self.take(len).map(|_| ())
    }

    /// Split off a bounded reader over the next `len` bytes and advance past them
    pub fn sub_reader(&mut self, len: usize) -> FormatResult<ByteReader<'a>> {
        let base = self.absolute_position();
        let data = self.take(len)?;
        Ok(ByteReader { data, pos: 0, base })
    }

    /// Remaining bytes without consuming them
    pub fn rest(&self) -> &'a [u8] {
        &self.data[self.pos..]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_big_endian_reads() {
        let mut reader = ByteReader::new(&[0x12, 0x34, 0x56, 0x78, 0x9A, 0xBC, 0xDE]);
        assert_eq!(reader.u8().unwrap(), 0x12);
        assert_eq!(reader.u16().unwrap(), 0x3456);
        assert_eq!(reader.u32().unwrap(), 0x789A_BCDE);
        assert!(reader.is_at_end());
    }

    #[test]
    fn test_eof_reports_absolute_offset() {
        let data = [0u8, 1, 2, 3, 4, 5];
        let mut reader = ByteReader::new(&data);
        reader.skip(2).unwrap();
        let mut chunk = reader.sub_reader(3).unwrap();
        chunk.u16().unwrap();
        assert_eq!(chunk.position(), 2);
        assert_eq!(chunk.absolute_position(), 4);
        match chunk.u16() {
            Err(FormatError::UnexpectedEof { offset, needed }) => {
                assert_eq!(offset, 4);
                assert_eq!(needed, 2);
            }
            other => panic!("expected EOF, got {other:?}"),
        }
        // Parent continues after the chunk
        assert_eq!(reader.u8().unwrap(), 5);
    }

    #[test]
    fn test_sub_reader_longer_than_data_fails() {
        let mut reader = ByteReader::new(&[0u8; 4]);
        assert!(matches!(
            reader.sub_reader(8),
            Err(FormatError::UnexpectedEof { .. })
        ));
    }

    #[test]
    fn test_expect_tag() {
        let mut reader = ByteReader::new(b"meloMMMD");
        reader.expect_tag("melo").unwrap();
        match reader.expect_tag("trac") {
            Err(FormatError::BadMagic { found, offset, .. }) => {
                assert_eq!(found, "MMMD");
                assert_eq!(offset, 4);
            }
            other => panic!("expected bad magic, got {other:?}"),
        }
    }
}
