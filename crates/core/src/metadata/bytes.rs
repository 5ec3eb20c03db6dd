//! Bounds-checked little-endian reading over a byte slice.

use crate::error::FormatError;

/// A forward-only cursor. Every read is bounds-checked and reports the
/// offset it failed at.
#[derive(Debug, Clone)]
pub struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        ByteReader { data, pos: 0 }
    }

    pub fn at(data: &'a [u8], pos: usize) -> Result<Self, FormatError> {
        if pos > data.len() {
            return Err(FormatError::new(format!(
                "offset {:#x} beyond end of data ({:#x})",
                pos,
                data.len()
            )));
        }
        Ok(ByteReader { data, pos })
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    pub fn bytes(&mut self, len: usize) -> Result<&'a [u8], FormatError> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.data.len())
            .ok_or_else(|| {
                FormatError::new(format!(
                    "truncated data: need {} byte(s) at {:#x}, have {}",
                    len,
                    self.pos,
                    self.remaining()
                ))
            })?;
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    pub fn skip(&mut self, len: usize) -> Result<(), FormatError> {
        self.bytes(len).map(|_| ())
    }

    pub fn align(&mut self, alignment: usize) -> Result<(), FormatError> {
        let rem = self.pos % alignment;
        if rem != 0 {
            self.skip(alignment - rem)?;
        }
        Ok(())
    }

    pub fn u8(&mut self) -> Result<u8, FormatError> {
        Ok(self.bytes(1)?[0])
    }

    pub fn u16(&mut self) -> Result<u16, FormatError> {
        let b = self.bytes(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    pub fn u32(&mut self) -> Result<u32, FormatError> {
        let b = self.bytes(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn u64(&mut self) -> Result<u64, FormatError> {
        let b = self.bytes(8)?;
        let mut buf = [0u8; 8];
        buf.copy_from_slice(b);
        Ok(u64::from_le_bytes(buf))
    }

    /// A 2- or 4-byte unsigned value, as used for table columns.
    pub fn sized(&mut self, width: usize) -> Result<u32, FormatError> {
        match width {
            2 => self.u16().map(u32::from),
            4 => self.u32(),
            other => Err(FormatError::new(format!("unsupported column width {}", other))),
        }
    }

    /// ECMA-335 II.23.2 compressed unsigned integer.
    pub fn compressed_u32(&mut self) -> Result<u32, FormatError> {
        let first = self.u8()?;
        if first & 0x80 == 0 {
            Ok(u32::from(first))
        } else if first & 0xC0 == 0x80 {
            let second = self.u8()?;
            Ok((u32::from(first & 0x3F) << 8) | u32::from(second))
        } else if first & 0xE0 == 0xC0 {
            let rest = self.bytes(3)?;
            Ok((u32::from(first & 0x1F) << 24)
                | (u32::from(rest[0]) << 16)
                | (u32::from(rest[1]) << 8)
                | u32::from(rest[2]))
        } else {
            Err(FormatError::new(format!(
                "invalid compressed integer lead byte {:#04x} at {:#x}",
                first,
                self.pos - 1
            )))
        }
    }

    /// A NUL-terminated string, consuming the terminator.
    pub fn c_str(&mut self) -> Result<&'a [u8], FormatError> {
        let rest = &self.data[self.pos..];
        let len = rest
            .iter()
            .position(|b| *b == 0)
            .ok_or_else(|| FormatError::new(format!("unterminated string at {:#x}", self.pos)))?;
        let s = &rest[..len];
        self.pos += len + 1;
        Ok(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compressed_integers_follow_ecma_examples() {
        let cases: &[(&[u8], u32)] = &[
            (&[0x03], 0x03),
            (&[0x7F], 0x7F),
            (&[0x80, 0x80], 0x80),
            (&[0xAE, 0x57], 0x2E57),
            (&[0xBF, 0xFF], 0x3FFF),
            (&[0xC0, 0x00, 0x40, 0x00], 0x4000),
            (&[0xDF, 0xFF, 0xFF, 0xFF], 0x1FFF_FFFF),
        ];
        for (bytes, expected) in cases {
            let mut r = ByteReader::new(bytes);
            assert_eq!(r.compressed_u32().unwrap(), *expected);
            assert!(r.is_empty());
        }
    }

    #[test]
    fn truncated_reads_fail_instead_of_panicking() {
        let mut r = ByteReader::new(&[0x01, 0x02, 0x03]);
        assert!(r.u32().is_err());
        assert_eq!(r.u16().unwrap(), 0x0201);
        assert!(r.u16().is_err());
        assert!(ByteReader::new(&[0xFF]).compressed_u32().is_err());
        assert!(ByteReader::new(b"abc").c_str().is_err());
    }
}
