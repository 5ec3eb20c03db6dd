//! The `#Strings` and `#Blob` heaps.

use super::bytes::ByteReader;
use crate::error::FormatError;

/// `#Strings`: NUL-terminated UTF-8 identifiers addressed by byte offset.
#[derive(Debug, Clone, Copy)]
pub struct StringHeap<'a> {
    data: &'a [u8],
}

impl<'a> StringHeap<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        StringHeap { data }
    }

    pub fn get(&self, offset: u32) -> Result<String, FormatError> {
        if offset == 0 {
            return Ok(String::new());
        }
        let mut r = ByteReader::at(self.data, offset as usize)
            .map_err(|_| FormatError::new(format!("#Strings offset {:#x} out of range", offset)))?;
        let raw = r.c_str()?;
        Ok(String::from_utf8_lossy(raw).into_owned())
    }
}

/// `#Blob`: length-prefixed byte runs addressed by byte offset.
#[derive(Debug, Clone, Copy)]
pub struct BlobHeap<'a> {
    data: &'a [u8],
}

impl<'a> BlobHeap<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        BlobHeap { data }
    }

    pub fn get(&self, offset: u32) -> Result<&'a [u8], FormatError> {
        if offset == 0 && self.data.is_empty() {
            return Ok(&[]);
        }
        let mut r = ByteReader::at(self.data, offset as usize)
            .map_err(|_| FormatError::new(format!("#Blob offset {:#x} out of range", offset)))?;
        let len = r.compressed_u32()?;
        r.bytes(len as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strings_resolve_by_offset() {
        let heap = StringHeap::new(b"\0Widget\0Acme.Widgets\0");
        assert_eq!(heap.get(0).unwrap(), "");
        assert_eq!(heap.get(1).unwrap(), "Widget");
        assert_eq!(heap.get(8).unwrap(), "Acme.Widgets");
        assert!(heap.get(64).is_err());
    }

    #[test]
    fn blobs_are_length_prefixed() {
        let heap = BlobHeap::new(&[0x00, 0x03, 0x20, 0x00, 0x01]);
        assert_eq!(heap.get(0).unwrap(), &[] as &[u8]);
        assert_eq!(heap.get(1).unwrap(), &[0x20, 0x00, 0x01]);
        assert!(heap.get(2).is_err());
        assert!(heap.get(9).is_err());
    }
}
