//! Locating the CLI metadata blob inside a PE image.

use super::bytes::ByteReader;
use crate::error::FormatError;
use object::pe::{ImageNtHeaders32, ImageNtHeaders64, IMAGE_DIRECTORY_ENTRY_COM_DESCRIPTOR};
use object::read::pe::{ImageNtHeaders, PeFile};
use object::FileKind;

/// Return the bytes of the metadata root (`BSJB` signature onward).
pub fn cli_metadata(data: &[u8]) -> Result<&[u8], FormatError> {
    let kind = FileKind::parse(data)
        .map_err(|e| FormatError::new(format!("unrecognised file format: {}", e)))?;
    match kind {
        FileKind::Pe32 => metadata_from::<ImageNtHeaders32>(data),
        FileKind::Pe64 => metadata_from::<ImageNtHeaders64>(data),
        other => Err(FormatError::new(format!(
            "expected a PE image, found {:?}",
            other
        ))),
    }
}

fn metadata_from<'data, Pe: ImageNtHeaders>(data: &'data [u8]) -> Result<&'data [u8], FormatError> {
    let file: PeFile<'data, Pe> =
        PeFile::parse(data).map_err(|e| FormatError::new(format!("malformed PE image: {}", e)))?;
    let sections = file.section_table();

    let directory = file
        .data_directory(IMAGE_DIRECTORY_ENTRY_COM_DESCRIPTOR)
        .ok_or_else(|| FormatError::new("no CLI header (not a managed assembly)"))?;
    let cli_header = directory
        .data(data, &sections)
        .map_err(|e| FormatError::new(format!("unreadable CLI header: {}", e)))?;

    // cb, MajorRuntimeVersion, MinorRuntimeVersion, then the metadata
    // directory.
    let mut r = ByteReader::new(cli_header);
    r.skip(8)?;
    let rva = r.u32()?;
    let size = r.u32()? as usize;
    if rva == 0 || size == 0 {
        return Err(FormatError::new("CLI header has no metadata directory"));
    }

    let mapped = sections
        .pe_data_at(data, rva)
        .ok_or_else(|| FormatError::new(format!("metadata RVA {:#x} not in any section", rva)))?;
    mapped.get(..size).ok_or_else(|| {
        FormatError::new(format!(
            "metadata size {:#x} exceeds its section ({:#x} available)",
            size,
            mapped.len()
        ))
    })
}
