//! The `#~` table stream (ECMA-335 II.22 and II.24.2.6).
//!
//! Every table from `Module` (0x00) to `GenericParamConstraint` (0x2C) has
//! its schema here so that row widths, and therefore the offsets of the
//! tables that are actually read, come out right. Column values are
//! returned raw; heap lookups and coded-index decoding happen in the reader.

use super::bytes::ByteReader;
use crate::error::FormatError;

pub const TABLE_COUNT: usize = 0x2D;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TableId {
    Module = 0x00,
    TypeRef = 0x01,
    TypeDef = 0x02,
    FieldPtr = 0x03,
    Field = 0x04,
    MethodPtr = 0x05,
    MethodDef = 0x06,
    ParamPtr = 0x07,
    Param = 0x08,
    InterfaceImpl = 0x09,
    MemberRef = 0x0A,
    Constant = 0x0B,
    CustomAttribute = 0x0C,
    FieldMarshal = 0x0D,
    DeclSecurity = 0x0E,
    ClassLayout = 0x0F,
    FieldLayout = 0x10,
    StandAloneSig = 0x11,
    EventMap = 0x12,
    EventPtr = 0x13,
    Event = 0x14,
    PropertyMap = 0x15,
    PropertyPtr = 0x16,
    Property = 0x17,
    MethodSemantics = 0x18,
    MethodImpl = 0x19,
    ModuleRef = 0x1A,
    TypeSpec = 0x1B,
    ImplMap = 0x1C,
    FieldRva = 0x1D,
    EncLog = 0x1E,
    EncMap = 0x1F,
    Assembly = 0x20,
    AssemblyProcessor = 0x21,
    AssemblyOs = 0x22,
    AssemblyRef = 0x23,
    AssemblyRefProcessor = 0x24,
    AssemblyRefOs = 0x25,
    File = 0x26,
    ExportedType = 0x27,
    ManifestResource = 0x28,
    NestedClass = 0x29,
    GenericParam = 0x2A,
    MethodSpec = 0x2B,
    GenericParamConstraint = 0x2C,
}

impl TableId {
    pub const ALL: [TableId; TABLE_COUNT] = [
        TableId::Module,
        TableId::TypeRef,
        TableId::TypeDef,
        TableId::FieldPtr,
        TableId::Field,
        TableId::MethodPtr,
        TableId::MethodDef,
        TableId::ParamPtr,
        TableId::Param,
        TableId::InterfaceImpl,
        TableId::MemberRef,
        TableId::Constant,
        TableId::CustomAttribute,
        TableId::FieldMarshal,
        TableId::DeclSecurity,
        TableId::ClassLayout,
        TableId::FieldLayout,
        TableId::StandAloneSig,
        TableId::EventMap,
        TableId::EventPtr,
        TableId::Event,
        TableId::PropertyMap,
        TableId::PropertyPtr,
        TableId::Property,
        TableId::MethodSemantics,
        TableId::MethodImpl,
        TableId::ModuleRef,
        TableId::TypeSpec,
        TableId::ImplMap,
        TableId::FieldRva,
        TableId::EncLog,
        TableId::EncMap,
        TableId::Assembly,
        TableId::AssemblyProcessor,
        TableId::AssemblyOs,
        TableId::AssemblyRef,
        TableId::AssemblyRefProcessor,
        TableId::AssemblyRefOs,
        TableId::File,
        TableId::ExportedType,
        TableId::ManifestResource,
        TableId::NestedClass,
        TableId::GenericParam,
        TableId::MethodSpec,
        TableId::GenericParamConstraint,
    ];

    pub fn index(self) -> usize {
        self as usize
    }
}

/// Coded index kinds (II.24.2.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Coded {
    TypeDefOrRef,
    HasConstant,
    HasCustomAttribute,
    HasFieldMarshal,
    HasDeclSecurity,
    MemberRefParent,
    HasSemantics,
    MethodDefOrRef,
    MemberForwarded,
    Implementation,
    CustomAttributeType,
    ResolutionScope,
    TypeOrMethodDef,
}

impl Coded {
    pub fn tag_bits(self) -> u32 {
        match self {
            Coded::TypeDefOrRef => 2,
            Coded::HasConstant => 2,
            Coded::HasCustomAttribute => 5,
            Coded::HasFieldMarshal => 1,
            Coded::HasDeclSecurity => 2,
            Coded::MemberRefParent => 3,
            Coded::HasSemantics => 1,
            Coded::MethodDefOrRef => 1,
            Coded::MemberForwarded => 1,
            Coded::Implementation => 2,
            Coded::CustomAttributeType => 3,
            Coded::ResolutionScope => 2,
            Coded::TypeOrMethodDef => 1,
        }
    }

    /// Target table per tag value. `None` marks unused tags.
    pub fn tables(self) -> &'static [Option<TableId>] {
        use TableId as T;
        match self {
            Coded::TypeDefOrRef => &[Some(T::TypeDef), Some(T::TypeRef), Some(T::TypeSpec)],
            Coded::HasConstant => &[Some(T::Field), Some(T::Param), Some(T::Property)],
            Coded::HasCustomAttribute => &[
                Some(T::MethodDef),
                Some(T::Field),
                Some(T::TypeRef),
                Some(T::TypeDef),
                Some(T::Param),
                Some(T::InterfaceImpl),
                Some(T::MemberRef),
                Some(T::Module),
                Some(T::DeclSecurity),
                Some(T::Property),
                Some(T::Event),
                Some(T::StandAloneSig),
                Some(T::ModuleRef),
                Some(T::TypeSpec),
                Some(T::Assembly),
                Some(T::AssemblyRef),
                Some(T::File),
                Some(T::ExportedType),
                Some(T::ManifestResource),
                Some(T::GenericParam),
                Some(T::GenericParamConstraint),
                Some(T::MethodSpec),
            ],
            Coded::HasFieldMarshal => &[Some(T::Field), Some(T::Param)],
            Coded::HasDeclSecurity => &[Some(T::TypeDef), Some(T::MethodDef), Some(T::Assembly)],
            Coded::MemberRefParent => &[
                Some(T::TypeDef),
                Some(T::TypeRef),
                Some(T::ModuleRef),
                Some(T::MethodDef),
                Some(T::TypeSpec),
            ],
            Coded::HasSemantics => &[Some(T::Event), Some(T::Property)],
            Coded::MethodDefOrRef => &[Some(T::MethodDef), Some(T::MemberRef)],
            Coded::MemberForwarded => &[Some(T::Field), Some(T::MethodDef)],
            Coded::Implementation => &[Some(T::File), Some(T::AssemblyRef), Some(T::ExportedType)],
            Coded::CustomAttributeType => &[
                None,
                None,
                Some(T::MethodDef),
                Some(T::MemberRef),
                None,
            ],
            Coded::ResolutionScope => &[
                Some(T::Module),
                Some(T::ModuleRef),
                Some(T::AssemblyRef),
                Some(T::TypeRef),
            ],
            Coded::TypeOrMethodDef => &[Some(T::TypeDef), Some(T::MethodDef)],
        }
    }

    /// Split a raw coded value into `(table, 1-based row)`. Row 0 means a
    /// null reference.
    pub fn decode(self, raw: u32) -> Result<(TableId, u32), FormatError> {
        let bits = self.tag_bits();
        let tag = (raw & ((1 << bits) - 1)) as usize;
        let row = raw >> bits;
        match self.tables().get(tag).copied().flatten() {
            Some(table) => Ok((table, row)),
            None => Err(FormatError::new(format!(
                "invalid {:?} coded index tag {}",
                self, tag
            ))),
        }
    }
}

/// One column of a table schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Col {
    U16,
    U32,
    Str,
    Guid,
    Blob,
    Index(TableId),
    Coded(Coded),
}

/// Column layout of every table.
pub fn schema(table: TableId) -> &'static [Col] {
    use Col::*;
    use TableId as T;
    match table {
        T::Module => &[U16, Str, Guid, Guid, Guid],
        T::TypeRef => &[Coded(self::Coded::ResolutionScope), Str, Str],
        T::TypeDef => &[
            U32,
            Str,
            Str,
            Coded(self::Coded::TypeDefOrRef),
            Index(T::Field),
            Index(T::MethodDef),
        ],
        T::FieldPtr => &[Index(T::Field)],
        T::Field => &[U16, Str, Blob],
        T::MethodPtr => &[Index(T::MethodDef)],
        T::MethodDef => &[U32, U16, U16, Str, Blob, Index(T::Param)],
        T::ParamPtr => &[Index(T::Param)],
        T::Param => &[U16, U16, Str],
        T::InterfaceImpl => &[Index(T::TypeDef), Coded(self::Coded::TypeDefOrRef)],
        T::MemberRef => &[Coded(self::Coded::MemberRefParent), Str, Blob],
        // Type is one byte plus one byte of padding.
        T::Constant => &[U16, Coded(self::Coded::HasConstant), Blob],
        T::CustomAttribute => &[
            Coded(self::Coded::HasCustomAttribute),
            Coded(self::Coded::CustomAttributeType),
            Blob,
        ],
        T::FieldMarshal => &[Coded(self::Coded::HasFieldMarshal), Blob],
        T::DeclSecurity => &[U16, Coded(self::Coded::HasDeclSecurity), Blob],
        T::ClassLayout => &[U16, U32, Index(T::TypeDef)],
        T::FieldLayout => &[U32, Index(T::Field)],
        T::StandAloneSig => &[Blob],
        T::EventMap => &[Index(T::TypeDef), Index(T::Event)],
        T::EventPtr => &[Index(T::Event)],
        T::Event => &[U16, Str, Coded(self::Coded::TypeDefOrRef)],
        T::PropertyMap => &[Index(T::TypeDef), Index(T::Property)],
        T::PropertyPtr => &[Index(T::Property)],
        T::Property => &[U16, Str, Blob],
        T::MethodSemantics => &[U16, Index(T::MethodDef), Coded(self::Coded::HasSemantics)],
        T::MethodImpl => &[
            Index(T::TypeDef),
            Coded(self::Coded::MethodDefOrRef),
            Coded(self::Coded::MethodDefOrRef),
        ],
        T::ModuleRef => &[Str],
        T::TypeSpec => &[Blob],
        T::ImplMap => &[
            U16,
            Coded(self::Coded::MemberForwarded),
            Str,
            Index(T::ModuleRef),
        ],
        T::FieldRva => &[U32, Index(T::Field)],
        T::EncLog => &[U32, U32],
        T::EncMap => &[U32],
        T::Assembly => &[U32, U16, U16, U16, U16, U32, Blob, Str, Str],
        T::AssemblyProcessor => &[U32],
        T::AssemblyOs => &[U32, U32, U32],
        T::AssemblyRef => &[U16, U16, U16, U16, U32, Blob, Str, Str, Blob],
        T::AssemblyRefProcessor => &[U32, Index(T::AssemblyRef)],
        T::AssemblyRefOs => &[U32, U32, U32, Index(T::AssemblyRef)],
        T::File => &[U32, Str, Blob],
        T::ExportedType => &[U32, U32, Str, Str, Coded(self::Coded::Implementation)],
        T::ManifestResource => &[U32, U32, Str, Coded(self::Coded::Implementation)],
        T::NestedClass => &[Index(T::TypeDef), Index(T::TypeDef)],
        T::GenericParam => &[U16, U16, Coded(self::Coded::TypeOrMethodDef), Str],
        T::MethodSpec => &[Coded(self::Coded::MethodDefOrRef), Blob],
        T::GenericParamConstraint => &[Index(T::GenericParam), Coded(self::Coded::TypeDefOrRef)],
    }
}

#[derive(Debug, Clone, Default)]
struct TableData<'a> {
    rows: u32,
    row_size: usize,
    offsets: Vec<usize>,
    widths: Vec<usize>,
    data: &'a [u8],
}

/// The decoded table stream header plus a raw view of every table.
#[derive(Debug, Clone)]
pub struct TableStream<'a> {
    tables: Vec<TableData<'a>>,
}

const HEAP_STRINGS_WIDE: u8 = 0x01;
const HEAP_GUID_WIDE: u8 = 0x02;
const HEAP_BLOB_WIDE: u8 = 0x04;
const HEAP_EXTRA_DATA: u8 = 0x40;

impl<'a> TableStream<'a> {
    pub fn parse(stream: &'a [u8]) -> Result<Self, FormatError> {
        let mut r = ByteReader::new(stream);
        r.skip(4)?; // reserved
        let _major = r.u8()?;
        let _minor = r.u8()?;
        let heap_sizes = r.u8()?;
        r.skip(1)?; // reserved
        let valid = r.u64()?;
        let _sorted = r.u64()?;

        let mut rows = [0u32; TABLE_COUNT];
        for bit in 0..64 {
            if valid & (1u64 << bit) == 0 {
                continue;
            }
            if bit >= TABLE_COUNT {
                return Err(FormatError::new(format!(
                    "unsupported metadata table {:#04x}",
                    bit
                )));
            }
            rows[bit] = r.u32()?;
        }
        if heap_sizes & HEAP_EXTRA_DATA != 0 {
            r.skip(4)?;
        }

        let str_w = if heap_sizes & HEAP_STRINGS_WIDE != 0 { 4 } else { 2 };
        let guid_w = if heap_sizes & HEAP_GUID_WIDE != 0 { 4 } else { 2 };
        let blob_w = if heap_sizes & HEAP_BLOB_WIDE != 0 { 4 } else { 2 };

        let index_w = |t: TableId| if rows[t.index()] < 0x1_0000 { 2 } else { 4 };
        let coded_w = |c: Coded| {
            let limit = 1u32 << (16 - c.tag_bits());
            let max = c
                .tables()
                .iter()
                .flatten()
                .map(|t| rows[t.index()])
                .max()
                .unwrap_or(0);
            if max < limit {
                2
            } else {
                4
            }
        };

        let mut tables = Vec::with_capacity(TABLE_COUNT);
        for table in TableId::ALL {
            let mut offsets = Vec::new();
            let mut widths = Vec::new();
            let mut row_size = 0usize;
            for col in schema(table) {
                let w = match col {
                    Col::U16 => 2,
                    Col::U32 => 4,
                    Col::Str => str_w,
                    Col::Guid => guid_w,
                    Col::Blob => blob_w,
                    Col::Index(t) => index_w(*t),
                    Col::Coded(c) => coded_w(*c),
                };
                offsets.push(row_size);
                widths.push(w);
                row_size += w;
            }
            let count = rows[table.index()];
            let len = row_size
                .checked_mul(count as usize)
                .ok_or_else(|| FormatError::new("table size overflow"))?;
            let data = r.bytes(len).map_err(|_| {
                FormatError::new(format!("table {:?} truncated ({} rows)", table, count))
            })?;
            tables.push(TableData {
                rows: count,
                row_size,
                offsets,
                widths,
                data,
            });
        }

        Ok(TableStream { tables })
    }

    pub fn row_count(&self, table: TableId) -> u32 {
        self.tables[table.index()].rows
    }

    /// Raw value of column `col` in 1-based row `row`.
    pub fn value(&self, table: TableId, row: u32, col: usize) -> Result<u32, FormatError> {
        let t = &self.tables[table.index()];
        if row == 0 || row > t.rows {
            return Err(FormatError::new(format!(
                "{:?} row {} out of range (1..={})",
                table, row, t.rows
            )));
        }
        let width = *t
            .widths
            .get(col)
            .ok_or_else(|| FormatError::new(format!("{:?} has no column {}", table, col)))?;
        let start = (row as usize - 1) * t.row_size + t.offsets[col];
        let mut r = ByteReader::at(t.data, start)?;
        r.sized(width)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coded_index_decoding() {
        // TypeDefOrRef: TypeRef row 5 is (5 << 2) | 1.
        assert_eq!(
            Coded::TypeDefOrRef.decode((5 << 2) | 1).unwrap(),
            (TableId::TypeRef, 5)
        );
        assert_eq!(
            Coded::ResolutionScope.decode((3 << 2) | 2).unwrap(),
            (TableId::AssemblyRef, 3)
        );
        assert!(Coded::TypeDefOrRef.decode(3).is_err());
        assert!(Coded::CustomAttributeType.decode(0).is_err());
    }

    #[test]
    fn all_tables_have_a_schema_in_id_order() {
        for (i, table) in TableId::ALL.iter().enumerate() {
            assert_eq!(table.index(), i);
            assert!(!schema(*table).is_empty());
        }
    }

    #[test]
    fn parses_header_and_reads_rows() {
        let mut stream = Vec::new();
        stream.extend_from_slice(&0u32.to_le_bytes());
        stream.extend_from_slice(&[2, 0, 0, 1]);
        // Module and ModuleRef present.
        let valid: u64 = (1 << 0x00) | (1 << 0x1A);
        stream.extend_from_slice(&valid.to_le_bytes());
        stream.extend_from_slice(&0u64.to_le_bytes());
        stream.extend_from_slice(&1u32.to_le_bytes());
        stream.extend_from_slice(&2u32.to_le_bytes());
        // Module row: generation, name, mvid, encid, encbaseid.
        for v in [0u16, 7, 1, 0, 0] {
            stream.extend_from_slice(&v.to_le_bytes());
        }
        // ModuleRef rows.
        stream.extend_from_slice(&11u16.to_le_bytes());
        stream.extend_from_slice(&19u16.to_le_bytes());

        let tables = TableStream::parse(&stream).unwrap();
        assert_eq!(tables.row_count(TableId::Module), 1);
        assert_eq!(tables.row_count(TableId::ModuleRef), 2);
        assert_eq!(tables.value(TableId::Module, 1, 1).unwrap(), 7);
        assert_eq!(tables.value(TableId::ModuleRef, 2, 0).unwrap(), 19);
        assert!(tables.value(TableId::ModuleRef, 3, 0).is_err());
        assert!(tables.value(TableId::TypeDef, 1, 0).is_err());
    }

    #[test]
    fn truncated_tables_are_rejected() {
        let mut stream = Vec::new();
        stream.extend_from_slice(&0u32.to_le_bytes());
        stream.extend_from_slice(&[2, 0, 0, 1]);
        stream.extend_from_slice(&(1u64 << 0x1A).to_le_bytes());
        stream.extend_from_slice(&0u64.to_le_bytes());
        stream.extend_from_slice(&4u32.to_le_bytes());
        stream.extend_from_slice(&[0, 0]);
        assert!(TableStream::parse(&stream).is_err());
    }
}
