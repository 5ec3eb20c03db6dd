//! Building an [`Assembly`] model from PE bytes.

use super::bytes::ByteReader;
use super::heaps::{BlobHeap, StringHeap};
use super::model::{
    Assembly, AssemblyReference, ExportedTypeDef, GenericParamDef, Implementation,
    MethodAttributes, MethodDef, ParamDef, ResolutionScope, TypeAttributes, TypeDef, TypeHandle,
    TypeReference,
};
use super::pe::cli_metadata;
use super::signature::{decode_method_sig, decode_type_spec, TypeSig};
use super::tables::{Coded, TableId, TableStream};
use crate::error::{FormatError, LoadError};
use std::collections::HashMap;
use std::path::Path;

const METADATA_SIGNATURE: u32 = 0x424A_5342;

/// Read and parse an assembly file. The assembly name falls back to the file
/// stem when the image has no `Assembly` row (netmodules).
pub fn read_assembly(path: &Path) -> Result<Assembly, LoadError> {
    let data = std::fs::read(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let fallback = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let assembly =
        parse_assembly(&data, &fallback).map_err(|e| LoadError::invalid_binary(path, e))?;
    tracing::debug!(
        path = %path.display(),
        assembly = %assembly.name,
        types = assembly.types.len(),
        "read assembly metadata"
    );
    Ok(assembly)
}

/// Parse a PE image held in memory.
pub fn parse_assembly(data: &[u8], fallback_name: &str) -> Result<Assembly, FormatError> {
    let metadata = cli_metadata(data)?;
    let streams = Streams::parse(metadata)?;
    let tables_data = streams
        .tables
        .ok_or_else(|| FormatError::new("metadata has no #~ stream"))?;
    let tables = TableStream::parse(tables_data)?;
    let builder = Builder {
        tables: &tables,
        strings: StringHeap::new(streams.strings.unwrap_or(&[])),
        blobs: BlobHeap::new(streams.blobs.unwrap_or(&[])),
    };
    builder.build(fallback_name)
}

#[derive(Default)]
struct Streams<'a> {
    tables: Option<&'a [u8]>,
    strings: Option<&'a [u8]>,
    blobs: Option<&'a [u8]>,
}

impl<'a> Streams<'a> {
    fn parse(metadata: &'a [u8]) -> Result<Self, FormatError> {
        let mut r = ByteReader::new(metadata);
        let signature = r.u32()?;
        if signature != METADATA_SIGNATURE {
            return Err(FormatError::new(format!(
                "bad metadata signature {:#010x}",
                signature
            )));
        }
        r.skip(2 + 2 + 4)?; // major, minor, reserved
        let version_len = r.u32()? as usize;
        r.skip(version_len)?;
        r.align(4)?;
        r.skip(2)?; // flags
        let count = r.u16()?;

        let mut streams = Streams::default();
        for _ in 0..count {
            let offset = r.u32()? as usize;
            let size = r.u32()? as usize;
            let name = r.c_str()?;
            r.align(4)?;
            let body = offset
                .checked_add(size)
                .and_then(|end| metadata.get(offset..end))
                .ok_or_else(|| {
                    FormatError::new(format!(
                        "stream {} out of range",
                        String::from_utf8_lossy(name)
                    ))
                })?;
            match name {
                b"#~" | b"#-" => streams.tables = Some(body),
                b"#Strings" => streams.strings = Some(body),
                b"#Blob" => streams.blobs = Some(body),
                _ => {}
            }
        }
        Ok(streams)
    }
}

struct Builder<'t, 'a> {
    tables: &'t TableStream<'a>,
    strings: StringHeap<'a>,
    blobs: BlobHeap<'a>,
}

impl Builder<'_, '_> {
    fn build(&self, fallback_name: &str) -> Result<Assembly, FormatError> {
        let name = if self.rows(TableId::Assembly) > 0 {
            self.string(TableId::Assembly, 1, 7)?
        } else {
            fallback_name.to_string()
        };

        let mut assembly = Assembly::new(name);
        assembly.assembly_refs = self.assembly_refs()?;
        assembly.type_refs = self.type_refs()?;
        assembly.type_specs = self.type_specs()?;
        assembly.exported_types = self.exported_types()?;

        let mut method_owner = HashMap::new();
        assembly.types = self.type_defs(&mut method_owner)?;
        self.apply_nesting(&mut assembly.types)?;
        self.apply_generic_params(&mut assembly.types, &method_owner)?;
        Ok(assembly)
    }

    fn rows(&self, table: TableId) -> u32 {
        self.tables.row_count(table)
    }

    fn value(&self, table: TableId, row: u32, col: usize) -> Result<u32, FormatError> {
        self.tables.value(table, row, col)
    }

    fn string(&self, table: TableId, row: u32, col: usize) -> Result<String, FormatError> {
        self.strings.get(self.value(table, row, col)?)
    }

    fn blob(&self, table: TableId, row: u32, col: usize) -> Result<&[u8], FormatError> {
        self.blobs.get(self.value(table, row, col)?)
    }

    fn assembly_refs(&self) -> Result<Vec<AssemblyReference>, FormatError> {
        (1..=self.rows(TableId::AssemblyRef))
            .map(|row| {
                Ok(AssemblyReference {
                    name: self.string(TableId::AssemblyRef, row, 6)?,
                })
            })
            .collect()
    }

    fn type_refs(&self) -> Result<Vec<TypeReference>, FormatError> {
        let mut refs = Vec::new();
        for row in 1..=self.rows(TableId::TypeRef) {
            let raw = self.value(TableId::TypeRef, row, 0)?;
            let scope = match Coded::ResolutionScope.decode(raw)? {
                (_, 0) => ResolutionScope::Unknown,
                (TableId::Module, _) => ResolutionScope::Module,
                (TableId::ModuleRef, r) => ResolutionScope::ModuleRef(r - 1),
                (TableId::AssemblyRef, r) => ResolutionScope::AssemblyRef(r - 1),
                (TableId::TypeRef, r) => ResolutionScope::TypeRef(r - 1),
                _ => ResolutionScope::Unknown,
            };
            refs.push(TypeReference {
                scope,
                name: self.string(TableId::TypeRef, row, 1)?,
                namespace: self.string(TableId::TypeRef, row, 2)?,
            });
        }
        Ok(refs)
    }

    fn type_specs(&self) -> Result<Vec<Option<TypeSig>>, FormatError> {
        let mut specs = Vec::new();
        for row in 1..=self.rows(TableId::TypeSpec) {
            let blob = self.blob(TableId::TypeSpec, row, 0)?;
            match decode_type_spec(blob) {
                Ok(sig) => specs.push(Some(sig)),
                Err(e) => {
                    tracing::debug!(row, error = %e, "undecodable TypeSpec");
                    specs.push(None);
                }
            }
        }
        Ok(specs)
    }

    fn exported_types(&self) -> Result<Vec<ExportedTypeDef>, FormatError> {
        let mut exported = Vec::new();
        for row in 1..=self.rows(TableId::ExportedType) {
            let raw = self.value(TableId::ExportedType, row, 4)?;
            let implementation = match Coded::Implementation.decode(raw)? {
                (TableId::File, r) => Implementation::File(r.saturating_sub(1)),
                (TableId::AssemblyRef, r) if r > 0 => Implementation::AssemblyRef(r - 1),
                (TableId::ExportedType, r) if r > 0 => Implementation::ExportedType(r - 1),
                (table, r) => {
                    return Err(FormatError::new(format!(
                        "ExportedType {} has invalid implementation {:?} row {}",
                        row, table, r
                    )))
                }
            };
            exported.push(ExportedTypeDef {
                name: self.string(TableId::ExportedType, row, 2)?,
                namespace: self.string(TableId::ExportedType, row, 3)?,
                implementation,
            });
        }
        Ok(exported)
    }

    /// Resolve a list-column range `[start, end)` through an optional
    /// pointer table into target rows.
    fn list_rows(
        &self,
        start: u32,
        end: u32,
        ptr: TableId,
        target: TableId,
    ) -> Result<Vec<u32>, FormatError> {
        let limit = if self.rows(ptr) > 0 {
            self.rows(ptr)
        } else {
            self.rows(target)
        };
        let end = end.min(limit + 1);
        let mut rows = Vec::new();
        for i in start.max(1)..end {
            if self.rows(ptr) > 0 {
                rows.push(self.value(ptr, i, 0)?);
            } else {
                rows.push(i);
            }
        }
        Ok(rows)
    }

    fn list_end(
        &self,
        table: TableId,
        row: u32,
        col: usize,
        ptr: TableId,
        target: TableId,
    ) -> Result<u32, FormatError> {
        if row < self.rows(table) {
            self.value(table, row + 1, col)
        } else if self.rows(ptr) > 0 {
            Ok(self.rows(ptr) + 1)
        } else {
            Ok(self.rows(target) + 1)
        }
    }

    fn type_defs(
        &self,
        method_owner: &mut HashMap<u32, (usize, usize)>,
    ) -> Result<Vec<TypeDef>, FormatError> {
        let mut types = Vec::new();
        for row in 1..=self.rows(TableId::TypeDef) {
            let extends = match self.value(TableId::TypeDef, row, 3)? {
                0 => None,
                raw => match Coded::TypeDefOrRef.decode(raw)? {
                    (_, 0) => None,
                    (TableId::TypeDef, r) => Some(TypeHandle::Def(r - 1)),
                    (TableId::TypeRef, r) => Some(TypeHandle::Ref(r - 1)),
                    (_, r) => Some(TypeHandle::Spec(r - 1)),
                },
            };

            let start = self.value(TableId::TypeDef, row, 5)?;
            let end = self.list_end(
                TableId::TypeDef,
                row,
                5,
                TableId::MethodPtr,
                TableId::MethodDef,
            )?;
            let mut methods = Vec::new();
            for method_row in
                self.list_rows(start, end, TableId::MethodPtr, TableId::MethodDef)?
            {
                method_owner.insert(method_row, (types.len(), methods.len()));
                methods.push(self.method_def(method_row)?);
            }

            types.push(TypeDef {
                flags: TypeAttributes(self.value(TableId::TypeDef, row, 0)?),
                name: self.string(TableId::TypeDef, row, 1)?,
                namespace: self.string(TableId::TypeDef, row, 2)?,
                extends,
                enclosing: None,
                generic_params: Vec::new(),
                methods,
            });
        }
        Ok(types)
    }

    fn method_def(&self, row: u32) -> Result<MethodDef, FormatError> {
        let name = self.string(TableId::MethodDef, row, 3)?;
        let signature = match decode_method_sig(self.blob(TableId::MethodDef, row, 4)?) {
            Ok(sig) => Some(sig),
            Err(e) => {
                tracing::debug!(method = %name, error = %e, "undecodable method signature");
                None
            }
        };

        let start = self.value(TableId::MethodDef, row, 5)?;
        let end = self.list_end(TableId::MethodDef, row, 5, TableId::ParamPtr, TableId::Param)?;
        let mut params = Vec::new();
        for param_row in self.list_rows(start, end, TableId::ParamPtr, TableId::Param)? {
            params.push(ParamDef {
                sequence: self.value(TableId::Param, param_row, 1)? as u16,
                name: self.string(TableId::Param, param_row, 2)?,
            });
        }

        Ok(MethodDef {
            name,
            flags: MethodAttributes(self.value(TableId::MethodDef, row, 2)? as u16),
            signature,
            params,
            generic_params: Vec::new(),
        })
    }

    fn apply_nesting(&self, types: &mut [TypeDef]) -> Result<(), FormatError> {
        for row in 1..=self.rows(TableId::NestedClass) {
            let nested = self.value(TableId::NestedClass, row, 0)?;
            let enclosing = self.value(TableId::NestedClass, row, 1)?;
            if nested == 0 || enclosing == 0 || enclosing as usize > types.len() {
                return Err(FormatError::new(format!("NestedClass row {} out of range", row)));
            }
            let ty = types
                .get_mut(nested as usize - 1)
                .ok_or_else(|| FormatError::new(format!("NestedClass row {} out of range", row)))?;
            ty.enclosing = Some(enclosing - 1);
        }
        Ok(())
    }

    fn apply_generic_params(
        &self,
        types: &mut [TypeDef],
        method_owner: &HashMap<u32, (usize, usize)>,
    ) -> Result<(), FormatError> {
        for row in 1..=self.rows(TableId::GenericParam) {
            let param = GenericParamDef {
                number: self.value(TableId::GenericParam, row, 0)? as u16,
                name: self.string(TableId::GenericParam, row, 3)?,
            };
            let owner = self.value(TableId::GenericParam, row, 2)?;
            match Coded::TypeOrMethodDef.decode(owner)? {
                (TableId::TypeDef, r) if r > 0 => {
                    if let Some(ty) = types.get_mut(r as usize - 1) {
                        ty.generic_params.push(param);
                    }
                }
                (TableId::MethodDef, r) => {
                    if let Some((t, m)) = method_owner.get(&r) {
                        types[*t].methods[*m].generic_params.push(param);
                    }
                }
                _ => {}
            }
        }
        for ty in types.iter_mut() {
            ty.generic_params.sort_by_key(|p| p.number);
            for method in &mut ty.methods {
                method.generic_params.sort_by_key(|p| p.number);
            }
        }
        Ok(())
    }
}
