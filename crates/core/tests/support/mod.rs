//! A minimal PE32 / CLI metadata writer for tests.
//!
//! Produces a single-section image holding a CLI header and a metadata root
//! with `#~`, `#Strings` and `#Blob` streams. Only the tables the reader
//! consumes are emitted; every heap and table index is two bytes wide.

#![allow(dead_code)]

use std::collections::HashMap;

pub const PUBLIC: u32 = 0x1;
pub const NESTED_PUBLIC: u32 = 0x2;
pub const NESTED_PRIVATE: u32 = 0x3;
pub const INTERFACE: u32 = 0x20 | 0x80;
pub const SEALED: u32 = 0x100;

pub const M_PUBLIC: u16 = 0x6;
pub const M_PRIVATE: u16 = 0x1;
pub const M_STATIC: u16 = 0x10;
pub const M_VIRTUAL_ABSTRACT: u16 = 0x40 | 0x400;
pub const M_SPECIAL_NAME: u16 = 0x800;

/// A type token usable in `extends` columns and signatures.
#[derive(Debug, Clone, Copy)]
pub enum Tok {
    Def(u32),
    Ref(u32),
}

impl Tok {
    fn coded(self) -> u32 {
        match self {
            Tok::Def(row) => row << 2,
            Tok::Ref(row) => (row << 2) | 1,
        }
    }
}

/// Signature blob fragments.
pub mod sig {
    use super::Tok;

    pub const VOID: &[u8] = &[0x01];
    pub const BOOL: &[u8] = &[0x02];
    pub const I4: &[u8] = &[0x08];
    pub const R8: &[u8] = &[0x0D];
    pub const STRING: &[u8] = &[0x0E];
    pub const OBJECT: &[u8] = &[0x1C];

    pub fn compressed(value: u32) -> Vec<u8> {
        if value < 0x80 {
            vec![value as u8]
        } else if value < 0x4000 {
            vec![0x80 | (value >> 8) as u8, value as u8]
        } else {
            vec![
                0xC0 | (value >> 24) as u8,
                (value >> 16) as u8,
                (value >> 8) as u8,
                value as u8,
            ]
        }
    }

    pub fn class(tok: Tok) -> Vec<u8> {
        let mut out = vec![0x12];
        out.extend(compressed(tok.coded()));
        out
    }

    pub fn value_type(tok: Tok) -> Vec<u8> {
        let mut out = vec![0x11];
        out.extend(compressed(tok.coded()));
        out
    }

    pub fn var(n: u32) -> Vec<u8> {
        let mut out = vec![0x13];
        out.extend(compressed(n));
        out
    }

    pub fn mvar(n: u32) -> Vec<u8> {
        let mut out = vec![0x1E];
        out.extend(compressed(n));
        out
    }

    pub fn szarray(inner: &[u8]) -> Vec<u8> {
        let mut out = vec![0x1D];
        out.extend_from_slice(inner);
        out
    }

    pub fn by_ref(inner: &[u8]) -> Vec<u8> {
        let mut out = vec![0x10];
        out.extend_from_slice(inner);
        out
    }

    pub fn generic_inst(base: Tok, args: &[Vec<u8>]) -> Vec<u8> {
        let mut out = vec![0x15, 0x12];
        out.extend(compressed(base.coded()));
        out.extend(compressed(args.len() as u32));
        for arg in args {
            out.extend_from_slice(arg);
        }
        out
    }

    pub fn method(has_this: bool, generic: u32, ret: &[u8], params: &[Vec<u8>]) -> Vec<u8> {
        let mut conv = if has_this { 0x20 } else { 0x00 };
        if generic > 0 {
            conv |= 0x10;
        }
        let mut out = vec![conv];
        if generic > 0 {
            out.extend(compressed(generic));
        }
        out.extend(compressed(params.len() as u32));
        out.extend_from_slice(ret);
        for p in params {
            out.extend_from_slice(p);
        }
        out
    }
}

struct MethodSpec {
    name: String,
    flags: u16,
    signature: Vec<u8>,
    params: Vec<String>,
    generic_params: Vec<String>,
}

struct TypeSpecRow {
    namespace: String,
    name: String,
    flags: u32,
    extends: Option<Tok>,
    methods: Vec<MethodSpec>,
    generic_params: Vec<String>,
}

pub struct AssemblyBuilder {
    name: Option<String>,
    assembly_refs: Vec<String>,
    type_refs: Vec<(u32, String, String)>,
    types: Vec<TypeSpecRow>,
    nested: Vec<(u32, u32)>,
}

impl AssemblyBuilder {
    pub fn new(name: &str) -> Self {
        let mut builder = AssemblyBuilder {
            name: Some(name.to_string()),
            assembly_refs: Vec::new(),
            type_refs: Vec::new(),
            types: Vec::new(),
            nested: Vec::new(),
        };
        builder.type_def("", "<Module>", 0, None);
        builder
    }

    /// An image without an `Assembly` row.
    pub fn module_only() -> Self {
        let mut builder = AssemblyBuilder::new("");
        builder.name = None;
        builder
    }

    /// Returns the 1-based AssemblyRef row.
    pub fn assembly_ref(&mut self, name: &str) -> u32 {
        self.assembly_refs.push(name.to_string());
        self.assembly_refs.len() as u32
    }

    pub fn type_ref(&mut self, assembly_ref: u32, namespace: &str, name: &str) -> Tok {
        self.type_refs
            .push((assembly_ref, namespace.to_string(), name.to_string()));
        Tok::Ref(self.type_refs.len() as u32)
    }

    /// Returns the 1-based TypeDef row.
    pub fn type_def(&mut self, namespace: &str, name: &str, flags: u32, extends: Option<Tok>) -> u32 {
        self.types.push(TypeSpecRow {
            namespace: namespace.to_string(),
            name: name.to_string(),
            flags,
            extends,
            methods: Vec::new(),
            generic_params: Vec::new(),
        });
        self.types.len() as u32
    }

    pub fn nest(&mut self, inner: u32, outer: u32) {
        self.nested.push((inner, outer));
    }

    pub fn type_generic_param(&mut self, ty: u32, name: &str) {
        self.types[ty as usize - 1].generic_params.push(name.to_string());
    }

    pub fn method(&mut self, ty: u32, name: &str, flags: u16, signature: Vec<u8>, params: &[&str]) {
        self.method_generic(ty, name, flags, signature, params, &[]);
    }

    pub fn method_generic(
        &mut self,
        ty: u32,
        name: &str,
        flags: u16,
        signature: Vec<u8>,
        params: &[&str],
        generic_params: &[&str],
    ) {
        self.types[ty as usize - 1].methods.push(MethodSpec {
            name: name.to_string(),
            flags,
            signature,
            params: params.iter().map(|p| p.to_string()).collect(),
            generic_params: generic_params.iter().map(|p| p.to_string()).collect(),
        });
    }

    pub fn build(&self) -> Vec<u8> {
        let metadata = self.metadata();
        pe_image(&metadata)
    }

    fn metadata(&self) -> Vec<u8> {
        let mut strings = Strings::default();
        let mut blobs = Blobs::default();

        let mut rows: HashMap<u8, (u32, Vec<u8>)> = HashMap::new();
        let mut table = |id: u8, row: Vec<u8>| {
            let entry = rows.entry(id).or_insert((0, Vec::new()));
            entry.0 += 1;
            entry.1.extend(row);
        };

        // Module
        let mut module = Vec::new();
        push16(&mut module, 0);
        push16(&mut module, strings.add("test.dll"));
        push16(&mut module, 0);
        push16(&mut module, 0);
        push16(&mut module, 0);
        table(0x00, module);

        // TypeRef
        for (assembly_ref, namespace, name) in &self.type_refs {
            let mut row = Vec::new();
            push16(&mut row, (assembly_ref << 2) | 2);
            push16(&mut row, strings.add(name));
            push16(&mut row, strings.add(namespace));
            table(0x01, row);
        }

        // TypeDef, MethodDef, Param, GenericParam
        let mut method_rows = Vec::new();
        let mut param_rows = Vec::new();
        let mut generic_rows: Vec<(u16, u32, String)> = Vec::new();
        let mut next_method = 1u32;
        let mut next_param = 1u32;
        for (i, ty) in self.types.iter().enumerate() {
            let mut row = Vec::new();
            push32(&mut row, ty.flags);
            push16(&mut row, strings.add(&ty.name));
            push16(&mut row, strings.add(&ty.namespace));
            push16(&mut row, ty.extends.map(Tok::coded).unwrap_or(0));
            push16(&mut row, 1);
            push16(&mut row, next_method);
            table(0x02, row);

            for (n, name) in ty.generic_params.iter().enumerate() {
                generic_rows.push((n as u16, ((i as u32 + 1) << 1), name.clone()));
            }

            for method in &ty.methods {
                let mut row = Vec::new();
                push32(&mut row, 0);
                push16(&mut row, 0);
                push16(&mut row, u32::from(method.flags));
                push16(&mut row, strings.add(&method.name));
                push16(&mut row, blobs.add(&method.signature));
                push16(&mut row, next_param);
                method_rows.push(row);

                for (n, name) in method.generic_params.iter().enumerate() {
                    generic_rows.push((n as u16, (next_method << 1) | 1, name.clone()));
                }
                for (seq, name) in method.params.iter().enumerate() {
                    let mut row = Vec::new();
                    push16(&mut row, 0);
                    push16(&mut row, seq as u32 + 1);
                    push16(&mut row, strings.add(name));
                    param_rows.push(row);
                    next_param += 1;
                }
                next_method += 1;
            }
        }
        for row in method_rows {
            table(0x06, row);
        }
        for row in param_rows {
            table(0x08, row);
        }

        // Assembly
        if let Some(name) = &self.name {
            let mut row = Vec::new();
            push32(&mut row, 0x8004);
            for v in [1, 0, 0, 0] {
                push16(&mut row, v);
            }
            push32(&mut row, 0);
            push16(&mut row, 0);
            push16(&mut row, strings.add(name));
            push16(&mut row, 0);
            table(0x20, row);
        }

        // AssemblyRef
        for name in &self.assembly_refs {
            let mut row = Vec::new();
            for v in [4, 0, 0, 0] {
                push16(&mut row, v);
            }
            push32(&mut row, 0);
            push16(&mut row, 0);
            push16(&mut row, strings.add(name));
            push16(&mut row, 0);
            push16(&mut row, 0);
            table(0x23, row);
        }

        // NestedClass
        for (inner, outer) in &self.nested {
            let mut row = Vec::new();
            push16(&mut row, *inner);
            push16(&mut row, *outer);
            table(0x29, row);
        }

        // GenericParam
        for (number, owner, name) in &generic_rows {
            let mut row = Vec::new();
            push16(&mut row, u32::from(*number));
            push16(&mut row, 0);
            push16(&mut row, *owner);
            push16(&mut row, strings.add(name));
            table(0x2A, row);
        }

        let mut ids: Vec<u8> = rows.keys().copied().collect();
        ids.sort_unstable();
        let mut tables = Vec::new();
        push32(&mut tables, 0);
        tables.extend([2, 0, 0, 1]);
        let valid = ids.iter().fold(0u64, |acc, id| acc | (1u64 << id));
        tables.extend(valid.to_le_bytes());
        tables.extend(0u64.to_le_bytes());
        for id in &ids {
            push32(&mut tables, rows[id].0);
        }
        for id in &ids {
            tables.extend(&rows[id].1);
        }

        metadata_root(&[
            ("#~", pad4(tables)),
            ("#Strings", pad4(strings.data)),
            ("#Blob", pad4(blobs.data)),
        ])
    }
}

#[derive(Debug)]
struct Strings {
    data: Vec<u8>,
    offsets: HashMap<String, u32>,
}

impl Default for Strings {
    fn default() -> Self {
        Strings {
            data: vec![0],
            offsets: HashMap::new(),
        }
    }
}

impl Strings {
    fn add(&mut self, s: &str) -> u32 {
        if s.is_empty() {
            return 0;
        }
        if let Some(offset) = self.offsets.get(s) {
            return *offset;
        }
        let offset = self.data.len() as u32;
        self.data.extend(s.as_bytes());
        self.data.push(0);
        self.offsets.insert(s.to_string(), offset);
        offset
    }
}

#[derive(Debug)]
struct Blobs {
    data: Vec<u8>,
}

impl Default for Blobs {
    fn default() -> Self {
        Blobs { data: vec![0] }
    }
}

impl Blobs {
    fn add(&mut self, blob: &[u8]) -> u32 {
        let offset = self.data.len() as u32;
        self.data.extend(sig::compressed(blob.len() as u32));
        self.data.extend_from_slice(blob);
        offset
    }
}

fn push16(out: &mut Vec<u8>, v: u32) {
    out.extend((v as u16).to_le_bytes());
}

fn push32(out: &mut Vec<u8>, v: u32) {
    out.extend(v.to_le_bytes());
}

fn pad4(mut data: Vec<u8>) -> Vec<u8> {
    while data.len() % 4 != 0 {
        data.push(0);
    }
    data
}

fn metadata_root(streams: &[(&str, Vec<u8>)]) -> Vec<u8> {
    let version = b"v4.0.30319\0\0";
    let mut header = Vec::new();
    push32(&mut header, 0x424A_5342);
    push16(&mut header, 1);
    push16(&mut header, 1);
    push32(&mut header, 0);
    push32(&mut header, version.len() as u32);
    header.extend(version);
    push16(&mut header, 0);
    push16(&mut header, streams.len() as u32);

    let headers_len: usize = streams
        .iter()
        .map(|(name, _)| 8 + (name.len() + 1 + 3) / 4 * 4)
        .sum();
    let mut offset = header.len() + headers_len;
    let mut bodies = Vec::new();
    for (name, body) in streams {
        push32(&mut header, offset as u32);
        push32(&mut header, body.len() as u32);
        let mut raw = name.as_bytes().to_vec();
        raw.push(0);
        header.extend(pad4(raw));
        offset += body.len();
        bodies.extend_from_slice(body);
    }
    header.extend(bodies);
    header
}

const FILE_ALIGNMENT: usize = 0x200;
const SECTION_RVA: u32 = 0x2000;
const CLI_HEADER_SIZE: u32 = 72;

/// Wrap a metadata root in a PE32 DLL with a single `.text` section.
pub fn pe_image(metadata: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    push32(&mut body, CLI_HEADER_SIZE);
    push16(&mut body, 2);
    push16(&mut body, 5);
    push32(&mut body, SECTION_RVA + CLI_HEADER_SIZE);
    push32(&mut body, metadata.len() as u32);
    push32(&mut body, 1); // ILONLY
    push32(&mut body, 0);
    body.extend([0u8; 48]);
    body.extend_from_slice(metadata);
    let virtual_size = body.len() as u32;
    let raw_size = (body.len() + FILE_ALIGNMENT - 1) / FILE_ALIGNMENT * FILE_ALIGNMENT;

    let mut image = vec![0u8; 0x80];
    image[0] = b'M';
    image[1] = b'Z';
    image[0x3C..0x40].copy_from_slice(&0x80u32.to_le_bytes());

    // NT signature and COFF header.
    image.extend(b"PE\0\0");
    push16(&mut image, 0x014C);
    push16(&mut image, 1);
    push32(&mut image, 0);
    push32(&mut image, 0);
    push32(&mut image, 0);
    push16(&mut image, 0xE0);
    push16(&mut image, 0x2102);

    // Optional header, PE32.
    push16(&mut image, 0x010B);
    image.extend([8, 0]);
    push32(&mut image, raw_size as u32);
    push32(&mut image, 0);
    push32(&mut image, 0);
    push32(&mut image, 0);
    push32(&mut image, SECTION_RVA);
    push32(&mut image, 0);
    push32(&mut image, 0x0040_0000);
    push32(&mut image, 0x2000);
    push32(&mut image, FILE_ALIGNMENT as u32);
    for v in [4, 0, 0, 0, 4, 0] {
        push16(&mut image, v);
    }
    push32(&mut image, 0);
    let image_size = SECTION_RVA + ((virtual_size + 0x1FFF) / 0x2000) * 0x2000;
    push32(&mut image, image_size);
    push32(&mut image, FILE_ALIGNMENT as u32);
    push32(&mut image, 0);
    push16(&mut image, 3);
    push16(&mut image, 0x8540);
    for v in [0x10_0000, 0x1000, 0x10_0000, 0x1000] {
        push32(&mut image, v);
    }
    push32(&mut image, 0);
    push32(&mut image, 16);
    for i in 0..16 {
        if i == 14 {
            push32(&mut image, SECTION_RVA);
            push32(&mut image, CLI_HEADER_SIZE);
        } else {
            push32(&mut image, 0);
            push32(&mut image, 0);
        }
    }

    // Section table.
    image.extend(b".text\0\0\0");
    push32(&mut image, virtual_size);
    push32(&mut image, SECTION_RVA);
    push32(&mut image, raw_size as u32);
    push32(&mut image, FILE_ALIGNMENT as u32);
    push32(&mut image, 0);
    push32(&mut image, 0);
    push16(&mut image, 0);
    push16(&mut image, 0);
    push32(&mut image, 0x6000_0020);

    image.resize(FILE_ALIGNMENT, 0);
    image.extend(&body);
    image.resize(FILE_ALIGNMENT + raw_size, 0);
    image
}
