//! Signature blobs (ECMA-335 II.23.2).
//!
//! Only the shapes that appear in method and type-spec signatures are
//! decoded. Type references stay as [`TypeHandle`]s; naming them is the job
//! of [`crate::names`], which has the assembly at hand.

use super::bytes::ByteReader;
use super::model::TypeHandle;
use crate::error::{FormatError, SignatureError};

const MAX_DEPTH: usize = 64;

const ELEMENT_VOID: u8 = 0x01;
const ELEMENT_BOOLEAN: u8 = 0x02;
const ELEMENT_CHAR: u8 = 0x03;
const ELEMENT_I1: u8 = 0x04;
const ELEMENT_U1: u8 = 0x05;
const ELEMENT_I2: u8 = 0x06;
const ELEMENT_U2: u8 = 0x07;
const ELEMENT_I4: u8 = 0x08;
const ELEMENT_U4: u8 = 0x09;
const ELEMENT_I8: u8 = 0x0A;
const ELEMENT_U8: u8 = 0x0B;
const ELEMENT_R4: u8 = 0x0C;
const ELEMENT_R8: u8 = 0x0D;
const ELEMENT_STRING: u8 = 0x0E;
const ELEMENT_PTR: u8 = 0x0F;
const ELEMENT_BYREF: u8 = 0x10;
const ELEMENT_VALUETYPE: u8 = 0x11;
const ELEMENT_CLASS: u8 = 0x12;
const ELEMENT_VAR: u8 = 0x13;
const ELEMENT_ARRAY: u8 = 0x14;
const ELEMENT_GENERICINST: u8 = 0x15;
const ELEMENT_TYPEDBYREF: u8 = 0x16;
const ELEMENT_I: u8 = 0x18;
const ELEMENT_U: u8 = 0x19;
const ELEMENT_FNPTR: u8 = 0x1B;
const ELEMENT_OBJECT: u8 = 0x1C;
const ELEMENT_SZARRAY: u8 = 0x1D;
const ELEMENT_MVAR: u8 = 0x1E;
const ELEMENT_CMOD_REQD: u8 = 0x1F;
const ELEMENT_CMOD_OPT: u8 = 0x20;
const ELEMENT_SENTINEL: u8 = 0x41;
const ELEMENT_PINNED: u8 = 0x45;

const CALLCONV_GENERIC: u8 = 0x10;
const CALLCONV_HASTHIS: u8 = 0x20;
const CALLCONV_KIND_MASK: u8 = 0x0F;
const CALLCONV_VARARG: u8 = 0x05;

/// Built-in element types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    Void,
    Boolean,
    Char,
    SByte,
    Byte,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Single,
    Double,
    String,
    Object,
    IntPtr,
    UIntPtr,
    TypedReference,
}

impl Primitive {
    /// C# keyword used in rendered signatures.
    pub fn keyword(self) -> &'static str {
        match self {
            Primitive::Void => "void",
            Primitive::Boolean => "bool",
            Primitive::Char => "char",
            Primitive::SByte => "sbyte",
            Primitive::Byte => "byte",
            Primitive::Int16 => "short",
            Primitive::UInt16 => "ushort",
            Primitive::Int32 => "int",
            Primitive::UInt32 => "uint",
            Primitive::Int64 => "long",
            Primitive::UInt64 => "ulong",
            Primitive::Single => "float",
            Primitive::Double => "double",
            Primitive::String => "string",
            Primitive::Object => "object",
            Primitive::IntPtr => "nint",
            Primitive::UIntPtr => "nuint",
            Primitive::TypedReference => "TypedReference",
        }
    }

    pub fn full_name(self) -> &'static str {
        match self {
            Primitive::Void => "System.Void",
            Primitive::Boolean => "System.Boolean",
            Primitive::Char => "System.Char",
            Primitive::SByte => "System.SByte",
            Primitive::Byte => "System.Byte",
            Primitive::Int16 => "System.Int16",
            Primitive::UInt16 => "System.UInt16",
            Primitive::Int32 => "System.Int32",
            Primitive::UInt32 => "System.UInt32",
            Primitive::Int64 => "System.Int64",
            Primitive::UInt64 => "System.UInt64",
            Primitive::Single => "System.Single",
            Primitive::Double => "System.Double",
            Primitive::String => "System.String",
            Primitive::Object => "System.Object",
            Primitive::IntPtr => "System.IntPtr",
            Primitive::UIntPtr => "System.UIntPtr",
            Primitive::TypedReference => "System.TypedReference",
        }
    }

    fn from_element(element: u8) -> Option<Self> {
        Some(match element {
            ELEMENT_VOID => Primitive::Void,
            ELEMENT_BOOLEAN => Primitive::Boolean,
            ELEMENT_CHAR => Primitive::Char,
            ELEMENT_I1 => Primitive::SByte,
            ELEMENT_U1 => Primitive::Byte,
            ELEMENT_I2 => Primitive::Int16,
            ELEMENT_U2 => Primitive::UInt16,
            ELEMENT_I4 => Primitive::Int32,
            ELEMENT_U4 => Primitive::UInt32,
            ELEMENT_I8 => Primitive::Int64,
            ELEMENT_U8 => Primitive::UInt64,
            ELEMENT_R4 => Primitive::Single,
            ELEMENT_R8 => Primitive::Double,
            ELEMENT_STRING => Primitive::String,
            ELEMENT_OBJECT => Primitive::Object,
            ELEMENT_I => Primitive::IntPtr,
            ELEMENT_U => Primitive::UIntPtr,
            ELEMENT_TYPEDBYREF => Primitive::TypedReference,
            _ => return None,
        })
    }
}

/// A decoded type in a signature.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeSig {
    Primitive(Primitive),
    Class(TypeHandle),
    ValueType(TypeHandle),
    GenericInst { base: TypeHandle, args: Vec<TypeSig> },
    /// Type generic parameter by position.
    Var(u32),
    /// Method generic parameter by position.
    MVar(u32),
    SzArray(Box<TypeSig>),
    Array { element: Box<TypeSig>, rank: u32 },
    ByRef(Box<TypeSig>),
    Ptr(Box<TypeSig>),
    FnPtr(Box<MethodSig>),
    Modified {
        required: bool,
        modifier: TypeHandle,
        inner: Box<TypeSig>,
    },
}

/// A decoded method signature.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodSig {
    pub has_this: bool,
    pub generic_param_count: u32,
    pub return_type: TypeSig,
    pub params: Vec<TypeSig>,
}

pub fn decode_method_sig(blob: &[u8]) -> Result<MethodSig, SignatureError> {
    let mut r = ByteReader::new(blob);
    read_method_sig(&mut r, 0)
}

/// A `TypeSpec` blob is a single type.
pub fn decode_type_spec(blob: &[u8]) -> Result<TypeSig, SignatureError> {
    let mut r = ByteReader::new(blob);
    read_type(&mut r, 0)
}

fn read_method_sig(r: &mut ByteReader<'_>, depth: usize) -> Result<MethodSig, SignatureError> {
    let conv = r.u8()?;
    let kind = conv & CALLCONV_KIND_MASK;
    if kind > CALLCONV_VARARG {
        return Err(SignatureError::CallingConvention(conv));
    }
    let generic_param_count = if conv & CALLCONV_GENERIC != 0 {
        r.compressed_u32()?
    } else {
        0
    };
    let param_count = r.compressed_u32()?;
    let return_type = read_type(r, depth + 1)?;
    let mut params = Vec::with_capacity(param_count.min(256) as usize);
    while params.len() < param_count as usize {
        if peek(r)? == ELEMENT_SENTINEL {
            r.skip(1)?;
            continue;
        }
        params.push(read_type(r, depth + 1)?);
    }
    Ok(MethodSig {
        has_this: conv & CALLCONV_HASTHIS != 0,
        generic_param_count,
        return_type,
        params,
    })
}

fn read_type(r: &mut ByteReader<'_>, depth: usize) -> Result<TypeSig, SignatureError> {
    if depth > MAX_DEPTH {
        return Err(SignatureError::TooDeep(MAX_DEPTH));
    }
    let element = r.u8()?;
    if let Some(primitive) = Primitive::from_element(element) {
        return Ok(TypeSig::Primitive(primitive));
    }
    let sig = match element {
        ELEMENT_CLASS => TypeSig::Class(read_type_handle(r)?),
        ELEMENT_VALUETYPE => TypeSig::ValueType(read_type_handle(r)?),
        ELEMENT_VAR => TypeSig::Var(r.compressed_u32()?),
        ELEMENT_MVAR => TypeSig::MVar(r.compressed_u32()?),
        ELEMENT_SZARRAY => TypeSig::SzArray(Box::new(read_type(r, depth + 1)?)),
        ELEMENT_PTR => TypeSig::Ptr(Box::new(read_type(r, depth + 1)?)),
        ELEMENT_BYREF => TypeSig::ByRef(Box::new(read_type(r, depth + 1)?)),
        ELEMENT_PINNED => read_type(r, depth + 1)?,
        ELEMENT_ARRAY => {
            let element = read_type(r, depth + 1)?;
            let rank = r.compressed_u32()?;
            let sizes = r.compressed_u32()?;
            for _ in 0..sizes {
                r.compressed_u32()?;
            }
            let bounds = r.compressed_u32()?;
            for _ in 0..bounds {
                r.compressed_u32()?;
            }
            TypeSig::Array {
                element: Box::new(element),
                rank,
            }
        }
        ELEMENT_GENERICINST => {
            let kind = r.u8()?;
            if kind != ELEMENT_CLASS && kind != ELEMENT_VALUETYPE {
                return Err(SignatureError::UnknownElement(kind));
            }
            let base = read_type_handle(r)?;
            let count = r.compressed_u32()?;
            let mut args = Vec::with_capacity(count.min(64) as usize);
            for _ in 0..count {
                args.push(read_type(r, depth + 1)?);
            }
            TypeSig::GenericInst { base, args }
        }
        ELEMENT_FNPTR => TypeSig::FnPtr(Box::new(read_method_sig(r, depth + 1)?)),
        ELEMENT_CMOD_REQD | ELEMENT_CMOD_OPT => {
            let modifier = read_type_handle(r)?;
            let inner = read_type(r, depth + 1)?;
            TypeSig::Modified {
                required: element == ELEMENT_CMOD_REQD,
                modifier,
                inner: Box::new(inner),
            }
        }
        other => return Err(SignatureError::UnknownElement(other)),
    };
    Ok(sig)
}

/// TypeDefOrRefOrSpecEncoded (II.23.2.8).
fn read_type_handle(r: &mut ByteReader<'_>) -> Result<TypeHandle, SignatureError> {
    let raw = r.compressed_u32()?;
    let row = raw >> 2;
    if row == 0 {
        return Err(FormatError::new("null type reference in signature").into());
    }
    match raw & 0x3 {
        0 => Ok(TypeHandle::Def(row - 1)),
        1 => Ok(TypeHandle::Ref(row - 1)),
        2 => Ok(TypeHandle::Spec(row - 1)),
        tag => Err(FormatError::new(format!("invalid TypeDefOrRef tag {}", tag)).into()),
    }
}

fn peek(r: &ByteReader<'_>) -> Result<u8, SignatureError> {
    let mut probe = r.clone();
    Ok(probe.u8()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_generic_instance_method() {
        // instance !!0 Get<1>(!!0, int32)
        let blob = [0x30, 0x01, 0x02, 0x1E, 0x00, 0x1E, 0x00, 0x08];
        let sig = decode_method_sig(&blob).unwrap();
        assert!(sig.has_this);
        assert_eq!(sig.generic_param_count, 1);
        assert_eq!(sig.return_type, TypeSig::MVar(0));
        assert_eq!(
            sig.params,
            vec![TypeSig::MVar(0), TypeSig::Primitive(Primitive::Int32)]
        );
    }

    #[test]
    fn decodes_nested_shapes() {
        // static void M(class TypeRef#2<string>[], int32[,]&, valuetype TypeDef#1*)
        let blob = [
            0x00, 0x03, 0x01, // default, 3 params, void
            0x1D, 0x15, 0x12, 0x09, 0x01, 0x0E, // szarray genericinst class TypeRef row 2
            0x10, 0x14, 0x08, 0x02, 0x00, 0x00, // byref array int32 rank 2
            0x0F, 0x11, 0x04, // ptr valuetype TypeDef row 1
        ];
        let sig = decode_method_sig(&blob).unwrap();
        assert!(!sig.has_this);
        assert_eq!(
            sig.params[0],
            TypeSig::SzArray(Box::new(TypeSig::GenericInst {
                base: TypeHandle::Ref(1),
                args: vec![TypeSig::Primitive(Primitive::String)],
            }))
        );
        assert_eq!(
            sig.params[1],
            TypeSig::ByRef(Box::new(TypeSig::Array {
                element: Box::new(TypeSig::Primitive(Primitive::Int32)),
                rank: 2,
            }))
        );
        assert_eq!(
            sig.params[2],
            TypeSig::Ptr(Box::new(TypeSig::ValueType(TypeHandle::Def(0))))
        );
    }

    #[test]
    fn custom_modifiers_are_kept() {
        // void M(modopt(TypeRef#1) int32)
        let blob = [0x00, 0x01, 0x01, 0x20, 0x05, 0x08];
        let sig = decode_method_sig(&blob).unwrap();
        assert_eq!(
            sig.params[0],
            TypeSig::Modified {
                required: false,
                modifier: TypeHandle::Ref(0),
                inner: Box::new(TypeSig::Primitive(Primitive::Int32)),
            }
        );
    }

    #[test]
    fn rejects_malformed_signatures() {
        assert!(matches!(
            decode_method_sig(&[0x00, 0x01, 0x01, 0x99]),
            Err(SignatureError::UnknownElement(0x99))
        ));
        assert!(decode_method_sig(&[0x00, 0x02, 0x01, 0x08]).is_err());
        assert!(matches!(
            decode_method_sig(&[0x06, 0x08]),
            Err(SignatureError::CallingConvention(0x06))
        ));

        let mut deep = vec![0x00, 0x01, 0x01];
        deep.extend(std::iter::repeat(0x1D).take(100));
        deep.push(0x08);
        assert!(matches!(
            decode_method_sig(&deep),
            Err(SignatureError::TooDeep(_))
        ));
    }
}
