//! ECMA-335 metadata reading.
//!
//! [`read_assembly`] turns a PE image into an owned [`Assembly`] model. The
//! layers below it are deliberately small: [`pe`] finds the metadata blob,
//! [`heaps`] and [`tables`] decode the streams, [`signature`] decodes blob
//! signatures. Everything above this module works on the model only.

pub mod bytes;
pub mod heaps;
pub mod model;
pub mod pe;
pub mod reader;
pub mod signature;
pub mod tables;

pub use model::{
    Assembly, AssemblyReference, ExportedTypeDef, GenericParamDef, Implementation, MethodAttributes,
    MethodDef, ParamDef, ResolutionScope, TypeAttributes, TypeDef, TypeHandle, TypeReference,
    TypeVisibility,
};
pub use reader::{parse_assembly, read_assembly};
pub use signature::{MethodSig, Primitive, TypeSig};
