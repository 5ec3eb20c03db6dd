//! Externally visible type enumeration.
//!
//! A type that cannot be loaded (its direct base type or an enclosing type
//! lives in an assembly that is not available) is reported in an
//! [`EnumerationOutcome::Partial`] and left out; the rest of the assembly
//! still enumerates. Only a structurally broken file is an error.

use crate::cancel::CancelToken;
use crate::context::{LoadOptions, MetadataContext, Resolution, ResolvedType};
use crate::error::{LoadError, ResolveError};
use crate::metadata::{read_assembly, Assembly, TypeHandle, TypeVisibility};
use std::path::PathBuf;
use std::rc::Rc;
use surface_interchange::{TypeKind, TypeRecord};

const MAX_BASE_DEPTH: usize = 64;

/// A type left out of an enumeration, with the reference that failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeLoadFailure {
    pub type_name: String,
    pub error: ResolveError,
}

/// Result of enumerating one assembly's externally visible types.
#[derive(Debug, Clone)]
pub enum EnumerationOutcome {
    Complete(Vec<ResolvedType>),
    Partial {
        loaded: Vec<ResolvedType>,
        failed: Vec<TypeLoadFailure>,
    },
}

impl EnumerationOutcome {
    pub fn loaded(&self) -> &[ResolvedType] {
        match self {
            EnumerationOutcome::Complete(loaded) => loaded,
            EnumerationOutcome::Partial { loaded, .. } => loaded,
        }
    }

    pub fn failed(&self) -> &[TypeLoadFailure] {
        match self {
            EnumerationOutcome::Complete(_) => &[],
            EnumerationOutcome::Partial { failed, .. } => failed,
        }
    }

    pub fn is_partial(&self) -> bool {
        matches!(self, EnumerationOutcome::Partial { .. })
    }

    /// Log the failures at debug level. Returns the loaded subset.
    pub fn log_and_take(self, assembly: &str) -> Vec<ResolvedType> {
        match self {
            EnumerationOutcome::Complete(loaded) => loaded,
            EnumerationOutcome::Partial { loaded, failed } => {
                tracing::debug!(
                    assembly = %assembly,
                    loaded = loaded.len(),
                    total = loaded.len() + failed.len(),
                    "partial type enumeration"
                );
                for failure in &failed {
                    tracing::debug!(
                        assembly = %assembly,
                        type_name = %failure.type_name,
                        error = %failure.error,
                        "type failed to load"
                    );
                }
                loaded
            }
        }
    }
}

/// Public, or nested-public all the way up to a public top-level type.
pub fn is_externally_visible(asm: &Assembly, index: u32) -> bool {
    let chain = asm.nesting_chain(index);
    let Some((outermost, nested)) = chain.split_first() else {
        return false;
    };
    let top_level_public = asm
        .type_def(*outermost)
        .map(|t| t.enclosing.is_none() && t.flags.visibility() == TypeVisibility::Public)
        .unwrap_or(false);
    top_level_public
        && nested.iter().all(|i| {
            asm.type_def(*i)
                .map(|t| t.flags.visibility() == TypeVisibility::NestedPublic)
                .unwrap_or(false)
        })
}

/// Enumerate the externally visible types of one inspected assembly.
pub fn enumerate_types(
    ctx: &MetadataContext,
    asm: &Rc<Assembly>,
    cancel: &CancelToken,
) -> Result<EnumerationOutcome, LoadError> {
    let mut loaded = Vec::new();
    let mut failed = Vec::new();

    for index in 0..asm.types.len() as u32 {
        if cancel.is_cancelled() {
            return Err(LoadError::Cancelled);
        }
        if !is_externally_visible(asm, index) {
            continue;
        }
        match check_loadable(ctx, asm, index) {
            Ok(()) => loaded.push(ResolvedType {
                assembly: Rc::clone(asm),
                index,
            }),
            Err(error) => failed.push(TypeLoadFailure {
                type_name: asm.full_type_name(index),
                error,
            }),
        }
    }

    if failed.is_empty() {
        Ok(EnumerationOutcome::Complete(loaded))
    } else {
        Ok(EnumerationOutcome::Partial { loaded, failed })
    }
}

/// A type loads when every type in its containment chain has a resolvable
/// direct base.
fn check_loadable(ctx: &MetadataContext, asm: &Rc<Assembly>, index: u32) -> Result<(), ResolveError> {
    for link in asm.nesting_chain(index) {
        if let Some(base) = asm.type_def(link).and_then(|t| t.extends) {
            ctx.resolve(asm, base)?;
        }
    }
    Ok(())
}

/// Classify a loaded type by walking its base chain.
pub fn classify(ctx: &MetadataContext, ty: &ResolvedType) -> TypeKind {
    let Some(def) = ty.assembly.type_def(ty.index) else {
        return TypeKind::Class;
    };
    if def.flags.is_interface() {
        return TypeKind::Interface;
    }
    // The root types themselves are classes.
    if def.namespace == "System" && (def.name == "ValueType" || def.name == "Enum") {
        return TypeKind::Class;
    }

    let mut current = ty.clone();
    for _ in 0..MAX_BASE_DEPTH {
        let Some(base) = current
            .assembly
            .type_def(current.index)
            .and_then(|t| t.extends)
        else {
            return TypeKind::Class;
        };
        match ctx.resolve(&current.assembly, base) {
            Ok(Resolution::Platform { namespace, name }) => {
                return root_kind(&namespace, &name).unwrap_or(TypeKind::Class);
            }
            Ok(Resolution::Type(next)) => {
                let (namespace, name) = match next.assembly.type_def(next.index) {
                    Some(t) => (t.namespace.as_str(), t.name.as_str()),
                    None => return TypeKind::Class,
                };
                if let Some(kind) = root_kind(namespace, name) {
                    return kind;
                }
                if namespace == "System" && name == "Object" {
                    return TypeKind::Class;
                }
                current = next;
            }
            Err(error) => {
                let kind = classify_from_own_metadata(ty);
                tracing::debug!(
                    type_name = %ty.full_name(),
                    error = %error,
                    kind = %kind,
                    "base chain unresolved, classified from own metadata"
                );
                return kind;
            }
        }
    }
    TypeKind::Class
}

fn root_kind(namespace: &str, name: &str) -> Option<TypeKind> {
    match (namespace, name) {
        ("System", "ValueType") => Some(TypeKind::Struct),
        ("System", "Enum") => Some(TypeKind::Enum),
        _ => None,
    }
}

/// Fallback classification: the interface flag, then the name of the
/// direct base reference.
pub fn classify_from_own_metadata(ty: &ResolvedType) -> TypeKind {
    let asm = &ty.assembly;
    let Some(def) = asm.type_def(ty.index) else {
        return TypeKind::Class;
    };
    if def.flags.is_interface() {
        return TypeKind::Interface;
    }
    let base = match def.extends {
        Some(TypeHandle::Ref(r)) => asm.type_ref(r).map(|r| (r.namespace.as_str(), r.name.as_str())),
        Some(TypeHandle::Def(d)) => asm.type_def(d).map(|t| (t.namespace.as_str(), t.name.as_str())),
        _ => None,
    };
    base.and_then(|(namespace, name)| root_kind(namespace, name))
        .unwrap_or(TypeKind::Class)
}

/// The type-level record for a loaded type.
pub fn type_record(ctx: &MetadataContext, ty: &ResolvedType) -> TypeRecord {
    TypeRecord::new(
        ty.assembly.outer_namespace(ty.index),
        ty.assembly.nested_name(ty.index),
        classify(ctx, ty),
    )
}

/// Read every file and build a context over them. Fails on the first
/// unreadable or malformed file.
pub fn load_context(
    paths: &[PathBuf],
    options: &LoadOptions,
    cancel: &CancelToken,
) -> Result<MetadataContext, LoadError> {
    let mut assemblies = Vec::with_capacity(paths.len());
    for path in paths {
        if cancel.is_cancelled() {
            return Err(LoadError::Cancelled);
        }
        assemblies.push(read_assembly(path)?);
    }
    Ok(MetadataContext::new(assemblies, options))
}

/// Externally visible types of the given binaries, sorted by
/// `(namespace, name)`.
pub fn extract_public_types(
    paths: &[PathBuf],
    options: &LoadOptions,
    cancel: &CancelToken,
) -> Result<Vec<TypeRecord>, LoadError> {
    let ctx = load_context(paths, options, cancel)?;
    let mut records = Vec::new();
    for asm in ctx.assemblies() {
        let outcome = enumerate_types(&ctx, asm, cancel)?;
        for ty in outcome.log_and_take(&asm.name) {
            records.push(type_record(&ctx, &ty));
        }
    }
    records.sort();
    records.dedup();
    Ok(records)
}
