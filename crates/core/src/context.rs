//! The metadata context: the set of assemblies type references resolve
//! against during one enumeration pass.
//!
//! A context holds the inspected assemblies plus, optionally, a directory of
//! platform base-library binaries that are read lazily the first time a
//! reference names them. Without such a directory, references to the root
//! types of the core libraries resolve to [`Resolution::Platform`] so that
//! `System.Object`, `System.ValueType` and `System.Enum` still terminate a
//! base chain.
//!
//! Contexts are cheap, single-threaded and short-lived: build one per pass,
//! drop it at the end.

use crate::error::ResolveError;
use crate::metadata::{read_assembly, Assembly, Implementation, ResolutionScope, TypeHandle, TypeSig};
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

const MAX_FORWARDS: usize = 8;

/// Assembly names whose root types resolve without metadata.
const CORE_LIBRARIES: &[&str] = &["mscorlib", "netstandard", "System.Runtime", "System.Private.CoreLib"];

/// Knobs for building a [`MetadataContext`].
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Directory of platform base-library binaries (`System.Runtime.dll`,
    /// ...). `None` resolves core-library root types intrinsically.
    pub platform_dir: Option<PathBuf>,
}

/// A type definition inside a loaded assembly.
#[derive(Debug, Clone)]
pub struct ResolvedType {
    pub assembly: Rc<Assembly>,
    pub index: u32,
}

impl ResolvedType {
    pub fn full_name(&self) -> String {
        self.assembly.full_type_name(self.index)
    }
}

/// Outcome of resolving a type handle.
#[derive(Debug, Clone)]
pub enum Resolution {
    Type(ResolvedType),
    /// A core-library type with no metadata loaded for it.
    Platform { namespace: String, name: String },
}

impl Resolution {
    pub fn full_name(&self) -> String {
        match self {
            Resolution::Type(t) => t.full_name(),
            Resolution::Platform { namespace, name } => format!("{}.{}", namespace, name),
        }
    }
}

pub struct MetadataContext {
    inspected: Vec<Rc<Assembly>>,
    platform_dir: Option<PathBuf>,
    /// Lowercased file stem to path, built on first platform lookup.
    platform_files: RefCell<Option<HashMap<String, PathBuf>>>,
    /// Lowercased assembly name to the loaded platform assembly, `None`
    /// when it is known to be missing or unreadable.
    platform: RefCell<HashMap<String, Option<Rc<Assembly>>>>,
}

impl MetadataContext {
    pub fn new(inspected: Vec<Assembly>, options: &LoadOptions) -> Self {
        MetadataContext {
            inspected: inspected.into_iter().map(Rc::new).collect(),
            platform_dir: options.platform_dir.clone(),
            platform_files: RefCell::new(None),
            platform: RefCell::new(HashMap::new()),
        }
    }

    /// The assemblies under inspection, in the order given.
    pub fn assemblies(&self) -> &[Rc<Assembly>] {
        &self.inspected
    }

    /// Find an assembly by name, case-insensitively: inspected assemblies
    /// first, then the platform directory.
    pub fn find_assembly(&self, name: &str) -> Option<Rc<Assembly>> {
        if let Some(asm) = self
            .inspected
            .iter()
            .find(|a| a.name.eq_ignore_ascii_case(name))
        {
            return Some(Rc::clone(asm));
        }
        self.platform_assembly(name)
    }

    fn platform_assembly(&self, name: &str) -> Option<Rc<Assembly>> {
        let dir = self.platform_dir.as_deref()?;
        let key = name.to_ascii_lowercase();
        if let Some(cached) = self.platform.borrow().get(&key) {
            return cached.clone();
        }

        let path = self.platform_file(dir, &key);
        let loaded = match path {
            Some(path) => match read_assembly(&path) {
                Ok(asm) => Some(Rc::new(asm)),
                Err(e) => {
                    tracing::debug!(assembly = %name, error = %e, "platform assembly unreadable");
                    None
                }
            },
            None => None,
        };
        self.platform.borrow_mut().insert(key, loaded.clone());
        loaded
    }

    fn platform_file(&self, dir: &Path, key: &str) -> Option<PathBuf> {
        let mut files = self.platform_files.borrow_mut();
        let index = files.get_or_insert_with(|| index_platform_dir(dir));
        index.get(key).cloned()
    }

    /// Resolve a handle appearing in `from` to a type definition.
    pub fn resolve(&self, from: &Rc<Assembly>, handle: TypeHandle) -> Result<Resolution, ResolveError> {
        self.resolve_at(from, handle, 0)
    }

    fn resolve_at(
        &self,
        from: &Rc<Assembly>,
        handle: TypeHandle,
        depth: usize,
    ) -> Result<Resolution, ResolveError> {
        if depth > MAX_FORWARDS * 4 {
            return Err(ResolveError::Unresolvable(format!(
                "reference chain too deep in {}",
                from.name
            )));
        }
        match handle {
            TypeHandle::Def(index) => match from.type_def(index) {
                Some(_) => Ok(Resolution::Type(ResolvedType {
                    assembly: Rc::clone(from),
                    index,
                })),
                None => Err(ResolveError::Unresolvable(format!(
                    "TypeDef {} out of range in {}",
                    index, from.name
                ))),
            },
            TypeHandle::Spec(index) => match from.type_spec(index) {
                Some(TypeSig::GenericInst { base, .. }) => self.resolve_at(from, *base, depth + 1),
                Some(TypeSig::Class(h)) | Some(TypeSig::ValueType(h)) => {
                    self.resolve_at(from, *h, depth + 1)
                }
                _ => Err(ResolveError::Unresolvable(format!(
                    "TypeSpec {} in {} does not name a type",
                    index, from.name
                ))),
            },
            TypeHandle::Ref(index) => self.resolve_ref(from, index, depth),
        }
    }

    fn resolve_ref(
        &self,
        from: &Rc<Assembly>,
        index: u32,
        depth: usize,
    ) -> Result<Resolution, ResolveError> {
        let r = from.type_ref(index).ok_or_else(|| {
            ResolveError::Unresolvable(format!("TypeRef {} out of range in {}", index, from.name))
        })?;
        match r.scope {
            ResolutionScope::TypeRef(outer) => {
                match self.resolve_at(from, TypeHandle::Ref(outer), depth + 1)? {
                    Resolution::Type(enclosing) => enclosing
                        .assembly
                        .find_nested(enclosing.index, &r.name)
                        .map(|nested| {
                            Resolution::Type(ResolvedType {
                                assembly: Rc::clone(&enclosing.assembly),
                                index: nested,
                            })
                        })
                        .ok_or_else(|| ResolveError::TypeNotFound {
                            assembly: enclosing.assembly.name.clone(),
                            type_name: from.type_ref_full_name(index),
                        }),
                    Resolution::Platform { namespace, name } => Ok(Resolution::Platform {
                        namespace,
                        name: format!("{}+{}", name, r.name),
                    }),
                }
            }
            ResolutionScope::AssemblyRef(a) => {
                let assembly = from
                    .assembly_refs
                    .get(a as usize)
                    .map(|ar| ar.name.clone())
                    .ok_or_else(|| {
                        ResolveError::Unresolvable(format!(
                            "AssemblyRef {} out of range in {}",
                            a, from.name
                        ))
                    })?;
                self.find_in(&assembly, &r.namespace, &r.name, depth)
            }
            ResolutionScope::Module | ResolutionScope::ModuleRef(_) | ResolutionScope::Unknown => {
                match from.find_type(&r.namespace, &r.name) {
                    Some(found) => Ok(Resolution::Type(ResolvedType {
                        assembly: Rc::clone(from),
                        index: found,
                    })),
                    None => Err(ResolveError::TypeNotFound {
                        assembly: from.name.clone(),
                        type_name: from.type_ref_full_name(index),
                    }),
                }
            }
        }
    }

    /// Look a top-level type up in a named assembly, following type
    /// forwarders.
    fn find_in(
        &self,
        assembly: &str,
        namespace: &str,
        name: &str,
        depth: usize,
    ) -> Result<Resolution, ResolveError> {
        let qualified = if namespace.is_empty() {
            name.to_string()
        } else {
            format!("{}.{}", namespace, name)
        };

        let Some(asm) = self.find_assembly(assembly) else {
            if is_core_library(assembly) {
                return Ok(Resolution::Platform {
                    namespace: namespace.to_string(),
                    name: name.to_string(),
                });
            }
            return Err(ResolveError::MissingAssembly {
                assembly: assembly.to_string(),
                type_name: qualified,
            });
        };

        if let Some(index) = asm.find_type(namespace, name) {
            return Ok(Resolution::Type(ResolvedType {
                assembly: asm,
                index,
            }));
        }

        let forwarded = asm
            .exported_types
            .iter()
            .find(|e| e.namespace == namespace && e.name == name)
            .and_then(|e| match e.implementation {
                Implementation::AssemblyRef(r) => asm.assembly_refs.get(r as usize),
                _ => None,
            });
        match forwarded {
            Some(target) if depth < MAX_FORWARDS => {
                tracing::trace!(from = %asm.name, to = %target.name, type_name = %qualified, "following type forwarder");
                self.find_in(&target.name, namespace, name, depth + 1)
            }
            _ => Err(ResolveError::TypeNotFound {
                assembly: asm.name.clone(),
                type_name: qualified,
            }),
        }
    }
}

fn is_core_library(name: &str) -> bool {
    CORE_LIBRARIES.iter().any(|c| c.eq_ignore_ascii_case(name))
}

fn index_platform_dir(dir: &Path) -> HashMap<String, PathBuf> {
    let mut index = HashMap::new();
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!(dir = %dir.display(), error = %e, "platform directory unreadable");
            return index;
        }
    };
    for entry in entries.flatten() {
        let path = entry.path();
        let is_dll = path
            .extension()
            .map(|e| e.eq_ignore_ascii_case("dll"))
            .unwrap_or(false);
        if !is_dll {
            continue;
        }
        if let Some(stem) = path.file_stem() {
            index.insert(stem.to_string_lossy().to_ascii_lowercase(), path);
        }
    }
    tracing::debug!(dir = %dir.display(), files = index.len(), "indexed platform directory");
    index
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{ExportedTypeDef, TypeAttributes, TypeDef, TypeReference};

    fn reference(asm: &mut Assembly, assembly: &str, namespace: &str, name: &str) -> TypeHandle {
        let scope = ResolutionScope::AssemblyRef(asm.push_assembly_ref(assembly));
        asm.push_type_ref(TypeReference {
            scope,
            namespace: namespace.to_string(),
            name: name.to_string(),
        })
    }

    #[test]
    fn core_library_roots_resolve_without_platform_dir() {
        let mut asm = Assembly::new("Acme");
        let object = reference(&mut asm, "System.Runtime", "System", "Object");
        let ctx = MetadataContext::new(vec![asm], &LoadOptions::default());
        let from = Rc::clone(&ctx.assemblies()[0]);
        match ctx.resolve(&from, object).unwrap() {
            Resolution::Platform { namespace, name } => {
                assert_eq!(namespace, "System");
                assert_eq!(name, "Object");
            }
            other => panic!("expected platform type, got {:?}", other),
        }
    }

    #[test]
    fn missing_assembly_is_reported() {
        let mut asm = Assembly::new("Acme");
        let base = reference(&mut asm, "Vendor.Base", "Vendor", "Widget");
        let ctx = MetadataContext::new(vec![asm], &LoadOptions::default());
        let from = Rc::clone(&ctx.assemblies()[0]);
        assert_eq!(
            ctx.resolve(&from, base).unwrap_err(),
            ResolveError::MissingAssembly {
                assembly: "Vendor.Base".to_string(),
                type_name: "Vendor.Widget".to_string(),
            }
        );
    }

    #[test]
    fn resolves_across_inspected_assemblies_and_forwarders() {
        let mut real = Assembly::new("Vendor.Impl");
        real.push_type(TypeDef::new("Vendor", "Widget", TypeAttributes::PUBLIC));

        let mut facade = Assembly::new("Vendor.Facade");
        let target = facade.push_assembly_ref("vendor.impl");
        facade.exported_types.push(ExportedTypeDef {
            namespace: "Vendor".to_string(),
            name: "Widget".to_string(),
            implementation: Implementation::AssemblyRef(target),
        });

        let mut user = Assembly::new("Acme");
        let handle = reference(&mut user, "VENDOR.FACADE", "Vendor", "Widget");

        let ctx = MetadataContext::new(vec![user, facade, real], &LoadOptions::default());
        let from = Rc::clone(&ctx.assemblies()[0]);
        match ctx.resolve(&from, handle).unwrap() {
            Resolution::Type(t) => {
                assert_eq!(t.assembly.name, "Vendor.Impl");
                assert_eq!(t.full_name(), "Vendor.Widget");
            }
            other => panic!("expected resolved type, got {:?}", other),
        }
    }

    #[test]
    fn nested_references_resolve_through_their_parent() {
        let mut lib = Assembly::new("Vendor");
        let outer = lib.push_type(TypeDef::new("Vendor", "Outer", TypeAttributes::PUBLIC));
        let mut inner = TypeDef::new("", "Inner", TypeAttributes::NESTED_PUBLIC);
        inner.enclosing = Some(outer);
        lib.push_type(inner);

        let mut user = Assembly::new("Acme");
        let outer_ref = reference(&mut user, "Vendor", "Vendor", "Outer");
        let TypeHandle::Ref(outer_index) = outer_ref else {
            panic!("expected a type reference");
        };
        let inner_ref = user.push_type_ref(TypeReference {
            scope: ResolutionScope::TypeRef(outer_index),
            namespace: String::new(),
            name: "Inner".to_string(),
        });

        let ctx = MetadataContext::new(vec![user, lib], &LoadOptions::default());
        let from = Rc::clone(&ctx.assemblies()[0]);
        let resolved = ctx.resolve(&from, inner_ref).unwrap();
        assert_eq!(resolved.full_name(), "Vendor.Outer+Inner");
    }

    #[test]
    fn empty_platform_dir_is_tolerated() {
        let dir = tempfile::tempdir().unwrap();
        let mut asm = Assembly::new("Acme");
        let handle = reference(&mut asm, "System.Collections", "System.Collections", "Stack");
        let options = LoadOptions {
            platform_dir: Some(dir.path().to_path_buf()),
        };
        let ctx = MetadataContext::new(vec![asm], &options);
        let from = Rc::clone(&ctx.assemblies()[0]);
        assert!(matches!(
            ctx.resolve(&from, handle),
            Err(ResolveError::MissingAssembly { .. })
        ));
        // Second lookup hits the cache.
        assert!(ctx.find_assembly("System.Collections").is_none());
    }
}
