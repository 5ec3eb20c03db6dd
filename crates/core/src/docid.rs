//! Documentation member ids (`M:Ns.Type`1.Get``1(``0,System.Int32)`).
//!
//! A [`CanonicalMemberId`] is built from metadata shape alone and formatted
//! by its `Display` impl. The format has to match what compilers write into
//! XML documentation files character for character, otherwise lookups miss
//! silently:
//!
//! - `.` separates namespace parts and nesting levels
//! - type definitions keep their `` `n `` arity suffix
//! - instantiations list arguments in braces: `List{System.String}`
//! - `` `n `` / ``` ``n ``` are positional type / method generic parameters
//! - `[]`, `[0:,0:]`, `@` (by-ref) and `*` (pointer) decorate element types
//! - `#` replaces `.` inside member names
//! - conversion operators append `~ReturnType`

use crate::metadata::{Assembly, MethodDef, TypeHandle, TypeSig};
use crate::names::{distribute_args, type_segments};
use std::fmt;

const MAX_DEPTH: usize = 16;

/// Namespace plus containment path of the declaring type, metadata names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypePath {
    pub namespace: String,
    pub segments: Vec<String>,
}

impl TypePath {
    pub fn of(asm: &Assembly, type_index: u32) -> Option<Self> {
        asm.type_def(type_index)?;
        let segments = asm
            .nesting_chain(type_index)
            .iter()
            .filter_map(|i| asm.type_def(*i))
            .map(|t| t.name.clone())
            .collect();
        Some(TypePath {
            namespace: asm.outer_namespace(type_index).to_string(),
            segments,
        })
    }
}

impl fmt::Display for TypePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.namespace.is_empty() {
            write!(f, "{}.", self.namespace)?;
        }
        f.write_str(&self.segments.join("."))
    }
}

/// Id of a method member; formats with the `M:` prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalMemberId {
    pub type_path: TypePath,
    pub member: String,
    pub generic_arity: u32,
    /// Parameter types, already in id form.
    pub params: Vec<String>,
    /// Return type for conversion operators.
    pub return_type: Option<String>,
}

impl CanonicalMemberId {
    /// Id for a method of the type at `type_index`. `None` when the method
    /// signature could not be decoded.
    pub fn for_method(asm: &Assembly, type_index: u32, method: &MethodDef) -> Option<Self> {
        let sig = method.signature.as_ref()?;
        let type_path = TypePath::of(asm, type_index)?;
        let params = sig.params.iter().map(|p| id_type_name(asm, p)).collect();
        let return_type = if method.name == "op_Implicit" || method.name == "op_Explicit" {
            Some(id_type_name(asm, &sig.return_type))
        } else {
            None
        };
        Some(CanonicalMemberId {
            type_path,
            member: method.name.clone(),
            generic_arity: sig.generic_param_count,
            params,
            return_type,
        })
    }
}

impl fmt::Display for CanonicalMemberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "M:{}.{}",
            self.type_path,
            self.member.replace('.', "#")
        )?;
        if self.generic_arity > 0 {
            write!(f, "``{}", self.generic_arity)?;
        }
        if !self.params.is_empty() {
            write!(f, "({})", self.params.join(","))?;
        }
        if let Some(ret) = &self.return_type {
            write!(f, "~{}", ret)?;
        }
        Ok(())
    }
}

/// A type in documentation-id form.
pub fn id_type_name(asm: &Assembly, sig: &TypeSig) -> String {
    id_name(asm, sig, 0)
}

fn id_name(asm: &Assembly, sig: &TypeSig, depth: usize) -> String {
    if depth > MAX_DEPTH {
        return "?".to_string();
    }
    match sig {
        TypeSig::Primitive(p) => p.full_name().to_string(),
        TypeSig::Class(h) | TypeSig::ValueType(h) => match type_segments(asm, *h) {
            Some((namespace, segments)) => qualify(&namespace, &segments.join(".")),
            None => match h {
                TypeHandle::Spec(i) => asm
                    .type_spec(*i)
                    .map(|s| id_name(asm, s, depth + 1))
                    .unwrap_or_else(|| "?".to_string()),
                _ => "?".to_string(),
            },
        },
        TypeSig::GenericInst { base, args } => {
            let args: Vec<String> = args.iter().map(|a| id_name(asm, a, depth + 1)).collect();
            match type_segments(asm, *base) {
                Some((namespace, segments)) => {
                    let path = distribute_args(&segments, &args)
                        .into_iter()
                        .map(|(name, args)| {
                            if args.is_empty() {
                                name
                            } else {
                                format!("{}{{{}}}", name, args.join(","))
                            }
                        })
                        .collect::<Vec<_>>()
                        .join(".");
                    qualify(&namespace, &path)
                }
                None => "?".to_string(),
            }
        }
        TypeSig::Var(n) => format!("`{}", n),
        TypeSig::MVar(n) => format!("``{}", n),
        TypeSig::SzArray(inner) => format!("{}[]", id_name(asm, inner, depth + 1)),
        TypeSig::Array { element, rank } => {
            let dims = vec!["0:"; (*rank).max(1) as usize].join(",");
            format!("{}[{}]", id_name(asm, element, depth + 1), dims)
        }
        TypeSig::ByRef(inner) => format!("{}@", id_name(asm, inner, depth + 1)),
        TypeSig::Ptr(inner) => format!("{}*", id_name(asm, inner, depth + 1)),
        TypeSig::FnPtr(method) => {
            let params: Vec<String> = method
                .params
                .iter()
                .map(|p| id_name(asm, p, depth + 1))
                .collect();
            format!(
                "=FUNC:{}({})",
                id_name(asm, &method.return_type, depth + 1),
                params.join(",")
            )
        }
        // Custom modifiers do not appear in documentation ids.
        TypeSig::Modified { inner, .. } => id_name(asm, inner, depth + 1),
    }
}

fn qualify(namespace: &str, path: &str) -> String {
    if namespace.is_empty() {
        path.to_string()
    } else {
        format!("{}.{}", namespace, path)
    }
}
