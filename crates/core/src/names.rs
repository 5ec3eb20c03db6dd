//! Type naming for rendered signatures and structured parameter records.
//!
//! Two flavours are produced from the same [`TypeSig`]:
//!
//! - display names (`int`, `List<string>`, `Inner<T>[]`) for the rendered
//!   signature text
//! - full names (`System.Int32`, `Ns.Outer+Inner`,
//!   `System.Collections.Generic.List<System.String>`) for the `parameters`
//!   and `returnType` fields
//!
//! Both work on one assembly's metadata only. Type references are named from
//! the referencing row, so naming never needs the referenced assembly to be
//! available.

use crate::metadata::{Assembly, GenericParamDef, MethodSig, ResolutionScope, TypeHandle, TypeSig};

const MAX_SPEC_DEPTH: usize = 16;

/// Generic parameters in scope for a member: its declaring type's and its
/// own.
#[derive(Debug, Clone, Copy, Default)]
pub struct GenericScope<'a> {
    pub type_params: &'a [GenericParamDef],
    pub method_params: &'a [GenericParamDef],
}

impl<'a> GenericScope<'a> {
    pub fn new(type_params: &'a [GenericParamDef], method_params: &'a [GenericParamDef]) -> Self {
        GenericScope {
            type_params,
            method_params,
        }
    }

    fn type_param(&self, n: u32) -> String {
        lookup(self.type_params, n).unwrap_or_else(|| format!("!{}", n))
    }

    fn method_param(&self, n: u32) -> String {
        lookup(self.method_params, n).unwrap_or_else(|| format!("!!{}", n))
    }
}

fn lookup(params: &[GenericParamDef], n: u32) -> Option<String> {
    params
        .iter()
        .find(|p| u32::from(p.number) == n)
        .filter(|p| !p.name.is_empty())
        .map(|p| p.name.clone())
}

/// Split a metadata name into its base and generic arity: ``List`1`` gives
/// `("List", 1)`.
pub fn split_arity(name: &str) -> (&str, usize) {
    match name.rsplit_once('`') {
        Some((base, digits)) if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) => {
            (base, digits.parse().unwrap_or(0))
        }
        _ => (name, 0),
    }
}

/// Namespace and containment path (outermost first, metadata names) of a
/// type definition or reference.
pub(crate) fn type_segments(asm: &Assembly, handle: TypeHandle) -> Option<(String, Vec<String>)> {
    match handle {
        TypeHandle::Def(index) => {
            asm.type_def(index)?;
            let segments = asm
                .nesting_chain(index)
                .iter()
                .filter_map(|i| asm.type_def(*i))
                .map(|t| t.name.clone())
                .collect();
            Some((asm.outer_namespace(index).to_string(), segments))
        }
        TypeHandle::Ref(index) => {
            let mut segments = Vec::new();
            let mut namespace = String::new();
            let mut current = index;
            for _ in 0..MAX_SPEC_DEPTH {
                let r = asm.type_ref(current)?;
                segments.push(r.name.clone());
                namespace = r.namespace.clone();
                match r.scope {
                    ResolutionScope::TypeRef(outer) => current = outer,
                    _ => break,
                }
            }
            segments.reverse();
            Some((namespace, segments))
        }
        TypeHandle::Spec(_) => None,
    }
}

/// Distribute generic arguments over containment segments by each
/// segment's arity suffix. Arguments left over after the last declared
/// arity go to the innermost segment.
pub(crate) fn distribute_args<T: Clone>(segments: &[String], args: &[T]) -> Vec<(String, Vec<T>)> {
    let mut out = Vec::with_capacity(segments.len());
    let mut next = 0;
    for segment in segments {
        let (base, arity) = split_arity(segment);
        let end = (next + arity).min(args.len());
        out.push((base.to_string(), args[next..end].to_vec()));
        next = end;
    }
    if next < args.len() {
        if let Some(last) = out.last_mut() {
            last.1.extend_from_slice(&args[next..]);
        }
    }
    out
}

/// Short display name used in rendered signatures.
pub fn display_name(asm: &Assembly, sig: &TypeSig, scope: &GenericScope<'_>) -> String {
    display(asm, sig, scope, 0)
}

fn display(asm: &Assembly, sig: &TypeSig, scope: &GenericScope<'_>, depth: usize) -> String {
    if depth > MAX_SPEC_DEPTH {
        return "?".to_string();
    }
    match sig {
        TypeSig::Primitive(p) => p.keyword().to_string(),
        TypeSig::Class(h) | TypeSig::ValueType(h) => display_handle(asm, *h, scope, depth),
        TypeSig::GenericInst { base, args } => {
            let name = match type_segments(asm, *base) {
                Some((_, segments)) => segments
                    .last()
                    .map(|s| split_arity(s).0.to_string())
                    .unwrap_or_default(),
                None => display_handle(asm, *base, scope, depth),
            };
            let args: Vec<String> = args.iter().map(|a| display(asm, a, scope, depth + 1)).collect();
            format!("{}<{}>", name, args.join(", "))
        }
        TypeSig::Var(n) => scope.type_param(*n),
        TypeSig::MVar(n) => scope.method_param(*n),
        TypeSig::SzArray(inner) => format!("{}[]", display(asm, inner, scope, depth + 1)),
        TypeSig::Array { element, rank } => format!(
            "{}[{}]",
            display(asm, element, scope, depth + 1),
            ",".repeat(rank.saturating_sub(1) as usize)
        ),
        TypeSig::ByRef(inner) => format!("{}&", display(asm, inner, scope, depth + 1)),
        TypeSig::Ptr(inner) => format!("{}*", display(asm, inner, scope, depth + 1)),
        TypeSig::FnPtr(method) => fn_ptr(method, |t| display(asm, t, scope, depth + 1)),
        TypeSig::Modified { inner, .. } => display(asm, inner, scope, depth + 1),
    }
}

fn display_handle(asm: &Assembly, handle: TypeHandle, scope: &GenericScope<'_>, depth: usize) -> String {
    match handle {
        TypeHandle::Spec(i) => match asm.type_spec(i) {
            Some(sig) => display(asm, sig, scope, depth + 1),
            None => "?".to_string(),
        },
        _ => type_segments(asm, handle)
            .and_then(|(_, segments)| segments.last().map(|s| split_arity(s).0.to_string()))
            .unwrap_or_else(|| "?".to_string()),
    }
}

/// Namespace-qualified name used in `parameters` and `returnType`.
pub fn full_name(asm: &Assembly, sig: &TypeSig, scope: &GenericScope<'_>) -> String {
    full(asm, sig, scope, 0)
}

fn full(asm: &Assembly, sig: &TypeSig, scope: &GenericScope<'_>, depth: usize) -> String {
    if depth > MAX_SPEC_DEPTH {
        return "?".to_string();
    }
    match sig {
        TypeSig::Primitive(p) => p.full_name().to_string(),
        TypeSig::Class(h) | TypeSig::ValueType(h) => full_handle(asm, *h, scope, depth),
        TypeSig::GenericInst { base, args } => match type_segments(asm, *base) {
            Some((namespace, segments)) => {
                let args: Vec<String> =
                    args.iter().map(|a| full(asm, a, scope, depth + 1)).collect();
                let path = distribute_args(&segments, &args)
                    .into_iter()
                    .map(|(name, args)| {
                        if args.is_empty() {
                            name
                        } else {
                            format!("{}<{}>", name, args.join(", "))
                        }
                    })
                    .collect::<Vec<_>>()
                    .join("+");
                qualify(&namespace, &path)
            }
            None => full_handle(asm, *base, scope, depth),
        },
        TypeSig::Var(n) => scope.type_param(*n),
        TypeSig::MVar(n) => scope.method_param(*n),
        TypeSig::SzArray(inner) => format!("{}[]", full(asm, inner, scope, depth + 1)),
        TypeSig::Array { element, rank } => format!(
            "{}[{}]",
            full(asm, element, scope, depth + 1),
            ",".repeat(rank.saturating_sub(1) as usize)
        ),
        TypeSig::ByRef(inner) => format!("{}&", full(asm, inner, scope, depth + 1)),
        TypeSig::Ptr(inner) => format!("{}*", full(asm, inner, scope, depth + 1)),
        TypeSig::FnPtr(method) => fn_ptr(method, |t| full(asm, t, scope, depth + 1)),
        TypeSig::Modified { inner, .. } => full(asm, inner, scope, depth + 1),
    }
}

fn full_handle(asm: &Assembly, handle: TypeHandle, scope: &GenericScope<'_>, depth: usize) -> String {
    match handle {
        TypeHandle::Spec(i) => match asm.type_spec(i) {
            Some(sig) => full(asm, sig, scope, depth + 1),
            None => "?".to_string(),
        },
        _ => type_segments(asm, handle)
            .map(|(namespace, segments)| qualify(&namespace, &segments.join("+")))
            .unwrap_or_else(|| "?".to_string()),
    }
}

fn qualify(namespace: &str, path: &str) -> String {
    if namespace.is_empty() {
        path.to_string()
    } else {
        format!("{}.{}", namespace, path)
    }
}

fn fn_ptr(method: &MethodSig, name: impl Fn(&TypeSig) -> String) -> String {
    let mut parts: Vec<String> = method.params.iter().map(&name).collect();
    parts.push(name(&method.return_type));
    format!("delegate*<{}>", parts.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{Primitive, TypeAttributes, TypeDef, TypeReference};

    fn fixture() -> (Assembly, TypeHandle, TypeHandle) {
        let mut asm = Assembly::new("Acme");
        let corlib = asm.push_assembly_ref("System.Runtime");
        let list = asm.push_type_ref(TypeReference {
            scope: ResolutionScope::AssemblyRef(corlib),
            namespace: "System.Collections.Generic".to_string(),
            name: "List`1".to_string(),
        });
        let outer = asm.push_type(TypeDef::new("Acme", "Outer`1", TypeAttributes::PUBLIC));
        let mut inner = TypeDef::new("", "Inner`1", TypeAttributes::NESTED_PUBLIC);
        inner.enclosing = Some(outer);
        let inner = asm.push_type(inner);
        (asm, list, TypeHandle::Def(inner))
    }

    fn int() -> TypeSig {
        TypeSig::Primitive(Primitive::Int32)
    }

    fn string() -> TypeSig {
        TypeSig::Primitive(Primitive::String)
    }

    #[test]
    fn primitives_use_keywords_and_system_names() {
        let (asm, _, _) = fixture();
        let scope = GenericScope::default();
        assert_eq!(display_name(&asm, &int(), &scope), "int");
        assert_eq!(full_name(&asm, &int(), &scope), "System.Int32");
        let arr = TypeSig::Array {
            element: Box::new(int()),
            rank: 2,
        };
        assert_eq!(display_name(&asm, &arr, &scope), "int[,]");
        let by_ref = TypeSig::ByRef(Box::new(TypeSig::SzArray(Box::new(string()))));
        assert_eq!(display_name(&asm, &by_ref, &scope), "string[]&");
        assert_eq!(full_name(&asm, &by_ref, &scope), "System.String[]&");
    }

    #[test]
    fn custom_modifiers_render_as_their_inner_type() {
        let (asm, list, _) = fixture();
        let scope = GenericScope::default();
        let sig = TypeSig::Modified {
            required: false,
            modifier: list,
            inner: Box::new(int()),
        };
        assert_eq!(display_name(&asm, &sig, &scope), "int");
        assert_eq!(full_name(&asm, &sig, &scope), "System.Int32");
    }

    #[test]
    fn generic_instances_strip_arity() {
        let (asm, list, _) = fixture();
        let scope = GenericScope::default();
        let sig = TypeSig::GenericInst {
            base: list,
            args: vec![string()],
        };
        assert_eq!(display_name(&asm, &sig, &scope), "List<string>");
        assert_eq!(
            full_name(&asm, &sig, &scope),
            "System.Collections.Generic.List<System.String>"
        );
    }

    #[test]
    fn nested_generic_arguments_are_distributed_per_level() {
        let (asm, _, inner) = fixture();
        let scope = GenericScope::default();
        let sig = TypeSig::GenericInst {
            base: inner,
            args: vec![int(), string()],
        };
        assert_eq!(display_name(&asm, &sig, &scope), "Inner<int, string>");
        assert_eq!(
            full_name(&asm, &sig, &scope),
            "Acme.Outer<System.Int32>+Inner<System.String>"
        );
        assert_eq!(
            full_name(&asm, &TypeSig::Class(inner), &scope),
            "Acme.Outer`1+Inner`1"
        );
    }

    #[test]
    fn generic_parameters_use_declared_names() {
        let (asm, _, _) = fixture();
        let type_params = vec![GenericParamDef {
            number: 0,
            name: "T".to_string(),
        }];
        let method_params = vec![GenericParamDef {
            number: 0,
            name: "U".to_string(),
        }];
        let scope = GenericScope::new(&type_params, &method_params);
        assert_eq!(display_name(&asm, &TypeSig::Var(0), &scope), "T");
        assert_eq!(full_name(&asm, &TypeSig::MVar(0), &scope), "U");
        assert_eq!(full_name(&asm, &TypeSig::MVar(3), &scope), "!!3");
    }

    #[test]
    fn arity_split() {
        assert_eq!(split_arity("List`1"), ("List", 1));
        assert_eq!(split_arity("Dictionary`2"), ("Dictionary", 2));
        assert_eq!(split_arity("Plain"), ("Plain", 0));
        assert_eq!(split_arity("Odd`x"), ("Odd`x", 0));
    }
}
