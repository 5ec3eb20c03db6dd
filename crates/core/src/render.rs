//! Method records: rendered signatures, structured parameter metadata and
//! attached documentation.

use crate::cancel::CancelToken;
use crate::context::{LoadOptions, MetadataContext, ResolvedType};
use crate::docid::CanonicalMemberId;
use crate::docs::DocumentationIndex;
use crate::error::LoadError;
use crate::loader::{classify, enumerate_types, load_context};
use crate::metadata::{Assembly, MethodDef, MethodSig, TypeSig};
use crate::names::{display_name, full_name, GenericScope};
use std::path::PathBuf;
use std::rc::Rc;
use surface_interchange::{
    sort_methods, ApiSurface, MethodRecord, ParameterRecord, TypeKind, TypeRecord,
};

/// Renders the public methods of the classes and interfaces in one
/// context.
pub struct SignatureRenderer<'c> {
    ctx: &'c MetadataContext,
    namespace_prefix: Option<String>,
}

impl<'c> SignatureRenderer<'c> {
    pub fn new(ctx: &'c MetadataContext, namespace_prefix: Option<&str>) -> Self {
        SignatureRenderer {
            ctx,
            namespace_prefix: namespace_prefix.map(str::to_string),
        }
    }

    fn in_scope(&self, ty: &ResolvedType) -> bool {
        match &self.namespace_prefix {
            Some(prefix) => ty.assembly.outer_namespace(ty.index).starts_with(prefix.as_str()),
            None => true,
        }
    }

    /// Type records and method records for one inspected assembly. Types
    /// that fail to load are logged and skipped.
    pub fn render_assembly(
        &self,
        asm: &Rc<Assembly>,
        docs: &DocumentationIndex,
        cancel: &CancelToken,
    ) -> Result<(Vec<TypeRecord>, Vec<MethodRecord>), LoadError> {
        let loaded = enumerate_types(self.ctx, asm, cancel)?.log_and_take(&asm.name);
        let mut types = Vec::new();
        let mut methods = Vec::new();
        for ty in loaded.iter().filter(|t| self.in_scope(t)) {
            if cancel.is_cancelled() {
                return Err(LoadError::Cancelled);
            }
            let kind = classify(self.ctx, ty);
            types.push(TypeRecord::new(
                asm.outer_namespace(ty.index),
                asm.nested_name(ty.index),
                kind,
            ));
            methods.extend(self.members_of_kind(ty, kind, docs));
        }
        types.sort();
        sort_methods(&mut methods);
        Ok((types, methods))
    }

    /// Public, non-special-name methods declared directly on the type.
    pub fn render_methods(
        &self,
        asm: &Rc<Assembly>,
        docs: &DocumentationIndex,
        cancel: &CancelToken,
    ) -> Result<Vec<MethodRecord>, LoadError> {
        self.render_assembly(asm, docs, cancel).map(|(_, methods)| methods)
    }

    /// Public, non-special-name methods declared directly on one type,
    /// sorted. Structs and enums have none.
    pub fn public_members(&self, ty: &ResolvedType, docs: &DocumentationIndex) -> Vec<MethodRecord> {
        self.members_of_kind(ty, classify(self.ctx, ty), docs)
    }

    fn members_of_kind(
        &self,
        ty: &ResolvedType,
        kind: TypeKind,
        docs: &DocumentationIndex,
    ) -> Vec<MethodRecord> {
        if !matches!(kind, TypeKind::Class | TypeKind::Interface) {
            return Vec::new();
        }
        let Some(def) = ty.assembly.type_def(ty.index) else {
            return Vec::new();
        };
        let mut methods: Vec<MethodRecord> = def
            .methods
            .iter()
            .filter(|m| m.flags.is_public() && !m.flags.is_special_name())
            .filter_map(|m| self.render_method(ty, m, docs))
            .collect();
        sort_methods(&mut methods);
        methods
    }

    fn render_method(
        &self,
        ty: &ResolvedType,
        method: &MethodDef,
        docs: &DocumentationIndex,
    ) -> Option<MethodRecord> {
        let asm = &ty.assembly;
        let declaring_type = asm.full_type_name(ty.index);
        let Some(sig) = method.signature.as_ref() else {
            tracing::debug!(
                type_name = %declaring_type,
                method = %method.name,
                "skipping method with undecodable signature"
            );
            return None;
        };
        let def = asm.type_def(ty.index)?;
        let scope = GenericScope::new(&def.generic_params, &method.generic_params);

        let mut record = MethodRecord::new(
            declaring_type,
            method.name.clone(),
            render_signature(asm, method, sig, &scope),
        );
        record.parameters = sig
            .params
            .iter()
            .enumerate()
            .map(|(i, p)| ParameterRecord {
                name: param_name(method, i),
                type_name: full_name(asm, p, &scope),
            })
            .collect();
        record.return_type = full_name(asm, &sig.return_type, &scope);

        if let Some(id) = CanonicalMemberId::for_method(asm, ty.index, method) {
            let id = id.to_string();
            record.summary = docs.summary(&id).map(str::to_string);
            record.params = docs.params(&id).cloned();
            record.returns = docs.returns(&id).map(str::to_string);
        }
        Some(record)
    }
}

fn param_name(method: &MethodDef, index: usize) -> String {
    method
        .param_name(index)
        .map(str::to_string)
        .unwrap_or_else(|| format!("arg{}", index))
}

/// `public [static ]<ret> Name[<T, U>](type name, ...)`
pub fn render_signature(
    asm: &Assembly,
    method: &MethodDef,
    sig: &MethodSig,
    scope: &GenericScope<'_>,
) -> String {
    let mut out = String::from("public ");
    if method.flags.is_static() {
        out.push_str("static ");
    }
    out.push_str(&display_name(asm, &sig.return_type, scope));
    out.push(' ');
    out.push_str(&method.name);
    if sig.generic_param_count > 0 {
        let params: Vec<String> = (0..sig.generic_param_count)
            .map(|n| display_name(asm, &TypeSig::MVar(n), scope))
            .collect();
        out.push('<');
        out.push_str(&params.join(", "));
        out.push('>');
    }
    let params: Vec<String> = sig
        .params
        .iter()
        .enumerate()
        .map(|(i, p)| format!("{} {}", display_name(asm, p, scope), param_name(method, i)))
        .collect();
    out.push('(');
    out.push_str(&params.join(", "));
    out.push(')');
    out
}

/// Public methods of a single type. See [`SignatureRenderer::public_members`].
pub fn public_members(
    ctx: &MetadataContext,
    ty: &ResolvedType,
    docs: &DocumentationIndex,
) -> Vec<MethodRecord> {
    SignatureRenderer::new(ctx, None).public_members(ty, docs)
}

/// Types and methods of the given binaries in one pass. Documentation is
/// read from the `.xml` next to each binary when `include_docs` is set.
pub fn extract_surface(
    paths: &[PathBuf],
    options: &LoadOptions,
    include_docs: bool,
    namespace_prefix: Option<&str>,
    cancel: &CancelToken,
) -> Result<ApiSurface, LoadError> {
    let ctx = load_context(paths, options, cancel)?;
    let renderer = SignatureRenderer::new(&ctx, namespace_prefix);
    let mut types = Vec::new();
    let mut methods = Vec::new();
    for (path, asm) in paths.iter().zip(ctx.assemblies()) {
        let docs = if include_docs {
            DocumentationIndex::for_binary(path)
        } else {
            DocumentationIndex::default()
        };
        let (t, m) = renderer.render_assembly(asm, &docs, cancel)?;
        types.extend(t);
        methods.extend(m);
    }
    types.sort();
    types.dedup();
    sort_methods(&mut methods);
    methods.dedup();
    Ok(ApiSurface::new(types, methods))
}

/// Method records of the given binaries, sorted by
/// `(type, method, signature)`.
pub fn extract_methods(
    paths: &[PathBuf],
    options: &LoadOptions,
    include_docs: bool,
    namespace_prefix: Option<&str>,
    cancel: &CancelToken,
) -> Result<Vec<MethodRecord>, LoadError> {
    extract_surface(paths, options, include_docs, namespace_prefix, cancel).map(|s| s.methods)
}
