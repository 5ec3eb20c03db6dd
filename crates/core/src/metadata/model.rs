//! Owned, read-only view of one assembly's metadata.
//!
//! The reader fills these structs once; nothing here borrows the file bytes,
//! so an [`Assembly`] can be shared through `Rc` inside a metadata context
//! and outlive the buffer it came from.

use super::signature::{MethodSig, TypeSig};

/// Index into one of the three type tables of the owning assembly. Indices
/// are 0-based positions in [`Assembly::types`], [`Assembly::type_refs`] and
/// [`Assembly::type_specs`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeHandle {
    Def(u32),
    Ref(u32),
    Spec(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeVisibility {
    NotPublic,
    Public,
    NestedPublic,
    NestedPrivate,
    NestedFamily,
    NestedAssembly,
    NestedFamAndAssem,
    NestedFamOrAssem,
}

/// `TypeDef.Flags` (II.23.1.15).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TypeAttributes(pub u32);

impl TypeAttributes {
    pub const PUBLIC: u32 = 0x1;
    pub const NESTED_PUBLIC: u32 = 0x2;
    pub const NESTED_PRIVATE: u32 = 0x3;
    pub const INTERFACE: u32 = 0x20;
    pub const ABSTRACT: u32 = 0x80;
    pub const SEALED: u32 = 0x100;

    const VISIBILITY_MASK: u32 = 0x7;

    pub fn visibility(self) -> TypeVisibility {
        match self.0 & Self::VISIBILITY_MASK {
            0 => TypeVisibility::NotPublic,
            1 => TypeVisibility::Public,
            2 => TypeVisibility::NestedPublic,
            3 => TypeVisibility::NestedPrivate,
            4 => TypeVisibility::NestedFamily,
            5 => TypeVisibility::NestedAssembly,
            6 => TypeVisibility::NestedFamAndAssem,
            _ => TypeVisibility::NestedFamOrAssem,
        }
    }

    pub fn is_interface(self) -> bool {
        self.0 & Self::INTERFACE != 0
    }

    pub fn is_abstract(self) -> bool {
        self.0 & Self::ABSTRACT != 0
    }

    pub fn is_sealed(self) -> bool {
        self.0 & Self::SEALED != 0
    }
}

/// `MethodDef.Flags` (II.23.1.10).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MethodAttributes(pub u16);

impl MethodAttributes {
    pub const PUBLIC: u16 = 0x6;
    pub const STATIC: u16 = 0x10;
    pub const VIRTUAL: u16 = 0x40;
    pub const ABSTRACT: u16 = 0x400;
    pub const SPECIAL_NAME: u16 = 0x800;
    pub const RT_SPECIAL_NAME: u16 = 0x1000;

    const ACCESS_MASK: u16 = 0x7;

    pub fn is_public(self) -> bool {
        self.0 & Self::ACCESS_MASK == Self::PUBLIC
    }

    pub fn is_static(self) -> bool {
        self.0 & Self::STATIC != 0
    }

    pub fn is_special_name(self) -> bool {
        self.0 & (Self::SPECIAL_NAME | Self::RT_SPECIAL_NAME) != 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenericParamDef {
    pub number: u16,
    pub name: String,
}

/// A `Param` row. Sequence 0 describes the return value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamDef {
    pub sequence: u16,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDef {
    pub name: String,
    pub flags: MethodAttributes,
    /// `None` when the signature blob could not be decoded.
    pub signature: Option<MethodSig>,
    pub params: Vec<ParamDef>,
    pub generic_params: Vec<GenericParamDef>,
}

impl MethodDef {
    /// Declared name of the parameter at 0-based position `index`.
    pub fn param_name(&self, index: usize) -> Option<&str> {
        let sequence = u16::try_from(index + 1).ok()?;
        self.params
            .iter()
            .find(|p| p.sequence == sequence && !p.name.is_empty())
            .map(|p| p.name.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDef {
    pub namespace: String,
    /// Metadata name, arity suffix included (``List`1``).
    pub name: String,
    pub flags: TypeAttributes,
    pub extends: Option<TypeHandle>,
    /// Index of the enclosing type for nested types.
    pub enclosing: Option<u32>,
    pub generic_params: Vec<GenericParamDef>,
    pub methods: Vec<MethodDef>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionScope {
    /// Defined in this module.
    Module,
    ModuleRef(u32),
    AssemblyRef(u32),
    /// Nested inside another type reference.
    TypeRef(u32),
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeReference {
    pub scope: ResolutionScope,
    pub namespace: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssemblyReference {
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Implementation {
    File(u32),
    AssemblyRef(u32),
    ExportedType(u32),
}

/// An `ExportedType` row. With an `AssemblyRef` implementation this is a
/// type forwarder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedTypeDef {
    pub namespace: String,
    pub name: String,
    pub implementation: Implementation,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Assembly {
    pub name: String,
    pub types: Vec<TypeDef>,
    pub type_refs: Vec<TypeReference>,
    /// Decoded `TypeSpec` rows; `None` where the blob was undecodable.
    pub type_specs: Vec<Option<TypeSig>>,
    pub assembly_refs: Vec<AssemblyReference>,
    pub exported_types: Vec<ExportedTypeDef>,
}

impl Assembly {
    pub fn new(name: impl Into<String>) -> Self {
        Assembly {
            name: name.into(),
            ..Assembly::default()
        }
    }

    pub fn type_def(&self, index: u32) -> Option<&TypeDef> {
        self.types.get(index as usize)
    }

    pub fn type_ref(&self, index: u32) -> Option<&TypeReference> {
        self.type_refs.get(index as usize)
    }

    pub fn type_spec(&self, index: u32) -> Option<&TypeSig> {
        self.type_specs.get(index as usize).and_then(Option::as_ref)
    }

    /// Find a top-level type by namespace and metadata name.
    pub fn find_type(&self, namespace: &str, name: &str) -> Option<u32> {
        self.types
            .iter()
            .position(|t| t.enclosing.is_none() && t.namespace == namespace && t.name == name)
            .map(|i| i as u32)
    }

    /// Find a type nested directly in `enclosing`.
    pub fn find_nested(&self, enclosing: u32, name: &str) -> Option<u32> {
        self.types
            .iter()
            .position(|t| t.enclosing == Some(enclosing) && t.name == name)
            .map(|i| i as u32)
    }

    /// The containment chain of a type, outermost first. Stops on a cycle
    /// or a dangling enclosing index.
    pub fn nesting_chain(&self, index: u32) -> Vec<u32> {
        let mut chain = vec![index];
        let mut current = index;
        while let Some(outer) = self.type_def(current).and_then(|t| t.enclosing) {
            if chain.contains(&outer) || self.type_def(outer).is_none() {
                break;
            }
            chain.push(outer);
            current = outer;
        }
        chain.reverse();
        chain
    }

    /// Namespace of the outermost type in the chain.
    pub fn outer_namespace(&self, index: u32) -> &str {
        self.nesting_chain(index)
            .first()
            .and_then(|i| self.type_def(*i))
            .map(|t| t.namespace.as_str())
            .unwrap_or("")
    }

    /// Metadata path without namespace: `Outer+Inner`.
    pub fn nested_name(&self, index: u32) -> String {
        self.nesting_chain(index)
            .iter()
            .filter_map(|i| self.type_def(*i))
            .map(|t| t.name.as_str())
            .collect::<Vec<_>>()
            .join("+")
    }

    /// Metadata full name: `Ns.Outer+Inner`.
    pub fn full_type_name(&self, index: u32) -> String {
        let ns = self.outer_namespace(index);
        let nested = self.nested_name(index);
        if ns.is_empty() {
            nested
        } else {
            format!("{}.{}", ns, nested)
        }
    }

    /// Full name of a type reference, with nested references joined by `+`.
    pub fn type_ref_full_name(&self, index: u32) -> String {
        let mut parts = Vec::new();
        let mut current = index;
        let mut namespace = String::new();
        for _ in 0..32 {
            let Some(r) = self.type_ref(current) else {
                break;
            };
            parts.push(r.name.clone());
            namespace = r.namespace.clone();
            match r.scope {
                ResolutionScope::TypeRef(outer) => current = outer,
                _ => break,
            }
        }
        parts.reverse();
        let nested = parts.join("+");
        if namespace.is_empty() {
            nested
        } else {
            format!("{}.{}", namespace, nested)
        }
    }

    /// Append a type and return its index. Used when building models by
    /// hand.
    pub fn push_type(&mut self, ty: TypeDef) -> u32 {
        self.types.push(ty);
        (self.types.len() - 1) as u32
    }

    pub fn push_type_ref(&mut self, r: TypeReference) -> TypeHandle {
        self.type_refs.push(r);
        TypeHandle::Ref((self.type_refs.len() - 1) as u32)
    }

    pub fn push_assembly_ref(&mut self, name: impl Into<String>) -> u32 {
        self.assembly_refs.push(AssemblyReference { name: name.into() });
        (self.assembly_refs.len() - 1) as u32
    }
}

impl TypeDef {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>, flags: u32) -> Self {
        TypeDef {
            namespace: namespace.into(),
            name: name.into(),
            flags: TypeAttributes(flags),
            extends: None,
            enclosing: None,
            generic_params: Vec::new(),
            methods: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_names_join_with_plus() {
        let mut asm = Assembly::new("Acme");
        let outer = asm.push_type(TypeDef::new("Acme.Widgets", "Outer", TypeAttributes::PUBLIC));
        let mut inner = TypeDef::new("", "Inner`1", TypeAttributes::NESTED_PUBLIC);
        inner.enclosing = Some(outer);
        let inner = asm.push_type(inner);

        assert_eq!(asm.full_type_name(inner), "Acme.Widgets.Outer+Inner`1");
        assert_eq!(asm.outer_namespace(inner), "Acme.Widgets");
        assert_eq!(asm.find_nested(outer, "Inner`1"), Some(inner));
        assert_eq!(asm.find_type("Acme.Widgets", "Outer"), Some(outer));
        assert_eq!(asm.find_type("", "Inner`1"), None);
    }

    #[test]
    fn enclosing_cycles_terminate() {
        let mut asm = Assembly::new("Broken");
        let mut a = TypeDef::new("", "A", TypeAttributes::NESTED_PUBLIC);
        a.enclosing = Some(1);
        let mut b = TypeDef::new("", "B", TypeAttributes::NESTED_PUBLIC);
        b.enclosing = Some(0);
        asm.push_type(a);
        asm.push_type(b);
        assert_eq!(asm.nesting_chain(0).len(), 2);
    }

    #[test]
    fn visibility_and_special_names() {
        assert_eq!(
            TypeAttributes(0x0010_0101).visibility(),
            TypeVisibility::Public
        );
        assert_eq!(
            TypeAttributes(TypeAttributes::NESTED_PRIVATE).visibility(),
            TypeVisibility::NestedPrivate
        );
        assert!(MethodAttributes(0x0886).is_special_name());
        assert!(MethodAttributes(0x0086).is_public());
        assert!(!MethodAttributes(0x0083).is_public());
    }
}
