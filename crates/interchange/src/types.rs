//! Typed records for the extracted API surface.
//!
//! [`TypeRecord`] and [`MethodRecord`] are the two shapes the extraction
//! pipeline emits. [`ApiSurface`] bundles both lists for one package variant
//! and is what the diff engine consumes.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Kind of an externally visible type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeKind {
    Class,
    Interface,
    Struct,
    Enum,
}

impl fmt::Display for TypeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeKind::Class => write!(f, "class"),
            TypeKind::Interface => write!(f, "interface"),
            TypeKind::Struct => write!(f, "struct"),
            TypeKind::Enum => write!(f, "enum"),
        }
    }
}

// ── TypeRecord ──────────────────────────────────────────────────────

/// One externally visible type.
///
/// Nested types carry their containment path in `name` joined with `+`
/// (`Outer+Inner`); `namespace` is the outermost type's namespace. The
/// derived ordering is `(namespace, name, kind)`, which is the output order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TypeRecord {
    pub namespace: String,
    pub name: String,
    pub kind: TypeKind,
}

impl TypeRecord {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>, kind: TypeKind) -> Self {
        TypeRecord {
            namespace: namespace.into(),
            name: name.into(),
            kind,
        }
    }

    /// Split a display full name (`Ns.Sub.Outer+Inner`) back into a record.
    ///
    /// The namespace ends at the last `.` before the first `+`.
    pub fn from_full_name(full_name: &str, kind: TypeKind) -> Self {
        let outer_end = full_name.find('+').unwrap_or(full_name.len());
        match full_name[..outer_end].rfind('.') {
            Some(dot) => TypeRecord::new(&full_name[..dot], &full_name[dot + 1..], kind),
            None => TypeRecord::new("", full_name, kind),
        }
    }

    /// The display full name, `Namespace.Name` or just `Name` for the
    /// global namespace.
    pub fn full_name(&self) -> String {
        if self.namespace.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.namespace, self.name)
        }
    }
}

// ── MethodRecord ────────────────────────────────────────────────────

/// A parameter as recorded in metadata: its declared name and the full
/// name of its type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterRecord {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
}

/// One public method of an externally visible type.
///
/// `parameters` and `return_type` always come from metadata. The three
/// documentation fields are filled only when the documentation file has an
/// entry for the method, and each may be absent on its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MethodRecord {
    #[serde(rename = "type")]
    pub declaring_type: String,
    #[serde(rename = "method")]
    pub method_name: String,
    pub signature: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub returns: Option<String>,
    pub parameters: Vec<ParameterRecord>,
    pub return_type: String,
}

impl MethodRecord {
    /// Build an undocumented record. Used by the renderer before
    /// documentation is attached, and by tests.
    pub fn new(
        declaring_type: impl Into<String>,
        method_name: impl Into<String>,
        signature: impl Into<String>,
    ) -> Self {
        MethodRecord {
            declaring_type: declaring_type.into(),
            method_name: method_name.into(),
            signature: signature.into(),
            summary: None,
            params: None,
            returns: None,
            parameters: Vec::new(),
            return_type: "System.Void".to_string(),
        }
    }

    /// The output ordering key: `(type, method, signature)`.
    pub fn sort_key(&self) -> (&str, &str, &str) {
        (&self.declaring_type, &self.method_name, &self.signature)
    }

    /// Whether any documentation was attached.
    pub fn is_documented(&self) -> bool {
        self.summary.is_some() || self.params.is_some() || self.returns.is_some()
    }
}

/// Sort method records into output order.
pub fn sort_methods(methods: &mut [MethodRecord]) {
    methods.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
}

// ── ApiSurface ──────────────────────────────────────────────────────

/// The extracted API set of one package variant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiSurface {
    #[serde(default)]
    pub types: Vec<TypeRecord>,
    pub methods: Vec<MethodRecord>,
}

impl ApiSurface {
    pub fn new(types: Vec<TypeRecord>, methods: Vec<MethodRecord>) -> Self {
        ApiSurface { types, methods }
    }

    /// A surface with no type list. Type-level records derived from it fall
    /// back to [`TypeKind::Class`].
    pub fn from_methods(methods: Vec<MethodRecord>) -> Self {
        ApiSurface {
            types: Vec::new(),
            methods,
        }
    }

    /// Kinds of the listed types keyed by display full name, built once so
    /// repeated lookups do not rescan `types`.
    pub fn type_index(&self) -> TypeIndex {
        TypeIndex {
            kinds: self.types.iter().map(|t| (t.full_name(), t.kind)).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty() && self.methods.is_empty()
    }
}

/// Full-name lookup over the type list of one [`ApiSurface`].
#[derive(Debug, Clone, Default)]
pub struct TypeIndex {
    kinds: HashMap<String, TypeKind>,
}

impl TypeIndex {
    pub fn kind_of(&self, full_name: &str) -> Option<TypeKind> {
        self.kinds.get(full_name).copied()
    }

    /// Type-level record for a declaring type named by a method record.
    /// Types missing from the list are classes.
    pub fn type_record(&self, full_name: &str) -> TypeRecord {
        let kind = self.kind_of(full_name).unwrap_or(TypeKind::Class);
        TypeRecord::from_full_name(full_name, kind)
    }
}
