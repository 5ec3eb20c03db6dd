//! Diff result records.
//!
//! A [`DiffResult`] is built once by the diff engine and is read-only
//! afterwards: its fields are private and `compatible` is computed from the
//! breaking list at construction.

use crate::types::TypeRecord;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a method change is breaking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DiffReason {
    #[serde(rename = "method removed")]
    MethodRemoved,
    #[serde(rename = "signature modified")]
    SignatureModified,
}

impl fmt::Display for DiffReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiffReason::MethodRemoved => write!(f, "method removed"),
            DiffReason::SignatureModified => write!(f, "signature modified"),
        }
    }
}

/// One breaking, method-level change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffItem {
    #[serde(rename = "type")]
    pub type_name: String,
    pub method: String,
    pub reason: DiffReason,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

/// Package identity and variant the two compared surfaces belong to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffIdentity {
    pub package_id: String,
    pub version_from: String,
    pub version_to: String,
    pub tfm: String,
}

impl DiffIdentity {
    pub fn new(
        package_id: impl Into<String>,
        version_from: impl Into<String>,
        version_to: impl Into<String>,
        tfm: impl Into<String>,
    ) -> Self {
        DiffIdentity {
            package_id: package_id.into(),
            version_from: version_from.into(),
            version_to: version_to.into(),
            tfm: tfm.into(),
        }
    }
}

/// The outcome of comparing two API surfaces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "StoredDiffResult")]
pub struct DiffResult {
    package_id: String,
    version_from: String,
    version_to: String,
    tfm: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    breaking: Vec<DiffItem>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    added: Vec<TypeRecord>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    removed: Vec<TypeRecord>,
    compatible: bool,
}

/// Serialized form of a [`DiffResult`]. A stored `compatible` flag is
/// ignored and recomputed from `breaking`.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredDiffResult {
    package_id: String,
    version_from: String,
    version_to: String,
    tfm: String,
    #[serde(default)]
    breaking: Vec<DiffItem>,
    #[serde(default)]
    added: Vec<TypeRecord>,
    #[serde(default)]
    removed: Vec<TypeRecord>,
}

impl From<StoredDiffResult> for DiffResult {
    fn from(stored: StoredDiffResult) -> Self {
        let identity = DiffIdentity::new(
            stored.package_id,
            stored.version_from,
            stored.version_to,
            stored.tfm,
        );
        DiffResult::new(&identity, stored.breaking, stored.added, stored.removed)
    }
}

impl DiffResult {
    /// Assemble a result. The lists are stored as given; `compatible` is
    /// derived from `breaking`.
    pub fn new(
        identity: &DiffIdentity,
        breaking: Vec<DiffItem>,
        added: Vec<TypeRecord>,
        removed: Vec<TypeRecord>,
    ) -> Self {
        let compatible = breaking.is_empty();
        DiffResult {
            package_id: identity.package_id.clone(),
            version_from: identity.version_from.clone(),
            version_to: identity.version_to.clone(),
            tfm: identity.tfm.clone(),
            breaking,
            added,
            removed,
            compatible,
        }
    }

    pub fn package_id(&self) -> &str {
        &self.package_id
    }

    pub fn version_from(&self) -> &str {
        &self.version_from
    }

    pub fn version_to(&self) -> &str {
        &self.version_to
    }

    pub fn tfm(&self) -> &str {
        &self.tfm
    }

    pub fn breaking(&self) -> &[DiffItem] {
        &self.breaking
    }

    pub fn added(&self) -> &[TypeRecord] {
        &self.added
    }

    pub fn removed(&self) -> &[TypeRecord] {
        &self.removed
    }

    pub fn is_compatible(&self) -> bool {
        self.compatible
    }

    /// Returns true if nothing was added, removed or broken.
    pub fn is_empty(&self) -> bool {
        self.breaking.is_empty() && self.added.is_empty() && self.removed.is_empty()
    }

    /// Serialize the result to a JSON value.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }

    /// Format the result as human-readable text.
    pub fn to_text(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!(
            "{} {} -> {} ({}): {} breaking, {} added type(s), {} removed type(s)",
            self.package_id,
            self.version_from,
            self.version_to,
            self.tfm,
            self.breaking.len(),
            self.added.len(),
            self.removed.len()
        ));

        if !self.breaking.is_empty() {
            lines.push(String::new());
            lines.push("BREAKING:".to_string());
            for item in &self.breaking {
                match &item.signature {
                    Some(sig) => lines.push(format!(
                        "  ! {}.{} ({}): {}",
                        item.type_name, item.method, item.reason, sig
                    )),
                    None => lines.push(format!(
                        "  ! {}.{} ({})",
                        item.type_name, item.method, item.reason
                    )),
                }
            }
        }

        if !self.removed.is_empty() {
            lines.push(String::new());
            lines.push("REMOVED:".to_string());
            for t in &self.removed {
                lines.push(format!("  - {} {}", t.kind, t.full_name()));
            }
        }

        if !self.added.is_empty() {
            lines.push(String::new());
            lines.push("ADDED:".to_string());
            for t in &self.added {
                lines.push(format!("  + {} {}", t.kind, t.full_name()));
            }
        }

        lines.push(String::new());
        lines.push(if self.compatible {
            "compatible".to_string()
        } else {
            "incompatible".to_string()
        });

        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TypeKind;

    fn identity() -> DiffIdentity {
        DiffIdentity::new("Acme.Widgets", "1.0.0", "2.0.0", "net8.0")
    }

    #[test]
    fn compatible_is_derived_from_breaking() {
        let clean = DiffResult::new(&identity(), Vec::new(), Vec::new(), Vec::new());
        assert!(clean.is_compatible());
        assert!(clean.is_empty());

        let broken = DiffResult::new(
            &identity(),
            vec![DiffItem {
                type_name: "Acme.Widget".to_string(),
                method: "Get".to_string(),
                reason: DiffReason::MethodRemoved,
                signature: Some("public int Get(int index)".to_string()),
            }],
            Vec::new(),
            vec![TypeRecord::new("Acme", "Widget", TypeKind::Class)],
        );
        assert!(!broken.is_compatible());
    }

    #[test]
    fn json_shape_uses_camel_case_and_omits_empty_lists() {
        let result = DiffResult::new(&identity(), Vec::new(), Vec::new(), Vec::new());
        let json = result.to_json();
        assert_eq!(json["packageId"], "Acme.Widgets");
        assert_eq!(json["versionFrom"], "1.0.0");
        assert_eq!(json["versionTo"], "2.0.0");
        assert_eq!(json["tfm"], "net8.0");
        assert_eq!(json["compatible"], true);
        assert!(json.get("breaking").is_none());
        assert!(json.get("added").is_none());
        assert!(json.get("removed").is_none());
    }

    #[test]
    fn stored_compatible_flag_is_recomputed() {
        let json = serde_json::json!({
            "packageId": "Acme.Widgets",
            "versionFrom": "1.0.0",
            "versionTo": "2.0.0",
            "tfm": "net8.0",
            "breaking": [{"type": "Acme.Widget", "method": "Get", "reason": "method removed"}],
            "compatible": true
        });
        let result: DiffResult = serde_json::from_value(json).unwrap();
        assert!(!result.is_compatible());
        assert_eq!(result.to_json()["compatible"], false);

        let clean: DiffResult = serde_json::from_value(serde_json::json!({
            "packageId": "Acme.Widgets",
            "versionFrom": "1.0.0",
            "versionTo": "2.0.0",
            "tfm": "net8.0",
            "compatible": false
        }))
        .unwrap();
        assert!(clean.is_compatible());
    }

    #[test]
    fn reasons_serialize_as_phrases() {
        let item = DiffItem {
            type_name: "T".to_string(),
            method: "M".to_string(),
            reason: DiffReason::SignatureModified,
            signature: None,
        };
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["reason"], "signature modified");
        assert!(json.get("signature").is_none());
    }
}
