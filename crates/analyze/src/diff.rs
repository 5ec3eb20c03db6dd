use std::collections::{BTreeMap, BTreeSet};

use surface_interchange::{
    ApiSurface, DiffIdentity, DiffItem, DiffReason, DiffResult, MethodRecord, TypeRecord,
};

/// `(type, method, signature)`, compared by exact string equality.
type MethodKey<'a> = (&'a str, &'a str, &'a str);

fn keys(surface: &ApiSurface) -> BTreeSet<MethodKey<'_>> {
    surface.methods.iter().map(MethodRecord::sort_key).collect()
}

/// Signatures per `(type, method)` group.
fn groups<'a>(keys: &BTreeSet<MethodKey<'a>>) -> BTreeMap<(&'a str, &'a str), Vec<&'a str>> {
    let mut groups: BTreeMap<(&str, &str), Vec<&str>> = BTreeMap::new();
    for &(type_name, method, signature) in keys {
        groups.entry((type_name, method)).or_default().push(signature);
    }
    groups
}

/// Compare two API surfaces.
///
/// A method whose exact key disappears is breaking ("method removed") and
/// puts its declaring type in `removed`. Within a `(type, method)` group
/// present on both sides, each old overload whose exact signature is gone is
/// also reported as "signature modified", even when a compatible overload
/// remains. Types that gain methods are listed once in `added`.
///
/// Identical inputs always produce an empty, compatible result.
pub fn compare(from: &ApiSurface, to: &ApiSurface, identity: &DiffIdentity) -> DiffResult {
    let old = keys(from);
    let new = keys(to);

    let mut breaking = Vec::new();
    let mut removed_types = BTreeSet::new();
    for &(type_name, method, signature) in old.difference(&new) {
        breaking.push(item(type_name, method, DiffReason::MethodRemoved, signature));
        removed_types.insert(type_name);
    }

    let mut added_types = BTreeSet::new();
    for &(type_name, _, _) in new.difference(&old) {
        added_types.insert(type_name);
    }

    let new_groups = groups(&new);
    for ((type_name, method), signatures) in groups(&old) {
        if !new_groups.contains_key(&(type_name, method)) {
            continue;
        }
        for signature in signatures {
            if !new.contains(&(type_name, method, signature)) {
                breaking.push(item(type_name, method, DiffReason::SignatureModified, signature));
            }
        }
    }

    breaking.sort_by(|a, b| {
        (&a.type_name, &a.signature, &a.method, a.reason)
            .cmp(&(&b.type_name, &b.signature, &b.method, b.reason))
    });

    let (old_index, new_index) = (from.type_index(), to.type_index());
    let mut added: Vec<TypeRecord> = added_types
        .into_iter()
        .map(|t| new_index.type_record(t))
        .collect();
    let mut removed: Vec<TypeRecord> = removed_types
        .into_iter()
        .map(|t| old_index.type_record(t))
        .collect();
    added.sort();
    removed.sort();

    tracing::debug!(
        package = %identity.package_id,
        breaking = breaking.len(),
        added = added.len(),
        removed = removed.len(),
        "compared API surfaces"
    );
    DiffResult::new(identity, breaking, added, removed)
}

fn item(type_name: &str, method: &str, reason: DiffReason, signature: &str) -> DiffItem {
    DiffItem {
        type_name: type_name.to_string(),
        method: method.to_string(),
        reason,
        signature: Some(signature.to_string()),
    }
}
