use std::path::Path;

use surface_analyze::compare;
use surface_core::extract_surface;
use surface_interchange::{
    surface_from_json, ApiSurface, DiffIdentity, PackageIdentity, PackageVersion,
};

use super::{load_options, stage_package, Context};
use crate::error::CliError;
use crate::{LoadArgs, OutputFormat};

/// Values given on the command line that take precedence over what the
/// packages themselves say.
pub(crate) struct IdentityOverrides {
    pub(crate) id: Option<String>,
    pub(crate) from_version: Option<String>,
    pub(crate) to_version: Option<String>,
}

/// One side of a comparison with whatever identity it carried.
struct Side {
    surface: ApiSurface,
    id: Option<String>,
    version: Option<String>,
    variant: Option<String>,
}

/// Compare two packages or snapshots. Exit code 1 when breaking changes
/// were found.
pub(crate) fn cmd_diff(
    ctx: &Context,
    from: &Path,
    to: &Path,
    load: &LoadArgs,
    overrides: IdentityOverrides,
) -> Result<i32, CliError> {
    let old = load_side(ctx, from, load, load.variant.tfm.as_deref())?;
    // Without an explicit target, the newer package is matched against the
    // variant chosen for the older one.
    let target = load.variant.tfm.as_deref().or(old.variant.as_deref());
    let new = load_side(ctx, to, load, target)?;

    let id = overrides
        .id
        .or_else(|| new.id.clone())
        .or_else(|| old.id.clone())
        .ok_or_else(|| CliError::Request("cannot determine package id; pass --id".to_string()))?;
    let version_from = side_version(overrides.from_version, &old, from, "--from-version")?;
    let version_to = side_version(overrides.to_version, &new, to, "--to-version")?;
    PackageIdentity::new(&id, version_from.as_str())?;
    PackageIdentity::new(&id, version_to.as_str())?;

    let tfm = new
        .variant
        .or(old.variant)
        .or_else(|| load.variant.tfm.clone())
        .unwrap_or_default();
    let identity = DiffIdentity::new(id, version_from.as_str(), version_to.as_str(), tfm);
    let result = compare(&old.surface, &new.surface, &identity);

    match ctx.output {
        OutputFormat::Json => ctx.print_json(&result.to_json())?,
        OutputFormat::Text => println!("{}", result.to_text()),
    }
    Ok(if result.is_compatible() { 0 } else { 1 })
}

fn load_side(
    ctx: &Context,
    path: &Path,
    load: &LoadArgs,
    tfm: Option<&str>,
) -> Result<Side, CliError> {
    let (stem_id, stem_version) = split_file_stem(path);
    if is_snapshot(path) {
        let text = std::fs::read_to_string(path).map_err(|e| {
            CliError::Request(format!("failed to read snapshot {}: {}", path.display(), e))
        })?;
        let value: serde_json::Value = serde_json::from_str(&text).map_err(|e| {
            CliError::Request(format!("invalid snapshot {}: {}", path.display(), e))
        })?;
        return Ok(Side {
            surface: surface_from_json(&value)?,
            id: stem_id,
            version: stem_version,
            variant: None,
        });
    }

    let staged = stage_package(ctx, path, tfm, false)?;
    let surface = extract_surface(
        staged.binaries(),
        &load_options(load),
        false,
        load.namespace.as_deref(),
        &ctx.cancel,
    )?;
    let (id, version) = match &staged.manifest {
        Some(m) => (Some(m.id.clone()), Some(m.version.clone())),
        None => (stem_id, stem_version),
    };
    Ok(Side {
        surface,
        id,
        version,
        variant: Some(staged.variant().to_string()),
    })
}

fn side_version(
    explicit: Option<String>,
    side: &Side,
    path: &Path,
    flag: &str,
) -> Result<PackageVersion, CliError> {
    let text = explicit.or_else(|| side.version.clone()).ok_or_else(|| {
        CliError::Request(format!(
            "cannot determine version of {}; pass {}",
            path.display(),
            flag
        ))
    })?;
    Ok(PackageVersion::parse(&text)?)
}

fn is_snapshot(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"))
}

/// Split a `<Id>.<Version>` file stem. The version starts at the first
/// dot-separated part that begins a parseable version.
fn split_file_stem(path: &Path) -> (Option<String>, Option<String>) {
    let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
        return (None, None);
    };
    let parts: Vec<&str> = stem.split('.').collect();
    for i in 1..parts.len() {
        if !parts[i].starts_with(|c: char| c.is_ascii_digit()) {
            continue;
        }
        let version = parts[i..].join(".");
        if PackageVersion::parse(&version).is_ok() {
            return (Some(parts[..i].join(".")), Some(version));
        }
    }
    (Some(stem.to_string()), None)
}
