use std::path::Path;

use serde::Serialize;
use surface_package::{list_variants, NuspecManifest, Unresolved, VariantSelection, ZipPackage};

use super::Context;
use crate::error::CliError;
use crate::{OutputFormat, VariantArgs};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct VariantsReport<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    manifest: Option<&'a NuspecManifest>,
    #[serde(flatten)]
    selection: &'a VariantSelection,
}

/// List the variants a package ships and the one that would be selected.
pub(crate) fn cmd_variants(
    ctx: &Context,
    package: &Path,
    variant: &VariantArgs,
) -> Result<i32, CliError> {
    let mut archive = ZipPackage::open(package)?;
    let manifest = NuspecManifest::from_archive(&mut archive)?;
    let available = list_variants(&archive);
    let requested = variant.tfm.as_deref();
    let selection = VariantSelection::resolve(requested, &available);

    if !selection.is_resolved() {
        return Err(CliError::Unresolved {
            reason: Unresolved::classify(requested, &available),
            selection,
        });
    }

    match ctx.output {
        OutputFormat::Json => ctx.print_json(&VariantsReport {
            manifest: manifest.as_ref(),
            selection: &selection,
        })?,
        OutputFormat::Text => {
            if let Some(manifest) = &manifest {
                if !ctx.quiet {
                    println!("{} {}", manifest.id, manifest.version);
                }
            }
            let selected = selection.selected.as_deref().unwrap_or_default();
            for name in &selection.available {
                let marker = if name == selected { "*" } else { " " };
                println!("{} {}", marker, name);
            }
            if !ctx.quiet {
                println!("target: {}", selection.target);
            }
        }
    }
    Ok(0)
}
