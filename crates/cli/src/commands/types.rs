use std::path::Path;

use surface_core::extract_public_types;

use super::{load_options, stage_package, Context};
use crate::error::CliError;
use crate::{LoadArgs, OutputFormat};

/// List the externally visible types of the selected variant.
pub(crate) fn cmd_types(ctx: &Context, package: &Path, load: &LoadArgs) -> Result<i32, CliError> {
    let staged = stage_package(ctx, package, load.variant.tfm.as_deref(), false)?;
    let mut types = extract_public_types(staged.binaries(), &load_options(load), &ctx.cancel)?;
    if let Some(prefix) = load.namespace.as_deref() {
        types.retain(|t| t.namespace.starts_with(prefix));
    }
    tracing::debug!(variant = staged.variant(), count = types.len(), "types extracted");

    match ctx.output {
        OutputFormat::Json => ctx.print_json(&types)?,
        OutputFormat::Text => {
            for t in &types {
                println!("{:<9} {}", t.kind.to_string(), t.full_name());
            }
        }
    }
    Ok(0)
}
