use std::path::Path;

use surface_core::extract_methods;
use surface_interchange::MethodRecord;

use super::{load_options, stage_package, Context};
use crate::error::CliError;
use crate::{LoadArgs, OutputFormat};

/// List public methods of the selected variant. The JSON form doubles as a
/// snapshot for `diff`.
pub(crate) fn cmd_methods(
    ctx: &Context,
    package: &Path,
    load: &LoadArgs,
    include_docs: bool,
) -> Result<i32, CliError> {
    let staged = stage_package(ctx, package, load.variant.tfm.as_deref(), include_docs)?;
    let methods = extract_methods(
        staged.binaries(),
        &load_options(load),
        include_docs,
        load.namespace.as_deref(),
        &ctx.cancel,
    )?;
    tracing::debug!(variant = staged.variant(), count = methods.len(), "methods extracted");

    match ctx.output {
        OutputFormat::Json => ctx.print_json(&methods)?,
        OutputFormat::Text => print_methods(&methods, ctx.quiet),
    }
    Ok(0)
}

fn print_methods(methods: &[MethodRecord], quiet: bool) {
    let mut current: Option<&str> = None;
    for m in methods {
        if current != Some(m.declaring_type.as_str()) {
            println!("{}", m.declaring_type);
            current = Some(&m.declaring_type);
        }
        println!("  {}", m.signature);
        if quiet {
            continue;
        }
        if let Some(summary) = &m.summary {
            println!("      {}", summary);
        }
    }
}
