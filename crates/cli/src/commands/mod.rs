pub(crate) mod diff;
pub(crate) mod methods;
pub(crate) mod types;
pub(crate) mod variants;

use std::path::Path;

use serde::Serialize;
use surface_core::{CancelToken, LoadOptions};
use surface_package::{
    extract, ExtractOptions, ExtractOutcome, Extraction, NuspecManifest, ZipPackage,
};

use crate::error::CliError;
use crate::platform::resolve_platform_dir;
use crate::{LoadArgs, OutputFormat};

/// Settings shared by every command.
pub(crate) struct Context {
    pub(crate) output: OutputFormat,
    pub(crate) quiet: bool,
    pub(crate) cancel: CancelToken,
}

impl Context {
    /// Print a value as pretty JSON on stdout.
    pub(crate) fn print_json<T: Serialize>(&self, value: &T) -> Result<(), CliError> {
        let text = serde_json::to_string_pretty(value)
            .map_err(|e| CliError::Request(format!("serialization error: {}", e)))?;
        println!("{}", text);
        Ok(())
    }

    /// Print an informational line to stderr unless quiet.
    pub(crate) fn note(&self, message: &str) {
        if !self.quiet && self.output == OutputFormat::Text {
            eprintln!("{}", message);
        }
    }
}

/// A package opened and one of its variants staged on disk.
pub(crate) struct StagedPackage {
    pub(crate) manifest: Option<NuspecManifest>,
    pub(crate) extraction: Extraction,
}

impl StagedPackage {
    pub(crate) fn binaries(&self) -> &[std::path::PathBuf] {
        &self.extraction.binaries
    }

    pub(crate) fn variant(&self) -> &str {
        self.extraction.selection.selected.as_deref().unwrap_or_default()
    }
}

/// Open a `.nupkg`, select a variant and stage its binaries.
pub(crate) fn stage_package(
    ctx: &Context,
    path: &Path,
    tfm: Option<&str>,
    include_docs: bool,
) -> Result<StagedPackage, CliError> {
    let mut package = ZipPackage::open(path)?;
    let manifest = match NuspecManifest::from_archive(&mut package) {
        Ok(manifest) => manifest,
        Err(e) => {
            tracing::warn!(package = %path.display(), error = %e, "ignoring unreadable manifest");
            None
        }
    };
    let options = ExtractOptions {
        include_docs,
        ..ExtractOptions::default()
    };
    match extract(&mut package, tfm, &options, &ctx.cancel)? {
        ExtractOutcome::Extracted(extraction) => {
            ctx.note(&format!(
                "{}: variant {} ({} group, {} binaries)",
                path.display(),
                extraction.selection.selected.as_deref().unwrap_or_default(),
                extraction.group,
                extraction.binaries.len()
            ));
            Ok(StagedPackage {
                manifest,
                extraction,
            })
        }
        ExtractOutcome::Unresolved { selection, reason } => {
            Err(CliError::Unresolved { reason, selection })
        }
    }
}

pub(crate) fn load_options(load: &LoadArgs) -> LoadOptions {
    LoadOptions {
        platform_dir: resolve_platform_dir(load.platform_dir.as_deref()),
    }
}
