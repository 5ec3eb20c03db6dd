use surface_core::LoadError;
use surface_interchange::{InterchangeError, RequestError};
use surface_package::{PackageError, Unresolved, VariantSelection};

use crate::OutputFormat;

/// Command failures, each with a fixed process exit code.
#[derive(Debug, thiserror::Error)]
pub(crate) enum CliError {
    /// Bad identity, version, arguments or snapshot.
    #[error("{0}")]
    Request(String),

    #[error(transparent)]
    Package(#[from] PackageError),

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error("{}", unresolved_message(.reason, .selection))]
    Unresolved {
        reason: Unresolved,
        selection: VariantSelection,
    },

    #[error("operation cancelled")]
    Cancelled,
}

impl CliError {
    pub(crate) fn exit_code(&self) -> i32 {
        match self {
            CliError::Request(_) => 2,
            CliError::Package(PackageError::Cancelled) => 130,
            CliError::Package(_) => 3,
            CliError::Load(LoadError::Cancelled) => 130,
            CliError::Load(LoadError::InvalidBinary { .. }) => 4,
            CliError::Load(LoadError::Io { .. }) => 3,
            CliError::Unresolved {
                reason: Unresolved::NoCompatibleVariant,
                ..
            } => 5,
            CliError::Unresolved { .. } => 3,
            CliError::Cancelled => 130,
        }
    }
}

impl From<RequestError> for CliError {
    fn from(e: RequestError) -> Self {
        CliError::Request(e.to_string())
    }
}

impl From<InterchangeError> for CliError {
    fn from(e: InterchangeError) -> Self {
        CliError::Request(format!("invalid snapshot: {}", e))
    }
}

fn unresolved_message(reason: &Unresolved, selection: &VariantSelection) -> String {
    match reason {
        Unresolved::NoBinaries => reason.to_string(),
        _ if selection.available.is_empty() => format!("{} for '{}'", reason, selection.target),
        _ => format!(
            "{} for '{}'; available: {}",
            reason,
            selection.target,
            selection.available.join(", ")
        ),
    }
}

/// Print an error to stderr in the selected output format.
pub(crate) fn report_error(err: &CliError, output: OutputFormat, quiet: bool) {
    match output {
        OutputFormat::Text => {
            if !quiet {
                eprintln!("error: {}", err);
            }
        }
        OutputFormat::Json => {
            let mut body = serde_json::json!({
                "error": err.to_string(),
                "exitCode": err.exit_code(),
            });
            if let CliError::Unresolved { selection, .. } = err {
                body["target"] = serde_json::json!(selection.target);
                body["available"] = serde_json::json!(selection.available);
            }
            eprintln!(
                "{}",
                serde_json::to_string_pretty(&body).unwrap_or_else(|_| err.to_string())
            );
        }
    }
}
