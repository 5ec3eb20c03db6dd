mod commands;
mod error;
mod platform;

use std::path::PathBuf;
use std::process;

use clap::{Args, Parser, Subcommand, ValueEnum};
use surface_core::CancelToken;
use tracing_subscriber::EnvFilter;

use crate::error::{report_error, CliError};

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

/// Public API surface extraction and breaking-change diff for .NET packages.
#[derive(Parser)]
#[command(
    name = "surface",
    version,
    about = "Public API surface extraction and breaking-change diff for .NET packages"
)]
struct Cli {
    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text", value_enum)]
    output: OutputFormat,

    /// Suppress progress notes and log output; results are still printed
    #[arg(long, global = true)]
    quiet: bool,

    /// Log debug detail to stderr
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug, Clone)]
pub(crate) struct VariantArgs {
    /// Target framework to select the nearest compatible variant for
    /// (inferred from the package when omitted)
    #[arg(long, env = "SURFACE_TFM")]
    pub(crate) tfm: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub(crate) struct LoadArgs {
    #[command(flatten)]
    pub(crate) variant: VariantArgs,

    /// Directory of platform base-library binaries
    #[arg(long, env = "SURFACE_PLATFORM_DIR")]
    pub(crate) platform_dir: Option<PathBuf>,

    /// Only include types whose namespace starts with this prefix
    #[arg(long)]
    pub(crate) namespace: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// List the target framework variants of a package and the one selected
    Variants {
        /// Path to the .nupkg file
        package: PathBuf,
        #[command(flatten)]
        variant: VariantArgs,
    },

    /// List the externally visible types of the selected variant
    Types {
        /// Path to the .nupkg file
        package: PathBuf,
        #[command(flatten)]
        load: LoadArgs,
    },

    /// List public methods with rendered signatures and documentation
    Methods {
        /// Path to the .nupkg file
        package: PathBuf,
        #[command(flatten)]
        load: LoadArgs,
        /// Do not read XML documentation
        #[arg(long)]
        no_docs: bool,
    },

    /// Compare two package versions (or saved JSON snapshots) for breaking changes
    Diff {
        /// Older .nupkg file or JSON snapshot
        from: PathBuf,
        /// Newer .nupkg file or JSON snapshot
        to: PathBuf,
        #[command(flatten)]
        load: LoadArgs,
        /// Package id reported in the result
        #[arg(long)]
        id: Option<String>,
        /// Version reported for the older side
        #[arg(long)]
        from_version: Option<String>,
        /// Version reported for the newer side
        #[arg(long)]
        to_version: Option<String>,
    },
}

fn init_logging(verbose: bool, quiet: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else if quiet {
        EnvFilter::new("off")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    // stdout carries command output only.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    let output = cli.output;
    let quiet = cli.quiet;
    let code = match run(cli) {
        Ok(code) => code,
        Err(e) => {
            report_error(&e, output, quiet);
            e.exit_code()
        }
    };
    process::exit(code);
}

/// Run the command on a blocking worker while a ctrl-c listener flips the
/// cancel token.
fn run(cli: Cli) -> Result<i32, CliError> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .enable_all()
        .build()
        .map_err(|e| CliError::Request(format!("failed to start runtime: {}", e)))?;

    runtime.block_on(async move {
        let cancel = CancelToken::new();
        let listener = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::debug!("interrupt received, cancelling");
                    cancel.cancel();
                }
            })
        };

        let result = tokio::task::spawn_blocking(move || dispatch(cli, &cancel)).await;
        listener.abort();
        match result {
            Ok(result) => result,
            Err(e) if e.is_cancelled() => Err(CliError::Cancelled),
            Err(e) => Err(CliError::Request(format!("command failed: {}", e))),
        }
    })
}

fn dispatch(cli: Cli, cancel: &CancelToken) -> Result<i32, CliError> {
    let ctx = commands::Context {
        output: cli.output,
        quiet: cli.quiet,
        cancel: cancel.clone(),
    };
    match cli.command {
        Commands::Variants { package, variant } => {
            commands::variants::cmd_variants(&ctx, &package, &variant)
        }
        Commands::Types { package, load } => commands::types::cmd_types(&ctx, &package, &load),
        Commands::Methods {
            package,
            load,
            no_docs,
        } => commands::methods::cmd_methods(&ctx, &package, &load, !no_docs),
        Commands::Diff {
            from,
            to,
            load,
            id,
            from_version,
            to_version,
        } => commands::diff::cmd_diff(
            &ctx,
            &from,
            &to,
            &load,
            commands::diff::IdentityOverrides {
                id,
                from_version,
                to_version,
            },
        ),
    }
}
