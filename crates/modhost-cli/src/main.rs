#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::uninlined_format_args)]

mod commands;
mod logging;

use clap::Parser;
use miette::Result;
use modhost_core::{Config, ResolveMode};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "modhost")]
#[command(author, version, about = "Inspect Node-compatible module resolution", long_about = None)]
struct Cli {
    /// Increase logging verbosity (-v for DEBUG, -vv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit JSON formatted output (stable, machine-readable)
    #[arg(long, global = true)]
    json: bool,

    /// Override the working directory
    #[arg(long, global = true, value_name = "PATH")]
    cwd: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Print version information
    Version,

    /// Resolve a module specifier the way require() or import would
    Resolve {
        /// The specifier to resolve (e.g. "./util", "lodash/fp", "#internal")
        specifier: String,

        /// File the specifier is written in (defaults to the root)
        #[arg(long, value_name = "FILE")]
        from: Option<PathBuf>,

        /// Resolution mode, which selects the export conditions
        #[arg(long, value_enum, default_value_t = ModeArg::Require)]
        mode: ModeArg,

        /// Resolve inside a bundle built from this directory instead of the filesystem
        #[arg(long, value_name = "DIR")]
        bundle: Option<PathBuf>,

        /// Show each resolution step
        #[arg(long)]
        trace: bool,
    },

    /// Print the CommonJS rewrite of an ES module file
    Transpile {
        /// The file to rewrite
        file: PathBuf,
    },
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum ModeArg {
    Import,
    Require,
}

impl From<ModeArg> for ResolveMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Import => ResolveMode::Import,
            ModeArg::Require => ResolveMode::Require,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let cwd = cli
        .cwd
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."));

    let config = Config::new(cwd.clone())
        .with_verbosity(cli.verbose)
        .with_json_logs(cli.json);

    logging::init(config.verbosity, config.json_logs);

    match cli.command {
        Some(Commands::Version) | None => commands::version::run(),
        Some(Commands::Resolve {
            specifier,
            from,
            mode,
            bundle,
            trace,
        }) => {
            let span = tracing::info_span!("resolve", cmd = "resolve", cwd = %cwd.display());
            let _guard = span.enter();
            let action = commands::resolve::ResolveAction {
                specifier: &specifier,
                from: from.as_deref(),
                mode: mode.into(),
                bundle: bundle.as_deref(),
                trace,
            };
            commands::resolve::run(&config.cwd, &action, config.json_logs)
        }
        Some(Commands::Transpile { file }) => {
            let span = tracing::info_span!("transpile", cmd = "transpile", cwd = %cwd.display());
            let _guard = span.enter();
            commands::transpile::run(&config.cwd, &file, config.json_logs)
        }
    }
}
