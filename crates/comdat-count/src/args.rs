//! The COMDAT tool's command-line surface (§6.2).

use std::path::PathBuf;

use clap::Parser;
use scan_core::cli::ThreadsArg;

#[derive(Parser, Debug)]
#[command(
    name = "comdat-count",
    version,
    about = "Aggregates duplicated COMDAT link-once groups across a tree of object files."
)]
pub struct Cli {
    /// Input files or directories; directories recurse.
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,

    #[command(flatten)]
    pub threads: ThreadsArg,

    /// Output path, or `-` for stdout.
    #[arg(short = 'o', long = "output", default_value = "-")]
    pub output: String,

    /// Suppress per-file skip notices. May be combined with `--verbose`;
    /// quiet wins for skip-notice suppression regardless of verbosity level.
    #[arg(short = 'q', long = "quiet")]
    pub quiet: bool,

    /// Print additional diagnostics.
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbose: u8,
}

// `--response-file PATH` and bare `@PATH` tokens are expanded by
// `scan_core::cli::expand_args` before `Cli::parse_from` ever sees the
// argument stream (see `main.rs`), so they don't appear as a field here.

impl Cli {
    pub fn resolved_threads(&self) -> usize {
        self.threads.resolved()
    }
}
