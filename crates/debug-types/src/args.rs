//! The DWARF tool's command-line surface (§6.2).

use std::path::PathBuf;

use clap::Parser;
use scan_core::cli::ThreadsArg;

#[derive(Parser, Debug)]
#[command(
    name = "debug-types",
    version,
    about = "Computes 64-bit structural signatures for DWARF type DIEs and counts unique types."
)]
pub struct Cli {
    /// The object file to scan.
    pub input: PathBuf,

    #[command(flatten)]
    pub threads: ThreadsArg,

    /// Disable the live progress display.
    #[arg(long = "no-progress")]
    pub no_progress: bool,

    /// Write the `{total, types, unique, producer}` count report as JSON to
    /// this path, or `-` for stdout.
    #[arg(long = "count")]
    pub count: Option<String>,

    /// Write the type-context map as JSON to this path, or `-` for stdout.
    #[arg(long = "contexts")]
    pub contexts: Option<String>,
}

// `--response-file PATH` and bare `@PATH` tokens are expanded by
// `scan_core::cli::expand_args` before `Cli::parse_from` ever sees the
// argument stream (see `main.rs`), as in the COMDAT tool.

impl Cli {
    pub fn resolved_threads(&self) -> usize {
        self.threads.resolved()
    }
}
