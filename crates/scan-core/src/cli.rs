//! Shared CLI plumbing: response-file expansion and the `--threads` argument
//! group, flattened into both binaries' `clap` derive structs (§4.14) rather
//! than duplicated.

use std::path::Path;

/// Parses a thread-count argument, rejecting `0` (the engines need at least
/// one worker to make progress).
pub fn parse_num_threads(arg: &str) -> Result<usize, String> {
    let n: usize = arg.parse().map_err(|_| format!("not a number: {arg}"))?;
    if n == 0 {
        return Err("thread count must be at least 1".to_string());
    }
    Ok(n)
}

/// The `--threads`/`-t` flag, shared by both tools via `#[command(flatten)]`
/// rather than each declaring its own copy of the field.
#[derive(clap::Args, Debug)]
pub struct ThreadsArg {
    /// Number of worker threads. Defaults to the available hardware
    /// concurrency, with a floor of 1.
    #[arg(short = 't', long = "threads", value_parser = parse_num_threads)]
    pub threads: Option<usize>,
}

impl ThreadsArg {
    pub fn resolved(&self) -> usize {
        self.threads.unwrap_or_else(num_cpus::get).max(1)
    }
}

/// Expands response files (`--response-file PATH`, or a bare `@PATH` token)
/// into the raw argument stream, recursively, before `clap` ever sees them.
///
/// A response file's contents are split on ASCII whitespace and spliced in
/// place of the `@file` token (or immediately after `--response-file PATH`).
/// Nesting is allowed; a recursion guard prevents an `@file` that refers to
/// itself from looping forever.
pub fn expand_args<I>(args: I) -> Result<Vec<String>, std::io::Error>
where
    I: IntoIterator<Item = String>,
{
    let mut out = Vec::new();
    let mut depth_guard = Vec::new();
    expand_into(args.into_iter().collect(), &mut out, &mut depth_guard)?;
    Ok(out)
}

const MAX_RESPONSE_FILE_DEPTH: usize = 16;

fn expand_into(
    args: Vec<String>,
    out: &mut Vec<String>,
    seen: &mut Vec<std::path::PathBuf>,
) -> Result<(), std::io::Error> {
    let mut iter = args.into_iter().peekable();
    while let Some(arg) = iter.next() {
        if let Some(path) = arg.strip_prefix('@') {
            expand_response_file(Path::new(path), out, seen)?;
            continue;
        }
        if arg == "--response-file" {
            if let Some(path) = iter.next() {
                expand_response_file(Path::new(&path), out, seen)?;
                continue;
            }
        }
        out.push(arg);
    }
    Ok(())
}

fn expand_response_file(
    path: &Path,
    out: &mut Vec<String>,
    seen: &mut Vec<std::path::PathBuf>,
) -> Result<(), std::io::Error> {
    let canonical = path
        .canonicalize()
        .unwrap_or_else(|_| path.to_path_buf());
    if seen.contains(&canonical) || seen.len() >= MAX_RESPONSE_FILE_DEPTH {
        return Ok(());
    }
    seen.push(canonical);

    let contents = std::fs::read_to_string(path)?;
    let tokens: Vec<String> = contents.split_whitespace().map(str::to_string).collect();
    expand_into(tokens, out, seen)?;

    seen.pop();
    Ok(())
}
