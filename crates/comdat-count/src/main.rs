mod aggregate;
mod args;
mod engine;
mod report;

use std::io::Write;

use anyhow::{bail, Context, Result};
use clap::Parser;

use args::Cli;
use engine::Engine;
use report::Report;
use scan_core::progress::{LiveProgress, Progress, SilentProgress};

fn main() -> Result<()> {
    let raw_args: Vec<String> = std::env::args().collect();
    let expanded = scan_core::cli::expand_args(raw_args).context("expanding response files")?;
    let cli = Cli::parse_from(expanded);

    let default_filter = if cli.quiet {
        "error"
    } else if cli.verbose > 0 {
        "debug"
    } else {
        "warn"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    let scratch_guard = scan_core::tempdir::ScratchGuard::new();
    let result = run(cli);
    drop(scratch_guard);

    match result {
        Ok(()) => Ok(()),
        Err(e) => {
            log::error!("{e:#}");
            std::process::exit(1);
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let num_threads = cli.resolved_threads();
    let (walker, receiver) = scan_core::walk::queue();
    let queued = walker
        .queue_input(&cli.inputs)
        .context("walking input paths")?;

    let progress: Box<dyn Progress> = if cli.quiet {
        Box::new(SilentProgress)
    } else {
        let live = LiveProgress::new("Scanning object files");
        live.run();
        Box::new(live)
    };
    progress.total(queued as u64);

    let engine = Engine::new();
    let ok = scan_core::workers::drive(num_threads, receiver, progress.as_ref(), {
        let engine = engine.clone();
        move |item| engine.process_item(item)
    });

    drop(progress);

    if !ok {
        bail!("a worker encountered a fatal error; no report was written");
    }

    let digest_hex = scan_core::md5::to_hex(&engine.digests.finalize());
    let aggregation = std::sync::Arc::try_unwrap(engine.aggregation)
        .unwrap_or_else(|_| panic!("worker pool has joined; aggregation map has a single owner"));
    let entries: Vec<_> = aggregation.into_inner().into_values().collect();
    let report = Report::build(entries, digest_hex);

    write_report(&cli.output, &report)
}

fn write_report(output: &str, report: &Report) -> Result<()> {
    if output == "-" {
        let stdout = std::io::stdout();
        let mut lock = stdout.lock();
        report
            .write_to(&mut lock)
            .context("writing report to stdout")?;
        lock.flush().context("flushing stdout")?;
    } else {
        let file = std::fs::File::create(output)
            .with_context(|| format!("creating output file {output}"))?;
        let mut writer = std::io::BufWriter::new(file);
        report
            .write_to(&mut writer)
            .with_context(|| format!("writing report to {output}"))?;
        writer
            .flush()
            .with_context(|| format!("flushing output file {output}"))?;
    }
    Ok(())
}
