mod args;
mod context;
mod counts;
mod signature;

use std::collections::HashMap;
use std::io::Write;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use crossbeam_channel::unbounded;

use args::Cli;
use context::{ContextMap, DieKey, TypeContext};
use counts::{CountReport, TypeCounts};
use scan_core::progress::{LiveProgress, Progress, SilentProgress};
use scan_core::provider::{load_dwarf, DwarfReader, MappedFile};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let raw_args: Vec<String> = std::env::args().collect();
    let expanded = scan_core::cli::expand_args(raw_args).context("expanding response files")?;
    let cli = Cli::parse_from(expanded);

    match run(cli) {
        Ok(()) => Ok(()),
        Err(e) => {
            log::error!("{e:#}");
            std::process::exit(1);
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let num_threads = cli.resolved_threads();

    let mapped = MappedFile::open(&cli.input).context("opening input file")?;
    let obj = mapped.parse().context("parsing object file")?;
    let dwarf = load_dwarf(&obj).context("loading DWARF sections")?;

    let units: Vec<gimli::Unit<DwarfReader>> = {
        let mut units = Vec::new();
        let mut headers = dwarf.units();
        while let Some(header) = headers
            .next()
            .context("reading compilation unit header")?
        {
            units.push(dwarf.unit(header).context("parsing compilation unit")?);
        }
        units
    };

    // Phase 1 (§4.9): build the type-context map, one worker per CU.
    let context_map = ContextMap::new();
    {
        let (sender, receiver) = unbounded();
        for cu_index in 0..units.len() {
            sender.send(cu_index).expect("receiver outlives this loop");
        }
        drop(sender);

        let progress = new_progress(cli.no_progress, "Building type contexts", units.len());
        let dwarf_ref = &dwarf;
        let units_ref = &units;
        let context_map_ref = &context_map;
        let ok = scan_core::workers::drive(num_threads, receiver, progress.as_ref(), {
            move |cu_index: usize| {
                context::walk_unit(dwarf_ref, cu_index, &units_ref[cu_index], context_map_ref)
            }
        });
        drop(progress);
        if !ok {
            anyhow::bail!("a worker encountered a fatal error while building type contexts");
        }
    }

    let total_dies = context_map.total_dies();
    let contexts: HashMap<DieKey, TypeContext> = context_map.into_inner();

    if let Some(path) = &cli.contexts {
        write_contexts_json(path, &units, &contexts)?;
    }

    // Phase 2 (§4.10, §4.11): one signature computation per recorded type DIE.
    // The queue carries slices of up to 100 keys each (§5) rather than one
    // key per item, so a worker's per-pop overhead is amortised across a
    // batch instead of the whole 2-phase pipeline being dominated by channel
    // contention on tiny, cheap items.
    const SIGNATURE_SLICE_LEN: usize = 100;
    let counts = TypeCounts::new();
    {
        let (sender, receiver) = unbounded();
        let mut keys: Vec<DieKey> = contexts.keys().copied().collect();
        keys.sort_by_key(|(cu, offset)| (*cu, offset.0));
        let slice_count = keys.chunks(SIGNATURE_SLICE_LEN).count();
        for chunk in keys.chunks(SIGNATURE_SLICE_LEN) {
            sender
                .send(chunk.to_vec())
                .expect("receiver outlives this loop");
        }
        drop(sender);

        let progress = new_progress(cli.no_progress, "Computing type signatures", slice_count);
        let dwarf_ref = &dwarf;
        let units_ref = &units;
        let contexts_ref = &contexts;
        let counts_ref = &counts;
        let ok = scan_core::workers::drive(num_threads, receiver, progress.as_ref(), {
            move |slice: Vec<DieKey>| {
                for (cu_index, offset) in slice {
                    let producer = contexts_ref
                        .get(&(cu_index, offset))
                        .map(|c| c.producer.clone())
                        .unwrap_or_else(|| Arc::from(""));
                    let signature = signature::compute_signature(
                        dwarf_ref,
                        &units_ref[cu_index],
                        cu_index,
                        offset,
                        contexts_ref,
                    )?;
                    counts_ref.record(signature, &producer);
                }
                Ok(())
            }
        });
        drop(progress);
        if !ok {
            anyhow::bail!("a worker encountered a fatal error while computing type signatures");
        }
    }

    if let Some(path) = &cli.count {
        let report = CountReport {
            total: total_dies,
            types: counts.types(),
            unique: counts.unique(),
            producer: counts.producer_string(),
        };
        write_json(path, &report)?;
    }

    Ok(())
}

fn new_progress(no_progress: bool, label: &str, total: usize) -> Box<dyn Progress> {
    if no_progress {
        Box::new(SilentProgress)
    } else {
        let live = LiveProgress::new(label);
        live.run();
        live.total(total as u64);
        Box::new(live)
    }
}

fn write_json<T: serde::Serialize>(output: &str, value: &T) -> Result<()> {
    if output == "-" {
        let stdout = std::io::stdout();
        let mut lock = stdout.lock();
        serde_json::to_writer_pretty(&mut lock, value).context("writing JSON to stdout")?;
        writeln!(lock).ok();
        lock.flush().context("flushing stdout")?;
    } else {
        let file = std::fs::File::create(output)
            .with_context(|| format!("creating output file {output}"))?;
        let mut writer = std::io::BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, value)
            .with_context(|| format!("writing JSON to {output}"))?;
        writeln!(writer).ok();
        writer
            .flush()
            .with_context(|| format!("flushing output file {output}"))?;
    }
    Ok(())
}

/// Converts each recorded type DIE's unit-relative key into the section-wide
/// `.debug_info` offset for the diagnostic dump (§6.3: `{"offset": N, ...}`),
/// since that offset is otherwise meaningful only together with its unit.
fn write_contexts_json(
    output: &str,
    units: &[gimli::Unit<DwarfReader>],
    contexts: &HashMap<DieKey, TypeContext>,
) -> Result<()> {
    #[derive(serde::Serialize)]
    struct ContextEntry {
        offset: u64,
        context: String,
        producer: String,
    }

    let mut entries = Vec::with_capacity(contexts.len());
    for (&(cu_index, offset), ctx) in contexts {
        let unit = &units[cu_index];
        let global = offset
            .to_debug_info_offset(&unit.header)
            .map(|o| o.0.into_u64())
            .unwrap_or(offset.0.into_u64());
        entries.push(ContextEntry {
            offset: global,
            context: String::from_utf8_lossy(&ctx.context).into_owned(),
            producer: ctx.producer.to_string(),
        });
    }
    entries.sort_by_key(|e| e.offset);

    write_json(output, &entries)
}
