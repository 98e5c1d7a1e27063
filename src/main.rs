//! snaplog-etl - parse NDT test archives into JSON rows
//!
//! Each archive is a tar (optionally gzipped) of test files. Archives are
//! processed in parallel, one task per archive; rows go to a JSON lines file
//! or stdout.

use anyhow::{bail, Context, Result};
use clap::Parser;
use flate2::read::GzDecoder;
use memmap2::Mmap;
use rayon::prelude::*;
use std::fs::File;
use std::io::{BufWriter, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use snaplog_etl::metrics::Counters;
use snaplog_etl::parsers::{NdtParser, VariableSchema};
use snaplog_etl::settings::EtlSettings;
use snaplog_etl::sink::{CollectingSink, JsonLinesSink, RowSink};
use snaplog_etl::source::TarSource;
use snaplog_etl::task::{Task, TaskSummary};

#[derive(Parser)]
#[command(name = "snaplog-etl")]
#[command(about = "Turn archived NDT snapshot logs into warehouse rows")]
#[command(version)]
struct Cli {
    /// Settings file (defaults to settings.json in the config directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Variable table overriding the configured one
    #[arg(short, long)]
    schema: Option<PathBuf>,

    /// JSON lines output file (defaults to stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Parse and count only, write no rows
    #[arg(long)]
    dry_run: bool,

    /// Worker threads
    #[arg(short, long)]
    workers: Option<usize>,

    /// Snapshots considered per log
    #[arg(long)]
    max_snapshots: Option<usize>,

    /// Write the effective settings to the config directory and exit
    #[arg(long)]
    save_config: bool,

    /// Test archives (.tar, .tgz, .tar.gz)
    archives: Vec<PathBuf>,
}

fn load_settings(cli: &Cli) -> Result<EtlSettings> {
    let mut settings = match &cli.config {
        Some(path) => EtlSettings::load_from(path)?,
        None => EtlSettings::load(),
    };
    if let Some(schema) = &cli.schema {
        settings.schema_path = Some(schema.clone());
    }
    if let Some(workers) = cli.workers {
        settings.workers = workers;
    }
    if let Some(max_snapshots) = cli.max_snapshots {
        settings.max_snapshots = max_snapshots;
    }
    settings.validate()?;
    Ok(settings)
}

fn open_sink(cli: &Cli) -> Result<Arc<dyn RowSink>> {
    if cli.dry_run {
        return Ok(Arc::new(CollectingSink::new()));
    }
    match &cli.output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            Ok(Arc::new(JsonLinesSink::new(BufWriter::new(file))))
        }
        None => Ok(Arc::new(JsonLinesSink::new(std::io::stdout()))),
    }
}

/// Run one archive through its own task
fn process_archive(
    path: &Path,
    settings: &EtlSettings,
    schema: &Arc<VariableSchema>,
    sink: &Arc<dyn RowSink>,
    counters: &Arc<Counters>,
) -> Result<TaskSummary> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    // Safety: the archive is opened read-only and not modified while mapped
    let mmap = unsafe { Mmap::map(&file) }
        .with_context(|| format!("Failed to map {}", path.display()))?;

    let name = path.to_string_lossy().into_owned();
    let lower = name.to_lowercase();
    let reader: Box<dyn Read + '_> = if lower.ends_with(".tgz") || lower.ends_with(".gz") {
        Box::new(GzDecoder::new(&mmap[..]))
    } else {
        Box::new(&mmap[..])
    };

    let mut archive = tar::Archive::new(reader);
    let source = TarSource::with_limit(&mut archive, settings.max_payload_bytes as u64)?;
    let parser = NdtParser::new(
        name.clone(),
        Arc::clone(schema),
        Arc::clone(sink),
        Arc::clone(counters),
    )
    .with_limits(settings.limits());

    let mut task = Task::new(name, source, parser);
    Ok(task.process_all_tests()?)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let settings = load_settings(&cli)?;

    if cli.save_config {
        settings.save()?;
        return Ok(());
    }
    if cli.archives.is_empty() {
        bail!("No archives given");
    }

    let schema_text = settings.schema_text()?;
    let schema = Arc::new(VariableSchema::parse(&schema_text).context("Invalid variable table")?);
    tracing::info!("Loaded {} schema variables", schema.len());

    let sink = open_sink(&cli)?;
    let counters = Arc::new(Counters::new(settings.table.clone()));

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(settings.workers)
        .build()?;

    let results: Vec<(PathBuf, Result<TaskSummary>)> = pool.install(|| {
        cli.archives
            .par_iter()
            .map(|path| {
                let result = process_archive(path, &settings, &schema, &sink, &counters);
                (path.clone(), result)
            })
            .collect()
    });

    let mut failed_archives = 0;
    for (path, result) in &results {
        if let Err(e) = result {
            failed_archives += 1;
            tracing::error!("{}: {:#}", path.display(), e);
        }
    }

    sink.flush()?;

    for (kind, outcome, count) in counters.summary() {
        tracing::info!(
            "{} {} {}: {}",
            counters.table(),
            kind.as_ref(),
            outcome.as_ref(),
            count
        );
    }

    if failed_archives > 0 {
        bail!("{} of {} archives failed", failed_archives, results.len());
    }
    Ok(())
}
