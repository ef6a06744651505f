use anyhow::{Context, Result};
use e2carve_core::{
    BlockAccessor, BlockSource, Geometry, GeometryConfig, PartitionScanner, RecoveryConfig,
    RecoveryEngine, RecoveryOutcome, ScanConfig, ScanReport, SignatureScanner,
};
use e2carve_io::Reader;
use humansize::{format_size, BINARY};
use indicatif::{ProgressBar, ProgressStyle};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::info;

use crate::custody::{ChainOfCustody, HashingWriter};

const OUTPUT_BUFFER_SIZE: usize = 131_072;

#[derive(Debug, Clone)]
pub struct Options {
    pub device: PathBuf,
    pub output: PathBuf,
    pub strict: bool,
    pub require_magic: bool,
    pub break_at: Option<u32>,
    pub start_index: usize,
    pub scan_only: bool,
    pub progress: bool,
}

#[derive(Debug)]
pub struct Summary {
    pub report: ScanReport,
    pub outcome: Option<RecoveryOutcome>,
    pub custody_path: Option<PathBuf>,
}

/// Probe, scan and, unless `scan_only` is set, reconstruct one file.
pub fn run(options: &Options) -> Result<Summary> {
    let start_time = Instant::now();

    let mut reader = Reader::open(&options.device)
        .with_context(|| format!("Failed to open device: {}", options.device.display()))?;
    info!(
        device = %options.device.display(),
        access = reader.kind(),
        size = %format_size(reader.size(), BINARY),
        "opened device"
    );

    let geometry = Geometry::probe(
        &mut reader,
        &GeometryConfig {
            require_magic: options.require_magic,
        },
    )
    .context("Failed to read partition geometry")?;

    let mut accessor = BlockAccessor::new(reader, geometry);
    let report = scan(&mut accessor, options)?;

    println!(
        "Scanned {} blocks ({}) in {:.1}s",
        report.blocks_scanned,
        format_size(geometry.partition_bytes(), BINARY),
        start_time.elapsed().as_secs_f64()
    );
    println!(
        "Indirect candidates: {} ({} genuine, {} fake-short)",
        report.indirect_candidates.len(),
        report.genuine_count(),
        report.fake_short_count()
    );
    println!("Start candidates:    {}", report.start_candidates.len());

    if options.scan_only {
        print_candidates(&report, &geometry);
        return Ok(Summary {
            report,
            outcome: None,
            custody_path: None,
        });
    }

    let (outcome, custody_path) = recover(&mut accessor, &report, options)?;
    Ok(Summary {
        report,
        outcome: Some(outcome),
        custody_path: Some(custody_path),
    })
}

fn scan<S: BlockSource>(accessor: &mut BlockAccessor<S>, options: &Options) -> Result<ScanReport> {
    let block_count = accessor.geometry().block_count;
    let scanner = PartitionScanner::new(
        block_count,
        SignatureScanner::webp(),
        ScanConfig {
            strict: options.strict,
            break_at: options.break_at,
        },
    );

    let pb = if options.progress {
        ProgressBar::new(u64::from(block_count))
    } else {
        ProgressBar::hidden()
    };
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] [{bar:50.cyan/blue}] {pos}/{len} blocks ({eta})")?
            .progress_chars("##-"),
    );

    let report = scanner
        .scan_with_progress(accessor, |index| pb.set_position(u64::from(index) + 1))
        .context("Partition scan failed");
    pb.finish_and_clear();
    report
}

fn recover<S: BlockSource>(
    accessor: &mut BlockAccessor<S>,
    report: &ScanReport,
    options: &Options,
) -> Result<(RecoveryOutcome, PathBuf)> {
    let engine = RecoveryEngine::new(
        report,
        RecoveryConfig {
            start_index: options.start_index,
        },
    );
    let start = engine.start_candidate().context("No file to recover")?;
    let source_offset = accessor.geometry().block_offset(start.block);

    let file = File::create(&options.output)
        .with_context(|| format!("Failed to create output: {}", options.output.display()))?;
    let mut writer = HashingWriter::new(BufWriter::with_capacity(OUTPUT_BUFFER_SIZE, file));

    let result = engine.recover(accessor, &mut writer);
    let (_, sha256_hash) = writer.finish()?;
    let outcome = result.with_context(|| {
        format!(
            "Recovery failed; partial output left at {}",
            options.output.display()
        )
    })?;

    let custody = ChainOfCustody::new(
        &options.output,
        &options.device,
        source_offset,
        &outcome,
        sha256_hash,
    );
    let custody_path = custody.write(&options.output)?;

    print_outcome(&outcome, &options.output, &custody_path);
    Ok((outcome, custody_path))
}

fn print_candidates(report: &ScanReport, geometry: &Geometry) {
    println!("\n{:>10}  {:<10}  {:>13}", "BLOCK", "KIND", "FIRST POINTER");
    for c in &report.indirect_candidates {
        println!("{:>10}  {:<10}  {:>13}", c.block, c.kind, c.first_pointer);
    }

    println!("\n{:>10}  {:>18}  {:>12}", "BLOCK", "DEVICE OFFSET", "LENGTH");
    for s in &report.start_candidates {
        println!(
            "{:>10}  {:>#18x}  {:>12}",
            s.block,
            geometry.block_offset(s.block),
            format_size(s.declared_length, BINARY)
        );
    }
}

fn print_outcome(outcome: &RecoveryOutcome, output: &Path, custody_path: &Path) {
    let block = |b: Option<u32>| b.map_or_else(|| "-".to_string(), |b| b.to_string());

    println!("\nStart block:         {}", outcome.start_block);
    println!("Indirect block:      {}", block(outcome.indirect_block));
    println!("Double indirect:     {}", block(outcome.double_indirect_block));
    println!(
        "Written:             {} of {}{}",
        format_size(outcome.bytes_written, BINARY),
        format_size(outcome.declared_length, BINARY),
        if outcome.complete { "" } else { " (incomplete)" }
    );
    println!("Saved to:            {}", output.display());
    println!("Custody record:      {}", custody_path.display());
}
