//! e2carve - recovers a deleted WebP file from an ext2 partition.
//!
//! Reads the raw device, finds the file's first block by its RIFF/WEBP
//! header and rebuilds the rest from indirect blocks left on disk.

mod custody;
mod engine;

use anyhow::Result;
use clap::Parser;
use e2carve_core::SignatureScanner;
use std::path::PathBuf;
use tracing::{debug, Level};

use engine::Options;

#[derive(Parser, Debug)]
#[command(name = "e2carve")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Device or image holding the MBR-partitioned disk.
    #[arg(short, long, default_value = "/dev/sdb")]
    device: PathBuf,

    /// Defaults to `recovered.<ext>` for the carved format.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Log every candidate block.
    #[arg(short, long, default_value_t = false)]
    verbose: bool,

    /// Require a short indirect block to point at the block right after it.
    #[arg(short, long, default_value_t = false)]
    strict: bool,

    /// Abort when the superblock magic is not 0xEF53.
    #[arg(long, default_value_t = false)]
    require_magic: bool,

    /// Log a marker when the scan reaches this block.
    #[arg(short, long, value_name = "BLOCK")]
    break_at: Option<u32>,

    /// Which start candidate to recover, counting from 0.
    #[arg(long = "start", value_name = "INDEX", default_value_t = 0)]
    start_index: usize,

    /// List candidates and exit without writing anything.
    #[arg(long, default_value_t = false)]
    scan_only: bool,

    #[arg(long, default_value_t = false)]
    no_progress: bool,
}

fn default_output(signature: &SignatureScanner) -> PathBuf {
    PathBuf::from(format!("recovered.{}", signature.extension()))
}

fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_max_level(if args.verbose { Level::DEBUG } else { Level::INFO })
        .with_writer(std::io::stderr)
        .init();

    let options = Options {
        device: args.device,
        output: args
            .output
            .unwrap_or_else(|| default_output(&SignatureScanner::webp())),
        strict: args.strict,
        require_magic: args.require_magic,
        break_at: args.break_at,
        start_index: args.start_index,
        scan_only: args.scan_only,
        progress: !args.no_progress,
    };

    let summary = engine::run(&options)?;
    debug!(
        indirect_candidates = summary.report.indirect_candidates.len(),
        recovered = summary.outcome.is_some(),
        custody = ?summary.custody_path,
        "done"
    );
    Ok(())
}
