//! A simple CLI app that reserves the disk space for a file and reports
//! the allocation before and after.

use anyhow::Context;
use clap::Parser;
use std::{fs::OpenOptions, path::PathBuf};
use tracing_subscriber::EnvFilter;

/// Preallocate the disk space for a file without changing its length.
#[derive(Debug, Parser)]
struct Args {
    /// The file to preallocate the space for.
    path: PathBuf,

    /// The amount of bytes to reserve.
    #[arg(allow_negative_numbers = true)]
    size: i64,

    /// Create the file if it doesn't exist.
    #[arg(long)]
    create: bool,

    /// Only report the geometry and the rounded size, don't reserve anything.
    #[arg(long)]
    dry_run: bool,

    /// Increase the log verbosity, can be repeated.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> Result<(), anyhow::Error> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let file = OpenOptions::new()
        .write(true)
        .create(args.create)
        .open(&args.path)
        .with_context(|| format!("unable to open {}", args.path.display()))?;

    match prealloc::query_volume_geometry(&file) {
        Ok(geometry) => {
            println!("volume geometry: {geometry:?}");
            let rounded = geometry.allocation_unit_size().and_then(|unit| {
                prealloc::rounded_allocation_size(args.size.max(0).unsigned_abs(), unit)
            });
            if let Some(rounded) = rounded {
                println!("rounded allocation size: {rounded}");
            }
        }
        Err(err) if err.is_soft() => println!("volume geometry is not available: {err}"),
        Err(err) => return Err(err).context("unable to query the volume geometry"),
    }

    let before = prealloc::allocated_size(&file)?;
    println!("allocated before: {before}");

    if args.dry_run {
        return Ok(());
    }

    match prealloc::preallocate(&file, args.size) {
        Ok(()) => {}
        Err(err) if err.is_soft() => println!("preallocation skipped: {err}"),
        Err(err) => return Err(err).context("unable to preallocate"),
    }

    let after = prealloc::allocated_size(&file)?;
    println!("allocated after: {after}");
    println!("reported length: {}", file.metadata()?.len());

    Ok(())
}

/// Log to stderr, honoring `RUST_LOG` and raising the default level with
/// each `-v`.
fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("prealloc={default_level}")));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
