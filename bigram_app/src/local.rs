use std::path::PathBuf;
use std::time::Instant;

use bigram::logging::init_logging;
use bigram::pipeline::run_dir;
use bigram::{Job, JobConfig, JobKind, ReduceMode};
use clap::Parser;
use tracing::info;

/// Runs a bigram job in this process, one thread per input file and per partition.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Input directory, read recursively; entries starting with `_` are skipped
    #[arg(long)]
    input: PathBuf,
    /// Output directory, replaced if it exists
    #[arg(long)]
    output: PathBuf,
    /// Number of reducer partitions
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u64).range(1..))]
    reducers: u64,
    #[arg(long, value_enum, default_value_t = JobKind::Frequency)]
    kind: JobKind,
    #[arg(long, value_enum, default_value_t = ReduceMode::Streaming)]
    reduce_mode: ReduceMode,
    /// Skip map-side combining
    #[arg(long)]
    no_combine: bool,
    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    info!(" - input path: {}", args.input.display());
    info!(" - output path: {}", args.output.display());
    info!(" - number of reducers: {}", args.reducers);

    let job = Job::new(
        JobConfig::new(args.kind)
            .set_reducers(args.reducers as usize)
            .set_combine(!args.no_combine)
            .set_reduce_mode(args.reduce_mode),
    )?;

    let start = Instant::now();
    let written = run_dir(&job, &args.input, &args.output)?;
    info!(
        "Job finished in {:.3} seconds, {} partition files",
        start.elapsed().as_secs_f64(),
        written.len()
    );
    Ok(())
}
