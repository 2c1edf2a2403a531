use std::net::SocketAddr;
use std::path::PathBuf;

use bigram::coordinator::{self, Coordinator, ServeOptions};
use bigram::logging::init_logging;
use bigram::{JobConfig, JobKind, ReduceMode};
use clap::Parser;
use tracing::info;

/// Serves one bigram job to workers over tarpc.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Input directory, read recursively; entries starting with `_` are skipped
    #[arg(long)]
    input: PathBuf,
    /// Output directory, replaced if it exists
    #[arg(long)]
    output: PathBuf,
    /// Directory for intermediate map output, shared with the workers
    #[arg(long, default_value = "./intermediate")]
    work_dir: PathBuf,
    /// Number of reducer partitions
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u64).range(1..))]
    reducers: u64,
    /// Number of map tasks the input files are dealt into
    #[arg(long, default_value_t = 4)]
    maps: usize,
    #[arg(long, value_enum, default_value_t = JobKind::Frequency)]
    kind: JobKind,
    #[arg(long, value_enum, default_value_t = ReduceMode::Streaming)]
    reduce_mode: ReduceMode,
    /// Skip map-side combining
    #[arg(long)]
    no_combine: bool,
    #[arg(long, default_value = "[::1]:50051")]
    listen: SocketAddr,
    /// Maximum number of concurrently connected workers
    #[arg(long, default_value_t = 10)]
    max_workers: usize,
    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let config = JobConfig::new(args.kind)
        .set_reducers(args.reducers as usize)
        .set_combine(!args.no_combine)
        .set_reduce_mode(args.reduce_mode);
    info!(input = %args.input.display(), output = %args.output.display(), ?config, "starting coordinator");

    let coordinator =
        Coordinator::from_input_dir(&args.input, args.maps, config, args.work_dir, args.output)?;
    let options = ServeOptions {
        max_workers: args.max_workers,
        ..ServeOptions::default()
    };
    coordinator::run(coordinator, args.listen, options, |addr| {
        info!("waiting for workers on {}", addr)
    })
    .await
}
