use std::net::SocketAddr;
use std::time::Duration;

use bigram::logging::init_logging;
use bigram::worker::Worker;
use clap::Parser;
use tracing::info;

/// Runs map and reduce tasks for a coordinator until its job is done.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    #[arg(long, default_value = "[::1]:50051")]
    coordinator: SocketAddr,
    /// Milliseconds to wait between polls when no task is runnable
    #[arg(long, default_value_t = 500)]
    poll_ms: u64,
    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let mut worker =
        Worker::new(args.coordinator).set_poll_interval(Duration::from_millis(args.poll_ms));
    worker.start().await?;
    info!("worker started: {}", worker);
    worker.run().await?;
    Ok(())
}
