use std::path::PathBuf;

use bigram::logging::init_logging;
use bigram::report::{read_report, summarize_counts, top_followers};
use bigram::JobKind;
use clap::{Parser, Subcommand};

/// Summaries over the output of a finished job.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    #[command(subcommand)]
    command: Command,
    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Most likely words to follow WORD, from a frequency job's output
    Frequency {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        word: String,
        #[arg(long, default_value_t = 10)]
        top: usize,
    },
    /// Bigram statistics from a count job's output
    Count {
        #[arg(long)]
        input: PathBuf,
        #[arg(long, default_value_t = 10)]
        top: usize,
    },
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    match args.command {
        Command::Frequency { input, word, top } => {
            let records = read_report(&input, JobKind::Frequency)?;
            let followers = top_followers(&records, &word, top);
            match followers.marginal {
                Some(m) => println!("{} starts {} bigrams", word, m),
                None => println!("{} starts no bigrams", word),
            }
            println!("{} most frequent bigrams starting with {}:", top, word);
            for (right, frequency) in followers.top {
                println!("{}\t{}\t{:?}", word, right, frequency);
            }
        }
        Command::Count { input, top } => {
            let records = read_report(&input, JobKind::Count)?;
            let summary = summarize_counts(&records, top);
            println!("total number of unique bigrams: {}", summary.unique);
            println!("total number of bigrams: {}", summary.total);
            println!("number of bigrams that appear only once: {}", summary.singletons);
            println!("\n{} most frequent bigrams:", top);
            for (key, count) in summary.top {
                println!("{}\t{}\t{}", key.left, key.right, count);
            }
        }
    }
    Ok(())
}
