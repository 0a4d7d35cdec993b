use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use phonehash_gen::config::{
    DEFAULT_CONCURRENT_WORKERS, DEFAULT_OUTPUT_DIR, DEFAULT_SHARD_KEY_WIDTH, DEFAULT_SUFFIX_WIDTH,
};
use phonehash_gen::{Error, Generator, GeneratorConfig, HashAlgorithm, load_prefix_file};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "phonehash-gen")]
#[command(about = "Generate a sharded digest-to-phone-number lookup index as static JSON files")]
struct Args {
    /// Output root; one directory per algorithm is created inside it
    #[arg(short, long, default_value = DEFAULT_OUTPUT_DIR)]
    output: PathBuf,

    /// Hash algorithms to generate (sha1, sha256, sha512)
    #[arg(short, long, value_delimiter = ',', default_value = "sha256")]
    algorithm: Vec<HashAlgorithm>,

    /// Digits appended to each prefix
    #[arg(long, default_value_t = DEFAULT_SUFFIX_WIDTH)]
    suffix_width: usize,

    /// Hex characters of the digest used to pick a shard file
    #[arg(long, default_value_t = DEFAULT_SHARD_KEY_WIDTH)]
    shard_key_width: usize,

    /// Number of concurrent shard writers
    #[arg(short = 'j', long, default_value_t = DEFAULT_CONCURRENT_WORKERS)]
    concurrent_workers: usize,

    /// File with one prefix per line (default: built-in Kenyan mobile prefixes)
    #[arg(long)]
    prefixes: Option<PathBuf>,

    /// Only process the first two prefixes
    #[arg(long, env = "DEV", value_parser = clap::builder::FalseyValueParser::new())]
    reduced: bool,

    /// Overwrite existing output directory
    #[arg(long)]
    force: bool,

    /// Disable progress bar
    #[arg(long)]
    no_progress: bool,
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut config = GeneratorConfig::new(&args.output)
        .with_algorithms(args.algorithm)
        .with_suffix_width(args.suffix_width)
        .with_shard_key_width(args.shard_key_width)
        .with_concurrent_workers(args.concurrent_workers)
        .with_reduced(args.reduced)
        .with_force(args.force);
    if let Some(path) = &args.prefixes {
        config = config.with_prefixes(load_prefix_file(path).await?);
    }

    let generator = match Generator::new(config) {
        Ok(generator) => generator,
        Err(e) => {
            tracing::error!(error = %e, "invalid configuration");
            return Err(e);
        }
    };
    let total_prefixes = generator.config().active_prefixes().len() as u64;

    if generator.config().reduced {
        tracing::info!(prefixes = total_prefixes, "reduced mode");
    }

    // Stop between prefixes on Ctrl-C
    let cancel = CancellationToken::new();
    let cancel_on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, stopping after the current prefix");
            cancel_on_signal.cancel();
        }
    });

    // Set up progress bar
    let progress_counter = Arc::new(AtomicU64::new(0));
    let progress_bar = if !args.no_progress {
        let pb = ProgressBar::new(total_prefixes);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} prefixes ({percent}%) ETA {eta}")
                .expect("Invalid progress bar template")
                .progress_chars("#>-"),
        );
        Some(pb)
    } else {
        None
    };

    // Spawn progress updater task
    let progress_counter_clone = Arc::clone(&progress_counter);
    let progress_bar_clone = progress_bar.clone();
    let progress_task = tokio::spawn(async move {
        loop {
            tokio::time::sleep(Duration::from_millis(100)).await;
            let current = progress_counter_clone.load(Ordering::Relaxed);
            if let Some(ref pb) = progress_bar_clone {
                pb.set_position(current);
            }
            if current >= total_prefixes {
                break;
            }
        }
    });

    let result = generator.run(Arc::clone(&progress_counter), cancel).await;

    // Clean up progress
    progress_task.abort();
    if let Some(pb) = progress_bar {
        pb.set_position(progress_counter.load(Ordering::Relaxed));
        if result.is_ok() {
            pb.finish_with_message("done");
        } else {
            pb.abandon();
        }
    }

    match result {
        Ok(report) => {
            tracing::info!(
                prefixes = report.prefixes_processed,
                identifiers = report.identifiers_hashed,
                shards = report.shards_sealed,
                collisions = report.collisions,
                bytes = report.bytes_written,
                "completed OK"
            );
            Ok(())
        }
        Err(e) => {
            tracing::error!(error = %e, "generation failed");
            Err(e)
        }
    }
}
