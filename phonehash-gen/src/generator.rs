use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::fs;
use tokio_util::sync::CancellationToken;

use crate::accumulator::ShardAccumulator;
use crate::config::GeneratorConfig;
use crate::digest::HashAlgorithm;
use crate::enumerate::IdentifierSpace;
use crate::error::Error;
use crate::writer::ShardSet;

/// Summary of a completed run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub prefixes_processed: usize,
    /// Identifiers hashed, counted once per algorithm
    pub identifiers_hashed: u64,
    pub shards_sealed: usize,
    /// Remainders that overwrote an earlier identifier within one batch
    pub collisions: u64,
    pub bytes_written: u64,
}

/// Drives the whole pipeline: create artifacts, then for every prefix hash one
/// batch per algorithm and flush it, then seal.
#[derive(Debug, Clone)]
pub struct Generator {
    config: GeneratorConfig,
}

impl Generator {
    /// Validates `config`; nothing is written until [`Generator::run`].
    pub fn new(config: GeneratorConfig) -> Result<Self, Error> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Run to completion. `progress` is incremented once per fully processed
    /// prefix. `cancel` is checked before each prefix; a cancelled run leaves
    /// its artifacts unsealed and returns [`Error::Cancelled`].
    pub async fn run(
        &self,
        progress: Arc<AtomicU64>,
        cancel: CancellationToken,
    ) -> Result<RunReport, Error> {
        let config = &self.config;
        let prefixes = config.active_prefixes();
        let total = prefixes.len();

        prepare_output(config).await?;

        let mut sets = Vec::with_capacity(config.algorithms.len());
        for &algorithm in &config.algorithms {
            sets.push(
                ShardSet::create(
                    &config.output_dir,
                    algorithm,
                    config.shard_key_width,
                    config.concurrent_workers,
                    config.retry,
                )
                .await?,
            );
        }

        tracing::info!(
            prefixes = total,
            algorithms = ?config.algorithms,
            shards = config.shards_per_algorithm(),
            output = ?config.output_dir,
            "generating hashes"
        );

        let mut report = RunReport::default();
        let mut accumulator = ShardAccumulator::new(config.shard_key_width);

        for (completed, prefix) in prefixes.iter().enumerate() {
            if cancel.is_cancelled() {
                tracing::warn!(completed, total, "run cancelled, shard artifacts left unsealed");
                return Err(Error::Cancelled { completed, total });
            }

            let space = IdentifierSpace::new(prefix.clone(), config.suffix_width);
            for set in &mut sets {
                let algorithm = set.algorithm();
                let batch_space = space.clone();
                let (filled, collisions) = tokio::task::spawn_blocking(move || {
                    let collisions = hash_batch(&mut accumulator, &batch_space, algorithm);
                    (accumulator, collisions)
                })
                .await?;
                accumulator = filled;

                if collisions > 0 {
                    tracing::warn!(prefix = space.prefix(), %algorithm, collisions, "remainder collisions, earlier identifiers superseded");
                }
                report.collisions += collisions;
                report.identifiers_hashed += config.identifiers_per_prefix();
                report.bytes_written += set.flush_batch(accumulator.drain_all()).await?;
            }

            report.prefixes_processed += 1;
            progress.fetch_add(1, Ordering::Relaxed);
            tracing::info!(prefix = space.prefix(), completed = completed + 1, total, "prefix processed");
        }

        tracing::info!("all hashes generated, sealing shard artifacts");
        for set in sets {
            let algorithm = set.algorithm();
            let sealed = set.seal_all().await?;
            tracing::info!(%algorithm, shards = sealed.len(), "shard artifacts sealed");
            report.shards_sealed += sealed.len();
        }

        Ok(report)
    }
}

/// Hash every identifier of `space` into `accumulator`. Returns how many
/// entries superseded an earlier one.
pub fn hash_batch(
    accumulator: &mut ShardAccumulator,
    space: &IdentifierSpace,
    algorithm: HashAlgorithm,
) -> u64 {
    let mut collisions = 0;
    for identifier in space {
        let digest = algorithm.digest(&identifier);
        if accumulator.record_digest(&digest, identifier) {
            collisions += 1;
        }
    }
    collisions
}

async fn prepare_output(config: &GeneratorConfig) -> Result<(), Error> {
    if fs::try_exists(&config.output_dir).await? {
        if !config.force {
            return Err(Error::FileExists { path: config.output_dir.clone() });
        }
        tracing::info!(output = ?config.output_dir, "removing existing output");
        fs::remove_dir_all(&config.output_dir).await?;
    }
    fs::create_dir_all(&config.output_dir).await?;
    Ok(())
}
