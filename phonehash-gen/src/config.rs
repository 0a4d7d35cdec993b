use std::collections::HashSet;
use std::path::{Path, PathBuf};

use compact_str::CompactString;
use tokio::fs;

use crate::digest::HashAlgorithm;
use crate::error::Error;
use crate::partition::MAX_SHARD_KEY_WIDTH;
use crate::prefixes::KENYA_MOBILE;
use crate::writer::RetryPolicy;

pub const DEFAULT_OUTPUT_DIR: &str = "dist/v1/phone";
pub const DEFAULT_SUFFIX_WIDTH: usize = 6;
pub const DEFAULT_SHARD_KEY_WIDTH: usize = 4;
pub const DEFAULT_CONCURRENT_WORKERS: usize = 64;

/// Widest suffix accepted; one batch holds 10^width entries.
pub const MAX_SUFFIX_WIDTH: usize = 9;

/// Prefixes kept in reduced mode
pub const REDUCED_PREFIX_COUNT: usize = 2;

/// Everything a run needs, fixed before the first file is touched.
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    /// Root directory; each algorithm writes to `<output_dir>/<algorithm>/`
    pub output_dir: PathBuf,
    pub prefixes: Vec<CompactString>,
    pub algorithms: Vec<HashAlgorithm>,
    pub suffix_width: usize,
    pub shard_key_width: usize,
    pub concurrent_workers: usize,
    /// Only process the first [`REDUCED_PREFIX_COUNT`] prefixes. Output layout
    /// is unchanged.
    pub reduced: bool,
    /// Remove an existing output directory instead of failing
    pub force: bool,
    pub retry: RetryPolicy,
}

impl GeneratorConfig {
    /// Reference configuration: Kenyan mobile prefixes, sha256, 6-digit
    /// suffixes, 4-character shard keys.
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            prefixes: KENYA_MOBILE.iter().map(|p| CompactString::from(*p)).collect(),
            algorithms: vec![HashAlgorithm::Sha256],
            suffix_width: DEFAULT_SUFFIX_WIDTH,
            shard_key_width: DEFAULT_SHARD_KEY_WIDTH,
            concurrent_workers: DEFAULT_CONCURRENT_WORKERS,
            reduced: false,
            force: false,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_prefixes<I, S>(mut self, prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<CompactString>,
    {
        self.prefixes = prefixes.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_algorithms(mut self, algorithms: impl IntoIterator<Item = HashAlgorithm>) -> Self {
        self.algorithms = algorithms.into_iter().collect();
        self
    }

    pub fn with_suffix_width(mut self, width: usize) -> Self {
        self.suffix_width = width;
        self
    }

    pub fn with_shard_key_width(mut self, width: usize) -> Self {
        self.shard_key_width = width;
        self
    }

    pub fn with_concurrent_workers(mut self, workers: usize) -> Self {
        self.concurrent_workers = workers;
        self
    }

    pub fn with_reduced(mut self, reduced: bool) -> Self {
        self.reduced = reduced;
        self
    }

    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Reject configurations that would fail or produce malformed output
    /// partway through a run.
    pub fn validate(&self) -> Result<(), Error> {
        if self.prefixes.is_empty() {
            return Err(Error::EmptyPrefixList);
        }
        if let Some(index) = self.prefixes.iter().position(|p| p.is_empty()) {
            return Err(Error::EmptyPrefix { index });
        }
        let mut seen_prefixes = HashSet::new();
        for prefix in &self.prefixes {
            if !seen_prefixes.insert(prefix.as_str()) {
                return Err(Error::DuplicatePrefix { prefix: prefix.to_string() });
            }
        }
        if !(1..=MAX_SUFFIX_WIDTH).contains(&self.suffix_width) {
            return Err(Error::InvalidSuffixWidth {
                width: self.suffix_width,
                max: MAX_SUFFIX_WIDTH,
            });
        }

        if self.algorithms.is_empty() {
            return Err(Error::NoAlgorithms);
        }
        let mut seen = HashSet::new();
        for alg in &self.algorithms {
            if !seen.insert(*alg) {
                return Err(Error::DuplicateAlgorithm { name: alg.name().to_string() });
            }
        }

        // The key must leave a non-empty remainder for every algorithm.
        let shortest = self.algorithms.iter().map(HashAlgorithm::digest_len).min().unwrap_or(0);
        let max = MAX_SHARD_KEY_WIDTH.min(shortest.saturating_sub(1));
        if !(1..=max).contains(&self.shard_key_width) {
            return Err(Error::InvalidShardKeyWidth { width: self.shard_key_width, max });
        }

        if self.concurrent_workers == 0 {
            return Err(Error::NoWorkers);
        }
        Ok(())
    }

    /// The prefixes this run processes, in order.
    pub fn active_prefixes(&self) -> &[CompactString] {
        if self.reduced {
            &self.prefixes[..self.prefixes.len().min(REDUCED_PREFIX_COUNT)]
        } else {
            &self.prefixes
        }
    }

    /// 10^suffix_width
    pub fn identifiers_per_prefix(&self) -> u64 {
        10u64.pow(self.suffix_width as u32)
    }

    /// Artifacts written per algorithm
    pub fn shards_per_algorithm(&self) -> u32 {
        crate::partition::shard_count(self.shard_key_width)
    }
}

/// Read a prefix list with one prefix per line. Blank lines and lines
/// starting with `#` are skipped.
pub async fn load_prefix_file(path: &Path) -> Result<Vec<CompactString>, Error> {
    let contents = fs::read_to_string(path).await?;
    Ok(parse_prefix_list(&contents))
}

fn parse_prefix_list(contents: &str) -> Vec<CompactString> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(CompactString::from)
        .collect()
}
