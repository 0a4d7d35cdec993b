use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::AtomicU64;
use std::time::Duration;

use phonehash_gen::{
    Error, Generator, GeneratorConfig, HashAlgorithm, RetryPolicy, RunReport,
};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

pub fn setup_temp_dir() -> TempDir {
    tempfile::tempdir().expect("create temp dir")
}

/// Two prefixes, 100 numbers each, 256 shards.
pub fn small_config(root: &Path) -> GeneratorConfig {
    GeneratorConfig::new(root.join("v1/phone"))
        .with_prefixes(["254110", "254111"])
        .with_suffix_width(2)
        .with_shard_key_width(2)
        .with_concurrent_workers(4)
        .with_retry(RetryPolicy { max_retries: 1, base_delay: Duration::from_millis(1) })
}

pub async fn run(config: GeneratorConfig) -> Result<RunReport, Error> {
    Generator::new(config)?
        .run(Arc::new(AtomicU64::new(0)), CancellationToken::new())
        .await
}

/// Parse one sealed shard artifact.
pub fn load_shard(path: &Path) -> HashMap<String, String> {
    let data = std::fs::read(path).unwrap_or_else(|e| panic!("read {path:?}: {e}"));
    serde_json::from_slice(&data).unwrap_or_else(|e| panic!("parse {path:?}: {e}"))
}

/// Sorted artifact file names in one algorithm directory.
pub fn shard_file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

/// Every digest -> identifier pair across all artifacts of one algorithm,
/// with digests rebuilt as shard key + remainder.
pub fn load_index(root: &Path, algorithm: HashAlgorithm) -> HashMap<String, String> {
    let dir = root.join(algorithm.name());
    let mut index = HashMap::new();
    for name in shard_file_names(&dir) {
        let key = name.strip_suffix(".json").expect("json extension").to_string();
        for (remainder, identifier) in load_shard(&dir.join(&name)) {
            index.insert(format!("{key}{remainder}"), identifier);
        }
    }
    index
}
