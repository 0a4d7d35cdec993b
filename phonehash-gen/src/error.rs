use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to create shard artifact {path} after {attempts} attempts: {source}")]
    ShardCreate {
        path: PathBuf,
        attempts: u32,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to append to shard artifact {path} after {attempts} attempts: {source}")]
    ShardWrite {
        path: PathBuf,
        attempts: u32,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to seal shard artifact {path} after {attempts} attempts: {source}")]
    ShardSeal {
        path: PathBuf,
        attempts: u32,
        #[source]
        source: std::io::Error,
    },

    #[error("Shard artifact {path} is missing")]
    ArtifactMissing { path: PathBuf },

    #[error("Shard artifact {path} is {actual} bytes, expected at least {expected}")]
    ArtifactTruncated { path: PathBuf, expected: u64, actual: u64 },

    #[error("Output '{path}' exists. Use --force to overwrite.")]
    FileExists { path: PathBuf },

    #[error("Run cancelled after {completed}/{total} prefixes; shard artifacts are left unsealed")]
    Cancelled { completed: usize, total: usize },

    #[error("Worker task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("Prefix list is empty")]
    EmptyPrefixList,

    #[error("Prefix at position {index} is empty")]
    EmptyPrefix { index: usize },

    #[error("Prefix '{prefix}' listed more than once")]
    DuplicatePrefix { prefix: String },

    #[error("Suffix width {width} is out of range (1..={max})")]
    InvalidSuffixWidth { width: usize, max: usize },

    #[error("Shard key width {width} is out of range (1..={max})")]
    InvalidShardKeyWidth { width: usize, max: usize },

    #[error("No hash algorithms configured")]
    NoAlgorithms,

    #[error("Unknown hash algorithm '{name}'")]
    UnknownAlgorithm { name: String },

    #[error("Hash algorithm '{name}' listed more than once")]
    DuplicateAlgorithm { name: String },

    #[error("Concurrent workers must be at least 1")]
    NoWorkers,
}
