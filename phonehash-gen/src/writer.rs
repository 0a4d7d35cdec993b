use std::future::Future;
use std::io::{self, SeekFrom};
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::fs::{self, OpenOptions};
use tokio::io::{AsyncSeekExt, AsyncWriteExt, BufWriter};

use crate::accumulator::Entries;
use crate::digest::HashAlgorithm;
use crate::error::Error;
use crate::partition::ShardKey;

/// Maximum retries per artifact operation
pub const MAX_RETRIES: u32 = 10;

/// Base delay for exponential backoff (doubles each retry)
pub const RETRY_BASE_DELAY_MS: u64 = 100;

/// Bytes buffered per sink before `write_all` waits on the file
const SINK_BUFFER_BYTES: usize = 64 * 1024;

const OPEN_MARKER: &[u8] = b"{";
const CLOSE_MARKER: &[u8] = b"}";
const SEPARATOR: u8 = b',';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: MAX_RETRIES,
            base_delay: Duration::from_millis(RETRY_BASE_DELAY_MS),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry `attempt` (1-based).
    fn delay(&self, attempt: u32) -> Duration {
        self.base_delay * (1 << attempt.min(10))
    }
}

/// Handle to one shard's on-disk artifact.
///
/// `committed_len` is the length of the artifact after the last successful
/// operation; anything past it belongs to a failed attempt and is discarded
/// before the next one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardArtifact {
    key: ShardKey,
    path: PathBuf,
    committed_len: u64,
    has_entries: bool,
}

impl ShardArtifact {
    fn new(key: ShardKey, dir: &Path) -> Self {
        Self {
            key,
            path: dir.join(key.file_name()),
            committed_len: 0,
            has_entries: false,
        }
    }

    pub fn key(&self) -> ShardKey {
        self.key
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn committed_len(&self) -> u64 {
        self.committed_len
    }

    /// Whether any entry was ever appended, i.e. whether the artifact ends in
    /// a separator that sealing has to strip.
    pub fn has_entries(&self) -> bool {
        self.has_entries
    }
}

#[derive(Debug, Clone, Copy)]
enum Stage {
    Create,
    Write,
    Seal,
}

/// The open, appendable artifacts of one algorithm's output directory.
///
/// Artifacts only become valid JSON in [`ShardSet::seal_all`], which consumes
/// the set so nothing can be appended afterwards.
#[derive(Debug)]
pub struct ShardSet {
    algorithm: HashAlgorithm,
    dir: PathBuf,
    artifacts: Vec<ShardArtifact>,
    workers: usize,
    retry: RetryPolicy,
}

impl ShardSet {
    /// Create `<root>/<algorithm>/` and one artifact holding only the opening
    /// marker for every shard key of `width`.
    pub async fn create(
        root: &Path,
        algorithm: HashAlgorithm,
        width: usize,
        workers: usize,
        retry: RetryPolicy,
    ) -> Result<Self, Error> {
        let dir = root.join(algorithm.name());
        fs::create_dir_all(&dir).await?;

        let artifacts: Vec<ShardArtifact> =
            ShardKey::all(width).map(|key| ShardArtifact::new(key, &dir)).collect();
        let artifacts = run_pool(artifacts, workers, move |artifact| create_shard(artifact, retry))
            .await?;

        tracing::debug!(algorithm = %algorithm, shards = artifacts.len(), dir = ?dir, "created shard artifacts");

        Ok(Self { algorithm, dir, artifacts, workers, retry })
    }

    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn artifacts(&self) -> &[ShardArtifact] {
        &self.artifacts
    }

    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }

    /// Append one batch of drained shards. Each shard is written by exactly one
    /// task; the call returns once every shard in the batch is on disk.
    ///
    /// Returns the number of bytes appended.
    pub async fn flush_batch(&mut self, batch: Vec<(ShardKey, Entries)>) -> Result<u64, Error> {
        let jobs: Vec<(ShardArtifact, Entries)> = batch
            .into_iter()
            .map(|(key, entries)| (self.artifacts[key.index() as usize].clone(), entries))
            .collect();
        let shards = jobs.len();

        let retry = self.retry;
        let flushed = run_pool(jobs, self.workers, move |(artifact, entries)| async move {
            flush_shard(artifact, &entries, retry).await
        })
        .await?;

        let mut appended = 0;
        for artifact in flushed {
            let slot = &mut self.artifacts[artifact.key().index() as usize];
            appended += artifact.committed_len - slot.committed_len;
            *slot = artifact;
        }

        tracing::debug!(algorithm = %self.algorithm, shards, bytes = appended, "flushed batch");
        Ok(appended)
    }

    /// Close every artifact into a complete JSON object.
    pub async fn seal_all(self) -> Result<Vec<ShardArtifact>, Error> {
        let retry = self.retry;
        let sealed = run_pool(self.artifacts, self.workers, move |artifact| {
            seal_shard(artifact, retry)
        })
        .await?;

        tracing::debug!(algorithm = %self.algorithm, shards = sealed.len(), "sealed shard artifacts");
        Ok(sealed)
    }
}

/// Run `op` over `jobs` on up to `workers` tasks, each task owning a contiguous
/// chunk and processing it sequentially. All tasks are awaited; the first
/// error is returned.
async fn run_pool<T, U, F, Fut>(jobs: Vec<T>, workers: usize, op: F) -> Result<Vec<U>, Error>
where
    T: Send + 'static,
    U: Send + 'static,
    F: Fn(T) -> Fut + Copy + Send + 'static,
    Fut: Future<Output = Result<U, Error>> + Send + 'static,
{
    if jobs.is_empty() {
        return Ok(Vec::new());
    }

    let total = jobs.len();
    let chunk_size = total.div_ceil(workers.max(1));
    let mut chunks: Vec<Vec<T>> = Vec::with_capacity(total.div_ceil(chunk_size));
    let mut jobs = jobs.into_iter().peekable();
    while jobs.peek().is_some() {
        chunks.push(jobs.by_ref().take(chunk_size).collect());
    }

    let mut handles = Vec::with_capacity(chunks.len());
    for chunk in chunks {
        handles.push(tokio::spawn(async move {
            let mut done = Vec::with_capacity(chunk.len());
            for job in chunk {
                done.push(op(job).await?);
            }
            Ok::<_, Error>(done)
        }));
    }

    let mut results = Vec::with_capacity(total);
    let mut first_error: Option<Error> = None;
    for handle in handles {
        match handle.await {
            Ok(Ok(done)) => results.extend(done),
            Ok(Err(e)) => {
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
            Err(e) => {
                if first_error.is_none() {
                    first_error = Some(Error::Task(e));
                }
            }
        }
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(results),
    }
}

/// Retry `op` with exponential backoff. A missing directory or artifact and a
/// truncated artifact are reported immediately since retrying cannot fix them.
async fn with_retries<T, F, Fut>(
    artifact: &ShardArtifact,
    stage: Stage,
    retry: RetryPolicy,
    mut op: F,
) -> Result<T, Error>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = io::Result<T>>,
{
    let mut attempt = 0;
    loop {
        let err = match op().await {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };

        match err.kind() {
            // Creating only fails this way when the algorithm directory is gone.
            io::ErrorKind::NotFound if matches!(stage, Stage::Create) => {
                return Err(Error::ShardCreate {
                    path: artifact.path.clone(),
                    attempts: attempt + 1,
                    source: err,
                });
            }
            io::ErrorKind::NotFound => {
                return Err(Error::ArtifactMissing { path: artifact.path.clone() });
            }
            io::ErrorKind::UnexpectedEof => {
                let actual = fs::metadata(&artifact.path).await.map(|m| m.len()).unwrap_or(0);
                return Err(Error::ArtifactTruncated {
                    path: artifact.path.clone(),
                    expected: artifact.committed_len,
                    actual,
                });
            }
            _ => {}
        }

        attempt += 1;
        if attempt > retry.max_retries {
            let path = artifact.path.clone();
            return Err(match stage {
                Stage::Create => Error::ShardCreate { path, attempts: attempt, source: err },
                Stage::Write => Error::ShardWrite { path, attempts: attempt, source: err },
                Stage::Seal => Error::ShardSeal { path, attempts: attempt, source: err },
            });
        }

        tracing::warn!(path = ?artifact.path, ?stage, attempt, error = %err, "retrying shard operation");
        tokio::time::sleep(retry.delay(attempt)).await;
    }
}

async fn create_shard(mut artifact: ShardArtifact, retry: RetryPolicy) -> Result<ShardArtifact, Error> {
    let path = artifact.path.clone();
    with_retries(&artifact, Stage::Create, retry, || fs::write(&path, OPEN_MARKER)).await?;
    artifact.committed_len = OPEN_MARKER.len() as u64;
    artifact.has_entries = false;
    Ok(artifact)
}

async fn flush_shard(
    mut artifact: ShardArtifact,
    entries: &Entries,
    retry: RetryPolicy,
) -> Result<ShardArtifact, Error> {
    if entries.is_empty() {
        return Ok(artifact);
    }
    let base = artifact.committed_len;
    let path = artifact.path.clone();
    let appended =
        with_retries(&artifact, Stage::Write, retry, || append_entries(&path, base, entries))
            .await?;
    artifact.committed_len = base + appended;
    artifact.has_entries = true;
    Ok(artifact)
}

async fn seal_shard(mut artifact: ShardArtifact, retry: RetryPolicy) -> Result<ShardArtifact, Error> {
    let committed = artifact.committed_len;
    let body_len = if artifact.has_entries { committed - 1 } else { committed };
    let path = artifact.path.clone();
    with_retries(&artifact, Stage::Seal, retry, || seal_tail(&path, body_len)).await?;
    artifact.committed_len = body_len + CLOSE_MARKER.len() as u64;
    Ok(artifact)
}

/// Open an existing artifact positioned at `base`, discarding anything a
/// failed attempt left past it.
async fn open_at(path: &Path, base: u64) -> io::Result<fs::File> {
    let mut file = OpenOptions::new().write(true).open(path).await?;
    let len = file.metadata().await?.len();
    if len < base {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("artifact is {len} bytes, expected at least {base}"),
        ));
    }
    if len > base {
        file.set_len(base).await?;
    }
    file.seek(SeekFrom::Start(base)).await?;
    Ok(file)
}

/// Append `"remainder":"identifier",` for every entry. Returns bytes written.
async fn append_entries(path: &Path, base: u64, entries: &Entries) -> io::Result<u64> {
    let file = open_at(path, base).await?;
    let mut sink = BufWriter::with_capacity(SINK_BUFFER_BYTES, file);

    let mut fragment = Vec::with_capacity(128);
    let mut written = 0u64;
    for (remainder, identifier) in entries {
        fragment.clear();
        encode_fragment(&mut fragment, remainder, identifier)?;
        sink.write_all(&fragment).await?;
        written += fragment.len() as u64;
    }
    sink.flush().await?;
    Ok(written)
}

/// Cut the artifact to `body_len`, dropping the trailing separator if there
/// is one, and write the closing marker.
async fn seal_tail(path: &Path, body_len: u64) -> io::Result<()> {
    let mut file = open_at(path, body_len).await?;
    file.write_all(CLOSE_MARKER).await?;
    file.flush().await?;
    file.sync_all().await
}

fn encode_fragment(out: &mut Vec<u8>, remainder: &str, identifier: &str) -> io::Result<()> {
    serde_json::to_writer(&mut *out, remainder)?;
    out.push(b':');
    serde_json::to_writer(&mut *out, identifier)?;
    out.push(SEPARATOR);
    Ok(())
}
