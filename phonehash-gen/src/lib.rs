//! Precomputes a reverse-lookup index from the digest of a phone number back
//! to the number itself, as a tree of static JSON files.
//!
//! **This is the reversal table, not a defence against it.** The identifier
//! space (a fixed list of operator prefixes times every 6-digit subscriber
//! number) is small enough to enumerate, so every digest in it can be mapped
//! back to its number.
//!
//! # Output Format
//!
//! For each hash algorithm the generator writes `16^width` files (65,536 for
//! the default 4-character shard key) under `<output>/<algorithm>/`, named by
//! the first `width` lowercase hex characters of the digest:
//!
//! ```text
//! dist/v1/phone/sha256/0000.json
//! dist/v1/phone/sha256/0001.json
//! ...
//! dist/v1/phone/sha256/ffff.json
//! ```
//!
//! Each file is a flat JSON object mapping the rest of the digest to the
//! number. For `254110000000`, whose sha256 is `0ab1c9c5…6ab1`,
//! `0ab1.json` contains `"c9c5…6ab1":"254110000000"`. Shards that no digest
//! landed in are still written, as `{}`.
//!
//! A client looks up a digest by fetching one file and indexing into it.
//!
//! # Collisions
//!
//! Two numbers whose digests share all characters are a collision. The later
//! one silently replaces the earlier one: inside a batch the in-memory map
//! overwrites it, across batches the later duplicate key wins when the
//! document is parsed. Collisions inside a batch are counted in
//! [`RunReport::collisions`].
//!
//! # Pipeline
//!
//! One prefix (10^6 numbers) is one batch. Each batch is hashed into a
//! [`ShardAccumulator`], drained, and appended to the open artifacts by a
//! [`ShardSet`], so memory is bounded by a single batch. Until
//! [`ShardSet::seal_all`] runs, artifacts are `{` followed by
//! `"key":"value",` fragments and are not valid JSON.
//!
//! # Usage
//!
//! ```sh
//! phonehash-gen --output ./dist/v1/phone
//! DEV=1 phonehash-gen --output ./dist/v1/phone   # first 2 prefixes only
//! ```

pub mod accumulator;
pub mod config;
pub mod digest;
pub mod enumerate;
pub mod error;
pub mod generator;
pub mod partition;
pub mod prefixes;
pub mod writer;

pub use accumulator::{Entries, ShardAccumulator};
pub use config::{GeneratorConfig, REDUCED_PREFIX_COUNT, load_prefix_file};
pub use digest::HashAlgorithm;
pub use enumerate::{IdentifierSpace, Identifiers};
pub use error::Error;
pub use generator::{Generator, RunReport, hash_batch};
pub use partition::{ShardKey, partition, shard_count};
pub use writer::{MAX_RETRIES, RETRY_BASE_DELAY_MS, RetryPolicy, ShardArtifact, ShardSet};
