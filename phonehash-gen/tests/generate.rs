mod common;

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use phonehash_gen::{Error, Generator, HashAlgorithm, IdentifierSpace, partition};
use tokio_util::sync::CancellationToken;

use common::{load_index, load_shard, run, setup_temp_dir, shard_file_names, small_config};

#[tokio::test]
async fn test_run_covers_every_identifier() {
    let tmp = setup_temp_dir();
    let config = small_config(tmp.path());
    let root = config.output_dir.clone();

    let report = run(config).await.unwrap();
    assert_eq!(report.prefixes_processed, 2);
    assert_eq!(report.identifiers_hashed, 200);
    assert_eq!(report.shards_sealed, 256);
    assert_eq!(report.collisions, 0);

    let index = load_index(&root, HashAlgorithm::Sha256);
    assert_eq!(index.len(), 200);

    for prefix in ["254110", "254111"] {
        for identifier in IdentifierSpace::new(prefix, 2).iter() {
            let digest = HashAlgorithm::Sha256.digest(&identifier);
            assert_eq!(index.get(&digest).map(String::as_str), Some(identifier.as_str()));

            // Point lookup the way a client would do it.
            let (key, remainder) = partition(&digest, 2);
            let shard = load_shard(&root.join("sha256").join(key.file_name()));
            assert_eq!(shard[remainder], identifier.as_str());
        }
    }
}

#[tokio::test]
async fn test_every_artifact_is_sealed_json() {
    let tmp = setup_temp_dir();
    // 20 numbers over 256 shards leaves most shards empty.
    let config = small_config(tmp.path()).with_suffix_width(1);
    let dir = config.output_dir.join("sha256");
    run(config).await.unwrap();

    let names = shard_file_names(&dir);
    assert_eq!(names.len(), 256);
    assert_eq!(names.first().map(String::as_str), Some("00.json"));
    assert_eq!(names.last().map(String::as_str), Some("ff.json"));

    let mut empty = 0;
    let mut entries = 0;
    for name in &names {
        let raw = std::fs::read_to_string(dir.join(name)).unwrap();
        assert!(raw.starts_with('{') && raw.ends_with('}'), "{name}: {raw}");
        assert!(!raw.contains(",}"), "{name} kept its trailing separator");

        let doc = load_shard(&dir.join(name));
        if doc.is_empty() {
            assert_eq!(raw, "{}");
            empty += 1;
        }
        entries += doc.len();
        assert!(doc.keys().all(|k| k.len() == 62));
    }
    assert_eq!(entries, 20);
    assert!(empty >= 236);
}

#[tokio::test]
async fn test_reduced_mode_keeps_layout() {
    let full_tmp = setup_temp_dir();
    let reduced_tmp = setup_temp_dir();
    let prefixes = ["254110", "254111", "254701", "254702"];

    let full = small_config(full_tmp.path()).with_prefixes(prefixes);
    let reduced = small_config(reduced_tmp.path()).with_prefixes(prefixes).with_reduced(true);
    let full_dir = full.output_dir.join("sha256");
    let reduced_dir = reduced.output_dir.join("sha256");

    let full_report = run(full).await.unwrap();
    let reduced_report = run(reduced).await.unwrap();

    assert_eq!(full_report.prefixes_processed, 4);
    assert_eq!(reduced_report.prefixes_processed, 2);
    assert_eq!(full_report.shards_sealed, reduced_report.shards_sealed);
    assert_eq!(shard_file_names(&full_dir), shard_file_names(&reduced_dir));

    let reduced_index = load_index(reduced_dir.parent().unwrap(), HashAlgorithm::Sha256);
    assert_eq!(reduced_index.len(), 200);
    assert!(reduced_index.values().all(|id| id.starts_with("25411")));
}

#[tokio::test]
async fn test_each_algorithm_gets_its_own_tree() {
    let tmp = setup_temp_dir();
    let config = small_config(tmp.path())
        .with_algorithms([HashAlgorithm::Sha256, HashAlgorithm::Sha1]);
    let root = config.output_dir.clone();

    let report = run(config).await.unwrap();
    assert_eq!(report.shards_sealed, 512);
    assert_eq!(report.identifiers_hashed, 400);

    for (algorithm, digest_len) in [(HashAlgorithm::Sha256, 64), (HashAlgorithm::Sha1, 40)] {
        assert_eq!(shard_file_names(&root.join(algorithm.name())).len(), 256);

        let index = load_index(&root, algorithm);
        assert_eq!(index.len(), 200, "{algorithm}");
        assert!(index.keys().all(|d| d.len() == digest_len));
        let digest = algorithm.digest("25411199");
        assert_eq!(index[&digest], "25411199");
    }
}

#[tokio::test]
async fn test_reference_prefix_scenario() {
    let tmp = setup_temp_dir();
    let config = small_config(tmp.path())
        .with_prefixes(["254110"])
        .with_suffix_width(3)
        .with_shard_key_width(4)
        .with_concurrent_workers(32);
    let dir = config.output_dir.join("sha256");

    let report = run(config).await.unwrap();
    assert_eq!(report.shards_sealed, 65_536);
    assert_eq!(shard_file_names(&dir).len(), 65_536);

    // sha256("254110000") = 13ff5f2a...
    let shard = load_shard(&dir.join("13ff.json"));
    assert_eq!(
        shard["5f2ac327d9607e4c6822010fa25bf46a692ca49692cee2caeb2be9b9536d"],
        "254110000"
    );
}

#[tokio::test]
#[ignore = "full 1,000,000-number batch over 65,536 shards"]
async fn test_reference_prefix_full_width() {
    let tmp = setup_temp_dir();
    let config = small_config(tmp.path())
        .with_prefixes(["254110"])
        .with_suffix_width(6)
        .with_shard_key_width(4)
        .with_concurrent_workers(64);
    let dir = config.output_dir.join("sha256");

    let report = run(config).await.unwrap();
    assert_eq!(report.identifiers_hashed, 1_000_000);

    // sha256("254110000000") = 0ab1c9c5...
    let shard = load_shard(&dir.join("0ab1.json"));
    assert_eq!(
        shard["c9c55b253377845b411dea38b55b88ca33fb20d63c1f09439eb375846ab1"],
        "254110000000"
    );
}

#[tokio::test]
async fn test_existing_output_requires_force() {
    let tmp = setup_temp_dir();
    let config = small_config(tmp.path());
    std::fs::create_dir_all(config.output_dir.join("sha256")).unwrap();
    std::fs::write(config.output_dir.join("sha256/stale.json"), "{}").unwrap();

    match run(config.clone()).await {
        Err(Error::FileExists { path }) => assert_eq!(path, config.output_dir),
        other => panic!("expected FileExists, got {other:?}"),
    }

    let dir = config.output_dir.join("sha256");
    run(config.with_force(true)).await.unwrap();
    let names: HashSet<String> = shard_file_names(&dir).into_iter().collect();
    assert_eq!(names.len(), 256);
    assert!(!names.contains("stale.json"));
}

#[tokio::test]
async fn test_cancelled_run_leaves_artifacts_unsealed() {
    let tmp = setup_temp_dir();
    let config = small_config(tmp.path());
    let dir = config.output_dir.join("sha256");

    let cancel = CancellationToken::new();
    cancel.cancel();
    let progress = Arc::new(AtomicU64::new(0));
    let result = Generator::new(config).unwrap().run(Arc::clone(&progress), cancel).await;

    assert!(matches!(result, Err(Error::Cancelled { completed: 0, total: 2 })));
    assert_eq!(progress.load(Ordering::Relaxed), 0);

    let names = shard_file_names(&dir);
    assert_eq!(names.len(), 256);
    for name in names {
        assert_eq!(std::fs::read(dir.join(name)).unwrap(), b"{");
    }
}

#[tokio::test]
async fn test_invalid_config_touches_nothing() {
    let tmp = setup_temp_dir();
    let empty: [&str; 0] = [];
    let config = small_config(tmp.path()).with_prefixes(empty);
    let output = config.output_dir.clone();

    assert!(matches!(Generator::new(config), Err(Error::EmptyPrefixList)));
    assert!(!output.exists());
}

#[tokio::test]
async fn test_progress_counts_prefixes() {
    let tmp = setup_temp_dir();
    let config = small_config(tmp.path()).with_prefixes(["1", "2", "3"]).with_suffix_width(1);

    let progress = Arc::new(AtomicU64::new(0));
    Generator::new(config)
        .unwrap()
        .run(Arc::clone(&progress), CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(progress.load(Ordering::Relaxed), 3);
}
