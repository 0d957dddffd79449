//! End-to-end retrieval properties: load -> build -> rank, plus the
//! fingerprint-keyed cache flow, all against the stub encoder.

use std::io::Write;

use tempfile::{NamedTempFile, TempDir};

use crate::records::{load_records, LoadError};
use crate::retrieval::{
    description_for, search, CacheKey, CacheMiss, CorpusIndex, EmbeddingCache, SearchError,
    TextEncoder,
};
use crate::tests::{record, StubEncoder};

fn write_csv(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

#[test]
fn test_top_k_of_five_records() {
    let records = vec![
        record("US1", "exact match", "a"),
        record("US2", "close match", "b"),
        record("US3", "orthogonal", "c"),
        record("US4", "opposite", "d"),
        record("US5", "distant", "e"),
    ];

    let encoder = StubEncoder::new(4)
        .with_vector(&description_for(&records[0]), vec![1.0, 0.0, 0.0, 0.0])
        .with_vector(&description_for(&records[1]), vec![1.0, 1.0, 0.0, 0.0])
        .with_vector(&description_for(&records[2]), vec![0.0, 1.0, 0.0, 0.0])
        .with_vector(&description_for(&records[3]), vec![-1.0, 0.0, 0.0, 0.0])
        .with_vector(&description_for(&records[4]), vec![1.0, 2.0, 0.0, 0.0])
        .with_vector("query", vec![1.0, 0.0, 0.0, 0.0]);

    let index = CorpusIndex::build(records, &encoder).unwrap();
    let results = search("query", &index, 3, &encoder).unwrap();

    assert_eq!(results.len(), 3);
    assert_eq!(
        results.iter().map(|r| r.rank).collect::<Vec<_>>(),
        vec![1, 2, 3]
    );
    assert_eq!(results[0].record.publication_number, "US1");
    assert_eq!(results[1].record.publication_number, "US2");
    assert_eq!(results[2].record.publication_number, "US5");

    for pair in results.windows(2) {
        assert!(pair[0].score >= pair[1].score, "scores must be descending");
    }
    for result in &results {
        assert!((-1.0..=1.0).contains(&result.score));
    }
}

#[test]
fn test_k_larger_than_corpus_returns_all_without_padding() {
    let records = vec![record("US1", "pump", "a"), record("US2", "valve", "b")];
    let encoder = StubEncoder::new(4);

    let index = CorpusIndex::build(records, &encoder).unwrap();
    let results = search("pump", &index, 10, &encoder).unwrap();

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].rank, 1);
    assert_eq!(results[1].rank, 2);
}

#[test]
fn test_query_equal_to_description_ranks_first_with_unit_score() {
    let records = vec![
        record("US1", "Centrifugal pump", "An impeller-driven pump."),
        record("US2", "Ball valve", "A quarter-turn valve."),
        record("US3", "Heat exchanger", "A shell-and-tube exchanger."),
    ];
    let encoder = StubEncoder::new(16);
    let index = CorpusIndex::build(records.clone(), &encoder).unwrap();

    let query = description_for(&records[1]);
    let results = search(&query, &index, 3, &encoder).unwrap();

    assert_eq!(results[0].record.publication_number, "US2");
    assert_eq!(results[0].rank, 1);
    assert!(results[0].score >= 0.999);
}

#[test]
fn test_empty_query_is_an_error() {
    let encoder = StubEncoder::new(4);
    let index = CorpusIndex::build(vec![record("US1", "pump", "a")], &encoder).unwrap();

    assert!(matches!(
        search("", &index, 3, &encoder),
        Err(SearchError::EmptyQuery)
    ));
    assert!(matches!(
        search("   \t\n", &index, 3, &encoder),
        Err(SearchError::EmptyQuery)
    ));
}

#[test]
fn test_empty_index_returns_no_results_without_error() {
    let encoder = StubEncoder::new(4);
    let index = CorpusIndex::build(vec![], &encoder).unwrap();

    assert!(index.is_empty());
    let results = search("x", &index, 3, &encoder).unwrap();
    assert!(results.is_empty());
}

#[test]
fn test_equal_scores_keep_corpus_order() {
    let records = vec![
        record("US1", "first twin", "a"),
        record("US2", "second twin", "b"),
        record("US3", "other", "c"),
    ];

    let twin = vec![0.0, 1.0, 0.0, 0.0];
    let encoder = StubEncoder::new(4)
        .with_vector(&description_for(&records[0]), twin.clone())
        .with_vector(&description_for(&records[1]), twin)
        .with_vector(&description_for(&records[2]), vec![1.0, 0.0, 0.0, 0.0])
        .with_vector("query", vec![0.0, 1.0, 0.0, 0.0]);

    let index = CorpusIndex::build(records, &encoder).unwrap();
    let results = search("query", &index, 3, &encoder).unwrap();

    assert_eq!(results[0].record.publication_number, "US1");
    assert_eq!(results[1].record.publication_number, "US2");
    assert_eq!(results[0].score, results[1].score);
}

#[test]
fn test_zero_norm_entry_scores_zero() {
    let records = vec![
        record("US1", "real", "content"),
        record("US2", "degenerate", "entry"),
    ];

    let encoder = StubEncoder::new(4)
        .with_vector(&description_for(&records[1]), vec![0.0, 0.0, 0.0, 0.0]);

    let index = CorpusIndex::build(records, &encoder).unwrap();
    let results = search("real content", &index, 2, &encoder).unwrap();

    let degenerate = results
        .iter()
        .find(|r| r.record.publication_number == "US2")
        .unwrap();
    assert_eq!(degenerate.score, 0.0);
}

#[test]
fn test_build_is_idempotent() {
    let records = vec![
        record("US1", "Centrifugal pump", "An impeller-driven pump."),
        record("US2", "Ball valve", "A quarter-turn valve."),
    ];
    let encoder = StubEncoder::new(16);

    let first = CorpusIndex::build(records.clone(), &encoder).unwrap();
    let second = CorpusIndex::build(records, &encoder).unwrap();

    let a: Vec<&[f32]> = first.embeddings().collect();
    let b: Vec<&[f32]> = second.embeddings().collect();
    assert_eq!(a, b);
}

#[test]
fn test_missing_column_fails_before_any_encoding() {
    let file = write_csv("title,publication_number\nPump,US1\n");
    let encoder = StubEncoder::new(4);

    let loaded = load_records(file.path(), None);
    let err = match loaded {
        Err(err) => err,
        Ok(_) => panic!("load must fail without an abstract column"),
    };

    match err {
        LoadError::MissingColumns(names) => assert_eq!(names, vec!["abstract".to_string()]),
        other => panic!("expected MissingColumns, got {other:?}"),
    }

    // Validation happens before any embedding work
    assert_eq!(encoder.encode_calls(), 0);
    assert_eq!(encoder.batch_calls(), 0);
}

#[test]
fn test_cache_hit_skips_re_encoding() {
    let dir = TempDir::new().unwrap();
    let corpus_path = dir.path().join("patents.csv");
    std::fs::write(
        &corpus_path,
        "title,abstract,publication_number\nPump,A pump.,US1\nValve,A valve.,US2\n",
    )
    .unwrap();

    let encoder = StubEncoder::new(8);
    let records = load_records(&corpus_path, None).unwrap();

    // First run: encode and persist
    let index = CorpusIndex::build(records.clone(), &encoder).unwrap();
    assert_eq!(encoder.batch_calls(), 1);

    let key = CacheKey {
        model_id: encoder.identity_hash(),
        fingerprint: EmbeddingCache::fingerprint(&corpus_path).unwrap(),
    };
    let cache = EmbeddingCache::new(dir.path().join("corpus.bin"));
    let embeddings: Vec<Vec<f32>> = index.embeddings().map(|e| e.to_vec()).collect();
    cache.save(&key, encoder.dimensions(), &embeddings).unwrap();

    // Second run: unchanged source, same model -> no encoder call
    let records_again = load_records(&corpus_path, None).unwrap();
    let key_again = CacheKey {
        model_id: encoder.identity_hash(),
        fingerprint: EmbeddingCache::fingerprint(&corpus_path).unwrap(),
    };
    let cached = cache
        .load(&key_again, encoder.dimensions(), records_again.len())
        .unwrap();
    let reloaded =
        CorpusIndex::from_cached(records_again, cached, encoder.dimensions()).unwrap();

    assert_eq!(encoder.batch_calls(), 1);
    assert_eq!(
        reloaded.embeddings().collect::<Vec<_>>(),
        index.embeddings().collect::<Vec<_>>()
    );

    // Cached index ranks the same as the freshly built one
    let results = search(&description_for(&records[0]), &reloaded, 1, &encoder).unwrap();
    assert_eq!(results[0].record.publication_number, "US1");
}

#[test]
fn test_corpus_change_invalidates_cache() {
    let dir = TempDir::new().unwrap();
    let corpus_path = dir.path().join("patents.csv");
    std::fs::write(&corpus_path, "title,abstract\nPump,A pump.\n").unwrap();

    let encoder = StubEncoder::new(8);
    let records = load_records(&corpus_path, None).unwrap();
    let index = CorpusIndex::build(records, &encoder).unwrap();

    let key = CacheKey {
        model_id: encoder.identity_hash(),
        fingerprint: EmbeddingCache::fingerprint(&corpus_path).unwrap(),
    };
    let cache = EmbeddingCache::new(dir.path().join("corpus.bin"));
    let embeddings: Vec<Vec<f32>> = index.embeddings().map(|e| e.to_vec()).collect();
    cache.save(&key, encoder.dimensions(), &embeddings).unwrap();

    // Any byte change to the source produces a different fingerprint
    std::fs::write(&corpus_path, "title,abstract\nPump,A better pump.\n").unwrap();
    let stale_key = CacheKey {
        model_id: encoder.identity_hash(),
        fingerprint: EmbeddingCache::fingerprint(&corpus_path).unwrap(),
    };

    assert_eq!(
        cache.load(&stale_key, encoder.dimensions(), 1),
        Err(CacheMiss::StaleFingerprint)
    );
}

#[test]
fn test_different_model_invalidates_cache() {
    let dir = TempDir::new().unwrap();
    let corpus_path = dir.path().join("patents.csv");
    std::fs::write(&corpus_path, "title,abstract\nPump,A pump.\n").unwrap();

    let small = StubEncoder::new(8);
    let records = load_records(&corpus_path, None).unwrap();
    let index = CorpusIndex::build(records, &small).unwrap();

    let fingerprint = EmbeddingCache::fingerprint(&corpus_path).unwrap();
    let key = CacheKey {
        model_id: small.identity_hash(),
        fingerprint,
    };
    let cache = EmbeddingCache::new(dir.path().join("corpus.bin"));
    let embeddings: Vec<Vec<f32>> = index.embeddings().map(|e| e.to_vec()).collect();
    cache.save(&key, small.dimensions(), &embeddings).unwrap();

    let large = StubEncoder::new(16);
    let other_key = CacheKey {
        model_id: large.identity_hash(),
        fingerprint,
    };
    assert_eq!(
        cache.load(&other_key, large.dimensions(), 1),
        Err(CacheMiss::ModelMismatch)
    );
}
