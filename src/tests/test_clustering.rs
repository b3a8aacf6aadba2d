//! Test suite for the k-medoids clusterer.
//!
//! Tests cover:
//! - Configuration validation (fail fast before any work)
//! - Partition completeness and medoid count
//! - The identity shortcut (k == N) and the single-cluster case
//! - Degenerate clusters and centroid fallbacks on sparse data
//! - Determinism across seeds and worker counts
//! - Cancellation and timeout

use std::collections::BTreeSet;
use std::time::Duration;

use crate::clustering::{
    CancellationToken, ClusteringOutcome, ClusteringParams, MedoidClusterer,
};
use crate::core::{infer_num_features, SparseVector};
use crate::errors::ConceptError;
use crate::tests::seeded_params;
use crate::tests::test_data::{make_topic_corpus, toy_corpus};

fn assert_complete_partition(outcome: &ClusteringOutcome, n: usize) {
    let mut seen = BTreeSet::new();
    for members in outcome.clusters.values() {
        for &m in members {
            assert!(seen.insert(m), "document {} assigned twice", m);
        }
    }
    assert_eq!(seen, (0..n).collect::<BTreeSet<_>>(), "partition incomplete");
}

// -------------------- Configuration --------------------

#[test]
fn test_rejects_empty_corpus() {
    let err = MedoidClusterer::new(&[], 3, ClusteringParams::new(1)).err();
    assert!(matches!(err, Some(ConceptError::EmptyCorpus)));
}

#[test]
fn test_rejects_k_larger_than_corpus() {
    let (corpus, dict, _) = toy_corpus();
    let err = MedoidClusterer::new(&corpus, dict.len(), ClusteringParams::new(10)).err();
    assert!(matches!(err, Some(ConceptError::InvalidConfig(_))));
}

#[test]
fn test_rejects_zero_k_and_zero_features() {
    let (corpus, dict, _) = toy_corpus();
    assert!(matches!(
        MedoidClusterer::new(&corpus, dict.len(), ClusteringParams::new(0)).err(),
        Some(ConceptError::InvalidConfig(_))
    ));
    assert!(matches!(
        MedoidClusterer::new(&corpus, 0, ClusteringParams::new(3)).err(),
        Some(ConceptError::InvalidConfig(_))
    ));
}

#[test]
fn test_rejects_zero_workers_and_min_size() {
    let (corpus, dict, _) = toy_corpus();

    let mut params = ClusteringParams::new(3);
    params.workers = Some(0);
    assert!(MedoidClusterer::new(&corpus, dict.len(), params).is_err());

    let mut params = ClusteringParams::new(3);
    params.min_cluster_size = 0;
    assert!(MedoidClusterer::new(&corpus, dict.len(), params).is_err());
}

// -------------------- Toy corpus scenarios --------------------

#[test]
fn test_k_equals_n_gives_singletons() {
    let (corpus, dict, _) = toy_corpus();
    let clusterer = MedoidClusterer::new(&corpus, dict.len(), seeded_params(9, 1)).unwrap();
    let outcome = clusterer.cluster().unwrap();

    assert!(outcome.converged);
    assert_eq!(outcome.iterations, 0);
    assert_eq!(outcome.medoids(), (0..9).collect::<Vec<_>>());
    for (medoid, members) in &outcome.clusters {
        assert_eq!(members, &vec![*medoid]);
    }
}

#[test]
fn test_k3_yields_three_medoids_and_complete_partition() {
    let (corpus, dict, _) = toy_corpus();

    for seed in 0..20 {
        let clusterer =
            MedoidClusterer::new(&corpus, dict.len(), seeded_params(3, seed)).unwrap();
        let outcome = clusterer.cluster().unwrap();

        assert_eq!(outcome.clusters.len(), 3, "seed {}", seed);
        assert!(outcome.iterations <= 10, "seed {}", seed);
        assert_complete_partition(&outcome, corpus.len());
    }
}

#[test]
fn test_k1_converges_quickly() {
    let (corpus, dict, _) = toy_corpus();

    for seed in 0..10 {
        let clusterer =
            MedoidClusterer::new(&corpus, dict.len(), seeded_params(1, seed)).unwrap();
        let outcome = clusterer.cluster().unwrap();

        assert!(outcome.converged, "seed {}", seed);
        assert!(outcome.iterations <= 2, "seed {}: {}", seed, outcome.iterations);
        assert_eq!(outcome.clusters.len(), 1);
        let members = outcome.clusters.values().next().unwrap();
        assert_eq!(members, &(0..9).collect::<Vec<_>>());
    }
}

#[test]
fn test_medoid_is_member_of_its_cluster_on_separated_topics() {
    let corpus = make_topic_corpus(3, 15, 6, 0.2, 3);
    let clusterer = MedoidClusterer::new(&corpus, 18, seeded_params(3, 11)).unwrap();
    let outcome = clusterer.cluster().unwrap();

    assert_complete_partition(&outcome, corpus.len());
    for (medoid, members) in &outcome.clusters {
        assert!(!members.is_empty());
        assert_eq!(outcome.cluster_of(*medoid), Some(*medoid));
    }
}

// -------------------- Degenerate data --------------------

#[test]
fn test_zero_vectors_trigger_fallback_and_reinit() {
    // All documents are empty: every document lands on the lowest medoid,
    // the other cluster is degenerate and the populated one has a zero
    // centroid with no match in the corpus index.
    let corpus = vec![SparseVector::new(); 5];
    let mut params = seeded_params(2, 9);
    params.max_iterations = 3;

    let clusterer = MedoidClusterer::new(&corpus, 3, params).unwrap();
    let outcome = clusterer.cluster().unwrap();

    assert!(!outcome.converged);
    assert_eq!(outcome.iterations, 3);
    assert_eq!(outcome.fallback_medoids, 3);
    assert_eq!(outcome.reinitialised_clusters, 3);
    assert_eq!(outcome.clusters.len(), 2);
    assert_complete_partition(&outcome, 5);
}

#[test]
fn test_medoid_count_is_stable_with_many_small_clusters() {
    let corpus = make_topic_corpus(4, 5, 3, 0.5, 13);
    let mut params = seeded_params(8, 2);
    params.max_iterations = 15;
    params.min_cluster_size = 3;

    let clusterer = MedoidClusterer::new(&corpus, 12, params).unwrap();
    let outcome = clusterer.cluster().unwrap();

    assert_eq!(outcome.clusters.len(), 8);
    assert_complete_partition(&outcome, corpus.len());
}

#[test]
fn test_medoid_count_holds_after_every_iteration() {
    let corpus = make_topic_corpus(4, 5, 3, 0.5, 13);
    let (toy, dict, _) = toy_corpus();

    let cases: [(&[SparseVector], usize, usize, usize); 3] = [
        (&corpus, 12, 8, 3),
        (&toy, dict.len(), 3, 2),
        (&toy, dict.len(), 5, 2),
    ];
    for (docs, num_features, k, min_cluster_size) in cases {
        for max_iterations in 0..=12 {
            let mut params = seeded_params(k, 6);
            params.max_iterations = max_iterations;
            params.min_cluster_size = min_cluster_size;

            let outcome = MedoidClusterer::new(docs, num_features, params)
                .unwrap()
                .cluster()
                .unwrap();
            assert!(outcome.iterations <= max_iterations);
            assert_eq!(
                outcome.clusters.len(),
                k,
                "k {}, max_iterations {}",
                k,
                max_iterations
            );
            assert_complete_partition(&outcome, docs.len());
        }
    }
}

#[test]
fn test_zero_iterations_only_assigns() {
    let (corpus, dict, _) = toy_corpus();
    let mut params = seeded_params(3, 4);
    params.max_iterations = 0;

    let outcome = MedoidClusterer::new(&corpus, dict.len(), params)
        .unwrap()
        .cluster()
        .unwrap();

    assert_eq!(outcome.iterations, 0);
    assert!(!outcome.converged);
    assert_eq!(outcome.clusters.len(), 3);
    assert_complete_partition(&outcome, corpus.len());
}

// -------------------- Determinism --------------------

#[test]
fn test_same_seed_same_result() {
    let corpus = make_topic_corpus(3, 20, 8, 0.4, 17);
    let run = || {
        MedoidClusterer::new(&corpus, 24, seeded_params(4, 99))
            .unwrap()
            .cluster()
            .unwrap()
    };
    assert_eq!(run(), run());
}

#[test]
fn test_worker_count_does_not_change_result() {
    let corpus = make_topic_corpus(3, 20, 8, 0.4, 23);

    let outcomes: Vec<ClusteringOutcome> = [1usize, 2, 4]
        .iter()
        .map(|&workers| {
            let mut params = seeded_params(5, 7);
            params.workers = Some(workers);
            MedoidClusterer::new(&corpus, 24, params)
                .unwrap()
                .cluster()
                .unwrap()
        })
        .collect();

    assert_eq!(outcomes[0], outcomes[1]);
    assert_eq!(outcomes[0], outcomes[2]);
}

#[test]
fn test_random_seed_is_reported() {
    let (corpus, dict, _) = toy_corpus();
    let first = MedoidClusterer::new(&corpus, dict.len(), ClusteringParams::new(3))
        .unwrap()
        .cluster()
        .unwrap();

    let replay = MedoidClusterer::new(&corpus, dict.len(), seeded_params(3, first.seed))
        .unwrap()
        .cluster()
        .unwrap();
    assert_eq!(first, replay);
}

#[test]
fn test_medoid_vectors_are_unit_and_ordered() {
    let (corpus, dict, _) = toy_corpus();
    let clusterer = MedoidClusterer::new(&corpus, dict.len(), seeded_params(3, 5)).unwrap();
    let outcome = clusterer.cluster().unwrap();

    let vectors = clusterer.medoid_vectors(&outcome);
    assert_eq!(vectors.len(), 3);
    for (v, medoid) in vectors.iter().zip(outcome.medoids()) {
        assert!((v.norm() - 1.0).abs() < 1e-9);
        let expected = corpus[medoid].normalised();
        for (f, w) in expected.iter() {
            assert!((v.get(f) - w).abs() < 1e-12);
        }
    }
}

// -------------------- Cancellation and timeout --------------------

#[test]
fn test_cancelled_before_first_iteration() {
    let (corpus, dict, _) = toy_corpus();
    let token = CancellationToken::new();
    token.cancel();

    let result = MedoidClusterer::new(&corpus, dict.len(), seeded_params(3, 1))
        .unwrap()
        .with_cancellation(token)
        .cluster();

    assert!(matches!(result, Err(ConceptError::Cancelled { iteration: 0 })));
}

#[test]
fn test_zero_timeout_stops_without_converging() {
    let (corpus, dict, _) = toy_corpus();
    let outcome = MedoidClusterer::new(&corpus, dict.len(), seeded_params(3, 1))
        .unwrap()
        .with_timeout(Duration::ZERO)
        .cluster()
        .unwrap();

    assert_eq!(outcome.iterations, 0);
    assert!(!outcome.converged);
    assert_complete_partition(&outcome, corpus.len());
}

#[test]
fn test_out_of_range_features_are_ignored() {
    let mut corpus = make_topic_corpus(2, 6, 4, 0.2, 31);
    corpus.push(SparseVector::from_pairs(vec![(0, 1.0), (500, 3.0)]));
    let num_features = 8;
    assert!(infer_num_features(&corpus) > num_features);

    let outcome = MedoidClusterer::new(&corpus, num_features, seeded_params(2, 3))
        .unwrap()
        .cluster()
        .unwrap();
    assert_complete_partition(&outcome, corpus.len());
}
