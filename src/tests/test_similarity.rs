use approx::assert_relative_eq;

use crate::core::SparseVector;
use crate::similarity::{rank_scores, MatrixSimilarity, SimilarityIndex, SparseMatrixSimilarity};
use crate::tests::test_data::{make_topic_corpus, toy_corpus};

fn sv(pairs: &[(usize, f64)]) -> SparseVector {
    SparseVector::from_pairs(pairs.iter().copied())
}

#[test]
fn test_matrix_similarity_cosine_semantics() {
    let vectors = vec![
        sv(&[(0, 2.0), (1, 2.0)]),
        sv(&[(0, -1.0), (1, -1.0)]),
        sv(&[(2, 5.0)]),
    ];
    let index = MatrixSimilarity::build(&vectors, 3);
    assert_eq!(index.len(), 3);

    let scores = index.similarities(&sv(&[(0, 1.0), (1, 1.0)]));
    assert_relative_eq!(scores[0], 1.0, epsilon = 1e-12);
    assert_relative_eq!(scores[1], -1.0, epsilon = 1e-12);
    assert_relative_eq!(scores[2], 0.0, epsilon = 1e-12);
}

#[test]
fn test_best_position_first_maximum_wins() {
    let vectors = vec![sv(&[(0, 1.0)]), sv(&[(1, 1.0)]), sv(&[(0, 3.0)])];
    let index = MatrixSimilarity::build(&vectors, 2);

    // rows 0 and 2 tie with score 1.0
    assert_eq!(index.best_position(&sv(&[(0, 1.0)])), Some(0));
    // everything orthogonal: all zeros, first position
    let orthogonal = MatrixSimilarity::build(&vectors, 3);
    assert_eq!(orthogonal.best_position(&sv(&[(2, 1.0)])), Some(0));
}

#[test]
fn test_best_position_empty_index() {
    let index = SparseMatrixSimilarity::build(&[], 4);
    assert!(index.is_empty());
    assert_eq!(index.best_position(&sv(&[(0, 1.0)])), None);
}

#[test]
fn test_rank_scores_orders_and_filters() {
    let ranked = rank_scores(vec![0.2, 0.0, 0.9, f64::NAN, 0.9, -0.3], 10);
    assert_eq!(ranked, vec![(2, 0.9), (4, 0.9), (0, 0.2), (5, -0.3)]);

    let top = rank_scores(vec![0.1, 0.5, 0.3], 2);
    assert_eq!(top, vec![(1, 0.5), (2, 0.3)]);
}

#[test]
fn test_best_none_for_orthogonal_query() {
    let (corpus, _, _) = toy_corpus();
    let num_features = crate::core::infer_num_features(&corpus);
    let index = SparseMatrixSimilarity::build(&corpus, num_features);

    assert!(index.best(&SparseVector::new()).is_none());
    assert!(index.top_k(&sv(&[(num_features + 3, 1.0)]), 5).is_empty());
}

#[test]
fn test_sparse_and_dense_indexes_agree() {
    let corpus = make_topic_corpus(3, 10, 5, 0.3, 7);
    let num_features = 15;
    let dense = MatrixSimilarity::build(&corpus, num_features);
    let sparse = SparseMatrixSimilarity::build(&corpus, num_features);

    for query in corpus.iter().take(6) {
        let a = dense.similarities(query);
        let b = sparse.similarities(query);
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(b.iter()) {
            assert_relative_eq!(*x, *y, epsilon = 1e-10);
        }
        assert_eq!(dense.best_position(query), sparse.best_position(query));
    }
}

#[test]
fn test_document_is_its_own_best_match() {
    let (corpus, _, _) = toy_corpus();
    let num_features = crate::core::infer_num_features(&corpus);
    let index = SparseMatrixSimilarity::build(&corpus, num_features);

    for (id, doc) in corpus.iter().enumerate() {
        let (best, score) = index.best(doc).expect("non-zero document");
        assert_relative_eq!(score, 1.0, epsilon = 1e-9);
        // documents are distinct, so the best match is the document itself
        assert_eq!(best, id);
    }
}

#[test]
fn test_vector_by_id_is_unit() {
    let corpus = vec![sv(&[(0, 3.0), (2, 4.0)]), sv(&[(1, 1.0)])];
    let index = SparseMatrixSimilarity::build(&corpus, 3);

    let v = index.vector_by_id(0);
    assert_relative_eq!(v.norm(), 1.0, epsilon = 1e-12);
    assert_relative_eq!(v.get(2), 0.8, epsilon = 1e-12);
    assert!(index.vector_by_id(99).is_empty());
}

#[test]
fn test_dense_row_is_unit() {
    let index = MatrixSimilarity::build(&[sv(&[(0, 3.0), (1, 4.0)])], 2);
    let row = index.row(0);
    assert_relative_eq!(row.as_slice()[0], 0.6, epsilon = 1e-12);
    assert_relative_eq!(row.as_slice()[1], 0.8, epsilon = 1e-12);
}
