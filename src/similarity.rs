//! Cosine similarity indexes over sparse document vectors.
//!
//! Two implementations of [`SimilarityIndex`]:
//! - [`MatrixSimilarity`]: dense `k × F` smartcore matrix of unit rows. Used for
//!   the small medoid index rebuilt by the clusterer whenever medoids change.
//! - [`SparseMatrixSimilarity`]: CSR matrix of unit rows (sprs). Used for the
//!   whole training corpus, where dense storage would not fit.
//!
//! Both store vectors normalised at build time, so a query score is the
//! cosine similarity: 1.0 same direction, -1.0 opposite, 0.0 orthogonal.
//! Feature ids `>= num_features` are ignored on build and on query.

use log::{debug, trace};
use rayon::prelude::*;
use smartcore::linalg::basic::arrays::{Array, Array2};
use smartcore::linalg::basic::matrix::DenseMatrix;
use sprs::{CsMat, TriMat};

use crate::core::{DenseVector, SparseVector};

/// Query capability shared by the medoid and corpus indexes.
pub trait SimilarityIndex: Send + Sync {
    /// Number of indexed vectors.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn num_features(&self) -> usize;

    /// Cosine similarity of `query` against every indexed vector, in index order.
    fn similarities(&self, query: &SparseVector) -> Vec<f64>;

    /// Position of the highest-scoring indexed vector.
    ///
    /// The first maximum in index order wins ties, so an index built from
    /// ascending ids resolves ties to the lowest id. `None` only for an
    /// empty index.
    fn best_position(&self, query: &SparseVector) -> Option<usize> {
        let scores = self.similarities(query);
        let mut best: Option<(usize, f64)> = None;
        for (pos, score) in scores.into_iter().enumerate() {
            match best {
                Some((_, s)) if !(score > s) => {}
                _ => best = Some((pos, score)),
            }
        }
        best.map(|(pos, _)| pos)
    }

    /// Up to `k` matches ranked by descending score (ties: lower position first).
    ///
    /// Zero and non-finite scores are not matches, so a query orthogonal to
    /// everything yields an empty list.
    fn top_k(&self, query: &SparseVector, k: usize) -> Vec<(usize, f64)> {
        rank_scores(self.similarities(query), k)
    }

    /// The single best match, if any.
    fn best(&self, query: &SparseVector) -> Option<(usize, f64)> {
        self.top_k(query, 1).into_iter().next()
    }
}

/// Ranks `(position, score)` pairs, dropping zero and non-finite scores.
pub fn rank_scores(scores: Vec<f64>, k: usize) -> Vec<(usize, f64)> {
    let mut ranked: Vec<(usize, f64)> = scores
        .into_iter()
        .enumerate()
        .filter(|&(_, s)| s.is_finite() && s != 0.0)
        .collect();
    ranked.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.0.cmp(&b.0))
    });
    ranked.truncate(k);
    ranked
}

/// Dense cosine index: one unit-normalised row per indexed vector.
#[derive(Clone, Debug)]
pub struct MatrixSimilarity {
    index: DenseMatrix<f64>,
    nrows: usize,
    num_features: usize,
}

impl MatrixSimilarity {
    pub fn build(vectors: &[SparseVector], num_features: usize) -> Self {
        debug!(
            "Building dense similarity index over {} vectors, {} features",
            vectors.len(),
            num_features
        );
        let nrows = vectors.len();
        let mut flat = Vec::with_capacity(nrows * num_features);
        for v in vectors {
            let mut row = v.to_dense(num_features);
            row.normalise();
            flat.extend(row.into_inner());
        }

        Self {
            index: DenseMatrix::from_iterator(flat.into_iter(), nrows, num_features, 0),
            nrows,
            num_features,
        }
    }

    /// The unit-normalised rows, shape `(len, num_features)`.
    pub fn index(&self) -> &DenseMatrix<f64> {
        &self.index
    }

    /// Row `pos` as a dense vector.
    pub fn row(&self, pos: usize) -> DenseVector {
        (0..self.num_features)
            .map(|f| *self.index.get((pos, f)))
            .collect::<Vec<f64>>()
            .into()
    }
}

impl SimilarityIndex for MatrixSimilarity {
    fn len(&self) -> usize {
        self.nrows
    }

    fn num_features(&self) -> usize {
        self.num_features
    }

    fn similarities(&self, query: &SparseVector) -> Vec<f64> {
        let q = bounded_unit(query, self.num_features);
        (0..self.nrows)
            .map(|i| q.iter().map(|&(f, w)| w * *self.index.get((i, f))).sum())
            .collect()
    }
}

/// Sparse cosine index: CSR matrix with one unit-normalised row per vector.
#[derive(Clone, Debug)]
pub struct SparseMatrixSimilarity {
    index: CsMat<f64>,
    num_features: usize,
}

impl SparseMatrixSimilarity {
    pub fn build(vectors: &[SparseVector], num_features: usize) -> Self {
        debug!(
            "Building sparse similarity index over {} vectors, {} features",
            vectors.len(),
            num_features
        );
        let mut triplets = TriMat::new((vectors.len(), num_features));
        for (i, v) in vectors.iter().enumerate() {
            for (f, w) in bounded_unit(v, num_features) {
                triplets.add_triplet(i, f, w);
            }
        }

        Self {
            index: triplets.to_csr(),
            num_features,
        }
    }

    /// Indexed (unit-normalised) vector at `id`; empty when out of range.
    pub fn vector_by_id(&self, id: usize) -> SparseVector {
        self.index
            .outer_view(id)
            .map(|row| row.iter().map(|(f, &w)| (f, w)).collect())
            .unwrap_or_default()
    }

    pub fn nnz(&self) -> usize {
        self.index.nnz()
    }
}

impl SimilarityIndex for SparseMatrixSimilarity {
    fn len(&self) -> usize {
        self.index.rows()
    }

    fn num_features(&self) -> usize {
        self.num_features
    }

    fn similarities(&self, query: &SparseVector) -> Vec<f64> {
        let q = query.to_dense(self.num_features);
        let qn = q.norm();
        if qn == 0.0 || !qn.is_finite() {
            trace!("Zero query against sparse index");
            return vec![0.0; self.len()];
        }
        let q = q.as_slice();

        (0..self.len())
            .into_par_iter()
            .map(|i| {
                self.index
                    .outer_view(i)
                    .map(|row| row.iter().map(|(f, &w)| w * q[f]).sum::<f64>() / qn)
                    .unwrap_or(0.0)
            })
            .collect()
    }
}

/// Unit-normalised entries of `v` restricted to ids `< num_features`.
fn bounded_unit(v: &SparseVector, num_features: usize) -> Vec<(usize, f64)> {
    let kept: Vec<(usize, f64)> = v.iter().filter(|&(f, _)| f < num_features).collect();
    let n = kept.iter().map(|&(_, w)| w * w).sum::<f64>().sqrt();
    if n == 0.0 || !n.is_finite() {
        return kept;
    }
    kept.into_iter().map(|(f, w)| (f, w / n)).collect()
}
